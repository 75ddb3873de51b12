use ordo_types::RuleSource;

/// 把多个片段合并为一个 `AND(...)` 表达式
///
/// An empty input yields `None`: there is nothing to add, which is not the
/// same as an empty expression.
pub fn and_operator<S: AsRef<str>>(fragments: &[S]) -> Option<String> {
    if fragments.is_empty() {
        return None;
    }

    let joined = fragments
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(",\n");

    Some(format!("AND({})", joined))
}

/// 合并条件或动作
///
/// A single text passes through untouched, fragments go through [`and_operator`].
pub fn combine(source: RuleSource) -> Option<String> {
    match source {
        RuleSource::Text(text) => Some(text),
        RuleSource::Fragments(fragments) => and_operator(&fragments),
    }
}
