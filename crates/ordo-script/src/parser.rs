//! Rule text format.
//!
//! ```text
//! # comment
//! rule "order_more"
//! priority 10
//! when
//!     products_in_stock < 20
//! then
//!     set_variable("order", 50)
//! end
//! ```
//!
//! `priority` is optional and defaults to 1000; the `when` block may be
//! omitted for a rule that always fires.

use ordo_rule::{Result, RuleError};
use ordo_types::{Rule, RuleBinding, DEFAULT_PRIORITY};

enum State {
    Outside,
    Header(Rule, i64),
    When(Rule, i64, Vec<String>),
    Then(Rule, i64, Vec<String>),
}

fn error(line_no: usize, message: impl std::fmt::Display) -> RuleError {
    RuleError::Parse(format!("line {}: {}", line_no, message))
}

fn parse_name(rest: &str, line_no: usize) -> Result<String> {
    let rest = rest.trim();
    let quote = rest
        .chars()
        .next()
        .filter(|c| *c == '"' || *c == '\'')
        .ok_or_else(|| error(line_no, "rule name must be quoted"))?;

    let inner = &rest[1..];
    let end = inner
        .find(quote)
        .ok_or_else(|| error(line_no, "unterminated rule name"))?;

    let name = &inner[..end];
    if name.is_empty() {
        return Err(error(line_no, "empty rule name"));
    }
    if !inner[end + 1..].trim().is_empty() {
        return Err(error(line_no, "unexpected text after rule name"));
    }
    Ok(name.to_string())
}

fn block(lines: Vec<String>) -> Option<String> {
    let text = lines.join("\n");
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// 解析规则文本
pub fn parse_rules(source: &str) -> Result<Vec<RuleBinding>> {
    let mut bindings = Vec::new();
    let mut state = State::Outside;

    for (index, raw) in source.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();

        state = match state {
            State::Outside => {
                if line.is_empty() || line.starts_with('#') {
                    State::Outside
                } else if let Some(rest) = line.strip_prefix("rule ") {
                    State::Header(Rule::new(parse_name(rest, line_no)?), DEFAULT_PRIORITY)
                } else {
                    return Err(error(line_no, format!("expected `rule`, found `{}`", line)));
                }
            }
            State::Header(rule, priority) => {
                if line.is_empty() || line.starts_with('#') {
                    State::Header(rule, priority)
                } else if let Some(value) = line.strip_prefix("priority ") {
                    let priority = value
                        .trim()
                        .parse::<i64>()
                        .map_err(|e| error(line_no, format!("invalid priority: {}", e)))?;
                    State::Header(rule, priority)
                } else if line == "when" {
                    State::When(rule, priority, Vec::new())
                } else if line == "then" {
                    State::Then(rule, priority, Vec::new())
                } else {
                    return Err(error(
                        line_no,
                        format!("expected `when` or `then` in rule [{}]", rule.name),
                    ));
                }
            }
            State::When(mut rule, priority, mut lines) => {
                if line == "then" {
                    if let Some(condition) = block(lines) {
                        rule.conditions.push(condition);
                    }
                    State::Then(rule, priority, Vec::new())
                } else if line == "end" {
                    return Err(error(line_no, format!("rule [{}] has no `then`", rule.name)));
                } else {
                    lines.push(raw.to_string());
                    State::When(rule, priority, lines)
                }
            }
            State::Then(mut rule, priority, mut lines) => {
                if line == "end" {
                    if let Some(action) = block(lines) {
                        rule.actions.push(action);
                    }
                    bindings.push(RuleBinding::new(rule, priority));
                    State::Outside
                } else {
                    lines.push(raw.to_string());
                    State::Then(rule, priority, lines)
                }
            }
        };
    }

    match state {
        State::Outside => Ok(bindings),
        State::Header(rule, _) | State::When(rule, _, _) | State::Then(rule, _, _) => Err(
            RuleError::Parse(format!("rule [{}] is missing `end`", rule.name)),
        ),
    }
}

/// Rewrites a lone `=` outside string literals into `==`.
///
/// Conditions are expressions, where assignment is meaningless, so
/// `event = "checkout"` reads as a comparison.
pub fn normalize_condition(source: &str) -> String {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len() + 4);
    let mut quote: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if let Some(q) = quote {
            out.push(c);
            if c == '\\' {
                if let Some(next) = chars.get(i + 1) {
                    out.push(*next);
                    i += 1;
                }
            } else if c == q {
                quote = None;
            }
        } else if c == '"' || c == '\'' || c == '`' {
            quote = Some(c);
            out.push(c);
        } else if c == '=' {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let lone = !matches!(prev, Some('=' | '!' | '<' | '>'))
                && !matches!(next, Some('=' | '>'));
            out.push_str(if lone { "==" } else { "=" });
        } else {
            out.push(c);
        }

        i += 1;
    }

    out
}

/// Rewrites every `AND(a, b, ...)` call into `AND([a, b, ...])`.
///
/// `AND` is registered once over an array, so a combined rule may carry any
/// number of fragments.
pub fn lower_and(source: &str) -> String {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len() + 8);
    let mut quote: Option<char> = None;
    // 每个未闭合的括号是否属于 AND 调用
    let mut parens: Vec<bool> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if let Some(q) = quote {
            out.push(c);
            if c == '\\' {
                if let Some(next) = chars.get(i + 1) {
                    out.push(*next);
                    i += 1;
                }
            } else if c == q {
                quote = None;
            }
        } else if c == '"' || c == '\'' || c == '`' {
            quote = Some(c);
            out.push(c);
        } else if c == '/' && chars.get(i + 1) == Some(&'/') {
            while i < chars.len() && chars[i] != '\n' {
                out.push(chars[i]);
                i += 1;
            }
            continue;
        } else if starts_and_call(&chars, i) {
            out.push_str("AND");
            i += 3;
            while chars[i] != '(' {
                out.push(chars[i]);
                i += 1;
            }
            out.push_str("([");
            parens.push(true);
        } else if c == '(' {
            parens.push(false);
            out.push(c);
        } else if c == ')' {
            out.push_str(if parens.pop() == Some(true) { "])" } else { ")" });
        } else {
            out.push(c);
        }

        i += 1;
    }

    out
}

fn starts_and_call(chars: &[char], i: usize) -> bool {
    let attached = |c: char| c.is_alphanumeric() || c == '_' || c == '.';

    if chars.get(i..i + 3) != Some(&['A', 'N', 'D'][..]) {
        return false;
    }
    if i > 0 && attached(chars[i - 1]) {
        return false;
    }
    chars[i + 3..].iter().find(|c| !c.is_whitespace()) == Some(&'(')
}
