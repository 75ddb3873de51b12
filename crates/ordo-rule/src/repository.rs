use ordo_types::RuleBinding;
use tracing::debug;

/// 规则仓库（内存实现）
///
/// Bindings are kept sorted ascending by priority; equal priorities keep
/// their insertion order. Each rule name appears at most once.
#[derive(Debug, Clone, Default)]
pub struct RuleRepository {
    bindings: Vec<RuleBinding>,
}

impl RuleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入或替换规则
    ///
    /// Returns the binding that was replaced, if any.
    pub fn upsert(&mut self, binding: RuleBinding) -> Option<RuleBinding> {
        let replaced = self.remove(binding.name());

        debug!(
            rule_name = %binding.name(),
            priority = binding.priority,
            replaced = replaced.is_some(),
            "Rule stored"
        );

        self.bindings.push(binding);
        // sort_by_key 是稳定排序
        self.bindings.sort_by_key(|b| b.priority);

        replaced
    }

    /// 删除规则，不存在时什么也不做
    pub fn remove(&mut self, name: &str) -> Option<RuleBinding> {
        let index = self.bindings.iter().position(|b| b.name() == name)?;
        Some(self.bindings.remove(index))
    }

    pub fn find(&self, name: &str) -> Option<&RuleBinding> {
        self.bindings.iter().find(|b| b.name() == name)
    }

    /// 按优先级顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = &RuleBinding> {
        self.bindings.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.bindings.iter().map(RuleBinding::name).collect()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
