use crate::exclusion::{is_suppressed, ExclusionSet};
use ordo_types::{Rule, Value, Variables};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// 单轮执行上下文
///
/// Created fresh for every pass and dropped afterwards.
#[derive(Debug, Default)]
pub struct ExecutionContext {
    /// 规则写入的变量
    pub variables: Variables,

    /// 本轮累积的排除项
    pub exclusions: ExclusionSet,
}

/// Shared handle to the context of the running pass.
///
/// Every capability of a pass closes over a clone of the same handle, so a
/// write made by one rule is visible to every rule reached later in the pass.
#[derive(Debug, Clone, Default)]
pub struct ContextHandle {
    inner: Arc<RwLock<ExecutionContext>>,
}

impl ContextHandle {
    pub fn new() -> Self {
        Self::default()
    }

    // 锁被污染时照常取回数据
    fn read(&self) -> RwLockReadGuard<'_, ExecutionContext> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ExecutionContext> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// set_variable(key, value)
    pub fn set_variable(&self, key: impl Into<String>, value: Value) {
        self.write().variables.insert(key.into(), value);
    }

    /// get_variable(key)，未设置时返回 None
    pub fn get_variable(&self, key: &str) -> Option<Value> {
        self.read().variables.get(key).cloned()
    }

    /// get_context(): live access to the variable mapping
    pub fn with_context<R>(&self, f: impl FnOnce(&mut Variables) -> R) -> R {
        f(&mut self.write().variables)
    }

    /// exclude(event_or_name)
    pub fn exclude(&self, event: impl Into<String>) {
        self.write().exclusions.push(event);
    }

    pub fn exclusions(&self) -> Vec<String> {
        self.read().exclusions.values()
    }

    /// 规则是否应在本轮跳过
    pub fn is_suppressed(&self, rule: &Rule) -> bool {
        is_suppressed(rule, &self.read().exclusions)
    }

    /// Snapshot of the variables.
    pub fn variables(&self) -> Variables {
        self.read().variables.clone()
    }

    /// Moves the variables out, leaving the context empty.
    pub fn take_variables(&self) -> Variables {
        std::mem::take(&mut self.write().variables)
    }
}
