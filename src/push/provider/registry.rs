use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

use crate::push::provider::error::BackendError;

/// 存活客户端作用域登记表
///
/// 只记录作用域名与创建时间，不持有任何凭据。
#[derive(Debug, Clone, Default)]
pub struct ScopeRegistry {
    scopes: Arc<DashMap<String, DateTime<Utc>>>,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记作用域；同名作用域已存在时拒绝
    pub fn register(&self, scope_name: &str) -> Result<(), BackendError> {
        match self.scopes.entry(scope_name.to_string()) {
            Entry::Occupied(_) => Err(BackendError::DuplicateScope(scope_name.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(Utc::now());
                Ok(())
            }
        }
    }

    /// 注销作用域，返回它之前是否存在
    pub fn release(&self, scope_name: &str) -> bool {
        self.scopes.remove(scope_name).is_some()
    }

    pub fn contains(&self, scope_name: &str) -> bool {
        self.scopes.contains_key(scope_name)
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}
