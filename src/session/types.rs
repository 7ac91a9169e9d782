use std::collections::HashMap;

use serde_json::Value as JsonValue;

use crate::session::resolver;
use crate::{Result, RuplayError, expr};

/// 变量存储：会话级 name→value 映射
///
/// 仅由变量捕获与宿主写入；键可覆盖，不会删除。
/// 值为任意结构化 JSON 数据。
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    variables: HashMap<String, JsonValue>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<JsonValue>) {
        self.variables.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.variables.get(key)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// 表达式求值用的只读快照
    pub fn to_value(&self) -> expr::Value {
        expr::Value::Map(
            self.variables
                .iter()
                .map(|(k, v)| (k.clone(), expr::Value::from_json(v)))
                .collect(),
        )
    }
}

/// 一个测试会话的共享状态：变量存储 + 默认载荷
///
/// 按 &mut 传入每次管线调用，一个会话内的命令因此天然串行；
/// 并发会话各自持有独立实例，互不共享。
#[derive(Debug, Clone, Default)]
pub struct Session {
    variables: VariableStore,
    default_payload: Option<JsonValue>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn variables(&self) -> &VariableStore {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut VariableStore {
        &mut self.variables
    }

    /// 设置默认载荷；必须是映射
    pub fn set_default_payload(&mut self, payload: JsonValue) -> Result<()> {
        if !payload.is_object() {
            return Err(RuplayError::Configuration(
                "default payload must be a mapping".to_string(),
            ));
        }
        self.default_payload = Some(payload);
        Ok(())
    }

    pub fn clear_default_payload(&mut self) {
        self.default_payload = None;
    }

    pub fn default_payload(&self) -> Option<&JsonValue> {
        self.default_payload.as_ref()
    }

    /// 合并前的有效默认载荷：序列化 → $name 占位符替换 → 重新解析
    pub fn effective_defaults(&self) -> Result<Option<JsonValue>> {
        let Some(payload) = &self.default_payload else {
            return Ok(None);
        };
        let serialized = serde_json::to_string(payload)?;
        let substituted = resolver::substitute(&serialized, &self.variables);
        Ok(Some(serde_json::from_str(&substituted)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_variable_store_basic() {
        let mut store = VariableStore::new();
        assert!(store.is_empty());

        store.set("key", "value");
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("key"), Some(&json!("value")));
        assert_eq!(store.get("missing"), None);

        // 覆盖已有键
        store.set("key", 42);
        assert_eq!(store.get("key"), Some(&json!(42)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_snapshot_for_expressions() {
        let mut store = VariableStore::new();
        store.set("count", 3);
        store.set("user", json!({"id": 1}));

        let ctx = expr::Context::new().bind("variables", store.to_value());
        assert_eq!(
            expr::evaluate("variables['count']", &ctx).unwrap(),
            expr::Value::Int(3)
        );
        assert_eq!(
            expr::evaluate("variables['user']['id']", &ctx).unwrap(),
            expr::Value::Int(1)
        );
    }

    #[test]
    fn test_default_payload_must_be_mapping() {
        let mut session = Session::new();
        assert!(session.set_default_payload(json!([1, 2])).is_err());
        assert!(session.set_default_payload(json!({"a": 1})).is_ok());
    }

    #[test]
    fn test_effective_defaults_substitutes_placeholders() {
        let mut session = Session::new();
        session.variables_mut().set("token", "abc123");
        session
            .set_default_payload(json!({
                "parameters": {"headers": {"Authorization": "Bearer $token"}}
            }))
            .unwrap();

        let defaults = session.effective_defaults().unwrap().unwrap();
        assert_eq!(
            defaults["parameters"]["headers"]["Authorization"],
            json!("Bearer abc123")
        );
        // 原始载荷不被替换改写
        assert_eq!(
            session.default_payload().unwrap()["parameters"]["headers"]["Authorization"],
            json!("Bearer $token")
        );
    }

    #[test]
    fn test_effective_defaults_without_payload() {
        let session = Session::new();
        assert_eq!(session.effective_defaults().unwrap(), None);
    }
}
