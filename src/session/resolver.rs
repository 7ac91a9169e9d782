use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde_json::Value as JsonValue;

use crate::session::types::VariableStore;

/// 替换文本中的所有 $name 占位符
///
/// 文本是默认载荷的 JSON 序列化形式：字符串变量按 JSON 转义后
/// 插入（不带外层引号），其余值按其 JSON 形式插入，替换结果
/// 仍是合法的 JSON 文档。未知名称保持原样。
pub fn substitute(text: &str, variables: &VariableStore) -> String {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    let re = PLACEHOLDER.get_or_init(|| Regex::new(r"\$([a-zA-Z_][a-zA-Z0-9_]*)").unwrap());

    re.replace_all(text, |caps: &Captures| {
        let name = &caps[1];
        match variables.get(name) {
            Some(JsonValue::String(s)) => escape_fragment(s),
            Some(value) => value.to_string(),
            None => caps[0].to_string(),
        }
    })
    .to_string()
}

/// JSON 字符串转义，去掉外层引号
fn escape_fragment(s: &str) -> String {
    let quoted = JsonValue::String(s.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store(entries: &[(&str, JsonValue)]) -> VariableStore {
        let mut store = VariableStore::new();
        for (k, v) in entries {
            store.set(*k, v.clone());
        }
        store
    }

    #[test]
    fn test_substitute_simple() {
        let vars = store(&[("base_url", json!("http://localhost:8080"))]);
        assert_eq!(
            substitute("$base_url/api/users", &vars),
            "http://localhost:8080/api/users"
        );
    }

    #[test]
    fn test_substitute_multiple() {
        let vars = store(&[("host", json!("example.com")), ("port", json!(8080))]);
        assert_eq!(
            substitute(r#"{"url": "https://$host:$port"}"#, &vars),
            r#"{"url": "https://example.com:8080"}"#
        );
    }

    #[test]
    fn test_substitute_missing_variable() {
        let vars = store(&[]);
        // 未找到的占位符保持原样
        assert_eq!(substitute("$missing/path", &vars), "$missing/path");
    }

    #[test]
    fn test_substitute_keeps_json_valid() {
        let vars = store(&[("quote", json!("say \"hi\""))]);
        let out = substitute(r#"{"msg": "$quote"}"#, &vars);
        let parsed: JsonValue = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["msg"], json!("say \"hi\""));
    }

    #[test]
    fn test_substitute_non_string_values() {
        let vars = store(&[("retries", json!(3)), ("enabled", json!(true))]);
        assert_eq!(
            substitute(r#"{"retries": $retries, "enabled": $enabled}"#, &vars),
            r#"{"retries": 3, "enabled": true}"#
        );
    }
}
