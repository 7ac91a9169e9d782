use serde::Deserialize;

use crate::http::{Method, Parameters};
use crate::{Result, RuplayError};

/// 单个声明式 HTTP 测试步骤
///
/// 从合并后的命令映射反序列化；宿主附带的额外键（provider/type 等）
/// 被忽略。url 缺失、捕获字段不成对等问题在本边界以配置错误拒绝。
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Command {
    /// HTTP 方法；使用按动词入口时忽略，使用通用入口时必需
    #[serde(default)]
    pub method: Option<String>,

    /// 请求 URL（必需）
    pub url: String,

    /// 传输参数
    #[serde(default)]
    pub parameters: Parameters,

    /// 前置条件表达式；求值为假时跳过该步骤
    #[serde(default)]
    pub condition: Option<String>,

    /// 捕获变量名（与 variable_expression 成对出现）
    #[serde(default)]
    pub variable: Option<String>,

    /// 捕获表达式
    #[serde(default)]
    pub variable_expression: Option<String>,

    /// 断言表达式
    #[serde(default)]
    pub assertion: Option<String>,
}

impl Command {
    /// 从合并后的命令映射构建，校验必需字段与不变量
    pub fn from_value(value: &serde_json::Value) -> Result<Command> {
        let Some(mapping) = value.as_object() else {
            return Err(RuplayError::Configuration(
                "command must be a mapping".to_string(),
            ));
        };

        match mapping.get("url") {
            Some(serde_json::Value::String(url)) if !url.is_empty() => {}
            Some(_) => {
                return Err(RuplayError::Configuration(
                    "field 'url' must be a non-empty string".to_string(),
                ));
            }
            None => {
                return Err(RuplayError::Configuration(
                    "missing required field: url".to_string(),
                ));
            }
        }

        let command: Command = serde_json::from_value(value.clone())
            .map_err(|e| RuplayError::Configuration(format!("invalid command: {}", e)))?;

        url::Url::parse(&command.url)?;

        // variable 与 variable_expression 要么同在要么同缺
        if command.variable.is_some() != command.variable_expression.is_some() {
            return Err(RuplayError::Configuration(
                "'variable' and 'variable_expression' must be present together".to_string(),
            ));
        }

        Ok(command)
    }

    /// 解析映射自身携带的动词（通用入口使用）
    pub fn method_verb(&self) -> Result<Method> {
        let Some(method) = &self.method else {
            return Err(RuplayError::Configuration(
                "missing required field: method".to_string(),
            ));
        };
        Method::parse(method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_value_minimal() {
        let command = Command::from_value(&serde_json::json!({
            "method": "GET",
            "url": "http://example.com/api"
        }))
        .unwrap();
        assert_eq!(command.url, "http://example.com/api");
        assert_eq!(command.method_verb().unwrap(), Method::Get);
        assert_eq!(command.parameters, Parameters::default());
    }

    #[test]
    fn test_from_value_full() {
        let command = Command::from_value(&serde_json::json!({
            "method": "POST",
            "url": "http://example.com/login",
            "parameters": {"json": {"user": "admin"}, "timeout": 2.5},
            "condition": "variables['enabled']",
            "variable": "token",
            "variable_expression": "response.json()['token']",
            "assertion": "response.status_code == 200"
        }))
        .unwrap();
        assert_eq!(command.condition.as_deref(), Some("variables['enabled']"));
        assert_eq!(command.variable.as_deref(), Some("token"));
        assert_eq!(command.parameters.timeout, Some(2.5));
    }

    #[test]
    fn test_missing_url_is_configuration_error() {
        let err = Command::from_value(&serde_json::json!({"method": "GET"})).unwrap_err();
        assert!(matches!(err, RuplayError::Configuration(_)));
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let err =
            Command::from_value(&serde_json::json!({"url": "not a url"})).unwrap_err();
        assert!(matches!(err, RuplayError::UrlParseError(_)));
    }

    #[test]
    fn test_capture_fields_must_be_paired() {
        let err = Command::from_value(&serde_json::json!({
            "url": "http://example.com",
            "variable": "token"
        }))
        .unwrap_err();
        assert!(matches!(err, RuplayError::Configuration(_)));

        let err = Command::from_value(&serde_json::json!({
            "url": "http://example.com",
            "variable_expression": "response.text"
        }))
        .unwrap_err();
        assert!(matches!(err, RuplayError::Configuration(_)));
    }

    #[test]
    fn test_extra_host_fields_are_ignored() {
        let command = Command::from_value(&serde_json::json!({
            "provider": "play_requests",
            "type": "get",
            "url": "http://example.com"
        }))
        .unwrap();
        assert_eq!(command.url, "http://example.com");
    }

    #[test]
    fn test_missing_method_for_generic_entry() {
        let command =
            Command::from_value(&serde_json::json!({"url": "http://example.com"})).unwrap();
        assert!(matches!(
            command.method_verb().unwrap_err(),
            RuplayError::Configuration(_)
        ));
    }
}
