use std::collections::BTreeMap;
use std::sync::Arc;

use crate::http::Response;

/// 表达式错误类型
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error("Name is not allowed: {0}")]
    ForbiddenName(String),

    #[error("Unknown name: {0}")]
    UnknownName(String),

    #[error("Function is not whitelisted: {0}")]
    UnknownFunction(String),

    #[error("Attribute is not allowed: {0}")]
    ForbiddenAttribute(String),

    #[error("Method is not whitelisted: {0}")]
    UnknownMethod(String),

    #[error("Type error: {0}")]
    Type(String),

    #[error("Invalid regex pattern: {0}")]
    Regex(String),

    #[error("Response body is not valid JSON: {0}")]
    Json(String),
}

/// 表达式运行时值
///
/// 变量存储使用 serde_json::Value，求值期间转换为本类型；
/// Response 与 Match 只存在于求值过程中，不能写回变量存储
/// （Match 写回时降级为整体匹配文本）。
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Response(Arc<Response>),
    Match(MatchValue),
}

/// 正则匹配结果，仅支持按序号取组
///
/// 组 0 为整体匹配，未参与的组为 None
#[derive(Debug, Clone, PartialEq)]
pub struct MatchValue {
    groups: Vec<Option<String>>,
}

impl MatchValue {
    pub fn new(groups: Vec<Option<String>>) -> Self {
        Self { groups }
    }

    pub fn group(&self, index: usize) -> Result<Value, EvalError> {
        match self.groups.get(index) {
            Some(Some(text)) => Ok(Value::Str(text.clone())),
            Some(None) => Ok(Value::Null),
            None => Err(EvalError::Type(format!("no such group: {}", index))),
        }
    }

    /// 整体匹配文本
    pub fn full_match(&self) -> &str {
        self.groups
            .first()
            .and_then(|g| g.as_deref())
            .unwrap_or_default()
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Response(_) => "response",
            Value::Match(_) => "match",
        }
    }

    /// 真值规则：null/false/0/空集合 为假，其余为真
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(entries) => !entries.is_empty(),
            Value::Response(_) | Value::Match(_) => true,
        }
    }

    pub fn from_json(value: &serde_json::Value) -> Value {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => {
                Value::List(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(entries) => Value::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// 转换为可存入变量存储的 JSON 值
    pub fn to_json(&self) -> Result<serde_json::Value, EvalError> {
        match self {
            Value::Null => Ok(serde_json::Value::Null),
            Value::Bool(b) => Ok(serde_json::Value::Bool(*b)),
            Value::Int(n) => Ok(serde_json::Value::from(*n)),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .ok_or_else(|| EvalError::Type("non-finite float cannot be stored".to_string())),
            Value::Str(s) => Ok(serde_json::Value::String(s.clone())),
            Value::List(items) => items
                .iter()
                .map(Value::to_json)
                .collect::<Result<Vec<_>, _>>()
                .map(serde_json::Value::Array),
            Value::Map(entries) => entries
                .iter()
                .map(|(k, v)| v.to_json().map(|v| (k.clone(), v)))
                .collect::<Result<serde_json::Map<_, _>, _>>()
                .map(serde_json::Value::Object),
            Value::Match(m) => Ok(serde_json::Value::String(m.full_match().to_string())),
            Value::Response(_) => Err(EvalError::Type(
                "response object cannot be stored as a variable".to_string(),
            )),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => (a - b).abs() < f64::EPSILON,
            // 整数与浮点数跨类型相等
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                (*a as f64 - b).abs() < f64::EPSILON
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Match(a), Value::Match(b)) => a == b,
            _ => false,
        }
    }
}
