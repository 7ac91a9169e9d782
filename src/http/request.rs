use std::collections::HashMap;

use serde::Deserialize;

/// 命令的传输参数包
///
/// 从合并后的命令映射反序列化；未识别的键被忽略，
/// 以便宿主在映射中携带自己的附加字段。
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Parameters {
    /// 请求头
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// 查询参数；列表值按重复键展开
    #[serde(default)]
    pub params: HashMap<String, ParamValue>,

    /// JSON 请求体
    #[serde(default)]
    pub json: Option<serde_json::Value>,

    /// 原始文本请求体
    #[serde(default)]
    pub data: Option<String>,

    /// 文件上传字段，见 FileSpec
    #[serde(default)]
    pub files: HashMap<String, FileSpec>,

    /// 超时（秒，允许小数）
    #[serde(default)]
    pub timeout: Option<f64>,

    /// Basic 认证
    #[serde(default)]
    pub auth: Option<BasicAuth>,
}

/// 查询参数值：单值或重复键列表
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Single(String),
    Many(Vec<String>),
}

impl ParamValue {
    /// 展开为 (key, value) 对；列表中的每一项都生成一个重复键
    pub fn pairs<'a>(&'a self, key: &'a str) -> Vec<(&'a str, &'a str)> {
        match self {
            ParamValue::Single(value) => vec![(key, value.as_str())],
            ParamValue::Many(values) => values.iter().map(|v| (key, v.as_str())).collect(),
        }
    }
}

/// Basic 认证凭据，形如 ["user", "pass"]
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BasicAuth(pub String, pub String);

impl BasicAuth {
    pub fn username(&self) -> &str {
        &self.0
    }

    pub fn password(&self) -> &str {
        &self.1
    }
}

/// 文件上传条目
///
/// 来自元组形状的数组 (filename, content [, content_type [, headers]])；
/// 可选槽位缺席时保持缺席（2 元组仍是 2 元组，4 元组仍是 4 元组）。
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "serde_json::Value")]
pub struct FileSpec {
    pub filename: String,
    pub content: FileContent,
    pub content_type: Option<String>,
    pub headers: Option<HashMap<String, String>>,
}

/// 文件内容：解析前是文本（可能为 path: 引用），解析后是字节
#[derive(Debug, Clone, PartialEq)]
pub enum FileContent {
    Text(String),
    Bytes(Vec<u8>),
}

impl FileContent {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FileContent::Text(text) => Some(text),
            FileContent::Bytes(_) => None,
        }
    }
}

impl TryFrom<serde_json::Value> for FileSpec {
    type Error = String;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        let serde_json::Value::Array(items) = value else {
            return Err("file entry must be a tuple-shaped array".to_string());
        };
        if !(2..=4).contains(&items.len()) {
            return Err(format!(
                "file entry expects 2 to 4 elements, got {}",
                items.len()
            ));
        }

        let mut items = items.into_iter();
        let filename = expect_string(items.next().unwrap(), "filename")?;
        let content = expect_string(items.next().unwrap(), "content")?;
        let content_type = items
            .next()
            .map(|v| expect_string(v, "content type"))
            .transpose()?;
        let headers = items
            .next()
            .map(|v| {
                serde_json::from_value::<HashMap<String, String>>(v)
                    .map_err(|e| format!("invalid extra headers: {}", e))
            })
            .transpose()?;

        Ok(FileSpec {
            filename,
            content: FileContent::Text(content),
            content_type,
            headers,
        })
    }
}

fn expect_string(value: serde_json::Value, slot: &str) -> Result<String, String> {
    match value {
        serde_json::Value::String(s) => Ok(s),
        other => Err(format!("file entry {} must be a string, got {}", slot, other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_parameters() {
        let params: Parameters = serde_json::from_value(serde_json::json!({
            "headers": {"Accept": "application/json"},
            "params": {"q": "rust", "tag": ["a", "b"]},
            "json": {"foo": "bar"},
            "timeout": 2.5
        }))
        .unwrap();

        assert_eq!(params.headers.get("Accept").unwrap(), "application/json");
        assert_eq!(
            params.params.get("q").unwrap(),
            &ParamValue::Single("rust".to_string())
        );
        assert_eq!(
            params.params.get("tag").unwrap(),
            &ParamValue::Many(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(params.json, Some(serde_json::json!({"foo": "bar"})));
        assert_eq!(params.timeout, Some(2.5));
        assert!(params.files.is_empty());
    }

    #[test]
    fn test_param_value_pairs() {
        let single = ParamValue::Single("x".to_string());
        assert_eq!(single.pairs("k"), vec![("k", "x")]);

        let many = ParamValue::Many(vec!["1".to_string(), "2".to_string()]);
        assert_eq!(many.pairs("k"), vec![("k", "1"), ("k", "2")]);
    }

    #[test]
    fn test_deserialize_file_tuples() {
        let two: FileSpec =
            serde_json::from_value(serde_json::json!(["report.pdf", "inline-bytes"])).unwrap();
        assert_eq!(two.filename, "report.pdf");
        assert_eq!(two.content, FileContent::Text("inline-bytes".to_string()));
        assert_eq!(two.content_type, None);
        assert_eq!(two.headers, None);

        let four: FileSpec = serde_json::from_value(serde_json::json!([
            "report.pdf",
            "path:/tmp/report.pdf",
            "application/pdf",
            {"Expires": "0"}
        ]))
        .unwrap();
        assert_eq!(four.content_type, Some("application/pdf".to_string()));
        assert_eq!(four.headers.unwrap().get("Expires").unwrap(), "0");
    }

    #[test]
    fn test_malformed_file_tuples_are_rejected() {
        assert!(serde_json::from_value::<FileSpec>(serde_json::json!(["only-one"])).is_err());
        assert!(
            serde_json::from_value::<FileSpec>(serde_json::json!(["a", "b", "c", {}, "e"]))
                .is_err()
        );
        assert!(serde_json::from_value::<FileSpec>(serde_json::json!(["a", 42])).is_err());
        assert!(serde_json::from_value::<FileSpec>(serde_json::json!("not-a-tuple")).is_err());
    }

    #[test]
    fn test_deserialize_basic_auth() {
        let auth: BasicAuth =
            serde_json::from_value(serde_json::json!(["user", "secret"])).unwrap();
        assert_eq!(auth.username(), "user");
        assert_eq!(auth.password(), "secret");
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let params: Parameters = serde_json::from_value(serde_json::json!({
            "headers": {},
            "verify": false
        }))
        .unwrap();
        assert!(params.headers.is_empty());
    }
}
