use thiserror::Error;

use crate::expr::EvalError;

#[derive(Error, Debug)]
pub enum RuplayError {
    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("表达式求值失败: {0}")]
    Evaluation(#[from] EvalError),

    #[error("文件解析失败 '{path}': {source}")]
    FileResolution {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP 传输失败: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("断言失败: {expression}")]
    AssertionFailed { expression: String },

    #[error("命令执行失败于 {step}: {source}")]
    Execution {
        step: &'static str,
        #[source]
        source: Box<RuplayError>,
    },

    #[error("JSON 解析错误: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("无效的 URL: {0}")]
    UrlParseError(#[from] url::ParseError),
}

impl RuplayError {
    /// 判断是否为断言失败（与其它执行错误区分开）
    pub fn is_assertion_failure(&self) -> bool {
        matches!(self, RuplayError::AssertionFailed { .. })
    }
}

/// Result type for ruplay crate
pub type Result<T> = std::result::Result<T, RuplayError>;
