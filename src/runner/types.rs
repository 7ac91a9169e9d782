use std::sync::Arc;

use crate::http::Response;

/// 单条命令的执行结局
#[derive(Debug, Clone)]
pub enum Outcome {
    /// 命令已派发并走完管线
    Executed { response: Arc<Response> },

    /// 前置条件为假，命令被跳过（非错误；无派发、无变量变更）
    Skipped,
}

impl Outcome {
    pub fn response(&self) -> Option<&Response> {
        match self {
            Outcome::Executed { response } => Some(response),
            Outcome::Skipped => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped)
    }
}
