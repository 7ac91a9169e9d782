use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::{debug, error};

use crate::command::{Command, merge, resolve_files};
use crate::expr::{self, Context, Value};
use crate::http::{Client, Method, Parameters, Transport};
use crate::runner::types::Outcome;
use crate::session::Session;
use crate::{Result, RuplayError};

/// 认证解析策略（可插拔扩展点，默认 no-op）
pub trait AuthStrategy: Send + Sync {
    fn resolve(&self, parameters: &mut Parameters) -> Result<()>;
}

/// Cookie 解析策略（可插拔扩展点，默认 no-op）
pub trait CookieStrategy: Send + Sync {
    fn resolve(&self, parameters: &mut Parameters) -> Result<()>;
}

pub struct NoAuth;

impl AuthStrategy for NoAuth {
    fn resolve(&self, _parameters: &mut Parameters) -> Result<()> {
        Ok(())
    }
}

pub struct NoCookies;

impl CookieStrategy for NoCookies {
    fn resolve(&self, _parameters: &mut Parameters) -> Result<()> {
        Ok(())
    }
}

/// 命令执行管线
///
/// 步骤严格有序: 默认载荷合并 → 条件 → 文件解析 → 认证/Cookie →
/// 派发 → 变量捕获 → 断言。条件为假跳过其后所有步骤（非错误）；
/// 断言失败在捕获生效之后抛出；其余失败包装为 Execution 错误，
/// 连同合并后的有效命令记入日志后向上传播。
pub struct Provider<T: Transport = Client> {
    transport: T,
    auth: Box<dyn AuthStrategy>,
    cookies: Box<dyn CookieStrategy>,
}

impl Provider<Client> {
    pub fn new() -> Self {
        Self::with_transport(Client::new())
    }
}

impl Default for Provider<Client> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> Provider<T> {
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport,
            auth: Box::new(NoAuth),
            cookies: Box::new(NoCookies),
        }
    }

    pub fn with_auth(mut self, auth: impl AuthStrategy + 'static) -> Self {
        self.auth = Box::new(auth);
        self
    }

    pub fn with_cookies(mut self, cookies: impl CookieStrategy + 'static) -> Self {
        self.cookies = Box::new(cookies);
        self
    }

    /// 通用入口：动词取自命令映射自身的 method 字段
    pub async fn run(&self, session: &mut Session, command: JsonValue) -> Result<Outcome> {
        self.pipeline(session, None, command).await
    }

    /// 按动词入口：动词固定，映射原样透传
    pub async fn execute(
        &self,
        session: &mut Session,
        method: Method,
        command: JsonValue,
    ) -> Result<Outcome> {
        self.pipeline(session, Some(method), command).await
    }

    pub async fn options(&self, session: &mut Session, command: JsonValue) -> Result<Outcome> {
        self.execute(session, Method::Options, command).await
    }

    pub async fn head(&self, session: &mut Session, command: JsonValue) -> Result<Outcome> {
        self.execute(session, Method::Head, command).await
    }

    pub async fn get(&self, session: &mut Session, command: JsonValue) -> Result<Outcome> {
        self.execute(session, Method::Get, command).await
    }

    pub async fn post(&self, session: &mut Session, command: JsonValue) -> Result<Outcome> {
        self.execute(session, Method::Post, command).await
    }

    pub async fn put(&self, session: &mut Session, command: JsonValue) -> Result<Outcome> {
        self.execute(session, Method::Put, command).await
    }

    pub async fn patch(&self, session: &mut Session, command: JsonValue) -> Result<Outcome> {
        self.execute(session, Method::Patch, command).await
    }

    pub async fn delete(&self, session: &mut Session, command: JsonValue) -> Result<Outcome> {
        self.execute(session, Method::Delete, command).await
    }

    async fn pipeline(
        &self,
        session: &mut Session,
        verb: Option<Method>,
        command: JsonValue,
    ) -> Result<Outcome> {
        // 1. 合并默认载荷（占位符替换在序列化形式上进行）
        let defaults = session
            .effective_defaults()
            .map_err(|e| abort("merge", &command, e))?;
        let effective = match defaults {
            Some(defaults) => merge(&defaults, &command),
            None => command,
        };

        let parsed =
            Command::from_value(&effective).map_err(|e| abort("parse", &effective, e))?;
        let method = match verb {
            Some(method) => method,
            None => parsed
                .method_verb()
                .map_err(|e| abort("parse", &effective, e))?,
        };

        // 2. 前置条件；只读变量快照
        if let Some(condition) = &parsed.condition {
            let ctx = Context::new().bind("variables", session.variables().to_value());
            let proceed = expr::evaluate_boolean(condition, &ctx)
                .map_err(|e| abort("condition", &effective, e.into()))?;
            if !proceed {
                debug!(command = %effective, "condition is false, skipping command");
                return Ok(Outcome::Skipped);
            }
        }

        // 3. 文件解析
        let mut parameters = parsed.parameters.clone();
        resolve_files(&mut parameters).map_err(|e| abort("resolve_files", &effective, e))?;

        // 4. 认证与 Cookie 策略
        self.auth
            .resolve(&mut parameters)
            .map_err(|e| abort("auth", &effective, e))?;
        self.cookies
            .resolve(&mut parameters)
            .map_err(|e| abort("cookies", &effective, e))?;

        // 5. 派发；传输错误不重试
        let response = self
            .transport
            .request(method, &parsed.url, &parameters)
            .await
            .map_err(|e| abort("dispatch", &effective, e))?;
        let response = Arc::new(response);

        // 6. 变量捕获（先于断言生效）
        if let (Some(name), Some(expression)) = (&parsed.variable, &parsed.variable_expression) {
            let ctx = Context::new().bind("response", Value::Response(response.clone()));
            let value = expr::evaluate_value(expression, &ctx)
                .map_err(|e| abort("capture", &effective, e.into()))?;
            let stored = value
                .to_json()
                .map_err(|e| abort("capture", &effective, e.into()))?;
            session.variables_mut().set(name.clone(), stored);
        }

        // 7. 断言
        if let Some(assertion) = &parsed.assertion {
            let ctx = Context::new()
                .bind("response", Value::Response(response.clone()))
                .bind("variables", session.variables().to_value());
            let ok = expr::evaluate_boolean(assertion, &ctx)
                .map_err(|e| abort("assert", &effective, e.into()))?;
            if !ok {
                error!(command = %effective, assertion = %assertion, "assertion failed");
                return Err(RuplayError::AssertionFailed {
                    expression: assertion.clone(),
                });
            }
        }

        Ok(Outcome::Executed { response })
    }
}

/// 记录失败步骤与有效命令，包装为执行错误
fn abort(step: &'static str, effective: &JsonValue, error: RuplayError) -> RuplayError {
    error!(step = step, command = %effective, error = %error, "command step failed");
    RuplayError::Execution {
        step,
        source: Box::new(error),
    }
}
