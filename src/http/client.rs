use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart;

use crate::http::request::{FileContent, Parameters};
use crate::http::response::Response;
use crate::http::types::Method;
use crate::{Result, RuplayError};

/// HTTP 传输协作者
///
/// 管线通过该接口派发请求；默认实现为 reqwest 客户端。
/// 传输层错误原样向上传播，本层不做重试。
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, method: Method, url: &str, parameters: &Parameters)
    -> Result<Response>;
}

#[derive(Clone)]
pub struct Client {
    inner: reqwest::Client,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    pub fn new() -> Self {
        Self {
            inner: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    async fn dispatch(
        &self,
        method: Method,
        url: &str,
        parameters: &Parameters,
    ) -> Result<Response> {
        let mut req = self.inner.request(method.into(), url);

        for (key, value) in &parameters.headers {
            req = req.header(key.as_str(), value.as_str());
        }

        // 列表值展开为重复的查询键
        let pairs: Vec<(&str, &str)> = parameters
            .params
            .iter()
            .flat_map(|(key, value)| value.pairs(key))
            .collect();
        if !pairs.is_empty() {
            req = req.query(&pairs);
        }

        if let Some(json) = &parameters.json {
            req = req.json(json);
        }
        if let Some(data) = &parameters.data {
            req = req.body(data.clone());
        }

        if !parameters.files.is_empty() {
            req = req.multipart(build_multipart(parameters)?);
        }

        if let Some(timeout) = parameters.timeout {
            if !timeout.is_finite() || timeout < 0.0 {
                return Err(RuplayError::Configuration(format!(
                    "Invalid timeout: {}",
                    timeout
                )));
            }
            req = req.timeout(Duration::from_secs_f64(timeout));
        }

        if let Some(auth) = &parameters.auth {
            req = req.basic_auth(auth.username(), Some(auth.password()));
        }

        let start = std::time::Instant::now();
        let response = req.send().await?;
        let duration = start.elapsed();

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await?;

        Response::new(status, headers, body, duration)
    }
}

fn build_multipart(parameters: &Parameters) -> Result<multipart::Form> {
    let mut form = multipart::Form::new();
    for (field, spec) in &parameters.files {
        let mut part = match &spec.content {
            FileContent::Text(text) => multipart::Part::text(text.clone()),
            FileContent::Bytes(bytes) => multipart::Part::bytes(bytes.clone()),
        }
        .file_name(spec.filename.clone());

        if let Some(content_type) = &spec.content_type {
            part = part.mime_str(content_type)?;
        }
        if let Some(extra) = &spec.headers {
            part = part.headers(header_map(extra)?);
        }
        form = form.part(field.clone(), part);
    }
    Ok(form)
}

fn header_map(entries: &std::collections::HashMap<String, String>) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    for (key, value) in entries {
        let name: HeaderName = key
            .parse()
            .map_err(|_| RuplayError::Configuration(format!("Invalid header name: {}", key)))?;
        let value: HeaderValue = value
            .parse()
            .map_err(|_| RuplayError::Configuration(format!("Invalid header value: {}", value)))?;
        map.insert(name, value);
    }
    Ok(map)
}

#[async_trait]
impl Transport for Client {
    async fn request(
        &self,
        method: Method,
        url: &str,
        parameters: &Parameters,
    ) -> Result<Response> {
        self.dispatch(method, url, parameters).await
    }
}
