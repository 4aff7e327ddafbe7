//! HTTP 客户端抽象
//!
//! 所有后端实现 HttpClient：request(method, path) 返回 `{status, body}`；
//! 非 2xx、网络错误、响应体不是合法 JSON 一律返回 Err。

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// 请求方法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// 成功响应（状态码必为 2xx）
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Value,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HttpError {
    #[error("HTTP {status} for {path}")]
    Status { status: u16, path: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed response body: {0}")]
    Decode(String),
}

/// HTTP 客户端 trait
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn request(&self, method: Method, path: &str) -> Result<HttpResponse, HttpError>;
}

/// 基于 reqwest 的客户端：base_url + path，带整体超时
pub struct ReqwestClient {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("bookflow/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HttpError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn request(&self, method: Method, path: &str) -> Result<HttpResponse, HttpError> {
        let url = self.url(path);
        tracing::debug!(url = %url, method = ?method, "http request");

        let resp = self
            .client
            .request(method.into(), &url)
            .send()
            .await
            .map_err(|e| HttpError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(HttpError::Status {
                status: status.as_u16(),
                path: path.to_string(),
            });
        }

        let body = resp
            .json::<Value>()
            .await
            .map_err(|e| HttpError::Decode(e.to_string()))?;

        Ok(HttpResponse {
            status: status.as_u16(),
            body,
        })
    }
}
