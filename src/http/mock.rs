//! Mock HTTP 客户端（用于测试，无需网络）
//!
//! 按路径预置回复：成功 JSON、失败，或被闸门挂起直到测试放行；记录每次请求的路径。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::http::client::{HttpClient, HttpError, HttpResponse, Method};

/// 预置回复
#[derive(Clone)]
pub enum MockReply {
    Ok(Value),
    Fail(HttpError),
    /// 等待 gate 放行后再给出内部回复
    Gated { gate: Arc<Semaphore>, reply: Box<MockReply> },
}

/// Mock 客户端：未预置的路径返回 404
#[derive(Default)]
pub struct MockHttpClient {
    replies: Mutex<HashMap<String, MockReply>>,
    requests: Mutex<Vec<String>>,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, path: &str, reply: MockReply) -> Self {
        self.set_reply(path, reply);
        self
    }

    pub fn ok(self, path: &str, body: Value) -> Self {
        self.reply(path, MockReply::Ok(body))
    }

    pub fn fail(self, path: &str, status: u16) -> Self {
        self.reply(
            path,
            MockReply::Fail(HttpError::Status {
                status,
                path: path.to_string(),
            }),
        )
    }

    /// 预置被闸门挂起的回复，返回闸门；`gate.add_permits(n)` 放行 n 次请求
    pub fn gated(&self, path: &str, reply: MockReply) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.set_reply(
            path,
            MockReply::Gated {
                gate: Arc::clone(&gate),
                reply: Box::new(reply),
            },
        );
        gate
    }

    pub fn set_reply(&self, path: &str, reply: MockReply) {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_string(), reply);
    }

    /// 已收到的请求路径（按到达顺序）
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn request(&self, _method: Method, path: &str) -> Result<HttpResponse, HttpError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path.to_string());

        let reply = self
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned();

        let mut reply = match reply {
            Some(r) => r,
            None => {
                return Err(HttpError::Status {
                    status: 404,
                    path: path.to_string(),
                })
            }
        };

        loop {
            match reply {
                MockReply::Ok(body) => return Ok(HttpResponse { status: 200, body }),
                MockReply::Fail(err) => return Err(err),
                MockReply::Gated { gate, reply: inner } => {
                    if let Ok(permit) = gate.acquire().await {
                        permit.forget();
                    }
                    reply = *inner;
                }
            }
        }
    }
}
