//! 可调用函数注册表
//!
//! Invoke 效果只携带函数名与参数（纯数据）；调度器在执行时按名查找 Function 并调用。
//! 内置 `http.get`：唯一参数为路径，结果为响应体 JSON。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::effect::Call;
use crate::core::error::TaskError;
use crate::http::client::{HttpClient, Method};

/// 函数 trait：名称 + 异步调用（args 为 JSON 列表）
#[async_trait]
pub trait Function: Send + Sync {
    /// 函数名（Invoke 效果中的 `function` 字段）
    fn name(&self) -> &str;

    async fn call(&self, args: Vec<Value>) -> Result<Value, String>;
}

/// 函数注册表：按名称存储 Arc<dyn Function>
#[derive(Default, Clone)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<dyn Function>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册内置 `http.get`
    pub fn with_http(client: Arc<dyn HttpClient>) -> Self {
        let mut registry = Self::new();
        registry.register(HttpGet::new(client));
        registry
    }

    pub fn register(&mut self, function: impl Function + 'static) {
        let name = function.name().to_string();
        self.functions.insert(name, Arc::new(function));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Function>> {
        self.functions.get(name).cloned()
    }

    /// 执行一次调用；函数不存在或调用失败都映射为 TaskError
    pub async fn call(&self, call: &Call) -> Result<Value, TaskError> {
        let function = self
            .get(&call.function)
            .ok_or_else(|| TaskError::UnknownFunction(call.function.clone()))?;
        function
            .call(call.args.clone())
            .await
            .map_err(|reason| TaskError::Invocation {
                function: call.function.clone(),
                reason,
            })
    }
}

/// `http.get`：GET 指定路径并返回响应体
pub struct HttpGet {
    client: Arc<dyn HttpClient>,
}

impl HttpGet {
    pub const NAME: &'static str = "http.get";

    pub fn new(client: Arc<dyn HttpClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Function for HttpGet {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn call(&self, args: Vec<Value>) -> Result<Value, String> {
        let path = args
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| "http.get expects a path argument".to_string())?;
        let resp = self
            .client
            .request(Method::Get, path)
            .await
            .map_err(|e| e.to_string())?;
        Ok(resp.body)
    }
}
