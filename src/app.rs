//! 应用装配
//!
//! 按配置构建状态容器、HTTP 客户端与函数注册表，并用根 Watcher 启动引擎。
//! 必须在 tokio 运行时内调用（调度循环以后台任务运行）。

use std::sync::Arc;

use crate::config::AppConfig;
use crate::core::{Engine, EngineError, EngineHandle};
use crate::http::{FunctionRegistry, HttpClient, ReqwestClient};
use crate::store::Store;
use crate::workflows::root_watchers;

/// 运行中的应用：状态容器 + 引擎句柄
pub struct App {
    pub store: Arc<Store>,
    pub engine: EngineHandle,
}

/// 用给定 HTTP 客户端启动（测试时传 MockHttpClient）
pub fn start_with_client(cfg: &AppConfig, client: Arc<dyn HttpClient>) -> App {
    let store = Arc::new(Store::default());
    let functions = FunctionRegistry::with_http(client);
    let watchers = root_watchers(cfg.api.endpoints(), cfg.content.policy.into());
    let engine = Engine::start(
        store.clone(),
        functions,
        cfg.scheduler.history_limit,
        watchers,
    );
    tracing::info!(
        base_url = %cfg.api.base_url,
        policy = ?cfg.content.policy,
        "bookflow started"
    );
    App { store, engine }
}

/// 用 reqwest 客户端启动
pub fn start(cfg: &AppConfig) -> Result<App, EngineError> {
    let client = ReqwestClient::new(&cfg.api.base_url, cfg.api.timeout_secs)?;
    Ok(start_with_client(cfg, Arc::new(client)))
}
