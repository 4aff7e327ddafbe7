//! bookflow - 异步 Effect 协调引擎
//!
//! 模块划分：
//! - **app**: 按配置装配状态容器、HTTP 客户端与引擎
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: Effect 描述符、任务模型、调度器、引擎入口与优雅关闭
//! - **http**: HTTP 客户端抽象（reqwest / Mock）与 Invoke 函数注册表
//! - **observability**: tracing 初始化
//! - **store**: Action、应用状态、reducer、通知切片与状态容器
//! - **workflows**: 根 Watcher 与 Worker（通知清理、内容水合）

pub mod app;
pub mod config;
pub mod core;
pub mod http;
pub mod observability;
pub mod store;
pub mod workflows;

pub use crate::core::{Effect, Engine, EngineHandle, Program, TaskId};
pub use crate::store::{Action, AppState, StateContainer, Store};
