//! 引擎错误类型
//!
//! TaskError 在任务内部流转：调度器以 `Resume::Error` 抛入挂起点，程序自行决定恢复或以
//! `Step::Raise` 继续上抛。取消不是错误，而是独立的终止状态（见 TaskStatus::Cancelled）。

use thiserror::Error;

/// 任务执行中可能出现的错误（调用失败、selector 失败、程序自身错误）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Invoke 的底层异步调用失败（网络、非 2xx、响应体格式错误）
    #[error("Invocation `{function}` failed: {reason}")]
    Invocation { function: String, reason: String },

    /// Query 的 selector 返回错误（程序缺陷，不做局部恢复）
    #[error("Selector `{selector}` failed: {reason}")]
    Selector { selector: String, reason: String },

    /// Invoke 指向未注册的函数（程序缺陷）
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// 程序在处理结果时发现的错误（如载荷形状不符）
    #[error("Program error: {0}")]
    Program(String),
}

impl TaskError {
    /// 传输 / 调用类错误，Worker 可在边界吸收；未注册的函数名属于程序缺陷，不在此列
    pub fn is_invocation(&self) -> bool {
        matches!(self, TaskError::Invocation { .. })
    }
}

/// 引擎层错误（面向调用方）
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Engine stopped")]
    Stopped,

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("HTTP client error: {0}")]
    Http(#[from] crate::http::HttpError),
}
