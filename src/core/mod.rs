//! 核心调度层：Effect 描述符、任务模型、调度器（解释器）、引擎入口与关闭

pub mod effect;
pub mod engine;
pub mod error;
pub mod scheduler;
pub mod shutdown;
pub mod task;

pub use effect::{
    all, invoke, query, submit, take_every, take_latest, Call, Effect, Selector, Trigger,
    TriggerPolicy, WorkerSpec,
};
pub use engine::{Command, Engine, EngineHandle};
pub use error::{EngineError, TaskError};
pub use scheduler::{Completion, Scheduler};
pub use shutdown::{ShutdownManager, ShutdownReason};
pub use task::{Program, Resume, Step, TaskId, TaskStatus, TaskSummary};
