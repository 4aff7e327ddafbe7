//! 任务模型：可挂起的执行单元
//!
//! Program 是显式状态机：每次 `resume` 接收上一个 Effect 的结果（或错误），
//! 返回下一个 Effect、最终返回值或抛出的错误。调度器驱动它，程序从不自己执行 Effect。

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use serde_json::Value;

use crate::core::effect::Effect;
use crate::core::error::TaskError;

/// 任务 ID（进程内单调递增）
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord, Serialize)]
pub struct TaskId(u64);

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskId {
    pub fn new() -> Self {
        Self(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskStatus {
    /// 已创建，尚未第一次运行
    Pending,
    /// 正在执行程序代码
    Running,
    /// 挂起在某个 Effect 上
    Suspended,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

/// 恢复输入
#[derive(Debug, Clone, PartialEq)]
pub enum Resume {
    /// 第一次运行
    Start,
    Value(Value),
    /// 在挂起点抛出
    Error(TaskError),
}

impl From<Result<Value, TaskError>> for Resume {
    fn from(result: Result<Value, TaskError>) -> Self {
        match result {
            Ok(v) => Resume::Value(v),
            Err(e) => Resume::Error(e),
        }
    }
}

/// 程序单步的产出
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Yield(Effect),
    Return(Value),
    Raise(TaskError),
}

/// 可挂起程序 trait：Watcher 与 Worker 都实现它
pub trait Program: Send {
    /// 程序名（用于日志与任务列表）
    fn name(&self) -> &str;

    /// 以上一步结果恢复，返回下一步
    fn resume(&mut self, input: Resume) -> Step;
}

/// All 的子任务程序：产出一个成员 Effect，并原样返回其结果
pub(crate) struct SingleEffect {
    effect: Option<Effect>,
}

impl SingleEffect {
    pub(crate) fn new(effect: Effect) -> Self {
        Self {
            effect: Some(effect),
        }
    }
}

impl Program for SingleEffect {
    fn name(&self) -> &str {
        "all-member"
    }

    fn resume(&mut self, input: Resume) -> Step {
        match (input, self.effect.take()) {
            (Resume::Start, Some(effect)) => Step::Yield(effect),
            (Resume::Value(v), _) => Step::Return(v),
            (Resume::Error(e), _) => Step::Raise(e),
            (Resume::Start, None) => Step::Raise(TaskError::Program(
                "all-member started twice".to_string(),
            )),
        }
    }
}

/// 任务摘要（供 EngineHandle 查询）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskSummary {
    pub id: TaskId,
    pub name: String,
    pub status: TaskStatus,
    pub parent: Option<TaskId>,
    /// 当前挂起的 Effect 类型
    pub pending: Option<&'static str>,
}
