//! 通知清理：每个导航 action 都清空通知列表

use serde_json::Value;

use crate::core::effect::{submit, take_every, WorkerSpec};
use crate::core::error::TaskError;
use crate::core::task::{Program, Resume, Step};
use crate::store::{Action, ActionKind};
use crate::workflows::Watcher;

pub const WORKER_NAME: &str = "clear-notifications";

/// 清空通知的 Worker
#[derive(Default)]
pub struct ClearNotifications {
    submitted: bool,
}

impl Program for ClearNotifications {
    fn name(&self) -> &str {
        WORKER_NAME
    }

    fn resume(&mut self, input: Resume) -> Step {
        match input {
            Resume::Start if !self.submitted => {
                self.submitted = true;
                Step::Yield(submit(Action::ClearNotifications))
            }
            Resume::Value(_) => Step::Return(Value::Null),
            Resume::Error(e) => Step::Raise(e),
            Resume::Start => Step::Raise(TaskError::Program("restarted".to_string())),
        }
    }
}

pub fn clear_worker() -> WorkerSpec {
    WorkerSpec::new(WORKER_NAME, || {
        Box::new(ClearNotifications::default()) as Box<dyn Program>
    })
}

/// 导航即清空（EveryMatch）
pub fn notification_watcher() -> Watcher {
    Watcher::new(
        "notification-watcher",
        take_every(&ActionKind::NAVIGATION, clear_worker()),
    )
}
