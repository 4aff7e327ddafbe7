//! 业务工作流：根 Watcher 与它们启动的 Worker
//!
//! - **notifications**: 导航即清空通知
//! - **content**: 导航时按需水合章节与内容块
//!
//! 根 Watcher 的注册顺序即同一 action 上 Worker 的启动顺序：通知清理在前，
//! 保证水合失败的通知不会被同一次导航清掉。

pub mod content;
pub mod notifications;

use serde_json::Value;

use crate::core::effect::{Effect, TriggerPolicy};
use crate::core::error::TaskError;
use crate::core::task::{Program, Resume, Step};

pub use content::{content_watcher, hydrate_worker, ContentEndpoints, HydrateContent};
pub use notifications::{clear_worker, notification_watcher, ClearNotifications};

/// 只产出一次注册 Effect（通常是 Trigger）的长生命周期程序
pub struct Watcher {
    name: String,
    registration: Option<Effect>,
}

impl Watcher {
    pub fn new(name: impl Into<String>, registration: Effect) -> Self {
        Self {
            name: name.into(),
            registration: Some(registration),
        }
    }
}

impl Program for Watcher {
    fn name(&self) -> &str {
        &self.name
    }

    fn resume(&mut self, input: Resume) -> Step {
        match (input, self.registration.take()) {
            (Resume::Start, Some(effect)) => Step::Yield(effect),
            (Resume::Error(e), _) => Step::Raise(e),
            (Resume::Value(_), _) => Step::Return(Value::Null),
            (Resume::Start, None) => Step::Raise(TaskError::Program(format!(
                "watcher {} started twice",
                self.name
            ))),
        }
    }
}

/// 应用的根 Watcher 列表（顺序敏感）
pub fn root_watchers(endpoints: ContentEndpoints, policy: TriggerPolicy) -> Vec<Box<dyn Program>> {
    vec![
        Box::new(notification_watcher()),
        Box::new(content_watcher(endpoints, policy)),
    ]
}
