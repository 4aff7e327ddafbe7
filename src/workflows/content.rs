//! 内容水合 Worker：保证章节与内容块在会话内只加载一次
//!
//! 1. Query 水合守卫；已加载则立即结束（幂等）
//! 2. 未加载：All 并发 Invoke 两个远程资源（blocks, chapters）
//! 3. 均成功：All 提交两个加载 action，两个状态切片一起更新
//! 4. 调用失败：提交一条通知（固定文案 + error 级别 + content 作用域）后正常结束
//!
//! selector 失败不在这里吸收，直接上抛让任务以 Failed 结束。

use serde_json::Value;

use crate::core::effect::{
    all, invoke, query, submit, take_every, take_latest, Effect, Selector, TriggerPolicy,
    WorkerSpec,
};
use crate::core::error::TaskError;
use crate::core::task::{Program, Resume, Step};
use crate::http::HttpGet;
use crate::store::state::select_dehydrated;
use crate::store::{Action, ActionKind, Block, Chapter, NotificationInput};
use crate::workflows::Watcher;

/// 水合失败时展示给用户的文案
pub const FAILURE_MESSAGE: &str = "Could not load the book content. Please try again later.";

/// 水合守卫
pub const DEHYDRATED: Selector = Selector::new("is_dehydrated", select_dehydrated);

pub const WORKER_NAME: &str = "hydrate-content";

/// 远程资源路径
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentEndpoints {
    pub chapters: String,
    pub blocks: String,
}

impl Default for ContentEndpoints {
    fn default() -> Self {
        Self {
            chapters: "/api/chapters".to_string(),
            blocks: "/api/blocks".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Start,
    Guard,
    Fetch,
    Load,
    Notify,
    Done,
}

/// 水合 Worker 程序
pub struct HydrateContent {
    endpoints: ContentEndpoints,
    stage: Stage,
}

impl HydrateContent {
    pub fn new(endpoints: ContentEndpoints) -> Self {
        Self {
            endpoints,
            stage: Stage::Start,
        }
    }

    /// 并发拉取（顺序：blocks, chapters）
    pub fn fetch_effect(endpoints: &ContentEndpoints) -> Effect {
        all([
            invoke(HttpGet::NAME, vec![Value::from(endpoints.blocks.as_str())]),
            invoke(HttpGet::NAME, vec![Value::from(endpoints.chapters.as_str())]),
        ])
    }

    fn load(&mut self, fetched: Value) -> Step {
        match parse_fetched(fetched) {
            Ok((blocks, chapters)) => {
                self.stage = Stage::Load;
                Step::Yield(all([
                    submit(Action::LoadBlocks(blocks)),
                    submit(Action::LoadChapters(chapters)),
                ]))
            }
            Err(e) => self.notify(e),
        }
    }

    fn notify(&mut self, err: TaskError) -> Step {
        tracing::warn!("Content hydration failed: {}", err);
        self.stage = Stage::Notify;
        Step::Yield(submit(Action::AppendNotification(failure_notification())))
    }

    fn done(&mut self) -> Step {
        self.stage = Stage::Done;
        Step::Return(Value::Null)
    }
}

/// 水合失败通知
pub fn failure_notification() -> NotificationInput {
    NotificationInput::new(FAILURE_MESSAGE, "error", "content")
}

fn parse_fetched(fetched: Value) -> Result<(Vec<Block>, Vec<Chapter>), TaskError> {
    let malformed = |what: &str, e: serde_json::Error| TaskError::Invocation {
        function: HttpGet::NAME.to_string(),
        reason: format!("malformed {what}: {e}"),
    };
    let Value::Array(mut parts) = fetched else {
        return Err(TaskError::Program("expected two fetch results".to_string()));
    };
    if parts.len() != 2 {
        return Err(TaskError::Program("expected two fetch results".to_string()));
    }
    let chapters = parts.pop().unwrap_or_default();
    let blocks = parts.pop().unwrap_or_default();
    let blocks = serde_json::from_value(blocks).map_err(|e| malformed("blocks", e))?;
    let chapters = serde_json::from_value(chapters).map_err(|e| malformed("chapters", e))?;
    Ok((blocks, chapters))
}

impl Program for HydrateContent {
    fn name(&self) -> &str {
        WORKER_NAME
    }

    fn resume(&mut self, input: Resume) -> Step {
        match (self.stage, input) {
            (Stage::Start, Resume::Start) => {
                self.stage = Stage::Guard;
                Step::Yield(query(DEHYDRATED))
            }
            (Stage::Guard, Resume::Value(Value::Bool(true))) => {
                self.stage = Stage::Fetch;
                Step::Yield(Self::fetch_effect(&self.endpoints))
            }
            (Stage::Guard, Resume::Value(_)) => self.done(),
            (Stage::Fetch, Resume::Value(fetched)) => self.load(fetched),
            (Stage::Fetch, Resume::Error(e)) if e.is_invocation() => self.notify(e),
            (Stage::Load | Stage::Notify, Resume::Value(_)) => self.done(),
            (_, Resume::Error(e)) => Step::Raise(e),
            (stage, input) => Step::Raise(TaskError::Program(format!(
                "unexpected resume {input:?} at {stage:?}"
            ))),
        }
    }
}

/// 水合 Worker 工厂
pub fn hydrate_worker(endpoints: ContentEndpoints) -> WorkerSpec {
    WorkerSpec::new(WORKER_NAME, move || {
        Box::new(HydrateContent::new(endpoints.clone())) as Box<dyn Program>
    })
}

/// 在所有导航 action 上启动水合 Worker
pub fn content_watcher(endpoints: ContentEndpoints, policy: TriggerPolicy) -> Watcher {
    let worker = hydrate_worker(endpoints);
    let registration = match policy {
        TriggerPolicy::EveryMatch => take_every(&ActionKind::NAVIGATION, worker),
        TriggerPolicy::LatestOnly => take_latest(&ActionKind::NAVIGATION, worker),
    };
    Watcher::new("content-watcher", registration)
}
