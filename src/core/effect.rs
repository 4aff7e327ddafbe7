//! Effect 描述符：声明式、惰性的工作单元
//!
//! 任务代码只产出 Effect，从不直接执行；只有调度器知道如何执行每一种 Effect。
//! 描述符保持为纯数据（可按值比较），Worker 的行为因此可以通过比较产出序列来验证，
//! 无需 mock HTTP 或状态容器。

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::core::task::Program;
use crate::store::{Action, ActionKind, AppState};

/// Effect 描述符
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// 调用外部异步函数，结果作为产出值
    Invoke(Call),
    /// 向状态容器提交 action，立即以确认值恢复
    Submit(Action),
    /// 对当前状态求值纯 selector
    Query(Selector),
    /// 并发执行全部成员；全部成功得到有序结果，任一失败立即失败
    All(Vec<Effect>),
    /// 注册触发器（仅 Watcher 使用），永不恢复
    Trigger(Trigger),
}

impl Effect {
    pub fn label(&self) -> &'static str {
        match self {
            Effect::Invoke(_) => "invoke",
            Effect::Submit(_) => "submit",
            Effect::Query(_) => "query",
            Effect::All(_) => "all",
            Effect::Trigger(_) => "trigger",
        }
    }
}

/// 函数调用：函数名 + JSON 参数
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub function: String,
    pub args: Vec<Value>,
}

impl Call {
    pub fn new(function: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            function: function.into(),
            args,
        }
    }
}

/// selector 函数签名
pub type SelectFn = fn(&AppState) -> Result<Value, String>;

/// 具名纯 selector；按名称比较
#[derive(Clone, Copy)]
pub struct Selector {
    pub name: &'static str,
    select: SelectFn,
}

impl Selector {
    pub const fn new(name: &'static str, select: SelectFn) -> Self {
        Self { name, select }
    }

    pub fn select(&self, state: &AppState) -> Result<Value, String> {
        (self.select)(state)
    }
}

impl PartialEq for Selector {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Selector({})", self.name)
    }
}

/// 触发策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerPolicy {
    /// 每次匹配都启动新实例
    #[default]
    EveryMatch,
    /// 启动新实例前取消同一触发器尚未结束的旧实例
    LatestOnly,
}

/// 触发器注册
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    pub kinds: Vec<ActionKind>,
    pub policy: TriggerPolicy,
    pub worker: WorkerSpec,
}

impl Trigger {
    pub fn matches(&self, kind: ActionKind) -> bool {
        self.kinds.contains(&kind)
    }
}

type ProgramFactory = dyn Fn() -> Box<dyn Program> + Send + Sync;

/// 具名 Worker 工厂：每次匹配产出一个全新程序实例；按名称比较
#[derive(Clone)]
pub struct WorkerSpec {
    pub name: String,
    factory: Arc<ProgramFactory>,
}

impl WorkerSpec {
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Program> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            factory: Arc::new(factory),
        }
    }

    pub fn instantiate(&self) -> Box<dyn Program> {
        (self.factory)()
    }
}

impl PartialEq for WorkerSpec {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Debug for WorkerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WorkerSpec({})", self.name)
    }
}

pub fn invoke(function: impl Into<String>, args: Vec<Value>) -> Effect {
    Effect::Invoke(Call::new(function, args))
}

pub fn submit(action: Action) -> Effect {
    Effect::Submit(action)
}

pub fn query(selector: Selector) -> Effect {
    Effect::Query(selector)
}

pub fn all(effects: impl IntoIterator<Item = Effect>) -> Effect {
    Effect::All(effects.into_iter().collect())
}

pub fn take_every(kinds: &[ActionKind], worker: WorkerSpec) -> Effect {
    Effect::Trigger(Trigger {
        kinds: kinds.to_vec(),
        policy: TriggerPolicy::EveryMatch,
        worker,
    })
}

pub fn take_latest(kinds: &[ActionKind], worker: WorkerSpec) -> Effect {
    Effect::Trigger(Trigger {
        kinds: kinds.to_vec(),
        policy: TriggerPolicy::LatestOnly,
        worker,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::task::{Resume, Step};
    use serde_json::json;

    struct Noop;

    impl Program for Noop {
        fn name(&self) -> &str {
            "noop"
        }

        fn resume(&mut self, _input: Resume) -> Step {
            Step::Return(Value::Null)
        }
    }

    fn noop_worker(name: &str) -> WorkerSpec {
        WorkerSpec::new(name, || Box::new(Noop) as Box<dyn Program>)
    }

    #[test]
    fn test_descriptors_compare_by_value() {
        let a = all([
            invoke("http.get", vec![json!("/api/blocks")]),
            invoke("http.get", vec![json!("/api/chapters")]),
        ]);
        let b = all([
            invoke("http.get", vec![json!("/api/blocks")]),
            invoke("http.get", vec![json!("/api/chapters")]),
        ]);
        assert_eq!(a, b);
        assert_ne!(a, invoke("http.get", vec![json!("/api/blocks")]));
    }

    #[test]
    fn test_selector_equality_by_name() {
        fn one(_: &AppState) -> Result<Value, String> {
            Ok(json!(1))
        }
        fn two(_: &AppState) -> Result<Value, String> {
            Ok(json!(2))
        }
        assert_eq!(Selector::new("s", one), Selector::new("s", two));
        assert_ne!(Selector::new("s", one), Selector::new("t", one));
        assert_eq!(Selector::new("s", two).select(&AppState::default()), Ok(json!(2)));
    }

    #[test]
    fn test_trigger_matching_and_policy() {
        let effect = take_latest(&ActionKind::NAVIGATION, noop_worker("w"));
        match effect {
            Effect::Trigger(trigger) => {
                assert_eq!(trigger.policy, TriggerPolicy::LatestOnly);
                assert!(trigger.matches(ActionKind::RouteChapter));
                assert!(!trigger.matches(ActionKind::LoadBlocks));
                assert_eq!(trigger.worker, noop_worker("w"));
            }
            other => panic!("Expected Trigger, got {other:?}"),
        }
    }

    #[test]
    fn test_worker_spec_instantiates_fresh_program() {
        let spec = noop_worker("w");
        let mut program = spec.instantiate();
        assert_eq!(program.name(), "noop");
        assert!(matches!(program.resume(Resume::Start), Step::Return(Value::Null)));
    }
}
