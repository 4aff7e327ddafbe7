//! 调度器：Effect 解释器
//!
//! 单线程协作式：所有任务记录归调度器独占，程序只在产出 Effect 时让出，永远不会并行执行。
//! - Submit / Query 在当前步内同步完成并立即恢复
//! - Invoke 交给 tokio 运行时执行，完成结果经通道逐个送回
//! - All 为每个成员派生子任务；全部成功按成员顺序恢复父任务，任一失败立即取消其余兄弟并抛入父任务
//! - Trigger 注册持久监听器，任务永久挂起在该 Effect 上
//!
//! 就绪任务从 FIFO 队列中逐个推进，从不重入。

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::effect::{Effect, Trigger, TriggerPolicy};
use crate::core::engine::Command;
use crate::core::error::TaskError;
use crate::core::task::{Program, Resume, SingleEffect, Step, TaskId, TaskStatus, TaskSummary};
use crate::http::FunctionRegistry;
use crate::store::{Action, StateContainer};

/// Invoke 的完成结果
#[derive(Debug)]
pub struct Completion {
    pub task: TaskId,
    pub result: Result<Value, TaskError>,
}

/// All 的汇合状态
struct Join {
    results: Vec<Option<Value>>,
    remaining: usize,
}

struct TaskRecord {
    name: String,
    program: Box<dyn Program>,
    status: TaskStatus,
    pending: Option<Effect>,
    /// 作为 All 成员时：(父任务, 成员序号)
    member_of: Option<(TaskId, usize)>,
    /// 由哪个 Watcher 的触发器启动
    origin: Option<TaskId>,
    children: Vec<TaskId>,
    join: Option<Join>,
}

impl TaskRecord {
    fn summary(&self, id: TaskId) -> TaskSummary {
        TaskSummary {
            id,
            name: self.name.clone(),
            status: self.status,
            parent: self.member_of.map(|(parent, _)| parent).or(self.origin),
            pending: self.pending.as_ref().map(Effect::label),
        }
    }
}

struct Listener {
    key: u64,
    owner: TaskId,
    trigger: Trigger,
    /// LatestOnly：最近一次启动的实例
    latest: Option<TaskId>,
}

/// 调度器
pub struct Scheduler {
    store: Arc<dyn StateContainer>,
    functions: Arc<FunctionRegistry>,
    tasks: HashMap<TaskId, TaskRecord>,
    listeners: Vec<Listener>,
    next_listener: u64,
    ready: VecDeque<(TaskId, Resume)>,
    actions: mpsc::UnboundedReceiver<Action>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    /// 已派发、尚未送回的 Invoke 数量
    in_flight: usize,
    history: VecDeque<TaskSummary>,
    history_limit: usize,
}

impl Scheduler {
    /// 创建调度器并订阅状态容器的 action 流
    pub fn new(
        store: Arc<dyn StateContainer>,
        functions: Arc<FunctionRegistry>,
        history_limit: usize,
    ) -> Self {
        let actions = store.subscribe();
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            store,
            functions,
            tasks: HashMap::new(),
            listeners: Vec::new(),
            next_listener: 0,
            ready: VecDeque::new(),
            actions,
            completions_tx,
            completions_rx,
            in_flight: 0,
            history: VecDeque::new(),
            history_limit,
        }
    }

    /// 启动一个根任务并推进到第一次阻塞
    pub fn start(&mut self, program: Box<dyn Program>) -> TaskId {
        let id = self.spawn(program, None, None);
        self.drain();
        id
    }

    /// 查询任务状态（存活任务或最近结束的任务）
    pub fn status(&self, id: TaskId) -> Option<TaskStatus> {
        self.tasks.get(&id).map(|r| r.status).or_else(|| {
            self.history
                .iter()
                .rev()
                .find(|s| s.id == id)
                .map(|s| s.status)
        })
    }

    /// 存活任务 + 最近结束的任务，按 id 排序
    pub fn summaries(&self) -> Vec<TaskSummary> {
        let mut out: Vec<TaskSummary> = self
            .tasks
            .iter()
            .map(|(id, record)| record.summary(*id))
            .chain(self.history.iter().cloned())
            .collect();
        out.sort_by_key(|s| s.id);
        out
    }

    /// 存活任务中名为 `name` 的 id
    pub fn live_by_name(&self, name: &str) -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = self
            .tasks
            .iter()
            .filter(|(_, r)| r.name == name)
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// 处理已排队的 action 与就绪任务，不等待任何 Invoke
    pub fn drain(&mut self) {
        loop {
            self.run_ready();
            match self.actions.try_recv() {
                Ok(action) => self.handle_action(action),
                Err(_) => break,
            }
        }
    }

    /// 等待并处理一个 Invoke 完成结果，随后 drain
    pub async fn next_completion(&mut self) -> bool {
        if self.in_flight == 0 {
            return false;
        }
        match self.completions_rx.recv().await {
            Some(completion) => {
                self.handle_completion(completion);
                self.drain();
                true
            }
            None => false,
        }
    }

    /// 一直推进，直到没有排队的 action、就绪任务和进行中的 Invoke
    pub async fn run_until_idle(&mut self) {
        self.drain();
        while self.next_completion().await {}
    }

    /// 主循环：直到 shutdown 被触发或命令通道关闭（EngineHandle 被丢弃）
    pub async fn run(
        mut self,
        shutdown: CancellationToken,
        mut commands: mpsc::UnboundedReceiver<Command>,
    ) {
        self.drain();
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                cmd = commands.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => {
                        tracing::info!("Engine handle dropped, stopping scheduler");
                        break;
                    }
                },
                Some(action) = self.actions.recv() => self.handle_action(action),
                Some(completion) = self.completions_rx.recv() => self.handle_completion(completion),
                else => break,
            }
            self.drain();
        }

        let live: Vec<TaskId> = self.tasks.keys().copied().collect();
        for id in live {
            self.cancel(id);
        }
        tracing::info!("Scheduler stopped");
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Cancel(id, reply) => {
                let _ = reply.send(self.cancel(id));
            }
            Command::Tasks(reply) => {
                let _ = reply.send(self.summaries());
            }
            Command::Start(program, reply) => {
                let id = self.spawn(program, None, None);
                let _ = reply.send(id);
            }
        }
    }

    /// 取消任务：递归取消其 All 子任务并注销其触发器；从不恢复被取消的程序。
    /// 已提交的 Submit 不回滚。
    pub fn cancel(&mut self, id: TaskId) -> bool {
        let Some(record) = self.tasks.remove(&id) else {
            return false;
        };
        tracing::info!(task = %id, name = %record.name, "task cancelled");

        self.listeners.retain(|l| l.owner != id);
        for child in &record.children {
            self.cancel(*child);
        }

        let mut summary = record.summary(id);
        summary.status = TaskStatus::Cancelled;
        summary.pending = None;
        self.remember(summary);

        // 被直接取消的 All 成员：父任务无法再汇合，一并取消
        if let Some((parent, _)) = record.member_of {
            let waiting = self
                .tasks
                .get(&parent)
                .map(|p| p.join.is_some())
                .unwrap_or(false);
            if waiting {
                self.cancel(parent);
            }
        }
        true
    }

    fn spawn(
        &mut self,
        program: Box<dyn Program>,
        member_of: Option<(TaskId, usize)>,
        origin: Option<TaskId>,
    ) -> TaskId {
        let id = TaskId::new();
        let name = program.name().to_string();
        tracing::debug!(task = %id, name = %name, "task spawned");
        self.tasks.insert(
            id,
            TaskRecord {
                name,
                program,
                status: TaskStatus::Pending,
                pending: None,
                member_of,
                origin,
                children: Vec::new(),
                join: None,
            },
        );
        self.ready.push_back((id, Resume::Start));
        id
    }

    fn run_ready(&mut self) {
        while let Some((id, input)) = self.ready.pop_front() {
            self.step(id, input);
        }
    }

    fn step(&mut self, id: TaskId, input: Resume) {
        let mut input = input;
        loop {
            let Some(record) = self.tasks.get_mut(&id) else {
                return;
            };
            record.status = TaskStatus::Running;
            record.pending = None;

            match record.program.resume(input) {
                Step::Yield(effect) => match self.dispatch(id, effect) {
                    Some(result) => input = result.into(),
                    None => return,
                },
                Step::Return(value) => {
                    self.finish(id, Ok(value));
                    return;
                }
                Step::Raise(err) => {
                    self.finish(id, Err(err));
                    return;
                }
            }
        }
    }

    /// 执行一个 Effect；同步完成返回 Some(结果)，挂起返回 None
    fn dispatch(&mut self, id: TaskId, effect: Effect) -> Option<Result<Value, TaskError>> {
        match effect {
            Effect::Submit(action) => {
                self.store.submit(action);
                Some(Ok(Value::Null))
            }
            Effect::Query(selector) => {
                let state = self.store.read();
                Some(selector.select(&state).map_err(|reason| TaskError::Selector {
                    selector: selector.name.to_string(),
                    reason,
                }))
            }
            Effect::Invoke(call) => {
                self.suspend(id, Effect::Invoke(call.clone()));
                let functions = Arc::clone(&self.functions);
                let tx = self.completions_tx.clone();
                self.in_flight += 1;
                tokio::spawn(async move {
                    let result = functions.call(&call).await;
                    let _ = tx.send(Completion { task: id, result });
                });
                None
            }
            Effect::All(members) => {
                if members.is_empty() {
                    return Some(Ok(Value::Array(Vec::new())));
                }
                self.suspend(id, Effect::All(members.clone()));
                let count = members.len();
                let children: Vec<TaskId> = members
                    .into_iter()
                    .enumerate()
                    .map(|(index, member)| {
                        self.spawn(Box::new(SingleEffect::new(member)), Some((id, index)), None)
                    })
                    .collect();
                if let Some(record) = self.tasks.get_mut(&id) {
                    record.children = children;
                    record.join = Some(Join {
                        results: vec![None; count],
                        remaining: count,
                    });
                }
                None
            }
            Effect::Trigger(trigger) => {
                self.suspend(id, Effect::Trigger(trigger.clone()));
                let key = self.next_listener;
                self.next_listener += 1;
                tracing::debug!(
                    task = %id,
                    worker = %trigger.worker.name,
                    kinds = ?trigger.kinds,
                    policy = ?trigger.policy,
                    "trigger registered"
                );
                self.listeners.push(Listener {
                    key,
                    owner: id,
                    trigger,
                    latest: None,
                });
                None
            }
        }
    }

    fn suspend(&mut self, id: TaskId, effect: Effect) {
        if let Some(record) = self.tasks.get_mut(&id) {
            record.status = TaskStatus::Suspended;
            record.pending = Some(effect);
        }
    }

    fn finish(&mut self, id: TaskId, outcome: Result<Value, TaskError>) {
        let Some(mut record) = self.tasks.remove(&id) else {
            return;
        };
        record.status = if outcome.is_ok() {
            TaskStatus::Completed
        } else {
            TaskStatus::Failed
        };
        record.pending = None;

        match (&outcome, record.member_of) {
            (Ok(_), _) => tracing::debug!(task = %id, name = %record.name, "task completed"),
            (Err(e), Some(_)) => {
                tracing::debug!(task = %id, name = %record.name, "all member failed: {}", e)
            }
            (Err(e), None) => {
                tracing::error!(task = %id, name = %record.name, "task failed: {}", e)
            }
        }
        self.remember(record.summary(id));

        if let Some((parent, index)) = record.member_of {
            self.member_finished(parent, index, outcome);
        }
    }

    fn member_finished(&mut self, parent: TaskId, index: usize, outcome: Result<Value, TaskError>) {
        let Some(record) = self.tasks.get_mut(&parent) else {
            return;
        };
        let Some(join) = record.join.as_mut() else {
            return;
        };

        match outcome {
            Ok(value) => {
                join.results[index] = Some(value);
                join.remaining -= 1;
                if join.remaining == 0 {
                    let results = join
                        .results
                        .drain(..)
                        .map(|v| v.unwrap_or(Value::Null))
                        .collect();
                    record.join = None;
                    record.children.clear();
                    self.ready.push_back((parent, Resume::Value(Value::Array(results))));
                }
            }
            Err(err) => {
                record.join = None;
                let siblings = std::mem::take(&mut record.children);
                for sibling in siblings {
                    self.cancel(sibling);
                }
                self.ready.push_back((parent, Resume::Error(err)));
            }
        }
    }

    /// 将 action 与已注册触发器匹配（按注册顺序），为每个匹配启动一个 Worker
    pub fn handle_action(&mut self, action: Action) {
        let kind = action.kind();
        let matched: Vec<u64> = self
            .listeners
            .iter()
            .filter(|l| l.trigger.matches(kind))
            .map(|l| l.key)
            .collect();

        for key in matched {
            let Some(listener) = self.listeners.iter().find(|l| l.key == key) else {
                continue;
            };
            let owner = listener.owner;
            let worker = listener.trigger.worker.clone();
            let previous = match listener.trigger.policy {
                TriggerPolicy::LatestOnly => listener.latest,
                TriggerPolicy::EveryMatch => None,
            };

            if let Some(prev) = previous {
                if self.tasks.contains_key(&prev) {
                    tracing::info!(task = %prev, worker = %worker.name, "superseded by newer trigger");
                    self.cancel(prev);
                }
            }

            let id = self.spawn(worker.instantiate(), None, Some(owner));
            tracing::debug!(task = %id, worker = %worker.name, kind = ?kind, "worker started");
            if let Some(listener) = self.listeners.iter_mut().find(|l| l.key == key) {
                listener.latest = Some(id);
            }
        }
    }

    /// 送回 Invoke 结果；任务已不存在或不再挂起在 Invoke 上时丢弃
    pub fn handle_completion(&mut self, completion: Completion) {
        self.in_flight = self.in_flight.saturating_sub(1);
        let waiting = self
            .tasks
            .get(&completion.task)
            .map(|r| r.status == TaskStatus::Suspended && matches!(r.pending, Some(Effect::Invoke(_))))
            .unwrap_or(false);
        if !waiting {
            tracing::debug!(task = %completion.task, "discarding completion of abandoned invocation");
            return;
        }
        self.ready.push_back((completion.task, completion.result.into()));
    }

    fn remember(&mut self, summary: TaskSummary) {
        if self.history_limit == 0 {
            return;
        }
        self.history.push_back(summary);
        while self.history.len() > self.history_limit {
            self.history.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::effect::{all, invoke, query, submit, take_every, take_latest, Selector, WorkerSpec};
    use crate::http::{HttpGet, MockHttpClient, MockReply};
    use crate::store::{ActionKind, AppState, Store};
    use serde_json::json;
    use std::sync::Mutex;

    /// 按脚本依次产出 Effect，并记录每次收到的恢复输入
    struct Script {
        name: &'static str,
        effects: VecDeque<Effect>,
        seen: Arc<Mutex<Vec<Resume>>>,
    }

    impl Script {
        fn new(name: &'static str, effects: Vec<Effect>) -> (Self, Arc<Mutex<Vec<Resume>>>) {
            let seen = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    name,
                    effects: effects.into(),
                    seen: Arc::clone(&seen),
                },
                seen,
            )
        }
    }

    impl Program for Script {
        fn name(&self) -> &str {
            self.name
        }

        fn resume(&mut self, input: Resume) -> Step {
            self.seen.lock().unwrap().push(input.clone());
            if let Resume::Error(e) = input {
                return Step::Raise(e);
            }
            match self.effects.pop_front() {
                Some(effect) => Step::Yield(effect),
                None => Step::Return(Value::Null),
            }
        }
    }

    fn scheduler_with(client: MockHttpClient, state: AppState) -> (Scheduler, Arc<Store>) {
        let store = Arc::new(Store::new(state));
        let functions = Arc::new(FunctionRegistry::with_http(Arc::new(client)));
        let scheduler = Scheduler::new(store.clone(), functions, 64);
        (scheduler, store)
    }

    fn get(path: &str) -> Effect {
        invoke(HttpGet::NAME, vec![json!(path)])
    }

    #[tokio::test]
    async fn test_submit_and_query_resolve_inline_in_order() {
        fn route_is_home(state: &AppState) -> Result<Value, String> {
            Ok(json!(state.route == Some(crate::store::Route::Home)))
        }
        let (mut scheduler, _store) = scheduler_with(MockHttpClient::new(), AppState::default());
        let (program, seen) = Script::new(
            "inline",
            vec![submit(Action::RouteHome), query(Selector::new("route_is_home", route_is_home))],
        );
        let id = scheduler.start(Box::new(program));

        assert_eq!(scheduler.status(id), Some(TaskStatus::Completed));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![Resume::Start, Resume::Value(Value::Null), Resume::Value(json!(true))]
        );
    }

    #[tokio::test]
    async fn test_invoke_suspends_then_resumes_with_value() {
        let client = MockHttpClient::new().ok("/a", json!({ "ok": 1 }));
        let (mut scheduler, _store) = scheduler_with(client, AppState::default());
        let (program, seen) = Script::new("invoke", vec![get("/a")]);
        let id = scheduler.start(Box::new(program));

        assert_eq!(scheduler.status(id), Some(TaskStatus::Suspended));
        assert_eq!(scheduler.in_flight(), 1);

        scheduler.run_until_idle().await;
        assert_eq!(scheduler.status(id), Some(TaskStatus::Completed));
        assert_eq!(seen.lock().unwrap()[1], Resume::Value(json!({ "ok": 1 })));
    }

    #[tokio::test]
    async fn test_invoke_failure_raised_at_yield_point() {
        let client = MockHttpClient::new().fail("/a", 500);
        let (mut scheduler, _store) = scheduler_with(client, AppState::default());
        let (program, seen) = Script::new("failing", vec![get("/a")]);
        let id = scheduler.start(Box::new(program));
        scheduler.run_until_idle().await;

        assert_eq!(scheduler.status(id), Some(TaskStatus::Failed));
        assert!(matches!(
            seen.lock().unwrap()[1],
            Resume::Error(TaskError::Invocation { .. })
        ));
    }

    #[tokio::test]
    async fn test_all_results_in_member_order() {
        let client = MockHttpClient::new().ok("/a", json!("A")).ok("/b", json!("B"));
        let (mut scheduler, _store) = scheduler_with(client, AppState::default());
        let (program, seen) = Script::new("fanout", vec![all([get("/a"), get("/b")])]);
        let id = scheduler.start(Box::new(program));

        // 两个成员在任何完成结果送回之前都已派发
        assert_eq!(scheduler.in_flight(), 2);
        scheduler.run_until_idle().await;

        assert_eq!(scheduler.status(id), Some(TaskStatus::Completed));
        assert_eq!(seen.lock().unwrap()[1], Resume::Value(json!(["A", "B"])));
    }

    #[tokio::test]
    async fn test_all_first_failure_cancels_siblings() {
        let client = MockHttpClient::new().fail("/bad", 503);
        let gate = client.gated("/slow", MockReply::Ok(json!("late")));
        let (mut scheduler, _store) = scheduler_with(client, AppState::default());
        let (program, seen) = Script::new("fanout", vec![all([get("/slow"), get("/bad")])]);
        let id = scheduler.start(Box::new(program));

        assert!(scheduler.next_completion().await);
        assert_eq!(scheduler.status(id), Some(TaskStatus::Failed));
        assert!(matches!(seen.lock().unwrap()[1], Resume::Error(_)));
        let cancelled = scheduler
            .summaries()
            .into_iter()
            .filter(|s| s.parent == Some(id) && s.status == TaskStatus::Cancelled)
            .count();
        assert_eq!(cancelled, 1);

        // 迟到的结果被丢弃
        gate.add_permits(1);
        scheduler.run_until_idle().await;
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_nested_all_results_keep_shape() {
        let client = MockHttpClient::new()
            .ok("/a", json!(1))
            .ok("/b", json!(2))
            .ok("/c", json!(3));
        let (mut scheduler, _store) = scheduler_with(client, AppState::default());
        let (program, seen) = Script::new(
            "nested",
            vec![all([get("/a"), all([get("/b"), get("/c")])])],
        );
        let id = scheduler.start(Box::new(program));

        // 内层成员的子任务同样在首次 drain 中派发
        assert_eq!(scheduler.in_flight(), 3);
        scheduler.run_until_idle().await;

        assert_eq!(scheduler.status(id), Some(TaskStatus::Completed));
        assert_eq!(seen.lock().unwrap()[1], Resume::Value(json!([1, [2, 3]])));
    }

    #[tokio::test]
    async fn test_grandchild_failure_reaches_root() {
        let client = MockHttpClient::new()
            .ok("/a", json!(1))
            .ok("/b", json!(2))
            .fail("/bad", 500);
        let (mut scheduler, _store) = scheduler_with(client, AppState::default());
        let (program, seen) = Script::new(
            "nested",
            vec![all([get("/a"), all([get("/b"), get("/bad")])])],
        );
        let id = scheduler.start(Box::new(program));
        scheduler.run_until_idle().await;

        assert_eq!(scheduler.status(id), Some(TaskStatus::Failed));
        match &seen.lock().unwrap()[1] {
            Resume::Error(TaskError::Invocation { function, reason }) => {
                assert_eq!(function, "http.get");
                assert!(reason.contains("/bad"));
            }
            other => panic!("Expected Invocation error, got {other:?}"),
        }
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_all_resolves_immediately() {
        let (mut scheduler, _store) = scheduler_with(MockHttpClient::new(), AppState::default());
        let (program, seen) = Script::new("empty", vec![all([])]);
        scheduler.start(Box::new(program));
        assert_eq!(seen.lock().unwrap()[1], Resume::Value(json!([])));
    }

    #[tokio::test]
    async fn test_selector_failure_fails_task() {
        fn broken(_: &AppState) -> Result<Value, String> {
            Err("boom".to_string())
        }
        let (mut scheduler, _store) = scheduler_with(MockHttpClient::new(), AppState::default());
        let (program, _seen) = Script::new("selector", vec![query(Selector::new("broken", broken))]);
        let id = scheduler.start(Box::new(program));
        assert_eq!(scheduler.status(id), Some(TaskStatus::Failed));
    }

    fn submit_home_worker() -> WorkerSpec {
        WorkerSpec::new("submit-clear", || {
            let (program, _) = Script::new("submit-clear", vec![submit(Action::ClearNotifications)]);
            Box::new(program) as Box<dyn Program>
        })
    }

    #[tokio::test]
    async fn test_every_match_trigger_starts_worker_per_action() {
        let (mut scheduler, store) = scheduler_with(MockHttpClient::new(), AppState::default());
        let (watcher, _) = Script::new(
            "watcher",
            vec![take_every(&[ActionKind::RouteHome], submit_home_worker())],
        );
        let watcher_id = scheduler.start(Box::new(watcher));
        assert_eq!(scheduler.status(watcher_id), Some(TaskStatus::Suspended));

        store.submit(Action::RouteHome);
        store.submit(Action::RouteHome);
        store.submit(Action::LoadBlocks(vec![]));
        scheduler.drain();

        let completed = scheduler
            .summaries()
            .into_iter()
            .filter(|s| s.name == "submit-clear" && s.status == TaskStatus::Completed)
            .count();
        assert_eq!(completed, 2);
        assert_eq!(scheduler.status(watcher_id), Some(TaskStatus::Suspended));
    }

    #[tokio::test]
    async fn test_latest_only_cancels_previous_instance() {
        let client = MockHttpClient::new();
        let gate = client.gated("/slow", MockReply::Ok(json!("x")));
        let (mut scheduler, store) = scheduler_with(client, AppState::default());
        let worker = WorkerSpec::new("slow", || {
            let (program, _) = Script::new("slow", vec![all([get("/slow"), get("/slow")])]);
            Box::new(program) as Box<dyn Program>
        });
        let (watcher, _) = Script::new("watcher", vec![take_latest(&[ActionKind::RouteHome], worker)]);
        scheduler.start(Box::new(watcher));

        store.submit(Action::RouteHome);
        scheduler.drain();
        let first = scheduler.live_by_name("slow");
        assert_eq!(first.len(), 1);

        store.submit(Action::RouteHome);
        scheduler.drain();
        let second = scheduler.live_by_name("slow");
        assert_eq!(second.len(), 1);
        assert_ne!(first, second);
        assert_eq!(scheduler.status(first[0]), Some(TaskStatus::Cancelled));

        // 被取消实例的两个 All 成员也被取消
        let cancelled_members = scheduler
            .summaries()
            .into_iter()
            .filter(|s| s.parent == Some(first[0]) && s.status == TaskStatus::Cancelled)
            .count();
        assert_eq!(cancelled_members, 2);

        gate.add_permits(4);
        scheduler.run_until_idle().await;
        assert_eq!(scheduler.status(second[0]), Some(TaskStatus::Completed));
        assert_eq!(scheduler.status(first[0]), Some(TaskStatus::Cancelled));
    }

    #[tokio::test]
    async fn test_latest_only_cancels_grandchildren() {
        let client = MockHttpClient::new();
        let gate = client.gated("/slow", MockReply::Ok(json!("x")));
        let (mut scheduler, store) = scheduler_with(client, AppState::default());
        let worker = WorkerSpec::new("nested", || {
            let (program, _) = Script::new(
                "nested",
                vec![all([get("/slow"), all([get("/slow"), get("/slow")])])],
            );
            Box::new(program) as Box<dyn Program>
        });
        let (watcher, _) = Script::new("watcher", vec![take_latest(&[ActionKind::RouteHome], worker)]);
        scheduler.start(Box::new(watcher));

        store.submit(Action::RouteHome);
        scheduler.drain();
        let first = scheduler.live_by_name("nested")[0];
        assert_eq!(scheduler.live_by_name("all-member").len(), 4);

        store.submit(Action::RouteHome);
        scheduler.drain();
        let second = scheduler.live_by_name("nested")[0];
        assert_ne!(first, second);
        assert_eq!(scheduler.status(first), Some(TaskStatus::Cancelled));

        let summaries = scheduler.summaries();
        let members: Vec<TaskId> = summaries
            .iter()
            .filter(|s| s.parent == Some(first))
            .map(|s| s.id)
            .collect();
        assert_eq!(members.len(), 2);
        let descendants: Vec<&TaskSummary> = summaries
            .iter()
            .filter(|s| {
                s.parent == Some(first) || s.parent.map(|p| members.contains(&p)).unwrap_or(false)
            })
            .collect();
        assert_eq!(descendants.len(), 4);
        assert!(descendants.iter().all(|s| s.status == TaskStatus::Cancelled));
        // 只剩第二个实例的成员存活
        assert_eq!(scheduler.live_by_name("all-member").len(), 4);

        gate.add_permits(6);
        scheduler.run_until_idle().await;
        assert_eq!(scheduler.status(second), Some(TaskStatus::Completed));
        assert_eq!(scheduler.status(first), Some(TaskStatus::Cancelled));
    }

    #[tokio::test]
    async fn test_cancel_watcher_unregisters_trigger() {
        let (mut scheduler, store) = scheduler_with(MockHttpClient::new(), AppState::default());
        let (watcher, _) = Script::new(
            "watcher",
            vec![take_every(&[ActionKind::RouteHome], submit_home_worker())],
        );
        let id = scheduler.start(Box::new(watcher));
        assert!(scheduler.cancel(id));
        assert!(!scheduler.cancel(id));

        store.submit(Action::RouteHome);
        scheduler.drain();
        assert!(scheduler.summaries().iter().all(|s| s.name != "submit-clear"));
    }

    #[tokio::test]
    async fn test_cancelled_task_never_resumed() {
        let client = MockHttpClient::new().ok("/a", json!(1));
        let (mut scheduler, _store) = scheduler_with(client, AppState::default());
        let (program, seen) = Script::new("victim", vec![get("/a")]);
        let id = scheduler.start(Box::new(program));
        scheduler.cancel(id);
        scheduler.run_until_idle().await;

        assert_eq!(scheduler.status(id), Some(TaskStatus::Cancelled));
        assert_eq!(*seen.lock().unwrap(), vec![Resume::Start]);
        assert_eq!(scheduler.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_cancelling_member_cancels_owner() {
        let client = MockHttpClient::new();
        let _gate = client.gated("/slow", MockReply::Ok(json!(1)));
        let (mut scheduler, _store) = scheduler_with(client, AppState::default());
        let (program, _) = Script::new("owner", vec![all([get("/slow"), get("/slow")])]);
        let owner = scheduler.start(Box::new(program));
        let member = scheduler
            .summaries()
            .into_iter()
            .find(|s| s.parent == Some(owner))
            .map(|s| s.id)
            .unwrap();

        scheduler.cancel(member);
        assert_eq!(scheduler.status(owner), Some(TaskStatus::Cancelled));
        assert!(scheduler.live_by_name("all-member").is_empty());
    }

    #[tokio::test]
    async fn test_run_stops_when_commands_closed() {
        // store 保持存活，action 通道不会关闭
        let (scheduler, _store) = scheduler_with(MockHttpClient::new(), AppState::default());
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        let join = tokio::spawn(scheduler.run(token.clone(), commands_rx));
        drop(commands_tx);

        let finished = tokio::time::timeout(std::time::Duration::from_secs(1), join).await;
        assert!(finished.is_ok(), "loop should exit once every sender is gone");
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let store = Arc::new(Store::default());
        let functions = Arc::new(FunctionRegistry::new());
        let mut scheduler = Scheduler::new(store, functions, 2);
        for _ in 0..5 {
            let (program, _) = Script::new("quick", vec![]);
            scheduler.start(Box::new(program));
        }
        assert_eq!(scheduler.summaries().len(), 2);
    }
}
