//! 引擎入口：`Engine::start(root_watchers)`
//!
//! 在状态容器创建之后、首次渲染 / 读取状态之前调用一次。根 Watcher 在返回前已同步注册好触发器，
//! 之后调度器作为后台任务运行；调用方通过 EngineHandle 发送命令（取消任务、查询任务列表）或关闭引擎。

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::error::EngineError;
use crate::core::scheduler::Scheduler;
use crate::core::task::{Program, TaskId, TaskSummary};
use crate::http::FunctionRegistry;
use crate::store::StateContainer;

/// 从 EngineHandle 发往调度循环的命令
pub enum Command {
    /// 取消任务（及其 All 子任务），回复是否存在
    Cancel(TaskId, oneshot::Sender<bool>),
    /// 存活任务与最近结束的任务
    Tasks(oneshot::Sender<Vec<TaskSummary>>),
    /// 追加一个根任务
    Start(Box<dyn Program>, oneshot::Sender<TaskId>),
}

pub struct Engine;

impl Engine {
    /// 启动根 Watcher 并在后台运行调度循环
    pub fn start(
        store: Arc<dyn StateContainer>,
        functions: FunctionRegistry,
        history_limit: usize,
        root_watchers: Vec<Box<dyn Program>>,
    ) -> EngineHandle {
        let mut scheduler = Scheduler::new(store, Arc::new(functions), history_limit);
        let count = root_watchers.len();
        let roots = root_watchers
            .into_iter()
            .map(|watcher| scheduler.start(watcher))
            .collect();
        tracing::info!("Engine started with {} root watchers", count);

        let shutdown = CancellationToken::new();
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let join = tokio::spawn(scheduler.run(shutdown.clone(), commands_rx));

        EngineHandle {
            commands,
            shutdown,
            join,
            roots,
        }
    }
}

/// 运行中引擎的句柄
pub struct EngineHandle {
    commands: mpsc::UnboundedSender<Command>,
    shutdown: CancellationToken,
    join: JoinHandle<()>,
    roots: Vec<TaskId>,
}

impl EngineHandle {
    /// 根 Watcher 的任务 id（按传入顺序）
    pub fn roots(&self) -> &[TaskId] {
        &self.roots
    }

    pub async fn tasks(&self) -> Result<Vec<TaskSummary>, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Tasks(tx))?;
        rx.await.map_err(|_| EngineError::Stopped)
    }

    pub async fn cancel(&self, id: TaskId) -> Result<bool, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Cancel(id, tx))?;
        rx.await.map_err(|_| EngineError::Stopped)
    }

    pub async fn spawn(&self, program: Box<dyn Program>) -> Result<TaskId, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Start(program, tx))?;
        rx.await.map_err(|_| EngineError::Stopped)
    }

    /// 关闭 token（可交给 ShutdownManager 之类的外部信号源）
    pub fn token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.join.is_finished()
    }

    /// 触发关闭并等待调度循环退出；所有存活任务被取消
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.join.await {
            tracing::warn!("Scheduler loop ended abnormally: {}", e);
        }
    }

    fn send(&self, cmd: Command) -> Result<(), EngineError> {
        self.commands.send(cmd).map_err(|_| EngineError::Stopped)
    }
}
