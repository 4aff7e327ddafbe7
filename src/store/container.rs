//! 状态容器：外部协作者的接口与内存实现
//!
//! 调度器只依赖 `StateContainer`：submit 应用纯 reducer 并替换状态；read 同步返回快照；
//! subscribe 按提交顺序推送每个 action（丢弃接收端即取消订阅）；watch 在状态替换时通知渲染层。

use std::sync::{Mutex, PoisonError};

use tokio::sync::{mpsc, watch};

use crate::store::action::Action;
use crate::store::reducer::reduce;
use crate::store::state::AppState;

/// 状态容器 trait
pub trait StateContainer: Send + Sync {
    /// 应用 action；与其它 submit 之间原子
    fn submit(&self, action: Action);

    /// 当前状态快照
    fn read(&self) -> AppState;

    /// 订阅已提交的 action
    fn subscribe(&self) -> mpsc::UnboundedReceiver<Action>;

    /// 订阅状态替换
    fn watch(&self) -> watch::Receiver<AppState>;
}

/// 内存状态容器：状态存放在 watch 通道中
pub struct Store {
    state: watch::Sender<AppState>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<Action>>>,
}

impl Store {
    pub fn new(initial: AppState) -> Self {
        let (state, _) = watch::channel(initial);
        Self {
            state,
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// 提交外部 JSON 形式的 action；无法识别的 kind 被忽略，返回是否已应用
    pub fn submit_json(&self, raw: &str) -> bool {
        match Action::from_json(raw) {
            Some(action) => {
                self.submit(action);
                true
            }
            None => false,
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new(AppState::default())
    }
}

impl StateContainer for Store {
    fn submit(&self, action: Action) {
        // 持有订阅者锁贯穿整个转换，保证推送顺序与应用顺序一致
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let action = action.stamped(chrono::Utc::now().timestamp_millis());
        self.state.send_modify(|state| *state = reduce(state, &action));
        tracing::debug!(kind = ?action.kind(), "action applied");

        subscribers.retain(|tx| tx.send(action.clone()).is_ok());
    }

    fn read(&self) -> AppState {
        self.state.borrow().clone()
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<Action> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    fn watch(&self) -> watch::Receiver<AppState> {
        self.state.subscribe()
    }
}
