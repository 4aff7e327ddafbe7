//! Action 词汇表：按领域划分的封闭枚举（路由 / 内容加载 / 通知）
//!
//! 序列化形式为 `{ "kind": ..., "payload": ... }`；每个 kind 的载荷形状固定。
//! 外部输入中无法识别的 kind 由 `Action::from_json` 返回 None，消费者直接忽略。

use serde::{Deserialize, Serialize};

use crate::store::notifications::NotificationInput;
use crate::store::state::{Block, Chapter};

/// 提交给状态容器的动作（提交后不可变）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum Action {
    // 路由
    RouteHome,
    RouteChapter { chapter: String },
    RouteBlock { chapter: String, block: String },

    // 内容加载
    LoadChapters(Vec<Chapter>),
    LoadBlocks(Vec<Block>),

    // 通知
    AppendNotification(NotificationInput),
    ClearNotifications,
}

/// Action 的无载荷镜像，用于 Trigger 匹配
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    RouteHome,
    RouteChapter,
    RouteBlock,
    LoadChapters,
    LoadBlocks,
    AppendNotification,
    ClearNotifications,
}

impl ActionKind {
    /// 所有导航类 kind
    pub const NAVIGATION: [ActionKind; 3] = [
        ActionKind::RouteHome,
        ActionKind::RouteChapter,
        ActionKind::RouteBlock,
    ];

    pub fn is_navigation(&self) -> bool {
        Self::NAVIGATION.contains(self)
    }
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::RouteHome => ActionKind::RouteHome,
            Action::RouteChapter { .. } => ActionKind::RouteChapter,
            Action::RouteBlock { .. } => ActionKind::RouteBlock,
            Action::LoadChapters(_) => ActionKind::LoadChapters,
            Action::LoadBlocks(_) => ActionKind::LoadBlocks,
            Action::AppendNotification(_) => ActionKind::AppendNotification,
            Action::ClearNotifications => ActionKind::ClearNotifications,
        }
    }

    /// 为未带时间戳的通知补上提交时刻，其余 action 原样返回
    pub fn stamped(self, now_millis: i64) -> Self {
        match self {
            Action::AppendNotification(mut input) => {
                input.timestamp.get_or_insert(now_millis);
                Action::AppendNotification(input)
            }
            other => other,
        }
    }

    /// 解析外部 JSON；kind 未知或载荷形状不符时返回 None
    pub fn from_json(raw: &str) -> Option<Self> {
        match serde_json::from_str(raw) {
            Ok(action) => Some(action),
            Err(e) => {
                tracing::debug!("Ignoring unrecognized action: {}", e);
                None
            }
        }
    }
}
