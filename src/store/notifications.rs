//! 通知状态切片：按来源划分作用域、带级别的用户可见消息
//!
//! 两个状态转换：`append_normalized`（级别 / 作用域按白名单校验，非法值替换为默认值后追加）
//! 与 `clear_all`（清空）。导航时由 Watcher 触发清空，通知不会跨页面存活。

use serde::{Deserialize, Serialize};

/// 通知级别白名单，第一个值为默认值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl Level {
    pub const ALL: [Level; 4] = [Level::Info, Level::Success, Level::Warning, Level::Error];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Info => "info",
            Level::Success => "success",
            Level::Warning => "warning",
            Level::Error => "error",
        }
    }

    /// 按白名单解析；不在白名单内返回 None
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.as_str() == raw)
    }
}

/// 通知作用域白名单，第一个值为默认值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    #[default]
    Global,
    Content,
    Routing,
}

impl Scope {
    pub const ALL: [Scope; 3] = [Scope::Global, Scope::Content, Scope::Routing];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Global => "global",
            Scope::Content => "content",
            Scope::Routing => "routing",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == raw)
    }
}

/// 未经校验的通知（action 载荷），级别与作用域为原始字符串
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationInput {
    pub message: String,
    pub level: String,
    pub scope: String,
    /// 毫秒时间戳；为空时由状态容器在提交时补上
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl NotificationInput {
    pub fn new(message: impl Into<String>, level: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: level.into(),
            scope: scope.into(),
            timestamp: None,
        }
    }

    pub fn at(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// 已入库的通知
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub message: String,
    pub level: Level,
    pub scope: Scope,
    pub timestamp: i64,
}

impl From<NotificationInput> for Notification {
    fn from(input: NotificationInput) -> Self {
        let level = Level::parse(&input.level).unwrap_or_else(|| {
            tracing::debug!(level = %input.level, "unknown notification level, using default");
            Level::default()
        });
        let scope = Scope::parse(&input.scope).unwrap_or_else(|| {
            tracing::debug!(scope = %input.scope, "unknown notification scope, using default");
            Scope::default()
        });
        Self {
            message: input.message,
            level,
            scope,
            timestamp: input.timestamp.unwrap_or_default(),
        }
    }
}

/// 校验后追加到末尾，返回新集合
pub fn append_normalized(current: &[Notification], input: NotificationInput) -> Vec<Notification> {
    let mut next = current.to_vec();
    next.push(Notification::from(input));
    next
}

/// 清空
pub fn clear_all(_current: &[Notification]) -> Vec<Notification> {
    Vec::new()
}
