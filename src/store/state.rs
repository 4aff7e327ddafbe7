//! 应用状态：路由、书籍内容（章节 / 内容块）、通知
//!
//! 状态只通过 reducer 替换；Selector 是对快照的纯读取。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::notifications::Notification;

/// 章节
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub number: Option<u32>,
}

/// 章节下的内容块
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    #[serde(default)]
    pub id: String,
    /// 所属章节 id
    #[serde(default)]
    pub chapter: String,
    pub content: String,
}

/// 当前路由（由导航 action 写入）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "page", rename_all = "snake_case")]
pub enum Route {
    Home,
    Chapter { chapter: String },
    Block { chapter: String, block: String },
}

/// 书籍内容切片
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentState {
    pub chapters: Vec<Chapter>,
    pub blocks: Vec<Block>,
}

impl ContentState {
    /// 任一集合为空即视为未加载
    pub fn is_dehydrated(&self) -> bool {
        self.chapters.is_empty() || self.blocks.is_empty()
    }
}

/// 应用状态根
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppState {
    pub route: Option<Route>,
    pub content: ContentState,
    pub notifications: Vec<Notification>,
}

impl AppState {
    pub fn with_content(chapters: Vec<Chapter>, blocks: Vec<Block>) -> Self {
        Self {
            content: ContentState { chapters, blocks },
            ..Self::default()
        }
    }
}

/// 水合守卫 selector：返回 `Value::Bool`
pub fn select_dehydrated(state: &AppState) -> Result<Value, String> {
    Ok(Value::Bool(state.content.is_dehydrated()))
}
