//! 纯状态转换：`reduce(state, action) -> new state`

use crate::store::action::Action;
use crate::store::notifications::{append_normalized, clear_all};
use crate::store::state::{AppState, Route};

/// 根据 action 生成新状态；不修改输入
pub fn reduce(state: &AppState, action: &Action) -> AppState {
    let mut next = state.clone();
    match action {
        Action::RouteHome => next.route = Some(Route::Home),
        Action::RouteChapter { chapter } => {
            next.route = Some(Route::Chapter {
                chapter: chapter.clone(),
            })
        }
        Action::RouteBlock { chapter, block } => {
            next.route = Some(Route::Block {
                chapter: chapter.clone(),
                block: block.clone(),
            })
        }
        Action::LoadChapters(chapters) => next.content.chapters = chapters.clone(),
        Action::LoadBlocks(blocks) => next.content.blocks = blocks.clone(),
        Action::AppendNotification(input) => {
            next.notifications = append_normalized(&state.notifications, input.clone())
        }
        Action::ClearNotifications => next.notifications = clear_all(&state.notifications),
    }
    next
}
