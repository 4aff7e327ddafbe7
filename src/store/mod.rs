//! 状态层：Action 词汇表、应用状态、纯 reducer、通知切片与状态容器

pub mod action;
pub mod container;
pub mod notifications;
pub mod reducer;
pub mod state;

pub use action::{Action, ActionKind};
pub use container::{StateContainer, Store};
pub use notifications::{Level, Notification, NotificationInput, Scope};
pub use reducer::reduce;
pub use state::{AppState, Block, Chapter, ContentState, Route};
