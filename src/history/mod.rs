//! Session history: cached page retrieval and page presentation

pub mod cache;
pub mod paginator;

pub use cache::{CachePolicy, CacheState, InvalidationScope, SessionCache};
pub use paginator::{ordinal_for, window_label, HistoryPaginator, HistoryRow, NavAction};
