//! Presentation of one history page: ordinals, window label and navigation
//!
//! The paginator never fetches; it renders a page obtained from the
//! [`SessionCache`](super::SessionCache) and says which page to ask for next.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::types::{PaginatedPage, ScoreBand};

/// Navigation affordances of the history view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavAction {
    First,
    Prev,
    Next,
    Last,
}

impl NavAction {
    pub fn all() -> &'static [NavAction] {
        &[
            NavAction::First,
            NavAction::Prev,
            NavAction::Next,
            NavAction::Last,
        ]
    }

    /// Key that triggers the action in the interactive view
    pub fn key(&self) -> char {
        match self {
            NavAction::First => 'f',
            NavAction::Prev => 'p',
            NavAction::Next => 'n',
            NavAction::Last => 'l',
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            NavAction::First => "first",
            NavAction::Prev => "prev",
            NavAction::Next => "next",
            NavAction::Last => "last",
        }
    }

    pub fn from_key(key: char) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|a| a.key() == key.to_ascii_lowercase())
    }
}

/// One display row of the history listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRow {
    /// Position counted from the oldest session, which is #1
    pub ordinal: u64,
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub score: u8,
    pub band: ScoreBand,
}

/// Ordinal of the item at `index_in_page`, numbering from the oldest session.
///
/// Pages are ordered newest first, so the first item of page 1 gets `total`.
pub fn ordinal_for(index_in_page: usize, page: u32, page_size: u32, total: u64) -> u64 {
    let skipped = u64::from(page.max(1) - 1) * u64::from(page_size);
    total
        .saturating_sub(skipped)
        .saturating_sub(index_in_page as u64)
}

/// 1-based inclusive range of items shown on `page`, `None` when it is empty
pub fn window_label(page: u32, page_size: u32, total: u64) -> Option<(u64, u64)> {
    let page_size = u64::from(page_size.max(1));
    let start = u64::from(page.max(1) - 1) * page_size + 1;
    if start > total {
        return None;
    }
    Some((start, (start + page_size - 1).min(total)))
}

/// Renders a [`PaginatedPage`] for display and navigation
#[derive(Debug, Clone)]
pub struct HistoryPaginator {
    page: PaginatedPage,
}

impl HistoryPaginator {
    pub fn new(page: PaginatedPage) -> Self {
        Self { page }
    }

    pub fn page(&self) -> &PaginatedPage {
        &self.page
    }

    pub fn is_empty(&self) -> bool {
        self.page.is_empty()
    }

    pub fn rows(&self) -> Vec<HistoryRow> {
        self.page
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| HistoryRow {
                ordinal: ordinal_for(i, self.page.page, self.page.page_size, self.page.total),
                id: item.id,
                created_at: item.created_at,
                score: item.score,
                band: ScoreBand::from_score(item.score),
            })
            .collect()
    }

    pub fn window(&self) -> Option<(u64, u64)> {
        window_label(self.page.page, self.page.page_size, self.page.total)
    }

    /// e.g. `Showing 1-5 of 7`
    pub fn window_text(&self) -> String {
        match self.window() {
            Some((start, end)) => format!("Showing {}-{} of {}", start, end, self.page.total),
            None if self.page.total == 0 => "No sessions yet".to_string(),
            None => format!("Nothing on page {} of {}", self.page.page, self.page.total),
        }
    }

    pub fn is_enabled(&self, action: NavAction) -> bool {
        match action {
            NavAction::First | NavAction::Prev => self.page.has_prev,
            NavAction::Next | NavAction::Last => self.page.has_next,
        }
    }

    /// Page to request for `action`, `None` when it is disabled
    pub fn target(&self, action: NavAction) -> Option<u32> {
        if !self.is_enabled(action) {
            return None;
        }
        let target = match action {
            NavAction::First => 1,
            NavAction::Prev => self.page.page - 1,
            NavAction::Next => self.page.page + 1,
            NavAction::Last => self.page.total_pages,
        };
        (target != self.page.page).then_some(target)
    }

    /// Page position plus hints for the enabled actions
    pub fn footer(&self) -> String {
        if self.page.total_pages <= 1 {
            return format!("{} sessions", self.page.total);
        }
        let hints: Vec<String> = NavAction::all()
            .iter()
            .filter(|a| self.is_enabled(**a))
            .map(|a| format!("[{}] {}", a.key(), a.label()))
            .collect();
        format!(
            "Page {}/{}  {}",
            self.page.page,
            self.page.total_pages,
            hints.join("  ")
        )
    }
}
