//! Scoring sessions as returned by the onboarding service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::draft::{Education, Employment, RiskTolerance, TimeHorizon};

/// Immutable record created by a successful submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub raw_input: serde_json::Value,
    #[serde(default)]
    pub parsed_data: serde_json::Value,
    /// 0-100, `None` while the score is not available
    #[serde(default)]
    pub score: Option<u8>,
    #[serde(default)]
    pub score_explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Session {
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            created_at: self.created_at,
            score: self.score.unwrap_or(0),
        }
    }
}

/// Read-only projection used by the history listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub score: u8,
}

/// One server-side page of session summaries.
///
/// `total_pages`, `has_next` and `has_prev` are always derived from
/// `page`, `page_size` and `total`; use [`PaginatedPage::new`] to build one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedPage {
    pub items: Vec<SessionSummary>,
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PaginatedPage {
    /// Build a page, deriving the navigation fields.
    ///
    /// `page` and `page_size` are raised to 1 if given as 0. Items beyond
    /// `page_size` are dropped.
    pub fn new(mut items: Vec<SessionSummary>, page: u32, page_size: u32, total: u64) -> Self {
        let page = page.max(1);
        let page_size = page_size.max(1);
        items.truncate(page_size as usize);
        let total_pages =
            u32::try_from(total.div_ceil(u64::from(page_size))).unwrap_or(u32::MAX);
        Self {
            items,
            page,
            page_size,
            total,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Cache and request key for one history page: the filter tuple
/// `(filter_datetime, page, page_size)`.
///
/// `filter` of `None` means "as of now"; the gateway fills in the current
/// time when sending the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageKey {
    pub filter: Option<DateTime<Utc>>,
    pub page: u32,
    pub page_size: u32,
}

impl PageKey {
    pub fn new(filter: Option<DateTime<Utc>>, page: u32, page_size: u32) -> Self {
        Self {
            filter,
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }

    /// Same filter and page size, different page
    pub fn with_page(&self, page: u32) -> Self {
        Self::new(self.filter, page, self.page_size)
    }
}

/// Personal section of the create request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfo {
    pub age: i64,
    pub income: f64,
    pub employment: Employment,
    pub education: Education,
}

/// Preference section of the create request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub risk_tolerance: RiskTolerance,
    pub investment_goals: Vec<String>,
    pub time_horizon: TimeHorizon,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawInput {
    pub personal_info: PersonalInfo,
    pub preferences: Preferences,
    #[serde(default)]
    pub flags: Vec<String>,
}

/// Body of `POST /onboarding`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub user_id: Uuid,
    pub raw_input: RawInput,
}

/// Coarse rating of a score for display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBand {
    Excellent,
    Good,
    Fair,
    NeedsImprovement,
}

impl ScoreBand {
    pub fn from_score(score: u8) -> Self {
        match score {
            80..=u8::MAX => ScoreBand::Excellent,
            60..=79 => ScoreBand::Good,
            40..=59 => ScoreBand::Fair,
            _ => ScoreBand::NeedsImprovement,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ScoreBand::Excellent => "Excellent",
            ScoreBand::Good => "Good",
            ScoreBand::Fair => "Fair",
            ScoreBand::NeedsImprovement => "Needs Improvement",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ScoreBand::Excellent => {
                "Outstanding! You're well-prepared for investment opportunities."
            }
            ScoreBand::Good => {
                "Good foundation! With some improvements, you'll be ready to invest."
            }
            ScoreBand::Fair => {
                "You're on the right track. Consider addressing a few areas before investing."
            }
            ScoreBand::NeedsImprovement => {
                "Focus on building your financial foundation before considering investments."
            }
        }
    }
}
