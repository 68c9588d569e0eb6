//! Data model shared by the wizard, the API gateway and the history cache.

pub mod draft;
pub mod session;

pub use draft::{
    DraftField, DraftUpdate, Education, Employment, RiskTolerance, TimeHorizon, UnknownOption,
    WizardDraft, INVESTMENT_GOAL_OPTIONS, RISK_FLAG_OPTIONS,
};
pub use session::{
    CreateSessionRequest, PageKey, PaginatedPage, PersonalInfo, Preferences, RawInput, ScoreBand,
    Session, SessionSummary,
};
