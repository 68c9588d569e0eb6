//! onboard - investment-readiness onboarding client
//!
//! A three-step wizard collects a financial profile, persists the draft
//! locally and submits it to the onboarding service for scoring. Past
//! submissions are browsed through a cached, paginated history.

pub mod api;
pub mod config;
pub mod draft;
pub mod history;
pub mod logging;
pub mod types;
pub mod wizard;
