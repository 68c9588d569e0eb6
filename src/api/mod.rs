//! Gateway to the remote onboarding/scoring service
//!
//! This module provides:
//! - The [`OnboardingApi`] trait the wizard and history cache are written against
//! - [`HttpGateway`], the reqwest implementation
//! - [`ApiError`], the uniform `{code, message}` failure shape
//! - [`MockOnboardingApi`], an in-memory gateway for tests

pub mod client;
pub mod error;
pub mod mock;

pub use client::HttpGateway;
pub use error::{ApiError, ErrorKind};
pub use mock::MockOnboardingApi;

use async_trait::async_trait;
use uuid::Uuid;

use crate::types::{CreateSessionRequest, PageKey, PaginatedPage, Session};

/// Typed operations on the onboarding service.
///
/// Implementations must normalize every failure into [`ApiError`].
#[async_trait]
pub trait OnboardingApi: Send + Sync {
    /// `POST /onboarding`
    async fn create_session(&self, request: &CreateSessionRequest) -> Result<Session, ApiError>;

    /// `GET /onboarding/sessions`, newest first
    async fn list_sessions(&self, key: &PageKey) -> Result<PaginatedPage, ApiError>;

    /// `GET /onboarding/{id}`
    async fn get_session(&self, id: Uuid) -> Result<Session, ApiError>;

    /// `DELETE /onboarding/{id}`
    async fn delete_session(&self, id: Uuid) -> Result<(), ApiError>;
}
