//! In-memory gateway for tests and offline runs

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::error::ApiError;
use super::OnboardingApi;
use crate::types::{CreateSessionRequest, PageKey, PaginatedPage, Session};

/// Mock implementation for testing.
///
/// Keeps sessions newest first, counts every call and can be told to fail
/// or to answer slowly.
#[derive(Default)]
pub struct MockOnboardingApi {
    sessions: Mutex<Vec<Session>>,
    /// Errors returned by upcoming list calls, one per call
    list_failures: Mutex<VecDeque<ApiError>>,
    /// Error returned by the next create call
    create_failure: Mutex<Option<ApiError>>,
    list_delay: Mutex<Duration>,
    /// Score attached to created sessions
    score: Mutex<Option<u8>>,
    last_create: Mutex<Option<CreateSessionRequest>>,
    pub create_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub get_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockOnboardingApi {
    pub fn new() -> Self {
        Self {
            score: Mutex::new(Some(72)),
            ..Default::default()
        }
    }

    /// Mock pre-populated with `count` sessions, one minute apart, newest first
    pub fn with_sessions(count: usize) -> Self {
        let mock = Self::new();
        let now = Utc::now();
        {
            let mut sessions = lock(&mock.sessions);
            for i in 0..count {
                sessions.push(Session {
                    id: Uuid::new_v4(),
                    user_id: Uuid::new_v4(),
                    created_at: now - chrono::Duration::minutes(i as i64),
                    raw_input: serde_json::Value::Null,
                    parsed_data: serde_json::Value::Null,
                    score: Some((40 + (i * 7) % 60) as u8),
                    score_explanation: None,
                    source_ip: None,
                    user_agent: None,
                });
            }
        }
        mock
    }

    /// Queue an error for the next list call
    pub fn fail_next_list(&self, error: ApiError) {
        lock(&self.list_failures).push_back(error);
    }

    /// Fail the next create call
    pub fn fail_next_create(&self, error: ApiError) {
        *lock(&self.create_failure) = Some(error);
    }

    pub fn set_list_delay(&self, delay: Duration) {
        *lock(&self.list_delay) = delay;
    }

    pub fn set_score(&self, score: Option<u8>) {
        *lock(&self.score) = score;
    }

    pub fn sessions(&self) -> Vec<Session> {
        lock(&self.sessions).clone()
    }

    pub fn last_create(&self) -> Option<CreateSessionRequest> {
        lock(&self.last_create).clone()
    }

    pub fn list_count(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn create_count(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OnboardingApi for MockOnboardingApi {
    async fn create_session(&self, request: &CreateSessionRequest) -> Result<Session, ApiError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_create) = Some(request.clone());

        if let Some(error) = lock(&self.create_failure).take() {
            return Err(error);
        }

        let session = Session {
            id: Uuid::new_v4(),
            user_id: request.user_id,
            created_at: Utc::now(),
            raw_input: serde_json::to_value(&request.raw_input)
                .map_err(|e| ApiError::decode(e.to_string()))?,
            parsed_data: serde_json::Value::Null,
            score: *lock(&self.score),
            score_explanation: None,
            source_ip: None,
            user_agent: None,
        };
        lock(&self.sessions).insert(0, session.clone());
        Ok(session)
    }

    async fn list_sessions(&self, key: &PageKey) -> Result<PaginatedPage, ApiError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *lock(&self.list_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = lock(&self.list_failures).pop_front() {
            return Err(error);
        }

        let matching: Vec<_> = lock(&self.sessions)
            .iter()
            .filter(|s| key.filter.map_or(true, |cutoff| s.created_at <= cutoff))
            .map(Session::summary)
            .collect();
        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip((key.page as usize - 1) * key.page_size as usize)
            .take(key.page_size as usize)
            .collect();

        Ok(PaginatedPage::new(items, key.page, key.page_size, total))
    }

    async fn get_session(&self, id: Uuid) -> Result<Session, ApiError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.sessions)
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| ApiError::not_found(format!("Session {} not found", id)))
    }

    async fn delete_session(&self, id: Uuid) -> Result<(), ApiError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let mut sessions = lock(&self.sessions);
        let before = sessions.len();
        sessions.retain(|s| s.id != id);
        if sessions.len() == before {
            return Err(ApiError::not_found(format!("Session {} not found", id)));
        }
        Ok(())
    }
}
