//! Tests for the onboarding wizard

use super::*;
use crate::api::MockOnboardingApi;
use crate::draft::{MemoryKvStore, DRAFT_KEY, STEP_KEY};
use crate::history::{CachePolicy, CacheState};
use crate::types::{Education, Employment, PageKey, RiskTolerance, TimeHorizon};
use std::collections::BTreeSet;
use std::time::Duration;

fn controller() -> (WizardController<MemoryKvStore>, Arc<MockOnboardingApi>) {
    let mock = Arc::new(MockOnboardingApi::new());
    let store = DraftStore::new(MemoryKvStore::new());
    let api: Arc<dyn OnboardingApi> = mock.clone();
    (WizardController::open(store, api), mock)
}

fn fill_basic_info(wizard: &mut WizardController<MemoryKvStore>) {
    wizard.update_field(DraftUpdate::Age(35)).unwrap();
    wizard.update_field(DraftUpdate::Income(75_000.0)).unwrap();
    wizard
        .update_field(DraftUpdate::Employment(Employment::FullTime))
        .unwrap();
    wizard
        .update_field(DraftUpdate::Education(Education::Bachelors))
        .unwrap();
}

fn fill_preferences(wizard: &mut WizardController<MemoryKvStore>) {
    wizard
        .update_field(DraftUpdate::RiskTolerance(RiskTolerance::Moderate))
        .unwrap();
    wizard
        .update_field(DraftUpdate::InvestmentGoals(BTreeSet::from([
            "retirement".to_string(),
            "wealth-building".to_string(),
        ])))
        .unwrap();
    wizard
        .update_field(DraftUpdate::TimeHorizon(TimeHorizon::Long))
        .unwrap();
}

/// Controller sitting on the review step with a complete draft
fn ready_to_submit() -> (WizardController<MemoryKvStore>, Arc<MockOnboardingApi>) {
    let (mut wizard, mock) = controller();
    fill_basic_info(&mut wizard);
    wizard.advance().unwrap();
    fill_preferences(&mut wizard);
    wizard.advance().unwrap();
    (wizard, mock)
}

#[test]
fn test_load_clamps_corrupt_step_and_keeps_draft() {
    let store = MemoryKvStore::new();
    store.set(STEP_KEY, "5").unwrap();
    store.set(DRAFT_KEY, r#"{"age": 44}"#).unwrap();

    let wizard = WizardController::open(
        DraftStore::new(store),
        Arc::new(MockOnboardingApi::new()),
    );

    assert_eq!(wizard.step_index(), 0);
    assert_eq!(wizard.draft().age, Some(44));
}

#[test]
fn test_load_resumes_saved_step() {
    let store = MemoryKvStore::new();
    store.set(STEP_KEY, "1").unwrap();
    let wizard = WizardController::open(
        DraftStore::new(store),
        Arc::new(MockOnboardingApi::new()),
    );
    assert_eq!(wizard.current_step(), WizardStep::Preferences);
}

#[test]
fn test_advance_blocked_by_invalid_step() {
    let (mut wizard, _) = controller();

    let err = wizard.advance().unwrap_err();
    let WizardError::Validation(errors) = err else {
        panic!("expected validation error, got {:?}", err);
    };
    assert_eq!(errors.len(), 4);
    assert_eq!(wizard.step_index(), 0);
    assert_eq!(wizard.step_validity().get(&0), Some(&false));
}

#[test]
fn test_advance_increments_and_persists() {
    let (mut wizard, _) = controller();
    fill_basic_info(&mut wizard);

    assert_eq!(wizard.advance().unwrap(), WizardStep::Preferences);
    assert_eq!(wizard.step_validity().get(&0), Some(&true));

    // A fresh controller over the same store resumes on step 1
    let store = std::mem::replace(
        &mut wizard.store,
        DraftStore::new(MemoryKvStore::new()),
    );
    assert_eq!(store.load_step(), 1);
    assert_eq!(store.load().age, Some(35));
}

#[test]
fn test_advance_only_checks_current_step() {
    let (mut wizard, _) = controller();
    fill_basic_info(&mut wizard);
    wizard.advance().unwrap();

    // Break a step 0 field while on step 1; step 1 is still gated on its own fields
    wizard.update_field(DraftUpdate::Age(12)).unwrap();
    fill_preferences(&mut wizard);
    assert_eq!(wizard.advance().unwrap(), WizardStep::Review);
}

#[test]
fn test_advance_capped_at_last_step() {
    let (mut wizard, _) = ready_to_submit();
    assert_eq!(wizard.step_index(), 2);
    assert_eq!(wizard.advance().unwrap(), WizardStep::Review);
    assert_eq!(wizard.step_index(), 2);
}

#[test]
fn test_out_of_range_age_blocks_first_step() {
    let (mut wizard, _) = controller();
    fill_basic_info(&mut wizard);
    wizard.update_field(DraftUpdate::Age(130)).unwrap();

    let err = wizard.advance().unwrap_err();
    let WizardError::Validation(errors) = err else {
        panic!("expected validation error");
    };
    assert!(errors.get(DraftField::Age).is_some());
    assert_eq!(wizard.step_index(), 0);
    assert_eq!(wizard.draft().age, Some(130));
}

#[test]
fn test_retreat_floors_at_zero_without_validation() {
    let (mut wizard, _) = ready_to_submit();
    wizard.clear_field(DraftField::Age).unwrap();

    assert_eq!(wizard.retreat().unwrap(), WizardStep::Preferences);
    assert_eq!(wizard.retreat().unwrap(), WizardStep::BasicInfo);
    assert_eq!(wizard.retreat().unwrap(), WizardStep::BasicInfo);
    assert_eq!(wizard.step_index(), 0);
}

#[test]
fn test_set_field_parse_error_is_local() {
    let (mut wizard, mock) = controller();
    let err = wizard.set_field(DraftField::Age, "thirty").unwrap_err();
    assert!(matches!(err, WizardError::Validation(_)));
    assert_eq!(wizard.draft().age, None);
    assert_eq!(mock.create_count(), 0);
}

#[tokio::test]
async fn test_submit_off_final_step_makes_no_call() {
    let (mut wizard, mock) = controller();
    fill_basic_info(&mut wizard);
    fill_preferences(&mut wizard);

    let err = wizard.submit().await.unwrap_err();
    assert!(matches!(err, WizardError::NotOnFinalStep { current: 0 }));
    assert_eq!(mock.create_count(), 0);
}

#[tokio::test]
async fn test_submit_revalidates_whole_draft() {
    let store = MemoryKvStore::new();
    store.set(STEP_KEY, "2").unwrap();
    store.set(DRAFT_KEY, r#"{"age": 130, "income": 1000}"#).unwrap();
    let mock = Arc::new(MockOnboardingApi::new());
    let api: Arc<dyn OnboardingApi> = mock.clone();
    let mut wizard = WizardController::open(DraftStore::new(store), api);

    let err = wizard.submit().await.unwrap_err();
    assert!(matches!(err, WizardError::Validation(_)));
    assert_eq!(mock.create_count(), 0);
    assert_eq!(wizard.step_index(), 2);
}

#[tokio::test]
async fn test_successful_submit_clears_store() {
    let (mut wizard, mock) = ready_to_submit();
    let user_id = Uuid::new_v4();
    wizard.update_field(DraftUpdate::UserId(user_id)).unwrap();

    let outcome = wizard.submit().await.unwrap();

    assert_eq!(outcome.user_id, user_id);
    assert_eq!(outcome.score, Some(72));
    assert_eq!(mock.create_count(), 1);
    assert_eq!(wizard.store.inner().get(DRAFT_KEY).unwrap(), None);
    assert_eq!(wizard.store.inner().get(STEP_KEY).unwrap(), None);
    assert!(wizard.draft().is_empty());
    assert_eq!(wizard.step_index(), 0);
    assert_eq!(wizard.status(), WizardStatus::Submitted(outcome));
}

#[tokio::test]
async fn test_unscored_session_has_no_score() {
    let (mut wizard, mock) = ready_to_submit();
    mock.set_score(None);

    let outcome = wizard.submit().await.unwrap();
    assert_eq!(outcome.score, None);
    assert_eq!(mock.sessions()[0].score, None);
}

#[tokio::test]
async fn test_submit_generates_user_id_and_sends_camel_case() {
    let (mut wizard, mock) = ready_to_submit();
    wizard
        .update_field(DraftUpdate::RiskFlags(BTreeSet::from(["pep".to_string()])))
        .unwrap();

    let outcome = wizard.submit().await.unwrap();
    let request = mock.last_create().unwrap();
    assert_eq!(request.user_id, outcome.user_id);
    assert!(!request.user_id.is_nil());

    let json = serde_json::to_value(&request).unwrap();
    assert_eq!(json["rawInput"]["personalInfo"]["employment"], "full-time");
    assert_eq!(json["rawInput"]["preferences"]["riskTolerance"], "moderate");
    assert_eq!(json["rawInput"]["flags"][0], "pep");
}

#[tokio::test]
async fn test_failed_submit_keeps_draft_and_can_retry() {
    let (mut wizard, mock) = ready_to_submit();
    mock.fail_next_create(ApiError::new("SCORING_UNAVAILABLE", "try later").with_status(503));

    let err = wizard.submit().await.unwrap_err();
    let WizardError::Api(api_error) = err else {
        panic!("expected api error");
    };
    assert_eq!(api_error.code, "SCORING_UNAVAILABLE");
    assert!(matches!(wizard.status(), WizardStatus::Failed(_)));
    assert_eq!(wizard.step_index(), 2);
    assert_eq!(wizard.draft().age, Some(35));
    assert!(wizard.store.inner().get(DRAFT_KEY).unwrap().is_some());

    // Nothing retried on its own; the user retries explicitly
    assert_eq!(mock.create_count(), 1);
    wizard.submit().await.unwrap();
    assert_eq!(mock.create_count(), 2);
}

#[tokio::test]
async fn test_edit_after_failure_returns_to_editing() {
    let (mut wizard, mock) = ready_to_submit();
    mock.fail_next_create(ApiError::network("connection refused"));
    wizard.submit().await.unwrap_err();

    wizard.update_field(DraftUpdate::Income(80_000.0)).unwrap();
    assert_eq!(
        wizard.status(),
        WizardStatus::Editing(WizardStep::Review)
    );
}

#[tokio::test]
async fn test_submitted_is_terminal_until_reset() {
    let (mut wizard, _) = ready_to_submit();
    wizard.submit().await.unwrap();

    assert!(matches!(
        wizard.update_field(DraftUpdate::Age(40)),
        Err(WizardError::AlreadySubmitted)
    ));
    assert!(matches!(wizard.advance(), Err(WizardError::AlreadySubmitted)));
    assert!(matches!(wizard.retreat(), Err(WizardError::AlreadySubmitted)));
    assert!(matches!(
        wizard.submit().await,
        Err(WizardError::AlreadySubmitted)
    ));

    wizard.reset();
    assert_eq!(
        wizard.status(),
        WizardStatus::Editing(WizardStep::BasicInfo)
    );
    wizard.update_field(DraftUpdate::Age(40)).unwrap();
}

#[tokio::test]
async fn test_reset_discards_everything() {
    let (mut wizard, mock) = ready_to_submit();
    wizard.reset();

    assert!(wizard.draft().is_empty());
    assert_eq!(wizard.step_index(), 0);
    assert_eq!(wizard.store.inner().get(DRAFT_KEY).unwrap(), None);
    assert_eq!(mock.create_count(), 0);
}

#[tokio::test]
async fn test_submit_invalidates_history_and_primes_session() {
    let mock = Arc::new(MockOnboardingApi::with_sessions(3));
    let api: Arc<dyn OnboardingApi> = mock.clone();
    let cache = Arc::new(SessionCache::new(
        Arc::clone(&api),
        CachePolicy {
            retry_base_delay: Duration::from_millis(1),
            ..CachePolicy::default()
        },
    ));
    let key = PageKey::new(None, 1, 10);
    cache.fetch_page(key).await.unwrap();

    let mut wizard = WizardController::open(DraftStore::new(MemoryKvStore::new()), api)
        .with_cache(Arc::clone(&cache));
    fill_basic_info(&mut wizard);
    wizard.advance().unwrap();
    fill_preferences(&mut wizard);
    wizard.advance().unwrap();
    let outcome = wizard.submit().await.unwrap();

    assert_eq!(
        cache.entry_state(&key).await,
        Some(CacheState::Invalidated)
    );
    let page = cache.fetch_page(key).await.unwrap();
    assert_eq!(page.total, 4);
    assert_eq!(page.items[0].id, outcome.session_id);
    assert_eq!(mock.list_count(), 2);

    cache.session(outcome.session_id).await.unwrap();
    assert_eq!(mock.get_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}
