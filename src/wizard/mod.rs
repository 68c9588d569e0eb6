//! Onboarding wizard state machine.
//!
//! Collects the draft across three steps, gating each forward move on the
//! current step's validation, and submits the completed draft to the
//! onboarding service. The draft and step are persisted after every change
//! so an interrupted session resumes where it left off.

pub mod steps;
pub mod validation;

#[cfg(test)]
mod tests;

pub use steps::{WizardStep, STEP_COUNT};
pub use validation::{validate_all, validate_field, FieldError, ValidationErrors};

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::{ApiError, OnboardingApi};
use crate::draft::{DraftStore, KvStore};
use crate::history::{InvalidationScope, SessionCache};
use crate::types::{
    CreateSessionRequest, DraftField, DraftUpdate, PersonalInfo, Preferences, RawInput,
    WizardDraft,
};

/// Errors returned by wizard operations
#[derive(Debug, Clone, Error)]
pub enum WizardError {
    #[error("submit is only available on the last step (current step: {current})")]
    NotOnFinalStep { current: usize },

    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    #[error("submission failed: {0}")]
    Api(#[from] ApiError),

    #[error("onboarding already submitted; reset to start over")]
    AlreadySubmitted,
}

/// What a successful submission returns to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionOutcome {
    pub session_id: Uuid,
    pub user_id: Uuid,
    /// `None` while the service has not scored the session
    pub score: Option<u8>,
}

/// Externally visible lifecycle of the wizard
#[derive(Debug, Clone, PartialEq)]
pub enum WizardStatus {
    Editing(WizardStep),
    Submitting,
    Submitted(SubmissionOutcome),
    /// Last submission failed; behaves as editing the review step
    Failed(ApiError),
}

#[derive(Debug, Clone)]
enum Phase {
    Editing,
    Submitting,
    Submitted(SubmissionOutcome),
    Failed(ApiError),
}

/// Drives the wizard over a [`DraftStore`] and an [`OnboardingApi`]
pub struct WizardController<S: KvStore> {
    store: DraftStore<S>,
    api: Arc<dyn OnboardingApi>,
    cache: Option<Arc<SessionCache>>,
    draft: WizardDraft,
    step: usize,
    step_validity: BTreeMap<usize, bool>,
    phase: Phase,
}

impl<S: KvStore> WizardController<S> {
    /// Controller with an empty draft. Call [`load_initial_state`] to resume.
    ///
    /// [`load_initial_state`]: WizardController::load_initial_state
    pub fn new(store: DraftStore<S>, api: Arc<dyn OnboardingApi>) -> Self {
        Self {
            store,
            api,
            cache: None,
            draft: WizardDraft::default(),
            step: 0,
            step_validity: BTreeMap::new(),
            phase: Phase::Editing,
        }
    }

    /// Controller resumed from whatever the store holds
    pub fn open(store: DraftStore<S>, api: Arc<dyn OnboardingApi>) -> Self {
        let mut controller = Self::new(store, api);
        controller.load_initial_state();
        controller
    }

    /// Keep `cache` in sync with submissions
    pub fn with_cache(mut self, cache: Arc<SessionCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Recover draft and step from the store
    pub fn load_initial_state(&mut self) {
        self.draft = self.store.load();
        self.step = self.store.load_step();
        self.step_validity.clear();
        self.phase = Phase::Editing;
        debug!(step = self.step, "wizard state loaded");
    }

    pub fn draft(&self) -> &WizardDraft {
        &self.draft
    }

    pub fn step_index(&self) -> usize {
        self.step
    }

    pub fn current_step(&self) -> WizardStep {
        WizardStep::from_index(self.step)
    }

    pub fn step_validity(&self) -> &BTreeMap<usize, bool> {
        &self.step_validity
    }

    pub fn status(&self) -> WizardStatus {
        match &self.phase {
            Phase::Editing => WizardStatus::Editing(self.current_step()),
            Phase::Submitting => WizardStatus::Submitting,
            Phase::Submitted(outcome) => WizardStatus::Submitted(outcome.clone()),
            Phase::Failed(error) => WizardStatus::Failed(error.clone()),
        }
    }

    /// Validate `step` against the current draft without moving
    pub fn validate_step(&self, step: WizardStep) -> Result<(), ValidationErrors> {
        validation::validate_step(&self.draft, step)
    }

    fn ensure_editable(&mut self) -> Result<(), WizardError> {
        match self.phase {
            Phase::Submitted(_) => Err(WizardError::AlreadySubmitted),
            Phase::Failed(_) | Phase::Submitting => {
                self.phase = Phase::Editing;
                Ok(())
            }
            Phase::Editing => Ok(()),
        }
    }

    /// Write one field and persist the draft
    pub fn update_field(&mut self, update: DraftUpdate) -> Result<(), WizardError> {
        self.ensure_editable()?;
        let field = update.field();
        self.draft.apply(update);
        self.step_validity
            .remove(&WizardStep::owning(field).index());
        self.store.save(&self.draft);
        Ok(())
    }

    /// Parse `raw` for `field` and write it
    pub fn set_field(&mut self, field: DraftField, raw: &str) -> Result<(), WizardError> {
        if matches!(self.phase, Phase::Submitted(_)) {
            return Err(WizardError::AlreadySubmitted);
        }
        let update = DraftUpdate::parse(field, raw)
            .map_err(|message| ValidationErrors::single(FieldError::new(field, message)))?;
        self.update_field(update)
    }

    /// Remove one field and persist the draft
    pub fn clear_field(&mut self, field: DraftField) -> Result<(), WizardError> {
        self.ensure_editable()?;
        self.draft.clear(field);
        self.step_validity
            .remove(&WizardStep::owning(field).index());
        self.store.save(&self.draft);
        Ok(())
    }

    /// Validate the current step and move forward one step.
    ///
    /// On the last step this only re-validates; the step does not change.
    pub fn advance(&mut self) -> Result<WizardStep, WizardError> {
        self.ensure_editable()?;
        let current = self.current_step();
        let result = self.validate_step(current);
        self.step_validity.insert(self.step, result.is_ok());
        result?;

        self.step = (self.step + 1).min(STEP_COUNT - 1);
        self.store.save_step(self.step);
        debug!(step = self.step, "wizard advanced");
        Ok(self.current_step())
    }

    /// Move back one step without validating
    pub fn retreat(&mut self) -> Result<WizardStep, WizardError> {
        self.ensure_editable()?;
        self.step = self.step.saturating_sub(1);
        self.store.save_step(self.step);
        debug!(step = self.step, "wizard moved back");
        Ok(self.current_step())
    }

    /// Submit the completed draft.
    ///
    /// Only allowed on the last step. The whole draft is validated again
    /// before anything is sent. On failure the draft and step are kept and
    /// the error is returned as is; nothing is retried.
    pub async fn submit(&mut self) -> Result<SubmissionOutcome, WizardError> {
        if matches!(self.phase, Phase::Submitted(_)) {
            return Err(WizardError::AlreadySubmitted);
        }
        if self.step != STEP_COUNT - 1 {
            return Err(WizardError::NotOnFinalStep { current: self.step });
        }
        let request = match build_request(&self.draft) {
            Ok(request) => request,
            Err(errors) => {
                self.phase = Phase::Editing;
                return Err(errors.into());
            }
        };

        self.phase = Phase::Submitting;
        info!(user_id = %request.user_id, "submitting onboarding");

        match self.api.create_session(&request).await {
            Ok(session) => {
                let outcome = SubmissionOutcome {
                    session_id: session.id,
                    user_id: session.user_id,
                    score: session.score,
                };

                self.store.clear();
                self.draft = WizardDraft::default();
                self.step = 0;
                self.step_validity.clear();
                self.phase = Phase::Submitted(outcome.clone());

                if let Some(cache) = &self.cache {
                    cache.prime_session(session).await;
                    cache.invalidate(InvalidationScope::All).await;
                }

                info!(session_id = %outcome.session_id, score = ?outcome.score, "onboarding submitted");
                Ok(outcome)
            }
            Err(error) => {
                warn!(code = %error.code, "onboarding submission failed: {}", error.message);
                self.phase = Phase::Failed(error.clone());
                Err(WizardError::Api(error))
            }
        }
    }

    /// Discard the draft and start over from the first step
    pub fn reset(&mut self) {
        self.store.clear();
        self.draft = WizardDraft::default();
        self.step = 0;
        self.step_validity.clear();
        self.phase = Phase::Editing;
        debug!("wizard reset");
    }
}

/// Build the create request from a complete draft, generating a user id
/// when the draft carries none
pub fn build_request(draft: &WizardDraft) -> Result<CreateSessionRequest, ValidationErrors> {
    validate_all(draft)?;

    let (
        Some(age),
        Some(income),
        Some(employment),
        Some(education),
        Some(risk_tolerance),
        Some(time_horizon),
    ) = (
        draft.age,
        draft.income,
        draft.employment,
        draft.education,
        draft.risk_tolerance,
        draft.time_horizon,
    )
    else {
        // validate_all rejects every missing required field
        return Err(ValidationErrors::single(FieldError::new(
            DraftField::Age,
            "Draft is incomplete",
        )));
    };

    Ok(CreateSessionRequest {
        user_id: draft.user_id.unwrap_or_else(Uuid::new_v4),
        raw_input: RawInput {
            personal_info: PersonalInfo {
                age,
                income,
                employment,
                education,
            },
            preferences: Preferences {
                risk_tolerance,
                investment_goals: draft.investment_goals.iter().cloned().collect(),
                time_horizon,
            },
            flags: draft.risk_flags.iter().cloned().collect(),
        },
    })
}
