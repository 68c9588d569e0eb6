//! Draft persistence for the onboarding wizard.
//!
//! The draft and the current step index live under two keys in a [`KvStore`].
//! All persistence here is best effort: store failures are logged and the
//! wizard keeps working from memory.

pub mod store;

pub use store::{FileKvStore, KvStore, MemoryKvStore, StoreError};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::types::WizardDraft;
use crate::wizard::STEP_COUNT;

/// Key holding the JSON-encoded draft
pub const DRAFT_KEY: &str = "onboarding-form-data";
/// Key holding the current step index as a decimal string
pub const STEP_KEY: &str = "onboarding-current-step";

/// Persists and recovers the wizard draft and step index
pub struct DraftStore<S: KvStore> {
    store: S,
}

impl<S: KvStore> DraftStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn inner(&self) -> &S {
        &self.store
    }

    /// Persist the draft, overwriting any previous one
    pub fn save(&self, draft: &WizardDraft) {
        let encoded = match serde_json::to_string(draft) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!("Failed to encode draft: {}", e);
                return;
            }
        };
        if let Err(e) = self.store.set(DRAFT_KEY, &encoded) {
            warn!("Failed to save draft: {}", e);
        }
    }

    /// Persist the step index, clamped into range
    pub fn save_step(&self, step: usize) {
        let step = step.min(STEP_COUNT - 1);
        if let Err(e) = self.store.set(STEP_KEY, &step.to_string()) {
            warn!("Failed to save wizard step: {}", e);
        }
    }

    /// Recover the draft.
    ///
    /// Returns an empty draft when nothing is stored or the stored value is
    /// not a JSON object. Fields are decoded one at a time, so a single
    /// malformed field is dropped without discarding the rest.
    pub fn load(&self) -> WizardDraft {
        let raw = match self.store.get(DRAFT_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return WizardDraft::default(),
            Err(e) => {
                warn!("Failed to read draft: {}", e);
                return WizardDraft::default();
            }
        };

        let object = match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(object)) => object,
            Ok(_) | Err(_) => {
                warn!("Stored draft is not a JSON object; starting fresh");
                return WizardDraft::default();
            }
        };

        decode_draft(&object)
    }

    /// Recover the step index.
    ///
    /// Anything that is not an integer in `0..STEP_COUNT` is treated as
    /// corrupt: the entry is purged and 0 is returned.
    pub fn load_step(&self) -> usize {
        let raw = match self.store.get(STEP_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return 0,
            Err(e) => {
                warn!("Failed to read wizard step: {}", e);
                return 0;
            }
        };

        match raw.trim().parse::<i64>() {
            Ok(step) if (0..STEP_COUNT as i64).contains(&step) => step as usize,
            _ => {
                warn!(value = %raw, "Stored wizard step is out of range; resetting to 0");
                if let Err(e) = self.store.remove(STEP_KEY) {
                    warn!("Failed to purge wizard step: {}", e);
                }
                0
            }
        }
    }

    /// Remove both entries. Safe when nothing is stored.
    pub fn clear(&self) {
        for key in [DRAFT_KEY, STEP_KEY] {
            if let Err(e) = self.store.remove(key) {
                warn!("Failed to clear {}: {}", key, e);
            }
        }
    }
}

fn decode_draft(object: &Map<String, Value>) -> WizardDraft {
    WizardDraft {
        user_id: field(object, "userId"),
        age: field(object, "age"),
        income: field::<f64>(object, "income").filter(|v| v.is_finite()),
        employment: field(object, "employment"),
        education: field(object, "education"),
        risk_tolerance: field(object, "riskTolerance"),
        investment_goals: field(object, "investmentGoals").unwrap_or_default(),
        time_horizon: field(object, "timeHorizon"),
        risk_flags: field(object, "flags").unwrap_or_default(),
    }
}

fn field<T: DeserializeOwned>(object: &Map<String, Value>, key: &str) -> Option<T> {
    let value = object.get(key)?;
    if value.is_null() {
        return None;
    }
    match serde_json::from_value(value.clone()) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            debug!(field = key, "Dropping malformed draft field: {}", e);
            None
        }
    }
}
