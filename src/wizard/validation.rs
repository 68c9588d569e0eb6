//! Per-field and per-step validation of the draft

use thiserror::Error;

use super::steps::WizardStep;
use crate::types::{DraftField, WizardDraft};

pub const MIN_AGE: i64 = 18;
pub const MAX_AGE: i64 = 100;

/// A rule violation on one field
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}: {}", .field.label(), .message)]
pub struct FieldError {
    pub field: DraftField,
    pub message: String,
}

impl FieldError {
    pub fn new(field: DraftField, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// All field errors found while validating one or more steps
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("{}", join_errors(.errors))]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

fn join_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationErrors {
    pub fn single(error: FieldError) -> Self {
        Self {
            errors: vec![error],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    /// First error for `field`, if any
    pub fn get(&self, field: DraftField) -> Option<&FieldError> {
        self.errors.iter().find(|e| e.field == field)
    }

    fn push(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// Check one field on its own rule
pub fn validate_field(draft: &WizardDraft, field: DraftField) -> Option<FieldError> {
    let message = match field {
        DraftField::Age => match draft.age {
            None => Some("Age is required".to_string()),
            Some(age) if age < MIN_AGE => Some(format!("Age must be at least {}", MIN_AGE)),
            Some(age) if age > MAX_AGE => Some(format!("Age must be at most {}", MAX_AGE)),
            Some(_) => None,
        },
        DraftField::Income => match draft.income {
            None => Some("Income is required".to_string()),
            Some(income) if !income.is_finite() => Some("Income must be a number".to_string()),
            Some(income) if income < 0.0 => Some("Income must be positive".to_string()),
            Some(_) => None,
        },
        DraftField::Employment => draft
            .employment
            .is_none()
            .then(|| "Please select your employment status".to_string()),
        DraftField::Education => draft
            .education
            .is_none()
            .then(|| "Please select your education level".to_string()),
        DraftField::RiskTolerance => draft
            .risk_tolerance
            .is_none()
            .then(|| "Please select your risk tolerance".to_string()),
        DraftField::InvestmentGoals => draft
            .investment_goals
            .is_empty()
            .then(|| "Please select at least one investment goal".to_string()),
        DraftField::TimeHorizon => draft
            .time_horizon
            .is_none()
            .then(|| "Please select your time horizon".to_string()),
        // Optional
        DraftField::UserId | DraftField::RiskFlags => None,
    };
    message.map(|m| FieldError::new(field, m))
}

/// Validate only the fields owned by `step`
pub fn validate_step(draft: &WizardDraft, step: WizardStep) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    for field in step.fields() {
        if let Some(error) = validate_field(draft, *field) {
            errors.push(error);
        }
    }
    errors.into_result()
}

/// Validate every gated step, as done before submission
pub fn validate_all(draft: &WizardDraft) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    for step in WizardStep::all() {
        if let Err(step_errors) = validate_step(draft, *step) {
            for error in step_errors.errors {
                errors.push(error);
            }
        }
    }
    errors.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Education, Employment};

    fn basic_info() -> WizardDraft {
        WizardDraft {
            age: Some(35),
            income: Some(75_000.0),
            employment: Some(Employment::FullTime),
            education: Some(Education::Bachelors),
            ..Default::default()
        }
    }

    #[test]
    fn test_age_bounds() {
        let mut draft = basic_info();
        for (age, ok) in [(17, false), (18, true), (100, true), (101, false), (130, false)] {
            draft.age = Some(age);
            assert_eq!(validate_field(&draft, DraftField::Age).is_none(), ok, "age {}", age);
        }
        draft.age = Some(130);
        assert_eq!(
            validate_field(&draft, DraftField::Age).unwrap().message,
            "Age must be at most 100"
        );
    }

    #[test]
    fn test_income_rules() {
        let mut draft = basic_info();
        draft.income = Some(0.0);
        assert!(validate_field(&draft, DraftField::Income).is_none());
        draft.income = Some(-1.0);
        assert_eq!(
            validate_field(&draft, DraftField::Income).unwrap().message,
            "Income must be positive"
        );
        draft.income = Some(f64::NAN);
        assert!(validate_field(&draft, DraftField::Income).is_some());
    }

    #[test]
    fn test_step_validation_only_checks_owned_fields() {
        let draft = basic_info();
        assert!(validate_step(&draft, WizardStep::BasicInfo).is_ok());

        let errors = validate_step(&draft, WizardStep::Preferences).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.get(DraftField::InvestmentGoals).is_some());
        assert!(errors.get(DraftField::Age).is_none());
    }

    #[test]
    fn test_review_step_has_no_rules() {
        assert!(validate_step(&WizardDraft::default(), WizardStep::Review).is_ok());
    }

    #[test]
    fn test_validate_all_collects_every_step() {
        let errors = validate_all(&WizardDraft::default()).unwrap_err();
        assert_eq!(errors.len(), 7);
        assert!(errors.to_string().contains("Age is required"));
    }

    #[test]
    fn test_errors_display_joined_with_labels() {
        let draft = WizardDraft {
            age: Some(35),
            ..WizardDraft::default()
        };
        let errors = validate_step(&draft, WizardStep::BasicInfo).unwrap_err();
        assert_eq!(
            errors.to_string(),
            "Annual Income: Income is required; \
             Employment Status: Please select your employment status; \
             Education Level: Please select your education level"
        );
    }
}
