//! Wizard step definitions

use crate::types::DraftField;

/// Number of wizard steps
pub const STEP_COUNT: usize = 3;

/// Steps of the onboarding wizard, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WizardStep {
    /// Age, income, employment and education
    BasicInfo,
    /// Risk tolerance, goals and horizon
    Preferences,
    /// Summary of everything entered, optional flags, submit
    Review,
}

impl WizardStep {
    pub fn all() -> &'static [WizardStep] {
        &[
            WizardStep::BasicInfo,
            WizardStep::Preferences,
            WizardStep::Review,
        ]
    }

    pub fn index(&self) -> usize {
        match self {
            WizardStep::BasicInfo => 0,
            WizardStep::Preferences => 1,
            WizardStep::Review => 2,
        }
    }

    /// Step at `index`, clamped to the last step
    pub fn from_index(index: usize) -> Self {
        match index {
            0 => WizardStep::BasicInfo,
            1 => WizardStep::Preferences,
            _ => WizardStep::Review,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            WizardStep::BasicInfo => "Basic Information",
            WizardStep::Preferences => "Preferences",
            WizardStep::Review => "Review & Submit",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            WizardStep::BasicInfo => "Tell us about yourself",
            WizardStep::Preferences => "Your investment preferences",
            WizardStep::Review => "Review your information",
        }
    }

    /// Fields validated when leaving this step
    pub fn fields(&self) -> &'static [DraftField] {
        match self {
            WizardStep::BasicInfo => &[
                DraftField::Age,
                DraftField::Income,
                DraftField::Employment,
                DraftField::Education,
            ],
            WizardStep::Preferences => &[
                DraftField::RiskTolerance,
                DraftField::InvestmentGoals,
                DraftField::TimeHorizon,
            ],
            WizardStep::Review => &[],
        }
    }

    /// The step a field is entered on. Flags and the user id are not owned
    /// by a gated step and report `Review`.
    pub fn owning(field: DraftField) -> Self {
        Self::all()
            .iter()
            .copied()
            .find(|step| step.fields().contains(&field))
            .unwrap_or(WizardStep::Review)
    }

    pub fn is_last(&self) -> bool {
        self.index() == STEP_COUNT - 1
    }
}
