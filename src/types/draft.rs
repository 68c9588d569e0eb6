//! Wizard draft: the locally held, possibly incomplete financial profile

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Investment goals offered by the preferences step.
/// Free-text goals are accepted as well; these are the suggested values.
pub const INVESTMENT_GOAL_OPTIONS: &[(&str, &str)] = &[
    ("retirement", "Retirement Planning"),
    ("wealth-building", "Wealth Building"),
    ("income", "Generate Income"),
    ("education", "Education Funding"),
    ("emergency", "Emergency Fund"),
    ("other", "Other"),
];

/// Self-reported risk flags offered on the review step
pub const RISK_FLAG_OPTIONS: &[(&str, &str)] = &[
    ("high-debt", "I have significant debt (credit cards, loans)"),
    ("no-emergency-fund", "I do not have an emergency fund"),
    ("unstable-income", "My income is irregular or unstable"),
    ("new-to-investing", "I am completely new to investing"),
    ("need-immediate-liquidity", "I may need this money within the next year"),
    ("no-financial-goals", "I do not have clear financial goals"),
];

/// Employment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Employment {
    FullTime,
    PartTime,
    Unemployed,
    SelfEmployed,
    Retired,
}

impl Employment {
    pub fn all() -> &'static [Employment] {
        &[
            Employment::FullTime,
            Employment::PartTime,
            Employment::Unemployed,
            Employment::SelfEmployed,
            Employment::Retired,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Employment::FullTime => "full-time",
            Employment::PartTime => "part-time",
            Employment::Unemployed => "unemployed",
            Employment::SelfEmployed => "self-employed",
            Employment::Retired => "retired",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Employment::FullTime => "Full-time",
            Employment::PartTime => "Part-time",
            Employment::Unemployed => "Unemployed",
            Employment::SelfEmployed => "Self-employed",
            Employment::Retired => "Retired",
        }
    }
}

/// Highest completed education level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Education {
    HighSchool,
    Bachelors,
    Masters,
    Phd,
    Other,
}

impl Education {
    pub fn all() -> &'static [Education] {
        &[
            Education::HighSchool,
            Education::Bachelors,
            Education::Masters,
            Education::Phd,
            Education::Other,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Education::HighSchool => "high-school",
            Education::Bachelors => "bachelors",
            Education::Masters => "masters",
            Education::Phd => "phd",
            Education::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Education::HighSchool => "High School",
            Education::Bachelors => "Bachelor's Degree",
            Education::Masters => "Master's Degree",
            Education::Phd => "PhD",
            Education::Other => "Other",
        }
    }
}

/// Appetite for investment risk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskTolerance {
    Low,
    Moderate,
    High,
}

impl RiskTolerance {
    pub fn all() -> &'static [RiskTolerance] {
        &[
            RiskTolerance::Low,
            RiskTolerance::Moderate,
            RiskTolerance::High,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTolerance::Low => "low",
            RiskTolerance::Moderate => "moderate",
            RiskTolerance::High => "high",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RiskTolerance::Low => "Low - Minimize risk, preserve capital",
            RiskTolerance::Moderate => "Moderate - Balanced risk and return",
            RiskTolerance::High => "High - Higher risk for higher potential returns",
        }
    }
}

/// How long the user intends to stay invested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeHorizon {
    Short,
    Medium,
    Long,
}

impl TimeHorizon {
    pub fn all() -> &'static [TimeHorizon] {
        &[TimeHorizon::Short, TimeHorizon::Medium, TimeHorizon::Long]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeHorizon::Short => "short",
            TimeHorizon::Medium => "medium",
            TimeHorizon::Long => "long",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TimeHorizon::Short => "Short term (< 3 years)",
            TimeHorizon::Medium => "Medium term (3-10 years)",
            TimeHorizon::Long => "Long term (> 10 years)",
        }
    }
}

/// Error produced when a raw string does not name a known option
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{value}' is not one of: {expected}")]
pub struct UnknownOption {
    pub value: String,
    pub expected: String,
}

macro_rules! option_from_str {
    ($ty:ident) => {
        impl FromStr for $ty {
            type Err = UnknownOption;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let needle = s.trim().to_ascii_lowercase().replace('_', "-");
                $ty::all()
                    .iter()
                    .copied()
                    .find(|opt| opt.as_str() == needle)
                    .ok_or_else(|| UnknownOption {
                        value: s.to_string(),
                        expected: $ty::all()
                            .iter()
                            .map(|opt| opt.as_str())
                            .collect::<Vec<_>>()
                            .join(", "),
                    })
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

option_from_str!(Employment);
option_from_str!(Education);
option_from_str!(RiskTolerance);
option_from_str!(TimeHorizon);

/// Field names of the draft, in form order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DraftField {
    UserId,
    Age,
    Income,
    Employment,
    Education,
    RiskTolerance,
    InvestmentGoals,
    TimeHorizon,
    RiskFlags,
}

impl DraftField {
    pub fn all() -> &'static [DraftField] {
        &[
            DraftField::UserId,
            DraftField::Age,
            DraftField::Income,
            DraftField::Employment,
            DraftField::Education,
            DraftField::RiskTolerance,
            DraftField::InvestmentGoals,
            DraftField::TimeHorizon,
            DraftField::RiskFlags,
        ]
    }

    /// Key used in the persisted JSON form and on the CLI
    pub fn key(&self) -> &'static str {
        match self {
            DraftField::UserId => "userId",
            DraftField::Age => "age",
            DraftField::Income => "income",
            DraftField::Employment => "employment",
            DraftField::Education => "education",
            DraftField::RiskTolerance => "riskTolerance",
            DraftField::InvestmentGoals => "investmentGoals",
            DraftField::TimeHorizon => "timeHorizon",
            DraftField::RiskFlags => "flags",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DraftField::UserId => "User ID",
            DraftField::Age => "Age",
            DraftField::Income => "Annual Income",
            DraftField::Employment => "Employment Status",
            DraftField::Education => "Education Level",
            DraftField::RiskTolerance => "Risk Tolerance",
            DraftField::InvestmentGoals => "Investment Goals",
            DraftField::TimeHorizon => "Time Horizon",
            DraftField::RiskFlags => "Risk Flags",
        }
    }

    /// Suggested values for free-form list fields, as `(value, label)`
    pub fn suggestions(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            DraftField::InvestmentGoals => INVESTMENT_GOAL_OPTIONS,
            DraftField::RiskFlags => RISK_FLAG_OPTIONS,
            _ => &[],
        }
    }
}

impl fmt::Display for DraftField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for DraftField {
    type Err = UnknownOption;

    /// Accepts the camelCase key as well as kebab/snake spellings
    /// (`riskTolerance`, `risk-tolerance`, `risk_tolerance`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        let found = match normalized.as_str() {
            "userid" | "user" => Some(DraftField::UserId),
            "age" => Some(DraftField::Age),
            "income" => Some(DraftField::Income),
            "employment" => Some(DraftField::Employment),
            "education" => Some(DraftField::Education),
            "risktolerance" | "risk" => Some(DraftField::RiskTolerance),
            "investmentgoals" | "goals" => Some(DraftField::InvestmentGoals),
            "timehorizon" | "horizon" => Some(DraftField::TimeHorizon),
            "flags" | "riskflags" => Some(DraftField::RiskFlags),
            _ => None,
        };
        found.ok_or_else(|| UnknownOption {
            value: s.to_string(),
            expected: DraftField::all()
                .iter()
                .map(DraftField::key)
                .collect::<Vec<_>>()
                .join(", "),
        })
    }
}

/// Partial financial profile collected by the wizard.
///
/// Every field is optional. Values are stored as entered, so an out-of-range
/// age can sit in the draft until the owning step is validated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub income: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employment: Option<Employment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub education: Option<Education>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_tolerance: Option<RiskTolerance>,
    #[serde(default)]
    pub investment_goals: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_horizon: Option<TimeHorizon>,
    #[serde(default, rename = "flags")]
    pub risk_flags: BTreeSet<String>,
}

impl WizardDraft {
    /// True when no field has been filled in
    pub fn is_empty(&self) -> bool {
        *self == WizardDraft::default()
    }

    /// Whether a field holds a value (empty sets count as absent)
    pub fn has(&self, field: DraftField) -> bool {
        match field {
            DraftField::UserId => self.user_id.is_some(),
            DraftField::Age => self.age.is_some(),
            DraftField::Income => self.income.is_some(),
            DraftField::Employment => self.employment.is_some(),
            DraftField::Education => self.education.is_some(),
            DraftField::RiskTolerance => self.risk_tolerance.is_some(),
            DraftField::InvestmentGoals => !self.investment_goals.is_empty(),
            DraftField::TimeHorizon => self.time_horizon.is_some(),
            DraftField::RiskFlags => !self.risk_flags.is_empty(),
        }
    }

    /// Apply a single typed update
    pub fn apply(&mut self, update: DraftUpdate) {
        match update {
            DraftUpdate::UserId(v) => self.user_id = Some(v),
            DraftUpdate::Age(v) => self.age = Some(v),
            DraftUpdate::Income(v) => self.income = Some(v),
            DraftUpdate::Employment(v) => self.employment = Some(v),
            DraftUpdate::Education(v) => self.education = Some(v),
            DraftUpdate::RiskTolerance(v) => self.risk_tolerance = Some(v),
            DraftUpdate::InvestmentGoals(v) => self.investment_goals = v,
            DraftUpdate::TimeHorizon(v) => self.time_horizon = Some(v),
            DraftUpdate::RiskFlags(v) => self.risk_flags = v,
        }
    }

    /// Remove a field's value
    pub fn clear(&mut self, field: DraftField) {
        match field {
            DraftField::UserId => self.user_id = None,
            DraftField::Age => self.age = None,
            DraftField::Income => self.income = None,
            DraftField::Employment => self.employment = None,
            DraftField::Education => self.education = None,
            DraftField::RiskTolerance => self.risk_tolerance = None,
            DraftField::InvestmentGoals => self.investment_goals.clear(),
            DraftField::TimeHorizon => self.time_horizon = None,
            DraftField::RiskFlags => self.risk_flags.clear(),
        }
    }

    /// Render a field's current value for display
    pub fn display_value(&self, field: DraftField) -> Option<String> {
        match field {
            DraftField::UserId => self.user_id.map(|v| v.to_string()),
            DraftField::Age => self.age.map(|v| v.to_string()),
            DraftField::Income => self.income.map(|v| format!("{:.2}", v)),
            DraftField::Employment => self.employment.map(|v| v.label().to_string()),
            DraftField::Education => self.education.map(|v| v.label().to_string()),
            DraftField::RiskTolerance => self.risk_tolerance.map(|v| v.as_str().to_string()),
            DraftField::InvestmentGoals => join_set(&self.investment_goals),
            DraftField::TimeHorizon => self.time_horizon.map(|v| v.label().to_string()),
            DraftField::RiskFlags => join_set(&self.risk_flags),
        }
    }
}

fn join_set(set: &BTreeSet<String>) -> Option<String> {
    if set.is_empty() {
        None
    } else {
        Some(set.iter().cloned().collect::<Vec<_>>().join(", "))
    }
}

/// A typed write to one draft field
#[derive(Debug, Clone, PartialEq)]
pub enum DraftUpdate {
    UserId(Uuid),
    Age(i64),
    Income(f64),
    Employment(Employment),
    Education(Education),
    RiskTolerance(RiskTolerance),
    InvestmentGoals(BTreeSet<String>),
    TimeHorizon(TimeHorizon),
    RiskFlags(BTreeSet<String>),
}

impl DraftUpdate {
    /// The field this update writes
    pub fn field(&self) -> DraftField {
        match self {
            DraftUpdate::UserId(_) => DraftField::UserId,
            DraftUpdate::Age(_) => DraftField::Age,
            DraftUpdate::Income(_) => DraftField::Income,
            DraftUpdate::Employment(_) => DraftField::Employment,
            DraftUpdate::Education(_) => DraftField::Education,
            DraftUpdate::RiskTolerance(_) => DraftField::RiskTolerance,
            DraftUpdate::InvestmentGoals(_) => DraftField::InvestmentGoals,
            DraftUpdate::TimeHorizon(_) => DraftField::TimeHorizon,
            DraftUpdate::RiskFlags(_) => DraftField::RiskFlags,
        }
    }

    /// Parse raw text (as typed on the command line) into a typed update.
    ///
    /// Only the shape is checked here. Range rules (age 18-100, income >= 0)
    /// are applied when the owning step is validated.
    pub fn parse(field: DraftField, raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        match field {
            DraftField::UserId => Uuid::parse_str(raw)
                .map(DraftUpdate::UserId)
                .map_err(|_| format!("'{}' is not a valid UUID", raw)),
            DraftField::Age => raw
                .parse::<i64>()
                .map(DraftUpdate::Age)
                .map_err(|_| "Age must be a whole number".to_string()),
            DraftField::Income => raw
                .replace(',', "")
                .parse::<f64>()
                .map(DraftUpdate::Income)
                .map_err(|_| "Income must be a number".to_string()),
            DraftField::Employment => raw
                .parse()
                .map(DraftUpdate::Employment)
                .map_err(|e: UnknownOption| e.to_string()),
            DraftField::Education => raw
                .parse()
                .map(DraftUpdate::Education)
                .map_err(|e: UnknownOption| e.to_string()),
            DraftField::RiskTolerance => raw
                .parse()
                .map(DraftUpdate::RiskTolerance)
                .map_err(|e: UnknownOption| e.to_string()),
            DraftField::TimeHorizon => raw
                .parse()
                .map(DraftUpdate::TimeHorizon)
                .map_err(|e: UnknownOption| e.to_string()),
            DraftField::InvestmentGoals => Ok(DraftUpdate::InvestmentGoals(split_list(raw))),
            DraftField::RiskFlags => Ok(DraftUpdate::RiskFlags(split_list(raw))),
        }
    }
}

/// Split a comma separated list, dropping blanks
fn split_list(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
