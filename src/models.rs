use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::category::{lenient_answer, ForecastConfidence, JobClarity};

/// Number of weekly check-ins in the program; the last one is the final review.
pub const FINAL_REVIEW_WEEK: i32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FinancialKpi {
    RevenuePerAppointment,
    ConversionRate,
    AverageTreatmentValue,
    MonthlyRevenue,
    RebookingRate,
    RetailAttachRate,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NonFinancialKpi {
    TeamConfidence,
    PatientSatisfaction,
    ConsultationQuality,
    ReferralRate,
    TeamRetention,
    CustomNf,
}

impl FinancialKpi {
    pub const ALL: [FinancialKpi; 7] = [
        Self::RevenuePerAppointment,
        Self::ConversionRate,
        Self::AverageTreatmentValue,
        Self::MonthlyRevenue,
        Self::RebookingRate,
        Self::RetailAttachRate,
        Self::Custom,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::RevenuePerAppointment => "revenue_per_appointment",
            Self::ConversionRate => "conversion_rate",
            Self::AverageTreatmentValue => "average_treatment_value",
            Self::MonthlyRevenue => "monthly_revenue",
            Self::RebookingRate => "rebooking_rate",
            Self::RetailAttachRate => "retail_attach_rate",
            Self::Custom => "custom",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::RevenuePerAppointment => "Revenue per appointment",
            Self::ConversionRate => "Consultation conversion rate",
            Self::AverageTreatmentValue => "Average treatment value",
            Self::MonthlyRevenue => "Monthly revenue",
            Self::RebookingRate => "Rebooking rate",
            Self::RetailAttachRate => "Retail attach rate",
            Self::Custom => "Custom financial KPI",
        }
    }
}

impl NonFinancialKpi {
    pub const ALL: [NonFinancialKpi; 6] = [
        Self::TeamConfidence,
        Self::PatientSatisfaction,
        Self::ConsultationQuality,
        Self::ReferralRate,
        Self::TeamRetention,
        Self::CustomNf,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TeamConfidence => "team_confidence",
            Self::PatientSatisfaction => "patient_satisfaction",
            Self::ConsultationQuality => "consultation_quality",
            Self::ReferralRate => "referral_rate",
            Self::TeamRetention => "team_retention",
            Self::CustomNf => "custom_nf",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::TeamConfidence => "Team confidence",
            Self::PatientSatisfaction => "Patient satisfaction",
            Self::ConsultationQuality => "Consultation quality",
            Self::ReferralRate => "Referral rate",
            Self::TeamRetention => "Team retention",
            Self::CustomNf => "Custom KPI",
        }
    }
}

/// Identifies a metric from one of the two fixed catalogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum KpiKey {
    Financial(FinancialKpi),
    NonFinancial(NonFinancialKpi),
}

impl KpiKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Financial(kpi) => kpi.as_str(),
            Self::NonFinancial(kpi) => kpi.as_str(),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Financial(kpi) => kpi.label(),
            Self::NonFinancial(kpi) => kpi.label(),
        }
    }

    pub fn is_custom(self) -> bool {
        matches!(
            self,
            Self::Financial(FinancialKpi::Custom) | Self::NonFinancial(NonFinancialKpi::CustomNf)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown KPI key {0:?}")]
pub struct UnknownKpiKey(pub String);

impl FromStr for KpiKey {
    type Err = UnknownKpiKey;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if let Some(kpi) = FinancialKpi::ALL.into_iter().find(|k| k.as_str() == value) {
            return Ok(Self::Financial(kpi));
        }
        if let Some(kpi) = NonFinancialKpi::ALL.into_iter().find(|k| k.as_str() == value) {
            return Ok(Self::NonFinancial(kpi));
        }
        Err(UnknownKpiKey(value.to_string()))
    }
}

impl TryFrom<String> for KpiKey {
    type Error = UnknownKpiKey;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<KpiKey> for String {
    fn from(key: KpiKey) -> Self {
        key.as_str().to_string()
    }
}

impl fmt::Display for KpiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tracked metric as typed into a form. Values stay raw strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiEntry {
    pub kpi_key: KpiKey,
    #[serde(default)]
    pub current_value: String,
    #[serde(default)]
    pub goal_value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_label: Option<String>,
}

impl KpiEntry {
    pub fn new(kpi_key: KpiKey, current_value: &str, goal_value: &str) -> Self {
        Self {
            kpi_key,
            current_value: current_value.to_string(),
            goal_value: goal_value.to_string(),
            custom_label: None,
        }
    }

    pub fn display_label(&self) -> &str {
        match &self.custom_label {
            Some(label) if self.kpi_key.is_custom() && !label.trim().is_empty() => label,
            _ => self.kpi_key.label(),
        }
    }
}

/// Baseline form payload before it is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAssessment {
    pub participant_name: String,
    pub practice_name: String,
    pub email: String,
    pub sales_confidence: i32,
    #[serde(default, rename = "selectedKPIs")]
    pub selected_kpis: Vec<KpiEntry>,
    #[serde(default, rename = "selectedNonFinancialKPIs")]
    pub selected_non_financial_kpis: Vec<KpiEntry>,
    #[serde(default, deserialize_with = "lenient_answer")]
    pub revenue_forecast_confidence: Option<ForecastConfidence>,
    #[serde(default, deserialize_with = "lenient_answer")]
    pub job_descriptions_clarity: Option<JobClarity>,
    #[serde(default)]
    pub success_definition: String,
}

/// A persisted baseline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentSnapshot {
    pub id: Uuid,
    pub participant_name: String,
    pub practice_name: String,
    pub email: String,
    pub sales_confidence: i32,
    #[serde(rename = "selectedKPIs")]
    pub selected_kpis: Vec<KpiEntry>,
    #[serde(rename = "selectedNonFinancialKPIs")]
    pub selected_non_financial_kpis: Vec<KpiEntry>,
    pub revenue_forecast_confidence: Option<ForecastConfidence>,
    pub job_descriptions_clarity: Option<JobClarity>,
    pub success_definition: String,
    pub baseline_score: u8,
    pub created_at: DateTime<Utc>,
}

impl AssessmentSnapshot {
    pub fn from_new(id: Uuid, new: NewAssessment, baseline_score: u8) -> Self {
        Self {
            id,
            participant_name: new.participant_name,
            practice_name: new.practice_name,
            email: new.email,
            sales_confidence: new.sales_confidence,
            selected_kpis: new.selected_kpis,
            selected_non_financial_kpis: new.selected_non_financial_kpis,
            revenue_forecast_confidence: new.revenue_forecast_confidence,
            job_descriptions_clarity: new.job_descriptions_clarity,
            success_definition: new.success_definition,
            baseline_score,
            created_at: Utc::now(),
        }
    }
}

/// A weekly update as entered on the form, before week number and score exist.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressDraft {
    pub sales_confidence_after: i32,
    #[serde(default)]
    pub kpi_updates: Vec<KpiEntry>,
    #[serde(default)]
    pub non_financial_kpi_updates: Vec<KpiEntry>,
    #[serde(default, deserialize_with = "lenient_answer")]
    pub revenue_forecast_confidence: Option<ForecastConfidence>,
    #[serde(default, deserialize_with = "lenient_answer")]
    pub job_descriptions_clarity: Option<JobClarity>,
    #[serde(default)]
    pub new_improvements: Vec<String>,
    #[serde(default)]
    pub new_achievements: Vec<String>,
    #[serde(default)]
    pub notes: String,
}

/// A persisted weekly check-in. Never edited once stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub id: Uuid,
    pub assessment_id: Uuid,
    pub week_number: i32,
    pub sales_confidence_after: i32,
    pub kpi_updates: Vec<KpiEntry>,
    pub non_financial_kpi_updates: Vec<KpiEntry>,
    pub revenue_forecast_confidence: Option<ForecastConfidence>,
    pub job_descriptions_clarity: Option<JobClarity>,
    pub new_improvements: Vec<String>,
    pub new_achievements: Vec<String>,
    pub notes: String,
    pub current_score: u8,
    pub updated_at: DateTime<Utc>,
}

impl ProgressUpdate {
    pub fn is_final_review(&self) -> bool {
        self.week_number >= FINAL_REVIEW_WEEK
    }
}

/// Pairs each baseline entry with the update entry for the same KPI.
///
/// Entries are matched by key and by occurrence, so a second `custom` KPI in
/// the baseline pairs with the second `custom` KPI in the update.
pub fn pair_entries<'a>(
    baseline: &'a [KpiEntry],
    updates: &'a [KpiEntry],
) -> Vec<(&'a KpiEntry, Option<&'a KpiEntry>)> {
    baseline
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let occurrence = baseline[..index]
                .iter()
                .filter(|earlier| earlier.kpi_key == entry.kpi_key)
                .count();
            let matched = updates
                .iter()
                .filter(|update| update.kpi_key == entry.kpi_key)
                .nth(occurrence);
            (entry, matched)
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

impl Trend {
    pub fn arrow(self) -> &'static str {
        match self {
            Self::Up => "▲",
            Self::Down => "▼",
            Self::Stable => "■",
        }
    }
}

/// Before/after comparison for one KPI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiProgress {
    pub kpi_key: KpiKey,
    pub label: String,
    pub before_value: String,
    pub after_value: String,
    pub percentage_change: i64,
    pub trend: Trend,
    pub is_positive: bool,
}

/// Why a reconciliation is being displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcileContext {
    /// Right after a submission: compare against the baseline.
    Immediate,
    /// Returning to view results: compare the last two weeks.
    Lookup,
}
