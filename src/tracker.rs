//! Submission and lookup workflows.
//!
//! These glue the storage port to the scorers and the reconciler. Stored
//! records are only ever appended; every comparison shown to a participant is
//! derived from the log at read time.

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{
    pair_entries, AssessmentSnapshot, KpiEntry, KpiProgress, NewAssessment, ProgressDraft,
    ProgressUpdate, ReconcileContext, FINAL_REVIEW_WEEK,
};
use crate::reconcile::{self, dedup_stable};
use crate::scoring::{score_baseline, score_comprehensive, ComprehensiveInput};
use crate::store::{AssessmentStore, StoreError};

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("no assessment with id {0}")]
    AssessmentNotFound(Uuid),

    #[error("no assessment found for {0}")]
    NoAssessmentForEmail(String),

    #[error("assessment {0} has already completed its final review")]
    ProgramComplete(Uuid),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Everything the scorecard view needs for one participant.
#[derive(Debug, Clone)]
pub struct Scorecard {
    pub assessment: AssessmentSnapshot,
    /// Check-ins sorted by week, then by `updated_at`.
    pub history: Vec<ProgressUpdate>,
    pub context: ReconcileContext,
    pub progress: Vec<KpiProgress>,
    pub improvements: Vec<String>,
    pub achievements: Vec<String>,
}

impl Scorecard {
    pub fn build(
        assessment: AssessmentSnapshot,
        mut history: Vec<ProgressUpdate>,
        context: ReconcileContext,
    ) -> Self {
        history.sort_by_key(|u| (u.week_number, u.updated_at));
        let progress = reconcile::reconcile_progress(&assessment, &history, context);
        let improvements = reconcile::cumulative_improvements(&history);
        let achievements = reconcile::cumulative_achievements(&history);
        Self {
            assessment,
            history,
            context,
            progress,
            improvements,
            achievements,
        }
    }

    pub fn latest(&self) -> Option<&ProgressUpdate> {
        self.history.last()
    }

    /// Most recent persisted score, falling back to the baseline.
    pub fn current_score(&self) -> u8 {
        self.latest()
            .map_or(self.assessment.baseline_score, |u| u.current_score)
    }

    pub fn score_change(&self) -> i32 {
        i32::from(self.current_score()) - i32::from(self.assessment.baseline_score)
    }
}

/// Scores and stores a new baseline. Returns its id and baseline score.
pub async fn submit_assessment<S>(
    store: &S,
    assessment: NewAssessment,
) -> Result<(Uuid, u8), TrackerError>
where
    S: AssessmentStore + ?Sized,
{
    check_confidence(assessment.sales_confidence)?;
    if assessment.email.trim().is_empty() {
        return Err(TrackerError::InvalidInput("email is required".to_string()));
    }

    let score = score_baseline(
        assessment.sales_confidence,
        &assessment.selected_kpis,
        &assessment.selected_non_financial_kpis,
        assessment.revenue_forecast_confidence,
        assessment.job_descriptions_clarity,
    );

    let snapshot = AssessmentSnapshot::from_new(Uuid::new_v4(), assessment, score);
    let id = store.create_assessment(&snapshot).await?;
    info!(assessment_id = %id, score, "baseline assessment stored");
    Ok((id, score))
}

/// Records the next weekly check-in and returns the "just submitted" view,
/// which compares every KPI against the baseline.
pub async fn submit_progress<S>(
    store: &S,
    assessment_id: Uuid,
    draft: ProgressDraft,
) -> Result<Scorecard, TrackerError>
where
    S: AssessmentStore + ?Sized,
{
    check_confidence(draft.sales_confidence_after)?;

    let assessment = load_assessment(store, assessment_id).await?;
    let mut history = store.get_progress_updates(assessment_id).await?;

    let week_number = history.iter().map(|u| u.week_number).max().unwrap_or(0) + 1;
    if week_number > FINAL_REVIEW_WEEK {
        warn!(assessment_id = %assessment_id, "update rejected after final review");
        return Err(TrackerError::ProgramComplete(assessment_id));
    }

    let kpi_updates = carry_forward_goals(&assessment.selected_kpis, &draft.kpi_updates);
    let non_financial_kpi_updates = carry_forward_goals(
        &assessment.selected_non_financial_kpis,
        &draft.non_financial_kpi_updates,
    );

    let earlier = history.iter();
    let all_improvements = dedup_stable(
        earlier
            .clone()
            .flat_map(|u| u.new_improvements.iter())
            .chain(draft.new_improvements.iter()),
    );
    let all_achievements = dedup_stable(
        earlier
            .flat_map(|u| u.new_achievements.iter())
            .chain(draft.new_achievements.iter()),
    );

    let current_score = score_comprehensive(&ComprehensiveInput {
        confidence_before: assessment.sales_confidence,
        confidence_after: draft.sales_confidence_after,
        baseline_financial: &assessment.selected_kpis,
        current_financial: &kpi_updates,
        baseline_non_financial: &assessment.selected_non_financial_kpis,
        current_non_financial: &non_financial_kpi_updates,
        revenue_forecast_confidence: draft.revenue_forecast_confidence,
        job_descriptions_clarity: draft.job_descriptions_clarity,
        cumulative_improvements: &all_improvements,
        cumulative_achievements: &all_achievements,
    });

    let update = ProgressUpdate {
        id: Uuid::new_v4(),
        assessment_id,
        week_number,
        sales_confidence_after: draft.sales_confidence_after,
        kpi_updates,
        non_financial_kpi_updates,
        revenue_forecast_confidence: draft.revenue_forecast_confidence,
        job_descriptions_clarity: draft.job_descriptions_clarity,
        new_improvements: draft.new_improvements,
        new_achievements: draft.new_achievements,
        notes: draft.notes,
        current_score,
        updated_at: Utc::now(),
    };

    store.create_progress_update(&update).await?;
    info!(
        assessment_id = %assessment_id,
        week = week_number,
        score = current_score,
        baseline = assessment.baseline_score,
        "progress update stored"
    );

    history.push(update);
    Ok(Scorecard::build(
        assessment,
        history,
        ReconcileContext::Immediate,
    ))
}

/// "View my current results": latest assessment for an email, compared
/// week over week.
pub async fn lookup_results<S>(store: &S, email: &str) -> Result<Scorecard, TrackerError>
where
    S: AssessmentStore + ?Sized,
{
    let assessment = match store.get_assessment_by_email(email).await {
        Ok(assessment) => assessment,
        Err(StoreError::NotFound(_)) => {
            return Err(TrackerError::NoAssessmentForEmail(email.to_string()))
        }
        Err(err) => return Err(err.into()),
    };
    let history = store.get_progress_updates(assessment.id).await?;
    debug!(assessment_id = %assessment.id, weeks = history.len(), "results looked up");
    Ok(Scorecard::build(assessment, history, ReconcileContext::Lookup))
}

/// Same as [`lookup_results`] but addressed by assessment id.
pub async fn results_for<S>(
    store: &S,
    assessment_id: Uuid,
    context: ReconcileContext,
) -> Result<Scorecard, TrackerError>
where
    S: AssessmentStore + ?Sized,
{
    let assessment = load_assessment(store, assessment_id).await?;
    let history = store.get_progress_updates(assessment_id).await?;
    Ok(Scorecard::build(assessment, history, context))
}

async fn load_assessment<S>(store: &S, id: Uuid) -> Result<AssessmentSnapshot, TrackerError>
where
    S: AssessmentStore + ?Sized,
{
    match store.get_assessment_by_id(id).await {
        Ok(assessment) => Ok(assessment),
        Err(StoreError::NotFound(_)) => Err(TrackerError::AssessmentNotFound(id)),
        Err(err) => Err(err.into()),
    }
}

fn check_confidence(value: i32) -> Result<(), TrackerError> {
    if (1..=5).contains(&value) {
        Ok(())
    } else {
        Err(TrackerError::InvalidInput(format!(
            "sales confidence must be between 1 and 5, got {value}"
        )))
    }
}

/// Builds the stored KPI list for a check-in: one entry per baseline KPI that
/// was re-measured, with the goal and label taken from the baseline.
fn carry_forward_goals(baseline: &[KpiEntry], updates: &[KpiEntry]) -> Vec<KpiEntry> {
    let carried: Vec<KpiEntry> = pair_entries(baseline, updates)
        .into_iter()
        .filter_map(|(base, update)| {
            update.map(|update| KpiEntry {
                kpi_key: base.kpi_key,
                current_value: update.current_value.trim().to_string(),
                goal_value: base.goal_value.clone(),
                custom_label: base.custom_label.clone(),
            })
        })
        .collect();

    if carried.len() < updates.len() {
        debug!(
            dropped = updates.len() - carried.len(),
            "ignored KPI updates with no baseline entry"
        );
    }
    carried
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FinancialKpi, KpiKey};

    #[test]
    fn goals_come_from_the_baseline() {
        let revenue = KpiKey::Financial(FinancialKpi::MonthlyRevenue);
        let retail = KpiKey::Financial(FinancialKpi::RetailAttachRate);
        let mut baseline = KpiEntry::new(revenue, "10000", "15000");
        baseline.custom_label = Some("kept".to_string());

        let carried = carry_forward_goals(
            &[baseline],
            &[
                KpiEntry::new(revenue, " 12000 ", "999999"),
                KpiEntry::new(retail, "5%", "10%"),
            ],
        );

        assert_eq!(carried.len(), 1);
        assert_eq!(carried[0].current_value, "12000");
        assert_eq!(carried[0].goal_value, "15000");
        assert_eq!(carried[0].custom_label.as_deref(), Some("kept"));
    }

    #[test]
    fn confidence_outside_the_scale_is_rejected() {
        assert!(check_confidence(0).is_err());
        assert!(check_confidence(6).is_err());
        assert!(check_confidence(3).is_ok());
    }
}
