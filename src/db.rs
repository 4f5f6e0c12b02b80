use anyhow::Context;
use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::config::Config;
use crate::models::{
    AssessmentSnapshot, KpiEntry, KpiKey, NewAssessment, ProgressDraft, ProgressUpdate,
};
use crate::store::{AssessmentStore, StoreError, StoreResult};
use crate::tracker;

const SEED_EMAIL: &str = "dana.whitfield@glowaesthetics.example";

pub async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Postgres-backed [`AssessmentStore`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AssessmentStore for PgStore {
    async fn get_assessment_by_id(&self, id: Uuid) -> StoreResult<AssessmentSnapshot> {
        let row = sqlx::query(
            r#"
            SELECT id, participant_name, practice_name, email, sales_confidence,
                   selected_kpis, selected_non_financial_kpis,
                   revenue_forecast_confidence, job_descriptions_clarity,
                   success_definition, baseline_score, created_at
            FROM practice_scorecard.assessments
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => assessment_from_row(&row),
            None => Err(StoreError::NotFound(format!("assessment {id}"))),
        }
    }

    async fn get_assessment_by_email(&self, email: &str) -> StoreResult<AssessmentSnapshot> {
        let row = sqlx::query(
            r#"
            SELECT id, participant_name, practice_name, email, sales_confidence,
                   selected_kpis, selected_non_financial_kpis,
                   revenue_forecast_confidence, job_descriptions_clarity,
                   success_definition, baseline_score, created_at
            FROM practice_scorecard.assessments
            WHERE lower(email) = lower($1)
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => assessment_from_row(&row),
            None => Err(StoreError::NotFound(format!("assessment for {email}"))),
        }
    }

    async fn get_progress_updates(&self, assessment_id: Uuid) -> StoreResult<Vec<ProgressUpdate>> {
        let rows = sqlx::query(
            r#"
            SELECT id, assessment_id, week_number, sales_confidence_after,
                   kpi_updates, non_financial_kpi_updates,
                   revenue_forecast_confidence, job_descriptions_clarity,
                   new_improvements, new_achievements, notes, current_score, updated_at
            FROM practice_scorecard.progress_updates
            WHERE assessment_id = $1
            ORDER BY week_number ASC, updated_at ASC
            "#,
        )
        .bind(assessment_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(progress_from_row).collect()
    }

    async fn create_assessment(&self, snapshot: &AssessmentSnapshot) -> StoreResult<Uuid> {
        let id: Uuid = sqlx::query(
            r#"
            INSERT INTO practice_scorecard.assessments
            (id, participant_name, practice_name, email, sales_confidence,
             selected_kpis, selected_non_financial_kpis,
             revenue_forecast_confidence, job_descriptions_clarity,
             success_definition, baseline_score, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id
            "#,
        )
        .bind(snapshot.id)
        .bind(&snapshot.participant_name)
        .bind(&snapshot.practice_name)
        .bind(&snapshot.email)
        .bind(snapshot.sales_confidence)
        .bind(Json(&snapshot.selected_kpis))
        .bind(Json(&snapshot.selected_non_financial_kpis))
        .bind(snapshot.revenue_forecast_confidence.map(|a| a.as_str()))
        .bind(snapshot.job_descriptions_clarity.map(|a| a.as_str()))
        .bind(&snapshot.success_definition)
        .bind(i32::from(snapshot.baseline_score))
        .bind(snapshot.created_at)
        .fetch_one(&self.pool)
        .await?
        .try_get("id")?;

        Ok(id)
    }

    async fn create_progress_update(&self, update: &ProgressUpdate) -> StoreResult<Uuid> {
        let row = sqlx::query(
            r#"
            INSERT INTO practice_scorecard.progress_updates
            (id, assessment_id, week_number, sales_confidence_after,
             kpi_updates, non_financial_kpi_updates,
             revenue_forecast_confidence, job_descriptions_clarity,
             new_improvements, new_achievements, notes, current_score, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (assessment_id, week_number) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(update.id)
        .bind(update.assessment_id)
        .bind(update.week_number)
        .bind(update.sales_confidence_after)
        .bind(Json(&update.kpi_updates))
        .bind(Json(&update.non_financial_kpi_updates))
        .bind(update.revenue_forecast_confidence.map(|a| a.as_str()))
        .bind(update.job_descriptions_clarity.map(|a| a.as_str()))
        .bind(&update.new_improvements)
        .bind(&update.new_achievements)
        .bind(&update.notes)
        .bind(i32::from(update.current_score))
        .bind(update.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row.try_get("id")?),
            None => Err(StoreError::Conflict(format!(
                "week {} for assessment {}",
                update.week_number, update.assessment_id
            ))),
        }
    }
}

fn assessment_from_row(row: &PgRow) -> StoreResult<AssessmentSnapshot> {
    let selected_kpis: Json<Vec<KpiEntry>> = row.try_get("selected_kpis")?;
    let selected_non_financial_kpis: Json<Vec<KpiEntry>> =
        row.try_get("selected_non_financial_kpis")?;
    let forecast: Option<String> = row.try_get("revenue_forecast_confidence")?;
    let clarity: Option<String> = row.try_get("job_descriptions_clarity")?;

    Ok(AssessmentSnapshot {
        id: row.try_get("id")?,
        participant_name: row.try_get("participant_name")?,
        practice_name: row.try_get("practice_name")?,
        email: row.try_get("email")?,
        sales_confidence: row.try_get("sales_confidence")?,
        selected_kpis: selected_kpis.0,
        selected_non_financial_kpis: selected_non_financial_kpis.0,
        revenue_forecast_confidence: forecast.and_then(|v| v.parse().ok()),
        job_descriptions_clarity: clarity.and_then(|v| v.parse().ok()),
        success_definition: row.try_get("success_definition")?,
        baseline_score: score_from_column(row.try_get("baseline_score")?)?,
        created_at: row.try_get("created_at")?,
    })
}

fn progress_from_row(row: &PgRow) -> StoreResult<ProgressUpdate> {
    let kpi_updates: Json<Vec<KpiEntry>> = row.try_get("kpi_updates")?;
    let non_financial_kpi_updates: Json<Vec<KpiEntry>> =
        row.try_get("non_financial_kpi_updates")?;
    let forecast: Option<String> = row.try_get("revenue_forecast_confidence")?;
    let clarity: Option<String> = row.try_get("job_descriptions_clarity")?;

    Ok(ProgressUpdate {
        id: row.try_get("id")?,
        assessment_id: row.try_get("assessment_id")?,
        week_number: row.try_get("week_number")?,
        sales_confidence_after: row.try_get("sales_confidence_after")?,
        kpi_updates: kpi_updates.0,
        non_financial_kpi_updates: non_financial_kpi_updates.0,
        revenue_forecast_confidence: forecast.and_then(|v| v.parse().ok()),
        job_descriptions_clarity: clarity.and_then(|v| v.parse().ok()),
        new_improvements: row.try_get("new_improvements")?,
        new_achievements: row.try_get("new_achievements")?,
        notes: row.try_get("notes")?,
        current_score: score_from_column(row.try_get("current_score")?)?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn score_from_column(value: i32) -> StoreResult<u8> {
    u8::try_from(value)
        .ok()
        .filter(|score| *score <= 100)
        .ok_or_else(|| StoreError::InvalidRecord(format!("score {value} outside 0..=100")))
}

/// Inserts one demo participant with two weekly check-ins. Skipped when the
/// demo participant already exists.
pub async fn seed(store: &dyn AssessmentStore) -> anyhow::Result<Option<Uuid>> {
    match store.get_assessment_by_email(SEED_EMAIL).await {
        Ok(_) => return Ok(None),
        Err(StoreError::NotFound(_)) => {}
        Err(err) => return Err(err.into()),
    }

    let assessment: NewAssessment = serde_json::from_value(serde_json::json!({
        "participantName": "Dana Whitfield",
        "practiceName": "Glow Aesthetics",
        "email": SEED_EMAIL,
        "salesConfidence": 2,
        "selectedKPIs": [
            {"kpiKey": "revenue_per_appointment", "currentValue": "$450", "goalValue": "$600"},
            {"kpiKey": "conversion_rate", "currentValue": "35%", "goalValue": "55%"}
        ],
        "selectedNonFinancialKPIs": [
            {"kpiKey": "team_confidence", "currentValue": "5", "goalValue": "8"}
        ],
        "revenueForecastConfidence": "uncertain",
        "jobDescriptionsClarity": "partially",
        "successDefinition": "Consults convert without discounting"
    }))?;
    let (id, _) = tracker::submit_assessment(store, assessment).await?;

    let weeks = [
        serde_json::json!({
            "salesConfidenceAfter": 3,
            "kpiUpdates": [
                {"kpiKey": "revenue_per_appointment", "currentValue": "$480", "goalValue": "$600"},
                {"kpiKey": "conversion_rate", "currentValue": "40%", "goalValue": "55%"}
            ],
            "nonFinancialKpiUpdates": [
                {"kpiKey": "team_confidence", "currentValue": "6", "goalValue": "8"}
            ],
            "revenueForecastConfidence": "uncertain",
            "jobDescriptionsClarity": "mostly-clear",
            "newImprovements": ["Added a consult follow-up call"],
            "newAchievements": ["Closed two full-face packages"],
            "notes": "Front desk now books follow-ups at checkout."
        }),
        serde_json::json!({
            "salesConfidenceAfter": 4,
            "kpiUpdates": [
                {"kpiKey": "revenue_per_appointment", "currentValue": "$525", "goalValue": "$600"},
                {"kpiKey": "conversion_rate", "currentValue": "46%", "goalValue": "55%"}
            ],
            "nonFinancialKpiUpdates": [
                {"kpiKey": "team_confidence", "currentValue": "7", "goalValue": "8"}
            ],
            "revenueForecastConfidence": "confident",
            "jobDescriptionsClarity": "mostly-clear",
            "newImprovements": ["Added a consult follow-up call", "Role-played price objections"],
            "newAchievements": ["Best revenue week this quarter"],
            "notes": "Team is leading consults without the owner in the room."
        }),
    ];

    for week in weeks {
        let draft: ProgressDraft = serde_json::from_value(week)?;
        tracker::submit_progress(store, id, draft).await?;
    }

    Ok(Some(id))
}

/// Bulk-loads baseline assessments from a CSV export of the application form.
///
/// KPI cells hold `key:current:goal` entries joined with `|`.
pub async fn import_csv(
    store: &dyn AssessmentStore,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        participant_name: String,
        practice_name: String,
        email: String,
        sales_confidence: i32,
        revenue_forecast_confidence: Option<String>,
        job_descriptions_clarity: Option<String>,
        success_definition: Option<String>,
        kpis: Option<String>,
        non_financial_kpis: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("malformed CSV row {}", line + 1))?;
        let assessment = NewAssessment {
            participant_name: row.participant_name,
            practice_name: row.practice_name,
            email: row.email,
            sales_confidence: row.sales_confidence,
            selected_kpis: parse_kpi_cell(row.kpis.as_deref().unwrap_or_default())?,
            selected_non_financial_kpis: parse_kpi_cell(
                row.non_financial_kpis.as_deref().unwrap_or_default(),
            )?,
            revenue_forecast_confidence: row
                .revenue_forecast_confidence
                .and_then(|v| v.parse().ok()),
            job_descriptions_clarity: row.job_descriptions_clarity.and_then(|v| v.parse().ok()),
            success_definition: row.success_definition.unwrap_or_default(),
        };

        tracker::submit_assessment(store, assessment).await?;
        inserted += 1;
    }

    Ok(inserted)
}

pub fn parse_kpi_cell(cell: &str) -> anyhow::Result<Vec<KpiEntry>> {
    cell.split('|')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| -> anyhow::Result<KpiEntry> {
            let mut fields = part.splitn(3, ':');
            let key = fields.next().unwrap_or_default();
            let current = fields.next().unwrap_or_default();
            let goal = fields.next().unwrap_or_default();
            let kpi_key = key
                .parse::<KpiKey>()
                .with_context(|| format!("bad KPI entry {part:?}"))?;
            Ok(KpiEntry::new(kpi_key, current.trim(), goal.trim()))
        })
        .collect()
}
