//! Storage port for assessments and their weekly check-ins.
//!
//! [`crate::db::PgStore`] is the production implementation; [`MemoryStore`]
//! backs tests and offline runs.

use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{AssessmentSnapshot, ProgressUpdate};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid stored record: {0}")]
    InvalidRecord(String),

    #[error("duplicate record: {0}")]
    Conflict(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait AssessmentStore: Send + Sync {
    async fn get_assessment_by_id(&self, id: Uuid) -> StoreResult<AssessmentSnapshot>;

    /// Most recent assessment submitted with this email.
    async fn get_assessment_by_email(&self, email: &str) -> StoreResult<AssessmentSnapshot>;

    /// Check-ins for an assessment, ascending by week number.
    async fn get_progress_updates(&self, assessment_id: Uuid) -> StoreResult<Vec<ProgressUpdate>>;

    async fn create_assessment(&self, snapshot: &AssessmentSnapshot) -> StoreResult<Uuid>;

    async fn create_progress_update(&self, update: &ProgressUpdate) -> StoreResult<Uuid>;
}

#[derive(Default)]
struct Tables {
    assessments: Vec<AssessmentSnapshot>,
    updates: Vec<ProgressUpdate>,
}

/// Append-only in-process store.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_tables<T>(&self, f: impl FnOnce(&mut Tables) -> T) -> T {
        let mut guard = self
            .tables
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}

#[async_trait]
impl AssessmentStore for MemoryStore {
    async fn get_assessment_by_id(&self, id: Uuid) -> StoreResult<AssessmentSnapshot> {
        self.with_tables(|tables| {
            tables
                .assessments
                .iter()
                .find(|a| a.id == id)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(format!("assessment {id}")))
        })
    }

    async fn get_assessment_by_email(&self, email: &str) -> StoreResult<AssessmentSnapshot> {
        let wanted = email.trim().to_lowercase();
        self.with_tables(|tables| {
            tables
                .assessments
                .iter()
                .filter(|a| a.email.to_lowercase() == wanted)
                .max_by_key(|a| a.created_at)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(format!("assessment for {email}")))
        })
    }

    async fn get_progress_updates(&self, assessment_id: Uuid) -> StoreResult<Vec<ProgressUpdate>> {
        self.with_tables(|tables| {
            let mut updates: Vec<ProgressUpdate> = tables
                .updates
                .iter()
                .filter(|u| u.assessment_id == assessment_id)
                .cloned()
                .collect();
            updates.sort_by_key(|u| (u.week_number, u.updated_at));
            Ok(updates)
        })
    }

    async fn create_assessment(&self, snapshot: &AssessmentSnapshot) -> StoreResult<Uuid> {
        self.with_tables(|tables| {
            if tables.assessments.iter().any(|a| a.id == snapshot.id) {
                return Err(StoreError::Conflict(format!("assessment {}", snapshot.id)));
            }
            tables.assessments.push(snapshot.clone());
            Ok(snapshot.id)
        })
    }

    async fn create_progress_update(&self, update: &ProgressUpdate) -> StoreResult<Uuid> {
        self.with_tables(|tables| {
            if !tables.assessments.iter().any(|a| a.id == update.assessment_id) {
                return Err(StoreError::NotFound(format!(
                    "assessment {}",
                    update.assessment_id
                )));
            }
            if tables.updates.iter().any(|u| {
                u.assessment_id == update.assessment_id && u.week_number == update.week_number
            }) {
                return Err(StoreError::Conflict(format!(
                    "week {} for assessment {}",
                    update.week_number, update.assessment_id
                )));
            }
            tables.updates.push(update.clone());
            Ok(update.id)
        })
    }
}
