//! Scoring and progress tracking for the practice growth coaching program.
//!
//! The scoring core (`normalize`, `category`, `scoring`, `reconcile`) is pure
//! and storage-agnostic. `store`, `db` and `tracker` wire it to persistence.

pub mod category;
pub mod config;
pub mod db;
pub mod models;
pub mod normalize;
pub mod reconcile;
pub mod report;
pub mod scoring;
pub mod store;
pub mod tracker;

pub use reconcile::reconcile_progress;
pub use scoring::{score_baseline, score_comprehensive, ComprehensiveInput};
pub use store::{AssessmentStore, MemoryStore, StoreError};
