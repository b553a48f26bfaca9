//! Error type for rejected budget operations.
//!
//! Only operations a caller can get wrong return [`BudgetError`]. Out-of-range
//! percentages and amounts are clamped instead, and validation findings are
//! plain data ([`Violation`](crate::validate::Violation)), never errors.

use crate::model::{ActionType, PartnerId, WorkPackageId};
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BudgetError>;

#[derive(Error, Debug)]
pub enum BudgetError {
    #[error("unknown partner '{0}'")]
    UnknownPartner(PartnerId),

    #[error("unknown work package '{0}'")]
    UnknownWorkPackage(WorkPackageId),

    #[error("budget tier {tier} EUR is not available for {action_type} (allowed: {allowed:?})")]
    TierNotAllowed {
        action_type: ActionType,
        tier: u64,
        allowed: &'static [u64],
    },

    #[error(
        "{action_type} needs at least {required} partners from {required} countries \
         (have {partners} partners, {countries} countries)"
    )]
    ConsortiumTooSmall {
        action_type: ActionType,
        required: usize,
        partners: usize,
        countries: usize,
    },

    #[error("import skipped: {0}")]
    InconsistentImport(String),

    #[error("invalid cell key '{0}'")]
    InvalidCellKey(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
