//! Convenience re-exports for common `grantmatrix` types.
//!
//! ```ignore
//! use grantmatrix::prelude::*;
//! ```

// ── Model ───────────────────────────────────────────────────────────
pub use crate::model::{
    ActionType, Amount, BudgetAction, BudgetState, CellKey, CellMatrix, MAX_CELL_AMOUNT, Partner,
    PartnerId, PartnerRole, PartnerUpdate, WorkPackage, WorkPackageId, WorkPackageUpdate,
};

// ── Reference data ──────────────────────────────────────────────────
pub use crate::category::{CostCategory, WorkPackageKind};
pub use crate::country::{CostGroup, CountryProfile, get_country_profile};

// ── Distribution ────────────────────────────────────────────────────
pub use crate::distribute::{CoordinatorBonus, EqualShare, PercentageStrategy};

// ── Import / export ─────────────────────────────────────────────────
pub use crate::export::{BudgetTable, build_table, export_file_name};
pub use crate::import::{DirectoryPartner, ImportableProject};
pub use crate::persist::StateStore;

// ── Checks ──────────────────────────────────────────────────────────
pub use crate::error::BudgetError;
pub use crate::validate::{Severity, ValidationRules, Violation, validate_budget, validate_with};
