//! The budget model: partners, work packages, the cell matrix and the
//! [`BudgetState`] container that owns them.
//!
//! - [`cells`]: [`CellKey`] / [`CellMatrix`], the WP × partner × category
//!   matrix of whole-EUR amounts.
//! - [`state`]: [`BudgetState`] and its CRUD mutators.
//! - [`action`]: [`BudgetAction`], a serializable description of every
//!   mutation, and [`BudgetState::reduce`] for snapshot-to-snapshot updates.

pub mod action;
pub mod cells;
pub mod state;

pub use action::BudgetAction;
pub use cells::{Amount, CellKey, CellMatrix, MAX_CELL_AMOUNT};
pub use state::{BudgetState, PartnerUpdate, WorkPackageUpdate};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ── Action type and tiers ──────────────────────────────────────────

/// Erasmus+ action type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
pub enum ActionType {
    /// Small-scale partnership.
    #[serde(rename = "KA210")]
    Ka210,
    /// Cooperation partnership.
    #[serde(rename = "KA220")]
    #[default]
    Ka220,
}

const KA210_TIERS: &[u64] = &[30_000, 60_000];
const KA220_TIERS: &[u64] = &[120_000, 250_000, 400_000];

impl ActionType {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::Ka210 => "KA210",
            ActionType::Ka220 => "KA220",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ActionType::Ka210 => "KA210 Small-scale Partnership",
            ActionType::Ka220 => "KA220 Cooperation Partnership",
        }
    }

    /// Lump-sum tiers available for this action type, ascending.
    pub fn budget_tiers(self) -> &'static [u64] {
        match self {
            ActionType::Ka210 => KA210_TIERS,
            ActionType::Ka220 => KA220_TIERS,
        }
    }

    pub fn default_tier(self) -> u64 {
        self.budget_tiers()[0]
    }

    pub fn allows_tier(self, tier: u64) -> bool {
        self.budget_tiers().contains(&tier)
    }

    /// Allowed tier closest to `amount` (the lower tier wins a tie).
    pub fn nearest_tier(self, amount: u64) -> u64 {
        let tiers = self.budget_tiers();
        tiers
            .iter()
            .copied()
            .min_by_key(|t| t.abs_diff(amount))
            .unwrap_or(tiers[0])
    }

    /// Minimum number of partners, and of distinct partner countries,
    /// before setup can be completed.
    pub fn min_partners(self) -> usize {
        match self {
            ActionType::Ka210 => 2,
            ActionType::Ka220 => 3,
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "KA210" => Ok(ActionType::Ka210),
            "KA220" => Ok(ActionType::Ka220),
            other => Err(format!("unknown action type '{other}' (expected KA210 or KA220)")),
        }
    }
}

// ── Identifiers ────────────────────────────────────────────────────

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Identifier of a [`Partner`] within one state (`bp_<n>`).
    PartnerId
);
string_id!(
    /// Identifier of a [`WorkPackage`] within one state (`wp_<n>`).
    WorkPackageId
);

// ── Partners ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PartnerRole {
    Coordinator,
    #[default]
    Partner,
}

/// A partner organization of the consortium.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Partner {
    pub id: PartnerId,
    pub name: String,
    /// ISO-3166 alpha-2 code, upper-case.
    pub country: String,
    pub role: PartnerRole,
    /// Identifier of the partner in an external directory, used to
    /// deduplicate imports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_ref: Option<String>,
}

impl Partner {
    pub fn is_coordinator(&self) -> bool {
        self.role == PartnerRole::Coordinator
    }
}

// ── Work packages ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkPackage {
    pub id: WorkPackageId,
    /// Position in the dense 1..N sequence.
    pub number: u32,
    pub title: String,
    /// German display title used by the export table.
    pub title_de: String,
    /// Share of the total budget in percent (0–100), if fixed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_percent: Option<f64>,
}

impl WorkPackage {
    /// Label used in tables, e.g. `WP2`.
    pub fn label(&self) -> String {
        format!("WP{}", self.number)
    }
}

/// Clamp a percentage into `[0, 100]`. NaN becomes 0.
pub fn clamp_percent(percent: f64) -> f64 {
    if percent.is_nan() {
        0.0
    } else {
        percent.clamp(0.0, 100.0)
    }
}
