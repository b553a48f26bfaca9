//! Cost categories and the per-work-package base splits.
//!
//! Every cell of the budget matrix belongs to one [`CostCategory`]. Staff and
//! travel lines are *multiplier-eligible*: during smart distribution their
//! weight is scaled by the partner's country multipliers. The remaining lines
//! are flat.
//!
//! The base mix between categories depends on what kind of work package is
//! being budgeted. [`WorkPackageKind::detect`] classifies a work package by
//! its title and [`WorkPackageKind::base_split`] returns the matching mix.

use crate::country::CountryProfile;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// EU grant budget line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostCategory {
    Staff,
    Travel,
    Equipment,
    Subcontracting,
    Other,
}

/// Which multiplier scales a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiplierKind {
    Staff,
    Travel,
    Flat,
}

impl CostCategory {
    /// All categories in display order.
    pub const ALL: [CostCategory; 5] = [
        CostCategory::Staff,
        CostCategory::Travel,
        CostCategory::Equipment,
        CostCategory::Subcontracting,
        CostCategory::Other,
    ];

    /// Stable key used in persisted cell keys.
    pub fn key(self) -> &'static str {
        match self {
            CostCategory::Staff => "staff",
            CostCategory::Travel => "travel",
            CostCategory::Equipment => "equipment",
            CostCategory::Subcontracting => "subcontracting",
            CostCategory::Other => "other",
        }
    }

    pub fn label_de(self) -> &'static str {
        match self {
            CostCategory::Staff => "Personalkosten",
            CostCategory::Travel => "Reise & Aufenthalt",
            CostCategory::Equipment => "Ausstattung",
            CostCategory::Subcontracting => "Unterauftraege",
            CostCategory::Other => "Sonstige Kosten",
        }
    }

    pub fn label_en(self) -> &'static str {
        match self {
            CostCategory::Staff => "Staff Costs",
            CostCategory::Travel => "Travel & Subsistence",
            CostCategory::Equipment => "Equipment",
            CostCategory::Subcontracting => "Subcontracting",
            CostCategory::Other => "Other Direct Costs",
        }
    }

    pub fn multiplier_kind(self) -> MultiplierKind {
        match self {
            CostCategory::Staff => MultiplierKind::Staff,
            CostCategory::Travel => MultiplierKind::Travel,
            _ => MultiplierKind::Flat,
        }
    }

    pub fn is_multiplier_eligible(self) -> bool {
        self.multiplier_kind() != MultiplierKind::Flat
    }

    /// The multiplier this category receives for a given country profile.
    pub fn multiplier_for(self, profile: &CountryProfile) -> f64 {
        match self.multiplier_kind() {
            MultiplierKind::Staff => profile.staff_multiplier,
            MultiplierKind::Travel => profile.travel_multiplier,
            MultiplierKind::Flat => 1.0,
        }
    }
}

impl fmt::Display for CostCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for CostCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CostCategory::ALL
            .into_iter()
            .find(|c| c.key().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown cost category '{s}'"))
    }
}

/// Fractions of a partner's work-package budget per category.
///
/// Indexed in [`CostCategory::ALL`] order. Fractions of a split sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategorySplit(pub [f64; 5]);

impl CategorySplit {
    pub fn fraction(&self, category: CostCategory) -> f64 {
        self.0[category as usize]
    }
}

/// Kind of work package, detected from its title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkPackageKind {
    Management,
    Research,
    Development,
    Piloting,
    Dissemination,
    Default,
}

const KEYWORDS: &[(WorkPackageKind, &[&str])] = &[
    (
        WorkPackageKind::Management,
        &["management", "projektmanagement", "koordination"],
    ),
    (
        WorkPackageKind::Research,
        &["research", "forschung", "analyse", "analysis"],
    ),
    (
        WorkPackageKind::Development,
        &["develop", "entwicklung", "creation", "erstellung"],
    ),
    (
        WorkPackageKind::Piloting,
        &["pilot", "test", "erprobung", "validation"],
    ),
    (
        WorkPackageKind::Dissemination,
        &[
            "dissemination",
            "verbreitung",
            "exploitation",
            "verwertung",
            "multiplier",
        ],
    ),
];

impl WorkPackageKind {
    /// Classify a work package by keywords in its title (English or German).
    ///
    /// Kinds are checked in a fixed order, so "Development & Testing" is a
    /// development package.
    pub fn detect(title: &str) -> Self {
        let lower = title.to_lowercase();
        KEYWORDS
            .iter()
            .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
            .map(|(kind, _)| *kind)
            .unwrap_or(WorkPackageKind::Default)
    }

    /// Base category mix before country multipliers are applied.
    pub fn base_split(self) -> CategorySplit {
        // staff, travel, equipment, subcontracting, other
        match self {
            WorkPackageKind::Management => CategorySplit([0.70, 0.20, 0.0, 0.0, 0.10]),
            WorkPackageKind::Research => CategorySplit([0.55, 0.15, 0.10, 0.05, 0.15]),
            WorkPackageKind::Development => CategorySplit([0.50, 0.10, 0.15, 0.10, 0.15]),
            WorkPackageKind::Piloting => CategorySplit([0.45, 0.25, 0.05, 0.05, 0.20]),
            WorkPackageKind::Dissemination => CategorySplit([0.40, 0.25, 0.05, 0.10, 0.20]),
            WorkPackageKind::Default => CategorySplit([0.55, 0.20, 0.05, 0.05, 0.15]),
        }
    }
}
