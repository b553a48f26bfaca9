//! Structural and numeric checks over a [`BudgetState`].
//!
//! Validation never fails and never mutates. It returns a list of
//! [`Violation`]s, each carrying a [`Severity`]; callers decide whether any of
//! them block progression. Thresholds live in [`ValidationRules`].

use crate::category::WorkPackageKind;
use crate::model::{ActionType, Amount, BudgetState, PartnerId, WorkPackageId};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

/// One finding of [`validate_budget`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    GrandTotalMismatch {
        grand_total: Amount,
        budget_tier: u64,
    },
    TierNotAllowed {
        action_type: ActionType,
        tier: u64,
        allowed: &'static [u64],
    },
    PercentageSum {
        sum: f64,
    },
    ConsortiumTooSmall {
        action_type: ActionType,
        required: usize,
        partners: usize,
        countries: usize,
    },
    WorkPackageUnallocated {
        work_package: WorkPackageId,
        label: String,
    },
    NegativeCell {
        key: String,
        amount: Amount,
    },
    MultipleCoordinators {
        count: usize,
    },
    ManagementShareExceeded {
        percent: f64,
        max: f64,
    },
    CoordinatorShareHigh {
        partner: PartnerId,
        name: String,
        percent: f64,
        max: f64,
    },
    PartnerWithoutBudget {
        partner: PartnerId,
        name: String,
    },
    DevelopmentBelowManagement {
        development: Amount,
        management: Amount,
    },
}

impl Violation {
    pub fn severity(&self) -> Severity {
        match self {
            Violation::CoordinatorShareHigh { .. } | Violation::PartnerWithoutBudget { .. } => {
                Severity::Warning
            }
            _ => Severity::Error,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity() == Severity::Error
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::GrandTotalMismatch {
                grand_total,
                budget_tier,
            } => write!(
                f,
                "Grand total ({grand_total} EUR) does not match budget ({budget_tier} EUR). Difference: {} EUR",
                *budget_tier as Amount - grand_total
            ),
            Violation::TierNotAllowed {
                action_type,
                tier,
                allowed,
            } => {
                let allowed: Vec<String> = allowed.iter().map(u64::to_string).collect();
                write!(
                    f,
                    "Budget tier {tier} EUR is not available for {action_type} (allowed: {})",
                    allowed.join(", ")
                )
            }
            Violation::PercentageSum { sum } => {
                write!(f, "Partner percentages sum to {sum:.1}% instead of 100%")
            }
            Violation::ConsortiumTooSmall {
                action_type,
                required,
                partners,
                countries,
            } => write!(
                f,
                "{action_type} needs at least {required} partners from {required} countries \
                 (have {partners} partners from {countries} countries)"
            ),
            Violation::WorkPackageUnallocated { label, .. } => {
                write!(f, "{label} has no budget allocated to any partner")
            }
            Violation::NegativeCell { key, amount } => {
                write!(f, "Cell {key} has a negative amount ({amount} EUR)")
            }
            Violation::MultipleCoordinators { count } => {
                write!(f, "Consortium has {count} coordinators, expected one")
            }
            Violation::ManagementShareExceeded { percent, max } => {
                write!(f, "WP1 Management at {percent:.1}% exceeds the {max:.0}% maximum")
            }
            Violation::CoordinatorShareHigh {
                name, percent, max, ..
            } => write!(
                f,
                "Coordinator \"{name}\" has {percent:.1}% of budget (recommended max {max:.0}%)"
            ),
            Violation::PartnerWithoutBudget { name, .. } => {
                write!(f, "{name} has no budget allocated")
            }
            Violation::DevelopmentBelowManagement {
                development,
                management,
            } => write!(
                f,
                "Development ({development} EUR) is budgeted below Management ({management} EUR)"
            ),
        }
    }
}

/// Thresholds used by [`validate_with`].
#[derive(Debug, Clone)]
pub struct ValidationRules {
    /// Allowed distance of Σ partner percentages from 100. Default: `1.0`.
    pub percentage_tolerance: f64,
    /// Maximum share of the tier for WP1 (management), in percent. Default: `20`.
    pub management_max_percent: f64,
    /// Recommended maximum share of the coordinator, in percent. Default: `40`.
    pub coordinator_max_percent: f64,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            percentage_tolerance: 1.0,
            management_max_percent: 20.0,
            coordinator_max_percent: 40.0,
        }
    }
}

impl ValidationRules {
    pub fn with_percentage_tolerance(mut self, tolerance: f64) -> Self {
        self.percentage_tolerance = tolerance;
        self
    }

    pub fn with_management_max_percent(mut self, max: f64) -> Self {
        self.management_max_percent = max;
        self
    }

    pub fn with_coordinator_max_percent(mut self, max: f64) -> Self {
        self.coordinator_max_percent = max;
        self
    }
}

/// Validate with the default rules.
pub fn validate_budget(state: &BudgetState) -> Vec<Violation> {
    validate_with(state, &ValidationRules::default())
}

pub fn validate_with(state: &BudgetState, rules: &ValidationRules) -> Vec<Violation> {
    let mut out = Vec::new();
    let grand_total = state.grand_total();
    let tier = state.budget_tier as f64;
    let share = |amount: Amount| {
        if tier > 0.0 {
            amount as f64 / tier * 100.0
        } else {
            0.0
        }
    };

    // ── Structural checks ──

    if grand_total != state.budget_tier as Amount {
        out.push(Violation::GrandTotalMismatch {
            grand_total,
            budget_tier: state.budget_tier,
        });
    }

    if !state.action_type.allows_tier(state.budget_tier) {
        out.push(Violation::TierNotAllowed {
            action_type: state.action_type,
            tier: state.budget_tier,
            allowed: state.action_type.budget_tiers(),
        });
    }

    if !state.partners.is_empty() {
        let sum: f64 = state
            .partners
            .iter()
            .map(|p| state.partner_percentages.get(&p.id).copied().unwrap_or(0.0))
            .sum();
        if (sum - 100.0).abs() > rules.percentage_tolerance {
            out.push(Violation::PercentageSum { sum });
        }
    }

    if let Err(crate::error::BudgetError::ConsortiumTooSmall {
        action_type,
        required,
        partners,
        countries,
    }) = state.check_consortium()
    {
        out.push(Violation::ConsortiumTooSmall {
            action_type,
            required,
            partners,
            countries,
        });
    }

    for wp in &state.work_packages {
        let allocated = state
            .partners
            .iter()
            .any(|p| crate::query::get_wp_partner_total(&state.cells, &wp.id, &p.id) != 0);
        if !allocated {
            out.push(Violation::WorkPackageUnallocated {
                work_package: wp.id.clone(),
                label: wp.label(),
            });
        }
    }

    for (key, amount) in state.cells.iter().filter(|(_, a)| *a < 0) {
        out.push(Violation::NegativeCell {
            key: key.to_string(),
            amount,
        });
    }

    // ── Programme guidance ──

    let coordinators: Vec<_> = state.partners.iter().filter(|p| p.is_coordinator()).collect();
    if coordinators.len() > 1 {
        out.push(Violation::MultipleCoordinators {
            count: coordinators.len(),
        });
    }

    if grand_total <= 0 {
        return out;
    }

    let management = state.work_packages.iter().find(|w| w.number == 1);
    let management_total = management.map(|w| state.wp_total(&w.id));
    if let Some(total) = management_total {
        let percent = share(total);
        if percent > rules.management_max_percent {
            out.push(Violation::ManagementShareExceeded {
                percent,
                max: rules.management_max_percent,
            });
        }
    }

    if let Some(coordinator) = coordinators.first() {
        let percent = share(state.partner_total(&coordinator.id));
        if percent > rules.coordinator_max_percent {
            out.push(Violation::CoordinatorShareHigh {
                partner: coordinator.id.clone(),
                name: coordinator.name.clone(),
                percent,
                max: rules.coordinator_max_percent,
            });
        }
    }

    for partner in &state.partners {
        if state.partner_total(&partner.id) == 0 {
            out.push(Violation::PartnerWithoutBudget {
                partner: partner.id.clone(),
                name: partner.name.clone(),
            });
        }
    }

    let development = state.work_packages.iter().find(|w| {
        WorkPackageKind::detect(&w.title) == WorkPackageKind::Development
            || WorkPackageKind::detect(&w.title_de) == WorkPackageKind::Development
    });
    if let (Some(management), Some(development)) = (management_total, development) {
        let dev_total = state.wp_total(&development.id);
        if dev_total > 0 && dev_total < management {
            out.push(Violation::DevelopmentBelowManagement {
                development: dev_total,
                management,
            });
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::CostCategory;
    use crate::distribute::CoordinatorBonus;
    use crate::model::CellKey;

    fn balanced() -> BudgetState {
        let mut state = BudgetState::new(ActionType::Ka220);
        state.add_partner("Alpha", "AT");
        state.add_partner("Beta", "RO");
        state.add_partner("Gamma", "ES");
        state.load_standard_wps();
        state.suggest_percentages(&CoordinatorBonus::default());
        state.smart_distribute();
        state
    }

    fn kinds(violations: &[Violation]) -> Vec<&'static str> {
        violations
            .iter()
            .map(|v| match v {
                Violation::GrandTotalMismatch { .. } => "grand_total",
                Violation::TierNotAllowed { .. } => "tier",
                Violation::PercentageSum { .. } => "percentage_sum",
                Violation::ConsortiumTooSmall { .. } => "consortium",
                Violation::WorkPackageUnallocated { .. } => "wp_unallocated",
                Violation::NegativeCell { .. } => "negative",
                Violation::MultipleCoordinators { .. } => "coordinators",
                Violation::ManagementShareExceeded { .. } => "management",
                Violation::CoordinatorShareHigh { .. } => "coordinator_share",
                Violation::PartnerWithoutBudget { .. } => "partner_without_budget",
                Violation::DevelopmentBelowManagement { .. } => "dev_below_mgmt",
            })
            .collect()
    }

    #[test]
    fn distributed_budget_has_no_errors() {
        let state = balanced();
        let violations = validate_budget(&state);
        assert!(
            violations.iter().all(|v| !v.is_error()),
            "{violations:?}"
        );
    }

    #[test]
    fn empty_state_reports_structural_problems() {
        let mut state = BudgetState::default();
        state.add_work_package("Management");
        let found = kinds(&validate_budget(&state));
        assert!(found.contains(&"grand_total"));
        assert!(found.contains(&"consortium"));
        assert!(found.contains(&"wp_unallocated"));
        assert!(!found.contains(&"percentage_sum"));
    }

    #[test]
    fn percentage_tolerance_is_one_point() {
        let mut state = balanced();
        let first = state.partners[0].id.clone();
        let current = state.partner_percentages[&first];
        state.set_partner_percentage(&first, current + 0.5).unwrap();
        assert!(!kinds(&validate_budget(&state)).contains(&"percentage_sum"));
        state.set_partner_percentage(&first, current + 2.0).unwrap();
        assert!(kinds(&validate_budget(&state)).contains(&"percentage_sum"));
    }

    #[test]
    fn negative_cells_are_flagged() {
        let mut state = balanced();
        let key = CellKey::new(
            &state.work_packages[0].id,
            &state.partners[0].id,
            CostCategory::Equipment,
        );
        state.cells.adjust(&key, -10);
        let violations = validate_budget(&state);
        let negative = violations
            .iter()
            .find(|v| matches!(v, Violation::NegativeCell { .. }))
            .unwrap();
        assert_eq!(negative.severity(), Severity::Error);
        assert!(negative.to_string().contains("-10 EUR"));
    }

    #[test]
    fn management_cap_and_coordinator_share() {
        let mut state = BudgetState::new(ActionType::Ka210);
        let a = state.add_partner("Alpha", "DE");
        let b = state.add_partner("Beta", "PL");
        let mgmt = state.add_work_package("Project Management");
        let dev = state.add_work_package("Development");
        state.set_cell_amount(&mgmt, &a, CostCategory::Staff, 20_000.0).unwrap();
        state.set_cell_amount(&dev, &b, CostCategory::Staff, 10_000.0).unwrap();

        let found = kinds(&validate_budget(&state));
        assert!(found.contains(&"management"));
        assert!(found.contains(&"coordinator_share"));
        assert!(found.contains(&"dev_below_mgmt"));
        assert!(!found.contains(&"grand_total"));

        let relaxed = ValidationRules::default()
            .with_management_max_percent(80.0)
            .with_coordinator_max_percent(80.0);
        let found = kinds(&validate_with(&state, &relaxed));
        assert!(!found.contains(&"management"));
        assert!(!found.contains(&"coordinator_share"));
    }

    #[test]
    fn partner_without_budget_only_once_cells_exist() {
        let mut state = BudgetState::new(ActionType::Ka210);
        let a = state.add_partner("Alpha", "DE");
        state.add_partner("Beta", "PL");
        let wp = state.add_work_package("Other");
        assert!(!kinds(&validate_budget(&state)).contains(&"partner_without_budget"));

        state.set_cell_amount(&wp, &a, CostCategory::Staff, 100.0).unwrap();
        let violations = validate_budget(&state);
        let warning = violations
            .iter()
            .find(|v| matches!(v, Violation::PartnerWithoutBudget { .. }))
            .unwrap();
        assert_eq!(warning.severity(), Severity::Warning);
        assert_eq!(warning.to_string(), "Beta has no budget allocated");
    }

    #[test]
    fn snapshot_with_foreign_tier_is_reported() {
        let mut json = serde_json::to_value(balanced()).unwrap();
        json["budgetTier"] = serde_json::json!(12_345);
        let state: BudgetState = serde_json::from_value(json).unwrap();

        let violations = validate_budget(&state);
        let tier = violations
            .iter()
            .find(|v| matches!(v, Violation::TierNotAllowed { .. }))
            .unwrap();
        assert!(tier.is_error());
        assert_eq!(
            tier.to_string(),
            "Budget tier 12345 EUR is not available for KA220 (allowed: 120000, 250000, 400000)"
        );
        assert!(!kinds(&validate_budget(&balanced())).contains(&"tier"));
    }

    #[test]
    fn snapshot_with_two_coordinators_is_reported() {
        let mut json = serde_json::to_value(balanced()).unwrap();
        json["partners"][1]["role"] = json["partners"][0]["role"].clone();
        let state: BudgetState = serde_json::from_value(json).unwrap();

        let violations = validate_budget(&state);
        let multiple = violations
            .iter()
            .find(|v| matches!(v, Violation::MultipleCoordinators { .. }))
            .unwrap();
        assert_eq!(multiple, &Violation::MultipleCoordinators { count: 2 });
        assert!(multiple.is_error());
        assert_eq!(multiple.to_string(), "Consortium has 2 coordinators, expected one");
        assert!(!kinds(&validate_budget(&balanced())).contains(&"coordinators"));
    }

    #[test]
    fn violations_serialize_with_kind_tag() {
        let v = Violation::PercentageSum { sum: 97.0 };
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["kind"], "percentage_sum");
        assert_eq!(json["sum"], 97.0);
    }
}
