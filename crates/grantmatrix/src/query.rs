//! Derived totals over the cell matrix.
//!
//! Every function here is pure: same inputs, same output, no hidden state.
//! Missing cells read as 0 and unknown ids simply produce 0, so hosts can
//! query speculative combinations without checking first.
//!
//! Totals are restricted to the partners and work packages passed in. Cells
//! whose owner has been removed do not count.

use crate::category::CostCategory;
use crate::model::{Amount, BudgetState, CellMatrix, Partner, PartnerId, WorkPackage, WorkPackageId};
use serde::Serialize;

pub fn get_cell_amount(
    cells: &CellMatrix,
    wp: &WorkPackageId,
    partner: &PartnerId,
    category: CostCategory,
) -> Amount {
    cells.get(wp, partner, category)
}

/// One partner's total within one work package, across all categories.
pub fn get_wp_partner_total(cells: &CellMatrix, wp: &WorkPackageId, partner: &PartnerId) -> Amount {
    CostCategory::ALL
        .into_iter()
        .map(|c| cells.get(wp, partner, c))
        .sum()
}

/// Total of one work package across the given partners.
pub fn get_wp_total(cells: &CellMatrix, partners: &[Partner], wp: &WorkPackageId) -> Amount {
    partners
        .iter()
        .map(|p| get_wp_partner_total(cells, wp, &p.id))
        .sum()
}

/// Total of one category row (one work package, one category) across the
/// given partners.
pub fn get_category_row_total(
    cells: &CellMatrix,
    partners: &[Partner],
    wp: &WorkPackageId,
    category: CostCategory,
) -> Amount {
    partners.iter().map(|p| cells.get(wp, &p.id, category)).sum()
}

/// One partner's total across the given work packages.
pub fn get_partner_grand_total(
    cells: &CellMatrix,
    work_packages: &[WorkPackage],
    partner: &PartnerId,
) -> Amount {
    work_packages
        .iter()
        .map(|w| get_wp_partner_total(cells, &w.id, partner))
        .sum()
}

pub fn get_grand_total(cells: &CellMatrix, partners: &[Partner], work_packages: &[WorkPackage]) -> Amount {
    work_packages
        .iter()
        .map(|w| get_wp_total(cells, partners, &w.id))
        .sum()
}

impl BudgetState {
    pub fn grand_total(&self) -> Amount {
        get_grand_total(&self.cells, &self.partners, &self.work_packages)
    }

    pub fn partner_total(&self, partner: &PartnerId) -> Amount {
        get_partner_grand_total(&self.cells, &self.work_packages, partner)
    }

    pub fn wp_total(&self, wp: &WorkPackageId) -> Amount {
        get_wp_total(&self.cells, &self.partners, wp)
    }

    /// Totals snapshot for display.
    pub fn summary(&self) -> BudgetSummary {
        let tier = self.budget_tier as f64;
        let share = |amount: Amount| {
            if tier > 0.0 {
                amount as f64 / tier * 100.0
            } else {
                0.0
            }
        };

        let partners = self
            .partners
            .iter()
            .map(|p| {
                let total = self.partner_total(&p.id);
                PartnerSummary {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    country: p.country.clone(),
                    total,
                    percent_of_tier: share(total),
                    target_percent: self.partner_percentages.get(&p.id).copied(),
                }
            })
            .collect();
        let work_packages = self
            .work_packages
            .iter()
            .map(|w| {
                let total = self.wp_total(&w.id);
                WorkPackageSummary {
                    id: w.id.clone(),
                    label: w.label(),
                    title: w.title.clone(),
                    total,
                    percent_of_tier: share(total),
                    target_percent: w.target_percent,
                }
            })
            .collect();

        let grand_total = self.grand_total();
        BudgetSummary {
            action_type: self.action_type.as_str(),
            budget_tier: self.budget_tier,
            grand_total,
            difference: self.budget_tier as Amount - grand_total,
            partners,
            work_packages,
        }
    }
}

/// Per-partner and per-work-package totals with their share of the tier.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetSummary {
    pub action_type: &'static str,
    pub budget_tier: u64,
    pub grand_total: Amount,
    /// `budget_tier - grand_total`; positive means money left to allocate.
    pub difference: Amount,
    pub partners: Vec<PartnerSummary>,
    pub work_packages: Vec<WorkPackageSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerSummary {
    pub id: PartnerId,
    pub name: String,
    pub country: String,
    pub total: Amount,
    pub percent_of_tier: f64,
    pub target_percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkPackageSummary {
    pub id: WorkPackageId,
    pub label: String,
    pub title: String,
    pub total: Amount,
    pub percent_of_tier: f64,
    pub target_percent: Option<f64>,
}
