//! Automatic distribution of the lump sum into the cell matrix.
//!
//! Two generators fill [`BudgetState::cells`] from scratch:
//!
//! - [`BudgetState::smart_distribute`] weighs work packages by their target
//!   percentages, partners by their percentages, and cost categories by the
//!   work-package kind combined with each partner's country multipliers.
//! - [`BudgetState::auto_distribute`] ignores all weights and splits evenly.
//!
//! Both are deterministic and both end with a grand total equal to the
//! budget tier. Whole-EUR rounding is done by largest remainder via
//! [`apportion`]; whatever residual is left after per-pair rounding goes to a
//! single cell so the totals reconcile exactly.
//!
//! Partner percentage suggestions live in [`strategy`].

pub mod strategy;

pub use strategy::{CoordinatorBonus, EqualShare, PercentageStrategy};

use crate::category::{CostCategory, WorkPackageKind};
use crate::country::get_country_profile;
use crate::model::{Amount, BudgetState, CellKey, CellMatrix, WorkPackage};
use tracing::{debug, info, warn};

/// Split `total` into whole amounts proportional to `weights`.
///
/// Each entry gets the floor of its exact share; the units left over go to
/// the entries with the largest fractional parts (earlier entries win ties).
/// The result always sums to `total`. Non-finite or negative weights count
/// as zero; if no weight is positive the split is even.
pub fn apportion(total: Amount, weights: &[f64]) -> Vec<Amount> {
    if weights.is_empty() {
        return Vec::new();
    }
    let clean: Vec<f64> = weights
        .iter()
        .map(|w| if w.is_finite() && *w > 0.0 { *w } else { 0.0 })
        .collect();
    let sum: f64 = clean.iter().sum();
    let clean = if sum > 0.0 {
        clean
    } else {
        vec![1.0; weights.len()]
    };
    let sum: f64 = clean.iter().sum();

    let exact: Vec<f64> = clean.iter().map(|w| total as f64 * w / sum).collect();
    let mut amounts: Vec<Amount> = exact.iter().map(|e| e.floor() as Amount).collect();
    let mut leftover = total - amounts.iter().sum::<Amount>();

    let mut order: Vec<usize> = (0..exact.len()).collect();
    order.sort_by(|&a, &b| {
        let fa = exact[a] - exact[a].floor();
        let fb = exact[b] - exact[b].floor();
        fb.total_cmp(&fa).then(a.cmp(&b))
    });

    // Float error can leave `leftover` outside [0, len); cycle until settled.
    let step = leftover.signum();
    let mut i = 0;
    while leftover != 0 {
        amounts[order[i % order.len()]] += step;
        leftover -= step;
        i += 1;
    }
    amounts
}

/// Split `total` into `parts` near-equal amounts; the first `total % parts`
/// entries get one more.
fn split_evenly(total: Amount, parts: usize) -> Vec<Amount> {
    if parts == 0 {
        return Vec::new();
    }
    let n = parts as Amount;
    let base = total / n;
    let rem = (total % n) as usize;
    (0..parts)
        .map(|i| base + if i < rem { 1 } else { 0 })
        .collect()
}

/// Effective share of each work package in percent, in list order.
///
/// Packages with a target keep it. Packages without one split whatever the
/// targets leave of 100 evenly (nothing, if the targets already exceed 100).
pub fn effective_wp_percentages(work_packages: &[WorkPackage]) -> Vec<f64> {
    let explicit: f64 = work_packages.iter().filter_map(|w| w.target_percent).sum();
    let unset = work_packages
        .iter()
        .filter(|w| w.target_percent.is_none())
        .count();
    let fill = if unset > 0 {
        (100.0 - explicit).max(0.0) / unset as f64
    } else {
        0.0
    };
    work_packages
        .iter()
        .map(|w| w.target_percent.unwrap_or(fill))
        .collect()
}

/// Scale `weights` so they sum to 1. An all-zero input becomes an even split.
fn normalize(weights: &[f64]) -> Vec<f64> {
    let sum: f64 = weights.iter().filter(|w| **w > 0.0).sum();
    if sum > 0.0 {
        weights
            .iter()
            .map(|w| if *w > 0.0 { w / sum } else { 0.0 })
            .collect()
    } else {
        vec![1.0 / weights.len() as f64; weights.len()]
    }
}

fn detect_kind(wp: &WorkPackage) -> WorkPackageKind {
    match WorkPackageKind::detect(&wp.title) {
        WorkPackageKind::Default => WorkPackageKind::detect(&wp.title_de),
        kind => kind,
    }
}

impl BudgetState {
    /// Partner weights as fractions of 1, in partner order.
    fn partner_weights(&self) -> Vec<f64> {
        let raw: Vec<f64> = self
            .partners
            .iter()
            .map(|p| {
                self.partner_percentages
                    .get(&p.id)
                    .copied()
                    .unwrap_or(0.0)
            })
            .collect();
        if raw.iter().all(|w| *w <= 0.0) {
            debug!("No partner percentages set, splitting evenly");
        }
        normalize(&raw)
    }

    /// Regenerate every cell from the tier, work-package shares, partner
    /// percentages, work-package kinds and country multipliers.
    ///
    /// Existing cells are discarded. With no partners or no work packages
    /// the state is left unchanged.
    pub fn smart_distribute(&mut self) {
        if self.partners.is_empty() || self.work_packages.is_empty() {
            debug!("Smart distribution skipped: no partners or no work packages");
            return;
        }

        let tier = self.budget_tier as Amount;
        let wp_shares = normalize(&effective_wp_percentages(&self.work_packages));
        let partner_shares = self.partner_weights();
        let profiles: Vec<_> = self
            .partners
            .iter()
            .map(|p| get_country_profile(&p.country))
            .collect();

        let mut cells = CellMatrix::new();
        for (wp, wp_share) in self.work_packages.iter().zip(&wp_shares) {
            let split = detect_kind(wp).base_split();
            for ((partner, partner_share), profile) in
                self.partners.iter().zip(&partner_shares).zip(&profiles)
            {
                let subtotal = (tier as f64 * wp_share * partner_share).round() as Amount;
                if subtotal <= 0 {
                    continue;
                }
                let weights: Vec<f64> = CostCategory::ALL
                    .iter()
                    .map(|c| split.fraction(*c) * c.multiplier_for(profile))
                    .collect();
                let amounts = apportion(subtotal, &weights);
                for (category, amount) in CostCategory::ALL.into_iter().zip(amounts) {
                    cells.set(&wp.id, &partner.id, category, amount);
                }
            }
        }

        let residual = tier - cells.raw_total();
        if residual != 0 {
            let key = self.residual_target(&cells);
            let current = cells.get(&key.work_package, &key.partner, key.category);
            if current + residual < 0 {
                warn!("Residual {residual} exceeds target cell {key} ({current}), leaving unreconciled");
            } else {
                debug!("Placing rounding residual {residual} on {key}");
                cells.adjust(&key, residual);
            }
        }

        self.cells = cells;
        info!(
            "Smart distribution: {} EUR over {} work packages and {} partners",
            tier,
            self.work_packages.len(),
            self.partners.len()
        );
    }

    /// The largest cell of the partner with the largest total. Earlier
    /// partners, work packages and categories win ties.
    fn residual_target(&self, cells: &CellMatrix) -> CellKey {
        let mut best_partner = &self.partners[0];
        let mut best_total = Amount::MIN;
        for partner in &self.partners {
            let total: Amount = cells
                .iter()
                .filter(|(k, _)| k.partner == partner.id)
                .map(|(_, v)| v)
                .sum();
            if total > best_total {
                best_total = total;
                best_partner = partner;
            }
        }

        let mut best = CellKey::new(
            &self.work_packages[0].id,
            &best_partner.id,
            CostCategory::Staff,
        );
        let mut best_amount = Amount::MIN;
        for wp in &self.work_packages {
            for category in CostCategory::ALL {
                let amount = cells.get(&wp.id, &best_partner.id, category);
                if amount > best_amount {
                    best_amount = amount;
                    best = CellKey::new(&wp.id, &best_partner.id, category);
                }
            }
        }
        best
    }

    /// Regenerate every cell by splitting the tier evenly across work
    /// packages, then partners, then the five categories.
    ///
    /// Remainder euros are handed out round-robin across partners, carrying
    /// over between work packages, so partner totals differ by at most one
    /// euro. With no partners or no work packages the state is left
    /// unchanged.
    pub fn auto_distribute(&mut self) {
        if self.partners.is_empty() || self.work_packages.is_empty() {
            debug!("Auto distribution skipped: no partners or no work packages");
            return;
        }

        let tier = self.budget_tier as Amount;
        let n = self.partners.len();
        let wp_amounts = split_evenly(tier, self.work_packages.len());

        let mut cells = CellMatrix::new();
        let mut cursor = 0usize;
        for (wp, wp_amount) in self.work_packages.iter().zip(wp_amounts) {
            let base = wp_amount / n as Amount;
            let rem = (wp_amount % n as Amount) as usize;
            for (i, partner) in self.partners.iter().enumerate() {
                let offset = (i + n - cursor) % n;
                let amount = base + if offset < rem { 1 } else { 0 };
                for (category, cat_amount) in CostCategory::ALL
                    .into_iter()
                    .zip(split_evenly(amount, CostCategory::ALL.len()))
                {
                    cells.set(&wp.id, &partner.id, category, cat_amount);
                }
            }
            cursor = (cursor + rem) % n;
        }

        self.cells = cells;
        info!(
            "Auto distribution: {} EUR evenly over {} work packages and {} partners",
            tier,
            self.work_packages.len(),
            n
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ActionType, PartnerId, WorkPackageUpdate};

    fn partner_total(state: &BudgetState, id: &PartnerId) -> Amount {
        state
            .cells
            .iter()
            .filter(|(k, _)| &k.partner == id)
            .map(|(_, v)| v)
            .sum()
    }

    /// AT coordinator at 40%, RO and ES at 30% each, one WP at 100%.
    fn reference_state() -> (BudgetState, Vec<PartnerId>) {
        let mut state = BudgetState::default();
        let ids = vec![
            state.add_partner("A", "AT"),
            state.add_partner("B", "RO"),
            state.add_partner("C", "ES"),
        ];
        let wp = state.add_work_package("Project Management");
        state
            .update_work_package(&wp, WorkPackageUpdate::target(100.0))
            .unwrap();
        state.set_partner_percentage(&ids[0], 40.0).unwrap();
        state.set_partner_percentage(&ids[1], 30.0).unwrap();
        state.set_partner_percentage(&ids[2], 30.0).unwrap();
        (state, ids)
    }

    #[test]
    fn apportion_sums_exactly() {
        assert_eq!(apportion(100, &[1.0, 1.0, 1.0]), vec![34, 33, 33]);
        assert_eq!(apportion(10, &[0.7, 0.2, 0.0, 0.0, 0.1]), vec![7, 2, 0, 0, 1]);
        assert_eq!(apportion(5, &[0.0, 0.0]), vec![3, 2]);
        assert_eq!(apportion(7, &[f64::NAN, 1.0]), vec![0, 7]);
        assert!(apportion(7, &[]).is_empty());
        let odd = apportion(99_999, &[0.37, 0.11, 0.52]);
        assert_eq!(odd.iter().sum::<Amount>(), 99_999);
    }

    #[test]
    fn split_evenly_front_loads_remainder() {
        assert_eq!(split_evenly(11, 5), vec![3, 2, 2, 2, 2]);
        assert_eq!(split_evenly(10, 5), vec![2, 2, 2, 2, 2]);
        assert!(split_evenly(10, 0).is_empty());
    }

    #[test]
    fn effective_percentages_fill_unset_targets() {
        let mut state = BudgetState::default();
        let a = state.add_work_package("A");
        state.add_work_package("B");
        state.add_work_package("C");
        state
            .update_work_package(&a, WorkPackageUpdate::target(40.0))
            .unwrap();
        assert_eq!(
            effective_wp_percentages(&state.work_packages),
            vec![40.0, 30.0, 30.0]
        );

        state
            .update_work_package(&a, WorkPackageUpdate::target(100.0))
            .unwrap();
        assert_eq!(
            effective_wp_percentages(&state.work_packages),
            vec![100.0, 0.0, 0.0]
        );
    }

    #[test]
    fn smart_distribute_hits_partner_shares_exactly() {
        let (mut state, ids) = reference_state();
        state.smart_distribute();
        assert_eq!(state.cells.raw_total(), 250_000);
        assert_eq!(partner_total(&state, &ids[0]), 100_000);
        assert_eq!(partner_total(&state, &ids[1]), 75_000);
        assert_eq!(partner_total(&state, &ids[2]), 75_000);
    }

    #[test]
    fn smart_distribute_scales_staff_by_country() {
        let (mut state, ids) = reference_state();
        state.smart_distribute();
        let wp = state.work_packages[0].id.clone();
        let ro_staff = state.cells.get(&wp, &ids[1], CostCategory::Staff);
        let es_staff = state.cells.get(&wp, &ids[2], CostCategory::Staff);
        // Same subtotal, lower staff multiplier for RO.
        assert!(ro_staff < es_staff);
        // Management packages carry no equipment.
        assert_eq!(state.cells.get(&wp, &ids[0], CostCategory::Equipment), 0);
    }

    #[test]
    fn smart_distribute_is_idempotent() {
        let (mut state, _) = reference_state();
        state.smart_distribute();
        let first = state.cells.clone();
        state.smart_distribute();
        assert_eq!(state.cells, first);
    }

    #[test]
    fn smart_distribute_without_percentages_splits_evenly() {
        let mut state = BudgetState::new(ActionType::Ka210);
        state.add_partner("A", "DE");
        state.add_partner("B", "BG");
        state.load_standard_wps();
        state.smart_distribute();
        assert_eq!(state.cells.raw_total(), 30_000);
    }

    #[test]
    fn smart_distribute_without_partners_is_a_no_op() {
        let mut state = BudgetState::default();
        state.load_standard_wps();
        state.smart_distribute();
        assert!(state.cells.is_empty());
    }

    #[test]
    fn smart_distribute_replaces_manual_edits() {
        let (mut state, ids) = reference_state();
        let wp = state.work_packages[0].id.clone();
        state
            .set_cell_amount(&wp, &ids[0], CostCategory::Equipment, 5_000.0)
            .unwrap();
        state.smart_distribute();
        assert_eq!(state.cells.get(&wp, &ids[0], CostCategory::Equipment), 0);
        assert_eq!(state.cells.raw_total(), 250_000);
    }

    #[test]
    fn auto_distribute_keeps_partners_within_one_euro() {
        let mut state = BudgetState::default();
        let ids: Vec<_> = ["AT", "RO", "ES", "PL", "FR", "IT", "SE"]
            .iter()
            .map(|c| state.add_partner(format!("P-{c}"), c))
            .collect();
        state.load_standard_wps();
        state.auto_distribute();

        assert_eq!(state.cells.raw_total(), 250_000);
        let totals: Vec<Amount> = ids.iter().map(|id| partner_total(&state, id)).collect();
        let max = totals.iter().max().unwrap();
        let min = totals.iter().min().unwrap();
        assert!(max - min <= 1, "{totals:?}");
    }

    #[test]
    fn auto_distribute_fills_every_category() {
        let mut state = BudgetState::new(ActionType::Ka210);
        state.add_partner("A", "DE");
        state.add_partner("B", "PL");
        state.add_work_package("Only");
        state.auto_distribute();
        assert_eq!(state.cells.len(), 10);
        assert_eq!(state.cells.raw_total(), 30_000);
    }
}
