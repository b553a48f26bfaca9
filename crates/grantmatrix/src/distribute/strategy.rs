//! Percentage suggestion strategies.
//!
//! How much of the lump sum each partner *should* receive is business policy,
//! not matrix math. [`PercentageStrategy`] isolates that policy so it can be
//! swapped or tested on its own; [`BudgetState::suggest_percentages`] writes
//! whatever the strategy returns into `partner_percentages`.

use super::apportion;
use crate::country::get_country_profile;
use crate::model::{BudgetState, Partner, PartnerId};
use std::collections::BTreeMap;
use tracing::debug;

/// Produces whole-number partner percentages that sum to exactly 100.
pub trait PercentageStrategy {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Suggested percent per partner. Empty input yields an empty map.
    fn suggest(&self, partners: &[Partner]) -> BTreeMap<PartnerId, f64>;
}

/// Coordinator premium plus cost-weighted split.
///
/// The coordinator receives `bonus` percentage points on top of its share.
/// The remaining `100 - bonus` points (all 100 when there is no coordinator)
/// are split across every partner in proportion to the staff multiplier of
/// its country, so partners in higher-cost groups get a larger nominal share
/// for the same workload. The result is rounded to whole percentages by
/// largest remainder.
///
/// The 12-point premium is a placeholder policy, not an Erasmus+ rule.
#[derive(Debug, Clone)]
pub struct CoordinatorBonus {
    /// Absolute percentage points added for the coordinator. Default: `12`.
    pub bonus: f64,
}

impl Default for CoordinatorBonus {
    fn default() -> Self {
        Self { bonus: 12.0 }
    }
}

impl CoordinatorBonus {
    pub fn with_bonus(mut self, bonus: f64) -> Self {
        self.bonus = bonus;
        self
    }
}

impl PercentageStrategy for CoordinatorBonus {
    fn name(&self) -> &'static str {
        "coordinator_bonus"
    }

    fn suggest(&self, partners: &[Partner]) -> BTreeMap<PartnerId, f64> {
        if partners.is_empty() {
            return BTreeMap::new();
        }
        if partners.len() == 1 {
            return BTreeMap::from([(partners[0].id.clone(), 100.0)]);
        }

        let has_coordinator = partners.iter().any(|p| p.is_coordinator());
        let bonus = if has_coordinator {
            self.bonus.clamp(0.0, 100.0)
        } else {
            0.0
        };
        let pool = 100.0 - bonus;

        let weights: Vec<f64> = partners
            .iter()
            .map(|p| get_country_profile(&p.country).staff_multiplier)
            .collect();
        let total_weight: f64 = weights.iter().sum();

        let exact: Vec<f64> = partners
            .iter()
            .zip(&weights)
            .map(|(p, w)| {
                let share = if total_weight > 0.0 {
                    pool * w / total_weight
                } else {
                    pool / partners.len() as f64
                };
                share + if p.is_coordinator() { bonus } else { 0.0 }
            })
            .collect();

        into_map(partners, &apportion(100, &exact))
    }
}

/// Equal split, ignoring roles and countries.
#[derive(Debug, Clone, Default)]
pub struct EqualShare;

impl PercentageStrategy for EqualShare {
    fn name(&self) -> &'static str {
        "equal_share"
    }

    fn suggest(&self, partners: &[Partner]) -> BTreeMap<PartnerId, f64> {
        let weights = vec![1.0; partners.len()];
        into_map(partners, &apportion(100, &weights))
    }
}

fn into_map(partners: &[Partner], percents: &[i64]) -> BTreeMap<PartnerId, f64> {
    partners
        .iter()
        .zip(percents)
        .map(|(p, pct)| (p.id.clone(), *pct as f64))
        .collect()
}

impl BudgetState {
    /// Replace `partner_percentages` with the strategy's suggestion.
    /// Does nothing without partners.
    pub fn suggest_percentages(&mut self, strategy: &dyn PercentageStrategy) {
        if self.partners.is_empty() {
            return;
        }
        self.partner_percentages = strategy.suggest(&self.partners);
        debug!(
            "Suggested percentages via {}: {:?}",
            strategy.name(),
            self.partner_percentages
        );
    }
}
