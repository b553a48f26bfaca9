//! [`BudgetState`]: the single container the engine operates on.
//!
//! The state is a plain value. Mutators take `&mut self`; callers that want
//! snapshot semantics clone first or go through
//! [`BudgetState::reduce`](super::action). Nothing here performs I/O.

use super::cells::{Amount, CellMatrix, MAX_CELL_AMOUNT};
use super::{
    ActionType, Partner, PartnerId, PartnerRole, WorkPackage, WorkPackageId, clamp_percent,
};
use crate::category::CostCategory;
use crate::country::normalize_code;
use crate::error::{BudgetError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Tier used by a freshly reset state.
pub const INITIAL_TIER: u64 = 250_000;

/// Canned work-package template: (title, German title, target percent).
type Template = (&'static str, &'static str, f64);

const STANDARD_WPS_KA210: &[Template] = &[
    ("Project Management", "Projektmanagement", 20.0),
    (
        "Development & Implementation",
        "Entwicklung & Umsetzung",
        50.0,
    ),
    (
        "Dissemination & Follow-up",
        "Verbreitung & Nachhaltigkeit",
        30.0,
    ),
];

const STANDARD_WPS_KA220: &[Template] = &[
    ("Project Management", "Projektmanagement", 18.0),
    ("Research & Analysis", "Forschung & Analyse", 20.0),
    ("Development", "Entwicklung", 30.0),
    ("Piloting & Testing", "Erprobung & Testing", 16.0),
    (
        "Dissemination & Exploitation",
        "Verbreitung & Verwertung",
        16.0,
    ),
];

/// Complete budget of one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetState {
    pub action_type: ActionType,
    /// Lump sum in EUR, one of [`ActionType::budget_tiers`].
    pub budget_tier: u64,
    #[serde(default)]
    pub partners: Vec<Partner>,
    #[serde(default)]
    pub work_packages: Vec<WorkPackage>,
    #[serde(default)]
    pub cells: CellMatrix,
    /// Partner share of the total budget in percent. Should sum to 100.
    #[serde(default)]
    pub partner_percentages: BTreeMap<PartnerId, f64>,
    #[serde(default)]
    pub is_setup_complete: bool,
    /// Title of the project this state was imported from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imported_from_project: Option<String>,
    /// Counter for minting identifiers.
    #[serde(default)]
    pub(crate) next_id: u64,
}

impl Default for BudgetState {
    fn default() -> Self {
        Self {
            action_type: ActionType::Ka220,
            budget_tier: INITIAL_TIER,
            partners: Vec::new(),
            work_packages: Vec::new(),
            cells: CellMatrix::new(),
            partner_percentages: BTreeMap::new(),
            is_setup_complete: false,
            imported_from_project: None,
            next_id: 0,
        }
    }
}

/// Partial update of a partner. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub role: Option<PartnerRole>,
}

/// Partial update of a work package. `None` fields are left unchanged;
/// `target_percent: Some(None)` clears the target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkPackageUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub title_de: Option<String>,
    #[serde(default)]
    pub target_percent: Option<Option<f64>>,
}

impl WorkPackageUpdate {
    pub fn target(percent: f64) -> Self {
        Self {
            target_percent: Some(Some(percent)),
            ..Default::default()
        }
    }
}

impl BudgetState {
    /// Fresh state with the given action type at its first tier.
    pub fn new(action_type: ActionType) -> Self {
        Self {
            action_type,
            budget_tier: action_type.default_tier(),
            ..Default::default()
        }
    }

    pub(crate) fn mint_id(&mut self, prefix: &str) -> String {
        loop {
            self.next_id += 1;
            let candidate = format!("{prefix}_{}", self.next_id);
            let taken = self.partners.iter().any(|p| p.id.as_str() == candidate)
                || self.work_packages.iter().any(|w| w.id.as_str() == candidate);
            if !taken {
                return candidate;
            }
        }
    }

    // ── Lookups ────────────────────────────────────────────────────

    pub fn partner(&self, id: &PartnerId) -> Option<&Partner> {
        self.partners.iter().find(|p| &p.id == id)
    }

    pub fn work_package(&self, id: &WorkPackageId) -> Option<&WorkPackage> {
        self.work_packages.iter().find(|w| &w.id == id)
    }

    pub fn coordinator(&self) -> Option<&Partner> {
        self.partners.iter().find(|p| p.is_coordinator())
    }

    fn require_partner(&self, id: &PartnerId) -> Result<()> {
        match self.partner(id) {
            Some(_) => Ok(()),
            None => Err(BudgetError::UnknownPartner(id.clone())),
        }
    }

    fn require_work_package(&self, id: &WorkPackageId) -> Result<()> {
        match self.work_package(id) {
            Some(_) => Ok(()),
            None => Err(BudgetError::UnknownWorkPackage(id.clone())),
        }
    }

    /// Number of distinct partner countries. Blank codes do not count.
    pub fn distinct_countries(&self) -> usize {
        self.partners
            .iter()
            .map(|p| p.country.trim())
            .filter(|c| !c.is_empty())
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Sum of all partner percentages.
    pub fn partner_percentage_sum(&self) -> f64 {
        self.partner_percentages.values().sum()
    }

    // ── Action type and tier ───────────────────────────────────────

    /// Switch the action type and reset the tier to its first valid value.
    pub fn set_action_type(&mut self, action_type: ActionType) {
        self.action_type = action_type;
        self.budget_tier = action_type.default_tier();
        debug!("Action type set to {action_type}, tier {}", self.budget_tier);
    }

    /// Select a tier. Rejected unless it is one of the action type's tiers.
    pub fn set_budget_tier(&mut self, tier: u64) -> Result<()> {
        if !self.action_type.allows_tier(tier) {
            return Err(BudgetError::TierNotAllowed {
                action_type: self.action_type,
                tier,
                allowed: self.action_type.budget_tiers(),
            });
        }
        self.budget_tier = tier;
        Ok(())
    }

    // ── Partners ───────────────────────────────────────────────────

    /// Add a partner. The first partner of an empty consortium becomes the
    /// coordinator.
    pub fn add_partner(&mut self, name: impl Into<String>, country: &str) -> PartnerId {
        let role = if self.partners.is_empty() {
            PartnerRole::Coordinator
        } else {
            PartnerRole::Partner
        };
        self.add_partner_with_role(name, country, role)
    }

    /// Add a partner with an explicit role. Adding a coordinator demotes the
    /// current one.
    pub fn add_partner_with_role(
        &mut self,
        name: impl Into<String>,
        country: &str,
        role: PartnerRole,
    ) -> PartnerId {
        let id = PartnerId::new(self.mint_id("bp"));
        if role == PartnerRole::Coordinator {
            self.demote_coordinators();
        }
        let partner = Partner {
            id: id.clone(),
            name: name.into(),
            country: normalize_code(country),
            role,
            external_ref: None,
        };
        debug!(
            "Added partner {} '{}' ({})",
            partner.id, partner.name, partner.country
        );
        self.partners.push(partner);
        id
    }

    pub(crate) fn push_partner(&mut self, mut partner: Partner) -> PartnerId {
        partner.id = PartnerId::new(self.mint_id("bp"));
        partner.country = normalize_code(&partner.country);
        if partner.is_coordinator() {
            self.demote_coordinators();
        }
        let id = partner.id.clone();
        self.partners.push(partner);
        id
    }

    fn demote_coordinators(&mut self) {
        for p in &mut self.partners {
            p.role = PartnerRole::Partner;
        }
    }

    /// Remove a partner together with its cells and percentage.
    pub fn remove_partner(&mut self, id: &PartnerId) -> Result<Partner> {
        let idx = self
            .partners
            .iter()
            .position(|p| &p.id == id)
            .ok_or_else(|| BudgetError::UnknownPartner(id.clone()))?;
        let partner = self.partners.remove(idx);
        let removed = self.cells.remove_partner(id);
        self.partner_percentages.remove(id);
        debug!("Removed partner {id} and {removed} cell(s)");
        Ok(partner)
    }

    pub fn update_partner(&mut self, id: &PartnerId, update: PartnerUpdate) -> Result<()> {
        self.require_partner(id)?;
        if update.role == Some(PartnerRole::Coordinator) {
            self.demote_coordinators();
        }
        if let Some(p) = self.partners.iter_mut().find(|p| &p.id == id) {
            if let Some(name) = update.name {
                p.name = name;
            }
            if let Some(country) = update.country {
                p.country = normalize_code(&country);
            }
            if let Some(role) = update.role {
                p.role = role;
            }
        }
        Ok(())
    }

    /// Make `id` the coordinator, demoting any previous one.
    pub fn set_coordinator(&mut self, id: &PartnerId) -> Result<()> {
        self.update_partner(
            id,
            PartnerUpdate {
                role: Some(PartnerRole::Coordinator),
                ..Default::default()
            },
        )
    }

    /// Set a partner's share in percent, clamped to `[0, 100]`.
    pub fn set_partner_percentage(&mut self, id: &PartnerId, percent: f64) -> Result<()> {
        self.require_partner(id)?;
        let clamped = clamp_percent(percent);
        if clamped != percent {
            warn!("Percentage {percent} for partner {id} clamped to {clamped}");
        }
        self.partner_percentages.insert(id.clone(), clamped);
        Ok(())
    }

    // ── Work packages ──────────────────────────────────────────────

    /// Append a work package with the next sequential number.
    pub fn add_work_package(&mut self, title: impl Into<String>) -> WorkPackageId {
        let title = title.into();
        let id = WorkPackageId::new(self.mint_id("wp"));
        let number = self.work_packages.len() as u32 + 1;
        debug!("Added work package {id} as WP{number} '{title}'");
        self.work_packages.push(WorkPackage {
            id: id.clone(),
            number,
            title_de: title.clone(),
            title,
            target_percent: None,
        });
        id
    }

    /// Remove a work package and its cells; later packages are renumbered so
    /// numbering stays dense.
    pub fn remove_work_package(&mut self, id: &WorkPackageId) -> Result<WorkPackage> {
        let idx = self
            .work_packages
            .iter()
            .position(|w| &w.id == id)
            .ok_or_else(|| BudgetError::UnknownWorkPackage(id.clone()))?;
        let wp = self.work_packages.remove(idx);
        let removed = self.cells.remove_work_package(id);
        self.renumber_work_packages();
        debug!("Removed work package {id} and {removed} cell(s)");
        Ok(wp)
    }

    pub(crate) fn renumber_work_packages(&mut self) {
        for (i, wp) in self.work_packages.iter_mut().enumerate() {
            wp.number = i as u32 + 1;
        }
    }

    pub fn update_work_package(&mut self, id: &WorkPackageId, update: WorkPackageUpdate) -> Result<()> {
        let wp = self
            .work_packages
            .iter_mut()
            .find(|w| &w.id == id)
            .ok_or_else(|| BudgetError::UnknownWorkPackage(id.clone()))?;
        if let Some(title) = update.title {
            wp.title = title;
        }
        if let Some(title_de) = update.title_de {
            wp.title_de = title_de;
        }
        if let Some(target) = update.target_percent {
            wp.target_percent = target.map(clamp_percent);
        }
        Ok(())
    }

    /// Replace the work packages with the canned template for the current
    /// action type and clear all cells.
    pub fn load_standard_wps(&mut self) {
        let templates = match self.action_type {
            ActionType::Ka210 => STANDARD_WPS_KA210,
            ActionType::Ka220 => STANDARD_WPS_KA220,
        };
        self.work_packages.clear();
        self.cells.clear();
        for (title, title_de, percent) in templates {
            let id = WorkPackageId::new(self.mint_id("wp"));
            let number = self.work_packages.len() as u32 + 1;
            self.work_packages.push(WorkPackage {
                id,
                number,
                title: (*title).to_string(),
                title_de: (*title_de).to_string(),
                target_percent: Some(*percent),
            });
        }
        debug!(
            "Loaded {} standard work packages for {}",
            templates.len(),
            self.action_type
        );
    }

    // ── Cells ──────────────────────────────────────────────────────

    /// Direct matrix edit. The amount is rounded to whole EUR and clamped
    /// to `0..=MAX_CELL_AMOUNT`.
    pub fn set_cell_amount(
        &mut self,
        wp: &WorkPackageId,
        partner: &PartnerId,
        category: CostCategory,
        amount: f64,
    ) -> Result<()> {
        self.require_work_package(wp)?;
        self.require_partner(partner)?;
        let rounded = if amount.is_finite() {
            amount.round().clamp(0.0, MAX_CELL_AMOUNT as f64) as Amount
        } else {
            0
        };
        if (rounded as f64) != amount {
            debug!("Cell amount {amount} stored as {rounded}");
        }
        self.cells.set(wp, partner, category, rounded);
        Ok(())
    }

    pub fn clear_all_cells(&mut self) {
        self.cells.clear();
    }

    // ── Setup lifecycle ────────────────────────────────────────────

    /// Check the partner-count and distinct-country minimum of the action
    /// type.
    pub fn check_consortium(&self) -> Result<()> {
        let required = self.action_type.min_partners();
        let partners = self.partners.len();
        let countries = self.distinct_countries();
        if partners < required || countries < required {
            return Err(BudgetError::ConsortiumTooSmall {
                action_type: self.action_type,
                required,
                partners,
                countries,
            });
        }
        Ok(())
    }

    /// Mark setup as complete. Rejected while the consortium is too small.
    pub fn complete_setup(&mut self) -> Result<()> {
        self.check_consortium()?;
        self.is_setup_complete = true;
        Ok(())
    }

    pub fn reopen_setup(&mut self) {
        self.is_setup_complete = false;
    }

    /// Back to the initial empty state.
    pub fn reset_all(&mut self) {
        *self = Self::default();
        debug!("Budget state reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_partner_state() -> (BudgetState, Vec<PartnerId>) {
        let mut state = BudgetState::default();
        let ids = vec![
            state.add_partner("Alpha", "at"),
            state.add_partner("Beta", "RO"),
            state.add_partner("Gamma", "ES"),
        ];
        (state, ids)
    }

    #[test]
    fn first_partner_becomes_coordinator() {
        let (state, ids) = three_partner_state();
        assert_eq!(state.coordinator().map(|p| &p.id), Some(&ids[0]));
        assert_eq!(
            state.partners.iter().filter(|p| p.is_coordinator()).count(),
            1
        );
        assert_eq!(state.partners[0].country, "AT");
    }

    #[test]
    fn promoting_a_partner_demotes_the_coordinator() {
        let (mut state, ids) = three_partner_state();
        state.set_coordinator(&ids[2]).unwrap();
        assert_eq!(state.coordinator().map(|p| &p.id), Some(&ids[2]));
        assert_eq!(
            state.partners.iter().filter(|p| p.is_coordinator()).count(),
            1
        );
    }

    #[test]
    fn remove_partner_cascades_cells_and_percentage() {
        let (mut state, ids) = three_partner_state();
        let wp = state.add_work_package("Management");
        state
            .set_cell_amount(&wp, &ids[1], CostCategory::Staff, 1000.0)
            .unwrap();
        state
            .set_cell_amount(&wp, &ids[0], CostCategory::Staff, 500.0)
            .unwrap();
        state.set_partner_percentage(&ids[1], 30.0).unwrap();

        state.remove_partner(&ids[1]).unwrap();
        assert_eq!(state.partners.len(), 2);
        assert_eq!(state.cells.len(), 1);
        assert!(!state.partner_percentages.contains_key(&ids[1]));
        assert!(matches!(
            state.remove_partner(&ids[1]),
            Err(BudgetError::UnknownPartner(_))
        ));
    }

    #[test]
    fn work_packages_are_numbered_densely() {
        let mut state = BudgetState::default();
        let a = state.add_work_package("A");
        let b = state.add_work_package("B");
        let c = state.add_work_package("C");
        assert_eq!(state.work_package(&c).unwrap().number, 3);

        state.remove_work_package(&a).unwrap();
        let numbers: Vec<u32> = state.work_packages.iter().map(|w| w.number).collect();
        assert_eq!(numbers, vec![1, 2]);
        assert_eq!(state.work_package(&b).unwrap().number, 1);

        let d = state.add_work_package("D");
        assert_eq!(state.work_package(&d).unwrap().number, 3);
    }

    #[test]
    fn ids_are_never_reused() {
        let mut state = BudgetState::default();
        let a = state.add_work_package("A");
        state.remove_work_package(&a).unwrap();
        let b = state.add_work_package("B");
        assert_ne!(a, b);
    }

    #[test]
    fn update_work_package_clamps_and_clears_target() {
        let mut state = BudgetState::default();
        let wp = state.add_work_package("A");
        state
            .update_work_package(&wp, WorkPackageUpdate::target(140.0))
            .unwrap();
        assert_eq!(state.work_package(&wp).unwrap().target_percent, Some(100.0));
        state
            .update_work_package(
                &wp,
                WorkPackageUpdate {
                    target_percent: Some(None),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(state.work_package(&wp).unwrap().target_percent, None);
    }

    #[test]
    fn set_action_type_resets_to_first_tier() {
        let mut state = BudgetState::default();
        state.set_action_type(ActionType::Ka210);
        assert_eq!(state.budget_tier, 30_000);
        state.set_action_type(ActionType::Ka220);
        assert_eq!(state.budget_tier, 120_000);
    }

    #[test]
    fn set_budget_tier_rejects_foreign_tiers() {
        let mut state = BudgetState::new(ActionType::Ka210);
        assert!(state.set_budget_tier(60_000).is_ok());
        let err = state.set_budget_tier(250_000).unwrap_err();
        assert!(matches!(err, BudgetError::TierNotAllowed { tier: 250_000, .. }));
        assert_eq!(state.budget_tier, 60_000);
    }

    #[test]
    fn percentages_are_clamped() {
        let (mut state, ids) = three_partner_state();
        state.set_partner_percentage(&ids[0], 120.0).unwrap();
        state.set_partner_percentage(&ids[1], -3.0).unwrap();
        assert_eq!(state.partner_percentages[&ids[0]], 100.0);
        assert_eq!(state.partner_percentages[&ids[1]], 0.0);
        assert!(
            state
                .set_partner_percentage(&PartnerId::new("bp_404"), 10.0)
                .is_err()
        );
    }

    #[test]
    fn standard_templates_match_action_type() {
        let mut state = BudgetState::new(ActionType::Ka210);
        state.load_standard_wps();
        assert_eq!(state.work_packages.len(), 3);
        let sum: f64 = state
            .work_packages
            .iter()
            .filter_map(|w| w.target_percent)
            .sum();
        assert_eq!(sum, 100.0);

        state.set_action_type(ActionType::Ka220);
        state.load_standard_wps();
        assert_eq!(state.work_packages.len(), 5);
        assert_eq!(state.work_packages[2].title_de, "Entwicklung");
        assert_eq!(state.work_packages[4].number, 5);
    }

    #[test]
    fn set_cell_amount_rounds_and_clamps() {
        let (mut state, ids) = three_partner_state();
        let wp = state.add_work_package("A");
        state
            .set_cell_amount(&wp, &ids[0], CostCategory::Travel, 99.6)
            .unwrap();
        assert_eq!(state.cells.get(&wp, &ids[0], CostCategory::Travel), 100);
        state
            .set_cell_amount(&wp, &ids[0], CostCategory::Travel, -40.0)
            .unwrap();
        assert_eq!(state.cells.get(&wp, &ids[0], CostCategory::Travel), 0);
        assert!(
            state
                .set_cell_amount(&WorkPackageId::new("wp_x"), &ids[0], CostCategory::Staff, 1.0)
                .is_err()
        );
    }

    #[test]
    fn huge_cell_amounts_keep_totals_computable() {
        let (mut state, ids) = three_partner_state();
        let wp = state.add_work_package("A");
        state
            .set_cell_amount(&wp, &ids[0], CostCategory::Staff, 1e19)
            .unwrap();
        state
            .set_cell_amount(&wp, &ids[1], CostCategory::Staff, 1e19)
            .unwrap();
        assert_eq!(state.cells.get(&wp, &ids[0], CostCategory::Staff), MAX_CELL_AMOUNT);
        assert_eq!(state.grand_total(), 2 * MAX_CELL_AMOUNT);
        assert_eq!(state.partner_total(&ids[1]), MAX_CELL_AMOUNT);
    }

    #[test]
    fn blank_country_codes_do_not_count_as_countries() {
        let mut state = BudgetState::new(ActionType::Ka210);
        state.add_partner("A", "AT");
        state.add_partner("B", "");
        state.add_partner("C", "   ");
        assert_eq!(state.distinct_countries(), 1);
        assert!(matches!(
            state.complete_setup(),
            Err(BudgetError::ConsortiumTooSmall { countries: 1, .. })
        ));
    }

    #[test]
    fn complete_setup_requires_distinct_countries() {
        let mut state = BudgetState::new(ActionType::Ka220);
        state.add_partner("A", "AT");
        state.add_partner("B", "AT");
        state.add_partner("C", "RO");
        assert!(matches!(
            state.complete_setup(),
            Err(BudgetError::ConsortiumTooSmall {
                countries: 2,
                required: 3,
                ..
            })
        ));
        state.add_partner("D", "ES");
        state.complete_setup().unwrap();
        assert!(state.is_setup_complete);

        let mut small = BudgetState::new(ActionType::Ka210);
        small.add_partner("A", "AT");
        small.add_partner("B", "RO");
        small.complete_setup().unwrap();
    }

    #[test]
    fn reset_all_returns_initial_state() {
        let (mut state, _) = three_partner_state();
        state.load_standard_wps();
        state.reset_all();
        assert_eq!(state, BudgetState::default());
    }

    #[test]
    fn state_serializes_with_flat_cell_keys() {
        let (mut state, ids) = three_partner_state();
        let wp = state.add_work_package("A");
        state
            .set_cell_amount(&wp, &ids[0], CostCategory::Staff, 10.0)
            .unwrap();
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["actionType"], "KA220");
        assert_eq!(json["budgetTier"], 250_000);
        assert_eq!(json["cells"][format!("{wp}:{}:staff", ids[0])], 10);

        let back: BudgetState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }
}
