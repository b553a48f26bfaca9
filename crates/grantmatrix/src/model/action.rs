//! Reducer surface over [`BudgetState`].
//!
//! A [`BudgetAction`] names one mutation. [`BudgetState::reduce`] applies it
//! to a copy and returns the next snapshot, leaving the input untouched when
//! the action is rejected. Actions are serde-tagged so hosts can log, replay
//! or send them across a process boundary.

use super::{ActionType, BudgetState, PartnerId, PartnerRole, WorkPackageId};
use super::{PartnerUpdate, WorkPackageUpdate};
use crate::category::CostCategory;
use crate::distribute::CoordinatorBonus;
use crate::error::Result;
use crate::import::{DirectoryPartner, ImportableProject};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BudgetAction {
    SetActionType {
        action_type: ActionType,
    },
    SetBudgetTier {
        tier: u64,
    },
    AddPartner {
        name: String,
        country: String,
        #[serde(default)]
        role: Option<PartnerRole>,
    },
    RemovePartner {
        id: PartnerId,
    },
    UpdatePartner {
        id: PartnerId,
        update: PartnerUpdate,
    },
    ImportPartners {
        partners: Vec<DirectoryPartner>,
    },
    AddWorkPackage {
        title: String,
        #[serde(default)]
        target_percent: Option<f64>,
    },
    RemoveWorkPackage {
        id: WorkPackageId,
    },
    UpdateWorkPackage {
        id: WorkPackageId,
        update: WorkPackageUpdate,
    },
    LoadStandardWps,
    SetPartnerPercentage {
        id: PartnerId,
        percent: f64,
    },
    SuggestPercentages,
    SetCellAmount {
        work_package: WorkPackageId,
        partner: PartnerId,
        category: CostCategory,
        amount: f64,
    },
    ClearAllCells,
    SmartDistribute,
    AutoDistribute,
    ImportFromProject {
        project: ImportableProject,
    },
    CompleteSetup,
    ReopenSetup,
    ResetAll,
}

impl BudgetState {
    /// Apply `action` in place. Every mutator validates before it writes, so
    /// a rejected action leaves the state as it was.
    pub fn apply(&mut self, action: &BudgetAction) -> Result<()> {
        match action {
            BudgetAction::SetActionType { action_type } => self.set_action_type(*action_type),
            BudgetAction::SetBudgetTier { tier } => self.set_budget_tier(*tier)?,
            BudgetAction::AddPartner {
                name,
                country,
                role,
            } => {
                match role {
                    Some(role) => self.add_partner_with_role(name.clone(), country, *role),
                    None => self.add_partner(name.clone(), country),
                };
            }
            BudgetAction::RemovePartner { id } => {
                self.remove_partner(id)?;
            }
            BudgetAction::UpdatePartner { id, update } => {
                self.update_partner(id, update.clone())?
            }
            BudgetAction::ImportPartners { partners } => {
                self.import_partners(partners);
            }
            BudgetAction::AddWorkPackage {
                title,
                target_percent,
            } => {
                let id = self.add_work_package(title.clone());
                if let Some(percent) = target_percent {
                    self.update_work_package(&id, WorkPackageUpdate::target(*percent))?;
                }
            }
            BudgetAction::RemoveWorkPackage { id } => {
                self.remove_work_package(id)?;
            }
            BudgetAction::UpdateWorkPackage { id, update } => {
                self.update_work_package(id, update.clone())?
            }
            BudgetAction::LoadStandardWps => self.load_standard_wps(),
            BudgetAction::SetPartnerPercentage { id, percent } => {
                self.set_partner_percentage(id, *percent)?
            }
            BudgetAction::SuggestPercentages => {
                self.suggest_percentages(&CoordinatorBonus::default())
            }
            BudgetAction::SetCellAmount {
                work_package,
                partner,
                category,
                amount,
            } => self.set_cell_amount(work_package, partner, *category, *amount)?,
            BudgetAction::ClearAllCells => self.clear_all_cells(),
            BudgetAction::SmartDistribute => self.smart_distribute(),
            BudgetAction::AutoDistribute => self.auto_distribute(),
            BudgetAction::ImportFromProject { project } => self.import_from_project(project)?,
            BudgetAction::CompleteSetup => self.complete_setup()?,
            BudgetAction::ReopenSetup => self.reopen_setup(),
            BudgetAction::ResetAll => self.reset_all(),
        }
        Ok(())
    }

    /// Return the snapshot that results from applying `action` to `self`.
    pub fn reduce(&self, action: &BudgetAction) -> Result<BudgetState> {
        let mut next = self.clone();
        next.apply(action)?;
        Ok(next)
    }
}
