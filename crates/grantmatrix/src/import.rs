//! Import adapters.
//!
//! Two inbound shapes are accepted:
//!
//! - [`ImportableProject`]: a project skeleton produced upstream (consortium,
//!   work packages, optionally action type, budget and partner shares).
//!   [`BudgetState::import_from_project`] replaces the consortium and work
//!   packages with it in one step. The payload is checked before anything is
//!   written, so a rejected import leaves the state untouched.
//! - [`DirectoryPartner`]: entries from an external partner directory.
//!   [`BudgetState::import_partners`] merges them, skipping entries whose
//!   external id is already present.
//!
//! Neither adapter distributes; callers run a distribution afterwards.

use crate::distribute::CoordinatorBonus;
use crate::error::{BudgetError, Result};
use crate::model::{
    ActionType, BudgetState, CellMatrix, Partner, PartnerId, PartnerRole, WorkPackage,
    WorkPackageId, clamp_percent,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

// ── Payload types ──────────────────────────────────────────────────

/// Project skeleton accepted by [`BudgetState::import_from_project`].
///
/// `consortium` and `work_packages` are optional in the wire format only so
/// that a payload missing them can be reported as
/// [`BudgetError::InconsistentImport`] instead of a parse error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportableProject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_type: Option<ActionType>,
    /// Requested lump sum in EUR. Snapped to the nearest allowed tier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_budget: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consortium: Option<Vec<ImportPartner>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_packages: Option<Vec<ImportWorkPackage>>,
    /// Partner shares in percent, matched by external id or name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_partner: Option<Vec<PerPartnerShare>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportPartner {
    /// External identifier, used for deduplication.
    pub id: String,
    pub name: String,
    pub country: String,
    /// Free-form role; `"coordinator"` (any case) marks the coordinator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub is_lead: bool,
}

impl ImportPartner {
    fn is_coordinator(&self) -> bool {
        self.is_lead
            || self
                .role
                .as_deref()
                .is_some_and(|r| r.trim().eq_ignore_ascii_case("coordinator"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportWorkPackage {
    pub number: u32,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_de: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PerPartnerShare {
    /// External id or name of the partner.
    pub partner: String,
    pub percentage: f64,
}

/// Entry of an external partner directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryPartner {
    pub id: String,
    pub name: String,
    pub country: String,
}

/// JSON Schema of [`ImportableProject`], for hosts that validate payloads
/// before handing them over.
pub fn import_schema() -> serde_json::Value {
    let schema = schemars::schema_for!(ImportableProject);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}

// ── Adapters ───────────────────────────────────────────────────────

impl BudgetState {
    /// Replace partners, work packages and percentages with the contents of
    /// an upstream project skeleton. Existing cells are cleared and setup is
    /// reopened.
    pub fn import_from_project(&mut self, project: &ImportableProject) -> Result<()> {
        let Some(consortium) = project.consortium.as_ref() else {
            return Err(BudgetError::InconsistentImport(
                "payload has no consortium".into(),
            ));
        };
        let Some(work_packages) = project.work_packages.as_ref() else {
            return Err(BudgetError::InconsistentImport(
                "payload has no work packages".into(),
            ));
        };

        let action_type = project.action_type.unwrap_or(self.action_type);
        let tier = match project.total_budget {
            Some(requested) => {
                let snapped = action_type.nearest_tier(requested);
                if snapped != requested {
                    warn!("Imported budget {requested} is not a {action_type} tier, using {snapped}");
                }
                snapped
            }
            None => action_type.budget_tiers().last().copied().unwrap_or(0),
        };

        // Build into a fresh state so nothing leaks into `self` on error.
        let mut next = BudgetState {
            next_id: self.next_id,
            ..BudgetState::new(action_type)
        };
        next.budget_tier = tier;

        let mut seen = HashSet::new();
        let entries: Vec<&ImportPartner> = consortium
            .iter()
            .filter(|p| {
                let fresh = seen.insert(p.id.as_str());
                if !fresh {
                    debug!("Skipping duplicate consortium entry {}", p.id);
                }
                fresh
            })
            .collect();
        let coordinator_idx = entries.iter().position(|p| p.is_coordinator()).unwrap_or(0);

        for (i, entry) in entries.iter().enumerate() {
            let role = if i == coordinator_idx {
                PartnerRole::Coordinator
            } else {
                PartnerRole::Partner
            };
            next.push_partner(Partner {
                id: PartnerId::new(""),
                name: entry.name.clone(),
                country: entry.country.clone(),
                role,
                external_ref: Some(entry.id.clone()),
            });
        }

        let mut sorted: Vec<&ImportWorkPackage> = work_packages.iter().collect();
        sorted.sort_by_key(|w| w.number);
        for wp in sorted {
            let id = WorkPackageId::new(next.mint_id("wp"));
            next.work_packages.push(WorkPackage {
                id,
                number: 0,
                title: wp.title.clone(),
                title_de: wp.title_de.clone().unwrap_or_else(|| wp.title.clone()),
                target_percent: wp.target_percent.map(clamp_percent),
            });
        }
        next.renumber_work_packages();

        next.partner_percentages = match_shares(&next.partners, project.per_partner.as_deref());
        if next.partner_percentages.is_empty() {
            next.suggest_percentages(&CoordinatorBonus::default());
        }

        next.cells = CellMatrix::new();
        next.imported_from_project = project.project_title.clone();

        info!(
            "Imported {} partners and {} work packages ({}, {} EUR)",
            next.partners.len(),
            next.work_packages.len(),
            next.action_type,
            next.budget_tier
        );
        *self = next;
        Ok(())
    }

    /// Merge directory partners, skipping external ids that already exist in
    /// the state or repeat within `list`. Returns the ids of the partners
    /// added.
    pub fn import_partners(&mut self, list: &[DirectoryPartner]) -> Vec<PartnerId> {
        let mut known: HashSet<String> = self
            .partners
            .iter()
            .filter_map(|p| p.external_ref.clone())
            .collect();
        let mut added = Vec::new();
        for entry in list {
            if !known.insert(entry.id.clone()) {
                debug!("Directory partner {} already present", entry.id);
                continue;
            }
            let role = if self.partners.is_empty() {
                PartnerRole::Coordinator
            } else {
                PartnerRole::Partner
            };
            added.push(self.push_partner(Partner {
                id: PartnerId::new(""),
                name: entry.name.clone(),
                country: entry.country.clone(),
                role,
                external_ref: Some(entry.id.clone()),
            }));
        }
        if !added.is_empty() {
            info!("Imported {} directory partner(s)", added.len());
        }
        added
    }
}

/// Match upstream shares to imported partners by external id, then by
/// case-insensitive name. Unmatched partners are left out.
fn match_shares(partners: &[Partner], shares: Option<&[PerPartnerShare]>) -> BTreeMap<PartnerId, f64> {
    let Some(shares) = shares else {
        return BTreeMap::new();
    };
    partners
        .iter()
        .filter_map(|p| {
            let share = shares.iter().find(|s| {
                p.external_ref.as_deref() == Some(s.partner.as_str())
                    || p.name.trim().eq_ignore_ascii_case(s.partner.trim())
            })?;
            Some((p.id.clone(), clamp_percent(share.percentage)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partner(id: &str, name: &str, country: &str) -> ImportPartner {
        ImportPartner {
            id: id.into(),
            name: name.into(),
            country: country.into(),
            role: None,
            is_lead: false,
        }
    }

    fn wp(number: u32, title: &str) -> ImportWorkPackage {
        ImportWorkPackage {
            number,
            title: title.into(),
            title_de: None,
            target_percent: None,
        }
    }

    fn project() -> ImportableProject {
        let mut lead = partner("org-2", "Beta", "ro");
        lead.role = Some("Coordinator".into());
        ImportableProject {
            project_title: Some("Green Skills".into()),
            action_type: Some(ActionType::Ka220),
            total_budget: Some(250_000),
            consortium: Some(vec![
                partner("org-1", "Alpha", "AT"),
                lead,
                partner("org-3", "Gamma", "ES"),
                partner("org-1", "Alpha again", "AT"),
            ]),
            work_packages: Some(vec![wp(3, "Dissemination"), wp(1, "Management"), wp(2, "Development")]),
            per_partner: None,
        }
    }

    #[test]
    fn import_maps_partners_and_coordinator() {
        let mut state = BudgetState::default();
        state.import_from_project(&project()).unwrap();

        assert_eq!(state.partners.len(), 3);
        let coordinator = state.coordinator().unwrap();
        assert_eq!(coordinator.name, "Beta");
        assert_eq!(coordinator.country, "RO");
        assert_eq!(
            state.partners.iter().filter(|p| p.is_coordinator()).count(),
            1
        );
        assert_eq!(state.imported_from_project.as_deref(), Some("Green Skills"));
    }

    #[test]
    fn import_sorts_and_renumbers_work_packages() {
        let mut state = BudgetState::default();
        let mut payload = project();
        payload.work_packages = Some(vec![wp(7, "Dissemination"), wp(2, "Management")]);
        state.import_from_project(&payload).unwrap();

        let listed: Vec<(u32, &str)> = state
            .work_packages
            .iter()
            .map(|w| (w.number, w.title.as_str()))
            .collect();
        assert_eq!(listed, vec![(1, "Management"), (2, "Dissemination")]);
        assert_eq!(state.work_packages[0].title_de, "Management");
    }

    #[test]
    fn import_without_work_packages_is_rejected_atomically() {
        let mut state = BudgetState::default();
        state.add_partner("Existing", "DE");
        let before = state.clone();

        let mut payload = project();
        payload.work_packages = None;
        let err = state.import_from_project(&payload).unwrap_err();
        assert!(matches!(err, BudgetError::InconsistentImport(_)));
        assert_eq!(state, before);

        payload = project();
        payload.consortium = None;
        assert!(state.import_from_project(&payload).is_err());
        assert_eq!(state, before);
    }

    #[test]
    fn import_snaps_budget_to_nearest_tier() {
        let mut state = BudgetState::default();
        let mut payload = project();
        payload.action_type = Some(ActionType::Ka210);
        payload.total_budget = Some(55_000);
        state.import_from_project(&payload).unwrap();
        assert_eq!(state.action_type, ActionType::Ka210);
        assert_eq!(state.budget_tier, 60_000);
    }

    #[test]
    fn import_uses_upstream_shares_when_they_match() {
        let mut state = BudgetState::default();
        let mut payload = project();
        payload.per_partner = Some(vec![
            PerPartnerShare {
                partner: "org-1".into(),
                percentage: 50.0,
            },
            PerPartnerShare {
                partner: "beta".into(),
                percentage: 30.0,
            },
            PerPartnerShare {
                partner: "Gamma".into(),
                percentage: 20.0,
            },
        ]);
        state.import_from_project(&payload).unwrap();
        let pct: Vec<f64> = state
            .partners
            .iter()
            .map(|p| state.partner_percentages[&p.id])
            .collect();
        assert_eq!(pct, vec![50.0, 30.0, 20.0]);
    }

    #[test]
    fn import_suggests_shares_otherwise() {
        let mut state = BudgetState::default();
        state.import_from_project(&project()).unwrap();
        assert_eq!(state.partner_percentages.len(), 3);
        assert_eq!(state.partner_percentage_sum(), 100.0);
        assert!(state.cells.is_empty());
    }

    #[test]
    fn import_payload_parses_from_camel_case_json() {
        let json = r#"{
            "consortium": [{"id": "x", "name": "X", "country": "DE", "isLead": true}],
            "workPackages": [{"number": 1, "title": "Management", "targetPercent": 20}],
            "totalBudget": 120000
        }"#;
        let payload: ImportableProject = serde_json::from_str(json).unwrap();
        assert!(payload.consortium.as_ref().unwrap()[0].is_coordinator());
        assert_eq!(payload.work_packages.as_ref().unwrap()[0].target_percent, Some(20.0));
    }

    #[test]
    fn import_partners_is_idempotent() {
        let mut state = BudgetState::default();
        let list = vec![
            DirectoryPartner {
                id: "dir-1".into(),
                name: "One".into(),
                country: "DE".into(),
            },
            DirectoryPartner {
                id: "dir-2".into(),
                name: "Two".into(),
                country: "FR".into(),
            },
            DirectoryPartner {
                id: "dir-1".into(),
                name: "One (dup)".into(),
                country: "DE".into(),
            },
        ];
        let first = state.import_partners(&list);
        assert_eq!(first.len(), 2);
        let second = state.import_partners(&list);
        assert!(second.is_empty());
        assert_eq!(state.partners.len(), 2);
        assert_eq!(state.coordinator().map(|p| &p.id), Some(&first[0]));
    }

    #[test]
    fn import_partners_keeps_existing_coordinator() {
        let mut state = BudgetState::default();
        let existing = state.add_partner("Lead", "AT");
        state.import_partners(&[DirectoryPartner {
            id: "dir-9".into(),
            name: "Nine".into(),
            country: "PL".into(),
        }]);
        assert_eq!(state.coordinator().map(|p| &p.id), Some(&existing));
    }

    #[test]
    fn schema_describes_import_contract() {
        let schema = import_schema();
        assert_eq!(schema["type"], "object");
        assert!(schema["properties"]["consortium"].is_object());
        assert!(schema["properties"]["workPackages"].is_object());
    }
}
