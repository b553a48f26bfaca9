//! Lump-sum budget allocation engine for Erasmus+ partnership proposals.
//!
//! An Erasmus+ KA210 or KA220 project receives a fixed lump sum (a *tier*).
//! Applicants must show how that sum splits across work packages, partner
//! organizations and cost categories. `grantmatrix` holds that split as a
//! three-dimensional matrix of whole-EUR cells and keeps it consistent: the
//! generators always hit the tier exactly, removals cascade, and validation
//! reports what is still off.
//!
//! # Getting started
//!
//! ```
//! use grantmatrix::prelude::*;
//!
//! let mut state = BudgetState::new(ActionType::Ka220);
//! state.set_budget_tier(250_000)?;
//! state.add_partner("Bildungswerk Wien", "AT");
//! state.add_partner("Asociatia Educatie", "RO");
//! state.add_partner("Fundación Aprende", "ES");
//! state.load_standard_wps();
//!
//! state.suggest_percentages(&CoordinatorBonus::default());
//! state.smart_distribute();
//! assert_eq!(state.grand_total(), 250_000);
//!
//! let errors: Vec<_> = validate_budget(&state)
//!     .into_iter()
//!     .filter(Violation::is_error)
//!     .collect();
//! assert!(errors.is_empty());
//!
//! let csv = build_table(&state).to_csv()?;
//! assert!(csv.starts_with('\u{FEFF}'));
//! # Ok::<(), grantmatrix::BudgetError>(())
//! ```
//!
//! # Where to find things
//!
//! - **State and mutations:** [`BudgetState`](model::BudgetState) with its
//!   CRUD mutators, and [`BudgetAction`](model::BudgetAction) +
//!   [`BudgetState::reduce`](model::BudgetState::reduce) for
//!   snapshot-to-snapshot updates.
//! - **Reference data:** [`country`] for the cost-of-living profiles,
//!   [`category`] for cost categories and work-package kinds.
//! - **Filling the matrix:** [`distribute`] for smart and even distribution
//!   and the [`PercentageStrategy`](distribute::PercentageStrategy) seam.
//! - **Reading the matrix:** [`query`] for totals, [`validate`] for checks,
//!   [`export`] for the clipboard / CSV table.
//! - **Getting data in and out:** [`import`] for upstream project skeletons
//!   and partner directories, [`persist`] for JSON snapshots.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`model`] | Identifiers, partners, work packages, [`CellMatrix`](model::CellMatrix), [`BudgetState`](model::BudgetState), actions |
//! | [`country`] | Country → cost group and staff / travel multipliers |
//! | [`category`] | Cost categories, work-package kinds and base splits |
//! | [`distribute`] | Percentage strategies, smart and auto distribution |
//! | [`import`] | Project-skeleton and partner-directory adapters |
//! | [`query`] | Pure totals over the matrix |
//! | [`validate`] | Violations and thresholds |
//! | [`export`] | 2-D table, TSV and CSV rendering |
//! | [`persist`] | Atomic JSON snapshot store |

pub mod category;
pub mod country;
pub mod distribute;
pub mod error;
pub mod export;
pub mod import;
pub mod model;
pub mod persist;
pub mod prelude;
pub mod query;
pub mod validate;

pub use error::{BudgetError, Result};
