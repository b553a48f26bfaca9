//! CLI configuration with sensible defaults.
//!
//! [`CliConfig`] collects the settings the command-line host needs and turns
//! them into engine types via [`store`](CliConfig::store),
//! [`strategy`](CliConfig::strategy) and [`rules`](CliConfig::rules).

use std::path::PathBuf;

use grantmatrix::distribute::CoordinatorBonus;
use grantmatrix::persist::StateStore;
use grantmatrix::validate::ValidationRules;

/// Default snapshot file, relative to the working directory.
pub const DEFAULT_STATE_FILE: &str = "grantmatrix.json";

#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Snapshot file. Default: `grantmatrix.json`.
    pub state_path: PathBuf,
    /// Coordinator premium for percentage suggestions. Default: `12`.
    pub coordinator_bonus: f64,
    /// Tolerance for Σ partner percentages. Default: `1`.
    pub percentage_tolerance: f64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            state_path: PathBuf::from(DEFAULT_STATE_FILE),
            coordinator_bonus: CoordinatorBonus::default().bonus,
            percentage_tolerance: ValidationRules::default().percentage_tolerance,
        }
    }
}

impl CliConfig {
    pub fn with_state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_path = path.into();
        self
    }

    pub fn with_coordinator_bonus(mut self, bonus: f64) -> Self {
        self.coordinator_bonus = bonus;
        self
    }

    pub fn with_percentage_tolerance(mut self, tolerance: f64) -> Self {
        self.percentage_tolerance = tolerance;
        self
    }

    pub fn store(&self) -> StateStore {
        StateStore::new(&self.state_path)
    }

    pub fn strategy(&self) -> CoordinatorBonus {
        CoordinatorBonus::default().with_bonus(self.coordinator_bonus)
    }

    pub fn rules(&self) -> ValidationRules {
        ValidationRules::default().with_percentage_tolerance(self.percentage_tolerance)
    }
}
