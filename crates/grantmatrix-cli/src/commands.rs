//! Command-line surface and command execution.
//!
//! [`Cli`] is the clap definition. [`execute`] runs one [`Command`] against a
//! loaded [`BudgetState`] and returns an [`Outcome`]: the text to print,
//! whether the state changed (so the caller knows to save it), and whether
//! the command should exit non-zero.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use grantmatrix::country::country_list;
use grantmatrix::distribute::{EqualShare, effective_wp_percentages};
use grantmatrix::import::{DirectoryPartner, import_schema};
use grantmatrix::prelude::*;
use tracing::{debug, info, warn};

use crate::config::{CliConfig, DEFAULT_STATE_FILE};

/// Plan Erasmus+ lump-sum budgets from the command line.
#[derive(Parser, Debug)]
#[command(name = "grantmatrix", version)]
pub struct Cli {
    /// Budget snapshot file.
    #[arg(long, global = true, env = "GRANTMATRIX_STATE", default_value = DEFAULT_STATE_FILE)]
    pub state: PathBuf,

    /// Coordinator premium, in percentage points, used by `percent suggest`.
    #[arg(long, global = true, default_value_t = 12.0)]
    pub coordinator_bonus: f64,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn config(&self) -> CliConfig {
        CliConfig::default()
            .with_state_path(&self.state)
            .with_coordinator_bonus(self.coordinator_bonus)
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start a new budget, discarding the current one.
    Init {
        #[arg(long, default_value = "KA220")]
        action_type: ActionType,
        /// Lump sum in EUR. Defaults to the action type's first tier.
        #[arg(long)]
        tier: Option<u64>,
    },
    /// Select the lump-sum tier.
    Tier { amount: u64 },
    /// Manage partners.
    #[command(subcommand)]
    Partner(PartnerCommand),
    /// Manage work packages.
    #[command(subcommand)]
    Wp(WpCommand),
    /// Manage partner percentages.
    #[command(subcommand)]
    Percent(PercentCommand),
    /// Set a single cell amount in EUR.
    Cell {
        work_package: String,
        partner: String,
        category: CostCategory,
        amount: f64,
    },
    /// Remove every cell amount.
    ClearCells,
    /// Regenerate all cells from the tier.
    Distribute {
        #[arg(value_enum, default_value_t = Method::Smart)]
        method: Method,
    },
    /// Replace the consortium and work packages with a project skeleton (JSON).
    ImportProject { file: PathBuf },
    /// Merge partners from a directory listing (JSON array).
    ImportPartners { file: PathBuf },
    /// Apply a JSON array of budget actions in order.
    Apply { file: PathBuf },
    /// Mark setup complete, or reopen it.
    Setup {
        #[arg(long)]
        reopen: bool,
    },
    /// Check the budget; exits 1 if any error is found.
    Validate {
        #[arg(long)]
        json: bool,
    },
    /// Render the budget table.
    Export {
        #[arg(long, value_enum, default_value_t = Format::Csv)]
        format: Format,
        /// Output file or directory. Prints to stdout when omitted.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Show totals per partner and work package.
    Show {
        #[arg(long)]
        json: bool,
    },
    /// List known countries and their cost multipliers.
    Countries,
    /// Print the JSON Schema of the project import payload.
    Schema,
    /// Reset to the initial empty budget.
    Reset,
}

#[derive(Subcommand, Debug)]
pub enum PartnerCommand {
    Add {
        name: String,
        country: String,
        #[arg(long)]
        coordinator: bool,
    },
    Remove { id: String },
    /// Make a partner the coordinator.
    Coordinator { id: String },
    List,
}

#[derive(Subcommand, Debug)]
pub enum WpCommand {
    Add {
        title: String,
        #[arg(long)]
        title_de: Option<String>,
        #[arg(long)]
        target: Option<f64>,
    },
    Remove { id: String },
    /// Set a work package's target percent; omit the value to clear it.
    Target { id: String, percent: Option<f64> },
    /// Load the standard work packages for the action type.
    Standard,
    List,
}

#[derive(Subcommand, Debug)]
pub enum PercentCommand {
    Set { id: String, percent: f64 },
    /// Replace all percentages with a suggestion.
    Suggest {
        /// Split evenly instead of weighting by coordinator role and country.
        #[arg(long)]
        equal: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Smart,
    Auto,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Csv,
    Tsv,
}

/// Result of one command.
#[derive(Debug, Default)]
pub struct Outcome {
    pub output: String,
    pub modified: bool,
    pub failed: bool,
}

impl Outcome {
    fn changed(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            modified: true,
            failed: false,
        }
    }

    fn unchanged(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            modified: false,
            failed: false,
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    serde_json::from_str(&text).map_err(|e| format!("Failed to parse {}: {e}", path.display()))
}

/// Run `command` against `state`.
pub fn execute(
    command: &Command,
    state: &mut BudgetState,
    config: &CliConfig,
) -> Result<Outcome, String> {
    debug!("Executing {command:?}");
    match command {
        Command::Init { action_type, tier } => {
            let mut next = BudgetState::new(*action_type);
            if let Some(tier) = tier {
                next.set_budget_tier(*tier).map_err(|e| e.to_string())?;
            }
            *state = next;
            Ok(Outcome::changed(format!(
                "New {} budget at {} EUR",
                state.action_type.label(),
                state.budget_tier
            )))
        }
        Command::Tier { amount } => {
            state.set_budget_tier(*amount).map_err(|e| e.to_string())?;
            Ok(Outcome::changed(format!("Budget tier set to {amount} EUR")))
        }
        Command::Partner(cmd) => partner(cmd, state),
        Command::Wp(cmd) => work_package(cmd, state),
        Command::Percent(PercentCommand::Set { id, percent }) => {
            state
                .set_partner_percentage(&PartnerId::new(id.as_str()), *percent)
                .map_err(|e| e.to_string())?;
            Ok(Outcome::changed(format!(
                "Percentages now sum to {:.1}%",
                state.partner_percentage_sum()
            )))
        }
        Command::Percent(PercentCommand::Suggest { equal }) => {
            if *equal {
                state.suggest_percentages(&EqualShare);
            } else {
                state.suggest_percentages(&config.strategy());
            }
            Ok(Outcome::changed(percentages(state)))
        }
        Command::Cell {
            work_package,
            partner,
            category,
            amount,
        } => {
            state
                .set_cell_amount(
                    &WorkPackageId::new(work_package.as_str()),
                    &PartnerId::new(partner.as_str()),
                    *category,
                    *amount,
                )
                .map_err(|e| e.to_string())?;
            Ok(Outcome::changed(format!(
                "Grand total now {} of {} EUR",
                state.grand_total(),
                state.budget_tier
            )))
        }
        Command::ClearCells => {
            state.clear_all_cells();
            Ok(Outcome::changed("All cells cleared"))
        }
        Command::Distribute { method } => {
            match method {
                Method::Smart => state.smart_distribute(),
                Method::Auto => state.auto_distribute(),
            }
            Ok(Outcome::changed(format!(
                "Distributed {} of {} EUR across {} cells",
                state.grand_total(),
                state.budget_tier,
                state.cells.len()
            )))
        }
        Command::ImportProject { file } => {
            let project: ImportableProject = read_json(file)?;
            state
                .import_from_project(&project)
                .map_err(|e| e.to_string())?;
            Ok(Outcome::changed(format!(
                "Imported {} partners and {} work packages",
                state.partners.len(),
                state.work_packages.len()
            )))
        }
        Command::ImportPartners { file } => {
            let list: Vec<DirectoryPartner> = read_json(file)?;
            let added = state.import_partners(&list);
            Ok(Outcome {
                modified: !added.is_empty(),
                ..Outcome::unchanged(format!(
                    "Added {} of {} partners",
                    added.len(),
                    list.len()
                ))
            })
        }
        Command::Apply { file } => {
            let actions: Vec<BudgetAction> = read_json(file)?;
            let mut next = state.clone();
            for (i, action) in actions.iter().enumerate() {
                next.apply(action)
                    .map_err(|e| format!("Action {} failed: {e}", i + 1))?;
            }
            *state = next;
            info!("Applied {} action(s)", actions.len());
            Ok(Outcome::changed(format!("Applied {} action(s)", actions.len())))
        }
        Command::Setup { reopen } => {
            if *reopen {
                state.reopen_setup();
                Ok(Outcome::changed("Setup reopened"))
            } else {
                state.complete_setup().map_err(|e| e.to_string())?;
                Ok(Outcome::changed("Setup complete"))
            }
        }
        Command::Validate { json } => {
            let violations = validate_with(state, &config.rules());
            let failed = violations.iter().any(Violation::is_error);
            let output = if *json {
                serde_json::to_string_pretty(&violations).map_err(|e| e.to_string())?
            } else if violations.is_empty() {
                "No problems found".to_string()
            } else {
                violations
                    .iter()
                    .map(|v| format!("{}: {v}", v.severity()))
                    .collect::<Vec<_>>()
                    .join("\n")
            };
            Ok(Outcome {
                failed,
                ..Outcome::unchanged(output)
            })
        }
        Command::Export { format, out } => export(state, *format, out.as_deref()),
        Command::Show { json } => {
            let summary = state.summary();
            if *json {
                let text = serde_json::to_string_pretty(&summary).map_err(|e| e.to_string())?;
                return Ok(Outcome::unchanged(text));
            }
            Ok(Outcome::unchanged(render_summary(&summary)))
        }
        Command::Countries => {
            let lines: Vec<String> = country_list()
                .iter()
                .map(|c| {
                    format!(
                        "{}  {:<24} group {}  staff {:.2}  travel {:.2}",
                        c.code,
                        c.name,
                        c.group.label(),
                        c.staff_multiplier,
                        c.travel_multiplier
                    )
                })
                .collect();
            Ok(Outcome::unchanged(lines.join("\n")))
        }
        Command::Schema => {
            let text = serde_json::to_string_pretty(&import_schema()).map_err(|e| e.to_string())?;
            Ok(Outcome::unchanged(text))
        }
        Command::Reset => {
            state.reset_all();
            Ok(Outcome::changed("Budget reset"))
        }
    }
}

fn partner(cmd: &PartnerCommand, state: &mut BudgetState) -> Result<Outcome, String> {
    match cmd {
        PartnerCommand::Add {
            name,
            country,
            coordinator,
        } => {
            if !grantmatrix::country::is_known_country(country) {
                warn!("Unknown country '{country}', using default cost profile");
            }
            let id = if *coordinator {
                state.add_partner_with_role(name.as_str(), country, PartnerRole::Coordinator)
            } else {
                state.add_partner(name.as_str(), country)
            };
            Ok(Outcome::changed(format!("Added partner {id}")))
        }
        PartnerCommand::Remove { id } => {
            let removed = state
                .remove_partner(&PartnerId::new(id.as_str()))
                .map_err(|e| e.to_string())?;
            Ok(Outcome::changed(format!("Removed partner {}", removed.name)))
        }
        PartnerCommand::Coordinator { id } => {
            state
                .set_coordinator(&PartnerId::new(id.as_str()))
                .map_err(|e| e.to_string())?;
            Ok(Outcome::changed(format!("{id} is now the coordinator")))
        }
        PartnerCommand::List => {
            let lines: Vec<String> = state
                .partners
                .iter()
                .map(|p| {
                    let marker = if p.is_coordinator() { " (coordinator)" } else { "" };
                    let pct = state
                        .partner_percentages
                        .get(&p.id)
                        .map(|v| format!("{v:.1}%"))
                        .unwrap_or_else(|| "-".into());
                    format!("{}  {} [{}] {pct}{marker}", p.id, p.name, p.country)
                })
                .collect();
            Ok(Outcome::unchanged(lines.join("\n")))
        }
    }
}

fn work_package(cmd: &WpCommand, state: &mut BudgetState) -> Result<Outcome, String> {
    match cmd {
        WpCommand::Add {
            title,
            title_de,
            target,
        } => {
            let id = state.add_work_package(title.as_str());
            let update = WorkPackageUpdate {
                title_de: title_de.clone(),
                target_percent: target.map(Some),
                ..Default::default()
            };
            state
                .update_work_package(&id, update)
                .map_err(|e| e.to_string())?;
            Ok(Outcome::changed(format!("Added work package {id}")))
        }
        WpCommand::Remove { id } => {
            let removed = state
                .remove_work_package(&WorkPackageId::new(id.as_str()))
                .map_err(|e| e.to_string())?;
            Ok(Outcome::changed(format!("Removed {}", removed.title)))
        }
        WpCommand::Target { id, percent } => {
            let update = WorkPackageUpdate {
                target_percent: Some(*percent),
                ..Default::default()
            };
            state
                .update_work_package(&WorkPackageId::new(id.as_str()), update)
                .map_err(|e| e.to_string())?;
            Ok(Outcome::changed(format!("Updated {id}")))
        }
        WpCommand::Standard => {
            state.load_standard_wps();
            Ok(Outcome::changed(format!(
                "Loaded {} standard work packages",
                state.work_packages.len()
            )))
        }
        WpCommand::List => {
            let effective = effective_wp_percentages(&state.work_packages);
            let lines: Vec<String> = state
                .work_packages
                .iter()
                .zip(effective)
                .map(|(w, pct)| {
                    let source = if w.target_percent.is_some() { "" } else { " (auto)" };
                    format!("{}  {}: {} {pct:.1}%{source}", w.id, w.label(), w.title)
                })
                .collect();
            Ok(Outcome::unchanged(lines.join("\n")))
        }
    }
}

fn percentages(state: &BudgetState) -> String {
    state
        .partners
        .iter()
        .map(|p| {
            let pct = state.partner_percentages.get(&p.id).copied().unwrap_or(0.0);
            format!("{}  {pct:.0}%", p.name)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn export(state: &BudgetState, format: Format, out: Option<&Path>) -> Result<Outcome, String> {
    let table = build_table(state);
    let text = match format {
        Format::Csv => table.to_csv().map_err(|e| e.to_string())?,
        Format::Tsv => table.to_tsv().map_err(|e| e.to_string())?,
    };
    let Some(out) = out else {
        return Ok(Outcome::unchanged(text));
    };
    let path = if out.is_dir() {
        let today = chrono::Local::now().date_naive();
        let mut name = export_file_name(state.action_type, today);
        if format == Format::Tsv {
            name = name.replace(".csv", ".tsv");
        }
        out.join(name)
    } else {
        out.to_path_buf()
    };
    std::fs::write(&path, text).map_err(|e| format!("Failed to write {}: {e}", path.display()))?;
    Ok(Outcome::unchanged(format!("Wrote {}", path.display())))
}

fn render_summary(summary: &grantmatrix::query::BudgetSummary) -> String {
    let mut lines = vec![format!(
        "{} budget: {} of {} EUR allocated (difference {})",
        summary.action_type, summary.grand_total, summary.budget_tier, summary.difference
    )];
    lines.push(String::new());
    lines.push("Partners:".to_string());
    for p in &summary.partners {
        let target = p
            .target_percent
            .map(|t| format!(" / target {t:.1}%"))
            .unwrap_or_default();
        lines.push(format!(
            "  {:<28} {:>10} EUR  {:>5.1}%{target}",
            p.name, p.total, p.percent_of_tier
        ));
    }
    lines.push(String::new());
    lines.push("Work packages:".to_string());
    for w in &summary.work_packages {
        lines.push(format!(
            "  {:<5} {:<28} {:>10} EUR  {:>5.1}%",
            w.label, w.title, w.total, w.percent_of_tier
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(args: &[&str], state: &mut BudgetState) -> Outcome {
        let mut argv = vec!["grantmatrix"];
        argv.extend_from_slice(args);
        let cli = Cli::try_parse_from(argv).unwrap();
        execute(&cli.command, state, &cli.config()).unwrap()
    }

    #[test]
    fn init_then_build_a_budget() {
        let mut state = BudgetState::default();
        run(&["init", "--action-type", "ka210", "--tier", "60000"], &mut state);
        assert_eq!(state.action_type, ActionType::Ka210);
        assert_eq!(state.budget_tier, 60_000);

        run(&["partner", "add", "Alpha", "DE"], &mut state);
        run(&["partner", "add", "Beta", "PL"], &mut state);
        run(&["wp", "standard"], &mut state);
        run(&["percent", "suggest"], &mut state);
        let out = run(&["distribute"], &mut state);
        assert!(out.modified);
        assert_eq!(state.grand_total(), 60_000);

        let out = run(&["validate"], &mut state);
        assert!(!out.modified);
    }

    #[test]
    fn init_rejects_foreign_tier() {
        let mut state = BudgetState::default();
        let cli =
            Cli::try_parse_from(["grantmatrix", "init", "--action-type", "KA210", "--tier", "250000"])
                .unwrap();
        let err = execute(&cli.command, &mut state, &cli.config()).unwrap_err();
        assert!(err.contains("250000"));
        assert_eq!(state, BudgetState::default());
    }

    #[test]
    fn validate_fails_on_empty_budget() {
        let mut state = BudgetState::default();
        let out = run(&["validate", "--json"], &mut state);
        assert!(out.failed);
        let parsed: serde_json::Value = serde_json::from_str(&out.output).unwrap();
        assert!(parsed.as_array().unwrap().iter().any(|v| v["kind"] == "grand_total_mismatch"));
    }

    #[test]
    fn cell_command_parses_category() {
        let mut state = BudgetState::default();
        let p = state.add_partner("Alpha", "AT");
        let wp = state.add_work_package("Management");
        run(&["cell", wp.as_str(), p.as_str(), "travel", "420"], &mut state);
        assert_eq!(state.cells.get(&wp, &p, CostCategory::Travel), 420);
    }

    #[test]
    fn export_writes_dated_file_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = BudgetState::default();
        state.add_partner("Alpha", "AT");
        let out_dir = dir.path().to_string_lossy().to_string();
        let out = run(&["export", "--out", out_dir.as_str()], &mut state);
        assert!(out.output.starts_with("Wrote "));
        let written: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(written.len(), 1);
        let name = written[0].as_ref().unwrap().file_name();
        let name = name.to_string_lossy();
        assert!(name.starts_with("budget_KA220_") && name.ends_with(".csv"), "{name}");
    }

    #[test]
    fn apply_is_all_or_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("actions.json");
        std::fs::write(
            &file,
            r#"[
                {"type": "add_partner", "name": "Alpha", "country": "AT"},
                {"type": "set_budget_tier", "tier": 12345}
            ]"#,
        )
        .unwrap();

        let mut state = BudgetState::default();
        let cli = Cli::try_parse_from(["grantmatrix", "apply", file.to_str().unwrap()]).unwrap();
        let err = execute(&cli.command, &mut state, &cli.config()).unwrap_err();
        assert!(err.starts_with("Action 2 failed"));
        assert!(state.partners.is_empty());
    }

    #[test]
    fn huge_cell_input_leaves_a_readable_budget() {
        let mut state = BudgetState::default();
        let p = state.add_partner("Alpha", "AT");
        let q = state.add_partner("Beta", "RO");
        let wp = state.add_work_package("Management");
        run(&["cell", wp.as_str(), p.as_str(), "staff", "1e19"], &mut state);
        run(&["cell", wp.as_str(), q.as_str(), "staff", "1e19"], &mut state);
        assert_eq!(state.grand_total(), 2 * MAX_CELL_AMOUNT);

        assert!(run(&["show"], &mut state).output.contains("2000000000"));
        assert!(run(&["validate"], &mut state).failed);
        assert!(!run(&["export", "--format", "tsv"], &mut state).output.is_empty());
    }

    #[test]
    fn wp_target_without_value_clears_it() {
        let mut state = BudgetState::default();
        run(&["wp", "add", "Management", "--target", "20"], &mut state);
        let id = state.work_packages[0].id.to_string();
        assert_eq!(state.work_packages[0].target_percent, Some(20.0));
        run(&["wp", "target", id.as_str()], &mut state);
        assert_eq!(state.work_packages[0].target_percent, None);
    }
}
