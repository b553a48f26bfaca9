//! Erasmus+ budget planner.
//!
//! Loads the budget snapshot, runs one subcommand and saves the snapshot
//! again if the command changed it.
//!
//! # Examples
//!
//! ```sh
//! grantmatrix --state project.json show
//! GRANTMATRIX_LOG=debug grantmatrix distribute auto
//! ```

use clap::Parser;
use grantmatrix_cli::{Cli, LOG_ENV, execute};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays clean for exports.
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = cli.config();
    let store = config.store();

    let mut state = match store.load_or_default() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: failed to load {}: {e}", store.path().display());
            std::process::exit(1);
        }
    };

    let outcome = match execute(&cli.command, &mut state, &config) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    if outcome.modified
        && let Err(e) = store.save(&state)
    {
        eprintln!("Error: failed to save {}: {e}", store.path().display());
        std::process::exit(1);
    }

    if !outcome.output.is_empty() {
        println!("{}", outcome.output);
    }
    if outcome.failed {
        std::process::exit(1);
    }
}
