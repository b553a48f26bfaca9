//! Command-line host for the grantmatrix budget engine.
//!
//! The engine keeps no storage of its own; this crate loads a JSON snapshot,
//! runs one command against it and saves it back when the command changed
//! anything.
//!
//! # Binary
//!
//! ```sh
//! grantmatrix init --action-type KA220 --tier 250000
//! grantmatrix partner add "Bildungswerk Wien" AT
//! grantmatrix partner add "Asociatia Educatie" RO
//! grantmatrix partner add "Fundación Aprende" ES
//! grantmatrix wp standard
//! grantmatrix percent suggest
//! grantmatrix distribute smart
//! grantmatrix validate
//! grantmatrix export --format csv --out .
//! ```
//!
//! The snapshot path comes from `--state` or `GRANTMATRIX_STATE`. Log
//! verbosity is read from `GRANTMATRIX_LOG` (an `EnvFilter` directive,
//! default `warn`).

pub mod commands;
pub mod config;

pub use commands::{Cli, Command, Outcome, execute};
pub use config::CliConfig;

/// Environment variable holding the log filter directive.
pub const LOG_ENV: &str = "GRANTMATRIX_LOG";
