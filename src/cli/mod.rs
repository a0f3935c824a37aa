//! # CLI Module
//!
//! Command-line interface of the `gtg` binary.
//!
//! ## Commands
//!
//! ### `generate`
//!
//! Generate transport code for every annotated trait below a directory and
//! aggregate the API document:
//!
//! ```bash
//! gtg generate --in ./src --swagger ./docs --json \
//!     --title "Items API" --version 1.0.0 \
//!     --servers 'https://api.example.com = production'
//! ```
//!
//! Options:
//! - `--in <DIR>` - Directory scanned for annotated traits (default: `./src`)
//! - `--swagger <DIR>` - Directory receiving `swagger.yaml`/`swagger.json` (default: `--in`)
//! - `--json` / `--yaml` - Document format (default: YAML)
//! - `--title`, `--desc`, `--version`, `--servers` - Document metadata
//! - `--config <FILE>` - Configuration file (default: detected `gtg.toml`)
//! - `--dry-run` - Report what would change without writing
//!
//! ### `inspect`
//!
//! List the services, processors and routes found below a directory:
//!
//! ```bash
//! gtg inspect --in ./src
//! ```
//!
//! Both commands exit non-zero when any service fails validation.

mod commands;


pub use commands::{generator_options, run_cli, Cli, Commands, GenerateArgs};
