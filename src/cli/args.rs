//! CLI argument definitions using clap
//!
//! Commands:
//! - gridsql run --plan <path> --input <path> [--config <path>]
//! - gridsql explain --plan <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// gridsql - distributed projection and aggregation engine
#[derive(Parser, Debug)]
#[command(name = "gridsql")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute a plan over an in-process cluster, one node per input entry
    Run {
        /// Path to engine configuration file; defaults apply when omitted
        #[arg(long)]
        config: Option<PathBuf>,

        /// Path to the execution plan (JSON)
        #[arg(long)]
        plan: PathBuf,

        /// Path to the node inputs (JSON)
        #[arg(long)]
        input: PathBuf,
    },

    /// Validate a plan and print its projection chains
    Explain {
        /// Path to the execution plan (JSON)
        #[arg(long)]
        plan: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "gridsql", "run", "--plan", "p.json", "--input", "i.json",
        ])
        .unwrap();
        match cli.command {
            Command::Run { config, plan, input } => {
                assert!(config.is_none());
                assert_eq!(plan, PathBuf::from("p.json"));
                assert_eq!(input, PathBuf::from("i.json"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_explain_requires_plan() {
        assert!(Cli::try_parse_from(["gridsql", "explain"]).is_err());
    }
}
