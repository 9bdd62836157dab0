//! Command-line arguments

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Command-line arguments for the shopfloor driver
#[derive(Parser, Debug)]
#[command(name = "shopfloor")]
#[command(about = "Replay workshop job actions against the sync core", long_about = None)]
pub struct Cli {
    /// Configuration file; defaults apply when it is missing
    #[arg(short, long, global = true, help = "Path to a shopfloor.toml")]
    pub config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a script
    #[command(about = "Replay a JSON action script and print the resulting jobs")]
    Run {
        /// Script file
        #[arg(help = "JSON script of actions to replay")]
        script: PathBuf,

        /// Seed file, overriding `backend.seed_path`
        #[arg(short, long, help = "JSON array of jobs preloaded into the in-memory backend")]
        seed: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        /// Continue after a failed step
        #[arg(long, help = "Log failed steps and keep replaying")]
        keep_going: bool,
    },

    /// Write a default configuration file
    #[command(about = "Write a configuration file with default values")]
    InitConfig {
        /// Destination
        #[arg(help = "Where to write the file")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long, help = "Overwrite the file if it exists")]
        force: bool,
    },
}

/// How `run` prints the final jobs
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON array of jobs
    #[default]
    Json,
    /// One block of text per job with formatted times
    Summary,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory as _;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_arguments() {
        let cli = Cli::parse_from([
            "shopfloor",
            "run",
            "script.json",
            "--seed",
            "jobs.json",
            "--format",
            "summary",
            "--keep-going",
        ]);
        match cli.command {
            Commands::Run {
                script,
                seed,
                format,
                keep_going,
            } => {
                assert_eq!(script, PathBuf::from("script.json"));
                assert_eq!(seed, Some(PathBuf::from("jobs.json")));
                assert_eq!(format, OutputFormat::Summary);
                assert!(keep_going);
            }
            Commands::InitConfig { .. } => panic!("expected run"),
        }
    }

    #[test]
    fn test_config_flag_is_global() {
        let cli = Cli::parse_from(["shopfloor", "init-config", "out.toml", "-c", "shop.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("shop.toml")));
    }
}
