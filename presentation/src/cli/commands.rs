//! CLI command definitions

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for session results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Every phase with every agent turn
    Full,
    /// Status and phase summaries
    Summary,
    /// The finished session as JSON
    Json,
}

/// CLI arguments for conclave
#[derive(Parser, Debug)]
#[command(name = "conclave")]
#[command(author, version, about = "Multi-agent orchestration with veto-aware gates")]
#[command(long_about = r#"
conclave runs a team of agents through a pattern of phases. Each phase
uses a topology (sequential, parallel, loop, hierarchical, network, debate)
and ends at a gate; vetoes can block a gate, and blocked gates may be
negotiated before the session gives up.

Configuration files are loaded from (in priority order):
1. CONCLAVE_* environment variables (nested keys use "__")
2. --config <path>     Explicit config file
3. ./conclave.toml     Project-level config
4. ~/.config/conclave/config.toml   Global config

Example:
  conclave run --pattern review.toml --agents team.toml --task "Add rate limiting"
  conclave validate --pattern review.toml --agents team.toml
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a pattern on a task
    Run(RunArgs),
    /// Check a pattern and an agents file without calling any provider
    Validate(ValidateArgs),
    /// Show configuration file locations and exit
    Config,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Pattern definition file (TOML or JSON)
    #[arg(long, value_name = "FILE")]
    pub pattern: PathBuf,

    /// Agents file
    #[arg(long, value_name = "FILE")]
    pub agents: PathBuf,

    /// The task for the session
    #[arg(long)]
    pub task: String,

    /// Participants, in order (default: every agent in the agents file)
    #[arg(long = "agent", value_name = "ID")]
    pub agent_ids: Vec<String>,

    /// Directory for JSONL session event logs (overrides logging.events_dir)
    #[arg(long, value_name = "DIR")]
    pub events_dir: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "summary")]
    pub output: OutputFormat,

    /// Suppress progress indicators
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Pattern definition file (TOML or JSON)
    #[arg(long, value_name = "FILE")]
    pub pattern: PathBuf,

    /// Agents file
    #[arg(long, value_name = "FILE")]
    pub agents: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::parse_from([
            "conclave",
            "-vv",
            "run",
            "--pattern",
            "p.toml",
            "--agents",
            "a.toml",
            "--task",
            "ship it",
            "--agent",
            "lead",
            "--agent",
            "qa",
            "-o",
            "json",
        ]);
        assert_eq!(cli.verbose, 2);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.task, "ship it");
        assert_eq!(args.agent_ids, vec!["lead", "qa"]);
        assert_eq!(args.output, OutputFormat::Json);
        assert!(!args.quiet);
    }

    #[test]
    fn test_parse_validate_with_global_config() {
        let cli = Cli::parse_from([
            "conclave",
            "validate",
            "--pattern",
            "p.toml",
            "--agents",
            "a.toml",
            "--config",
            "c.toml",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("c.toml")));
        assert!(matches!(cli.command, Command::Validate(_)));
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
