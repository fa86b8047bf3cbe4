//! CLI command definitions

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for the final report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable summary grouped by verdict
    #[default]
    Text,
    /// The full report as pretty-printed JSON
    Json,
}

/// CLI arguments for review-council
#[derive(Parser, Debug)]
#[command(name = "review-council")]
#[command(author, version, about = "Multi-agent code review with quorum-based deliberation")]
#[command(long_about = r#"
review-council asks several AI coding agents (claude, codex, gemini) to review
the same change, then lets them deliberate over each other's findings until a
quorum settles every issue.

The workflow:
1. Review: every enabled agent reviews the diff independently
2. Dedup: near-duplicate findings are merged into single issues
3. Deliberation: agents vote fix_required / no_fix / false_positive per issue
4. Fixing: issues the council agreed on are reported for fixing

Configuration files are loaded from (in priority order):
1. --config <path>     Explicit config file
2. COUNCIL_* environment variables (e.g. COUNCIL_COUNCIL__MAX_TURNS=5)
3. ./council.toml      Project-level config
4. ~/.config/review-council/config.toml   Global config

Example:
  git diff main | review-council run --diff -
  review-council run --diff change.patch --output json
  review-council agents
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true, conflicts_with = "no_config")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long, global = true)]
    pub no_config: bool,

    /// Write diagnostic logs to this file instead of stderr
    #[arg(long, value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a review council over a diff
    Run(RunArgs),
    /// List configured agents and whether their CLI programs are installed
    Agents(AgentsArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Diff to review; `-` reads standard input
    #[arg(long, value_name = "PATH")]
    pub diff: PathBuf,

    /// Session identifier (defaults to a timestamp-based id)
    #[arg(long, value_name = "ID")]
    pub session_id: Option<String>,

    /// Report format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: ReportFormat,

    /// Conversation transcript (JSONL); overrides `[logging] conversation_log`
    #[arg(long, value_name = "PATH")]
    pub conversation_log: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
pub struct AgentsArgs {
    /// Also show disabled agents
    #[arg(long)]
    pub all: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "review-council",
            "run",
            "--diff",
            "-",
            "-vv",
            "--output",
            "json",
            "--no-config",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        assert!(cli.no_config);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.diff, PathBuf::from("-"));
        assert_eq!(args.output, ReportFormat::Json);
        assert!(args.session_id.is_none());
    }

    #[test]
    fn test_config_conflicts_with_no_config() {
        let result = Cli::try_parse_from([
            "review-council",
            "agents",
            "--config",
            "a.toml",
            "--no-config",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_run_requires_diff() {
        assert!(Cli::try_parse_from(["review-council", "run"]).is_err());
    }
}
