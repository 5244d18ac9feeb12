use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "setsync")]
#[command(version)]
#[command(about = "Converge topology sets onto their set templates", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (defaults to ~/.config/setsync/config.toml)
    #[arg(long, global = true, env = "SETSYNC_CONFIG")]
    pub config: Option<String>,

    /// Topology server endpoint, overrides the config file
    #[arg(long, global = true, env = "SETSYNC_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Operator name sent with every request, overrides the config file
    #[arg(long, global = true, env = "SETSYNC_USER")]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show module diffs between a set template and its sets
    Diff(TargetArgs),

    /// Apply module diffs so sets match their set template
    Sync(SyncArgs),

    /// Register this server with the coordination service
    Register(RegisterArgs),

    /// Check that the coordination service is reachable
    Ping,

    /// Manage the config file
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Diff / Sync
// ============================================================================

#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Business id
    #[arg(long)]
    pub biz: i64,

    /// Set template id
    #[arg(long)]
    pub template: i64,

    /// Set ids to compare (repeatable)
    #[arg(long = "set", value_name = "SET_ID", num_args = 1.., required = true)]
    pub sets: Vec<i64>,
}

#[derive(Args, Debug, Clone)]
pub struct SyncArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Apply diffs from a JSON file instead of fetching them
    #[arg(long, value_name = "PATH")]
    pub file: Option<String>,

    /// Show what would change without applying
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Number of sets synced in parallel
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,

    /// Let the server sync the sets instead of applying diffs here
    #[arg(long, conflicts_with_all = ["file", "dry_run"])]
    pub server_side: bool,
}

// ============================================================================
// Registry
// ============================================================================

#[derive(Args, Debug, Clone)]
pub struct RegisterArgs {
    /// Address peers should use to reach this server
    #[arg(long)]
    pub ip: String,

    /// Listening port
    #[arg(long)]
    pub port: u16,

    /// Registry path, overrides the config file
    #[arg(long)]
    pub path: Option<String>,
}

// ============================================================================
// Config Commands
// ============================================================================

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the config file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_sync() {
        let cli = Cli::try_parse_from([
            "setsync", "sync", "--biz", "2", "--template", "5", "--set", "10", "--set", "11",
            "--dry-run",
        ])
        .unwrap();
        match cli.command {
            Command::Sync(args) => {
                assert_eq!(args.target.biz, 2);
                assert_eq!(args.target.template, 5);
                assert_eq!(args.target.sets, vec![10, 11]);
                assert!(args.dry_run);
                assert_eq!(args.jobs, 4);
            }
            _ => panic!("expected sync"),
        }
    }

    #[test]
    fn test_diff_requires_sets() {
        assert!(Cli::try_parse_from(["setsync", "diff", "--biz", "2", "--template", "5"]).is_err());
    }

    #[test]
    fn test_server_side_conflicts_with_dry_run() {
        assert!(
            Cli::try_parse_from([
                "setsync",
                "sync",
                "--biz",
                "2",
                "--template",
                "5",
                "--set",
                "10",
                "--server-side",
                "--dry-run",
            ])
            .is_err()
        );
    }

    #[test]
    fn test_verbose_counts() {
        let cli = Cli::try_parse_from(["setsync", "-vv", "ping"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Command::Ping));
    }
}
