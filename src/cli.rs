//! Command-line surface.
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::resources::ConflictStrategy;

/// Top-level CLI entry point.
#[derive(Parser, Debug)]
#[command(
    name = "merlin",
    about = "Declarative macOS workstation setup from a dotfiles repository",
    version
)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalOpts {
    /// Preview changes without applying
    #[arg(short = 'd', long, global = true)]
    pub dry_run: bool,

    /// Dotfiles repository root (overrides MERLIN_DOTFILES and discovery)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check the environment and repository health
    Doctor,
    /// Validate repository declarations
    Validate(ValidateOpts),
    /// List declared packages, tools, or profiles
    List(ListOpts),
    /// Install declared packages
    #[command(subcommand)]
    Install(InstallTarget),
    /// Link tool configuration into place
    Link(LinkOpts),
    /// Remove links created by `link`
    Unlink(UnlinkOpts),
    /// Run a tool's scripts
    Run(RunOpts),
    /// Report drift between the repository and this machine
    Diff(DiffOpts),
    /// Manage file snapshots
    #[command(subcommand)]
    Backup(BackupCommand),
    /// Print shell completions
    Completions(CompletionsOpts),
    /// Print version information
    Version,
}

/// Options for the `validate` subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct ValidateOpts {
    /// Treat warnings as errors
    #[arg(long)]
    pub strict: bool,
}

/// What `list` shows.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListKind {
    /// Homebrew formulae and casks
    Brew,
    /// App Store apps
    Mas,
    /// Tools under `config/`
    #[default]
    Configs,
    /// Profiles
    Profiles,
}

/// Options for the `list` subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct ListOpts {
    /// Category to list
    #[arg(value_enum, default_value_t)]
    pub kind: ListKind,
}

/// Package manager targeted by `install`.
#[derive(Subcommand, Debug, Clone)]
pub enum InstallTarget {
    /// Homebrew formulae and casks
    Brew(BrewOpts),
    /// Mac App Store apps
    Mas(MasOpts),
}

/// Options for `install brew`.
#[derive(Args, Debug, Clone, Default)]
pub struct BrewOpts {
    /// Install without asking for confirmation
    #[arg(long)]
    pub all: bool,

    /// Only install formulae
    #[arg(long, conflicts_with = "casks_only")]
    pub formulae_only: bool,

    /// Only install casks
    #[arg(long)]
    pub casks_only: bool,
}

/// Options for `install mas`.
#[derive(Args, Debug, Clone, Default)]
pub struct MasOpts {
    /// Install without asking for confirmation
    #[arg(long)]
    pub all: bool,
}

/// Options for the `link` subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct LinkOpts {
    /// Tool to link
    #[arg(required_unless_present_any = ["all", "profile"])]
    pub tool: Option<String>,

    /// Link every tool
    #[arg(long, conflicts_with = "tool")]
    pub all: bool,

    /// Conflict strategy (defaults to the repository setting)
    #[arg(long, value_enum)]
    pub strategy: Option<ConflictStrategy>,

    /// Link the tools of a profile
    #[arg(short, long, conflicts_with = "tool")]
    pub profile: Option<String>,

    /// Run each tool's scripts after linking
    #[arg(long)]
    pub run_scripts: bool,

    /// Do not auto-commit even if the repository enables it
    #[arg(long)]
    pub no_auto_commit: bool,
}

/// Options for the `unlink` subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct UnlinkOpts {
    /// Tool to unlink
    #[arg(required_unless_present = "all")]
    pub tool: Option<String>,

    /// Unlink every tool
    #[arg(long, conflicts_with = "tool")]
    pub all: bool,

    /// Do not auto-commit even if the repository enables it
    #[arg(long)]
    pub no_auto_commit: bool,
}

/// Options for the `run` subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct RunOpts {
    /// Tool whose scripts to run
    pub tool: String,

    /// Only run scripts carrying one of these tags
    #[arg(long = "tag", value_delimiter = ',')]
    pub tags: Vec<String>,
}

/// Options for the `diff` subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct DiffOpts {
    /// Show package drift
    #[arg(long)]
    pub packages: bool,

    /// Show symlink drift
    #[arg(long)]
    pub configs: bool,

    /// Show script drift
    #[arg(long)]
    pub scripts: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// `backup` subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum BackupCommand {
    /// Snapshot files
    Create {
        /// Files to snapshot (directories are skipped)
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Why the snapshot was taken
        #[arg(short, long, default_value = "manual")]
        reason: String,
    },
    /// List snapshots, newest first
    List,
    /// Show a snapshot's manifest
    Show {
        /// Snapshot id
        id: String,
    },
    /// Restore a snapshot
    Restore {
        /// Snapshot id
        id: String,
        /// Only restore these original paths
        #[arg(long = "file")]
        files: Vec<PathBuf>,
    },
    /// Delete a snapshot
    Delete {
        /// Snapshot id
        id: String,
    },
    /// Delete old snapshots
    Clean {
        /// Keep the N newest snapshots
        #[arg(long)]
        keep: Option<usize>,
        /// Delete snapshots older than this many days
        #[arg(long)]
        older_than: Option<u64>,
    },
}

/// Options for the `completions` subcommand.
#[derive(Args, Debug, Clone)]
pub struct CompletionsOpts {
    /// Target shell
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_link_tool() {
        let cli = Cli::parse_from(["merlin", "link", "zsh"]);
        let Command::Link(opts) = cli.command else {
            panic!("expected link");
        };
        assert_eq!(opts.tool.as_deref(), Some("zsh"));
        assert!(!opts.all);
        assert!(opts.strategy.is_none());
    }

    #[test]
    fn parse_link_all_with_strategy() {
        let cli = Cli::parse_from(["merlin", "link", "--all", "--strategy", "overwrite"]);
        let Command::Link(opts) = cli.command else {
            panic!("expected link");
        };
        assert!(opts.all);
        assert_eq!(opts.strategy, Some(ConflictStrategy::Overwrite));
    }

    #[test]
    fn link_requires_target() {
        assert!(Cli::try_parse_from(["merlin", "link"]).is_err());
    }

    #[test]
    fn link_tool_and_all_conflict() {
        assert!(Cli::try_parse_from(["merlin", "link", "zsh", "--all"]).is_err());
    }

    #[test]
    fn parse_link_profile() {
        let cli = Cli::parse_from(["merlin", "link", "-p", "work", "--run-scripts"]);
        let Command::Link(opts) = cli.command else {
            panic!("expected link");
        };
        assert_eq!(opts.profile.as_deref(), Some("work"));
        assert!(opts.run_scripts);
    }

    #[test]
    fn parse_dry_run_short() {
        let cli = Cli::parse_from(["merlin", "-d", "unlink", "zsh"]);
        assert!(cli.global.dry_run);
    }

    #[test]
    fn parse_dry_run_after_subcommand() {
        let cli = Cli::parse_from(["merlin", "link", "zsh", "--dry-run"]);
        assert!(cli.global.dry_run);
    }

    #[test]
    fn parse_root_override() {
        let cli = Cli::parse_from(["merlin", "--root", "/dots", "doctor"]);
        assert_eq!(cli.global.root, Some(PathBuf::from("/dots")));
    }

    #[test]
    fn parse_install_brew_casks_only() {
        let cli = Cli::parse_from(["merlin", "install", "brew", "--casks-only", "--all"]);
        let Command::Install(InstallTarget::Brew(opts)) = cli.command else {
            panic!("expected install brew");
        };
        assert!(opts.casks_only && opts.all && !opts.formulae_only);
    }

    #[test]
    fn formulae_only_conflicts_with_casks_only() {
        assert!(
            Cli::try_parse_from(["merlin", "install", "brew", "--formulae-only", "--casks-only"])
                .is_err()
        );
    }

    #[test]
    fn parse_list_default_is_configs() {
        let cli = Cli::parse_from(["merlin", "list"]);
        let Command::List(opts) = cli.command else {
            panic!("expected list");
        };
        assert_eq!(opts.kind, ListKind::Configs);
    }

    #[test]
    fn parse_diff_flags() {
        let cli = Cli::parse_from(["merlin", "diff", "--packages", "--json"]);
        let Command::Diff(opts) = cli.command else {
            panic!("expected diff");
        };
        assert!(opts.packages && opts.json && !opts.configs);
    }

    #[test]
    fn parse_run_tags() {
        let cli = Cli::parse_from(["merlin", "run", "zsh", "--tag", "fonts,shell"]);
        let Command::Run(opts) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(opts.tags, vec!["fonts", "shell"]);
    }

    #[test]
    fn parse_backup_restore_files() {
        let cli = Cli::parse_from([
            "merlin", "backup", "restore", "20240101-000000", "--file", "/h/.zshrc",
        ]);
        let Command::Backup(BackupCommand::Restore { id, files }) = cli.command else {
            panic!("expected backup restore");
        };
        assert_eq!(id, "20240101-000000");
        assert_eq!(files, vec![PathBuf::from("/h/.zshrc")]);
    }

    #[test]
    fn parse_backup_clean() {
        let cli = Cli::parse_from(["merlin", "backup", "clean", "--keep", "3"]);
        assert!(matches!(
            cli.command,
            Command::Backup(BackupCommand::Clean {
                keep: Some(3),
                older_than: None
            })
        ));
    }

    #[test]
    fn parse_verbose() {
        let cli = Cli::parse_from(["merlin", "-v", "doctor"]);
        assert!(cli.verbose);
    }

    #[test]
    fn parse_version() {
        let cli = Cli::parse_from(["merlin", "version"]);
        assert!(matches!(cli.command, Command::Version));
    }
}
