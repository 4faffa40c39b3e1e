#![forbid(unsafe_code)]

mod cmd;
mod git;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use output::{CliError, OutputMode, render, render_error};
use std::env;
use std::path::Path;
use tally_core::Project;
use tally_core::clock::Clock;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "tally: passive per-file time tracking, filed as git notes",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Initialize a tally project",
        long_about = "Create .tally/ in the current directory. Inside a git repository this also \
                      configures notes rewriting and installs the post-commit hook.",
        after_help = "EXAMPLES:\n    # Initialize in the current directory\n    tally init\n\n    # Skip the post-commit hook\n    tally init --no-hooks"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Capture",
        about = "Record activity on a file",
        long_about = "Drop an access marker for the current minute. Silent outside a tally project.",
        after_help = "EXAMPLES:\n    # From an editor save hook\n    tally record src/main.rs\n\n    # Record time in a non-file application\n    tally record --app browser"
    )]
    Record(cmd::record::RecordArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show pending time",
        long_about = "Show time accumulated since the last commit, without consuming anything.",
        after_help = "EXAMPLES:\n    # Pending time per file\n    tally status\n\n    # What the next `tally commit` would attach to HEAD\n    tally status --head\n\n    # Emit machine-readable output\n    tally status --json"
    )]
    Status(cmd::status::StatusArgs),

    #[command(
        next_help_heading = "Capture",
        about = "Attach pending time to HEAD",
        long_about = "Fold pending markers into metrics and write the finalized share as a note \
                      on HEAD. Run automatically by the post-commit hook.",
        after_help = "EXAMPLES:\n    # Attach pending time to the latest commit\n    tally commit\n\n    # Preview without writing\n    tally commit --dry-run"
    )]
    Commit(cmd::commit::CommitArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show time notes on commits",
        long_about = "Print the time notes attached to recent or named commits.",
        after_help = "EXAMPLES:\n    # The last ten commits\n    tally report\n\n    # Specific commits with per-file totals\n    tally report HEAD~1 HEAD --summary\n\n    # Emit machine-readable output\n    tally report -n 50 --json"
    )]
    Report(cmd::report::ReportArgs),

    #[command(
        next_help_heading = "Maintenance",
        about = "Discard pending time",
        long_about = "Delete all pending markers and the metric store. Notes already written are kept.",
        after_help = "EXAMPLES:\n    # See what would be dropped\n    tally clean --dry-run\n\n    # Drop it\n    tally clean"
    )]
    Clean(cmd::clean::CleanArgs),

    #[command(next_help_heading = "Maintenance", about = "Manage the git hook")]
    Hooks {
        #[command(subcommand)]
        command: HookCommand,
    },

    #[command(
        next_help_heading = "Maintenance",
        about = "Generate shell completion scripts",
        long_about = "Generate shell completion scripts for supported shells.",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    tally completions bash\n\n    # Generate zsh completions\n    tally completions zsh"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

#[derive(Subcommand, Debug)]
enum HookCommand {
    #[command(
        about = "Install the post-commit hook",
        after_help = "EXAMPLES:\n    # Install or append to .git/hooks/post-commit\n    tally hooks install"
    )]
    Install,
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("TALLY_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "tally=debug,info"
        } else {
            "tally=warn"
        })
    });

    let format = env::var("TALLY_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries command output; logs stay on stderr.
    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn install_hook(output: OutputMode, cwd: &Path) -> anyhow::Result<()> {
    let project = Project::discover(cwd)?;
    let hook = git::hooks::install_hooks(&project.root)?;
    render(output, &serde_json::json!({ "hook": &hook }), |_, w| {
        writeln!(w, "✓ Installed post-commit hook at {}", hook.display())
    })
}

fn dispatch(cli: Cli, clock: &dyn Clock, cwd: &Path) -> anyhow::Result<()> {
    let output = cli.output_mode();
    match cli.command {
        Commands::Init(ref args) => cmd::init::run_init(args, output, cwd),
        Commands::Record(ref args) => cmd::record::run_record(args, output, clock, cwd),
        Commands::Status(ref args) => cmd::status::run_status(args, output, clock, cwd),
        Commands::Commit(ref args) => cmd::commit::run_commit(args, output, clock, cwd),
        Commands::Report(ref args) => cmd::report::run_report(args, output, cwd),
        Commands::Clean(ref args) => cmd::clean::run_clean(args, output, cwd),
        Commands::Hooks {
            command: HookCommand::Install,
        } => install_hook(output, cwd),
        Commands::Completions(ref args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    debug!(command = ?cli.command, "starting");

    let output = cli.output_mode();
    let result = env::current_dir()
        .map_err(anyhow::Error::from)
        .and_then(|cwd| {
            let clock = cmd::clock_from_env()?;
            dispatch(cli, clock.as_ref(), &cwd)
        });

    if let Err(err) = result {
        render_error(output, &CliError::from(&err))?;
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_record_path() {
        let cli = Cli::parse_from(["tally", "record", "src/lib.rs"]);
        assert!(matches!(cli.command, Commands::Record(_)));
    }

    #[test]
    fn record_needs_exactly_one_target() {
        assert!(Cli::try_parse_from(["tally", "record"]).is_err());
        assert!(Cli::try_parse_from(["tally", "record", "a.rs", "--app", "web"]).is_err());
        assert!(Cli::try_parse_from(["tally", "record", "--app", "web"]).is_ok());
    }

    #[test]
    fn json_flag_is_global() {
        let cli = Cli::parse_from(["tally", "status", "--json"]);
        assert_eq!(cli.output_mode(), OutputMode::Json);
    }

    #[test]
    fn report_accepts_commits_and_limit() {
        let cli = Cli::parse_from(["tally", "report", "-n", "3", "--summary", "abc", "def"]);
        let Commands::Report(args) = cli.command else {
            panic!("expected report");
        };
        assert_eq!(args.limit, Some(3));
        assert_eq!(args.commits, vec!["abc".to_string(), "def".to_string()]);
        assert!(args.summary);
    }

    #[test]
    fn all_subcommands_listed() {
        let subcommands = [
            vec!["tally", "init"],
            vec!["tally", "record", "x"],
            vec!["tally", "status"],
            vec!["tally", "status", "--head"],
            vec!["tally", "commit", "--dry-run"],
            vec!["tally", "report"],
            vec!["tally", "clean"],
            vec!["tally", "hooks", "install"],
            vec!["tally", "completions", "bash"],
        ];
        for args in &subcommands {
            let result = Cli::try_parse_from(args.iter());
            assert!(result.is_ok(), "failed to parse {args:?}: {:?}", result.err());
        }
    }

    #[test]
    fn verify_cli_definition() {
        Cli::command().debug_assert();
    }
}
