//! Command-line entry point for merlin.

use anyhow::Result;
use clap::{CommandFactory as _, Parser as _};

use merlin::cli::{self, Command};
use merlin::commands;
use merlin::{exec, logging};

fn main() -> Result<()> {
    let args = cli::Cli::parse();

    let name = command_name(&args.command);
    logging::init_subscriber(args.verbose, name);
    let log = logging::Logger::new(name);

    if let Err(e) = ctrlc::set_handler(exec::request_cancel) {
        log.debug(&format!("could not install Ctrl-C handler: {e}"));
    }

    let global = &args.global;
    match &args.command {
        Command::Doctor => commands::doctor::run(global, &log),
        Command::Validate(opts) => commands::validate::run(global, opts, &log),
        Command::List(opts) => commands::list::run(global, opts),
        Command::Install(target) => commands::install::run(global, target, args.verbose, &log),
        Command::Link(opts) => commands::link::run(global, opts, args.verbose, &log),
        Command::Unlink(opts) => commands::unlink::run(global, opts, &log),
        Command::Run(opts) => commands::run::run(global, opts, args.verbose, &log),
        Command::Diff(opts) => commands::diff::run(global, opts, &log),
        Command::Backup(cmd) => commands::backup::run(global, cmd, &log),
        Command::Completions(opts) => {
            let mut cmd = cli::Cli::command();
            clap_complete::generate(opts.shell, &mut cmd, "merlin", &mut std::io::stdout());
            Ok(())
        }
        Command::Version => {
            commands::version::run();
            Ok(())
        }
    }
}

/// Name used for the persistent log file.
const fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Doctor => "doctor",
        Command::Validate(_) => "validate",
        Command::List(_) => "list",
        Command::Install(_) => "install",
        Command::Link(_) => "link",
        Command::Unlink(_) => "unlink",
        Command::Run(_) => "run",
        Command::Diff(_) => "diff",
        Command::Backup(_) => "backup",
        Command::Completions(_) => "completions",
        Command::Version => "version",
    }
}
