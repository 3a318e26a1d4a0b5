//! marksync CLI entry point.

use clap::Parser;
use marksync::cli::commands::{self, Context};
use marksync::cli::{Cli, Commands};
use marksync::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.dry_run {
        marksync::DRY_RUN.store(true, std::sync::atomic::Ordering::Relaxed);
    }
    if cli.no_color {
        colored::control::set_override(false);
    }

    // Set up tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet);

    // JSON when asked for, or when stdout is not a terminal
    let json = cli.json || !std::io::IsTerminal::is_terminal(&std::io::stdout());

    match run(&cli, json) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if json {
                eprintln!("{}", e.to_structured_json());
            } else if !cli.quiet {
                if let Some(hint) = e.hint() {
                    eprintln!("Error: {e}\n  Hint: {hint}");
                } else {
                    eprintln!("Error: {e}");
                }
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    // Honor RUST_LOG if set, otherwise use verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug,rusqlite=info,hyper=info,reqwest=info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(cli: &Cli, json: bool) -> Result<(), Error> {
    let ctx = Context::from_cli(cli, json);

    match &cli.command {
        Commands::Init { force } => commands::init::execute(&ctx, *force),
        Commands::Version => commands::version::execute(json),
        Commands::Config { command } => commands::config::execute(&ctx, command),

        // Sync
        Commands::Sync(args) => commands::sync::execute(&ctx, args),
        Commands::Watch { strict, debounce } => commands::watch::execute(&ctx, *strict, *debounce),
        Commands::Status => commands::status::execute(&ctx),
        Commands::Pending { command } => commands::pending::execute(&ctx, command),
        Commands::Plan { inputs, strict } => commands::plan::execute(&ctx, inputs, *strict),

        // Local tree
        Commands::Bookmark { command } => commands::bookmark::execute(&ctx, command),
        Commands::Tombstones { command } => commands::tombstones::execute(&ctx, command),

        // Shell completions
        Commands::Completions { shell } => commands::completions::execute(shell),
    }
}
