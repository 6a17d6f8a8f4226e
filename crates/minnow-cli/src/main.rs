#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::struct_excessive_bools)]

mod commands;
mod logging;
mod messages;

use clap::Parser;
use commands::install::InstallArgs;
use commands::update::UpdateArgs;
use miette::{IntoDiagnostic, Result};
use minnow_core::Config;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "minnow")]
#[command(author, version, about = "A minimal package manager for Node projects", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted logs
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Create a package.json in the current directory
    Init,

    /// Install all manifest dependencies or a list of packages
    #[command(visible_aliases = ["add", "i", "in"])]
    Install(InstallArgs),

    /// Update all dependencies or a list of packages
    #[command(visible_aliases = ["up", "upgrade"])]
    Update(UpdateArgs),

    /// Manage the package store
    Cache {
        #[command(subcommand)]
        cache_cmd: CacheCommands,
    },
}

#[derive(clap::Subcommand, Debug)]
enum CacheCommands {
    /// List fully-populated store entries
    Ls,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    // `install --debug` bumps verbosity to at least DEBUG
    let verbosity = match &cli.command {
        Some(Commands::Install(args)) if args.debug => cli.verbose.max(1),
        _ => cli.verbose,
    };

    let config = Config::new(cwd.clone())
        .with_verbosity(verbosity)
        .with_json_logs(cli.json);
    logging::init(config.verbosity, config.json_logs);

    match cli.command {
        None => {
            println!("Welcome to minnow! Run `minnow install` to get started.");
            Ok(())
        }
        Some(Commands::Version) => commands::version::run(),
        Some(Commands::Init) => commands::init::run(&cwd),
        Some(Commands::Install(args)) => {
            let rt = tokio::runtime::Runtime::new().into_diagnostic()?;
            rt.block_on(commands::install::run(&cwd, args))
        }
        Some(Commands::Update(args)) => {
            let rt = tokio::runtime::Runtime::new().into_diagnostic()?;
            rt.block_on(commands::update::run(&cwd, args))
        }
        Some(Commands::Cache { cache_cmd }) => match cache_cmd {
            CacheCommands::Ls => commands::cache::ls(),
        },
    }
}
