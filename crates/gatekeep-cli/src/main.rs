mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use cmd::run::RunOptions;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "gatekeep",
    about = "Run ordered command gates and stop at the first failure",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .gatekeep/ or .git/)
    #[arg(long, global = true, env = "GATEKEEP_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default .gatekeep/config.yaml with the standard workflows
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// List configured gates
    List,

    /// Show the steps of a gate
    Show { gate: String },

    /// Run a gate: execute its steps in order, halting at the first failure
    Run {
        gate: String,

        /// Placeholder value, e.g. --var branch=feat/login (repeatable)
        #[arg(long = "var", value_name = "KEY=VALUE")]
        vars: Vec<String>,

        /// Print the resolved steps without running anything
        #[arg(long)]
        dry_run: bool,

        /// Print output of passing steps too
        #[arg(long, short = 'v')]
        verbose: bool,

        /// Don't record this run under .gatekeep/runs/
        #[arg(long)]
        no_save: bool,
    },

    /// Show the most recent recorded run of a gate
    Last { gate: String },

    /// Inspect the config
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init { force } => cmd::init::run(&root, force),
        Commands::List => cmd::list::run(&root, cli.json),
        Commands::Show { gate } => cmd::show::run(&root, &gate, cli.json),
        Commands::Run {
            gate,
            vars,
            dry_run,
            verbose,
            no_save,
        } => cmd::run::run(
            &root,
            &gate,
            RunOptions {
                vars,
                dry_run,
                verbose,
                no_save,
            },
            cli.json,
        ),
        Commands::Last { gate } => cmd::last::run(&root, &gate, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
