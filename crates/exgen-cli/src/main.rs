//! exgen CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

use commands::parse_assignment;

#[derive(Parser)]
#[command(name = "exgen", version, about = "Exercise generator for e-learning catalogs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate exercise instances from a model
    Generate {
        /// Model id
        #[arg(long)]
        model: u64,

        /// Catalog file or directory (overrides the config)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Owner whose resources and formulas are used
        #[arg(long)]
        owner: Option<u64>,

        /// Base seed; instance i uses seed + i
        #[arg(long)]
        seed: Option<u64>,

        /// Number of instances
        #[arg(long, default_value = "1")]
        count: u64,

        /// Override a formula variable (repeatable), e.g. --set v=50
        #[arg(long = "set", value_parser = parse_assignment)]
        set: Vec<(String, f64)>,

        /// Write a JSON report instead of printing instances; without a
        /// value the report goes to the configured `output_dir`
        #[arg(long, value_name = "DIR", num_args = 0..=1)]
        output: Option<Option<PathBuf>>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate a catalog and check every model for completeness
    Validate {
        /// Catalog file or directory (overrides the config)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Exit code 1 if any model is incomplete
        #[arg(long)]
        strict: bool,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// List the models of a catalog
    ListModels {
        /// Catalog file or directory (overrides the config)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Evaluate an expression, or solve an equation
    Eval {
        /// Expression (`a * (x + 2)`) or equation (`y = a * x + b`)
        #[arg(long)]
        expr: String,

        /// Bind a variable (repeatable), e.g. --set x=3
        #[arg(long = "set", value_parser = parse_assignment)]
        set: Vec<(String, f64)>,

        /// Distribute products containing this variable over sums
        #[arg(long)]
        distribute: Option<String>,

        /// Remove trivial identities such as `x * 1`
        #[arg(long)]
        clean: bool,

        /// Variable to solve for (equations only)
        #[arg(long)]
        unknown: Option<String>,
    },

    /// Create a starter config and example catalog
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("exgen=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Generate {
            model,
            catalog,
            owner,
            seed,
            count,
            set,
            output,
            config,
        } => {
            commands::generate::execute(model, catalog, owner, seed, count, set, output, config)
                .await
        }
        Commands::Validate {
            catalog,
            strict,
            config,
        } => commands::validate::execute(catalog, strict, config).await,
        Commands::ListModels { catalog, config } => commands::list_models::execute(catalog, config),
        Commands::Eval {
            expr,
            set,
            distribute,
            clean,
            unknown,
        } => commands::eval::execute(expr, set, distribute, clean, unknown),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
