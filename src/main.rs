#![forbid(unsafe_code)]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

use script_bench::bench::{self, RunArgs};

#[derive(Parser, Debug)]
#[command(name = "script-bench")]
#[command(about = "Warmup/measure latency of TypeScript compilation across JavaScript engines", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Enable verbose logging (or set SCRIPT_BENCH_LOG)
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List configured backends with availability and version
    List {
        /// Session config file (TOML or YAML)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn init_tracing(verbose: bool) {
    let env = std::env::var("SCRIPT_BENCH_LOG").unwrap_or_else(|_| {
        if verbose { "script_bench=debug".to_string() } else { "script_bench=info".to_string() }
    });
    let _ = tracing_subscriber::fmt()
        .with_span_events(if verbose { FmtSpan::CLOSE } else { FmtSpan::NONE })
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::new(env))
        .try_init();
}

fn main() {
    color_eyre::install().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Some(Commands::List { config }) => bench::list(config),
        None => bench::run(cli.run),
    };

    if let Err(e) = result {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}
