//! Cadenza CLI - run and inspect media exports.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "cadenza")]
#[command(author, version, about = "Cadenza media export CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an export described by a TOML configuration
    Export(commands::export::ExportArgs),

    /// List available audio processors and their parameters
    Processors(commands::processors::ProcessorsArgs),

    /// List available asset loaders
    Loaders(commands::loaders::LoadersArgs),

    /// Show the format of a WAV file as the WAV loader sees it
    Probe(commands::probe::ProbeArgs),
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Export(args) => commands::export::run(args),
        Commands::Processors(args) => commands::processors::run(&args),
        Commands::Loaders(args) => commands::loaders::run(&args),
        Commands::Probe(args) => commands::probe::run(&args),
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    // Logs go to stderr so stdout stays parseable; bridge log:: calls too.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();
    tracing_log::LogTracer::init().ok();
}
