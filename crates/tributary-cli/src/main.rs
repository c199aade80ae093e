//! Tributary CLI - validate topologies, list effects and render mixes offline.

mod commands;
mod signal_spec;
mod wav;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tributary")]
#[command(author, version, about = "Tributary mix graph CLI", long_about = None)]
struct Cli {
    /// More log output (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a topology file
    Validate(commands::validate::ValidateArgs),

    /// List available effects and their configuration
    Effects(commands::effects::EffectsArgs),

    /// Mix synthetic inputs through a topology into a WAV file
    Render(commands::render::RenderArgs),
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Validate(args) => commands::validate::run(args),
        Commands::Effects(args) => commands::effects::run(args),
        Commands::Render(args) => commands::render::run(args),
    }
}
