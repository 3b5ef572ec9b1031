use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "stationwake-cli", version, about = "Stationwake CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Destination selection
    Destination {
        #[command(subcommand)]
        action: commands::destination::DestinationAction,
    },
    /// Proximity monitoring
    Monitor {
        #[command(subcommand)]
        action: commands::monitor::MonitorAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Destination { action } => commands::destination::run(action),
        Commands::Monitor { action } => commands::monitor::run(action),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
