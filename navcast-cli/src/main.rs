//! navcast CLI - Command-line interface
//!
//! Turn-by-turn guidance from a route and a fix stream, shown in the
//! terminal and broadcast to a UDP peer.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::listen::ListenArgs;
use commands::navigate::NavigateArgs;
use commands::parse::ParseArgs;
use commands::replay::ReplayArgs;
use error::CliError;
use runner::CliRunner;

#[derive(Parser)]
#[command(name = "navcast")]
#[command(version, about = "Turn-by-turn guidance tracking and broadcast", long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.config/navcast/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging, also echoed to stdout
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow a route with a fix stream and announce guidance
    Navigate(NavigateArgs),

    /// Show guidance datagrams sent by a peer
    Listen(ListenArgs),

    /// Mine one routing instruction into guidance fields
    Parse(ParseArgs),

    /// Cycle a route's guidance to the peer at a fixed interval
    Replay(ReplayArgs),

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        e.exit();
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Parse(args) => commands::parse::run(args),
        Commands::Config { command } => commands::config::run(command, config_path),
        Commands::Navigate(args) => {
            let runner = CliRunner::new(config_path, cli.debug)?;
            commands::navigate::run(&runner, args)
        }
        Commands::Listen(args) => {
            let runner = CliRunner::new(config_path, cli.debug)?;
            commands::listen::run(&runner, args)
        }
        Commands::Replay(args) => {
            let runner = CliRunner::new(config_path, cli.debug)?;
            commands::replay::run(&runner, args)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_navigate_arguments() {
        let cli = Cli::parse_from([
            "navcast",
            "--debug",
            "navigate",
            "--destination",
            "34.2191,108.9647",
            "--fixes",
            "drive.txt",
            "--no-udp",
        ]);
        assert!(cli.debug);
        match cli.command {
            Commands::Navigate(args) => {
                assert_eq!(args.destination.as_deref(), Some("34.2191,108.9647"));
                assert_eq!(args.fixes, Some(PathBuf::from("drive.txt")));
                assert!(args.no_udp);
                assert_eq!(args.linger_ms, 2000);
            }
            _ => panic!("expected navigate"),
        }
    }

    #[test]
    fn test_config_subcommand() {
        let cli = Cli::parse_from(["navcast", "config", "--config", "/tmp/x.ini", "show"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/x.ini")));
        assert!(matches!(
            cli.command,
            Commands::Config {
                command: ConfigCommands::Show
            }
        ));
    }
}
