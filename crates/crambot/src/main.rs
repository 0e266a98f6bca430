// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Crambot - Telegram admin and parent bots for cram schools.

mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use crambot_config::CrambotConfig;

#[derive(Parser, Debug)]
#[command(name = "crambot", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the webhook server, bots and broadcast worker.
    Serve,
    /// Validate the configuration and exit.
    CheckConfig {
        /// Print the effective configuration with secrets masked.
        #[arg(long)]
        show: bool,
    },
}

fn load(path: Option<&PathBuf>) -> CrambotConfig {
    let loaded = match path {
        Some(path) => crambot_config::load_and_validate_path(path),
        None => crambot_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            crambot_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load(cli.config.as_ref());

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::CheckConfig { show }) => {
            println!("crambot: configuration is valid");
            if show {
                match crambot_config::to_redacted_toml(&config) {
                    Ok(text) => println!("\n{text}"),
                    Err(e) => {
                        eprintln!("error: cannot render configuration: {e}");
                        std::process::exit(1);
                    }
                }
            }
        }
        None => {
            println!("crambot: use --help for available commands");
        }
    }
}
