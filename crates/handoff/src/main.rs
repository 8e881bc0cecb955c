// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Handoff - real-time human handoff for AI chat support.
//!
//! This is the binary entry point for the Handoff engine.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod console;
mod serve;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use handoff_config::{ConfigError, HandoffConfig};

/// Handoff - real-time human handoff for AI chat support.
#[derive(Parser, Debug)]
#[command(name = "handoff", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the default locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the engine, reading chat lines and agent commands from stdin.
    Serve {
        /// Only print these event types (comma-separated, e.g. `ticket_created,sla_breach`).
        #[arg(long, value_delimiter = ',')]
        events: Vec<String>,
    },
    /// Validate the configuration and print a summary.
    CheckConfig,
}

fn load_config(path: Option<&Path>) -> Result<HandoffConfig, Vec<ConfigError>> {
    match path {
        Some(path) if !path.is_file() => Err(vec![ConfigError::Other(format!(
            "config file `{}` not found",
            path.display()
        ))]),
        Some(path) => handoff_config::load_and_validate_path(path),
        None => handoff_config::load_and_validate(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(errors) => {
            handoff_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve { events }) => {
            if let Err(e) = serve::run_serve(config, events).await {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::CheckConfig) => print_summary(&config),
        None => {
            println!("handoff: use --help for available commands");
        }
    }
}

fn print_summary(config: &HandoffConfig) {
    println!("handoff: config ok (service.name={})", config.service.name);
    println!(
        "  rate limit: {} per {}s, {} per {}s",
        config.rate_limit.short_window_requests,
        config.rate_limit.short_window_secs,
        config.rate_limit.long_window_requests,
        config.rate_limit.long_window_secs,
    );
    println!(
        "  queue: capacity {}, batch {}",
        config.queue.capacity, config.queue.batch_size
    );
    let enabled: Vec<&str> = config
        .providers
        .backends
        .iter()
        .filter(|b| b.enabled)
        .map(|b| b.name.as_str())
        .collect();
    if enabled.is_empty() {
        println!("  backends: none (every question is handed off)");
    } else {
        println!("  backends: {}", enabled.join(", "));
    }
    println!(
        "  agents: {} authorized, {} supervisors",
        config.agents.authorized.len(),
        config.agents.supervisors.len()
    );
}
