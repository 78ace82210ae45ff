//! Shared utilities for demos.
//!
//! Provides common functionality used across all demos:
//! - Command-line argument parsing
//! - Logging initialization
//! - Ctrl+C wiring and result reporting

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;

use cascade_harvest::{Halted, Harvest, TraversalConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Types
// ============================================================================

/// Command-line arguments for demos.
#[derive(Debug, Clone)]
pub struct Args {
    pub debug: bool,
    pub config: Option<PathBuf>,
    pub out: PathBuf,
    pub port: u16,
    pub site: Option<PathBuf>,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse() -> Self {
        let args: Vec<String> = std::env::args().collect();
        let value = |flag: &str| {
            args.iter()
                .position(|a| a == flag)
                .and_then(|i| args.get(i + 1))
                .cloned()
        };

        Self {
            debug: args.iter().any(|a| a == "--debug"),
            config: value("--config").map(PathBuf::from),
            out: value("--out").map_or_else(|| PathBuf::from("output"), PathBuf::from),
            port: value("--port").and_then(|p| p.parse().ok()).unwrap_or(0),
            site: value("--site").map(PathBuf::from),
        }
    }

    /// Loads `--config` or falls back to the defaults.
    pub fn traversal_config(&self) -> cascade_harvest::Result<TraversalConfig> {
        match &self.config {
            Some(path) => TraversalConfig::from_json_file(path),
            None => Ok(TraversalConfig::default()),
        }
    }
}

// ============================================================================
// Functions
// ============================================================================

/// Initialize tracing/logging.
///
/// `RUST_LOG` wins over the `--debug` flag when set.
pub fn init_logging(debug: bool) {
    let fallback = if debug {
        "cascade_harvest=debug"
    } else {
        "cascade_harvest=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Cancels `token` on the first Ctrl+C.
pub fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\n[Ctrl+C] Stopping after the current step...");
            token.cancel();
        }
    });
}

/// Prints a short report of a finished traversal.
pub fn print_harvest(harvest: &Harvest) {
    println!("[Done] Outcome: {:?}", harvest.outcome);
    println!("       Zones: {}", harvest.tree.len());
    println!("       Villages: {}", harvest.tree.village_count());
    println!("       Abandoned branches: {}", harvest.failures.len());
    for failure in &harvest.failures {
        println!(
            "         - {} [{}] {:?}: {}",
            failure.path.join(" / "),
            failure.level,
            failure.kind,
            failure.message
        );
    }
}

/// Prints a short report of a halted traversal.
pub fn print_halted(halted: &Halted) {
    println!("[Halted] {}", halted.error);
    println!("         Salvaged zones: {}", halted.salvaged.len());
}
