//! Live harvest over WebSocket.
//!
//! Demonstrates:
//! - Binding the WebSocket server and waiting for the page agent
//! - Running a traversal against the live page
//! - Ctrl+C cancellation with partial results
//! - Exporting summary, CSV sheets and JSON
//!
//! Usage:
//!   cargo run --example harvest
//!   cargo run --example harvest -- --port 9222 --out ./output
//!   cargo run --example harvest -- --config traversal.json --debug

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr};

use cascade_harvest::transport::PendingServer;
use cascade_harvest::{RemoteSurface, Result, Traversal, export};
use common::Args;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    common::init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    println!("=== Harvest ===\n");

    let config = args.traversal_config()?;
    config.validate()?;

    // ========================================================================
    // Connect
    // ========================================================================

    let server = PendingServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), args.port).await?;
    println!("[Setup] Waiting for the page agent on {}", server.ws_url());

    let (connection, ready) = server.accept().await?;
    println!("        ✓ Session {} on {}\n", ready.session_id, ready.url);

    let surface = RemoteSurface::new(connection, ready);

    // ========================================================================
    // Traverse
    // ========================================================================

    let cancel = CancellationToken::new();
    common::cancel_on_ctrl_c(cancel.clone());

    let result = Traversal::new(&surface, &config)
        .with_cancellation(cancel)
        .run()
        .await;

    let tree = match result {
        Ok(harvest) => {
            common::print_harvest(&harvest);
            harvest.tree
        }
        Err(halted) => {
            common::print_halted(&halted);
            halted.salvaged
        }
    };

    // ========================================================================
    // Export
    // ========================================================================

    let report = export::export_all(&tree, &args.out)?;
    println!("\n[Export] {}", report.summary.display());
    println!("         {}", report.sheets.zones.display());
    println!("         {}", report.sheets.listing.display());
    println!("         {}", report.json.display());
    println!("         {}", report.workbook.display());

    surface.close();
    Ok(())
}
