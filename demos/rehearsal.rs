//! Offline rehearsal against an in-memory page.
//!
//! Demonstrates:
//! - Loading a page model from JSON (`--site`) or using a built-in one
//! - Injecting a slow repopulation and a flaky selection
//! - Watching traversal events through a channel sink
//!
//! Usage:
//!   cargo run --example rehearsal
//!   cargo run --example rehearsal -- --site site.json --out ./rehearsal

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use cascade_harvest::events::ChannelSink;
use cascade_harvest::surface::memory::SiteNode;
use cascade_harvest::{MemorySurface, Result, Traversal, TraversalEvent, export};
use common::Args;

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
    println!("=== Rehearsal ===\n");

    let site = match &args.site {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => builtin_site(),
    };

    let surface = MemorySurface::new(site).with_lag(2);
    surface.fail_selects("112", 1);

    let config = args
        .traversal_config()?
        .with_poll_interval(Duration::from_millis(5))
        .with_stabilization_timeout(Duration::from_millis(500))
        .with_retry_delay(Duration::from_millis(10));

    let (sink, mut events) = ChannelSink::new();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if let TraversalEvent::RetryScheduled { path, attempt, .. } = &event {
                println!("[Event] retry #{attempt} at {}", path.join(" / "));
            }
        }
    });

    let result = Traversal::new(&surface, &config)
        .with_sink(Arc::new(sink))
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

    let _ = printer.await;

    println!("\n{}", export::to_json_pretty(&tree)?);
    export::export_all(&tree, &args.out)?;
    Ok(())
}

fn builtin_site() -> Vec<SiteNode> {
    let office = |label: &str, value: &str, villages: &[&str]| {
        SiteNode::new(label, value).with_children(
            villages
                .iter()
                .enumerate()
                .map(|(i, v)| SiteNode::new(*v, format!("{value}{}", i + 1)))
                .collect(),
        )
    };

    vec![
        SiteNode::new("Chennai", "1").with_children(vec![
            SiteNode::new("Chennai Central", "11").with_children(vec![
                office("Mylapore", "111", &["Mylapore", "Santhome"]),
                office("Triplicane", "112", &["Triplicane"]),
            ]),
            SiteNode::new("Chennai South", "12").with_children(vec![office(
                "Adyar",
                "121",
                &["Adyar", "Besant Nagar", "Thiruvanmiyur"],
            )]),
        ]),
        SiteNode::new("Madurai", "2").with_children(vec![SiteNode::new("Madurai North", "21")
            .with_children(vec![office(
                "Tallakulam",
                "211",
                &["Tallakulam"],
            )])]),
    ]
}
