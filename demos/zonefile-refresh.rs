//! Full refresh walkthrough using the zonefile plugin
//!
//! Writes a small zone document to a temporary directory, runs one
//! refresh cycle over it, and prints the resolved model plus the
//! snapshot location. Useful for validating the end-to-end pipeline
//! without any vendor credentials.

use anyhow::Result;
use netmap_core::{
    snapshot, Network, NetworkConfig, PluginRegistry, PluginWhitelist, Scheduler, SchedulerConfig,
    SubnetConfig,
};
use netmap_plugin_zonefile::ZonefilePlugin;
use std::sync::Arc;

const ZONES: &str = r#"{
  "zones": {
    "example.com": [
      { "name": "www.example.com", "type": "address", "value": "10.30.0.20" },
      { "name": "web.example.com", "type": "alias",   "value": "www.example.com" },
      { "name": "example.com",     "type": "text",    "value": "v=spf1 -all" }
    ]
  }
}"#;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

    let workdir = std::env::temp_dir().join("netmap-zonefile-demo");
    std::fs::create_dir_all(&workdir)?;
    let zonefile = workdir.join("zones.json");
    std::fs::write(&zonefile, ZONES)?;

    let mut registry = PluginRegistry::new();
    registry.register(Arc::new(ZonefilePlugin::new(&zonefile)))?;

    let config = NetworkConfig {
        subnets: vec![SubnetConfig::new("10.30.0.0/24".parse()?, "demo-rack")],
        ..Default::default()
    };

    let (scheduler, _events) = Scheduler::new(
        registry,
        PluginWhitelist::wildcard(),
        SchedulerConfig::default(),
    );

    let mut network = Network::new(config)?;
    let summary = scheduler.run(&mut network).await?;

    println!(
        "refresh finished: {} resolved, {} dangling, {} placeholders",
        summary.resolution.resolved,
        summary.report.dangling_domains.len(),
        summary.resolution.placeholders,
    );
    for domain in network.domains() {
        println!(
            "  {} (zone {}) -> {:?}",
            domain.name(),
            domain.zone(),
            domain.nodes
        );
    }

    let snapshot_dir = workdir.join("snapshot");
    snapshot::write(&network, &snapshot_dir).await?;
    println!("snapshot written to {}", snapshot_dir.display());

    Ok(())
}
