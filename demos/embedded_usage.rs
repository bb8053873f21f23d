//! Minimal embedding example for netmap-core
//!
//! Demonstrates using netmap-core as a library in a custom application:
//! a custom inventory plugin contributes DNS facts and a node, the
//! scheduler runs one refresh, and the resulting model is inspected
//! directly.

use anyhow::Result;
use async_trait::async_trait;
use netmap_core::{
    LifecycleStage, Network, NetworkConfig, Node, NodeKind, Plugin, PluginRegistry,
    PluginWhitelist, RecordKind, Scheduler, SchedulerConfig,
};
use std::sync::Arc;

/// Custom plugin for embedded usage: a hand-rolled inventory source.
struct InventoryPlugin;

#[async_trait]
impl Plugin for InventoryPlugin {
    fn name(&self) -> &str {
        "inventory"
    }

    fn stages(&self) -> Vec<LifecycleStage> {
        vec![LifecycleStage::Dns, LifecycleStage::Nodes]
    }

    fn node_kinds(&self) -> Vec<String> {
        vec!["virtual-machine".to_string()]
    }

    async fn run(
        &self,
        stage: LifecycleStage,
        network: &mut Network,
    ) -> netmap_core::Result<()> {
        match stage {
            LifecycleStage::Dns => {
                network.add_dns_record(
                    "app.example.com",
                    RecordKind::Address,
                    "10.20.0.12",
                    self.name(),
                )?;
                network.add_dns_record(
                    "www.example.com",
                    RecordKind::Alias,
                    "app.example.com",
                    self.name(),
                )?;
            }
            LifecycleStage::Nodes => {
                network.add_node(
                    Node::new(
                        "vm-app-01",
                        "app-01",
                        NodeKind::Custom {
                            kind: "virtual-machine".to_string(),
                            details: serde_json::json!({ "hypervisor": "cluster-1" }),
                        },
                    )
                    .with_addrs(["10.20.0.12".parse().unwrap()]),
                )?;
            }
            _ => {}
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

    let mut registry = PluginRegistry::new();
    registry.register(Arc::new(InventoryPlugin))?;

    let (scheduler, _events) = Scheduler::new(
        registry,
        PluginWhitelist::wildcard(),
        SchedulerConfig {
            fill_subnets: false,
            ..Default::default()
        },
    );

    let mut network = Network::new(NetworkConfig::default())?;
    let summary = scheduler.run(&mut network).await?;

    println!(
        "refresh finished: {} failures, {} domains resolved",
        summary.failures(),
        summary.resolution.resolved
    );
    for domain in network.domains() {
        let nodes: Vec<&str> = domain.nodes.iter().map(String::as_str).collect();
        println!("  {} -> {:?}", domain.name(), nodes);
    }

    Ok(())
}
