//! Architectural Contract Test: Node Resolution
//!
//! Drives the full scheduler pipeline (DNS ingest, node production,
//! resolution) and verifies the resolution guarantees:
//! - A name resolving to an unclaimed address gets exactly one
//!   placeholder node, associated with it
//! - A name resolving to a claimed address is associated with the
//!   claiming node, no placeholder
//! - Alias cycles terminate
//! - A real node arriving after a placeholder consumes it everywhere
//!
//! If this test fails, the aggregation core is broken.

mod common;

use std::sync::Arc;

use common::*;
use netmap_core::{
    LifecycleStage, Node, NodeKind, PluginRegistry, PluginWhitelist, RecordKind, Scheduler,
};

#[tokio::test]
async fn unclaimed_address_produces_exactly_one_placeholder() {
    let mut registry = PluginRegistry::new();
    registry
        .register(Arc::new(FnPlugin::new(
            "dns-fixture",
            &[LifecycleStage::Dns],
            |_, network| {
                network.add_dns_record("a.example.com", RecordKind::Address, "10.0.0.5", "dns-fixture")?;
                Ok(())
            },
        )))
        .unwrap();

    let (scheduler, _events) = Scheduler::new(
        registry,
        PluginWhitelist::wildcard(),
        test_scheduler_config(),
    );

    let mut network = empty_network();
    let summary = scheduler.run(&mut network).await.unwrap();

    assert_eq!(summary.resolution.placeholders, 1);
    assert_eq!(network.counts().2, 1);

    let placeholder = network.nodes().next().unwrap();
    assert!(placeholder.is_placeholder());
    let domain = network.domain("a.example.com").unwrap();
    assert_eq!(domain.nodes.len(), 1);
    assert!(domain.nodes.contains(placeholder.identity()));
}

#[tokio::test]
async fn claimed_addresses_resolve_to_the_claiming_node() {
    let mut registry = PluginRegistry::new();
    registry
        .register(Arc::new(FnPlugin::new(
            "dns-fixture",
            &[LifecycleStage::Dns],
            |_, network| {
                network.add_dns_record("a.example.com", RecordKind::Address, "10.0.0.5", "dns-fixture")?;
                network.add_dns_record("b.example.com", RecordKind::Alias, "a.example.com", "dns-fixture")?;
                Ok(())
            },
        )))
        .unwrap();
    registry
        .register(Arc::new(FnPlugin::new(
            "vm-fixture",
            &[LifecycleStage::Nodes],
            |_, network| {
                network.add_node(
                    Node::new("vm-1", "vm-1", NodeKind::Default)
                        .with_addrs(["10.0.0.5".parse().unwrap()]),
                )?;
                Ok(())
            },
        )))
        .unwrap();

    let (scheduler, _events) = Scheduler::new(
        registry,
        PluginWhitelist::wildcard(),
        test_scheduler_config(),
    );

    let mut network = empty_network();
    let summary = scheduler.run(&mut network).await.unwrap();

    assert_eq!(summary.resolution.placeholders, 0);
    assert_eq!(summary.resolution.resolved, 2);
    for name in ["a.example.com", "b.example.com"] {
        let domain = network.domain(name).unwrap();
        assert!(domain.nodes.contains("vm-1"), "{name} not resolved to vm-1");
    }
    let node = network.node("vm-1").unwrap();
    assert!(node.domains.contains("a.example.com"));
    assert!(node.domains.contains("b.example.com"));
}

#[tokio::test]
async fn alias_cycles_terminate_and_resolve() {
    let mut registry = PluginRegistry::new();
    registry
        .register(Arc::new(FnPlugin::new(
            "dns-fixture",
            &[LifecycleStage::Dns],
            |_, network| {
                network.add_dns_record("a.example.com", RecordKind::Alias, "b.example.com", "dns-fixture")?;
                network.add_dns_record("b.example.com", RecordKind::Alias, "c.example.com", "dns-fixture")?;
                network.add_dns_record("c.example.com", RecordKind::Alias, "a.example.com", "dns-fixture")?;
                Ok(())
            },
        )))
        .unwrap();

    let (scheduler, _events) = Scheduler::new(
        registry,
        PluginWhitelist::wildcard(),
        test_scheduler_config(),
    );

    let mut network = empty_network();
    let summary = scheduler.run(&mut network).await.unwrap();

    // The cycle carries no addresses: every name stays unresolved, the
    // refresh still completes.
    assert_eq!(summary.resolution.unresolved, 3);
    assert_eq!(summary.report.dangling_domains.len(), 3);
}

#[tokio::test]
async fn a_late_real_node_consumes_the_placeholder() {
    // First refresh: records only, a placeholder appears.
    let mut registry = PluginRegistry::new();
    registry
        .register(Arc::new(FnPlugin::new(
            "dns-fixture",
            &[LifecycleStage::Dns],
            |_, network| {
                network.add_dns_record("a.example.com", RecordKind::Address, "10.0.0.5", "dns-fixture")?;
                Ok(())
            },
        )))
        .unwrap();
    let (scheduler, _events) = Scheduler::new(
        registry,
        PluginWhitelist::wildcard(),
        test_scheduler_config(),
    );
    let mut network = empty_network();
    scheduler.run(&mut network).await.unwrap();

    let placeholder_id = network.nodes().next().unwrap().identity().to_string();

    // A node-producing plugin shows up with the real endpoint.
    let real_id = network
        .add_node(
            Node::new("hv-vm-42", "web-1", NodeKind::Default)
                .with_addrs(["10.0.0.5".parse().unwrap()]),
        )
        .unwrap();

    // Every reference moved; the old identity is only an alias.
    assert_eq!(network.counts().2, 1);
    let domain = network.domain("a.example.com").unwrap();
    assert_eq!(domain.nodes.iter().collect::<Vec<_>>(), vec![&real_id]);
    assert_eq!(
        network.node(&placeholder_id).unwrap().identity(),
        real_id.as_str()
    );
    assert_eq!(
        network.node_aliases().get(&placeholder_id),
        Some(&real_id)
    );
}
