//! Test doubles and common utilities for architecture contract tests
//!
//! These plugins record how the scheduler drives them instead of
//! fetching anything real.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use netmap_core::{LifecycleStage, Network, Plugin, Result};

/// Shared log of `(plugin, stage)` invocations across a refresh.
pub type InvocationLog = Arc<Mutex<Vec<(String, LifecycleStage)>>>;

/// Create an empty invocation log.
pub fn invocation_log() -> InvocationLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Entries recorded so far.
pub fn entries(log: &InvocationLog) -> Vec<(String, LifecycleStage)> {
    log.lock().unwrap().clone()
}

/// A plugin that records every invocation and mutates nothing.
pub struct RecordingPlugin {
    name: &'static str,
    stages: Vec<LifecycleStage>,
    dependencies: Vec<String>,
    log: InvocationLog,
}

impl RecordingPlugin {
    pub fn new(name: &'static str, stages: &[LifecycleStage], log: &InvocationLog) -> Self {
        Self {
            name,
            stages: stages.to_vec(),
            dependencies: Vec::new(),
            log: Arc::clone(log),
        }
    }

    pub fn with_dependencies(mut self, dependencies: &[&str]) -> Self {
        self.dependencies = dependencies.iter().map(|d| d.to_string()).collect();
        self
    }
}

#[async_trait]
impl Plugin for RecordingPlugin {
    fn name(&self) -> &str {
        self.name
    }

    fn stages(&self) -> Vec<LifecycleStage> {
        self.stages.clone()
    }

    fn dependencies(&self) -> Vec<String> {
        self.dependencies.clone()
    }

    async fn run(&self, stage: LifecycleStage, _network: &mut Network) -> Result<()> {
        self.log.lock().unwrap().push((self.name.to_string(), stage));
        Ok(())
    }
}

/// A plugin that fails in one stage and records everything it ran.
pub struct FailingPlugin {
    name: &'static str,
    stages: Vec<LifecycleStage>,
    fail_in: LifecycleStage,
    log: InvocationLog,
}

impl FailingPlugin {
    pub fn new(
        name: &'static str,
        stages: &[LifecycleStage],
        fail_in: LifecycleStage,
        log: &InvocationLog,
    ) -> Self {
        Self {
            name,
            stages: stages.to_vec(),
            fail_in,
            log: Arc::clone(log),
        }
    }
}

#[async_trait]
impl Plugin for FailingPlugin {
    fn name(&self) -> &str {
        self.name
    }

    fn stages(&self) -> Vec<LifecycleStage> {
        self.stages.clone()
    }

    async fn run(&self, stage: LifecycleStage, _network: &mut Network) -> Result<()> {
        self.log.lock().unwrap().push((self.name.to_string(), stage));
        if stage == self.fail_in {
            return Err(netmap_core::Error::Other(format!(
                "{} deliberately failing",
                self.name
            )));
        }
        Ok(())
    }
}

/// A plugin built from a closure, for populating the network in tests.
pub struct FnPlugin {
    name: &'static str,
    stages: Vec<LifecycleStage>,
    handler: Box<dyn Fn(LifecycleStage, &mut Network) -> Result<()> + Send + Sync>,
}

impl FnPlugin {
    pub fn new<F>(name: &'static str, stages: &[LifecycleStage], handler: F) -> Self
    where
        F: Fn(LifecycleStage, &mut Network) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name,
            stages: stages.to_vec(),
            handler: Box::new(handler),
        }
    }
}

#[async_trait]
impl Plugin for FnPlugin {
    fn name(&self) -> &str {
        self.name
    }

    fn stages(&self) -> Vec<LifecycleStage> {
        self.stages.clone()
    }

    async fn run(&self, stage: LifecycleStage, network: &mut Network) -> Result<()> {
        (self.handler)(stage, network)
    }
}

/// An empty network over the default configuration.
pub fn empty_network() -> Network {
    Network::new(netmap_core::NetworkConfig::default()).unwrap()
}

/// A scheduler configuration with the subnet fill disabled, so tests
/// count only the entities they created.
pub fn test_scheduler_config() -> netmap_core::SchedulerConfig {
    netmap_core::SchedulerConfig {
        fill_subnets: false,
        ..Default::default()
    }
}
