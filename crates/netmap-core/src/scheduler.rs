//! Plugin lifecycle scheduler
//!
//! Drives one refresh cycle: validates plugin dependencies, orders the
//! runnable plugins, executes them across the fixed stage sequence with
//! the shared [`Network`], runs the core resolution pass, and produces a
//! summary of what ran, what was skipped and what failed.
//!
//! ## Failure semantics
//!
//! A failing plugin handler is isolated: it is logged with plugin and
//! stage context, the plugin runs no further stages, and every other
//! plugin continues. Only a failure of the core resolution pass aborts
//! the refresh, because it means the model's invariants were violated
//! and the resulting network cannot be trusted.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::error::{Error, Result};
use crate::network::{Network, ResolutionStats};
use crate::plugin::{LifecycleStage, Plugin, PluginRegistry, PluginWhitelist};
use crate::report::{Report, WarningKind};

/// Events emitted while a refresh runs, for external monitoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshEvent {
    /// The refresh started with this many runnable plugins.
    Started {
        /// Number of plugins that will run.
        plugins: usize,
    },

    /// A stage began executing.
    StageStarted {
        /// The stage.
        stage: LifecycleStage,
        /// Plugins that will run in it.
        plugins: usize,
    },

    /// A plugin was skipped before the refresh began.
    PluginSkipped {
        /// The skipped plugin.
        plugin: String,
        /// Its unmet dependencies (empty for a dependency cycle).
        missing: Vec<String>,
    },

    /// A plugin handler failed; the refresh continues without it.
    PluginFailed {
        /// The failing plugin.
        plugin: String,
        /// The stage it failed in.
        stage: LifecycleStage,
    },

    /// The core resolution pass completed.
    ResolutionCompleted {
        /// Counters from the pass.
        stats: ResolutionStats,
    },

    /// The refresh finished, possibly with recorded per-plugin failures.
    Completed {
        /// Number of plugins that failed a stage.
        failures: usize,
    },

    /// The refresh was aborted by a core failure.
    Aborted {
        /// Why.
        reason: String,
    },
}

/// Lifecycle state of one plugin within a refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum PluginState {
    /// Not yet run.
    Pending,
    /// Currently executing a stage.
    Running {
        /// The stage being executed.
        stage: LifecycleStage,
    },
    /// Ran every declared stage.
    Completed,
    /// Failed a stage; later stages were not run.
    Failed {
        /// The stage it failed in.
        stage: LifecycleStage,
    },
    /// Skipped before the refresh began.
    Skipped {
        /// Unmet dependencies (empty for a dependency cycle).
        missing: Vec<String>,
    },
}

/// Final state of one plugin after a refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginOutcome {
    /// Plugin name.
    pub name: String,
    /// Terminal state.
    pub state: PluginState,
}

/// What one refresh cycle did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshSummary {
    /// Per-plugin outcomes, in registry declaration order.
    pub outcomes: Vec<PluginOutcome>,
    /// Counters from the resolution pass.
    pub resolution: ResolutionStats,
    /// Addresses generated by the private-subnet fill.
    pub filled_addresses: usize,
    /// The network's accumulated report.
    pub report: Report,
}

impl RefreshSummary {
    /// Number of plugins that failed a stage.
    pub fn failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.state, PluginState::Failed { .. }))
            .count()
    }

    /// Number of plugins skipped before the refresh began.
    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.state, PluginState::Skipped { .. }))
            .count()
    }
}

/// A plugin held out of the refresh, and why.
struct SkippedPlugin {
    name: String,
    missing: Vec<String>,
    cycle: bool,
}

/// The resolved execution plan of one refresh.
struct Plan {
    order: Vec<Arc<dyn Plugin>>,
    skipped: Vec<SkippedPlugin>,
}

/// Drives refresh cycles over a registry of plugins.
pub struct Scheduler {
    registry: PluginRegistry,
    whitelist: PluginWhitelist,
    config: SchedulerConfig,
    event_tx: mpsc::Sender<RefreshEvent>,
}

impl Scheduler {
    /// Create a scheduler.
    ///
    /// Returns the scheduler and a receiver yielding [`RefreshEvent`]s.
    /// The channel is bounded by the configured capacity; when it is
    /// full further events are dropped with a warning rather than
    /// blocking the refresh.
    pub fn new(
        registry: PluginRegistry,
        whitelist: PluginWhitelist,
        config: SchedulerConfig,
    ) -> (Self, mpsc::Receiver<RefreshEvent>) {
        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity.max(1));
        let scheduler = Self {
            registry,
            whitelist,
            config,
            event_tx,
        };
        (scheduler, event_rx)
    }

    /// The registry this scheduler runs.
    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Names of the plugins that would run, in execution order.
    pub fn planned_order(&self) -> Vec<String> {
        self.plan()
            .order
            .iter()
            .map(|p| p.name().to_string())
            .collect()
    }

    /// Run one refresh cycle against `network`.
    ///
    /// Returns the summary on success; an error only for a core failure
    /// (the refresh is aborted and no output should be produced).
    pub async fn run(&self, network: &mut Network) -> Result<RefreshSummary> {
        let plan = self.plan();
        self.emit(RefreshEvent::Started {
            plugins: plan.order.len(),
        });
        info!(
            runnable = plan.order.len(),
            skipped = plan.skipped.len(),
            "starting refresh"
        );

        let mut states: HashMap<String, PluginState> = HashMap::new();
        for plugin in &plan.order {
            states.insert(plugin.name().to_string(), PluginState::Pending);
        }
        for skipped in &plan.skipped {
            if skipped.cycle {
                network.report_mut().warn(
                    WarningKind::MissingDependency,
                    format!(
                        "plugin '{}' skipped: dependency cycle involving it",
                        skipped.name
                    ),
                );
            }
            for dependency in &skipped.missing {
                let err = Error::missing_dependency(&skipped.name, dependency);
                network
                    .report_mut()
                    .warn(WarningKind::MissingDependency, err.to_string());
            }
            states.insert(
                skipped.name.clone(),
                PluginState::Skipped {
                    missing: skipped.missing.clone(),
                },
            );
            self.emit(RefreshEvent::PluginSkipped {
                plugin: skipped.name.clone(),
                missing: skipped.missing.clone(),
            });
        }

        for plugin in &plan.order {
            if let Err(err) = plugin.init().await {
                // Initialisation trouble is not terminal: the plugin may
                // still produce partial facts.
                network.report_mut().warn(
                    WarningKind::PluginFailure,
                    format!("plugin '{}' failed to initialise: {err}", plugin.name()),
                );
            }
        }

        let mut resolution = ResolutionStats::default();
        let mut filled_addresses = 0;
        let mut failed: BTreeSet<String> = BTreeSet::new();

        for stage in LifecycleStage::ALL {
            let stage_plugins: Vec<Arc<dyn Plugin>> = plan
                .order
                .iter()
                .filter(|p| p.stages().contains(&stage) && !failed.contains(p.name()))
                .cloned()
                .collect();

            if !stage_plugins.is_empty() {
                info!("starting stage: {stage}");
                self.emit(RefreshEvent::StageStarted {
                    stage,
                    plugins: stage_plugins.len(),
                });
            }

            for plugin in stage_plugins {
                let name = plugin.name().to_string();
                states.insert(name.clone(), PluginState::Running { stage });
                debug!("running plugin '{name}' stage {stage}");
                match plugin.run(stage, network).await {
                    Ok(()) => {
                        states.insert(name, PluginState::Pending);
                    }
                    Err(err) => {
                        let wrapped =
                            Error::plugin_execution(&name, stage.to_string(), err.to_string());
                        error!("{wrapped}");
                        network
                            .report_mut()
                            .warn(WarningKind::PluginFailure, wrapped.to_string());
                        states.insert(name.clone(), PluginState::Failed { stage });
                        failed.insert(name.clone());
                        self.emit(RefreshEvent::PluginFailed {
                            plugin: name,
                            stage,
                        });
                    }
                }
            }

            if stage == LifecycleStage::Nodes {
                if self.config.fill_subnets {
                    filled_addresses = network.fill_private_subnets();
                    if filled_addresses > 0 {
                        debug!("generated {filled_addresses} addresses filling private subnets");
                    }
                }
                match network.resolve_nodes() {
                    Ok(stats) => {
                        info!(
                            resolved = stats.resolved,
                            unresolved = stats.unresolved,
                            placeholders = stats.placeholders,
                            "node resolution completed"
                        );
                        self.emit(RefreshEvent::ResolutionCompleted { stats });
                        resolution = stats;
                    }
                    Err(err) => {
                        error!("aborting refresh: {err}");
                        self.emit(RefreshEvent::Aborted {
                            reason: err.to_string(),
                        });
                        return Err(err);
                    }
                }
            }

            if stage == LifecycleStage::Footers {
                network.apply_label_attrs();
            }
        }

        for plugin in &plan.order {
            let name = plugin.name();
            if !failed.contains(name) {
                states.insert(name.to_string(), PluginState::Completed);
            }
        }

        let outcomes: Vec<PluginOutcome> = self
            .registry
            .iter()
            .filter_map(|p| {
                states.get(p.name()).map(|state| PluginOutcome {
                    name: p.name().to_string(),
                    state: state.clone(),
                })
            })
            .collect();

        let summary = RefreshSummary {
            outcomes,
            resolution,
            filled_addresses,
            report: network.report().clone(),
        };
        network.report().log_summary();
        self.emit(RefreshEvent::Completed {
            failures: summary.failures(),
        });
        Ok(summary)
    }

    /// Resolve which plugins run this refresh and in which order.
    ///
    /// Enabled-but-unregistered names warn; a plugin whose dependency is
    /// missing, disabled or itself skipped is skipped entirely (computed
    /// to a fixpoint); the runnable remainder is ordered topologically
    /// over declared dependencies with declaration order as the stable
    /// tie-break. Dependency cycles skip their participants.
    fn plan(&self) -> Plan {
        if self.whitelist.is_wildcard() {
            debug!("plugin whitelist is wildcard; all registered plugins are enabled");
        }
        for name in self.whitelist.names() {
            if !self.registry.contains(name) {
                warn!("plugin '{name}' is enabled but was not registered");
            }
        }

        let plugins: Vec<&Arc<dyn Plugin>> = self.registry.iter().collect();
        let mut runnable: BTreeSet<usize> = plugins
            .iter()
            .enumerate()
            .filter(|(_, p)| self.whitelist.contains(p.name()))
            .map(|(i, _)| i)
            .collect();
        let mut skipped: Vec<SkippedPlugin> = Vec::new();

        // A dependency on a plugin that will not run disables the
        // dependent too, so iterate until stable.
        loop {
            let names: BTreeSet<&str> =
                runnable.iter().map(|&i| plugins[i].name()).collect();
            let mut removed = false;
            for i in runnable.clone() {
                let missing: Vec<String> = plugins[i]
                    .dependencies()
                    .into_iter()
                    .filter(|dep| !names.contains(dep.as_str()))
                    .collect();
                if !missing.is_empty() {
                    runnable.remove(&i);
                    skipped.push(SkippedPlugin {
                        name: plugins[i].name().to_string(),
                        missing,
                        cycle: false,
                    });
                    removed = true;
                }
            }
            if !removed {
                break;
            }
        }

        // Kahn's algorithm; the ready heap pops the lowest declaration
        // index first, which keeps unrelated plugins in registry order.
        let index_of: HashMap<&str, usize> = plugins
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name(), i))
            .collect();
        let mut indegree: HashMap<usize, usize> =
            runnable.iter().map(|&i| (i, 0)).collect();
        let mut dependents: HashMap<usize, Vec<usize>> = HashMap::new();
        for &i in &runnable {
            for dep in plugins[i].dependencies() {
                if let Some(&j) = index_of.get(dep.as_str())
                    && runnable.contains(&j)
                {
                    *indegree.get_mut(&i).expect("runnable indegree") += 1;
                    dependents.entry(j).or_default().push(i);
                }
            }
        }

        let mut ready: BinaryHeap<Reverse<usize>> = indegree
            .iter()
            .filter(|&(_, &deg)| deg == 0)
            .map(|(&i, _)| Reverse(i))
            .collect();
        let mut order: Vec<Arc<dyn Plugin>> = Vec::new();
        let mut placed: BTreeSet<usize> = BTreeSet::new();
        while let Some(Reverse(i)) = ready.pop() {
            order.push(Arc::clone(plugins[i]));
            placed.insert(i);
            for &dependent in dependents.get(&i).map(Vec::as_slice).unwrap_or(&[]) {
                let deg = indegree.get_mut(&dependent).expect("runnable indegree");
                *deg -= 1;
                if *deg == 0 {
                    ready.push(Reverse(dependent));
                }
            }
        }

        // Whatever Kahn could not place sits on a dependency cycle.
        for &i in &runnable {
            if !placed.contains(&i) {
                skipped.push(SkippedPlugin {
                    name: plugins[i].name().to_string(),
                    missing: Vec::new(),
                    cycle: true,
                });
            }
        }

        Plan { order, skipped }
    }

    /// Emit a refresh event without ever blocking the refresh.
    fn emit(&self, event: RefreshEvent) {
        if self.event_tx.try_send(event).is_err() {
            warn!("event channel full, dropping refresh event");
        }
    }
}
