// # netmapd - Refresh Daemon
//
// Thin scheduling process for the netmap system. All aggregation logic
// lives in netmap-core; this binary only:
//
// 1. Reads configuration from environment variables
// 2. Registers the compiled-in plugins
// 3. Runs refresh cycles on an interval
// 4. Writes the snapshot for recovery and rendering handoff
//
// ## Configuration
//
// - `NETMAP_CONFIG`: path to the network configuration JSON (optional;
//   an empty configuration is used when unset)
// - `NETMAP_SNAPSHOT_DIR`: directory to write snapshots to
//   (default `./snapshot`)
// - `NETMAP_PLUGINS`: comma-separated plugin whitelist, `*` for all
//   (default `*`)
// - `NETMAP_REFRESH_INTERVAL_SECS`: seconds between refresh cycles,
//   `0` runs a single cycle and exits (default `0`)
// - `NETMAP_ZONEFILE`: path to a zone document for the zonefile plugin
//   (plugin not registered when unset)
// - `NETMAP_LOG`: maximum log level (default `info`)
//
// ## Example
//
// ```bash
// export NETMAP_CONFIG=/etc/netmap/config.json
// export NETMAP_ZONEFILE=/etc/netmap/zones.json
// export NETMAP_SNAPSHOT_DIR=/var/lib/netmap/snapshot
//
// netmapd
// ```

use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use netmap_core::{
    snapshot, Network, NetworkConfig, PluginRegistry, PluginWhitelist, Scheduler, SchedulerConfig,
};
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Exit codes following systemd conventions.
#[derive(Debug, Clone, Copy)]
enum DaemonExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (a refresh aborted)
    RuntimeError = 2,
}

impl From<DaemonExitCode> for ExitCode {
    fn from(code: DaemonExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

struct DaemonConfig {
    network_config: NetworkConfig,
    snapshot_dir: String,
    whitelist: PluginWhitelist,
    interval: Duration,
    zonefile: Option<String>,
}

fn load_daemon_config() -> Result<DaemonConfig> {
    let network_config = match env::var("NETMAP_CONFIG") {
        Ok(path) => NetworkConfig::load(&path).with_context(|| format!("loading {path}"))?,
        Err(_) => {
            warn!("NETMAP_CONFIG not set, using an empty network configuration");
            NetworkConfig::default()
        }
    };

    let snapshot_dir =
        env::var("NETMAP_SNAPSHOT_DIR").unwrap_or_else(|_| "./snapshot".to_string());

    let whitelist = match env::var("NETMAP_PLUGINS") {
        Ok(raw) => {
            let names: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            PluginWhitelist::from_names(names)
        }
        Err(_) => PluginWhitelist::wildcard(),
    };

    let interval = env::var("NETMAP_REFRESH_INTERVAL_SECS")
        .ok()
        .map(|raw| raw.parse::<u64>())
        .transpose()
        .context("NETMAP_REFRESH_INTERVAL_SECS must be an integer")?
        .map(Duration::from_secs)
        .unwrap_or(Duration::ZERO);

    let zonefile = env::var("NETMAP_ZONEFILE").ok();

    Ok(DaemonConfig {
        network_config,
        snapshot_dir,
        whitelist,
        interval,
        zonefile,
    })
}

fn build_registry(config: &DaemonConfig) -> Result<PluginRegistry> {
    let mut registry = PluginRegistry::new();

    #[cfg(feature = "zonefile")]
    if let Some(path) = &config.zonefile {
        registry
            .register(Arc::new(netmap_plugin_zonefile::ZonefilePlugin::new(path)))
            .context("registering zonefile plugin")?;
    }
    #[cfg(not(feature = "zonefile"))]
    if config.zonefile.is_some() {
        warn!("NETMAP_ZONEFILE set but the zonefile feature is disabled");
    }

    if registry.is_empty() {
        warn!("no plugins registered; refresh cycles will produce an empty network");
    }
    Ok(registry)
}

/// Run one refresh cycle and write the snapshot.
async fn refresh_once(scheduler: &Scheduler, config: &DaemonConfig) -> Result<()> {
    let mut network = Network::new(config.network_config.clone())?;
    let summary = scheduler.run(&mut network).await?;
    info!(
        failures = summary.failures(),
        skipped = summary.skipped(),
        resolved = summary.resolution.resolved,
        "refresh completed"
    );
    snapshot::write(&network, &config.snapshot_dir)
        .await
        .context("writing snapshot")?;
    info!("snapshot written to {}", config.snapshot_dir);
    Ok(())
}

async fn run_daemon() -> Result<DaemonExitCode> {
    let config = load_daemon_config()?;
    let registry = build_registry(&config)?;
    let (scheduler, mut events) =
        Scheduler::new(registry, config.whitelist.clone(), SchedulerConfig::default());

    // Drain events into the log so the channel never fills up.
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            tracing::debug!(?event, "refresh event");
        }
    });

    if config.interval.is_zero() {
        if let Err(err) = refresh_once(&scheduler, &config).await {
            error!("refresh aborted: {err:#}");
            return Ok(DaemonExitCode::RuntimeError);
        }
        return Ok(DaemonExitCode::CleanShutdown);
    }

    info!(
        "refreshing every {}s; press Ctrl-C to stop",
        config.interval.as_secs()
    );
    let mut ticker = tokio::time::interval(config.interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(err) = refresh_once(&scheduler, &config).await {
                    // A core failure means the model cannot be trusted;
                    // stop rather than publish a broken snapshot.
                    error!("refresh aborted: {err}");
                    return Ok(DaemonExitCode::RuntimeError);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                return Ok(DaemonExitCode::CleanShutdown);
            }
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let level = env::var("NETMAP_LOG")
        .ok()
        .and_then(|raw| raw.parse::<Level>().ok())
        .unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("failed to initialise logging");
        return DaemonExitCode::ConfigError.into();
    }

    match run_daemon().await {
        Ok(code) => code.into(),
        Err(err) => {
            error!("startup failed: {err:#}");
            DaemonExitCode::ConfigError.into()
        }
    }
}
