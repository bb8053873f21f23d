// # Zone-File Ingest Plugin
//
// Populates the network model from a local JSON document of DNS zones.
// This is the reference implementation of the plugin contract: it only
// talks to the network through its public creation operations, declares
// a single lifecycle stage, and leaves all identity resolution to the
// core.
//
// ## Constraints
//
// - One file read per refresh; no caching between refreshes
// - No node production: this plugin contributes DNS facts only
// - Malformed records are skipped and recorded in the network report,
//   never fatal
//
// ## Document Format
//
// ```json
// {
//   "zones": {
//     "example.com": [
//       { "name": "www.example.com", "type": "address", "value": "192.0.2.10" },
//       { "name": "web.example.com", "type": "alias",   "value": "www.example.com" },
//       { "name": "example.com",     "type": "text",    "value": "v=spf1 -all" }
//     ]
//   }
// }
// ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use netmap_core::{Error, LifecycleStage, Network, Plugin, RecordKind, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Plugin name, used as the record source tag.
pub const PLUGIN_NAME: &str = "zonefile";

/// A single record entry in the zone document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneRecord {
    /// Fully qualified record name.
    pub name: String,
    /// Record type.
    #[serde(rename = "type")]
    pub kind: RecordKind,
    /// Record value.
    pub value: String,
}

/// The zone document: zone name to its records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZoneDocument {
    /// Managed zones.
    #[serde(default)]
    pub zones: BTreeMap<String, Vec<ZoneRecord>>,
}

/// Zone-file ingest plugin.
///
/// Reads the configured document during the DNS stage and feeds every
/// record through [`Network::add_dns_record`].
pub struct ZonefilePlugin {
    path: PathBuf,
}

impl ZonefilePlugin {
    /// Create a plugin reading the document at `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    async fn load(&self) -> Result<ZoneDocument> {
        let raw = tokio::fs::read(&self.path).await.map_err(|e| {
            Error::config(format!(
                "failed to read zone file {}: {e}",
                self.path.display()
            ))
        })?;
        serde_json::from_slice(&raw).map_err(|e| {
            Error::config(format!(
                "malformed zone file {}: {e}",
                self.path.display()
            ))
        })
    }

    fn ingest(&self, document: ZoneDocument, network: &mut Network) {
        let mut added = 0usize;
        for (zone, records) in document.zones {
            debug!("ingesting zone '{zone}' ({} records)", records.len());
            for record in records {
                match network.ensure_domain_in_zone(&record.name, &zone) {
                    Ok(Some(_)) => {}
                    Ok(None) => continue,
                    Err(err) => {
                        network
                            .report_mut()
                            .invalid_record(&zone, &record.name, err);
                        continue;
                    }
                }
                match network.add_dns_record(&record.name, record.kind, &record.value, PLUGIN_NAME)
                {
                    Ok(true) => added += 1,
                    Ok(false) => {}
                    Err(err) => {
                        network
                            .report_mut()
                            .invalid_record(&record.name, &record.value, err);
                    }
                }
            }
        }
        info!("zone file contributed {added} records");
    }
}

#[async_trait]
impl Plugin for ZonefilePlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn stages(&self) -> Vec<LifecycleStage> {
        vec![LifecycleStage::Dns]
    }

    async fn run(&self, stage: LifecycleStage, network: &mut Network) -> Result<()> {
        debug_assert_eq!(stage, LifecycleStage::Dns);
        let document = self.load().await?;
        self.ingest(document, network);
        Ok(())
    }
}
