//! Local workload inventory.
//!
//! The VM and jail tooling owns workload lifecycle; the coordinator only reads
//! what it needs for failover through [`WorkloadInventory`].

use crate::error::{HaError, Result};
use crate::types::Workload;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Source of the workloads hosted on this node.
pub trait WorkloadInventory: Send + Sync {
    fn vms(&self) -> Result<Vec<Workload>>;
    fn jails(&self) -> Result<Vec<Workload>>;
}

/// On-disk inventory document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventoryDocument {
    #[serde(default)]
    pub vms: Vec<Workload>,
    #[serde(default)]
    pub jails: Vec<Workload>,
}

/// Inventory read from a JSON file on every call.
#[derive(Debug, Clone)]
pub struct FileInventory {
    path: PathBuf,
}

impl FileInventory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> Result<InventoryDocument> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                HaError::Inventory(format!("Failed to parse {}: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(InventoryDocument::default()),
            Err(e) => Err(HaError::Inventory(format!(
                "Failed to read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}

impl WorkloadInventory for FileInventory {
    fn vms(&self) -> Result<Vec<Workload>> {
        Ok(self.load()?.vms)
    }

    fn jails(&self) -> Result<Vec<Workload>> {
        Ok(self.load()?.jails)
    }
}

/// In-memory inventory.
#[derive(Debug, Default)]
pub struct StaticInventory {
    document: RwLock<InventoryDocument>,
}

impl StaticInventory {
    pub fn new(vms: Vec<Workload>, jails: Vec<Workload>) -> Self {
        Self {
            document: RwLock::new(InventoryDocument { vms, jails }),
        }
    }

    pub fn set_vms(&self, vms: Vec<Workload>) {
        self.document.write().vms = vms;
    }

    pub fn set_jails(&self, jails: Vec<Workload>) {
        self.document.write().jails = jails;
    }
}

impl WorkloadInventory for StaticInventory {
    fn vms(&self) -> Result<Vec<Workload>> {
        Ok(self.document.read().vms.clone())
    }

    fn jails(&self) -> Result<Vec<Workload>> {
        Ok(self.document.read().jails.clone())
    }
}
