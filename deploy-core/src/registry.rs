//! The network-scoped deployment registry.
//!
//! The registry is the source of truth for idempotence checks: one durable
//! store per network, keyed by unit name, read on every run to decide
//! skip-vs-redeploy and written exactly when a step commits. It is an
//! explicit value passed by reference to the executor and orchestrator;
//! there is no ambient registry.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::RwLock,
};

use deploy_common::types::RegistryEntry;
use serde::{Deserialize, Serialize};

use crate::errors::DeployError;

/// The durable shape of a registry file
#[derive(Serialize, Deserialize)]
struct RegistryFile {
    /// The network the registry is scoped to
    network: String,
    /// Entries keyed by unit name
    deployments: BTreeMap<String, RegistryEntry>,
}

/// A deployment registry scoped to a single network.
///
/// Reads may be concurrent; writes are serialized behind a write lock and
/// persisted atomically (temp file + rename) per record.
pub struct DeploymentRegistry {
    /// The network the registry is scoped to
    network: String,
    /// The file entries are persisted to; `None` keeps the registry
    /// in-memory only
    path: Option<PathBuf>,
    /// The live entries
    entries: RwLock<BTreeMap<String, RegistryEntry>>,
}

impl DeploymentRegistry {
    /// Opens (or initializes) the registry for `network` under `dir`.
    ///
    /// The backing file is `<dir>/<network>.json`; a missing file is an
    /// empty registry, not an error.
    pub fn open(dir: &Path, network: &str) -> Result<Self, DeployError> {
        let path = dir.join(format!("{network}.json"));
        let entries = if path.exists() {
            let contents = fs::read_to_string(&path)
                .map_err(|e| DeployError::RegistryRead(e.to_string()))?;
            let file: RegistryFile = serde_json::from_str(&contents)
                .map_err(|e| DeployError::RegistryRead(e.to_string()))?;
            file.deployments
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            network: network.to_string(),
            path: Some(path),
            entries: RwLock::new(entries),
        })
    }

    /// An in-memory registry for `network`, never persisted
    pub fn in_memory(network: &str) -> Self {
        Self {
            network: network.to_string(),
            path: None,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// The network this registry is scoped to
    pub fn network(&self) -> &str {
        &self.network
    }

    /// Looks up the entry for a unit name
    pub fn lookup(&self, name: &str) -> Option<RegistryEntry> {
        self.entries
            .read()
            .ok()
            .and_then(|entries| entries.get(name).cloned())
    }

    /// A snapshot of every entry, for status reporting
    pub fn entries(&self) -> BTreeMap<String, RegistryEntry> {
        self.entries
            .read()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    /// Records (creates or updates) the entry for a unit name.
    ///
    /// The only mutator. The in-memory map and the backing file are updated
    /// under the write lock, so a record is atomic with respect to a single
    /// step's completion; a persistence failure surfaces as
    /// [`DeployError::RegistryWrite`] naming the unit and address so the
    /// confirmed deployment is never silently lost.
    pub fn record(&self, name: &str, entry: RegistryEntry) -> Result<(), DeployError> {
        let address = entry.address;
        let mut entries = self
            .entries
            .write()
            .map_err(|_| DeployError::RegistryWrite("registry lock poisoned".to_string()))?;
        entries.insert(name.to_string(), entry);

        self.persist(&entries).map_err(|e| {
            DeployError::RegistryWrite(format!("unit `{name}` deployed at {address:#x}: {e}"))
        })
    }

    /// Writes the entries to the backing file via a temp file + rename
    fn persist(&self, entries: &BTreeMap<String, RegistryEntry>) -> Result<(), String> {
        let path = match &self.path {
            Some(path) => path,
            None => return Ok(()),
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }

        let file = RegistryFile {
            network: self.network.clone(),
            deployments: entries.clone(),
        };
        let contents = serde_json::to_string_pretty(&file).map_err(|e| e.to_string())?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, contents).map_err(|e| e.to_string())?;
        fs::rename(&tmp, path).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{keccak256, Address, B256};
    use deploy_common::types::RegistryEntry;
    use tempfile::TempDir;

    use super::DeploymentRegistry;

    /// A registry entry with the given hashes
    fn entry(artifact: B256, args: B256) -> RegistryEntry {
        RegistryEntry {
            address: Address::repeat_byte(0x42),
            artifact_hash: artifact,
            args_hash: args,
            init_args_hash: None,
            tx_hash: Some(B256::repeat_byte(1)),
            proxy: false,
            implementation: None,
            admin: None,
            initializer_invoked: false,
            completed_calls: Vec::new(),
        }
    }

    #[test]
    fn test_round_trip_across_reopen() {
        let dir = TempDir::new().unwrap();
        let artifact = keccak256(b"code");
        let args = keccak256(b"args");

        let registry = DeploymentRegistry::open(dir.path(), "testnet").unwrap();
        registry.record("token", entry(artifact, args)).unwrap();

        let reopened = DeploymentRegistry::open(dir.path(), "testnet").unwrap();
        assert_eq!(reopened.lookup("token"), Some(entry(artifact, args)));
    }

    #[test]
    fn test_registries_are_network_scoped() {
        let dir = TempDir::new().unwrap();
        let artifact = keccak256(b"code");
        let args = keccak256(b"args");

        let testnet = DeploymentRegistry::open(dir.path(), "testnet").unwrap();
        testnet.record("token", entry(artifact, args)).unwrap();

        let mainnet = DeploymentRegistry::open(dir.path(), "mainnet").unwrap();
        assert_eq!(mainnet.lookup("token"), None);
    }

    #[test]
    fn test_is_current_matches_both_hashes() {
        let artifact = keccak256(b"code");
        let args = keccak256(b"args");
        let e = entry(artifact, args);

        assert!(e.is_current(artifact, args, None));
        assert!(!e.is_current(keccak256(b"other"), args, None));
        assert!(!e.is_current(artifact, keccak256(b"other"), None));
        assert!(!e.is_current(artifact, args, Some(args)));
    }

    #[test]
    fn test_record_updates_in_place() {
        let registry = DeploymentRegistry::in_memory("testnet");
        let artifact = keccak256(b"code");

        registry.record("token", entry(artifact, keccak256(b"v1"))).unwrap();
        registry.record("token", entry(artifact, keccak256(b"v2"))).unwrap();

        let stored = registry.lookup("token").unwrap();
        assert_eq!(stored.args_hash, keccak256(b"v2"));
        assert_eq!(registry.entries().len(), 1);
    }
}
