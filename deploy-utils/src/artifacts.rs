//! An in-memory artifact source for tests

use std::{collections::HashMap, sync::RwLock};

use alloy_primitives::Bytes;
use deploy_core::{
    errors::DeployError,
    interfaces::{Artifact, ArtifactSource},
};

/// An artifact source backed by a map, shared mutably so tests can swap a
/// contract's bytecode between runs to simulate a rebuilt artifact
#[derive(Default)]
pub struct InMemoryArtifacts {
    /// Artifacts by contract name
    artifacts: RwLock<HashMap<String, Artifact>>,
}

impl InMemoryArtifacts {
    /// An empty artifact source
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a contract's bytecode, with an empty ABI
    pub fn insert(&self, name: &str, bytecode: Bytes) {
        self.artifacts
            .write()
            .expect("artifact lock poisoned")
            .insert(name.to_string(), Artifact { abi: "[]".to_string(), bytecode });
    }
}

impl ArtifactSource for InMemoryArtifacts {
    fn artifact(&self, name: &str) -> Result<Artifact, DeployError> {
        self.artifacts
            .read()
            .expect("artifact lock poisoned")
            .get(name)
            .cloned()
            .ok_or_else(|| DeployError::ArtifactResolution(format!("no artifact for `{name}`")))
    }
}
