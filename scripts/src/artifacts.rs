//! A directory-backed artifact source reading compiled contract artifacts

use std::{fs, path::PathBuf};

use alloy_primitives::Bytes;
use deploy_core::{
    errors::DeployError,
    interfaces::{Artifact, ArtifactSource},
};
use serde::Deserialize;

/// The relevant fields of a solc/hardhat-style artifact file
#[derive(Deserialize)]
struct ArtifactFile {
    /// The contract ABI
    abi: serde_json::Value,
    /// The hex-encoded creation bytecode
    bytecode: String,
}

/// An artifact source reading `<dir>/<Contract>.json` files produced by the
/// contract build
pub struct DirArtifacts {
    /// The directory artifacts are read from
    dir: PathBuf,
}

impl DirArtifacts {
    /// An artifact source over the given directory
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

impl ArtifactSource for DirArtifacts {
    fn artifact(&self, name: &str) -> Result<Artifact, DeployError> {
        let path = self.dir.join(format!("{name}.json"));
        let contents = fs::read_to_string(&path).map_err(|e| {
            DeployError::ArtifactResolution(format!("{}: {}", path.display(), e))
        })?;

        let parsed: ArtifactFile = serde_json::from_str(&contents).map_err(|e| {
            DeployError::ArtifactResolution(format!("{}: {}", path.display(), e))
        })?;

        let abi = serde_json::to_string(&parsed.abi)
            .map_err(|e| DeployError::ArtifactResolution(e.to_string()))?;
        let bytecode = hex::decode(parsed.bytecode.strip_prefix("0x").unwrap_or(&parsed.bytecode))
            .map_err(|e| {
                DeployError::ArtifactResolution(format!("bad bytecode in {}: {}", path.display(), e))
            })?;

        Ok(Artifact { abi, bytecode: Bytes::from(bytecode) })
    }
}

#[cfg(test)]
mod tests {
    use deploy_core::interfaces::ArtifactSource;
    use eyre::Result;
    use tempfile::TempDir;

    use super::DirArtifacts;

    #[test]
    fn test_reads_hardhat_artifact() -> Result<()> {
        let dir = TempDir::new()?;
        std::fs::write(
            dir.path().join("Token2048.json"),
            r#"{"contractName":"Token2048","abi":[],"bytecode":"0x6080abcd"}"#,
        )?;

        let source = DirArtifacts::new(dir.path().to_path_buf());
        let artifact = source.artifact("Token2048")?;

        assert_eq!(artifact.bytecode.as_ref(), [0x60, 0x80, 0xab, 0xcd]);
        assert_eq!(artifact.abi, "[]");
        Ok(())
    }

    #[test]
    fn test_missing_artifact_errors() {
        let dir = TempDir::new().unwrap();
        let source = DirArtifacts::new(dir.path().to_path_buf());
        assert!(source.artifact("Nope").is_err());
    }
}
