//! Hashing and deterministic-address helpers.
//!
//! Deterministic deployments use CREATE2 through the canonical factory: the
//! final salt commits to the step's fixed salt plus the artifact and
//! constructor-argument hashes, so repeated attempts at the same
//! configuration converge on the same address even across registry loss.

use alloy_primitives::{keccak256, Address, B256};

use crate::constants::DETERMINISTIC_DEPLOY_FACTORY;

/// Hashes a contract artifact's bytecode
pub fn artifact_hash(bytecode: &[u8]) -> B256 {
    keccak256(bytecode)
}

/// Hashes ABI-encoded, resolved arguments
pub fn args_hash(encoded_args: &[u8]) -> B256 {
    keccak256(encoded_args)
}

/// Derives the final CREATE2 salt from a step's fixed salt and the artifact
/// and constructor-argument hashes
pub fn create2_salt(step_salt: &[u8], artifact_hash: B256, args_hash: B256) -> B256 {
    let mut preimage = Vec::with_capacity(step_salt.len() + 2 * B256::len_bytes());
    preimage.extend_from_slice(step_salt);
    preimage.extend_from_slice(artifact_hash.as_slice());
    preimage.extend_from_slice(args_hash.as_slice());
    keccak256(preimage)
}

/// Computes the address a deterministic deployment lands on, in advance of
/// (and independent of) transaction ordering
pub fn deterministic_address(salt: B256, init_code: &[u8]) -> Address {
    DETERMINISTIC_DEPLOY_FACTORY.create2(salt, keccak256(init_code))
}

/// Parses a hex salt string, with or without a `0x` prefix
pub fn parse_salt(salt: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(salt.strip_prefix("0x").unwrap_or(salt))
}

#[cfg(test)]
mod tests {
    use alloy_primitives::keccak256;

    use super::*;

    #[test]
    fn test_deterministic_address_stability() {
        let artifact = keccak256(b"bytecode");
        let args = keccak256(b"args");
        let salt = create2_salt(&[0x20, 0x48], artifact, args);
        let init_code = b"bytecode-with-args";

        let a = deterministic_address(salt, init_code);
        let b = deterministic_address(salt, init_code);
        assert_eq!(a, b);
    }

    #[test]
    fn test_salt_commits_to_args() {
        let artifact = keccak256(b"bytecode");
        let salt_a = create2_salt(&[0x20, 0x48], artifact, keccak256(b"args-a"));
        let salt_b = create2_salt(&[0x20, 0x48], artifact, keccak256(b"args-b"));
        assert_ne!(salt_a, salt_b);
    }

    #[test]
    fn test_parse_salt_accepts_prefixed_hex() {
        assert_eq!(parse_salt("0x2048").unwrap(), vec![0x20, 0x48]);
        assert_eq!(parse_salt("2048").unwrap(), vec![0x20, 0x48]);
        assert!(parse_salt("0xzz").is_err());
    }
}
