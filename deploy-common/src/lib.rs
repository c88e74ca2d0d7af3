//! Shared type definitions for the deployment orchestration engine:
//! step declarations, call arguments & calldata encoding, registry entries,
//! run results, and deterministic-address helpers.

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

pub mod calldata;
pub mod constants;
pub mod hashing;
pub mod types;
