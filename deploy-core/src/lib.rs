//! The deployment orchestration engine: dependency resolution, idempotent
//! re-execution, deterministic addressing, and upgradeable-proxy lifecycle
//! management.
//!
//! The engine decides what to deploy, in what order, once, and how to verify
//! it was safely completed. The business logic of the deployed contracts,
//! RPC transport, and key management live behind the narrow collaborator
//! traits in [`interfaces`].

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

pub mod errors;
pub mod executor;
pub mod graph;
pub mod interfaces;
pub mod orchestrator;
pub mod proxy;
pub mod registry;
