//! Definitions of errors that can occur during deployment orchestration

use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

use itertools::Itertools;

/// Errors that can occur during deployment orchestration
#[derive(Debug)]
pub enum DeployError {
    /// Two steps were declared with the same id
    DuplicateStep(String),
    /// The dependency relation contains a cycle; the ids are the
    /// participating steps, in declaration order
    Cycle(Vec<String>),
    /// A step depends on an id with no corresponding step
    UnknownDependency {
        /// The step declaring the dependency
        from: String,
        /// The dependency id that has no corresponding step
        missing: String,
    },
    /// Error resolving a contract artifact
    ArtifactResolution(String),
    /// Error constructing calldata for a deployment or contract method
    CalldataConstruction(String),
    /// The network rejected a transaction before it was mined
    TransactionSubmission(String),
    /// A transaction was mined but reverted or failed
    TransactionFailure(String),
    /// Error reading the deployment registry
    RegistryRead(String),
    /// A deployment confirmed but its durable record could not be written.
    /// The run aborts: the message names the unit and address awaiting
    /// manual reconciliation so the deployment is not silently lost.
    RegistryWrite(String),
    /// A step attempted to re-invoke a proxy initializer that has already
    /// run. Refused unconditionally: re-initialization corrupts the state of
    /// the deployed unit.
    Reinitialization(String),
    /// Error initializing the RPC client
    ClientInitialization(String),
    /// The run completed with at least one failed or blocked step
    RunFailed {
        /// The first step in plan order that failed or was blocked
        step: String,
    },
}

impl DeployError {
    /// Whether the error aborts the whole run rather than failing a single
    /// step and blocking its dependents
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DeployError::RegistryRead(_)
                | DeployError::RegistryWrite(_)
                | DeployError::Reinitialization(_)
        )
    }
}

impl Display for DeployError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DeployError::DuplicateStep(id) => {
                write!(f, "duplicate step id `{}`", id)
            }
            DeployError::Cycle(ids) => {
                write!(f, "dependency cycle between steps: {}", ids.iter().join(", "))
            }
            DeployError::UnknownDependency { from, missing } => {
                write!(f, "step `{}` depends on unknown step `{}`", from, missing)
            }
            DeployError::ArtifactResolution(s) => write!(f, "error resolving artifact: {}", s),
            DeployError::CalldataConstruction(s) => {
                write!(f, "error constructing calldata: {}", s)
            }
            DeployError::TransactionSubmission(s) => {
                write!(f, "error submitting transaction: {}", s)
            }
            DeployError::TransactionFailure(s) => write!(f, "transaction failed: {}", s),
            DeployError::RegistryRead(s) => write!(f, "error reading registry: {}", s),
            DeployError::RegistryWrite(s) => write!(
                f,
                "deployment confirmed but registry write failed, reconcile manually before re-running: {}",
                s,
            ),
            DeployError::Reinitialization(s) => write!(
                f,
                "refusing to re-invoke the initializer of `{}`; declare a new unit instead",
                s,
            ),
            DeployError::ClientInitialization(s) => {
                write!(f, "error initializing client: {}", s)
            }
            DeployError::RunFailed { step } => {
                write!(f, "run failed; first failed or blocked step: `{}`", step)
            }
        }
    }
}

impl Error for DeployError {}
