//! ABI encoding of constructor, initializer, and post-deploy call arguments.
//!
//! Arguments are declared symbolically ([`CallArg`]) and resolved against the
//! addresses produced by already-executed steps before encoding, so the
//! argument hashes commit to the concrete addresses a unit was wired to.

use std::{
    collections::HashMap,
    error::Error,
    fmt::{self, Display, Formatter},
};

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{keccak256, Address, Bytes};

use crate::{constants::SELECTOR_BYTES, types::CallArg};

/// Errors that can occur while constructing calldata
#[derive(Debug)]
pub enum CalldataError {
    /// An argument references a step whose address is not available
    UnresolvedDependency(String),
    /// A method signature is not of the form `name(type,...)`
    MalformedSignature(String),
}

impl Display for CalldataError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            CalldataError::UnresolvedDependency(id) => {
                write!(f, "no resolved address for dependency `{}`", id)
            }
            CalldataError::MalformedSignature(sig) => {
                write!(f, "malformed method signature `{}`", sig)
            }
        }
    }
}

impl Error for CalldataError {}

/// Resolves symbolic arguments against the addresses of executed steps
pub fn resolve_args(
    args: &[CallArg],
    resolved: &HashMap<String, Address>,
) -> Result<Vec<DynSolValue>, CalldataError> {
    args.iter()
        .map(|arg| match arg {
            CallArg::Address(addr) => Ok(DynSolValue::Address(*addr)),
            CallArg::Uint(value) => Ok(DynSolValue::Uint(*value, 256)),
            CallArg::Bool(value) => Ok(DynSolValue::Bool(*value)),
            CallArg::Bytes(bytes) => Ok(DynSolValue::Bytes(bytes.to_vec())),
            CallArg::Str(s) => Ok(DynSolValue::String(s.clone())),
            CallArg::Dependency(id) => resolved
                .get(id)
                .map(|addr| DynSolValue::Address(*addr))
                .ok_or_else(|| CalldataError::UnresolvedDependency(id.clone())),
        })
        .collect()
}

/// ABI-encodes resolved arguments as function parameters
pub fn encode_params(values: Vec<DynSolValue>) -> Vec<u8> {
    DynSolValue::Tuple(values).abi_encode_params()
}

/// Computes the 4-byte selector of a Solidity method signature
pub fn selector(signature: &str) -> Result<[u8; SELECTOR_BYTES], CalldataError> {
    if !signature.contains('(') || !signature.ends_with(')') {
        return Err(CalldataError::MalformedSignature(signature.to_string()));
    }

    let hash = keccak256(signature.as_bytes());
    let mut sel = [0u8; SELECTOR_BYTES];
    sel.copy_from_slice(&hash[..SELECTOR_BYTES]);
    Ok(sel)
}

/// Builds full calldata (selector + encoded arguments) for a method call
pub fn encode_call(
    signature: &str,
    args: &[CallArg],
    resolved: &HashMap<String, Address>,
) -> Result<Bytes, CalldataError> {
    let sel = selector(signature)?;
    let params = encode_params(resolve_args(args, resolved)?);

    let mut calldata = Vec::with_capacity(SELECTOR_BYTES + params.len());
    calldata.extend_from_slice(&sel);
    calldata.extend_from_slice(&params);
    Ok(calldata.into())
}

/// Builds the init code for a deployment: bytecode followed by the
/// ABI-encoded constructor arguments
pub fn encode_init_code(
    bytecode: &Bytes,
    args: &[CallArg],
    resolved: &HashMap<String, Address>,
) -> Result<Bytes, CalldataError> {
    let params = encode_params(resolve_args(args, resolved)?);

    let mut init_code = Vec::with_capacity(bytecode.len() + params.len());
    init_code.extend_from_slice(bytecode);
    init_code.extend_from_slice(&params);
    Ok(init_code.into())
}
