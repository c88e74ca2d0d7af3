//! Constants used throughout the deployment engine

use alloy_primitives::{address, b256, Address, B256};

/// The canonical deterministic-deployment factory.
///
/// CREATE2 deployments are submitted as calls to this factory with
/// `salt || init_code` as calldata, so repeated attempts at the same
/// configuration converge on the same address regardless of nonce.
pub const DETERMINISTIC_DEPLOY_FACTORY: Address =
    address!("4e59b44847b379578588920cA78FbF26c0B4956C");

/// The storage slot containing the proxy admin contract address in the
/// upgradeable proxy.
///
/// This is specified in EIP1967: https://eips.ethereum.org/EIPS/eip-1967#admin-address
pub const EIP1967_ADMIN_SLOT: B256 =
    b256!("b53127684a568b3173ae13b9f8a6016e243e63b6e8ee1178d6a717850b5d6103");

/// The artifact name under which the upgradeable proxy is resolved.
///
/// This is the OpenZeppelin `TransparentUpgradeableProxy`, which deploys its
/// own `ProxyAdmin` and forwards all non-admin calls to the implementation.
pub const PROXY_ARTIFACT_NAME: &str = "TransparentUpgradeableProxy";

/// The signature of the `ProxyAdmin` method used to swap the implementation
pub const UPGRADE_AND_CALL_SIGNATURE: &str = "upgradeAndCall(address,address,bytes)";

/// The number of bytes in a Solidity function selector
pub const SELECTOR_BYTES: usize = 4;

/// The number of bytes in an Ethereum address
pub const NUM_BYTES_ADDRESS: usize = 20;

/// The number of bytes stored in a single storage slot
pub const NUM_BYTES_STORAGE_SLOT: usize = 32;
