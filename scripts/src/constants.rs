//! Constants used in the deploy scripts

use std::time::Duration;

use alloy_primitives::{address, Address, U256};

/// The step id of the game token deployment
pub const TOKEN_STEP_ID: &str = "token2048";

/// The step id of the game proxy deployment
pub const GAME_STEP_ID: &str = "game2048";

/// The step id pinning the externally-managed v1 game deployment
pub const GAME_V1_STEP_ID: &str = "game2048-v1";

/// The step id of the reward token deployment
pub const REWARD_STEP_ID: &str = "reward-token";

/// The name of the game token contract artifact
pub const TOKEN_CONTRACT_NAME: &str = "Token2048";

/// The name of the game contract artifact
pub const GAME_CONTRACT_NAME: &str = "Game2048";

/// The name of the reward token contract artifact
pub const REWARD_CONTRACT_NAME: &str = "RewardToken";

/// The tag selecting the reward token rollout
pub const REWARD_TOKEN_TAG: &str = "RewardToken";

/// The fixed salt under which the game stack deploys deterministically
pub const GAME_DETERMINISTIC_SALT: &str = "0x2048";

/// The address of the v1 game deployment the reward token pays out against.
///
/// This deployment predates the orchestrator and is not managed by it; it
/// enters the graph as a pinned external step.
pub const GAME_V1_ADDRESS: Address = address!("b6bc3b49b3f6C4237851A6E1e918b40d843D8491");

/// The Solidity signature of the game initializer
pub const GAME_INITIALIZE_SIGNATURE: &str = "initialize(address,address)";

/// The Solidity signature of the token's minter grant
pub const SET_MINTER_SIGNATURE: &str = "setMinter(address,bool)";

/// The Solidity signature of the game's board price setter
pub const SET_BOARD_PRICE_SIGNATURE: &str = "setCreateBoardPrice(address,uint256)";

/// The initial board creation price: 0.00005 ETH, denominated in wei
pub const INITIAL_BOARD_PRICE_WEI: U256 = U256::from_limbs([50_000_000_000_000, 0, 0, 0]);

/// The gas price pinned for the game deployment transactions, in wei
pub const GAME_GAS_PRICE_WEI: u128 = 10_000_000;

/// How often to poll for a transaction receipt while awaiting confirmation
pub const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(1);
