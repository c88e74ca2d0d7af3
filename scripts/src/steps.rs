//! The deployment manifest for the 2048 game stack

use alloy_primitives::Address;
use deploy_common::types::{CallArg, DeploymentStep, PostDeployCall, ProxySpec};

use crate::constants::{
    GAME_CONTRACT_NAME, GAME_DETERMINISTIC_SALT, GAME_GAS_PRICE_WEI, GAME_INITIALIZE_SIGNATURE,
    GAME_STEP_ID, GAME_V1_ADDRESS, GAME_V1_STEP_ID, INITIAL_BOARD_PRICE_WEI,
    REWARD_CONTRACT_NAME, REWARD_STEP_ID, REWARD_TOKEN_TAG, SET_BOARD_PRICE_SIGNATURE,
    SET_MINTER_SIGNATURE, TOKEN_CONTRACT_NAME, TOKEN_STEP_ID,
};

/// The full game deployment manifest.
///
/// `deployer` owns the token, the game, and the proxy admin. Declaration
/// order is the tie-break order for independent steps, so the manifest reads
/// top-to-bottom the way it rolls out.
pub fn game_steps(deployer: Address) -> Vec<DeploymentStep> {
    vec![
        DeploymentStep::deploy(TOKEN_STEP_ID, TOKEN_CONTRACT_NAME)
            .constructor_args([CallArg::Address(deployer)])
            .with_salt(GAME_DETERMINISTIC_SALT),
        DeploymentStep::deploy(GAME_STEP_ID, GAME_CONTRACT_NAME)
            .depends_on([TOKEN_STEP_ID])
            .with_salt(GAME_DETERMINISTIC_SALT)
            .with_gas_price(GAME_GAS_PRICE_WEI)
            .with_proxy(ProxySpec {
                owner: CallArg::Address(deployer),
                init_method: GAME_INITIALIZE_SIGNATURE.to_string(),
                init_args: vec![
                    CallArg::Address(deployer),
                    CallArg::Dependency(TOKEN_STEP_ID.to_string()),
                ],
            })
            .with_call(PostDeployCall::to_unit(
                "grant-minter",
                TOKEN_STEP_ID,
                SET_MINTER_SIGNATURE,
                vec![
                    CallArg::Dependency(GAME_STEP_ID.to_string()),
                    CallArg::Bool(true),
                ],
            ))
            .with_call(PostDeployCall::to_self(
                "set-board-price",
                SET_BOARD_PRICE_SIGNATURE,
                vec![
                    CallArg::Address(Address::ZERO),
                    CallArg::Uint(INITIAL_BOARD_PRICE_WEI),
                ],
            )),
        DeploymentStep::external(GAME_V1_STEP_ID, GAME_V1_ADDRESS),
        DeploymentStep::deploy(REWARD_STEP_ID, REWARD_CONTRACT_NAME)
            .depends_on([GAME_V1_STEP_ID])
            .constructor_args([CallArg::Dependency(GAME_V1_STEP_ID.to_string())])
            .with_tag(REWARD_TOKEN_TAG),
    ]
}
