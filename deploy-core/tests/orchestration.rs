//! End-to-end orchestration tests against the in-memory chain

use alloy_primitives::{address, Address, Bytes, U256};
use deploy_common::{
    constants::{PROXY_ARTIFACT_NAME, UPGRADE_AND_CALL_SIGNATURE},
    types::{CallArg, DeploymentStep, PostDeployCall, ProxySpec, RunFilter, StepStatus},
};
use deploy_core::{
    errors::DeployError,
    orchestrator::{first_failure, Orchestrator},
    registry::DeploymentRegistry,
};
use deploy_utils::{InMemoryArtifacts, MockChain};
use eyre::Result;

/// The owner used for constructor and initializer arguments
const OWNER: Address = address!("00000000000000000000000000000000000020aa");

/// The pinned address of the externally-managed v1 game deployment
const GAME_V1: Address = address!("b6bc3b49b3f6C4237851A6E1e918b40d843D8491");

/// An artifact source preloaded with the game stack
fn game_artifacts() -> InMemoryArtifacts {
    let artifacts = InMemoryArtifacts::new();
    artifacts.insert("Token2048", Bytes::from_static(b"token-bytecode-v1"));
    artifacts.insert("Game2048", Bytes::from_static(b"game-bytecode-v1"));
    artifacts.insert("RewardToken", Bytes::from_static(b"reward-bytecode-v1"));
    artifacts.insert(PROXY_ARTIFACT_NAME, Bytes::from_static(b"proxy-bytecode"));
    artifacts
}

/// The full game deployment manifest: a deterministic token, a proxied game
/// wired to it post-deploy, and a reward token hanging off a pinned address
fn game_steps() -> Vec<DeploymentStep> {
    vec![
        DeploymentStep::deploy("token2048", "Token2048")
            .constructor_args([CallArg::Address(OWNER)])
            .with_salt("0x2048"),
        DeploymentStep::deploy("game2048", "Game2048")
            .depends_on(["token2048"])
            .with_salt("0x2048")
            .with_proxy(ProxySpec {
                owner: CallArg::Address(OWNER),
                init_method: "initialize(address,address)".to_string(),
                init_args: vec![
                    CallArg::Address(OWNER),
                    CallArg::Dependency("token2048".to_string()),
                ],
            })
            .with_call(PostDeployCall::to_unit(
                "grant-minter",
                "token2048",
                "setMinter(address,bool)",
                vec![
                    CallArg::Dependency("game2048".to_string()),
                    CallArg::Bool(true),
                ],
            ))
            .with_call(PostDeployCall::to_self(
                "set-board-price",
                "setCreateBoardPrice(address,uint256)",
                vec![
                    CallArg::Address(Address::ZERO),
                    CallArg::Uint(U256::from(50_000_000_000_000u64)),
                ],
            )),
        DeploymentStep::external("game2048-v1", GAME_V1),
        DeploymentStep::deploy("reward-token", "RewardToken")
            .depends_on(["game2048-v1"])
            .constructor_args([CallArg::Dependency("game2048-v1".to_string())])
            .with_tag("RewardToken"),
    ]
}

/// The status of the step with the given id in a run report
fn status_of(results: &[deploy_common::types::ExecutionResult], id: &str) -> StepStatus {
    results.iter().find(|r| r.id == id).unwrap().status
}

/// The address of the step with the given id in a run report
fn address_of(results: &[deploy_common::types::ExecutionResult], id: &str) -> Address {
    results.iter().find(|r| r.id == id).unwrap().address.unwrap()
}

#[tokio::test]
async fn test_full_stack_deploys_in_order() -> Result<()> {
    let chain = MockChain::new();
    let artifacts = game_artifacts();
    let registry = DeploymentRegistry::in_memory("testnet");
    let orchestrator = Orchestrator::new(&chain, &artifacts, &registry);

    let results = orchestrator.run(&game_steps(), None).await?;

    assert_eq!(results.len(), 4);
    assert_eq!(status_of(&results, "token2048"), StepStatus::Deployed);
    assert_eq!(status_of(&results, "game2048"), StepStatus::Deployed);
    assert_eq!(status_of(&results, "game2048-v1"), StepStatus::Skipped);
    assert_eq!(status_of(&results, "reward-token"), StepStatus::Deployed);

    // The token lands before the game that depends on it
    let token_pos = results.iter().position(|r| r.id == "token2048").unwrap();
    let game_pos = results.iter().position(|r| r.id == "game2048").unwrap();
    assert!(token_pos < game_pos);

    // The pinned step resolves to its constant without touching the chain
    assert_eq!(address_of(&results, "game2048-v1"), GAME_V1);

    // Post-deploy wiring ran
    assert_eq!(chain.calls_matching("setMinter(address,bool)"), 1);
    assert_eq!(chain.calls_matching("setCreateBoardPrice(address,uint256)"), 1);

    // Registry holds the committed entries
    let game = registry.lookup("game2048").unwrap();
    assert!(game.proxy);
    assert!(game.initializer_invoked);
    assert!(game.implementation.is_some());
    assert!(game.admin.is_some());
    Ok(())
}

#[tokio::test]
async fn test_rerun_is_idempotent() -> Result<()> {
    let chain = MockChain::new();
    let artifacts = game_artifacts();
    let registry = DeploymentRegistry::in_memory("testnet");
    let orchestrator = Orchestrator::new(&chain, &artifacts, &registry);

    let first = orchestrator.run(&game_steps(), None).await?;
    let txs_after_first = chain.tx_count();

    let second = orchestrator.run(&game_steps(), None).await?;

    // The second run submits zero transactions
    assert_eq!(chain.tx_count(), txs_after_first);
    for result in &second {
        assert_eq!(result.status, StepStatus::Skipped, "step `{}`", result.id);
    }

    // Addresses are stable across runs
    for id in ["token2048", "game2048", "reward-token"] {
        assert_eq!(address_of(&first, id), address_of(&second, id));
    }
    Ok(())
}

#[tokio::test]
async fn test_changed_args_redeploy_exactly_that_unit() -> Result<()> {
    let chain = MockChain::new();
    let artifacts = InMemoryArtifacts::new();
    artifacts.insert("A", Bytes::from_static(b"a-bytecode"));
    artifacts.insert("B", Bytes::from_static(b"b-bytecode"));
    let registry = DeploymentRegistry::in_memory("testnet");
    let orchestrator = Orchestrator::new(&chain, &artifacts, &registry);

    let steps = |b_arg: u64| {
        vec![
            DeploymentStep::deploy("a", "A"),
            DeploymentStep::deploy("b", "B")
                .depends_on(["a"])
                .constructor_args([CallArg::Uint(U256::from(b_arg))]),
        ]
    };

    orchestrator.run(&steps(1), None).await?;
    let deploys_after_first = chain.deploy_count();

    let results = orchestrator.run(&steps(2), None).await?;

    assert_eq!(status_of(&results, "a"), StepStatus::Skipped);
    assert_eq!(status_of(&results, "b"), StepStatus::Deployed);
    assert_eq!(chain.deploy_count(), deploys_after_first + 1);
    Ok(())
}

#[tokio::test]
async fn test_dependency_redeploy_cascades_through_referencing_args() -> Result<()> {
    let chain = MockChain::new();
    let artifacts = InMemoryArtifacts::new();
    artifacts.insert("A", Bytes::from_static(b"a-bytecode-v1"));
    artifacts.insert("B", Bytes::from_static(b"b-bytecode"));
    let registry = DeploymentRegistry::in_memory("testnet");
    let orchestrator = Orchestrator::new(&chain, &artifacts, &registry);

    let steps = vec![
        DeploymentStep::deploy("a", "A").with_salt("0xaa"),
        DeploymentStep::deploy("b", "B")
            .depends_on(["a"])
            .constructor_args([CallArg::Dependency("a".to_string())]),
    ];

    let first = orchestrator.run(&steps, None).await?;

    // Rebuilding A moves its deterministic address, which flows into B's
    // resolved constructor arguments and forces B to follow
    artifacts.insert("A", Bytes::from_static(b"a-bytecode-v2"));
    let second = orchestrator.run(&steps, None).await?;

    assert_eq!(status_of(&second, "a"), StepStatus::Deployed);
    assert_eq!(status_of(&second, "b"), StepStatus::Deployed);
    assert_ne!(address_of(&first, "a"), address_of(&second, "a"));
    Ok(())
}

#[tokio::test]
async fn test_proxy_initializer_runs_exactly_once() -> Result<()> {
    let chain = MockChain::new();
    let artifacts = game_artifacts();
    let registry = DeploymentRegistry::in_memory("testnet");
    let orchestrator = Orchestrator::new(&chain, &artifacts, &registry);

    orchestrator.run(&game_steps(), None).await?;
    orchestrator.run(&game_steps(), None).await?;

    // Exactly one proxy (and therefore one initializer invocation, which
    // runs inside the proxy constructor) across both runs
    let proxy_deploys = chain
        .submitted()
        .iter()
        .filter(|tx| tx.is_deploy && tx.data.starts_with(b"proxy-bytecode"))
        .count();
    assert_eq!(proxy_deploys, 1);

    assert!(registry.lookup("game2048").unwrap().initializer_invoked);
    Ok(())
}

#[tokio::test]
async fn test_failed_step_blocks_only_its_dependents() -> Result<()> {
    let chain = MockChain::new();
    let artifacts = InMemoryArtifacts::new();
    artifacts.insert("A", Bytes::from_static(b"a-bytecode"));
    artifacts.insert("B", Bytes::from_static(b"b-bytecode"));
    artifacts.insert("C", Bytes::from_static(b"c-bytecode"));
    artifacts.insert("D", Bytes::from_static(b"d-bytecode"));
    let registry = DeploymentRegistry::in_memory("testnet");
    let orchestrator = Orchestrator::new(&chain, &artifacts, &registry);

    let steps = vec![
        DeploymentStep::deploy("a", "A"),
        DeploymentStep::deploy("b", "B").depends_on(["a"]),
        DeploymentStep::deploy("c", "C").depends_on(["b"]),
        DeploymentStep::deploy("d", "D"),
    ];

    chain.fail_deploys_of(Bytes::from_static(b"b-bytecode"));
    let results = orchestrator.run(&steps, None).await?;

    assert_eq!(status_of(&results, "a"), StepStatus::Deployed);
    assert_eq!(status_of(&results, "b"), StepStatus::Failed);
    assert_eq!(status_of(&results, "c"), StepStatus::Blocked);
    assert_eq!(status_of(&results, "d"), StepStatus::Deployed);

    assert_eq!(first_failure(&results).unwrap().id, "b");
    Ok(())
}

#[tokio::test]
async fn test_deterministic_address_survives_registry_loss() -> Result<()> {
    let step = || {
        vec![DeploymentStep::deploy("token2048", "Token2048")
            .constructor_args([CallArg::Address(OWNER)])
            .with_salt("0x2048")]
    };

    // Two fully independent worlds converge on the same address
    let chain_a = MockChain::new();
    let chain_b = MockChain::new();
    let artifacts = game_artifacts();
    let registry_a = DeploymentRegistry::in_memory("testnet");
    let registry_b = DeploymentRegistry::in_memory("testnet");

    let results_a = Orchestrator::new(&chain_a, &artifacts, &registry_a)
        .run(&step(), None)
        .await?;
    let results_b = Orchestrator::new(&chain_b, &artifacts, &registry_b)
        .run(&step(), None)
        .await?;
    assert_eq!(address_of(&results_a, "token2048"), address_of(&results_b, "token2048"));

    // A lost registry re-probes the deterministic address and adopts the
    // live contract instead of redeploying
    let fresh_registry = DeploymentRegistry::in_memory("testnet");
    let deploys_before = chain_a.deploy_count();
    let adopted = Orchestrator::new(&chain_a, &artifacts, &fresh_registry)
        .run(&step(), None)
        .await?;

    assert_eq!(status_of(&adopted, "token2048"), StepStatus::Skipped);
    assert_eq!(chain_a.deploy_count(), deploys_before);
    let entry = fresh_registry.lookup("token2048").unwrap();
    assert_eq!(entry.address, address_of(&results_a, "token2048"));
    assert_eq!(entry.tx_hash, None);
    Ok(())
}

#[tokio::test]
async fn test_failed_init_call_retries_without_redeploying() -> Result<()> {
    let chain = MockChain::new();
    let artifacts = InMemoryArtifacts::new();
    artifacts.insert("A", Bytes::from_static(b"a-bytecode"));
    let registry = DeploymentRegistry::in_memory("testnet");
    let orchestrator = Orchestrator::new(&chain, &artifacts, &registry);

    let steps = vec![DeploymentStep::deploy("a", "A").with_call(PostDeployCall::to_self(
        "set-price",
        "setPrice(uint256)",
        vec![CallArg::Uint(U256::from(5u64))],
    ))];

    chain.revert_calls_matching("setPrice(uint256)");
    let first = orchestrator.run(&steps, None).await?;

    // The deployment commits even though the wiring call failed
    assert_eq!(status_of(&first, "a"), StepStatus::Failed);
    assert_eq!(chain.deploy_count(), 1);
    let entry = registry.lookup("a").unwrap();
    assert!(entry.completed_calls.is_empty());

    chain.clear_failures();
    let second = orchestrator.run(&steps, None).await?;

    // The re-run retries only the call: no new deployment, one more call tx
    assert!(status_of(&second, "a").is_success());
    assert_eq!(chain.deploy_count(), 1);
    assert_eq!(chain.calls_matching("setPrice(uint256)"), 2);
    assert_eq!(registry.lookup("a").unwrap().completed_calls, ["set-price"]);
    Ok(())
}

#[tokio::test]
async fn test_changed_init_args_refused_once_initialized() -> Result<()> {
    let chain = MockChain::new();
    let artifacts = game_artifacts();
    let registry = DeploymentRegistry::in_memory("testnet");
    let orchestrator = Orchestrator::new(&chain, &artifacts, &registry);

    orchestrator.run(&game_steps(), None).await?;

    // Same stack, but the proxy step now asks for a different initializer
    // owner; applying it would require re-running the initializer
    let mut steps = game_steps();
    if let deploy_common::types::StepAction::Deploy(action) = &mut steps[1].action {
        action.proxy.as_mut().unwrap().init_args[0] =
            CallArg::Address(Address::repeat_byte(0x77));
    }

    let err = orchestrator.run(&steps, None).await.unwrap_err();
    assert!(matches!(err, DeployError::Reinitialization(id) if id == "game2048"));
    Ok(())
}

#[tokio::test]
async fn test_changed_implementation_upgrades_in_place() -> Result<()> {
    let chain = MockChain::new();
    let artifacts = game_artifacts();
    let registry = DeploymentRegistry::in_memory("testnet");
    let orchestrator = Orchestrator::new(&chain, &artifacts, &registry);

    let first = orchestrator.run(&game_steps(), None).await?;
    let before = registry.lookup("game2048").unwrap();

    artifacts.insert("Game2048", Bytes::from_static(b"game-bytecode-v2"));
    let second = orchestrator.run(&game_steps(), None).await?;

    assert_eq!(status_of(&second, "game2048"), StepStatus::Deployed);
    // Proxy and admin stay put; the implementation moves
    assert_eq!(address_of(&first, "game2048"), address_of(&second, "game2048"));
    let after = registry.lookup("game2048").unwrap();
    assert_eq!(after.address, before.address);
    assert_eq!(after.admin, before.admin);
    assert_ne!(after.implementation, before.implementation);
    assert!(after.initializer_invoked);

    // Exactly one upgrade call, and still exactly one proxy ever deployed
    assert_eq!(chain.calls_matching(UPGRADE_AND_CALL_SIGNATURE), 1);
    let proxy_deploys = chain
        .submitted()
        .iter()
        .filter(|tx| tx.is_deploy && tx.data.starts_with(b"proxy-bytecode"))
        .count();
    assert_eq!(proxy_deploys, 1);
    Ok(())
}

#[tokio::test]
async fn test_filter_resolves_excluded_dependencies_from_registry() -> Result<()> {
    let chain = MockChain::new();
    let artifacts = InMemoryArtifacts::new();
    artifacts.insert("A", Bytes::from_static(b"a-bytecode"));
    artifacts.insert("B", Bytes::from_static(b"b-bytecode"));
    let registry = DeploymentRegistry::in_memory("testnet");
    let orchestrator = Orchestrator::new(&chain, &artifacts, &registry);

    let steps = vec![
        DeploymentStep::deploy("a", "A"),
        DeploymentStep::deploy("b", "B")
            .depends_on(["a"])
            .constructor_args([CallArg::Dependency("a".to_string())])
            .with_tag("wiring"),
    ];

    let only_b = RunFilter { only: vec![], tags: vec!["wiring".to_string()] };

    // With nothing deployed yet, the excluded dependency cannot resolve
    let blocked = orchestrator.run(&steps, Some(&only_b)).await?;
    assert_eq!(blocked.len(), 1);
    assert_eq!(status_of(&blocked, "b"), StepStatus::Blocked);

    // Deploy everything, wipe B, then a filtered run resolves A from the
    // registry without executing it
    orchestrator.run(&steps, None).await?;
    let deploys = chain.deploy_count();

    let results = orchestrator.run(&steps, Some(&only_b)).await?;
    assert_eq!(results.len(), 1);
    assert!(status_of(&results, "b").is_success());
    assert_eq!(chain.deploy_count(), deploys);
    Ok(())
}
