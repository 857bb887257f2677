//! Mafia Coordinator Server
//!
//! Wires the JSON-RPC chain reader, in-memory store, snarkjs prover and
//! EIP-191 verifier into the WebSocket server.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mafia_coordinator::{
    auth::Eip191Verifier,
    chain::{RpcChain, RpcConfig},
    core::SystemClock,
    network::{CoordinatorServer, ServerConfig},
    proof::{SnarkjsBackend, SnarkjsConfig},
    store::MemoryStore,
    Coordinator, CoordinatorConfig, VERSION,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let default_level = if cfg!(feature = "debug-tracing") { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    info!("Mafia Coordinator v{}", VERSION);

    let rpc_config = RpcConfig::from_env().context("invalid GAME_CONTRACT_ADDRESS")?;
    let server_config = ServerConfig::from_env()?;
    let coordinator_config = CoordinatorConfig::from_env();
    let snarkjs_config = SnarkjsConfig::from_env();

    info!("Chain RPC: {} (contract {})", rpc_config.url, rpc_config.contract);
    info!(
        "Speaker time {}s, proof timeout {:?}, log lookback {} blocks",
        coordinator_config.timing.speaker_ms / 1000,
        coordinator_config.proof_timeout,
        coordinator_config.log_search.max_lookback
    );
    info!("Using in-memory store: state is lost on restart and not shared between instances");

    let clock = Arc::new(SystemClock);
    let coordinator = Coordinator::new(
        Arc::new(RpcChain::new(rpc_config)),
        Arc::new(MemoryStore::with_clock(clock.clone())),
        Arc::new(SnarkjsBackend::new(snarkjs_config)),
        Arc::new(Eip191Verifier),
        clock,
        coordinator_config,
    );

    let server = Arc::new(CoordinatorServer::new(server_config, Arc::new(coordinator)));

    let signal_server = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
            signal_server.shutdown();
        }
    });

    server.run().await?;
    info!("Coordinator stopped");
    Ok(())
}
