//! liq-node — the Liquefaction demo/test host process.
//!
//! This binary plays the role the spec calls the "confidential host": it
//! opens the kernel's `sled` stores, wires a deterministic host-crypto
//! implementation and the block-hash oracle / proof verifier mocks, enrolls
//! the Ethereum sub-policy, and starts the JSON-RPC 2.0 server. There is no
//! P2P network, no genesis, no proof-of-work — the kernel dispatches one
//! operation at a time and this process supplies block height and timestamp
//! directly, per spec.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use liq_core::types::Principal;
use liq_crypto::{DeterministicHost, HostCrypto, ProductionHost};
use liq_host::mock::{MockBlockHashOracle, MockProofVerifier};
use liq_kernel::{PolicyRegistry, WalletDb, WalletRegistry};
use liq_policy_eth::{EthTxPolicy, PolicyDb};
use liq_rpc::server::RpcServerState;
use liq_rpc::RpcServer;

#[derive(Parser, Debug)]
#[command(
    name = "liq-node",
    version,
    about = "Liquefaction demo host — custodies secp256k1 keys behind encumbrance policies"
)]
struct Args {
    /// Directory for the persistent wallet-registry database.
    #[arg(long, default_value = "~/.liquefaction/wallets")]
    wallet_data_dir: PathBuf,

    /// Directory for the persistent Ethereum sub-policy database.
    #[arg(long, default_value = "~/.liquefaction/eth-policy")]
    eth_data_dir: PathBuf,

    /// JSON-RPC listen address.
    #[arg(long, default_value = "127.0.0.1:8645")]
    rpc_addr: SocketAddr,

    /// Use deterministic (seeded, non-cryptographic) key generation instead
    /// of the production host RNG. For local development and test fixtures
    /// only — never reproducible key material in production.
    #[arg(long)]
    deterministic_seed: Option<u64>,

    /// Principal this node's Ethereum sub-policy is registered under in the
    /// kernel's top-level policy table.
    #[arg(long, default_value = "0202020202020202020202020202020202020202")]
    eth_policy_principal: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,liq=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    info!("Liquefaction node starting");

    // ── Wallet registry ───────────────────────────────────────────────────────
    let wallet_dir = expand_tilde(&args.wallet_data_dir);
    std::fs::create_dir_all(&wallet_dir)
        .with_context(|| format!("creating wallet data dir {}", wallet_dir.display()))?;
    let wallet_db = WalletDb::open(&wallet_dir).context("opening wallet database")?;

    let host: Arc<dyn HostCrypto> = match args.deterministic_seed {
        Some(seed) => {
            tracing::warn!(seed, "using deterministic host crypto — do not use in production");
            Arc::new(DeterministicHost::new(seed))
        }
        None => Arc::new(ProductionHost),
    };

    let top_policies = Arc::new(PolicyRegistry::new());
    let registry = Arc::new(WalletRegistry::new(wallet_db, Arc::clone(&top_policies), host));

    // ── Ethereum sub-policy (component G) ────────────────────────────────────
    let eth_dir = expand_tilde(&args.eth_data_dir);
    std::fs::create_dir_all(&eth_dir)
        .with_context(|| format!("creating eth-policy data dir {}", eth_dir.display()))?;
    let eth_db = PolicyDb::open(&eth_dir).context("opening eth-policy database")?;

    let eth_principal_bytes = hex::decode(&args.eth_policy_principal)
        .context("parsing --eth-policy-principal as hex")?;
    let eth_principal = Principal(
        eth_principal_bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("--eth-policy-principal must be 20 bytes"))?,
    );

    let sub_policies = Arc::new(PolicyRegistry::new());
    let oracle = Arc::new(MockBlockHashOracle::new());
    let verifier = Arc::new(MockProofVerifier::new());

    let eth_policy = Arc::new(EthTxPolicy::new(
        eth_principal,
        eth_db,
        Arc::clone(&registry),
        sub_policies,
        oracle,
        verifier,
    ));
    top_policies.register(eth_principal, eth_policy.clone());

    // ── RPC server ────────────────────────────────────────────────────────────
    let rpc_state = Arc::new(RpcServerState {
        registry,
        eth_policy,
    });
    let rpc_handle = RpcServer::new(rpc_state)
        .start(args.rpc_addr)
        .await
        .context("starting RPC server")?;

    info!(addr = %args.rpc_addr, "node ready");
    rpc_handle.stopped().await;
    Ok(())
}

/// Expand a leading `~` to the user's home directory (`HOME` or `USERPROFILE`).
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}
