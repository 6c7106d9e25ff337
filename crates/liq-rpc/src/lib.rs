//! liq-rpc
//!
//! JSON-RPC 2.0 server exposing the kernel (`liq-kernel`) and the Ethereum
//! sub-policy (`liq-policy-eth`) to whatever process plays "confidential
//! host" in a test or demo deployment. The kernel itself has no notion of
//! network identity; every method here threads the caller principal (and,
//! where needed, `current_block`/`now`) through as an explicit parameter.
//!
//! Namespace: "liq"
//! Methods (selected):
//!   liq_createWallet, liq_getWallet, liq_transferOwnership
//!   liq_enterEncumbrance, liq_signMessage, liq_signTypedData
//!   liq_requestKeyExport, liq_exportKey, liq_destroyExportedKey
//!   liq_ethRegisterPolicy, liq_ethEnterSubLease, liq_ethSignTransaction, …

pub mod api;
pub mod server;
pub mod types;

pub use server::{RpcServer, RpcServerState};
pub use types::{RpcSignature, RpcVersionInfo, RpcWallet};
