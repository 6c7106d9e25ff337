//! liq-kernel
//!
//! The TEE-resident wallet registry: delayed-finalization cells, the asset
//! classifier, the policy SPI, and the `WalletRegistry` state machine that
//! ties them together. No networking, no persistence format beyond `sled` —
//! callers (liq-rpc, liq-policy-eth) depend on this crate, never the reverse.

pub mod asset;
pub mod cell;
pub mod db;
pub mod policy;
pub mod registry;
pub mod wallet;

pub use asset::{classify, classify_eip712};
pub use cell::DelayedCell;
pub use db::{Lease, WalletDb};
pub use policy::{Policy, PolicyRegistry};
pub use registry::WalletRegistry;
pub use wallet::{OwnerKey, Wallet};
