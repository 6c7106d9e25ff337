//! liq-policy-eth
//!
//! The Ethereum-transaction sub-policy (component G): itself a
//! [`liq_kernel::Policy`] leased the `0x02` asset by the wallet registry, it
//! sub-leases signing rights for individual `(chainId, destination)` pairs
//! to downstream sub-policies, tracks their ETH and local-collateral
//! ledgers, enforces nonce discipline, and reimburses inclusion-proof
//! submitters. Depends on `liq-kernel` for the registry it signs through and
//! `liq-host` for the oracle/proof-verifier traits it checks foreign-chain
//! claims against.

pub mod db;
pub mod policy;
pub mod types;

pub use db::{PendingBalance, PolicyDb, SubLease};
pub use policy::EthTxPolicy;
pub use types::{dest_asset_tag, EthTransaction, SignedEthTransaction};
