use thiserror::Error;

/// The complete error vocabulary of the kernel and its policies. Every
/// variant is non-retryable within the operation that raised it — a caller
/// must repair the mismatched input and re-dispatch, never retry blindly.
#[derive(Debug, Error)]
pub enum LiqError {
    // ── Authorization ────────────────────────────────────────────────────────
    #[error("caller is not authorized for this operation")]
    NotAuthorized,

    #[error("delayed-finalization cell has not finalized yet")]
    Pending,

    #[error("lease has expired")]
    Expired,

    #[error("an unexpired lease already covers this (wallet, asset)")]
    AlreadyEncumbered,

    // ── Lookups ──────────────────────────────────────────────────────────────
    #[error("wallet not found")]
    WalletNotFound,

    #[error("payload does not classify to a known asset")]
    AssetUnknown,

    #[error("wallet has been requested for export; further writes refused")]
    Exported,

    // ── Host / foreign-chain interop ─────────────────────────────────────────
    #[error("header does not match the oracle, or proof does not match the expected transaction")]
    ProofMismatch,

    #[error("this deposit or proof has already been recorded")]
    AlreadySeen,

    // ── Ethereum-transaction sub-policy ──────────────────────────────────────
    #[error("insufficient balance: need {need}, have {have}")]
    InsufficientBalance { need: String, have: String },

    #[error("a commitment is required before this operation")]
    CommitmentRequired,

    #[error("commitment window has not yet elapsed")]
    CommitmentTooEarly,

    #[error("transaction nonce does not match the recorded tx count")]
    BadNonce,

    #[error("sub-policy is not the current leaseholder for this asset")]
    NotLeaseholder,

    #[error("caller is not the sub-policy that committed this transaction")]
    NotCommitter,

    // ── Key export ────────────────────────────────────────────────────────────
    #[error("counterparty failed to prove control of the counterpart key")]
    WrongExportTag,

    // ── Serialization / storage (ambient) ────────────────────────────────────
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("{0}")]
    Other(String),
}

impl From<bincode::Error> for LiqError {
    fn from(e: bincode::Error) -> Self {
        LiqError::Serialization(e.to_string())
    }
}

impl From<sled::Error> for LiqError {
    fn from(e: sled::Error) -> Self {
        LiqError::Storage(e.to_string())
    }
}
