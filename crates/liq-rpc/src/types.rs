use serde::{Deserialize, Serialize};

/// JSON-serializable wallet summary returned by `liq_getWallet`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcWallet {
    pub wallet_id: String,
    pub address: String,
    pub account_index: String,
}

/// Parameters for `liq_createWallet` / `liq_getAddress` / `liq_getPublicKey`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcAccountRef {
    /// Base-16 (no `0x` required) 20-byte caller principal.
    pub caller: String,
    /// Base-16 32-byte account index.
    pub account_index: String,
}

/// Parameters for `liq_transferOwnership`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcTransferOwnership {
    pub caller: String,
    pub account_index: String,
    pub new_owner: String,
}

/// Parameters for `liq_enterEncumbrance`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcEnterEncumbrance {
    pub caller: String,
    pub account_index: String,
    /// Hex-encoded 32-byte asset tags.
    pub assets: Vec<String>,
    pub policy: String,
    pub expiry: i64,
    /// Hex-encoded opaque enrollment data passed through to the policy.
    pub data: String,
}

/// Parameters for `liq_signMessage`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcSignMessage {
    pub caller: String,
    pub account: String,
    /// Hex-encoded raw payload to classify and sign.
    pub payload: String,
}

/// Parameters for `liq_signTypedData`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcSignTypedData {
    pub caller: String,
    pub account: String,
    pub domain_name: String,
    pub type_string: String,
    /// Hex-encoded ABI-encoded struct fields.
    pub encoded_data: String,
}

/// A DER signature, hex-encoded, as returned by every signing method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcSignature {
    pub der_signature: String,
}

/// Parameters for `liq_requestKeyExport`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequestKeyExport {
    pub caller: String,
    pub account_index: String,
    /// Hex-encoded 32-byte X25519 public key of the requesting counterparty.
    pub counterparty_pubkey: String,
    /// Hex-encoded envelope ciphertext proving control of the counterparty key.
    pub proof_ciphertext: String,
    /// Hex-encoded 24-byte XChaCha20-Poly1305 nonce.
    pub proof_nonce: String,
}

/// A sealed key-export envelope, hex-encoded field by field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcEnvelope {
    pub sender_pubkey: String,
    pub nonce: String,
    pub ciphertext: String,
}

// ── Ethereum sub-policy (component G) ─────────────────────────────────────────

/// Enroll the Ethereum sub-policy under a wallet's `0x02` asset lease.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRegisterEthPolicy {
    pub caller: String,
    pub account_index: String,
    pub expiry: i64,
}


/// One `(chainId, destination)` pair to sub-lease, as accepted by
/// `liq_ethEnterSubLease`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcEthDestination {
    pub chain_id: u64,
    /// Hex-encoded 20-byte Ethereum destination address.
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcEthEnterSubLease {
    pub caller: String,
    pub account: String,
    pub destinations: Vec<RpcEthDestination>,
    pub sub_policy: String,
    pub expiry: i64,
    pub sig_commitments_required: bool,
    pub uses_deposit_control: bool,
    pub data: String,
}

/// Wire form of [`liq_policy_eth::EthTransaction`], numbers carried as decimal
/// strings since `U256` does not round-trip through plain JSON numbers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcEthTransaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub max_fee_per_gas: String,
    pub gas_limit: u64,
    pub to: String,
    pub value: String,
    /// Hex-encoded calldata.
    pub payload: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcSignedEthTransaction {
    pub tx: RpcEthTransaction,
    /// Hex-encoded DER signature.
    pub signature: String,
    /// Hex-encoded 20-byte address of the claimed signer.
    pub signer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcForeignHeader {
    pub chain_id: u64,
    pub block_number: u64,
    pub timestamp: i64,
    pub hash: String,
    pub transactions_root: String,
    pub state_root: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcTxInclusionProof {
    pub transaction_index: u64,
    /// Hex-encoded RLP of the transaction the proof claims is included.
    pub included_tx_rlp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcCommitToDeposit {
    pub caller: String,
    /// Hex-encoded 32-byte hash of the signed transaction.
    pub signed_tx_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcDepositFunds {
    pub caller: String,
    pub signed_tx: RpcSignedEthTransaction,
    pub header: RpcForeignHeader,
    pub proof: RpcTxInclusionProof,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcDepositLocalFunds {
    pub caller: String,
    pub account: String,
    pub chain_id: u64,
    pub amount: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcFinalizeLocalFunds {
    pub caller: String,
    pub account: String,
    pub chain_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcCommitToTransaction {
    pub caller: String,
    pub account: String,
    pub tx: RpcEthTransaction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcSignTransaction {
    pub caller: String,
    pub account: String,
    pub tx: RpcEthTransaction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcProveTransactionInclusion {
    pub signed_tx: RpcSignedEthTransaction,
    pub header: RpcForeignHeader,
    pub proof: RpcTxInclusionProof,
}

/// Reimbursement owed to whoever submitted the inclusion proof, decimal
/// `U256` as a string — paying it out is the caller's responsibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcReimbursement {
    pub amount: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcReleaseCommitmentRequirement {
    pub caller: String,
    pub account: String,
    pub chain_id: u64,
    pub to: String,
}

/// Node / protocol version information returned by `liq_getVersion`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcVersionInfo {
    pub node_version: String,
    pub protocol_version: String,
}
