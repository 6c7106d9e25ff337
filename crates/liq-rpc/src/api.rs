use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;

use crate::types::{
    RpcAccountRef, RpcCommitToDeposit, RpcCommitToTransaction, RpcDepositFunds,
    RpcDepositLocalFunds, RpcEnterEncumbrance, RpcEnvelope, RpcEthEnterSubLease,
    RpcEthTransaction, RpcFinalizeLocalFunds, RpcProveTransactionInclusion,
    RpcRegisterEthPolicy, RpcReimbursement, RpcReleaseCommitmentRequirement, RpcRequestKeyExport,
    RpcSignMessage, RpcSignTransaction, RpcSignTypedData, RpcSignature,
    RpcTransferOwnership, RpcVersionInfo, RpcWallet,
};

/// Liquefaction JSON-RPC 2.0 API definition.
///
/// All method names are prefixed with "liq_" via `namespace = "liq"`. Every
/// operation takes the caller principal as an explicit parameter and, where
/// the kernel needs them, `current_block`/`now` as explicit trailing
/// parameters — the kernel has no notion of wall-clock time or chain height
/// of its own; the dispatcher (this RPC host) supplies both per call.
#[rpc(server, namespace = "liq")]
pub trait LiqApi {
    /// Create a wallet for `(caller, accountIndex)` if one doesn't already
    /// exist. Returns `true` if a wallet was actually created.
    #[method(name = "createWallet")]
    async fn create_wallet(&self, params: RpcAccountRef, current_block: u64) -> RpcResult<bool>;

    /// Full wallet summary (wallet id + address) for `(caller, accountIndex)`.
    #[method(name = "getWallet")]
    async fn get_wallet(&self, params: RpcAccountRef, current_block: u64) -> RpcResult<RpcWallet>;

    /// Every `(accountIndex, creationBlock)` pair this principal has ever
    /// owned a wallet under.
    #[method(name = "getAttendedWallets")]
    async fn get_attended_wallets(&self, caller: String) -> RpcResult<Vec<(String, u64)>>;

    #[method(name = "transferOwnership")]
    async fn transfer_ownership(
        &self,
        params: RpcTransferOwnership,
        current_block: u64,
    ) -> RpcResult<String>;

    #[method(name = "enterEncumbrance")]
    async fn enter_encumbrance(
        &self,
        params: RpcEnterEncumbrance,
        current_block: u64,
        now: i64,
    ) -> RpcResult<()>;

    #[method(name = "signMessage")]
    async fn sign_message(
        &self,
        params: RpcSignMessage,
        current_block: u64,
        now: i64,
    ) -> RpcResult<RpcSignature>;

    #[method(name = "signTypedData")]
    async fn sign_typed_data(
        &self,
        params: RpcSignTypedData,
        current_block: u64,
        now: i64,
    ) -> RpcResult<RpcSignature>;

    #[method(name = "requestKeyExport")]
    async fn request_key_export(
        &self,
        params: RpcRequestKeyExport,
        current_block: u64,
        now: i64,
    ) -> RpcResult<()>;

    #[method(name = "exportKey")]
    async fn export_key(&self, params: RpcAccountRef, current_block: u64) -> RpcResult<RpcEnvelope>;

    #[method(name = "destroyExportedKey")]
    async fn destroy_exported_key(&self, params: RpcAccountRef, current_block: u64) -> RpcResult<()>;

    // ── Ethereum-transaction sub-policy (component G) ───────────────────────

    /// Enroll the Ethereum sub-policy under the wallet registry, leasing it
    /// the `0x02` asset. This is `liq_enterEncumbrance` with `policy` fixed
    /// to the sub-policy's own principal, exposed separately since the
    /// dispatcher, not a caller, knows that principal.
    #[method(name = "ethRegisterPolicy")]
    async fn eth_register_policy(
        &self,
        params: RpcRegisterEthPolicy,
        current_block: u64,
        now: i64,
    ) -> RpcResult<()>;

    #[method(name = "ethEnterSubLease")]
    async fn eth_enter_sub_lease(&self, params: RpcEthEnterSubLease, now: i64) -> RpcResult<()>;

    #[method(name = "ethCommitToDeposit")]
    async fn eth_commit_to_deposit(&self, params: RpcCommitToDeposit, now: i64) -> RpcResult<()>;

    #[method(name = "ethDepositFunds")]
    async fn eth_deposit_funds(&self, params: RpcDepositFunds) -> RpcResult<()>;

    #[method(name = "ethDepositLocalFunds")]
    async fn eth_deposit_local_funds(
        &self,
        params: RpcDepositLocalFunds,
        current_block: u64,
    ) -> RpcResult<()>;

    #[method(name = "ethFinalizeLocalFunds")]
    async fn eth_finalize_local_funds(
        &self,
        params: RpcFinalizeLocalFunds,
        current_block: u64,
    ) -> RpcResult<()>;

    #[method(name = "ethCommitToTransaction")]
    async fn eth_commit_to_transaction(
        &self,
        params: RpcCommitToTransaction,
        current_block: u64,
    ) -> RpcResult<RpcEthTransaction>;

    #[method(name = "ethSignTransaction")]
    async fn eth_sign_transaction(
        &self,
        params: RpcSignTransaction,
        current_block: u64,
        now: i64,
    ) -> RpcResult<RpcSignature>;

    #[method(name = "ethProveTransactionInclusion")]
    async fn eth_prove_transaction_inclusion(
        &self,
        params: RpcProveTransactionInclusion,
    ) -> RpcResult<RpcReimbursement>;

    #[method(name = "ethReleaseCommitmentRequirement")]
    async fn eth_release_commitment_requirement(
        &self,
        params: RpcReleaseCommitmentRequirement,
    ) -> RpcResult<()>;

    // ── Misc ──────────────────────────────────────────────────────────────────

    /// Return node and protocol version information.
    #[method(name = "getVersion")]
    async fn get_version(&self) -> RpcResult<RpcVersionInfo>;
}
