use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use alloy_primitives::{Address as EthAddress, U256};
use jsonrpsee::core::{async_trait, RpcResult};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObject;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use liq_core::error::LiqError;
use liq_core::types::{AccountIndex, Address, AssetTag, DerSignature, Hash32, Principal};
use liq_host::{ForeignHeader, TxInclusionProof};
use liq_kernel::WalletRegistry;
use liq_policy_eth::{EthTransaction, EthTxPolicy, SignedEthTransaction};

use crate::api::LiqApiServer;
use crate::types::{
    RpcAccountRef, RpcCommitToDeposit, RpcCommitToTransaction, RpcDepositFunds,
    RpcDepositLocalFunds, RpcEnterEncumbrance, RpcEnvelope, RpcEthEnterSubLease,
    RpcEthTransaction, RpcFinalizeLocalFunds, RpcForeignHeader, RpcProveTransactionInclusion,
    RpcRegisterEthPolicy, RpcReimbursement, RpcReleaseCommitmentRequirement, RpcRequestKeyExport,
    RpcSignMessage, RpcSignTransaction, RpcSignTypedData, RpcSignature, RpcSignedEthTransaction,
    RpcTransferOwnership, RpcTxInclusionProof, RpcVersionInfo, RpcWallet,
};

fn liq_err(e: LiqError) -> ErrorObject<'static> {
    let code = match &e {
        LiqError::NotAuthorized | LiqError::NotLeaseholder | LiqError::NotCommitter => -32001,
        LiqError::Pending | LiqError::CommitmentTooEarly => -32002,
        LiqError::Expired | LiqError::AlreadyEncumbered | LiqError::AlreadySeen => -32003,
        LiqError::WalletNotFound | LiqError::AssetUnknown => -32004,
        LiqError::Serialization(_) | LiqError::Storage(_) => -32603,
        _ => -32000,
    };
    ErrorObject::owned(code, e.to_string(), None::<()>)
}

fn bad_params(msg: impl Into<String>) -> ErrorObject<'static> {
    ErrorObject::owned(-32602, msg.into(), None::<()>)
}

fn decode_hex(field: &str, s: &str) -> RpcResult<Vec<u8>> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(s)
        .map_err(|e| bad_params(format!("invalid hex for {field}: {e}")).into())
}

fn parse_principal(s: &str) -> RpcResult<Principal> {
    let bytes = decode_hex("principal", s)?;
    let arr: [u8; 20] = bytes
        .try_into()
        .map_err(|_| bad_params("principal must be 20 bytes"))?;
    Ok(Principal(arr))
}

fn parse_address(s: &str) -> RpcResult<Address> {
    let bytes = decode_hex("address", s)?;
    let arr: [u8; 20] = bytes
        .try_into()
        .map_err(|_| bad_params("address must be 20 bytes"))?;
    Ok(Address(arr))
}

fn parse_account_index(s: &str) -> RpcResult<AccountIndex> {
    let bytes = decode_hex("account_index", s)?;
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| bad_params("account_index must be 32 bytes"))?;
    Ok(AccountIndex(arr))
}

fn parse_asset_tag(s: &str) -> RpcResult<AssetTag> {
    let bytes = decode_hex("asset", s)?;
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| bad_params("asset tag must be 32 bytes"))?;
    Ok(AssetTag(arr))
}

fn parse_eth_address(s: &str) -> RpcResult<EthAddress> {
    let bytes = decode_hex("eth address", s)?;
    if bytes.len() != 20 {
        return Err(bad_params("eth address must be 20 bytes").into());
    }
    Ok(EthAddress::from_slice(&bytes))
}

fn parse_u256(s: &str) -> RpcResult<U256> {
    U256::from_str(s).map_err(|e| bad_params(format!("invalid u256: {e}")).into())
}

fn parse_hash32(s: &str) -> RpcResult<Hash32> {
    Hash32::from_hex(s).map_err(|e| bad_params(format!("invalid hash: {e}")).into())
}

fn parse_der_signature(s: &str) -> RpcResult<DerSignature> {
    Ok(DerSignature(decode_hex("signature", s)?))
}

fn eth_tx_from_rpc(tx: &RpcEthTransaction) -> RpcResult<EthTransaction> {
    Ok(EthTransaction {
        chain_id: tx.chain_id,
        nonce: tx.nonce,
        max_fee_per_gas: parse_u256(&tx.max_fee_per_gas)?,
        gas_limit: tx.gas_limit,
        to: parse_eth_address(&tx.to)?,
        value: parse_u256(&tx.value)?,
        payload: decode_hex("payload", &tx.payload)?,
    })
}

fn eth_tx_to_rpc(tx: &EthTransaction) -> RpcEthTransaction {
    RpcEthTransaction {
        chain_id: tx.chain_id,
        nonce: tx.nonce,
        max_fee_per_gas: tx.max_fee_per_gas.to_string(),
        gas_limit: tx.gas_limit,
        to: hex::encode(tx.to.as_slice()),
        value: tx.value.to_string(),
        payload: hex::encode(&tx.payload),
    }
}

fn signed_eth_tx_from_rpc(signed: &RpcSignedEthTransaction) -> RpcResult<SignedEthTransaction> {
    Ok(SignedEthTransaction {
        tx: eth_tx_from_rpc(&signed.tx)?,
        signature: parse_der_signature(&signed.signature)?,
        signer: parse_address(&signed.signer)?,
    })
}

fn foreign_header_from_rpc(h: &RpcForeignHeader) -> RpcResult<ForeignHeader> {
    Ok(ForeignHeader {
        chain_id: h.chain_id,
        block_number: h.block_number,
        timestamp: h.timestamp,
        hash: parse_hash32(&h.hash)?,
        transactions_root: parse_hash32(&h.transactions_root)?,
        state_root: parse_hash32(&h.state_root)?,
    })
}

fn tx_inclusion_proof_from_rpc(p: &RpcTxInclusionProof) -> RpcResult<TxInclusionProof> {
    Ok(TxInclusionProof {
        transaction_index: p.transaction_index,
        included_tx_rlp: decode_hex("included_tx_rlp", &p.included_tx_rlp)?,
    })
}

/// Shared state passed to the RPC server.
pub struct RpcServerState {
    pub registry: Arc<WalletRegistry>,
    pub eth_policy: Arc<EthTxPolicy>,
}

/// The RPC server implementation.
pub struct RpcServer {
    state: Arc<RpcServerState>,
}

impl RpcServer {
    pub fn new(state: Arc<RpcServerState>) -> Self {
        Self { state }
    }

    /// Start the JSON-RPC server on `addr` with permissive CORS headers. Returns a handle to stop it.
    pub async fn start(self, addr: SocketAddr) -> anyhow::Result<ServerHandle> {
        let cors = CorsLayer::new()
            .allow_methods(Any)
            .allow_origin(Any)
            .allow_headers(Any);

        let server = Server::builder()
            .set_http_middleware(tower::ServiceBuilder::new().layer(cors))
            .build(addr)
            .await?;

        let module = self.into_rpc();
        let handle = server.start(module);
        info!(%addr, "RPC server started");
        Ok(handle)
    }
}

#[async_trait]
impl LiqApiServer for RpcServer {
    async fn create_wallet(&self, params: RpcAccountRef, current_block: u64) -> RpcResult<bool> {
        let caller = parse_principal(&params.caller)?;
        let account_index = parse_account_index(&params.account_index)?;
        self.state
            .registry
            .create_wallet(caller, account_index, current_block)
            .map_err(|e| liq_err(e).into())
    }

    async fn get_wallet(&self, params: RpcAccountRef, current_block: u64) -> RpcResult<RpcWallet> {
        let caller = parse_principal(&params.caller)?;
        let account_index = parse_account_index(&params.account_index)?;
        let wallet_id = self
            .state
            .registry
            .get_public_key(caller, account_index, current_block)
            .map_err(liq_err)?;
        let address = self
            .state
            .registry
            .get_address(caller, account_index, current_block)
            .map_err(liq_err)?;
        Ok(RpcWallet {
            wallet_id: wallet_id.to_hex(),
            address: address.to_hex(),
            account_index: params.account_index,
        })
    }

    async fn get_attended_wallets(&self, caller: String) -> RpcResult<Vec<(String, u64)>> {
        let caller = parse_principal(&caller)?;
        let attended = self.state.registry.attended_wallets(&caller).map_err(liq_err)?;
        Ok(attended
            .into_iter()
            .map(|(idx, block)| (idx.to_hex(), block))
            .collect())
    }

    async fn transfer_ownership(
        &self,
        params: RpcTransferOwnership,
        current_block: u64,
    ) -> RpcResult<String> {
        let caller = parse_principal(&params.caller)?;
        let account_index = parse_account_index(&params.account_index)?;
        let new_owner = parse_principal(&params.new_owner)?;
        let new_index = self
            .state
            .registry
            .transfer_ownership(caller, account_index, new_owner, current_block)
            .map_err(liq_err)?;
        Ok(new_index.to_hex())
    }

    async fn enter_encumbrance(
        &self,
        params: RpcEnterEncumbrance,
        current_block: u64,
        now: i64,
    ) -> RpcResult<()> {
        let caller = parse_principal(&params.caller)?;
        let account_index = parse_account_index(&params.account_index)?;
        let policy = parse_principal(&params.policy)?;
        let assets = params
            .assets
            .iter()
            .map(|a| parse_asset_tag(a))
            .collect::<RpcResult<Vec<_>>>()?;
        let data = decode_hex("data", &params.data)?;
        self.state
            .registry
            .enter_encumbrance(caller, account_index, &assets, policy, params.expiry, &data, current_block, now)
            .map_err(|e| liq_err(e).into())
    }

    async fn sign_message(
        &self,
        params: RpcSignMessage,
        current_block: u64,
        now: i64,
    ) -> RpcResult<RpcSignature> {
        let caller = parse_principal(&params.caller)?;
        let account = parse_address(&params.account)?;
        let payload = decode_hex("payload", &params.payload)?;
        let sig = self
            .state
            .registry
            .sign_message(caller, account, &payload, current_block, now)
            .map_err(liq_err)?;
        Ok(RpcSignature { der_signature: hex::encode(sig.0) })
    }

    async fn sign_typed_data(
        &self,
        params: RpcSignTypedData,
        current_block: u64,
        now: i64,
    ) -> RpcResult<RpcSignature> {
        let caller = parse_principal(&params.caller)?;
        let account = parse_address(&params.account)?;
        let encoded_data = decode_hex("encoded_data", &params.encoded_data)?;
        let sig = self
            .state
            .registry
            .sign_typed_data(
                caller,
                account,
                &params.domain_name,
                &params.type_string,
                &encoded_data,
                current_block,
                now,
            )
            .map_err(liq_err)?;
        Ok(RpcSignature { der_signature: hex::encode(sig.0) })
    }

    async fn request_key_export(
        &self,
        params: RpcRequestKeyExport,
        current_block: u64,
        now: i64,
    ) -> RpcResult<()> {
        let caller = parse_principal(&params.caller)?;
        let account_index = parse_account_index(&params.account_index)?;
        let counterparty_pubkey: [u8; 32] = decode_hex("counterparty_pubkey", &params.counterparty_pubkey)?
            .try_into()
            .map_err(|_| bad_params("counterparty_pubkey must be 32 bytes"))?;
        let proof_ciphertext = decode_hex("proof_ciphertext", &params.proof_ciphertext)?;
        let proof_nonce: [u8; 24] = decode_hex("proof_nonce", &params.proof_nonce)?
            .try_into()
            .map_err(|_| bad_params("proof_nonce must be 24 bytes"))?;
        self.state
            .registry
            .request_key_export(
                caller,
                account_index,
                counterparty_pubkey,
                proof_ciphertext,
                proof_nonce,
                current_block,
                now,
            )
            .map_err(|e| liq_err(e).into())
    }

    async fn export_key(&self, params: RpcAccountRef, current_block: u64) -> RpcResult<RpcEnvelope> {
        let caller = parse_principal(&params.caller)?;
        let account_index = parse_account_index(&params.account_index)?;
        let envelope = self
            .state
            .registry
            .export_key(caller, account_index, current_block)
            .map_err(liq_err)?;
        Ok(RpcEnvelope {
            sender_pubkey: hex::encode(envelope.sender_pubkey),
            nonce: hex::encode(envelope.nonce),
            ciphertext: hex::encode(envelope.ciphertext),
        })
    }

    async fn destroy_exported_key(&self, params: RpcAccountRef, current_block: u64) -> RpcResult<()> {
        let caller = parse_principal(&params.caller)?;
        let account_index = parse_account_index(&params.account_index)?;
        self.state
            .registry
            .destroy_exported_key(caller, account_index, current_block)
            .map_err(|e| liq_err(e).into())
    }

    // ── Ethereum-transaction sub-policy ──────────────────────────────────────

    async fn eth_register_policy(
        &self,
        params: RpcRegisterEthPolicy,
        current_block: u64,
        now: i64,
    ) -> RpcResult<()> {
        let caller = parse_principal(&params.caller)?;
        let account_index = parse_account_index(&params.account_index)?;
        self.state
            .registry
            .enter_encumbrance(
                caller,
                account_index,
                &[liq_core::types::AssetTag::ETH_TRANSACTION],
                self.state.eth_policy.principal(),
                params.expiry,
                b"",
                current_block,
                now,
            )
            .map_err(|e| liq_err(e).into())
    }

    async fn eth_enter_sub_lease(&self, params: RpcEthEnterSubLease, now: i64) -> RpcResult<()> {
        let caller = parse_principal(&params.caller)?;
        let account = parse_address(&params.account)?;
        let sub_policy = parse_principal(&params.sub_policy)?;
        let destinations = params
            .destinations
            .iter()
            .map(|d| Ok((d.chain_id, parse_eth_address(&d.to)?)))
            .collect::<RpcResult<Vec<_>>>()?;
        let data = decode_hex("data", &params.data)?;
        self.state
            .eth_policy
            .enter_sub_lease(
                caller,
                account,
                &destinations,
                sub_policy,
                params.expiry,
                params.sig_commitments_required,
                params.uses_deposit_control,
                now,
                &data,
            )
            .map_err(|e| liq_err(e).into())
    }

    async fn eth_commit_to_deposit(&self, params: RpcCommitToDeposit, now: i64) -> RpcResult<()> {
        let caller = parse_principal(&params.caller)?;
        let hash = parse_hash32(&params.signed_tx_hash)?;
        self.state
            .eth_policy
            .commit_to_deposit(caller, hash, now)
            .map_err(|e| liq_err(e).into())
    }

    async fn eth_deposit_funds(&self, params: RpcDepositFunds) -> RpcResult<()> {
        let caller = parse_principal(&params.caller)?;
        let signed_tx = signed_eth_tx_from_rpc(&params.signed_tx)?;
        let header = foreign_header_from_rpc(&params.header)?;
        let proof = tx_inclusion_proof_from_rpc(&params.proof)?;
        self.state
            .eth_policy
            .deposit_funds(caller, &signed_tx, &header, &proof)
            .map_err(|e| liq_err(e).into())
    }

    async fn eth_deposit_local_funds(
        &self,
        params: RpcDepositLocalFunds,
        current_block: u64,
    ) -> RpcResult<()> {
        let caller = parse_principal(&params.caller)?;
        let account = parse_address(&params.account)?;
        let amount = parse_u256(&params.amount)?;
        self.state
            .eth_policy
            .deposit_local_funds(caller, account, params.chain_id, amount, current_block)
            .map_err(|e| liq_err(e).into())
    }

    async fn eth_finalize_local_funds(
        &self,
        params: RpcFinalizeLocalFunds,
        current_block: u64,
    ) -> RpcResult<()> {
        let caller = parse_principal(&params.caller)?;
        let account = parse_address(&params.account)?;
        self.state
            .eth_policy
            .finalize_local_funds(caller, account, params.chain_id, current_block)
            .map_err(|e| liq_err(e).into())
    }

    async fn eth_commit_to_transaction(
        &self,
        params: RpcCommitToTransaction,
        current_block: u64,
    ) -> RpcResult<RpcEthTransaction> {
        let caller = parse_principal(&params.caller)?;
        let account = parse_address(&params.account)?;
        let tx = eth_tx_from_rpc(&params.tx)?;
        let committed = self
            .state
            .eth_policy
            .commit_to_transaction(caller, account, tx, current_block)
            .map_err(liq_err)?;
        Ok(eth_tx_to_rpc(&committed))
    }

    async fn eth_sign_transaction(
        &self,
        params: RpcSignTransaction,
        current_block: u64,
        now: i64,
    ) -> RpcResult<RpcSignature> {
        let caller = parse_principal(&params.caller)?;
        let account = parse_address(&params.account)?;
        let tx = eth_tx_from_rpc(&params.tx)?;
        let sig = self
            .state
            .eth_policy
            .sign_transaction(caller, account, &tx, current_block, now)
            .map_err(liq_err)?;
        Ok(RpcSignature { der_signature: hex::encode(sig.0) })
    }

    async fn eth_prove_transaction_inclusion(
        &self,
        params: RpcProveTransactionInclusion,
    ) -> RpcResult<RpcReimbursement> {
        let signed_tx = signed_eth_tx_from_rpc(&params.signed_tx)?;
        let header = foreign_header_from_rpc(&params.header)?;
        let proof = tx_inclusion_proof_from_rpc(&params.proof)?;
        let amount = self
            .state
            .eth_policy
            .prove_transaction_inclusion(&signed_tx, &header, &proof)
            .map_err(liq_err)?;
        Ok(RpcReimbursement { amount: amount.to_string() })
    }

    async fn eth_release_commitment_requirement(
        &self,
        params: RpcReleaseCommitmentRequirement,
    ) -> RpcResult<()> {
        let caller = parse_principal(&params.caller)?;
        let account = parse_address(&params.account)?;
        let to = parse_eth_address(&params.to)?;
        self.state
            .eth_policy
            .release_commitment_requirement(caller, account, params.chain_id, to)
            .map_err(|e| liq_err(e).into())
    }

    // ── Misc ──────────────────────────────────────────────────────────────────

    async fn get_version(&self) -> RpcResult<RpcVersionInfo> {
        Ok(RpcVersionInfo {
            node_version: env!("CARGO_PKG_VERSION").to_string(),
            protocol_version: "1".to_string(),
        })
    }
}
