//! `EthTxPolicy` — component G. Itself a [`liq_kernel::Policy`] enrolled
//! under the wallet registry for the `0x02` (and EIP-712, where applicable)
//! asset; internally it runs a second, narrower Policy SPI of its own,
//! sub-leasing signing rights over individual `(chainId, destination)` pairs
//! to downstream sub-policies and keeping the ledgers that back them.

use std::sync::Arc;

use alloy_primitives::{Address as EthAddress, U256};
use liq_core::constants::estimate_inclusion_proof_cost;
use liq_core::error::LiqError;
use liq_core::types::{Address, AssetTag, BlockHeight, ChainId, Hash32, Principal, Timestamp};
use liq_crypto::keccak256;
use liq_host::{BlockHashOracle, ForeignHeader, ProofVerifier, TxInclusionProof};
use liq_kernel::{Policy, PolicyRegistry, WalletRegistry};

use crate::db::{PendingBalance, PolicyDb, SubLease};
use crate::types::{dest_asset_tag, EthTransaction, SignedEthTransaction};

pub struct EthTxPolicy {
    /// The principal this policy is itself registered under in the kernel's
    /// top-level `PolicyRegistry` — the identity it signs as when delegating
    /// to `WalletRegistry::sign_message`.
    principal: Principal,
    db: PolicyDb,
    registry: Arc<WalletRegistry>,
    sub_policies: Arc<PolicyRegistry>,
    oracle: Arc<dyn BlockHashOracle>,
    verifier: Arc<dyn ProofVerifier>,
}

impl EthTxPolicy {
    pub fn new(
        principal: Principal,
        db: PolicyDb,
        registry: Arc<WalletRegistry>,
        sub_policies: Arc<PolicyRegistry>,
        oracle: Arc<dyn BlockHashOracle>,
        verifier: Arc<dyn ProofVerifier>,
    ) -> Self {
        Self {
            principal,
            db,
            registry,
            sub_policies,
            oracle,
            verifier,
        }
    }

    pub fn principal(&self) -> Principal {
        self.principal
    }

    fn require_manager(&self, caller: Principal, account: &Address) -> Result<(), LiqError> {
        match self.db.get_manager(account)? {
            Some(manager) if manager == caller => Ok(()),
            _ => Err(LiqError::NotAuthorized),
        }
    }

    /// Sub-lease signing rights over `destinations` to `sub_policy`, notified
    /// synchronously through this policy's own `sub_policies` table — the
    /// same `notify_enrollment` hook a top-level policy receives from `D`,
    /// since a sub-policy is itself a [`Policy`] one level down.
    #[allow(clippy::too_many_arguments)]
    pub fn enter_sub_lease(
        &self,
        caller: Principal,
        account: Address,
        destinations: &[(ChainId, EthAddress)],
        sub_policy: Principal,
        expiry: Timestamp,
        sig_commitments_required: bool,
        uses_deposit_control: bool,
        now: Timestamp,
        data: &[u8],
    ) -> Result<(), LiqError> {
        self.require_manager(caller, &account)?;
        let own_expiry = self.db.get_own_lease_expiry(&account)?.ok_or(LiqError::NotAuthorized)?;
        if expiry > own_expiry {
            return Err(LiqError::Expired);
        }

        for (chain_id, to) in destinations {
            if let Some(prior) = self.db.get_sub_lease(&account, *chain_id, to)? {
                if !prior.is_expired(now) {
                    return Err(LiqError::AlreadyEncumbered);
                }
            }
        }

        let assets: Vec<AssetTag> = destinations
            .iter()
            .map(|(chain_id, to)| AssetTag(dest_asset_tag(*chain_id, to)))
            .collect();
        self.sub_policies.notify(sub_policy, caller, account, &assets, expiry, data)?;

        for (chain_id, to) in destinations {
            let lease = SubLease {
                sub_policy,
                expiry,
                sig_commitments_required,
            };
            self.db.put_sub_lease(&account, *chain_id, to, &lease)?;
            if !sig_commitments_required {
                self.db.set_last_unlimited_signer(&account, *chain_id, to, sub_policy)?;
            }
        }
        self.db.set_deposit_control(&sub_policy, uses_deposit_control)?;
        Ok(())
    }

    /// First-writer-wins: records `caller` as the committer of `signed_tx_hash`.
    pub fn commit_to_deposit(&self, caller: Principal, signed_tx_hash: Hash32, now: Timestamp) -> Result<(), LiqError> {
        if self.db.get_deposit_commitment(&signed_tx_hash)?.is_some() {
            return Err(LiqError::NotCommitter);
        }
        self.db.put_deposit_commitment(&signed_tx_hash, caller, now)?;
        Ok(())
    }

    pub fn deposit_funds(
        &self,
        caller: Principal,
        signed_tx: &SignedEthTransaction,
        header: &ForeignHeader,
        proof: &TxInclusionProof,
    ) -> Result<(), LiqError> {
        let hash = signed_tx.hash();
        let (committer, committed_at) = self.db.get_deposit_commitment(&hash)?.ok_or(LiqError::NotCommitter)?;
        if committer != caller {
            return Err(LiqError::NotCommitter);
        }

        let expected_hash = self.oracle.get_block_hash(signed_tx.tx.chain_id, header.block_number)?;
        if expected_hash != header.hash {
            return Err(LiqError::ProofMismatch);
        }
        let included = self.verifier.validate_tx_proof(header, proof)?;
        if included != signed_tx.tx.encode() {
            return Err(LiqError::ProofMismatch);
        }

        let signer_pubkey = self.registry.public_key_for_address(&signed_tx.signer)?;
        liq_crypto::verify_prehashed(&signer_pubkey, keccak256(&signed_tx.tx.encode()), &signed_tx.signature)?;

        if self.db.get_deposit_control(&caller)? && header.timestamp < committed_at {
            return Err(LiqError::CommitmentTooEarly);
        }

        if self.db.deposit_seen(&hash)? {
            return Err(LiqError::AlreadySeen);
        }
        self.db.mark_deposit_seen(&hash)?;

        let mut to_bytes = [0u8; 20];
        to_bytes.copy_from_slice(signed_tx.tx.to.as_slice());
        let to = Address(to_bytes);
        let prior = self.db.get_eth_balance(&caller, &to, signed_tx.tx.chain_id)?;
        self.db
            .set_eth_balance(&caller, &to, signed_tx.tx.chain_id, prior.saturating_add(signed_tx.tx.value))?;
        Ok(())
    }

    pub fn deposit_local_funds(
        &self,
        caller: Principal,
        account: Address,
        chain_id: ChainId,
        amount: U256,
        current_block: BlockHeight,
    ) -> Result<(), LiqError> {
        match self.db.get_local_pending(&caller, &account, chain_id)? {
            Some(pending) if pending.block == current_block => {
                self.db.set_local_pending(
                    &caller,
                    &account,
                    chain_id,
                    PendingBalance {
                        amount: pending.amount.saturating_add(amount),
                        block: current_block,
                    },
                )?;
            }
            Some(pending) => {
                let finalized = self.db.get_local_finalized(&caller, &account, chain_id)?;
                self.db
                    .set_local_finalized(&caller, &account, chain_id, finalized.saturating_add(pending.amount))?;
                self.db.set_local_pending(
                    &caller,
                    &account,
                    chain_id,
                    PendingBalance {
                        amount,
                        block: current_block,
                    },
                )?;
            }
            None => {
                self.db.set_local_pending(
                    &caller,
                    &account,
                    chain_id,
                    PendingBalance {
                        amount,
                        block: current_block,
                    },
                )?;
            }
        }
        Ok(())
    }

    pub fn finalize_local_funds(
        &self,
        caller: Principal,
        account: Address,
        chain_id: ChainId,
        current_block: BlockHeight,
    ) -> Result<(), LiqError> {
        let pending = self
            .db
            .get_local_pending(&caller, &account, chain_id)?
            .ok_or(LiqError::Pending)?;
        if pending.block >= current_block {
            return Err(LiqError::Pending);
        }
        let finalized = self.db.get_local_finalized(&caller, &account, chain_id)?;
        self.db
            .set_local_finalized(&caller, &account, chain_id, finalized.saturating_add(pending.amount))?;
        self.db.clear_local_pending(&caller, &account, chain_id)?;
        Ok(())
    }

    /// Overwrite `tx.nonce` with the authoritative count and record the
    /// commitment, returning the corrected transaction for the caller to
    /// sign against.
    pub fn commit_to_transaction(
        &self,
        caller: Principal,
        account: Address,
        mut tx: EthTransaction,
        current_block: BlockHeight,
    ) -> Result<EthTransaction, LiqError> {
        let lease = self
            .db
            .get_sub_lease(&account, tx.chain_id, &tx.to)?
            .ok_or(LiqError::NotLeaseholder)?;
        if lease.sub_policy != caller {
            return Err(LiqError::NotLeaseholder);
        }
        tx.nonce = self.db.get_tx_count(&account, tx.chain_id)?;
        self.db.put_tx_commit(&account, &tx.hash(), caller, current_block)?;
        Ok(tx)
    }

    /// The five ordered preconditions from the operation list — evaluated in
    /// this exact order, all required.
    pub fn sign_transaction(
        &self,
        caller: Principal,
        account: Address,
        tx: &EthTransaction,
        current_block: BlockHeight,
        now: Timestamp,
    ) -> Result<liq_core::types::DerSignature, LiqError> {
        // 1. Pre-funded inclusion-proof reimbursement.
        let proof_cost = U256::from(estimate_inclusion_proof_cost(tx.payload.len()));
        let local_finalized = self.db.get_local_finalized(&caller, &account, tx.chain_id)?;
        if proof_cost > local_finalized {
            return Err(LiqError::InsufficientBalance {
                need: proof_cost.to_string(),
                have: local_finalized.to_string(),
            });
        }

        // 2. Commitment requirement unless this sub-policy is the unlimited signer.
        let unlimited = self.db.get_last_unlimited_signer(&account, tx.chain_id, &tx.to)?;
        if unlimited != Some(caller) {
            let (committer, committed_block) = self
                .db
                .get_tx_commit(&account, &tx.hash())?
                .ok_or(LiqError::CommitmentRequired)?;
            if committer != caller {
                return Err(LiqError::CommitmentRequired);
            }
            if committed_block >= current_block {
                return Err(LiqError::CommitmentTooEarly);
            }
        }

        // 3. Current, unexpired leaseholder.
        let lease = self
            .db
            .get_sub_lease(&account, tx.chain_id, &tx.to)?
            .ok_or(LiqError::NotLeaseholder)?;
        if lease.sub_policy != caller {
            return Err(LiqError::NotLeaseholder);
        }
        if lease.is_expired(now) {
            return Err(LiqError::Expired);
        }

        // 4. Authoritative nonce.
        let expected_nonce = self.db.get_tx_count(&account, tx.chain_id)?;
        if tx.nonce != expected_nonce {
            return Err(LiqError::BadNonce);
        }

        // 5. Sufficient credited ETH to cover the worst-case cost.
        let balance = self.db.get_eth_balance(&caller, &account, tx.chain_id)?;
        let max_cost = tx.max_cost();
        if balance < max_cost {
            return Err(LiqError::InsufficientBalance {
                need: max_cost.to_string(),
                have: balance.to_string(),
            });
        }

        self.registry.sign_message(self.principal, account, &tx.encode(), current_block, now)
    }

    /// Verify inclusion, bump the nonce ledger, and debit whichever
    /// sub-policy's balance the precedence rule below names — this ordering
    /// must not be rearranged. Returns the reimbursement owed to whoever
    /// submitted the proof; paying it out in the account's native asset is
    /// the dispatcher's responsibility; this kernel has no principal-keyed
    /// native-balance ledger to pay into directly.
    pub fn prove_transaction_inclusion(
        &self,
        signed_tx: &SignedEthTransaction,
        header: &ForeignHeader,
        proof: &TxInclusionProof,
    ) -> Result<U256, LiqError> {
        let expected_hash = self.oracle.get_block_hash(signed_tx.tx.chain_id, header.block_number)?;
        if expected_hash != header.hash {
            return Err(LiqError::ProofMismatch);
        }
        let included = self.verifier.validate_tx_proof(header, proof)?;
        if included != signed_tx.tx.encode() {
            return Err(LiqError::ProofMismatch);
        }
        let signer_pubkey = self.registry.public_key_for_address(&signed_tx.signer)?;
        liq_crypto::verify_prehashed(&signer_pubkey, keccak256(&signed_tx.tx.encode()), &signed_tx.signature)?;

        let expected_nonce = self.db.get_tx_count(&signed_tx.signer, signed_tx.tx.chain_id)?;
        if signed_tx.tx.nonce != expected_nonce {
            return Err(LiqError::BadNonce);
        }
        self.db.set_tx_count(&signed_tx.signer, signed_tx.tx.chain_id, expected_nonce + 1)?;

        let current_leaseholder = self
            .db
            .get_sub_lease(&signed_tx.signer, signed_tx.tx.chain_id, &signed_tx.tx.to)?
            .map(|l| l.sub_policy)
            .ok_or(LiqError::NotLeaseholder)?;
        let unlimited = self
            .db
            .get_last_unlimited_signer(&signed_tx.signer, signed_tx.tx.chain_id, &signed_tx.tx.to)?;

        // Precedence, in order: the current leaseholder if it's the recorded
        // unlimited signer; else whichever sub-policy actually committed to
        // this transaction; else the previously recorded unlimited signer.
        let debited = if unlimited == Some(current_leaseholder) {
            current_leaseholder
        } else if let Some((committer, _)) = self.db.get_tx_commit(&signed_tx.signer, &signed_tx.tx.hash())? {
            committer
        } else {
            unlimited.ok_or(LiqError::NotLeaseholder)?
        };

        let max_cost = signed_tx.tx.max_cost();
        let balance = self.db.get_eth_balance(&debited, &signed_tx.signer, signed_tx.tx.chain_id)?;
        let debit = max_cost.min(balance);
        self.db
            .set_eth_balance(&debited, &signed_tx.signer, signed_tx.tx.chain_id, balance - debit)?;

        self.db
            .set_last_unlimited_signer(&signed_tx.signer, signed_tx.tx.chain_id, &signed_tx.tx.to, current_leaseholder)?;
        self.db
            .append_signed_included(&signed_tx.signer, &debited, signed_tx.hash())?;

        let proof_cost = U256::from(estimate_inclusion_proof_cost(signed_tx.tx.payload.len()));
        let local_finalized = self.db.get_local_finalized(&debited, &signed_tx.signer, signed_tx.tx.chain_id)?;
        let reimbursement = proof_cost.min(local_finalized);
        self.db.set_local_finalized(
            &debited,
            &signed_tx.signer,
            signed_tx.tx.chain_id,
            local_finalized - reimbursement,
        )?;

        Ok(reimbursement)
    }

    /// Manager-only: clear the commitment obligation on a destination by
    /// naming the current leaseholder the new unlimited signer.
    pub fn release_commitment_requirement(
        &self,
        caller: Principal,
        account: Address,
        chain_id: ChainId,
        to: EthAddress,
    ) -> Result<(), LiqError> {
        self.require_manager(caller, &account)?;
        let lease = self.db.get_sub_lease(&account, chain_id, &to)?.ok_or(LiqError::NotLeaseholder)?;
        self.db.set_last_unlimited_signer(&account, chain_id, &to, lease.sub_policy)
    }
}

impl Policy for EthTxPolicy {
    /// Enrollment under `D`: records the manager and the bounding lease
    /// expiry every `enter_sub_lease` call is checked against.
    fn notify_enrollment(
        &self,
        manager: Principal,
        account: Address,
        _assets: &[AssetTag],
        expiration: Timestamp,
        _data: &[u8],
    ) -> Result<(), LiqError> {
        self.db.set_manager(&account, manager)?;
        self.db.set_own_lease_expiry(&account, expiration)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use liq_core::types::AccountIndex;
    use liq_crypto::DeterministicHost;
    use liq_host::mock::{MockBlockHashOracle, MockProofVerifier};
    use liq_kernel::WalletDb;

    struct Harness {
        registry: Arc<WalletRegistry>,
        policy: Arc<EthTxPolicy>,
        oracle: Arc<MockBlockHashOracle>,
        verifier: Arc<MockProofVerifier>,
    }

    fn harness(seed: u64) -> Harness {
        let top_policies = Arc::new(PolicyRegistry::new());
        let registry = Arc::new(WalletRegistry::new(
            WalletDb::open_temporary().unwrap(),
            top_policies.clone(),
            Arc::new(DeterministicHost::new(seed)),
        ));
        let oracle = Arc::new(MockBlockHashOracle::new());
        let verifier = Arc::new(MockProofVerifier::new());
        let eth_principal = Principal([0xEEu8; 20]);
        let policy = Arc::new(EthTxPolicy::new(
            eth_principal,
            PolicyDb::open_temporary().unwrap(),
            registry.clone(),
            Arc::new(PolicyRegistry::new()),
            oracle.clone(),
            verifier.clone(),
        ));
        // Register this policy under the kernel's top-level table so
        // `enter_encumbrance` actually dispatches `notify_enrollment` to it.
        top_policies.register(eth_principal, policy.clone());
        Harness {
            registry,
            policy,
            oracle,
            verifier,
        }
    }

    /// Enrolls a fresh wallet under `manager` and leases its `0x02` asset to
    /// the harness's `EthTxPolicy`, returning the wallet's address. Exercises
    /// `notify_enrollment` exactly as `enter_encumbrance` would.
    fn enroll_account(h: &Harness, manager: Principal, seed_index: u8, own_expiry: Timestamp, block: BlockHeight) -> Address {
        let index = AccountIndex([seed_index; 32]);
        h.registry.create_wallet(manager, index, block).unwrap();
        let addr = h.registry.get_address(manager, index, block + 1).unwrap();
        h.registry
            .enter_encumbrance(
                manager,
                index,
                &[AssetTag::ETH_TRANSACTION],
                h.policy.principal(),
                own_expiry,
                b"",
                block + 1,
                0,
            )
            .unwrap();
        addr
    }

    fn tx(chain_id: ChainId, to: EthAddress, nonce: u64, value: U256) -> EthTransaction {
        EthTransaction {
            chain_id,
            nonce,
            max_fee_per_gas: U256::from(1u64),
            gas_limit: 21_000,
            to,
            value,
            payload: vec![],
        }
    }

    #[test]
    fn nonce_discipline_blocks_out_of_order_signing_until_proof_lands() {
        let h = harness(1);
        let manager = Principal([1u8; 20]);
        let sub_policy = Principal([2u8; 20]);
        let chain_id = 1u64;
        let to = EthAddress::from([0x55u8; 20]);

        let account = enroll_account(&h, manager, 10, 10_000, 20);
        h.policy
            .enter_sub_lease(
                manager,
                account,
                &[(chain_id, to)],
                sub_policy,
                5_000,
                false,
                false,
                0,
                b"",
            )
            .unwrap();

        // Fund both ledgers this sub-policy's preconditions need.
        h.policy.db.set_local_finalized(&sub_policy, &account, chain_id, U256::from(u128::MAX)).unwrap();
        h.policy.db.set_eth_balance(&sub_policy, &account, chain_id, U256::from(u128::MAX)).unwrap();

        let tx0 = tx(chain_id, to, 0, U256::from(1u64));
        // Signing nonce 1 before nonce 0 has been proved is refused.
        let tx1_early = tx(chain_id, to, 1, U256::from(1u64));
        assert!(matches!(
            h.policy.sign_transaction(sub_policy, account, &tx1_early, 22, 1),
            Err(LiqError::BadNonce)
        ));

        let sig0 = h.policy.sign_transaction(sub_policy, account, &tx0, 22, 1).unwrap();
        let signed0 = SignedEthTransaction {
            tx: tx0.clone(),
            signature: sig0,
            signer: account,
        };

        let header = ForeignHeader {
            chain_id,
            block_number: 100,
            timestamp: 0,
            hash: Hash32([9u8; 32]),
            transactions_root: Hash32([0u8; 32]),
            state_root: Hash32([0u8; 32]),
        };
        h.oracle.seed(chain_id, 100, header.hash);
        let proof = TxInclusionProof {
            transaction_index: 0,
            included_tx_rlp: tx0.encode(),
        };
        h.verifier.expect_tx(header.hash, tx0.encode());

        h.policy.prove_transaction_inclusion(&signed0, &header, &proof).unwrap();

        let tx1 = tx(chain_id, to, 1, U256::from(1u64));
        assert!(h.policy.sign_transaction(sub_policy, account, &tx1, 22, 2).is_ok());
    }

    #[test]
    fn deposit_commitment_race_is_first_writer_wins() {
        let h = harness(2);
        let depositor_manager = Principal([3u8; 20]);
        let leaseholder = Principal([4u8; 20]);
        let s1 = Principal([5u8; 20]);
        let s2 = Principal([6u8; 20]);
        let chain_id = 7u64;

        let index = AccountIndex([20u8; 32]);
        h.registry.create_wallet(depositor_manager, index, 10).unwrap();
        let depositor = h.registry.get_address(depositor_manager, index, 11).unwrap();
        h.registry
            .enter_encumbrance(
                depositor_manager,
                index,
                &[AssetTag::ETH_TRANSACTION],
                leaseholder,
                10_000,
                b"",
                11,
                0,
            )
            .unwrap();

        let deposit_tx = tx(chain_id, EthAddress::from([0x77u8; 20]), 0, U256::from(500u64));
        let signature = h
            .registry
            .sign_message(leaseholder, depositor, &deposit_tx.encode(), 12, 100)
            .unwrap();
        let signed = SignedEthTransaction {
            tx: deposit_tx.clone(),
            signature,
            signer: depositor,
        };
        let hash = signed.hash();

        h.policy.commit_to_deposit(s1, hash, 100).unwrap();
        assert!(matches!(
            h.policy.commit_to_deposit(s2, hash, 101),
            Err(LiqError::NotCommitter)
        ));

        let header = ForeignHeader {
            chain_id,
            block_number: 50,
            timestamp: 200,
            hash: Hash32([3u8; 32]),
            transactions_root: Hash32([0u8; 32]),
            state_root: Hash32([0u8; 32]),
        };
        h.oracle.seed(chain_id, 50, header.hash);
        h.verifier.expect_tx(header.hash, deposit_tx.encode());
        let proof = TxInclusionProof {
            transaction_index: 0,
            included_tx_rlp: deposit_tx.encode(),
        };

        h.policy.deposit_funds(s1, &signed, &header, &proof).unwrap();
        assert!(matches!(
            h.policy.deposit_funds(s2, &signed, &header, &proof),
            Err(LiqError::NotCommitter)
        ));

        let mut to_bytes = [0u8; 20];
        to_bytes.copy_from_slice(deposit_tx.to.as_slice());
        let credited = h.policy.db.get_eth_balance(&s1, &Address(to_bytes), chain_id).unwrap();
        assert_eq!(credited, U256::from(500u64));
    }
}
