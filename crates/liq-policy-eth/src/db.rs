//! Sled-backed storage for the Ethereum-transaction sub-policy: per-account
//! transaction-manager records, sub-leases, the nonce ledger, deposit and
//! transaction commitments, and the sub-balance ledgers. Mirrors the shape of
//! `liq_kernel::db::WalletDb` — one tree per map named in the data model,
//! byte-concatenated composite keys, bincode values except where a value
//! holds a `U256` (stored as raw big-endian bytes so this crate never needs
//! `alloy-primitives`'s `serde` feature).

use std::path::Path;

use alloy_primitives::{Address as EthAddress, U256};
use liq_core::error::LiqError;
use liq_core::types::{Address, BlockHeight, ChainId, Hash32, Principal, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubLease {
    pub sub_policy: Principal,
    pub expiry: Timestamp,
    pub sig_commitments_required: bool,
}

impl SubLease {
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expiry <= now
    }
}

fn dest_key(account: &Address, chain_id: ChainId, to: &EthAddress) -> Vec<u8> {
    let mut b = Vec::with_capacity(20 + 8 + 20);
    b.extend_from_slice(&account.0);
    b.extend_from_slice(&chain_id.to_be_bytes());
    b.extend_from_slice(to.as_slice());
    b
}

fn sub_account_chain_key(sub_policy: &Principal, account: &Address, chain_id: ChainId) -> Vec<u8> {
    let mut b = Vec::with_capacity(20 + 20 + 8);
    b.extend_from_slice(&sub_policy.0);
    b.extend_from_slice(&account.0);
    b.extend_from_slice(&chain_id.to_be_bytes());
    b
}

fn account_chain_key(account: &Address, chain_id: ChainId) -> Vec<u8> {
    let mut b = Vec::with_capacity(20 + 8);
    b.extend_from_slice(&account.0);
    b.extend_from_slice(&chain_id.to_be_bytes());
    b
}

fn u256_to_bytes(v: U256) -> [u8; 32] {
    v.to_be_bytes::<32>()
}

fn u256_from_bytes(b: &[u8]) -> Result<U256, LiqError> {
    if b.len() != 32 {
        return Err(LiqError::Storage("corrupt U256 value".to_string()));
    }
    let mut arr = [0u8; 32];
    arr.copy_from_slice(b);
    Ok(U256::from_be_bytes(arr))
}

#[derive(Clone, Copy, Debug)]
pub struct PendingBalance {
    pub amount: U256,
    pub block: BlockHeight,
}

/// Persistent state for the Ethereum-transaction sub-policy, backed by
/// `sled`. Named trees:
///
///   managers          — account bytes                    → Principal bytes
///   own_lease_expiry   — account bytes                    → i64 BE (our own lease expiry on the account)
///   sub_leases         — (account || chainId || to)       → bincode(SubLease)
///   last_unlimited     — (account || chainId || to)       → Principal bytes
///   deposit_control    — subPolicy bytes                  → bool (1 byte)
///   deposit_tx         — signedTxHash bytes                → bincode((Principal, Timestamp))
///   deposit_seen       — signedTxHash bytes                → () marker
///   eth_balance        — (subPolicy || account || chainId) → U256 BE bytes
///   local_finalized    — (subPolicy || account || chainId) → U256 BE bytes
///   local_pending      — (subPolicy || account || chainId) → U256 BE (32) || u64 BE block (8)
///   tx_count           — (account || chainId)              → u64 BE
///   tx_commit          — (account || unsignedTxHash)       → bincode((Principal, BlockHeight))
///   signed_included    — (signer || subPolicy)              → bincode(Vec<Hash32>)
pub struct PolicyDb {
    _db: sled::Db,
    managers: sled::Tree,
    own_lease_expiry: sled::Tree,
    sub_leases: sled::Tree,
    last_unlimited: sled::Tree,
    deposit_control: sled::Tree,
    deposit_tx: sled::Tree,
    deposit_seen: sled::Tree,
    eth_balance: sled::Tree,
    local_finalized: sled::Tree,
    local_pending: sled::Tree,
    tx_count: sled::Tree,
    tx_commit: sled::Tree,
    signed_included: sled::Tree,
}

impl PolicyDb {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LiqError> {
        Self::from_db(sled::open(path)?)
    }

    pub fn open_temporary() -> Result<Self, LiqError> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: sled::Db) -> Result<Self, LiqError> {
        Ok(Self {
            managers: db.open_tree("managers")?,
            own_lease_expiry: db.open_tree("own_lease_expiry")?,
            sub_leases: db.open_tree("sub_leases")?,
            last_unlimited: db.open_tree("last_unlimited")?,
            deposit_control: db.open_tree("deposit_control")?,
            deposit_tx: db.open_tree("deposit_tx")?,
            deposit_seen: db.open_tree("deposit_seen")?,
            eth_balance: db.open_tree("eth_balance")?,
            local_finalized: db.open_tree("local_finalized")?,
            local_pending: db.open_tree("local_pending")?,
            tx_count: db.open_tree("tx_count")?,
            tx_commit: db.open_tree("tx_commit")?,
            signed_included: db.open_tree("signed_included")?,
            _db: db,
        })
    }

    // ── Transaction manager / own lease bound ───────────────────────────────

    pub fn get_manager(&self, account: &Address) -> Result<Option<Principal>, LiqError> {
        match self.managers.get(account.0)? {
            Some(bytes) => {
                let mut arr = [0u8; 20];
                arr.copy_from_slice(&bytes);
                Ok(Some(Principal(arr)))
            }
            None => Ok(None),
        }
    }

    pub fn set_manager(&self, account: &Address, manager: Principal) -> Result<(), LiqError> {
        self.managers.insert(account.0, &manager.0)?;
        Ok(())
    }

    pub fn get_own_lease_expiry(&self, account: &Address) -> Result<Option<Timestamp>, LiqError> {
        match self.own_lease_expiry.get(account.0)? {
            Some(bytes) => {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(&bytes);
                Ok(Some(Timestamp::from_be_bytes(arr)))
            }
            None => Ok(None),
        }
    }

    pub fn set_own_lease_expiry(&self, account: &Address, expiry: Timestamp) -> Result<(), LiqError> {
        self.own_lease_expiry.insert(account.0, &expiry.to_be_bytes())?;
        Ok(())
    }

    // ── Sub-leases ───────────────────────────────────────────────────────────

    pub fn get_sub_lease(
        &self,
        account: &Address,
        chain_id: ChainId,
        to: &EthAddress,
    ) -> Result<Option<SubLease>, LiqError> {
        match self.sub_leases.get(dest_key(account, chain_id, to))? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_sub_lease(
        &self,
        account: &Address,
        chain_id: ChainId,
        to: &EthAddress,
        lease: &SubLease,
    ) -> Result<(), LiqError> {
        let bytes = bincode::serialize(lease)?;
        self.sub_leases.insert(dest_key(account, chain_id, to), bytes)?;
        Ok(())
    }

    pub fn get_last_unlimited_signer(
        &self,
        account: &Address,
        chain_id: ChainId,
        to: &EthAddress,
    ) -> Result<Option<Principal>, LiqError> {
        match self.last_unlimited.get(dest_key(account, chain_id, to))? {
            Some(bytes) => {
                let mut arr = [0u8; 20];
                arr.copy_from_slice(&bytes);
                Ok(Some(Principal(arr)))
            }
            None => Ok(None),
        }
    }

    pub fn set_last_unlimited_signer(
        &self,
        account: &Address,
        chain_id: ChainId,
        to: &EthAddress,
        sub_policy: Principal,
    ) -> Result<(), LiqError> {
        self.last_unlimited
            .insert(dest_key(account, chain_id, to), &sub_policy.0)?;
        Ok(())
    }

    // ── Deposit control flag ────────────────────────────────────────────────

    pub fn get_deposit_control(&self, sub_policy: &Principal) -> Result<bool, LiqError> {
        Ok(self
            .deposit_control
            .get(sub_policy.0)?
            .map(|b| b[0] != 0)
            .unwrap_or(false))
    }

    pub fn set_deposit_control(&self, sub_policy: &Principal, uses: bool) -> Result<(), LiqError> {
        self.deposit_control.insert(sub_policy.0, &[uses as u8])?;
        Ok(())
    }

    // ── Deposit commitments ──────────────────────────────────────────────────

    pub fn get_deposit_commitment(&self, hash: &Hash32) -> Result<Option<(Principal, Timestamp)>, LiqError> {
        match self.deposit_tx.get(hash.0)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_deposit_commitment(&self, hash: &Hash32, committer: Principal, now: Timestamp) -> Result<(), LiqError> {
        let bytes = bincode::serialize(&(committer, now))?;
        self.deposit_tx.insert(hash.0, bytes)?;
        Ok(())
    }

    pub fn deposit_seen(&self, hash: &Hash32) -> Result<bool, LiqError> {
        Ok(self.deposit_seen.contains_key(hash.0)?)
    }

    pub fn mark_deposit_seen(&self, hash: &Hash32) -> Result<(), LiqError> {
        self.deposit_seen.insert(hash.0, &[1u8])?;
        Ok(())
    }

    // ── Sub-balance ledgers ──────────────────────────────────────────────────

    pub fn get_eth_balance(&self, sub_policy: &Principal, account: &Address, chain_id: ChainId) -> Result<U256, LiqError> {
        match self.eth_balance.get(sub_account_chain_key(sub_policy, account, chain_id))? {
            Some(bytes) => u256_from_bytes(&bytes),
            None => Ok(U256::ZERO),
        }
    }

    pub fn set_eth_balance(
        &self,
        sub_policy: &Principal,
        account: &Address,
        chain_id: ChainId,
        value: U256,
    ) -> Result<(), LiqError> {
        self.eth_balance
            .insert(sub_account_chain_key(sub_policy, account, chain_id), &u256_to_bytes(value))?;
        Ok(())
    }

    pub fn get_local_finalized(&self, sub_policy: &Principal, account: &Address, chain_id: ChainId) -> Result<U256, LiqError> {
        match self.local_finalized.get(sub_account_chain_key(sub_policy, account, chain_id))? {
            Some(bytes) => u256_from_bytes(&bytes),
            None => Ok(U256::ZERO),
        }
    }

    pub fn set_local_finalized(
        &self,
        sub_policy: &Principal,
        account: &Address,
        chain_id: ChainId,
        value: U256,
    ) -> Result<(), LiqError> {
        self.local_finalized
            .insert(sub_account_chain_key(sub_policy, account, chain_id), &u256_to_bytes(value))?;
        Ok(())
    }

    pub fn get_local_pending(
        &self,
        sub_policy: &Principal,
        account: &Address,
        chain_id: ChainId,
    ) -> Result<Option<PendingBalance>, LiqError> {
        match self.local_pending.get(sub_account_chain_key(sub_policy, account, chain_id))? {
            Some(bytes) => {
                let amount = u256_from_bytes(&bytes[..32])?;
                let mut block_bytes = [0u8; 8];
                block_bytes.copy_from_slice(&bytes[32..40]);
                Ok(Some(PendingBalance {
                    amount,
                    block: BlockHeight::from_be_bytes(block_bytes),
                }))
            }
            None => Ok(None),
        }
    }

    pub fn set_local_pending(
        &self,
        sub_policy: &Principal,
        account: &Address,
        chain_id: ChainId,
        pending: PendingBalance,
    ) -> Result<(), LiqError> {
        let mut bytes = Vec::with_capacity(40);
        bytes.extend_from_slice(&u256_to_bytes(pending.amount));
        bytes.extend_from_slice(&pending.block.to_be_bytes());
        self.local_pending
            .insert(sub_account_chain_key(sub_policy, account, chain_id), bytes)?;
        Ok(())
    }

    pub fn clear_local_pending(&self, sub_policy: &Principal, account: &Address, chain_id: ChainId) -> Result<(), LiqError> {
        self.local_pending.remove(sub_account_chain_key(sub_policy, account, chain_id))?;
        Ok(())
    }

    // ── Nonce ledger ─────────────────────────────────────────────────────────

    pub fn get_tx_count(&self, account: &Address, chain_id: ChainId) -> Result<u64, LiqError> {
        match self.tx_count.get(account_chain_key(account, chain_id))? {
            Some(bytes) => {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(&bytes);
                Ok(u64::from_be_bytes(arr))
            }
            None => Ok(0),
        }
    }

    pub fn set_tx_count(&self, account: &Address, chain_id: ChainId, count: u64) -> Result<(), LiqError> {
        self.tx_count.insert(account_chain_key(account, chain_id), &count.to_be_bytes())?;
        Ok(())
    }

    // ── Transaction commitments ──────────────────────────────────────────────

    pub fn get_tx_commit(&self, account: &Address, unsigned_tx_hash: &Hash32) -> Result<Option<(Principal, BlockHeight)>, LiqError> {
        let mut key = Vec::with_capacity(52);
        key.extend_from_slice(&account.0);
        key.extend_from_slice(&unsigned_tx_hash.0);
        match self.tx_commit.get(key)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_tx_commit(
        &self,
        account: &Address,
        unsigned_tx_hash: &Hash32,
        sub_policy: Principal,
        block: BlockHeight,
    ) -> Result<(), LiqError> {
        let mut key = Vec::with_capacity(52);
        key.extend_from_slice(&account.0);
        key.extend_from_slice(&unsigned_tx_hash.0);
        let bytes = bincode::serialize(&(sub_policy, block))?;
        self.tx_commit.insert(key, bytes)?;
        Ok(())
    }

    // ── Reimbursement history ────────────────────────────────────────────────

    pub fn append_signed_included(&self, signer: &Address, sub_policy: &Principal, hash: Hash32) -> Result<(), LiqError> {
        let mut key = Vec::with_capacity(40);
        key.extend_from_slice(&signer.0);
        key.extend_from_slice(&sub_policy.0);
        let mut list: Vec<Hash32> = match self.signed_included.get(&key)? {
            Some(bytes) => bincode::deserialize(&bytes)?,
            None => Vec::new(),
        };
        list.push(hash);
        self.signed_included.insert(key, bincode::serialize(&list)?)?;
        Ok(())
    }
}
