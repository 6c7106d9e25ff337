//! `WalletRegistry` — component D. Ties the delayed-finalization cells, the
//! asset classifier, and the policy SPI together into the kernel's public
//! operation set. Every write operation here follows the same shape:
//! validate against borrowed state first, call out to a policy if one is in
//! the loop, and only then commit — so a vetoed or rejected call never
//! leaves a partial mutation behind.

use std::sync::Arc;

use liq_core::constants::ACCOUNT_INDEX_COLLISION_RETRIES;
use liq_core::error::LiqError;
use liq_core::types::{AccountIndex, Address, AssetTag, BlockHeight, DerSignature, Principal, Timestamp, WalletId};
use liq_crypto::{envelope, eip712_domain_tag, keccak256, Envelope, HostCrypto};
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret as X25519SecretKey};

use crate::asset;
use crate::cell::DelayedCell;
use crate::db::{Lease, WalletDb};
use crate::policy::PolicyRegistry;
use crate::wallet::Wallet;

fn export_proof_message(address: &Address) -> Vec<u8> {
    let mut buf = Vec::with_capacity(10 + 20);
    buf.extend_from_slice(b"Key export");
    buf.extend_from_slice(&address.0);
    buf
}

pub struct WalletRegistry {
    db: WalletDb,
    policies: Arc<PolicyRegistry>,
    host: Arc<dyn HostCrypto>,
    export_secret: X25519SecretKey,
    export_public: X25519PublicKey,
}

impl WalletRegistry {
    pub fn new(db: WalletDb, policies: Arc<PolicyRegistry>, host: Arc<dyn HostCrypto>) -> Self {
        let (export_public, export_secret) = host.gen_x25519_keypair();
        Self {
            db,
            policies,
            host,
            export_secret,
            export_public,
        }
    }

    /// The registry's static X25519 public key, published so counterparties
    /// can address a key-export request at it.
    pub fn export_public_key(&self) -> [u8; 32] {
        *self.export_public.as_bytes()
    }

    fn owned_wallet(
        &self,
        caller: &Principal,
        account_index: &AccountIndex,
        current_block: BlockHeight,
    ) -> Result<Wallet, LiqError> {
        let wallet_id = self
            .db
            .lookup_owner(caller, account_index)?
            .ok_or(LiqError::WalletNotFound)?;
        let wallet = self.db.get_wallet(&wallet_id)?.ok_or(LiqError::WalletNotFound)?;
        let owner = wallet.owner.finalized(current_block)?;
        if owner.0 != *caller {
            return Err(LiqError::NotAuthorized);
        }
        Ok(wallet)
    }

    /// Create a wallet for `(caller, accountIndex)` if one doesn't already
    /// exist. Returns `false` if it already did — idempotent by design, the
    /// way the source's create-if-absent enrollment path behaves.
    pub fn create_wallet(
        &self,
        caller: Principal,
        account_index: AccountIndex,
        current_block: BlockHeight,
    ) -> Result<bool, LiqError> {
        if self.db.owner_index_exists(&caller, &account_index)? {
            return Ok(false);
        }
        let keypair = self.host.gen_secp256k1_keypair();
        let wallet = Wallet::new(keypair, (caller, account_index), current_block);
        self.db.put_wallet(&wallet)?;
        self.db.set_owner_index(&caller, &account_index, &wallet.wallet_id)?;
        self.db.append_attended(&caller, account_index, current_block)?;
        Ok(true)
    }

    pub fn get_public_key(
        &self,
        caller: Principal,
        account_index: AccountIndex,
        current_block: BlockHeight,
    ) -> Result<WalletId, LiqError> {
        Ok(self.owned_wallet(&caller, &account_index, current_block)?.wallet_id)
    }

    pub fn get_address(
        &self,
        caller: Principal,
        account_index: AccountIndex,
        current_block: BlockHeight,
    ) -> Result<Address, LiqError> {
        Ok(self.owned_wallet(&caller, &account_index, current_block)?.address)
    }

    /// The wallet's secp256k1 public key by address, with no ownership
    /// check — used by sub-policies that need to verify a signature against
    /// its claimed signer rather than sign on the owner's behalf.
    pub fn public_key_for_address(&self, address: &Address) -> Result<WalletId, LiqError> {
        Ok(self.db.find_by_address(address)?.ok_or(LiqError::WalletNotFound)?.wallet_id)
    }

    /// Every attended `(accountIndex, creationBlock)` pair a principal has
    /// ever owned a wallet under — never pruned on transfer-away.
    pub fn attended_wallets(&self, principal: &Principal) -> Result<Vec<(AccountIndex, BlockHeight)>, LiqError> {
        self.db.attended_wallets(principal)
    }

    /// Move a wallet to a new owner under a freshly chosen `accountIndex`,
    /// retrying on collision against the recipient's existing wallets rather
    /// than silently overwriting one.
    pub fn transfer_ownership(
        &self,
        caller: Principal,
        account_index: AccountIndex,
        new_owner: Principal,
        current_block: BlockHeight,
    ) -> Result<AccountIndex, LiqError> {
        let wallet_id = self
            .db
            .lookup_owner(&caller, &account_index)?
            .ok_or(LiqError::WalletNotFound)?;
        let mut wallet = self.db.get_wallet(&wallet_id)?.ok_or(LiqError::WalletNotFound)?;
        let owner = wallet.owner.finalized(current_block)?;
        if owner.0 != caller {
            return Err(LiqError::NotAuthorized);
        }
        if wallet.is_destroyed() || *wallet.export_requested.raw() {
            return Err(LiqError::Exported);
        }

        let mut new_index = None;
        for _ in 0..ACCOUNT_INDEX_COLLISION_RETRIES {
            let bytes = self.host.rand_bytes(32, b"transfer-ownership-account-index");
            let mut arr = [0u8; 32];
            arr.copy_from_slice(&bytes);
            let candidate = AccountIndex(arr);
            if !self.db.owner_index_exists(&new_owner, &candidate)? {
                new_index = Some(candidate);
                break;
            }
        }
        let new_index = new_index
            .ok_or_else(|| LiqError::Other("account index collision retries exhausted".to_string()))?;

        // Advance the delayed cell first: if this wallet already changed
        // hands earlier in this same block, this fails `Pending` and nothing
        // below runs.
        wallet.owner.update_to((new_owner, new_index), current_block)?;

        self.db.clear_owner_index(&caller, &account_index)?;
        self.db.set_owner_index(&new_owner, &new_index, &wallet_id)?;
        self.db.append_attended(&new_owner, new_index, current_block)?;
        self.db.put_wallet(&wallet)?;

        Ok(new_index)
    }

    /// Install a lease over `assets` on the caller's wallet, naming `policy`
    /// as the principal authorized to sign for them until `expiry`. Notifies
    /// `policy` synchronously; a veto reverts the whole call.
    #[allow(clippy::too_many_arguments)]
    pub fn enter_encumbrance(
        &self,
        caller: Principal,
        account_index: AccountIndex,
        assets: &[AssetTag],
        policy: Principal,
        expiry: Timestamp,
        data: &[u8],
        current_block: BlockHeight,
        now: Timestamp,
    ) -> Result<(), LiqError> {
        if policy.is_zero() {
            return Err(LiqError::NotAuthorized);
        }
        if expiry <= now {
            return Err(LiqError::Expired);
        }

        let wallet = self.owned_wallet(&caller, &account_index, current_block)?;
        if wallet.is_destroyed() || *wallet.export_requested.raw() {
            return Err(LiqError::Exported);
        }

        for asset in assets {
            if let Some(prior) = self.db.get_lease(&wallet.address, asset)? {
                if !(prior.expiry < now) {
                    return Err(LiqError::AlreadyEncumbered);
                }
            }
        }

        self.policies
            .notify(policy, caller, wallet.address, assets, expiry, data)?;

        for asset in assets {
            let lease = Lease {
                policy: DelayedCell::new(policy, current_block),
                expiry,
            };
            self.db.put_lease(&wallet.address, asset, &lease)?;
        }

        if expiry > wallet.max_expiry {
            let mut wallet = wallet;
            wallet.max_expiry = expiry;
            self.db.put_wallet(&wallet)?;
        }

        Ok(())
    }

    fn sign_for_asset(
        &self,
        caller: Principal,
        account: Address,
        asset: AssetTag,
        digest: [u8; 32],
        current_block: BlockHeight,
        now: Timestamp,
    ) -> Result<DerSignature, LiqError> {
        if asset.is_zero() {
            return Err(LiqError::AssetUnknown);
        }
        let wallet = self.db.find_by_address(&account)?.ok_or(LiqError::WalletNotFound)?;
        if wallet.is_destroyed() {
            return Err(LiqError::Exported);
        }
        let lease = self
            .db
            .get_lease(&account, &asset)?
            .ok_or(LiqError::NotAuthorized)?;
        let policy = lease.policy.finalized(current_block)?;
        if *policy != caller {
            return Err(LiqError::NotAuthorized);
        }
        if lease.is_expired(now) {
            return Err(LiqError::Expired);
        }
        Ok(wallet.keypair()?.sign_prehashed(digest))
    }

    /// Sign a raw message: classified through [`asset::classify`] and signed
    /// by whichever policy currently holds an unexpired lease over that
    /// asset on `account`.
    pub fn sign_message(
        &self,
        caller: Principal,
        account: Address,
        payload: &[u8],
        current_block: BlockHeight,
        now: Timestamp,
    ) -> Result<DerSignature, LiqError> {
        let asset = asset::classify(payload);
        self.sign_for_asset(caller, account, asset, keccak256(payload), current_block, now)
    }

    /// Sign EIP-712 typed data. The asset tag is keyed on `domain_name` alone
    /// ([`asset::classify_eip712`]); the signed digest folds in the full
    /// EIP-712 structure (`0x1901 ∥ domainSeparator ∥ Keccak(typeHash ∥ encodedData)`).
    pub fn sign_typed_data(
        &self,
        caller: Principal,
        account: Address,
        domain_name: &str,
        type_string: &str,
        encoded_data: &[u8],
        current_block: BlockHeight,
        now: Timestamp,
    ) -> Result<DerSignature, LiqError> {
        let asset = asset::classify_eip712(domain_name);
        let domain_separator = eip712_domain_tag(domain_name).0;
        let type_hash = keccak256(type_string.as_bytes());
        let struct_hash = keccak256(&[type_hash.as_slice(), encoded_data].concat());

        let mut buf = Vec::with_capacity(2 + 32 + 32);
        buf.extend_from_slice(&[0x19, 0x01]);
        buf.extend_from_slice(&domain_separator);
        buf.extend_from_slice(&struct_hash);
        let digest = keccak256(&buf);

        self.sign_for_asset(caller, account, asset, digest, current_block, now)
    }

    /// Begin a key export. `counterparty_pubkey`/`proof_ciphertext`/`proof_nonce`
    /// are the envelope the counterparty sealed to this registry's static
    /// export key, proving control of the matching secret by encrypting the
    /// tuple `("Key export", walletAddress)`.
    pub fn request_key_export(
        &self,
        caller: Principal,
        account_index: AccountIndex,
        counterparty_pubkey: [u8; 32],
        proof_ciphertext: Vec<u8>,
        proof_nonce: [u8; 24],
        current_block: BlockHeight,
        now: Timestamp,
    ) -> Result<(), LiqError> {
        let wallet_id = self
            .db
            .lookup_owner(&caller, &account_index)?
            .ok_or(LiqError::WalletNotFound)?;
        let mut wallet = self.db.get_wallet(&wallet_id)?.ok_or(LiqError::WalletNotFound)?;
        let owner = wallet.owner.finalized(current_block)?;
        if owner.0 != caller {
            return Err(LiqError::NotAuthorized);
        }
        if wallet.is_destroyed() || *wallet.export_requested.raw() {
            return Err(LiqError::Exported);
        }
        if wallet.max_expiry >= now {
            return Err(LiqError::CommitmentTooEarly);
        }

        let proof = Envelope {
            sender_pubkey: counterparty_pubkey,
            nonce: proof_nonce,
            ciphertext: proof_ciphertext,
        };
        let plaintext = envelope::open(&self.export_secret, &proof)?;
        if plaintext != export_proof_message(&wallet.address) {
            return Err(LiqError::WrongExportTag);
        }

        wallet.export_requested.update_to(true, current_block)?;
        wallet.export_counterparty = Some(counterparty_pubkey);
        self.db.put_wallet(&wallet)?;
        Ok(())
    }

    /// Seal the wallet's private key to the counterparty recorded in
    /// `request_key_export`, once that request has finalized.
    pub fn export_key(
        &self,
        caller: Principal,
        account_index: AccountIndex,
        current_block: BlockHeight,
    ) -> Result<Envelope, LiqError> {
        let wallet_id = self
            .db
            .lookup_owner(&caller, &account_index)?
            .ok_or(LiqError::WalletNotFound)?;
        let wallet = self.db.get_wallet(&wallet_id)?.ok_or(LiqError::WalletNotFound)?;
        let owner = wallet.owner.finalized(current_block)?;
        if owner.0 != caller {
            return Err(LiqError::NotAuthorized);
        }
        if !wallet.export_finalized(current_block) {
            return Err(LiqError::Pending);
        }
        let counterparty = wallet
            .export_counterparty
            .ok_or_else(|| LiqError::Other("export requested but no counterparty recorded".to_string()))?;
        let secret = wallet.export_secret()?;
        Ok(envelope::seal_with(
            &self.export_secret,
            &self.export_public,
            &counterparty,
            &secret,
        ))
    }

    /// Irreversibly destroy the private key material once its export has
    /// finalized. The public record (address, wallet id, attended log)
    /// survives; every further write on this wallet refuses.
    pub fn destroy_exported_key(
        &self,
        caller: Principal,
        account_index: AccountIndex,
        current_block: BlockHeight,
    ) -> Result<(), LiqError> {
        let wallet_id = self
            .db
            .lookup_owner(&caller, &account_index)?
            .ok_or(LiqError::WalletNotFound)?;
        let mut wallet = self.db.get_wallet(&wallet_id)?.ok_or(LiqError::WalletNotFound)?;
        let owner = wallet.owner.finalized(current_block)?;
        if owner.0 != caller {
            return Err(LiqError::NotAuthorized);
        }
        if !wallet.export_finalized(current_block) {
            return Err(LiqError::Pending);
        }
        wallet.destroy_key();
        self.db.put_wallet(&wallet)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liq_crypto::DeterministicHost;

    fn registry(seed: u64) -> WalletRegistry {
        WalletRegistry::new(
            WalletDb::open_temporary().unwrap(),
            Arc::new(PolicyRegistry::new()),
            Arc::new(DeterministicHost::new(seed)),
        )
    }

    #[test]
    fn create_wallet_is_idempotent() {
        let reg = registry(1);
        let caller = Principal([1u8; 20]);
        let index = AccountIndex([2u8; 32]);
        assert!(reg.create_wallet(caller, index, 10).unwrap());
        assert!(!reg.create_wallet(caller, index, 11).unwrap());
    }

    #[test]
    fn get_address_blocked_in_same_block_as_creation() {
        let reg = registry(2);
        let caller = Principal([1u8; 20]);
        let index = AccountIndex([2u8; 32]);
        reg.create_wallet(caller, index, 10).unwrap();
        assert!(matches!(
            reg.get_address(caller, index, 10),
            Err(LiqError::Pending)
        ));
        assert!(reg.get_address(caller, index, 11).is_ok());
    }

    #[test]
    fn enter_encumbrance_then_sign_as_leaseholder() {
        let reg = registry(3);
        let owner = Principal([1u8; 20]);
        let leaseholder = Principal([9u8; 20]);
        let index = AccountIndex([2u8; 32]);
        reg.create_wallet(owner, index, 10).unwrap();
        let address = reg.get_address(owner, index, 11).unwrap();

        reg.enter_encumbrance(
            owner,
            index,
            &[AssetTag::ETH_SIGNED_MESSAGE],
            leaseholder,
            1_000,
            b"",
            11,
            100,
        )
        .unwrap();

        let payload = [0x19u8, 0x45, b'h', b'i'];
        // Owner is not the leaseholder: refused.
        assert!(matches!(
            reg.sign_message(owner, address, &payload, 12, 200),
            Err(LiqError::NotAuthorized)
        ));
        // Leaseholder can sign once the lease finalizes.
        let sig = reg.sign_message(leaseholder, address, &payload, 12, 200).unwrap();
        assert!(!sig.0.is_empty());
    }

    #[test]
    fn sign_message_unknown_asset_is_rejected() {
        let reg = registry(4);
        let owner = Principal([1u8; 20]);
        let index = AccountIndex([2u8; 32]);
        reg.create_wallet(owner, index, 10).unwrap();
        let address = reg.get_address(owner, index, 11).unwrap();

        let payload = [0x03u8, 0x00];
        assert!(matches!(
            reg.sign_message(owner, address, &payload, 12, 100),
            Err(LiqError::AssetUnknown)
        ));
    }

    #[test]
    fn sign_message_unknown_asset_is_rejected_regardless_of_caller() {
        // An unclassifiable payload fails `AssetUnknown` before the lease
        // lookup ever runs, so it doesn't matter who the caller is — not
        // the owner, and not some unrelated third party.
        let reg = registry(14);
        let owner = Principal([1u8; 20]);
        let stranger = Principal([0xaa; 20]);
        let index = AccountIndex([2u8; 32]);
        reg.create_wallet(owner, index, 10).unwrap();
        let address = reg.get_address(owner, index, 11).unwrap();

        let payload = [0x03u8, 0x00];
        assert!(matches!(
            reg.sign_message(stranger, address, &payload, 12, 100),
            Err(LiqError::AssetUnknown)
        ));
    }

    #[test]
    fn same_block_enroll_and_sign_is_blocked() {
        // A policy that creates a wallet, leases itself an asset, and tries
        // to sign for it all in the same block must fail at the sign step:
        // the lease's policy cell hasn't finalized yet.
        let reg = registry(15);
        let owner = Principal([1u8; 20]);
        let policy = Principal([9u8; 20]);
        let index = AccountIndex([2u8; 32]);
        reg.create_wallet(owner, index, 10).unwrap();
        let address = reg.get_address(owner, index, 11).unwrap();

        reg.enter_encumbrance(
            owner,
            index,
            &[AssetTag::ETH_SIGNED_MESSAGE],
            policy,
            1_000,
            b"",
            12,
            100,
        )
        .unwrap();

        let payload = [0x19u8, 0x45, b'h', b'i'];
        assert!(matches!(
            reg.sign_message(policy, address, &payload, 12, 100),
            Err(LiqError::Pending)
        ));
        // The next block, the lease is finalized and the sign succeeds.
        let sig = reg.sign_message(policy, address, &payload, 13, 100).unwrap();
        assert!(!sig.0.is_empty());
    }

    #[test]
    fn double_encumbrance_before_expiry_is_refused() {
        let reg = registry(5);
        let owner = Principal([1u8; 20]);
        let index = AccountIndex([2u8; 32]);
        reg.create_wallet(owner, index, 10).unwrap();

        reg.enter_encumbrance(
            owner,
            index,
            &[AssetTag::ETH_TRANSACTION],
            Principal([8u8; 20]),
            1_000,
            b"",
            11,
            100,
        )
        .unwrap();

        let result = reg.enter_encumbrance(
            owner,
            index,
            &[AssetTag::ETH_TRANSACTION],
            Principal([7u8; 20]),
            2_000,
            b"",
            12,
            200,
        );
        assert!(matches!(result, Err(LiqError::AlreadyEncumbered)));
    }

    #[test]
    fn transfer_ownership_moves_wallet_to_new_owner() {
        let reg = registry(6);
        let alice = Principal([1u8; 20]);
        let bob = Principal([2u8; 20]);
        let index = AccountIndex([3u8; 32]);
        reg.create_wallet(alice, index, 10).unwrap();

        let new_index = reg.transfer_ownership(alice, index, bob, 11).unwrap();

        assert!(matches!(
            reg.get_address(alice, index, 12),
            Err(LiqError::WalletNotFound)
        ));
        assert!(reg.get_address(bob, new_index, 12).is_ok());
    }

    #[test]
    fn export_round_trip() {
        let reg = registry(7);
        let owner = Principal([1u8; 20]);
        let index = AccountIndex([2u8; 32]);
        reg.create_wallet(owner, index, 10).unwrap();
        let original_address = reg.get_address(owner, index, 11).unwrap();

        let counterparty_secret = X25519SecretKey::random_from_rng(rand::thread_rng());
        let counterparty_public = X25519PublicKey::from(&counterparty_secret);
        let proof = envelope::seal_with(
            &counterparty_secret,
            &counterparty_public,
            &reg.export_public_key(),
            &export_proof_message(&original_address),
        );

        reg.enter_encumbrance(
            owner,
            index,
            &[AssetTag::ETH_SIGNED_MESSAGE],
            Principal([9u8; 20]),
            500,
            b"",
            20,
            100,
        )
        .unwrap();

        // The lease's expiry (500) is still ahead of `now`: refused as too early.
        assert!(matches!(
            reg.request_key_export(
                owner,
                index,
                proof.sender_pubkey,
                proof.ciphertext.clone(),
                proof.nonce,
                21,
                100,
            ),
            Err(LiqError::CommitmentTooEarly)
        ));

        reg.request_key_export(
            owner,
            index,
            proof.sender_pubkey,
            proof.ciphertext,
            proof.nonce,
            21,
            600,
        )
        .unwrap();

        assert!(matches!(
            reg.export_key(owner, index, 21),
            Err(LiqError::Pending)
        ));

        let sealed = reg.export_key(owner, index, 22).unwrap();
        let opened = envelope::open(&counterparty_secret, &sealed).unwrap();
        let recovered = liq_crypto::KeyPair::from_raw_secret(&opened).unwrap();
        assert_eq!(recovered.address, original_address);

        reg.destroy_exported_key(owner, index, 22).unwrap();
        let payload = [0x19u8, 0x45, b'h', b'i'];
        assert!(matches!(
            reg.sign_message(Principal([9u8; 20]), original_address, &payload, 23, 700),
            Err(LiqError::Exported)
        ));
    }
}
