//! The keystore facade: account lifecycle, login state and secret access.
//!
//! One [`Keystore`] owns the hardware bundle and the volatile session. All
//! secret access goes through a password; the password is authenticated by
//! the record seal on every load, never by the routing hash alone.

#![allow(clippy::module_name_repetitions)]

use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::layout::{
    self, PAGES_PER_ACCOUNT, PAGE_IV, PAGE_PARAM, PASSPHRASE_MAX_LEN, SLIP39_EMS_LEN,
};
use crate::passphrase::KeystoreSession;
use crate::platform::Hardware;
use crate::types::{AccountIndex, AccountMeta, AccountSecret, MnemonicKind};
use crate::{codec, entropy, password, seed, KeystoreError, KeystoreResult};

/// The secret-management core of the device.
pub struct Keystore {
    hardware: Hardware,
    session: KeystoreSession,
}

impl Keystore {
    /// Builds a keystore over the given hardware bundle, logged out.
    #[must_use]
    pub fn new(hardware: Hardware) -> Self {
        Self {
            hardware,
            session: KeystoreSession::default(),
        }
    }

    // ===== Entropy and account creation =====

    /// Generates mnemonic entropy mixed from all three hardware RNGs.
    ///
    /// # Errors
    ///
    /// See [`entropy::generate_entropy`].
    pub fn generate_entropy(
        &self,
        password: &str,
        len: usize,
    ) -> KeystoreResult<Zeroizing<Vec<u8>>> {
        entropy::generate_entropy(&self.hardware, password, len)
    }

    /// Creates a BIP-39 account in `account` from raw entropy and logs it
    /// in.
    ///
    /// The stored seed is the base (no-passphrase) seed; hidden wallets
    /// are derived on demand from the active passphrase.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoreError::DuplicatePassword`] if another slot
    /// already uses `password`, [`KeystoreError::InvalidParameter`] for an
    /// empty password, [`KeystoreError::Mnemonic`] for an invalid entropy
    /// length and a hardware error if persisting fails.
    pub fn create_account(
        &mut self,
        account: AccountIndex,
        entropy: &[u8],
        password: &str,
    ) -> KeystoreResult<()> {
        self.check_new_password(password, None)?;

        let entropy_len = u8::try_from(entropy.len()).map_err(|_| {
            KeystoreError::invalid_parameter("entropy", "entropy is too long".to_owned())
        })?;
        let base_seed = seed::bip39_seed(entropy, "")?;
        let mut secret = AccountSecret::empty();
        secret.entropy[..entropy.len()].copy_from_slice(entropy);
        secret.entropy_len = entropy_len;
        secret.seed.copy_from_slice(base_seed.as_ref());

        let mut meta = AccountMeta {
            entropy_len: secret.entropy_len,
            mnemonic_kind: MnemonicKind::Bip39,
            ..AccountMeta::default()
        };
        codec::save_account_secret(&self.hardware, account, &secret, password, true, &mut meta)?;
        password::write_password_hash(&self.hardware, account, password)?;
        // Any passphrase left over from a previous occupant of this slot is
        // meaningless for the new secret.
        self.session.clear_passphrase(account);
        self.session.login(account);
        debug!(account = %account, "created bip39 account");
        Ok(())
    }

    /// Creates a SLIP-39 account in `account` from the recovered master
    /// secret and its encrypted form, and logs it in.
    ///
    /// `encrypted_master_secret` is kept verbatim so hidden wallets can be
    /// re-derived later with a different passphrase.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoreError::DuplicatePassword`] if another slot
    /// already uses `password`, [`KeystoreError::InvalidParameter`] for an
    /// empty password or an out-of-range master secret and a hardware
    /// error if persisting fails.
    pub fn create_slip39_account(
        &mut self,
        account: AccountIndex,
        master_secret: &[u8],
        encrypted_master_secret: &[u8; SLIP39_EMS_LEN],
        identifier: u16,
        iteration_exponent: u8,
        password: &str,
    ) -> KeystoreResult<()> {
        self.check_new_password(password, None)?;
        let Ok(master_len) = u8::try_from(master_secret.len()) else {
            return Err(KeystoreError::invalid_parameter(
                "master_secret",
                "master secret is too long".to_owned(),
            ));
        };
        if !(16..=32).contains(&master_len) || master_len % 2 != 0 {
            return Err(KeystoreError::invalid_parameter(
                "master_secret",
                format!("master secret must be an even length of 16..=32, got {master_len}"),
            ));
        }

        let mut secret = AccountSecret::empty();
        secret.entropy[..master_secret.len()].copy_from_slice(master_secret);
        secret.entropy_len = master_len;
        secret.seed[..master_secret.len()].copy_from_slice(master_secret);
        secret.slip39_ems.copy_from_slice(encrypted_master_secret);

        let mut meta = AccountMeta {
            entropy_len: secret.entropy_len,
            mnemonic_kind: MnemonicKind::Slip39,
            slip39_id: identifier,
            slip39_ie: iteration_exponent,
            ..AccountMeta::default()
        };
        codec::save_account_secret(&self.hardware, account, &secret, password, true, &mut meta)?;
        password::write_password_hash(&self.hardware, account, password)?;
        self.session.clear_passphrase(account);
        self.session.login(account);
        debug!(account = %account, "created slip39 account");
        Ok(())
    }

    // ===== Login state =====

    /// Resolves `password` to its account slot without logging in.
    ///
    /// # Errors
    ///
    /// See [`password::verify_password`].
    pub fn verify_password(&self, password: &str) -> KeystoreResult<AccountIndex> {
        password::verify_password(&self.hardware, password)
    }

    /// Verifies `password` and logs its account in.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoreError::PasswordMismatch`] if no slot matches and
    /// a hardware error if the hash pages cannot be read.
    pub fn login(&mut self, password: &str) -> KeystoreResult<AccountIndex> {
        let account = match password::verify_password(&self.hardware, password) {
            Ok(account) => account,
            Err(err) => {
                warn!("login rejected");
                return Err(err);
            }
        };
        self.session.login(account);
        debug!(account = %account, "logged in");
        Ok(account)
    }

    /// Logs out and drops every active passphrase.
    pub fn logout(&mut self) {
        debug!("logged out");
        self.session.logout();
    }

    /// The logged-in account, `None` when logged out.
    #[must_use]
    pub const fn current_account(&self) -> Option<AccountIndex> {
        self.session.current()
    }

    fn require_login(&self) -> KeystoreResult<AccountIndex> {
        self.session.current().ok_or(KeystoreError::NotLoggedIn)
    }

    // ===== Secret access =====

    /// The stored entropy of the logged-in account.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoreError::NotLoggedIn`] when logged out,
    /// [`KeystoreError::AuthenticationFailed`] for a wrong password or a
    /// tampered record and a hardware error if pages cannot be read.
    pub fn account_entropy(&self, password: &str) -> KeystoreResult<Zeroizing<Vec<u8>>> {
        let account = self.require_login()?;
        let (secret, _) = codec::load_account_secret(&self.hardware, account, password)?;
        Ok(Zeroizing::new(secret.entropy_bytes().to_vec()))
    }

    /// The signing seed of the logged-in account, honoring the active
    /// passphrase.
    ///
    /// With no passphrase this is the stored base seed. With one active,
    /// a BIP-39 account re-derives the seed from entropy and passphrase; a
    /// SLIP-39 account re-decrypts the encrypted master secret under the
    /// passphrase.
    ///
    /// # Errors
    ///
    /// As [`Self::account_entropy`], plus [`KeystoreError::Mnemonic`] if
    /// passphrase derivation fails.
    pub fn account_seed(&self, password: &str) -> KeystoreResult<Zeroizing<Vec<u8>>> {
        let account = self.require_login()?;
        let (secret, meta) = codec::load_account_secret(&self.hardware, account, password)?;

        let Some(info) = self.session.passphrase(account) else {
            return Ok(Zeroizing::new(
                secret.seed_bytes(meta.mnemonic_kind).to_vec(),
            ));
        };
        match meta.mnemonic_kind {
            MnemonicKind::Bip39 => {
                let derived = seed::bip39_seed(secret.entropy_bytes(), info.passphrase())?;
                Ok(Zeroizing::new(derived.to_vec()))
            }
            MnemonicKind::Slip39 => seed::slip39_master_secret(
                &secret.slip39_ems[..meta.effective_entropy_len()],
                info.passphrase(),
                meta.slip39_id,
                meta.slip39_ie,
            ),
        }
    }

    /// The stored SLIP-39 encrypted master secret of the logged-in
    /// account.
    ///
    /// # Errors
    ///
    /// As [`Self::account_entropy`].
    pub fn account_slip39_ems(
        &self,
        password: &str,
    ) -> KeystoreResult<Zeroizing<[u8; SLIP39_EMS_LEN]>> {
        let account = self.require_login()?;
        let (secret, _) = codec::load_account_secret(&self.hardware, account, password)?;
        Ok(Zeroizing::new(secret.slip39_ems))
    }

    // ===== Password management =====

    /// Changes the password of the logged-in account.
    ///
    /// The record is re-encrypted under fresh key pieces, so the old
    /// password recovers nothing afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoreError::AuthenticationFailed`] if `old` is wrong,
    /// [`KeystoreError::DuplicatePassword`] if another slot uses `new`,
    /// [`KeystoreError::InvalidParameter`] for an empty new password and a
    /// hardware error if persisting fails.
    pub fn change_password(&mut self, old: &str, new: &str) -> KeystoreResult<()> {
        let account = self.require_login()?;
        self.check_new_password(new, Some(account))?;

        let (secret, mut meta) = codec::load_account_secret(&self.hardware, account, old)?;
        codec::save_account_secret(&self.hardware, account, &secret, new, false, &mut meta)?;
        password::write_password_hash(&self.hardware, account, new)?;
        debug!(account = %account, "password changed");
        Ok(())
    }

    fn check_new_password(
        &self,
        password: &str,
        exclude: Option<AccountIndex>,
    ) -> KeystoreResult<()> {
        if password.is_empty() {
            return Err(KeystoreError::invalid_parameter(
                "password",
                "password must not be empty".to_owned(),
            ));
        }
        if password::password_in_use(&self.hardware, password, exclude)?.is_some() {
            return Err(KeystoreError::DuplicatePassword);
        }
        Ok(())
    }

    // ===== Passphrase =====

    /// Activates `passphrase` for the logged-in account; an empty
    /// passphrase clears the slot.
    ///
    /// The passphrase wallet's master fingerprint is derived immediately,
    /// which also validates the passphrase against the stored secret.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoreError::InvalidParameter`] if the passphrase
    /// exceeds 128 bytes, plus everything [`Self::account_seed`] returns.
    pub fn set_passphrase(&mut self, password: &str, passphrase: &str) -> KeystoreResult<()> {
        let account = self.require_login()?;
        if passphrase.len() > PASSPHRASE_MAX_LEN {
            return Err(KeystoreError::invalid_parameter(
                "passphrase",
                format!(
                    "passphrase must be at most {PASSPHRASE_MAX_LEN} bytes, got {}",
                    passphrase.len()
                ),
            ));
        }
        if passphrase.is_empty() {
            self.session.clear_passphrase(account);
            return Ok(());
        }

        let (secret, meta) = codec::load_account_secret(&self.hardware, account, password)?;
        let hidden_seed = match meta.mnemonic_kind {
            MnemonicKind::Bip39 => {
                Zeroizing::new(seed::bip39_seed(secret.entropy_bytes(), passphrase)?.to_vec())
            }
            MnemonicKind::Slip39 => seed::slip39_master_secret(
                &secret.slip39_ems[..meta.effective_entropy_len()],
                passphrase,
                meta.slip39_id,
                meta.slip39_ie,
            )?,
        };
        let mfp = seed::master_fingerprint(&hidden_seed)?;
        self.session.set_passphrase(account, passphrase, mfp);
        debug!(account = %account, "passphrase set");
        Ok(())
    }

    /// Drops the passphrase of the logged-in account.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoreError::NotLoggedIn`] when logged out.
    pub fn clear_passphrase(&mut self) -> KeystoreResult<()> {
        let account = self.require_login()?;
        self.session.clear_passphrase(account);
        Ok(())
    }

    /// Whether a passphrase is active for the logged-in account.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoreError::NotLoggedIn`] when logged out.
    pub fn passphrase_exists(&self) -> KeystoreResult<bool> {
        let account = self.require_login()?;
        Ok(self.session.passphrase(account).is_some())
    }

    /// Master fingerprint of the wallet currently in effect: the
    /// passphrase wallet when one is active, the stored base wallet
    /// otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoreError::NotLoggedIn`] when logged out and a
    /// hardware error if the meta page cannot be read.
    pub fn master_fingerprint(&self) -> KeystoreResult<[u8; 4]> {
        let account = self.require_login()?;
        if let Some(info) = self.session.passphrase(account) {
            return Ok(info.mfp());
        }
        Ok(self.account_meta(account)?.mfp)
    }

    // ===== Slot accounting =====

    /// Metadata of the logged-in account.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoreError::NotLoggedIn`] when logged out and a
    /// hardware error if the meta page cannot be read.
    pub fn current_account_meta(&self) -> KeystoreResult<AccountMeta> {
        let account = self.require_login()?;
        self.account_meta(account)
    }

    /// Metadata of `account` from its plain meta page.
    ///
    /// # Errors
    ///
    /// Returns a hardware error if the page cannot be read.
    pub fn account_meta(&self, account: AccountIndex) -> KeystoreResult<AccountMeta> {
        let page = self
            .hardware
            .primary
            .read_page(layout::page(account, PAGE_PARAM))?;
        Ok(AccountMeta::from_page(&page))
    }

    /// Erases every page of `account` on both elements and drops its
    /// session state. Logs out if it was the logged-in account.
    ///
    /// # Errors
    ///
    /// Returns a hardware error if any page write fails; erasure then
    /// stops at the failed page.
    pub fn destroy_account(&mut self, account: AccountIndex) -> KeystoreResult<()> {
        let blank = [0u8; 32];
        for offset in 0..PAGES_PER_ACCOUNT {
            self.hardware
                .primary
                .write_page(layout::page(account, offset), &blank)?;
        }
        self.hardware
            .secondary
            .write_page(layout::secondary_piece_page(account), &blank)?;
        self.session.clear_passphrase(account);
        if self.session.current() == Some(account) {
            self.session.logout();
        }
        debug!(account = %account, "account destroyed");
        Ok(())
    }

    /// Number of slots holding an account.
    ///
    /// # Errors
    ///
    /// Returns a hardware error if an IV page cannot be read.
    pub fn existing_account_count(&self) -> KeystoreResult<u8> {
        let mut count = 0;
        for account in AccountIndex::all() {
            if self.slot_in_use(account)? {
                count += 1;
            }
        }
        Ok(count)
    }

    /// The first blank slot, `None` if all three are in use.
    ///
    /// # Errors
    ///
    /// Returns a hardware error if an IV page cannot be read.
    pub fn blank_account_index(&self) -> KeystoreResult<Option<AccountIndex>> {
        for account in AccountIndex::all() {
            if !self.slot_in_use(account)? {
                return Ok(Some(account));
            }
        }
        Ok(None)
    }

    /// A slot is in use when its IV page holds a random value. Blank and
    /// erased pages are uniform (all one byte), a real IV never is.
    fn slot_in_use(&self, account: AccountIndex) -> KeystoreResult<bool> {
        let iv = self
            .hardware
            .primary
            .read_page(layout::page(account, PAGE_IV))?;
        Ok(iv.iter().any(|b| *b != iv[0]))
    }
}

impl std::fmt::Debug for Keystore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keystore")
            .field("current_account", &self.session.current())
            .finish()
    }
}
