//! Working-key derivation for one (account, password) pair.
//!
//! Two 32-byte key pieces live on the two secure elements, each committed
//! as `piece XOR H(label ‖ password)` so that recovering a piece requires
//! both the element contents and the password. The pieces are hashed
//! together and split through SHA-512 into the AES and HMAC working keys;
//! the AES key is additionally XOR-combined with a key that exists only in
//! MCU one-time-programmable storage. Breaking account secrecy therefore
//! requires compromising both secure elements *and* the MCU.

use sha2::{Digest, Sha256, Sha512};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::layout::{
    self, LABEL_COMBINE_PIECES, LABEL_PIECE_PRIMARY, LABEL_PIECE_SECONDARY, PAGE_KEY_PIECE,
};
use crate::platform::{Hardware, SecureElement};
use crate::types::AccountIndex;
use crate::KeystoreResult;

/// The AES and HMAC working keys for one (account, password) pair.
///
/// Zeroized on drop; never persisted.
pub struct AccountKeys {
    enc_key: [u8; 32],
    auth_key: [u8; 32],
}

impl AccountKeys {
    /// The AES-256-CBC encryption key.
    #[must_use]
    pub const fn enc_key(&self) -> &[u8; 32] {
        &self.enc_key
    }

    /// The HMAC-SHA256 authentication key.
    #[must_use]
    pub const fn auth_key(&self) -> &[u8; 32] {
        &self.auth_key
    }
}

impl Zeroize for AccountKeys {
    fn zeroize(&mut self) {
        self.enc_key.zeroize();
        self.auth_key.zeroize();
    }
}

impl Drop for AccountKeys {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl ZeroizeOnDrop for AccountKeys {}

impl std::fmt::Debug for AccountKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountKeys")
            .field("keys", &"[REDACTED]")
            .finish()
    }
}

/// SHA-256 over `label ‖ data` under a fixed domain-separation label.
#[must_use]
pub(crate) fn salted_digest(label: &[u8], data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(label);
    hasher.update(data);
    hasher.finalize().into()
}

/// Derives the working keys for `account` under `password`.
///
/// With `new_pieces` set, fresh random pieces are generated and committed
/// to both elements (account creation and password change); otherwise the
/// previously committed pieces are recovered. A wrong password yields
/// wrong pieces and therefore wrong keys — detected later by the record
/// HMAC, never by this function.
///
/// # Errors
///
/// Returns a hardware error if an element or the TRNG fails, or if the
/// MCU OTP key cannot be read or programmed on first use.
pub fn derive_account_keys(
    hardware: &Hardware,
    account: AccountIndex,
    password: &str,
    new_pieces: bool,
) -> KeystoreResult<AccountKeys> {
    let primary_page = layout::page(account, PAGE_KEY_PIECE);
    let secondary_page = layout::secondary_piece_page(account);

    let piece_a = if new_pieces {
        commit_key_piece(
            hardware,
            hardware.primary.as_ref(),
            primary_page,
            LABEL_PIECE_PRIMARY,
            password,
        )?
    } else {
        recover_key_piece(
            hardware.primary.as_ref(),
            primary_page,
            LABEL_PIECE_PRIMARY,
            password,
        )?
    };
    let piece_b = if new_pieces {
        commit_key_piece(
            hardware,
            hardware.secondary.as_ref(),
            secondary_page,
            LABEL_PIECE_SECONDARY,
            password,
        )?
    } else {
        recover_key_piece(
            hardware.secondary.as_ref(),
            secondary_page,
            LABEL_PIECE_SECONDARY,
            password,
        )?
    };

    let mut combined = Zeroizing::new([0u8; 64]);
    combined[..32].copy_from_slice(piece_a.as_ref());
    combined[32..].copy_from_slice(piece_b.as_ref());
    let pieces_hash = Zeroizing::new(salted_digest(LABEL_COMBINE_PIECES, combined.as_ref()));

    let split: Zeroizing<[u8; 64]> = Zeroizing::new(Sha512::digest(pieces_hash.as_ref()).into());

    let mut keys = AccountKeys {
        enc_key: [0u8; 32],
        auth_key: [0u8; 32],
    };
    keys.enc_key.copy_from_slice(&split[..32]);
    keys.auth_key.copy_from_slice(&split[32..]);

    let otp_key = mcu_otp_key(hardware)?;
    for (byte, otp_byte) in keys.enc_key.iter_mut().zip(otp_key.iter()) {
        *byte ^= otp_byte;
    }

    Ok(keys)
}

/// Generates a fresh random piece and commits its password-masked image to
/// the element page. Returns the plaintext piece.
fn commit_key_piece(
    hardware: &Hardware,
    element: &dyn SecureElement,
    page: u32,
    label: &[u8],
    password: &str,
) -> KeystoreResult<Zeroizing<[u8; 32]>> {
    let mask = Zeroizing::new(salted_digest(label, password.as_bytes()));
    let mut piece = Zeroizing::new([0u8; 32]);
    hardware.trng.fill(piece.as_mut())?;

    let mut masked = Zeroizing::new([0u8; 32]);
    for (out, (piece_byte, mask_byte)) in masked.iter_mut().zip(piece.iter().zip(mask.iter())) {
        *out = piece_byte ^ mask_byte;
    }
    element.write_page(page, &masked)?;
    Ok(piece)
}

/// Recovers the previously committed piece by unmasking the element page
/// with the password hash.
fn recover_key_piece(
    element: &dyn SecureElement,
    page: u32,
    label: &[u8],
    password: &str,
) -> KeystoreResult<Zeroizing<[u8; 32]>> {
    let mask = Zeroizing::new(salted_digest(label, password.as_bytes()));
    let masked = Zeroizing::new(element.read_page(page)?);

    let mut piece = Zeroizing::new([0u8; 32]);
    for (out, (masked_byte, mask_byte)) in piece.iter_mut().zip(masked.iter().zip(mask.iter())) {
        *out = masked_byte ^ mask_byte;
    }
    Ok(piece)
}

/// Reads the MCU OTP key, generating and programming it on first use.
fn mcu_otp_key(hardware: &Hardware) -> KeystoreResult<Zeroizing<[u8; 32]>> {
    if let Some(key) = hardware.otp.read()? {
        return Ok(Zeroizing::new(key));
    }
    let mut key = Zeroizing::new([0u8; 32]);
    hardware.trng.fill(key.as_mut())?;
    hardware.otp.program(&key)?;
    Ok(key)
}
