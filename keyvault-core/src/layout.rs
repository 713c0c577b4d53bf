//! On-element page layout and domain-separation labels.
//!
//! Each account slot owns a fixed run of 32-byte pages on the primary
//! secure element, addressed as `account_index * PAGES_PER_ACCOUNT + offset`.
//! The secondary element holds one key-piece page per account in its own
//! address space.

#![allow(clippy::cast_lossless)] // u8 -> u32 widening in const fns

use crate::types::AccountIndex;

/// Size of one secure-element page in bytes.
pub const PAGE_SIZE: usize = 32;

/// Pages reserved per account slot on the primary element.
///
/// Ten are currently used; the remaining two are spare.
pub const PAGES_PER_ACCOUNT: u32 = 12;

/// Page offset of the AES IV (32 bytes stored, first 16 used).
pub const PAGE_IV: u32 = 0;
/// Page offset of the encrypted entropy field.
pub const PAGE_ENTROPY: u32 = 1;
/// Page offset of the high half of the encrypted seed.
pub const PAGE_SEED_H32: u32 = 2;
/// Page offset of the low half of the encrypted seed.
pub const PAGE_SEED_L32: u32 = 3;
/// Page offset of the encrypted SLIP39 encrypted-master-secret field.
pub const PAGE_SLIP39_EMS: u32 = 4;
/// Page offset of the encrypted reserved field.
pub const PAGE_RESERVED: u32 = 5;
/// Page offset of the HMAC tag over IV and all ciphertext fields.
pub const PAGE_HMAC: u32 = 6;
/// Page offset of the primary element's masked key piece.
pub const PAGE_KEY_PIECE: u32 = 7;
/// Page offset of the salted password hash.
pub const PAGE_PASSWORD_HASH: u32 = 8;
/// Page offset of the account metadata record.
pub const PAGE_PARAM: u32 = 9;

/// IV length as stored (first [`IV_USED_LEN`] bytes feed the cipher).
pub const IV_LEN: usize = 32;
/// Bytes of the stored IV actually used by AES-256-CBC.
pub const IV_USED_LEN: usize = 16;
/// Maximum entropy length in bytes.
pub const ENTROPY_MAX_LEN: usize = 32;
/// Seed length in bytes.
pub const SEED_LEN: usize = 64;
/// SLIP39 encrypted-master-secret length in bytes.
pub const SLIP39_EMS_LEN: usize = 32;
/// Reserved (forward-compatibility) field length in bytes.
pub const RESERVED_LEN: usize = 32;
/// HMAC-SHA256 tag length in bytes.
pub const HMAC_LEN: usize = 32;

/// Total ciphertext length: entropy, seed, EMS and reserved fields.
pub const CIPHERTEXT_LEN: usize = ENTROPY_MAX_LEN + SEED_LEN + SLIP39_EMS_LEN + RESERVED_LEN;
/// Byte span covered by the authentication tag: IV plus all ciphertext.
pub const AUTH_SPAN_LEN: usize = IV_LEN + CIPHERTEXT_LEN;

/// Maximum passphrase length in bytes.
pub const PASSPHRASE_MAX_LEN: usize = 128;

// Domain Separation Labels

/// Label hashing the password into the entropy-mixer input block.
pub(crate) const LABEL_GENERATE_ENTROPY: &[u8] = b"keyvault:generate-entropy";
/// Label for the HKDF key-stretch rounds in the entropy mixer.
pub(crate) const LABEL_ENTROPY_STRETCH: &[u8] = b"keyvault:entropy-stretch";
/// Label for the stored password hash.
pub(crate) const LABEL_PASSWORD_HASH: &[u8] = b"keyvault:password-hash";
/// Label masking the primary element's key piece.
pub(crate) const LABEL_PIECE_PRIMARY: &[u8] = b"keyvault:piece-primary";
/// Label masking the secondary element's key piece.
pub(crate) const LABEL_PIECE_SECONDARY: &[u8] = b"keyvault:piece-secondary";
/// Label combining the two key pieces before the SHA-512 split.
pub(crate) const LABEL_COMBINE_PIECES: &[u8] = b"keyvault:combine-pieces";

/// Returns the absolute primary-element page for an account-relative offset.
#[must_use]
pub const fn page(account: AccountIndex, offset: u32) -> u32 {
    account.as_u8() as u32 * PAGES_PER_ACCOUNT + offset
}

/// Returns the secondary element's key-piece page for an account.
#[must_use]
pub const fn secondary_piece_page(account: AccountIndex) -> u32 {
    account.as_u8() as u32
}
