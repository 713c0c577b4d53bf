//! The encrypted account record: AES-256-CBC over the four secret fields
//! with an HMAC-SHA256 seal, laid out across primary-element pages.
//!
//! The four fields are ciphered in one continuous CBC context, so the
//! record is a single 160-byte ciphertext split across five pages rather
//! than four independently encrypted values. Field boundaries (32, 64, 32,
//! 32) are all block multiples, which keeps the page split exact. The seal
//! covers the IV page and the full ciphertext; verification happens before
//! any decryption.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::Aes256;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::derivation::{self, AccountKeys};
use crate::layout::{
    self, AUTH_SPAN_LEN, CIPHERTEXT_LEN, IV_USED_LEN, PAGE_ENTROPY, PAGE_HMAC, PAGE_IV,
    PAGE_PARAM, PAGE_RESERVED, PAGE_SEED_H32, PAGE_SEED_L32, PAGE_SLIP39_EMS,
};
use crate::platform::Hardware;
use crate::types::{AccountIndex, AccountMeta, AccountSecret};
use crate::{seed, KeystoreError, KeystoreResult};

type HmacSha256 = Hmac<Sha256>;

/// Ciphertext pages in record order.
const RECORD_PAGES: [u32; 5] = [
    PAGE_ENTROPY,
    PAGE_SEED_H32,
    PAGE_SEED_L32,
    PAGE_SLIP39_EMS,
    PAGE_RESERVED,
];

/// Encrypts `secret` under `password` and persists the full record for
/// `account`.
///
/// Fresh key pieces are always committed, so every save rotates the
/// working keys. `meta.entropy_len` is taken from the secret itself. For a
/// new account the master fingerprint is derived from the seed, stored
/// into `meta`, and the meta page is persisted alongside the record.
///
/// # Errors
///
/// Returns a hardware error if any page write or RNG call fails; the
/// record is then left incomplete and unreadable, never partially valid.
pub fn save_account_secret(
    hardware: &Hardware,
    account: AccountIndex,
    secret: &AccountSecret,
    password: &str,
    new_account: bool,
    meta: &mut AccountMeta,
) -> KeystoreResult<()> {
    meta.entropy_len = secret.entropy_len;
    let keys = derivation::derive_account_keys(hardware, account, password, true)?;

    let mut iv_page = Zeroizing::new([0u8; 32]);
    hardware.trng.fill(iv_page.as_mut())?;

    let mut buf = Zeroizing::new([0u8; CIPHERTEXT_LEN]);
    buf[..32].copy_from_slice(&secret.entropy);
    buf[32..96].copy_from_slice(&secret.seed);
    buf[96..128].copy_from_slice(&secret.slip39_ems);
    buf[128..].copy_from_slice(&secret.reserved);
    encrypt_record(&keys, &iv_page[..IV_USED_LEN], &mut buf);

    let tag = seal(&keys, &iv_page, &buf);

    hardware.primary.write_page(layout::page(account, PAGE_IV), &iv_page)?;
    for (i, offset) in RECORD_PAGES.iter().enumerate() {
        let mut page = [0u8; 32];
        page.copy_from_slice(&buf[i * 32..(i + 1) * 32]);
        hardware.primary.write_page(layout::page(account, *offset), &page)?;
    }
    hardware.primary.write_page(layout::page(account, PAGE_HMAC), &tag)?;

    if new_account {
        let seed_material = secret.seed_bytes(meta.mnemonic_kind);
        meta.mfp = seed::master_fingerprint(seed_material)?;
        hardware
            .primary
            .write_page(layout::page(account, PAGE_PARAM), &meta.to_page())?;
    }
    Ok(())
}

/// Reads, authenticates and decrypts the record for `account` under
/// `password`.
///
/// # Errors
///
/// Returns [`KeystoreError::AuthenticationFailed`] if the recomputed seal
/// does not match the stored one, which covers both a wrong password and
/// any tampered page. Nothing is decrypted in that case.
pub fn load_account_secret(
    hardware: &Hardware,
    account: AccountIndex,
    password: &str,
) -> KeystoreResult<(AccountSecret, AccountMeta)> {
    let keys = derivation::derive_account_keys(hardware, account, password, false)?;

    let iv_page = Zeroizing::new(hardware.primary.read_page(layout::page(account, PAGE_IV))?);
    let mut buf = Zeroizing::new([0u8; CIPHERTEXT_LEN]);
    for (i, offset) in RECORD_PAGES.iter().enumerate() {
        let page = hardware.primary.read_page(layout::page(account, *offset))?;
        buf[i * 32..(i + 1) * 32].copy_from_slice(&page);
    }
    let stored_tag = hardware.primary.read_page(layout::page(account, PAGE_HMAC))?;

    let tag = seal(&keys, &iv_page, &buf);
    if !bool::from(tag.ct_eq(&stored_tag)) {
        return Err(KeystoreError::AuthenticationFailed);
    }

    decrypt_record(&keys, &iv_page[..IV_USED_LEN], &mut buf);

    let meta_page = hardware.primary.read_page(layout::page(account, PAGE_PARAM))?;
    let meta = AccountMeta::from_page(&meta_page);

    let mut secret = AccountSecret::empty();
    secret.entropy.copy_from_slice(&buf[..32]);
    // The meta page sits outside the sealed span; never let it index past
    // the fixed buffers.
    secret.entropy_len = if meta.entropy_len == 0 || usize::from(meta.entropy_len) > 32 {
        32
    } else {
        meta.entropy_len
    };
    secret.seed.copy_from_slice(&buf[32..96]);
    secret.slip39_ems.copy_from_slice(&buf[96..128]);
    secret.reserved.copy_from_slice(&buf[128..]);
    Ok((secret, meta))
}

/// HMAC-SHA256 over `IV page ‖ ciphertext` with the authentication key.
fn seal(keys: &AccountKeys, iv_page: &[u8; 32], ciphertext: &[u8; CIPHERTEXT_LEN]) -> [u8; 32] {
    let mut span = Zeroizing::new([0u8; AUTH_SPAN_LEN]);
    span[..32].copy_from_slice(iv_page);
    span[32..].copy_from_slice(ciphertext);

    let mut mac = HmacSha256::new_from_slice(keys.auth_key())
        .expect("HMAC accepts any key length");
    mac.update(span.as_ref());
    mac.finalize().into_bytes().into()
}

/// In-place CBC encryption of the whole record in one cipher context.
fn encrypt_record(keys: &AccountKeys, iv: &[u8], buf: &mut [u8; CIPHERTEXT_LEN]) {
    let mut cipher =
        cbc::Encryptor::<Aes256>::new(keys.enc_key().into(), GenericArray::from_slice(iv));
    for block in buf.chunks_exact_mut(16) {
        cipher.encrypt_block_mut(GenericArray::from_mut_slice(block));
    }
}

/// In-place CBC decryption, mirroring [`encrypt_record`].
fn decrypt_record(keys: &AccountKeys, iv: &[u8], buf: &mut [u8; CIPHERTEXT_LEN]) {
    let mut cipher =
        cbc::Decryptor::<Aes256>::new(keys.enc_key().into(), GenericArray::from_slice(iv));
    for block in buf.chunks_exact_mut(16) {
        cipher.decrypt_block_mut(GenericArray::from_mut_slice(block));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::memory::MemoryHardware;
    use crate::types::MnemonicKind;

    fn account() -> AccountIndex {
        AccountIndex::new(1).unwrap()
    }

    fn sample_secret() -> AccountSecret {
        let mut secret = AccountSecret::empty();
        secret.entropy[..24].copy_from_slice(&[0xAB; 24]);
        secret.entropy_len = 24;
        secret.seed = [0x11; 64];
        secret.slip39_ems = [0x22; 32];
        secret.reserved = [0x33; 32];
        secret
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let memory = MemoryHardware::new(21);
        let hardware = memory.hardware();
        let mut meta = AccountMeta {
            entropy_len: 24,
            ..AccountMeta::default()
        };

        save_account_secret(&hardware, account(), &sample_secret(), "pw", true, &mut meta)
            .unwrap();
        assert_ne!(meta.mfp, [0u8; 4]);

        let (secret, loaded_meta) = load_account_secret(&hardware, account(), "pw").unwrap();
        assert_eq!(secret, sample_secret());
        assert_eq!(loaded_meta, meta);
    }

    #[test]
    fn test_wrong_password_is_authentication_failure() {
        let memory = MemoryHardware::new(21);
        let hardware = memory.hardware();
        let mut meta = AccountMeta::default();
        save_account_secret(&hardware, account(), &sample_secret(), "pw", true, &mut meta)
            .unwrap();

        let err = load_account_secret(&hardware, account(), "other").unwrap_err();
        assert!(matches!(err, KeystoreError::AuthenticationFailed));
    }

    #[test]
    fn test_any_tampered_page_is_rejected() {
        for offset in [
            PAGE_IV,
            PAGE_ENTROPY,
            PAGE_SEED_H32,
            PAGE_SEED_L32,
            PAGE_SLIP39_EMS,
            PAGE_RESERVED,
            PAGE_HMAC,
        ] {
            let memory = MemoryHardware::new(21);
            let hardware = memory.hardware();
            let mut meta = AccountMeta::default();
            save_account_secret(&hardware, account(), &sample_secret(), "pw", true, &mut meta)
                .unwrap();

            let page = layout::page(account(), offset);
            let mut data = memory.primary.peek_page(page);
            data[5] ^= 0x40;
            memory.primary.poke_page(page, data);

            let err = load_account_secret(&hardware, account(), "pw").unwrap_err();
            assert!(matches!(err, KeystoreError::AuthenticationFailed));
        }
    }

    #[test]
    fn test_oversized_meta_length_is_clamped() {
        let memory = MemoryHardware::new(21);
        let hardware = memory.hardware();
        let mut meta = AccountMeta::default();
        save_account_secret(&hardware, account(), &sample_secret(), "pw", true, &mut meta)
            .unwrap();

        // The meta page sits outside the sealed span, so a corrupted
        // length still passes authentication. It must decode as 32, not
        // index past the fixed buffers.
        let page = layout::page(account(), PAGE_PARAM);
        let mut data = memory.primary.peek_page(page);
        data[0] = 200;
        memory.primary.poke_page(page, data);

        let (secret, loaded_meta) = load_account_secret(&hardware, account(), "pw").unwrap();
        assert_eq!(secret.entropy_len, 32);
        assert_eq!(secret.entropy_bytes().len(), 32);
        assert_eq!(loaded_meta.effective_entropy_len(), 32);
    }

    #[test]
    fn test_save_derives_meta_length_from_secret() {
        let memory = MemoryHardware::new(21);
        let hardware = memory.hardware();
        let mut meta = AccountMeta::default();
        save_account_secret(&hardware, account(), &sample_secret(), "pw", true, &mut meta)
            .unwrap();
        assert_eq!(meta.entropy_len, 24);

        let (secret, _) = load_account_secret(&hardware, account(), "pw").unwrap();
        assert_eq!(secret.entropy_len, 24);
    }

    #[test]
    fn test_legacy_meta_defaults_entropy_len() {
        let memory = MemoryHardware::new(21);
        let hardware = memory.hardware();
        let mut secret = sample_secret();
        secret.entropy = [0x55; 32];
        secret.entropy_len = 32;
        let mut meta = AccountMeta::default();
        save_account_secret(&hardware, account(), &secret, "pw", true, &mut meta).unwrap();

        // Wipe the meta page the way a pre-meta firmware would leave it.
        memory
            .primary
            .poke_page(layout::page(account(), PAGE_PARAM), [0u8; 32]);

        let (loaded, loaded_meta) = load_account_secret(&hardware, account(), "pw").unwrap();
        assert_eq!(loaded.entropy_len, 32);
        assert_eq!(loaded_meta.mnemonic_kind, MnemonicKind::Bip39);
    }

    #[test]
    fn test_every_save_rotates_ciphertext() {
        let memory = MemoryHardware::new(21);
        let hardware = memory.hardware();
        let mut meta = AccountMeta::default();
        save_account_secret(&hardware, account(), &sample_secret(), "pw", true, &mut meta)
            .unwrap();
        let first = memory.primary.peek_page(layout::page(account(), PAGE_ENTROPY));

        save_account_secret(&hardware, account(), &sample_secret(), "pw", false, &mut meta)
            .unwrap();
        let second = memory.primary.peek_page(layout::page(account(), PAGE_ENTROPY));
        assert_ne!(first, second);

        let (secret, _) = load_account_secret(&hardware, account(), "pw").unwrap();
        assert_eq!(secret, sample_secret());
    }
}
