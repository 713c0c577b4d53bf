//! Seed material: BIP-39 seed derivation, SLIP-39 master-secret recovery
//! and the BIP-32 master fingerprint.

use bip32::{PrivateKey, PublicKey, XPrv};
use bip39::Mnemonic;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::layout::SEED_LEN;
use crate::{KeystoreError, KeystoreResult};

/// Feistel rounds of the SLIP-39 master-secret cipher.
const SLIP39_ROUNDS: u8 = 4;
/// Per-round PBKDF2 iteration base; shifted left by the share's iteration
/// exponent.
const SLIP39_BASE_ITERATIONS: u32 = 2500;

/// Derives the 64-byte BIP-39 seed from raw entropy and a passphrase.
///
/// The entropy is first mapped back to its mnemonic sentence, then run
/// through the standard PBKDF2 seed derivation. An empty passphrase yields
/// the default wallet.
///
/// # Errors
///
/// Returns [`KeystoreError::Mnemonic`] if the entropy length is not a
/// valid BIP-39 strength.
pub fn bip39_seed(entropy: &[u8], passphrase: &str) -> KeystoreResult<Zeroizing<[u8; SEED_LEN]>> {
    let mnemonic =
        Mnemonic::from_entropy(entropy).map_err(|e| KeystoreError::mnemonic(e.to_string()))?;
    Ok(Zeroizing::new(mnemonic.to_seed(passphrase)))
}

/// Recovers the SLIP-39 master secret from the encrypted master secret.
///
/// Implements the SLIP-0039 four-round Feistel decryption keyed by the
/// passphrase, the share identifier and the iteration exponent. A wrong
/// passphrase silently yields a different wallet, as the standard
/// prescribes.
///
/// # Errors
///
/// Returns [`KeystoreError::InvalidParameter`] if the encrypted master
/// secret has an odd length or is shorter than 16 bytes.
pub fn slip39_master_secret(
    encrypted: &[u8],
    passphrase: &str,
    identifier: u16,
    iteration_exponent: u8,
) -> KeystoreResult<Zeroizing<Vec<u8>>> {
    if encrypted.len() < 16 || encrypted.len() % 2 != 0 {
        return Err(KeystoreError::invalid_parameter(
            "encrypted",
            format!(
                "encrypted master secret must be an even length of at least 16, got {}",
                encrypted.len()
            ),
        ));
    }
    let half = encrypted.len() / 2;
    let iterations = SLIP39_BASE_ITERATIONS << iteration_exponent;

    let mut left = Zeroizing::new(encrypted[..half].to_vec());
    let mut right = Zeroizing::new(encrypted[half..].to_vec());
    let mut f = Zeroizing::new(vec![0u8; half]);

    for round in (0..SLIP39_ROUNDS).rev() {
        round_function(round, passphrase, identifier, iterations, &right, &mut f);
        for (l, fi) in left.iter_mut().zip(f.iter()) {
            *l ^= fi;
        }
        std::mem::swap(&mut left, &mut right);
    }

    // The final swap leaves the plaintext as right ‖ left.
    let mut secret = Zeroizing::new(Vec::with_capacity(encrypted.len()));
    secret.extend_from_slice(&right);
    secret.extend_from_slice(&left);
    Ok(secret)
}

/// The SLIP-0039 round function: PBKDF2-HMAC-SHA256 keyed by the round
/// index and passphrase, salted by the share identifier and the opposite
/// half-block.
fn round_function(
    round: u8,
    passphrase: &str,
    identifier: u16,
    iterations: u32,
    block: &[u8],
    out: &mut [u8],
) {
    let mut password = Zeroizing::new(Vec::with_capacity(1 + passphrase.len()));
    password.push(round);
    password.extend_from_slice(passphrase.as_bytes());

    let mut salt = Vec::with_capacity(6 + 2 + block.len());
    salt.extend_from_slice(b"shamir");
    salt.extend_from_slice(&identifier.to_be_bytes());
    salt.extend_from_slice(block);

    pbkdf2_hmac::<Sha256>(&password, &salt, iterations, out);
}

/// Derives the BIP-32 master key fingerprint from a seed.
///
/// # Errors
///
/// Returns [`KeystoreError::Mnemonic`] if the seed cannot produce a valid
/// master key.
pub fn master_fingerprint(seed: &[u8]) -> KeystoreResult<[u8; 4]> {
    let root = XPrv::new(seed).map_err(|e| KeystoreError::mnemonic(e.to_string()))?;
    Ok(root.private_key().public_key().fingerprint())
}
