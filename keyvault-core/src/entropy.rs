//! Initial-entropy generation from three independent hardware sources.
//!
//! The user's password seeds an input block which is then stretched against
//! a sample from each RNG in turn: the MCU TRNG first, then the on-chip
//! RNGs of both secure elements. An attacker must control every source to
//! bias the result; any single honest RNG keeps the output unpredictable.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::layout::{ENTROPY_MAX_LEN, LABEL_ENTROPY_STRETCH, LABEL_GENERATE_ENTROPY};
use crate::platform::Hardware;
use crate::{derivation, KeystoreError, KeystoreResult};

/// Rounds of HKDF stretching applied per entropy source.
const STRETCH_ROUNDS: usize = 700;

/// Generates `len` bytes of mnemonic entropy mixed from the MCU TRNG and
/// both secure-element RNGs, seeded by the account password.
///
/// # Arguments
///
/// - `len`: output length in bytes, 16 to 32 and a multiple of 4 (the
///   BIP-39 strengths 128 to 256 bits).
///
/// # Errors
///
/// Returns [`KeystoreError::InvalidParameter`] for an out-of-range length
/// and a hardware error if any RNG fails. On failure no entropy is
/// produced and all intermediate buffers are zeroized.
pub fn generate_entropy(
    hardware: &Hardware,
    password: &str,
    len: usize,
) -> KeystoreResult<Zeroizing<Vec<u8>>> {
    if !(16..=ENTROPY_MAX_LEN).contains(&len) || len % 4 != 0 {
        return Err(KeystoreError::invalid_parameter(
            "len",
            format!("entropy length must be 16..=32 and a multiple of 4, got {len}"),
        ));
    }

    let mut block = Zeroizing::new(derivation::salted_digest(
        LABEL_GENERATE_ENTROPY,
        password.as_bytes(),
    ));

    let mut sample = Zeroizing::new([0u8; 32]);
    hardware.trng.fill(sample.as_mut())?;
    stretch(&mut block, &sample);

    hardware.primary.random(sample.as_mut())?;
    stretch(&mut block, &sample);

    hardware.secondary.random(sample.as_mut())?;
    stretch(&mut block, &sample);

    let mut out = Zeroizing::new(vec![0u8; len]);
    out.copy_from_slice(&block[..len]);
    Ok(out)
}

/// Iterated HKDF-SHA256 of `block` keyed by `sample`, in place.
fn stretch(block: &mut Zeroizing<[u8; 32]>, sample: &[u8; 32]) {
    for _ in 0..STRETCH_ROUNDS {
        let hk = Hkdf::<Sha256>::new(Some(sample.as_ref()), block.as_ref());
        // 32-byte output from SHA-256 HKDF can never exceed the expand limit.
        hk.expand(LABEL_ENTROPY_STRETCH, block.as_mut())
            .expect("32-byte HKDF-SHA256 output is within the expand limit");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::platform::memory::{MemoryHardware, MemoryOtp, MemorySecureElement, MemoryTrng};

    fn hardware_with(trng: u64, primary: u64, secondary: u64) -> Hardware {
        Hardware {
            primary: Arc::new(MemorySecureElement::new("primary", primary)),
            secondary: Arc::new(MemorySecureElement::new("secondary", secondary)),
            trng: Arc::new(MemoryTrng::new(trng)),
            otp: Arc::new(MemoryOtp::new()),
        }
    }

    #[test]
    fn test_deterministic_for_fixed_sources() {
        let a = generate_entropy(&MemoryHardware::new(3).hardware(), "pw", 32).unwrap();
        let b = generate_entropy(&MemoryHardware::new(3).hardware(), "pw", 32).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_password_changes_output() {
        let a = generate_entropy(&MemoryHardware::new(3).hardware(), "pw", 32).unwrap();
        let b = generate_entropy(&MemoryHardware::new(3).hardware(), "other", 32).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_each_source_changes_output() {
        let baseline = generate_entropy(&hardware_with(1, 2, 3), "pw", 32).unwrap();
        // Vary exactly one source per case; each must perturb the output.
        let trng_only = generate_entropy(&hardware_with(9, 2, 3), "pw", 32).unwrap();
        let primary_only = generate_entropy(&hardware_with(1, 9, 3), "pw", 32).unwrap();
        let secondary_only = generate_entropy(&hardware_with(1, 2, 9), "pw", 32).unwrap();
        assert_ne!(baseline, trng_only);
        assert_ne!(baseline, primary_only);
        assert_ne!(baseline, secondary_only);
    }

    #[test]
    fn test_all_valid_lengths() {
        let memory = MemoryHardware::new(3);
        let hardware = memory.hardware();
        for len in [16, 20, 24, 28, 32] {
            let out = generate_entropy(&hardware, "pw", len).unwrap();
            assert_eq!(out.len(), len);
        }
    }

    #[test]
    fn test_rejects_bad_lengths() {
        let memory = MemoryHardware::new(3);
        let hardware = memory.hardware();
        for len in [0, 12, 15, 17, 33, 64] {
            let err = generate_entropy(&hardware, "pw", len).unwrap_err();
            assert!(matches!(err, KeystoreError::InvalidParameter { .. }));
        }
    }

    #[test]
    fn test_rng_failure_aborts() {
        let memory = MemoryHardware::new(3);
        let hardware = memory.hardware();
        memory.trng.set_failing(true);
        let err = generate_entropy(&hardware, "pw", 32).unwrap_err();
        assert!(matches!(err, KeystoreError::Hardware { .. }));
    }
}
