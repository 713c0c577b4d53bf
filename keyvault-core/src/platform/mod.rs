//! Hardware abstraction for the keystore core.
//!
//! The keystore reaches all hardware through three traits:
//!
//! - [`SecureElement`] — keyed 32-byte page read/write plus an on-chip RNG.
//!   Two independent instances back the split-trust key derivation.
//! - [`Trng`] — the MCU's general-purpose hardware RNG.
//! - [`OtpKeyStore`] — the MCU's one-time-programmable key area.
//!
//! Transport-level retries live below these traits; a call either returns
//! data or a terminal error. In-memory doubles for all three live in
//! [`memory`] and make the crate fully testable without hardware.

pub mod memory;

use std::sync::Arc;

use crate::KeystoreResult;

/// One secure element: an authenticated page store with an on-chip RNG.
///
/// Page contents are protected by the element's own transport encryption;
/// this layer treats `read_page`/`write_page` as plaintext 32-byte slots.
/// Reads of never-written pages return all-zero.
pub trait SecureElement: Send + Sync {
    /// Reads one 32-byte page.
    ///
    /// # Errors
    ///
    /// Returns a hardware error if the element transport fails.
    fn read_page(&self, page: u32) -> KeystoreResult<[u8; 32]>;

    /// Writes one 32-byte page atomically.
    ///
    /// # Errors
    ///
    /// Returns a hardware error if the element transport fails.
    fn write_page(&self, page: u32, data: &[u8; 32]) -> KeystoreResult<()>;

    /// Fills `buf` from the element's hardware RNG.
    ///
    /// # Errors
    ///
    /// Returns a hardware error if the element transport fails.
    fn random(&self, buf: &mut [u8]) -> KeystoreResult<()>;
}

/// The MCU's general-purpose true random number generator.
pub trait Trng: Send + Sync {
    /// Fills `buf` with hardware randomness.
    ///
    /// # Errors
    ///
    /// Returns a hardware error if the generator fails.
    fn fill(&self, buf: &mut [u8]) -> KeystoreResult<()>;
}

/// The MCU's one-time-programmable 32-byte key slot.
///
/// The key stored here never leaves the MCU; it is XOR-combined into the
/// account encryption key so that compromising the secure elements alone
/// is not sufficient to decrypt a stored secret.
pub trait OtpKeyStore: Send + Sync {
    /// Reads the programmed key, `None` if the slot is still blank.
    ///
    /// # Errors
    ///
    /// Returns a hardware error if the OTP area cannot be read.
    fn read(&self) -> KeystoreResult<Option<[u8; 32]>>;

    /// Programs the key slot. Write-once; programming a non-blank slot is
    /// a contract violation.
    ///
    /// # Errors
    ///
    /// Returns a hardware error if the OTP area cannot be written.
    fn program(&self, key: &[u8; 32]) -> KeystoreResult<()>;
}

/// The full hardware bundle the keystore operates on.
#[derive(Clone)]
pub struct Hardware {
    /// Primary secure element: account record pages, password hashes, one
    /// masked key piece per account.
    pub primary: Arc<dyn SecureElement>,
    /// Secondary secure element: the other masked key piece per account.
    pub secondary: Arc<dyn SecureElement>,
    /// MCU hardware RNG.
    pub trng: Arc<dyn Trng>,
    /// MCU one-time-programmable key slot.
    pub otp: Arc<dyn OtpKeyStore>,
}
