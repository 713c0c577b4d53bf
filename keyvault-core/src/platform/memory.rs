//! In-memory implementations of the hardware traits for testing.
//!
//! These implementations are NOT secure for production use. They are
//! designed for unit and integration testing of the keystore without real
//! secure elements.

// Test-double code; panics on poisoned locks are acceptable here.
#![allow(clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::error::KeystoreError;
use crate::KeystoreResult;

use super::{Hardware, OtpKeyStore, SecureElement, Trng};

/// In-memory secure element backed by a page map and a seeded RNG.
///
/// Fault injection: [`set_failing`](Self::set_failing) makes every
/// subsequent call return a hardware error, for exercising abort paths.
pub struct MemorySecureElement {
    name: &'static str,
    pages: RwLock<HashMap<u32, [u8; 32]>>,
    rng: Mutex<StdRng>,
    failing: AtomicBool,
}

impl MemorySecureElement {
    /// Creates an element with an RNG seeded from `seed`.
    #[must_use]
    pub fn new(name: &'static str, seed: u64) -> Self {
        Self {
            name,
            pages: RwLock::new(HashMap::new()),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            failing: AtomicBool::new(false),
        }
    }

    /// Toggles fault injection for all subsequent calls.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Returns a copy of a page without the trait's failure semantics,
    /// for test assertions and tamper injection.
    #[must_use]
    pub fn peek_page(&self, page: u32) -> [u8; 32] {
        self.pages
            .read()
            .unwrap()
            .get(&page)
            .copied()
            .unwrap_or([0u8; 32])
    }

    /// Overwrites a page directly, bypassing failure injection.
    pub fn poke_page(&self, page: u32, data: [u8; 32]) {
        self.pages.write().unwrap().insert(page, data);
    }

    fn check(&self) -> KeystoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(KeystoreError::hardware(format!(
                "{} transport failure (injected)",
                self.name
            )));
        }
        Ok(())
    }
}

impl SecureElement for MemorySecureElement {
    fn read_page(&self, page: u32) -> KeystoreResult<[u8; 32]> {
        self.check()?;
        Ok(self.peek_page(page))
    }

    fn write_page(&self, page: u32, data: &[u8; 32]) -> KeystoreResult<()> {
        self.check()?;
        self.pages.write().unwrap().insert(page, *data);
        Ok(())
    }

    fn random(&self, buf: &mut [u8]) -> KeystoreResult<()> {
        self.check()?;
        self.rng.lock().unwrap().fill_bytes(buf);
        Ok(())
    }
}

/// In-memory TRNG backed by a seeded `StdRng`.
pub struct MemoryTrng {
    rng: Mutex<StdRng>,
    failing: AtomicBool,
}

impl MemoryTrng {
    /// Creates a TRNG seeded from `seed`.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            failing: AtomicBool::new(false),
        }
    }

    /// Toggles fault injection for all subsequent calls.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl Trng for MemoryTrng {
    fn fill(&self, buf: &mut [u8]) -> KeystoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(KeystoreError::hardware("trng failure (injected)"));
        }
        self.rng.lock().unwrap().fill_bytes(buf);
        Ok(())
    }
}

/// In-memory one-time-programmable key slot.
pub struct MemoryOtp {
    key: RwLock<Option<[u8; 32]>>,
}

impl MemoryOtp {
    /// Creates a blank OTP slot.
    #[must_use]
    pub fn new() -> Self {
        Self {
            key: RwLock::new(None),
        }
    }

    /// Returns the programmed key, if any.
    #[must_use]
    pub fn programmed_key(&self) -> Option<[u8; 32]> {
        *self.key.read().unwrap()
    }
}

impl Default for MemoryOtp {
    fn default() -> Self {
        Self::new()
    }
}

impl OtpKeyStore for MemoryOtp {
    fn read(&self) -> KeystoreResult<Option<[u8; 32]>> {
        Ok(*self.key.read().unwrap())
    }

    fn program(&self, key: &[u8; 32]) -> KeystoreResult<()> {
        let mut slot = self.key.write().unwrap();
        debug_assert!(slot.is_none(), "OTP slot programmed twice");
        *slot = Some(*key);
        Ok(())
    }
}

/// Combines all in-memory doubles for easy test setup.
pub struct MemoryHardware {
    /// Primary element double.
    pub primary: Arc<MemorySecureElement>,
    /// Secondary element double.
    pub secondary: Arc<MemorySecureElement>,
    /// TRNG double.
    pub trng: Arc<MemoryTrng>,
    /// OTP double.
    pub otp: Arc<MemoryOtp>,
}

impl MemoryHardware {
    /// Creates a bundle with RNGs seeded from `seed` (distinct streams per
    /// source).
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            primary: Arc::new(MemorySecureElement::new("primary", seed ^ 0xA5A5)),
            secondary: Arc::new(MemorySecureElement::new("secondary", seed ^ 0x5A5A)),
            trng: Arc::new(MemoryTrng::new(seed)),
            otp: Arc::new(MemoryOtp::new()),
        }
    }

    /// Returns the trait-object bundle the keystore consumes.
    #[must_use]
    pub fn hardware(&self) -> Hardware {
        Hardware {
            primary: self.primary.clone(),
            secondary: self.secondary.clone(),
            trng: self.trng.clone(),
            otp: self.otp.clone(),
        }
    }
}
