//! Secret-management core for a hardware wallet built around two secure
//! elements and an MCU with one-time-programmable key storage.
//!
//! The crate owns everything between "the user typed a password" and
//! "32-byte pages on the secure elements": entropy generation mixed from
//! three hardware RNGs, an authenticated-encryption codec for the account
//! record, split-trust key derivation where neither element alone can
//! reconstruct a working key, password routing over three account slots
//! and volatile passphrase wallets on top of the stored secret.
//!
//! Hardware is reached only through the traits in [`platform`], so the
//! whole crate runs unmodified against the in-memory doubles in
//! [`platform::memory`].
//!
//! # Example
//!
//! ```
//! use keyvault_core::platform::memory::MemoryHardware;
//! use keyvault_core::{AccountIndex, Keystore};
//!
//! # fn main() -> Result<(), keyvault_core::KeystoreError> {
//! let memory = MemoryHardware::new(7);
//! let mut keystore = Keystore::new(memory.hardware());
//!
//! let entropy = keystore.generate_entropy("correct horse", 32)?;
//! let slot = keystore.blank_account_index()?.unwrap();
//! keystore.create_account(slot, &entropy, "correct horse")?;
//!
//! let seed = keystore.account_seed("correct horse")?;
//! assert_eq!(seed.len(), 64);
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod derivation;
pub mod entropy;
mod error;
pub mod keystore;
pub mod layout;
pub mod passphrase;
pub mod password;
pub mod platform;
pub mod seed;
mod types;

pub use error::KeystoreError;
pub use keystore::Keystore;
pub use passphrase::{KeystoreSession, PassphraseInfo};
pub use types::{AccountIndex, AccountMeta, AccountSecret, MnemonicKind, ACCOUNT_COUNT};

/// Result type for all fallible keystore operations.
pub type KeystoreResult<T> = Result<T, KeystoreError>;
