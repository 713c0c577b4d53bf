//! Error types for the keystore core.

use thiserror::Error;

/// Errors surfaced by keystore operations.
///
/// Password and authentication failures are distinct from hardware failures
/// so a caller can tell "wrong password, try again" apart from "device
/// fault" without ever seeing secret material.
#[derive(Debug, Error)]
pub enum KeystoreError {
    /// A secure-element, TRNG or OTP operation failed. Terminal for the
    /// operation; retries happen in the transport layer below, not here.
    #[error("hardware i/o failed: {context}")]
    Hardware {
        /// Operation that failed.
        context: String,
    },

    /// The stored record's HMAC did not verify against the derived
    /// authentication key. Tampering, corruption, or a wrong key; no
    /// plaintext was released.
    #[error("stored account record failed authentication")]
    AuthenticationFailed,

    /// No account slot's stored hash matches the supplied password.
    #[error("password does not match any account")]
    PasswordMismatch,

    /// The password is already in use by another account slot.
    #[error("password already used by another account")]
    DuplicatePassword,

    /// No account is currently selected.
    #[error("no account is logged in")]
    NotLoggedIn,

    /// An argument violated this crate's contract.
    #[error("invalid input '{parameter}': {reason}")]
    InvalidParameter {
        /// Name of the offending parameter.
        parameter: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// Mnemonic encoding or seed derivation failed.
    #[error("mnemonic error: {message}")]
    Mnemonic {
        /// Error message from the mnemonic library.
        message: String,
    },
}

impl KeystoreError {
    /// Creates a hardware error with context.
    pub fn hardware<S: Into<String>>(context: S) -> Self {
        Self::Hardware {
            context: context.into(),
        }
    }

    /// Creates an invalid-parameter error.
    pub fn invalid_parameter<S: Into<String>>(parameter: &'static str, reason: S) -> Self {
        Self::InvalidParameter {
            parameter,
            reason: reason.into(),
        }
    }

    /// Creates a mnemonic error.
    pub fn mnemonic<S: Into<String>>(message: S) -> Self {
        Self::Mnemonic {
            message: message.into(),
        }
    }
}
