//! Volatile per-account passphrase state.
//!
//! A passphrase selects a hidden wallet on top of the stored secret. It is
//! never persisted: it lives only in this session state and is dropped on
//! logout or power loss, at which point the device falls back to the base
//! wallet.

#![allow(clippy::module_name_repetitions)]

use secrecy::{ExposeSecret, SecretString};

use crate::types::{AccountIndex, ACCOUNT_COUNT};

/// One active passphrase and the fingerprint of the wallet it selects.
pub struct PassphraseInfo {
    passphrase: SecretString,
    mfp: [u8; 4],
}

impl PassphraseInfo {
    /// The passphrase itself.
    #[must_use]
    pub fn passphrase(&self) -> &str {
        self.passphrase.expose_secret()
    }

    /// Master fingerprint of the passphrase wallet.
    #[must_use]
    pub const fn mfp(&self) -> [u8; 4] {
        self.mfp
    }
}

impl std::fmt::Debug for PassphraseInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassphraseInfo")
            .field("passphrase", &"[REDACTED]")
            .field("mfp", &hex::encode(self.mfp))
            .finish()
    }
}

/// Session state: the logged-in account and any active passphrases.
///
/// A slot holds `Some` exactly when a non-empty passphrase is active for
/// that account, so "passphrase exists" is a plain `is_some` check.
#[derive(Debug, Default)]
pub struct KeystoreSession {
    slots: [Option<PassphraseInfo>; ACCOUNT_COUNT],
    current: Option<AccountIndex>,
}

impl KeystoreSession {
    /// The logged-in account, `None` when logged out.
    #[must_use]
    pub const fn current(&self) -> Option<AccountIndex> {
        self.current
    }

    /// Marks `account` as logged in.
    pub fn login(&mut self, account: AccountIndex) {
        self.current = Some(account);
    }

    /// Logs out and drops every active passphrase.
    pub fn logout(&mut self) {
        self.current = None;
        for slot in &mut self.slots {
            *slot = None;
        }
    }

    /// Activates `passphrase` for `account`; an empty passphrase clears
    /// the slot instead.
    pub fn set_passphrase(&mut self, account: AccountIndex, passphrase: &str, mfp: [u8; 4]) {
        self.slots[account.as_usize()] = if passphrase.is_empty() {
            None
        } else {
            Some(PassphraseInfo {
                passphrase: SecretString::from(passphrase.to_owned()),
                mfp,
            })
        };
    }

    /// Drops the passphrase of `account`, reverting it to the base wallet.
    pub fn clear_passphrase(&mut self, account: AccountIndex) {
        self.slots[account.as_usize()] = None;
    }

    /// The active passphrase of `account`, if any.
    #[must_use]
    pub fn passphrase(&self, account: AccountIndex) -> Option<&PassphraseInfo> {
        self.slots[account.as_usize()].as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idx(raw: u8) -> AccountIndex {
        AccountIndex::new(raw).unwrap()
    }

    #[test]
    fn test_empty_passphrase_clears_slot() {
        let mut session = KeystoreSession::default();
        session.set_passphrase(idx(0), "hidden", [1, 2, 3, 4]);
        assert!(session.passphrase(idx(0)).is_some());

        session.set_passphrase(idx(0), "", [0; 4]);
        assert!(session.passphrase(idx(0)).is_none());
    }

    #[test]
    fn test_slots_are_isolated() {
        let mut session = KeystoreSession::default();
        session.set_passphrase(idx(1), "only-one", [9, 9, 9, 9]);
        assert!(session.passphrase(idx(0)).is_none());
        assert_eq!(session.passphrase(idx(1)).unwrap().passphrase(), "only-one");
        assert!(session.passphrase(idx(2)).is_none());
    }

    #[test]
    fn test_logout_drops_everything() {
        let mut session = KeystoreSession::default();
        session.login(idx(2));
        session.set_passphrase(idx(0), "a", [0; 4]);
        session.set_passphrase(idx(2), "b", [0; 4]);

        session.logout();
        assert_eq!(session.current(), None);
        for i in 0..3 {
            assert!(session.passphrase(idx(i)).is_none());
        }
    }

    #[test]
    fn test_debug_redacts_passphrase() {
        let mut session = KeystoreSession::default();
        session.set_passphrase(idx(0), "top-secret", [0; 4]);
        let rendered = format!("{session:?}");
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("top-secret"));
    }
}
