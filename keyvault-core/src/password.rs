//! Password authority over the three account slots.
//!
//! Each slot stores one salted password digest in a plain page on the
//! primary element. The digest gates nothing by itself; it only routes a
//! login attempt to a slot. Real authentication is the record seal, which
//! a wrong password cannot reproduce.

use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::layout::{self, LABEL_PASSWORD_HASH, PAGE_PASSWORD_HASH};
use crate::platform::Hardware;
use crate::types::AccountIndex;
use crate::{derivation, KeystoreError, KeystoreResult};

/// Salted digest of a candidate password, as stored in the hash page.
fn password_digest(password: &str) -> Zeroizing<[u8; 32]> {
    Zeroizing::new(derivation::salted_digest(
        LABEL_PASSWORD_HASH,
        password.as_bytes(),
    ))
}

/// Persists the digest of `password` into the slot of `account`.
///
/// # Errors
///
/// Returns a hardware error if the page write fails.
pub fn write_password_hash(
    hardware: &Hardware,
    account: AccountIndex,
    password: &str,
) -> KeystoreResult<()> {
    hardware.primary.write_page(
        layout::page(account, PAGE_PASSWORD_HASH),
        &password_digest(password),
    )
}

/// Resolves `password` to the account slot it belongs to.
///
/// Slots are scanned in index order; the first digest match wins.
/// Comparisons are constant-time per slot. A blank slot stores the
/// all-zero page and can never match a digest.
///
/// # Errors
///
/// Returns [`KeystoreError::PasswordMismatch`] if no slot matches, and a
/// hardware error if any hash page cannot be read.
pub fn verify_password(hardware: &Hardware, password: &str) -> KeystoreResult<AccountIndex> {
    let candidate = password_digest(password);
    for account in AccountIndex::all() {
        let stored = hardware
            .primary
            .read_page(layout::page(account, PAGE_PASSWORD_HASH))?;
        if bool::from(candidate.ct_eq(&stored)) {
            return Ok(account);
        }
    }
    Err(KeystoreError::PasswordMismatch)
}

/// Checks whether `password` is already in use by a slot other than
/// `exclude`, returning the colliding slot.
///
/// Used before account creation (`exclude` = `None`) and before a
/// password change (`exclude` = the account being changed, so keeping the
/// current password is not a collision).
///
/// # Errors
///
/// Returns a hardware error if any hash page cannot be read.
pub fn password_in_use(
    hardware: &Hardware,
    password: &str,
    exclude: Option<AccountIndex>,
) -> KeystoreResult<Option<AccountIndex>> {
    let candidate = password_digest(password);
    for account in AccountIndex::all() {
        if Some(account) == exclude {
            continue;
        }
        let stored = hardware
            .primary
            .read_page(layout::page(account, PAGE_PASSWORD_HASH))?;
        if bool::from(candidate.ct_eq(&stored)) {
            return Ok(Some(account));
        }
    }
    Ok(None)
}
