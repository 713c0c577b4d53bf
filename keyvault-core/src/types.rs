//! Core data types: account indices, metadata, and the plaintext secret
//! bundle.

// Slot counts and lengths all fit in u8; casts here are width changes only.
#![allow(clippy::cast_lossless)]
#![allow(clippy::cast_possible_truncation)]

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::layout::{ENTROPY_MAX_LEN, PAGE_SIZE, RESERVED_LEN, SEED_LEN, SLIP39_EMS_LEN};

/// Number of independent account slots on one device.
pub const ACCOUNT_COUNT: usize = 3;

/// A validated account slot index in `{0, 1, 2}`.
///
/// "No account selected" is represented as `Option<AccountIndex>::None`
/// rather than a sentinel value, so out-of-range access is unrepresentable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AccountIndex(u8);

impl AccountIndex {
    /// Creates an index from a raw slot number, `None` if out of range.
    #[must_use]
    pub const fn new(raw: u8) -> Option<Self> {
        if raw < ACCOUNT_COUNT as u8 {
            Some(Self(raw))
        } else {
            None
        }
    }

    /// Returns the raw slot number.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self.0
    }

    /// Returns the slot number as a `usize` for array indexing.
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Iterates all three slots in order.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..ACCOUNT_COUNT as u8).map(Self)
    }
}

impl std::fmt::Display for AccountIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How the account's secret material was produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MnemonicKind {
    /// BIP39 mnemonic; the seed field holds the full 64-byte BIP39 seed.
    #[default]
    Bip39 = 0,
    /// SLIP39 Shamir shares; the seed field holds the master secret and the
    /// EMS field holds the encrypted master secret.
    Slip39 = 1,
}

impl MnemonicKind {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Slip39,
            _ => Self::Bip39,
        }
    }
}

/// The plaintext secret bundle for one account.
///
/// Exists only transiently in memory during create, read and
/// password-change operations; every copy is overwritten with zero on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct AccountSecret {
    /// Raw entropy, first `entropy_len` bytes valid.
    pub entropy: [u8; ENTROPY_MAX_LEN],
    /// Valid length of `entropy` in bytes.
    pub entropy_len: u8,
    /// 64-byte seed (BIP39 seed, or SLIP39 master-secret material in the
    /// leading `entropy_len` bytes).
    pub seed: [u8; SEED_LEN],
    /// SLIP39 encrypted master secret (zero for BIP39 accounts).
    pub slip39_ems: [u8; SLIP39_EMS_LEN],
    /// Reserved for future layout extensions.
    pub reserved: [u8; RESERVED_LEN],
}

impl AccountSecret {
    /// Creates an all-zero secret bundle.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            entropy: [0u8; ENTROPY_MAX_LEN],
            entropy_len: 0,
            seed: [0u8; SEED_LEN],
            slip39_ems: [0u8; SLIP39_EMS_LEN],
            reserved: [0u8; RESERVED_LEN],
        }
    }

    /// Returns the valid slice of the entropy field.
    #[must_use]
    pub fn entropy_bytes(&self) -> &[u8] {
        &self.entropy[..self.entropy_len as usize]
    }

    /// Returns the seed bytes used for fingerprint and signing derivation:
    /// the full 64 bytes for BIP39, the master-secret prefix for SLIP39.
    #[must_use]
    pub fn seed_bytes(&self, kind: MnemonicKind) -> &[u8] {
        match kind {
            MnemonicKind::Bip39 => &self.seed[..],
            MnemonicKind::Slip39 => &self.seed[..self.entropy_len as usize],
        }
    }
}

impl std::fmt::Debug for AccountSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountSecret")
            .field("entropy_len", &self.entropy_len)
            .field("material", &"[REDACTED]")
            .finish()
    }
}

/// Account metadata persisted in the plain PARAM page.
///
/// Holds no secret material: lengths, the mnemonic kind, SLIP39 share
/// parameters and the base master fingerprint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AccountMeta {
    /// Stored entropy length; `0` means "unset" and decodes as 32.
    pub entropy_len: u8,
    /// Mnemonic scheme of this account.
    pub mnemonic_kind: MnemonicKind,
    /// SLIP39 random identifier (zero for BIP39 accounts).
    pub slip39_id: u16,
    /// SLIP39 iteration exponent (zero for BIP39 accounts).
    pub slip39_ie: u8,
    /// Master fingerprint of the base (no-passphrase) wallet.
    pub mfp: [u8; 4],
}

impl AccountMeta {
    /// Effective entropy length in bytes, always in `1..=32`.
    ///
    /// Records written before the length field existed carry zero here;
    /// those decode as 32 bytes. The meta page is not covered by the
    /// record seal, so an out-of-range stored value also decodes as 32
    /// rather than driving an out-of-bounds slice.
    #[must_use]
    pub const fn effective_entropy_len(&self) -> usize {
        if self.entropy_len == 0 || self.entropy_len as usize > ENTROPY_MAX_LEN {
            ENTROPY_MAX_LEN
        } else {
            self.entropy_len as usize
        }
    }

    /// Encodes the metadata into its 32-byte page image.
    #[must_use]
    pub fn to_page(&self) -> [u8; PAGE_SIZE] {
        let mut page = [0u8; PAGE_SIZE];
        page[0] = self.entropy_len;
        page[1] = self.mnemonic_kind as u8;
        page[2..4].copy_from_slice(&self.slip39_id.to_le_bytes());
        page[4] = self.slip39_ie;
        page[5..9].copy_from_slice(&self.mfp);
        page
    }

    /// Decodes metadata from its 32-byte page image.
    #[must_use]
    pub fn from_page(page: &[u8; PAGE_SIZE]) -> Self {
        Self {
            entropy_len: page[0],
            mnemonic_kind: MnemonicKind::from_u8(page[1]),
            slip39_id: u16::from_le_bytes([page[2], page[3]]),
            slip39_ie: page[4],
            mfp: [page[5], page[6], page[7], page[8]],
        }
    }
}
