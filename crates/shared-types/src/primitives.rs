//! # Primitives
//!
//! Hashes, asset identifiers and human-readable account names.

use std::fmt;
use std::str::FromStr;

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

use crate::errors::TypeError;

/// A 32-byte Keccak-256 hash.
pub type Hash = [u8; 32];

/// The all-zero hash.
pub const EMPTY_HASH: Hash = [0u8; 32];

/// Identifier of a fungible asset.
pub type AssetId = u64;

/// Keccak-256 of arbitrary bytes.
#[must_use]
pub fn keccak256(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Keccak-256 of the canonical (bincode) encoding of a value.
pub fn keccak_encoded<T: Serialize + ?Sized>(value: &T) -> Hash {
    keccak256(&bincode::serialize(value).unwrap_or_default())
}

/// Hash of empty code.
#[must_use]
pub fn empty_code_hash() -> Hash {
    keccak256(&[])
}

/// Short hex rendering of a hash for logs.
#[must_use]
pub fn short_hex(hash: &Hash) -> String {
    hex::encode(&hash[..6])
}

/// A human-readable account identifier.
///
/// Names are 2 to 31 bytes long, start with a lowercase letter and contain
/// lowercase letters, digits and single interior dots (`sys.fee`).
///
/// Inside the VM a name is carried as a 256-bit word with the ASCII bytes
/// right-aligned; see [`Name::to_word`] and [`Name::from_word`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Name(pub(crate) String);

impl Name {
    /// Minimum name length in bytes.
    pub const MIN_LEN: usize = 2;
    /// Maximum name length in bytes. Keeps every name inside one VM word.
    pub const MAX_LEN: usize = 31;

    /// Validate and build a name.
    pub fn new(value: impl Into<String>) -> Result<Self, TypeError> {
        let value = value.into();
        let len = value.len();
        if !(Self::MIN_LEN..=Self::MAX_LEN).contains(&len) {
            return Err(TypeError::NameLength {
                len,
                min: Self::MIN_LEN,
                max: Self::MAX_LEN,
            });
        }

        let bytes = value.as_bytes();
        let well_formed = bytes[0].is_ascii_lowercase()
            && bytes[len - 1] != b'.'
            && !value.contains("..")
            && bytes
                .iter()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'.');
        if !well_formed {
            return Err(TypeError::NameFormat(value));
        }
        Ok(Self(value))
    }

    /// The name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Encode as a VM word (big-endian, right-aligned ASCII).
    #[must_use]
    pub fn to_word(&self) -> U256 {
        U256::from_big_endian(self.0.as_bytes())
    }

    /// Decode a VM word produced by [`Name::to_word`].
    pub fn from_word(word: U256) -> Result<Self, TypeError> {
        let mut buf = [0u8; 32];
        word.to_big_endian(&mut buf);
        let start = buf.iter().position(|b| *b != 0).unwrap_or(buf.len());
        let text = std::str::from_utf8(&buf[start..]).map_err(|_| TypeError::NotAName)?;
        Self::new(text)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Name {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Name {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Name> for String {
    fn from(name: Name) -> Self {
        name.0
    }
}

impl AsRef<str> for Name {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
