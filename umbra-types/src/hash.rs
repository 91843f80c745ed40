//! Fixed 32-byte identifiers.
//!
//! Block ids, transaction ids, prefix hashes and key images share one
//! representation but are distinct types, so a prefix hash can never be
//! passed where a block id is expected.

use alloc::string::String;
use core::fmt;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Length of every hash-like identifier.
pub const HASH_LENGTH: usize = 32;

/// Error returned when parsing an identifier from hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashParseError {
    /// Input was not valid hex
    InvalidHex,
    /// Input decoded to the wrong number of bytes
    InvalidLength(usize),
}

impl fmt::Display for HashParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashParseError::InvalidHex => write!(f, "invalid hex"),
            HashParseError::InvalidLength(len) => {
                write!(f, "expected {HASH_LENGTH} bytes, got {len}")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for HashParseError {}

macro_rules! hash_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(pub [u8; HASH_LENGTH]);

        impl $name {
            /// All-zero value
            pub const ZERO: Self = Self([0u8; HASH_LENGTH]);

            /// Wrap raw bytes
            #[must_use]
            pub const fn new(bytes: [u8; HASH_LENGTH]) -> Self {
                Self(bytes)
            }

            /// Borrow the raw bytes
            #[must_use]
            pub const fn as_bytes(&self) -> &[u8; HASH_LENGTH] {
                &self.0
            }

            /// Copy out the raw bytes
            #[must_use]
            pub const fn to_bytes(self) -> [u8; HASH_LENGTH] {
                self.0
            }

            /// Build from a byte slice of exactly 32 bytes
            pub fn from_slice(bytes: &[u8]) -> Result<Self, HashParseError> {
                let array: [u8; HASH_LENGTH] = bytes
                    .try_into()
                    .map_err(|_| HashParseError::InvalidLength(bytes.len()))?;
                Ok(Self(array))
            }

            /// Parse from 64 hex characters
            pub fn from_hex(s: &str) -> Result<Self, HashParseError> {
                let bytes = hex::decode(s).map_err(|_| HashParseError::InvalidHex)?;
                Self::from_slice(&bytes)
            }

            /// Lower-case hex encoding
            #[must_use]
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl From<[u8; HASH_LENGTH]> for $name {
            fn from(bytes: [u8; HASH_LENGTH]) -> Self {
                Self(bytes)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_hex(&s).map_err(de::Error::custom)
            }
        }
    };
}

hash_newtype!(
    /// Block identifier (Keccak-256 of the block hashing blob)
    BlockHash
);

hash_newtype!(
    /// Transaction identifier
    TxId
);

hash_newtype!(
    /// Keccak-256 over a transaction prefix; the message CLSAG binds to
    PrefixHash
);

hash_newtype!(
    /// Compressed key image, unique per spent output
    KeyImageBytes
);
