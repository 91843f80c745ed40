//! Error types for cryptographic operations
//!
//! This module defines all error types used throughout umbra-crypto-core.
//! Errors are categorized by the operation that caused them.

use alloc::string::String;
use core::fmt;

/// Result type alias for cryptographic operations
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Comprehensive error type for all cryptographic operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    // =========================================================================
    // Scalar / Point Errors
    // =========================================================================
    /// Scalar bytes are not the canonical encoding of a value below ℓ
    NonCanonicalScalar(String),

    /// Bytes do not decompress to a curve point
    InvalidPoint(String),

    /// Point decompressed but lies outside the prime-order subgroup
    TorsionedPoint(String),

    /// Scalar that must be invertible was zero
    ZeroScalar(String),

    // =========================================================================
    // Address Errors
    // =========================================================================
    /// Base58 decode failed
    Base58DecodeFailed(String),

    /// Address checksum mismatch
    ChecksumMismatch {
        /// Expected checksum (hex)
        expected: String,
        /// Actual checksum (hex)
        actual: String,
    },

    /// Invalid address length
    InvalidAddressLength {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Address tag byte does not belong to any known network
    InvalidAddressPrefix(u8),

    // =========================================================================
    // CLSAG Errors
    // =========================================================================
    /// Ring size too small
    RingSizeTooSmall {
        /// Actual ring size
        actual: usize,
        /// Minimum required
        minimum: usize,
    },

    /// Signer index out of ring bounds
    SignerIndexOutOfBounds {
        /// The signer index
        index: usize,
        /// Ring size
        ring_size: usize,
    },

    /// Ring keys and ring commitments differ in length
    RingLengthMismatch {
        /// Number of ring keys
        keys: usize,
        /// Number of ring commitments
        commitments: usize,
    },

    /// Secret key does not open the public key at the signer index
    SecretKeyMismatch,

    /// Commitment difference `C_π - C_pseudo` is not `z·G`
    CommitmentMaskMismatch,

    /// Freshly produced signature failed its own ring check
    ClsagVerificationFailed(String),

    // =========================================================================
    // Bulletproof-Plus Errors
    // =========================================================================
    /// Amounts and masks vectors differ in length
    AmountsMasksMismatch {
        /// Number of amounts
        amounts: usize,
        /// Number of masks
        masks: usize,
    },

    /// More amounts than a single aggregated proof can carry
    TooManyAmounts {
        /// Number requested
        actual: usize,
        /// Maximum supported
        maximum: usize,
    },

    /// Proof requested for zero amounts
    NoAmounts,

    /// Amount does not fit the 64-bit range
    AmountOutOfRange(String),

    // =========================================================================
    // General Errors
    // =========================================================================
    /// Hex decode failed
    HexDecodeFailed(String),

    /// Invalid input length
    InvalidLength {
        /// Name of the field
        field: String,
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Internal error (should not happen in normal operation)
    InternalError(String),
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Scalar / Point
            CryptoError::NonCanonicalScalar(field) => {
                write!(f, "Non-canonical scalar: {field}")
            }
            CryptoError::InvalidPoint(field) => {
                write!(f, "Invalid curve point: {field}")
            }
            CryptoError::TorsionedPoint(field) => {
                write!(f, "Point outside prime-order subgroup: {field}")
            }
            CryptoError::ZeroScalar(field) => {
                write!(f, "Scalar must be nonzero: {field}")
            }

            // Address
            CryptoError::Base58DecodeFailed(msg) => {
                write!(f, "Base58 decode failed: {msg}")
            }
            CryptoError::ChecksumMismatch { expected, actual } => {
                write!(
                    f,
                    "Address checksum mismatch: expected {expected}, got {actual}"
                )
            }
            CryptoError::InvalidAddressLength { expected, actual } => {
                write!(
                    f,
                    "Invalid address length: expected {expected}, got {actual}"
                )
            }
            CryptoError::InvalidAddressPrefix(tag) => {
                write!(f, "Invalid address prefix: 0x{tag:02x}")
            }

            // CLSAG
            CryptoError::RingSizeTooSmall { actual, minimum } => {
                write!(f, "Ring size {actual} too small, minimum is {minimum}")
            }
            CryptoError::SignerIndexOutOfBounds { index, ring_size } => {
                write!(
                    f,
                    "Signer index {index} out of bounds for ring size {ring_size}"
                )
            }
            CryptoError::RingLengthMismatch { keys, commitments } => {
                write!(
                    f,
                    "Ring has {keys} keys but {commitments} commitments"
                )
            }
            CryptoError::SecretKeyMismatch => {
                write!(f, "Secret key does not match the ring member at the signer index")
            }
            CryptoError::CommitmentMaskMismatch => {
                write!(f, "Commitment difference does not open to the mask delta")
            }
            CryptoError::ClsagVerificationFailed(msg) => {
                write!(f, "CLSAG verification failed: {msg}")
            }

            // Bulletproof-Plus
            CryptoError::AmountsMasksMismatch { amounts, masks } => {
                write!(
                    f,
                    "amounts and masks length mismatch: {amounts} amounts vs {masks} masks"
                )
            }
            CryptoError::TooManyAmounts { actual, maximum } => {
                write!(f, "too many amounts: {actual} (maximum {maximum})")
            }
            CryptoError::NoAmounts => {
                write!(f, "range proof requires at least one amount")
            }
            CryptoError::AmountOutOfRange(msg) => {
                write!(f, "amount out of range: {msg}")
            }

            // General
            CryptoError::HexDecodeFailed(msg) => {
                write!(f, "Hex decode failed: {msg}")
            }
            CryptoError::InvalidLength {
                field,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Invalid {field} length: expected {expected}, got {actual}"
                )
            }
            CryptoError::InternalError(msg) => {
                write!(f, "Internal error: {msg}")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CryptoError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CryptoError::AmountsMasksMismatch {
            amounts: 2,
            masks: 3,
        };
        assert!(err.to_string().contains("2 amounts vs 3 masks"));
    }

    #[test]
    fn test_error_equality() {
        assert_eq!(CryptoError::NoAmounts, CryptoError::NoAmounts);
        assert_ne!(
            CryptoError::InvalidPoint("R".into()),
            CryptoError::InvalidPoint("P".into())
        );
    }

    #[test]
    fn test_checksum_error() {
        let err = CryptoError::ChecksumMismatch {
            expected: "abcd".into(),
            actual: "1234".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("abcd"));
        assert!(msg.contains("1234"));
    }
}
