//! Core type definitions for umbra-crypto-core
//!
//! This module contains:
//! - Error types for cryptographic operations
//! - Address types and decoded-address layout

pub mod address;
pub mod errors;

// Re-export error types
pub use errors::{CryptoError, CryptoResult};

// Re-export address types
pub use address::{
    AddressType, DecodedAddress, CHECKSUM_LENGTH, INTEGRATED_ADDRESS_DECODED_LENGTH,
    INTEGRATED_ADDRESS_LENGTH, PAYMENT_ID_LENGTH, PUBLIC_KEY_LENGTH,
    STANDARD_ADDRESS_DECODED_LENGTH, STANDARD_ADDRESS_LENGTH,
};
