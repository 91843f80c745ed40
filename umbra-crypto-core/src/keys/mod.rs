//! Key handling
//!
//! - [`address`]: base58 address decoding with checksum verification
//! - [`scan`]: the view/spend key set held by a scanner
//! - [`image`]: key images and one-time spend secrets

pub mod address;
pub mod base58;
pub mod image;
pub mod scan;

pub use address::{decode_address, decode_address_bytes, encode_address};
pub use image::{compute_key_image, derive_key_image, KeyImageResult};
pub use scan::ScanKeys;
