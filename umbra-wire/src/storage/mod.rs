//! Portable storage
//!
//! The self-describing key/value container every peer-protocol payload is
//! written in. [`Section`] is the entry tree; [`to_bytes`] and
//! [`from_bytes`] convert it to and from a stream.

pub mod codec;
pub mod value;
pub mod varint;

pub use codec::{from_bytes, to_bytes, FORMAT_VERSION, SIGNATURE_A, SIGNATURE_B};
pub use value::{Array, Section, Value};
