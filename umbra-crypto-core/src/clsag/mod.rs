//! CLSAG linkable ring signatures
//!
//! One signature per transaction input. The signer proves knowledge of the
//! one-time secret behind one ring member and of the mask difference
//! between that member's commitment and the input's pseudo-output, and
//! publishes the key image that links any two spends of the same output.
//!
//! `c1` is the challenge that enters ring index 0.

pub mod constants;
pub mod hash;
pub mod sign;
pub mod types;
pub mod verify;

pub use constants::{pad_domain_separator, CLSAG_AGG_0, CLSAG_AGG_1, CLSAG_DOMAIN, MIN_RING_SIZE};
pub use hash::{compute_mixing_coefficients, RoundHasher};
pub use sign::sign_clsag;
pub use types::{ClsagRing, ClsagSignature, SignedClsag};
pub use verify::verify_clsag;
