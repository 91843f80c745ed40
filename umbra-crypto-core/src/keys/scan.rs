//! Key material held by a scanner.

use curve25519_dalek::constants::ED25519_BASEPOINT_TABLE;
use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use zeroize::Zeroize;

use super::address::decode_address;
use crate::curve::{decompress_prime_order, point_from_hex, scalar_from_hex};
use crate::types::errors::{CryptoError, CryptoResult};

/// Private view scalar `a`, public spend point `B`, optional private spend
/// scalar `b`, and the derived public view point `A = a·G`.
///
/// Immutable once built; share it behind an `Arc` across scan tasks.
#[derive(Clone)]
pub struct ScanKeys {
    view_secret: Scalar,
    view_public: EdwardsPoint,
    spend_public: EdwardsPoint,
    spend_secret: Option<Scalar>,
}

impl ScanKeys {
    /// View-only key set.
    #[must_use]
    pub fn new(view_secret: Scalar, spend_public: EdwardsPoint) -> Self {
        Self {
            view_public: &view_secret * ED25519_BASEPOINT_TABLE,
            view_secret,
            spend_public,
            spend_secret: None,
        }
    }

    /// Full key set with `B = b·G`.
    #[must_use]
    pub fn with_spend_secret(view_secret: Scalar, spend_secret: Scalar) -> Self {
        Self {
            view_public: &view_secret * ED25519_BASEPOINT_TABLE,
            spend_public: &spend_secret * ED25519_BASEPOINT_TABLE,
            view_secret,
            spend_secret: Some(spend_secret),
        }
    }

    /// Parse from hex strings. `spend_secret_hex`, when given, must open
    /// `spend_public_hex`.
    pub fn from_hex(
        view_secret_hex: &str,
        spend_public_hex: &str,
        spend_secret_hex: Option<&str>,
    ) -> CryptoResult<Self> {
        let view_secret = scalar_from_hex(view_secret_hex, "view_secret")?;
        let spend_public = point_from_hex(spend_public_hex, "spend_public")?;
        let keys = Self::new(view_secret, spend_public);
        match spend_secret_hex {
            Some(hex_str) => keys.attach_spend_secret(scalar_from_hex(hex_str, "spend_secret")?),
            None => Ok(keys),
        }
    }

    /// View-only key set for the spend key embedded in `address`.
    pub fn from_address(view_secret_hex: &str, address: &str) -> CryptoResult<Self> {
        let decoded = decode_address(address)?;
        let view_secret = scalar_from_hex(view_secret_hex, "view_secret")?;
        let spend_public = decompress_prime_order(&decoded.spend_public, "spend_public")?;
        let keys = Self::new(view_secret, spend_public);
        if keys.view_public.compress().to_bytes() != decoded.view_public {
            return Err(CryptoError::SecretKeyMismatch);
        }
        Ok(keys)
    }

    /// Add the private spend scalar after checking it against `B`.
    pub fn attach_spend_secret(mut self, spend_secret: Scalar) -> CryptoResult<Self> {
        if &spend_secret * ED25519_BASEPOINT_TABLE != self.spend_public {
            return Err(CryptoError::SecretKeyMismatch);
        }
        self.spend_secret = Some(spend_secret);
        Ok(self)
    }

    /// Private view scalar `a`
    #[must_use]
    pub fn view_secret(&self) -> &Scalar {
        &self.view_secret
    }

    /// Public view point `A`
    #[must_use]
    pub fn view_public(&self) -> &EdwardsPoint {
        &self.view_public
    }

    /// Public spend point `B`
    #[must_use]
    pub fn spend_public(&self) -> &EdwardsPoint {
        &self.spend_public
    }

    /// Private spend scalar `b`, when this is not a view-only key set
    #[must_use]
    pub fn spend_secret(&self) -> Option<&Scalar> {
        self.spend_secret.as_ref()
    }
}

impl Drop for ScanKeys {
    fn drop(&mut self) {
        self.view_secret.zeroize();
        if let Some(b) = self.spend_secret.as_mut() {
            b.zeroize();
        }
    }
}

impl core::fmt::Debug for ScanKeys {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ScanKeys")
            .field("view_public", &hex::encode(self.view_public.compress().as_bytes()))
            .field("spend_public", &hex::encode(self.spend_public.compress().as_bytes()))
            .field("can_spend", &self.spend_secret.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_public_is_derived() {
        let a = Scalar::from(5u64);
        let keys = ScanKeys::new(a, &Scalar::from(9u64) * ED25519_BASEPOINT_TABLE);
        assert_eq!(*keys.view_public(), &a * ED25519_BASEPOINT_TABLE);
        assert!(keys.spend_secret().is_none());
    }

    #[test]
    fn test_attach_wrong_spend_secret() {
        let keys = ScanKeys::new(
            Scalar::from(5u64),
            &Scalar::from(9u64) * ED25519_BASEPOINT_TABLE,
        );
        assert!(matches!(
            keys.clone().attach_spend_secret(Scalar::from(10u64)),
            Err(CryptoError::SecretKeyMismatch)
        ));
        assert!(keys.attach_spend_secret(Scalar::from(9u64)).is_ok());
    }

    #[test]
    fn test_from_hex() {
        let b = Scalar::from(77u64);
        let spend_public = hex::encode((&b * ED25519_BASEPOINT_TABLE).compress().as_bytes());
        let keys = ScanKeys::from_hex(
            &hex::encode(Scalar::from(3u64).as_bytes()),
            &spend_public,
            Some(&hex::encode(b.as_bytes())),
        )
        .unwrap();
        assert_eq!(keys.spend_secret(), Some(&b));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let keys = ScanKeys::with_spend_secret(Scalar::from(3u64), Scalar::from(4u64));
        let rendered = format!("{keys:?}");
        assert!(rendered.contains("can_spend: true"));
        assert!(!rendered.contains(&hex::encode(Scalar::from(3u64).as_bytes())));
    }
}
