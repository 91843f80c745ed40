//! Bulletproof-Plus prover.

use alloc::format;
use alloc::vec;
use alloc::vec::Vec;

use curve25519_dalek::constants::ED25519_BASEPOINT_POINT;
use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::{MultiscalarMul, VartimeMultiscalarMul};
use rand_core::{CryptoRng, RngCore};
use zeroize::Zeroize;

use super::generators::BpPlusGenerators;
use super::transcript::Transcript;
use super::types::BulletproofPlus;
use super::{BITS, MAX_OUTPUTS};
use crate::curve::{commit, h_generator, inv_eight, random_scalar};
use crate::types::errors::{CryptoError, CryptoResult};

/// `Σ a_i·b_i·y^{i+1}`
pub(crate) fn weighted_inner_product(a: &[Scalar], b: &[Scalar], y: &Scalar) -> Scalar {
    let mut power = *y;
    let mut acc = Scalar::ZERO;
    for (ai, bi) in a.iter().zip(b) {
        acc += ai * bi * power;
        power *= y;
    }
    acc
}

/// `[1, x, x², …, x^{n-1}]`
pub(crate) fn powers(x: &Scalar, n: usize) -> Vec<Scalar> {
    let mut out = Vec::with_capacity(n);
    let mut current = Scalar::ONE;
    for _ in 0..n {
        out.push(current);
        current *= x;
    }
    out
}

/// `d[j·64 + i] = z^{2(j+1)} · 2^i`
pub(crate) fn d_vector(z: &Scalar, m: usize) -> Vec<Scalar> {
    let z2 = z * z;
    let mut d = Vec::with_capacity(m * BITS);
    let mut z_pow = z2;
    for _ in 0..m {
        let mut two_pow = Scalar::ONE;
        for _ in 0..BITS {
            d.push(z_pow * two_pow);
            two_pow += two_pow;
        }
        z_pow *= z2;
    }
    d
}

fn nonzero(challenge: Scalar, name: &str) -> CryptoResult<Scalar> {
    if challenge == Scalar::ZERO {
        return Err(CryptoError::ZeroScalar(format!(
            "bulletproof challenge {name}"
        )));
    }
    Ok(challenge)
}

/// Prove that every `amounts[j]` is committed to by `masks[j]`.
///
/// # Errors
///
/// - [`CryptoError::AmountsMasksMismatch`] when the slices differ in length
/// - [`CryptoError::NoAmounts`] for an empty input
/// - [`CryptoError::TooManyAmounts`] above [`MAX_OUTPUTS`]
pub fn prove<R: RngCore + CryptoRng>(
    gens: &BpPlusGenerators,
    amounts: &[u64],
    masks: &[Scalar],
    rng: &mut R,
) -> CryptoResult<BulletproofPlus> {
    if amounts.len() != masks.len() {
        return Err(CryptoError::AmountsMasksMismatch {
            amounts: amounts.len(),
            masks: masks.len(),
        });
    }
    if amounts.is_empty() {
        return Err(CryptoError::NoAmounts);
    }
    if amounts.len() > MAX_OUTPUTS {
        return Err(CryptoError::TooManyAmounts {
            actual: amounts.len(),
            maximum: MAX_OUTPUTS,
        });
    }

    let m = amounts.len().next_power_of_two();
    let mn = m * BITS;
    let rounds = mn.trailing_zeros() as usize;
    let inv8 = inv_eight();
    let g = ED25519_BASEPOINT_POINT;
    let h = h_generator()?;

    let commitments = amounts
        .iter()
        .zip(masks)
        .map(|(amount, mask)| Ok(commit(mask, *amount)? * inv8))
        .collect::<CryptoResult<Vec<_>>>()?;

    let mut transcript = Transcript::new();
    transcript.absorb_commitments(&commitments);

    // Bit decomposition; padding slots decompose 0.
    let mut a_l = vec![Scalar::ZERO; mn];
    let mut a_r = vec![Scalar::ZERO; mn];
    for j in 0..m {
        let amount = amounts.get(j).copied().unwrap_or(0);
        for i in 0..BITS {
            let bit = Scalar::from((amount >> i) & 1);
            a_l[j * BITS + i] = bit;
            a_r[j * BITS + i] = bit - Scalar::ONE;
        }
    }

    let alpha = random_scalar(rng);
    let a_point = EdwardsPoint::multiscalar_mul(
        a_l.iter()
            .chain(a_r.iter())
            .map(|x| x * inv8)
            .chain([alpha * inv8]),
        gens.g[..mn]
            .iter()
            .chain(gens.h[..mn].iter())
            .chain([&g]),
    );

    let y = nonzero(transcript.challenge(&[&a_point]), "y")?;
    let z = nonzero(transcript.challenge(&[]), "z")?;
    let z2 = z * z;
    let y_powers = powers(&y, mn + 2);
    let d = d_vector(&z, m);

    let mut a_prime: Vec<Scalar> = a_l.iter().map(|a| a - z).collect();
    let mut b_prime: Vec<Scalar> = a_r
        .iter()
        .zip(&d)
        .enumerate()
        .map(|(k, (b, d_k))| b + z + d_k * y_powers[mn - k])
        .collect();
    a_l.zeroize();
    a_r.zeroize();

    let mut alpha1 = alpha;
    let mut z_pow = z2;
    for gamma in masks {
        alpha1 += z_pow * y_powers[mn + 1] * gamma;
        z_pow *= z2;
    }

    let y_inv = y.invert();
    let y_inv_powers = powers(&y_inv, mn);
    let mut g_prime: Vec<EdwardsPoint> = gens.g[..mn].to_vec();
    let mut h_prime: Vec<EdwardsPoint> = gens.h[..mn].to_vec();
    let mut l_points = Vec::with_capacity(rounds);
    let mut r_points = Vec::with_capacity(rounds);

    let mut n = mn;
    while n > 1 {
        n /= 2;
        let y_n = y_powers[n];
        let y_inv_n = y_inv_powers[n];
        let (a1, a2) = a_prime.split_at(n);
        let (b1, b2) = b_prime.split_at(n);
        let (g1, g2) = g_prime.split_at(n);
        let (h1, h2) = h_prime.split_at(n);

        let c_l = weighted_inner_product(a1, b2, &y);
        let c_r = weighted_inner_product(a2, b1, &y) * y_n;
        let d_l = random_scalar(rng);
        let d_r = random_scalar(rng);

        let l = EdwardsPoint::multiscalar_mul(
            a1.iter()
                .map(|a| a * y_inv_n * inv8)
                .chain(b2.iter().map(|b| b * inv8))
                .chain([c_l * inv8, d_l * inv8]),
            g2.iter().chain(h1.iter()).chain([&h, &g]),
        );
        let r = EdwardsPoint::multiscalar_mul(
            a2.iter()
                .map(|a| a * y_n * inv8)
                .chain(b1.iter().map(|b| b * inv8))
                .chain([c_r * inv8, d_r * inv8]),
            g1.iter().chain(h2.iter()).chain([&h, &g]),
        );

        let e = nonzero(transcript.challenge(&[&l, &r]), "e")?;
        let e_inv = e.invert();
        let e_y_inv_n = e * y_inv_n;
        let e_inv_y_n = e_inv * y_n;

        let mut g_next = Vec::with_capacity(n);
        let mut h_next = Vec::with_capacity(n);
        let mut a_next = Vec::with_capacity(n);
        let mut b_next = Vec::with_capacity(n);
        for i in 0..n {
            g_next.push(EdwardsPoint::vartime_multiscalar_mul(
                [e_inv, e_y_inv_n],
                [g1[i], g2[i]],
            ));
            h_next.push(EdwardsPoint::vartime_multiscalar_mul(
                [e, e_inv],
                [h1[i], h2[i]],
            ));
            a_next.push(e * a1[i] + e_inv_y_n * a2[i]);
            b_next.push(e_inv * b1[i] + e * b2[i]);
        }

        alpha1 += d_l * e * e + d_r * e_inv * e_inv;
        a_prime.zeroize();
        b_prime.zeroize();
        a_prime = a_next;
        b_prime = b_next;
        g_prime = g_next;
        h_prime = h_next;
        l_points.push(l);
        r_points.push(r);
    }

    let r_blind = random_scalar(rng);
    let s_blind = random_scalar(rng);
    let d_blind = random_scalar(rng);
    let eta = random_scalar(rng);
    let a0 = a_prime[0];
    let b0 = b_prime[0];

    let a1_point = EdwardsPoint::multiscalar_mul(
        [
            r_blind * inv8,
            s_blind * inv8,
            d_blind * inv8,
            (r_blind * y * b0 + s_blind * y * a0) * inv8,
        ],
        [g_prime[0], h_prime[0], g, h],
    );
    let b_point = EdwardsPoint::multiscalar_mul(
        [eta * inv8, r_blind * y * s_blind * inv8],
        [g, h],
    );

    let e = nonzero(transcript.challenge(&[&a1_point, &b_point]), "e")?;
    let proof = BulletproofPlus {
        V: commitments,
        A: a_point,
        A1: a1_point,
        B: b_point,
        r1: r_blind + a0 * e,
        s1: s_blind + b0 * e,
        d1: eta + d_blind * e + alpha1 * e * e,
        L: l_points,
        R: r_points,
    };

    a_prime.zeroize();
    b_prime.zeroize();
    alpha1.zeroize();
    Ok(proof)
}
