//! Reference verifier used to check the prover.

use alloc::vec::Vec;

use curve25519_dalek::constants::ED25519_BASEPOINT_POINT;
use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::VartimeMultiscalarMul;

use super::generators::BpPlusGenerators;
use super::prove::{d_vector, powers};
use super::transcript::Transcript;
use super::types::BulletproofPlus;
use super::{BITS, MAX_OUTPUTS};
use crate::curve::h_generator;

pub(crate) fn verify(gens: &BpPlusGenerators, proof: &BulletproofPlus) -> bool {
    if proof.V.is_empty() || proof.V.len() > MAX_OUTPUTS {
        return false;
    }
    let m = proof.V.len().next_power_of_two();
    let mn = m * BITS;
    let rounds = mn.trailing_zeros() as usize;
    if proof.L.len() != rounds || proof.R.len() != rounds {
        return false;
    }
    let Ok(h) = h_generator() else {
        return false;
    };
    let g = ED25519_BASEPOINT_POINT;
    let eight = Scalar::from(8u64);

    let mut transcript = Transcript::new();
    transcript.absorb_commitments(&proof.V);
    let y = transcript.challenge(&[&proof.A]);
    let z = transcript.challenge(&[]);
    let challenges: Vec<Scalar> = proof
        .L
        .iter()
        .zip(&proof.R)
        .map(|(l, r)| transcript.challenge(&[l, r]))
        .collect();
    let e = transcript.challenge(&[&proof.A1, &proof.B]);

    let z2 = z * z;
    let y_powers = powers(&y, mn + 2);
    let d = d_vector(&z, m);
    let sum_y: Scalar = y_powers[1..=mn].iter().sum();
    let sum_d: Scalar = d.iter().sum();

    let mut scalars = Vec::with_capacity(2 * mn + 1 + proof.V.len());
    let mut points = Vec::with_capacity(2 * mn + 1 + proof.V.len());
    for k in 0..mn {
        scalars.push(-z);
        points.push(gens.g[k]);
        scalars.push(z + d[k] * y_powers[mn - k]);
        points.push(gens.h[k]);
    }
    scalars.push((z - z2) * sum_y - z * y_powers[mn + 1] * sum_d);
    points.push(h);
    let mut z_pow = z2;
    for v in &proof.V {
        scalars.push(y_powers[mn + 1] * z_pow * eight);
        points.push(*v);
        z_pow *= z2;
    }
    let mut p = proof.A * eight + EdwardsPoint::vartime_multiscalar_mul(scalars, points);

    let y_inv = y.invert();
    let mut g_prime: Vec<EdwardsPoint> = gens.g[..mn].to_vec();
    let mut h_prime: Vec<EdwardsPoint> = gens.h[..mn].to_vec();
    let mut n = mn;
    for ((l, r), e_k) in proof.L.iter().zip(&proof.R).zip(&challenges) {
        n /= 2;
        let e_inv = e_k.invert();
        let y_inv_n = powers(&y_inv, n + 1)[n];
        p = l * (e_k * e_k * eight) + p + r * (e_inv * e_inv * eight);
        let (g1, g2) = g_prime.split_at(n);
        let (h1, h2) = h_prime.split_at(n);
        let g_next: Vec<EdwardsPoint> = g1
            .iter()
            .zip(g2)
            .map(|(a, b)| a * e_inv + b * (e_k * y_inv_n))
            .collect();
        let h_next: Vec<EdwardsPoint> = h1
            .iter()
            .zip(h2)
            .map(|(a, b)| a * e_k + b * e_inv)
            .collect();
        g_prime = g_next;
        h_prime = h_next;
    }

    let lhs = p * (e * e) + proof.A1 * (e * eight) + proof.B * eight;
    let rhs = g_prime[0] * (proof.r1 * e)
        + h_prime[0] * (proof.s1 * e)
        + h * (proof.r1 * y * proof.s1)
        + g * proof.d1;
    lhs == rhs
}
