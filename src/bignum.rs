//! Big-integer helpers shared by both group families.

use alloc::vec;
use alloc::vec::Vec;
use num_bigint::BigUint;
use num_traits::{One, Zero};
use rand_core::CryptoRngCore;
use zeroize::Zeroizing;

use crate::Error;

/// Draws per random value before giving up.
const MAX_RANDOM_DRAWS: usize = 100;

/// Big-endian encoding of `value`, left padded with zeros to `len` bytes.
///
/// Values wider than `len` keep their low-order bytes.
pub fn to_fixed(value: &BigUint, len: usize) -> Vec<u8> {
    let bytes = value.to_bytes_be();
    if bytes.len() >= len {
        bytes[bytes.len() - len..].to_vec()
    } else {
        let mut padded = vec![0u8; len - bytes.len()];
        padded.extend_from_slice(&bytes);
        padded
    }
}

/// Legendre symbol of `a` modulo the odd prime `p`: 1, -1 or 0.
pub fn legendre(a: &BigUint, p: &BigUint) -> i8 {
    let exp = (p - 1u32) >> 1;
    let r = a.modpow(&exp, p);
    if r.is_zero() {
        0
    } else if r.is_one() {
        1
    } else {
        -1
    }
}

/// Square root modulo `p` for `p = 3 mod 4`; the caller checks the input is a residue.
pub fn sqrt_mod(v: &BigUint, p: &BigUint) -> BigUint {
    let exp = (p + 1u32) >> 2;
    v.modpow(&exp, p)
}

/// Modular inverse modulo the prime `p`.
pub fn inverse_mod(v: &BigUint, p: &BigUint) -> BigUint {
    v.modpow(&(p - 2u32), p)
}

/// Random value of `bits` bits, drawn as `ceil(bits / 8)` bytes and shifted
/// right when `bits` is not a multiple of 8.
fn random_bits(rng: &mut dyn CryptoRngCore, bits: usize) -> Result<BigUint, Error> {
    let mut buf = Zeroizing::new(vec![0u8; (bits + 7) / 8]);
    rng.try_fill_bytes(&mut buf[..])?;
    let value = BigUint::from_bytes_be(&buf);
    Ok(match bits % 8 {
        0 => value,
        rem => value >> (8 - rem),
    })
}

/// Random value in `[1, bound)`.
pub fn random_below(
    rng: &mut dyn CryptoRngCore,
    bound: &BigUint,
    bits: usize,
) -> Result<BigUint, Error> {
    for _ in 0..MAX_RANDOM_DRAWS {
        let value = random_bits(rng, bits)?;
        if !value.is_zero() && &value < bound {
            return Ok(value);
        }
    }
    Err(Error::InsufficientRandomness)
}

/// Random scalar in `[2, order)`.
pub fn random_scalar(rng: &mut dyn CryptoRngCore, order: &BigUint) -> Result<BigUint, Error> {
    let bits = order.bits() as usize;
    for _ in 0..MAX_RANDOM_DRAWS {
        let value = random_bits(rng, bits)?;
        if !value.is_zero() && !value.is_one() && &value < order {
            return Ok(value);
        }
    }
    Err(Error::InsufficientRandomness)
}

/// Random quadratic residue and quadratic non-residue modulo `prime`.
pub fn random_qr_qnr(
    rng: &mut dyn CryptoRngCore,
    prime: &BigUint,
    bits: usize,
) -> Result<(BigUint, BigUint), Error> {
    let mut qr: Option<BigUint> = None;
    let mut qnr: Option<BigUint> = None;
    for _ in 0..MAX_RANDOM_DRAWS {
        if let (Some(qr), Some(qnr)) = (&qr, &qnr) {
            return Ok((qr.clone(), qnr.clone()));
        }
        let q = random_below(rng, prime, bits)?;
        match legendre(&q, prime) {
            1 if qr.is_none() => qr = Some(q),
            -1 if qnr.is_none() => qnr = Some(q),
            _ => {}
        }
    }
    match (qr, qnr) {
        (Some(qr), Some(qnr)) => Ok((qr, qnr)),
        _ => Err(Error::InsufficientRandomness),
    }
}

/// Quadratic residue test of `v` modulo `prime` with the Legendre symbol
/// computed on a blinded value.
///
/// `num = v * r^2 * m` for a fresh random `r`, where `m` is the residue `qr`
/// when `r` is odd and the non-residue `qnr` otherwise. `v` is a residue iff
/// the symbol of `num` is `1` (odd `r`) or `-1` (even `r`).
pub fn is_quadratic_residue_blind(
    rng: &mut dyn CryptoRngCore,
    prime: &BigUint,
    bits: usize,
    qr: &BigUint,
    qnr: &BigUint,
    v: &BigUint,
) -> Result<bool, Error> {
    let r = random_below(rng, prime, bits)?;
    let r_odd = !(&r % 2u32).is_zero();
    let mut num = (v * &r) % prime;
    num = (num * &r) % prime;
    let (multiplier, check) = if r_odd { (qr, 1) } else { (qnr, -1) };
    num = (num * multiplier) % prime;
    Ok(legendre(&num, prime) == check)
}
