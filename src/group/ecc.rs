//! NIST prime curves (groups 19, 20 and 21).

use alloc::vec;
use alloc::vec::Vec;
use num_bigint::BigUint;
use num_traits::Zero;
use rand_core::CryptoRngCore;
use zeroize::Zeroizing;

use super::{Element, GroupOps};
use crate::bignum::{is_quadratic_residue_blind, random_qr_qnr, sqrt_mod, to_fixed};
use crate::kdf::{sha256_prf_bits, SHA256_MAC_LEN};
use crate::pwe::{
    hunt_and_peck, PasswordElement, PasswordSeed, ECC_MIN_ITERATIONS, HUNTING_AND_PECKING,
};
use crate::Error;

/// Point arithmetic on `x || y` encodings for one RustCrypto curve crate.
///
/// Every function returns `None` for an invalid encoding or a point at
/// infinity result.
macro_rules! nist_curve {
    ($name:ident, $krate:ident) => {
        mod $name {
            use alloc::vec::Vec;
            use $krate::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
            use $krate::elliptic_curve::PrimeField;
            use $krate::{AffinePoint, EncodedPoint, FieldBytes, ProjectivePoint, Scalar};

            fn field_len() -> usize {
                FieldBytes::default().len()
            }

            fn decode(bytes: &[u8]) -> Option<ProjectivePoint> {
                let len = field_len();
                if bytes.len() != 2 * len {
                    return None;
                }
                let x = FieldBytes::clone_from_slice(&bytes[..len]);
                let y = FieldBytes::clone_from_slice(&bytes[len..]);
                let encoded = EncodedPoint::from_affine_coordinates(&x, &y, false);
                let affine: Option<AffinePoint> =
                    AffinePoint::from_encoded_point(&encoded).into();
                affine.map(ProjectivePoint::from)
            }

            fn encode(point: &ProjectivePoint) -> Option<Vec<u8>> {
                let encoded = point.to_affine().to_encoded_point(false);
                let (x, y) = (encoded.x()?, encoded.y()?);
                let mut out = Vec::with_capacity(x.len() + y.len());
                out.extend_from_slice(x);
                out.extend_from_slice(y);
                Some(out)
            }

            fn scalar(bytes: &[u8]) -> Option<Scalar> {
                if bytes.len() != field_len() {
                    return None;
                }
                Scalar::from_repr(FieldBytes::clone_from_slice(bytes)).into()
            }

            pub(super) fn is_on_curve(bytes: &[u8]) -> bool {
                decode(bytes).is_some()
            }

            pub(super) fn negated_mul(point: &[u8], k: &[u8]) -> Option<Vec<u8>> {
                let product = decode(point)? * scalar(k)?;
                encode(&-product)
            }

            pub(super) fn mul_add_mul(
                point: &[u8],
                k1: &[u8],
                addend: &[u8],
                k2: &[u8],
            ) -> Option<Vec<u8>> {
                let sum = decode(point)? * scalar(k1)? + decode(addend)?;
                encode(&(sum * scalar(k2)?))
            }
        }
    };
}

nist_curve!(nist_p256, p256);
nist_curve!(nist_p384, p384);
nist_curve!(nist_p521, p521);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Curve {
    P256,
    P384,
    P521,
}

impl Curve {
    fn is_on_curve(self, bytes: &[u8]) -> bool {
        match self {
            Curve::P256 => nist_p256::is_on_curve(bytes),
            Curve::P384 => nist_p384::is_on_curve(bytes),
            Curve::P521 => nist_p521::is_on_curve(bytes),
        }
    }

    /// `-(k * point)`.
    fn negated_mul(self, point: &[u8], k: &[u8]) -> Option<Vec<u8>> {
        match self {
            Curve::P256 => nist_p256::negated_mul(point, k),
            Curve::P384 => nist_p384::negated_mul(point, k),
            Curve::P521 => nist_p521::negated_mul(point, k),
        }
    }

    /// `k2 * (k1 * point + addend)`.
    fn mul_add_mul(self, point: &[u8], k1: &[u8], addend: &[u8], k2: &[u8]) -> Option<Vec<u8>> {
        match self {
            Curve::P256 => nist_p256::mul_add_mul(point, k1, addend, k2),
            Curve::P384 => nist_p384::mul_add_mul(point, k1, addend, k2),
            Curve::P521 => nist_p521::mul_add_mul(point, k1, addend, k2),
        }
    }
}

const P256_PRIME: &str = "ffffffff00000001000000000000000000000000ffffffffffffffffffffffff";
const P256_ORDER: &str = "ffffffff00000000ffffffffffffffffbce6faada7179e84f3b9cac2fc632551";
const P256_B: &str = "5ac635d8aa3a93e7b3ebbd55769886bc651d06b0cc53b0f63bce3c3e27d2604b";

const P384_PRIME: &str = concat!(
    "fffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffe",
    "ffffffff0000000000000000ffffffff"
);
const P384_ORDER: &str = concat!(
    "ffffffffffffffffffffffffffffffffffffffffffffffffc7634d81f4372ddf",
    "581a0db248b0a77aecec196accc52973"
);
const P384_B: &str = concat!(
    "b3312fa7e23ee7e4988e056be3f82d19181d9c6efe8141120314088f5013875a",
    "c656398d8a2ed19d2a85c8edd3ec2aef"
);

const P521_PRIME: &str = concat!(
    "01ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
    "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
    "ffff"
);
const P521_ORDER: &str = concat!(
    "01ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
    "fffa51868783bf2f966b7fcc0148f709a5d03bb5c9b8899c47aebb6fb71e9138",
    "6409"
);
const P521_B: &str = concat!(
    "0051953eb9618e1c9a1f929a21a0b68540eea2da725b99b315f3b8b489918ef1",
    "09e156193951ec7e937b1652c0bd3bb1bf073573df883d2c34f1ef451fd46b50",
    "3f00"
);

/// Short Weierstrass curve `y^2 = x^3 - 3x + b` over a prime field.
#[derive(Debug, Clone)]
pub struct EccGroup {
    curve: Curve,
    prime: BigUint,
    order: BigUint,
    a: BigUint,
    b: BigUint,
    prime_len: usize,
    prime_bits: usize,
}

impl EccGroup {
    /// Curve for `group_id`, if it is one of the supported NIST curves.
    pub fn new(group_id: u16) -> Option<Self> {
        let (curve, prime, order, b) = match group_id {
            19 => (Curve::P256, P256_PRIME, P256_ORDER, P256_B),
            20 => (Curve::P384, P384_PRIME, P384_ORDER, P384_B),
            21 => (Curve::P521, P521_PRIME, P521_ORDER, P521_B),
            _ => return None,
        };
        let prime = BigUint::parse_bytes(prime.as_bytes(), 16)?;
        let order = BigUint::parse_bytes(order.as_bytes(), 16)?;
        let b = BigUint::parse_bytes(b.as_bytes(), 16)?;
        let a = &prime - 3u32;
        let prime_bits = prime.bits() as usize;
        Some(EccGroup {
            curve,
            prime_len: (prime_bits + 7) / 8,
            prime_bits,
            prime,
            order,
            a,
            b,
        })
    }

    /// `x^3 + a x + b mod p`.
    fn y_squared(&self, x: &BigUint) -> BigUint {
        let p = &self.prime;
        let x3 = (x * x % p) * x % p;
        (x3 + &self.a * x % p + &self.b) % p
    }

    /// `pwd-value` for a seed, or `None` when it is not below the prime.
    fn pwd_value(&self, pwd_seed: &[u8], prime_bytes: &[u8]) -> Option<BigUint> {
        let value = sha256_prf_bits(pwd_seed, HUNTING_AND_PECKING, prime_bytes, self.prime_bits);
        let mut x = BigUint::from_bytes_be(&value);
        if self.prime_bits % 8 != 0 {
            x >>= 8 - self.prime_bits % 8;
        }
        if x < self.prime {
            Some(x)
        } else {
            None
        }
    }
}

impl GroupOps for EccGroup {
    fn order(&self) -> &BigUint {
        &self.order
    }

    fn prime_len(&self) -> usize {
        self.prime_len
    }

    fn prime_bits(&self) -> usize {
        self.prime_bits
    }

    fn element_len(&self) -> usize {
        2 * self.prime_len
    }

    fn derive_pwe(
        &self,
        seed: &PasswordSeed<'_>,
        rng: &mut dyn CryptoRngCore,
    ) -> Result<PasswordElement, Error> {
        let mut dummy = Zeroizing::new(vec![0u8; seed.password_len()]);
        rng.try_fill_bytes(&mut dummy[..])?;
        let (qr, qnr) = random_qr_qnr(rng, &self.prime, self.prime_bits)?;
        let prime_bytes = to_fixed(&self.prime, self.prime_len);

        let ((x, parity), iterations) =
            hunt_and_peck(seed, ECC_MIN_ITERATIONS, Some(&dummy[..]), |pwd_seed| {
                let x = match self.pwd_value(pwd_seed, &prime_bytes) {
                    Some(x) => x,
                    None => return Ok(None),
                };
                let y2 = self.y_squared(&x);
                if !is_quadratic_residue_blind(
                    &mut *rng,
                    &self.prime,
                    self.prime_bits,
                    &qr,
                    &qnr,
                    &y2,
                )? {
                    return Ok(None);
                }
                Ok(Some((x, pwd_seed[SHA256_MAC_LEN - 1] & 1)))
            })?;

        let mut y = sqrt_mod(&self.y_squared(&x), &self.prime);
        let y_parity = if (&y % 2u32).is_zero() { 0 } else { 1 };
        if y_parity != parity {
            y = &self.prime - &y;
        }
        let mut encoded = to_fixed(&x, self.prime_len);
        encoded.extend_from_slice(&to_fixed(&y, self.prime_len));
        if !self.curve.is_on_curve(&encoded) {
            return Err(Error::InvalidElement);
        }
        Ok(PasswordElement {
            element: Element::new(encoded),
            iterations,
        })
    }

    fn commit_element(&self, pwe: &Element, mask: &[u8]) -> Result<Element, Error> {
        self.curve
            .negated_mul(pwe.as_bytes(), mask)
            .map(Element::new)
            .ok_or(Error::InvalidElement)
    }

    fn combine(
        &self,
        pwe: &Element,
        rand: &[u8],
        peer_scalar: &BigUint,
        peer_element: &Element,
    ) -> Result<Zeroizing<Vec<u8>>, Error> {
        let peer_scalar = to_fixed(peer_scalar, self.prime_len);
        let point = Zeroizing::new(
            self.curve
                .mul_add_mul(pwe.as_bytes(), &peer_scalar, peer_element.as_bytes(), rand)
                .ok_or(Error::KeyDerivationFailure)?,
        );
        Ok(Zeroizing::new(point[..self.prime_len].to_vec()))
    }

    fn parse_element(&self, bytes: &[u8]) -> Result<Element, Error> {
        if bytes.len() != self.element_len() {
            return Err(Error::MalformedMessage("commit-element"));
        }
        let (x, y) = bytes.split_at(self.prime_len);
        if BigUint::from_bytes_be(x) >= self.prime || BigUint::from_bytes_be(y) >= self.prime {
            return Err(Error::InvalidElement);
        }
        if !self.curve.is_on_curve(bytes) {
            return Err(Error::InvalidElement);
        }
        Ok(Element::new(bytes.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;
    use rand::RngCore;

    const ADDR1: [u8; 6] = [0x82, 0x7b, 0x91, 0x9d, 0xd4, 0xb9];
    const ADDR2: [u8; 6] = [0x1e, 0xec, 0x49, 0xea, 0x64, 0x88];

    #[test]
    fn annex_j_password_element() {
        let group = EccGroup::new(19).unwrap();
        let seed = PasswordSeed::new(&ADDR1, &ADDR2, b"mekmitasdigoat", Some("psk4internet"));
        let pwe = group.derive_pwe(&seed, &mut OsRng).unwrap();
        assert_eq!(
            hex::encode(pwe.element.as_bytes()),
            concat!(
                "282167aa6ba380c53a9c5230c0b53b1ebc456983cc05f0f2b869a75f7f232e91",
                "cc8a545065e3a76c6731a0f4471a338442ef3cc3c978e787e0d5cdc907dd4e9c"
            )
        );
        assert_eq!(pwe.iterations, ECC_MIN_ITERATIONS);
    }

    #[test]
    fn loop_length_is_independent_of_password() {
        let group = EccGroup::new(19).unwrap();
        let mut password = [0u8; 12];
        for _ in 0..32 {
            OsRng.fill_bytes(&mut password);
            let seed = PasswordSeed::new(&ADDR1, &ADDR2, &password, None);
            let pwe = group.derive_pwe(&seed, &mut OsRng).unwrap();
            assert_eq!(pwe.iterations, ECC_MIN_ITERATIONS);
        }
    }

    #[test]
    fn password_element_is_on_curve_for_all_curves() {
        for id in [19u16, 20, 21] {
            let group = EccGroup::new(id).unwrap();
            let seed = PasswordSeed::new(&ADDR1, &ADDR2, b"secret", None);
            let first = group.derive_pwe(&seed, &mut OsRng).unwrap();
            let second = group.derive_pwe(&seed, &mut OsRng).unwrap();
            assert_eq!(first.element, second.element);
            assert_eq!(first.element.as_bytes().len(), group.element_len());
            assert!(group.parse_element(first.element.as_bytes()).is_ok());
        }
    }

    #[test]
    fn commit_element_negates() {
        let group = EccGroup::new(19).unwrap();
        let seed = PasswordSeed::new(&ADDR1, &ADDR2, b"secret", None);
        let pwe = group.derive_pwe(&seed, &mut OsRng).unwrap().element;
        let one = to_fixed(&BigUint::from(1u32), 32);
        let negated = group.commit_element(&pwe, &one).unwrap();
        let (x, y) = pwe.as_bytes().split_at(32);
        let (nx, ny) = negated.as_bytes().split_at(32);
        assert_eq!(x, nx);
        let y = BigUint::from_bytes_be(y);
        assert_eq!(BigUint::from_bytes_be(ny), &group.prime - y);
    }

    #[test]
    fn combine_is_symmetric() {
        let group = EccGroup::new(20).unwrap();
        let order = group.order().clone();
        let seed = PasswordSeed::new(&ADDR1, &ADDR2, b"secret", None);
        let pwe = group.derive_pwe(&seed, &mut OsRng).unwrap().element;
        let (ra, ma) = (BigUint::from(7u32), BigUint::from(11u32));
        let (rb, mb) = (BigUint::from(13u32), BigUint::from(17u32));
        let (sa, sb) = ((&ra + &ma) % &order, (&rb + &mb) % &order);
        let bytes = |v: &BigUint| to_fixed(v, 48);
        let ea = group.commit_element(&pwe, &bytes(&ma)).unwrap();
        let eb = group.commit_element(&pwe, &bytes(&mb)).unwrap();
        let ka = group.combine(&pwe, &bytes(&ra), &sb, &eb).unwrap();
        let kb = group.combine(&pwe, &bytes(&rb), &sa, &ea).unwrap();
        assert_eq!(*ka, *kb);
        assert_eq!(ka.len(), 48);
    }

    #[test]
    fn identity_shared_secret_fails() {
        let group = EccGroup::new(19).unwrap();
        let seed = PasswordSeed::new(&ADDR1, &ADDR2, b"secret", None);
        let pwe = group.derive_pwe(&seed, &mut OsRng).unwrap().element;
        // peer element -(s * PWE) cancels peer_scalar * PWE
        let s = BigUint::from(5u32);
        let element = group.commit_element(&pwe, &to_fixed(&s, 32)).unwrap();
        let res = group.combine(&pwe, &to_fixed(&BigUint::from(3u32), 32), &s, &element);
        assert!(matches!(res, Err(Error::KeyDerivationFailure)));
    }

    #[test]
    fn rejects_invalid_elements() {
        let group = EccGroup::new(19).unwrap();
        assert!(matches!(
            group.parse_element(&[0u8; 63]),
            Err(Error::MalformedMessage(_))
        ));
        assert!(matches!(
            group.parse_element(&[0u8; 64]),
            Err(Error::InvalidElement)
        ));
        let mut above_prime = [0xffu8; 64];
        above_prime[32..].copy_from_slice(&[1u8; 32]);
        assert!(matches!(
            group.parse_element(&above_prime),
            Err(Error::InvalidElement)
        ));

        let seed = PasswordSeed::new(&ADDR1, &ADDR2, b"secret", None);
        let mut off_curve = group
            .derive_pwe(&seed, &mut OsRng)
            .unwrap()
            .element
            .as_bytes()
            .to_vec();
        off_curve[63] ^= 1;
        assert!(matches!(
            group.parse_element(&off_curve),
            Err(Error::InvalidElement)
        ));
    }
}
