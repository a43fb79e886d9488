//! RFC 3526 MODP groups (groups 14 and 15).

use alloc::vec::Vec;
use num_bigint::BigUint;
use num_traits::{One, Zero};
use rand_core::CryptoRngCore;
use zeroize::Zeroizing;

use super::{Element, GroupOps};
use crate::bignum::{inverse_mod, to_fixed};
use crate::kdf::sha256_prf_bits;
use crate::pwe::{hunt_and_peck, PasswordElement, PasswordSeed, HUNTING_AND_PECKING};
use crate::Error;

/// RFC 3526 2048-bit MODP prime.
const MODP_2048: &str = concat!(
    "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E08",
    "8A67CC74020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B",
    "302B0A6DF25F14374FE1356D6D51C245E485B576625E7EC6F44C42E9",
    "A637ED6B0BFF5CB6F406B7EDEE386BFB5A899FA5AE9F24117C4B1FE6",
    "49286651ECE45B3DC2007CB8A163BF0598DA48361C55D39A69163FA8",
    "FD24CF5F83655D23DCA3AD961C62F356208552BB9ED529077096966D",
    "670C354E4ABC9804F1746C08CA18217C32905E462E36CE3BE39E772C",
    "180E86039B2783A2EC07A28FB5C55DF06F4C52C9DE2BCBF695581718",
    "3995497CEA956AE515D2261898FA051015728E5A8AACAA68FFFFFFFF",
    "FFFFFFFF"
);

/// RFC 3526 3072-bit MODP prime.
const MODP_3072: &str = concat!(
    "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E08",
    "8A67CC74020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B",
    "302B0A6DF25F14374FE1356D6D51C245E485B576625E7EC6F44C42E9",
    "A637ED6B0BFF5CB6F406B7EDEE386BFB5A899FA5AE9F24117C4B1FE6",
    "49286651ECE45B3DC2007CB8A163BF0598DA48361C55D39A69163FA8",
    "FD24CF5F83655D23DCA3AD961C62F356208552BB9ED529077096966D",
    "670C354E4ABC9804F1746C08CA18217C32905E462E36CE3BE39E772C",
    "180E86039B2783A2EC07A28FB5C55DF06F4C52C9DE2BCBF695581718",
    "3995497CEA956AE515D2261898FA051015728E5A8AAAC42DAD33170D",
    "04507A33A85521ABDF1CBA64ECFB850458DBEF0A8AEA71575D060C7D",
    "B3970F85A6E1E4C7ABF5AE8CDB0933D71E8C94E04A25619DCEE3D226",
    "1AD2EE6BF12FFA06D98A0864D87602733EC86A64521F2B18177B200C",
    "BBE117577A615D6C770988C0BAD946E208E24FA074E5AB3143DB5BFC",
    "E0FD108E4B82D120A93AD2CAFFFFFFFFFFFFFFFF"
);

/// Prime-order subgroup of the multiplicative group modulo a safe prime.
#[derive(Debug, Clone)]
pub struct FfcGroup {
    prime: BigUint,
    order: BigUint,
    /// `(p - 1) / order`, the cofactor exponent mapping values into the subgroup.
    exponent: BigUint,
    prime_len: usize,
    prime_bits: usize,
}

impl FfcGroup {
    /// Group for `group_id`, if it is one of the supported MODP groups.
    pub fn new(group_id: u16) -> Option<Self> {
        let prime = match group_id {
            14 => MODP_2048,
            15 => MODP_3072,
            _ => return None,
        };
        let prime = BigUint::parse_bytes(prime.as_bytes(), 16)?;
        let p_minus_one = &prime - 1u32;
        let order = &p_minus_one >> 1;
        let exponent = &p_minus_one / &order;
        let prime_bits = prime.bits() as usize;
        Some(FfcGroup {
            prime_len: (prime_bits + 7) / 8,
            prime_bits,
            prime,
            order,
            exponent,
        })
    }
}

impl GroupOps for FfcGroup {
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
        self.prime_len
    }

    fn derive_pwe(
        &self,
        seed: &PasswordSeed<'_>,
        _rng: &mut dyn CryptoRngCore,
    ) -> Result<PasswordElement, Error> {
        let prime_bytes = to_fixed(&self.prime, self.prime_len);
        let (pwe, iterations) = hunt_and_peck(seed, 0, None, |pwd_seed| {
            let value = sha256_prf_bits(
                pwd_seed,
                HUNTING_AND_PECKING,
                &prime_bytes,
                8 * self.prime_len,
            );
            let value = BigUint::from_bytes_be(&value);
            if value >= self.prime {
                return Ok(None);
            }
            let pwe = value.modpow(&self.exponent, &self.prime);
            if pwe.is_zero() || pwe.is_one() {
                return Ok(None);
            }
            Ok(Some(pwe))
        })?;
        Ok(PasswordElement {
            element: Element::new(to_fixed(&pwe, self.prime_len)),
            iterations,
        })
    }

    fn commit_element(&self, pwe: &Element, mask: &[u8]) -> Result<Element, Error> {
        let pwe = BigUint::from_bytes_be(pwe.as_bytes());
        let product = pwe.modpow(&BigUint::from_bytes_be(mask), &self.prime);
        if product.is_zero() {
            return Err(Error::InvalidElement);
        }
        let element = inverse_mod(&product, &self.prime);
        Ok(Element::new(to_fixed(&element, self.prime_len)))
    }

    fn combine(
        &self,
        pwe: &Element,
        rand: &[u8],
        peer_scalar: &BigUint,
        peer_element: &Element,
    ) -> Result<Zeroizing<Vec<u8>>, Error> {
        let rand = BigUint::from_bytes_be(rand);
        let pwe = BigUint::from_bytes_be(pwe.as_bytes());
        let peer_element = BigUint::from_bytes_be(peer_element.as_bytes());
        let base = pwe.modpow(peer_scalar, &self.prime) * peer_element % &self.prime;
        let k = base.modpow(&rand, &self.prime);
        if k.is_zero() || k.is_one() {
            return Err(Error::KeyDerivationFailure);
        }
        Ok(Zeroizing::new(to_fixed(&k, self.prime_len)))
    }

    fn parse_element(&self, bytes: &[u8]) -> Result<Element, Error> {
        if bytes.len() != self.element_len() {
            return Err(Error::MalformedMessage("commit-element"));
        }
        let element = BigUint::from_bytes_be(bytes);
        if element.is_zero() || element.is_one() || element >= &self.prime - 1u32 {
            return Err(Error::InvalidElement);
        }
        if !element.modpow(&self.order, &self.prime).is_one() {
            return Err(Error::InvalidElement);
        }
        Ok(Element::new(bytes.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    const ADDR1: [u8; 6] = [0x82, 0x7b, 0x91, 0x9d, 0xd4, 0xb9];
    const ADDR2: [u8; 6] = [0x1e, 0xec, 0x49, 0xea, 0x64, 0x88];

    #[test]
    fn safe_prime_exponent() {
        for id in [14u16, 15] {
            let group = FfcGroup::new(id).unwrap();
            assert_eq!(group.exponent, BigUint::from(2u32));
            assert_eq!(&group.order * 2u32 + 1u32, group.prime);
        }
        assert!(FfcGroup::new(19).is_none());
    }

    #[test]
    fn password_element_group_14() {
        let group = FfcGroup::new(14).unwrap();
        let seed = PasswordSeed::new(&ADDR1, &ADDR2, b"secret", None);
        let pwe = group.derive_pwe(&seed, &mut OsRng).unwrap();
        assert_eq!(pwe.iterations, 1);
        let bytes = pwe.element.as_bytes();
        assert_eq!(bytes.len(), 256);
        assert_eq!(hex::encode(&bytes[..16]), "34fa3233252efdcd1b483ddd180f2479");
        assert_eq!(hex::encode(&bytes[240..]), "6c6956f892229bd67d7fbbd08a8c67c3");
        assert!(group.parse_element(bytes).is_ok());
    }

    #[test]
    fn password_element_group_15() {
        let group = FfcGroup::new(15).unwrap();
        let seed = PasswordSeed::new(&ADDR1, &ADDR2, b"secret", None);
        let pwe = group.derive_pwe(&seed, &mut OsRng).unwrap();
        assert_eq!(pwe.iterations, 1);
        let bytes = pwe.element.as_bytes();
        assert_eq!(bytes.len(), 384);
        assert_eq!(hex::encode(&bytes[..16]), "92497daf7b6aff2e13e2684d1f65a571");
        assert_eq!(hex::encode(&bytes[368..]), "f1f450f3fd15979ce60c91a32b6391b0");
        assert!(group.parse_element(bytes).is_ok());
    }

    #[test]
    fn commit_element_is_inverse() {
        let group = FfcGroup::new(14).unwrap();
        let seed = PasswordSeed::new(&ADDR1, &ADDR2, b"secret", None);
        let pwe = group.derive_pwe(&seed, &mut OsRng).unwrap().element;
        let mask = BigUint::from(12345u32);
        let element = group.commit_element(&pwe, &to_fixed(&mask, 256)).unwrap();
        let forward = BigUint::from_bytes_be(pwe.as_bytes()).modpow(&mask, &group.prime);
        let product = forward * BigUint::from_bytes_be(element.as_bytes()) % &group.prime;
        assert!(product.is_one());
        assert!(group.parse_element(element.as_bytes()).is_ok());
    }

    #[test]
    fn combine_is_symmetric() {
        let group = FfcGroup::new(14).unwrap();
        let seed = PasswordSeed::new(&ADDR1, &ADDR2, b"secret", None);
        let pwe = group.derive_pwe(&seed, &mut OsRng).unwrap().element;
        let (ra, ma) = (BigUint::from(1001u32), BigUint::from(2002u32));
        let (rb, mb) = (BigUint::from(3003u32), BigUint::from(4004u32));
        let bytes = |v: &BigUint| to_fixed(v, 256);
        let ea = group.commit_element(&pwe, &bytes(&ma)).unwrap();
        let eb = group.commit_element(&pwe, &bytes(&mb)).unwrap();
        let ka = group.combine(&pwe, &bytes(&ra), &(&rb + &mb), &eb).unwrap();
        let kb = group.combine(&pwe, &bytes(&rb), &(&ra + &ma), &ea).unwrap();
        assert_eq!(*ka, *kb);
    }

    #[test]
    fn rejects_invalid_elements() {
        let group = FfcGroup::new(14).unwrap();
        let encode = |v: &BigUint| to_fixed(v, 256);
        let p = group.prime.clone();
        assert!(matches!(
            group.parse_element(&[2u8; 255]),
            Err(Error::MalformedMessage(_))
        ));
        for bad in [
            BigUint::zero(),
            BigUint::one(),
            &p - 1u32,
            p.clone(),
            // -2 is a non-residue, outside the prime-order subgroup
            &p - 2u32,
        ] {
            assert!(matches!(
                group.parse_element(&encode(&bad)),
                Err(Error::InvalidElement)
            ));
        }
        assert!(group.parse_element(&encode(&BigUint::from(4u32))).is_ok());
    }
}
