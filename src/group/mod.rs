//! Finite cyclic groups SAE can run over.
//!
//! Elements of every group are handled as their fixed-width big-endian
//! encodings: `x || y` for the elliptic curves, a single `prime_len` value for
//! the MODP groups. This is also their wire format in commit messages.

use alloc::vec::Vec;
use core::fmt;
use num_bigint::BigUint;
use rand_core::CryptoRngCore;
use tracing::debug;
use zeroize::Zeroizing;

use crate::pwe::{PasswordElement, PasswordSeed};
use crate::Error;

mod ecc;
mod ffc;

pub use ecc::EccGroup;
pub use ffc::FfcGroup;

/// Groups enabled when the caller does not pass an explicit list.
pub const DEFAULT_GROUPS: [u16; 3] = [19, 20, 21];

/// Every group id this crate implements.
pub const SUPPORTED_GROUPS: [u16; 5] = [19, 20, 21, 14, 15];

/// Encoded group element.
#[derive(Clone, PartialEq, Eq)]
pub struct Element(Zeroizing<Vec<u8>>);

impl Element {
    pub(crate) fn new(bytes: Vec<u8>) -> Self {
        Element(Zeroizing::new(bytes))
    }

    /// Fixed-width encoding of the element.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Element({} bytes)", self.0.len())
    }
}

/// Group arithmetic SAE needs, implemented once per group family.
pub(crate) trait GroupOps {
    fn order(&self) -> &BigUint;

    /// Length of the prime in bytes, the width of scalars and coordinates.
    fn prime_len(&self) -> usize;

    fn prime_bits(&self) -> usize;

    /// Length of an encoded element.
    fn element_len(&self) -> usize;

    /// Hunting-and-pecking derivation of the password element.
    fn derive_pwe(
        &self,
        seed: &PasswordSeed<'_>,
        rng: &mut dyn CryptoRngCore,
    ) -> Result<PasswordElement, Error>;

    /// `inverse(scalar-op(mask, PWE))`, `mask` as `prime_len` big-endian bytes.
    fn commit_element(&self, pwe: &Element, mask: &[u8]) -> Result<Element, Error>;

    /// `k = F(scalar-op(rand, elem-op(scalar-op(peer_scalar, PWE), peer_element)))`,
    /// `prime_len` bytes. `rand` is given as `prime_len` big-endian bytes.
    fn combine(
        &self,
        pwe: &Element,
        rand: &[u8],
        peer_scalar: &BigUint,
        peer_element: &Element,
    ) -> Result<Zeroizing<Vec<u8>>, Error>;

    /// Decodes and validates a peer element of exactly `element_len` bytes.
    fn parse_element(&self, bytes: &[u8]) -> Result<Element, Error>;
}

#[derive(Debug, Clone)]
enum Family {
    Ecc(EccGroup),
    Ffc(FfcGroup),
}

/// The group selected for one negotiation.
#[derive(Debug, Clone)]
pub struct GroupContext {
    id: u16,
    family: Family,
}

impl GroupContext {
    /// Sets up the group with IANA id `group_id`.
    pub fn select(group_id: u16) -> Result<Self, Error> {
        let family = if let Some(group) = EccGroup::new(group_id) {
            Family::Ecc(group)
        } else if let Some(group) = FfcGroup::new(group_id) {
            Family::Ffc(group)
        } else {
            debug!(group_id, "SAE: unsupported group");
            return Err(Error::UnsupportedGroup(group_id));
        };
        let ctx = GroupContext {
            id: group_id,
            family,
        };
        debug!(
            group_id,
            elliptic = ctx.is_elliptic(),
            prime_bits = ctx.prime_bits(),
            "SAE: selecting group"
        );
        Ok(ctx)
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn is_elliptic(&self) -> bool {
        matches!(self.family, Family::Ecc(_))
    }

    pub fn order(&self) -> &BigUint {
        self.ops().order()
    }

    pub fn prime_len(&self) -> usize {
        self.ops().prime_len()
    }

    pub fn prime_bits(&self) -> usize {
        self.ops().prime_bits()
    }

    pub fn element_len(&self) -> usize {
        self.ops().element_len()
    }

    pub(crate) fn ops(&self) -> &dyn GroupOps {
        match &self.family {
            Family::Ecc(group) => group,
            Family::Ffc(group) => group,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_supported_groups() {
        let expected = [
            (19u16, true, 32, 256),
            (20, true, 48, 384),
            (21, true, 66, 521),
            (14, false, 256, 2048),
            (15, false, 384, 3072),
        ];
        for (id, elliptic, len, bits) in expected {
            let group = GroupContext::select(id).unwrap();
            assert_eq!(group.id(), id);
            assert_eq!(group.is_elliptic(), elliptic);
            assert_eq!(group.prime_len(), len);
            assert_eq!(group.prime_bits(), bits);
            let element_len = if elliptic { 2 * len } else { len };
            assert_eq!(group.element_len(), element_len);
            assert!(group.order().bits() as usize <= group.prime_bits());
        }
        assert_eq!(SUPPORTED_GROUPS.len(), expected.len());
    }

    #[test]
    fn select_unknown_group() {
        for id in [0u16, 1, 2, 5, 22, 25, 26, 28, 30] {
            assert!(matches!(
                GroupContext::select(id),
                Err(Error::UnsupportedGroup(g)) if g == id
            ));
        }
    }

    #[test]
    fn element_debug_hides_bytes() {
        let element = Element::new(alloc::vec![0xaa; 4]);
        assert_eq!(alloc::format!("{:?}", element), "Element(4 bytes)");
    }
}
