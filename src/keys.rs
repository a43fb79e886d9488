//! Shared secret and KCK/PMK derivation.

use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::bignum::to_fixed;
use crate::commit::CommitMaterial;
use crate::group::{Element, GroupContext};
use crate::kdf::{hmac_sha256_vector, sha256_prf_bits, SHA256_MAC_LEN};
use crate::{Error, KCK_LEN, PMKID_LEN, PMK_LEN};

const KCK_AND_PMK: &str = "SAE KCK and PMK";

/// Keys derived from a completed commit exchange.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKeys {
    pub kck: [u8; KCK_LEN],
    pub pmk: [u8; PMK_LEN],
    pub pmkid: [u8; PMKID_LEN],
}

/// Computes `K`, then `KCK || PMK = KDF-512(H(0^32, k), "SAE KCK and PMK",
/// (own_scalar + peer_scalar) mod r)` and the PMKID.
pub fn derive(
    group: &GroupContext,
    pwe: &Element,
    rand: &[u8],
    own: &CommitMaterial,
    peer: &CommitMaterial,
) -> Result<DerivedKeys, Error> {
    let k = group
        .ops()
        .combine(pwe, rand, &peer.scalar, &peer.element)?;

    let keyseed = Zeroizing::new(hmac_sha256_vector(&[0u8; SHA256_MAC_LEN], &[&k[..]]));
    let sum = (&own.scalar + &peer.scalar) % group.order();
    let sum = to_fixed(&sum, group.prime_len());
    let keys = sha256_prf_bits(&keyseed[..], KCK_AND_PMK, &sum, 8 * (KCK_LEN + PMK_LEN));

    let mut derived = DerivedKeys {
        kck: [0u8; KCK_LEN],
        pmk: [0u8; PMK_LEN],
        pmkid: [0u8; PMKID_LEN],
    };
    derived.kck.copy_from_slice(&keys[..KCK_LEN]);
    derived.pmk.copy_from_slice(&keys[KCK_LEN..]);
    derived.pmkid.copy_from_slice(&sum[..PMKID_LEN]);
    Ok(derived)
}
