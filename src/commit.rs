//! SAE commit message: generation, encoding and peer parsing.
//!
//! Layout after the 16-bit little-endian group id:
//!
//! ```text
//! [anti-clogging token] || scalar || element [|| 0xff len 0x21 identifier]
//! ```

use alloc::vec::Vec;
use num_bigint::BigUint;
use num_traits::{One, Zero};
use rand_core::CryptoRngCore;
use tracing::debug;
use zeroize::Zeroizing;

use crate::bignum::{random_scalar, to_fixed};
use crate::group::{Element, GroupContext};
use crate::{Error, ANTI_CLOGGING_TOKEN_LEN};

/// Element ID of an extension element.
const WLAN_EID_EXTENSION: u8 = 255;
/// Extension ID of the Password Identifier element.
const WLAN_EID_EXT_PASSWORD_IDENTIFIER: u8 = 33;
/// Longest identifier an element length octet can describe.
pub const MAX_PASSWORD_IDENTIFIER_LEN: usize = 254;
/// Redraws of `rand`/`mask` before giving up on a usable scalar.
const MAX_SCALAR_DRAWS: usize = 100;

/// Scalar and element of one side's commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitMaterial {
    pub scalar: BigUint,
    pub element: Element,
}

impl CommitMaterial {
    /// `scalar || element`, scalar padded to the prime length.
    pub fn encode(&self, prime_len: usize) -> Vec<u8> {
        let mut out = to_fixed(&self.scalar, prime_len);
        out.extend_from_slice(self.element.as_bytes());
        out
    }
}

/// Validated contents of a peer commit.
#[derive(Debug)]
pub struct PeerCommit<'a> {
    pub token: Option<&'a [u8]>,
    pub material: CommitMaterial,
    pub password_identifier: Option<&'a [u8]>,
}

/// Draws `rand` and `mask` and computes the own commit.
///
/// Returns the commit material and `rand`, which is kept for the shared
/// secret computation.
pub fn generate(
    group: &GroupContext,
    pwe: &Element,
    rng: &mut dyn CryptoRngCore,
) -> Result<(CommitMaterial, Zeroizing<Vec<u8>>), Error> {
    let order = group.order();
    for _ in 0..MAX_SCALAR_DRAWS {
        let rand = random_scalar(rng, order)?;
        let mask = random_scalar(rng, order)?;
        let scalar = (&rand + &mask) % order;
        if scalar.is_zero() || scalar.is_one() {
            continue;
        }
        return from_secrets(group, pwe, &rand, &mask);
    }
    Err(Error::InsufficientRandomness)
}

/// Commit for given `rand` and `mask`.
pub(crate) fn from_secrets(
    group: &GroupContext,
    pwe: &Element,
    rand: &BigUint,
    mask: &BigUint,
) -> Result<(CommitMaterial, Zeroizing<Vec<u8>>), Error> {
    let scalar = (rand + mask) % group.order();
    if scalar.is_zero() || scalar.is_one() {
        return Err(Error::InvalidScalar);
    }
    let mask = Zeroizing::new(to_fixed(mask, group.prime_len()));
    let element = group.ops().commit_element(pwe, &mask)?;
    let rand = Zeroizing::new(to_fixed(rand, group.prime_len()));
    Ok((CommitMaterial { scalar, element }, rand))
}

/// Encodes a commit message.
pub fn write(
    group: &GroupContext,
    token: Option<&[u8]>,
    own: &CommitMaterial,
    password_identifier: Option<&[u8]>,
) -> Result<Vec<u8>, Error> {
    let token = token.unwrap_or_default();
    let identifier = password_identifier.unwrap_or_default();
    if identifier.len() > MAX_PASSWORD_IDENTIFIER_LEN {
        return Err(Error::Overflow(
            "Password identifier must be at most 254 bytes long",
        ));
    }
    let mut out = Vec::with_capacity(
        2 + token.len() + group.prime_len() + group.element_len() + 3 + identifier.len(),
    );
    out.extend_from_slice(&group.id().to_le_bytes());
    out.extend_from_slice(token);
    out.extend_from_slice(&own.encode(group.prime_len()));
    if password_identifier.is_some() {
        out.push(WLAN_EID_EXTENSION);
        out.push(1 + identifier.len() as u8);
        out.push(WLAN_EID_EXT_PASSWORD_IDENTIFIER);
        out.extend_from_slice(identifier);
    }
    Ok(out)
}

/// Group id at the head of a commit message.
pub fn group_id(data: &[u8]) -> Result<u16, Error> {
    match data {
        [lo, hi, ..] => Ok(u16::from_le_bytes([*lo, *hi])),
        _ => Err(Error::MalformedMessage("finite cyclic group")),
    }
}

/// Identifier carried by a Password Identifier element at the start of `data`.
fn password_identifier_element(data: &[u8]) -> Option<&[u8]> {
    match data {
        [WLAN_EID_EXTENSION, len, WLAN_EID_EXT_PASSWORD_IDENTIFIER, rest @ ..]
            if *len >= 1 && data.len() - 2 >= usize::from(*len) =>
        {
            Some(&rest[..usize::from(*len) - 1])
        }
        _ => None,
    }
}

/// Splits an anti-clogging token off the front of `body`.
///
/// Tokens have no length field. Extra octets beyond scalar and element are a
/// token if there are at least `ANTI_CLOGGING_TOKEN_LEN` of them and they do
/// not start with a Password Identifier element. A Password Identifier
/// element right after such a token is not part of it.
fn split_token<'a>(group: &GroupContext, body: &'a [u8]) -> (Option<&'a [u8]>, &'a [u8]) {
    let scalar_elem_len = group.prime_len() + group.element_len();
    if body.len() <= scalar_elem_len {
        return (None, body);
    }
    let mut token_len = body.len() - scalar_elem_len;
    if token_len < ANTI_CLOGGING_TOKEN_LEN {
        debug!(
            len = token_len,
            "SAE: too short optional data to include an anti-clogging token"
        );
        return (None, body);
    }
    if password_identifier_element(&body[scalar_elem_len..]).is_some() {
        return (None, body);
    }
    let after_token = &body[scalar_elem_len + ANTI_CLOGGING_TOKEN_LEN..];
    if let Some(identifier) = password_identifier_element(after_token) {
        token_len -= 3 + identifier.len();
    }
    debug!(len = token_len, "SAE: anti-clogging token");
    let (token, rest) = body.split_at(token_len);
    (Some(token), rest)
}

/// Parses and validates the commit `body` following the group id.
///
/// `expected_identifier` is the identifier bound to the local password.
/// `replayed_scalar`, when set, is a peer scalar that must not be accepted
/// again.
pub fn parse<'a>(
    group: &GroupContext,
    body: &'a [u8],
    expected_identifier: Option<&[u8]>,
    replayed_scalar: Option<&BigUint>,
) -> Result<PeerCommit<'a>, Error> {
    let (token, body) = split_token(group, body);

    let prime_len = group.prime_len();
    if body.len() < prime_len {
        debug!("SAE: not enough data for commit-scalar");
        return Err(Error::MalformedMessage("commit-scalar"));
    }
    let (scalar, body) = body.split_at(prime_len);
    let scalar = BigUint::from_bytes_be(scalar);
    if replayed_scalar == Some(&scalar) {
        debug!("SAE: do not accept re-use of previous peer-commit-scalar");
        return Err(Error::InvalidScalar);
    }
    if scalar.is_zero() || scalar.is_one() || &scalar >= group.order() {
        debug!("SAE: invalid peer scalar");
        return Err(Error::InvalidScalar);
    }

    let element_len = group.element_len();
    if body.len() < element_len {
        debug!("SAE: not enough data for commit-element");
        return Err(Error::MalformedMessage("commit-element"));
    }
    let (element, body) = body.split_at(element_len);
    let element = group.ops().parse_element(element).map_err(|e| {
        debug!("SAE: invalid peer element");
        e
    })?;

    let password_identifier = password_identifier_element(body);
    match (expected_identifier, password_identifier) {
        (Some(_), None) => {
            debug!("SAE: no password identifier included, but expected one");
            return Err(Error::UnknownPasswordIdentifier);
        }
        (Some(expected), Some(received)) if expected != received => {
            debug!("SAE: the included password identifier does not match the expected one");
            return Err(Error::UnknownPasswordIdentifier);
        }
        _ => {}
    }

    Ok(PeerCommit {
        token,
        material: CommitMaterial { scalar, element },
        password_identifier,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pwe::PasswordSeed;
    use alloc::vec;
    use rand::rngs::OsRng;

    const ADDR1: [u8; 6] = [0x82, 0x7b, 0x91, 0x9d, 0xd4, 0xb9];
    const ADDR2: [u8; 6] = [0x1e, 0xec, 0x49, 0xea, 0x64, 0x88];

    fn setup(group_id: u16) -> (GroupContext, Element) {
        let group = GroupContext::select(group_id).unwrap();
        let seed = PasswordSeed::new(&ADDR1, &ADDR2, b"secret", None);
        let pwe = group.ops().derive_pwe(&seed, &mut OsRng).unwrap().element;
        (group, pwe)
    }

    #[test]
    fn round_trip_both_families() {
        for id in [19u16, 21, 14] {
            let (group, pwe) = setup(id);
            let (own, rand) = generate(&group, &pwe, &mut OsRng).unwrap();
            assert_eq!(rand.len(), group.prime_len());
            let msg = write(&group, None, &own, None).unwrap();
            assert_eq!(msg.len(), 2 + group.prime_len() + group.element_len());
            assert_eq!(group_id(&msg).unwrap(), id);
            let peer = parse(&group, &msg[2..], None, None).unwrap();
            assert_eq!(peer.material, own);
            assert!(peer.token.is_none());
            assert!(peer.password_identifier.is_none());
        }
    }

    #[test]
    fn deterministic_for_fixed_secrets() {
        let (group, pwe) = setup(19);
        let rand = BigUint::from(0x1234u32);
        let mask = BigUint::from(0x5678u32);
        let (first, _) = from_secrets(&group, &pwe, &rand, &mask).unwrap();
        let (second, _) = from_secrets(&group, &pwe, &rand, &mask).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.scalar, BigUint::from(0x1234u32 + 0x5678));

        // rand + mask == order + 1 reduces to a forbidden scalar
        let mask = group.order() + 1u32 - &rand;
        assert!(matches!(
            from_secrets(&group, &pwe, &rand, &mask),
            Err(Error::InvalidScalar)
        ));
    }

    #[test]
    fn token_and_identifier_layouts() {
        let (group, pwe) = setup(19);
        let (own, _) = generate(&group, &pwe, &mut OsRng).unwrap();
        let token = [0x5au8; 32];

        let msg = write(&group, Some(&token[..]), &own, None).unwrap();
        let peer = parse(&group, &msg[2..], None, None).unwrap();
        assert_eq!(peer.token, Some(&token[..]));
        assert_eq!(peer.material, own);

        let msg = write(&group, Some(&token[..]), &own, Some(&b"psk4internet"[..])).unwrap();
        assert_eq!(&msg[msg.len() - 15..msg.len() - 12], &[0xff, 13, 0x21]);
        let peer = parse(&group, &msg[2..], Some(&b"psk4internet"[..]), None).unwrap();
        assert_eq!(peer.token, Some(&token[..]));
        assert_eq!(peer.password_identifier, Some(&b"psk4internet"[..]));

        // a long identifier without a token is not mistaken for one
        let long_id = [b'x'; 40];
        let msg = write(&group, None, &own, Some(&long_id[..])).unwrap();
        let peer = parse(&group, &msg[2..], None, None).unwrap();
        assert!(peer.token.is_none());
        assert_eq!(peer.password_identifier, Some(&long_id[..]));
    }

    #[test]
    fn short_extra_data_is_not_a_token() {
        let (group, pwe) = setup(19);
        let (own, _) = generate(&group, &pwe, &mut OsRng).unwrap();
        let msg = write(&group, Some(&[1u8; 8][..]), &own, None).unwrap();
        // the 8 octets are read as the start of the scalar
        let peer = parse(&group, &msg[2..], None, None);
        assert!(!matches!(peer, Ok(ref p) if p.material == own));
    }

    #[test]
    fn identifier_mismatch() {
        let (group, pwe) = setup(19);
        let (own, _) = generate(&group, &pwe, &mut OsRng).unwrap();
        let plain = write(&group, None, &own, None).unwrap();
        assert!(matches!(
            parse(&group, &plain[2..], Some(&b"id"[..]), None),
            Err(Error::UnknownPasswordIdentifier)
        ));
        let other = write(&group, None, &own, Some(&b"other"[..])).unwrap();
        assert!(matches!(
            parse(&group, &other[2..], Some(&b"id"[..]), None),
            Err(Error::UnknownPasswordIdentifier)
        ));
        assert!(matches!(
            write(&group, None, &own, Some(&[b'a'; 255][..])),
            Err(Error::Overflow(_))
        ));
    }

    #[test]
    fn rejects_truncated_and_out_of_range() {
        let (group, pwe) = setup(19);
        let (own, _) = generate(&group, &pwe, &mut OsRng).unwrap();
        let msg = write(&group, None, &own, None).unwrap();

        assert!(matches!(group_id(&[19]), Err(Error::MalformedMessage(_))));
        assert!(matches!(
            parse(&group, &msg[2..20], None, None),
            Err(Error::MalformedMessage("commit-scalar"))
        ));
        assert!(matches!(
            parse(&group, &msg[2..60], None, None),
            Err(Error::MalformedMessage("commit-element"))
        ));

        let mut body = msg[2..].to_vec();
        body[..32].copy_from_slice(&to_fixed(&BigUint::one(), 32));
        assert!(matches!(
            parse(&group, &body, None, None),
            Err(Error::InvalidScalar)
        ));
        body[..32].copy_from_slice(&to_fixed(group.order(), 32));
        assert!(matches!(
            parse(&group, &body, None, None),
            Err(Error::InvalidScalar)
        ));

        let mut body = msg[2..].to_vec();
        body[32..].copy_from_slice(&vec![0u8; 64]);
        assert!(matches!(
            parse(&group, &body, None, None),
            Err(Error::InvalidElement)
        ));
    }

    #[test]
    fn replayed_scalar_rejected() {
        let (group, pwe) = setup(19);
        let (own, _) = generate(&group, &pwe, &mut OsRng).unwrap();
        let msg = write(&group, None, &own, None).unwrap();
        assert!(matches!(
            parse(&group, &msg[2..], None, Some(&own.scalar)),
            Err(Error::InvalidScalar)
        ));
        let other = BigUint::from(3u32);
        assert!(parse(&group, &msg[2..], None, Some(&other)).is_ok());
    }
}
