//! Hunting-and-pecking loop shared by both password element derivations.

use tracing::{debug, trace};
use zeroize::Zeroizing;

use crate::group::Element;
use crate::kdf::{hmac_sha256_vector, SHA256_MAC_LEN};
use crate::{Error, ETH_ALEN};

/// Iterations the ECC loop always executes, found or not.
pub const ECC_MIN_ITERATIONS: u8 = 40;
/// Hard cap on loop iterations.
pub const MAX_ITERATIONS: u8 = 200;

/// Label of the KDF stretching a pwd-seed into a pwd-value.
pub const HUNTING_AND_PECKING: &str = "SAE Hunting and Pecking";

/// A derived password element and the number of loop iterations it took.
pub struct PasswordElement {
    pub element: Element,
    pub iterations: u8,
}

/// Inputs of `pwd-seed = HMAC-SHA256(salt, password [|| identifier] || counter)`.
pub struct PasswordSeed<'a> {
    salt: [u8; 2 * ETH_ALEN],
    password: &'a [u8],
    identifier: Option<&'a [u8]>,
}

impl<'a> PasswordSeed<'a> {
    /// The salt is `max(addr1, addr2) || min(addr1, addr2)`, so both peers
    /// derive it identically.
    pub fn new(
        addr1: &[u8; ETH_ALEN],
        addr2: &[u8; ETH_ALEN],
        password: &'a [u8],
        identifier: Option<&'a str>,
    ) -> Self {
        let (high, low) = if addr1 > addr2 {
            (addr1, addr2)
        } else {
            (addr2, addr1)
        };
        let mut salt = [0u8; 2 * ETH_ALEN];
        salt[..ETH_ALEN].copy_from_slice(high);
        salt[ETH_ALEN..].copy_from_slice(low);
        PasswordSeed {
            salt,
            password,
            identifier: identifier.map(str::as_bytes),
        }
    }

    /// Length of the real password, so a dummy of the same size can be drawn.
    pub fn password_len(&self) -> usize {
        self.password.len()
    }

    fn seed(&self, password: &[u8], counter: u8) -> Zeroizing<[u8; SHA256_MAC_LEN]> {
        let counter = [counter];
        Zeroizing::new(match self.identifier {
            Some(identifier) => hmac_sha256_vector(&self.salt, &[password, identifier, &counter[..]]),
            None => hmac_sha256_vector(&self.salt, &[password, &counter[..]]),
        })
    }
}

/// Runs `test` on successive pwd-seeds until it accepts one.
///
/// The loop keeps going until at least `min_iterations` seeds were tested.
/// Once a candidate is found and `dummy` is given, the remaining iterations
/// hash `dummy` instead of the password. Returns the first accepted candidate
/// and the number of iterations executed.
pub fn hunt_and_peck<T>(
    seed: &PasswordSeed<'_>,
    min_iterations: u8,
    dummy: Option<&[u8]>,
    mut test: impl FnMut(&[u8; SHA256_MAC_LEN]) -> Result<Option<T>, Error>,
) -> Result<(T, u8), Error> {
    let mut found = None;
    let mut password: &[u8] = seed.password;
    let mut iterations = 0;
    for counter in 1..=MAX_ITERATIONS {
        if found.is_some() && counter > min_iterations {
            break;
        }
        trace!(counter, "SAE: pwd-seed");
        iterations = counter;
        let pwd_seed = seed.seed(password, counter);
        let candidate = test(&pwd_seed)?;
        if found.is_none() && candidate.is_some() {
            found = candidate;
            if let Some(dummy) = dummy {
                password = dummy;
            }
        }
    }
    match found {
        Some(value) => {
            debug!(iterations, "SAE: password element derived");
            Ok((value, iterations))
        }
        None => {
            debug!("SAE: could not generate PWE");
            Err(Error::DerivationExhausted)
        }
    }
}
