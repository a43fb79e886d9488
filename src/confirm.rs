//! SAE confirm message.

use alloc::vec::Vec;
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::commit::CommitMaterial;
use crate::kdf::{hmac_sha256_vector, SHA256_MAC_LEN};
use crate::{Error, CONFIRM_LEN};

/// `CN(KCK, send_confirm, first, second)` where `first` is the commit of the
/// side sending the confirm.
pub fn confirm_value(
    kck: &[u8],
    send_confirm: u16,
    first: &CommitMaterial,
    second: &CommitMaterial,
    prime_len: usize,
) -> [u8; SHA256_MAC_LEN] {
    hmac_sha256_vector(
        kck,
        &[
            &send_confirm.to_le_bytes()[..],
            &first.encode(prime_len)[..],
            &second.encode(prime_len)[..],
        ],
    )
}

/// `send_confirm (le16) || confirm`.
pub fn write(
    kck: &[u8],
    send_confirm: u16,
    own: &CommitMaterial,
    peer: &CommitMaterial,
    prime_len: usize,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(CONFIRM_LEN);
    out.extend_from_slice(&send_confirm.to_le_bytes());
    out.extend_from_slice(&confirm_value(kck, send_confirm, own, peer, prime_len));
    out
}

/// Checks a peer confirm message and returns its send-confirm counter.
pub fn verify(
    kck: &[u8],
    data: &[u8],
    own: &CommitMaterial,
    peer: &CommitMaterial,
    prime_len: usize,
) -> Result<u16, Error> {
    if data.len() < CONFIRM_LEN {
        debug!(len = data.len(), "SAE: too short confirm");
        return Err(Error::MalformedMessage("confirm"));
    }
    let send_confirm = u16::from_le_bytes([data[0], data[1]]);
    let expected = confirm_value(kck, send_confirm, peer, own, prime_len);
    if !bool::from(data[2..CONFIRM_LEN].ct_eq(&expected[..])) {
        debug!(send_confirm, "SAE: confirm mismatch");
        return Err(Error::ConfirmMismatch);
    }
    Ok(send_confirm)
}
