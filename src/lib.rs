//! SAE (Simultaneous Authentication of Equals), the WPA3 password-authenticated key exchange.
//!
//! # Overview
//! This crate implements the SAE protocol engine of IEEE Std 802.11: the hunting-and-pecking
//! password element derivation, commit and confirm messages, and the derivation of the pairwise
//! master key (PMK) from a shared password. The implementation is designed to operate without
//! the standard library (`#![no_std]`, with `alloc`).
//!
//! Supported finite cyclic groups are the NIST curves P-256, P-384 and P-521 (groups 19, 20
//! and 21) and the RFC 3526 MODP groups 14 and 15.
//!
//! ## Parties
//! SAE is symmetric: both stations run the same steps, in any interleaving, and none of them
//! plays a distinguished initiator role. Each station is identified by its MAC address.
//!
//! ## Protocol Workflow
//! 1. **Commit**: each station calls [`Sae::begin_with_rng`] and sends the returned commit message.
//! 2. **Peer commit**: the commit received from the other station goes through
//!    [`Sae::process_commit`], then [`Sae::derive_keys`] computes the shared secret.
//! 3. **Confirm**: each station sends [`Sae::build_confirm`] and checks the received confirm with
//!    [`Sae::verify_confirm`]. Once both are done the negotiation is accepted and [`Sae::pmk`]
//!    returns the pairwise master key.
//!
//! ## Constants
//! - `ETH_ALEN`: Length of a MAC address in bytes.
//! - `KCK_LEN`, `PMK_LEN`, `PMKID_LEN`: Lengths of the derived keys in bytes.
//! - `CONFIRM_LEN`: Length of a confirm message in bytes.
//! - `ANTI_CLOGGING_TOKEN_LEN`: Minimum length of an anti-clogging token recognized in a commit.
//! - `DEFAULT_GROUPS`: Groups accepted from the peer when no explicit list is given.
//!
//! ## Errors
//! The `Error` enum defines possible errors, including:
//! - Unsupported groups and malformed messages.
//! - Invalid scalars and elements.
//! - Confirm mismatches.
//! - Random number generator failures.
//!
//! A failure aborts the negotiation; [`Error::status_code`] gives the IEEE 802.11 status code to
//! reject a commit with.
//!
//! ## Example Usage
//! ```rust
//! use sae_embedded::*;
//! use rand::rngs::OsRng;
//!
//! let sta_a = [0x02, 0, 0, 0, 0, 0x0a];
//! let sta_b = [0x02, 0, 0, 0, 0, 0x0b];
//! let (commit_a, mut a) = Sae::begin_with_rng(sta_a, sta_b, "password", None, 19, OsRng).unwrap();
//! let (commit_b, mut b) = Sae::begin_with_rng(sta_b, sta_a, "password", None, 19, OsRng).unwrap();
//!
//! assert_eq!(a.process_commit(&commit_b, None), CommitOutcome::Accept(false));
//! assert_eq!(b.process_commit(&commit_a, None), CommitOutcome::Accept(false));
//! a.derive_keys().unwrap();
//! b.derive_keys().unwrap();
//!
//! let confirm_a = a.build_confirm().unwrap();
//! let confirm_b = b.build_confirm().unwrap();
//! a.verify_confirm(&confirm_b).unwrap();
//! b.verify_confirm(&confirm_a).unwrap();
//!
//! assert_eq!(a.state(), ProtocolState::Accepted);
//! assert_eq!(a.pmk(), b.pmk());
//! assert_eq!(a.pmkid(), b.pmkid());
//! ```

#![no_std]
#![forbid(unsafe_code)]

extern crate alloc;

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use num_bigint::BigUint;
use rand_core::{CryptoRng, CryptoRngCore, RngCore};
use tracing::debug;
use zeroize::Zeroizing;

mod bignum;
mod commit;
mod confirm;
mod error;
mod group;
mod kdf;
mod keys;
mod pwe;

pub use error::{Error, StatusCode};
pub use group::{DEFAULT_GROUPS, SUPPORTED_GROUPS};

use commit::CommitMaterial;
use group::{Element, GroupContext};
use keys::DerivedKeys;
use pwe::PasswordSeed;

/// Length of a MAC address in bytes.
pub const ETH_ALEN: usize = 6;
/// Length of the key confirmation key in bytes.
pub const KCK_LEN: usize = 32;
/// Length of the pairwise master key in bytes.
pub const PMK_LEN: usize = 32;
/// Length of the PMK identifier in bytes.
pub const PMKID_LEN: usize = 16;
/// Length of a confirm message in bytes.
pub const CONFIRM_LEN: usize = 2 + kdf::SHA256_MAC_LEN;
/// Minimum length of an anti-clogging token found in a peer commit.
pub const ANTI_CLOGGING_TOKEN_LEN: usize = kdf::SHA256_MAC_LEN;

/// Progress of one SAE negotiation. States only move forward.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ProtocolState {
    /// No commit sent yet.
    Nothing,
    /// Own commit generated.
    Committed,
    /// Shared secret and keys derived from both commits.
    Confirmed,
    /// Both confirms exchanged and verified.
    Accepted,
}

impl fmt::Display for ProtocolState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            ProtocolState::Nothing => "Nothing",
            ProtocolState::Committed => "Committed",
            ProtocolState::Confirmed => "Confirmed",
            ProtocolState::Accepted => "Accepted",
        })
    }
}

/// How a received commit message is to be answered.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The commit is valid; the flag tells whether it carried an anti-clogging token.
    Accept(bool),
    /// Drop the frame without any answer.
    SilentlyDiscard,
    /// Reject the commit with this status code.
    Reject(StatusCode),
}

/// One SAE negotiation with a peer.
pub struct Sae {
    group: GroupContext,
    state: ProtocolState,
    aborted: bool,
    local_addr: [u8; ETH_ALEN],
    peer_addr: [u8; ETH_ALEN],
    password: Zeroizing<Vec<u8>>,
    password_identifier: Option<String>,
    token: Option<Vec<u8>>,
    pwe: Option<Element>,
    rand: Option<Zeroizing<Vec<u8>>>,
    own: Option<CommitMaterial>,
    peer: Option<CommitMaterial>,
    peer_token: Option<Vec<u8>>,
    peer_password_identifier: Option<Vec<u8>>,
    keys: Option<DerivedKeys>,
    send_confirm: u16,
    confirm_sent: bool,
    confirm_verified: bool,
}

impl fmt::Debug for Sae {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Sae")
            .field("group", &self.group.id())
            .field("state", &self.state)
            .field("aborted", &self.aborted)
            .field("send_confirm", &self.send_confirm)
            .finish_non_exhaustive()
    }
}

impl Sae {
    /// Creates a negotiation in the `Nothing` state.
    ///
    /// `password_identifier` names the password for the peer; it must be at most 254 bytes long.
    pub fn new(
        local_addr: [u8; ETH_ALEN],
        peer_addr: [u8; ETH_ALEN],
        password: impl AsRef<[u8]>,
        password_identifier: Option<&str>,
        group_id: u16,
    ) -> Result<Self, Error> {
        if password_identifier.map_or(0, str::len) > commit::MAX_PASSWORD_IDENTIFIER_LEN {
            return Err(Error::Overflow(
                "Password identifier must be at most 254 bytes long",
            ));
        }
        let group = GroupContext::select(group_id)?;
        Ok(Sae {
            group,
            state: ProtocolState::Nothing,
            aborted: false,
            local_addr,
            peer_addr,
            password: Zeroizing::new(password.as_ref().to_vec()),
            password_identifier: password_identifier.map(String::from),
            token: None,
            pwe: None,
            rand: None,
            own: None,
            peer: None,
            peer_token: None,
            peer_password_identifier: None,
            keys: None,
            send_confirm: 1,
            confirm_sent: false,
            confirm_verified: false,
        })
    }

    /// s. [`Sae::begin_with_rng`]
    #[cfg(feature = "getrandom")]
    pub fn begin(
        local_addr: [u8; ETH_ALEN],
        peer_addr: [u8; ETH_ALEN],
        password: impl AsRef<[u8]>,
        password_identifier: Option<&str>,
        group_id: u16,
    ) -> Result<(Vec<u8>, Self), Error> {
        Self::begin_with_rng(
            local_addr,
            peer_addr,
            password,
            password_identifier,
            group_id,
            rand::rngs::OsRng,
        )
    }

    /// Starts a negotiation with a custom random number generator.
    ///
    /// It performs the following actions:
    /// 1. Selects the group `group_id`.
    /// 2. Derives the password element from the password, the optional password identifier and
    ///    both MAC addresses.
    /// 3. Draws the private `rand` and `mask` values and computes the commit scalar and element.
    ///
    /// # Data to be sent over the wire:
    ///
    /// The returned commit message **must be sent to the peer**. It contains:
    /// *   the group id (2 bytes, little endian),
    /// *   the commit scalar (prime length),
    /// *   the commit element (twice the prime length for curves, prime length otherwise),
    /// *   the Password Identifier element, if a password identifier is used.
    ///
    /// # Returns
    ///
    /// * `Ok((commit, Sae))`: The commit message and the negotiation, in the `Committed` state.
    /// * `Err(Error)`: If the group is not supported or the derivation fails.
    pub fn begin_with_rng(
        local_addr: [u8; ETH_ALEN],
        peer_addr: [u8; ETH_ALEN],
        password: impl AsRef<[u8]>,
        password_identifier: Option<&str>,
        group_id: u16,
        rng: impl CryptoRng + RngCore,
    ) -> Result<(Vec<u8>, Self), Error> {
        let mut sae = Self::new(local_addr, peer_addr, password, password_identifier, group_id)?;
        let commit = sae.commit_with_rng(rng)?;
        Ok((commit, sae))
    }

    /// s. [`Sae::commit_with_rng`]
    #[cfg(feature = "getrandom")]
    pub fn commit(&mut self) -> Result<Vec<u8>, Error> {
        self.commit_with_rng(rand::rngs::OsRng)
    }

    /// Derives the password element and generates the own commit.
    ///
    /// Only valid in the `Nothing` state. Moves to `Committed`.
    pub fn commit_with_rng(&mut self, mut rng: impl CryptoRng + RngCore) -> Result<Vec<u8>, Error> {
        self.check_state(&[ProtocolState::Nothing])?;
        let res = self.generate_commit(&mut rng);
        let (own, rand) = self.abort_on_error(res)?;
        self.install_commit(own, rand)
    }

    fn generate_commit(
        &mut self,
        rng: &mut dyn CryptoRngCore,
    ) -> Result<(CommitMaterial, Zeroizing<Vec<u8>>), Error> {
        let seed = PasswordSeed::new(
            &self.local_addr,
            &self.peer_addr,
            &self.password,
            self.password_identifier.as_deref(),
        );
        let pwe = self.group.ops().derive_pwe(&seed, &mut *rng)?.element;
        let commit = commit::generate(&self.group, &pwe, rng)?;
        self.pwe = Some(pwe);
        Ok(commit)
    }

    fn install_commit(
        &mut self,
        own: CommitMaterial,
        rand: Zeroizing<Vec<u8>>,
    ) -> Result<Vec<u8>, Error> {
        self.own = Some(own);
        self.rand = Some(rand);
        self.state = ProtocolState::Committed;
        debug!(group = self.group.id(), "SAE: commit generated");
        self.commit_message()
    }

    /// Commit message for the own commit, e.g. for retransmission.
    ///
    /// It echoes the anti-clogging token set with [`Sae::set_anti_clogging_token`].
    pub fn commit_message(&self) -> Result<Vec<u8>, Error> {
        if self.aborted {
            return Err(Error::Aborted);
        }
        let own = self.own.as_ref().ok_or(Error::InvalidState(self.state))?;
        commit::write(
            &self.group,
            self.token.as_deref(),
            own,
            self.password_identifier.as_deref().map(str::as_bytes),
        )
    }

    /// Token the responder asked for; subsequent commit messages include it.
    pub fn set_anti_clogging_token(&mut self, token: impl AsRef<[u8]>) {
        self.token = Some(token.as_ref().to_vec());
    }

    /// Selects another group before the commit is generated.
    ///
    /// Once committed, only the current group is accepted.
    pub fn set_group(&mut self, group_id: u16) -> Result<(), Error> {
        if self.aborted {
            return Err(Error::Aborted);
        }
        if group_id == self.group.id() {
            return Ok(());
        }
        if self.state != ProtocolState::Nothing {
            debug!(
                current = self.group.id(),
                requested = group_id,
                "SAE: group change after commit refused"
            );
            return Err(Error::GroupChangeNotAllowed {
                current: self.group.id(),
                requested: group_id,
            });
        }
        self.group = GroupContext::select(group_id)?;
        Ok(())
    }

    /// Processes a commit message received from the peer.
    ///
    /// `allowed_groups` lists the groups the peer may use; `None` means [`DEFAULT_GROUPS`].
    ///
    /// A valid commit is stored for [`Sae::derive_keys`]. A commit reflecting the own commit
    /// is to be dropped silently, whatever the state. Any other failure while `Committed` aborts
    /// the negotiation and yields the status code to reject the commit with. Once the keys are
    /// derived they are kept and every other commit is rejected.
    pub fn process_commit(
        &mut self,
        peer_commit: &[u8],
        allowed_groups: Option<&[u16]>,
    ) -> CommitOutcome {
        if self.aborted {
            return CommitOutcome::Reject(StatusCode::UnspecifiedFailure);
        }
        let res = match self.state {
            ProtocolState::Committed => self.accept_commit(peer_commit, allowed_groups),
            ProtocolState::Confirmed | ProtocolState::Accepted => {
                self.check_late_commit(peer_commit, allowed_groups)
            }
            state => Err(Error::InvalidState(state)),
        };
        let abort = self.state == ProtocolState::Committed;
        match res {
            Ok(token_present) => CommitOutcome::Accept(token_present),
            Err(Error::ReflectionDetected) => {
                debug!(state = %self.state, "SAE: reflection attack detected, dropping commit");
                self.aborted |= abort;
                CommitOutcome::SilentlyDiscard
            }
            Err(e) => {
                debug!(error = %e, state = %self.state, "SAE: rejecting peer commit");
                self.aborted |= abort;
                CommitOutcome::Reject(e.status_code())
            }
        }
    }

    fn check_group(&self, data: &[u8], allowed_groups: Option<&[u16]>) -> Result<(), Error> {
        let group_id = commit::group_id(data)?;
        let allowed = allowed_groups.unwrap_or(&DEFAULT_GROUPS);
        if !allowed.contains(&group_id) || !SUPPORTED_GROUPS.contains(&group_id) {
            debug!(group_id, "SAE: peer group not allowed");
            return Err(Error::UnsupportedGroup(group_id));
        }
        if group_id != self.group.id() {
            return Err(Error::GroupChangeNotAllowed {
                current: self.group.id(),
                requested: group_id,
            });
        }
        Ok(())
    }

    fn parse_peer_commit<'a>(
        &self,
        data: &'a [u8],
        allowed_groups: Option<&[u16]>,
        replayed_scalar: Option<&BigUint>,
    ) -> Result<commit::PeerCommit<'a>, Error> {
        self.check_group(data, allowed_groups)?;
        let peer = commit::parse(
            &self.group,
            &data[2..],
            self.password_identifier.as_deref().map(str::as_bytes),
            replayed_scalar,
        )?;
        if self.own.as_ref() == Some(&peer.material) {
            return Err(Error::ReflectionDetected);
        }
        Ok(peer)
    }

    fn accept_commit(
        &mut self,
        data: &[u8],
        allowed_groups: Option<&[u16]>,
    ) -> Result<bool, Error> {
        let peer = self.parse_peer_commit(data, allowed_groups, None)?;
        let token_present = peer.token.is_some();
        self.peer_token = peer.token.map(<[u8]>::to_vec);
        self.peer_password_identifier = peer.password_identifier.map(<[u8]>::to_vec);
        self.peer = Some(peer.material);
        debug!(token_present, "SAE: peer commit accepted");
        Ok(token_present)
    }

    /// Commit arriving after the keys were derived. Never accepted.
    fn check_late_commit(
        &self,
        data: &[u8],
        allowed_groups: Option<&[u16]>,
    ) -> Result<bool, Error> {
        let replayed = match self.state {
            ProtocolState::Accepted => self.peer.as_ref().map(|peer| &peer.scalar),
            _ => None,
        };
        self.parse_peer_commit(data, allowed_groups, replayed)?;
        debug!(state = %self.state, "SAE: new commit for a negotiation past commit");
        Err(Error::InvalidState(self.state))
    }

    /// Computes the shared secret and derives KCK, PMK and PMKID.
    ///
    /// Requires a peer commit accepted by [`Sae::process_commit`]. Moves to `Confirmed`.
    pub fn derive_keys(&mut self) -> Result<(), Error> {
        self.check_state(&[ProtocolState::Committed])?;
        let (pwe, rand, own, peer) = match (&self.pwe, &self.rand, &self.own, &self.peer) {
            (Some(pwe), Some(rand), Some(own), Some(peer)) => (pwe, rand, own, peer),
            _ => return Err(Error::InvalidState(self.state)),
        };
        let res = keys::derive(&self.group, pwe, rand, own, peer);
        let keys = self.abort_on_error(res)?;
        self.keys = Some(keys);
        self.rand = None;
        self.state = ProtocolState::Confirmed;
        debug!("SAE: keys derived");
        Ok(())
    }

    /// Builds the own confirm message.
    ///
    /// Every call uses the current send-confirm counter and then increments it, saturating at
    /// `0xffff`.
    pub fn build_confirm(&mut self) -> Result<Vec<u8>, Error> {
        self.check_state(&[ProtocolState::Confirmed, ProtocolState::Accepted])?;
        let (keys, own, peer) = match (&self.keys, &self.own, &self.peer) {
            (Some(keys), Some(own), Some(peer)) => (keys, own, peer),
            _ => return Err(Error::InvalidState(self.state)),
        };
        let msg = confirm::write(&keys.kck, self.send_confirm, own, peer, self.group.prime_len());
        self.send_confirm = self.send_confirm.saturating_add(1);
        self.confirm_sent = true;
        self.try_accept();
        Ok(msg)
    }

    /// Verifies the peer confirm message.
    pub fn verify_confirm(&mut self, peer_confirm: &[u8]) -> Result<(), Error> {
        self.check_state(&[ProtocolState::Confirmed])?;
        let (keys, own, peer) = match (&self.keys, &self.own, &self.peer) {
            (Some(keys), Some(own), Some(peer)) => (keys, own, peer),
            _ => return Err(Error::InvalidState(self.state)),
        };
        let res = confirm::verify(&keys.kck, peer_confirm, own, peer, self.group.prime_len());
        let peer_send_confirm = self.abort_on_error(res)?;
        debug!(peer_send_confirm, "SAE: peer confirm verified");
        self.confirm_verified = true;
        self.try_accept();
        Ok(())
    }

    fn try_accept(&mut self) {
        if self.state == ProtocolState::Confirmed && self.confirm_sent && self.confirm_verified {
            self.state = ProtocolState::Accepted;
            debug!(group = self.group.id(), "SAE: negotiation accepted");
        }
    }

    fn check_state(&self, allowed: &[ProtocolState]) -> Result<(), Error> {
        if self.aborted {
            return Err(Error::Aborted);
        }
        if !allowed.contains(&self.state) {
            debug!(state = %self.state, "SAE: operation not allowed in this state");
            return Err(Error::InvalidState(self.state));
        }
        Ok(())
    }

    fn abort_on_error<T>(&mut self, res: Result<T, Error>) -> Result<T, Error> {
        if let Err(e) = &res {
            debug!(error = %e, state = %self.state, "SAE: aborting negotiation");
            self.aborted = true;
        }
        res
    }

    /// Pairwise master key, once the negotiation is accepted.
    pub fn pmk(&self) -> Option<&[u8; PMK_LEN]> {
        self.accepted_keys().map(|keys| &keys.pmk)
    }

    /// PMK identifier, once the negotiation is accepted.
    pub fn pmkid(&self) -> Option<&[u8; PMKID_LEN]> {
        self.accepted_keys().map(|keys| &keys.pmkid)
    }

    fn accepted_keys(&self) -> Option<&DerivedKeys> {
        if self.aborted || self.state != ProtocolState::Accepted {
            return None;
        }
        self.keys.as_ref()
    }

    /// Current protocol state.
    pub fn state(&self) -> ProtocolState {
        self.state
    }

    /// Whether a failure aborted this negotiation.
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Id of the selected group.
    pub fn group(&self) -> u16 {
        self.group.id()
    }

    /// Anti-clogging token found in the last accepted peer commit.
    pub fn peer_anti_clogging_token(&self) -> Option<&[u8]> {
        self.peer_token.as_deref()
    }

    /// Password identifier carried by the last accepted peer commit.
    pub fn peer_password_identifier(&self) -> Option<&[u8]> {
        self.peer_password_identifier.as_deref()
    }

    /// Counter the next confirm message will carry.
    pub fn send_confirm(&self) -> u16 {
        self.send_confirm
    }
}

#[cfg(test)]
impl Sae {
    /// Commit for fixed `rand` and `mask`.
    fn commit_with_secrets(
        &mut self,
        rand: &BigUint,
        mask: &BigUint,
    ) -> Result<Vec<u8>, Error> {
        self.check_state(&[ProtocolState::Nothing])?;
        let seed = PasswordSeed::new(
            &self.local_addr,
            &self.peer_addr,
            &self.password,
            self.password_identifier.as_deref(),
        );
        let pwe = self
            .group
            .ops()
            .derive_pwe(&seed, &mut rand::rngs::OsRng)?
            .element;
        let (own, rand) = commit::from_secrets(&self.group, &pwe, rand, mask)?;
        self.pwe = Some(pwe);
        self.install_commit(own, rand)
    }
}
