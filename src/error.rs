use thiserror::Error;

use crate::ProtocolState;

/// IEEE 802.11 status codes an SAE commit can be rejected with.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u16)]
pub enum StatusCode {
    /// Generic failure, used for every validation error without a dedicated code.
    UnspecifiedFailure = 1,
    /// The responder requires the commit to carry an anti-clogging token.
    ///
    /// Never produced by [`Sae::process_commit`](crate::Sae::process_commit): the caller decides
    /// when to ask for a token, and the initiator answers with
    /// [`Sae::set_anti_clogging_token`](crate::Sae::set_anti_clogging_token).
    AntiCloggingTokenRequired = 76,
    /// The finite cyclic group is unknown or not enabled.
    FiniteCyclicGroupNotSupported = 77,
    /// The password identifier does not match the one bound to the password.
    UnknownPasswordIdentifier = 123,
}

impl StatusCode {
    /// Numeric value as carried in the authentication frame.
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

/// Errors that may occur during an SAE negotiation.
#[derive(Error, Debug)]
pub enum Error {
    /// The group is not supported by this crate or not enabled by the caller.
    #[error("unsupported finite cyclic group {0}")]
    UnsupportedGroup(u16),
    /// The peer proposed a different group after the local commit was sent.
    #[error("group change from {current} to {requested} is not allowed after commit")]
    GroupChangeNotAllowed {
        /// Group the instance committed to.
        current: u16,
        /// Group requested by the peer.
        requested: u16,
    },
    /// A field is truncated or oversized.
    #[error("malformed message: {0}")]
    MalformedMessage(&'static str),
    /// The commit scalar is out of range or replays an accepted scalar.
    #[error("invalid commit scalar")]
    InvalidScalar,
    /// The commit element is not a valid group member.
    #[error("invalid commit element")]
    InvalidElement,
    /// The password identifier is missing or does not match.
    #[error("unknown password identifier")]
    UnknownPasswordIdentifier,
    /// The peer commit echoes the local commit.
    #[error("reflected commit")]
    ReflectionDetected,
    /// The password element loop hit its iteration cap.
    #[error("password element derivation exhausted")]
    DerivationExhausted,
    /// The shared secret is the identity element.
    #[error("shared secret is the identity element")]
    KeyDerivationFailure,
    /// The peer confirm does not authenticate the exchange.
    #[error("confirm mismatch")]
    ConfirmMismatch,
    /// Overflow in input lengths.
    #[error("overflow: {0}")]
    Overflow(&'static str),
    /// Random number generator failure.
    #[error("random number generator failure")]
    Random(rand_core::Error),
    /// The random source kept returning out-of-range values.
    #[error("random number generator produced no usable value")]
    InsufficientRandomness,
    /// The operation is not valid in the current protocol state.
    #[error("operation not allowed in state {0}")]
    InvalidState(ProtocolState),
    /// A previous failure aborted this negotiation.
    #[error("negotiation aborted")]
    Aborted,
}

impl From<rand_core::Error> for Error {
    fn from(e: rand_core::Error) -> Self {
        Error::Random(e)
    }
}

impl Error {
    /// Status code to answer a rejected commit with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::UnsupportedGroup(_) | Error::GroupChangeNotAllowed { .. } => {
                StatusCode::FiniteCyclicGroupNotSupported
            }
            Error::UnknownPasswordIdentifier => StatusCode::UnknownPasswordIdentifier,
            _ => StatusCode::UnspecifiedFailure,
        }
    }
}
