use std::time::Duration;

use thiserror::Error;

/// Rejection of a peer address by the URL policy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Invalid peer address: {0}")]
    InvalidAddress(String),

    #[error("HTTPS required by configuration")]
    HttpsRequired,
}

/// Failure talking to a single peer. Always absorbed by the merge pass.
#[derive(Error, Debug)]
pub enum PeerError {
    #[error(transparent)]
    Address(#[from] AddressError),

    #[error("Peer unreachable: {0}")]
    Unreachable(#[source] reqwest::Error),

    #[error("HTTP {code} {reason}")]
    Status { code: u16, reason: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Credential contains characters that cannot be sent in a header")]
    InvalidCredential,

    #[error("HTTP client setup failed: {0}")]
    Client(#[source] reqwest::Error),
}

impl PeerError {
    pub fn status(status: reqwest::StatusCode) -> Self {
        PeerError::Status {
            code: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("").to_string(),
        }
    }
}

/// Merge failures that are not attributable to a single peer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    #[error("Merge cancelled before it could start")]
    Cancelled,

    #[error("Timed out after {waited:?} waiting for the running merge pass")]
    GateTimeout { waited: Duration },

    #[error("Merge task failed: {0}")]
    TaskFailed(String),
}

pub type Result<T> = std::result::Result<T, PeerError>;
