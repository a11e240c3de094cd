//! Error taxonomy for the coordinator core.
//!
//! Two layers: [`TransportError`] originates in the member/transport layer
//! and is non-fatal to the coordinator (the Raft layer retries per its own
//! policy); [`CoordinatorError`] is the surface every public coordinator
//! operation returns, wrapping transport errors via `#[from]`.

use thiserror::Error;

/// Errors surfaced by a [`crate::member::Transport`] implementation or by a
/// [`crate::member::MemberEndpoint`] built on top of one.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no route to peer '{0}'")]
    NoPeer(String),

    #[error("transport i/o error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Errors surfaced by [`crate::coordinator::Coordinator`] and its
/// sub-components.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("coordinator is not open")]
    NotOpen,

    #[error("unknown resource: {0}")]
    UnknownResource(String),

    #[error("invalid member: {0}")]
    InvalidMember(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub type Result<T> = std::result::Result<T, CoordinatorError>;
