//! Cluster Coordinator — lifecycle management for co-resident Raft groups
//! sharing one transport, membership propagation, and topic-routed Raft
//! protocol traffic (spec §1).
//!
//! The Raft algorithm, durable log storage, wire transport internals, and
//! concrete resource state machines are external collaborators, consumed
//! only through the contracts in [`router::RaftProtocol`] and
//! [`member::Transport`].

pub mod cluster;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod member;
pub mod raft;
pub mod registry;
pub mod resource;
pub mod router;
pub mod transport;

pub use config::CoordinatorConfig;
pub use coordinator::{Coordinator, ProtocolFactory};
pub use error::{CoordinatorError, Result, TransportError};
pub use resource::{ResourceConfig, ResourceHolder, ResourceKind};
