//! Rendezvous protocol: text commands, the peer registry and the coordinator
//! turning received datagrams into replies and punch directives.
//!
//! A responder registers its endpoint, an initiator lists registered endpoints
//! and asks to be connected to one of them. On acceptance both sides receive a
//! `HOLE_PUNCH` naming the other and send it a datagram, which opens the NAT
//! mapping on each side.

mod binding;
mod command;
#[cfg(feature = "server")]
mod coordinator;
mod registry;

pub use binding::respond as respond_binding;
pub use command::{Command, RejectReason};
#[cfg(feature = "server")]
pub use coordinator::{Coordinator, Datagram};
pub use registry::{Peer, PeerRegistry};
#[cfg(feature = "server")]
pub use registry::RegistryHandle;
