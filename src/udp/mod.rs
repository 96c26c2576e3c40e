//! UDP sockets for the three roles.
//!
//! use `Client` as responder (`listen`) or initiator (`connect`).
//!
//! use `Server` to create a rendezvous server.

#[cfg(feature = "client")]
mod client;
#[cfg(feature = "client")]
pub use client::{Client, ClientConfig};

#[cfg(feature = "server")]
mod server;
#[cfg(feature = "server")]
pub use server::{Server, ServerConfig};
