//!UDP hole punching through a rendezvous server, with a STUN-style message codec.
//!
//!Two nodes behind NAT (such as home gateways) only allow outbound traffic. To reach each other,
//!both need to know the other's public endpoint and both need to send the other traffic first.
//!
//!## How it works
//!Setup a publicly reachable server as rendezvous point, it observes peers endpoints and forwards connection requests.
//!
//!- A responder asks the server for its public endpoint with a binding request (see [`stun`]),
//!  then registers it with `REGISTER_SERVER` and keeps registering as keepalive.
//!- An initiator lists the registered endpoints with `REQUEST_SERVER_LIST` and asks for one of them
//!  with `REQUEST_CONNECTION`. An unknown target is rejected.
//!- On acceptance the server sends `HOLE_PUNCH` to both sides, each naming the other.
//!  Both then send a datagram to the named endpoint, which opens the NAT mapping on each side.
//!
//!Nothing is acknowledged. Traffic received from the other peer is the only confirmation.
//!
//!The essential is, the same socket must be used to talk to the rendezvous server and to the peer.
//!
//!## Feature flags
//!For convenient, the crate include both client and server code by default.
//!Mostly you only use client or server code, set features to `client` or `server` instead.
//!
//!```toml
//!holepunch = { version = "0.1", default-features=false, features=["client"]}
//!```
//!
//!- `client`: blocking udp client for responder and initiator
//!- `server`: rendezvous server on tokio

pub mod error;
pub mod rendezvous;
pub mod stun;
pub mod transport;
pub mod udp;

pub use error::{Error, Result};
