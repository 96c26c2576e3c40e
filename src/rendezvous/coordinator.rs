use std::net::SocketAddr;

use super::binding;
use super::command::{Command, RejectReason};
use super::registry::RegistryHandle;
use crate::error::{Error, Result};
use crate::stun::{self, Message};

/// Payload and destination of one outgoing datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub payload: Vec<u8>,
    pub dest: SocketAddr,
}

impl Datagram {
    fn command(cmd: Command, dest: SocketAddr) -> Self {
        Self {
            payload: cmd.to_bytes(),
            dest,
        }
    }
}

enum Outcome {
    Accept,
    Reject(RejectReason),
}

/// One connect request, dropped once its datagrams are built.
struct PendingConnect {
    initiator: SocketAddr,
    target: SocketAddr,
    outcome: Outcome,
}

impl PendingConnect {
    /// The reply to the requester first, then on acceptance a punch directive to
    /// each side naming the other.
    fn into_datagrams(self, requester: SocketAddr) -> Vec<Datagram> {
        match self.outcome {
            Outcome::Reject(reason) => vec![Datagram::command(Command::Rejected(reason), requester)],
            Outcome::Accept => vec![
                Datagram::command(Command::Accepted, requester),
                Datagram::command(Command::HolePunch(self.target), self.initiator),
                Datagram::command(Command::HolePunch(self.initiator), self.target),
            ],
        }
    }
}

/// Rendezvous logic, independent of any socket.
///
/// Every received datagram maps to zero or more datagrams to send. Nothing is
/// acknowledged or retried here.
#[derive(Clone)]
pub struct Coordinator {
    registry: RegistryHandle,
    secret: Option<Vec<u8>>,
}

impl Coordinator {
    pub fn new(registry: RegistryHandle, secret: Option<Vec<u8>>) -> Self {
        Self { registry, secret }
    }

    pub fn registry(&self) -> &RegistryHandle {
        &self.registry
    }

    /// Handle one datagram received from `from`.
    ///
    /// Errors mean the datagram is dropped without reply.
    pub async fn handle(&self, datagram: &[u8], from: SocketAddr) -> Result<Vec<Datagram>> {
        if stun::is_message(datagram) {
            let request = Message::decode(datagram)?;
            return match binding::respond(&request, from, self.secret.as_deref())? {
                Some(response) => Ok(vec![Datagram {
                    payload: response.encode()?,
                    dest: from,
                }]),
                None => Ok(vec![]),
            };
        }

        let cmd = Command::parse(datagram)?;
        self.handle_command(cmd, from).await
    }

    pub async fn handle_command(&self, cmd: Command, from: SocketAddr) -> Result<Vec<Datagram>> {
        match cmd {
            Command::Register(ep) => {
                self.registry.register(observed(ep, from)).await?;
                Ok(vec![])
            }
            Command::ListRequest => {
                let peers = self.registry.snapshot().await?;
                log::debug!("list for {}: {} peers", from, peers.len());
                Ok(vec![Datagram::command(Command::List(peers), from)])
            }
            Command::ConnectRequest { initiator, target } => {
                let pending = self.resolve(observed(initiator, from), target).await?;
                Ok(pending.into_datagrams(from))
            }
            cmd => Err(Error::violation(format!("{} is not a server command", cmd))),
        }
    }

    async fn resolve(&self, initiator: SocketAddr, target: SocketAddr) -> Result<PendingConnect> {
        let outcome = if self.registry.contains(target).await? {
            log::debug!("connect {} -> {}", initiator, target);
            Outcome::Accept
        } else {
            log::debug!("{}", Error::TargetNotRegistered(target));
            Outcome::Reject(RejectReason::TargetUnknown)
        };

        Ok(PendingConnect {
            initiator,
            target,
            outcome,
        })
    }
}

/// Fill an unspecified ip or zero port with what the datagram was observed from.
fn observed(ep: SocketAddr, from: SocketAddr) -> SocketAddr {
    let ip = if ep.ip().is_unspecified() {
        from.ip()
    } else {
        ep.ip()
    };
    let port = if ep.port() == 0 { from.port() } else { ep.port() };
    SocketAddr::new(ip, port)
}
