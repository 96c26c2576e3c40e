use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

#[cfg(feature = "server")]
use crate::error::{Error, Result};
#[cfg(feature = "server")]
use tokio::sync::{mpsc, oneshot};

/// A registered endpoint.
#[derive(Debug, Clone, Copy)]
pub struct Peer {
    pub addr: SocketAddr,
    last_seen: Instant,
}

/// Registered endpoints, keyed by address and port.
#[derive(Default)]
pub struct PeerRegistry {
    peers: HashMap<SocketAddr, Peer>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    /// Insert `addr`, returns false if it was already present.
    ///
    /// Registering again only refreshes the entry.
    pub fn register(&mut self, addr: SocketAddr) -> bool {
        let now = Instant::now();
        match self.peers.get_mut(&addr) {
            Some(p) => {
                p.last_seen = now;
                false
            }
            None => {
                self.peers.insert(
                    addr,
                    Peer {
                        addr,
                        last_seen: now,
                    },
                );
                true
            }
        }
    }

    pub fn contains(&self, addr: &SocketAddr) -> bool {
        self.peers.contains_key(addr)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// All registered endpoints in ascending order.
    pub fn snapshot(&self) -> Vec<SocketAddr> {
        let mut addrs: Vec<SocketAddr> = self.peers.keys().copied().collect();
        addrs.sort();
        addrs
    }

    /// Drop peers not seen within `ttl`, returns how many were removed.
    pub fn expire(&mut self, ttl: Duration) -> usize {
        let before = self.peers.len();
        let now = Instant::now();
        self.peers.retain(|addr, p| {
            let alive = now.duration_since(p.last_seen) < ttl;
            if !alive {
                log::debug!("expired {}", addr);
            }
            alive
        });
        before - self.peers.len()
    }
}

#[cfg(feature = "server")]
enum RegistryCmd {
    Register(SocketAddr, oneshot::Sender<bool>),
    Contains(SocketAddr, oneshot::Sender<bool>),
    Snapshot(oneshot::Sender<Vec<SocketAddr>>),
    Expire(Duration, oneshot::Sender<usize>),
}

/// Cloneable access to a [`PeerRegistry`] owned by a single task.
///
/// Commands are applied one at a time in arrival order, so a snapshot never
/// observes a half applied registration.
#[cfg(feature = "server")]
#[derive(Clone)]
pub struct RegistryHandle {
    tx: mpsc::Sender<RegistryCmd>,
}

#[cfg(feature = "server")]
impl RegistryHandle {
    /// Move `registry` into a new task. The task ends when every handle is dropped.
    pub fn spawn(registry: PeerRegistry) -> (Self, tokio::task::JoinHandle<PeerRegistry>) {
        let (tx, rx) = mpsc::channel(64);
        let task = tokio::spawn(Self::serve(registry, rx));
        (Self { tx }, task)
    }

    async fn serve(
        mut registry: PeerRegistry,
        mut rx: mpsc::Receiver<RegistryCmd>,
    ) -> PeerRegistry {
        while let Some(cmd) = rx.recv().await {
            match cmd {
                RegistryCmd::Register(addr, reply) => {
                    let new = registry.register(addr);
                    if new {
                        log::info!("registered {}", addr);
                    } else {
                        log::trace!("refreshed {}", addr);
                    }
                    let _ = reply.send(new);
                }
                RegistryCmd::Contains(addr, reply) => {
                    let _ = reply.send(registry.contains(&addr));
                }
                RegistryCmd::Snapshot(reply) => {
                    let _ = reply.send(registry.snapshot());
                }
                RegistryCmd::Expire(ttl, reply) => {
                    let _ = reply.send(registry.expire(ttl));
                }
            }
        }
        registry
    }

    async fn call<T>(
        &self,
        cmd: impl FnOnce(oneshot::Sender<T>) -> RegistryCmd,
    ) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(cmd(reply))
            .await
            .map_err(|_| Error::RegistryClosed)?;
        rx.await.map_err(|_| Error::RegistryClosed)
    }

    /// True if `addr` was not registered before.
    pub async fn register(&self, addr: SocketAddr) -> Result<bool> {
        self.call(|r| RegistryCmd::Register(addr, r)).await
    }

    pub async fn contains(&self, addr: SocketAddr) -> Result<bool> {
        self.call(|r| RegistryCmd::Contains(addr, r)).await
    }

    pub async fn snapshot(&self) -> Result<Vec<SocketAddr>> {
        self.call(RegistryCmd::Snapshot).await
    }

    pub async fn expire(&self, ttl: Duration) -> Result<usize> {
        self.call(|r| RegistryCmd::Expire(ttl, r)).await
    }
}
