use std::future::Future;
use std::io::Result;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{ToSocketAddrs, UdpSocket};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout};
use tokio::{select, task};

use crate::rendezvous::{Coordinator, PeerRegistry, RegistryHandle};
use crate::transport::MAX_DATAGRAM;

/// Rendezvous server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Upper bound of one receive wait.
    pub recv_timeout: Duration,
    /// Forget peers that did not register again within this window. Never by default.
    pub expire_after: Option<Duration>,
    /// How often expired peers are swept.
    pub gc_interval: Duration,
    /// Shared secret for binding requests.
    pub secret: Option<Vec<u8>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            recv_timeout: Duration::from_secs(30),
            expire_after: None,
            gc_interval: Duration::from_secs(60),
            secret: None,
        }
    }
}

/// Udp rendezvous server
///
/// keep traces of registered peers, answer binding requests and forward connection requests.
/// Every listen socket runs its own receive loop; all of them share one registry.
pub struct Server {
    sockets: Vec<UdpSocket>,
    config: ServerConfig,
}

impl Server {
    pub async fn new<A: ToSocketAddrs>(listen_addr: A, config: ServerConfig) -> Result<Self> {
        let socket = UdpSocket::bind(listen_addr).await?;

        Ok(Self {
            sockets: vec![socket],
            config,
        })
    }

    /// Listen on one more address.
    pub async fn add_listener<A: ToSocketAddrs>(&mut self, listen_addr: A) -> Result<SocketAddr> {
        let socket = UdpSocket::bind(listen_addr).await?;
        let addr = socket.local_addr()?;
        self.sockets.push(socket);
        Ok(addr)
    }

    pub fn local_addrs(&self) -> Result<Vec<SocketAddr>> {
        self.sockets.iter().map(|s| s.local_addr()).collect()
    }

    /// Serve until `shutdown` completes.
    pub async fn run<F: Future<Output = ()>>(self, shutdown: F) -> Result<()> {
        let (registry, registry_task) = RegistryHandle::spawn(PeerRegistry::new());
        let coordinator = Coordinator::new(registry.clone(), self.config.secret.clone());
        let (stop_tx, stop_rx) = watch::channel(false);

        let mut tasks: Vec<JoinHandle<()>> = self
            .sockets
            .into_iter()
            .map(|socket| {
                task::spawn(Self::serve(
                    socket,
                    coordinator.clone(),
                    self.config.recv_timeout,
                    stop_rx.clone(),
                ))
            })
            .collect();

        if let Some(ttl) = self.config.expire_after {
            tasks.push(task::spawn(Self::gc(
                registry,
                ttl,
                self.config.gc_interval,
                stop_rx,
            )));
        } else {
            drop(registry);
            drop(stop_rx);
        }
        drop(coordinator);

        shutdown.await;
        log::info!("shutting down");
        let _ = stop_tx.send(true);

        for t in tasks {
            let _ = t.await;
        }
        let _ = registry_task.await;

        Ok(())
    }

    async fn serve(
        socket: UdpSocket,
        coordinator: Coordinator,
        recv_timeout: Duration,
        mut stop: watch::Receiver<bool>,
    ) {
        if let Ok(addr) = socket.local_addr() {
            log::info!("listening on {}", addr);
        }

        let mut buf = vec![0; MAX_DATAGRAM];
        loop {
            let (size, from) = select! {
                _ = stop.changed() => break,
                r = timeout(recv_timeout, socket.recv_from(&mut buf)) => match r {
                    Ok(Ok(r)) => r,
                    Ok(Err(e)) => {
                        log::debug!("recv: {}", e);
                        continue;
                    }
                    Err(_) => continue,
                },
            };

            let datagrams = match coordinator.handle(&buf[..size], from).await {
                Ok(d) => d,
                Err(e) => {
                    log::debug!("drop datagram from {}: {}", from, e);
                    continue;
                }
            };

            for d in datagrams {
                if let Err(e) = socket.send_to(&d.payload, d.dest).await {
                    log::debug!("send to {}: {}", d.dest, e);
                }
            }
        }
    }

    async fn gc(
        registry: RegistryHandle,
        ttl: Duration,
        every: Duration,
        mut stop: watch::Receiver<bool>,
    ) {
        let mut tick = interval(every);
        loop {
            select! {
                _ = stop.changed() => break,
                _ = tick.tick() => match registry.expire(ttl).await {
                    Ok(0) => {}
                    Ok(n) => log::debug!("expired {} peers", n),
                    Err(_) => break,
                },
            }
        }
    }
}
