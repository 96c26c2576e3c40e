use socket2::{Domain, Protocol, Socket, Type};
use std::collections::VecDeque;
use std::io::{self, ErrorKind};
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering::Relaxed};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::rendezvous::{Command, RejectReason};
use crate::stun::{code, method, Message};
use crate::transport::Transport;

/// Peer datagrams kept while waiting on the rendezvous server.
const MAX_STASHED: usize = 32;

/// Timeouts and retry policy of a [`Client`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Wait for each answer from the rendezvous server.
    pub timeout: Duration,
    /// Attempts of a request/response exchange before giving up.
    pub retries: usize,
    /// Re-register interval while listening.
    pub keepalive: Duration,
    /// Shared secret for signing binding requests.
    pub secret: Option<Vec<u8>>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3),
            retries: 3,
            keepalive: Duration::from_secs(10),
            secret: None,
        }
    }
}

/// Peer side of the rendezvous protocol.
///
/// The same socket talks to the rendezvous server and to the remote peer, so
/// the mapping the server observed is the one the peer gets punched to.
///
/// # example
/// ```no_run
/// use holepunch::udp::{Client, ClientConfig};
/// use std::sync::atomic::AtomicBool;
///
/// let responder = Client::new("rendezvous.example:8888", None, ClientConfig::default()).unwrap();
/// let me = responder.mapped_address().unwrap();
/// let initiator = responder.listen(me, &AtomicBool::new(false)).unwrap();
/// ```
///
/// ```no_run
/// use holepunch::udp::{Client, ClientConfig};
///
/// let initiator = Client::new("rendezvous.example:8888", None, ClientConfig::default()).unwrap();
/// let me = initiator.mapped_address().unwrap();
/// let target = initiator.server_list().unwrap()[0];
/// let peer = initiator.connect(me, target).unwrap();
/// initiator.transport().send_to(b"hello", peer).unwrap();
/// ```
pub struct Client<T = UdpSocket> {
    transport: T,
    server_addr: SocketAddr,
    config: ClientConfig,
    stash: Mutex<VecDeque<(Vec<u8>, SocketAddr)>>,
}

impl Client<UdpSocket> {
    /// Resolve the rendezvous server and bind a socket.
    /// Without a local address, bind the wildcard of the server's address family.
    pub fn new(server_addr: &str, local_addr: Option<SocketAddr>, config: ClientConfig) -> Result<Self> {
        let server_addr = server_addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(ErrorKind::Other, "no addr"))?;

        let local_addr = match local_addr {
            Some(addr) => addr,
            None => match server_addr {
                SocketAddr::V4(_) => ([0, 0, 0, 0], 0).into(),
                SocketAddr::V6(_) => ([0u16; 8], 0).into(),
            },
        };

        let socket = Socket::new(Domain::for_address(local_addr), Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&local_addr.into())?;

        Ok(Self::with_transport(socket.into(), server_addr, config))
    }
}

impl<T: Transport> Client<T> {
    pub fn with_transport(transport: T, server_addr: SocketAddr, config: ClientConfig) -> Self {
        Self {
            transport,
            server_addr,
            config,
            stash: Mutex::new(VecDeque::new()),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Ask the rendezvous server which endpoint our datagrams come from.
    pub fn mapped_address(&self) -> Result<SocketAddr> {
        let mut request = Message::request(method::BINDING_REQUEST);
        if let Some(secret) = &self.config.secret {
            request.sign(secret)?;
        }
        let payload = request.encode()?;

        let response = self.exchange(&payload, |datagram| {
            Message::decode(datagram)
                .ok()
                .filter(|m| m.transaction_id == request.transaction_id)
        })?;

        if let Some(secret) = &self.config.secret {
            if !response.verify_integrity(secret) {
                return Err(Error::violation("binding response failed integrity check"));
            }
        }

        match response.msg_type {
            method::BINDING_RESPONSE => response
                .mapped_address()
                .ok_or_else(|| Error::violation("binding response without address")),
            _ => {
                let reason = response
                    .error_code()
                    .map(|e| format!("{} {}", e.code, e.reason))
                    .unwrap_or_else(|| code::SERVER_ERROR.to_string());
                Err(Error::violation(format!("binding failed: {}", reason)))
            }
        }
    }

    /// Register `endpoint`, no answer is expected.
    pub fn register(&self, endpoint: SocketAddr) -> Result<()> {
        log::trace!("register {}", endpoint);
        self.send_server(&Command::Register(endpoint))
    }

    pub fn server_list(&self) -> Result<Vec<SocketAddr>> {
        let request = Command::ListRequest.to_bytes();
        self.exchange(&request, |datagram| match Command::parse(datagram) {
            Ok(Command::List(peers)) => Some(peers),
            _ => None,
        })
    }

    /// Ask to be connected to `target`, then punch it.
    ///
    /// `me` is the endpoint the target should punch back to, usually
    /// [`mapped_address`](Self::mapped_address). Returns the endpoint named by the
    /// server's directive. Inbound traffic from it is the only sign of success,
    /// see [`await_peer`](Self::await_peer).
    pub fn connect(&self, me: SocketAddr, target: SocketAddr) -> Result<SocketAddr> {
        let request = Command::ConnectRequest {
            initiator: me,
            target,
        }
        .to_bytes();

        let mut directive = None;
        let accepted = self.exchange(&request, |datagram| match Command::parse(datagram) {
            Ok(Command::Accepted) => Some(true),
            Ok(Command::Rejected(RejectReason::TargetUnknown)) => Some(false),
            Ok(Command::HolePunch(peer)) => {
                directive = Some(peer);
                None
            }
            _ => None,
        })?;

        if !accepted {
            return Err(Error::TargetNotRegistered(target));
        }

        let peer = match directive {
            Some(peer) => peer,
            None => {
                let wait = self.config.timeout * self.config.retries.max(1) as u32;
                self.wait_directive(wait, None)?
                    .ok_or_else(|| io::Error::new(ErrorKind::TimedOut, "no punch directive"))?
            }
        };

        self.punch(me, peer)?;
        Ok(peer)
    }

    /// Register `me` and wait for a connection request.
    ///
    /// Registration is repeated every keepalive interval. When the server's
    /// directive arrives the named endpoint is punched and returned. Returns
    /// `None` once `stop` is set.
    pub fn listen(&self, me: SocketAddr, stop: &AtomicBool) -> Result<Option<SocketAddr>> {
        let mut last_register: Option<Instant> = None;

        loop {
            if stop.load(Relaxed) {
                return Ok(None);
            }

            if last_register.map_or(true, |t| t.elapsed() >= self.config.keepalive) {
                self.register(me)?;
                last_register = Some(Instant::now());
            }

            let wait = self.config.timeout.min(self.config.keepalive);
            if let Some(peer) = self.wait_directive(wait, Some(stop))? {
                log::debug!("punch {} from {}", peer, me);
                self.punch(me, peer)?;
                return Ok(Some(peer));
            }
        }
    }

    /// Wait for any datagram from `peer`.
    ///
    /// Datagrams the peer sent while we were still talking to the server count too.
    pub fn await_peer(&self, peer: SocketAddr, wait: Duration) -> Result<Option<Vec<u8>>> {
        {
            let mut stash = self.stash();
            if let Some(i) = stash.iter().position(|(_, from)| *from == peer) {
                return Ok(stash.remove(i).map(|(data, _)| data));
            }
        }

        let deadline = Instant::now() + wait;
        while let Some(left) = deadline.checked_duration_since(Instant::now()) {
            match self.transport.recv_from(left)? {
                Some((data, from)) if from == peer => return Ok(Some(data)),
                Some((_, from)) => log::trace!("ignore datagram from {}", from),
                None => break,
            }
        }
        Ok(None)
    }

    fn punch(&self, me: SocketAddr, peer: SocketAddr) -> Result<()> {
        self.transport.send_to(&Command::Punch(me).to_bytes(), peer)
    }

    fn send_server(&self, cmd: &Command) -> Result<()> {
        self.transport.send_to(&cmd.to_bytes(), self.server_addr)
    }

    fn wait_directive(&self, wait: Duration, stop: Option<&AtomicBool>) -> Result<Option<SocketAddr>> {
        self.recv_server(wait, stop, |datagram| match Command::parse(datagram) {
            Ok(Command::HolePunch(peer)) => Some(peer),
            Ok(cmd) => {
                log::trace!("ignore {}", cmd);
                None
            }
            Err(e) => {
                log::debug!("{}", e);
                None
            }
        })
    }

    /// Send `request` and wait for an answer `accept` maps to a value, resending
    /// up to the configured number of attempts.
    fn exchange<R>(&self, request: &[u8], mut accept: impl FnMut(&[u8]) -> Option<R>) -> Result<R> {
        for attempt in 0..self.config.retries.max(1) {
            if attempt > 0 {
                log::debug!("retry {} to {}", attempt, self.server_addr);
            }
            self.transport.send_to(request, self.server_addr)?;

            if let Some(r) = self.recv_server(self.config.timeout, None, &mut accept)? {
                return Ok(r);
            }
        }

        Err(io::Error::new(ErrorKind::TimedOut, "no response from rendezvous server").into())
    }

    /// Receive from the rendezvous server until `accept` maps a datagram, the
    /// wait runs out or `stop` is set.
    fn recv_server<R>(
        &self,
        wait: Duration,
        stop: Option<&AtomicBool>,
        mut accept: impl FnMut(&[u8]) -> Option<R>,
    ) -> Result<Option<R>> {
        let deadline = Instant::now() + wait;
        while let Some(left) = deadline.checked_duration_since(Instant::now()) {
            if stop.map_or(false, |s| s.load(Relaxed)) {
                break;
            }

            let (datagram, from) = match self.transport.recv_from(left)? {
                Some(d) => d,
                None => break,
            };
            if from != self.server_addr {
                log::trace!("stash datagram from {}", from);
                let mut stash = self.stash();
                if stash.len() == MAX_STASHED {
                    stash.pop_front();
                }
                stash.push_back((datagram, from));
                continue;
            }
            if let Some(r) = accept(&datagram) {
                return Ok(Some(r));
            }
        }
        Ok(None)
    }

    fn stash(&self) -> MutexGuard<'_, VecDeque<(Vec<u8>, SocketAddr)>> {
        self.stash.lock().unwrap_or_else(|e| e.into_inner())
    }
}
