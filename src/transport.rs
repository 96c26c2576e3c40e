//! Datagram transport used by the peer roles.

use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use crate::error::Result;

/// Largest datagram read by a receive call, the whole UDP payload range.
pub const MAX_DATAGRAM: usize = 65535;

pub trait Transport {
    /// Best effort, a successful return says nothing about delivery.
    fn send_to(&self, payload: &[u8], dest: SocketAddr) -> Result<()>;

    /// Wait at most `wait` for the next datagram, `None` when nothing arrived.
    fn recv_from(&self, wait: Duration) -> Result<Option<(Vec<u8>, SocketAddr)>>;

    fn local_addr(&self) -> Result<SocketAddr>;
}

impl Transport for UdpSocket {
    fn send_to(&self, payload: &[u8], dest: SocketAddr) -> Result<()> {
        UdpSocket::send_to(self, payload, dest)?;
        Ok(())
    }

    fn recv_from(&self, wait: Duration) -> Result<Option<(Vec<u8>, SocketAddr)>> {
        // zero would mean blocking forever
        self.set_read_timeout(Some(wait.max(Duration::from_millis(1))))?;

        let mut buf = vec![0; MAX_DATAGRAM];
        match UdpSocket::recv_from(self, &mut buf) {
            Ok((n, addr)) => {
                buf.truncate(n);
                Ok(Some((buf, addr)))
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(UdpSocket::local_addr(self)?)
    }
}
