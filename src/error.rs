//! Error types shared by the codec, the coordinator and the clients.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Header too short, length mismatch, truncated attribute or bad value layout.
    #[error("malformed message: {0}")]
    MalformedMessage(&'static str),

    #[error("invalid address family {0:#04x}")]
    InvalidFamily(u8),

    /// Comprehension-required attributes the codec only carries opaquely.
    #[error("unsupported attributes {0:04x?}")]
    UnsupportedAttribute(Vec<u16>),

    #[error("target {0} is not registered")]
    TargetNotRegistered(SocketAddr),

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    #[error("peer registry is closed")]
    RegistryClosed,
}

impl Error {
    pub(crate) fn violation<S: Into<String>>(msg: S) -> Self {
        Error::ProtocolViolation(msg.into())
    }
}
