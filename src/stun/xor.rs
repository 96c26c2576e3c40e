//! Reversible address obfuscation.
//!
//! The port is XORed with the high 16 bits of [`MAGIC_COOKIE`], the address
//! with the whole cookie. Applying the transform twice yields the input.

use std::net::{Ipv4Addr, SocketAddrV4};

use super::MAGIC_COOKIE;

const PORT_MASK: u16 = (MAGIC_COOKIE >> 16) as u16;

pub fn xor_port(port: u16) -> u16 {
    port ^ PORT_MASK
}

pub fn xor_ip(ip: Ipv4Addr) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(ip) ^ MAGIC_COOKIE)
}

/// Obfuscate a plain endpoint, or recover the plain endpoint from an obfuscated one.
pub fn xor_addr(addr: SocketAddrV4) -> SocketAddrV4 {
    SocketAddrV4::new(xor_ip(*addr.ip()), xor_port(addr.port()))
}
