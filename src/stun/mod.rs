//! STUN-style binary messages.
//!
//! A message is a 20 byte header followed by a sequence of attributes:
//!
//! ```text
//!  0                   1                   2                   3
//! +-------------------------------+-------------------------------+
//! |         message type          |        attributes length      |
//! +-------------------------------+-------------------------------+
//! |                     magic cookie (0x2112A442)                 |
//! +---------------------------------------------------------------+
//! |                  transaction id (96 bits)                     |
//! +-------------------------------+-------------------------------+
//! |        attribute type         |       attribute length        |
//! +-------------------------------+-------------------------------+
//! |                      value (length bytes) ...                 |
//! ```
//!
//! Attribute values are not padded. Attribute types without a decoder are kept
//! as [`Attribute::Opaque`] so a message always re-encodes to the same bytes.

mod attribute;
mod integrity;
mod message;
pub mod xor;

pub use attribute::{
    Attribute, AttributeValue, ErrorCode, MappedAddress, MessageIntegrity, UnknownAttributes,
    XorMappedAddress,
};
pub use message::{Message, TransactionId};

/// Fixed constant of every header, also the XOR key for obfuscated addresses.
pub const MAGIC_COOKIE: u32 = 0x2112_A442;

pub const HEADER_LEN: usize = 20;
pub const TRANSACTION_ID_LEN: usize = 12;

/// Attribute type + length.
pub const ATTR_HEADER_LEN: usize = 4;

/// Message types.
pub mod method {
    pub const BINDING_REQUEST: u16 = 0x0001;
    pub const BINDING_RESPONSE: u16 = 0x0101;
    pub const BINDING_ERROR_RESPONSE: u16 = 0x0111;
    pub const SHARED_SECRET_REQUEST: u16 = 0x0002;
    pub const SHARED_SECRET_RESPONSE: u16 = 0x0102;
    pub const SHARED_SECRET_ERROR_RESPONSE: u16 = 0x0112;
}

/// Attribute type tags.
pub mod attr {
    pub const MAPPED_ADDRESS: u16 = 0x0001;
    pub const RESPONSE_ADDRESS: u16 = 0x0002;
    pub const CHANGE_REQUEST: u16 = 0x0003;
    pub const SOURCE_ADDRESS: u16 = 0x0004;
    pub const CHANGED_ADDRESS: u16 = 0x0005;
    pub const USERNAME: u16 = 0x0006;
    pub const PASSWORD: u16 = 0x0007;
    pub const MESSAGE_INTEGRITY: u16 = 0x0008;
    pub const ERROR_CODE: u16 = 0x0009;
    pub const UNKNOWN_ATTRIBUTES: u16 = 0x000A;
    pub const REFLECTED_FROM: u16 = 0x000B;
    pub const REALM: u16 = 0x0014;
    pub const NONCE: u16 = 0x0015;
    pub const XOR_ONLY: u16 = 0x0021;
    pub const XOR_MAPPED_ADDRESS: u16 = 0x8020;
    pub const SERVER_NAME: u16 = 0x8022;
    pub const SECONDARY_ADDRESS: u16 = 0x8050;

    /// Tags below this must be understood by the receiver.
    pub const COMPREHENSION_OPTIONAL: u16 = 0x8000;
}

/// Error codes carried in [`ErrorCode`].
pub mod code {
    pub const BAD_REQUEST: u16 = 400;
    pub const UNAUTHORIZED: u16 = 401;
    pub const UNKNOWN_ATTRIBUTE: u16 = 420;
    pub const SERVER_ERROR: u16 = 500;
}

/// Tell a binary message apart from a text command sharing the same socket.
///
/// Message types never set the two most significant bits, while every text
/// command starts with an upper case letter.
pub fn is_message(datagram: &[u8]) -> bool {
    datagram.len() >= HEADER_LEN && datagram[0] & 0xC0 == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demux() {
        let msg = Message::new(method::BINDING_REQUEST, TransactionId::new([7; 12]));
        assert!(is_message(&msg.encode().unwrap()));
        assert!(!is_message(b"REQUEST_SERVER_LIST"));
        assert!(!is_message(b"HOLE_PUNCH|1.2.3.4,5"));
        assert!(!is_message(&[0u8; 4]));
    }
}
