//! Binding requests: tell a peer the endpoint its datagram arrived from.

use std::net::SocketAddr;

use crate::error::{Error, Result};
use crate::stun::{
    code, method, ErrorCode, MappedAddress, Message, UnknownAttributes, XorMappedAddress,
};

/// Build the answer to a decoded message received from `from`.
///
/// Only binding requests are answered. With a `secret`, requests must carry a
/// valid MESSAGE-INTEGRITY and every answer is signed.
pub fn respond(request: &Message, from: SocketAddr, secret: Option<&[u8]>) -> Result<Option<Message>> {
    if request.msg_type != method::BINDING_REQUEST {
        log::debug!("ignore message type {:#06x} from {}", request.msg_type, from);
        return Ok(None);
    }

    let mut response = match request.require_understood() {
        Err(Error::UnsupportedAttribute(tags)) => {
            log::debug!("{} sent unknown attributes {:04x?}", from, tags);
            error_response(request, code::UNKNOWN_ATTRIBUTE, "Unknown Attribute")
                .with(UnknownAttributes(tags))
        }
        Err(e) => return Err(e),
        Ok(()) => match secret {
            Some(secret) if !request.verify_integrity(secret) => {
                log::debug!("{} failed integrity check", from);
                error_response(request, code::UNAUTHORIZED, "Unauthorized")
            }
            _ => mapped_response(request, from),
        },
    };

    if let Some(secret) = secret {
        response.sign(secret)?;
    }

    Ok(Some(response))
}

fn mapped_response(request: &Message, mut from: SocketAddr) -> Message {
    // scope and flow label are local to this host
    if let SocketAddr::V6(v6) = &mut from {
        v6.set_scope_id(0);
        v6.set_flowinfo(0);
    }
    let mut response = request
        .reply(method::BINDING_RESPONSE)
        .with(MappedAddress(from));
    if let SocketAddr::V4(v4) = from {
        response.push(XorMappedAddress(v4));
    }
    response
}

fn error_response(request: &Message, code: u16, reason: &str) -> Message {
    request
        .reply(method::BINDING_ERROR_RESPONSE)
        .with(ErrorCode::new(code, reason))
}
