use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4};

use super::{attr, xor};
use crate::error::{Error, Result};

const FAMILY_IPV4: u8 = 0x01;
const FAMILY_IPV6: u8 = 0x02;

pub const INTEGRITY_LEN: usize = 20;

/// Value codec of one modeled attribute type.
pub trait AttributeValue: Sized {
    const TAG: u16;

    fn encode_value(&self, out: &mut Vec<u8>);

    /// `value` is exactly the bytes announced by the attribute header.
    fn decode_value(value: &[u8]) -> Result<Self>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedAddress(pub SocketAddr);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XorMappedAddress(pub SocketAddrV4);

/// Raw HMAC-SHA1 digest, see [`Message::verify_integrity`](super::Message::verify_integrity).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageIntegrity(pub [u8; INTEGRITY_LEN]);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorCode {
    /// 300..=699, hundreds are the class.
    pub code: u16,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAttributes(pub Vec<u16>);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribute {
    MappedAddress(MappedAddress),
    XorMappedAddress(XorMappedAddress),
    MessageIntegrity(MessageIntegrity),
    ErrorCode(ErrorCode),
    UnknownAttributes(UnknownAttributes),
    /// Any tag without a decoder, kept verbatim.
    Opaque { tag: u16, value: Vec<u8> },
}

type DecodeFn = fn(&[u8]) -> Result<Attribute>;

fn decode_as<A: AttributeValue + Into<Attribute>>(value: &[u8]) -> Result<Attribute> {
    A::decode_value(value).map(Into::into)
}

const DECODERS: [(u16, DecodeFn); 5] = [
    (MappedAddress::TAG, decode_as::<MappedAddress>),
    (XorMappedAddress::TAG, decode_as::<XorMappedAddress>),
    (MessageIntegrity::TAG, decode_as::<MessageIntegrity>),
    (ErrorCode::TAG, decode_as::<ErrorCode>),
    (UnknownAttributes::TAG, decode_as::<UnknownAttributes>),
];

impl Attribute {
    /// Decode a value according to its tag, falling back to [`Attribute::Opaque`].
    pub fn decode(tag: u16, value: &[u8]) -> Result<Self> {
        match DECODERS.iter().find(|(t, _)| *t == tag) {
            Some((_, decode)) => decode(value),
            None => Ok(Attribute::Opaque {
                tag,
                value: value.to_vec(),
            }),
        }
    }

    pub fn tag(&self) -> u16 {
        match self {
            Attribute::MappedAddress(_) => MappedAddress::TAG,
            Attribute::XorMappedAddress(_) => XorMappedAddress::TAG,
            Attribute::MessageIntegrity(_) => MessageIntegrity::TAG,
            Attribute::ErrorCode(_) => ErrorCode::TAG,
            Attribute::UnknownAttributes(_) => UnknownAttributes::TAG,
            Attribute::Opaque { tag, .. } => *tag,
        }
    }

    pub fn encode_value(&self, out: &mut Vec<u8>) {
        match self {
            Attribute::MappedAddress(a) => a.encode_value(out),
            Attribute::XorMappedAddress(a) => a.encode_value(out),
            Attribute::MessageIntegrity(a) => a.encode_value(out),
            Attribute::ErrorCode(a) => a.encode_value(out),
            Attribute::UnknownAttributes(a) => a.encode_value(out),
            Attribute::Opaque { value, .. } => out.extend_from_slice(value),
        }
    }

    pub fn value_len(&self) -> usize {
        match self {
            Attribute::MappedAddress(MappedAddress(SocketAddr::V4(_))) => 8,
            Attribute::MappedAddress(MappedAddress(SocketAddr::V6(_))) => 20,
            Attribute::XorMappedAddress(_) => 8,
            Attribute::MessageIntegrity(_) => INTEGRITY_LEN,
            Attribute::ErrorCode(e) => 4 + e.reason.len(),
            Attribute::UnknownAttributes(u) => 2 * u.0.len(),
            Attribute::Opaque { value, .. } => value.len(),
        }
    }

    /// Refuse values the wire form cannot carry, so that decoding gives back the same attribute.
    pub fn check_encodable(&self) -> Result<()> {
        match self {
            Attribute::MappedAddress(MappedAddress(SocketAddr::V6(a)))
                if a.scope_id() != 0 || a.flowinfo() != 0 =>
            {
                Err(Error::MalformedMessage("ipv6 scope id and flow info have no wire form"))
            }
            Attribute::ErrorCode(e) if e.code > ErrorCode::MAX => {
                Err(Error::MalformedMessage("error code above 799"))
            }
            Attribute::Opaque { tag, .. } if DECODERS.iter().any(|(t, _)| t == tag) => {
                Err(Error::MalformedMessage("opaque value under a modeled tag"))
            }
            _ => Ok(()),
        }
    }

    /// Opaque attribute the receiver was required to understand.
    pub fn is_unknown_required(&self) -> bool {
        matches!(self, Attribute::Opaque { tag, .. } if *tag < attr::COMPREHENSION_OPTIONAL)
    }
}

macro_rules! into_attribute {
    ($($name:ident),*) => {
        $(
            impl From<$name> for Attribute {
                fn from(a: $name) -> Self {
                    Attribute::$name(a)
                }
            }
        )*
    };
}

into_attribute!(
    MappedAddress,
    XorMappedAddress,
    MessageIntegrity,
    ErrorCode,
    UnknownAttributes
);

impl AttributeValue for MappedAddress {
    const TAG: u16 = attr::MAPPED_ADDRESS;

    fn encode_value(&self, out: &mut Vec<u8>) {
        out.push(0);
        match self.0 {
            SocketAddr::V4(a) => {
                out.push(FAMILY_IPV4);
                out.extend_from_slice(&a.port().to_be_bytes());
                out.extend_from_slice(&a.ip().octets());
            }
            SocketAddr::V6(a) => {
                out.push(FAMILY_IPV6);
                out.extend_from_slice(&a.port().to_be_bytes());
                out.extend_from_slice(&a.ip().octets());
            }
        }
    }

    fn decode_value(value: &[u8]) -> Result<Self> {
        if value.len() < 8 {
            return Err(Error::MalformedMessage("address attribute too short"));
        }
        let port = u16::from_be_bytes([value[2], value[3]]);
        let ip: IpAddr = match value[1] {
            FAMILY_IPV4 => {
                let octets: [u8; 4] = value[4..]
                    .try_into()
                    .map_err(|_| Error::MalformedMessage("ipv4 address length"))?;
                Ipv4Addr::from(octets).into()
            }
            FAMILY_IPV6 => {
                let octets: [u8; 16] = value[4..]
                    .try_into()
                    .map_err(|_| Error::MalformedMessage("ipv6 address length"))?;
                Ipv6Addr::from(octets).into()
            }
            family => return Err(Error::InvalidFamily(family)),
        };
        Ok(MappedAddress(SocketAddr::new(ip, port)))
    }
}

impl AttributeValue for XorMappedAddress {
    const TAG: u16 = attr::XOR_MAPPED_ADDRESS;

    fn encode_value(&self, out: &mut Vec<u8>) {
        let obfuscated = xor::xor_addr(self.0);
        out.push(0);
        out.push(FAMILY_IPV4);
        out.extend_from_slice(&obfuscated.port().to_be_bytes());
        out.extend_from_slice(&obfuscated.ip().octets());
    }

    fn decode_value(value: &[u8]) -> Result<Self> {
        if value.len() != 8 {
            return Err(Error::MalformedMessage("xor-mapped-address must be 8 bytes"));
        }
        if value[1] != FAMILY_IPV4 {
            return Err(Error::InvalidFamily(value[1]));
        }
        let port = u16::from_be_bytes([value[2], value[3]]);
        let ip = Ipv4Addr::new(value[4], value[5], value[6], value[7]);
        Ok(XorMappedAddress(xor::xor_addr(SocketAddrV4::new(ip, port))))
    }
}

impl AttributeValue for MessageIntegrity {
    const TAG: u16 = attr::MESSAGE_INTEGRITY;

    fn encode_value(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.0);
    }

    fn decode_value(value: &[u8]) -> Result<Self> {
        value
            .try_into()
            .map(MessageIntegrity)
            .map_err(|_| Error::MalformedMessage("message-integrity must be 20 bytes"))
    }
}

impl ErrorCode {
    /// Highest code a 3-bit class can express.
    pub const MAX: u16 = 799;

    pub fn new<S: Into<String>>(code: u16, reason: S) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    pub fn class(&self) -> u8 {
        (self.code / 100) as u8
    }

    pub fn number(&self) -> u8 {
        (self.code % 100) as u8
    }
}

impl AttributeValue for ErrorCode {
    const TAG: u16 = attr::ERROR_CODE;

    fn encode_value(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&[0, 0, self.class() & 0x07, self.number()]);
        out.extend_from_slice(self.reason.as_bytes());
    }

    fn decode_value(value: &[u8]) -> Result<Self> {
        if value.len() < 4 {
            return Err(Error::MalformedMessage("error-code too short"));
        }
        let code = u16::from(value[2] & 0x07) * 100 + u16::from(value[3]);
        let reason = std::str::from_utf8(&value[4..])
            .map_err(|_| Error::MalformedMessage("error reason is not utf-8"))?;
        Ok(ErrorCode::new(code, reason))
    }
}

impl AttributeValue for UnknownAttributes {
    const TAG: u16 = attr::UNKNOWN_ATTRIBUTES;

    fn encode_value(&self, out: &mut Vec<u8>) {
        for tag in &self.0 {
            out.extend_from_slice(&tag.to_be_bytes());
        }
    }

    fn decode_value(value: &[u8]) -> Result<Self> {
        if value.len() % 2 != 0 {
            return Err(Error::MalformedMessage("unknown-attributes has odd length"));
        }
        Ok(UnknownAttributes(
            value
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(a: &Attribute) -> Vec<u8> {
        let mut out = vec![];
        a.encode_value(&mut out);
        assert_eq!(out.len(), a.value_len());
        out
    }

    #[test]
    fn mapped_address_ipv4() {
        let addr: SocketAddr = "10.0.0.5:4000".parse().unwrap();
        let a = Attribute::from(MappedAddress(addr));
        let bytes = encode(&a);
        assert_eq!(bytes, [0, 1, 0x0f, 0xa0, 10, 0, 0, 5]);
        assert_eq!(Attribute::decode(attr::MAPPED_ADDRESS, &bytes).unwrap(), a);
    }

    #[test]
    fn mapped_address_ipv6() {
        let addr: SocketAddr = "[2001:db8::1]:443".parse().unwrap();
        let a = Attribute::from(MappedAddress(addr));
        let bytes = encode(&a);
        assert_eq!(bytes.len(), 20);
        assert_eq!(bytes[1], FAMILY_IPV6);
        assert_eq!(Attribute::decode(attr::MAPPED_ADDRESS, &bytes).unwrap(), a);
    }

    #[test]
    fn mapped_address_errors() {
        assert!(matches!(
            Attribute::decode(attr::MAPPED_ADDRESS, &[0, 1, 0, 80, 1, 2, 3]),
            Err(Error::MalformedMessage(_))
        ));
        assert!(matches!(
            Attribute::decode(attr::MAPPED_ADDRESS, &[0, 3, 0, 80, 1, 2, 3, 4]),
            Err(Error::InvalidFamily(3))
        ));
        // ipv6 family with an ipv4 sized body
        assert!(matches!(
            Attribute::decode(attr::MAPPED_ADDRESS, &[0, 2, 0, 80, 1, 2, 3, 4]),
            Err(Error::MalformedMessage(_))
        ));
    }

    #[test]
    fn xor_mapped_address() {
        let wire = [0, 1, 0xa1, 0x47, 0xe1, 0x12, 0xa6, 0x43];
        let a = Attribute::decode(attr::XOR_MAPPED_ADDRESS, &wire).unwrap();
        assert_eq!(
            a,
            Attribute::XorMappedAddress(XorMappedAddress("192.0.2.1:32853".parse().unwrap()))
        );
        assert_eq!(encode(&a), wire);

        assert!(matches!(
            Attribute::decode(attr::XOR_MAPPED_ADDRESS, &wire[..7]),
            Err(Error::MalformedMessage(_))
        ));
        assert!(matches!(
            Attribute::decode(attr::XOR_MAPPED_ADDRESS, &[0, 2, 0, 0, 0, 0, 0, 0]),
            Err(Error::InvalidFamily(2))
        ));
    }

    #[test]
    fn error_code() {
        let a = Attribute::from(ErrorCode::new(420, "Unknown Attribute"));
        let bytes = encode(&a);
        assert_eq!(&bytes[..4], &[0, 0, 4, 20]);
        assert_eq!(Attribute::decode(attr::ERROR_CODE, &bytes).unwrap(), a);

        assert!(matches!(
            Attribute::decode(attr::ERROR_CODE, &[0, 0, 4]),
            Err(Error::MalformedMessage(_))
        ));
        assert!(matches!(
            Attribute::decode(attr::ERROR_CODE, &[0, 0, 4, 0, 0xff]),
            Err(Error::MalformedMessage(_))
        ));
    }

    #[test]
    fn unknown_attributes() {
        let a = Attribute::decode(attr::UNKNOWN_ATTRIBUTES, &[0x00, 0x21, 0x00, 0x06]).unwrap();
        assert_eq!(
            a,
            Attribute::UnknownAttributes(UnknownAttributes(vec![attr::XOR_ONLY, attr::USERNAME]))
        );
        assert!(matches!(
            Attribute::decode(attr::UNKNOWN_ATTRIBUTES, &[0, 1, 0]),
            Err(Error::MalformedMessage(_))
        ));
    }

    #[test]
    fn integrity_length() {
        assert!(Attribute::decode(attr::MESSAGE_INTEGRITY, &[0; 20]).is_ok());
        assert!(matches!(
            Attribute::decode(attr::MESSAGE_INTEGRITY, &[0; 19]),
            Err(Error::MalformedMessage(_))
        ));
    }

    #[test]
    fn opaque_fallback() {
        let a = Attribute::decode(attr::USERNAME, b"alice").unwrap();
        assert_eq!(
            a,
            Attribute::Opaque {
                tag: attr::USERNAME,
                value: b"alice".to_vec()
            }
        );
        assert!(a.is_unknown_required());
        assert_eq!(encode(&a), b"alice");

        let optional = Attribute::decode(attr::SERVER_NAME, b"holepunch").unwrap();
        assert!(!optional.is_unknown_required());
    }

    #[test]
    fn not_encodable() {
        let scoped: SocketAddr = "[fe80::1%3]:80".parse().unwrap();
        assert!(matches!(
            Attribute::from(MappedAddress(scoped)).check_encodable(),
            Err(Error::MalformedMessage(_))
        ));
        let plain: SocketAddr = "[fe80::1]:80".parse().unwrap();
        assert!(Attribute::from(MappedAddress(plain)).check_encodable().is_ok());

        assert!(Attribute::from(ErrorCode::new(799, "x")).check_encodable().is_ok());
        assert!(Attribute::from(ErrorCode::new(800, "x")).check_encodable().is_err());

        let shadowed = Attribute::Opaque {
            tag: attr::MAPPED_ADDRESS,
            value: vec![0; 8],
        };
        assert!(shadowed.check_encodable().is_err());
        let unknown = Attribute::Opaque {
            tag: attr::USERNAME,
            value: b"alice".to_vec(),
        };
        assert!(unknown.check_encodable().is_ok());
    }
}
