use std::fmt;
use std::net::SocketAddr;

use super::attribute::{Attribute, ErrorCode, MessageIntegrity, UnknownAttributes};
use super::{integrity, ATTR_HEADER_LEN, HEADER_LEN, MAGIC_COOKIE, TRANSACTION_ID_LEN};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId([u8; TRANSACTION_ID_LEN]);

impl TransactionId {
    pub fn new(bytes: [u8; TRANSACTION_ID_LEN]) -> Self {
        Self(bytes)
    }

    pub fn random() -> Self {
        Self(rand::random())
    }

    pub fn as_bytes(&self) -> &[u8; TRANSACTION_ID_LEN] {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// A decoded message. Attributes keep their wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub msg_type: u16,
    pub transaction_id: TransactionId,
    pub attributes: Vec<Attribute>,
}

impl Message {
    pub fn new(msg_type: u16, transaction_id: TransactionId) -> Self {
        Self {
            msg_type,
            transaction_id,
            attributes: vec![],
        }
    }

    /// New message with a random transaction id.
    pub fn request(msg_type: u16) -> Self {
        Self::new(msg_type, TransactionId::random())
    }

    /// New message answering `self`, same transaction id.
    pub fn reply(&self, msg_type: u16) -> Self {
        Self::new(msg_type, self.transaction_id)
    }

    pub fn with<A: Into<Attribute>>(mut self, attribute: A) -> Self {
        self.attributes.push(attribute.into());
        self
    }

    pub fn push<A: Into<Attribute>>(&mut self, attribute: A) {
        self.attributes.push(attribute.into());
    }

    /// First attribute carrying `tag`.
    pub fn get(&self, tag: u16) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.tag() == tag)
    }

    /// Reflexive address, XOR-MAPPED-ADDRESS preferred over MAPPED-ADDRESS.
    pub fn mapped_address(&self) -> Option<SocketAddr> {
        let xor = self.attributes.iter().find_map(|a| match a {
            Attribute::XorMappedAddress(x) => Some(SocketAddr::V4(x.0)),
            _ => None,
        });
        xor.or_else(|| {
            self.attributes.iter().find_map(|a| match a {
                Attribute::MappedAddress(m) => Some(m.0),
                _ => None,
            })
        })
    }

    pub fn error_code(&self) -> Option<&ErrorCode> {
        self.attributes.iter().find_map(|a| match a {
            Attribute::ErrorCode(e) => Some(e),
            _ => None,
        })
    }

    pub fn unknown_attributes(&self) -> Option<&UnknownAttributes> {
        self.attributes.iter().find_map(|a| match a {
            Attribute::UnknownAttributes(u) => Some(u),
            _ => None,
        })
    }

    /// Fails with [`Error::UnsupportedAttribute`] listing the opaque attributes
    /// in the comprehension-required range.
    pub fn require_understood(&self) -> Result<()> {
        let unknown: Vec<u16> = self
            .attributes
            .iter()
            .filter(|a| a.is_unknown_required())
            .map(Attribute::tag)
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(Error::UnsupportedAttribute(unknown))
        }
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_LEN {
            return Err(Error::MalformedMessage("header too short"));
        }

        let msg_type = u16::from_be_bytes([buf[0], buf[1]]);
        let declared = usize::from(u16::from_be_bytes([buf[2], buf[3]]));
        if u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]) != MAGIC_COOKIE {
            return Err(Error::MalformedMessage("bad magic cookie"));
        }
        let mut tid = [0; TRANSACTION_ID_LEN];
        tid.copy_from_slice(&buf[8..HEADER_LEN]);

        let mut rest = &buf[HEADER_LEN..];
        if rest.len() != declared {
            return Err(Error::MalformedMessage("length mismatch"));
        }

        let mut attributes = vec![];
        while !rest.is_empty() {
            if rest.len() < ATTR_HEADER_LEN {
                return Err(Error::MalformedMessage("truncated attribute header"));
            }
            let tag = u16::from_be_bytes([rest[0], rest[1]]);
            let len = usize::from(u16::from_be_bytes([rest[2], rest[3]]));
            let end = ATTR_HEADER_LEN + len;
            let value = rest
                .get(ATTR_HEADER_LEN..end)
                .ok_or(Error::MalformedMessage("truncated attribute value"))?;

            attributes.push(Attribute::decode(tag, value)?);
            rest = &rest[end..];
        }

        Ok(Self {
            msg_type,
            transaction_id: TransactionId(tid),
            attributes,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        self.encode_prefix(self.attributes.len())
    }

    /// Header plus the first `count` attributes, length field covering just those.
    fn encode_prefix(&self, count: usize) -> Result<Vec<u8>> {
        let attributes = &self.attributes[..count];

        let mut total = 0usize;
        for a in attributes {
            a.check_encodable()?;
            if a.value_len() > usize::from(u16::MAX) {
                return Err(Error::MalformedMessage("attribute value too long"));
            }
            total += ATTR_HEADER_LEN + a.value_len();
        }
        let total = u16::try_from(total).map_err(|_| Error::MalformedMessage("message too long"))?;

        let mut out = Vec::with_capacity(HEADER_LEN + usize::from(total));
        out.extend_from_slice(&self.msg_type.to_be_bytes());
        out.extend_from_slice(&total.to_be_bytes());
        out.extend_from_slice(&MAGIC_COOKIE.to_be_bytes());
        out.extend_from_slice(&self.transaction_id.0);

        for a in attributes {
            out.extend_from_slice(&a.tag().to_be_bytes());
            out.extend_from_slice(&(a.value_len() as u16).to_be_bytes());
            a.encode_value(&mut out);
        }

        Ok(out)
    }

    /// Append a MESSAGE-INTEGRITY attribute over everything added so far.
    pub fn sign(&mut self, secret: &[u8]) -> Result<()> {
        let mut prefix = self.encode()?;
        if !integrity::patch_length(&mut prefix) {
            return Err(Error::MalformedMessage("message too long"));
        }
        let digest = integrity::sign(&prefix, secret);
        self.push(MessageIntegrity(digest));
        Ok(())
    }

    /// Recompute the digest of the first MESSAGE-INTEGRITY attribute.
    ///
    /// Returns false when there is no such attribute or the digest differs.
    pub fn verify_integrity(&self, secret: &[u8]) -> bool {
        let Some((index, digest)) = self
            .attributes
            .iter()
            .enumerate()
            .find_map(|(i, a)| match a {
                Attribute::MessageIntegrity(m) => Some((i, m.0)),
                _ => None,
            })
        else {
            return false;
        };

        let Ok(mut prefix) = self.encode_prefix(index) else {
            return false;
        };
        integrity::patch_length(&mut prefix) && integrity::verify(&prefix, secret, &digest)
    }
}
