//! Properties of the message codec.

use holepunch::stun::{
    attr, xor, Attribute, ErrorCode, MappedAddress, Message, MessageIntegrity, TransactionId,
    UnknownAttributes, XorMappedAddress,
};
use holepunch::Error;
use proptest::prelude::*;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

const MODELED: [u16; 5] = [
    attr::MAPPED_ADDRESS,
    attr::XOR_MAPPED_ADDRESS,
    attr::MESSAGE_INTEGRITY,
    attr::ERROR_CODE,
    attr::UNKNOWN_ATTRIBUTES,
];

fn socket_addr() -> impl Strategy<Value = SocketAddr> {
    prop_oneof![
        (any::<[u8; 4]>(), any::<u16>()).prop_map(|(ip, port)| SocketAddr::from((Ipv4Addr::from(ip), port))),
        (any::<[u8; 16]>(), any::<u16>()).prop_map(|(ip, port)| SocketAddr::from((Ipv6Addr::from(ip), port))),
    ]
}

fn attribute() -> impl Strategy<Value = Attribute> {
    prop_oneof![
        socket_addr().prop_map(|a| Attribute::from(MappedAddress(a))),
        (any::<[u8; 4]>(), any::<u16>())
            .prop_map(|(ip, port)| {
                Attribute::from(XorMappedAddress(SocketAddrV4::new(ip.into(), port)))
            }),
        any::<[u8; 20]>().prop_map(|d| Attribute::from(MessageIntegrity(d))),
        (300u16..700, ".{0,40}").prop_map(|(code, reason)| Attribute::from(ErrorCode::new(code, reason))),
        prop::collection::vec(any::<u16>(), 0..8).prop_map(|t| Attribute::from(UnknownAttributes(t))),
        (
            any::<u16>().prop_filter("modeled tag", |t| !MODELED.contains(t)),
            prop::collection::vec(any::<u8>(), 0..64)
        )
            .prop_map(|(tag, value)| Attribute::Opaque { tag, value }),
    ]
}

/// Also values the wire form cannot carry: scoped ipv6, codes above 799,
/// opaque values under modeled tags.
fn any_attribute() -> impl Strategy<Value = Attribute> {
    prop_oneof![
        attribute(),
        (any::<[u8; 16]>(), any::<u16>(), any::<u32>(), any::<u32>()).prop_map(
            |(ip, port, flow, scope)| {
                let addr = SocketAddrV6::new(Ipv6Addr::from(ip), port, flow, scope);
                Attribute::from(MappedAddress(addr.into()))
            }
        ),
        (any::<u16>(), ".{0,8}")
            .prop_map(|(code, reason)| Attribute::from(ErrorCode::new(code, reason))),
        (
            prop::sample::select(MODELED.to_vec()),
            prop::collection::vec(any::<u8>(), 0..24)
        )
            .prop_map(|(tag, value)| Attribute::Opaque { tag, value }),
    ]
}

fn message() -> impl Strategy<Value = Message> {
    (
        any::<u16>(),
        any::<[u8; 12]>(),
        prop::collection::vec(attribute(), 0..8),
    )
        .prop_map(|(msg_type, tid, attributes)| Message {
            msg_type,
            transaction_id: TransactionId::new(tid),
            attributes,
        })
}

proptest! {
    #[test]
    fn decode_inverts_encode(m in message()) {
        let bytes = m.encode().unwrap();
        prop_assert_eq!(Message::decode(&bytes).unwrap(), m);
    }

    #[test]
    fn encode_is_exact_or_refused(
        msg_type in any::<u16>(),
        attributes in prop::collection::vec(any_attribute(), 0..6),
    ) {
        let m = Message {
            msg_type,
            transaction_id: TransactionId::new([7; 12]),
            attributes,
        };
        match m.encode() {
            Ok(bytes) => prop_assert_eq!(Message::decode(&bytes).unwrap(), m),
            Err(e) => prop_assert!(matches!(e, Error::MalformedMessage(_))),
        }
    }

    #[test]
    fn xor_is_self_inverse(ip in any::<[u8; 4]>(), port in any::<u16>()) {
        let addr = SocketAddrV4::new(ip.into(), port);
        prop_assert_eq!(xor::xor_addr(xor::xor_addr(addr)), addr);
    }

    #[test]
    fn xor_attribute_bytes_round_trip(port in any::<u16>(), ip in any::<[u8; 4]>()) {
        let mut wire = vec![0, 1];
        wire.extend_from_slice(&port.to_be_bytes());
        wire.extend_from_slice(&ip);
        let decoded = Attribute::decode(attr::XOR_MAPPED_ADDRESS, &wire).unwrap();
        let mut encoded = vec![];
        decoded.encode_value(&mut encoded);
        prop_assert_eq!(encoded, wire);
    }

    #[test]
    fn prefixes_are_malformed(m in message(), cut in any::<prop::sample::Index>()) {
        let bytes = m.encode().unwrap();
        let n = cut.index(bytes.len());
        prop_assert!(matches!(
            Message::decode(&bytes[..n]),
            Err(Error::MalformedMessage(_))
        ));
    }

    #[test]
    fn opaque_is_byte_identical(
        tag in any::<u16>().prop_filter("modeled tag", |t| !MODELED.contains(t)),
        value in prop::collection::vec(any::<u8>(), 0..128),
    ) {
        let mut bytes = Message::request(0x0001).encode().unwrap();
        let len = (4 + value.len()) as u16;
        bytes[2..4].copy_from_slice(&len.to_be_bytes());
        bytes.extend_from_slice(&tag.to_be_bytes());
        bytes.extend_from_slice(&(value.len() as u16).to_be_bytes());
        bytes.extend_from_slice(&value);

        let m = Message::decode(&bytes).unwrap();
        prop_assert_eq!(&m.attributes, &vec![Attribute::Opaque { tag, value }]);
        prop_assert_eq!(m.encode().unwrap(), bytes);
    }

    #[test]
    fn decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..128)) {
        let _ = Message::decode(&bytes);
    }

    #[test]
    fn signed_messages_verify(m in message(), secret in prop::collection::vec(any::<u8>(), 1..32)) {
        let mut m = m;
        m.attributes.retain(|a| a.tag() != attr::MESSAGE_INTEGRITY);
        m.sign(&secret).unwrap();
        let decoded = Message::decode(&m.encode().unwrap()).unwrap();
        prop_assert!(decoded.verify_integrity(&secret));
    }
}
