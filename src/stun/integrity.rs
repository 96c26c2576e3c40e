//! HMAC-SHA1 over a message prefix.
//!
//! The prefix is the header plus every attribute before MESSAGE-INTEGRITY, with
//! the header length field covering the integrity attribute itself.

use ring::hmac;

use super::attribute::INTEGRITY_LEN;
use super::{ATTR_HEADER_LEN, HEADER_LEN};

fn key(secret: &[u8]) -> hmac::Key {
    hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, secret)
}

/// Rewrite the length field of an encoded prefix as if it ended with the integrity attribute.
pub(super) fn patch_length(prefix: &mut [u8]) -> bool {
    let len = prefix.len() - HEADER_LEN + ATTR_HEADER_LEN + INTEGRITY_LEN;
    match u16::try_from(len) {
        Ok(len) => {
            prefix[2..4].copy_from_slice(&len.to_be_bytes());
            true
        }
        Err(_) => false,
    }
}

pub(super) fn sign(prefix: &[u8], secret: &[u8]) -> [u8; INTEGRITY_LEN] {
    let tag = hmac::sign(&key(secret), prefix);
    let mut digest = [0; INTEGRITY_LEN];
    digest.copy_from_slice(&tag.as_ref()[..INTEGRITY_LEN]);
    digest
}

/// Constant time comparison of the recomputed digest against `digest`.
pub(super) fn verify(prefix: &[u8], secret: &[u8], digest: &[u8; INTEGRITY_LEN]) -> bool {
    hmac::verify(&key(secret), prefix, digest).is_ok()
}
