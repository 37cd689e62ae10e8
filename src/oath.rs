//! The YKOATH application: credential management and one-time password calculation.
//!
//! Protocol reference: https://developers.yubico.com/OATH/YKOATH_Protocol.html

pub mod calculate;
pub mod list;
pub mod manage;
pub mod put;
pub mod select;

pub use calculate::{CalculateAllEntry, Code, Outcome};
pub use list::Name;
pub use put::Credential;
pub use select::SelectResponse;

use crate::tlv::Tlv;
use crate::{Error, Result};
use num_enum::{FromPrimitive, IntoPrimitive, TryFromPrimitive};
use std::fmt;

/// Application ID of the OATH applet.
pub const OATH_AID: [u8; 7] = [0xA0, 0x00, 0x00, 0x05, 0x27, 0x21, 0x01];

/// Maximum length of a credential name.
pub const MAX_NAME_LEN: usize = 64;

/// TLV tags used in YKOATH requests and responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Tag {
    Name = 0x71,
    NameList = 0x72,
    Key = 0x73,
    Challenge = 0x74,
    Response = 0x75,
    Truncated = 0x76,
    Hotp = 0x77,
    Property = 0x78,
    Version = 0x79,
    Imf = 0x7A,
    Algorithm = 0x7B,
    Touch = 0x7C,
}

/// HMAC algorithm of a credential; the low nibble of its type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum Algorithm {
    HmacSha1 = 0x01,
    HmacSha256 = 0x02,
    HmacSha512 = 0x03,
    #[num_enum(catch_all)]
    Unknown(u8),
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HmacSha1 => write!(f, "HMAC-SHA1"),
            Self::HmacSha256 => write!(f, "HMAC-SHA256"),
            Self::HmacSha512 => write!(f, "HMAC-SHA512"),
            Self::Unknown(v) => write!(f, "unknown algorithm {:#x}", v),
        }
    }
}

/// Kind of credential; the high nibble of its type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum Type {
    Hotp = 0x01,
    Totp = 0x02,
    #[num_enum(catch_all)]
    Unknown(u8),
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hotp => write!(f, "HOTP"),
            Self::Totp => write!(f, "TOTP"),
            Self::Unknown(v) => write!(f, "unknown type {:#x}", v),
        }
    }
}

/// Splits a type byte into its credential type and algorithm.
pub fn split_type_byte(v: u8) -> (Type, Algorithm) {
    (Type::from(v >> 4), Algorithm::from(v & 0x0F))
}

/// Packs a credential type and algorithm into a type byte.
pub fn type_byte(kind: Type, algorithm: Algorithm) -> u8 {
    (u8::from(kind) << 4) | (u8::from(algorithm) & 0x0F)
}

/// Checks that a credential name fits on the card and returns it as a Name entry.
pub(crate) fn name_tlv(name: &str) -> Result<Tlv> {
    if name.len() > MAX_NAME_LEN {
        return Err(Error::NameTooLong(name.len(), MAX_NAME_LEN));
    }
    Ok(Tlv::new(Tag::Name.into(), name.as_bytes()))
}
