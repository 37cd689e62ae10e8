use super::{name_tlv, type_byte, Algorithm, Tag, Type};
use crate::apdu::Instruction;
use crate::tlv::{self, Tlv};
use crate::transport::Context;
use crate::{Error, Result, Session};
use byteorder::{BigEndian, ByteOrder};
use tracing::{debug, trace_span};

/// Keys shorter than this are zero-padded; the card rejects them otherwise.
pub const HMAC_MINIMUM_KEY_SIZE: usize = 14;

/// Keys are stored as-is, so they may not be longer than the HMAC block size.
pub const HMAC_MAXIMUM_KEY_SIZE: usize = 64;

/// Property bit: the credential requires touch to calculate.
const PROPERTY_REQUIRE_TOUCH: u8 = 0x02;

/// A credential to store on the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub name: String,
    pub kind: Type,
    pub algorithm: Algorithm,
    pub digits: u8,
    pub key: Vec<u8>,
    pub touch: bool,

    /// Initial counter value, for HOTP credentials.
    pub imf: Option<u32>,
}

impl Credential {
    /// A 6-digit HMAC-SHA1 TOTP credential, the most common kind.
    pub fn totp<N: Into<String>, K: Into<Vec<u8>>>(name: N, key: K) -> Self {
        Self {
            name: name.into(),
            kind: Type::Totp,
            algorithm: Algorithm::HmacSha1,
            digits: 6,
            key: key.into(),
            touch: false,
            imf: None,
        }
    }

    /// Encodes the credential as PUT command data.
    pub fn to_data(&self) -> Result<Vec<u8>> {
        if self.key.len() > HMAC_MAXIMUM_KEY_SIZE {
            return Err(Error::KeyTooLong(self.key.len(), HMAC_MAXIMUM_KEY_SIZE));
        }
        let mut key = Vec::with_capacity(2 + self.key.len().max(HMAC_MINIMUM_KEY_SIZE));
        key.push(type_byte(self.kind, self.algorithm));
        key.push(self.digits);
        key.extend_from_slice(&self.key);
        key.resize(2 + self.key.len().max(HMAC_MINIMUM_KEY_SIZE), 0);

        let mut buf = tlv::encode(&[name_tlv(&self.name)?, Tlv::new(Tag::Key.into(), &key)]);
        if self.touch {
            // Property is tag-value, no length.
            buf.extend_from_slice(&[Tag::Property.into(), PROPERTY_REQUIRE_TOUCH]);
        }
        if let Some(imf) = self.imf {
            let mut raw = [0; 4];
            BigEndian::write_u32(&mut raw, imf);
            tlv::write(&mut buf, Tag::Imf.into(), &raw);
        }
        Ok(buf)
    }
}

impl<C: Context> Session<C> {
    /// Stores a credential, overwriting any existing one with the same name.
    pub fn put(&mut self, cred: &Credential) -> Result<()> {
        let span = trace_span!("put", name = cred.name.as_str());
        let _enter = span.enter();

        let data = cred.to_data()?;
        self.send(0x00, Instruction::Put, 0x00, 0x00, data)?;
        debug!("Stored credential");
        Ok(())
    }
}
