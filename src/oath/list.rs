use super::{split_type_byte, Algorithm, Tag, Type};
use crate::apdu::Instruction;
use crate::tlv::Tlv;
use crate::transport::Context;
use crate::{Error, Result, Session};
use std::fmt;
use tracing::trace_span;

/// A credential, as returned by LIST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Name {
    pub algorithm: Algorithm,
    pub kind: Type,
    pub name: String,
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.kind)
    }
}

impl<'a> TryFrom<&'a Tlv> for Name {
    type Error = Error;

    fn try_from(tlv: &'a Tlv) -> Result<Self> {
        if tlv.tag != u8::from(Tag::NameList) {
            return Err(Error::UnknownTag(tlv.tag));
        }
        let (first, name) = tlv.value.split_first().ok_or(Error::EmptyValue(tlv.tag))?;
        let (kind, algorithm) = split_type_byte(*first);
        Ok(Self {
            algorithm,
            kind,
            name: String::from_utf8_lossy(name).into(),
        })
    }
}

/// Parses a LIST response, in card order.
pub fn parse(tlvs: &[Tlv]) -> Result<Vec<Name>> {
    tlvs.iter().map(Name::try_from).collect()
}

impl<C: Context> Session<C> {
    /// Lists every credential stored on the token.
    pub fn list(&mut self) -> Result<Vec<Name>> {
        let span = trace_span!("list");
        let _enter = span.enter();

        parse(&self.send(0x00, Instruction::List, 0x00, 0x00, vec![])?)
    }
}
