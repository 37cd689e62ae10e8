use super::{Algorithm, Tag, OATH_AID};
use crate::apdu::Instruction;
use crate::tlv::Tlv;
use crate::transport::Context;
use crate::{Error, Result, Session};
use tracing::{debug, trace_span, warn};

/// Response to SELECTing the OATH applet.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SelectResponse {
    /// 0x79: Applet version, eg. [5, 4, 3].
    pub version: Vec<u8>,

    /// 0x71: Device ID, also used as the salt when deriving an access key.
    pub id: Vec<u8>,

    /// 0x74: Only present if an access code is set.
    pub challenge: Option<Vec<u8>>,

    /// 0x7B: Algorithm of the access code, if one is set.
    pub algorithm: Option<Algorithm>,
}

impl SelectResponse {
    /// Returns the version as a dotted string.
    pub fn version_string(&self) -> String {
        self.version
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl<'a> TryFrom<&'a [Tlv]> for SelectResponse {
    type Error = Error;

    fn try_from(tlvs: &'a [Tlv]) -> Result<Self> {
        let mut version = None;
        let mut id = None;
        let mut slf = Self::default();
        for tlv in tlvs {
            match Tag::try_from(tlv.tag) {
                Ok(Tag::Version) => version = Some(tlv.value.clone()),
                Ok(Tag::Name) => id = Some(tlv.value.clone()),
                Ok(Tag::Challenge) => slf.challenge = Some(tlv.value.clone()),
                Ok(Tag::Algorithm) => {
                    let v = tlv.value.first().ok_or(Error::EmptyValue(tlv.tag))?;
                    slf.algorithm = Some(Algorithm::from(*v));
                }
                _ => warn!(tag = tlv.tag, "SELECT response contains unknown field"),
            }
        }
        slf.version = version.ok_or(Error::MissingTag(Tag::Version.into()))?;
        slf.id = id.ok_or(Error::MissingTag(Tag::Name.into()))?;
        Ok(slf)
    }
}

impl<C: Context> Session<C> {
    /// Selects the OATH applet. Other commands fail until this has been done.
    pub fn select(&mut self) -> Result<SelectResponse> {
        let span = trace_span!("select");
        let _enter = span.enter();

        let tlvs = self.send(0x00, Instruction::Select, 0x04, 0x00, OATH_AID.to_vec())?;
        let rsp = SelectResponse::try_from(&tlvs[..])?;
        debug!(version = %rsp.version_string(), "Selected OATH applet");
        Ok(rsp)
    }
}
