use super::{name_tlv, Tag};
use crate::apdu::Instruction;
use crate::tlv::{self, Tlv};
use crate::transport::Context;
use crate::{Error, Result, Session};
use byteorder::{BigEndian, ByteOrder};
use std::fmt;
use tracing::{debug, trace_span};

/// P2 asking the card for truncated responses, rather than the full HMAC.
const P2_TRUNCATE: u8 = 0x01;

/// A one-time password.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Code {
    pub digits: u8,
    pub value: u32,
}

impl Code {
    /// Parses the value of a Truncated (0x76) entry: the digit count, then a 4-byte code.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let tag = u8::from(Tag::Truncated);
        let (digits, raw) = match data {
            [digits, raw @ ..] if raw.len() == 4 => (*digits, raw),
            _ => return Err(Error::InvalidValue(tag, "expected digits and a 4-byte code")),
        };
        if !(1..=10).contains(&digits) {
            return Err(Error::InvalidValue(tag, "digits out of range"));
        }
        let value = (BigEndian::read_u32(raw) & 0x7FFF_FFFF) as u64 % 10u64.pow(digits.into());
        Ok(Self {
            digits,
            value: value as u32,
        })
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0width$}", self.value, width = self.digits as usize)
    }
}

/// What CALCULATE ALL had to say about a single credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// 0x76: The code for the current time step.
    Code(Code),
    /// 0x77: HOTP credentials are never calculated in bulk.
    Hotp,
    /// 0x7C: The credential requires touch, calculate it on its own.
    TouchRequired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalculateAllEntry {
    pub name: String,
    pub outcome: Outcome,
}

/// Encodes a time step as a TOTP challenge.
pub fn challenge(time_step: u64) -> [u8; 8] {
    let mut buf = [0; 8];
    BigEndian::write_u64(&mut buf, time_step);
    buf
}

/// Parses a CALCULATE response.
pub fn parse_calculate(tlvs: &[Tlv]) -> Result<Code> {
    let tag = u8::from(Tag::Truncated);
    if let Some(tlv) = tlvs.iter().find(|tlv| tlv.tag != tag) {
        return Err(Error::UnknownTag(tlv.tag));
    }
    match tlvs {
        [tlv] => Code::parse(&tlv.value),
        [] => Err(Error::MissingTag(tag)),
        _ => Err(Error::InvalidValue(tag, "more than one code")),
    }
}

/// Parses a CALCULATE ALL response: a Name entry followed by its outcome, for every credential.
pub fn parse_calculate_all(tlvs: &[Tlv]) -> Result<Vec<CalculateAllEntry>> {
    let mut entries = Vec::with_capacity(tlvs.len() / 2);
    let mut iter = tlvs.iter();
    while let Some(name) = iter.next() {
        if name.tag != u8::from(Tag::Name) {
            return Err(Error::UnknownTag(name.tag));
        }
        let rsp = iter
            .next()
            .ok_or(Error::MissingTag(Tag::Truncated.into()))?;
        let outcome = match Tag::try_from(rsp.tag) {
            Ok(Tag::Truncated) => Outcome::Code(Code::parse(&rsp.value)?),
            Ok(Tag::Hotp) => Outcome::Hotp,
            Ok(Tag::Touch) => Outcome::TouchRequired,
            _ => return Err(Error::UnknownTag(rsp.tag)),
        };
        entries.push(CalculateAllEntry {
            name: String::from_utf8_lossy(&name.value).into(),
            outcome,
        });
    }
    Ok(entries)
}

impl<C: Context> Session<C> {
    /// Calculates a single credential's code for the current time step.
    /// Blocks until the token is touched, if the credential requires it.
    pub fn calculate(&mut self, name: &str) -> Result<Code> {
        let span = trace_span!("calculate", name);
        let _enter = span.enter();

        let step = self.time_step();
        debug!(step, "Calculating");
        let data = tlv::encode(&[
            name_tlv(name)?,
            Tlv::new(Tag::Challenge.into(), &challenge(step)),
        ]);
        parse_calculate(&self.send(0x00, Instruction::Calculate, 0x00, P2_TRUNCATE, data)?)
    }

    /// Calculates every TOTP credential that doesn't require touch, for the current time step.
    pub fn calculate_all(&mut self) -> Result<Vec<CalculateAllEntry>> {
        let span = trace_span!("calculate_all");
        let _enter = span.enter();

        let step = self.time_step();
        debug!(step, "Calculating all");
        let data = tlv::encode(&[Tlv::new(Tag::Challenge.into(), &challenge(step))]);
        parse_calculate_all(&self.send(
            0x00,
            Instruction::CalculateAll,
            0x00,
            P2_TRUNCATE,
            data,
        )?)
    }
}
