//! Command/response APDUs, status words, and the chaining transceiver.

use crate::transport::Connection;
use crate::{tlv, Error, Result};
use std::fmt;
use tracing::{debug, trace, trace_span};

/// Maximum number of "send remaining" rounds before giving up on a response.
pub const MAX_CONTINUATIONS: usize = 256;

/// YKOATH instruction bytes.
///
/// Select and CalculateAll share a byte, they're told apart by P1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Put,
    Delete,
    SetCode,
    Reset,
    Rename,
    List,
    Calculate,
    Validate,
    CalculateAll,
    Select,
    SendRemaining,
}

impl From<Instruction> for u8 {
    fn from(ins: Instruction) -> u8 {
        match ins {
            Instruction::Put => 0x01,
            Instruction::Delete => 0x02,
            Instruction::SetCode => 0x03,
            Instruction::Reset => 0x04,
            Instruction::Rename => 0x05,
            Instruction::List => 0xA1,
            Instruction::Calculate => 0xA2,
            Instruction::Validate => 0xA3,
            Instruction::CalculateAll | Instruction::Select => 0xA4,
            Instruction::SendRemaining => 0xA5,
        }
    }
}

/// A command APDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub cla: u8,
    pub ins: u8,
    pub p1: u8,
    pub p2: u8,

    /// Command data, already framed by the caller. Lc is written automatically.
    pub data: Vec<u8>,
}

impl Command {
    pub fn new(cla: u8, ins: Instruction, p1: u8, p2: u8, data: Vec<u8>) -> Self {
        Self {
            cla,
            ins: ins.into(),
            p1,
            p2,
            data,
        }
    }

    /// Serializes the command. Empty data omits Lc entirely.
    pub fn to_bytes(&self) -> Vec<u8> {
        let cmd = if self.data.is_empty() {
            apdu::Command::new(self.cla, self.ins, self.p1, self.p2)
        } else {
            apdu::Command::new_with_payload(self.cla, self.ins, self.p1, self.p2, self.data.as_slice())
        };
        let mut buf = vec![0; cmd.len()];
        cmd.write(&mut buf);
        buf
    }
}

/// The fixed "send remaining data" APDU.
pub fn send_remaining() -> Vec<u8> {
    vec![0x00, Instruction::SendRemaining.into(), 0x00, 0x00]
}

/// Raw status word, as the trailing (SW1, SW2) of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusWord(pub u8, pub u8);

/// What a status word means for the exchange in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// 0x9000: OK.
    Success,
    /// 0x61XX: XX more bytes are waiting to be fetched with SEND REMAINING.
    MoreData(u8),
    /// Anything else.
    Failure(StatusWord),
}

impl StatusWord {
    pub fn status(self) -> Status {
        match (self.0, self.1) {
            (0x90, 0x00) => Status::Success,
            (0x61, xx) => Status::MoreData(xx),
            _ => Status::Failure(self),
        }
    }

    /// Describes the status words YKOATH applets are known to return.
    pub fn description(self) -> Option<&'static str> {
        match (self.0, self.1) {
            (0x90, 0x00) => Some("success"),
            (0x61, _) => Some("more data available"),
            (0x65, 0x81) => Some("memory failure"),
            (0x67, 0x00) => Some("wrong length"),
            (0x69, 0x82) => Some("authentication required"),
            (0x69, 0x84) => Some("no such object"),
            (0x69, 0x85) => Some("conditions of use not satisfied"),
            (0x6A, 0x80) => Some("wrong syntax"),
            (0x6A, 0x82) => Some("file not found"),
            (0x6A, 0x84) => Some("no space"),
            (0x6D, 0x00) => Some("instruction not supported"),
            _ => None,
        }
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}{:02X}", self.0, self.1)?;
        if let Some(desc) = self.description() {
            write!(f, " ({})", desc)?;
        }
        Ok(())
    }
}

/// Splits a raw response into its payload and status word.
pub fn split_response(rsp: &[u8]) -> Result<(&[u8], StatusWord)> {
    match rsp {
        [data @ .., sw1, sw2] => Ok((data, StatusWord(*sw1, *sw2))),
        _ => Err(Error::ResponseTooShort(rsp.len())),
    }
}

/// Sends a command and collects the full response, following 0x61XX continuations,
/// then decodes the payload as TLV.
pub fn send<C: Connection + ?Sized>(card: &mut C, cmd: &Command) -> Result<Vec<tlv::Tlv>> {
    let span = trace_span!("send", ins = cmd.ins);
    let _enter = span.enter();

    let mut req = cmd.to_bytes();
    let mut data = Vec::new();
    for _ in 0..=MAX_CONTINUATIONS {
        trace!(req = %hex::encode_upper(&req), ">> TX");
        let rsp = card.transmit(&req).map_err(Error::Transmit)?;
        trace!(rsp = %hex::encode_upper(&rsp), "<< RX");

        let (payload, sw) = split_response(&rsp)?;
        data.extend_from_slice(payload);
        match sw.status() {
            Status::MoreData(xx) => {
                debug!(remaining = xx, "More data available");
                req = send_remaining();
            }
            Status::Success => return tlv::decode(&data),
            Status::Failure(sw) => return Err(Error::Status(sw)),
        }
    }
    Err(Error::TooManyContinuations(MAX_CONTINUATIONS))
}
