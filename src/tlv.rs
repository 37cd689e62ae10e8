//! Simple-TLV codec used by every YKOATH request and response.
//!
//! Tags are always a single byte. Lengths follow the BER convention: if bit 8 of the first
//! byte is 0, bits 1-7 encode the length of the value. If bit 8 is set, bits 1-7 encode the
//! number of subsequent big-endian bytes holding the length.

use crate::{Error, Result};
use nom::bytes::complete::take;
use nom::multi::length_data;
use nom::number::complete::be_u8;
use tracing::trace;

pub type IResult<'a, T> = nom::IResult<&'a [u8], T>;

/// A single tag-value pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tlv {
    pub tag: u8,
    pub value: Vec<u8>,
}

impl Tlv {
    pub fn new(tag: u8, value: &[u8]) -> Self {
        Self {
            tag,
            value: value.to_vec(),
        }
    }
}

/// Appends a length field to `buf`, using the shortest form that fits.
pub fn write_len(buf: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        buf.push(len as u8);
        return;
    }
    let bytes = len.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    buf.push(0x80 | (bytes.len() - skip) as u8);
    buf.extend_from_slice(&bytes[skip..]);
}

/// Appends a single entry to `buf`.
pub fn write(buf: &mut Vec<u8>, tag: u8, value: &[u8]) {
    buf.push(tag);
    write_len(buf, value.len());
    buf.extend_from_slice(value);
}

/// Encodes a sequence of entries into a flat buffer.
pub fn encode(tlvs: &[Tlv]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(tlvs.iter().map(|t| t.value.len() + 2).sum());
    for tlv in tlvs {
        write(&mut buf, tlv.tag, &tlv.value);
    }
    buf
}

/// Parses a length field.
pub fn parse_len(input: &[u8]) -> IResult<usize> {
    let (input, first) = be_u8(input)?;
    if first < 0x80 {
        return Ok((input, first as usize));
    }

    let n = (first & 0x7F) as usize;
    if n == 0 || n > std::mem::size_of::<usize>() {
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            nom::error::ErrorKind::TooLarge,
        )));
    }
    let (input, raw) = take(n)(input)?;
    Ok((
        input,
        raw.iter().fold(0usize, |acc, b| (acc << 8) | *b as usize),
    ))
}

/// Parses a single tag-value pair.
pub fn parse_next(input: &[u8]) -> IResult<(u8, &[u8])> {
    let (input, tag) = be_u8(input)?;
    let (input, value) = length_data(parse_len)(input)?;
    Ok((input, (tag, value)))
}

/// Decodes a flat buffer into its entries. The buffer must hold whole entries only.
pub fn decode(data: &[u8]) -> Result<Vec<Tlv>> {
    let mut tlvs = Vec::new();
    let mut input = data;
    while !input.is_empty() {
        let offset = data.len() - input.len();
        match parse_next(input) {
            Ok((rest, (tag, value))) => {
                trace!(tag, len = value.len(), "TLV");
                tlvs.push(Tlv::new(tag, value));
                input = rest;
            }
            Err(nom::Err::Failure(_)) => return Err(Error::TlvLengthOverflow { offset }),
            Err(nom::Err::Error(_)) | Err(nom::Err::Incomplete(_)) => {
                return Err(Error::TruncatedTlv { offset })
            }
        }
    }
    Ok(tlvs)
}
