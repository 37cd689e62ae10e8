use crate::apdu::StatusWord;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // Discovery.
    #[error("failed to establish context: {0}")]
    EstablishContext(#[source] pcsc::Error),
    #[error("failed to list readers: {0}")]
    ListReaders(#[source] pcsc::Error),
    #[error("no suitable reader found (out of {0} readers)")]
    NoSuitableReader(usize),

    // Connection.
    #[error("failed to connect to reader: {0}")]
    Connect(#[source] pcsc::Error),
    #[error("failed to disconnect from reader: {0}")]
    Disconnect(#[source] pcsc::Error),
    #[error("failed to release context: {0}")]
    Release(#[source] pcsc::Error),
    #[error("failed to disconnect from reader: {disconnect}; failed to release context: {release}")]
    Close {
        #[source]
        disconnect: pcsc::Error,
        release: pcsc::Error,
    },

    // Transmission.
    #[error("failed to transmit APDU: {0}")]
    Transmit(#[source] pcsc::Error),
    #[error("response truncated: {0} bytes, no status word")]
    ResponseTooShort(usize),
    #[error("card kept asking for continuation after {0} rounds")]
    TooManyContinuations(usize),

    // Protocol.
    #[error("card returned status {0}")]
    Status(StatusWord),

    // Decoding.
    #[error("truncated TLV at offset {offset}")]
    TruncatedTlv { offset: usize },
    #[error("unsupported TLV length encoding at offset {offset}")]
    TlvLengthOverflow { offset: usize },
    #[error("unknown tag: {0:02x}")]
    UnknownTag(u8),
    #[error("missing tag: {0:02x}")]
    MissingTag(u8),
    #[error("empty value for tag {0:02x}")]
    EmptyValue(u8),
    #[error("invalid value for tag {0:02x}: {1}")]
    InvalidValue(u8, &'static str),

    // Input.
    #[error("key too long: {0} bytes (max {1})")]
    KeyTooLong(usize, usize),
    #[error("name too long: {0} bytes (max {1})")]
    NameTooLong(usize, usize),
}
