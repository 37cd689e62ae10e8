//! Client for the YKOATH application found on YubiKeys and compatible tokens, over PC/SC.

pub mod apdu;
pub mod errors;
pub mod oath;
pub mod pcsc;
pub mod session;
pub mod tlv;
pub mod transport;

#[cfg(test)]
mod mock;

pub use errors::{Error, Result};
pub use session::Session;
