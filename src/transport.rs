//! Abstraction around the reader subsystem, so sessions can run against PC/SC or a double.

/// A reader enumeration context; owns every connection made through it.
pub trait Context {
    type Connection: Connection;

    /// Returns the names of all readers currently visible.
    fn list_readers(&self) -> Result<Vec<String>, pcsc::Error>;

    /// Opens a shared, protocol-agnostic connection to the named reader.
    fn connect(&self, reader: &str) -> Result<Self::Connection, pcsc::Error>;

    /// Releases the context.
    fn release(self) -> Result<(), pcsc::Error>;
}

/// A connection to a card.
pub trait Connection {
    /// Sends a raw command APDU and returns the raw response, status word included.
    fn transmit(&mut self, req: &[u8]) -> Result<Vec<u8>, pcsc::Error>;

    /// Disconnects, leaving the card usable by other clients.
    fn disconnect(self) -> Result<(), pcsc::Error>;
}
