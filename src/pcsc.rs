use crate::transport::{Connection, Context};
use std::ffi::CString;
use tracing::{debug, trace};

/// A PC/SC context, scoped to the current user.
pub struct PcscContext {
    pub ctx: pcsc::Context,
}

impl PcscContext {
    pub fn establish() -> Result<Self, pcsc::Error> {
        trace!({ scope = "user" }, "pcsc::Context::establish()");
        Ok(Self {
            ctx: pcsc::Context::establish(pcsc::Scope::User)?,
        })
    }
}

impl Context for PcscContext {
    type Connection = PcscCard;

    fn list_readers(&self) -> Result<Vec<String>, pcsc::Error> {
        trace!("pcsc::Context::list_readers_owned()");
        match self.ctx.list_readers_owned() {
            Ok(readers) => Ok(readers
                .iter()
                .map(|name| name.to_string_lossy().into_owned())
                .collect()),
            // PC/SC reports an empty reader list as an error.
            Err(pcsc::Error::NoReadersAvailable) => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }

    fn connect(&self, reader: &str) -> Result<PcscCard, pcsc::Error> {
        let name = CString::new(reader).map_err(|_| pcsc::Error::UnknownReader)?;
        trace!(
            { reader, sharing_mode=?pcsc::ShareMode::Shared, protocols=?pcsc::Protocols::ANY },
            "pcsc::Context::connect()"
        );
        let card = self
            .ctx
            .connect(&name, pcsc::ShareMode::Shared, pcsc::Protocols::ANY)?;
        Ok(PcscCard { card })
    }

    fn release(self) -> Result<(), pcsc::Error> {
        debug!("Releasing PC/SC context");
        self.ctx.release().map_err(|(_, err)| err)
    }
}

/// A connected card.
pub struct PcscCard {
    pub card: pcsc::Card,
}

impl Connection for PcscCard {
    fn transmit(&mut self, req: &[u8]) -> Result<Vec<u8>, pcsc::Error> {
        let mut rbuf = [0; pcsc::MAX_BUFFER_SIZE];
        Ok(self.card.transmit(req, &mut rbuf)?.to_vec())
    }

    fn disconnect(self) -> Result<(), pcsc::Error> {
        debug!("Disconnecting card");
        self.card
            .disconnect(pcsc::Disposition::LeaveCard)
            .map_err(|(_, err)| err)
    }
}
