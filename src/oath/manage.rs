use super::name_tlv;
use crate::apdu::Instruction;
use crate::tlv;
use crate::transport::Context;
use crate::{Result, Session};
use tracing::{debug, trace_span, warn};

impl<C: Context> Session<C> {
    /// Deletes a credential.
    pub fn delete(&mut self, name: &str) -> Result<()> {
        let span = trace_span!("delete", name);
        let _enter = span.enter();

        let data = tlv::encode(&[name_tlv(name)?]);
        self.send(0x00, Instruction::Delete, 0x00, 0x00, data)?;
        debug!("Deleted credential");
        Ok(())
    }

    /// Renames a credential.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<()> {
        let span = trace_span!("rename", old, new);
        let _enter = span.enter();

        let data = tlv::encode(&[name_tlv(old)?, name_tlv(new)?]);
        self.send(0x00, Instruction::Rename, 0x00, 0x00, data)?;
        debug!("Renamed credential");
        Ok(())
    }

    /// Wipes every credential and the access code, restoring the applet to factory state.
    pub fn reset(&mut self) -> Result<()> {
        let span = trace_span!("reset");
        let _enter = span.enter();

        warn!("Resetting OATH applet");
        self.send(0x00, Instruction::Reset, 0xDE, 0xAD, vec![])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::apdu::StatusWord;
    use crate::mock::{MockContext, Sent};
    use crate::{Error, Result, Session};

    fn session(script: Vec<Vec<u8>>) -> (Session<MockContext>, Sent) {
        let ctx = MockContext::new(&["YubiKey"], script);
        let sent = ctx.sent.clone();
        (Session::open_with(ctx).unwrap(), sent)
    }

    #[test]
    fn test_delete() -> Result<()> {
        let (mut session, sent) = session(vec![vec![0x90, 0x00]]);
        session.delete("ab")?;
        assert_eq!(
            *sent.borrow(),
            vec![vec![0x00, 0x02, 0x00, 0x00, 0x04, 0x71, 0x02, b'a', b'b']]
        );
        session.close()
    }

    #[test]
    fn test_delete_no_such_object() {
        let (mut session, _) = session(vec![vec![0x69, 0x84]]);
        assert!(matches!(
            session.delete("nope"),
            Err(Error::Status(StatusWord(0x69, 0x84)))
        ));
    }

    #[test]
    fn test_delete_name_too_long() {
        let (mut session, sent) = session(vec![]);
        assert!(matches!(
            session.delete(&"x".repeat(65)),
            Err(Error::NameTooLong(65, 64))
        ));
        assert!(sent.borrow().is_empty());
    }

    #[test]
    fn test_rename() -> Result<()> {
        let (mut session, sent) = session(vec![vec![0x90, 0x00]]);
        session.rename("a", "bc")?;
        assert_eq!(
            *sent.borrow(),
            vec![vec![
                0x00, 0x05, 0x00, 0x00, 0x07, //
                0x71, 0x01, b'a', //
                0x71, 0x02, b'b', b'c',
            ]]
        );
        Ok(())
    }

    #[test]
    fn test_reset() -> Result<()> {
        let (mut session, sent) = session(vec![vec![0x90, 0x00]]);
        session.reset()?;
        assert_eq!(*sent.borrow(), vec![vec![0x00, 0x04, 0xDE, 0xAD]]);
        Ok(())
    }
}
