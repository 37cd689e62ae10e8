use crate::apdu::{self, Command, Instruction};
use crate::pcsc::PcscContext;
use crate::tlv::Tlv;
use crate::transport::{Connection, Context};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tap::TapFallible;
use tracing::{debug, trace_span, warn};

/// Readers whose name contains this (case-insensitively) are assumed to be OATH tokens.
pub const DEFAULT_READER_MARKER: &str = "yubikey";

/// Default TOTP time step.
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(30);

pub type Clock = Box<dyn Fn() -> DateTime<Utc>>;

/// An exclusive session with a single token.
pub struct Session<C: Context = PcscContext> {
    /// Time source for TOTP challenges.
    pub clock: Clock,
    /// TOTP time step.
    pub period: Duration,

    card: C::Connection,
    ctx: C,
}

impl Session<PcscContext> {
    /// Connects to the first YubiKey-like reader visible to PC/SC.
    pub fn open() -> Result<Self> {
        Self::open_with(PcscContext::establish().map_err(Error::EstablishContext)?)
    }
}

impl<C: Context> Session<C> {
    /// Connects to the first reader on `ctx` matching [`DEFAULT_READER_MARKER`].
    pub fn open_with(ctx: C) -> Result<Self> {
        Self::open_matching(ctx, DEFAULT_READER_MARKER)
    }

    /// Connects to the first reader on `ctx` whose name contains `marker`, ignoring case.
    ///
    /// The context is consumed either way; if no session comes out of this, it's released.
    pub fn open_matching(ctx: C, marker: &str) -> Result<Self> {
        let span = trace_span!("open", marker);
        let _enter = span.enter();

        match connect_matching(&ctx, marker) {
            Ok(card) => Ok(Self {
                clock: Box::new(Utc::now),
                period: DEFAULT_PERIOD,
                card,
                ctx,
            }),
            Err(err) => {
                ctx.release()
                    .tap_err(|err| warn!(%err, "Couldn't release context"))
                    .ok();
                Err(err)
            }
        }
    }

    /// Replaces the time source.
    pub fn with_clock<F: Fn() -> DateTime<Utc> + 'static>(mut self, clock: F) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Replaces the TOTP time step.
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Disconnects from the card, leaving it usable by others, then releases the context.
    /// The context is released even if disconnecting fails.
    pub fn close(self) -> Result<()> {
        let span = trace_span!("close");
        let _enter = span.enter();

        let disconnect = self
            .card
            .disconnect()
            .tap_err(|err| warn!(%err, "Couldn't disconnect card"));
        let release = self
            .ctx
            .release()
            .tap_err(|err| warn!(%err, "Couldn't release context"));
        match (disconnect, release) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(err), Ok(())) => Err(Error::Disconnect(err)),
            (Ok(()), Err(err)) => Err(Error::Release(err)),
            (Err(disconnect), Err(release)) => Err(Error::Close {
                disconnect,
                release,
            }),
        }
    }

    /// Issues a raw instruction and returns the decoded response entries.
    pub fn send(
        &mut self,
        cla: u8,
        ins: Instruction,
        p1: u8,
        p2: u8,
        data: Vec<u8>,
    ) -> Result<Vec<Tlv>> {
        apdu::send(&mut self.card, &Command::new(cla, ins, p1, p2, data))
    }

    /// Returns the time step number for the current time, as used in TOTP challenges.
    pub fn time_step(&self) -> u64 {
        let period = self.period.as_secs().max(1);
        let now = (self.clock)().timestamp().max(0) as u64;
        now / period
    }
}

fn connect_matching<C: Context>(ctx: &C, marker: &str) -> Result<C::Connection> {
    let readers = ctx.list_readers().map_err(Error::ListReaders)?;
    debug!(count = readers.len(), "Listed readers");

    let reader = find_reader(&readers, marker).ok_or(Error::NoSuitableReader(readers.len()))?;
    debug!(reader, "Connecting to reader");
    ctx.connect(reader).map_err(Error::Connect)
}

/// Returns the first reader whose name contains `marker`, ignoring case.
pub fn find_reader<'a>(readers: &'a [String], marker: &str) -> Option<&'a str> {
    let marker = marker.to_lowercase();
    readers
        .iter()
        .map(String::as_str)
        .find(|name| name.to_lowercase().contains(&marker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockContext;
    use chrono::TimeZone;

    #[test]
    fn test_find_reader() {
        let readers = vec!["ACS Reader".to_string(), "YubiKey 5 NFC".to_string()];
        assert_eq!(find_reader(&readers, "yubikey"), Some("YubiKey 5 NFC"));
        assert_eq!(find_reader(&readers, "YUBIKEY"), Some("YubiKey 5 NFC"));
        assert_eq!(find_reader(&readers, "nitrokey"), None);
        assert_eq!(find_reader(&[], "yubikey"), None);
    }

    #[test]
    fn test_open_selects_matching_reader() -> Result<()> {
        let ctx = MockContext::new(&["ACS Reader", "YubiKey 5 NFC"], vec![]);
        let events = ctx.events.clone();
        let session = Session::open_with(ctx)?;
        assert_eq!(session.period, Duration::from_secs(30));
        assert_eq!(*events.borrow(), vec!["connect YubiKey 5 NFC"]);
        session.close()
    }

    #[test]
    fn test_open_no_suitable_reader() {
        let ctx = MockContext::new(&["ACS Reader", "Nitrokey 3"], vec![]);
        let events = ctx.events.clone();
        match Session::open_with(ctx) {
            Err(Error::NoSuitableReader(2)) => {}
            Err(err) => panic!("wrong error: {}", err),
            Ok(_) => panic!("opened a session without a YubiKey"),
        }
        assert_eq!(*events.borrow(), vec!["release"]);
    }

    #[test]
    fn test_open_no_readers() {
        let ctx = MockContext::new(&[], vec![]);
        assert!(matches!(
            Session::open_with(ctx),
            Err(Error::NoSuitableReader(0))
        ));
    }

    #[test]
    fn test_open_list_failure() {
        let mut ctx = MockContext::new(&["YubiKey"], vec![]);
        ctx.list_err = Some(pcsc::Error::NoService);
        let events = ctx.events.clone();
        assert!(matches!(
            Session::open_with(ctx),
            Err(Error::ListReaders(pcsc::Error::NoService))
        ));
        assert_eq!(*events.borrow(), vec!["release"]);
    }

    #[test]
    fn test_open_connect_failure() {
        let mut ctx = MockContext::new(&["YubiKey"], vec![]);
        ctx.connect_err = Some(pcsc::Error::SharingViolation);
        let events = ctx.events.clone();
        assert!(matches!(
            Session::open_with(ctx),
            Err(Error::Connect(pcsc::Error::SharingViolation))
        ));
        assert_eq!(*events.borrow(), vec!["connect YubiKey", "release"]);
    }

    #[test]
    fn test_open_failure_keeps_open_error_over_release_error() {
        let mut ctx = MockContext::new(&["ACS Reader"], vec![]);
        ctx.release_err = Some(pcsc::Error::InvalidHandle);
        let events = ctx.events.clone();
        assert!(matches!(
            Session::open_with(ctx),
            Err(Error::NoSuitableReader(1))
        ));
        assert_eq!(*events.borrow(), vec!["release"]);
    }

    #[test]
    fn test_open_matching_custom_marker() -> Result<()> {
        let ctx = MockContext::new(&["YubiKey 5", "Nitrokey 3"], vec![]);
        let events = ctx.events.clone();
        Session::open_matching(ctx, "nitro")?.close()?;
        assert_eq!(
            *events.borrow(),
            vec!["connect Nitrokey 3", "disconnect", "release"]
        );
        Ok(())
    }

    #[test]
    fn test_close_releases_after_failed_disconnect() {
        let mut ctx = MockContext::new(&["YubiKey"], vec![]);
        ctx.disconnect_err = Some(pcsc::Error::RemovedCard);
        let events = ctx.events.clone();
        let session = Session::open_with(ctx).unwrap();
        assert!(matches!(
            session.close(),
            Err(Error::Disconnect(pcsc::Error::RemovedCard))
        ));
        assert_eq!(
            *events.borrow(),
            vec!["connect YubiKey", "disconnect", "release"]
        );
    }

    #[test]
    fn test_close_release_failure() {
        let mut ctx = MockContext::new(&["YubiKey"], vec![]);
        ctx.release_err = Some(pcsc::Error::InvalidHandle);
        let session = Session::open_with(ctx).unwrap();
        assert!(matches!(
            session.close(),
            Err(Error::Release(pcsc::Error::InvalidHandle))
        ));
    }

    #[test]
    fn test_close_both_fail() {
        let mut ctx = MockContext::new(&["YubiKey"], vec![]);
        ctx.disconnect_err = Some(pcsc::Error::RemovedCard);
        ctx.release_err = Some(pcsc::Error::InvalidHandle);
        let session = Session::open_with(ctx).unwrap();
        assert!(matches!(
            session.close(),
            Err(Error::Close {
                disconnect: pcsc::Error::RemovedCard,
                release: pcsc::Error::InvalidHandle,
            })
        ));
    }

    #[test]
    fn test_time_step() {
        let session = Session::open_with(MockContext::new(&["YubiKey"], vec![]))
            .unwrap()
            .with_clock(|| Utc.timestamp_opt(59, 0).unwrap());
        assert_eq!(session.time_step(), 1);

        let session = session.with_period(Duration::from_secs(60));
        assert_eq!(session.time_step(), 0);

        let session = session.with_clock(|| Utc.timestamp_opt(-100, 0).unwrap());
        assert_eq!(session.time_step(), 0);
    }
}
