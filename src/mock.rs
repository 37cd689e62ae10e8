//! In-memory transport double for tests.

use crate::transport::{Connection, Context};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Shared record of lifecycle calls, so tests can inspect it after the session is gone.
pub type Events = Rc<RefCell<Vec<String>>>;

/// Shared record of every transmitted frame.
pub type Sent = Rc<RefCell<Vec<Vec<u8>>>>;

/// A card that replays scripted responses and records every request.
#[derive(Debug, Default)]
pub struct MockCard {
    pub script: VecDeque<Vec<u8>>,
    pub sent: Sent,
    pub disconnect_err: Option<pcsc::Error>,
    pub events: Events,
}

impl MockCard {
    pub fn new(script: Vec<Vec<u8>>) -> Self {
        Self {
            script: script.into(),
            ..Default::default()
        }
    }
}

impl Connection for MockCard {
    fn transmit(&mut self, req: &[u8]) -> Result<Vec<u8>, pcsc::Error> {
        self.sent.borrow_mut().push(req.to_vec());
        self.script.pop_front().ok_or(pcsc::Error::NoSmartcard)
    }

    fn disconnect(self) -> Result<(), pcsc::Error> {
        self.events.borrow_mut().push("disconnect".into());
        match self.disconnect_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
pub struct MockContext {
    pub readers: Vec<String>,
    pub script: Vec<Vec<u8>>,
    pub list_err: Option<pcsc::Error>,
    pub connect_err: Option<pcsc::Error>,
    pub disconnect_err: Option<pcsc::Error>,
    pub release_err: Option<pcsc::Error>,
    pub events: Events,
    pub sent: Sent,
}

impl MockContext {
    pub fn new(readers: &[&str], script: Vec<Vec<u8>>) -> Self {
        Self {
            readers: readers.iter().map(|r| r.to_string()).collect(),
            script,
            ..Default::default()
        }
    }
}

impl Context for MockContext {
    type Connection = MockCard;

    fn list_readers(&self) -> Result<Vec<String>, pcsc::Error> {
        match self.list_err {
            Some(err) => Err(err),
            None => Ok(self.readers.clone()),
        }
    }

    fn connect(&self, reader: &str) -> Result<MockCard, pcsc::Error> {
        self.events.borrow_mut().push(format!("connect {}", reader));
        if let Some(err) = self.connect_err {
            return Err(err);
        }
        Ok(MockCard {
            script: self.script.clone().into(),
            sent: self.sent.clone(),
            disconnect_err: self.disconnect_err,
            events: self.events.clone(),
        })
    }

    fn release(self) -> Result<(), pcsc::Error> {
        self.events.borrow_mut().push("release".into());
        match self.release_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
