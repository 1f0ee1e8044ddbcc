//! Log-only notification transport.
//!
//! Stands in for the email and push wire clients: every message is
//! written to the log and reported as delivered.

use log::info;

use crate::app::ports::NotifyTransport;
use crate::config::ChannelKind;
use crate::error::NotifyError;
use crate::notify::OutboundMessage;

pub struct LogTransport {
    kind: ChannelKind,
}

impl LogTransport {
    pub fn new(kind: ChannelKind) -> Self {
        Self { kind }
    }
}

impl NotifyTransport for LogTransport {
    fn kind(&self) -> ChannelKind {
        self.kind
    }

    async fn send(&mut self, msg: &OutboundMessage) -> Result<(), NotifyError> {
        info!("[{}] {}: {}", self.kind, msg.title, msg.body);
        Ok(())
    }
}
