//! Operator notifications.
//!
//! The tick thread never talks to a remote service.  It formats a message,
//! gates it through the [`AlertPolicy`] and `try_send`s it onto a bounded
//! outbox.  A [`NotifyWorker`] on its own thread owns the transport and
//! delivers each message under a strict timeout.
//!
//! ```text
//!  ┌────────────┐ OutboundMessage ┌────────────────────────────────┐
//!  │ tick thread│────────────────▶│ notify thread                  │
//!  │ dispatch() │   (bounded)     │  LocalExecutor                 │
//!  └────────────┘                 │   recv → send ∥ Timer(timeout) │
//!                                 └────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::NaiveDateTime;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, TrySendError};
use log::{debug, info, warn};

use crate::app::ports::NotifyTransport;
use crate::config::ChannelKind;
use crate::error::NotifyError;
use crate::fsm::context::Notice;
use crate::policy::AlertPolicy;

/// Outbox depth.  Overflow drops the newest message.
pub const OUTBOX_DEPTH: usize = 16;

/// Title used for every push notification.
pub const PUSH_TITLE: &str = "Garage";

/// A formatted message ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub channel: ChannelKind,
    pub title: String,
    pub body: String,
}

impl OutboundMessage {
    /// Email bodies carry a local `%b %d %H:%M` timestamp suffix.
    pub fn format(channel: ChannelKind, text: &str, local_now: NaiveDateTime) -> Self {
        let body = match channel {
            ChannelKind::Email => format!("{text}{}", local_now.format(" %b %d %H:%M")),
            ChannelKind::Push => text.to_string(),
        };
        Self {
            channel,
            title: PUSH_TITLE.to_string(),
            body,
        }
    }
}

// ---------------------------------------------------------------------------
// Outbox
// ---------------------------------------------------------------------------

/// Cloneable handle to the bounded message queue.
#[derive(Clone)]
pub struct Outbox {
    channel: Arc<Channel<CriticalSectionRawMutex, OutboundMessage, OUTBOX_DEPTH>>,
}

impl Default for Outbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Outbox {
    pub fn new() -> Self {
        Self {
            channel: Arc::new(Channel::new()),
        }
    }

    pub fn try_send(&self, msg: OutboundMessage) -> Result<(), OutboundMessage> {
        self.channel.try_send(msg).map_err(|TrySendError::Full(m)| m)
    }

    pub fn try_next(&self) -> Option<OutboundMessage> {
        self.channel.try_receive().ok()
    }

    pub async fn next(&self) -> OutboundMessage {
        self.channel.receive().await
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Dispatcher (tick side)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// No channel configured.
    NoChannel,
    /// The policy refused (disabled, wrong day, outside window, quiet hours).
    Suppressed,
    Queued,
    /// The outbox was full.
    Dropped,
}

pub struct NotificationDispatcher {
    policy: AlertPolicy,
    channel: Option<ChannelKind>,
    outbox: Outbox,
}

impl NotificationDispatcher {
    pub fn new(policy: AlertPolicy, channel: Option<ChannelKind>, outbox: Outbox) -> Self {
        Self {
            policy,
            channel,
            outbox,
        }
    }

    /// Gate, format and enqueue.  Never blocks.
    pub fn dispatch(&self, notice: &Notice, local_now: NaiveDateTime) -> DispatchOutcome {
        let Some(channel) = self.channel else {
            return DispatchOutcome::NoChannel;
        };
        if !self.policy.allows(notice.kind, local_now) {
            debug!("alert suppressed: {}", notice.text);
            return DispatchOutcome::Suppressed;
        }

        let msg = OutboundMessage::format(channel, &notice.text, local_now);
        match self.outbox.try_send(msg) {
            Ok(()) => DispatchOutcome::Queued,
            Err(msg) => {
                warn!("{channel} outbox full, dropping: {}", msg.body);
                DispatchOutcome::Dropped
            }
        }
    }

    pub fn policy(&self) -> &AlertPolicy {
        &self.policy
    }
}

// ---------------------------------------------------------------------------
// Worker (delivery side)
// ---------------------------------------------------------------------------

pub struct NotifyWorker<T: NotifyTransport> {
    transport: T,
    outbox: Outbox,
    timeout: Duration,
}

impl<T: NotifyTransport> NotifyWorker<T> {
    pub fn new(transport: T, outbox: Outbox, timeout: Duration) -> Self {
        Self {
            transport,
            outbox,
            timeout,
        }
    }

    /// One delivery bounded by the configured timeout.
    pub async fn deliver(&mut self, msg: &OutboundMessage) -> Result<(), NotifyError> {
        let timeout = self.timeout;
        let expire = async move {
            async_io_mini::Timer::after(timeout).await;
            Err(NotifyError::Timeout)
        };
        futures_lite::future::or(self.transport.send(msg), expire).await
    }

    async fn deliver_logged(&mut self, msg: &OutboundMessage) -> Result<(), NotifyError> {
        let kind = self.transport.kind();
        let result = self.deliver(msg).await;
        match &result {
            Ok(()) => info!("{kind} sent: {}", msg.body),
            Err(e) => warn!("{kind} delivery failed: {e}"),
        }
        result
    }

    /// Deliver queued messages forever.  Failures are logged and dropped.
    pub async fn run(mut self) {
        loop {
            let msg = self.outbox.next().await;
            let _ = self.deliver_logged(&msg).await;
        }
    }

    /// Deliver the next queued message on the calling thread, if any.
    pub fn deliver_next_blocking(&mut self) -> Option<Result<(), NotifyError>> {
        let msg = self.outbox.try_next()?;
        Some(futures_lite::future::block_on(self.deliver_logged(&msg)))
    }
}

impl<T: NotifyTransport + Send + 'static> NotifyWorker<T> {
    /// Run the worker on a dedicated thread with its own local executor.
    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name("notify".into())
            .spawn(move || {
                let executor: edge_executor::LocalExecutor<'_, 4> =
                    edge_executor::LocalExecutor::new();
                let task = executor.spawn(self.run());
                info!("notify worker started");
                futures_lite::future::block_on(executor.run(task));
            })
    }
}
