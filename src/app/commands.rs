//! Inbound commands to the controller.
//!
//! Web handlers run on arbitrary threads and never touch door state.
//! They enqueue an [`AppCommand`] here; the supervisor drains the queue
//! at the start of the next tick.
//!
//! ```text
//! ┌──────────────┐  AppCommand  ┌──────────────┐
//! │ web handlers │────────────▶│  tick thread  │
//! │ (any thread) │              │  (sync)       │
//! └──────────────┘              └──────────────┘
//! ```

use std::sync::Arc;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

/// Queue depth; a full queue rejects further commands until the next tick.
pub const COMMAND_DEPTH: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    /// Pulse one door's relay (manual actuation).
    Click(String),

    /// Pulse every OPEN door's relay.
    CloseAll,

    /// Motion seen in the garage.
    Motion,
}

/// Cloneable handle to the bounded command channel.
#[derive(Clone)]
pub struct CommandQueue {
    channel: Arc<Channel<CriticalSectionRawMutex, AppCommand, COMMAND_DEPTH>>,
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandQueue {
    pub fn new() -> Self {
        Self {
            channel: Arc::new(Channel::new()),
        }
    }

    /// Enqueue without blocking.  Returns the command back if the queue is full.
    pub fn submit(&self, cmd: AppCommand) -> Result<(), AppCommand> {
        self.channel.try_send(cmd).map_err(|e| match e {
            embassy_sync::channel::TrySendError::Full(cmd) => cmd,
        })
    }

    /// Dequeue the next command, if any.
    pub fn try_next(&self) -> Option<AppCommand> {
        self.channel.try_receive().ok()
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }
}
