//! Generation-based long-poll distribution.
//!
//! The tick thread publishes one [`Snapshot`] per tick.  Web handlers ask
//! for updates newer than a client watermark: if the latest snapshot has
//! any, they get them at once; otherwise the request is parked and
//! resolved by the first later `publish` that satisfies it.
//!
//! Checking and parking happen under the same lock as `publish`, so a
//! request can never slip between a snapshot and its resolution pass.

use core::cell::RefCell;
use std::sync::Arc;
use std::time::Duration;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use serde::Serialize;

use crate::door::DoorView;
use crate::fsm::DoorState;

/// `(door_id, state, time_in_state)`, serialized as a JSON array.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateRecord(pub String, pub DoorState, pub f64);

/// End-of-tick view of every door.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Advances on every tick in which a door's time-in-state changed.
    pub generation: u64,
    pub taken_at: f64,
    pub doors: Vec<DoorView>,
}

impl Snapshot {
    /// Records with `time_in_state >= watermark`.
    pub fn updates_since(&self, watermark: f64) -> Vec<UpdateRecord> {
        self.doors
            .iter()
            .filter(|d| d.time_in_state >= watermark)
            .map(|d| UpdateRecord(d.id.clone(), d.state, d.time_in_state))
            .collect()
    }
}

type Completion = Signal<CriticalSectionRawMutex, Vec<UpdateRecord>>;

struct Parked {
    id: u64,
    watermark: f64,
    signal: Arc<Completion>,
}

struct StreamInner {
    snapshot: Arc<Snapshot>,
    parked: Vec<Parked>,
    next_id: u64,
}

type Shared = Arc<Mutex<CriticalSectionRawMutex, RefCell<StreamInner>>>;

/// Cloneable handle; every clone sees the same snapshot and parked set.
#[derive(Clone)]
pub struct UpdateStream {
    inner: Shared,
}

/// Result of [`UpdateStream::subscribe`].
pub enum Subscription {
    Ready(Vec<UpdateRecord>),
    Parked(PendingUpdate),
}

impl Default for UpdateStream {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateStream {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(RefCell::new(StreamInner {
                snapshot: Arc::new(Snapshot::default()),
                parked: Vec::new(),
                next_id: 0,
            }))),
        }
    }

    /// Answer from the latest snapshot, or park until one satisfies `watermark`.
    pub fn subscribe(&self, watermark: f64, arrival: f64) -> Subscription {
        self.inner.lock(|cell| {
            let mut inner = cell.borrow_mut();
            let ready = inner.snapshot.updates_since(watermark);
            if !ready.is_empty() {
                return Subscription::Ready(ready);
            }

            let id = inner.next_id;
            inner.next_id += 1;
            let signal = Arc::new(Completion::new());
            inner.parked.push(Parked {
                id,
                watermark,
                signal: signal.clone(),
            });
            Subscription::Parked(PendingUpdate {
                id,
                watermark,
                arrival,
                signal,
                stream: self.inner.clone(),
            })
        })
    }

    /// Store `snapshot` and resolve every parked request it satisfies.
    /// Returns the number resolved.
    pub fn publish(&self, snapshot: Snapshot) -> usize {
        self.inner.lock(|cell| {
            let mut inner = cell.borrow_mut();
            let snapshot = Arc::new(snapshot);
            let mut resolved = 0;
            inner.parked.retain(|p| {
                let records = snapshot.updates_since(p.watermark);
                if records.is_empty() {
                    true
                } else {
                    p.signal.signal(records);
                    resolved += 1;
                    false
                }
            });
            inner.snapshot = snapshot;
            resolved
        })
    }

    /// Records from the latest published snapshot newer than `watermark`.
    pub fn get_updates(&self, watermark: f64) -> Vec<UpdateRecord> {
        self.inner
            .lock(|cell| cell.borrow().snapshot.updates_since(watermark))
    }

    pub fn latest(&self) -> Arc<Snapshot> {
        self.inner.lock(|cell| cell.borrow().snapshot.clone())
    }

    pub fn parked_count(&self) -> usize {
        self.inner.lock(|cell| cell.borrow().parked.len())
    }
}

// ---------------------------------------------------------------------------
// PendingUpdate
// ---------------------------------------------------------------------------

/// A parked long-poll request.  Dropping it (client gone) unparks it.
pub struct PendingUpdate {
    id: u64,
    watermark: f64,
    arrival: f64,
    signal: Arc<Completion>,
    stream: Shared,
}

impl PendingUpdate {
    pub fn watermark(&self) -> f64 {
        self.watermark
    }

    pub fn arrival(&self) -> f64 {
        self.arrival
    }

    /// Records, if a publish has already resolved this request.
    pub fn try_take(&self) -> Option<Vec<UpdateRecord>> {
        self.signal.try_take()
    }

    pub async fn wait(&self) -> Vec<UpdateRecord> {
        self.signal.wait().await
    }

    /// Block the calling thread until resolved or `timeout` expires.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Vec<UpdateRecord>> {
        futures_lite::future::block_on(futures_lite::future::or(
            async { Some(self.wait().await) },
            async {
                async_io_mini::Timer::after(timeout).await;
                None
            },
        ))
    }
}

impl Drop for PendingUpdate {
    fn drop(&mut self) {
        let id = self.id;
        self.stream
            .lock(|cell| cell.borrow_mut().parked.retain(|p| p.id != id));
    }
}

impl core::fmt::Debug for PendingUpdate {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PendingUpdate")
            .field("id", &self.id)
            .field("watermark", &self.watermark)
            .field("arrival", &self.arrival)
            .finish()
    }
}
