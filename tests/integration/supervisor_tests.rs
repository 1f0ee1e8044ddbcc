//! Tick loop, persistence across restarts and the notify pipeline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use doorwatch::adapters::store::FileLastOpenStore;
use doorwatch::app::commands::CommandQueue;
use doorwatch::app::ports::{LastOpenStore, NotifyTransport};
use doorwatch::app::service::Controller;
use doorwatch::config::{ChannelKind, ControllerConfig};
use doorwatch::error::NotifyError;
use doorwatch::fsm::DoorState;
use doorwatch::notify::{NotificationDispatcher, NotifyWorker, OutboundMessage, Outbox};
use doorwatch::policy::AlertPolicy;
use doorwatch::stream::UpdateStream;
use doorwatch::supervisor::{Supervisor, SupervisorPorts};

use crate::mock_hw::{CLOSED, MockClock, MockHw, OPEN, RecordingSink, T0, two_door_config};

fn dispatcher(cfg: &ControllerConfig, outbox: &Outbox) -> NotificationDispatcher {
    let policy = AlertPolicy::from_config(&cfg.alerts).unwrap();
    NotificationDispatcher::new(policy, cfg.alerts.channel, outbox.clone())
}

#[test]
fn startup_snapshot_published_on_construction() {
    let cfg = two_door_config();
    let mut hw = MockHw::new();
    hw.set("right", OPEN);
    let mut store = doorwatch::adapters::store::MemoryStore::new();
    let ctl = Controller::new(&cfg, dispatcher(&cfg, &Outbox::new()), &mut hw, &mut store, T0);
    let stream = UpdateStream::new();
    let sup = Supervisor::new(
        ctl,
        SupervisorPorts {
            hw,
            store,
            sink: RecordingSink::new(),
            clock: MockClock::at(T0),
        },
        CommandQueue::new(),
        stream.clone(),
        Duration::from_millis(1000),
    );

    assert_eq!(sup.controller().tick_count(), 0);
    let snap = stream.latest();
    assert_eq!(snap.updates_since(0.0).len(), 2);
    assert_eq!(snap.doors[1].state, DoorState::Open);
}

#[test]
fn run_until_ticks_until_stopped() {
    let mut cfg = two_door_config();
    cfg.control_loop_interval_ms = 100;
    let clock = MockClock::at(T0);
    let mut hw = MockHw::new();
    let mut store = doorwatch::adapters::store::MemoryStore::new();
    let ctl = Controller::new(&cfg, dispatcher(&cfg, &Outbox::new()), &mut hw, &mut store, T0);
    let stream = UpdateStream::new();
    let mut sup = Supervisor::new(
        ctl,
        SupervisorPorts {
            hw,
            store,
            sink: RecordingSink::new(),
            clock,
        },
        CommandQueue::new(),
        stream.clone(),
        Duration::from_millis(u64::from(cfg.control_loop_interval_ms)),
    );

    let stop = AtomicBool::new(false);
    std::thread::scope(|s| {
        s.spawn(|| {
            std::thread::sleep(Duration::from_millis(350));
            stop.store(true, Ordering::Relaxed);
        });
        sup.run_until(&stop);
    });

    let ticks = sup.controller().tick_count();
    assert!((2..=6).contains(&ticks), "ticked {ticks} times");
    assert_eq!(stream.latest().doors.len(), 2);
}

#[test]
fn last_open_time_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("garageCache");
    let cfg = two_door_config();

    {
        let mut hw = MockHw::new();
        let mut store = FileLastOpenStore::open(&path).unwrap();
        let mut sink = RecordingSink::new();
        let mut ctl = Controller::new(&cfg, dispatcher(&cfg, &Outbox::new()), &mut hw, &mut store, T0);

        hw.set("left", OPEN);
        ctl.tick(&mut hw, &mut store, &mut sink, T0 + 1.0);
        ctl.tick(&mut hw, &mut store, &mut sink, T0 + 11.0);
        hw.set("left", CLOSED);
        ctl.tick(&mut hw, &mut store, &mut sink, T0 + 20.0);
        ctl.tick(&mut hw, &mut store, &mut sink, T0 + 30.0);
        assert_eq!(ctl.door("left").unwrap().state(), DoorState::Closed);
    }

    let mut store = FileLastOpenStore::open(&path).unwrap();
    assert_eq!(store.get_last_open_time("left").unwrap(), Some(T0 + 30.0));
    assert_eq!(store.get_last_open_time("right").unwrap(), Some(T0));

    let mut hw = MockHw::new();
    let ctl = Controller::new(&cfg, dispatcher(&cfg, &Outbox::new()), &mut hw, &mut store, T0 + 500.0);
    assert_eq!(ctl.door("left").unwrap().time_since_last_open(), T0 + 30.0);
}

#[test]
fn corrupt_store_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("garageCache");
    std::fs::write(&path, [0xff, 0xff, 0xff]).unwrap();
    assert!(FileLastOpenStore::open(&path).is_err());
}

// ── Notify pipeline ───────────────────────────────────────────

#[derive(Clone, Default)]
struct Recorder {
    sent: Arc<Mutex<Vec<OutboundMessage>>>,
}

impl NotifyTransport for Recorder {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    async fn send(&mut self, msg: &OutboundMessage) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(msg.clone());
        Ok(())
    }
}

#[test]
fn notices_reach_the_transport() {
    let mut cfg = two_door_config();
    cfg.alerts.channel = Some(ChannelKind::Email);
    let outbox = Outbox::new();
    let mut hw = MockHw::new();
    let mut store = doorwatch::adapters::store::MemoryStore::new();
    let mut sink = RecordingSink::new();
    let mut ctl = Controller::new(&cfg, dispatcher(&cfg, &outbox), &mut hw, &mut store, T0);

    ctl.start(&mut sink, T0);
    hw.set("right", OPEN);
    ctl.tick(&mut hw, &mut store, &mut sink, T0 + 1.0);
    ctl.tick(&mut hw, &mut store, &mut sink, T0 + 11.0);
    ctl.tick(&mut hw, &mut store, &mut sink, T0 + 41.0);

    let recorder = Recorder::default();
    let mut worker = NotifyWorker::new(recorder.clone(), outbox, Duration::from_secs(1));
    while let Some(result) = worker.deliver_next_blocking() {
        assert_eq!(result, Ok(()));
    }

    let sent = recorder.sent.lock().unwrap();
    assert_eq!(sent.len(), 2);
    assert!(sent[0].body.starts_with("Initial state of Left:closed, Right:closed "));
    assert!(sent[1].body.starts_with("Right is open "));
    assert!(sent.iter().all(|m| m.channel == ChannelKind::Email));
}

#[test]
fn spawned_worker_drains_outbox() {
    let outbox = Outbox::new();
    let recorder = Recorder::default();
    NotifyWorker::new(recorder.clone(), outbox.clone(), Duration::from_secs(1))
        .spawn()
        .unwrap();

    outbox
        .try_send(OutboundMessage {
            channel: ChannelKind::Email,
            title: "Garage".into(),
            body: "Left is open".into(),
        })
        .unwrap();

    for _ in 0..100 {
        if !recorder.sent.lock().unwrap().is_empty() {
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(recorder.sent.lock().unwrap().len(), 1);
}
