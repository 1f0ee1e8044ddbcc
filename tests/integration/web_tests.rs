//! Router → command queue → supervisor → update stream, end to end.

use std::sync::Arc;
use std::time::Duration;

use doorwatch::adapters::store::MemoryStore;
use doorwatch::app::commands::{AppCommand, CommandQueue};
use doorwatch::app::service::Controller;
use doorwatch::config::ControllerConfig;
use doorwatch::notify::{NotificationDispatcher, Outbox};
use doorwatch::policy::AlertPolicy;
use doorwatch::stream::UpdateStream;
use doorwatch::supervisor::{Supervisor, SupervisorPorts};
use doorwatch::web::{Response, Router, WebContext};

use crate::mock_hw::{MockClock, MockHw, OPEN, RecordingSink, T0, two_door_config};

type Sup = Supervisor<MockHw, MemoryStore, RecordingSink, MockClock>;

struct Site {
    sup: Sup,
    ctx: WebContext,
    router: Router,
    clock: MockClock,
    commands: CommandQueue,
    _dir: tempfile::TempDir,
}

impl Site {
    fn with(cfg: ControllerConfig) -> Self {
        let clock = MockClock::at(T0);
        let mut hw = MockHw::new();
        let mut store = MemoryStore::new();
        let policy = AlertPolicy::from_config(&cfg.alerts).unwrap();
        let dispatcher = NotificationDispatcher::new(policy, cfg.alerts.channel, Outbox::new());
        let ctl = Controller::new(&cfg, dispatcher, &mut hw, &mut store, T0);

        let commands = CommandQueue::new();
        let stream = UpdateStream::new();
        let sup = Supervisor::new(
            ctl,
            SupervisorPorts {
                hw,
                store,
                sink: RecordingSink::new(),
                clock: clock.clone(),
            },
            commands.clone(),
            stream.clone(),
            Duration::from_millis(1000),
        );

        let dir = tempfile::tempdir().unwrap();
        let ctx = WebContext::new(
            stream,
            commands.clone(),
            Arc::new(clock.clone()),
            &cfg.site,
            dir.path().join("doorwatch.log"),
        )
        .with_uptime_file(dir.path().join("uptime"));

        Self {
            sup,
            ctx,
            router: Router::new(),
            clock,
            commands,
            _dir: dir,
        }
    }

    fn new() -> Self {
        Self::with(two_door_config())
    }

    fn get(&self, target: &str) -> Response {
        self.router.handle_target(&self.ctx, target)
    }

    fn set_sensor(&mut self, door_id: &str, raw: u8) {
        self.sup.ports_mut().hw.set(door_id, raw);
    }

    fn tick_at(&mut self, t: f64) -> usize {
        self.clock.set(t);
        self.sup.run_tick()
    }

    fn dir(&self) -> &std::path::Path {
        self._dir.path()
    }
}

// ── cfg / upd ─────────────────────────────────────────────────

#[test]
fn config_lists_every_door() {
    let site = Site::new();
    let resp = site.get("/cfg");
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.body(),
        format!(r#"[["left","Left","closed",{T0:?}],["right","Right","closed",{T0:?}]]"#)
    );
}

#[test]
fn update_answers_immediately_when_newer_records_exist() {
    let site = Site::new();
    let resp = site.get("/upd?lastupdate=0");
    let Response::Json(body) = resp else {
        panic!("expected json");
    };
    let v: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(v["timestamp"], T0 as i64);
    assert_eq!(v["update"].as_array().unwrap().len(), 2);
}

#[test]
fn long_poll_resolves_on_next_change() {
    let mut site = Site::new();
    let Response::Pending(poll) = site.get(&format!("/upd?lastupdate={}", T0 + 1.0)) else {
        panic!("expected a parked request");
    };
    assert_eq!(poll.watermark(), T0 + 1.0);

    // Nothing changed: still parked.
    assert_eq!(site.tick_at(T0 + 2.0), 0);
    let poll = poll.wait(&site.ctx, Duration::from_millis(10)).unwrap_err();

    site.set_sensor("left", OPEN);
    assert_eq!(site.tick_at(T0 + 3.0), 1);

    let resp = poll.wait(&site.ctx, Duration::from_secs(1)).unwrap();
    let v: serde_json::Value = serde_json::from_str(resp.body()).unwrap();
    assert_eq!(v["update"][0][0], "left");
    assert_eq!(v["update"][0][1], "opening");
    assert_eq!(v["update"][0][2], T0 + 3.0);
}

#[test]
fn long_poll_resolved_from_another_thread() {
    let mut site = Site::new();
    let Response::Pending(poll) = site.get(&format!("/upd?lastupdate={}&callback=cb", T0 + 1.0))
    else {
        panic!("expected a parked request");
    };

    site.set_sensor("right", OPEN);
    let Site { sup, ctx, clock, .. } = &mut site;
    std::thread::scope(|s| {
        let waiter = s.spawn(|| poll.wait(ctx, Duration::from_secs(5)));
        std::thread::sleep(Duration::from_millis(20));
        clock.set(T0 + 4.0);
        sup.run_tick();
        let resp = waiter.join().unwrap().unwrap();
        assert!(resp.body().starts_with("cb({"), "{}", resp.body());
        assert!(resp.body().contains(r#"["right","opening""#));
    });
}

#[test]
fn abandoned_long_poll_is_unparked() {
    let site = Site::new();
    let resp = site.get(&format!("/upd?lastupdate={}", T0 + 100.0));
    assert!(matches!(resp, Response::Pending(_)));
    drop(resp);
    let resp = site.get(&format!("/upd?lastupdate={}", T0 + 100.0));
    assert!(matches!(resp, Response::Pending(_)));
    drop(resp);
    // Nothing left to resolve.
    let mut site = site;
    site.set_sensor("left", OPEN);
    assert_eq!(site.tick_at(T0 + 200.0), 0);
}

#[test]
fn bad_callback_rejected() {
    let site = Site::new();
    let resp = site.get("/upd?lastupdate=0&callback=alert(1)");
    assert_eq!(resp.status(), 400);
}

// ── clk / closeall / mot ──────────────────────────────────────

#[test]
fn click_reaches_relay_on_next_tick() {
    let mut site = Site::new();
    let resp = site.get("/clk?id=left");
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.body(), "");
    assert_eq!(site.commands.len(), 1);

    site.tick_at(T0 + 1.0);
    assert!(site.commands.is_empty());
    assert_eq!(site.sup.ports().hw.pulses, vec!["left".to_string()]);
}

#[test]
fn click_validation() {
    let mut site = Site::new();
    assert_eq!(site.get("/clk").status(), 400);
    assert_eq!(site.get("/clk?id=shed").status(), 404);

    site.set_sensor("left", OPEN);
    site.tick_at(T0 + 1.0);
    let resp = site.get("/clk?id=left");
    assert_eq!(resp.status(), 409);
    assert_eq!(resp.body(), "Left is opening");
    assert!(site.commands.is_empty());
}

#[test]
fn clicks_are_rate_limited() {
    let mut cfg = two_door_config();
    cfg.site.click_burst = 2;
    let site = Site::with(cfg);
    assert_eq!(site.get("/clk?id=left").status(), 200, "fresh limiter accepts");

    let mut accepted = 1;
    let mut limited = false;
    for _ in 0..10 {
        match site.get("/clk?id=right").status() {
            200 => accepted += 1,
            429 => limited = true,
            other => panic!("unexpected status {other}"),
        }
    }
    assert!(limited, "a burst of clicks must hit the limiter");
    assert_eq!(site.commands.len(), accepted);
}

#[test]
fn close_all_when_everything_is_closed() {
    let site = Site::new();
    let resp = site.get("/closeall");
    assert_eq!(resp.body(), "All doors are closed.");
    assert!(site.commands.is_empty());
}

#[test]
fn close_all_pulses_open_doors() {
    let mut site = Site::new();
    site.set_sensor("left", OPEN);
    site.set_sensor("right", OPEN);
    site.tick_at(T0 + 1.0);
    site.tick_at(T0 + 11.0);
    site.set_sensor("right", 0);
    site.tick_at(T0 + 12.0);

    let resp = site.get("/closeall");
    assert_eq!(resp.body(), "Close All: Left; Right Closing or Opening");
    assert_eq!(site.commands.try_next(), Some(AppCommand::CloseAll));
    site.commands.submit(AppCommand::CloseAll).unwrap();

    site.tick_at(T0 + 13.0);
    assert_eq!(site.sup.ports().hw.pulses, vec!["left".to_string()]);
}

#[test]
fn motion_route_enqueues() {
    let mut site = Site::new();
    assert_eq!(site.get("/mot").status(), 200);
    site.tick_at(T0 + 1.0);
    assert!(site.sup.ports().sink.events.iter().any(|e| matches!(
        e,
        doorwatch::app::events::AppEvent::Motion { .. }
    )));
}

#[test]
fn full_queue_answers_503() {
    let site = Site::new();
    for _ in 0..doorwatch::app::commands::COMMAND_DEPTH {
        site.commands.submit(AppCommand::Motion).unwrap();
    }
    assert_eq!(site.get("/mot").status(), 503);
}

// ── upt / log / unknown ───────────────────────────────────────

#[test]
fn uptime_reads_uptime_file() {
    let site = Site::new();
    std::fs::write(site.dir().join("uptime"), "93784.51 180000.00\n").unwrap();
    let resp = site.get("/upt");
    let text: String = serde_json::from_str(resp.body()).unwrap();
    assert!(text.starts_with("Uptime: "), "{text}");
    assert!(text.contains("1 day, 2 hrs, 03:04"), "{text}");
}

#[test]
fn uptime_reports_missing_file() {
    let site = Site::new();
    let text: String = serde_json::from_str(site.get("/upt").body()).unwrap();
    assert!(text.starts_with("Uptime: Cannot open uptime file"), "{text}");
}

#[test]
fn log_tail_newest_first() {
    let site = Site::new();
    let lines: String = (1..=3).map(|i| format!("line {i} <x>\n")).collect();
    std::fs::write(site.dir().join("doorwatch.log"), lines).unwrap();

    let resp = site.get("/log");
    assert_eq!(resp.content_type(), "text/html");
    let body = resp.body();
    let third = body.find("line 3").unwrap();
    let first = body.find("line 1").unwrap();
    assert!(third < first);
    assert!(body.contains("&lt;x&gt;"));
}

#[test]
fn unknown_route_is_404() {
    let site = Site::new();
    assert_eq!(site.get("/garage").status(), 404);
}
