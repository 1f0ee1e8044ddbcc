//! doorwatch: garage door monitor entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  GpioHardware      LogEventSink   FileLastOpenStore SystemClock│
//! │  (Sensor+Actuator) (EventSink)    (LastOpenStore)   (Clock)    │
//! │  http listener     NotifyWorker + LogTransport                 │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              Controller (pure logic)                   │    │
//! │  │  Door FSMs · AlertPolicy · Dispatcher                  │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Supervisor (tick thread) · UpdateStream · CommandQueue        │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Usage: `doorwatch [config.json] [debug] [port=N]`

use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use log::{LevelFilter, info, warn};

use doorwatch::adapters::hardware::GpioHardware;
use doorwatch::adapters::http;
use doorwatch::adapters::log_sink::LogEventSink;
use doorwatch::adapters::logger::FileLogger;
use doorwatch::adapters::sim::{SimDelay, sim_door};
use doorwatch::adapters::store::FileLastOpenStore;
use doorwatch::adapters::time::SystemClock;
use doorwatch::adapters::transport::LogTransport;
use doorwatch::app::commands::CommandQueue;
use doorwatch::app::ports::Clock;
use doorwatch::app::service::Controller;
use doorwatch::config::ControllerConfig;
use doorwatch::notify::{NotificationDispatcher, NotifyWorker, Outbox};
use doorwatch::policy::AlertPolicy;
use doorwatch::stream::UpdateStream;
use doorwatch::supervisor::{Supervisor, SupervisorPorts};
use doorwatch::web::{Router, WebContext};

const DEFAULT_CONFIG: &str = "config.json";

struct Args {
    config: PathBuf,
    debug: bool,
    port: Option<u16>,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        config: PathBuf::from(DEFAULT_CONFIG),
        debug: false,
        port: None,
    };
    for arg in std::env::args().skip(1) {
        if arg == "debug" {
            args.debug = true;
        } else if let Some(port) = arg.strip_prefix("port=") {
            args.port = Some(port.parse().with_context(|| format!("bad port {port:?}"))?);
        } else {
            args.config = PathBuf::from(arg);
        }
    }
    Ok(args)
}

fn main() -> Result<()> {
    // ── 1. Configuration ──────────────────────────────────────
    let args = parse_args()?;
    let mut config = ControllerConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    config.debug |= args.debug;
    if let Some(port) = args.port {
        config.site.port = port;
    }

    // ── 2. Logging ────────────────────────────────────────────
    let level: LevelFilter = config
        .logging
        .level
        .parse()
        .context("logging.level")?;
    let logger = if config.debug {
        FileLogger::stderr(level)
    } else {
        FileLogger::open(&config.logging.file, level)
            .with_context(|| format!("opening log file {}", config.logging.file.display()))?
    };
    logger.install().context("installing logger")?;

    info!(
        "<--- doorwatch v{} starting (port={} debug={}) --->",
        env!("CARGO_PKG_VERSION"),
        config.site.port,
        config.debug
    );

    // ── 3. Hardware ───────────────────────────────────────────
    if !config.debug {
        bail!("no GPIO backend is available on this host; run with `debug` for simulated doors");
    }
    if config.motion_pin.is_some() {
        info!("motion sensor ignored with simulated doors; use the mot route");
    }
    let pins = config
        .doors
        .iter()
        .map(|d| sim_door(&d.id, d.closed_sense_value))
        .collect();
    let mut hw = GpioHardware::new(pins, SimDelay, config.timing.relay_pulse_ms);

    // ── 4. Last-open store ────────────────────────────────────
    let mut store = match FileLastOpenStore::open(&config.storage.last_open_file) {
        Ok(s) => s,
        Err(e) => {
            warn!(
                "last-open store {} unreadable ({e}), starting empty",
                config.storage.last_open_file.display()
            );
            FileLastOpenStore::empty(&config.storage.last_open_file)
        }
    };

    // ── 5. Notifications ──────────────────────────────────────
    let outbox = Outbox::new();
    let policy = AlertPolicy::from_config(&config.alerts).context("alert policy")?;
    let channel = config.alerts.channel.filter(|_| config.alerts.enabled);
    let dispatcher = NotificationDispatcher::new(policy, channel, outbox.clone());
    if let Some(kind) = channel {
        let worker = NotifyWorker::new(
            LogTransport::new(kind),
            outbox.clone(),
            Duration::from_millis(u64::from(config.alerts.send_timeout_ms)),
        );
        worker.spawn().context("spawning notify worker")?;
        info!("alerts go out via {kind}");
    }

    // ── 6. Controller ─────────────────────────────────────────
    let clock = SystemClock;
    let mut sink = LogEventSink::new();
    let mut controller = Controller::new(&config, dispatcher, &mut hw, &mut store, clock.now());
    controller.start(&mut sink, clock.now());

    // ── 7. Web surface ────────────────────────────────────────
    let commands = CommandQueue::new();
    let stream = UpdateStream::new();
    let ctx = Arc::new(WebContext::new(
        stream.clone(),
        commands.clone(),
        Arc::new(SystemClock),
        &config.site,
        config.logging.file.clone(),
    ));
    // Publishes the startup snapshot, so the listener never sees an empty stream.
    let mut supervisor = Supervisor::new(
        controller,
        SupervisorPorts {
            hw,
            store,
            sink,
            clock,
        },
        commands,
        stream,
        Duration::from_millis(u64::from(config.control_loop_interval_ms)),
    );
    let listener = TcpListener::bind(("0.0.0.0", config.site.port))
        .with_context(|| format!("binding port {}", config.site.port))?;
    std::thread::Builder::new()
        .name("http".into())
        .spawn(move || {
            if let Err(e) = http::serve(listener, ctx, Arc::new(Router::new())) {
                log::error!("http server stopped: {e}");
            }
        })
        .context("spawning http thread")?;

    // ── 8. Tick loop ──────────────────────────────────────────
    let stop = AtomicBool::new(false);
    supervisor.run_until(&stop);
    Ok(())
}
