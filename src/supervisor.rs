//! Fixed-cadence tick loop.
//!
//! The supervisor is the only owner of the [`Controller`] and of the
//! hardware, store and event-sink adapters.  Each tick:
//!
//! 1. drain queued [`AppCommand`](crate::app::commands::AppCommand)s,
//! 2. evaluate every door,
//! 3. publish the end-of-tick snapshot to the [`UpdateStream`].
//!
//! Deadlines advance by a fixed interval from the previous deadline, so a
//! slow tick does not shift every later one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::app::commands::CommandQueue;
use crate::app::ports::{ActuatorPort, Clock, EventSink, LastOpenStore, SensorPort};
use crate::app::service::Controller;
use crate::stream::UpdateStream;

/// Adapters owned by the tick thread.
pub struct SupervisorPorts<H, S, E, C> {
    pub hw: H,
    pub store: S,
    pub sink: E,
    pub clock: C,
}

pub struct Supervisor<H, S, E, C> {
    controller: Controller,
    ports: SupervisorPorts<H, S, E, C>,
    commands: CommandQueue,
    stream: UpdateStream,
    interval: Duration,
}

impl<H, S, E, C> Supervisor<H, S, E, C>
where
    H: SensorPort + ActuatorPort,
    S: LastOpenStore,
    E: EventSink,
    C: Clock,
{
    /// Publishes the controller's startup snapshot so the first clients
    /// have something to read before the first tick.
    pub fn new(
        controller: Controller,
        ports: SupervisorPorts<H, S, E, C>,
        commands: CommandQueue,
        stream: UpdateStream,
        interval: Duration,
    ) -> Self {
        stream.publish(controller.snapshot(ports.clock.now()));
        Self {
            controller,
            ports,
            commands,
            stream,
            interval,
        }
    }

    /// One tick.  Returns the number of long-poll requests resolved.
    pub fn run_tick(&mut self) -> usize {
        let now = self.ports.clock.now();
        let SupervisorPorts {
            hw, store, sink, ..
        } = &mut self.ports;

        while let Some(cmd) = self.commands.try_next() {
            self.controller.handle_command(cmd, hw, sink, now);
        }

        let snapshot = self.controller.tick(hw, store, sink, now);
        self.stream.publish(snapshot)
    }

    /// Tick at the configured interval until `stop` is set.
    pub fn run_until(&mut self, stop: &AtomicBool) {
        info!("supervisor running every {:?}", self.interval);
        let mut deadline = Instant::now();
        while !stop.load(Ordering::Relaxed) {
            self.run_tick();

            deadline += self.interval;
            let now = Instant::now();
            if let Some(wait) = deadline.checked_duration_since(now) {
                std::thread::sleep(wait);
            } else {
                warn!("tick overran by {:?}", now - deadline);
                deadline = now;
            }
        }
        info!("supervisor stopped after {} ticks", self.controller.tick_count());
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn ports(&self) -> &SupervisorPorts<H, S, E, C> {
        &self.ports
    }

    pub fn ports_mut(&mut self) -> &mut SupervisorPorts<H, S, E, C> {
        &mut self.ports
    }
}
