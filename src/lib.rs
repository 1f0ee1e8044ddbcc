//! doorwatch library.
//!
//! Garage door monitoring: per-door state machines driven by position
//! sensors, relay actuation, policy-gated operator notifications and a
//! long-poll update stream for web clients.  Hardware, storage and
//! transports sit behind the port traits in [`app::ports`].

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod door;
pub mod error;
pub mod fsm;
pub mod notify;
pub mod policy;
pub mod stream;
pub mod supervisor;
pub mod timekeeper;
pub mod web;
