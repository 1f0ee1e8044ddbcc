//! Application core: domain logic, no direct I/O.
//!
//! The [`service::Controller`] joins the door state machines, the
//! notification dispatcher and the snapshot stream.  All interaction with
//! hardware, storage and transports happens through **port traits** in
//! [`ports`], so this layer runs against mocks in tests.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
