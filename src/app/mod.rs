//! Application core — pump control domain logic, no direct I/O.
//!
//! Mode tracking, the drip pulsing task and command handling live here.
//! All interaction with hardware and storage happens through **port
//! traits** defined in [`ports`], keeping this layer fully testable
//! without a motor attached.

pub mod commands;
pub mod events;
pub mod mode;
pub mod ports;
pub mod pulse;
pub mod service;
