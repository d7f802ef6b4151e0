//! Cold brew dripper pump control.
//!
//! Exposes the pump control core ([`app`]), its adapters and the motor HAT
//! driver for the bench console binary and for integration testing.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod drivers;
pub mod pins;

mod error;

pub use app::mode::Mode;
pub use app::service::{PumpController, Snapshot};
pub use config::Settings;
pub use error::{Error, Result};
