//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter          | Implements | Connects to                 |
//! |------------------|------------|-----------------------------|
//! | `log_sink`       | EventSink  | `log` facade                |
//! | `settings_store` | ConfigPort | JSON document on disk       |
//! | `sim_motor`      | MotorPort  | In-memory bench motor       |
//!
//! The motor HAT transport lives in [`crate::drivers::motor_hat`].

pub mod log_sink;
pub mod settings_store;
pub mod sim_motor;
