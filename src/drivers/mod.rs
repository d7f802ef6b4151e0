//! Motor driver transports and their startup binding.

pub mod hw_init;
pub mod motor_hat;
