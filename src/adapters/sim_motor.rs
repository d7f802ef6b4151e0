//! In-memory motor for bench runs without a HAT attached.
//!
//! Tracks what a real driver would have been told and logs every
//! command, so the pulse train can be watched on the console.

use log::{debug, info};

use crate::app::ports::{MotorError, MotorPort};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimMotorState {
    Released,
    Engaged { level: u16 },
}

#[derive(Debug, Default)]
pub struct SimulatedMotor {
    started: bool,
    level: u16,
    engaged: bool,
}

impl SimulatedMotor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SimMotorState {
        if self.engaged {
            SimMotorState::Engaged { level: self.level }
        } else {
            SimMotorState::Released
        }
    }

    fn ensure_started(&self) -> Result<(), MotorError> {
        if self.started { Ok(()) } else { Err(MotorError::NotStarted) }
    }
}

impl MotorPort for SimulatedMotor {
    fn start(&mut self) -> Result<(), MotorError> {
        self.started = true;
        self.engaged = false;
        info!("SimulatedMotor: started");
        Ok(())
    }

    fn set_speed(&mut self, level: u16) -> Result<(), MotorError> {
        self.ensure_started()?;
        self.level = level;
        debug!("SimulatedMotor: level={}", level);
        Ok(())
    }

    fn engage(&mut self) -> Result<(), MotorError> {
        self.ensure_started()?;
        self.engaged = true;
        debug!("SimulatedMotor: engaged @ {}", self.level);
        Ok(())
    }

    fn release(&mut self) -> Result<(), MotorError> {
        self.ensure_started()?;
        self.engaged = false;
        debug!("SimulatedMotor: released");
        Ok(())
    }
}
