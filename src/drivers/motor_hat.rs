//! DC motor HAT driver (PCA9685 PWM + dual H-bridge).
//!
//! Generic over any [`embedded_hal::i2c::I2c`] bus and [`DelayNs`] source,
//! so the same driver runs on a Linux I2C device or a mock bus in tests.
//!
//! ## Speed mapping
//!
//! Levels 0–255 map onto the 12-bit PCA9685 duty (`level * 16`).  The
//! H-bridge inputs are driven as fully-on / fully-off PWM channels.
//!
//! Only the PWM chip is initialised by [`MotorPort::start`]; the servo side
//! of the board is left alone.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Error as _, I2c};
use log::{debug, info};

use crate::app::ports::{MotorError, MotorPort};
use crate::config::{MAX_SPEED_LEVEL, MotorHatConfig};
use crate::pins::{self, MotorChannels};

// ── PCA9685 registers ─────────────────────────────────────────

const MODE1: u8 = 0x00;
const MODE2: u8 = 0x01;
const LED0_ON_L: u8 = 0x06;
const ALL_LED_ON_L: u8 = 0xFA;
const PRESCALE: u8 = 0xFE;

const MODE1_ALLCALL: u8 = 0x01;
const MODE1_SLEEP: u8 = 0x10;
const MODE1_RESTART: u8 = 0x80;
const MODE2_OUTDRV: u8 = 0x04;

/// Full-on / full-off flag in the ON_H / OFF_H registers.
const FULL: u16 = 4096;

const OSC_HZ: f64 = 25_000_000.0;
const OSC_SETTLE_MS: u32 = 5;

/// Prescaler value for `freq_hz`, clamped to the chip's 3..=255 range.
pub fn prescale_for(freq_hz: u16) -> u8 {
    let raw = OSC_HZ / 4096.0 / f64::from(freq_hz.max(1)) - 1.0;
    (raw + 0.5).floor().clamp(3.0, 255.0) as u8
}

/// One motor terminal on a PCA9685 motor HAT.
pub struct MotorHat<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
    channels: MotorChannels,
    pwm_frequency_hz: u16,
    started: bool,
}

impl<I2C: I2c, D: DelayNs> MotorHat<I2C, D> {
    /// Bind to the terminal named in `config`.  Fails for a motor index
    /// past M4.
    pub fn new(i2c: I2C, delay: D, config: &MotorHatConfig) -> Result<Self, MotorError> {
        let channels = pins::motor_channels(config.motor)
            .ok_or(MotorError::Unavailable("motor index must be 0-3"))?;
        Ok(Self {
            i2c,
            delay,
            address: config.i2c_address,
            channels,
            pwm_frequency_hz: config.pwm_frequency_hz,
            started: false,
        })
    }

    /// Give the bus and delay back.
    pub fn free(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), MotorError> {
        self.i2c
            .write(self.address, &[reg, value])
            .map_err(|e| MotorError::Bus(e.kind()))
    }

    fn read_reg(&mut self, reg: u8) -> Result<u8, MotorError> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(self.address, &[reg], &mut buf)
            .map_err(|e| MotorError::Bus(e.kind()))?;
        Ok(buf[0])
    }

    fn write_pwm_regs(&mut self, base: u8, on: u16, off: u16) -> Result<(), MotorError> {
        self.write_reg(base, (on & 0xFF) as u8)?;
        self.write_reg(base + 1, (on >> 8) as u8)?;
        self.write_reg(base + 2, (off & 0xFF) as u8)?;
        self.write_reg(base + 3, (off >> 8) as u8)
    }

    fn set_pwm(&mut self, channel: u8, on: u16, off: u16) -> Result<(), MotorError> {
        self.write_pwm_regs(LED0_ON_L + 4 * channel, on, off)
    }

    fn set_pin(&mut self, channel: u8, high: bool) -> Result<(), MotorError> {
        if high {
            self.set_pwm(channel, FULL, 0)
        } else {
            self.set_pwm(channel, 0, FULL)
        }
    }

    fn set_frequency(&mut self) -> Result<(), MotorError> {
        let prescale = prescale_for(self.pwm_frequency_hz);
        let old_mode = self.read_reg(MODE1)?;
        self.write_reg(MODE1, (old_mode & 0x7F) | MODE1_SLEEP)?;
        self.write_reg(PRESCALE, prescale)?;
        self.write_reg(MODE1, old_mode)?;
        self.delay.delay_ms(OSC_SETTLE_MS);
        self.write_reg(MODE1, old_mode | MODE1_RESTART)?;
        debug!("MotorHat: {} Hz (prescale={})", self.pwm_frequency_hz, prescale);
        Ok(())
    }

    fn ensure_started(&self) -> Result<(), MotorError> {
        if self.started { Ok(()) } else { Err(MotorError::NotStarted) }
    }
}

impl<I2C, D> MotorPort for MotorHat<I2C, D>
where
    I2C: I2c + Send,
    D: DelayNs + Send,
{
    fn start(&mut self) -> Result<(), MotorError> {
        self.started = false;

        self.write_pwm_regs(ALL_LED_ON_L, 0, 0)?;
        self.write_reg(MODE2, MODE2_OUTDRV)?;
        self.write_reg(MODE1, MODE1_ALLCALL)?;
        self.delay.delay_ms(OSC_SETTLE_MS);

        let mode1 = self.read_reg(MODE1)? & !MODE1_SLEEP;
        self.write_reg(MODE1, mode1)?;
        self.delay.delay_ms(OSC_SETTLE_MS);

        self.set_frequency()?;
        self.started = true;
        self.release()?;
        info!("MotorHat: started at 0x{:02x}, pwm ch{}", self.address, self.channels.pwm);
        Ok(())
    }

    fn set_speed(&mut self, level: u16) -> Result<(), MotorError> {
        self.ensure_started()?;
        let duty = level.min(MAX_SPEED_LEVEL) * 16;
        self.set_pwm(self.channels.pwm, 0, duty)
    }

    fn engage(&mut self) -> Result<(), MotorError> {
        self.ensure_started()?;
        self.set_pin(self.channels.in2, false)?;
        self.set_pin(self.channels.in1, true)
    }

    fn release(&mut self) -> Result<(), MotorError> {
        self.ensure_started()?;
        self.set_pin(self.channels.in1, false)?;
        self.set_pin(self.channels.in2, false)
    }
}
