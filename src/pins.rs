//! PCA9685 channel assignments for the DC motor HAT.
//!
//! Single source of truth: the motor driver references this module rather
//! than hard-coding channel numbers.  Each motor terminal uses one PWM
//! channel for speed and two logic channels feeding the H-bridge inputs.

/// PCA9685 channels driving one motor terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorChannels {
    /// Speed (duty cycle).
    pub pwm: u8,
    /// H-bridge input 1, HIGH for forward.
    pub in1: u8,
    /// H-bridge input 2, HIGH for reverse.
    pub in2: u8,
}

/// Number of motor terminals on the HAT.
pub const MOTOR_COUNT: u8 = 4;

/// M1..M4, indexed from zero.
const MOTORS: [MotorChannels; MOTOR_COUNT as usize] = [
    MotorChannels { pwm: 8, in1: 10, in2: 9 },
    MotorChannels { pwm: 13, in1: 11, in2: 12 },
    MotorChannels { pwm: 2, in1: 4, in2: 3 },
    MotorChannels { pwm: 7, in1: 5, in2: 6 },
];

/// Channels for motor `index` (0 = M1), or `None` past M4.
pub const fn motor_channels(index: u8) -> Option<MotorChannels> {
    if index < MOTOR_COUNT {
        Some(MOTORS[index as usize])
    } else {
        None
    }
}
