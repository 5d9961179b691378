// Motor control for the PicoBorg Reverse
//
// Provides:
// - The board's I2C command table and power/PWM conversions
// - Device access over any embedded-hal I2C bus
// - A message-emitting driver for front-ends

pub mod board;
mod driver;
pub mod protocol;

pub use board::{BoardError, PicoBorgRev};
pub use driver::{DriverError, MotorDriver};
pub use protocol::{Direction, Motor};
