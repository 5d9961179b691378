// High-level motor driver for the PicoBorg Reverse
//
// Wraps the board with the front-end contract: every action is announced
// as a ControllerMessage to subscribers and failures are reported the same
// way before being returned.

use std::path::Path;

use embedded_hal::i2c::I2c;
use linux_embedded_hal::I2cdev;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use super::board::{BoardError, PicoBorgRev};
use super::protocol::Motor;
use crate::bus::{self, BusError, SimulatedBoard};
use crate::messages::{BoardStatus, ControllerMessage};

/// Errors from the motor driver
#[derive(Debug, thiserror::Error)]
pub enum DriverError<E> {
    #[error("PicoBorgRev is not initialized")]
    NotInitialized,

    #[error("{0}")]
    Board(BoardError<E>),
}

impl<E> From<BoardError<E>> for DriverError<E> {
    fn from(e: BoardError<E>) -> Self {
        DriverError::Board(e)
    }
}

pub type Result<T, E> = std::result::Result<T, DriverError<E>>;

/// Motor driver for one PicoBorg Reverse
pub struct MotorDriver<I2C: I2c> {
    board: PicoBorgRev<I2C>,
    listeners: Vec<UnboundedSender<ControllerMessage>>,
    enabled: bool,
    // set once this driver has commanded the motors
    driven: bool,
}

impl MotorDriver<I2cdev> {
    /// Open `bus_path` (or the first bus the system lists) and attach to the board at `address`
    pub fn open(bus_path: Option<&Path>, address: u8) -> std::result::Result<Self, BusError> {
        let path = match bus_path {
            Some(path) => path.to_path_buf(),
            None => bus::first_bus()?,
        };
        let i2c = bus::open(&path)?;
        Ok(Self::new(PicoBorgRev::with_address(i2c, address)))
    }
}

impl MotorDriver<SimulatedBoard> {
    /// Attach to a fresh simulated board at `address`
    pub fn simulated(address: u8) -> Self {
        let sim = SimulatedBoard::new().with_address(address);
        Self::new(PicoBorgRev::with_address(sim, address))
    }
}

impl<I2C: I2c> MotorDriver<I2C> {
    pub fn new(board: PicoBorgRev<I2C>) -> Self {
        Self {
            board,
            listeners: Vec::new(),
            enabled: false,
            driven: false,
        }
    }

    /// Receive every message this driver emits from now on
    pub fn subscribe(&mut self) -> UnboundedReceiver<ControllerMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.push(tx);
        rx
    }

    fn emit(&mut self, message: impl Into<String>) {
        let message = ControllerMessage::new(message);
        debug!("Controller message: {}", message);
        // drop listeners whose receiver is gone
        self.listeners.retain(|tx| tx.send(message.clone()).is_ok());
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Direct access to the board for features without a message contract
    pub fn board(&mut self) -> &mut PicoBorgRev<I2C> {
        &mut self.board
    }

    fn ensure_enabled(&self) -> Result<(), I2C::Error> {
        if self.enabled {
            Ok(())
        } else {
            Err(DriverError::NotInitialized)
        }
    }

    /// Check the board answers as a PicoBorg Reverse and enable the driver
    pub fn initialize(&mut self) -> Result<(), I2C::Error> {
        info!(
            "Initializing PicoBorgRev at 0x{:02X}",
            self.board.address()
        );
        self.emit("Initializing PicoBorgRev");

        match self.board.probe() {
            Ok(()) => {
                self.enabled = true;
                info!("PicoBorgRev successfully initialized");
                self.emit("PicoBorgRev successfully initialized");
                Ok(())
            }
            Err(e) => {
                self.enabled = false;
                warn!("PicoBorgRev failed to initialize: {}", e);
                self.emit("PicoBorgRev failed to initialize");
                Err(e.into())
            }
        }
    }

    fn set_power(&mut self, motor: Motor, power: f32) -> Result<(), I2C::Error> {
        self.emit(format!("Setting {} Power Value: {}", motor.label(), power));
        let result = self
            .ensure_enabled()
            .and_then(|()| self.board.set_power(motor, power).map_err(Into::into));
        if result.is_ok() {
            self.driven = true;
        }
        if let Err(e) = &result {
            warn!("Error setting {} power: {}", motor.label(), e);
            self.emit(format!("Error setting {} Power", motor.label().replace(' ', "")));
        }
        result
    }

    fn read_power(&mut self, motor: Motor) -> Result<f32, I2C::Error> {
        self.emit(format!("Reading {}", motor.label()));
        let result = self.ensure_enabled().and_then(|()| {
            let power = match motor {
                Motor::Two => self.board.motor2()?,
                _ => self.board.motor1()?,
            };
            Ok(power)
        });
        match &result {
            Ok(power) => self.emit(format!("{} Value: {}", motor.label(), power)),
            Err(e) => {
                warn!("Error reading {}: {}", motor.label(), e);
                self.emit(format!("Error reading {}", motor.label()));
            }
        }
        result
    }

    /// Set motor 1 power in [-1.0, 1.0]
    pub fn set_motor1(&mut self, power: f32) -> Result<(), I2C::Error> {
        self.set_power(Motor::One, power)
    }

    /// Set motor 2 power in [-1.0, 1.0]
    pub fn set_motor2(&mut self, power: f32) -> Result<(), I2C::Error> {
        self.set_power(Motor::Two, power)
    }

    pub fn motor1(&mut self) -> Result<f32, I2C::Error> {
        self.read_power(Motor::One)
    }

    pub fn motor2(&mut self) -> Result<f32, I2C::Error> {
        self.read_power(Motor::Two)
    }

    /// Switch both motors off
    pub fn all_stop(&mut self) -> Result<(), I2C::Error> {
        info!("Stopping all motors");
        self.emit("Stopping all motors");
        let result = self
            .ensure_enabled()
            .and_then(|()| self.board.motors_off().map_err(Into::into));
        if result.is_ok() {
            self.driven = true;
        }
        if let Err(e) = &result {
            warn!("Failed to stop motors: {}", e);
            self.emit("Error stopping motors");
        }
        result
    }

    /// Read every status value the board reports
    pub fn status(&mut self) -> Result<BoardStatus, I2C::Error> {
        self.ensure_enabled()?;
        let board = &mut self.board;
        Ok(BoardStatus {
            address: board.address(),
            motor1: board.motor1()?,
            motor2: board.motor2()?,
            led: board.led()?,
            epo_tripped: board.epo_tripped()?,
            epo_ignored: board.epo_ignored()?,
            drive_fault: board.drive_fault()?,
            comms_failsafe: board.comms_failsafe()?,
            encoder_mode: board.encoder_mode()?,
            encoder_moving: board.encoder_moving()?,
            encoder_speed: board.encoder_speed()?,
        })
    }
}

impl<I2C: I2c> Drop for MotorDriver<I2C> {
    fn drop(&mut self) {
        // Only stop motors this driver was driving; a read-only session leaves them alone
        if !(self.enabled && self.driven) {
            return;
        }
        if let Err(e) = self.board.motors_off() {
            warn!("Failed to stop motors on drop: {}", e);
        }
        self.enabled = false;
    }
}
