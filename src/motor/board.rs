// PicoBorg Reverse device access over any embedded-hal I2C bus
//
// Each call is one short transaction against the board's command table.
// Nothing is cached and nothing is retried.

use embedded_hal::i2c::I2c;
use tracing::debug;

use super::protocol::{
    self, BOARD_ID, Command, DEFAULT_ADDRESS, Direction, I2C_MAX_LEN, MAX_ADDRESS, MIN_ADDRESS,
    Motor, PWM_MAX, VALUE_OFF, VALUE_ON,
};

/// Errors from talking to the board
#[derive(Debug, thiserror::Error)]
pub enum BoardError<E> {
    #[error("I2C bus error: {0:?}")]
    Bus(E),

    #[error("Unexpected reply to {command:?}: {reply:02X?}")]
    UnexpectedReply {
        command: Command,
        reply: [u8; I2C_MAX_LEN],
    },

    #[error("Device at 0x{address:02X} is not a PicoBorg Reverse (id 0x{id:02X})")]
    NotPicoBorg { address: u8, id: u8 },

    #[error("Address 0x{0:02X} is outside 0x03..=0x77")]
    InvalidAddress(u8),

    #[error("Power value {0} is not a number")]
    InvalidPower(f32),
}

pub type Result<T, E> = std::result::Result<T, BoardError<E>>;

/// A PicoBorg Reverse at a fixed address on an I2C bus
pub struct PicoBorgRev<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> PicoBorgRev<I2C> {
    /// Attach to a board at the factory address
    pub fn new(i2c: I2C) -> Self {
        Self::with_address(i2c, DEFAULT_ADDRESS)
    }

    pub fn with_address(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Give the bus back
    pub fn release(self) -> I2C {
        self.i2c
    }

    /// Send a command with its parameters in one write
    fn raw_write(&mut self, command: Command, params: &[u8]) -> Result<(), I2C::Error> {
        let mut buf = [0u8; I2C_MAX_LEN];
        buf[0] = command as u8;
        buf[1..=params.len()].copy_from_slice(params);
        debug!(
            "Write to 0x{:02X}: {:?} {:02X?}",
            self.address, command, params
        );
        self.i2c
            .write(self.address, &buf[..=params.len()])
            .map_err(BoardError::Bus)
    }

    /// Send a read command and collect the reply, checking the echoed command byte
    fn raw_read(&mut self, command: Command) -> Result<[u8; I2C_MAX_LEN], I2C::Error> {
        self.i2c
            .write(self.address, &[command as u8])
            .map_err(BoardError::Bus)?;

        let mut reply = [0u8; I2C_MAX_LEN];
        self.i2c
            .read(self.address, &mut reply)
            .map_err(BoardError::Bus)?;
        debug!("Read from 0x{:02X}: {:?} -> {:02X?}", self.address, command, reply);

        if reply[0] != command as u8 {
            return Err(BoardError::UnexpectedReply { command, reply });
        }
        Ok(reply)
    }

    fn read_flag(&mut self, command: Command) -> Result<bool, I2C::Error> {
        let reply = self.raw_read(command)?;
        Ok(reply[1] == VALUE_ON)
    }

    fn write_flag(&mut self, command: Command, on: bool) -> Result<(), I2C::Error> {
        self.raw_write(command, &[if on { VALUE_ON } else { VALUE_OFF }])
    }

    // === Identity ===

    /// Read the board identifier byte
    pub fn identify(&mut self) -> Result<u8, I2C::Error> {
        let reply = self.raw_read(Command::GetId)?;
        Ok(reply[1])
    }

    /// Check that the device at our address is a PicoBorg Reverse
    pub fn probe(&mut self) -> Result<(), I2C::Error> {
        let id = self.identify()?;
        if id != BOARD_ID {
            return Err(BoardError::NotPicoBorg {
                address: self.address,
                id,
            });
        }
        Ok(())
    }

    /// Store a new I2C address on the board and follow it
    ///
    /// The board keeps the new address across power cycles.
    pub fn set_address(&mut self, new_address: u8) -> Result<(), I2C::Error> {
        if !(MIN_ADDRESS..=MAX_ADDRESS).contains(&new_address) {
            return Err(BoardError::InvalidAddress(new_address));
        }
        self.raw_write(Command::SetI2cAddress, &[new_address])?;
        self.address = new_address;
        Ok(())
    }

    // === Motors ===

    /// Drive a motor at `power` in [-1.0, 1.0]; larger magnitudes saturate
    pub fn set_power(&mut self, motor: Motor, power: f32) -> Result<(), I2C::Error> {
        let (direction, pwm) =
            protocol::power_to_pwm(power).ok_or(BoardError::InvalidPower(power))?;
        self.raw_write(motor.set_command(direction), &[pwm])
    }

    fn read_power(&mut self, command: Command) -> Result<f32, I2C::Error> {
        let reply = self.raw_read(command)?;
        let direction = Direction::from_byte(reply[1])
            .ok_or(BoardError::UnexpectedReply { command, reply })?;
        Ok(protocol::pwm_to_power(direction, reply[2]))
    }

    pub fn set_motor1(&mut self, power: f32) -> Result<(), I2C::Error> {
        self.set_power(Motor::One, power)
    }

    pub fn set_motor2(&mut self, power: f32) -> Result<(), I2C::Error> {
        self.set_power(Motor::Two, power)
    }

    pub fn set_motors(&mut self, power: f32) -> Result<(), I2C::Error> {
        self.set_power(Motor::Both, power)
    }

    /// Read back motor 1's power
    pub fn motor1(&mut self) -> Result<f32, I2C::Error> {
        self.read_power(Command::GetB)
    }

    /// Read back motor 2's power
    pub fn motor2(&mut self) -> Result<f32, I2C::Error> {
        self.read_power(Command::GetA)
    }

    /// Switch all outputs off
    pub fn motors_off(&mut self) -> Result<(), I2C::Error> {
        self.raw_write(Command::AllOff, &[0])
    }

    // === LED and safety flags ===

    pub fn set_led(&mut self, on: bool) -> Result<(), I2C::Error> {
        self.write_flag(Command::SetLed, on)
    }

    pub fn led(&mut self) -> Result<bool, I2C::Error> {
        self.read_flag(Command::GetLed)
    }

    /// Clear a latched EPO once the switch is closed again
    pub fn reset_epo(&mut self) -> Result<(), I2C::Error> {
        self.raw_write(Command::ResetEpo, &[0])
    }

    /// True when the EPO has tripped and motors are held off
    pub fn epo_tripped(&mut self) -> Result<bool, I2C::Error> {
        self.read_flag(Command::GetEpo)
    }

    pub fn set_epo_ignore(&mut self, ignore: bool) -> Result<(), I2C::Error> {
        self.write_flag(Command::SetEpoIgnore, ignore)
    }

    pub fn epo_ignored(&mut self) -> Result<bool, I2C::Error> {
        self.read_flag(Command::GetEpoIgnore)
    }

    /// True when the drive reports a fault (short circuit, under voltage)
    pub fn drive_fault(&mut self) -> Result<bool, I2C::Error> {
        self.read_flag(Command::GetDriveFault)
    }

    /// Stop the motors if commands stop arriving for roughly 1/4 s
    pub fn set_comms_failsafe(&mut self, enabled: bool) -> Result<(), I2C::Error> {
        self.write_flag(Command::SetFailsafe, enabled)
    }

    pub fn comms_failsafe(&mut self) -> Result<bool, I2C::Error> {
        self.read_flag(Command::GetFailsafe)
    }

    // === Encoder mode ===

    /// Switch between speed mode (false) and encoder move mode (true)
    pub fn set_encoder_mode(&mut self, enabled: bool) -> Result<(), I2C::Error> {
        self.write_flag(Command::SetEncMode, enabled)
    }

    pub fn encoder_mode(&mut self) -> Result<bool, I2C::Error> {
        self.read_flag(Command::GetEncMode)
    }

    /// Move a motor by `counts` encoder ticks, negative for reverse
    pub fn encoder_move(&mut self, motor: Motor, counts: i32) -> Result<(), I2C::Error> {
        let (direction, bytes) = protocol::encoder_counts(counts);
        self.raw_write(motor.move_command(direction), &bytes)
    }

    pub fn encoder_move_motor1(&mut self, counts: i32) -> Result<(), I2C::Error> {
        self.encoder_move(Motor::One, counts)
    }

    pub fn encoder_move_motor2(&mut self, counts: i32) -> Result<(), I2C::Error> {
        self.encoder_move(Motor::Two, counts)
    }

    pub fn encoder_move_motors(&mut self, counts: i32) -> Result<(), I2C::Error> {
        self.encoder_move(Motor::Both, counts)
    }

    /// True while an encoder move is still running
    pub fn encoder_moving(&mut self) -> Result<bool, I2C::Error> {
        self.read_flag(Command::GetEncMoving)
    }

    /// Limit the PWM used for encoder moves, `power` in [0.0, 1.0]
    pub fn set_encoder_speed(&mut self, power: f32) -> Result<(), I2C::Error> {
        let (_, pwm) = protocol::power_to_pwm(power).ok_or(BoardError::InvalidPower(power))?;
        // negative limits make no sense here, treat as stopped
        let pwm = if power < 0.0 { 0 } else { pwm };
        self.raw_write(Command::SetEncSpeed, &[pwm])
    }

    pub fn encoder_speed(&mut self) -> Result<f32, I2C::Error> {
        let reply = self.raw_read(Command::GetEncSpeed)?;
        Ok(reply[1] as f32 / PWM_MAX as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::SimulatedBoard;

    fn board() -> (PicoBorgRev<SimulatedBoard>, SimulatedBoard) {
        let sim = SimulatedBoard::new();
        (PicoBorgRev::new(sim.clone()), sim)
    }

    #[test]
    fn test_set_motor_bytes() {
        let (mut pbr, sim) = board();
        pbr.set_motor1(0.5).unwrap();
        pbr.set_motor2(-1.0).unwrap();
        pbr.set_motors(3.0).unwrap();
        assert_eq!(
            sim.written(),
            vec![vec![6, 127], vec![4, 255], vec![15, 255]]
        );
    }

    #[test]
    fn test_motor_read_back() {
        let (mut pbr, _sim) = board();
        pbr.set_motor1(-0.2).unwrap();
        pbr.set_motor2(1.0).unwrap();
        assert!((pbr.motor1().unwrap() + 0.2).abs() < 0.01);
        assert_eq!(pbr.motor2().unwrap(), 1.0);
    }

    #[test]
    fn test_nan_power_rejected() {
        let (mut pbr, sim) = board();
        assert!(matches!(
            pbr.set_motor1(f32::NAN),
            Err(BoardError::InvalidPower(_))
        ));
        assert!(sim.written().is_empty());
    }

    #[test]
    fn test_motors_off() {
        let (mut pbr, sim) = board();
        pbr.set_motors(0.8).unwrap();
        pbr.motors_off().unwrap();
        assert_eq!(pbr.motor1().unwrap(), 0.0);
        assert_eq!(pbr.motor2().unwrap(), 0.0);
        assert_eq!(sim.written()[1], vec![9, 0]);
    }

    #[test]
    fn test_probe() {
        let (mut pbr, _sim) = board();
        assert_eq!(pbr.identify().unwrap(), BOARD_ID);
        pbr.probe().unwrap();
    }

    #[test]
    fn test_probe_wrong_id() {
        let sim = SimulatedBoard::new().with_id(0x42);
        let mut pbr = PicoBorgRev::new(sim);
        assert!(matches!(
            pbr.probe(),
            Err(BoardError::NotPicoBorg { address: 0x44, id: 0x42 })
        ));
    }

    #[test]
    fn test_wrong_address_is_bus_error() {
        let sim = SimulatedBoard::new();
        let mut pbr = PicoBorgRev::with_address(sim, 0x10);
        assert!(matches!(pbr.set_motor1(0.1), Err(BoardError::Bus(_))));
    }

    #[test]
    fn test_flags() {
        let (mut pbr, sim) = board();
        assert!(!pbr.led().unwrap());
        pbr.set_led(true).unwrap();
        assert!(pbr.led().unwrap());

        pbr.set_epo_ignore(true).unwrap();
        assert!(pbr.epo_ignored().unwrap());

        pbr.set_comms_failsafe(true).unwrap();
        assert!(pbr.comms_failsafe().unwrap());

        assert!(!pbr.drive_fault().unwrap());
        sim.trip_epo();
        assert!(pbr.epo_tripped().unwrap());
        pbr.reset_epo().unwrap();
        assert!(!pbr.epo_tripped().unwrap());
    }

    #[test]
    fn test_encoder_commands() {
        let (mut pbr, sim) = board();
        pbr.set_encoder_mode(true).unwrap();
        assert!(pbr.encoder_mode().unwrap());

        pbr.set_encoder_speed(0.5).unwrap();
        assert!((pbr.encoder_speed().unwrap() - 127.0 / 255.0).abs() < 1e-6);

        pbr.encoder_move_motor1(-300).unwrap();
        pbr.encoder_move_motor2(5).unwrap();
        pbr.encoder_move_motors(40_000).unwrap();
        assert!(pbr.encoder_moving().unwrap());

        let moves: Vec<Vec<u8>> = sim
            .written()
            .into_iter()
            .filter(|w| w.len() == 3)
            .collect();
        assert_eq!(
            moves,
            vec![vec![24, 0x01, 0x2C], vec![21, 0x00, 0x05], vec![25, 0x7F, 0xFF]]
        );

        sim.finish_moves();
        assert!(!pbr.encoder_moving().unwrap());
    }

    #[test]
    fn test_negative_encoder_speed_sent_as_zero() {
        let (mut pbr, sim) = board();
        pbr.set_encoder_speed(0.5).unwrap();
        pbr.set_encoder_speed(-0.5).unwrap();
        assert_eq!(sim.written().last(), Some(&vec![28, 0]));
        assert_eq!(pbr.encoder_speed().unwrap(), 0.0);
        assert!(matches!(
            pbr.set_encoder_speed(f32::NAN),
            Err(BoardError::InvalidPower(_))
        ));
    }

    #[test]
    fn test_set_address() {
        let (mut pbr, sim) = board();
        assert!(matches!(
            pbr.set_address(0x78),
            Err(BoardError::InvalidAddress(0x78))
        ));
        pbr.set_address(0x50).unwrap();
        assert_eq!(pbr.address(), 0x50);
        assert_eq!(sim.address(), 0x50);
        pbr.probe().unwrap();
    }

    #[test]
    fn test_corrupt_reply() {
        let (mut pbr, sim) = board();
        sim.corrupt_next_reply();
        assert!(matches!(
            pbr.led(),
            Err(BoardError::UnexpectedReply {
                command: Command::GetLed,
                ..
            })
        ));
    }
}
