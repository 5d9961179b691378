//! Simulated PicoBorg Reverse for running without hardware and for tests

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};

use crate::motor::protocol::{
    BOARD_ID, Command, DEFAULT_ADDRESS, I2C_MAX_LEN, VALUE_FWD, VALUE_OFF, VALUE_ON, VALUE_REV,
};

/// Writes kept for inspection; older ones are discarded
pub const WRITE_LOG_LEN: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SimError {
    #[error("No device acknowledged address 0x{0:02X}")]
    NoAcknowledge(u8),
}

impl embedded_hal::i2c::Error for SimError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Channel {
    reverse: bool,
    pwm: u8,
}

impl Channel {
    fn set(&mut self, reverse: bool, pwm: u8) {
        self.reverse = reverse;
        self.pwm = pwm;
    }

    fn direction_byte(&self) -> u8 {
        if self.reverse { VALUE_REV } else { VALUE_FWD }
    }
}

struct SimState {
    address: u8,
    id: u8,
    online: bool,
    a: Channel,
    b: Channel,
    led: bool,
    epo_tripped: bool,
    epo_ignore: bool,
    drive_fault: bool,
    failsafe: bool,
    encoder_mode: bool,
    encoder_moving: bool,
    encoder_speed: u8,
    last_command: Option<u8>,
    corrupt_next: bool,
    written: VecDeque<Vec<u8>>,
}

impl SimState {
    fn flag(on: bool) -> u8 {
        if on { VALUE_ON } else { VALUE_OFF }
    }

    fn handle_write(&mut self, bytes: &[u8]) {
        if self.written.len() == WRITE_LOG_LEN {
            self.written.pop_front();
        }
        self.written.push_back(bytes.to_vec());
        let Some((&cmd_byte, params)) = bytes.split_first() else {
            return;
        };
        self.last_command = Some(cmd_byte);

        let Some(command) = Command::from_byte(cmd_byte) else {
            return;
        };
        let arg = params.first().copied();
        let on = arg == Some(VALUE_ON);

        match command {
            Command::SetLed if arg.is_some() => self.led = on,
            Command::SetAFwd | Command::SetARev | Command::SetBFwd | Command::SetBRev
            | Command::SetAllFwd | Command::SetAllRev => {
                let Some(pwm) = arg else { return };
                let reverse = matches!(
                    command,
                    Command::SetARev | Command::SetBRev | Command::SetAllRev
                );
                // a latched EPO holds the outputs off
                let pwm = if self.epo_tripped && !self.epo_ignore { 0 } else { pwm };
                match command {
                    Command::SetAFwd | Command::SetARev => self.a.set(reverse, pwm),
                    Command::SetBFwd | Command::SetBRev => self.b.set(reverse, pwm),
                    _ => {
                        self.a.set(reverse, pwm);
                        self.b.set(reverse, pwm);
                    }
                }
            }
            Command::AllOff => {
                self.a = Channel::default();
                self.b = Channel::default();
            }
            Command::ResetEpo => self.epo_tripped = false,
            Command::SetEpoIgnore if arg.is_some() => self.epo_ignore = on,
            Command::SetFailsafe if arg.is_some() => self.failsafe = on,
            Command::SetEncMode if arg.is_some() => self.encoder_mode = on,
            Command::MoveAFwd
            | Command::MoveARev
            | Command::MoveBFwd
            | Command::MoveBRev
            | Command::MoveAllFwd
            | Command::MoveAllRev
                if params.len() == 2 =>
            {
                self.encoder_moving = true
            }
            Command::SetEncSpeed => {
                if let Some(pwm) = arg {
                    self.encoder_speed = pwm;
                }
            }
            Command::SetI2cAddress => {
                if let Some(addr) = arg {
                    self.address = addr;
                }
            }
            _ => {}
        }
    }

    fn reply(&mut self) -> [u8; I2C_MAX_LEN] {
        let mut reply = [0u8; I2C_MAX_LEN];
        let Some(cmd_byte) = self.last_command else {
            return reply;
        };
        reply[0] = cmd_byte;

        match Command::from_byte(cmd_byte) {
            Some(Command::GetLed) => reply[1] = Self::flag(self.led),
            Some(Command::GetA) => {
                reply[1] = self.a.direction_byte();
                reply[2] = self.a.pwm;
            }
            Some(Command::GetB) => {
                reply[1] = self.b.direction_byte();
                reply[2] = self.b.pwm;
            }
            Some(Command::GetEpo) => reply[1] = Self::flag(self.epo_tripped),
            Some(Command::GetEpoIgnore) => reply[1] = Self::flag(self.epo_ignore),
            Some(Command::GetDriveFault) => reply[1] = Self::flag(self.drive_fault),
            Some(Command::GetFailsafe) => reply[1] = Self::flag(self.failsafe),
            Some(Command::GetEncMode) => reply[1] = Self::flag(self.encoder_mode),
            Some(Command::GetEncMoving) => reply[1] = Self::flag(self.encoder_moving),
            Some(Command::GetEncSpeed) => reply[1] = self.encoder_speed,
            Some(Command::GetId) => reply[1] = self.id,
            _ => {}
        }

        if self.corrupt_next {
            self.corrupt_next = false;
            reply[0] = !reply[0];
        }
        reply
    }
}

/// In-process stand-in for a PicoBorg Reverse on an I2C bus
///
/// Clones share the same board, so a test can keep one handle for
/// inspection while the driver owns another.
#[derive(Clone)]
pub struct SimulatedBoard {
    inner: Arc<Mutex<SimState>>,
}

impl SimulatedBoard {
    /// A board at the factory address with everything off
    pub fn new() -> Self {
        SimulatedBoard {
            inner: Arc::new(Mutex::new(SimState {
                address: DEFAULT_ADDRESS,
                id: BOARD_ID,
                online: true,
                a: Channel::default(),
                b: Channel::default(),
                led: false,
                epo_tripped: false,
                epo_ignore: false,
                drive_fault: false,
                failsafe: false,
                encoder_mode: false,
                encoder_moving: false,
                encoder_speed: 0,
                last_command: None,
                corrupt_next: false,
                written: VecDeque::with_capacity(WRITE_LOG_LEN),
            })),
        }
    }

    pub fn with_address(self, address: u8) -> Self {
        self.lock().address = address;
        self
    }

    /// Answer `GetId` with something other than a PicoBorg Reverse
    pub fn with_id(self, id: u8) -> Self {
        self.lock().id = id;
        self
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn address(&self) -> u8 {
        self.lock().address
    }

    /// The most recent writes the board has received, oldest first
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.lock().written.iter().cloned().collect()
    }

    pub fn clear_written(&self) {
        self.lock().written.clear();
    }

    /// Latch the emergency power off and cut both outputs
    pub fn trip_epo(&self) {
        let mut state = self.lock();
        state.epo_tripped = true;
        state.a = Channel::default();
        state.b = Channel::default();
    }

    pub fn set_drive_fault(&self, fault: bool) {
        self.lock().drive_fault = fault;
    }

    /// Finish any running encoder move
    pub fn finish_moves(&self) {
        self.lock().encoder_moving = false;
    }

    /// Stop acknowledging any address
    pub fn disconnect(&self) {
        self.lock().online = false;
    }

    pub fn reconnect(&self) {
        self.lock().online = true;
    }

    /// Make the next reply fail its command echo check
    pub fn corrupt_next_reply(&self) {
        self.lock().corrupt_next = true;
    }
}

impl Default for SimulatedBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorType for SimulatedBoard {
    type Error = SimError;
}

impl I2c for SimulatedBoard {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut state = self.lock();
        if !state.online || address != state.address {
            return Err(SimError::NoAcknowledge(address));
        }

        for op in operations {
            match op {
                Operation::Write(bytes) => state.handle_write(&bytes[..]),
                Operation::Read(buf) => {
                    let reply = state.reply();
                    for (dst, src) in buf.iter_mut().zip(reply.iter().chain(std::iter::repeat(&0))) {
                        *dst = *src;
                    }
                }
            }
        }
        Ok(())
    }
}
