// PicoBorg Reverse I2C command set
//
// Writes: [command, params...]
// Reads:  write [command], then read I2C_MAX_LEN bytes: [command, value...]

/// Full-scale PWM value
pub const PWM_MAX: u8 = 255;

/// Number of bytes the board returns for any read command
pub const I2C_MAX_LEN: usize = 4;

/// Value returned by `Command::GetId`
pub const BOARD_ID: u8 = 0x15;

/// Factory I2C address
pub const DEFAULT_ADDRESS: u8 = 0x44;

/// Addresses the board accepts for `Command::SetI2cAddress`
pub const MIN_ADDRESS: u8 = 0x03;
pub const MAX_ADDRESS: u8 = 0x77;

/// Largest encoder move accepted in one command
pub const MAX_ENCODER_COUNTS: u16 = 0x7FFF;

pub const VALUE_FWD: u8 = 1;
pub const VALUE_REV: u8 = 2;
pub const VALUE_ON: u8 = 1;
pub const VALUE_OFF: u8 = 0;

/// Command bytes
///
/// Channel B drives motor 1 and channel A drives motor 2.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SetLed = 1,
    GetLed = 2,
    SetAFwd = 3,
    SetARev = 4,
    GetA = 5,
    SetBFwd = 6,
    SetBRev = 7,
    GetB = 8,
    AllOff = 9,
    ResetEpo = 10, // use after the EPO has tripped and the switch is clear
    GetEpo = 11,
    SetEpoIgnore = 12, // run without an EPO connected
    GetEpoIgnore = 13,
    GetDriveFault = 14, // short circuit, under voltage, ...
    SetAllFwd = 15,
    SetAllRev = 16,
    SetFailsafe = 17, // motors off if communication stops
    GetFailsafe = 18,
    SetEncMode = 19,
    GetEncMode = 20,
    MoveAFwd = 21,
    MoveARev = 22,
    MoveBFwd = 23,
    MoveBRev = 24,
    MoveAllFwd = 25,
    MoveAllRev = 26,
    GetEncMoving = 27,
    SetEncSpeed = 28, // max PWM in encoder mode
    GetEncSpeed = 29,
    GetId = 0x99,
    SetI2cAddress = 0xAA,
}

impl Command {
    pub fn from_byte(byte: u8) -> Option<Self> {
        use Command::*;
        let cmd = match byte {
            1 => SetLed,
            2 => GetLed,
            3 => SetAFwd,
            4 => SetARev,
            5 => GetA,
            6 => SetBFwd,
            7 => SetBRev,
            8 => GetB,
            9 => AllOff,
            10 => ResetEpo,
            11 => GetEpo,
            12 => SetEpoIgnore,
            13 => GetEpoIgnore,
            14 => GetDriveFault,
            15 => SetAllFwd,
            16 => SetAllRev,
            17 => SetFailsafe,
            18 => GetFailsafe,
            19 => SetEncMode,
            20 => GetEncMode,
            21 => MoveAFwd,
            22 => MoveARev,
            23 => MoveBFwd,
            24 => MoveBRev,
            25 => MoveAllFwd,
            26 => MoveAllRev,
            27 => GetEncMoving,
            28 => SetEncSpeed,
            29 => GetEncSpeed,
            0x99 => GetId,
            0xAA => SetI2cAddress,
            _ => return None,
        };
        Some(cmd)
    }
}

/// Motor output on the board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motor {
    /// Channel B
    One,
    /// Channel A
    Two,
    Both,
}

impl Motor {
    pub fn set_command(self, direction: Direction) -> Command {
        match (self, direction) {
            (Motor::One, Direction::Forward) => Command::SetBFwd,
            (Motor::One, Direction::Reverse) => Command::SetBRev,
            (Motor::Two, Direction::Forward) => Command::SetAFwd,
            (Motor::Two, Direction::Reverse) => Command::SetARev,
            (Motor::Both, Direction::Forward) => Command::SetAllFwd,
            (Motor::Both, Direction::Reverse) => Command::SetAllRev,
        }
    }

    pub fn move_command(self, direction: Direction) -> Command {
        match (self, direction) {
            (Motor::One, Direction::Forward) => Command::MoveBFwd,
            (Motor::One, Direction::Reverse) => Command::MoveBRev,
            (Motor::Two, Direction::Forward) => Command::MoveAFwd,
            (Motor::Two, Direction::Reverse) => Command::MoveARev,
            (Motor::Both, Direction::Forward) => Command::MoveAllFwd,
            (Motor::Both, Direction::Reverse) => Command::MoveAllRev,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Motor::One => "Motor 1",
            Motor::Two => "Motor 2",
            Motor::Both => "All motors",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            VALUE_FWD => Some(Direction::Forward),
            VALUE_REV => Some(Direction::Reverse),
            _ => None,
        }
    }
}

/// Convert a power fraction to a direction and PWM byte
///
/// Magnitudes above 1.0 saturate at `PWM_MAX`. Returns `None` for NaN.
pub fn power_to_pwm(power: f32) -> Option<(Direction, u8)> {
    if power.is_nan() {
        return None;
    }
    let direction = if power < 0.0 {
        Direction::Reverse
    } else {
        Direction::Forward
    };
    // truncates toward zero, saturating cast handles infinities
    let pwm = (PWM_MAX as f32 * power.abs()) as u32;
    Some((direction, pwm.min(PWM_MAX as u32) as u8))
}

/// Convert a read-back direction and PWM byte into a power fraction
pub fn pwm_to_power(direction: Direction, pwm: u8) -> f32 {
    let power = pwm as f32 / PWM_MAX as f32;
    match direction {
        Direction::Forward => power,
        Direction::Reverse => -power,
    }
}

/// Encode a signed encoder move as direction plus big-endian count
pub fn encoder_counts(counts: i32) -> (Direction, [u8; 2]) {
    let direction = if counts < 0 {
        Direction::Reverse
    } else {
        Direction::Forward
    };
    let magnitude = counts.unsigned_abs().min(MAX_ENCODER_COUNTS as u32) as u16;
    (direction, magnitude.to_be_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_to_pwm() {
        assert_eq!(power_to_pwm(0.0), Some((Direction::Forward, 0)));
        assert_eq!(power_to_pwm(1.0), Some((Direction::Forward, 255)));
        assert_eq!(power_to_pwm(-1.0), Some((Direction::Reverse, 255)));
        assert_eq!(power_to_pwm(0.5), Some((Direction::Forward, 127)));
        assert_eq!(power_to_pwm(-0.25), Some((Direction::Reverse, 63)));
    }

    #[test]
    fn test_power_to_pwm_saturates() {
        assert_eq!(power_to_pwm(2.5), Some((Direction::Forward, 255)));
        assert_eq!(power_to_pwm(-7.0), Some((Direction::Reverse, 255)));
        assert_eq!(power_to_pwm(f32::INFINITY), Some((Direction::Forward, 255)));
        assert_eq!(power_to_pwm(f32::NAN), None);
    }

    #[test]
    fn test_pwm_to_power() {
        assert_eq!(pwm_to_power(Direction::Forward, 255), 1.0);
        assert_eq!(pwm_to_power(Direction::Reverse, 255), -1.0);
        assert_eq!(pwm_to_power(Direction::Forward, 0), 0.0);
        assert!((pwm_to_power(Direction::Reverse, 51) + 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_encoder_counts() {
        assert_eq!(encoder_counts(0x0102), (Direction::Forward, [0x01, 0x02]));
        assert_eq!(encoder_counts(-300), (Direction::Reverse, [0x01, 0x2C]));
        assert_eq!(encoder_counts(100_000), (Direction::Forward, [0x7F, 0xFF]));
        assert_eq!(encoder_counts(i32::MIN), (Direction::Reverse, [0x7F, 0xFF]));
    }

    #[test]
    fn test_channel_mapping() {
        assert_eq!(Motor::One.set_command(Direction::Forward), Command::SetBFwd);
        assert_eq!(Motor::Two.set_command(Direction::Reverse), Command::SetARev);
        assert_eq!(Motor::Both.move_command(Direction::Reverse), Command::MoveAllRev);
    }

    #[test]
    fn test_command_bytes() {
        assert_eq!(Command::GetId as u8, 0x99);
        assert_eq!(Command::SetI2cAddress as u8, 0xAA);
        assert_eq!(Command::from_byte(29), Some(Command::GetEncSpeed));
        assert_eq!(Command::from_byte(30), None);
        for byte in 0..=u8::MAX {
            if let Some(cmd) = Command::from_byte(byte) {
                assert_eq!(cmd as u8, byte);
            }
        }
    }
}
