// Bus defaults, panel timing, command-line options
use std::path::PathBuf;

use clap::Parser;

use crate::motor::protocol::{DEFAULT_ADDRESS, MAX_ADDRESS, MIN_ADDRESS};

// Panel loop frequency (also how often driver messages are drained)
pub const LOOP_HZ: u64 = 50;

// Slider range and keyboard steps
pub const SLIDER_MIN: f32 = -1.0;
pub const SLIDER_MAX: f32 = 1.0;
pub const SLIDER_STEP: f32 = 0.05;
pub const SLIDER_FINE_STEP: f32 = 0.01;

// Output log lines the panel keeps (messages plus blank separators)
pub const OUTPUT_LINES: usize = 500;

// Where Linux exposes I2C character devices
pub const I2C_DEV_DIR: &str = "/dev";

/// Drive a PicoBorg Reverse from two sliders
#[derive(Debug, Clone, Parser)]
#[command(version, about)]
pub struct Args {
    /// I2C device to open (defaults to the first /dev/i2c-N found)
    #[arg(short, long)]
    pub bus: Option<PathBuf>,

    /// 7-bit I2C address of the board (decimal or 0x-prefixed hex)
    #[arg(short, long, default_value_t = DEFAULT_ADDRESS, value_parser = parse_address)]
    pub address: u8,

    /// Run against an in-process simulated board instead of real hardware
    #[arg(long)]
    pub simulate: bool,

    /// Print a JSON status snapshot and exit
    #[arg(long)]
    pub status: bool,
}

/// Parse `0x44` or `68` into an address the board accepts (0x03..=0x77)
pub fn parse_address(s: &str) -> Result<u8, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse::<u8>(),
    };
    match parsed {
        Ok(addr) if (MIN_ADDRESS..=MAX_ADDRESS).contains(&addr) => Ok(addr),
        Ok(addr) => Err(format!(
            "0x{:02X} is outside 0x{:02X}..=0x{:02X}",
            addr, MIN_ADDRESS, MAX_ADDRESS
        )),
        Err(e) => Err(format!("invalid address '{}': {}", s, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("0x44"), Ok(0x44));
        assert_eq!(parse_address("0X0a"), Ok(0x0A));
        assert_eq!(parse_address("68"), Ok(68));
        assert!(parse_address("0x80").is_err());
        assert!(parse_address("0x78").is_err());
        assert!(parse_address("0x7F").is_err());
        assert!(parse_address("0x02").is_err());
        assert!(parse_address("0").is_err());
        assert_eq!(parse_address("0x03"), Ok(0x03));
        assert_eq!(parse_address("0x77"), Ok(0x77));
        assert!(parse_address("bogus").is_err());
    }

    #[test]
    fn test_default_args() {
        let args = Args::parse_from(["picoborg-rev"]);
        assert_eq!(args.address, 0x44);
        assert!(args.bus.is_none());
        assert!(!args.simulate);
    }
}
