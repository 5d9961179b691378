// Board diagnostic: READ-ONLY check that a PicoBorg Reverse answers on the bus
//
// Nothing is written to the board apart from read commands, so the motors
// never move. Run this first before motor_test.
//
// Usage: cargo run --example board_diagnostic -- [i2c device] [address]
// Example: cargo run --example board_diagnostic -- /dev/i2c-1 0x44

use std::path::PathBuf;

use picoborg_rev::bus;
use picoborg_rev::config::parse_address;
use picoborg_rev::motor::PicoBorgRev;
use picoborg_rev::motor::protocol::{BOARD_ID, DEFAULT_ADDRESS};

fn yes_no(flag: bool) -> &'static str {
    if flag { "YES" } else { "no" }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("debug".parse().unwrap()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let path = match args.next() {
        Some(path) => PathBuf::from(path),
        None => bus::first_bus()?,
    };
    let address = match args.next() {
        Some(addr) => parse_address(&addr)?,
        None => DEFAULT_ADDRESS,
    };

    println!("PicoBorg Reverse diagnostic (read-only)");
    println!("I2C bus: {}", path.display());
    println!("Address: 0x{:02X}", address);
    println!();

    println!("Step 1: Opening I2C bus...");
    let i2c = match bus::open(&path) {
        Ok(i2c) => {
            println!("  ✓ Bus opened");
            i2c
        }
        Err(e) => {
            println!("  ✗ Failed to open bus: {}", e);
            println!();
            println!("Troubleshooting:");
            println!("  - Enable I2C (e.g. raspi-config > Interface Options)");
            println!("  - Check you are in the i2c group or running as root");
            return Err(e.into());
        }
    };
    let mut board = PicoBorgRev::with_address(i2c, address);
    println!();

    println!("Step 2: Reading board identifier...");
    match board.identify() {
        Ok(id) if id == BOARD_ID => println!("  ✓ PicoBorg Reverse found (id 0x{:02X})", id),
        Ok(id) => {
            println!("  ✗ Unexpected id 0x{:02X} (expected 0x{:02X})", id, BOARD_ID);
            println!("  - Another device may be using address 0x{:02X}", address);
            return Ok(());
        }
        Err(e) => {
            println!("  ✗ No answer: {}", e);
            println!("  - Check the board is powered and the header is seated");
            println!("  - Check the address (factory default is 0x44)");
            return Ok(());
        }
    }
    println!();

    println!("Step 3: Reading status...");
    match board.motor1() {
        Ok(power) => println!("    Motor 1:          {:+.3}", power),
        Err(e) => println!("    Motor 1:          ERROR - {}", e),
    }
    match board.motor2() {
        Ok(power) => println!("    Motor 2:          {:+.3}", power),
        Err(e) => println!("    Motor 2:          ERROR - {}", e),
    }
    match board.led() {
        Ok(on) => println!("    LED on:           {}", yes_no(on)),
        Err(e) => println!("    LED on:           ERROR - {}", e),
    }
    match board.epo_tripped() {
        Ok(tripped) => println!("    EPO tripped:      {}", yes_no(tripped)),
        Err(e) => println!("    EPO tripped:      ERROR - {}", e),
    }
    match board.epo_ignored() {
        Ok(ignored) => println!("    EPO ignored:      {}", yes_no(ignored)),
        Err(e) => println!("    EPO ignored:      ERROR - {}", e),
    }
    match board.drive_fault() {
        Ok(fault) => println!("    Drive fault:      {}", yes_no(fault)),
        Err(e) => println!("    Drive fault:      ERROR - {}", e),
    }
    match board.comms_failsafe() {
        Ok(enabled) => println!("    Comms failsafe:   {}", yes_no(enabled)),
        Err(e) => println!("    Comms failsafe:   ERROR - {}", e),
    }
    match board.encoder_mode() {
        Ok(enabled) => println!("    Encoder mode:     {}", yes_no(enabled)),
        Err(e) => println!("    Encoder mode:     ERROR - {}", e),
    }
    println!();

    println!("Diagnostic complete.");
    println!("  - A tripped EPO needs the jumper/switch closed and then a reset");
    println!("  - A drive fault usually means low supply voltage or a short");
    println!();
    println!("Next step: cargo run --example motor_test with the wheels OFF THE GROUND");

    Ok(())
}
