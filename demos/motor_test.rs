// Motor test: careful, step-by-step test of both motor outputs
//
// IMPORTANT: Run board_diagnostic FIRST to verify the board answers.
//
// Usage: cargo run --example motor_test -- [i2c device]
// Pass --simulate instead of a device to run against the simulated board.
//
// Safety features:
// - Explicit confirmation before any writes
// - Comms failsafe on, so the board stops if this program dies
// - Low test power, motors off between steps
// - Motors switched off when the driver is dropped

use std::io::{self, Write};
use std::path::PathBuf;
use std::thread::sleep;
use std::time::Duration;

use embedded_hal::i2c::I2c;
use picoborg_rev::motor::MotorDriver;
use picoborg_rev::motor::protocol::DEFAULT_ADDRESS;

const TEST_POWER: f32 = 0.25;
const TEST_DURATION: Duration = Duration::from_millis(500);
const PAUSE_DURATION: Duration = Duration::from_millis(500);

// The board's comms failsafe cuts the motors after ~1/4 s without commands,
// so long steps are re-sent at this interval
const REFRESH: Duration = Duration::from_millis(100);

fn confirm(prompt: &str) -> bool {
    print!("{} [y/N]: ", prompt);
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_err() {
        return false;
    }
    input.trim().eq_ignore_ascii_case("y")
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().unwrap()),
        )
        .init();

    let arg = std::env::args().nth(1);

    println!("PicoBorg Reverse motor test (WITH WRITES)");
    println!("  ⚠  This tool WILL drive both motors!");
    println!("  ⚠  Make sure wheels are OFF THE GROUND before proceeding!");
    println!();

    if arg.as_deref() == Some("--simulate") {
        println!("Using the simulated board");
        return run_test(MotorDriver::simulated(DEFAULT_ADDRESS));
    }

    if !confirm("Have you run board_diagnostic first and verified the board responds?") {
        println!("Please run: cargo run --example board_diagnostic");
        return Ok(());
    }
    if !confirm("Are the wheels OFF THE GROUND?") {
        println!("Please lift the robot so the wheels can spin freely.");
        return Ok(());
    }

    let path = arg.map(PathBuf::from);
    let driver = MotorDriver::open(path.as_deref(), DEFAULT_ADDRESS)?;
    run_test(driver)
}

fn run_test<I2C: I2c>(mut driver: MotorDriver<I2C>) -> Result<(), Box<dyn std::error::Error>>
where
    I2C::Error: 'static,
{
    let mut messages = driver.subscribe();

    // ========== STEP 1: Initialize (read-only) ==========
    println!("Step 1: Checking board identity...");
    driver.initialize()?;
    println!("  ✓ PicoBorg Reverse responding");
    println!();

    // ========== STEP 2: Safety configuration ==========
    println!("Step 2: Enabling comms failsafe and switching motors off...");
    driver.board().set_comms_failsafe(true)?;
    driver.all_stop()?;
    if driver.board().epo_tripped()? {
        println!("  ✗ EPO is tripped - close the EPO and reset it before testing");
        return Ok(());
    }
    println!("  ✓ Ready");
    println!();

    // ========== STEP 3: Each motor in turn ==========
    println!("Step 3: Driving each motor at {:.0}% power", TEST_POWER * 100.0);
    println!("  ⚠  WATCH THE WHEELS - press Ctrl+C at any time to abort!");
    println!();

    let tests: [(&str, f32, f32); 4] = [
        ("Motor 1 forward", TEST_POWER, 0.0),
        ("Motor 1 reverse", -TEST_POWER, 0.0),
        ("Motor 2 forward", 0.0, TEST_POWER),
        ("Motor 2 reverse", 0.0, -TEST_POWER),
    ];

    for (name, motor1, motor2) in tests {
        println!("  Testing: {}...", name);

        let mut elapsed = Duration::ZERO;
        while elapsed < TEST_DURATION {
            driver.set_motor1(motor1)?;
            driver.set_motor2(motor2)?;
            sleep(REFRESH);
            elapsed += REFRESH;
        }
        println!(
            "    Read back: motor1={:+.2}, motor2={:+.2}",
            driver.motor1()?,
            driver.motor2()?
        );

        driver.all_stop()?;
        sleep(PAUSE_DURATION);
    }

    // ========== FINAL: Report ==========
    println!();
    println!("Step 4: Final status");
    let status = driver.status()?;
    println!("{}", serde_json::to_string_pretty(&status)?);

    let mut count = 0;
    while messages.try_recv().is_ok() {
        count += 1;
    }
    println!();
    println!("Test complete ({} driver messages).", count);
    println!("If both wheels turned both ways, try the panel with: cargo run");

    Ok(())
}
