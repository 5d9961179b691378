use clap::Parser;
use tracing_subscriber::EnvFilter;

use picoborg_rev::config::Args;
use picoborg_rev::motor::MotorDriver;
use picoborg_rev::panel;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Print the board status as JSON
fn print_status<I2C: embedded_hal::i2c::I2c>(mut driver: MotorDriver<I2C>) -> Result<(), BoxError>
where
    I2C::Error: Send + Sync + 'static,
{
    driver.initialize()?;
    let status = driver.status()?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

async fn run(args: Args) -> Result<(), BoxError> {
    if args.simulate {
        let driver = MotorDriver::simulated(args.address);
        if args.status {
            return print_status(driver);
        }
        return panel::run(driver).await;
    }

    let driver = MotorDriver::open(args.bus.as_deref(), args.address)?;
    if args.status {
        return print_status(driver);
    }
    panel::run(driver).await
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Logs go to stderr so they stay out of the panel (RUST_LOG=picoborg_rev=debug shows bus traffic)
    let default_level = if args.status { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(
                default_level
                    .parse()
                    .expect("static log directive is valid"),
            ),
        )
        .init();

    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
