//! I2C bus access: Linux character devices and an in-process simulated board

use std::path::{Path, PathBuf};

use linux_embedded_hal::I2cdev;
use tracing::{debug, info};

mod sim;
pub use sim::{SimError, SimulatedBoard, WRITE_LOG_LEN};

/// Errors while locating or opening a bus
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("No I2C bus found under {0}")]
    NotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Bus number of an `i2c-N` device name
fn bus_number(name: &str) -> Option<u32> {
    name.strip_prefix("i2c-")?.parse().ok()
}

/// Find the lowest-numbered `i2c-N` device in `dir`
pub fn first_bus_in(dir: &Path) -> Result<PathBuf, BusError> {
    let mut buses: Vec<(u32, PathBuf)> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let n = bus_number(entry.file_name().to_str()?)?;
            Some((n, entry.path()))
        })
        .collect();
    buses.sort_by_key(|(n, _)| *n);
    debug!("I2C buses under {}: {:?}", dir.display(), buses);

    buses
        .into_iter()
        .next()
        .map(|(_, path)| path)
        .ok_or_else(|| BusError::NotFound(dir.to_path_buf()))
}

/// Find the first I2C bus the system exposes
pub fn first_bus() -> Result<PathBuf, BusError> {
    first_bus_in(Path::new(crate::config::I2C_DEV_DIR))
}

/// Open a Linux I2C character device
pub fn open(path: &Path) -> Result<I2cdev, BusError> {
    info!("Opening I2C bus {}", path.display());
    I2cdev::new(path).map_err(|e| BusError::Open {
        path: path.to_path_buf(),
        source: Box::new(e),
    })
}
