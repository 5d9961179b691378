// Messages passed from the driver to whoever is listening

use serde::{Deserialize, Serialize};

/// Human-readable event emitted by the motor driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerMessage {
    pub message: String,
}

impl ControllerMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ControllerMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Snapshot of everything the board can report
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct BoardStatus {
    pub address: u8,
    pub motor1: f32,
    pub motor2: f32,
    pub led: bool,
    pub epo_tripped: bool,
    pub epo_ignored: bool,
    pub drive_fault: bool,
    pub comms_failsafe: bool,
    pub encoder_mode: bool,
    pub encoder_moving: bool,
    pub encoder_speed: f32,
}
