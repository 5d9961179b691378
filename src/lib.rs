pub mod bus;
pub mod config;
pub mod messages;
pub mod motor;
pub mod panel;
