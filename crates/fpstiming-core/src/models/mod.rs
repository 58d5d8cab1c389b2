pub mod config;
pub mod timer;

pub use config::{Config, DriverConfig, TimingConfig};
pub use timer::{SequentialTimer, TimerState};
