//! FPSTiming frame driver
//!
//! Drives a [`fpstiming_core::TimingHandler`] from a tokio interval and
//! broadcasts what happened on every frame.

pub mod driver;
pub mod events;

pub use driver::{DriverError, FrameDriver};
pub use events::{FrameEvent, FrameEventType};
