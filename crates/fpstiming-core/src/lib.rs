//! Frame-driven timing primitives.
//!
//! A [`TimingHandler`] is ticked once per cycle by some driving loop. It
//! advances the [`SequentialTimer`] of every registered [`Animator`] and
//! [`TimingTask`] and invokes their callbacks once per firing.

pub mod animator;
pub mod error;
pub mod handler;
pub mod models;
pub mod storage;
pub mod task;

pub use animator::{Animatable, Animator};
pub use error::{Error, Result};
pub use handler::{AnimatorId, ExternalFiring, FrameReport, TaskId, TimingHandler};
pub use models::{Config, DriverConfig, SequentialTimer, TimerState, TimingConfig};
pub use task::{Taskable, TimingTask};
