use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Periodic timer advanced by explicit time deltas rather than a clock.
///
/// Every call to [`SequentialTimer::advance`] consumes as many whole periods
/// as fit in the accumulated time, so a delayed tick produces a burst of
/// firings instead of a permanent lag.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "TimerFields")]
pub struct SequentialTimer {
    period: u64,
    elapsed: u64,
    state: TimerState,
    #[serde(default)]
    single_shot: bool,
}

/// Unchecked wire form of [`SequentialTimer`]
#[derive(Deserialize)]
struct TimerFields {
    period: u64,
    elapsed: u64,
    state: TimerState,
    #[serde(default)]
    single_shot: bool,
}

impl TryFrom<TimerFields> for SequentialTimer {
    type Error = Error;

    fn try_from(fields: TimerFields) -> Result<Self> {
        validate_period(fields.period)?;
        Ok(Self {
            period: fields.period,
            elapsed: fields.elapsed,
            state: fields.state,
            single_shot: fields.single_shot,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Running,
    Stopped,
}

impl SequentialTimer {
    /// Create a stopped timer firing every `period` milliseconds.
    pub fn new(period: u64) -> Result<Self> {
        validate_period(period)?;
        Ok(Self {
            period,
            elapsed: 0,
            state: TimerState::Stopped,
            single_shot: false,
        })
    }

    /// Stopped timer for a period already validated by the caller's config.
    pub(crate) fn stopped(period: u64) -> Self {
        Self {
            period: period.max(1),
            elapsed: 0,
            state: TimerState::Stopped,
            single_shot: false,
        }
    }

    pub fn start(&mut self) {
        if self.is_started() {
            return;
        }
        self.elapsed = 0;
        self.state = TimerState::Running;
    }

    pub fn stop(&mut self) {
        self.state = TimerState::Stopped;
    }

    pub fn restart(&mut self) {
        self.stop();
        self.start();
    }

    /// Change the period. Running state and elapsed progress are kept.
    pub fn set_period(&mut self, period: u64) -> Result<()> {
        validate_period(period)?;
        self.period = period;
        Ok(())
    }

    pub fn set_period_and_restart(&mut self, period: u64, restart: bool) -> Result<()> {
        self.set_period(period)?;
        if restart {
            self.restart();
        }
        Ok(())
    }

    /// Set the period and (re)start counting from zero.
    pub fn run(&mut self, period: u64) -> Result<()> {
        self.set_period_and_restart(period, true)
    }

    /// Advance the timer by `delta` milliseconds and return how many periods
    /// elapsed. A stopped timer ignores the delta.
    pub fn advance(&mut self, delta: u64) -> u64 {
        if !self.is_started() {
            return 0;
        }

        self.elapsed = self.elapsed.saturating_add(delta);
        let mut firings = self.elapsed / self.period;
        self.elapsed %= self.period;

        if self.single_shot && firings > 0 {
            firings = 1;
            self.stop();
        }

        firings
    }

    pub fn period(&self) -> u64 {
        self.period
    }

    pub fn elapsed(&self) -> u64 {
        self.elapsed
    }

    /// Milliseconds left until the next firing, if running.
    pub fn remaining(&self) -> Option<u64> {
        if self.is_started() {
            Some(self.period.saturating_sub(self.elapsed))
        } else {
            None
        }
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn is_started(&self) -> bool {
        self.state == TimerState::Running
    }

    pub fn is_single_shot(&self) -> bool {
        self.single_shot
    }

    pub fn set_single_shot(&mut self, single_shot: bool) {
        self.single_shot = single_shot;
    }
}

fn validate_period(period: u64) -> Result<()> {
    if period == 0 {
        return Err(Error::InvalidPeriod(period));
    }
    Ok(())
}
