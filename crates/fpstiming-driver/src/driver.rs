use fpstiming_core::{DriverConfig, TimingHandler};
use tokio::sync::broadcast;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::events::FrameEvent;

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("Invalid driver configuration: {0}")]
    Config(#[from] fpstiming_core::Error),
}

pub type Result<T> = std::result::Result<T, DriverError>;

/// Fixed-interval loop ticking a [`TimingHandler`].
///
/// The handler is single-threaded, so the futures returned by [`FrameDriver::run`]
/// and [`FrameDriver::run_frames`] are `!Send`: await them on the current task
/// or inside a `LocalSet`.
pub struct FrameDriver {
    handler: TimingHandler,
    frame_interval: Duration,
    event_tx: broadcast::Sender<FrameEvent>,
    shutdown: CancellationToken,
}

impl FrameDriver {
    pub fn new(handler: TimingHandler, config: &DriverConfig) -> Result<Self> {
        config.validate()?;
        let (event_tx, _) = broadcast::channel(1000);

        Ok(Self {
            handler,
            frame_interval: Duration::from_millis(config.frame_interval),
            event_tx,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn handler(&self) -> &TimingHandler {
        &self.handler
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    /// Subscribe to frame events
    pub fn subscribe(&self) -> broadcast::Receiver<FrameEvent> {
        self.event_tx.subscribe()
    }

    /// Token ending the loop when cancelled. A cancelled driver stays
    /// cancelled: later runs return without driving any frame.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Drive frames until the shutdown token is cancelled.
    pub async fn run(&self) -> u64 {
        self.drive(None).await
    }

    /// Drive at most `frames` frames and return how many were driven.
    pub async fn run_frames(&self, frames: u64) -> u64 {
        self.drive(Some(frames)).await
    }

    async fn drive(&self, limit: Option<u64>) -> u64 {
        let mut ticker = interval(self.frame_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let interval_ms = u64::try_from(self.frame_interval.as_millis()).unwrap_or(u64::MAX);
        tracing::info!("Frame driver starting ({}ms interval)", interval_ms);
        self.emit(FrameEvent::started(self.handler.frame_count(), interval_ms));

        let mut last_frame: Option<Instant> = None;
        let mut driven = 0;

        while limit.map_or(true, |limit| driven < limit) {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    tracing::info!("Frame driver cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    let now = Instant::now();
                    let delta = match last_frame {
                        Some(previous) => {
                            let delta = u64::try_from(now.duration_since(previous).as_millis())
                                .unwrap_or(u64::MAX);
                            // Keep the sub-millisecond remainder for the next frame.
                            last_frame = Some(previous + Duration::from_millis(delta));
                            delta
                        }
                        None => {
                            last_frame = Some(now);
                            0
                        }
                    };

                    let report = self.handler.handle(delta);
                    self.emit(FrameEvent::frame(&report, self.handler.frame_rate()));
                    for event in FrameEvent::external(&report) {
                        self.emit(event);
                    }
                    driven += 1;
                }
            }
        }

        tracing::info!("Frame driver stopped after {} frames", driven);
        self.emit(FrameEvent::stopped(self.handler.frame_count(), driven));
        driven
    }

    fn emit(&self, event: FrameEvent) {
        // No subscribers is not an error.
        let _ = self.event_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::FrameEventType;
    use fpstiming_core::{Animatable, Animator};
    use std::cell::Cell;
    use std::rc::Rc;

    struct Counter {
        count: Rc<Cell<u32>>,
        external: bool,
    }

    impl Animatable for Counter {
        fn animate(&mut self) {
            self.count.set(self.count.get() + 1);
        }

        fn external_animation(&self) -> bool {
            self.external
        }
    }

    fn driver(frame_interval: u64) -> FrameDriver {
        let config = DriverConfig {
            frame_interval,
            ..DriverConfig::default()
        };
        FrameDriver::new(TimingHandler::new(), &config).unwrap()
    }

    fn counter(
        driver: &FrameDriver,
        period: u64,
        external: bool,
    ) -> (Animator<Counter>, Rc<Cell<u32>>) {
        let count = Rc::new(Cell::new(0));
        let animator = Animator::with_period(
            Counter {
                count: count.clone(),
                external,
            },
            driver.handler(),
            period,
        )
        .unwrap();
        animator.start_animation();
        (animator, count)
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = DriverConfig {
            frame_interval: 0,
            ..DriverConfig::default()
        };
        assert!(matches!(
            FrameDriver::new(TimingHandler::new(), &config),
            Err(DriverError::Config(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_frames_advances_handler() {
        let driver = driver(25);
        let (_animator, count) = counter(&driver, 50, false);

        let driven = driver.run_frames(5).await;

        assert_eq!(driven, 5);
        assert_eq!(driver.handler().frame_count(), 5);
        // First frame has a zero delta, the next four advance 25ms each.
        assert_eq!(count.get(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_bracket_frames() {
        let driver = driver(10);
        let mut rx = driver.subscribe();

        driver.run_frames(2).await;

        let mut types = Vec::new();
        while let Ok(event) = rx.try_recv() {
            types.push(event.event_type);
        }
        assert_eq!(types.len(), 4);
        assert!(matches!(
            types[0],
            FrameEventType::Started {
                frame_interval_ms: 10
            }
        ));
        assert!(matches!(types[1], FrameEventType::Frame { delta_ms: 0, .. }));
        assert!(matches!(types[2], FrameEventType::Frame { delta_ms: 10, .. }));
        assert!(matches!(
            types[3],
            FrameEventType::Stopped { frames_driven: 2 }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_firings_are_broadcast() {
        let driver = driver(20);
        let (animator, count) = counter(&driver, 20, true);
        let mut rx = driver.subscribe();

        driver.run_frames(3).await;

        let mut firings = 0;
        while let Ok(event) = rx.try_recv() {
            if let FrameEventType::ExternalAnimation {
                animator_id,
                firings: n,
            } = event.event_type
            {
                assert_eq!(animator_id, animator.id());
                firings += n;
            }
        }
        assert_eq!(firings, 2);
        assert_eq!(count.get(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_driver_does_not_run() {
        let driver = driver(10);
        driver.shutdown();

        assert_eq!(driver.run_frames(10).await, 0);
        assert_eq!(driver.run().await, 0);
        assert_eq!(driver.handler().frame_count(), 0);
    }
}
