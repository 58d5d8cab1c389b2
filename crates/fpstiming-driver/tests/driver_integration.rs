use anyhow::Result;
use fpstiming_core::{Animatable, Animator, DriverConfig, TimingConfig, TimingHandler, TimingTask};
use fpstiming_driver::{FrameDriver, FrameEventType};
use std::cell::RefCell;
use std::rc::Rc;
use tokio::time::{sleep, Duration};

type Log = Rc<RefCell<Vec<String>>>;

struct Named {
    name: &'static str,
    log: Log,
}

impl Animatable for Named {
    fn animate(&mut self) {
        self.log.borrow_mut().push(self.name.to_string());
    }
}

fn named(
    name: &'static str,
    log: &Log,
    handler: &TimingHandler,
    period: u64,
) -> Result<Animator<Named>> {
    let animator = Animator::with_period(
        Named {
            name,
            log: log.clone(),
        },
        handler,
        period,
    )?;
    animator.start_animation();
    Ok(animator)
}

fn driver(handler: &TimingHandler, frame_interval: u64) -> Result<FrameDriver> {
    let config = DriverConfig {
        frame_interval,
        ..DriverConfig::default()
    };
    Ok(FrameDriver::new(handler.clone(), &config)?)
}

#[tokio::test(start_paused = true)]
async fn test_animators_keep_their_own_cadence() -> Result<()> {
    let handler = TimingHandler::new();
    let log = Log::default();
    let _fast = named("fast", &log, &handler, 50)?;
    let _slow = named("slow", &log, &handler, 100)?;

    // 1 zero-delta frame plus 10 frames of 20ms.
    let driver = driver(&handler, 20)?;
    assert_eq!(driver.run_frames(11).await, 11);

    let log = log.borrow();
    assert_eq!(log.iter().filter(|n| *n == "fast").count(), 4);
    assert_eq!(log.iter().filter(|n| *n == "slow").count(), 2);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_slow_frames_catch_up() -> Result<()> {
    let handler = TimingHandler::new();
    let log = Log::default();
    let _a = named("A", &log, &handler, 50)?;
    let _b = named("B", &log, &handler, 100)?;

    // Frames far slower than either period: each frame catches up in rounds.
    let driver = driver(&handler, 100)?;
    let mut rx = driver.subscribe();
    driver.run_frames(2).await;

    assert_eq!(*log.borrow(), vec!["A", "B", "A"]);

    let animations: Vec<u64> = std::iter::from_fn(|| rx.try_recv().ok())
        .filter_map(|event| match event.event_type {
            FrameEventType::Frame { animations, .. } => Some(animations),
            _ => None,
        })
        .collect();
    assert_eq!(animations, vec![0, 3]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_token_ends_run() -> Result<()> {
    let handler = TimingHandler::new();
    let driver = driver(&handler, 10)?;
    let token = driver.shutdown_token();

    let (frames, _) = tokio::join!(driver.run(), async {
        sleep(Duration::from_millis(95)).await;
        token.cancel();
    });

    assert!(frames >= 9, "drove {} frames", frames);
    assert_eq!(handler.frame_count(), frames);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_run_once_task_fires_once() -> Result<()> {
    let config = TimingConfig {
        default_period: 10,
        ..TimingConfig::default()
    };
    let handler = TimingHandler::with_config(config)?;
    let log = Log::default();

    let task_log = log.clone();
    let task = TimingTask::new(
        move || task_log.borrow_mut().push("task".to_string()),
        &handler,
    );
    task.run_once(30)?;

    let driver = driver(&handler, 10)?;
    driver.run_frames(10).await;

    assert_eq!(*log.borrow(), vec!["task"]);
    assert!(!task.is_active());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_toggle_between_runs() -> Result<()> {
    let handler = TimingHandler::new();
    let log = Log::default();
    let animator = named("A", &log, &handler, 10)?;
    let driver = driver(&handler, 10)?;

    driver.run_frames(3).await;
    let after_first = log.borrow().len();
    assert_eq!(after_first, 2);

    animator.toggle_animation();
    driver.run_frames(3).await;
    assert_eq!(log.borrow().len(), after_first);

    animator.toggle_animation();
    driver.run_frames(3).await;
    assert_eq!(log.borrow().len(), after_first + 2);
    Ok(())
}
