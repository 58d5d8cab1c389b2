//! Headless particle system animated by a timing handler.
//!
//! The system animates every `period` ms regardless of the frame interval;
//! halfway through the period is shortened, then the animation is toggled
//! off and on again.
//!
//! Run with `cargo run -p fpstiming-driver --example particles`.

use anyhow::Result;
use fpstiming_core::storage::{init_config_dir, ConfigStorage};
use fpstiming_core::{Animatable, Animator, TimingHandler, TimingTask};
use fpstiming_driver::{FrameDriver, FrameEventType};
use std::cell::Cell;
use std::rc::Rc;
use tokio::sync::broadcast::error::TryRecvError;

const PARTICLES: usize = 2000;
const GOLDEN_ANGLE: f32 = 2.399_963;

#[derive(Debug, Clone, Copy, Default)]
struct Particle {
    pos: (f32, f32),
    speed: (f32, f32),
    age: u32,
    age_max: u32,
}

impl Particle {
    fn spawn(seed: usize) -> Self {
        let angle = GOLDEN_ANGLE * seed as f32;
        let norm = 0.04 * ((seed % 97) as f32 / 97.0);
        Self {
            pos: (0.0, 0.0),
            speed: (norm * angle.cos(), norm * angle.sin()),
            age: 0,
            age_max: 50 + (seed % 100) as u32,
        }
    }

    fn animate(&mut self, seed: usize) {
        self.pos.0 += self.speed.0 * 10.0;
        self.pos.1 += self.speed.1 * 10.0;
        self.age += 1;
        if self.age >= self.age_max {
            *self = Particle::spawn(seed + self.age as usize);
        }
    }
}

struct ParticleSystem {
    particles: Vec<Particle>,
    steps: u64,
}

impl ParticleSystem {
    fn new() -> Self {
        Self {
            particles: (0..PARTICLES).map(Particle::spawn).collect(),
            steps: 0,
        }
    }

    fn spread(&self) -> f32 {
        self.particles
            .iter()
            .map(|p| (p.pos.0 * p.pos.0 + p.pos.1 * p.pos.1).sqrt())
            .fold(0.0, f32::max)
    }
}

impl Animatable for ParticleSystem {
    fn animate(&mut self) {
        for (i, particle) in self.particles.iter_mut().enumerate() {
            particle.animate(i);
        }
        self.steps += 1;
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = ConfigStorage::new(init_config_dir()?).load()?;

    tracing_subscriber::fmt()
        .with_env_filter(config.driver.log_level.as_str())
        .init();

    let handler = TimingHandler::with_config(config.timing.clone())?;
    let driver = FrameDriver::new(handler.clone(), &config.driver)?;

    let system = Animator::new(ParticleSystem::new(), &handler);
    system.start_animation();

    // Once per second, report progress.
    let frames_seen = Rc::new(Cell::new(0u64));
    let stats_frames = frames_seen.clone();
    let stats_handler = handler.clone();
    let stats = TimingTask::new(
        move || {
            tracing::info!(
                "frame {} ({:.1} fps)",
                stats_handler.frame_count(),
                stats_handler.frame_rate(),
            );
            stats_frames.set(stats_handler.frame_count());
        },
        &handler,
    );
    stats.run(1000)?;

    let mut events = driver.subscribe();
    let frames = (3000 / config.driver.frame_interval).max(1);

    driver.run_frames(frames / 2).await;
    system.set_animation_period((system.animation_period() / 2).max(1))?;
    tracing::info!("Animation period now {}ms", system.animation_period());

    system.toggle_animation();
    driver.run_frames(frames / 4).await;
    system.toggle_animation();
    driver.run_frames(frames - frames / 2 - frames / 4).await;

    let mut animations = 0;
    loop {
        match events.try_recv() {
            Ok(event) => {
                if let FrameEventType::Frame { animations: n, .. } = event.event_type {
                    animations += n;
                }
            }
            Err(TryRecvError::Lagged(skipped)) => {
                tracing::warn!("Missed {} frame events", skipped);
            }
            Err(_) => break,
        }
    }

    let particles = system.behavior();
    tracing::info!(
        "Done: {} frames, {} animation steps ({} counted from events), spread {:.2}",
        handler.frame_count(),
        particles.steps,
        animations,
        particles.spread()
    );
    tracing::debug!("Last stats at frame {}", frames_seen.get());

    Ok(())
}
