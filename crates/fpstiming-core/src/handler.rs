//! Timing handler - advances registered timers and dispatches their callbacks

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

use indexmap::map::Entry;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::animator::{Animatable, Animator};
use crate::models::{SequentialTimer, TimingConfig};
use crate::task::{Taskable, TimingTask};
use crate::Result;

/// Stable identifier of an [`Animator`] inside a handler's registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnimatorId(Uuid);

/// Stable identifier of a [`TimingTask`] inside a handler's task pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl AnimatorId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl TaskId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for AnimatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Firings of an externally animated object. The handler advanced its timer
/// but left invoking the callback to whoever registered it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalFiring {
    pub animator: AnimatorId,
    pub firings: u64,
}

/// Outcome of one [`TimingHandler::handle`] pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameReport {
    /// 1-based number of this frame
    pub frame: u64,
    /// Milliseconds the timers were advanced by
    pub delta: u64,
    /// `animate()` invocations performed by the handler
    pub animations: u64,
    pub tasks_executed: u64,
    pub external: Vec<ExternalFiring>,
}

#[derive(Clone)]
pub(crate) struct AnimatorEntry {
    pub(crate) timer: Weak<RefCell<SequentialTimer>>,
    pub(crate) behavior: Weak<RefCell<dyn Animatable>>,
}

#[derive(Clone)]
pub(crate) struct TaskEntry {
    pub(crate) timer: Weak<RefCell<SequentialTimer>>,
    pub(crate) task: Weak<RefCell<dyn Taskable>>,
}

impl AnimatorEntry {
    fn is_alive(&self) -> bool {
        self.timer.strong_count() > 0 && self.behavior.strong_count() > 0
    }
}

impl TaskEntry {
    fn is_alive(&self) -> bool {
        self.timer.strong_count() > 0 && self.task.strong_count() > 0
    }
}

struct FrameStats {
    count: u64,
    rate: f64,
    last_tick: Option<Instant>,
}

struct HandlerInner {
    config: TimingConfig,
    animators: RefCell<IndexMap<AnimatorId, AnimatorEntry>>,
    tasks: RefCell<IndexMap<TaskId, TaskEntry>>,
    frame: RefCell<FrameStats>,
}

/// Animator due for dispatch in the current pass
struct Pending {
    id: AnimatorId,
    behavior: Rc<RefCell<dyn Animatable>>,
    timer: Rc<RefCell<SequentialTimer>>,
    firings: u64,
    running: bool,
    external: bool,
}

/// Registry and dispatcher for animators and timing tasks.
///
/// Cloning yields another handle to the same registry. The handler only keeps
/// weak references: dropping an [`Animator`] or [`TimingTask`] removes it.
/// It is single-threaded; callers sharing one across threads must serialize
/// access themselves (the type is `!Send`).
#[derive(Clone)]
pub struct TimingHandler {
    inner: Rc<HandlerInner>,
}

impl TimingHandler {
    /// Create a handler with the default timing configuration
    pub fn new() -> Self {
        Self::build(TimingConfig::default())
    }

    pub fn with_config(config: TimingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: TimingConfig) -> Self {
        let rate = config.initial_frame_rate;
        Self {
            inner: Rc::new(HandlerInner {
                config,
                animators: RefCell::new(IndexMap::new()),
                tasks: RefCell::new(IndexMap::new()),
                frame: RefCell::new(FrameStats {
                    count: 0,
                    rate,
                    last_tick: None,
                }),
            }),
        }
    }

    pub fn config(&self) -> &TimingConfig {
        &self.inner.config
    }

    /// Period given to animators and tasks created against this handler
    pub fn default_period(&self) -> u64 {
        self.inner.config.default_period
    }

    /// Whether both handles refer to the same handler
    pub fn ptr_eq(&self, other: &TimingHandler) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // Animators -->

    /// Register `animator` with this handler, moving it away from any
    /// previous handler. Registering twice is a no-op.
    pub fn register_animatable<A: Animatable + 'static>(&self, animator: &mut Animator<A>) {
        animator.set_timing_handler(self);
    }

    /// Remove an animator from the registry. Returns whether it was present.
    ///
    /// The animator keeps its handler reference, so
    /// [`Animator::timing_handler`] still returns this handler until
    /// [`Animator::clear_timing_handler`] is called; re-register with
    /// [`Animator::set_timing_handler`].
    pub fn unregister_animatable(&self, id: AnimatorId) -> bool {
        let removed = self.inner.animators.borrow_mut().shift_remove(&id).is_some();
        if removed {
            tracing::debug!("Unregistered animator {}", id);
        }
        removed
    }

    pub(crate) fn insert_animator(&self, id: AnimatorId, entry: AnimatorEntry) -> bool {
        // Re-registering keeps the original position.
        let inserted = match self.inner.animators.borrow_mut().entry(id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(entry);
                true
            }
        };
        if inserted {
            tracing::debug!("Registered animator {}", id);
        }
        inserted
    }

    pub fn is_animator_registered(&self, id: AnimatorId) -> bool {
        self.inner.animators.borrow().contains_key(&id)
    }

    pub fn animator_count(&self) -> usize {
        self.inner.animators.borrow().len()
    }

    /// Registered animators in registration order
    pub fn animator_ids(&self) -> Vec<AnimatorId> {
        self.inner.animators.borrow().keys().copied().collect()
    }

    // Tasks -->

    /// Add `task` to this handler's task pool, moving it away from any
    /// previous handler. Registering twice is a no-op.
    pub fn register_task<T: Taskable + 'static>(&self, task: &mut TimingTask<T>) {
        task.set_timing_handler(self);
    }

    pub fn unregister_task(&self, id: TaskId) -> bool {
        let removed = self.inner.tasks.borrow_mut().shift_remove(&id).is_some();
        if removed {
            tracing::debug!("Unregistered task {}", id);
        }
        removed
    }

    pub(crate) fn insert_task(&self, id: TaskId, entry: TaskEntry) -> bool {
        // Re-registering keeps the original position.
        let inserted = match self.inner.tasks.borrow_mut().entry(id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(entry);
                true
            }
        };
        if inserted {
            tracing::debug!("Registered task {}", id);
        }
        inserted
    }

    pub fn is_task_registered(&self, id: TaskId) -> bool {
        self.inner.tasks.borrow().contains_key(&id)
    }

    pub fn task_count(&self) -> usize {
        self.inner.tasks.borrow().len()
    }

    // Frame -->

    /// Approximate frame rate, smoothed over the last frames. Starts at the
    /// configured initial rate and needs a few frames to settle.
    pub fn frame_rate(&self) -> f64 {
        self.inner.frame.borrow().rate
    }

    /// Number of frames handled so far
    pub fn frame_count(&self) -> u64 {
        self.inner.frame.borrow().count
    }

    /// Handle one frame using the time elapsed since the previous `tick`.
    /// The first tick advances timers by zero.
    pub fn tick(&self) -> FrameReport {
        let delta = {
            let now = Instant::now();
            let mut frame = self.inner.frame.borrow_mut();
            match frame.last_tick {
                Some(last) => {
                    let delta =
                        u64::try_from(now.duration_since(last).as_millis()).unwrap_or(u64::MAX);
                    // Carry the sub-millisecond remainder into the next tick.
                    frame.last_tick = last.checked_add(Duration::from_millis(delta)).or(Some(now));
                    delta
                }
                None => {
                    frame.last_tick = Some(now);
                    0
                }
            }
        };
        self.handle(delta)
    }

    /// Main per-frame entry point, to be called once per cycle of the driving
    /// loop with the milliseconds elapsed since the previous call.
    ///
    /// Updates the frame statistics, executes fired tasks, then advances every
    /// registered animator and invokes `animate()` once per firing. Firings
    /// are dispatched in rounds: round `r` visits, in registration order,
    /// every animator with more than `r` firings.
    pub fn handle(&self, delta: u64) -> FrameReport {
        let frame = self.update_frame_stats(delta);
        let tasks_executed = self.execute_tasks(delta);
        let (animations, external) = self.animate(delta);
        self.prune();

        tracing::trace!(
            "Frame {} (delta={}ms): {} animations, {} tasks, {} external",
            frame,
            delta,
            animations,
            tasks_executed,
            external.len()
        );

        FrameReport {
            frame,
            delta,
            animations,
            tasks_executed,
            external,
        }
    }

    fn update_frame_stats(&self, delta: u64) -> u64 {
        let mut frame = self.inner.frame.borrow_mut();
        // The first two frames carry no steady-state delta.
        if frame.count > 1 && delta > 0 {
            let instantaneous = 1000.0 / delta as f64;
            let smoothing = self.inner.config.frame_rate_smoothing;
            frame.rate = frame.rate * smoothing + instantaneous * (1.0 - smoothing);
        }
        frame.count += 1;
        frame.count
    }

    fn execute_tasks(&self, delta: u64) -> u64 {
        // Borrow released before running callbacks so they can touch the pool.
        let snapshot: Vec<(TaskId, TaskEntry)> = self
            .inner
            .tasks
            .borrow()
            .iter()
            .map(|(id, entry)| (*id, entry.clone()))
            .collect();

        let mut executed = 0;
        for (id, entry) in snapshot {
            let (Some(timer), Some(task)) = (entry.timer.upgrade(), entry.task.upgrade()) else {
                continue;
            };
            if !self.is_task_registered(id) {
                continue;
            }

            let (firings, running) = {
                let mut timer = timer.borrow_mut();
                let firings = timer.advance(delta);
                (firings, timer.is_started())
            };

            for _ in 0..firings {
                if running && !timer.borrow().is_started() {
                    break;
                }
                match task.try_borrow_mut() {
                    Ok(mut task) => {
                        task.execute();
                        executed += 1;
                    }
                    Err(_) => {
                        tracing::warn!("Task {} is already executing, skipping firing", id);
                        break;
                    }
                }
                if !self.is_task_registered(id) {
                    break;
                }
            }
        }
        executed
    }

    fn animate(&self, delta: u64) -> (u64, Vec<ExternalFiring>) {
        let snapshot: Vec<(AnimatorId, AnimatorEntry)> = self
            .inner
            .animators
            .borrow()
            .iter()
            .map(|(id, entry)| (*id, entry.clone()))
            .collect();

        // Advance every timer before dispatching anything.
        let mut pending = Vec::new();
        for (id, entry) in snapshot {
            let (Some(timer), Some(behavior)) = (entry.timer.upgrade(), entry.behavior.upgrade())
            else {
                continue;
            };
            let external = match behavior.try_borrow() {
                Ok(behavior) => behavior.external_animation(),
                Err(_) => {
                    tracing::warn!("Animator {} is already animating, skipping frame", id);
                    continue;
                }
            };

            let (firings, running) = {
                let mut timer = timer.borrow_mut();
                let firings = timer.advance(delta);
                (firings, timer.is_started())
            };
            if firings > 0 {
                pending.push(Pending {
                    id,
                    behavior,
                    timer,
                    firings,
                    running,
                    external,
                });
            }
        }

        let external: Vec<ExternalFiring> = pending
            .iter()
            .filter(|p| p.external)
            .map(|p| ExternalFiring {
                animator: p.id,
                firings: p.firings,
            })
            .collect();

        let rounds = pending
            .iter()
            .filter(|p| !p.external)
            .map(|p| p.firings)
            .max()
            .unwrap_or(0);

        let mut animations = 0;
        for round in 0..rounds {
            for p in pending.iter().filter(|p| !p.external && p.firings > round) {
                if !self.is_animator_registered(p.id) {
                    continue;
                }
                if p.running && !p.timer.borrow().is_started() {
                    continue;
                }
                match p.behavior.try_borrow_mut() {
                    Ok(mut behavior) => {
                        behavior.animate();
                        animations += 1;
                    }
                    Err(_) => {
                        tracing::warn!("Animator {} is already animating, skipping firing", p.id);
                    }
                }
            }
        }

        (animations, external)
    }

    /// Drop registry entries whose owners no longer exist
    fn prune(&self) {
        let mut animators = self.inner.animators.borrow_mut();
        let before = animators.len();
        animators.retain(|_, entry| entry.is_alive());
        let mut tasks = self.inner.tasks.borrow_mut();
        let tasks_before = tasks.len();
        tasks.retain(|_, entry| entry.is_alive());

        let pruned = (before - animators.len()) + (tasks_before - tasks.len());
        if pruned > 0 {
            tracing::debug!("Pruned {} dropped registry entries", pruned);
        }
    }
}

impl Default for TimingHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TimingHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimingHandler")
            .field("config", &self.inner.config)
            .field("animators", &self.animator_count())
            .field("tasks", &self.task_count())
            .field("frame_count", &self.frame_count())
            .field("frame_rate", &self.frame_rate())
            .finish()
    }
}
