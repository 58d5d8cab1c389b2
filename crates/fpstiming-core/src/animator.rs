//! Animated objects

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use crate::handler::{AnimatorEntry, AnimatorId, TimingHandler};
use crate::models::SequentialTimer;
use crate::Result;

/// Behavior run periodically by a [`TimingHandler`].
pub trait Animatable {
    /// Main animation callback
    fn animate(&mut self);

    /// Whether `animate()` is driven by an external registrar instead of the
    /// handler. The handler still advances the timer of such objects and
    /// reports their firings in the [`crate::FrameReport`].
    fn external_animation(&self) -> bool {
        false
    }
}

/// An [`Animatable`] paired with its own [`SequentialTimer`] and the handler
/// that ticks it.
///
/// The animator owns the behavior and the timer; the handler only holds weak
/// references to them, so dropping the animator unregisters it.
pub struct Animator<A: Animatable + 'static> {
    id: AnimatorId,
    timer: Rc<RefCell<SequentialTimer>>,
    behavior: Rc<RefCell<A>>,
    handler: Option<TimingHandler>,
}

impl<A: Animatable + 'static> Animator<A> {
    /// Create a stopped animator registered with `handler`, using the
    /// handler's default period.
    pub fn new(behavior: A, handler: &TimingHandler) -> Self {
        let timer = SequentialTimer::stopped(handler.default_period());
        let mut animator = Self::build(behavior, timer);
        animator.set_timing_handler(handler);
        animator
    }

    pub fn with_period(behavior: A, handler: &TimingHandler, period: u64) -> Result<Self> {
        let timer = SequentialTimer::new(period)?;
        let mut animator = Self::build(behavior, timer);
        animator.set_timing_handler(handler);
        Ok(animator)
    }

    /// Create an animator that is not attached to any handler yet.
    pub fn detached(behavior: A, period: u64) -> Result<Self> {
        let timer = SequentialTimer::new(period)?;
        Ok(Self::build(behavior, timer))
    }

    fn build(behavior: A, timer: SequentialTimer) -> Self {
        Self {
            id: AnimatorId::new(),
            timer: Rc::new(RefCell::new(timer)),
            behavior: Rc::new(RefCell::new(behavior)),
            handler: None,
        }
    }

    pub fn id(&self) -> AnimatorId {
        self.id
    }

    /// Run the animation callback once, outside of the handler's cadence.
    pub fn animate(&self) {
        self.behavior.borrow_mut().animate();
    }

    pub fn external_animation(&self) -> bool {
        self.behavior.borrow().external_animation()
    }

    /// Animation period in milliseconds
    pub fn animation_period(&self) -> u64 {
        self.timer.borrow().period()
    }

    pub fn set_animation_period(&self, period: u64) -> Result<()> {
        self.timer.borrow_mut().set_period(period)?;
        tracing::debug!("Animator {} period set to {}ms", self.id, period);
        Ok(())
    }

    /// Set the period and restart the animation if `restart` is true.
    pub fn set_animation_period_with_restart(&self, period: u64, restart: bool) -> Result<()> {
        self.timer
            .borrow_mut()
            .set_period_and_restart(period, restart)?;
        tracing::debug!(
            "Animator {} period set to {}ms (restart={})",
            self.id,
            period,
            restart
        );
        Ok(())
    }

    pub fn start_animation(&self) {
        self.timer.borrow_mut().start();
    }

    pub fn stop_animation(&self) {
        self.timer.borrow_mut().stop();
    }

    /// Stop then start the animation, counting the period from zero again.
    pub fn restart_animation(&self) {
        self.timer.borrow_mut().restart();
    }

    pub fn toggle_animation(&self) {
        if self.animation_is_started() {
            self.stop_animation();
        } else {
            self.start_animation();
        }
    }

    pub fn animation_is_started(&self) -> bool {
        self.timer.borrow().is_started()
    }

    /// Attach to `handler`, leaving the previous handler if there was one.
    pub fn set_timing_handler(&mut self, handler: &TimingHandler) {
        if let Some(previous) = self.handler.take() {
            if !previous.ptr_eq(handler) {
                previous.unregister_animatable(self.id);
            }
        }
        handler.insert_animator(self.id, self.entry());
        self.handler = Some(handler.clone());
    }

    /// Detach from the current handler, if any.
    pub fn clear_timing_handler(&mut self) {
        if let Some(previous) = self.handler.take() {
            previous.unregister_animatable(self.id);
        }
    }

    /// Handler this animator was last attached to.
    ///
    /// Removing the animator through [`TimingHandler::unregister_animatable`]
    /// does not clear this reference; check
    /// [`TimingHandler::is_animator_registered`] for membership.
    pub fn timing_handler(&self) -> Option<&TimingHandler> {
        self.handler.as_ref()
    }

    /// Snapshot of the sequential timer
    pub fn timer(&self) -> SequentialTimer {
        *self.timer.borrow()
    }

    pub fn behavior(&self) -> Ref<'_, A> {
        self.behavior.borrow()
    }

    pub fn behavior_mut(&self) -> RefMut<'_, A> {
        self.behavior.borrow_mut()
    }

    fn entry(&self) -> AnimatorEntry {
        let behavior: Rc<RefCell<dyn Animatable>> = self.behavior.clone();
        AnimatorEntry {
            timer: Rc::downgrade(&self.timer),
            behavior: Rc::downgrade(&behavior),
        }
    }
}

impl<A: Animatable + 'static> Drop for Animator<A> {
    fn drop(&mut self) {
        self.clear_timing_handler();
    }
}

impl<A: Animatable + 'static> fmt::Debug for Animator<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Animator")
            .field("id", &self.id)
            .field("timer", &*self.timer.borrow())
            .field("attached", &self.handler.is_some())
            .finish()
    }
}
