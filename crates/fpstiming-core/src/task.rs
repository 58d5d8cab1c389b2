//! Timing tasks - callbacks scheduled once or periodically

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use crate::handler::{TaskEntry, TaskId, TimingHandler};
use crate::models::SequentialTimer;
use crate::Result;

/// Callback executed by a [`TimingTask`] when its timer fires.
pub trait Taskable {
    fn execute(&mut self);
}

impl<F: FnMut()> Taskable for F {
    fn execute(&mut self) {
        self()
    }
}

/// A [`Taskable`] held in a handler's task pool together with its timer.
///
/// Tasks are created stopped; [`TimingTask::run`] schedules them periodically
/// and [`TimingTask::run_once`] schedules a single execution.
pub struct TimingTask<T: Taskable + 'static> {
    id: TaskId,
    timer: Rc<RefCell<SequentialTimer>>,
    task: Rc<RefCell<T>>,
    handler: Option<TimingHandler>,
}

impl<T: Taskable + 'static> TimingTask<T> {
    pub fn new(task: T, handler: &TimingHandler) -> Self {
        let mut timing_task = Self {
            id: TaskId::new(),
            timer: Rc::new(RefCell::new(SequentialTimer::stopped(
                handler.default_period(),
            ))),
            task: Rc::new(RefCell::new(task)),
            handler: None,
        };
        timing_task.set_timing_handler(handler);
        timing_task
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Execute the task every `period` milliseconds.
    pub fn run(&self, period: u64) -> Result<()> {
        let mut timer = self.timer.borrow_mut();
        timer.run(period)?;
        timer.set_single_shot(false);
        Ok(())
    }

    /// Execute the task once, `period` milliseconds from now.
    pub fn run_once(&self, period: u64) -> Result<()> {
        let mut timer = self.timer.borrow_mut();
        timer.run(period)?;
        timer.set_single_shot(true);
        Ok(())
    }

    pub fn stop(&self) {
        self.timer.borrow_mut().stop();
    }

    /// Stop the task and remove it from its handler's task pool.
    pub fn cancel(&mut self) {
        self.stop();
        if let Some(handler) = self.handler.take() {
            handler.unregister_task(self.id);
        }
    }

    /// Run the task immediately, outside of its schedule.
    pub fn execute(&self) {
        self.task.borrow_mut().execute();
    }

    pub fn is_active(&self) -> bool {
        self.timer.borrow().is_started()
    }

    pub fn period(&self) -> u64 {
        self.timer.borrow().period()
    }

    pub fn timer(&self) -> SequentialTimer {
        *self.timer.borrow()
    }

    pub fn task(&self) -> Ref<'_, T> {
        self.task.borrow()
    }

    pub fn task_mut(&self) -> RefMut<'_, T> {
        self.task.borrow_mut()
    }

    pub fn set_timing_handler(&mut self, handler: &TimingHandler) {
        if let Some(previous) = self.handler.take() {
            if !previous.ptr_eq(handler) {
                previous.unregister_task(self.id);
            }
        }
        let task: Rc<RefCell<dyn Taskable>> = self.task.clone();
        handler.insert_task(
            self.id,
            TaskEntry {
                timer: Rc::downgrade(&self.timer),
                task: Rc::downgrade(&task),
            },
        );
        self.handler = Some(handler.clone());
    }

    pub fn timing_handler(&self) -> Option<&TimingHandler> {
        self.handler.as_ref()
    }
}

impl<T: Taskable + 'static> Drop for TimingTask<T> {
    fn drop(&mut self) {
        if let Some(handler) = self.handler.take() {
            handler.unregister_task(self.id);
        }
    }
}

impl<T: Taskable + 'static> fmt::Debug for TimingTask<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimingTask")
            .field("id", &self.id)
            .field("timer", &*self.timer.borrow())
            .field("attached", &self.handler.is_some())
            .finish()
    }
}
