//! Deferred native mutations, drained once per commit in priority order.
//!
//! Tree-mutation calls never touch the native tree directly when doing so mid-diff could
//! reparent a widget illegally. They enqueue a [`DeferredAction`] instead and the commit ends
//! with [`flush`], which runs removals before additions before bulk model syncs.

use core::cell::{Cell, RefCell};
use core::fmt;
use std::collections::VecDeque;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::native::Toolkit;

/// Queue an action runs on. Higher levels drain first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    /// Removal and unparenting.
    High,
    /// Additions.
    Normal,
    /// Bulk model synchronisation.
    Low,
}

impl Priority {
    const ALL: [Self; 3] = [Self::High, Self::Normal, Self::Low];

    const fn index(self) -> usize {
        match self {
            Self::High => 0,
            Self::Normal => 1,
            Self::Low => 2,
        }
    }
}

/// A callback scheduled at most once until it runs.
pub struct DeferredAction {
    callback: RefCell<Box<dyn FnMut()>>,
    priority: Priority,
    label: &'static str,
    scheduled: Cell<bool>,
}

impl fmt::Debug for DeferredAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredAction")
            .field("priority", &self.priority)
            .field("label", &self.label)
            .field("scheduled", &self.scheduled.get())
            .finish_non_exhaustive()
    }
}

impl DeferredAction {
    /// Creates a reusable action.
    pub fn new(priority: Priority, label: &'static str, callback: impl FnMut() + 'static) -> Rc<Self> {
        Rc::new(Self {
            callback: RefCell::new(Box::new(callback)),
            priority,
            label,
            scheduled: Cell::new(false),
        })
    }

    /// The queue the action runs on.
    #[must_use]
    pub const fn priority(&self) -> Priority {
        self.priority
    }

    /// Returns `true` while the action waits in a queue.
    #[must_use]
    pub fn is_scheduled(&self) -> bool {
        self.scheduled.get()
    }

    fn run(&self) {
        self.scheduled.set(false);
        match self.callback.try_borrow_mut() {
            Ok(mut callback) => (*callback)(),
            Err(_) => trace!(label = self.label, "action re-entered itself; skipped"),
        }
    }
}

#[derive(Default)]
struct Queues {
    levels: [VecDeque<Rc<DeferredAction>>; 3],
    flushing: bool,
    idle_pending: bool,
}

impl Queues {
    fn pop(&mut self) -> Option<Rc<DeferredAction>> {
        Priority::ALL
            .iter()
            .find_map(|priority| self.levels[priority.index()].pop_front())
    }
}

thread_local! {
    static QUEUES: RefCell<Queues> = RefCell::new(Queues::default());
}

/// Enqueues `action` unless it is already pending. Returns `true` if it was enqueued.
pub fn schedule(action: &Rc<DeferredAction>) -> bool {
    if action.scheduled.replace(true) {
        trace!(label = action.label, "already scheduled");
        return false;
    }
    QUEUES.with_borrow_mut(|queues| {
        queues.levels[action.priority.index()].push_back(action.clone());
    });
    true
}

/// Enqueues a one-off callback.
pub fn defer(priority: Priority, label: &'static str, callback: impl FnOnce() + 'static) {
    let mut callback = Some(callback);
    let action = DeferredAction::new(priority, label, move || {
        if let Some(callback) = callback.take() {
            callback();
        }
    });
    schedule(&action);
}

/// Runs every pending action, including ones scheduled while flushing, highest priority first.
///
/// After each action the queues are re-checked from [`Priority::High`]. A nested call while a
/// flush is running returns immediately. Returns the number of actions run.
pub fn flush() -> usize {
    let entered = QUEUES.with_borrow_mut(|queues| !core::mem::replace(&mut queues.flushing, true));
    if !entered {
        return 0;
    }
    let _guard = FlushGuard;

    let mut ran = 0;
    loop {
        let Some(action) = QUEUES.with_borrow_mut(Queues::pop) else {
            break;
        };
        trace!(label = action.label, priority = ?action.priority, "running deferred action");
        action.run();
        ran += 1;
    }

    if ran > 0 {
        debug!(actions = ran, "flushed deferred actions");
    }
    ran
}

/// Clears the flushing flag when a flush ends, including by unwinding out of an action.
struct FlushGuard;

impl Drop for FlushGuard {
    fn drop(&mut self) {
        QUEUES.with_borrow_mut(|queues| queues.flushing = false);
    }
}

/// Returns `true` while [`flush`] is running.
#[must_use]
pub fn is_flushing() -> bool {
    QUEUES.with_borrow(|queues| queues.flushing)
}

/// Number of actions waiting to run.
#[must_use]
pub fn pending() -> usize {
    QUEUES.with_borrow(|queues| queues.levels.iter().map(VecDeque::len).sum())
}

/// Requests a [`flush`] once the toolkit main loop is idle. Coalesces repeated requests.
pub fn flush_soon(toolkit: &Rc<dyn Toolkit>) {
    let already = QUEUES.with_borrow_mut(|queues| core::mem::replace(&mut queues.idle_pending, true));
    if already {
        return;
    }
    toolkit.idle_add(Box::new(|| {
        QUEUES.with_borrow_mut(|queues| queues.idle_pending = false);
        flush();
    }));
}

/// Drops every pending action.
pub fn reset() {
    let dropped = QUEUES.with_borrow_mut(core::mem::take);
    for action in dropped.levels.iter().flatten() {
        action.scheduled.set(false);
    }
}
