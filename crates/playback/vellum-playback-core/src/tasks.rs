//! FIFO queue of caller actions gated on lifecycle milestones.
//!
//! The head task blocks everything behind it. When a milestone fires, the head is
//! popped and run while it is gated on that milestone; draining stops at the first
//! task waiting on something else.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;

use log::debug;

use crate::events::EventKind;

pub type Action = Box<dyn FnOnce()>;

/// A pending action gated on a milestone. Marker tasks carry no action.
pub struct Task {
    pub milestone: EventKind,
    pub action: Option<Action>,
}

impl Task {
    pub fn new(milestone: EventKind, action: Action) -> Self {
        Self {
            milestone,
            action: Some(action),
        }
    }

    pub fn marker(milestone: EventKind) -> Self {
        Self {
            milestone,
            action: None,
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("milestone", &self.milestone)
            .field("action", &self.action.is_some())
            .finish()
    }
}

#[derive(Default)]
pub struct TaskQueue {
    tasks: RefCell<VecDeque<Task>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, milestone: EventKind, action: Action) {
        self.tasks.borrow_mut().push_back(Task::new(milestone, action));
    }

    pub fn enqueue_marker(&self, milestone: EventKind) {
        self.tasks.borrow_mut().push_back(Task::marker(milestone));
    }

    /// Drain from the head. `None` drains unconditionally; `Some(m)` drains while
    /// the head is gated on `m`. Actions run without the queue borrowed, so they
    /// may enqueue or advance again. Returns the number of tasks popped.
    pub fn advance(&self, fired: Option<EventKind>) -> usize {
        let mut drained = 0;
        loop {
            let next = {
                let mut tasks = self.tasks.borrow_mut();
                match tasks.front() {
                    Some(head) if fired.map_or(true, |m| head.milestone == m) => tasks.pop_front(),
                    _ => None,
                }
            };
            let Some(task) = next else { break };
            drained += 1;
            debug!("task queue: releasing task gated on {}", task.milestone);
            if let Some(action) = task.action {
                action();
            }
        }
        drained
    }

    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }

    /// Milestones of the queued tasks, head first.
    pub fn pending(&self) -> Vec<EventKind> {
        self.tasks.borrow().iter().map(|t| t.milestone).collect()
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.tasks.borrow().iter()).finish()
    }
}
