//! Per-task run coalescing for the watch loop.
//!
//! A change for a task that is not running starts it. A change for a task
//! that is running marks it dirty; when the run finishes it runs once more,
//! however many changes arrived meanwhile. Different tasks never wait on
//! each other.

use crate::graph::Task;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Running,
    Dirty,
}

#[derive(Debug, Default)]
pub struct Coalescer {
    slots: Mutex<HashMap<Task, Slot>>,
}

impl Coalescer {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<Task, Slot>> {
        self.slots.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Register a change. Returns `true` when the caller should start a run.
    pub fn begin(&self, task: Task) -> bool {
        let mut slots = self.slots();
        match slots.get(&task) {
            None => {
                slots.insert(task, Slot::Running);
                true
            }
            Some(_) => {
                tracing::debug!(task = %task, "Already running, queued one more run");
                slots.insert(task, Slot::Dirty);
                false
            }
        }
    }

    /// A run finished. Returns `true` when the task must run again.
    pub fn finish(&self, task: Task) -> bool {
        let mut slots = self.slots();
        match slots.get(&task) {
            Some(Slot::Dirty) => {
                slots.insert(task, Slot::Running);
                true
            }
            _ => {
                slots.remove(&task);
                false
            }
        }
    }

    pub fn is_running(&self, task: Task) -> bool {
        self.slots().contains_key(&task)
    }

    /// Drive `run` for `task` until no change arrived during the last run.
    ///
    /// Call only after [`Coalescer::begin`] returned `true`.
    pub fn drive(&self, task: Task, mut run: impl FnMut()) -> usize {
        let mut runs = 0;
        loop {
            run();
            runs += 1;
            if !self.finish(task) {
                return runs;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn idle_task_starts_immediately() {
        let c = Coalescer::new();
        assert!(c.begin(Task::Assemble));
        assert!(c.is_running(Task::Assemble));
        assert!(!c.finish(Task::Assemble));
        assert!(!c.is_running(Task::Assemble));
    }

    #[test]
    fn many_changes_during_run_yield_one_rerun() {
        let c = Coalescer::new();
        assert!(c.begin(Task::Scripts));
        assert!(!c.begin(Task::Scripts));
        assert!(!c.begin(Task::Scripts));
        assert!(!c.begin(Task::Scripts));
        assert!(c.finish(Task::Scripts));
        assert!(!c.finish(Task::Scripts));
    }

    #[test]
    fn different_tasks_are_independent() {
        let c = Coalescer::new();
        assert!(c.begin(Task::Svgs));
        assert!(c.begin(Task::Fonts));
        assert!(!c.finish(Task::Fonts));
        assert!(c.is_running(Task::Svgs));
    }

    #[test]
    fn event_during_run_drives_exactly_one_follow_up() {
        let c = Arc::new(Coalescer::new());
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        assert!(c.begin(Task::StylesToolkit));
        let worker = {
            let c = c.clone();
            thread::spawn(move || {
                c.drive(Task::StylesToolkit, || {
                    started_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                })
            })
        };

        started_rx.recv().unwrap();
        assert!(!c.begin(Task::StylesToolkit));
        assert!(!c.begin(Task::StylesToolkit));
        release_tx.send(()).unwrap();

        started_rx.recv().unwrap();
        release_tx.send(()).unwrap();

        assert_eq!(worker.join().unwrap(), 2);
        assert!(!c.is_running(Task::StylesToolkit));
    }
}
