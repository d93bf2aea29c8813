//! Cooperative tasks driven by an external tick.
//!
//! A [`Routine`] is a hand-written state machine. Each time it is resumed it
//! does some work on the shared context and either finishes or says what it
//! is waiting for. The [`Scheduler`] owns every running routine, resumes the
//! ones whose wait is over once per tick, and lets routines start, join and
//! stop each other.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use bevy::prelude::*;

/// Handle to a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Suspension point of a routine.
#[derive(Debug, Clone, PartialEq)]
pub enum Wait {
    /// Resume on the next tick.
    NextFrame,
    /// Resume once this much time has passed.
    Seconds(f32),
    /// Resume once none of these tasks is registered any more.
    Join(Vec<TaskId>),
}

/// What a routine reports back after being resumed.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Yield(Wait),
    Done,
}

impl Step {
    pub fn next_frame() -> Self {
        Self::Yield(Wait::NextFrame)
    }

    pub fn seconds(seconds: f32) -> Self {
        Self::Yield(Wait::Seconds(seconds))
    }

    pub fn join(tasks: Vec<TaskId>) -> Self {
        Self::Yield(Wait::Join(tasks))
    }
}

/// A resumable unit of work over context `C`.
pub trait Routine<C>: Send + Sync {
    fn resume(&mut self, cx: &mut C, tasks: &mut Scheduler<C>) -> Step;

    /// Called when the task is stopped before finishing.
    fn on_stop(&mut self, _cx: &mut C) {}
}

impl<C, F> Routine<C> for F
where
    F: FnMut(&mut C, &mut Scheduler<C>) -> Step + Send + Sync,
{
    fn resume(&mut self, cx: &mut C, tasks: &mut Scheduler<C>) -> Step {
        self(cx, tasks)
    }
}

struct Task<C> {
    name: &'static str,
    routine: Box<dyn Routine<C>>,
    /// `None` until the first resume.
    wait: Option<Wait>,
    paused: bool,
}

/// Owner of every running task.
pub struct Scheduler<C> {
    next: u64,
    tasks: BTreeMap<TaskId, Task<C>>,
    /// Started during the current tick, still to be run in it.
    spawned: Vec<TaskId>,
}

impl<C> Default for Scheduler<C> {
    fn default() -> Self {
        Self {
            next: 0,
            tasks: BTreeMap::new(),
            spawned: Vec::new(),
        }
    }
}

impl<C> fmt::Debug for Scheduler<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.tasks.iter().map(|(id, t)| (id, t.name)))
            .finish()
    }
}

impl<C> Scheduler<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a routine. It first runs on the current tick if one is in
    /// progress, otherwise on the next one.
    pub fn spawn(&mut self, name: &'static str, routine: impl Routine<C> + 'static) -> TaskId {
        self.next += 1;
        let id = TaskId(self.next);
        self.tasks.insert(
            id,
            Task {
                name,
                routine: Box::new(routine),
                wait: None,
                paused: false,
            },
        );
        self.spawned.push(id);
        debug!("Task {} `{}` started", id, name);
        id
    }

    /// Deregister a task right away. Returns false if it was not running.
    pub fn stop(&mut self, id: TaskId, cx: &mut C) -> bool {
        let Some(mut task) = self.tasks.remove(&id) else {
            return false;
        };
        debug!("Task {} `{}` stopped", id, task.name);
        task.routine.on_stop(cx);
        true
    }

    /// Stop every task, oldest first.
    pub fn stop_all(&mut self, cx: &mut C) {
        while let Some((&id, _)) = self.tasks.first_key_value() {
            self.stop(id, cx);
        }
        self.spawned.clear();
    }

    /// Freeze a task. It stays registered but makes no progress.
    pub fn pause(&mut self, id: TaskId) -> bool {
        self.set_paused(id, true)
    }

    pub fn unpause(&mut self, id: TaskId) -> bool {
        self.set_paused(id, false)
    }

    fn set_paused(&mut self, id: TaskId, paused: bool) -> bool {
        match self.tasks.get_mut(&id) {
            Some(task) => {
                task.paused = paused;
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, id: TaskId) -> bool {
        self.tasks.contains_key(&id)
    }

    pub fn is_paused(&self, id: TaskId) -> bool {
        self.tasks.get(&id).is_some_and(|t| t.paused)
    }

    /// True once none of `ids` is registered.
    pub fn is_finished(&self, ids: &[TaskId]) -> bool {
        ids.iter().all(|id| !self.tasks.contains_key(id))
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Advance every task by `dt` seconds.
    ///
    /// Tasks run in start order. A task started during the tick runs in the
    /// same tick with no elapsed time.
    pub fn tick(&mut self, cx: &mut C, dt: f32) {
        self.spawned.clear();
        let mut queue: VecDeque<(TaskId, f32)> = self.tasks.keys().map(|&id| (id, dt)).collect();

        while let Some((id, dt)) = queue.pop_front() {
            // Stopped by an earlier task this tick.
            let Some(mut task) = self.tasks.remove(&id) else {
                continue;
            };

            if task.paused || !self.wait_over(&mut task.wait, dt) {
                self.tasks.insert(id, task);
                continue;
            }

            match task.routine.resume(cx, self) {
                Step::Yield(wait) => {
                    task.wait = Some(wait);
                    self.tasks.insert(id, task);
                }
                Step::Done => debug!("Task {} `{}` finished", id, task.name),
            }

            queue.extend(self.spawned.drain(..).map(|id| (id, 0.0)));
        }
    }

    fn wait_over(&self, wait: &mut Option<Wait>, dt: f32) -> bool {
        match wait {
            None | Some(Wait::NextFrame) => true,
            Some(Wait::Seconds(remaining)) => {
                *remaining -= dt;
                *remaining <= 0.0
            }
            Some(Wait::Join(ids)) => self.is_finished(ids),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Log(Vec<&'static str>);

    struct Sleeper {
        slept: bool,
    }

    impl Routine<Log> for Sleeper {
        fn resume(&mut self, cx: &mut Log, _tasks: &mut Scheduler<Log>) -> Step {
            if self.slept {
                cx.0.push("woke");
                return Step::Done;
            }
            self.slept = true;
            cx.0.push("sleeping");
            Step::seconds(0.5)
        }

        fn on_stop(&mut self, cx: &mut Log) {
            cx.0.push("stopped");
        }
    }

    #[test]
    fn seconds_wait_counts_down_across_ticks() {
        let mut log = Log::default();
        let mut tasks = Scheduler::new();
        let id = tasks.spawn("sleeper", Sleeper { slept: false });

        tasks.tick(&mut log, 0.1);
        assert_eq!(log.0, ["sleeping"]);
        tasks.tick(&mut log, 0.3);
        assert!(tasks.is_running(id));
        tasks.tick(&mut log, 0.3);
        assert_eq!(log.0, ["sleeping", "woke"]);
        assert!(tasks.is_finished(&[id]));
    }

    #[test]
    fn stop_deregisters_and_notifies() {
        let mut log = Log::default();
        let mut tasks = Scheduler::new();
        let id = tasks.spawn("sleeper", Sleeper { slept: false });
        tasks.tick(&mut log, 0.0);

        assert!(tasks.stop(id, &mut log));
        assert!(!tasks.is_running(id));
        assert!(!tasks.stop(id, &mut log));
        assert_eq!(log.0, ["sleeping", "stopped"]);
    }

    #[test]
    fn paused_task_keeps_its_place() {
        let mut log = Log::default();
        let mut tasks = Scheduler::new();
        let id = tasks.spawn("sleeper", Sleeper { slept: false });
        tasks.tick(&mut log, 0.0);

        tasks.pause(id);
        tasks.tick(&mut log, 10.0);
        assert!(tasks.is_running(id));
        assert!(tasks.is_paused(id));
        assert_eq!(log.0, ["sleeping"]);

        tasks.unpause(id);
        tasks.tick(&mut log, 0.5);
        assert_eq!(log.0, ["sleeping", "woke"]);
    }

    #[test]
    fn join_waits_for_every_child() {
        let mut log = Log::default();
        let mut tasks = Scheduler::new();

        let mut children: Option<Vec<TaskId>> = None;
        tasks.spawn("parent", move |cx: &mut Log, tasks: &mut Scheduler<Log>| {
            if let Some(ids) = &children {
                assert!(tasks.is_finished(ids));
                cx.0.push("joined");
                return Step::Done;
            }
            let ids = vec![
                tasks.spawn("a", Sleeper { slept: false }),
                tasks.spawn("b", |cx: &mut Log, _: &mut Scheduler<Log>| {
                    cx.0.push("quick");
                    Step::Done
                }),
            ];
            children = Some(ids.clone());
            Step::join(ids)
        });

        // Children start within the same tick as the parent.
        tasks.tick(&mut log, 0.0);
        assert_eq!(log.0, ["sleeping", "quick"]);

        tasks.tick(&mut log, 0.2);
        assert!(!log.0.contains(&"joined"));

        tasks.tick(&mut log, 0.4);
        tasks.tick(&mut log, 0.0);
        assert_eq!(log.0, ["sleeping", "quick", "woke", "joined"]);
        assert!(tasks.is_empty());
    }

    #[test]
    fn stop_all_empties_the_scheduler() {
        let mut log = Log::default();
        let mut tasks = Scheduler::new();
        tasks.spawn("one", Sleeper { slept: false });
        tasks.spawn("two", Sleeper { slept: false });
        tasks.tick(&mut log, 0.0);

        tasks.stop_all(&mut log);
        assert!(tasks.is_empty());
        assert_eq!(log.0, ["sleeping", "sleeping", "stopped", "stopped"]);
    }
}
