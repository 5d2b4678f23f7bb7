//! Task scheduling
//!
//! The driver owns one schedule record per periodic task and a round-robin
//! cursor over them. Each tick advances the cursor by one slot and the task in
//! that slot runs only if its period has elapsed. Time is passed in as a plain
//! [`Duration`] since the clock origin, so ordering and timing can be tested
//! without a clock.

use serde::Serialize;
use std::time::Duration;

use crate::protocol::StatusQuery;

/// Periodic work items, in round-robin order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Task {
    KeepAlive,
    Query(StatusQuery),
}

impl Task {
    /// Round-robin order: keep-alive first, then the status queries
    pub const ALL: [Task; 6] = [
        Task::KeepAlive,
        Task::Query(StatusQuery::Flags),
        Task::Query(StatusQuery::DriveLevels),
        Task::Query(StatusQuery::Sensors),
        Task::Query(StatusQuery::Counters),
        Task::Query(StatusQuery::OperatingState),
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Task::KeepAlive => "keep_alive",
            Task::Query(q) => q.name(),
        }
    }
}

/// Period and last run time of one task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSchedule {
    pub task: Task,
    pub period: Duration,
    last_run: Option<Duration>,
}

impl TaskSchedule {
    /// A task that has never run; it is due immediately
    pub fn new(task: Task, period: Duration) -> Self {
        Self {
            task,
            period,
            last_run: None,
        }
    }

    pub fn last_run(&self) -> Option<Duration> {
        self.last_run
    }

    pub fn due(&self, now: Duration) -> bool {
        match self.last_run {
            None => true,
            Some(last) => now.saturating_sub(last) >= self.period,
        }
    }

    /// Record a run at `now`.
    ///
    /// The nominal start time advances by exactly one period so the cadence
    /// does not drift with tick jitter. A task more than one period behind
    /// restarts from `now` instead of catching up in a burst.
    pub fn mark_run(&mut self, now: Duration) {
        let next = match self.last_run {
            None => now,
            Some(last) => {
                let next = last + self.period;
                if now.saturating_sub(next) >= self.period {
                    now
                } else {
                    next
                }
            }
        };
        self.last_run = Some(next);
    }
}

/// Round-robin over the task schedules
#[derive(Debug, Clone)]
pub struct Scheduler {
    tasks: Vec<TaskSchedule>,
    cursor: usize,
}

impl Scheduler {
    pub fn new(tasks: Vec<TaskSchedule>) -> Self {
        Self { tasks, cursor: 0 }
    }

    /// All six tasks with the given keep-alive period and query periods
    pub fn with_periods(
        keep_alive: Duration,
        query_period: impl Fn(StatusQuery) -> Duration,
    ) -> Self {
        let tasks = Task::ALL
            .iter()
            .map(|&task| {
                let period = match task {
                    Task::KeepAlive => keep_alive,
                    Task::Query(q) => query_period(q),
                };
                TaskSchedule::new(task, period)
            })
            .collect();
        Self::new(tasks)
    }

    pub fn tasks(&self) -> &[TaskSchedule] {
        &self.tasks
    }

    pub fn schedule(&self, task: Task) -> Option<&TaskSchedule> {
        self.tasks.iter().find(|s| s.task == task)
    }

    /// Advance the cursor by one slot and return that task if it is due.
    ///
    /// A returned task is already marked as run; at most one task is
    /// returned per call.
    pub fn next(&mut self, now: Duration) -> Option<Task> {
        let len = self.tasks.len();
        if len == 0 {
            return None;
        }
        let slot = &mut self.tasks[self.cursor];
        self.cursor = (self.cursor + 1) % len;
        if slot.due(now) {
            slot.mark_run(now);
            Some(slot.task)
        } else {
            None
        }
    }
}
