//! Execution history recorder
//!
//! Collapses the per-tick event stream into Gantt-style segments: one segment
//! per uninterrupted stretch of execution of a task, plus the ticks at which
//! each task missed a deadline. Idle ticks leave gaps. The task parameters
//! seen in the first event are kept so release and deadline ticks can be
//! laid out alongside the segments.

use serde::{Deserialize, Serialize};

use crate::events::{EngineSnapshot, EventSink};
use crate::types::{Task, TaskId, TaskParams, Ticks};

/// Uninterrupted execution of one task over `[start, start + length)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub task: TaskId,
    pub start: Ticks,
    pub length: Ticks,
}

impl Segment {
    pub fn end(&self) -> Ticks {
        self.start + self.length
    }
}

/// Deadline miss marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Miss {
    pub task: TaskId,
    pub tick: Ticks,
}

/// Deadline of one job and whether it was missed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlineMark {
    pub tick: Ticks,
    pub missed: bool,
}

/// Execution history built from simulation events
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    /// Per-task segments, in time order
    pub segments: Vec<Vec<Segment>>,
    pub misses: Vec<Miss>,
    /// Parameters of the observed task set
    pub tasks: Vec<TaskParams>,
    /// Ticks observed so far
    pub length: Ticks,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.segments.clear();
        self.misses.clear();
        self.tasks.clear();
        self.length = 0;
    }

    /// Segments of one task (empty if it never ran)
    pub fn task_segments(&self, task: TaskId) -> &[Segment] {
        self.segments.get(task).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ticks spent running `task`
    pub fn busy_ticks(&self, task: TaskId) -> Ticks {
        self.task_segments(task).iter().map(|s| s.length).sum()
    }

    /// Number of times execution switched from one task to another
    pub fn context_switches(&self) -> usize {
        let mut all: Vec<&Segment> = self.segments.iter().flatten().collect();
        all.sort_by_key(|s| s.start);
        all.windows(2)
            .filter(|w| w[0].task != w[1].task && w[0].end() == w[1].start)
            .count()
    }

    /// Job release ticks of `task` within the recorded window
    pub fn releases(&self, task: TaskId) -> Vec<Ticks> {
        let Some(params) = self.tasks.get(task) else {
            return Vec::new();
        };
        (0..self.length)
            .step_by(params.period.max(1) as usize)
            .collect()
    }

    /// Deadline ticks (`release + deadline`) of `task` up to the end of the
    /// recorded window, each flagged if a miss was reported there
    pub fn deadlines(&self, task: TaskId) -> Vec<DeadlineMark> {
        let Some(params) = self.tasks.get(task) else {
            return Vec::new();
        };
        self.releases(task)
            .into_iter()
            .map(|release| release + params.deadline)
            .filter(|&tick| tick <= self.length)
            .map(|tick| DeadlineMark {
                tick,
                missed: self.misses.contains(&Miss { task, tick }),
            })
            .collect()
    }

    fn ensure_task(&mut self, task: TaskId) {
        if self.segments.len() <= task {
            self.segments.resize_with(task + 1, Vec::new);
        }
    }
}

impl EventSink for Timeline {
    fn on_task_executed(&mut self, snapshot: &EngineSnapshot<'_>, task: Option<TaskId>) {
        let tick = snapshot.tick;
        self.length = self.length.max(tick + 1);
        if self.tasks.is_empty() {
            self.tasks = snapshot.tasks.iter().map(Task::params).collect();
        }

        let Some(task) = task else {
            return;
        };
        self.ensure_task(task);

        let segments = &mut self.segments[task];
        match segments.last_mut() {
            Some(last) if last.end() == tick => last.length += 1,
            _ => segments.push(Segment {
                task,
                start: tick,
                length: 1,
            }),
        }
    }

    fn on_deadline_missed(&mut self, snapshot: &EngineSnapshot<'_>, task: TaskId) {
        self.misses.push(Miss {
            task,
            tick: snapshot.tick,
        });
    }
}
