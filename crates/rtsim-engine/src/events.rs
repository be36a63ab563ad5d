//! Simulation events and the sinks that receive them
//!
//! The simulator reports two kinds of events, synchronously, while a run is
//! in progress. Within one tick the execution event always comes first,
//! followed by any deadline misses in task order.

use std::sync::mpsc::Sender;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::policies::SchedulingPolicy;
use crate::types::{Task, TaskId, Ticks};

/// Read-only view of the engine at the moment an event fires
#[derive(Debug, Clone, Copy)]
pub struct EngineSnapshot<'a> {
    pub tick: Ticks,
    pub tasks: &'a [Task],
    pub policy: SchedulingPolicy,
}

impl<'a> EngineSnapshot<'a> {
    pub fn task(&self, id: TaskId) -> Option<&'a Task> {
        self.tasks.get(id)
    }
}

/// Simulation event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimEvent {
    /// A tick was spent on `task`, or idle when `None`
    TaskExecuted { tick: Ticks, task: Option<TaskId> },
    /// `task` did not finish its job by the deadline that elapsed at `tick`
    DeadlineMissed { tick: Ticks, task: TaskId },
}

impl SimEvent {
    pub fn tick(&self) -> Ticks {
        match self {
            SimEvent::TaskExecuted { tick, .. } | SimEvent::DeadlineMissed { tick, .. } => *tick,
        }
    }
}

/// Receiver of simulation events
pub trait EventSink {
    /// Called once per tick with the task that ran, `None` for an idle tick
    fn on_task_executed(&mut self, snapshot: &EngineSnapshot<'_>, task: Option<TaskId>);

    /// Called once per missed deadline, at the tick the deadline elapsed
    fn on_deadline_missed(&mut self, snapshot: &EngineSnapshot<'_>, task: TaskId);
}

/// Sink that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn on_task_executed(&mut self, _snapshot: &EngineSnapshot<'_>, _task: Option<TaskId>) {}

    fn on_deadline_missed(&mut self, _snapshot: &EngineSnapshot<'_>, _task: TaskId) {}
}

/// Sink that keeps every event, in delivery order
#[derive(Debug, Default, Clone)]
pub struct EventLog {
    pub events: Vec<SimEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Task selected on each tick, indexed by tick
    pub fn executions(&self) -> Vec<Option<TaskId>> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SimEvent::TaskExecuted { task, .. } => Some(*task),
                SimEvent::DeadlineMissed { .. } => None,
            })
            .collect()
    }

    /// `(task, tick)` for every deadline miss
    pub fn misses(&self) -> Vec<(TaskId, Ticks)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SimEvent::DeadlineMissed { tick, task } => Some((*task, *tick)),
                SimEvent::TaskExecuted { .. } => None,
            })
            .collect()
    }
}

impl EventSink for EventLog {
    fn on_task_executed(&mut self, snapshot: &EngineSnapshot<'_>, task: Option<TaskId>) {
        self.events.push(SimEvent::TaskExecuted {
            tick: snapshot.tick,
            task,
        });
    }

    fn on_deadline_missed(&mut self, snapshot: &EngineSnapshot<'_>, task: TaskId) {
        self.events.push(SimEvent::DeadlineMissed {
            tick: snapshot.tick,
            task,
        });
    }
}

/// Channel sink: the caller drains typed events from the receiving end.
/// Events sent after the receiver is dropped are discarded.
impl EventSink for Sender<SimEvent> {
    fn on_task_executed(&mut self, snapshot: &EngineSnapshot<'_>, task: Option<TaskId>) {
        let _ = self.send(SimEvent::TaskExecuted {
            tick: snapshot.tick,
            task,
        });
    }

    fn on_deadline_missed(&mut self, snapshot: &EngineSnapshot<'_>, task: TaskId) {
        let _ = self.send(SimEvent::DeadlineMissed {
            tick: snapshot.tick,
            task,
        });
    }
}

/// Sink that logs events through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn on_task_executed(&mut self, snapshot: &EngineSnapshot<'_>, task: Option<TaskId>) {
        match task {
            Some(id) => debug!(tick = snapshot.tick, task = id, "Task executed"),
            None => debug!(tick = snapshot.tick, "Idle tick"),
        }
    }

    fn on_deadline_missed(&mut self, snapshot: &EngineSnapshot<'_>, task: TaskId) {
        warn!(
            tick = snapshot.tick,
            task,
            policy = %snapshot.policy,
            "Deadline missed"
        );
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn on_task_executed(&mut self, snapshot: &EngineSnapshot<'_>, task: Option<TaskId>) {
        (**self).on_task_executed(snapshot, task);
    }

    fn on_deadline_missed(&mut self, snapshot: &EngineSnapshot<'_>, task: TaskId) {
        (**self).on_deadline_missed(snapshot, task);
    }
}

/// Fan-out: both sinks see every event, first `A` then `B`
impl<A: EventSink, B: EventSink> EventSink for (A, B) {
    fn on_task_executed(&mut self, snapshot: &EngineSnapshot<'_>, task: Option<TaskId>) {
        self.0.on_task_executed(snapshot, task);
        self.1.on_task_executed(snapshot, task);
    }

    fn on_deadline_missed(&mut self, snapshot: &EngineSnapshot<'_>, task: TaskId) {
        self.0.on_deadline_missed(snapshot, task);
        self.1.on_deadline_missed(snapshot, task);
    }
}
