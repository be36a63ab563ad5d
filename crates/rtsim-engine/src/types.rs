//! Core types for the simulation engine

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimulationError};

/// Simulated time, in ticks
pub type Ticks = u64;

/// Largest accepted period or execution time (keeps laxity in signed range)
pub const MAX_TICKS: Ticks = i64::MAX as Ticks;

/// Position of a task in the engine's task set (0-based, assigned at insertion)
pub type TaskId = usize;

/// Static parameters of a periodic task, as supplied by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskParams {
    /// Ticks between successive job releases
    pub period: Ticks,
    /// Ticks of work required per period
    pub execution_time: Ticks,
    /// Ticks after release by which the job must be done
    pub deadline: Ticks,
    /// Static priority, lower value runs first (fixed-priority policy only)
    #[serde(default)]
    pub priority: u32,
}

impl TaskParams {
    pub fn new(period: Ticks, execution_time: Ticks, deadline: Ticks, priority: u32) -> Self {
        TaskParams {
            period,
            execution_time,
            deadline,
            priority,
        }
    }

    /// Task with an implicit deadline (equal to its period) and priority 0
    pub fn implicit(period: Ticks, execution_time: Ticks) -> Self {
        Self::new(period, execution_time, period, 0)
    }

    pub fn with_deadline(self, deadline: Ticks) -> Self {
        Self { deadline, ..self }
    }

    pub fn with_priority(self, priority: u32) -> Self {
        Self { priority, ..self }
    }

    /// Fraction of the processor this task demands (`execution_time / period`)
    pub fn utilization(&self) -> f64 {
        if self.period == 0 {
            0.0
        } else {
            self.execution_time as f64 / self.period as f64
        }
    }

    /// Check the parameters against the supported task model.
    ///
    /// Zero periods, execution times or deadlines and deadlines beyond the
    /// period are rejected. An execution time larger than the deadline is
    /// accepted: such a task simply misses every deadline.
    pub fn validate(&self, index: usize) -> Result<()> {
        if self.period == 0 {
            return Err(SimulationError::invalid_task(index, "period must be > 0"));
        }
        if self.execution_time == 0 {
            return Err(SimulationError::invalid_task(index, "execution time must be > 0"));
        }
        if self.deadline == 0 {
            return Err(SimulationError::invalid_task(index, "deadline must be > 0"));
        }
        if self.period > MAX_TICKS {
            return Err(SimulationError::invalid_task(
                index,
                format!("period {} exceeds {}", self.period, MAX_TICKS),
            ));
        }
        if self.execution_time > MAX_TICKS {
            return Err(SimulationError::invalid_task(
                index,
                format!("execution time {} exceeds {}", self.execution_time, MAX_TICKS),
            ));
        }
        if self.deadline > self.period {
            return Err(SimulationError::invalid_task(
                index,
                format!(
                    "deadline {} exceeds period {}",
                    self.deadline, self.period
                ),
            ));
        }
        Ok(())
    }
}

/// Parses `PERIOD:EXEC:DEADLINE[:PRIORITY]`, e.g. `80:30:80` or `80:30:60:2`
impl FromStr for TaskParams {
    type Err = SimulationError;

    fn from_str(s: &str) -> Result<Self> {
        let fields: Vec<&str> = s.split(':').map(|f| f.trim()).collect();
        if !(3..=4).contains(&fields.len()) {
            return Err(SimulationError::config(format!(
                "expected PERIOD:EXEC:DEADLINE[:PRIORITY], got '{}'",
                s
            )));
        }

        let number = |field: &str, name: &str| -> Result<u64> {
            field.parse::<u64>().map_err(|_| {
                SimulationError::config(format!("invalid {} '{}' in task '{}'", name, field, s))
            })
        };

        let period = number(fields[0], "period")?;
        let execution_time = number(fields[1], "execution time")?;
        let deadline = number(fields[2], "deadline")?;
        let priority = match fields.get(3) {
            Some(&p) => u32::try_from(number(p, "priority")?)
                .map_err(|_| SimulationError::config(format!("priority out of range in '{}'", s)))?,
            None => 0,
        };

        Ok(TaskParams::new(period, execution_time, deadline, priority))
    }
}

/// Where a task stands within its current period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    /// The current job still needs execution
    Ready,
    /// The current job is done (or was closed out after a miss)
    Exhausted,
}

/// A periodic task together with its per-period progress counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub period: Ticks,
    pub execution_time: Ticks,
    pub deadline: Ticks,
    pub priority: u32,

    // Per-period progress
    pub cycles_executed: Ticks,       // Work done for the current job
    pub remaining_to_deadline: Ticks, // Ticks until the current job's deadline
    pub remaining_to_end: Ticks,      // Ticks until the current period ends
}

impl Task {
    /// Create a task in its pre-run state.
    ///
    /// `remaining_to_end` starts at zero so that the first transition pass
    /// performs the initial period rollover.
    pub fn new(id: TaskId, params: TaskParams) -> Self {
        Task {
            id,
            period: params.period,
            execution_time: params.execution_time,
            deadline: params.deadline,
            priority: params.priority,
            cycles_executed: 0,
            remaining_to_deadline: params.deadline,
            remaining_to_end: 0,
        }
    }

    pub fn params(&self) -> TaskParams {
        TaskParams::new(self.period, self.execution_time, self.deadline, self.priority)
    }

    /// Return the runtime counters to their pre-run values
    pub fn reset(&mut self) {
        self.cycles_executed = 0;
        self.remaining_to_deadline = self.deadline;
        self.remaining_to_end = 0;
    }

    /// The current job still requires execution this period
    pub fn is_schedulable(&self) -> bool {
        self.cycles_executed < self.execution_time
    }

    pub fn state(&self) -> TaskState {
        if self.is_schedulable() {
            TaskState::Ready
        } else {
            TaskState::Exhausted
        }
    }

    /// Slack before the job would have to run on every remaining tick:
    /// `deadline - (execution_time - cycles_executed)`. Negative when the
    /// job needs more work than its deadline allows.
    pub fn laxity(&self) -> i128 {
        self.deadline as i128 - (self.execution_time as i128 - self.cycles_executed as i128)
    }

    /// Run the current job for one tick. Returns true if this tick completed it.
    pub fn execute(&mut self) -> bool {
        if !self.is_schedulable() {
            return false;
        }
        self.cycles_executed += 1;
        self.cycles_executed == self.execution_time
    }

    /// Deadline half of the tick transition.
    ///
    /// Counts the deadline clock down. Returns true once it has elapsed with
    /// the job unfinished; the job keeps its progress until `close_out`.
    pub(crate) fn step_deadline(&mut self) -> bool {
        if self.remaining_to_deadline > 0 {
            self.remaining_to_deadline -= 1;
            false
        } else {
            self.cycles_executed != self.execution_time
        }
    }

    /// Abandon an overdue job so it is no longer selected this period
    pub(crate) fn close_out(&mut self) {
        self.cycles_executed = self.execution_time;
    }

    /// Period half of the tick transition. Returns true on rollover.
    pub(crate) fn step_period(&mut self) -> bool {
        if self.remaining_to_end > 0 {
            self.remaining_to_end -= 1;
            false
        } else {
            self.roll_over();
            true
        }
    }

    fn roll_over(&mut self) {
        self.cycles_executed = 0;
        self.remaining_to_end = self.period.saturating_sub(1);
        self.remaining_to_deadline = self.deadline.saturating_sub(1);
    }
}
