//! Random task-set generation
//!
//! Produces small implicit-deadline task sets for quick experiments:
//! - 1 to 9 tasks
//! - execution time uniform in 1..=100
//! - period uniform in (execution + 10)..=(execution + 50)
//! - priority uniform in 0..=9

use std::ops::RangeInclusive;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::types::{TaskParams, Ticks};

/// Random task-set generator
pub struct TaskSetGenerator {
    rng: StdRng,
    task_count: RangeInclusive<usize>,
    execution_time: RangeInclusive<Ticks>,
    priority: RangeInclusive<u32>,
    period_slack: RangeInclusive<Ticks>, // Added to execution time to get the period
}

impl TaskSetGenerator {
    /// Create a generator seeded from system entropy
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Create a reproducible generator
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        TaskSetGenerator {
            rng,
            task_count: 1..=9,
            execution_time: 1..=100,
            priority: 0..=9,
            period_slack: 10..=50,
        }
    }

    /// Override the range the number of tasks is drawn from.
    ///
    /// Panics if the range is empty.
    pub fn with_task_count(mut self, task_count: RangeInclusive<usize>) -> Self {
        assert!(
            !task_count.is_empty(),
            "task count range {:?} is empty",
            task_count
        );
        self.task_count = task_count;
        self
    }

    /// Generate a task set of random size
    pub fn generate(&mut self) -> Vec<TaskParams> {
        let count = self.rng.gen_range(self.task_count.clone());
        self.generate_n(count)
    }

    /// Generate exactly `count` tasks
    pub fn generate_n(&mut self, count: usize) -> Vec<TaskParams> {
        (0..count).map(|_| self.generate_task()).collect()
    }

    fn generate_task(&mut self) -> TaskParams {
        let execution_time = self.rng.gen_range(self.execution_time.clone());
        let priority = self.rng.gen_range(self.priority.clone());
        let period = execution_time + self.rng.gen_range(self.period_slack.clone());

        TaskParams::new(period, execution_time, period, priority)
    }
}

impl Default for TaskSetGenerator {
    fn default() -> Self {
        Self::new()
    }
}
