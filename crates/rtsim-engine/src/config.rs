//! Simulation configuration
//!
//! A config names the policy, the run length and the task set. It is stored
//! as JSON:
//!
//! ```json
//! {
//!   "policy": "dms",
//!   "end_time": 500,
//!   "tasks": [
//!     { "period": 80, "execution_time": 30, "deadline": 80, "priority": 0 }
//!   ]
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimulationError};
use crate::policies::SchedulingPolicy;
use crate::simulator::Simulator;
use crate::types::{TaskParams, Ticks};

/// Default run length, in ticks
pub const DEFAULT_END_TIME: Ticks = 500;

fn default_end_time() -> Ticks {
    DEFAULT_END_TIME
}

/// Simulation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default)]
    pub policy: SchedulingPolicy,

    #[serde(default = "default_end_time")]
    pub end_time: Ticks,

    pub tasks: Vec<TaskParams>,
}

impl SimulationConfig {
    pub fn new(policy: SchedulingPolicy, end_time: Ticks, tasks: Vec<TaskParams>) -> Self {
        SimulationConfig {
            policy,
            end_time,
            tasks,
        }
    }

    /// Parse and validate a JSON config
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: SimulationConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check every task against the supported model
    pub fn validate(&self) -> Result<()> {
        if self.tasks.is_empty() {
            return Err(SimulationError::config("task set is empty"));
        }
        for (index, task) in self.tasks.iter().enumerate() {
            task.validate(index)?;
        }
        Ok(())
    }

    /// Sum of the task utilizations
    pub fn utilization(&self) -> f64 {
        self.tasks.iter().map(TaskParams::utilization).sum()
    }

    /// Build a simulator loaded with this config's policy and tasks
    pub fn build_simulator(&self) -> Result<Simulator> {
        Simulator::with_tasks(self.policy, self.tasks.iter().copied())
    }
}

/// Two-task sample set: T0 (80, 30, 80) and T1 (120, 60, 120) under DMS
impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            policy: SchedulingPolicy::DeadlineMonotonic,
            end_time: DEFAULT_END_TIME,
            tasks: vec![
                TaskParams::new(80, 30, 80, 0),
                TaskParams::new(120, 60, 120, 0),
            ],
        }
    }
}
