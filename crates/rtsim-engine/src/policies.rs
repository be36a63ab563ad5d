//! Scheduling policies for task selection
//!
//! Each policy is a pure preference ordering over two runnable tasks:
//! - Deadline-Monotonic: shorter relative deadline runs first
//! - Least-Laxity-First: smaller slack runs first, recomputed every tick
//! - Fixed-Priority: lower priority number runs first
//!
//! Filtering out exhausted tasks is the simulator's job, not the policy's.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SimulationError;
use crate::types::Task;

/// Scheduling policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SchedulingPolicy {
    /// Static ordering by relative deadline (DMS)
    #[default]
    #[serde(alias = "dms")]
    DeadlineMonotonic,

    /// Dynamic ordering by laxity (LLF)
    #[serde(alias = "llf")]
    LeastLaxityFirst,

    /// Static ordering by the caller-assigned priority
    #[serde(alias = "priority")]
    FixedPriority,
}

impl SchedulingPolicy {
    /// Every policy, in presentation order
    pub const ALL: [SchedulingPolicy; 3] = [
        SchedulingPolicy::DeadlineMonotonic,
        SchedulingPolicy::LeastLaxityFirst,
        SchedulingPolicy::FixedPriority,
    ];

    /// True if `a` should run before `b` when both are runnable
    pub fn prefers(&self, a: &Task, b: &Task) -> bool {
        match self {
            SchedulingPolicy::DeadlineMonotonic => a.deadline < b.deadline,
            SchedulingPolicy::LeastLaxityFirst => a.laxity() < b.laxity(),
            SchedulingPolicy::FixedPriority => a.priority < b.priority,
        }
    }

    /// Get policy name
    pub fn name(&self) -> &'static str {
        match self {
            SchedulingPolicy::DeadlineMonotonic => "DMS",
            SchedulingPolicy::LeastLaxityFirst => "LLF",
            SchedulingPolicy::FixedPriority => "FixedPriority",
        }
    }
}

impl fmt::Display for SchedulingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SchedulingPolicy {
    type Err = SimulationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dms" | "deadline-monotonic" => Ok(SchedulingPolicy::DeadlineMonotonic),
            "llf" | "least-laxity-first" => Ok(SchedulingPolicy::LeastLaxityFirst),
            "priority" | "fixed-priority" | "fixedpriority" => Ok(SchedulingPolicy::FixedPriority),
            _ => Err(SimulationError::UnknownPolicy(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskParams;

    fn task(id: usize, params: TaskParams) -> Task {
        Task::new(id, params)
    }

    #[test]
    fn test_dms_policy() {
        let policy = SchedulingPolicy::DeadlineMonotonic;
        let short = task(0, TaskParams::new(100, 10, 40, 9));
        let long = task(1, TaskParams::new(100, 10, 90, 0));

        assert!(policy.prefers(&short, &long));
        assert!(!policy.prefers(&long, &short));
        // Equal deadlines are not a strict preference
        assert!(!policy.prefers(&short, &short.clone()));
    }

    #[test]
    fn test_llf_policy_tracks_progress() {
        let policy = SchedulingPolicy::LeastLaxityFirst;
        let mut light = task(0, TaskParams::implicit(10, 3)); // laxity 7
        let mut heavy = task(1, TaskParams::implicit(10, 6)); // laxity 4

        assert!(policy.prefers(&heavy, &light));

        // Executing raises laxity until the order flips
        for _ in 0..4 {
            heavy.execute();
        }
        assert!(policy.prefers(&light, &heavy));

        light.execute();
        assert!(!policy.prefers(&light, &heavy));
    }

    #[test]
    fn test_fixed_priority_policy() {
        let policy = SchedulingPolicy::FixedPriority;
        let urgent = task(0, TaskParams::new(100, 10, 100, 1));
        let relaxed = task(1, TaskParams::new(10, 5, 10, 5));

        assert!(policy.prefers(&urgent, &relaxed));
        assert!(!policy.prefers(&relaxed, &urgent));
    }

    #[test]
    fn test_parse_policy() {
        assert_eq!("dms".parse::<SchedulingPolicy>().unwrap(), SchedulingPolicy::DeadlineMonotonic);
        assert_eq!("LLF".parse::<SchedulingPolicy>().unwrap(), SchedulingPolicy::LeastLaxityFirst);
        assert_eq!(
            "fixed-priority".parse::<SchedulingPolicy>().unwrap(),
            SchedulingPolicy::FixedPriority
        );
        assert!(matches!(
            "edf".parse::<SchedulingPolicy>(),
            Err(SimulationError::UnknownPolicy(_))
        ));
    }

    #[test]
    fn test_policy_serde_names() {
        let json = serde_json::to_string(&SchedulingPolicy::LeastLaxityFirst).unwrap();
        assert_eq!(json, "\"least-laxity-first\"");

        let parsed: SchedulingPolicy = serde_json::from_str("\"dms\"").unwrap();
        assert_eq!(parsed, SchedulingPolicy::DeadlineMonotonic);
    }
}
