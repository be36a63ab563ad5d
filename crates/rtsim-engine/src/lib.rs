//! rtsim Simulation Engine
//!
//! Tick-based simulator for preemptive scheduling of periodic real-time tasks
//! under Deadline-Monotonic, Least-Laxity-First and Fixed-Priority policies.
//!
//! ```
//! use rtsim_engine::{EventLog, SchedulingPolicy, Simulator, TaskParams};
//!
//! let mut simulator = Simulator::with_tasks(
//!     SchedulingPolicy::DeadlineMonotonic,
//!     vec![TaskParams::implicit(80, 30), TaskParams::implicit(120, 60)],
//! )?;
//! let mut log = EventLog::new();
//! let result = simulator.schedule(200, &mut log);
//!
//! assert!(result.all_deadlines_met);
//! assert_eq!(log.executions()[0], Some(0));
//! # Ok::<(), rtsim_engine::SimulationError>(())
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod policies;
pub mod simulator;
pub mod task_gen;
pub mod timeline;
pub mod types;

pub use config::SimulationConfig;
pub use error::{Result, SimulationError};
pub use events::{EngineSnapshot, EventLog, EventSink, NullSink, SimEvent, TracingSink};
pub use policies::SchedulingPolicy;
pub use simulator::{SimulationResult, Simulator, TaskReport};
pub use task_gen::TaskSetGenerator;
pub use timeline::{DeadlineMark, Miss, Segment, Timeline};
pub use types::{MAX_TICKS, Task, TaskId, TaskParams, TaskState, Ticks};
