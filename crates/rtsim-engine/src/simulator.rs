//! Tick-based simulator for periodic real-time tasks
//!
//! Every task is released at tick 0. On each tick the simulator picks the
//! runnable task the policy prefers, runs it for one tick, then advances the
//! deadline and period clocks of every task, closing out overdue jobs and
//! starting new periods.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::error::Result;
use crate::events::{EngineSnapshot, EventSink, NullSink};
use crate::policies::SchedulingPolicy;
use crate::types::{Task, TaskId, TaskParams, Ticks};

/// Per-task outcome of a simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskReport {
    pub id: TaskId,
    pub params: TaskParams,
    pub executed_ticks: Ticks,
    pub completed_jobs: u64,
    pub deadline_misses: u64,
}

/// Result of a simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub policy_name: String,
    pub end_time: Ticks,
    pub idle_ticks: Ticks,
    pub total_deadline_misses: u64,
    pub all_deadlines_met: bool,
    pub utilization: f64,
    pub tasks: Vec<TaskReport>,
}

#[derive(Debug, Clone, Default)]
struct RunStats {
    executed: Vec<Ticks>,
    completed: Vec<u64>,
    misses: Vec<u64>,
    idle: Ticks,
}

impl RunStats {
    fn new(task_count: usize) -> Self {
        RunStats {
            executed: vec![0; task_count],
            completed: vec![0; task_count],
            misses: vec![0; task_count],
            idle: 0,
        }
    }
}

/// Scheduling simulator
pub struct Simulator {
    tasks: Vec<Task>,
    policy: SchedulingPolicy,
    current_tick: Ticks,
    system_ok: bool,
    stats: RunStats,
}

impl Simulator {
    /// Create an empty simulator using `policy`
    pub fn new(policy: SchedulingPolicy) -> Self {
        Simulator {
            tasks: Vec::new(),
            policy,
            current_tick: 0,
            system_ok: true,
            stats: RunStats::default(),
        }
    }

    /// Create a simulator pre-loaded with a task set
    pub fn with_tasks<I>(policy: SchedulingPolicy, params: I) -> Result<Self>
    where
        I: IntoIterator<Item = TaskParams>,
    {
        let mut simulator = Self::new(policy);
        simulator.set_tasks(params)?;
        Ok(simulator)
    }

    /// Append a task; its id is its position in the task set
    pub fn add_task(&mut self, params: TaskParams) -> Result<TaskId> {
        let id = self.tasks.len();
        params.validate(id)?;
        self.tasks.push(Task::new(id, params));
        self.stats = RunStats::new(self.tasks.len());
        self.current_tick = 0;
        Ok(id)
    }

    /// Replace the whole task set. Nothing changes if any task is invalid.
    pub fn set_tasks<I>(&mut self, params: I) -> Result<()>
    where
        I: IntoIterator<Item = TaskParams>,
    {
        let params: Vec<TaskParams> = params.into_iter().collect();
        for (index, p) in params.iter().enumerate() {
            p.validate(index)?;
        }

        self.tasks = params
            .into_iter()
            .enumerate()
            .map(|(id, p)| Task::new(id, p))
            .collect();
        self.stats = RunStats::new(self.tasks.len());
        self.current_tick = 0;
        Ok(())
    }

    pub fn clear_tasks(&mut self) {
        self.tasks.clear();
        self.stats = RunStats::default();
        self.current_tick = 0;
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn policy(&self) -> SchedulingPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: SchedulingPolicy) {
        self.policy = policy;
    }

    pub fn current_tick(&self) -> Ticks {
        self.current_tick
    }

    /// False once any deadline has been missed in the current run
    pub fn system_ok(&self) -> bool {
        self.system_ok
    }

    pub fn snapshot(&self) -> EngineSnapshot<'_> {
        EngineSnapshot {
            tick: self.current_tick,
            tasks: &self.tasks,
            policy: self.policy,
        }
    }

    /// Pick the task to run this tick, or `None` for an idle tick.
    ///
    /// Scans in task order and keeps the first strict improvement, so ties go
    /// to the lower id. An exhausted task never beats a runnable one.
    pub fn select_task(&self) -> Option<TaskId> {
        let mut best: Option<&Task> = None;
        for task in self.tasks.iter().filter(|t| t.is_schedulable()) {
            let improves = match best {
                Some(current) => self.policy.prefers(task, current),
                None => true,
            };
            if improves {
                best = Some(task);
            }
        }
        best.map(|t| t.id)
    }

    /// Advance simulated time by one tick and update every task's clocks.
    ///
    /// Returns false if any deadline was missed on this tick.
    pub fn advance_tick(&mut self, sink: &mut dyn EventSink) -> bool {
        self.transition(Some(sink))
    }

    fn transition(&mut self, mut sink: Option<&mut dyn EventSink>) -> bool {
        let mut ok = true;
        self.current_tick += 1;

        for i in 0..self.tasks.len() {
            if self.tasks[i].step_deadline() {
                ok = false;
                if let Some(sink) = sink.as_deref_mut() {
                    self.stats.misses[i] += 1;
                    sink.on_deadline_missed(&self.snapshot(), i);
                }
                self.tasks[i].close_out();
            }

            if self.tasks[i].step_period() {
                trace!(tick = self.current_tick, task = i, "Period rollover");
            }
        }

        ok
    }

    /// Start every task's first period without emitting events or counting a tick.
    ///
    /// Tasks are created with an empty period clock, so one silent transition
    /// pass performs the initial rollover before tick 0 is simulated.
    fn prime_period_counters(&mut self) {
        self.transition(None);
        self.current_tick = 0;
    }

    /// Run the simulation for `end_time` ticks, delivering events to `sink`
    pub fn schedule(&mut self, end_time: Ticks, sink: &mut dyn EventSink) -> SimulationResult {
        debug!(
            policy = %self.policy,
            tasks = self.tasks.len(),
            end_time,
            "Starting simulation"
        );

        for task in &mut self.tasks {
            task.reset();
        }
        self.stats = RunStats::new(self.tasks.len());
        self.prime_period_counters();
        self.system_ok = true;

        while self.current_tick < end_time {
            let selected = self.select_task();

            match selected {
                Some(id) => {
                    self.stats.executed[id] += 1;
                    if self.tasks[id].execute() {
                        self.stats.completed[id] += 1;
                    }
                }
                None => self.stats.idle += 1,
            }

            sink.on_task_executed(&self.snapshot(), selected);

            let tick_ok = self.advance_tick(sink);
            self.system_ok &= tick_ok;
        }

        let result = self.collect_results(end_time);
        info!(
            policy = %result.policy_name,
            end_time,
            misses = result.total_deadline_misses,
            idle = result.idle_ticks,
            "Simulation finished"
        );
        result
    }

    /// Run the simulation without observing events
    pub fn run(&mut self, end_time: Ticks) -> SimulationResult {
        self.schedule(end_time, &mut NullSink)
    }

    fn collect_results(&self, end_time: Ticks) -> SimulationResult {
        let tasks: Vec<TaskReport> = self
            .tasks
            .iter()
            .map(|t| TaskReport {
                id: t.id,
                params: t.params(),
                executed_ticks: self.stats.executed[t.id],
                completed_jobs: self.stats.completed[t.id],
                deadline_misses: self.stats.misses[t.id],
            })
            .collect();

        SimulationResult {
            policy_name: self.policy.name().to_string(),
            end_time,
            idle_ticks: self.stats.idle,
            total_deadline_misses: self.stats.misses.iter().sum(),
            all_deadlines_met: self.system_ok,
            utilization: self.tasks.iter().map(|t| t.params().utilization()).sum(),
            tasks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventLog, SimEvent};

    /// Sink that checks engine invariants on every event
    #[derive(Default)]
    struct InvariantSink {
        log: EventLog,
        cycles_seen: Vec<Vec<Ticks>>,
    }

    impl EventSink for InvariantSink {
        fn on_task_executed(&mut self, snapshot: &EngineSnapshot<'_>, task: Option<TaskId>) {
            for t in snapshot.tasks {
                assert!(t.cycles_executed <= t.execution_time);
            }
            self.cycles_seen
                .push(snapshot.tasks.iter().map(|t| t.cycles_executed).collect());
            self.log.on_task_executed(snapshot, task);
        }

        fn on_deadline_missed(&mut self, snapshot: &EngineSnapshot<'_>, task: TaskId) {
            // The overdue job still shows how far it got
            let t = &snapshot.tasks[task];
            assert!(t.cycles_executed < t.execution_time);
            self.log.on_deadline_missed(snapshot, task);
        }
    }

    fn run_logged(policy: SchedulingPolicy, tasks: Vec<TaskParams>, end_time: Ticks) -> (SimulationResult, EventLog) {
        let mut simulator = Simulator::with_tasks(policy, tasks).unwrap();
        let mut sink = InvariantSink::default();
        let result = simulator.schedule(end_time, &mut sink);
        assert_eq!(simulator.current_tick(), end_time);
        (result, sink.log)
    }

    /// Expand `(task, from, to)` segments into a per-tick selection list
    fn expected_schedule(segments: &[(Option<TaskId>, Ticks, Ticks)]) -> Vec<Option<TaskId>> {
        let mut ticks = Vec::new();
        for &(task, from, to) in segments {
            for _ in from..to {
                ticks.push(task);
            }
        }
        ticks
    }

    #[test]
    fn test_single_task_dms() {
        let (result, log) = run_logged(
            SchedulingPolicy::DeadlineMonotonic,
            vec![TaskParams::new(80, 30, 80, 0)],
            80,
        );

        assert_eq!(
            log.executions(),
            expected_schedule(&[(Some(0), 0, 30), (None, 30, 80)])
        );
        assert!(log.misses().is_empty());
        assert!(result.all_deadlines_met);
        assert_eq!(result.idle_ticks, 50);
        assert_eq!(result.tasks[0].executed_ticks, 30);
        assert_eq!(result.tasks[0].completed_jobs, 1);
    }

    #[test]
    fn test_two_tasks_dms_interleaving() {
        let (result, log) = run_logged(
            SchedulingPolicy::DeadlineMonotonic,
            vec![
                TaskParams::new(80, 30, 80, 0),
                TaskParams::new(120, 60, 120, 0),
            ],
            200,
        );

        // T0 wins whenever runnable; T1 fills the gaps and finishes its first
        // job on tick 119, just before its deadline at 120
        assert_eq!(
            log.executions(),
            expected_schedule(&[
                (Some(0), 0, 30),
                (Some(1), 30, 80),
                (Some(0), 80, 110),
                (Some(1), 110, 160),
                (Some(0), 160, 190),
                (Some(1), 190, 200),
            ])
        );
        assert!(log.misses().is_empty());
        assert!(result.all_deadlines_met);
        assert_eq!(result.idle_ticks, 0);
        assert_eq!(result.tasks[0].executed_ticks, 90);
        assert_eq!(result.tasks[1].executed_ticks, 110);
        assert_eq!(result.tasks[0].completed_jobs, 3);
        assert_eq!(result.tasks[1].completed_jobs, 1);
    }

    #[test]
    fn test_llf_crossover() {
        // Equal deadlines: laxity(T0) = 7 + c0, laxity(T1) = 4 + c1.
        // T1 runs until the laxities meet after e1 - e0 = 3 ticks, then the
        // tie goes to T0 and the two alternate.
        let (result, log) = run_logged(
            SchedulingPolicy::LeastLaxityFirst,
            vec![TaskParams::implicit(10, 3), TaskParams::implicit(10, 6)],
            10,
        );

        let crossover = 6 - 3;
        let executions = log.executions();
        assert!(executions[..crossover].iter().all(|t| *t == Some(1)));
        assert_eq!(executions[crossover], Some(0));

        assert_eq!(
            executions,
            vec![
                Some(1),
                Some(1),
                Some(1),
                Some(0),
                Some(1),
                Some(0),
                Some(1),
                Some(0),
                Some(1),
                None,
            ]
        );
        assert!(result.all_deadlines_met);
    }

    #[test]
    fn test_forced_miss_every_period() {
        let (result, log) = run_logged(
            SchedulingPolicy::DeadlineMonotonic,
            vec![TaskParams::new(10, 12, 10, 0)],
            30,
        );

        // Busy every tick, one miss at each period boundary
        assert_eq!(log.executions(), vec![Some(0); 30]);
        assert_eq!(log.misses(), vec![(0, 10), (0, 20), (0, 30)]);
        assert!(!result.all_deadlines_met);
        assert_eq!(result.tasks[0].deadline_misses, 3);
        assert_eq!(result.tasks[0].completed_jobs, 0);
    }

    #[test]
    fn test_miss_closes_out_job_before_period_end() {
        let mut simulator =
            Simulator::with_tasks(SchedulingPolicy::DeadlineMonotonic, vec![TaskParams::new(10, 8, 5, 0)])
                .unwrap();
        let mut log = EventLog::new();
        simulator.schedule(7, &mut log);

        // Ran ticks 0-4, missed at 5, then idle because the job is closed out
        assert_eq!(
            log.executions(),
            expected_schedule(&[(Some(0), 0, 5), (None, 5, 7)])
        );
        assert_eq!(log.misses(), vec![(0, 5)]);
        assert_eq!(simulator.tasks()[0].cycles_executed, 8);
    }

    /// Records `(tick, cycles_executed)` of the missing task at each miss
    #[derive(Default)]
    struct MissProgress(Vec<(Ticks, Ticks)>);

    impl EventSink for MissProgress {
        fn on_task_executed(&mut self, _snapshot: &EngineSnapshot<'_>, _task: Option<TaskId>) {}

        fn on_deadline_missed(&mut self, snapshot: &EngineSnapshot<'_>, task: TaskId) {
            self.0.push((snapshot.tick, snapshot.tasks[task].cycles_executed));
        }
    }

    #[test]
    fn test_miss_snapshot_shows_unfinished_progress() {
        let mut simulator =
            Simulator::with_tasks(SchedulingPolicy::DeadlineMonotonic, vec![TaskParams::new(10, 8, 5, 0)])
                .unwrap();
        let mut progress = MissProgress::default();
        simulator.schedule(7, &mut progress);

        // 5 of 8 ticks done when the deadline elapsed; closed out afterwards
        assert_eq!(progress.0, vec![(5, 5)]);
        assert_eq!(simulator.tasks()[0].cycles_executed, 8);
    }

    #[test]
    fn test_miss_follows_execution_event() {
        let mut simulator =
            Simulator::with_tasks(SchedulingPolicy::DeadlineMonotonic, vec![TaskParams::new(4, 5, 4, 0)])
                .unwrap();
        let mut log = EventLog::new();
        simulator.schedule(4, &mut log);

        let last_two = &log.events[log.events.len() - 2..];
        assert_eq!(
            last_two,
            &[
                SimEvent::TaskExecuted { tick: 3, task: Some(0) },
                SimEvent::DeadlineMissed { tick: 4, task: 0 },
            ]
        );
    }

    #[test]
    fn test_tie_break_prefers_lower_id() {
        for policy in [SchedulingPolicy::DeadlineMonotonic, SchedulingPolicy::FixedPriority] {
            let (_, log) = run_logged(
                policy,
                vec![TaskParams::new(20, 2, 20, 1), TaskParams::new(20, 2, 20, 1)],
                4,
            );
            assert_eq!(
                log.executions(),
                vec![Some(0), Some(0), Some(1), Some(1)],
                "policy {}",
                policy
            );
        }
    }

    #[test]
    fn test_llf_ties_alternate() {
        // Running a task raises its laxity, so identical tasks take turns
        let (_, log) = run_logged(
            SchedulingPolicy::LeastLaxityFirst,
            vec![TaskParams::new(20, 2, 20, 1), TaskParams::new(20, 2, 20, 1)],
            4,
        );
        assert_eq!(log.executions(), vec![Some(0), Some(1), Some(0), Some(1)]);
    }

    #[test]
    fn test_exhausted_task_never_selected() {
        let mut simulator = Simulator::with_tasks(
            SchedulingPolicy::FixedPriority,
            vec![TaskParams::new(10, 1, 10, 0), TaskParams::new(10, 3, 10, 9)],
        )
        .unwrap();
        simulator.prime_period_counters();

        assert_eq!(simulator.select_task(), Some(0));
        simulator.tasks[0].execute();
        // Highest priority, but done for this period
        assert_eq!(simulator.select_task(), Some(1));
    }

    #[test]
    fn test_idle_tick_changes_nothing() {
        let mut simulator =
            Simulator::with_tasks(SchedulingPolicy::LeastLaxityFirst, vec![TaskParams::implicit(10, 1)])
                .unwrap();
        let mut sink = InvariantSink::default();
        simulator.schedule(5, &mut sink);

        assert_eq!(sink.log.executions()[1..], [None, None, None, None]);
        // Cycles stay at 1 through the idle stretch
        for cycles in &sink.cycles_seen {
            assert_eq!(cycles[0], 1);
        }
    }

    #[test]
    fn test_rollover_periodicity() {
        let mut simulator =
            Simulator::with_tasks(SchedulingPolicy::DeadlineMonotonic, vec![TaskParams::implicit(7, 2)])
                .unwrap();
        let mut sink = InvariantSink::default();
        simulator.schedule(35, &mut sink);

        // cycles_seen[t] is the state after tick t's execution; the job is
        // fresh again right after each period boundary
        for (tick, cycles) in sink.cycles_seen.iter().enumerate() {
            let expected = if tick % 7 == 0 { 1 } else { 2 };
            assert_eq!(cycles[0], expected, "tick {}", tick);
        }
        assert!(sink.log.misses().is_empty());
    }

    #[test]
    fn test_empty_task_set_is_idle() {
        let mut simulator = Simulator::new(SchedulingPolicy::DeadlineMonotonic);
        let result = simulator.run(3);

        assert_eq!(result.idle_ticks, 3);
        assert!(result.all_deadlines_met);
        assert_eq!(result.utilization, 0.0);
    }

    #[test]
    fn test_zero_end_time() {
        let mut simulator =
            Simulator::with_tasks(SchedulingPolicy::DeadlineMonotonic, vec![TaskParams::implicit(5, 1)])
                .unwrap();
        let mut log = EventLog::new();
        let result = simulator.schedule(0, &mut log);

        assert!(log.events.is_empty());
        assert_eq!(result.tasks[0].executed_ticks, 0);
        assert_eq!(simulator.current_tick(), 0);
    }

    #[test]
    fn test_repeated_runs_are_independent() {
        let mut simulator = Simulator::with_tasks(
            SchedulingPolicy::DeadlineMonotonic,
            vec![TaskParams::new(80, 30, 80, 0), TaskParams::new(120, 60, 120, 0)],
        )
        .unwrap();

        let first = simulator.run(150);
        let second = simulator.run(150);
        assert_eq!(first, second);
    }

    #[test]
    fn test_add_task_resets_tick() {
        let mut simulator =
            Simulator::with_tasks(SchedulingPolicy::DeadlineMonotonic, vec![TaskParams::implicit(10, 2)])
                .unwrap();
        simulator.run(15);
        assert_eq!(simulator.current_tick(), 15);

        let id = simulator.add_task(TaskParams::implicit(20, 3)).unwrap();
        assert_eq!(id, 1);
        assert_eq!(simulator.current_tick(), 0);

        simulator.run(15);
        simulator.clear_tasks();
        assert_eq!(simulator.current_tick(), 0);
    }

    #[test]
    fn test_invalid_task_rejected() {
        let mut simulator = Simulator::new(SchedulingPolicy::DeadlineMonotonic);
        simulator.add_task(TaskParams::implicit(10, 2)).unwrap();

        assert!(simulator.add_task(TaskParams::implicit(0, 2)).is_err());
        assert!(
            simulator
                .set_tasks(vec![TaskParams::implicit(10, 1), TaskParams::new(5, 1, 6, 0)])
                .is_err()
        );
        // Failed replacement leaves the previous set in place
        assert_eq!(simulator.tasks().len(), 1);
    }

    #[test]
    fn test_policy_switch_changes_selection() {
        let tasks = vec![TaskParams::new(50, 5, 50, 0), TaskParams::new(50, 5, 20, 3)];
        let mut simulator = Simulator::with_tasks(SchedulingPolicy::FixedPriority, tasks).unwrap();
        let mut log = EventLog::new();
        simulator.schedule(1, &mut log);
        assert_eq!(log.executions(), vec![Some(0)]);

        simulator.set_policy(SchedulingPolicy::DeadlineMonotonic);
        let mut log = EventLog::new();
        simulator.schedule(1, &mut log);
        assert_eq!(log.executions(), vec![Some(1)]);
    }

    #[test]
    fn test_utilization_reported() {
        let mut simulator = Simulator::with_tasks(
            SchedulingPolicy::DeadlineMonotonic,
            vec![TaskParams::implicit(4, 1), TaskParams::implicit(2, 1)],
        )
        .unwrap();
        let result = simulator.run(4);

        assert_eq!(result.utilization, 0.75);
        assert_eq!(result.policy_name, "DMS");
    }
}
