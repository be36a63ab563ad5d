//! rtsim Simulation Engine CLI
//!
//! Command-line interface for running real-time scheduling simulations
//!
//! ```bash
//! # Sample task set under DMS for 500 ticks
//! rtsim run
//!
//! # Explicit tasks (PERIOD:EXEC:DEADLINE[:PRIORITY]) under LLF
//! rtsim run --policy llf --task 10:3:10 --task 10:6:10 --end-time 20
//!
//! # Same task set under every policy
//! rtsim compare --config tasks.json
//!
//! # Random task set as a config file
//! rtsim generate --seed 42 --output tasks.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rtsim_engine::{
    SchedulingPolicy, SimulationConfig, SimulationResult, TaskParams, TaskSetGenerator, Ticks,
    Timeline, TracingSink,
};

/// rtsim: periodic real-time task scheduling simulator
#[derive(Parser)]
#[command(name = "rtsim")]
#[command(about = "Simulate DMS, LLF and fixed-priority scheduling of periodic tasks", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one simulation and print a per-task summary
    Run {
        #[command(flatten)]
        source: TaskSource,

        /// Scheduling policy (dms, llf, priority)
        #[arg(short, long)]
        policy: Option<SchedulingPolicy>,

        /// Log every scheduling event
        #[arg(long)]
        events: bool,

        /// Write result and timeline as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run the same task set under every policy
    Compare {
        #[command(flatten)]
        source: TaskSource,

        /// Write all results as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate a random task set config
    Generate {
        /// RNG seed for a reproducible task set
        #[arg(long)]
        seed: Option<u64>,

        /// Number of tasks (random 1-9 if omitted)
        #[arg(short = 'n', long)]
        count: Option<usize>,

        /// Simulation length stored in the config
        #[arg(long, default_value_t = rtsim_engine::config::DEFAULT_END_TIME)]
        end_time: Ticks,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Where the task set comes from. Defaults to the built-in sample set.
#[derive(Args, Debug)]
struct TaskSource {
    /// JSON config file
    #[arg(short, long, conflicts_with_all = ["tasks", "random"])]
    config: Option<PathBuf>,

    /// Task as PERIOD:EXEC:DEADLINE[:PRIORITY] (repeatable)
    #[arg(short, long = "task", value_name = "SPEC")]
    tasks: Vec<TaskParams>,

    /// Use a random task set
    #[arg(long, conflicts_with = "tasks")]
    random: bool,

    /// RNG seed for --random
    #[arg(long, requires = "random")]
    seed: Option<u64>,

    /// Simulation length in ticks (overrides the config)
    #[arg(short, long)]
    end_time: Option<Ticks>,
}

impl TaskSource {
    fn load(&self) -> anyhow::Result<SimulationConfig> {
        let mut config = if let Some(path) = &self.config {
            SimulationConfig::from_file(path)
                .with_context(|| format!("failed to load config {}", path.display()))?
        } else if !self.tasks.is_empty() {
            SimulationConfig {
                tasks: self.tasks.clone(),
                ..SimulationConfig::default()
            }
        } else if self.random {
            let mut generator = match self.seed {
                Some(seed) => TaskSetGenerator::seeded(seed),
                None => TaskSetGenerator::new(),
            };
            SimulationConfig {
                tasks: generator.generate(),
                ..SimulationConfig::default()
            }
        } else {
            SimulationConfig::default()
        };

        if let Some(end_time) = self.end_time {
            config.end_time = end_time;
        }
        config.validate()?;
        Ok(config)
    }
}

/// JSON output of `rtsim run`
#[derive(Serialize)]
struct RunReport<'a> {
    config: &'a SimulationConfig,
    result: &'a SimulationResult,
    timeline: &'a Timeline,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_filter = if cli.verbose {
        "rtsim=debug,rtsim_engine=debug"
    } else {
        "rtsim=info,rtsim_engine=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Run {
            source,
            policy,
            events,
            output,
        } => {
            let mut config = source.load()?;
            if let Some(policy) = policy {
                config.policy = policy;
            }
            run(&config, events, output)
        }
        Commands::Compare { source, output } => {
            let config = source.load()?;
            compare(&config, output)
        }
        Commands::Generate {
            seed,
            count,
            end_time,
            output,
        } => generate(seed, count, end_time, output),
    }
}

fn run(config: &SimulationConfig, events: bool, output: Option<PathBuf>) -> anyhow::Result<()> {
    info!(
        policy = %config.policy,
        tasks = config.tasks.len(),
        end_time = config.end_time,
        utilization = config.utilization(),
        "Running simulation"
    );

    let mut simulator = config.build_simulator()?;
    let mut timeline = Timeline::new();
    let result = if events {
        simulator.schedule(config.end_time, &mut (&mut timeline, TracingSink))
    } else {
        simulator.schedule(config.end_time, &mut timeline)
    };

    print_task_table(&result);
    println!(
        "\nContext switches: {}   Idle ticks: {}   Deadline misses: {}",
        timeline.context_switches(),
        result.idle_ticks,
        result.total_deadline_misses
    );
    if !timeline.misses.is_empty() {
        let ticks: Vec<String> = timeline
            .misses
            .iter()
            .map(|m| format!("T{}@{}", m.task, m.tick))
            .collect();
        println!("Misses: {}", ticks.join(", "));
    }

    if let Some(path) = output {
        let report = RunReport {
            config,
            result: &result,
            timeline: &timeline,
        };
        write_json(&path, &report)?;
    }

    Ok(())
}

fn compare(config: &SimulationConfig, output: Option<PathBuf>) -> anyhow::Result<()> {
    let mut simulator = config.build_simulator()?;
    let mut results = Vec::new();

    for policy in SchedulingPolicy::ALL {
        debug!(%policy, "Running comparison");
        simulator.set_policy(policy);
        results.push(simulator.run(config.end_time));
    }

    println!(
        "{:<15} {:>10} {:>10} {:>12} {:>8}",
        "Policy", "Misses", "Idle", "Utilization", "OK"
    );
    println!("{}", "-".repeat(59));
    for result in &results {
        println!(
            "{:<15} {:>10} {:>10} {:>12.3} {:>8}",
            result.policy_name,
            result.total_deadline_misses,
            result.idle_ticks,
            result.utilization,
            if result.all_deadlines_met { "yes" } else { "no" }
        );
    }

    if let Some(path) = output {
        write_json(&path, &results)?;
    }

    Ok(())
}

fn generate(
    seed: Option<u64>,
    count: Option<usize>,
    end_time: Ticks,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut generator = match seed {
        Some(seed) => TaskSetGenerator::seeded(seed),
        None => TaskSetGenerator::new(),
    };
    let tasks = match count {
        Some(0) => bail!("task count must be at least 1"),
        Some(n) => generator.generate_n(n),
        None => generator.generate(),
    };

    let config = SimulationConfig::new(SchedulingPolicy::default(), end_time, tasks);
    match output {
        Some(path) => write_json(&path, &config)?,
        None => println!("{}", config.to_json_pretty()?),
    }

    Ok(())
}

fn print_task_table(result: &SimulationResult) {
    println!(
        "Policy: {}   Ticks: {}   Utilization: {:.3}\n",
        result.policy_name, result.end_time, result.utilization
    );
    println!(
        "{:<6} {:>8} {:>8} {:>9} {:>9} {:>10} {:>10} {:>8}",
        "Task", "Period", "Exec", "Deadline", "Priority", "Executed", "Completed", "Misses"
    );
    println!("{}", "-".repeat(75));

    for task in &result.tasks {
        println!(
            "T{:<5} {:>8} {:>8} {:>9} {:>9} {:>10} {:>10} {:>8}",
            task.id,
            task.params.period,
            task.params.execution_time,
            task.params.deadline,
            task.params.priority,
            task.executed_ticks,
            task.completed_jobs,
            task.deadline_misses
        );
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    info!("Results written to {}", path.display());
    Ok(())
}
