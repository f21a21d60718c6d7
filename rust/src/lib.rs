//! Rust implementation of the cronograma dependency engine.
//!
//! Resolves inter-task dependencies over a working calendar, excludes cyclic
//! dependencies, flags milestones and rolls dates up through the
//! activity / EDT / phase hierarchy.

// Allow clippy warning triggered by PyO3 macro expansion
#![allow(clippy::useless_conversion)]

use pyo3::exceptions::{PyTimeoutError, PyValueError};
use pyo3::prelude::*;
use std::time::Duration;

pub mod calendar;
mod config;
pub mod engine;
pub mod graph;
pub mod hierarchy;
pub mod logging;
pub mod milestones;
mod models;
pub mod resolver;

pub use calendar::{CalendarError, WorkingCalendar};
pub use config::{CalendarConfig, EngineConfig};
pub use engine::{
    process_schedule, resolve, CancellationToken, EngineState, ResolveError, ScheduleEngine,
};
pub use graph::{detect_cycles, CycleDetector, DependencyGraph};
pub use hierarchy::{roll_up, RollupReport};
pub use logging::Verbosity;
pub use milestones::{identify_milestones, is_milestone};
pub use models::{
    Container, ContainerKind, CorrectionRecord, Dependency, DependencyType,
    ParseDependencyTypeError, Resolution, ScheduleOutcome, ScheduleSnapshot, Task,
};
pub use resolver::{DateResolver, TaskDates};

fn to_py_err(err: ResolveError) -> PyErr {
    match err {
        ResolveError::InvalidCalendar(e) => PyValueError::new_err(e.to_string()),
        e @ ResolveError::Cancelled { .. } => PyTimeoutError::new_err(e.to_string()),
    }
}

fn cancellation(timeout_ms: Option<u64>) -> CancellationToken {
    match timeout_ms {
        Some(ms) => CancellationToken::new().with_timeout(Duration::from_millis(ms)),
        None => CancellationToken::new(),
    }
}

/// Resolve task dates against their dependencies.
///
/// # Arguments
/// * `tasks` - All tasks of the schedule
/// * `dependencies` - All dependencies between those tasks
/// * `calendar` - Working calendar (default: 8h/day, Monday-Friday)
/// * `config` - Engine configuration (verbosity, iteration bound)
/// * `timeout_ms` - Abort propagation once this many milliseconds have passed
///
/// # Raises
/// * ValueError if the calendar is invalid
/// * TimeoutError if the timeout expires mid-pass
#[pyfunction]
#[pyo3(signature = (tasks, dependencies, calendar=None, config=None, timeout_ms=None))]
fn resolve_schedule(
    tasks: Vec<Task>,
    dependencies: Vec<Dependency>,
    calendar: Option<CalendarConfig>,
    config: Option<EngineConfig>,
    timeout_ms: Option<u64>,
) -> PyResult<Resolution> {
    let snapshot = ScheduleSnapshot {
        tasks,
        dependencies,
        containers: Vec::new(),
        calendar: calendar.unwrap_or_default(),
    };
    resolve(
        &snapshot,
        &config.unwrap_or_default(),
        &cancellation(timeout_ms),
    )
    .map_err(to_py_err)
}

/// Resolve dependencies, identify milestones and roll up container dates.
#[pyfunction(name = "process_schedule")]
#[pyo3(signature = (tasks, dependencies, containers=None, calendar=None, config=None, timeout_ms=None))]
fn py_process_schedule(
    tasks: Vec<Task>,
    dependencies: Vec<Dependency>,
    containers: Option<Vec<Container>>,
    calendar: Option<CalendarConfig>,
    config: Option<EngineConfig>,
    timeout_ms: Option<u64>,
) -> PyResult<ScheduleOutcome> {
    let snapshot = ScheduleSnapshot {
        tasks,
        dependencies,
        containers: containers.unwrap_or_default(),
        calendar: calendar.unwrap_or_default(),
    };
    process_schedule(
        &snapshot,
        &config.unwrap_or_default(),
        &cancellation(timeout_ms),
    )
    .map_err(to_py_err)
}

/// Describe every dependency cycle as "A -> B -> A".
#[pyfunction(name = "detect_cycles")]
fn py_detect_cycles(tasks: Vec<Task>, dependencies: Vec<Dependency>) -> Vec<String> {
    detect_cycles(&tasks, &dependencies)
}

/// Flag milestone tasks.
///
/// # Returns
/// * (tasks with updated milestone flags, "Hito identificado: <name>" messages)
#[pyfunction(name = "identify_milestones")]
fn py_identify_milestones(mut tasks: Vec<Task>) -> (Vec<Task>, Vec<String>) {
    let found = identify_milestones(&mut tasks);
    (tasks, found)
}

/// Roll task dates up through their containers.
///
/// # Returns
/// * (updated containers, ids of changed containers, warnings)
#[pyfunction]
#[pyo3(signature = (tasks, containers, verbosity=0))]
fn roll_up_hierarchy(
    tasks: Vec<Task>,
    mut containers: Vec<Container>,
    verbosity: u8,
) -> (Vec<Container>, Vec<String>, Vec<String>) {
    let report = roll_up(&tasks, &mut containers, Verbosity::from_level(verbosity));
    (containers, report.updated_container_ids, report.warnings)
}

/// The cronograma.rust Python module.
#[pymodule]
fn rust(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Core data types
    m.add_class::<DependencyType>()?;
    m.add_class::<Task>()?;
    m.add_class::<Dependency>()?;
    m.add_class::<ContainerKind>()?;
    m.add_class::<Container>()?;
    m.add_class::<CorrectionRecord>()?;
    m.add_class::<Resolution>()?;
    m.add_class::<ScheduleOutcome>()?;

    // Config types
    m.add_class::<CalendarConfig>()?;
    m.add_class::<EngineConfig>()?;

    // Algorithms
    m.add_function(wrap_pyfunction!(resolve_schedule, m)?)?;
    m.add_function(wrap_pyfunction!(py_process_schedule, m)?)?;
    m.add_function(wrap_pyfunction!(py_detect_cycles, m)?)?;
    m.add_function(wrap_pyfunction!(py_identify_milestones, m)?)?;
    m.add_function(wrap_pyfunction!(roll_up_hierarchy, m)?)?;

    Ok(())
}
