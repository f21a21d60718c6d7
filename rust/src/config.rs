//! Configuration types for the schedule engine.

use chrono::{NaiveDate, NaiveTime};
use pyo3::prelude::*;
use std::collections::HashSet;

use crate::logging::Verbosity;

// Note: std HashSet here for PyO3 interface compatibility

/// Working-time definition used to offset dates by a dependency lag.
#[pyclass]
#[derive(Clone, Debug)]
pub struct CalendarConfig {
    /// Working hours in each working day. Must be in (0, 24].
    #[pyo3(get, set)]
    pub hours_per_day: f64,
    /// Weekday names that count as working days ("monday", "mon", "lunes", ...).
    #[pyo3(get, set)]
    pub working_days: HashSet<String>,
    /// Dates excluded from working time even if their weekday is a working day.
    #[pyo3(get, set)]
    pub holidays: HashSet<NaiveDate>,
    /// Time of day at which each working day begins.
    #[pyo3(get, set)]
    pub day_start: NaiveTime,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            hours_per_day: 8.0,
            working_days: ["monday", "tuesday", "wednesday", "thursday", "friday"]
                .into_iter()
                .map(String::from)
                .collect(),
            holidays: HashSet::new(),
            day_start: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default(),
        }
    }
}

#[pymethods]
impl CalendarConfig {
    #[new]
    #[pyo3(signature = (hours_per_day=None, working_days=None, holidays=None, day_start=None))]
    fn new(
        hours_per_day: Option<f64>,
        working_days: Option<HashSet<String>>,
        holidays: Option<HashSet<NaiveDate>>,
        day_start: Option<NaiveTime>,
    ) -> Self {
        let defaults = Self::default();
        Self {
            hours_per_day: hours_per_day.unwrap_or(defaults.hours_per_day),
            working_days: working_days.unwrap_or(defaults.working_days),
            holidays: holidays.unwrap_or(defaults.holidays),
            day_start: day_start.unwrap_or(defaults.day_start),
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "CalendarConfig(hours_per_day={}, working_days={}, holidays={}, day_start={})",
            self.hours_per_day,
            self.working_days.len(),
            self.holidays.len(),
            self.day_start
        )
    }
}

/// Knobs for one resolution pass.
#[pyclass]
#[derive(Clone, Debug, Default)]
pub struct EngineConfig {
    /// Verbosity level: 0=silent, 1=changes, 2=checks, 3=debug.
    #[pyo3(get, set)]
    pub verbosity: u8,
    /// Maximum propagation iterations (None = task count + 1).
    #[pyo3(get, set)]
    pub max_iterations: Option<usize>,
}

#[pymethods]
impl EngineConfig {
    #[new]
    #[pyo3(signature = (verbosity=0, max_iterations=None))]
    fn new(verbosity: u8, max_iterations: Option<usize>) -> Self {
        Self {
            verbosity,
            max_iterations,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "EngineConfig(verbosity={}, max_iterations={:?})",
            self.verbosity, self.max_iterations
        )
    }
}

impl EngineConfig {
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_level(self.verbosity)
    }

    /// Iteration bound for a schedule with `task_count` tasks.
    pub fn iteration_bound(&self, task_count: usize) -> usize {
        self.max_iterations.unwrap_or(task_count + 1).max(1)
    }
}
