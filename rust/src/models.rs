//! Core data types for the schedule engine.

use chrono::{Duration, NaiveDateTime};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::CalendarConfig;

/// How the dependent task's dates are bounded by its origin task.
#[pyclass(eq, eq_int)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DependencyType {
    FinishToStart,
    StartToStart,
    FinishToFinish,
    StartToFinish,
}

impl DependencyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyType::FinishToStart => "finish_to_start",
            DependencyType::StartToStart => "start_to_start",
            DependencyType::FinishToFinish => "finish_to_finish",
            DependencyType::StartToFinish => "start_to_finish",
        }
    }

    /// Whether the constraint is anchored on the origin's start (SS, SF)
    /// rather than its end (FS, FF).
    pub fn anchors_on_origin_start(&self) -> bool {
        matches!(
            self,
            DependencyType::StartToStart | DependencyType::StartToFinish
        )
    }

    /// Whether the constraint bounds the dependent's end (FF, SF)
    /// rather than its start (FS, SS).
    pub fn bounds_dependent_end(&self) -> bool {
        matches!(
            self,
            DependencyType::FinishToFinish | DependencyType::StartToFinish
        )
    }
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown dependency type: {0}")]
pub struct ParseDependencyTypeError(pub String);

impl FromStr for DependencyType {
    type Err = ParseDependencyTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "finish_to_start" | "fs" => Ok(DependencyType::FinishToStart),
            "start_to_start" | "ss" => Ok(DependencyType::StartToStart),
            "finish_to_finish" | "ff" => Ok(DependencyType::FinishToFinish),
            "start_to_finish" | "sf" => Ok(DependencyType::StartToFinish),
            _ => Err(ParseDependencyTypeError(s.to_string())),
        }
    }
}

/// A schedulable unit of work.
#[pyclass]
#[derive(Clone, Debug, PartialEq)]
pub struct Task {
    #[pyo3(get, set)]
    pub id: String,
    #[pyo3(get, set)]
    pub name: String,
    #[pyo3(get, set)]
    pub start: NaiveDateTime,
    #[pyo3(get, set)]
    pub end: NaiveDateTime,
    /// Containing activity, EDT or phase.
    #[pyo3(get, set)]
    pub parent_id: Option<String>,
    /// Derived by the milestone scan; never read as input.
    #[pyo3(get)]
    pub is_milestone: bool,
}

impl Task {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            start,
            end,
            parent_id: None,
            is_milestone: false,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

#[pymethods]
impl Task {
    #[new]
    #[pyo3(signature = (id, name, start, end, parent_id=None))]
    fn py_new(
        id: String,
        name: String,
        start: NaiveDateTime,
        end: NaiveDateTime,
        parent_id: Option<String>,
    ) -> Self {
        Self {
            parent_id,
            ..Self::new(id, name, start, end)
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "Task(id={:?}, name={:?}, start={}, end={}, milestone={})",
            self.id, self.name, self.start, self.end, self.is_milestone
        )
    }
}

/// A directed edge: `dependent_task_id` is bounded by `origin_task_id`.
#[pyclass]
#[derive(Clone, Debug, PartialEq)]
pub struct Dependency {
    #[pyo3(get, set)]
    pub id: String,
    #[pyo3(get, set)]
    pub origin_task_id: String,
    #[pyo3(get, set)]
    pub dependent_task_id: String,
    #[pyo3(get, set)]
    pub dependency_type: DependencyType,
    /// Signed working minutes; negative is lead time.
    #[pyo3(get, set)]
    pub lag_minutes: i64,
}

impl Dependency {
    pub fn new(
        id: impl Into<String>,
        origin_task_id: impl Into<String>,
        dependent_task_id: impl Into<String>,
        dependency_type: DependencyType,
        lag_minutes: i64,
    ) -> Self {
        Self {
            id: id.into(),
            origin_task_id: origin_task_id.into(),
            dependent_task_id: dependent_task_id.into(),
            dependency_type,
            lag_minutes,
        }
    }
}

#[pymethods]
impl Dependency {
    #[new]
    #[pyo3(signature = (id, origin_task_id, dependent_task_id, dependency_type="finish_to_start", lag_minutes=0))]
    fn py_new(
        id: String,
        origin_task_id: String,
        dependent_task_id: String,
        dependency_type: &str,
        lag_minutes: i64,
    ) -> PyResult<Self> {
        let dependency_type = dependency_type
            .parse::<DependencyType>()
            .map_err(|e| PyValueError::new_err(e.to_string()))?;
        Ok(Self::new(
            id,
            origin_task_id,
            dependent_task_id,
            dependency_type,
            lag_minutes,
        ))
    }

    fn __repr__(&self) -> String {
        format!(
            "Dependency(id={:?}, {} -> {}, type={}, lag_minutes={})",
            self.id,
            self.origin_task_id,
            self.dependent_task_id,
            self.dependency_type,
            self.lag_minutes
        )
    }
}

/// Level of a hierarchy container.
#[pyclass(eq, eq_int)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainerKind {
    Activity,
    Edt,
    Phase,
}

/// An activity, EDT element or phase whose interval encloses its children.
#[pyclass]
#[derive(Clone, Debug, PartialEq)]
pub struct Container {
    #[pyo3(get, set)]
    pub id: String,
    #[pyo3(get, set)]
    pub name: String,
    #[pyo3(get, set)]
    pub kind: ContainerKind,
    /// None until the container has children to roll up.
    #[pyo3(get, set)]
    pub start: Option<NaiveDateTime>,
    #[pyo3(get, set)]
    pub end: Option<NaiveDateTime>,
    #[pyo3(get, set)]
    pub parent_id: Option<String>,
}

impl Container {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: ContainerKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            start: None,
            end: None,
            parent_id: None,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_dates(mut self, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }
}

#[pymethods]
impl Container {
    #[new]
    #[pyo3(signature = (id, name, kind, parent_id=None, start=None, end=None))]
    fn py_new(
        id: String,
        name: String,
        kind: ContainerKind,
        parent_id: Option<String>,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Self {
        Self {
            id,
            name,
            kind,
            start,
            end,
            parent_id,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "Container(id={:?}, kind={:?}, start={:?}, end={:?})",
            self.id, self.kind, self.start, self.end
        )
    }
}

/// One date adjustment made while resolving dependencies.
#[pyclass]
#[derive(Clone, Debug, PartialEq)]
pub struct CorrectionRecord {
    #[pyo3(get)]
    pub task_id: String,
    #[pyo3(get)]
    pub dependency_id: String,
    #[pyo3(get)]
    pub message: String,
    #[pyo3(get)]
    pub previous_start: NaiveDateTime,
    #[pyo3(get)]
    pub new_start: NaiveDateTime,
}

#[pymethods]
impl CorrectionRecord {
    fn __repr__(&self) -> String {
        format!("CorrectionRecord({:?})", self.message)
    }
}

/// Everything one resolution pass consumes, loaded up front by the caller.
#[derive(Clone, Debug, Default)]
pub struct ScheduleSnapshot {
    pub tasks: Vec<Task>,
    pub dependencies: Vec<Dependency>,
    pub containers: Vec<Container>,
    pub calendar: CalendarConfig,
}

/// Result of resolving dependencies over a snapshot.
#[pyclass]
#[derive(Clone, Debug, Default)]
pub struct Resolution {
    #[pyo3(get)]
    pub corrections: Vec<CorrectionRecord>,
    /// One "A -> B -> A" chain per cycle excluded from propagation.
    #[pyo3(get)]
    pub cycle_warnings: Vec<String>,
    /// Skipped dependencies, ignored cyclic edges and fixpoint warnings.
    #[pyo3(get)]
    pub diagnostics: Vec<String>,
    /// Full task set with corrected dates.
    #[pyo3(get)]
    pub tasks: Vec<Task>,
    /// Ids of tasks whose dates changed, in order of first change.
    #[pyo3(get)]
    pub updated_task_ids: Vec<String>,
    #[pyo3(get)]
    pub fixpoint_reached: bool,
    #[pyo3(get)]
    pub iterations: usize,
}

#[pymethods]
impl Resolution {
    /// Correction messages in the order they were produced.
    pub fn correction_messages(&self) -> Vec<String> {
        self.corrections.iter().map(|c| c.message.clone()).collect()
    }

    fn __repr__(&self) -> String {
        format!(
            "Resolution(corrections={}, cycles={}, diagnostics={}, fixpoint={})",
            self.corrections.len(),
            self.cycle_warnings.len(),
            self.diagnostics.len(),
            self.fixpoint_reached
        )
    }
}

/// Resolution plus milestone scan and hierarchy roll-up.
#[pyclass]
#[derive(Clone, Debug, Default)]
pub struct ScheduleOutcome {
    #[pyo3(get)]
    pub resolution: Resolution,
    /// "Hito identificado: <name>" per milestone task.
    #[pyo3(get)]
    pub milestones: Vec<String>,
    #[pyo3(get)]
    pub containers: Vec<Container>,
    #[pyo3(get)]
    pub updated_container_ids: Vec<String>,
    #[pyo3(get)]
    pub hierarchy_warnings: Vec<String>,
}

#[pymethods]
impl ScheduleOutcome {
    fn __repr__(&self) -> String {
        format!(
            "ScheduleOutcome(corrections={}, milestones={}, containers_updated={})",
            self.resolution.corrections.len(),
            self.milestones.len(),
            self.updated_container_ids.len()
        )
    }
}
