//! Schedule resolution engine.
//!
//! One pass runs through `Loaded -> GraphBuilt -> CyclesResolved ->
//! Propagating -> Fixpoint` over a private copy of the snapshot. Only an
//! invalid calendar or a cancellation stops the pass; dangling references,
//! cycles, lags that leave the representable date range, inverted tasks and
//! an exhausted iteration bound become diagnostics.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::calendar::{CalendarError, WorkingCalendar};
use crate::config::EngineConfig;
use crate::graph::{CycleDetector, DependencyGraph};
use crate::hierarchy::roll_up;
use crate::logging::Verbosity;
use crate::milestones::identify_milestones;
use crate::models::{
    CorrectionRecord, Dependency, Resolution, ScheduleOutcome, ScheduleSnapshot, Task,
};
use crate::resolver::{DateResolver, TaskDates};
use crate::{log_changes, log_checks, log_debug};

/// Errors that stop a resolution pass.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error(transparent)]
    InvalidCalendar(#[from] CalendarError),
    #[error("Resolution cancelled after {iterations} iterations")]
    Cancelled {
        iterations: usize,
        /// Corrections applied to the engine's copy before the signal was seen.
        corrections: Vec<CorrectionRecord>,
        diagnostics: Vec<String>,
        cycle_warnings: Vec<String>,
    },
}

/// Shared cancellation signal with an optional deadline.
///
/// Checked once per propagation iteration.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    Loaded,
    GraphBuilt,
    CyclesResolved,
    Propagating,
    /// Terminal; `fixpoint_reached` tells whether propagation converged.
    Fixpoint,
}

/// Resolves the dependencies of one schedule snapshot.
pub struct ScheduleEngine {
    calendar: WorkingCalendar,
    verbosity: Verbosity,
    iteration_bound: usize,
    state: EngineState,

    tasks: Vec<Task>,
    dependencies: Vec<Dependency>,
    graph: DependencyGraph,

    corrections: Vec<CorrectionRecord>,
    cycle_warnings: Vec<String>,
    diagnostics: Vec<String>,
    updated_task_ids: Vec<String>,
    iterations: usize,
    fixpoint_reached: bool,
}

impl ScheduleEngine {
    /// Load a snapshot. Fails if its calendar is invalid.
    pub fn new(snapshot: &ScheduleSnapshot, config: &EngineConfig) -> Result<Self, ResolveError> {
        let calendar = WorkingCalendar::new(&snapshot.calendar)?;
        Ok(Self {
            calendar,
            verbosity: config.verbosity(),
            iteration_bound: config.iteration_bound(snapshot.tasks.len()),
            state: EngineState::Loaded,
            tasks: snapshot.tasks.clone(),
            dependencies: snapshot.dependencies.clone(),
            graph: DependencyGraph::default(),
            corrections: Vec::new(),
            cycle_warnings: Vec::new(),
            diagnostics: Vec::new(),
            updated_task_ids: Vec::new(),
            iterations: 0,
            fixpoint_reached: false,
        })
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Drive the pass from the current state to `Fixpoint`.
    pub fn run(&mut self, cancel: &CancellationToken) -> Result<(), ResolveError> {
        loop {
            match self.state {
                EngineState::Loaded => self.build_graph(),
                EngineState::GraphBuilt => self.resolve_cycles(),
                EngineState::CyclesResolved | EngineState::Propagating => self.propagate(cancel)?,
                EngineState::Fixpoint => return Ok(()),
            }
        }
    }

    pub fn into_resolution(self) -> Resolution {
        Resolution {
            corrections: self.corrections,
            cycle_warnings: self.cycle_warnings,
            diagnostics: self.diagnostics,
            tasks: self.tasks,
            updated_task_ids: self.updated_task_ids,
            fixpoint_reached: self.fixpoint_reached,
            iterations: self.iterations,
        }
    }

    fn build_graph(&mut self) {
        for task in self.tasks.iter().filter(|t| t.end < t.start) {
            let message = format!(
                "Task {} ends before it starts ({} < {}): duration kept as authored",
                task.id, task.end, task.start
            );
            log_checks!(self.verbosity, "{}", message);
            self.diagnostics.push(message);
        }

        let (graph, dangling) = DependencyGraph::build(&self.tasks, &self.dependencies);
        for missing in dangling {
            log_checks!(self.verbosity, "{}", missing.describe());
            self.diagnostics.push(missing.describe());
        }
        log_debug!(
            self.verbosity,
            "Graph built: {} tasks, {} edges",
            graph.node_count(),
            graph.edges().len()
        );
        self.graph = graph;
        self.state = EngineState::GraphBuilt;
    }

    fn resolve_cycles(&mut self) {
        let cycles = CycleDetector::new(&self.graph).find_cycles();
        let mut cyclic_edges = FxHashSet::default();

        for cycle in &cycles {
            let chain = CycleDetector::new(&self.graph).describe(cycle);
            log_checks!(self.verbosity, "Cycle detected: {}", chain);
            self.cycle_warnings.push(chain);
            cyclic_edges.extend(cycle.edges.iter().copied());
        }

        let mut cyclic_edges: Vec<_> = cyclic_edges.into_iter().collect();
        cyclic_edges.sort_unstable();
        for edge_id in cyclic_edges {
            let Some(edge) = self.graph.edge(edge_id) else {
                continue;
            };
            self.diagnostics.push(format!(
                "Dependency ignored: cycle detected ({} -> {}, {})",
                self.graph.node_name(edge.origin),
                self.graph.node_name(edge.dependent),
                edge.dependency_type
            ));
            self.graph.exclude(edge_id);
        }

        self.state = EngineState::CyclesResolved;
    }

    fn propagate(&mut self, cancel: &CancellationToken) -> Result<(), ResolveError> {
        self.state = EngineState::Propagating;
        let order = self.graph.active_edges_in_order();
        log_debug!(self.verbosity, "Propagating over {} active edges", order.len());

        let resolver = DateResolver::new(&self.calendar);
        let mut changed_ids: FxHashSet<String> = self.updated_task_ids.iter().cloned().collect();

        while self.iterations < self.iteration_bound {
            if cancel.is_cancelled() {
                return Err(ResolveError::Cancelled {
                    iterations: self.iterations,
                    corrections: self.corrections.clone(),
                    diagnostics: self.diagnostics.clone(),
                    cycle_warnings: self.cycle_warnings.clone(),
                });
            }

            self.iterations += 1;
            log_debug!(self.verbosity, "Iteration {}", self.iterations);
            let mut changed = false;

            for &edge_id in &order {
                if self.graph.is_excluded(edge_id) {
                    continue;
                }
                let Some(edge) = self.graph.edge(edge_id) else {
                    continue;
                };
                let origin = TaskDates::of(&self.tasks[edge.origin]);
                let dependent = TaskDates::of(&self.tasks[edge.dependent]);

                // The calendar is valid, so a failure here belongs to this edge alone
                let shifted = match resolver.resolve(
                    origin,
                    edge.dependency_type,
                    edge.lag_minutes,
                    dependent,
                ) {
                    Ok(Some(shifted)) => shifted,
                    Ok(None) => {
                        log_checks!(
                            self.verbosity,
                            "Dependency {} satisfied",
                            edge.dependency_id
                        );
                        continue;
                    }
                    Err(err) => {
                        let message = format!("Dependency {} ignored: {}", edge.dependency_id, err);
                        log_checks!(self.verbosity, "{}", message);
                        self.diagnostics.push(message);
                        self.graph.exclude(edge_id);
                        continue;
                    }
                };

                let origin_name = self.tasks[edge.origin].name.clone();
                let task = &mut self.tasks[edge.dependent];
                let message = format!(
                    "Tarea {} ajustada por dependencia {} con {}",
                    task.name, edge.dependency_type, origin_name
                );
                log_changes!(
                    self.verbosity,
                    "{}: [{}, {}] -> [{}, {}]",
                    message,
                    task.start,
                    task.end,
                    shifted.start,
                    shifted.end
                );

                self.corrections.push(CorrectionRecord {
                    task_id: task.id.clone(),
                    dependency_id: edge.dependency_id.clone(),
                    message,
                    previous_start: task.start,
                    new_start: shifted.start,
                });
                if changed_ids.insert(task.id.clone()) {
                    self.updated_task_ids.push(task.id.clone());
                }
                task.start = shifted.start;
                task.end = shifted.end;
                changed = true;
            }

            if !changed {
                self.fixpoint_reached = true;
                break;
            }
        }

        if !self.fixpoint_reached {
            self.diagnostics.push(format!(
                "Fixpoint not reached after {} iterations: possible residual inconsistency",
                self.iterations
            ));
        }
        self.state = EngineState::Fixpoint;
        Ok(())
    }
}

/// Resolve all dependencies of `snapshot` and return the corrected tasks.
pub fn resolve(
    snapshot: &ScheduleSnapshot,
    config: &EngineConfig,
    cancel: &CancellationToken,
) -> Result<Resolution, ResolveError> {
    let mut engine = ScheduleEngine::new(snapshot, config)?;
    engine.run(cancel)?;
    Ok(engine.into_resolution())
}

/// Resolve, flag milestones, then roll dates up through the containers.
pub fn process_schedule(
    snapshot: &ScheduleSnapshot,
    config: &EngineConfig,
    cancel: &CancellationToken,
) -> Result<ScheduleOutcome, ResolveError> {
    let mut resolution = resolve(snapshot, config, cancel)?;
    let milestones = identify_milestones(&mut resolution.tasks);

    let mut containers = snapshot.containers.clone();
    let report = roll_up(&resolution.tasks, &mut containers, config.verbosity());

    Ok(ScheduleOutcome {
        resolution,
        milestones,
        containers,
        updated_container_ids: report.updated_container_ids,
        hierarchy_warnings: report.warnings,
    })
}
