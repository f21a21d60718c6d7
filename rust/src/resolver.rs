//! Single-edge date resolution.
//!
//! A dependency is a lower bound on either the start or the end of the
//! dependent task. When the bound is violated the whole task moves forward by
//! the shortfall, so its duration never changes. Tasks are never pulled
//! earlier.

use chrono::NaiveDateTime;

use crate::calendar::{CalendarError, WorkingCalendar};
use crate::models::{DependencyType, Task};

/// Start and end of a task, as seen by one constraint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TaskDates {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TaskDates {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    pub fn of(task: &Task) -> Self {
        Self::new(task.start, task.end)
    }
}

/// Minimum date a constraint imposes on the dependent task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bound {
    Start(NaiveDateTime),
    End(NaiveDateTime),
}

pub struct DateResolver<'c> {
    calendar: &'c WorkingCalendar,
}

impl<'c> DateResolver<'c> {
    pub fn new(calendar: &'c WorkingCalendar) -> Self {
        Self { calendar }
    }

    /// The bound `origin` imposes through a dependency of `dependency_type`.
    pub fn bound(
        &self,
        origin: TaskDates,
        dependency_type: DependencyType,
        lag_minutes: i64,
    ) -> Result<Bound, CalendarError> {
        let anchor = if dependency_type.anchors_on_origin_start() {
            origin.start
        } else {
            origin.end
        };
        let limit = self.calendar.add_duration(anchor, lag_minutes)?;
        Ok(if dependency_type.bounds_dependent_end() {
            Bound::End(limit)
        } else {
            Bound::Start(limit)
        })
    }

    /// Earliest feasible dates for `dependent`, or `None` if it already
    /// satisfies the constraint.
    pub fn resolve(
        &self,
        origin: TaskDates,
        dependency_type: DependencyType,
        lag_minutes: i64,
        dependent: TaskDates,
    ) -> Result<Option<TaskDates>, CalendarError> {
        let delta = match self.bound(origin, dependency_type, lag_minutes)? {
            Bound::Start(min_start) if dependent.start < min_start => min_start - dependent.start,
            Bound::End(min_end) if dependent.end < min_end => min_end - dependent.end,
            _ => return Ok(None),
        };

        let start = dependent
            .start
            .checked_add_signed(delta)
            .ok_or(CalendarError::OutOfRange(dependent.start))?;
        let end = dependent
            .end
            .checked_add_signed(delta)
            .ok_or(CalendarError::OutOfRange(dependent.end))?;
        Ok(Some(TaskDates::new(start, end)))
    }
}
