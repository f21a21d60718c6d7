//! Roll-up of task dates through activity / EDT / phase containers.
//!
//! Containers are processed deepest first, so each level sees its child
//! containers' final intervals. After a roll-up every container with at least
//! one dated child spans exactly `[min(child.start), max(child.end)]`.

use chrono::NaiveDateTime;
use rustc_hash::FxHashMap;

use crate::log_changes;
use crate::logging::Verbosity;
use crate::models::{Container, Task};

/// What a roll-up changed, plus anything it had to skip.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RollupReport {
    /// Ids of containers whose interval changed, deepest first.
    pub updated_container_ids: Vec<String>,
    pub warnings: Vec<String>,
}

type Span = (NaiveDateTime, NaiveDateTime);

/// Recompute every container's interval from its children.
pub fn roll_up(tasks: &[Task], containers: &mut [Container], verbosity: Verbosity) -> RollupReport {
    let mut report = RollupReport::default();
    let n = containers.len();

    let index: FxHashMap<String, usize> = containers
        .iter()
        .enumerate()
        .rev()
        .map(|(i, c)| (c.id.clone(), i))
        .collect();

    let parents: Vec<Option<usize>> = containers
        .iter()
        .map(|c| {
            let parent_id = c.parent_id.as_deref()?;
            let parent = index.get(parent_id).copied();
            if parent.is_none() {
                report.warnings.push(format!(
                    "Container {} has unknown parent '{}'",
                    c.id, parent_id
                ));
            }
            parent
        })
        .collect();

    // Depth = number of ancestors; None if the parent chain never ends.
    let depths: Vec<Option<usize>> = (0..n)
        .map(|i| {
            let mut depth = 0;
            let mut current = i;
            while let Some(parent) = parents[current] {
                depth += 1;
                if depth > n {
                    return None;
                }
                current = parent;
            }
            Some(depth)
        })
        .collect();

    let mut children: Vec<Vec<Span>> = vec![Vec::new(); n];
    for task in tasks {
        let Some(parent_id) = task.parent_id.as_deref() else {
            continue;
        };
        match index.get(parent_id) {
            Some(&parent) => children[parent].push((task.start, task.end)),
            None => report.warnings.push(format!(
                "Task {} has unknown parent container '{}'",
                task.id, parent_id
            )),
        }
    }

    let mut order: Vec<usize> = Vec::with_capacity(n);
    for (i, depth) in depths.iter().enumerate() {
        match depth {
            Some(_) => order.push(i),
            None => report.warnings.push(format!(
                "Container {} skipped: containment cycle",
                containers[i].id
            )),
        }
    }
    // Deepest first; stable sort keeps input order within a level
    order.sort_by_key(|&i| std::cmp::Reverse(depths[i]));

    for i in order {
        let spans = std::mem::take(&mut children[i]);
        let container = &mut containers[i];

        if let Some((start, end)) = enclosing(&spans) {
            if container.start != Some(start) || container.end != Some(end) {
                log_changes!(
                    verbosity,
                    "Container {} rolled up to [{}, {}]",
                    container.id,
                    start,
                    end
                );
                container.start = Some(start);
                container.end = Some(end);
                report.updated_container_ids.push(container.id.clone());
            }
        }

        if let (Some(parent), Some(start), Some(end)) =
            (parents[i], container.start, container.end)
        {
            children[parent].push((start, end));
        }
    }

    report
}

fn enclosing(spans: &[Span]) -> Option<Span> {
    let start = spans.iter().map(|s| s.0).min()?;
    let end = spans.iter().map(|s| s.1).max()?;
    Some((start, end))
}
