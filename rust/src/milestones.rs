//! Automatic milestone identification.

use crate::models::Task;

/// A task is a milestone when it starts and ends on the same calendar day.
pub fn is_milestone(task: &Task) -> bool {
    task.start.date() == task.end.date()
}

/// Set the milestone flag on every task and describe the milestones found.
///
/// Dates are never touched; a task that stopped being a milestone gets its
/// flag cleared.
pub fn identify_milestones(tasks: &mut [Task]) -> Vec<String> {
    let mut found = Vec::new();
    for task in tasks.iter_mut() {
        task.is_milestone = is_milestone(task);
        if task.is_milestone {
            found.push(format!("Hito identificado: {}", task.name));
        }
    }
    found
}
