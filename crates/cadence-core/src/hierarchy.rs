//! Parent selection guard for task
//! hierarchies.
//!
//! A task may not be placed under
//! itself or anything in its subtree.
//! The guard computes that excluded
//! set; callers only offer the
//! filtered candidates as parents.

use std::collections::{
  HashMap,
  HashSet,
  VecDeque
};

use serde::{
  Deserialize,
  Serialize
};
use thiserror::Error;
use tracing::{
  debug,
  trace
};
use uuid::Uuid;

pub const MAX_PARENT_CANDIDATES: usize =
  5;

#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct TaskNode {
  pub id:        Uuid,
  #[serde(default)]
  pub parent_id: Option<Uuid>,
  #[serde(default)]
  pub title:     String
}

impl TaskNode {
  #[must_use]
  pub fn new(
    id: Uuid,
    parent_id: Option<Uuid>,
    title: impl Into<String>
  ) -> Self {
    Self {
      id,
      parent_id,
      title: title.into()
    }
  }
}

#[derive(
  Debug, Clone, PartialEq, Eq, Error,
)]
pub enum HierarchyError {
  #[error(
    "task {task} cannot be placed \
     under {parent}: it would become \
     its own ancestor"
  )]
  CycleViolation {
    task:   Uuid,
    parent: Uuid
  }
}

/// Returns `task_id` plus every task
/// reachable from it through child
/// links.
#[tracing::instrument(skip(all_tasks))]
pub fn compute_excluded(
  task_id: Uuid,
  all_tasks: &[TaskNode]
) -> HashSet<Uuid> {
  let mut children: HashMap<
    Uuid,
    Vec<Uuid>
  > = HashMap::new();
  for task in all_tasks {
    if let Some(parent) = task.parent_id
    {
      children
        .entry(parent)
        .or_default()
        .push(task.id);
    }
  }

  let mut excluded = HashSet::new();
  excluded.insert(task_id);
  let mut queue =
    VecDeque::from([task_id]);

  while let Some(current) =
    queue.pop_front()
  {
    let Some(kids) =
      children.get(&current)
    else {
      continue;
    };
    for &child in kids {
      // Visited check also stops on
      // cycles already in the data.
      if excluded.insert(child) {
        trace!(%child, parent = %current, "excluding descendant");
        queue.push_back(child);
      }
    }
  }

  debug!(
    excluded = excluded.len(),
    "computed excluded parents"
  );
  excluded
}

/// Case-insensitive title search over
/// tasks that are allowed as parents,
/// in input order, at most
/// [`MAX_PARENT_CANDIDATES`].
pub fn filter_candidate_parents<'a>(
  search_text: &str,
  all_tasks: &'a [TaskNode],
  excluded: &HashSet<Uuid>
) -> Vec<&'a TaskNode> {
  let needle = search_text.to_lowercase();
  all_tasks
    .iter()
    .filter(|task| {
      !excluded.contains(&task.id)
    })
    .filter(|task| {
      task
        .title
        .to_lowercase()
        .contains(&needle)
    })
    .take(MAX_PARENT_CANDIDATES)
    .collect()
}

/// Rejects `candidate` as a parent of
/// `task_id` when it sits in the
/// task's own subtree.
pub fn check_parent(
  task_id: Uuid,
  candidate: Uuid,
  all_tasks: &[TaskNode]
) -> Result<(), HierarchyError> {
  if compute_excluded(task_id, all_tasks)
    .contains(&candidate)
  {
    return Err(
      HierarchyError::CycleViolation {
        task:   task_id,
        parent: candidate
      }
    );
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use std::collections::HashSet;

  use uuid::Uuid;

  use super::{
    HierarchyError,
    MAX_PARENT_CANDIDATES,
    TaskNode,
    check_parent,
    compute_excluded,
    filter_candidate_parents
  };

  fn chain() -> (Vec<TaskNode>, [Uuid; 3])
  {
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let c = Uuid::new_v4();
    (
      vec![
        TaskNode::new(a, None, "Alpha"),
        TaskNode::new(b, Some(a), "Beta"),
        TaskNode::new(c, Some(b), "Gamma"),
      ],
      [a, b, c]
    )
  }

  #[test]
  fn chain_excludes_whole_subtree() {
    let (tasks, [a, b, c]) = chain();
    assert_eq!(
      compute_excluded(a, &tasks),
      HashSet::from([a, b, c])
    );
    assert_eq!(
      compute_excluded(b, &tasks),
      HashSet::from([b, c])
    );
    assert_eq!(
      compute_excluded(c, &tasks),
      HashSet::from([c])
    );
  }

  #[test]
  fn unknown_task_excludes_itself() {
    let (tasks, _) = chain();
    let stranger = Uuid::new_v4();
    assert_eq!(
      compute_excluded(stranger, &tasks),
      HashSet::from([stranger])
    );
  }

  #[test]
  fn terminates_on_existing_cycle() {
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let tasks = vec![
      TaskNode::new(a, Some(b), "A"),
      TaskNode::new(b, Some(a), "B"),
    ];
    assert_eq!(
      compute_excluded(a, &tasks),
      HashSet::from([a, b])
    );
  }

  #[test]
  fn candidates_skip_excluded_and_cap() {
    let (mut tasks, [a, b, c]) = chain();
    for n in 0..10 {
      tasks.push(TaskNode::new(
        Uuid::new_v4(),
        None,
        format!("Other {n}")
      ));
    }

    let excluded =
      compute_excluded(a, &tasks);
    let found = filter_candidate_parents(
      "", &tasks, &excluded
    );
    assert_eq!(
      found.len(),
      MAX_PARENT_CANDIDATES
    );
    assert!(found.iter().all(|task| {
      ![a, b, c].contains(&task.id)
    }));
    assert_eq!(found[0].title, "Other 0");
  }

  #[test]
  fn search_is_case_insensitive() {
    let (tasks, [a, b, c]) = chain();
    let excluded =
      compute_excluded(c, &tasks);
    let found: Vec<_> =
      filter_candidate_parents(
        "ETA", &tasks, &excluded
      )
      .into_iter()
      .map(|task| task.id)
      .collect();
    assert_eq!(found, vec![b]);

    let excluded =
      compute_excluded(b, &tasks);
    let found: Vec<_> =
      filter_candidate_parents(
        "a", &tasks, &excluded
      )
      .into_iter()
      .map(|task| task.id)
      .collect();
    assert_eq!(found, vec![a]);
  }

  #[test]
  fn search_text_is_matched_as_typed() {
    let tasks = vec![
      TaskNode::new(
        Uuid::new_v4(),
        None,
        "Plan trip"
      ),
      TaskNode::new(
        Uuid::new_v4(),
        None,
        "Planning"
      ),
    ];
    let excluded = HashSet::new();

    let found: Vec<_> =
      filter_candidate_parents(
        "n t", &tasks, &excluded
      )
      .into_iter()
      .map(|task| task.title.as_str())
      .collect();
    assert_eq!(found, vec!["Plan trip"]);

    assert!(
      filter_candidate_parents(
        " plan", &tasks, &excluded
      )
      .is_empty()
    );
  }

  #[test]
  fn check_parent_rejects_descendants() {
    let (tasks, [a, b, c]) = chain();
    assert_eq!(
      check_parent(a, c, &tasks),
      Err(
        HierarchyError::CycleViolation {
          task:   a,
          parent: c
        }
      )
    );
    assert!(
      check_parent(a, a, &tasks).is_err()
    );
    assert!(
      check_parent(c, b, &tasks).is_ok()
    );
  }
}
