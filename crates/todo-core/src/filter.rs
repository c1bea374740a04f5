use std::str::FromStr;

use anyhow::anyhow;
use tracing::trace;

use crate::task::Task;

/// The named lists a view can ask the store for.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TaskFilter {
  #[default]
  All,
  Important,
  Completed,
  Search(String)
}

impl TaskFilter {
  pub fn search(
    query: impl Into<String>
  ) -> Self {
    TaskFilter::Search(query.into())
  }

  pub fn matches(
    &self,
    task: &Task
  ) -> bool {
    let hit = match self {
      | TaskFilter::All => true,
      | TaskFilter::Important => {
        task.important
      }
      | TaskFilter::Completed => {
        task.completed
      }
      | TaskFilter::Search(query) => {
        name_contains(&task.name, query)
      }
    };
    trace!(filter = ?self, id = %task.id, hit, "filter evaluated");
    hit
  }

  pub fn title(&self) -> String {
    match self {
      | TaskFilter::All => {
        "All Tasks".to_string()
      }
      | TaskFilter::Important => {
        "Important Tasks".to_string()
      }
      | TaskFilter::Completed => {
        "Completed Tasks".to_string()
      }
      | TaskFilter::Search(query) => {
        format!(
          "Search results for: {query}"
        )
      }
    }
  }
}

impl FromStr for TaskFilter {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "all" => Ok(TaskFilter::All),
      | "important" => {
        Ok(TaskFilter::Important)
      }
      | "completed" => {
        Ok(TaskFilter::Completed)
      }
      | other => Err(anyhow!(
        "unknown list '{other}' \
         (expected all, important or \
         completed)"
      ))
    }
  }
}

/// Case-insensitive substring match.
/// An empty needle matches everything.
pub fn name_contains(
  name: &str,
  needle: &str
) -> bool {
  name
    .to_lowercase()
    .contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
  use chrono::{
    TimeZone,
    Utc
  };

  use super::TaskFilter;
  use crate::task::Task;

  fn task(
    name: &str,
    completed: bool,
    important: bool
  ) -> Task {
    let at = Utc
      .with_ymd_and_hms(
        2024, 1, 1, 0, 0, 0
      )
      .single()
      .expect("valid time");
    let mut t =
      Task::new(name.to_string(), at);
    t.completed = completed;
    t.important = important;
    t
  }

  #[test]
  fn named_lists_match_flags() {
    let plain =
      task("plain", false, false);
    let done = task("done", true, false);
    let star = task("star", false, true);

    assert!(TaskFilter::All.matches(&plain));
    assert!(
      !TaskFilter::Important
        .matches(&plain)
    );
    assert!(
      TaskFilter::Important.matches(&star)
    );
    assert!(
      TaskFilter::Completed.matches(&done)
    );
    assert!(
      !TaskFilter::Completed.matches(&star)
    );
  }

  #[test]
  fn search_ignores_case_on_both_sides() {
    let t =
      task("Call Dentist", false, false);
    assert!(
      TaskFilter::search("dent")
        .matches(&t)
    );
    assert!(
      TaskFilter::search("DENT")
        .matches(&t)
    );
    assert!(
      TaskFilter::search("").matches(&t)
    );
    assert!(
      !TaskFilter::search("milk")
        .matches(&t)
    );
  }

  #[test]
  fn parses_list_names_and_titles() {
    assert_eq!(
      "Important"
        .parse::<TaskFilter>()
        .expect("parse"),
      TaskFilter::Important
    );
    assert!(
      "starred"
        .parse::<TaskFilter>()
        .is_err()
    );
    assert_eq!(
      TaskFilter::search("milk").title(),
      "Search results for: milk"
    );
    assert_eq!(
      TaskFilter::Completed.title(),
      "Completed Tasks"
    );
  }
}
