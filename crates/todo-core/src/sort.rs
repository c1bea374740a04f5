use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;

use crate::task::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    /// Newest first.
    #[default]
    Date,
    /// Case-insensitive, ascending.
    Name,
}

impl SortKey {
    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::Date => "date",
            SortKey::Name => "name",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "date" => Ok(SortKey::Date),
            "name" => Ok(SortKey::Name),
            other => Err(anyhow!("unknown sort key '{other}' (expected date or name)")),
        }
    }
}

/// Returns a sorted copy; `tasks` is left untouched. Both orderings are stable.
pub fn sort_view(tasks: &[Task], key: SortKey) -> Vec<Task> {
    let mut sorted = tasks.to_vec();
    match key {
        SortKey::Date => sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortKey::Name => sorted.sort_by_cached_key(|task| task.name.to_lowercase()),
    }
    sorted
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{SortKey, sort_view};
    use crate::task::Task;

    fn names(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn name_sort_is_case_insensitive() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().expect("valid time");
        let tasks: Vec<Task> = ["banana", "Apple", "cherry"]
            .into_iter()
            .map(|n| Task::new(n.to_string(), at))
            .collect();

        let sorted = sort_view(&tasks, SortKey::Name);
        assert_eq!(names(&sorted), vec!["Apple", "banana", "cherry"]);
        assert_eq!(names(&tasks), vec!["banana", "Apple", "cherry"]);
    }

    #[test]
    fn date_sort_is_newest_first() {
        let t1 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().expect("valid time");
        let t2 = t1 + Duration::hours(1);
        let t3 = t2 + Duration::hours(1);
        let tasks = vec![
            Task::new("t1".to_string(), t1),
            Task::new("t3".to_string(), t3),
            Task::new("t2".to_string(), t2),
        ];

        assert_eq!(names(&sort_view(&tasks, SortKey::Date)), vec!["t3", "t2", "t1"]);
    }

    #[test]
    fn ties_keep_input_order() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().expect("valid time");
        let tasks = vec![
            Task::new("b".to_string(), at),
            Task::new("a".to_string(), at),
            Task::new("B".to_string(), at),
        ];

        assert_eq!(names(&sort_view(&tasks, SortKey::Date)), vec!["b", "a", "B"]);
        assert_eq!(names(&sort_view(&tasks, SortKey::Name)), vec!["a", "b", "B"]);
    }

    #[test]
    fn parses_keys() {
        assert_eq!("NAME".parse::<SortKey>().expect("parse"), SortKey::Name);
        assert_eq!(SortKey::default(), SortKey::Date);
        assert!("priority".parse::<SortKey>().is_err());
    }
}
