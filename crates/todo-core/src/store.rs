use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use tracing::{debug, info, trace, warn};

use crate::filter::TaskFilter;
use crate::kv::KeyValueStore;
use crate::persist::{self, DEFAULT_STORAGE_KEY};
use crate::task::{Task, TaskId};

/// What a mutation call did. `matched` is false when the id was unknown and
/// the call left the collection as it was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Added { id: TaskId },
    CompleteToggled { id: TaskId, matched: bool },
    ImportantToggled { id: TaskId, matched: bool },
    Removed { id: TaskId, matched: bool },
}

impl Change {
    pub fn id(&self) -> &TaskId {
        match self {
            Change::Added { id }
            | Change::CompleteToggled { id, .. }
            | Change::ImportantToggled { id, .. }
            | Change::Removed { id, .. } => id,
        }
    }

    pub fn matched(&self) -> bool {
        match self {
            Change::Added { .. } => true,
            Change::CompleteToggled { matched, .. }
            | Change::ImportantToggled { matched, .. }
            | Change::Removed { matched, .. } => *matched,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type Listener = Box<dyn FnMut(&Change, &[Task])>;

/// Owner of the task collection. Every mutation is written through to the
/// backend, then the version is bumped and listeners are told.
pub struct TaskStore {
    tasks: Vec<Task>,
    backend: Option<Box<dyn KeyValueStore>>,
    key: String,
    version: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskStore")
            .field("tasks", &self.tasks.len())
            .field("durable", &self.is_durable())
            .field("key", &self.key)
            .field("version", &self.version)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl TaskStore {
    /// Hydrates from `backend` under `key`. Missing or unreadable state starts
    /// empty; a backend that cannot be read at all leaves the store memory-only.
    #[tracing::instrument(skip(backend, key))]
    pub fn open(backend: Box<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        let key = key.into();
        let (tasks, backend) = match backend.get(&key) {
            Ok(Some(raw)) => match persist::decode(&raw) {
                Ok(tasks) => (dedupe_ids(tasks), Some(backend)),
                Err(err) => {
                    warn!(key = %key, error = %format!("{err:#}"), "stored tasks unreadable; starting empty");
                    (vec![], Some(backend))
                }
            },
            Ok(None) => {
                debug!(key = %key, "no stored tasks; starting empty");
                (vec![], Some(backend))
            }
            Err(err) => {
                warn!(key = %key, error = %format!("{err:#}"), "storage unavailable; running in memory only");
                (vec![], None)
            }
        };

        info!(key = %key, count = tasks.len(), durable = backend.is_some(), "opened task store");
        Self {
            tasks,
            backend,
            key,
            version: 0,
            listeners: vec![],
            next_subscription: 0,
        }
    }

    pub fn in_memory() -> Self {
        Self {
            tasks: vec![],
            backend: None,
            key: DEFAULT_STORAGE_KEY.to_string(),
            version: 0,
            listeners: vec![],
            next_subscription: 0,
        }
    }

    pub fn is_durable(&self) -> bool {
        self.backend.is_some()
    }

    pub fn storage_key(&self) -> &str {
        &self.key
    }

    /// Incremented once per mutation call.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| &task.id == id)
    }

    pub fn query<P>(&self, predicate: P) -> Vec<Task>
    where
        P: Fn(&Task) -> bool,
    {
        self.tasks.iter().filter(|task| predicate(task)).cloned().collect()
    }

    pub fn all(&self) -> Vec<Task> {
        self.tasks.clone()
    }

    pub fn query_filter(&self, filter: &TaskFilter) -> Vec<Task> {
        self.query(|task| filter.matches(task))
    }

    #[tracing::instrument(skip(self, name))]
    pub fn add_task(&mut self, name: impl Into<String>, created_at: Option<DateTime<Utc>>) -> TaskId {
        let mut task = Task::new(name.into(), created_at.unwrap_or_else(Utc::now));
        while self.get(&task.id).is_some() {
            task.id = TaskId::generate();
        }
        let id = task.id.clone();
        debug!(id = %id, created_at = %task.created_at, "adding task");
        self.tasks.push(task);
        self.commit(Change::Added { id: id.clone() });
        id
    }

    #[tracing::instrument(skip(self, id), fields(id = %id))]
    pub fn toggle_complete(&mut self, id: &TaskId) -> bool {
        let matched = self.update(id, |task| task.completed = !task.completed);
        self.commit(Change::CompleteToggled {
            id: id.clone(),
            matched,
        });
        matched
    }

    #[tracing::instrument(skip(self, id), fields(id = %id))]
    pub fn toggle_important(&mut self, id: &TaskId) -> bool {
        let matched = self.update(id, |task| task.important = !task.important);
        self.commit(Change::ImportantToggled {
            id: id.clone(),
            matched,
        });
        matched
    }

    #[tracing::instrument(skip(self, id), fields(id = %id))]
    pub fn remove_task(&mut self, id: &TaskId) -> bool {
        let matched = match self.tasks.iter().position(|task| &task.id == id) {
            Some(idx) => {
                self.tasks.remove(idx);
                true
            }
            None => {
                debug!("no task with this id; nothing removed");
                false
            }
        };
        self.commit(Change::Removed {
            id: id.clone(),
            matched,
        });
        matched
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&Change, &[Task]) + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        trace!(subscription = id.0, "listener subscribed");
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sub, _)| *sub != id);
        before != self.listeners.len()
    }

    fn update<F>(&mut self, id: &TaskId, apply: F) -> bool
    where
        F: FnOnce(&mut Task),
    {
        match self.tasks.iter_mut().find(|task| &task.id == id) {
            Some(task) => {
                apply(task);
                true
            }
            None => {
                debug!("no task with this id; nothing toggled");
                false
            }
        }
    }

    fn commit(&mut self, change: Change) {
        self.write_through();
        self.version += 1;
        for (_, listener) in self.listeners.iter_mut() {
            listener(&change, &self.tasks);
        }
        trace!(version = self.version, change = ?change, "mutation committed");
    }

    fn write_through(&mut self) {
        let Some(backend) = self.backend.as_mut() else {
            trace!("memory-only store; skipping write");
            return;
        };
        if let Err(err) = persist::save(backend.as_mut(), &self.key, &self.tasks) {
            warn!(
                key = %self.key,
                error = %format!("{err:#}"),
                "storage write failed; continuing in memory only"
            );
            self.backend = None;
        }
    }
}

/// First occurrence of an id wins.
fn dedupe_ids(tasks: Vec<Task>) -> Vec<Task> {
    let mut seen = HashSet::with_capacity(tasks.len());
    let before = tasks.len();
    let kept: Vec<Task> = tasks
        .into_iter()
        .filter(|task| seen.insert(task.id.clone()))
        .collect();
    if kept.len() != before {
        warn!(before, after = kept.len(), "dropped tasks with duplicate ids");
    }
    kept
}
