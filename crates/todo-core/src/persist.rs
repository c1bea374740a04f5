use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::kv::KeyValueStore;
use crate::task::Task;

pub const DEFAULT_STORAGE_KEY: &str = "task-storage";

#[derive(Serialize)]
struct TaskSliceRef<'a> {
    tasks: &'a [Task],
}

#[derive(Deserialize)]
struct TaskSlice {
    tasks: Vec<Task>,
}

/// Accepted on read. `Wrapped` is the `{"state": {...}, "version": n}` layout
/// browser builds of the app left in local storage.
#[derive(Deserialize)]
#[serde(untagged)]
enum PersistedState {
    Plain(TaskSlice),
    Wrapped { state: TaskSlice },
}

impl PersistedState {
    fn into_tasks(self) -> Vec<Task> {
        match self {
            PersistedState::Plain(slice) => slice.tasks,
            PersistedState::Wrapped { state, .. } => state.tasks,
        }
    }
}

pub fn encode(tasks: &[Task]) -> anyhow::Result<String> {
    serde_json::to_string(&TaskSliceRef { tasks }).context("failed to serialize tasks")
}

pub fn decode(raw: &str) -> anyhow::Result<Vec<Task>> {
    let state: PersistedState =
        serde_json::from_str(raw).context("stored task state is not a task collection")?;
    Ok(state.into_tasks())
}

#[tracing::instrument(skip(backend, tasks), fields(count = tasks.len()))]
pub fn save(backend: &mut dyn KeyValueStore, key: &str, tasks: &[Task]) -> anyhow::Result<()> {
    let payload = encode(tasks)?;
    backend
        .set(key, &payload)
        .with_context(|| format!("failed to write task state under '{key}'"))?;
    debug!(bytes = payload.len(), "saved task state");
    Ok(())
}

/// `Ok(None)` when nothing has been stored yet.
#[tracing::instrument(skip(backend))]
pub fn try_load(backend: &dyn KeyValueStore, key: &str) -> anyhow::Result<Option<Vec<Task>>> {
    let Some(raw) = backend
        .get(key)
        .with_context(|| format!("failed to read task state under '{key}'"))?
    else {
        return Ok(None);
    };
    decode(&raw).map(Some)
}

#[tracing::instrument(skip(backend))]
pub fn load(backend: &dyn KeyValueStore, key: &str) -> Vec<Task> {
    match try_load(backend, key) {
        Ok(Some(tasks)) => {
            debug!(count = tasks.len(), "loaded task state");
            tasks
        }
        Ok(None) => {
            debug!("no stored task state; starting empty");
            vec![]
        }
        Err(err) => {
            warn!(error = %format!("{err:#}"), "unusable task state; starting empty");
            vec![]
        }
    }
}
