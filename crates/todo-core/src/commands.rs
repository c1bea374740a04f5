use anyhow::{Context, anyhow};
use tracing::{debug, info, instrument};

use crate::cli::Command;
use crate::config::Config;
use crate::datetime::parse_date_arg;
use crate::filter::TaskFilter;
use crate::render::Renderer;
use crate::sort::{SortKey, sort_view};
use crate::store::TaskStore;
use crate::task::{Task, TaskId};

#[instrument(skip_all)]
pub fn dispatch(
    store: &mut TaskStore,
    cfg: &Config,
    renderer: &Renderer,
    command: Command,
) -> anyhow::Result<()> {
    debug!(?command, "dispatching command");

    match command {
        Command::Add { at, name } => cmd_add(store, at.as_deref(), &name),
        Command::Done { id } => {
            let id = resolve_id(store, &id)?;
            store.toggle_complete(&id);
            report_flag(store, &id, "completed", |t| t.completed);
            Ok(())
        }
        Command::Star { id } => {
            let id = resolve_id(store, &id)?;
            store.toggle_important(&id);
            report_flag(store, &id, "important", |t| t.important);
            Ok(())
        }
        Command::Remove { id } => {
            let id = resolve_id(store, &id)?;
            store.remove_task(&id);
            println!("Removed task {}.", id.short());
            Ok(())
        }
        Command::List { list, sort } => {
            let sort = effective_sort(cfg, sort)?;
            show(store, renderer, &list, sort)
        }
        Command::Search { query, sort } => {
            let sort = effective_sort(cfg, sort)?;
            show(store, renderer, &TaskFilter::search(query.join(" ")), sort)
        }
    }
}

#[instrument(skip(store, words))]
fn cmd_add(store: &mut TaskStore, at: Option<&str>, words: &[String]) -> anyhow::Result<()> {
    info!("command add");

    let name = normalize_name(words)?;
    let created_at = at
        .map(parse_date_arg)
        .transpose()
        .context("invalid --at value")?;

    let id = store.add_task(name, created_at);
    println!("Created task {}.", id.short());
    Ok(())
}

fn show(store: &TaskStore, renderer: &Renderer, filter: &TaskFilter, sort: SortKey) -> anyhow::Result<()> {
    let tasks = sort_view(&store.query_filter(filter), sort);
    debug!(filter = ?filter, %sort, count = tasks.len(), "showing list");
    renderer.print_task_list(&filter.title(), &tasks)
}

fn report_flag(store: &TaskStore, id: &TaskId, label: &str, flag: impl Fn(&Task) -> bool) {
    if let Some(task) = store.get(id) {
        let state = if flag(task) { label.to_string() } else { format!("not {label}") };
        println!("Task {} '{}' is now {state}.", id.short(), task.name);
    }
}

fn effective_sort(cfg: &Config, explicit: Option<SortKey>) -> anyhow::Result<SortKey> {
    match explicit {
        Some(sort) => Ok(sort),
        None => cfg.default_sort(),
    }
}

/// Input-side check: the store accepts any name, the command line does not
/// accept blank ones.
pub fn normalize_name(words: &[String]) -> anyhow::Result<String> {
    let name = words.join(" ").trim().to_string();
    if name.is_empty() {
        return Err(anyhow!("task name cannot be empty"));
    }
    Ok(name)
}

/// Resolves a full id or an unambiguous id prefix to a task id.
pub fn resolve_id(store: &TaskStore, needle: &str) -> anyhow::Result<TaskId> {
    let needle = needle.trim();
    if needle.is_empty() {
        return Err(anyhow!("task id cannot be empty"));
    }

    if let Some(task) = store.tasks().iter().find(|task| task.id.as_str() == needle) {
        return Ok(task.id.clone());
    }

    let candidates: Vec<&TaskId> = store
        .tasks()
        .iter()
        .map(|task| &task.id)
        .filter(|id| id.as_str().starts_with(needle))
        .collect();

    match candidates.as_slice() {
        [] => Err(anyhow!("no task matches id '{needle}'")),
        [only] => Ok((*only).clone()),
        many => Err(anyhow!(
            "id prefix '{needle}' is ambiguous ({} tasks match)",
            many.len()
        )),
    }
}
