pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod filter;
pub mod kv;
pub mod persist;
pub mod render;
pub mod sort;
pub mod store;
pub mod task;

use std::ffi::OsString;
use std::path::Path;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info,
  warn
};

pub use filter::TaskFilter;
pub use kv::{
  FileStore,
  KeyValueStore,
  MemoryStore
};
pub use sort::{
  SortKey,
  sort_view
};
pub use store::{
  Change,
  SubscriptionId,
  TaskStore
};
pub use task::{
  Task,
  TaskId
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting todo CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.todorc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let mut store = match open_backend(
    &cfg,
    cli.data.as_deref()
  ) {
    | Ok(backend) => TaskStore::open(
      Box::new(backend),
      cfg.storage_key()
    ),
    | Err(err) => {
      warn!(
        error = %format!("{err:#}"),
        "storage unavailable; running \
         in memory only"
      );
      TaskStore::in_memory()
    }
  };
  store.subscribe(|change, tasks| {
    debug!(
      ?change,
      count = tasks.len(),
      "task store changed"
    );
  });

  let renderer =
    render::Renderer::new(&cfg)?;
  let command = cli
    .command
    .unwrap_or_else(
      cli::Command::default_list
    );

  commands::dispatch(
    &mut store,
    &cfg,
    &renderer,
    command
  )?;

  if !store.is_durable() {
    warn!(
      "storage unavailable; changes \
       from this run were not saved"
    );
  }

  info!("done");
  Ok(())
}

fn open_backend(
  cfg: &config::Config,
  data_override: Option<&Path>
) -> anyhow::Result<FileStore> {
  let data_dir =
    config::resolve_data_dir(
      cfg,
      data_override
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  FileStore::open(&data_dir)
    .with_context(|| {
      format!(
        "failed to open storage at {}",
        data_dir.display()
      )
    })
}
