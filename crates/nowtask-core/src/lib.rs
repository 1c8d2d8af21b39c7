pub mod bucket;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod error;
pub mod forest;
pub mod gauge;
pub mod hierarchy;
pub mod listing;
pub mod render;
pub mod reparent;
pub mod rollup;
pub mod schedule;
pub mod store;
pub mod task;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

pub use crate::error::{
  EngineError,
  Rejection
};
pub use crate::gauge::{
  GaugeEngine,
  GaugeReading
};
pub use crate::reparent::{
  MoveIntent,
  MoveOutcome,
  resolve_reparent
};
pub use crate::schedule::{
  LoadReport,
  compute_load
};
pub use crate::task::{
  Task,
  TaskId
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let cli =
    cli::GlobalCli::parse_from(raw_args);

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting nowtask"
  );

  let mut cfg = config::Config::load(
    cli.rc.as_deref()
  )?;
  cfg.apply_overrides(
    cli
      .overrides
      .into_iter()
      .map(|kv| (kv.key, kv.value))
  );
  debug!(files = ?cfg.loaded_files, "configuration ready");

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let store =
    store::JsonlStore::open(&data_dir)
      .with_context(|| {
        format!(
          "failed to open data directory \
           {}",
          data_dir.display()
        )
      })?;

  let mut renderer =
    render::Renderer::new(&cfg)?;
  let tz = *datetime::project_timezone();

  commands::dispatch(
    &store,
    &cfg,
    &mut renderer,
    tz,
    cli.command.unwrap_or_default()
  )?;

  info!("done");
  Ok(())
}
