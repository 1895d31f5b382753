use super::super::args::ApplyArgs;
use crate::exit_codes;
use anyhow::Context;
use std::io::Write;
use tarseal_core::{plan, ArchiveError, ArchiveResource, ArchiveState, PackConfig, SourceSpec};

/// Create the state on first run; afterwards update it, keeping the stored
/// timestamp when nothing changed so the archive comes out identical.
pub fn run(args: ApplyArgs, config: PackConfig) -> anyhow::Result<i32> {
    let sources: Vec<SourceSpec> = super::read_json(&args.sources)?;
    let prior: Option<ArchiveState> = if args.state.exists() {
        Some(super::read_json(&args.state)?)
    } else {
        None
    };

    let planned = plan(prior.as_ref(), &sources)?;
    let now = super::resolve_timestamp(args.timestamp_ms)?;
    let resource = ArchiveResource::new(config);
    let state = match &prior {
        Some(prior) => resource.update(prior, &sources, now)?,
        None => resource.create(&sources, now)?,
    };

    let mut staged = super::stage_beside(&args.state)?;
    serde_json::to_writer_pretty(&mut staged, &state).map_err(ArchiveError::from)?;
    staged
        .write_all(b"\n")
        .map_err(ArchiveError::from)
        .context("failed to write state")?;
    super::persist(staged, &args.state)?;

    if let Some(output) = &args.output {
        let mut staged = super::stage_beside(output)?;
        staged
            .write_all(&state.archive_bytes()?)
            .map_err(ArchiveError::from)
            .with_context(|| format!("failed to write {}", output.display()))?;
        super::persist(staged, output)?;
    }

    tracing::info!(
        changed = planned.changed,
        sources = state.sources.len(),
        digest = %state.digest,
        "archive state applied"
    );
    println!("{}", state.digest);
    Ok(exit_codes::SUCCESS)
}
