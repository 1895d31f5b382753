use super::super::args::PackArgs;
use crate::exit_codes;
use anyhow::Context;
use std::io::BufWriter;
use tarseal_core::{ArchiveError, PackConfig, Packed, Packer, MIMETYPE};

pub fn run(args: PackArgs, config: PackConfig) -> anyhow::Result<i32> {
    let mut staged = super::stage_beside(&args.output)?;
    // The output may sit inside one of the roots.
    let packer = Packer::new(super::resolve_timestamp(args.timestamp_ms)?)
        .with_config(config)
        .exclude(&args.output)
        .exclude(staged.path());

    let Packed {
        sink,
        entries,
        aggregate_digest,
        content_digest,
        timestamp,
    } = packer
        .pack_paths_into(BufWriter::new(&mut staged), &args.paths)
        .with_context(|| format!("failed to pack into {}", args.output.display()))?;
    sink.into_inner()
        .map_err(|e| ArchiveError::from(e.into_error()))
        .context("failed to flush archive")?;
    super::persist(staged, &args.output)?;

    tracing::info!(
        entries = entries.len(),
        output = %args.output.display(),
        digest = %aggregate_digest,
        "archive written"
    );

    if args.json {
        let summary = serde_json::json!({
            "output": args.output,
            "mimetype": MIMETYPE,
            "timestamp": timestamp,
            "aggregate_digest": aggregate_digest,
            "content_digest": content_digest,
            "entries": entries,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("aggregate {}", aggregate_digest);
        println!("content   {}", content_digest);
        for entry in &entries {
            let digest = entry
                .digest
                .map_or_else(|| entry.kind.to_string(), |d| d.to_hex());
            println!("{digest:<64}  {}", entry.name);
        }
    }
    Ok(exit_codes::SUCCESS)
}
