use super::super::args::InspectArgs;
use crate::exit_codes;
use anyhow::Context;
use std::fs::File;
use std::io::Write;
use tarseal_core::{inspect_seekable, ArchiveError};

pub fn run(args: InspectArgs) -> anyhow::Result<i32> {
    let mut file = File::open(&args.archive)
        .map_err(ArchiveError::from)
        .with_context(|| format!("failed to open archive: {}", args.archive.display()))?;
    let mut inspection = inspect_seekable(&mut file)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut count = 0usize;
    for entry in inspection.entries()? {
        let entry = entry.with_context(|| format!("inspecting {}", args.archive.display()))?;
        if args.json {
            serde_json::to_writer(&mut out, &entry)?;
            writeln!(out)?;
        } else {
            write!(
                out,
                "{}\t{:04o}\t{:>10}\t{}",
                entry.kind, entry.mode, entry.size, entry.name
            )?;
            match &entry.link_target {
                Some(target) => writeln!(out, " -> {target}")?,
                None => writeln!(out)?,
            }
        }
        count += 1;
    }
    inspection.restore()?;

    tracing::debug!(entries = count, archive = %args.archive.display(), "inspected");
    Ok(exit_codes::SUCCESS)
}
