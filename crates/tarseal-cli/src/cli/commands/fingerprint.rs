use super::super::args::FingerprintArgs;
use crate::exit_codes;
use anyhow::Context;
use std::io::Read;
use tarseal_core::{fingerprint, fingerprint_base64, ArchiveError};

pub fn run(args: FingerprintArgs) -> anyhow::Result<i32> {
    let mut input = Vec::new();
    if args.input.as_os_str() == "-" {
        std::io::stdin()
            .lock()
            .read_to_end(&mut input)
            .map_err(ArchiveError::from)
            .context("failed to read stdin")?;
    } else {
        input = std::fs::read(&args.input)
            .map_err(ArchiveError::from)
            .with_context(|| format!("failed to read {}", args.input.display()))?;
    }

    let digest = if args.base64 {
        let text = std::str::from_utf8(&input)
            .map_err(|e| ArchiveError::decode("base64 input is not text").with_source(e))?;
        fingerprint_base64(text.trim())?
    } else {
        fingerprint(&input)
    };

    println!("{digest}");
    Ok(exit_codes::SUCCESS)
}
