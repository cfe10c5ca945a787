use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::time::Duration;

use shrink_to_target::cli::{format_size, Args};
use shrink_to_target::config::TargetSpec;
use shrink_to_target::engine::{CancelToken, Phase, Progress, SizeTargetOrchestrator};

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(match args.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();

    // Read input file
    let input = fs::read(&args.input)
        .with_context(|| format!("Failed to read input file: {}", args.input.display()))?;

    let kind = args.kind.resolve(&input);
    log::info!(
        "Read {} ({}) from {}",
        format_size(input.len() as u64),
        kind,
        args.input.display()
    );

    let spec = TargetSpec::from_args(&args);

    let mut cancel = CancelToken::new();
    if let Some(seconds) = args.timeout {
        cancel = cancel.with_timeout(Duration::from_secs(seconds));
    }

    let orchestrator = SizeTargetOrchestrator::new()
        .with_cancel_token(cancel)
        .with_progress(|progress: Progress| match (progress.phase, progress.page) {
            (Phase::Rasterizing, Some((page, total))) => {
                log::info!("Rasterizing page {}/{}", page, total)
            }
            (Phase::Done, _) => {}
            (phase, _) => log::debug!("Phase: {:?}", phase),
        });

    let outcome = orchestrator
        .run(&input, kind, &spec)
        .with_context(|| format!("Failed to compress {}", args.input.display()))?;

    // Write output
    let output_path = args.output_path(outcome.format);
    fs::write(&output_path, &outcome.bytes)
        .with_context(|| format!("Failed to write output file: {}", output_path.display()))?;

    if !outcome.status.met() {
        log::warn!(
            "Target of {} not reached; wrote the smallest result found",
            format_size(outcome.target_bytes)
        );
    }

    let mut summary = format!(
        "{} -> {} (target {}, {})",
        format_size(input.len() as u64),
        format_size(outcome.achieved_bytes),
        format_size(outcome.target_bytes),
        outcome.path
    );
    if let Some(quality) = outcome.quality {
        summary.push_str(&format!(", quality {}", quality));
    }
    if let Some(scale) = outcome.scale.filter(|&s| s < 1.0) {
        summary.push_str(&format!(", scale {:.0}%", scale * 100.0));
    }
    if !outcome.pages.is_empty() {
        summary.push_str(&format!(", {} pages", outcome.pages.len()));
    }

    println!("Wrote {}: {}", output_path.display(), summary);

    Ok(())
}
