mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cli::Cli;
use mixlens::config::{self, InputConfig};
use mixlens::{AnalysisReport, Analyzer, UsageMetrics};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    // Load config: explicit --config path, or auto-detect mixlens.toml / global config
    let mut input_config = InputConfig::default();
    if let Some(ref path) = config::resolve_config_path(cli.config.as_deref()) {
        if let Some(cfg) = config::load_config(path) {
            log::info!("Loaded config from {}", path.display());
            // Merge: config values apply only when CLI is at its default
            if cli.output_dir.is_none() {
                cli.output_dir = cfg.output.dir;
            }
            if !cli.pretty {
                cli.pretty = cfg.output.pretty;
            }
            input_config = cfg.input;
        } else {
            log::warn!("Failed to load config from {}", path.display());
        }
    }

    for input in &cli.inputs {
        if !input.exists() {
            anyhow::bail!("Input file not found: {}", input.display());
        }
        if !input_config.is_allowed(input) {
            anyhow::bail!(
                "Unsupported file type: {} (allowed: {})",
                input.display(),
                input_config.allowed_extensions.join(", ")
            );
        }
    }

    if let Some(ref dir) = cli.output_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    }

    if cli.jobs > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.jobs)
            .build_global()
            .context("Failed to configure worker pool")?;
    }

    log::info!("mixlens - audio mix analyzer");
    log::info!("Inputs: {}", cli.inputs.len());

    let metrics = Arc::new(UsageMetrics::new());
    let analyzer = Analyzer::new(Arc::clone(&metrics));

    let pb = ProgressBar::new(cli.inputs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} files ({eta} remaining)")
            .context("Invalid progress bar template")?
            .progress_chars("=>-"),
    );
    if cli.inputs.len() < 2 {
        pb.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    }

    let outcomes: Vec<(PathBuf, Result<AnalysisReport>)> = cli
        .inputs
        .par_iter()
        .map(|input| {
            let outcome = analyzer
                .analyze(input)
                .with_context(|| format!("Failed to analyze {}", input.display()));
            pb.inc(1);
            (input.clone(), outcome)
        })
        .collect();

    pb.finish_with_message("Analysis complete");

    let failed = emit_all(outcomes, cli.output_dir.as_deref(), cli.pretty);

    if cli.metrics {
        let summary = metrics.snapshot();
        println!("{}", to_json(&summary, cli.pretty)?);
    }

    if failed > 0 {
        anyhow::bail!("{} of {} inputs failed", failed, cli.inputs.len());
    }
    Ok(())
}

/// Writes every successful report and returns how many inputs failed, either
/// in analysis or while writing their output.
fn emit_all(
    outcomes: Vec<(PathBuf, Result<AnalysisReport>)>,
    output_dir: Option<&Path>,
    pretty: bool,
) -> usize {
    let mut failed = 0usize;
    for (input, outcome) in outcomes {
        if let Err(err) = outcome.and_then(|report| emit(&report, output_dir, pretty)) {
            failed += 1;
            log::error!("{}: {:#}", input.display(), err);
        }
    }
    failed
}

fn emit(report: &AnalysisReport, output_dir: Option<&Path>, pretty: bool) -> Result<()> {
    let json = to_json(report, pretty)?;
    match output_dir {
        Some(dir) => {
            let path = dir.join(format!("{}.json", report.file_id));
            std::fs::write(&path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!("Wrote {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(json)
}
