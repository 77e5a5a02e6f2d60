//! rsa: load one recording, run trials → baseline → response vectors → RDM,
//! and write every stage to safetensors for plotting elsewhere.
//!
//! Output files in `--out-dir`:
//!   trials.safetensors    [E, C, R]  baseline-corrected trial tensor
//!   respvec.safetensors   [E, C]     response vectors
//!   rdm.safetensors       [1, E, E]  RDM (row_/col_ coordinates in metadata)
//!   rdm_time.safetensors  [R, E, E]  per-timepoint RDM (with --per-timepoint)
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use odorsa::{
    compute_trial_rdm, run_pipeline, sort_rdm, write_rdm, write_respvec, write_trials,
    Metric, PipelineConfig, Recording, StatMethod,
};

#[derive(Parser, Debug)]
#[command(name = "rsa", about = "Trial-aligned RDMs from calcium-imaging traces")]
struct Args {
    /// signal.safetensors with F, timestamps, onsets (and optionally iscell)
    #[arg(long)]
    signal: PathBuf,

    /// stim_list.json with a `stim_list_flatstr` array
    #[arg(long)]
    stim_list: PathBuf,

    /// Pipeline configuration (JSON); defaults are used for missing fields
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory the output files are written to
    #[arg(long)]
    out_dir: PathBuf,

    /// Override the distance metric (correlation, euclidean, cosine, ...)
    #[arg(long)]
    metric: Option<Metric>,

    /// Override the baseline statistic (mean or quantile)
    #[arg(long)]
    baseline_method: Option<StatMethod>,

    /// Override the baseline quantile
    #[arg(long)]
    baseline_quantile: Option<f64>,

    /// Also compute one RDM per relative-time sample
    #[arg(long, default_value_t = false)]
    per_timepoint: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = args
        .log_level
        .parse::<tracing_subscriber::filter::LevelFilter>()
        .unwrap_or(tracing_subscriber::filter::LevelFilter::INFO);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    let mut cfg = match &args.config {
        Some(path) => PipelineConfig::from_json(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(m) = args.metric {
        cfg.metric = m;
    }
    if let Some(m) = args.baseline_method {
        cfg.baseline.method = m;
    }
    if args.baseline_quantile.is_some() {
        cfg.baseline.quantile = args.baseline_quantile;
    }
    cfg.validate().context("invalid configuration")?;

    let rec = Recording::load(&args.signal, &args.stim_list).context("loading recording")?;
    info!(
        cells = rec.signal.n_cells(),
        samples = rec.signal.n_times(),
        trials = rec.onsets.len(),
        "loaded {}",
        args.signal.display()
    );

    let out = run_pipeline(&rec, &cfg)?;

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating {}", args.out_dir.display()))?;
    write_trials(&args.out_dir.join("trials.safetensors"), &out.baselined.tensor, Some(&out.baselined.params))?;
    write_respvec(&args.out_dir.join("respvec.safetensors"), &out.respvec)?;
    write_rdm(&args.out_dir.join("rdm.safetensors"), &out.rdm)?;

    if args.per_timepoint {
        let mut rdm_t = compute_trial_rdm(&out.baselined.tensor, cfg.metric)?;
        rdm_t.baseline = Some(out.baselined.params);
        if let Some(order) = &cfg.stim_order {
            rdm_t = sort_rdm(&rdm_t, order)?;
        }
        write_rdm(&args.out_dir.join("rdm_time.safetensors"), &rdm_t)?;
    }

    info!("written → {}", args.out_dir.display());
    Ok(())
}
