//! # odorsa — trial-aligned representational similarity for calcium imaging
//!
//! `odorsa` turns per-cell fluorescence traces from a segmentation tool into
//! trial tensors, baseline-corrects them, and computes representational
//! dissimilarity matrices (RDMs) between odor presentations.
//!
//! ## Pipeline overview
//!
//! ```text
//! signal.safetensors + stim_list.json
//!   │
//!   ├─ io::Recording::load()          F [C, T], timestamps, onsets, labels
//!   ├─ SignalMatrix::select_iscells() drop non-cell ROIs
//!   ├─ stimulus::fix_stim             (optional) normalise "odor @ conc" labels
//!   ├─ stimulus::StimulusIndex        stim_occ / run_idx / idx_in_run / run_occ
//!   ├─ trials::timeseries_to_trials   resample at onset + grid → [E, C, R]
//!   ├─ baseline::baseline_correct     subtract mean / quantile of (-5, 0) s
//!   ├─ respvec::peak_amp              reduce response window → [E, C]
//!   ├─ respvec::mean_by_stimulus      (optional) average repeats → [S, C]
//!   ├─ rdm::compute_respvec_rdm       pairwise distance → [1, E, E]
//!   └─ sort::sort_rdm                 (optional) canonical stimulus order
//! ```
//!
//! ## Quick start
//!
//! ```
//! use odorsa::{timeseries_to_trials, baseline_correct_trials, peak_amp, compute_respvec_rdm};
//! use odorsa::{BaselineConfig, Metric, PeakConfig, SignalMatrix, StimField, TrialGrid, WindowSpec};
//! use odorsa::stats::StatMethod;
//! use ndarray::{Array1, Array2};
//!
//! // 3 cells × 100 samples at 10 Hz
//! let t = Array1::from_iter((0..100).map(|i| i as f64 / 10.0));
//! let f = Array2::from_shape_fn((3, 100), |(c, i)| ((c + 1) as f64 * i as f64 * 0.1).sin());
//! let signal = SignalMatrix::new(f, t).unwrap();
//!
//! let grid = TrialGrid::explicit(vec![-0.5, 0.0, 0.5]);
//! let trials = timeseries_to_trials(&signal, &[2.0, 5.0], &["odorA", "odorB"], &grid,
//!                                   &StimField::default_set()).unwrap();
//! let bc = baseline_correct_trials(&trials, &BaselineConfig::mean(-0.5, 0.0)).unwrap();
//!
//! let peak = PeakConfig { peak: WindowSpec::new(0.5, 0.5, StatMethod::Mean, None), baseline: None };
//! let resp = peak_amp(&bc.tensor, &peak).unwrap();
//! let rdm  = compute_respvec_rdm(&resp, Metric::Correlation).unwrap();
//! assert_eq!(rdm.matrix(0).dim(), (2, 2));
//! ```

pub mod baseline;
pub mod config;
pub mod distance;
pub mod error;
pub mod io;
pub mod rdm;
pub mod respvec;
pub mod sort;
pub mod stats;
pub mod stimulus;
pub mod timeseries;
pub mod trials;

use tracing::info;

// ── Crate-root re-exports ─────────────────────────────────────────────────

pub use baseline::{baseline_correct_trials, window_stat, BaselineConfig, BaselineParams, Baselined};
pub use config::PipelineConfig;
pub use distance::{pairwise_distances, Metric};
pub use error::{Result, RsaError};
pub use io::{load_stim_list, read_tensors, write_rdm, write_respvec, write_trials, Recording, StWriter};
pub use rdm::{compute_respvec_rdm, compute_trial_rdm, AxisCoords, Rdm, Side};
pub use respvec::{mean_by_stimulus, peak_amp, PeakConfig, ResponseVectors, WindowSpec};
pub use sort::{align_rdms, mean_rdm, sort_rdm};
pub use stats::{Reduction, StatMethod, TimeWindow};
pub use stimulus::{
    conc_to_float, find_runs, fix_stim, occurrence, odor_name, replace_abbrevs, run_limits, split_stim_list, RunLimits,
    StimField, StimFix, StimulusIndex,
};
pub use timeseries::SignalMatrix;
pub use trials::{timeseries_to_trials, TrialCoords, TrialGrid, TrialTensor};

/// Everything [`run_pipeline`] produces, intermediate steps included.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub trials: TrialTensor,
    pub baselined: Baselined,
    pub respvec: ResponseVectors,
    pub rdm: Rdm,
}

/// Run the **full trials → RDM pipeline** on one recording.
///
/// # Pipeline steps
///
/// 1. Drop cells below [`PipelineConfig::iscell_threshold`] (when the
///    recording has classifier output).
/// 2. Normalise the stimulus labels with [`PipelineConfig::stim_fix`], then
///    segment into trials on [`PipelineConfig::grid`], tagging each trial
///    with the stimulus index fields in [`PipelineConfig::stim_fields`].
/// 3. Baseline-correct with [`PipelineConfig::baseline`].
/// 4. Reduce the response window ([`PipelineConfig::peak`]) to response vectors.
/// 5. Average repeats of each stimulus if [`PipelineConfig::average_stimuli`].
/// 6. Compute the RDM with [`PipelineConfig::metric`].
/// 7. Sort both axes to [`PipelineConfig::stim_order`] if given.
///
/// # Errors
///
/// Any configuration error is reported before data is touched
/// ([`PipelineConfig::validate`]); afterwards, the first failing step's
/// error is returned unchanged.
pub fn run_pipeline(rec: &Recording, cfg: &PipelineConfig) -> Result<PipelineOutput> {
    cfg.validate()?;

    let signal = match (&rec.iscell, cfg.iscell_threshold) {
        (Some(iscell), Some(th)) => rec.signal.select_iscells(iscell.view(), th)?,
        _ => rec.signal.clone(),
    };
    info!(cells = signal.n_cells(), samples = signal.n_times(), "signal ready");

    let labels = match &cfg.stim_fix {
        Some(fix) => fix_stim(&rec.stim_list, fix)?,
        None => rec.stim_list.clone(),
    };
    let trials = timeseries_to_trials(&signal, &rec.onsets, &labels, &cfg.grid, &cfg.stim_fields)?;
    let baselined = baseline_correct_trials(&trials, &cfg.baseline)?;

    let mut respvec = peak_amp(&baselined.tensor, &cfg.peak)?;
    if cfg.average_stimuli {
        respvec = mean_by_stimulus(&respvec);
    }

    let mut rdm = compute_respvec_rdm(&respvec, cfg.metric)?;
    rdm.baseline = Some(baselined.params);
    if let Some(order) = &cfg.stim_order {
        rdm = sort_rdm(&rdm, order)?;
    }

    Ok(PipelineOutput { trials, baselined, respvec, rdm })
}
