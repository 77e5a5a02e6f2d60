//! Pipeline configuration.
//!
//! [`PipelineConfig`] holds every tunable parameter of [`crate::run_pipeline`].
//! All fields have defaults matching the odor-panel imaging protocol
//! (−5 s to 20 s trials at 50 ms, median baseline over the 5 s before onset,
//! correlation distance).
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::baseline::BaselineConfig;
use crate::distance::Metric;
use crate::error::{Result, RsaError};
use crate::respvec::PeakConfig;
use crate::stimulus::{StimField, StimFix};
use crate::trials::TrialGrid;

/// Configuration for the full trials → RDM pipeline.
///
/// All fields are `pub` so you can construct one with struct-update syntax:
///
/// ```
/// use odorsa::{Metric, PipelineConfig};
/// use odorsa::baseline::BaselineConfig;
///
/// let cfg = PipelineConfig {
///     baseline: BaselineConfig::mean(-5.0, 0.0),   // KC somata
///     metric:   Metric::Cosine,
///     ..PipelineConfig::default()
/// };
/// assert!(cfg.validate().is_ok());
/// ```
///
/// Fields missing from a JSON file fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Relative-time grid each trial is resampled onto.
    ///
    /// Default: `arange(-5, 20, 0.05)` rounded to 3 decimals.
    pub grid: TrialGrid,

    /// Stimulus index fields retained on the trial axis.
    ///
    /// `stim` must be among them for an RDM to be computed.
    ///
    /// Default: `stim, stim_occ, run_idx, idx_in_run, run_occ`.
    pub stim_fields: Vec<StimField>,

    /// Baseline window and statistic.
    ///
    /// Median for boutons and claws; use `mean` for somata.
    ///
    /// Default: quantile 0.5 over `(-5, 0)`.
    pub baseline: BaselineConfig,

    /// Response window summarised into one value per cell.
    ///
    /// Default: mean over `(0, 5)`.
    pub peak: PeakConfig,

    /// Distance between response vectors.
    ///
    /// Default: `correlation`.
    pub metric: Metric,

    /// Canonical stimulus order for the RDM axes.  Unsorted when `None`.
    ///
    /// Default: `None`.
    pub stim_order: Option<Vec<String>>,

    /// Average trials of the same stimulus before computing distances.
    ///
    /// Default: `false`.
    pub average_stimuli: bool,

    /// Normalise stimulus labels (abbreviations, float concentrations)
    /// before indexing, so recordings written with `-3` and `-3.0` align.
    ///
    /// Default: `None` (labels used as stored).
    pub stim_fix: Option<StimFix>,

    /// Drop cells whose classifier value is below this threshold.
    ///
    /// Ignored when the recording carries no classifier output.
    ///
    /// Default: `Some(0.5)`.
    pub iscell_threshold: Option<f64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            grid: TrialGrid::default(),
            stim_fields: StimField::default_set(),
            baseline: BaselineConfig::default(),
            peak: PeakConfig::default(),
            metric: Metric::Correlation,
            stim_order: None,
            average_stimuli: false,
            stim_fix: None,
            iscell_threshold: Some(0.5),
        }
    }
}

impl PipelineConfig {
    pub fn from_json(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| RsaError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Catch parameter errors before any data is touched.
    pub fn validate(&self) -> Result<()> {
        self.grid.values()?;
        self.baseline.reduction()?;
        self.peak.peak.reduction()?;
        if let Some(b) = &self.peak.baseline {
            b.reduction()?;
        }
        for w in [Some(&self.baseline.window), Some(&self.peak.peak.window), self.peak.baseline.as_ref().map(|b| &b.window)]
            .into_iter()
            .flatten()
        {
            if !(w.start <= w.end) {
                return Err(RsaError::invalid(
                    "window",
                    format!("start {} is after end {}", w.start, w.end),
                ));
            }
        }
        if !self.stim_fields.contains(&StimField::Stim) {
            return Err(RsaError::MissingCoordinate(StimField::Stim.name().to_string()));
        }
        Ok(())
    }
}
