//! Trial segmentation.
//!
//! Cuts a continuous [C, T] [`SignalMatrix`] into a [E, C, R] trial tensor
//! by resampling each cell at `onset + grid` for every stimulus onset,
//! where `R` is the length of the relative-time grid.  Samples whose
//! absolute time falls outside the recording are NaN.
use ndarray::{s, Array1, Array3, ArrayView1};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, RsaError};
use crate::stimulus::{StimField, StimulusIndex};
use crate::timeseries::SignalMatrix;

/// Relative-time grid shared by every trial.
///
/// `Range` reproduces `arange(start, stop, step)` rounded to `decimals`
/// places (end exclusive); `Explicit` takes the values as given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TrialGrid {
    Range {
        start: f64,
        stop: f64,
        step: f64,
        #[serde(default = "default_decimals")]
        decimals: i32,
    },
    Explicit(Vec<f64>),
}

fn default_decimals() -> i32 {
    3
}

impl Default for TrialGrid {
    /// −5 s to 20 s in 50 ms steps: 500 samples.
    fn default() -> Self {
        TrialGrid::Range { start: -5.0, stop: 20.0, step: 0.05, decimals: 3 }
    }
}

impl TrialGrid {
    pub fn explicit(values: Vec<f64>) -> Self {
        TrialGrid::Explicit(values)
    }

    /// Materialise the grid, checking it is non-empty and strictly increasing.
    pub fn values(&self) -> Result<Array1<f64>> {
        let v = match *self {
            TrialGrid::Range { start, stop, step, decimals } => {
                if !(step > 0.0) || !(stop > start) {
                    return Err(RsaError::invalid(
                        "grid",
                        format!("empty range {start}..{stop} step {step}"),
                    ));
                }
                let n = ((stop - start) / step).ceil() as usize;
                let scale = 10f64.powi(decimals);
                Array1::from_iter(
                    (0..n).map(|i| ((start + i as f64 * step) * scale).round_ties_even() / scale),
                )
            }
            TrialGrid::Explicit(ref values) => Array1::from_vec(values.clone()),
        };
        if v.is_empty() {
            return Err(RsaError::invalid("grid", "no samples"));
        }
        if v.windows(2).into_iter().any(|w| !(w[1] > w[0])) {
            return Err(RsaError::invalid("grid", "values are not strictly increasing"));
        }
        Ok(v)
    }
}

/// Stimulus identity along a trial axis.
///
/// The whole index is always present; `fields` is the subset the caller
/// asked to keep, which drives coordinate names and what gets written out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialCoords {
    pub index: StimulusIndex,
    pub fields: Vec<StimField>,
}

impl TrialCoords {
    pub fn new(index: StimulusIndex, fields: &[StimField]) -> Self {
        let mut kept: Vec<StimField> = Vec::with_capacity(fields.len());
        for &f in fields {
            if !kept.contains(&f) {
                kept.push(f);
            }
        }
        Self { index, fields: kept }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn has(&self, field: StimField) -> bool {
        self.fields.contains(&field)
    }

    pub fn stim(&self) -> &[String] {
        &self.index.stim
    }

    /// Rows `order`, with the same retained fields.
    pub fn take(&self, order: &[usize]) -> Self {
        Self { index: self.index.take(order), fields: self.fields.clone() }
    }
}

/// [E, C, R] trial tensor with its axes.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialTensor {
    pub data: Array3<f64>,
    /// Relative time of each sample, identical for every trial.
    pub time: Array1<f64>,
    pub cell_ids: Vec<usize>,
    pub coords: TrialCoords,
    /// Absolute onset time of each trial.
    pub onsets: Vec<f64>,
}

impl TrialTensor {
    pub fn n_trials(&self) -> usize {
        self.data.shape()[0]
    }

    pub fn n_cells(&self) -> usize {
        self.data.shape()[1]
    }

    pub fn n_times(&self) -> usize {
        self.data.shape()[2]
    }

    pub fn time(&self) -> ArrayView1<'_, f64> {
        self.time.view()
    }

    /// Same axes, new values.
    pub(crate) fn with_data(&self, data: Array3<f64>) -> Self {
        Self {
            data,
            time: self.time.clone(),
            cell_ids: self.cell_ids.clone(),
            coords: self.coords.clone(),
            onsets: self.onsets.clone(),
        }
    }
}

/// Split `signal` into trials, one per onset.
///
/// `labels` must have one entry per onset.  Every trial is tagged with its
/// [`StimulusIndex`] row; `fields` selects which index fields are retained.
pub fn timeseries_to_trials<S: AsRef<str>>(
    signal: &SignalMatrix,
    onsets: &[f64],
    labels: &[S],
    grid: &TrialGrid,
    fields: &[StimField],
) -> Result<TrialTensor> {
    if onsets.len() != labels.len() {
        return Err(RsaError::mismatch("stimulus labels vs onsets", onsets.len(), labels.len()));
    }
    let rel = grid.values()?;
    let (n_trials, n_cells, n_rel) = (onsets.len(), signal.n_cells(), rel.len());

    let mut data = Array3::<f64>::zeros((n_trials, n_cells, n_rel));
    for (e, &onset) in onsets.iter().enumerate() {
        let abs = rel.mapv(|r| r + onset);
        data.slice_mut(s![e, .., ..]).assign(&signal.interp_at(abs.view()));
    }

    let missing = data.iter().filter(|v| v.is_nan()).count();
    if missing > 0 {
        debug!(missing, "trial samples fall outside the recording");
    }
    info!(trials = n_trials, cells = n_cells, samples = n_rel, "segmented trials");

    Ok(TrialTensor {
        data,
        time: rel,
        cell_ids: signal.cell_ids.clone(),
        coords: TrialCoords::new(StimulusIndex::new(labels), fields),
        onsets: onsets.to_vec(),
    })
}
