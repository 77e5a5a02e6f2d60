//! Per-trial baseline correction.
//!
//! For every trial `e` and cell `c`:
//!
//! ```text
//! b[e, c]        = stat(trials[e, c, t] for t in baseline window)
//! out[e, c, :]   = trials[e, c, :] − b[e, c]
//! ```
//!
//! The subtraction covers the whole relative-time range, not only the
//! baseline window.  `stat` is the mean or a quantile (the median by default,
//! which suits sparse boutons better than the mean).
use ndarray::{Array2, Array3, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, RsaError};
use crate::stats::{Reduction, StatMethod, TimeWindow};
use crate::trials::TrialTensor;

/// How the baseline is computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineConfig {
    /// Default: `(-5.0, 0.0)` s relative to onset.
    pub window: TimeWindow,
    /// `mean` or `quantile`.  Default: `quantile`.
    pub method: StatMethod,
    /// Required when `method` is `quantile`.  Default: `Some(0.5)`.
    pub quantile: Option<f64>,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            window: TimeWindow::new(-5.0, 0.0),
            method: StatMethod::Quantile,
            quantile: Some(0.5),
        }
    }
}

impl BaselineConfig {
    pub fn mean(start: f64, end: f64) -> Self {
        Self { window: TimeWindow::new(start, end), method: StatMethod::Mean, quantile: None }
    }

    pub fn quantile(start: f64, end: f64, q: f64) -> Self {
        Self { window: TimeWindow::new(start, end), method: StatMethod::Quantile, quantile: Some(q) }
    }

    /// Check the method and resolve it to a [`Reduction`].
    pub fn reduction(&self) -> Result<Reduction> {
        match self.method {
            StatMethod::Mean | StatMethod::Quantile => Reduction::resolve(self.method, self.quantile),
            other => Err(RsaError::invalid(
                "baseline.method",
                format!("`{other}` is not a baseline statistic (use mean or quantile)"),
            )),
        }
    }
}

/// Parameters actually applied, returned next to the corrected tensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselineParams {
    pub window: TimeWindow,
    pub method: StatMethod,
    pub quantile: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Baselined {
    pub tensor: TrialTensor,
    pub params: BaselineParams,
}

/// Reduce `data` ([E, C, R]) over the samples of `time` inside `window`,
/// giving one value per (trial, cell).
pub fn window_stat(
    data: &Array3<f64>,
    time: ArrayView1<f64>,
    window: &TimeWindow,
    reduction: Reduction,
) -> Result<Array2<f64>> {
    if data.len_of(Axis(2)) != time.len() {
        return Err(RsaError::mismatch("relative-time samples", time.len(), data.len_of(Axis(2))));
    }
    let idx = window.indices(time)?;
    debug!(start = window.start, end = window.end, samples = idx.len(), "window selected");
    let (n_e, n_c, _) = data.dim();
    Ok(Array2::from_shape_fn((n_e, n_c), |(e, c)| {
        reduction.apply(idx.iter().map(|&t| data[[e, c, t]]))
    }))
}

/// Subtract the per-(trial, cell) baseline statistic from every sample.
pub fn baseline_correct_trials(trials: &TrialTensor, cfg: &BaselineConfig) -> Result<Baselined> {
    let reduction = cfg.reduction()?;
    let base = window_stat(&trials.data, trials.time(), &cfg.window, reduction)?;

    let mut out = trials.data.clone();
    for (mut trial, b) in out.outer_iter_mut().zip(base.outer_iter()) {
        for (mut cell, &v) in trial.outer_iter_mut().zip(b.iter()) {
            cell.mapv_inplace(|x| x - v);
        }
    }

    Ok(Baselined {
        tensor: trials.with_data(out),
        params: BaselineParams {
            window: cfg.window,
            method: reduction.method(),
            quantile: reduction.quantile(),
        },
    })
}
