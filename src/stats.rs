//! Windowed reductions over the relative-time axis.
//!
//! `TimeWindow` selects samples label-wise, inclusive on both ends, so a
//! window `(-0.5, 0.0)` on the grid `[-0.5, 0.0, 0.5]` picks the first two
//! samples.  `Reduction` collapses the selected samples to one scalar:
//!
//!   mean      : arithmetic mean
//!   min / max : extremes
//!   quantile  : linear interpolation between order statistics,
//!               position `q · (n − 1)` in the sorted samples
//!
//! NaN samples are skipped; a window holding only NaN reduces to NaN.
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, RsaError};

/// Tolerance used when comparing window bounds against the time axis.
const WINDOW_EPS: f64 = 1e-9;

/// Name of a reduction, as it appears in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatMethod {
    Mean,
    Min,
    Max,
    Quantile,
}

impl StatMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatMethod::Mean => "mean",
            StatMethod::Min => "min",
            StatMethod::Max => "max",
            StatMethod::Quantile => "quantile",
        }
    }
}

impl fmt::Display for StatMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StatMethod {
    type Err = RsaError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mean" => Ok(StatMethod::Mean),
            "min" => Ok(StatMethod::Min),
            "max" => Ok(StatMethod::Max),
            "quantile" => Ok(StatMethod::Quantile),
            other => Err(RsaError::invalid("method", format!("unknown statistic `{other}`"))),
        }
    }
}

/// A fully-specified reduction: the quantile value travels with the variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reduction {
    Mean,
    Min,
    Max,
    Quantile(f64),
}

impl Reduction {
    /// Combine a method name with its optional auxiliary quantile.
    ///
    /// `Quantile` without a value is a [`RsaError::MissingParameter`];
    /// a value outside `[0, 1]` is a [`RsaError::InvalidParameter`].
    /// The quantile is ignored for the other methods.
    pub fn resolve(method: StatMethod, quantile: Option<f64>) -> Result<Self> {
        match method {
            StatMethod::Mean => Ok(Reduction::Mean),
            StatMethod::Min => Ok(Reduction::Min),
            StatMethod::Max => Ok(Reduction::Max),
            StatMethod::Quantile => {
                let q = quantile.ok_or(RsaError::MissingParameter {
                    param: "quantile",
                    method: "quantile",
                })?;
                if !(0.0..=1.0).contains(&q) {
                    return Err(RsaError::invalid("quantile", format!("{q} is not in [0, 1]")));
                }
                Ok(Reduction::Quantile(q))
            }
        }
    }

    pub fn method(&self) -> StatMethod {
        match self {
            Reduction::Mean => StatMethod::Mean,
            Reduction::Min => StatMethod::Min,
            Reduction::Max => StatMethod::Max,
            Reduction::Quantile(_) => StatMethod::Quantile,
        }
    }

    pub fn quantile(&self) -> Option<f64> {
        match self {
            Reduction::Quantile(q) => Some(*q),
            _ => None,
        }
    }

    /// Reduce `values`, skipping NaN.
    pub fn apply<I>(&self, values: I) -> f64
    where
        I: IntoIterator<Item = f64>,
    {
        let finite: Vec<f64> = values.into_iter().filter(|v| !v.is_nan()).collect();
        if finite.is_empty() {
            return f64::NAN;
        }
        match *self {
            Reduction::Mean => finite.iter().sum::<f64>() / finite.len() as f64,
            Reduction::Min => finite.iter().copied().fold(f64::INFINITY, f64::min),
            Reduction::Max => finite.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Reduction::Quantile(q) => quantile_sorted(&sorted(finite), q),
        }
    }
}

fn sorted(mut v: Vec<f64>) -> Vec<f64> {
    v.sort_by(f64::total_cmp);
    v
}

/// Linear-interpolated quantile of an already sorted, NaN-free slice.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    let pos = q * (n - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Closed interval on the relative-time axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: f64,
    pub end: f64,
}

impl TimeWindow {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Indices of `time` that fall inside the window.
    ///
    /// Fails when the window is reversed, reaches past either end of
    /// `time`, or selects nothing.
    pub fn indices(&self, time: ArrayView1<f64>) -> Result<Vec<usize>> {
        let n = time.len();
        let out_of_range = || RsaError::WindowOutOfRange {
            start: self.start,
            end: self.end,
            first: time.first().copied().unwrap_or(f64::NAN),
            last: time.last().copied().unwrap_or(f64::NAN),
        };
        if n == 0 || !(self.start <= self.end) {
            return Err(out_of_range());
        }
        if self.start < time[0] - WINDOW_EPS || self.end > time[n - 1] + WINDOW_EPS {
            return Err(out_of_range());
        }
        let idx: Vec<usize> = time
            .iter()
            .enumerate()
            .filter(|&(_, &t)| t >= self.start - WINDOW_EPS && t <= self.end + WINDOW_EPS)
            .map(|(i, _)| i)
            .collect();
        if idx.is_empty() {
            return Err(out_of_range());
        }
        Ok(idx)
    }
}

impl From<(f64, f64)> for TimeWindow {
    fn from((start, end): (f64, f64)) -> Self {
        Self { start, end }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn quantile_interpolates_between_order_statistics() {
        let r = Reduction::Quantile(0.5);
        approx::assert_abs_diff_eq!(r.apply([4.0, 1.0, 3.0, 2.0]), 2.5, epsilon = 1e-12);
        let r = Reduction::Quantile(0.25);
        approx::assert_abs_diff_eq!(r.apply([1.0, 2.0, 3.0, 4.0, 5.0]), 2.0, epsilon = 1e-12);
        let r = Reduction::Quantile(1.0);
        approx::assert_abs_diff_eq!(r.apply([1.0, 7.0, 3.0]), 7.0, epsilon = 1e-12);
    }

    #[test]
    fn nan_samples_are_skipped() {
        let vals = [1.0, f64::NAN, 3.0];
        approx::assert_abs_diff_eq!(Reduction::Mean.apply(vals), 2.0, epsilon = 1e-12);
        assert_eq!(Reduction::Min.apply(vals), 1.0);
        assert_eq!(Reduction::Max.apply(vals), 3.0);
        assert!(Reduction::Mean.apply([f64::NAN, f64::NAN]).is_nan());
    }

    #[test]
    fn quantile_without_value_is_missing_parameter() {
        let err = Reduction::resolve(StatMethod::Quantile, None).unwrap_err();
        assert!(matches!(err, RsaError::MissingParameter { .. }));
        let err = Reduction::resolve(StatMethod::Quantile, Some(1.5)).unwrap_err();
        assert!(matches!(err, RsaError::InvalidParameter { .. }));
        assert_eq!(Reduction::resolve(StatMethod::Mean, Some(0.3)).unwrap(), Reduction::Mean);
    }

    #[test]
    fn window_is_inclusive() {
        let t = array![-0.5, 0.0, 0.5];
        assert_eq!(TimeWindow::new(-0.5, 0.0).indices(t.view()).unwrap(), vec![0, 1]);
        assert_eq!(TimeWindow::new(0.5, 0.5).indices(t.view()).unwrap(), vec![2]);
    }

    #[test]
    fn window_outside_extent_fails() {
        let t = array![-0.5, 0.0, 0.5];
        for w in [(-1.0, 0.0), (0.0, 0.6), (0.2, 0.1), (0.1, 0.2)] {
            let err = TimeWindow::from(w).indices(t.view()).unwrap_err();
            assert!(matches!(err, RsaError::WindowOutOfRange { .. }), "{w:?}");
        }
    }
}
