//! Response vectors: one value per (trial, cell).
//!
//! [`peak_amp`] collapses the relative-time axis of a trial tensor over a
//! response window (mean / min / max / quantile), optionally subtracting a
//! second statistic taken over a baseline window of the same trial.
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::baseline::window_stat;
use crate::error::{Result, RsaError};
use crate::stats::{Reduction, StatMethod, TimeWindow};
use crate::stimulus::StimulusIndex;
use crate::trials::{TrialCoords, TrialTensor};

/// A window plus the statistic taken over it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowSpec {
    pub window: TimeWindow,
    pub method: StatMethod,
    #[serde(default)]
    pub quantile: Option<f64>,
}

impl WindowSpec {
    pub fn new(start: f64, end: f64, method: StatMethod, quantile: Option<f64>) -> Self {
        Self { window: TimeWindow::new(start, end), method, quantile }
    }

    pub fn reduction(&self) -> Result<Reduction> {
        Reduction::resolve(self.method, self.quantile)
    }

    /// As applied: quantile dropped unless the method uses it.
    fn resolved(&self, r: Reduction) -> Self {
        Self { window: self.window, method: r.method(), quantile: r.quantile() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakConfig {
    /// Default: mean over `(0.0, 5.0)` s.
    pub peak: WindowSpec,
    /// Subtracted from the peak value when set.  Default: `None`.
    #[serde(default)]
    pub baseline: Option<WindowSpec>,
}

impl Default for PeakConfig {
    fn default() -> Self {
        Self { peak: WindowSpec::new(0.0, 5.0, StatMethod::Mean, None), baseline: None }
    }
}

/// Parameters actually applied by [`peak_amp`].
pub type PeakParams = PeakConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct ResponseVectors {
    /// [E, C]
    pub data: Array2<f64>,
    pub cell_ids: Vec<usize>,
    pub coords: TrialCoords,
    pub peak: Option<PeakParams>,
}

impl ResponseVectors {
    /// Wrap an externally computed [E, C] matrix.
    pub fn new(data: Array2<f64>, coords: TrialCoords) -> Result<Self> {
        if data.nrows() != coords.len() {
            return Err(RsaError::mismatch("trial axis vs stimulus coordinates", coords.len(), data.nrows()));
        }
        let cell_ids = (0..data.ncols()).collect();
        Ok(Self { data, cell_ids, coords, peak: None })
    }

    pub fn n_trials(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_cells(&self) -> usize {
        self.data.ncols()
    }

    /// Keep only cells whose id is listed in `keep`.
    pub fn filter_cells(&self, keep: &[usize]) -> Self {
        let cols: Vec<usize> = self
            .cell_ids
            .iter()
            .enumerate()
            .filter_map(|(i, id)| keep.contains(id).then_some(i))
            .collect();
        Self {
            data: self.data.select(Axis(1), &cols),
            cell_ids: cols.iter().map(|&i| self.cell_ids[i]).collect(),
            coords: self.coords.clone(),
            peak: self.peak,
        }
    }
}

/// Summarise each (trial, cell) trace over the response window.
pub fn peak_amp(trials: &TrialTensor, cfg: &PeakConfig) -> Result<ResponseVectors> {
    let peak_r = cfg.peak.reduction()?;
    let mut amp = window_stat(&trials.data, trials.time(), &cfg.peak.window, peak_r)?;

    let baseline = match &cfg.baseline {
        Some(w) => {
            let r = w.reduction()?;
            let base = window_stat(&trials.data, trials.time(), &w.window, r)?;
            amp -= &base;
            Some(w.resolved(r))
        }
        None => None,
    };
    debug!(trials = amp.nrows(), cells = amp.ncols(), "response vectors");

    Ok(ResponseVectors {
        data: amp,
        cell_ids: trials.cell_ids.clone(),
        coords: trials.coords.clone(),
        peak: Some(PeakConfig { peak: cfg.peak.resolved(peak_r), baseline }),
    })
}

/// Average trials sharing a stimulus label.
///
/// Rows come out in order of first appearance; NaN entries are skipped.
/// The new trial axis is indexed afresh from the unique label list, so each
/// row has `stim_occ = 0` and `trial_idx` equal to its row number.
pub fn mean_by_stimulus(resp: &ResponseVectors) -> ResponseVectors {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, label) in resp.coords.stim().iter().enumerate() {
        groups
            .entry(label.as_str())
            .or_insert_with(|| {
                order.push(label.clone());
                Vec::new()
            })
            .push(i);
    }

    let mut data = Array2::<f64>::zeros((order.len(), resp.n_cells()));
    for (row, label) in order.iter().enumerate() {
        let members = &groups[label.as_str()];
        for c in 0..resp.n_cells() {
            data[[row, c]] = Reduction::Mean.apply(members.iter().map(|&i| resp.data[[i, c]]));
        }
    }

    ResponseVectors {
        data,
        cell_ids: resp.cell_ids.clone(),
        coords: TrialCoords::new(StimulusIndex::new(&order), &resp.coords.fields),
        peak: resp.peak,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stimulus::StimField;
    use ndarray::{array, Array1, Array3};

    fn tensor() -> TrialTensor {
        // trial e, cell c: value = t + 10·e + c on t ∈ {0..5}
        let data = Array3::from_shape_fn((2, 2, 6), |(e, c, t)| (t + 10 * e + c) as f64);
        TrialTensor {
            data,
            time: Array1::from_vec(vec![-2.0, -1.0, 0.0, 1.0, 2.0, 3.0]),
            cell_ids: vec![4, 9],
            coords: TrialCoords::new(StimulusIndex::new(&["A", "B"]), &[StimField::Stim]),
            onsets: vec![0.0, 10.0],
        }
    }

    #[test]
    fn each_peak_method() {
        let tr = tensor();
        let run = |m, q| {
            let cfg = PeakConfig { peak: WindowSpec::new(1.0, 3.0, m, q), baseline: None };
            peak_amp(&tr, &cfg).unwrap().data
        };
        assert_eq!(run(StatMethod::Mean, None)[[0, 0]], 4.0);
        assert_eq!(run(StatMethod::Min, None)[[1, 1]], 14.0);
        assert_eq!(run(StatMethod::Max, None)[[0, 1]], 6.0);
        assert_eq!(run(StatMethod::Quantile, Some(0.5))[[1, 0]], 14.0);
    }

    #[test]
    fn quantile_peak_needs_quantile() {
        let cfg = PeakConfig { peak: WindowSpec::new(1.0, 3.0, StatMethod::Quantile, None), baseline: None };
        assert!(matches!(peak_amp(&tensor(), &cfg).unwrap_err(), RsaError::MissingParameter { .. }));
    }

    #[test]
    fn baseline_subtraction() {
        let cfg = PeakConfig {
            peak: WindowSpec::new(3.0, 3.0, StatMethod::Mean, None),
            baseline: Some(WindowSpec::new(-2.0, -2.0, StatMethod::Mean, Some(0.9))),
        };
        let r = peak_amp(&tensor(), &cfg).unwrap();
        assert!(r.data.iter().all(|&v| v == 5.0));
        assert_eq!(r.peak.unwrap().baseline.unwrap().quantile, None);
    }

    #[test]
    fn stimulus_mean_groups_by_first_appearance() {
        let coords = TrialCoords::new(StimulusIndex::new(&["B", "A", "B"]), &[StimField::Stim]);
        let r = ResponseVectors::new(array![[1.0, 2.0], [5.0, 5.0], [3.0, f64::NAN]], coords).unwrap();
        let m = mean_by_stimulus(&r);
        assert_eq!(m.coords.stim(), &["B".to_string(), "A".to_string()]);
        assert_eq!(m.data, array![[2.0, 2.0], [5.0, 5.0]]);
        assert_eq!(m.coords.index.stim_occ, vec![0, 0]);
    }

    #[test]
    fn filter_cells_by_id() {
        let r = peak_amp(&tensor(), &PeakConfig::default()).unwrap_err();
        assert!(matches!(r, RsaError::WindowOutOfRange { .. }));
        let cfg = PeakConfig { peak: WindowSpec::new(0.0, 3.0, StatMethod::Mean, None), baseline: None };
        let r = peak_amp(&tensor(), &cfg).unwrap().filter_cells(&[9]);
        assert_eq!(r.cell_ids, vec![9]);
        assert_eq!(r.data.ncols(), 1);
    }

    #[test]
    fn row_count_must_match_coords() {
        let coords = TrialCoords::new(StimulusIndex::new(&["A"]), &[StimField::Stim]);
        assert!(ResponseVectors::new(Array2::zeros((2, 3)), coords).is_err());
    }
}
