//! Continuous cells × time signal with its timestamp axis.
//!
//! `data`: [C, T] fluorescence (or any per-cell trace), `timestamps`: [T]
//! in seconds, strictly increasing.  `cell_ids` keeps the original ROI
//! numbers so cell filtering does not lose track of which row is which.
use ndarray::{Array1, Array2, ArrayView1, Axis};
use tracing::debug;

use crate::error::{Result, RsaError};

#[derive(Debug, Clone, PartialEq)]
pub struct SignalMatrix {
    pub data: Array2<f64>,
    pub timestamps: Array1<f64>,
    pub cell_ids: Vec<usize>,
}

impl SignalMatrix {
    /// Wrap `data` ([C, T]) and `timestamps` ([T]); cells are numbered `0..C`.
    pub fn new(data: Array2<f64>, timestamps: Array1<f64>) -> Result<Self> {
        let n_cells = data.nrows();
        Self::with_cell_ids(data, timestamps, (0..n_cells).collect())
    }

    pub fn with_cell_ids(
        data: Array2<f64>,
        timestamps: Array1<f64>,
        cell_ids: Vec<usize>,
    ) -> Result<Self> {
        if data.ncols() != timestamps.len() {
            return Err(RsaError::mismatch("timestamp count vs signal columns", data.ncols(), timestamps.len()));
        }
        if cell_ids.len() != data.nrows() {
            return Err(RsaError::mismatch("cell id count vs signal rows", data.nrows(), cell_ids.len()));
        }
        if let Some(i) = timestamps
            .windows(2)
            .into_iter()
            .position(|w| !(w[1] > w[0]))
        {
            return Err(RsaError::invalid(
                "timestamps",
                format!("not strictly increasing at sample {}", i + 1),
            ));
        }
        Ok(Self { data, timestamps, cell_ids })
    }

    pub fn n_cells(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_times(&self) -> usize {
        self.data.ncols()
    }

    /// Keep the cells whose `mask` entry is true.
    pub fn select_cells(&self, mask: &[bool]) -> Result<Self> {
        if mask.len() != self.n_cells() {
            return Err(RsaError::mismatch("cell mask length", self.n_cells(), mask.len()));
        }
        let keep: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(i, &m)| m.then_some(i))
            .collect();
        debug!(kept = keep.len(), total = self.n_cells(), "selecting cells");
        Ok(Self {
            data: self.data.select(Axis(0), &keep),
            timestamps: self.timestamps.clone(),
            cell_ids: keep.iter().map(|&i| self.cell_ids[i]).collect(),
        })
    }

    /// Keep cells whose classifier value (0/1 flag or probability) is at
    /// least `threshold`.
    pub fn select_iscells(&self, iscell: ArrayView1<f64>, threshold: f64) -> Result<Self> {
        let mask: Vec<bool> = iscell.iter().map(|&p| p >= threshold).collect();
        self.select_cells(&mask)
    }

    /// Linearly interpolate every cell at `times`.
    ///
    /// Returns [C, times.len()]; queries before the first or after the last
    /// timestamp are NaN.
    pub fn interp_at(&self, times: ArrayView1<f64>) -> Array2<f64> {
        let ts = self.timestamps.to_vec();
        let mut out = Array2::<f64>::from_elem((self.n_cells(), times.len()), f64::NAN);
        for (j, &t) in times.iter().enumerate() {
            let Some((lo, frac)) = bracket(&ts, t) else { continue };
            let col_lo = self.data.column(lo);
            if frac == 0.0 {
                out.column_mut(j).assign(&col_lo);
            } else {
                let col_hi = self.data.column(lo + 1);
                out.column_mut(j)
                    .assign(&(&col_lo + &((&col_hi - &col_lo) * frac)));
            }
        }
        out
    }
}

/// Left neighbour and fractional offset of `t` on the sorted axis `ts`, or
/// `None` when `t` lies outside `[ts[0], ts[last]]`.
fn bracket(ts: &[f64], t: f64) -> Option<(usize, f64)> {
    let n = ts.len();
    if n == 0 || t.is_nan() || t < ts[0] || t > ts[n - 1] {
        return None;
    }
    // first index with ts[i] > t
    let hi = ts.partition_point(|&x| x <= t);
    if hi == 0 {
        return None;
    }
    let lo = hi - 1;
    if ts[lo] == t || lo + 1 == n {
        return Some((lo, 0.0));
    }
    Some((lo, (t - ts[lo]) / (ts[lo + 1] - ts[lo])))
}
