//! Representational dissimilarity matrices.
//!
//! An [`Rdm`] is a stack of square matrices, [B, N, N], where `N` runs over
//! trials (or stimuli, after [`crate::respvec::mean_by_stimulus`]) and `B`
//! over whatever was looped: a single response vector matrix gives `B = 1`,
//! a full trial tensor gives one matrix per relative-time sample.
//!
//! The trial coordinates are copied onto both axes.  Each axis keeps its own
//! copy so rows and columns can later be reordered independently; field
//! names carry a `row_` / `col_` prefix (`row_stim`, `col_stim_occ`, ...).
use ndarray::{s, Array1, Array2, Array3, ArrayView2, Axis};
use tracing::info;

use crate::baseline::BaselineParams;
use crate::distance::{pairwise_distances, Metric};
use crate::error::{Result, RsaError};
use crate::respvec::{PeakParams, ResponseVectors};
use crate::stimulus::{FieldValues, StimField};
use crate::trials::{TrialCoords, TrialTensor};

/// Which side of the matrix an [`AxisCoords`] labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Row,
    Col,
}

impl Side {
    pub fn prefix(&self) -> &'static str {
        match self {
            Side::Row => "row_",
            Side::Col => "col_",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisCoords {
    pub side: Side,
    pub coords: TrialCoords,
}

impl AxisCoords {
    pub fn new(side: Side, coords: TrialCoords) -> Self {
        Self { side, coords }
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Prefixed names of the retained fields, e.g. `["row_stim", "row_stim_occ"]`.
    pub fn names(&self) -> Vec<String> {
        self.coords
            .fields
            .iter()
            .map(|f| format!("{}{}", self.side.prefix(), f.name()))
            .collect()
    }

    /// Values of a coordinate looked up by its prefixed name.
    pub fn get(&self, name: &str) -> Option<FieldValues<'_>> {
        let bare = name.strip_prefix(self.side.prefix())?;
        let field = StimField::parse(bare).ok()?;
        self.coords.has(field).then(|| self.coords.index.field(field))
    }

    pub fn stim(&self) -> &[String] {
        self.coords.stim()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rdm {
    /// [B, N, N]
    pub data: Array3<f64>,
    /// Relative time of each batch entry when computed per time sample.
    pub time: Option<Array1<f64>>,
    pub row: AxisCoords,
    pub col: AxisCoords,
    pub metric: Metric,
    pub baseline: Option<BaselineParams>,
    pub peak: Option<PeakParams>,
}

impl Rdm {
    pub fn n_batch(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn size(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    /// The `b`-th matrix.
    pub fn matrix(&self, b: usize) -> ArrayView2<'_, f64> {
        self.data.slice(s![b, .., ..])
    }

    /// The matrix at relative time `t` (exact label match, within 1e-9).
    pub fn at_time(&self, t: f64) -> Option<ArrayView2<'_, f64>> {
        let time = self.time.as_ref()?;
        let b = time.iter().position(|&x| (x - t).abs() < 1e-9)?;
        Some(self.matrix(b))
    }

    /// `1 − D`, the similarity matrix stack.
    pub fn similarity(&self) -> Array3<f64> {
        self.data.mapv(|d| 1.0 - d)
    }
}

/// Check that `coords` can label an axis of length `n_rows` and carry `stim`.
pub fn check_rdm_input(n_rows: usize, coords: &TrialCoords) -> Result<()> {
    if n_rows != coords.len() {
        return Err(RsaError::mismatch("trial axis vs stimulus coordinates", coords.len(), n_rows));
    }
    if !coords.has(StimField::Stim) {
        return Err(RsaError::MissingCoordinate(StimField::Stim.name().to_string()));
    }
    Ok(())
}

fn axes(coords: &TrialCoords) -> (AxisCoords, AxisCoords) {
    (
        AxisCoords::new(Side::Row, coords.clone()),
        AxisCoords::new(Side::Col, coords.clone()),
    )
}

/// RDM between the rows of a response-vector matrix (batch of one).
pub fn compute_respvec_rdm(resp: &ResponseVectors, metric: Metric) -> Result<Rdm> {
    check_rdm_input(resp.n_trials(), &resp.coords)?;
    let d = pairwise_distances(resp.data.view(), metric);
    let n = d.nrows();
    let data = d.into_shape_with_order((1, n, n)).map_err(|e| RsaError::invalid("rdm", e.to_string()))?;
    let (row, col) = axes(&resp.coords);
    info!(size = n, metric = %metric, "computed response-vector RDM");
    Ok(Rdm { data, time: None, row, col, metric, baseline: None, peak: resp.peak })
}

/// One RDM per relative-time sample of a trial tensor, each over the
/// (trial, cell) slice at that sample.
pub fn compute_trial_rdm(trials: &TrialTensor, metric: Metric) -> Result<Rdm> {
    check_rdm_input(trials.n_trials(), &trials.coords)?;
    let (n, _, n_t) = trials.data.dim();
    let mut data = Array3::<f64>::zeros((n_t, n, n));
    for t in 0..n_t {
        let slice = trials.data.slice(s![.., .., t]);
        data.slice_mut(s![t, .., ..]).assign(&pairwise_distances(slice, metric));
    }
    let (row, col) = axes(&trials.coords);
    info!(size = n, batch = n_t, metric = %metric, "computed per-timepoint RDM");
    Ok(Rdm { data, time: Some(trials.time.clone()), row, col, metric, baseline: None, peak: None })
}

/// Wrap an already computed stack of square matrices.
pub fn rdm_from_parts(data: Array3<f64>, coords: &TrialCoords, metric: Metric) -> Result<Rdm> {
    let (_, r, c) = data.dim();
    if r != c {
        return Err(RsaError::mismatch("square matrix columns", r, c));
    }
    check_rdm_input(r, coords)?;
    let (row, col) = axes(coords);
    Ok(Rdm { data, time: None, row, col, metric, baseline: None, peak: None })
}

/// Squeeze a batch-of-one RDM into a plain [N, N] matrix.
pub fn single(rdm: &Rdm) -> Result<Array2<f64>> {
    if rdm.n_batch() != 1 {
        return Err(RsaError::mismatch("RDM batch size", 1, rdm.n_batch()));
    }
    Ok(rdm.matrix(0).to_owned())
}
