//! Reordering RDM axes to a canonical stimulus order, and averaging RDMs
//! from several recordings once their axes line up.
//!
//! Rows and columns are sorted independently by
//! `(position of stim in order, stim_occ)`, so repeated presentations of a
//! stimulus stay in presentation order inside their group.
use ndarray::{Array3, Axis};
use tracing::debug;

use crate::error::{Result, RsaError};
use crate::rdm::{AxisCoords, Rdm};
use crate::stats::Reduction;

/// Permutation that sorts `axis` by canonical label rank, then occurrence.
pub fn sort_order(axis: &AxisCoords, order: &[String]) -> Result<Vec<usize>> {
    let idx = &axis.coords.index;
    let mut keys = Vec::with_capacity(idx.len());
    for (i, label) in idx.stim.iter().enumerate() {
        let rank = order
            .iter()
            .position(|o| o == label)
            .ok_or_else(|| RsaError::LabelNotInOrder(label.clone()))?;
        keys.push((rank, idx.stim_occ[i], i));
    }
    keys.sort();
    Ok(keys.into_iter().map(|(_, _, i)| i).collect())
}

/// Reindex both axes of `rdm` to follow `order`.
///
/// Fails with [`RsaError::LabelNotInOrder`] when a label on either axis is
/// missing from `order`.
pub fn sort_rdm(rdm: &Rdm, order: &[String]) -> Result<Rdm> {
    let rows = sort_order(&rdm.row, order)?;
    let cols = sort_order(&rdm.col, order)?;
    let data = rdm.data.select(Axis(1), &rows).select(Axis(2), &cols);
    Ok(Rdm {
        data,
        time: rdm.time.clone(),
        row: AxisCoords::new(rdm.row.side, rdm.row.coords.take(&rows)),
        col: AxisCoords::new(rdm.col.side, rdm.col.coords.take(&cols)),
        metric: rdm.metric,
        baseline: rdm.baseline,
        peak: rdm.peak,
    })
}

/// Sort every RDM to the same canonical order.
pub fn align_rdms(rdms: &[Rdm], order: &[String]) -> Result<Vec<Rdm>> {
    rdms.iter().map(|r| sort_rdm(r, order)).collect()
}

/// Element-wise mean of aligned RDMs, skipping NaN.
///
/// All inputs must share the shape and the `(stim, stim_occ)` sequence of
/// both axes; run [`align_rdms`] first.  Coordinates, metric and parameters
/// of the result come from the first input.
pub fn mean_rdm(rdms: &[Rdm]) -> Result<Rdm> {
    let first = rdms
        .first()
        .ok_or_else(|| RsaError::invalid("rdms", "nothing to average"))?;
    for r in &rdms[1..] {
        if let Some((axis, (&a, &b))) = first
            .data
            .shape()
            .iter()
            .zip(r.data.shape())
            .enumerate()
            .find(|(_, (a, b))| a != b)
        {
            let what = ["RDM batch size", "RDM rows", "RDM columns"][axis];
            return Err(RsaError::mismatch(what, a, b));
        }
        for (a, b) in [(&first.row, &r.row), (&first.col, &r.col)] {
            let same = a.coords.index.stim == b.coords.index.stim
                && a.coords.index.stim_occ == b.coords.index.stim_occ;
            if !same {
                return Err(RsaError::invalid("rdms", "axes are not aligned; sort them to a common order first"));
            }
        }
    }
    debug!(count = rdms.len(), "averaging aligned RDMs");
    let data = Array3::from_shape_fn(first.data.dim(), |ix| {
        Reduction::Mean.apply(rdms.iter().map(|r| r.data[ix]))
    });
    Ok(Rdm { data, ..first.clone() })
}
