//! Pairwise distances between the rows of an [N, D] matrix.
//!
//! Follows the condensed-then-square convention: each unordered pair is
//! computed once and mirrored, the diagonal is exactly zero.  Any NaN in
//! either row turns that entry into NaN instead of failing.
use ndarray::{Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, RsaError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// `1 − pearson(u, v)`, in [0, 2].
    #[default]
    Correlation,
    Euclidean,
    SqEuclidean,
    /// `1 − cos(u, v)`, in [0, 2].
    Cosine,
    #[serde(alias = "manhattan")]
    Cityblock,
    Chebyshev,
}

impl Metric {
    pub fn name(&self) -> &'static str {
        match self {
            Metric::Correlation => "correlation",
            Metric::Euclidean => "euclidean",
            Metric::SqEuclidean => "sqeuclidean",
            Metric::Cosine => "cosine",
            Metric::Cityblock => "cityblock",
            Metric::Chebyshev => "chebyshev",
        }
    }

    pub fn distance(&self, u: ArrayView1<f64>, v: ArrayView1<f64>) -> f64 {
        match self {
            Metric::Correlation => {
                let mu = mean(u);
                let mv = mean(v);
                let (mut uv, mut uu, mut vv) = (0.0, 0.0, 0.0);
                for (&a, &b) in u.iter().zip(v.iter()) {
                    let (da, db) = (a - mu, b - mv);
                    uv += da * db;
                    uu += da * da;
                    vv += db * db;
                }
                clamp_unit(1.0 - uv / (uu * vv).sqrt())
            }
            Metric::Cosine => {
                let uv = u.dot(&v);
                let norm = (u.dot(&u) * v.dot(&v)).sqrt();
                clamp_unit(1.0 - uv / norm)
            }
            Metric::Euclidean => Metric::SqEuclidean.distance(u, v).sqrt(),
            Metric::SqEuclidean => u.iter().zip(v.iter()).map(|(a, b)| (a - b) * (a - b)).sum(),
            Metric::Cityblock => u.iter().zip(v.iter()).map(|(a, b)| (a - b).abs()).sum(),
            Metric::Chebyshev => u
                .iter()
                .zip(v.iter())
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, |acc: f64, d| if d.is_nan() || acc.is_nan() { f64::NAN } else { acc.max(d) }),
        }
    }
}

fn mean(x: ArrayView1<f64>) -> f64 {
    x.sum() / x.len() as f64
}

/// Clamp a `1 − similarity` value to [0, 2]; NaN stays NaN.
fn clamp_unit(d: f64) -> f64 {
    if d.is_nan() {
        d
    } else {
        d.clamp(0.0, 2.0)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = RsaError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "correlation" => Ok(Metric::Correlation),
            "euclidean" => Ok(Metric::Euclidean),
            "sqeuclidean" => Ok(Metric::SqEuclidean),
            "cosine" => Ok(Metric::Cosine),
            "cityblock" | "manhattan" => Ok(Metric::Cityblock),
            "chebyshev" => Ok(Metric::Chebyshev),
            other => Err(RsaError::invalid("metric", format!("unsupported metric `{other}`"))),
        }
    }
}

/// `D[i, j] = metric(x[i], x[j])` for every pair of rows.
pub fn pairwise_distances(x: ArrayView2<f64>, metric: Metric) -> Array2<f64> {
    let n = x.nrows();
    let mut d = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in (i + 1)..n {
            let v = metric.distance(x.row(i), x.row(j));
            d[[i, j]] = v;
            d[[j, i]] = v;
        }
    }
    d
}
