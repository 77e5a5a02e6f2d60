/// Shared synthetic fixtures.
use ndarray::{Array1, Array2};
use odorsa::{SignalMatrix, StimField, TrialCoords, StimulusIndex};

#[allow(unused)]
/// 3 cells × 100 samples, timestamps 0.0..9.9 step 0.1, distinct smooth traces.
pub fn three_cell_signal() -> SignalMatrix {
    let t = Array1::from_iter((0..100).map(|i| i as f64 / 10.0));
    let data = Array2::from_shape_fn((3, 100), |(c, i)| {
        let x = i as f64 / 10.0;
        match c {
            0 => x,
            1 => (x * 0.7).sin() * 3.0,
            _ => (x - 5.0).powi(2),
        }
    });
    SignalMatrix::new(data, t).unwrap()
}

#[allow(unused)]
/// `n` cells whose response to onset `e` at relative time ≥ 0 is `amp[e][c]`,
/// on top of a per-cell offset; sampled at 10 Hz over `duration` seconds.
pub fn step_signal(n_cells: usize, onsets: &[f64], amps: &[Vec<f64>], duration: f64) -> SignalMatrix {
    let n_t = (duration * 10.0) as usize;
    let t = Array1::from_iter((0..n_t).map(|i| i as f64 / 10.0));
    let data = Array2::from_shape_fn((n_cells, n_t), |(c, i)| {
        let x = i as f64 / 10.0;
        let mut v = 100.0 + c as f64;
        for (e, &on) in onsets.iter().enumerate() {
            if x >= on - 1e-9 && x < on + 2.0 {
                v += amps[e][c];
            }
        }
        v
    });
    SignalMatrix::new(data, t).unwrap()
}

#[allow(unused)]
pub fn labels(s: &[&str]) -> Vec<String> {
    s.iter().map(|x| x.to_string()).collect()
}

#[allow(unused)]
pub fn coords(s: &[&str]) -> TrialCoords {
    TrialCoords::new(StimulusIndex::new(s), &StimField::default_set())
}

#[allow(unused)]
/// Maximum absolute difference between two arrays, ignoring NaN pairs.
pub fn max_abs_diff(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .filter(|(x, y)| !(x.is_nan() && y.is_nan()))
        .map(|(x, y)| (x - y).abs())
        .fold(0.0_f64, f64::max)
}
