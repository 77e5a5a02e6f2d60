mod common;
use common::{labels, three_cell_signal};
use odorsa::{timeseries_to_trials, RsaError, StimField, TrialGrid};

#[test]
fn segmenting_two_onsets_gives_trial_cell_time_tensor() {
    let sig = three_cell_signal();
    let tr = timeseries_to_trials(
        &sig,
        &[2.0, 5.0],
        &labels(&["odorA", "odorB"]),
        &TrialGrid::explicit(vec![-0.5, 0.0, 0.5]),
        &StimField::default_set(),
    )
    .unwrap();
    assert_eq!(tr.data.shape(), &[2, 3, 3]);
    // cell 0 is the identity ramp: values equal absolute time
    approx::assert_abs_diff_eq!(tr.data[[0, 0, 0]], 1.5, epsilon = 1e-9);
    approx::assert_abs_diff_eq!(tr.data[[1, 0, 2]], 5.5, epsilon = 1e-9);
    assert_eq!(tr.coords.stim(), &labels(&["odorA", "odorB"])[..]);
    assert_eq!(tr.onsets, vec![2.0, 5.0]);
    assert_eq!(tr.time.to_vec(), vec![-0.5, 0.0, 0.5]);
}

#[test]
fn resampling_is_deterministic() {
    let sig = three_cell_signal();
    let grid = TrialGrid::Range { start: -1.0, stop: 2.0, step: 0.05, decimals: 3 };
    let run = || {
        timeseries_to_trials(&sig, &[2.03, 4.71, 7.0], &["a", "b", "a"], &grid, &StimField::default_set())
            .unwrap()
    };
    let (a, b) = (run(), run());
    assert_eq!(a.time, b.time);
    assert!(a
        .data
        .iter()
        .zip(b.data.iter())
        .all(|(x, y)| x.to_bits() == y.to_bits()));
}

#[test]
fn grid_is_identical_for_every_trial() {
    let sig = three_cell_signal();
    let tr = timeseries_to_trials(
        &sig,
        &[1.0, 3.0, 6.0],
        &["a", "b", "c"],
        &TrialGrid::Range { start: -0.5, stop: 1.0, step: 0.25, decimals: 3 },
        &[StimField::Stim, StimField::TrialIdx],
    )
    .unwrap();
    assert_eq!(tr.n_times(), 6);
    assert_eq!(tr.n_trials(), 3);
    assert_eq!(tr.coords.fields, vec![StimField::Stim, StimField::TrialIdx]);
}

#[test]
fn label_count_must_match_onsets() {
    let err = timeseries_to_trials(
        &three_cell_signal(),
        &[1.0, 2.0, 3.0],
        &["a", "b"],
        &TrialGrid::explicit(vec![0.0]),
        &StimField::default_set(),
    )
    .unwrap_err();
    assert!(matches!(err, RsaError::StructuralMismatch { expected: 3, actual: 2, .. }));
}

#[test]
fn out_of_range_samples_are_missing() {
    let tr = timeseries_to_trials(
        &three_cell_signal(),
        &[0.2, 9.8],
        &["a", "b"],
        &TrialGrid::explicit(vec![-0.5, 0.0, 0.5]),
        &StimField::default_set(),
    )
    .unwrap();
    for c in 0..3 {
        assert!(tr.data[[0, c, 0]].is_nan());
        assert!(!tr.data[[0, c, 1]].is_nan());
        assert!(tr.data[[1, c, 2]].is_nan());
    }
}
