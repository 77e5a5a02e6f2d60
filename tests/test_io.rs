mod common;
use common::{labels, three_cell_signal};
use odorsa::{
    compute_respvec_rdm, load_stim_list, read_tensors, write_rdm, write_trials, BaselineConfig, Metric,
    PipelineConfig, Recording, RsaError, StWriter, StimField, TrialGrid,
};
use std::path::Path;

fn write_signal(path: &Path, with_iscell: bool) {
    let sig = three_cell_signal();
    let f: Vec<f32> = sig.data.iter().map(|&v| v as f32).collect();
    let mut w = StWriter::new();
    w.add_f32("F", &f, &[3, 100]);
    w.add_f64("timestamps", &sig.timestamps.to_vec(), &[100]);
    w.add_f64("onsets", &[2.0, 5.0, 7.5], &[3]);
    if with_iscell {
        w.add_i32("iscell", &[1, 0, 1], &[3]);
    }
    w.write(path).unwrap();
}

fn write_json(path: &Path, text: &str) {
    std::fs::write(path, text).unwrap();
}

#[test]
fn recording_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let sig_path = dir.path().join("signal.safetensors");
    let stim_path = dir.path().join("stim_list.json");
    write_signal(&sig_path, true);
    write_json(&stim_path, r#"{"stim_list_flatstr": ["ep @ -3.0", "1-5ol @ -3.0", "ep @ -3.0"]}"#);

    let rec = Recording::load(&sig_path, &stim_path).unwrap();
    assert_eq!(rec.signal.data.dim(), (3, 100));
    assert_eq!(rec.onsets, vec![2.0, 5.0, 7.5]);
    assert_eq!(rec.stim_list, labels(&["ep @ -3.0", "1-5ol @ -3.0", "ep @ -3.0"]));
    assert_eq!(rec.iscell.as_ref().map(|a| a.to_vec()), Some(vec![1.0, 0.0, 1.0]));
    // F was stored as f32
    approx::assert_abs_diff_eq!(rec.signal.data[[0, 42]], 4.2, epsilon = 1e-5);
}

#[test]
fn bare_array_stim_list_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("stims.json");
    write_json(&p, r#"["A", "B"]"#);
    assert_eq!(load_stim_list(&p).unwrap(), labels(&["A", "B"]));

    write_json(&p, r#"{"odors": ["A"]}"#);
    assert!(matches!(load_stim_list(&p).unwrap_err(), RsaError::Format { .. }));
}

#[test]
fn mismatched_stim_list_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let sig_path = dir.path().join("signal.safetensors");
    let stim_path = dir.path().join("stim_list.json");
    write_signal(&sig_path, false);
    write_json(&stim_path, r#"["A", "B"]"#);
    let err = Recording::load(&sig_path, &stim_path).unwrap_err();
    assert!(matches!(err, RsaError::StructuralMismatch { expected: 3, actual: 2, .. }));
}

#[test]
fn missing_files_and_tensors_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.safetensors");
    assert!(matches!(read_tensors(&missing).unwrap_err(), RsaError::Io { .. }));

    let sig_path = dir.path().join("partial.safetensors");
    let mut w = StWriter::new();
    w.add_f64("F", &[0.0; 4], &[2, 2]);
    w.write(&sig_path).unwrap();
    let stim_path = dir.path().join("stims.json");
    write_json(&stim_path, "[]");
    assert!(matches!(Recording::load(&sig_path, &stim_path).unwrap_err(), RsaError::Format { .. }));
}

#[test]
fn rdm_file_carries_coordinates_and_parameters() {
    let dir = tempfile::tempdir().unwrap();
    let sig_path = dir.path().join("signal.safetensors");
    let stim_path = dir.path().join("stim_list.json");
    write_signal(&sig_path, false);
    write_json(&stim_path, r#"["A", "B", "A"]"#);
    let rec = Recording::load(&sig_path, &stim_path).unwrap();

    let cfg = PipelineConfig {
        grid: TrialGrid::explicit(vec![-1.0, -0.5, 0.0, 0.5, 1.0]),
        baseline: BaselineConfig::mean(-1.0, 0.0),
        stim_fields: vec![StimField::Stim, StimField::StimOcc],
        metric: Metric::Euclidean,
        peak: odorsa::PeakConfig {
            peak: odorsa::WindowSpec::new(0.0, 1.0, odorsa::StatMethod::Mean, None),
            baseline: None,
        },
        ..PipelineConfig::default()
    };
    let out = odorsa::run_pipeline(&rec, &cfg).unwrap();

    let rdm_path = dir.path().join("rdm.safetensors");
    write_rdm(&rdm_path, &out.rdm).unwrap();
    let (tensors, meta) = read_tensors(&rdm_path).unwrap();
    assert_eq!(tensors["rdm"].shape, vec![1, 3, 3]);
    assert_eq!(tensors["rdm"].data, out.rdm.data.iter().copied().collect::<Vec<_>>());
    assert_eq!(meta["distance_metric"], "euclidean");
    assert_eq!(meta["row_stim"], r#"["A","B","A"]"#);
    assert_eq!(meta["col_stim_occ"], "[0,0,1]");
    assert!(!meta.contains_key("row_run_idx"));
    assert!(meta["baseline"].contains("\"mean\""));

    let trials_path = dir.path().join("trials.safetensors");
    write_trials(&trials_path, &out.baselined.tensor, Some(&out.baselined.params)).unwrap();
    let (tensors, meta) = read_tensors(&trials_path).unwrap();
    assert_eq!(tensors["trials"].shape, vec![3, 3, 5]);
    assert_eq!(tensors["cell_ids"].data, vec![0.0, 1.0, 2.0]);
    assert_eq!(meta["stim"], r#"["A","B","A"]"#);
}

#[test]
fn rdm_from_response_vectors_writes_without_parameters() {
    let dir = tempfile::tempdir().unwrap();
    let resp = odorsa::ResponseVectors::new(
        ndarray::array![[1.0, 0.0], [0.0, 1.0]],
        common::coords(&["A", "B"]),
    )
    .unwrap();
    let rdm = compute_respvec_rdm(&resp, Metric::Cosine).unwrap();
    let p = dir.path().join("rdm.safetensors");
    write_rdm(&p, &rdm).unwrap();
    let (tensors, meta) = read_tensors(&p).unwrap();
    approx::assert_abs_diff_eq!(tensors["rdm"].data[1], 1.0, epsilon = 1e-12);
    assert!(!meta.contains_key("baseline"));
    assert!(!meta.contains_key("respvec"));
}

/// Write a safetensors file from a hand-built header and raw data bytes.
fn write_raw(path: &Path, header: serde_json::Value, data: &[u8]) {
    let mut hdr = serde_json::to_vec(&header).unwrap();
    while hdr.len() % 8 != 0 {
        hdr.push(b' ');
    }
    let mut bytes = (hdr.len() as u64).to_le_bytes().to_vec();
    bytes.extend_from_slice(&hdr);
    bytes.extend_from_slice(data);
    std::fs::write(path, bytes).unwrap();
}

fn format_reason(err: RsaError) -> String {
    match err {
        RsaError::Format { reason, .. } => reason,
        other => panic!("expected a format error, got {other}"),
    }
}

#[test]
fn unsupported_iscell_dtype_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let sig_path = dir.path().join("signal.safetensors");
    let stim_path = dir.path().join("stim_list.json");
    let f: Vec<u8> = [1.0f64, 2.0, 3.0, 4.0].iter().flat_map(|v| v.to_le_bytes()).collect();
    let t: Vec<u8> = [0.0f64, 1.0].iter().flat_map(|v| v.to_le_bytes()).collect();
    let mut data = f;
    data.extend_from_slice(&t);
    data.extend_from_slice(&0.5f64.to_le_bytes());
    data.extend_from_slice(&[0u8; 4]);
    write_raw(
        &sig_path,
        serde_json::json!({
            "F": { "dtype": "F64", "shape": [2, 2], "data_offsets": [0, 32] },
            "timestamps": { "dtype": "F64", "shape": [2], "data_offsets": [32, 48] },
            "onsets": { "dtype": "F64", "shape": [1], "data_offsets": [48, 56] },
            "iscell": { "dtype": "F16", "shape": [2], "data_offsets": [56, 60] },
        }),
        &data,
    );
    write_json(&stim_path, r#"["A"]"#);

    let reason = format_reason(Recording::load(&sig_path, &stim_path).unwrap_err());
    assert!(reason.contains("iscell") && reason.contains("F16"), "{reason}");
}

#[test]
fn overflowing_offsets_are_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("bad.safetensors");
    write_raw(
        &p,
        serde_json::json!({ "x": { "dtype": "F64", "shape": [1], "data_offsets": [u64::MAX, u64::MAX] } }),
        &[0u8; 8],
    );
    let reason = format_reason(read_tensors(&p).unwrap_err());
    assert!(reason.contains("data_offsets"), "{reason}");
}

#[test]
fn overflowing_shape_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("bad.safetensors");
    let huge = 1u64 << 32;
    write_raw(
        &p,
        serde_json::json!({ "x": { "dtype": "F64", "shape": [huge, huge, huge], "data_offsets": [0, 8] } }),
        &[0u8; 8],
    );
    let reason = format_reason(read_tensors(&p).unwrap_err());
    assert!(reason.contains("overflows"), "{reason}");
}
