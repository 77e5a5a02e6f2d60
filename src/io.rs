//! File I/O: safetensors arrays and the stimulus-list JSON.
//!
//! Reader: `signal.safetensors` holding
//!
//! ```text
//! F           [C, T]  fluorescence            (F32 or F64)
//! timestamps  [T]     seconds                 (F32 or F64)
//! onsets      [E]     stimulus onset times    (F32 or F64)
//! iscell      [C]     classifier flag / prob  (optional)
//! ```
//!
//! and `stim_list.json` holding `{"stim_list_flatstr": ["ep @ -3.0", ...]}`.
//!
//! Writers store trial tensors, response vectors and RDMs as F64 tensors with
//! the retained stimulus fields and analysis parameters as JSON strings in
//! `__metadata__`.
use ndarray::{Array1, Array2};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::baseline::BaselineParams;
use crate::error::{Result, RsaError};
use crate::rdm::{AxisCoords, Rdm};
use crate::respvec::ResponseVectors;
use crate::timeseries::SignalMatrix;
use crate::trials::{TrialCoords, TrialTensor};

// ── Low-level safetensors parser ─────────────────────────────────────────────

fn malformed(path: &Path, reason: impl Into<String>) -> RsaError {
    RsaError::Format { path: path.to_path_buf(), reason: reason.into() }
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| RsaError::Io { path: path.to_path_buf(), source })
}

fn parse_header(bytes: &[u8], path: &Path) -> Result<(serde_json::Map<String, serde_json::Value>, usize)> {
    if bytes.len() < 8 {
        return Err(malformed(path, "safetensors file too small"));
    }
    let mut len = [0u8; 8];
    len.copy_from_slice(&bytes[..8]);
    let n = u64::from_le_bytes(len) as usize;
    let end = 8usize.checked_add(n).filter(|&e| e <= bytes.len())
        .ok_or_else(|| malformed(path, "header length past end of file"))?;
    let header: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(&bytes[8..end])?;
    Ok((header, end))
}

/// A numeric tensor widened to f64.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}

impl Tensor {
    pub fn into_array1(self, name: &str, path: &Path) -> Result<Array1<f64>> {
        if self.shape.len() != 1 {
            return Err(malformed(path, format!("`{name}` must be 1-D, got shape {:?}", self.shape)));
        }
        Ok(Array1::from_vec(self.data))
    }

    pub fn into_array2(self, name: &str, path: &Path) -> Result<Array2<f64>> {
        match self.shape[..] {
            [r, c] => Array2::from_shape_vec((r, c), self.data)
                .map_err(|e| malformed(path, format!("`{name}`: {e}"))),
            _ => Err(malformed(path, format!("`{name}` must be 2-D, got shape {:?}", self.shape))),
        }
    }
}

fn decode(raw: &[u8], dtype: &str) -> Option<Vec<f64>> {
    let v = match dtype {
        "F32" => raw.chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
            .collect(),
        "F64" => raw.chunks_exact(8)
            .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
            .collect(),
        "I32" => raw.chunks_exact(4)
            .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
            .collect(),
        "I64" => raw.chunks_exact(8)
            .map(|b| i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f64)
            .collect(),
        "U8" | "BOOL" => raw.iter().map(|&b| b as f64).collect(),
        _ => return None,
    };
    Some(v)
}

/// All numeric tensors of a safetensors file, plus its `__metadata__`.
///
/// Fails with [`RsaError::Format`] on a dtype other than F32, F64, I32, I64,
/// U8 or BOOL, and on offsets or shapes that do not fit the file.
pub fn read_tensors(path: &Path) -> Result<(HashMap<String, Tensor>, HashMap<String, String>)> {
    let bytes = read_bytes(path)?;
    let (header, data_start) = parse_header(&bytes, path)?;

    let mut tensors = HashMap::new();
    let mut metadata = HashMap::new();
    for (key, val) in &header {
        if key == "__metadata__" {
            if let Some(map) = val.as_object() {
                for (k, v) in map {
                    if let Some(s) = v.as_str() {
                        metadata.insert(k.clone(), s.to_string());
                    }
                }
            }
            continue;
        }
        let dtype = val["dtype"].as_str().ok_or_else(|| malformed(path, format!("`{key}`: no dtype")))?;
        let offsets: Vec<usize> = val["data_offsets"]
            .as_array()
            .map(|a| a.iter().filter_map(|v| v.as_u64()).map(|v| v as usize).collect())
            .unwrap_or_default();
        let shape: Vec<usize> = val["shape"]
            .as_array()
            .ok_or_else(|| malformed(path, format!("`{key}`: no shape")))?
            .iter()
            .map(|v| v.as_u64().map(|v| v as usize))
            .collect::<Option<_>>()
            .ok_or_else(|| malformed(path, format!("`{key}`: bad shape")))?;
        let [s, e] = offsets[..] else {
            return Err(malformed(path, format!("`{key}`: bad data_offsets")));
        };
        let range = data_start
            .checked_add(s)
            .zip(data_start.checked_add(e))
            .ok_or_else(|| malformed(path, format!("`{key}`: data_offsets overflow")))?;
        let raw = bytes
            .get(range.0..range.1)
            .ok_or_else(|| malformed(path, format!("`{key}`: data past end of file")))?;
        let data = decode(raw, dtype)
            .ok_or_else(|| malformed(path, format!("`{key}`: unsupported dtype {dtype}")))?;
        let numel = shape
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .ok_or_else(|| malformed(path, format!("`{key}`: shape {shape:?} overflows")))?;
        if data.len() != numel {
            return Err(malformed(path, format!("`{key}`: {} values for shape {shape:?}", data.len())));
        }
        tensors.insert(key.clone(), Tensor { shape, data });
    }
    Ok((tensors, metadata))
}

// ── Generic safetensors builder ───────────────────────────────────────────────

/// Simple safetensors file writer that handles F32, F64, and I32 tensors.
///
/// Usage:
/// ```rust,no_run
/// use odorsa::io::StWriter;
/// use std::path::Path;
/// let mut w = StWriter::new();
/// w.add_f64("signal", &[1.0f64, 2.0, 3.0], &[1, 3]);
/// w.add_metadata("note", "three samples");
/// w.write(Path::new("/tmp/out.safetensors")).unwrap();
/// ```
#[derive(Default)]
pub struct StWriter {
    entries: Vec<(String, Vec<u8>, &'static str, Vec<usize>)>,
    metadata: serde_json::Map<String, serde_json::Value>,
}

impl StWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_f32(&mut self, name: &str, data: &[f32], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F32", shape.to_vec()));
    }

    pub fn add_f64(&mut self, name: &str, data: &[f64], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F64", shape.to_vec()));
    }

    /// Any-dimensional f64 array, written in logical (row-major) order.
    pub fn add_array<D: ndarray::Dimension>(&mut self, name: &str, arr: &ndarray::Array<f64, D>) {
        let data: Vec<f64> = arr.iter().copied().collect();
        self.add_f64(name, &data, arr.shape());
    }

    pub fn add_i32(&mut self, name: &str, data: &[i32], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "I32", shape.to_vec()));
    }

    pub fn add_metadata(&mut self, key: &str, value: impl Into<String>) {
        self.metadata.insert(key.to_string(), serde_json::Value::String(value.into()));
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        use std::io::Write;
        let mut header_map = serde_json::Map::new();
        if !self.metadata.is_empty() {
            header_map.insert("__metadata__".into(), serde_json::Value::Object(self.metadata.clone()));
        }
        let mut offset: usize = 0;
        for (name, data, dtype, shape) in &self.entries {
            header_map.insert(name.clone(), serde_json::json!({
                "dtype": dtype,
                "shape": shape,
                "data_offsets": [offset, offset + data.len()],
            }));
            offset += data.len();
        }
        let hdr_bytes = serde_json::to_vec(&header_map)?;
        let pad = (8 - hdr_bytes.len() % 8) % 8;
        let padded: Vec<u8> = hdr_bytes.into_iter()
            .chain(std::iter::repeat(b' ').take(pad))
            .collect();

        let io_err = |source| RsaError::Io { path: path.to_path_buf(), source };
        let mut f = std::fs::File::create(path).map_err(io_err)?;
        f.write_all(&(padded.len() as u64).to_le_bytes()).map_err(io_err)?;
        f.write_all(&padded).map_err(io_err)?;
        for (_, data, _, _) in &self.entries {
            f.write_all(data).map_err(io_err)?;
        }
        Ok(())
    }
}

// ── Inputs ────────────────────────────────────────────────────────────────────

/// Stimulus labels from a stim-list JSON file.
///
/// Accepts `{"stim_list_flatstr": [...]}` or a bare JSON array of strings.
pub fn load_stim_list(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .map_err(|source| RsaError::Io { path: path.to_path_buf(), source })?;
    let value: serde_json::Value = serde_json::from_str(&text)?;
    let list = match &value {
        serde_json::Value::Array(_) => &value,
        serde_json::Value::Object(map) => map
            .get("stim_list_flatstr")
            .ok_or_else(|| malformed(path, "missing 'stim_list_flatstr' key"))?,
        _ => return Err(malformed(path, "expected an object or an array")),
    };
    Ok(serde_json::from_value(list.clone())?)
}

/// One imaging acquisition, loaded and checked.
#[derive(Debug, Clone)]
pub struct Recording {
    pub signal: SignalMatrix,
    pub onsets: Vec<f64>,
    pub stim_list: Vec<String>,
    /// Per-cell classifier output, when the file carries one.
    pub iscell: Option<Array1<f64>>,
    pub source: PathBuf,
}

impl Recording {
    pub fn load(signal_path: &Path, stim_list_path: &Path) -> Result<Self> {
        let (mut tensors, _) = read_tensors(signal_path)?;
        let mut take = |key: &str| {
            tensors
                .remove(key)
                .ok_or_else(|| malformed(signal_path, format!("missing '{key}' tensor")))
        };
        let data = take("F")?.into_array2("F", signal_path)?;
        let timestamps = take("timestamps")?.into_array1("timestamps", signal_path)?;
        let onsets = take("onsets")?.into_array1("onsets", signal_path)?.to_vec();
        let iscell = match take("iscell") {
            Ok(t) => Some(t.into_array1("iscell", signal_path)?),
            Err(_) => None,
        };

        let stim_list = load_stim_list(stim_list_path)?;
        if stim_list.len() != onsets.len() {
            return Err(RsaError::mismatch("stimulus labels vs onsets", onsets.len(), stim_list.len()));
        }
        Ok(Self {
            signal: SignalMatrix::new(data, timestamps)?,
            onsets,
            stim_list,
            iscell,
            source: signal_path.to_path_buf(),
        })
    }
}

// ── Outputs ───────────────────────────────────────────────────────────────────

fn add_coords(w: &mut StWriter, prefix: &str, coords: &TrialCoords) {
    for &f in &coords.fields {
        let json = coords.index.field(f).to_json();
        w.add_metadata(&format!("{prefix}{}", f.name()), json.to_string());
    }
}

fn add_axis(w: &mut StWriter, axis: &AxisCoords) {
    add_coords(w, axis.side.prefix(), &axis.coords);
}

fn add_baseline(w: &mut StWriter, params: &BaselineParams) -> Result<()> {
    w.add_metadata("baseline", serde_json::to_string(params)?);
    Ok(())
}

/// Write a trial tensor: `trials` [E, C, R], `time` [R], `onsets` [E], `cell_ids` [C].
pub fn write_trials(path: &Path, trials: &TrialTensor, baseline: Option<&BaselineParams>) -> Result<()> {
    let mut w = StWriter::new();
    w.add_array("trials", &trials.data);
    w.add_array("time", &trials.time);
    w.add_f64("onsets", &trials.onsets, &[trials.onsets.len()]);
    let ids: Vec<i32> = trials.cell_ids.iter().map(|&i| i as i32).collect();
    w.add_i32("cell_ids", &ids, &[ids.len()]);
    add_coords(&mut w, "", &trials.coords);
    if let Some(p) = baseline {
        add_baseline(&mut w, p)?;
    }
    w.write(path)
}

/// Write response vectors: `respvec` [E, C], `cell_ids` [C].
pub fn write_respvec(path: &Path, resp: &ResponseVectors) -> Result<()> {
    let mut w = StWriter::new();
    w.add_array("respvec", &resp.data);
    let ids: Vec<i32> = resp.cell_ids.iter().map(|&i| i as i32).collect();
    w.add_i32("cell_ids", &ids, &[ids.len()]);
    add_coords(&mut w, "", &resp.coords);
    if let Some(p) = &resp.peak {
        w.add_metadata("respvec", serde_json::to_string(p)?);
    }
    w.write(path)
}

/// Write an RDM: `rdm` [B, N, N] and, when per-timepoint, `time` [B].
pub fn write_rdm(path: &Path, rdm: &Rdm) -> Result<()> {
    let mut w = StWriter::new();
    w.add_array("rdm", &rdm.data);
    if let Some(t) = &rdm.time {
        w.add_array("time", t);
    }
    add_axis(&mut w, &rdm.row);
    add_axis(&mut w, &rdm.col);
    w.add_metadata("distance_metric", rdm.metric.name());
    if let Some(p) = &rdm.baseline {
        add_baseline(&mut w, p)?;
    }
    if let Some(p) = &rdm.peak {
        w.add_metadata("respvec", serde_json::to_string(p)?);
    }
    w.write(path)
}
