//! Stimulus indexing.
//!
//! Tags each trial of an ordered stimulus list with occurrence and run
//! counters.  For `AAABBBCCCAAABBB`:
//!
//! ```text
//!       stim = AAA BBB CCC AAA BBB
//!   stim_occ = 012 012 012 345 345
//!    run_idx = 000 111 222 333 444
//! idx_in_run = 012 012 012 012 012
//!    run_occ = 000 000 000 111 111
//! ```
//!
//! `stim_occ` counts the raw label wherever it appears; `run_occ` counts
//! runs carrying the label.  The two are kept distinct.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use crate::error::{Result, RsaError};

/// Zero-based running count of each value: `[1, 1, 2, 2, 2, 3]` → `[0, 1, 0, 1, 2, 0]`.
pub fn occurrence<T: Eq + Hash>(x: &[T]) -> Vec<usize> {
    let mut counter: HashMap<&T, usize> = HashMap::new();
    x.iter()
        .map(|item| {
            let c = counter.entry(item).or_insert(0);
            let occ = *c;
            *c += 1;
            occ
        })
        .collect()
}

/// Values and lengths of maximal runs: `[3, 3, 5]` → `([3, 5], [2, 1])`.
pub fn find_runs<T: PartialEq + Clone>(x: &[T]) -> (Vec<T>, Vec<usize>) {
    let mut values: Vec<T> = Vec::new();
    let mut lengths: Vec<usize> = Vec::new();
    for item in x {
        match values.last() {
            Some(last) if last == item => {
                if let Some(n) = lengths.last_mut() {
                    *n += 1;
                }
            }
            _ => {
                values.push(item.clone());
                lengths.push(1);
            }
        }
    }
    (values, lengths)
}

/// One per-trial index field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StimField {
    Stim,
    StimOcc,
    RunIdx,
    IdxInRun,
    RunOcc,
    TrialIdx,
}

impl StimField {
    pub const ALL: [StimField; 6] = [
        StimField::Stim,
        StimField::StimOcc,
        StimField::RunIdx,
        StimField::IdxInRun,
        StimField::RunOcc,
        StimField::TrialIdx,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StimField::Stim => "stim",
            StimField::StimOcc => "stim_occ",
            StimField::RunIdx => "run_idx",
            StimField::IdxInRun => "idx_in_run",
            StimField::RunOcc => "run_occ",
            StimField::TrialIdx => "trial_idx",
        }
    }

    pub fn parse(name: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.name() == name)
            .ok_or_else(|| RsaError::invalid("stim_fields", format!("unknown field `{name}`")))
    }

    /// Fields kept when the caller does not ask for a subset.
    pub fn default_set() -> Vec<StimField> {
        vec![
            StimField::Stim,
            StimField::StimOcc,
            StimField::RunIdx,
            StimField::IdxInRun,
            StimField::RunOcc,
        ]
    }
}

impl fmt::Display for StimField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Borrowed view of one field's values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValues<'a> {
    Labels(&'a [String]),
    Counts(&'a [usize]),
}

impl FieldValues<'_> {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValues::Labels(v) => serde_json::json!(v),
            FieldValues::Counts(v) => serde_json::json!(v),
        }
    }

    /// Value at `i` rendered as text.
    pub fn display(&self, i: usize) -> String {
        match self {
            FieldValues::Labels(v) => v[i].clone(),
            FieldValues::Counts(v) => v[i].to_string(),
        }
    }
}

/// Per-trial stimulus identity: parallel sequences, one entry per trial.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StimulusIndex {
    pub stim: Vec<String>,
    pub stim_occ: Vec<usize>,
    pub run_idx: Vec<usize>,
    pub idx_in_run: Vec<usize>,
    pub run_occ: Vec<usize>,
    pub trial_idx: Vec<usize>,
}

impl StimulusIndex {
    /// Index an ordered stimulus list in a single pass over its runs.
    pub fn new<S: AsRef<str>>(labels: &[S]) -> Self {
        let stim: Vec<String> = labels.iter().map(|s| s.as_ref().to_string()).collect();
        let (run_values, run_lengths) = find_runs(&stim);
        let run_value_occ = occurrence(&run_values);

        let n = stim.len();
        let mut run_idx = Vec::with_capacity(n);
        let mut idx_in_run = Vec::with_capacity(n);
        let mut run_occ = Vec::with_capacity(n);
        for (r, (&len, &occ)) in run_lengths.iter().zip(&run_value_occ).enumerate() {
            for j in 0..len {
                run_idx.push(r);
                idx_in_run.push(j);
                run_occ.push(occ);
            }
        }

        Self {
            stim_occ: occurrence(&stim),
            stim,
            run_idx,
            idx_in_run,
            run_occ,
            trial_idx: (0..n).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.stim.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stim.is_empty()
    }

    pub fn field(&self, field: StimField) -> FieldValues<'_> {
        match field {
            StimField::Stim => FieldValues::Labels(&self.stim),
            StimField::StimOcc => FieldValues::Counts(&self.stim_occ),
            StimField::RunIdx => FieldValues::Counts(&self.run_idx),
            StimField::IdxInRun => FieldValues::Counts(&self.idx_in_run),
            StimField::RunOcc => FieldValues::Counts(&self.run_occ),
            StimField::TrialIdx => FieldValues::Counts(&self.trial_idx),
        }
    }

    /// Rows `order` of every field, values carried over unchanged.
    pub fn take(&self, order: &[usize]) -> Self {
        let pick_s = |v: &[String]| order.iter().map(|&i| v[i].clone()).collect();
        let pick = |v: &[usize]| order.iter().map(|&i| v[i]).collect();
        Self {
            stim: pick_s(&self.stim),
            stim_occ: pick(&self.stim_occ),
            run_idx: pick(&self.run_idx),
            idx_in_run: pick(&self.idx_in_run),
            run_occ: pick(&self.run_occ),
            trial_idx: pick(&self.trial_idx),
        }
    }
}

/// Label blocks of a stimulus list, for axis ticks.
///
/// `AAABBBCCC` → labels `[A, B, C]`, lengths `[3, 3, 3]`,
/// starts `[0, 3, 6]`, ends `[3, 6, 9]` (exclusive).
#[derive(Debug, Clone, PartialEq)]
pub struct RunLimits {
    pub labels: Vec<String>,
    pub lengths: Vec<usize>,
    pub starts: Vec<usize>,
    pub ends: Vec<usize>,
}

impl RunLimits {
    /// Midpoint of each block.
    pub fn tick_locs(&self) -> Vec<f64> {
        self.starts
            .iter()
            .zip(&self.ends)
            .map(|(&s, &e)| (s + e) as f64 / 2.0)
            .collect()
    }
}

pub fn run_limits<S: AsRef<str>>(labels: &[S]) -> RunLimits {
    let owned: Vec<&str> = labels.iter().map(|s| s.as_ref()).collect();
    let (values, lengths) = find_runs(&owned);
    let mut ends = Vec::with_capacity(lengths.len());
    let mut acc = 0;
    for &len in &lengths {
        acc += len;
        ends.push(acc);
    }
    let starts = ends.iter().zip(&lengths).map(|(&e, &l)| e - l).collect();
    RunLimits {
        labels: values.into_iter().map(str::to_string).collect(),
        lengths,
        starts,
        ends,
    }
}

/// Odor part of a `"<odor> @ <log10 conc>"` label: `"ep @ -3.0"` → `"ep"`.
pub fn odor_name(label: &str) -> &str {
    label.split(" @ ").next().unwrap_or(label)
}

// ── Label normalisation ───────────────────────────────────────────────────────

/// Split `"<odor> @ <conc>"` into its two halves, concentration unparsed.
fn split_label(label: &str) -> Result<(&str, &str)> {
    label.split_once(" @ ").ok_or_else(|| {
        RsaError::invalid("stim_list", format!("label `{label}` is not of the form `<odor> @ <conc>`"))
    })
}

fn parse_conc(label: &str, conc: &str) -> Result<f64> {
    conc.trim().parse::<f64>().map_err(|_| {
        RsaError::invalid("stim_list", format!("label `{label}` has no numeric concentration"))
    })
}

/// Odor names and log10 concentrations: `"1-6ol @ -3"` → `("1-6ol", -3.0)`.
pub fn split_stim_list<S: AsRef<str>>(labels: &[S]) -> Result<(Vec<String>, Vec<f64>)> {
    let mut odors = Vec::with_capacity(labels.len());
    let mut concs = Vec::with_capacity(labels.len());
    for label in labels {
        let label = label.as_ref();
        let (odor, conc) = split_label(label)?;
        odors.push(odor.to_string());
        concs.push(parse_conc(label, conc)?);
    }
    Ok((odors, concs))
}

/// Rename odor abbreviations listed in `replace`; the concentration text is kept as is.
pub fn replace_abbrevs<S: AsRef<str>>(labels: &[S], replace: &HashMap<String, String>) -> Result<Vec<String>> {
    labels
        .iter()
        .map(|label| {
            let (odor, conc) = split_label(label.as_ref())?;
            let odor = replace.get(odor).map(String::as_str).unwrap_or(odor);
            Ok(format!("{odor} @ {conc}"))
        })
        .collect()
}

/// Rewrite every concentration as a float: `"1-6ol @ -3"` → `"1-6ol @ -3.0"`.
pub fn conc_to_float<S: AsRef<str>>(labels: &[S]) -> Result<Vec<String>> {
    labels
        .iter()
        .map(|label| {
            let label = label.as_ref();
            let (odor, conc) = split_label(label)?;
            Ok(format!("{odor} @ {:?}", parse_conc(label, conc)?))
        })
        .collect()
}

/// How raw stimulus labels are normalised before indexing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StimFix {
    /// Odor abbreviations to rename, e.g. `{"1-6ol": "6ol"}`.
    pub abbrev_to_replace: HashMap<String, String>,
    /// Write concentrations as floats so `-3` and `-3.0` compare equal.
    pub conc_as_float: bool,
}

/// Apply `fix` to `labels`: abbreviations first, then concentrations.
pub fn fix_stim<S: AsRef<str>>(labels: &[S], fix: &StimFix) -> Result<Vec<String>> {
    let mut out: Vec<String> = labels.iter().map(|s| s.as_ref().to_string()).collect();
    if !fix.abbrev_to_replace.is_empty() {
        out = replace_abbrevs(&out, &fix.abbrev_to_replace)?;
    }
    if fix.conc_as_float {
        out = conc_to_float(&out)?;
    }
    Ok(out)
}
