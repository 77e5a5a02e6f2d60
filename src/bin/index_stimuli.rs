//! index_stimuli: print the per-trial stimulus index of a stim-list file.
//!
//! ```text
//! trial  stim        stim_occ  run_idx  idx_in_run  run_occ
//!     0  ep @ -3.0          0        0           0        0
//! ```
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use odorsa::{load_stim_list, run_limits, StimField, StimulusIndex};

#[derive(Parser, Debug)]
#[command(name = "index_stimuli")]
struct Args {
    /// stim_list.json
    #[arg(long)]
    stim_list: PathBuf,

    /// Fields to print (comma-separated)
    #[arg(long, default_value = "stim,stim_occ,run_idx,idx_in_run,run_occ")]
    fields: String,

    /// Print run blocks (label, start, end) instead of the per-trial table
    #[arg(long, default_value_t = false)]
    runs: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let labels = load_stim_list(&args.stim_list)
        .with_context(|| format!("reading {}", args.stim_list.display()))?;

    if args.runs {
        let lim = run_limits(&labels);
        println!("{:<20} {:>6} {:>6} {:>6}", "label", "start", "end", "len");
        for i in 0..lim.labels.len() {
            println!(
                "{:<20} {:>6} {:>6} {:>6}",
                lim.labels[i], lim.starts[i], lim.ends[i], lim.lengths[i]
            );
        }
        return Ok(());
    }

    let fields: Vec<StimField> = args
        .fields
        .split(',')
        .filter(|s| !s.is_empty())
        .map(|s| StimField::parse(s.trim()))
        .collect::<odorsa::Result<_>>()?;
    let index = StimulusIndex::new(&labels);

    let width = labels.iter().map(String::len).max().unwrap_or(4).max(4);
    print!("{:>5}", "trial");
    for f in &fields {
        match f {
            StimField::Stim => print!("  {:<width$}", f.name()),
            _ => print!("  {:>10}", f.name()),
        }
    }
    println!();
    for i in 0..index.len() {
        print!("{i:>5}");
        for &f in &fields {
            let v = index.field(f).display(i);
            match f {
                StimField::Stim => print!("  {v:<width$}"),
                _ => print!("  {v:>10}"),
            }
        }
        println!();
    }
    Ok(())
}
