use std::error::Error;
use std::path::PathBuf;

use clap::Args;

use gridrun_index::index::{DuplicatePolicy, ResultIndex};
use gridrun_index::summary::write_summary;

#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Collection root whose index receives the merge.
    #[arg(long)]
    pub root: PathBuf,
    /// Collection root whose index is folded in.
    #[arg(long)]
    pub other: PathBuf,
    /// Replace colliding keys instead of rejecting the merge.
    #[arg(long)]
    pub overwrite: bool,
}

pub fn run(args: &MergeArgs) -> Result<(), Box<dyn Error>> {
    let mut index = ResultIndex::load(&args.root)?;
    let other = ResultIndex::load(&args.other)?;
    let policy = if args.overwrite {
        DuplicatePolicy::Overwrite
    } else {
        DuplicatePolicy::Reject
    };
    let before = index.len();
    index.merge(&other, policy)?;
    index.persist()?;
    write_summary(&index)?;
    println!(
        "merged {} records from {} ({} new)",
        other.len(),
        args.other.display(),
        index.len() - before
    );
    Ok(())
}
