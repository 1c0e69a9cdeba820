use std::error::Error;
use std::path::PathBuf;

use clap::Args;

use gridrun_index::export::export_csv;
use gridrun_index::index::ResultIndex;

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Collection root holding the index.
    #[arg(long)]
    pub root: PathBuf,
    /// Output CSV file.
    #[arg(long)]
    pub out: PathBuf,
}

pub fn run(args: &ExportArgs) -> Result<(), Box<dyn Error>> {
    let index = ResultIndex::load(&args.root)?;
    export_csv(&index, &args.out)?;
    println!("exported {} records to {}", index.len(), args.out.display());
    Ok(())
}
