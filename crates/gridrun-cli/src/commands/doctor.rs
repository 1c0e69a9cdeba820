use std::error::Error;
use std::path::PathBuf;

use clap::Args;

use gridrun_index::audit::audit;
use gridrun_index::index::ResultIndex;

#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Collection root holding the index.
    #[arg(long)]
    pub root: PathBuf,
}

pub fn run(args: &DoctorArgs) -> Result<(), Box<dyn Error>> {
    let index = ResultIndex::load(&args.root)?;
    let report = audit(&index)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    if report.is_clean() {
        println!("index is consistent with storage");
    }
    Ok(())
}
