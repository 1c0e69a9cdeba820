use std::error::Error;
use std::path::PathBuf;

use clap::Args;

use gridrun_index::index::ResultIndex;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Collection root holding the index.
    #[arg(long)]
    pub root: PathBuf,
}

pub fn run(args: &ListArgs) -> Result<(), Box<dyn Error>> {
    let index = ResultIndex::load(&args.root)?;
    for (params, path) in index.iter() {
        println!("{params} -> {}", path.display());
    }
    Ok(())
}
