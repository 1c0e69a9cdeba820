use std::error::Error;
use std::path::PathBuf;

use clap::Args;

use gridrun_index::index::ResultIndex;

use super::parse_params;

#[derive(Args, Debug)]
pub struct GetArgs {
    /// Collection root holding the index.
    #[arg(long)]
    pub root: PathBuf,
    /// Parameter of the configuration, repeatable.
    #[arg(long = "param", value_name = "NAME=VALUE")]
    pub param: Vec<String>,
    /// Phase discriminator of the configuration.
    #[arg(long)]
    pub phase: Option<String>,
}

pub fn run(args: &GetArgs) -> Result<(), Box<dyn Error>> {
    let index = ResultIndex::load(&args.root)?;
    let params = parse_params(&args.param)?;
    let path = index.get_by_params(&params, args.phase.as_deref())?;
    println!("{}", path.display());
    Ok(())
}
