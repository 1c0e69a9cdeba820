use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Args;

use gridrun_core::plan::{expand_plan, SweepPlan};
use gridrun_index::index::{DuplicatePolicy, IndexMeta, ResultIndex, INDEX_FILE};
use gridrun_orc::orchestrator::Orchestrator;
use gridrun_orc::settings::Settings;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// YAML sweep plan describing the parameter grid.
    #[arg(long)]
    pub plan: PathBuf,
    /// Collection root receiving entry directories and the index.
    #[arg(long)]
    pub root: PathBuf,
    /// TOML settings selecting and configuring the backend.
    #[arg(long)]
    pub settings: PathBuf,
    /// Master seed for sampling strategies.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
    /// Replace already-indexed configurations instead of skipping them.
    #[arg(long)]
    pub overwrite: bool,
}

pub fn run(args: &RunArgs) -> Result<(), Box<dyn Error>> {
    let plan_text = fs::read_to_string(&args.plan)?;
    let plan: SweepPlan = serde_yaml::from_str(&plan_text)?;
    let collection = expand_plan(&plan, args.seed)?;
    let settings = Settings::load(&args.settings)?;
    let mut index = if args.root.join(INDEX_FILE).exists() {
        ResultIndex::load(&args.root)?
    } else {
        ResultIndex::create(&args.root, IndexMeta::default())
    };
    let policy = if args.overwrite {
        DuplicatePolicy::Overwrite
    } else {
        DuplicatePolicy::Reject
    };
    let orchestrator = Orchestrator::new(&args.root, settings.backend()?)
        .with_batch_size(settings.batch_size())
        .with_policy(policy)
        .with_options(settings.run_options());
    let report = orchestrator.run(&collection, &mut index)?;
    println!(
        "{}: {} indexed, {} failed, {} skipped-duplicate",
        plan.name,
        report.indexed(),
        report.failed(),
        report.skipped()
    );
    Ok(())
}
