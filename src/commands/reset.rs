use crate::commands::common::{CommonArgs, init_logging};
use clap::{Parser, ValueEnum};
use embargo_sniffer::Result;
use embargo_sniffer::access::EmbargoCategory;
use embargo_sniffer::config::Config;
use embargo_sniffer::ledger::EmbargoLedger;
use embargo_sniffer::lock::RunLock;

/// Which slice of the ledger to remove
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResetCategory {
    /// Remove explicit embargo records
    Explicit,
    /// Remove implicit embargo records
    Implicit,
    /// Remove all embargo records
    All,
}

#[derive(Parser, Debug)]
pub struct ResetArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Which classification slice to remove
    #[arg(long, value_name = "CATEGORY", default_value = "all")]
    pub category: ResetCategory,
}

/// Remove recorded classifications so the next scan rebuilds them from scratch.
pub fn reset_ledger(args: &ResetArgs) -> Result<()> {
    init_logging(args.common.log_level);

    let config = Config::load(args.common.config.as_deref())?;
    let _lock = RunLock::acquire(&config.lock_path())?;

    let ledger = EmbargoLedger::open(&config.embargo_db_path())?;
    let removed = match args.category {
        ResetCategory::Explicit => ledger.delete_category(EmbargoCategory::Explicit)?,
        ResetCategory::Implicit => ledger.delete_category(EmbargoCategory::Implicit)?,
        ResetCategory::All => ledger.delete_all()?,
    };

    println!("Removed {removed} embargo record(s), ledger holds {}", ledger.count()?);
    Ok(())
}
