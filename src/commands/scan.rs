use crate::commands::common::{Common, CommonArgs};
use clap::Parser;
use embargo_sniffer::Result;
use embargo_sniffer::ledger::{EmbargoLedger, PackagePool};
use embargo_sniffer::lock::RunLock;
use embargo_sniffer::pool::{EmbargoPool, acquire_new_packages};

/// Log target for `scan`
const LOG_TARGET: &str = "      scan";

#[derive(Parser, Debug)]
pub struct ScanArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Maximum number of packages retrieved per registry pull
    #[arg(long, short = 'l', value_name = "COUNT", default_value_t = 100)]
    pub limit: u32,

    /// Acquire new packages only, skipping the embargo passes
    #[arg(long)]
    pub packages_only: bool,
}

/// Pull new packages from the registry, then run the embargo passes.
pub fn scan_packages(args: &ScanArgs) -> Result<()> {
    let common = Common::new(&args.common)?;
    let config = &common.config;

    let _lock = RunLock::acquire(&config.lock_path())?;

    let registry = common.registry()?;
    let packages = PackagePool::open(&config.package_db_path())?;

    loop {
        let count = acquire_new_packages(&packages, &registry, config.start_date, Some(args.limit))?;
        log::info!(target: LOG_TARGET, "Retrieved {count} new package(s) from the registry");
        if count == 0 {
            break;
        }
    }

    println!("Package pool holds {} package(s)", packages.count()?);

    if args.packages_only {
        return Ok(());
    }

    let fetcher = common.fetcher()?;
    let ledger = EmbargoLedger::open(&config.embargo_db_path())?;
    let pool = EmbargoPool::new(&ledger, &packages, &fetcher, &registry, config);

    let count = pool.add_new_embargoed_resources()?;
    println!("Recorded {count} new embargoed resource(s), ledger holds {}", ledger.count()?);

    Ok(())
}
