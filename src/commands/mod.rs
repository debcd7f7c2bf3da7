mod common;
mod reset;
mod scan;

pub use reset::{ResetArgs, reset_ledger};
pub use scan::{ScanArgs, scan_packages};
