//! Local persistence: the embargo ledger and the package pool, both SQLite.

mod embargo;
mod models;
mod packages;
mod schema;

pub use embargo::EmbargoLedger;
pub use models::{EmbargoRecord, PackageRecord};
pub use packages::PackagePool;
