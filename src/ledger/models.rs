use crate::Result;
use crate::access::EmbargoCategory;
use crate::ledger::schema::{embargoed_resources, packages};
use chrono::NaiveDateTime;
use diesel::prelude::*;

/// One persisted embargo finding, keyed by resource identifier.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Insertable)]
#[diesel(table_name = embargoed_resources)]
pub struct EmbargoRecord {
    pub rid: String,
    pub pid: String,
    pub category: String,
    pub allows_authenticated: bool,
    /// Set when the upstream deny rule has disappeared while the resource's own
    /// metadata still lacks confirmation; pending reconciliation.
    pub date_ephemeral: Option<NaiveDateTime>,
    /// Days since the resource was created, computed when the ephemeral marker
    /// is set. UTC throughout, so re-runs agree on the arithmetic.
    pub age_days: Option<i32>,
}

impl EmbargoRecord {
    pub fn embargo_category(&self) -> Result<EmbargoCategory> {
        EmbargoCategory::parse(&self.category)
    }
}

/// One locally acquired package row.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Insertable)]
#[diesel(table_name = packages)]
pub struct PackageRecord {
    pub pid: String,
    pub date_created: NaiveDateTime,
    pub date_deactivated: Option<NaiveDateTime>,
    pub doi: Option<String>,
}
