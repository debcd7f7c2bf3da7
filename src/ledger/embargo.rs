use crate::Result;
use crate::access::EmbargoCategory;
use crate::ledger::models::EmbargoRecord;
use crate::ledger::schema::embargoed_resources::dsl as er;
use crate::package_id::PackageId;
use camino::Utf8Path;
use chrono::{NaiveDateTime, Utc};
use core::cell::RefCell;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use ohno::{IntoAppError, app_err};
use std::collections::BTreeSet;

/// Log target for `ledger`
const LOG_TARGET: &str = "    ledger";

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS embargoed_resources (
        rid TEXT PRIMARY KEY NOT NULL,
        pid TEXT NOT NULL,
        category TEXT NOT NULL,
        allows_authenticated BOOLEAN NOT NULL,
        date_ephemeral TIMESTAMP,
        age_days INTEGER
    )";

/// The embargo ledger: one record per embargoed resource, deduplicated by
/// resource identifier.
///
/// Classifications are re-derived from scratch each processing pass; the ledger
/// never mutates a classification in place except for the ephemeral-marker
/// bookkeeping.
pub struct EmbargoLedger {
    conn: RefCell<SqliteConnection>,
}

impl core::fmt::Debug for EmbargoLedger {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EmbargoLedger").finish_non_exhaustive()
    }
}

impl EmbargoLedger {
    /// Open (creating if necessary) the ledger database at `path`.
    pub fn open(path: &Utf8Path) -> Result<Self> {
        let mut conn = SqliteConnection::establish(path.as_str())
            .into_app_err_with(|| format!("unable to open embargo ledger at '{path}'"))?;
        conn.batch_execute(SCHEMA)
            .into_app_err_with(|| format!("unable to initialize embargo ledger at '{path}'"))?;

        Ok(Self { conn: RefCell::new(conn) })
    }

    /// Insert a classification.
    ///
    /// Returns `false` when a record for the resource already exists; the
    /// duplicate is logged and swallowed, never fatal. Callers must not assume
    /// the insert succeeded.
    pub fn insert(&self, rid: &str, pid: &PackageId, category: EmbargoCategory, allows_authenticated: bool) -> Result<bool> {
        let record = EmbargoRecord {
            rid: rid.to_owned(),
            pid: pid.to_string(),
            category: category.as_str().to_owned(),
            allows_authenticated,
            date_ephemeral: None,
            age_days: None,
        };

        let outcome = diesel::insert_into(er::embargoed_resources)
            .values(&record)
            .execute(&mut *self.conn.borrow_mut());

        match outcome {
            Ok(_) => Ok(true),
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                log::warn!(target: LOG_TARGET, "Ignoring resource '{rid}'");
                Ok(false)
            }
            Err(e) => Err(e).into_app_err_with(|| format!("unable to insert embargo record for '{rid}'")),
        }
    }

    pub fn get_by_resource_id(&self, rid: &str) -> Result<Option<EmbargoRecord>> {
        er::embargoed_resources
            .filter(er::rid.eq(rid))
            .first(&mut *self.conn.borrow_mut())
            .optional()
            .into_app_err_with(|| format!("unable to query embargo record for '{rid}'"))
    }

    pub fn get_by_package_id(&self, pid: &PackageId) -> Result<Vec<EmbargoRecord>> {
        er::embargoed_resources
            .filter(er::pid.eq(pid.to_string()))
            .load(&mut *self.conn.borrow_mut())
            .into_app_err_with(|| format!("unable to query embargo records for {pid}"))
    }

    pub fn get_by_category(&self, category: EmbargoCategory) -> Result<Vec<EmbargoRecord>> {
        er::embargoed_resources
            .filter(er::category.eq(category.as_str()))
            .load(&mut *self.conn.borrow_mut())
            .into_app_err("unable to query embargo records by category")
    }

    /// Distinct package identifiers present in the ledger, optionally limited to
    /// one category.
    pub fn get_distinct_package_ids(&self, category: Option<EmbargoCategory>) -> Result<BTreeSet<PackageId>> {
        let pids: Vec<String> = match category {
            Some(category) => er::embargoed_resources
                .filter(er::category.eq(category.as_str()))
                .select(er::pid)
                .distinct()
                .load(&mut *self.conn.borrow_mut()),
            None => er::embargoed_resources
                .select(er::pid)
                .distinct()
                .load(&mut *self.conn.borrow_mut()),
        }
        .into_app_err("unable to query distinct package identifiers")?;

        pids.iter().map(|pid| PackageId::parse(pid)).collect()
    }

    /// Records whose resource is a package's own metadata document.
    pub fn get_package_level_embargoes(&self) -> Result<Vec<EmbargoRecord>> {
        er::embargoed_resources
            .filter(er::rid.like("%/metadata/eml/%"))
            .load(&mut *self.conn.borrow_mut())
            .into_app_err("unable to query package-level embargoes")
    }

    /// Mark a record as ephemeral, recording when the resource was created and
    /// how many days old it is now (UTC).
    pub fn update_ephemeral_marker(&self, rid: &str, observed_date: NaiveDateTime) -> Result<EmbargoRecord> {
        let age = i32::try_from((Utc::now().naive_utc() - observed_date).num_days())
            .into_app_err_with(|| format!("implausible resource age for '{rid}'"))?;

        let updated = diesel::update(er::embargoed_resources.filter(er::rid.eq(rid)))
            .set((er::date_ephemeral.eq(Some(observed_date)), er::age_days.eq(Some(age))))
            .execute(&mut *self.conn.borrow_mut())
            .into_app_err_with(|| format!("unable to mark '{rid}' ephemeral"))?;

        if updated == 0 {
            return Err(app_err!("no embargo record for '{rid}'"));
        }

        self.get_by_resource_id(rid)?
            .ok_or_else(|| app_err!("no embargo record for '{rid}'"))
    }

    pub fn count(&self) -> Result<i64> {
        er::embargoed_resources
            .count()
            .get_result(&mut *self.conn.borrow_mut())
            .into_app_err("unable to count embargo records")
    }

    pub fn delete_all(&self) -> Result<usize> {
        diesel::delete(er::embargoed_resources)
            .execute(&mut *self.conn.borrow_mut())
            .into_app_err("unable to reset the embargo ledger")
    }

    pub fn delete_category(&self, category: EmbargoCategory) -> Result<usize> {
        diesel::delete(er::embargoed_resources.filter(er::category.eq(category.as_str())))
            .execute(&mut *self.conn.borrow_mut())
            .into_app_err("unable to reset an embargo ledger category")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use chrono::Days;
    use tempfile::TempDir;

    fn temp_ledger() -> (TempDir, EmbargoLedger) {
        let dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("embargo.sqlite")).unwrap();
        let ledger = EmbargoLedger::open(&path).unwrap();
        (dir, ledger)
    }

    fn pid() -> PackageId {
        PackageId::parse("edi.512.1").unwrap()
    }

    #[test]
    fn duplicate_insert_is_swallowed() {
        let (_dir, ledger) = temp_ledger();

        assert!(ledger.insert("r1", &pid(), EmbargoCategory::Explicit, false).unwrap());
        assert!(!ledger.insert("r1", &pid(), EmbargoCategory::Implicit, true).unwrap());
        assert_eq!(ledger.count().unwrap(), 1);

        // First write wins; the duplicate changed nothing.
        let record = ledger.get_by_resource_id("r1").unwrap().unwrap();
        assert_eq!(record.embargo_category().unwrap(), EmbargoCategory::Explicit);
        assert!(!record.allows_authenticated);
    }

    #[test]
    fn ephemeral_marker_computes_age_in_days() {
        let (_dir, ledger) = temp_ledger();
        ledger.insert("r1", &pid(), EmbargoCategory::Explicit, false).unwrap();

        let observed = Utc::now().naive_utc().checked_sub_days(Days::new(10)).unwrap();
        let record = ledger.update_ephemeral_marker("r1", observed).unwrap();
        assert_eq!(record.date_ephemeral, Some(observed));
        assert_eq!(record.age_days, Some(10));
    }

    #[test]
    fn ephemeral_marker_requires_an_existing_record() {
        let (_dir, ledger) = temp_ledger();
        assert!(ledger.update_ephemeral_marker("missing", Utc::now().naive_utc()).is_err());
    }

    #[test]
    fn queries_by_package_and_category() {
        let (_dir, ledger) = temp_ledger();
        let other = PackageId::parse("knb-lter-fce.1210.3").unwrap();

        ledger.insert("r1", &pid(), EmbargoCategory::Explicit, false).unwrap();
        ledger.insert("r2", &pid(), EmbargoCategory::Implicit, true).unwrap();
        ledger.insert("r3", &other, EmbargoCategory::Implicit, false).unwrap();

        assert_eq!(ledger.get_by_package_id(&pid()).unwrap().len(), 2);
        assert_eq!(ledger.get_by_category(EmbargoCategory::Implicit).unwrap().len(), 2);

        let all = ledger.get_distinct_package_ids(None).unwrap();
        assert_eq!(all.len(), 2);

        let explicit_only = ledger.get_distinct_package_ids(Some(EmbargoCategory::Explicit)).unwrap();
        assert_eq!(explicit_only.into_iter().collect::<Vec<_>>(), vec![pid()]);
    }

    #[test]
    fn package_level_embargoes_are_metadata_resources() {
        let (_dir, ledger) = temp_ledger();

        ledger
            .insert(
                "https://pasta.lternet.edu/package/metadata/eml/edi/512/1",
                &pid(),
                EmbargoCategory::Explicit,
                false,
            )
            .unwrap();
        ledger
            .insert(
                "https://pasta.lternet.edu/package/data/eml/edi/512/1/aaa",
                &pid(),
                EmbargoCategory::Explicit,
                false,
            )
            .unwrap();

        let package_level = ledger.get_package_level_embargoes().unwrap();
        assert_eq!(package_level.len(), 1);
        assert!(package_level[0].rid.contains("/metadata/eml/"));
    }

    #[test]
    fn category_scoped_delete_leaves_other_categories() {
        let (_dir, ledger) = temp_ledger();

        ledger.insert("r1", &pid(), EmbargoCategory::Explicit, false).unwrap();
        ledger.insert("r2", &pid(), EmbargoCategory::Implicit, false).unwrap();

        assert_eq!(ledger.delete_category(EmbargoCategory::Explicit).unwrap(), 1);
        assert_eq!(ledger.count().unwrap(), 1);
        assert!(ledger.get_by_resource_id("r2").unwrap().is_some());

        assert_eq!(ledger.delete_all().unwrap(), 1);
        assert_eq!(ledger.count().unwrap(), 0);
    }
}
