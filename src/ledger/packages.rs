use crate::Result;
use crate::ledger::models::PackageRecord;
use crate::ledger::schema::packages::dsl as pk;
use camino::Utf8Path;
use chrono::NaiveDateTime;
use core::cell::RefCell;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use ohno::IntoAppError;

/// Log target for `ledger`
const LOG_TARGET: &str = "    ledger";

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS packages (
        pid TEXT PRIMARY KEY NOT NULL,
        date_created TIMESTAMP NOT NULL,
        date_deactivated TIMESTAMP,
        doi TEXT
    )";

/// The locally acquired slice of the upstream package registry, used for
/// incremental processing.
pub struct PackagePool {
    conn: RefCell<SqliteConnection>,
}

impl core::fmt::Debug for PackagePool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PackagePool").finish_non_exhaustive()
    }
}

impl PackagePool {
    /// Open (creating if necessary) the package pool database at `path`.
    pub fn open(path: &Utf8Path) -> Result<Self> {
        let mut conn = SqliteConnection::establish(path.as_str())
            .into_app_err_with(|| format!("unable to open package pool at '{path}'"))?;
        conn.batch_execute(SCHEMA)
            .into_app_err_with(|| format!("unable to initialize package pool at '{path}'"))?;

        Ok(Self { conn: RefCell::new(conn) })
    }

    /// Insert a package row; returns `false` when the package was already known.
    pub fn insert(&self, record: &PackageRecord) -> Result<bool> {
        let outcome = diesel::insert_into(pk::packages)
            .values(record)
            .execute(&mut *self.conn.borrow_mut());

        match outcome {
            Ok(_) => Ok(true),
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                log::warn!(target: LOG_TARGET, "Ignoring package '{}'", record.pid);
                Ok(false)
            }
            Err(e) => Err(e).into_app_err_with(|| format!("unable to insert package '{}'", record.pid)),
        }
    }

    /// All packages, ascending by creation date, optionally only those created
    /// strictly after `from_date`.
    pub fn get_all(&self, from_date: Option<NaiveDateTime>) -> Result<Vec<PackageRecord>> {
        let query = pk::packages.order(pk::date_created.asc());
        match from_date {
            Some(from_date) => query
                .filter(pk::date_created.gt(from_date))
                .load(&mut *self.conn.borrow_mut()),
            None => query.load(&mut *self.conn.borrow_mut()),
        }
        .into_app_err("unable to query the package pool")
    }

    pub fn most_recent_create_date(&self) -> Result<Option<NaiveDateTime>> {
        pk::packages
            .select(pk::date_created)
            .order(pk::date_created.desc())
            .first(&mut *self.conn.borrow_mut())
            .optional()
            .into_app_err("unable to query the package pool")
    }

    pub fn count(&self) -> Result<i64> {
        pk::packages
            .count()
            .get_result(&mut *self.conn.borrow_mut())
            .into_app_err("unable to count the package pool")
    }
}
