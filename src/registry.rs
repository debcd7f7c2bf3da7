//! Query surface of the upstream data-package registry.
//!
//! The registry is the authoritative record of resources and their access-matrix
//! rows. The traits here are what the classifier and the embargo pool consume;
//! `PastaRegistry` implements them against the registry's PostgreSQL database.

use crate::Result;
use crate::package_id::PackageId;
use chrono::NaiveDateTime;
use core::cell::RefCell;
use diesel::prelude::*;
use diesel::sql_types::{Nullable, Text, Timestamp};
use ohno::IntoAppError;
use std::collections::HashSet;

/// Log target for `registry`
const LOG_TARGET: &str = "  registry";

/// Resources under the retired scopes are never considered for embargo.
const SCOPE_EXCLUSIONS: &str = "resource_id NOT LIKE '%/ecotrends/%' \
     AND resource_id NOT LIKE '%/lter-landsat/%' \
     AND resource_id NOT LIKE '%/lter-landsat-ledaps/%'";

const SQL_ENTITY_LIST: &str = "SELECT resource_id FROM datapackagemanager.resource_registry \
     WHERE package_id = $1 AND resource_type = 'data'";

const SQL_ACCESS_RULES: &str = "SELECT principal, access_type, permission \
     FROM datapackagemanager.access_matrix WHERE resource_id = $1";

const SQL_RESOURCE_CREATE_DATE: &str = "SELECT date_created FROM datapackagemanager.resource_registry \
     WHERE resource_id = $1";

const SQL_NEWEST_PACKAGES: &str = "SELECT DISTINCT ON (scope, identifier) package_id \
     FROM datapackagemanager.resource_registry WHERE resource_type = 'dataPackage' \
     ORDER BY scope, identifier, revision DESC";

const SQL_PACKAGES_CREATED_AFTER: &str = "SELECT package_id, date_created, date_deactivated, doi \
     FROM datapackagemanager.resource_registry \
     WHERE resource_type = 'dataPackage' AND date_created > $1 \
     ORDER BY date_created ASC";

/// One row of the registry's access matrix.
#[derive(Debug, Clone, PartialEq, Eq, QueryableByName)]
pub struct AccessRuleRow {
    #[diesel(sql_type = Text)]
    pub principal: String,
    #[diesel(sql_type = Text)]
    pub access_type: String,
    #[diesel(sql_type = Text)]
    pub permission: String,
}

/// One data-package row of the registry, for incremental acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRow {
    pub package_id: PackageId,
    pub date_created: NaiveDateTime,
    pub date_deactivated: Option<NaiveDateTime>,
    pub doi: Option<String>,
}

/// Read access to the registry's resource and access-rule records.
pub trait RegistryQuery {
    /// Resource identifiers of a package's data entities.
    fn list_entity_resource_ids(&self, pid: &PackageId) -> Result<Vec<String>>;

    /// Access-matrix rows attached to one resource.
    fn list_access_rules(&self, rid: &str) -> Result<Vec<AccessRuleRow>>;

    /// When the resource was created, if the registry knows it.
    fn resource_create_date(&self, rid: &str) -> Result<Option<NaiveDateTime>>;

    /// The newest revision of every package.
    fn list_newest_package_ids(&self) -> Result<HashSet<PackageId>>;

    /// Data and metadata resources carrying a `deny(public, read)` rule.
    fn explicit_deny_resources(&self) -> Result<Vec<String>>;

    /// Data and metadata resources carrying an `allow(authenticated, read)` rule.
    fn authenticated_allow_resources(&self) -> Result<Vec<String>>;
}

/// Incremental feed of newly created packages.
pub trait PackageSource {
    /// Packages created strictly after `from`, ascending by creation date.
    fn packages_created_after(&self, from: NaiveDateTime, limit: Option<u32>) -> Result<Vec<PackageRow>>;
}

#[derive(QueryableByName)]
struct ResourceIdRow {
    #[diesel(sql_type = Text)]
    resource_id: String,
}

#[derive(QueryableByName)]
struct PackageIdRow {
    #[diesel(sql_type = Text)]
    package_id: String,
}

#[derive(QueryableByName)]
struct CreateDateRow {
    #[diesel(sql_type = Timestamp)]
    date_created: NaiveDateTime,
}

#[derive(QueryableByName)]
struct PackageRegistryRow {
    #[diesel(sql_type = Text)]
    package_id: String,
    #[diesel(sql_type = Timestamp)]
    date_created: NaiveDateTime,
    #[diesel(sql_type = Nullable<Timestamp>)]
    date_deactivated: Option<NaiveDateTime>,
    #[diesel(sql_type = Nullable<Text>)]
    doi: Option<String>,
}

/// Registry collaborator backed by the PASTA+ data package manager database.
pub struct PastaRegistry {
    conn: RefCell<PgConnection>,
}

impl core::fmt::Debug for PastaRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PastaRegistry").finish_non_exhaustive()
    }
}

impl PastaRegistry {
    /// Connect to the registry database.
    pub fn connect(database_url: &str) -> Result<Self> {
        let conn = PgConnection::establish(database_url).into_app_err("unable to connect to the registry database")?;
        log::debug!(target: LOG_TARGET, "Connected to the registry database");

        Ok(Self { conn: RefCell::new(conn) })
    }

    fn access_matrix_scan(&self, principal: &str, access_type: &str) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT resource_id FROM datapackagemanager.access_matrix \
             WHERE principal = $1 AND access_type = $2 AND permission = 'read' \
             AND ({SCOPE_EXCLUSIONS}) AND resource_id LIKE '%/%data/eml/%'"
        );

        let rows: Vec<ResourceIdRow> = diesel::sql_query(sql)
            .bind::<Text, _>(principal)
            .bind::<Text, _>(access_type)
            .load(&mut *self.conn.borrow_mut())
            .into_app_err("unable to scan the access matrix")?;

        Ok(rows.into_iter().map(|row| row.resource_id).collect())
    }
}

impl RegistryQuery for PastaRegistry {
    fn list_entity_resource_ids(&self, pid: &PackageId) -> Result<Vec<String>> {
        let rows: Vec<ResourceIdRow> = diesel::sql_query(SQL_ENTITY_LIST)
            .bind::<Text, _>(pid.to_string())
            .load(&mut *self.conn.borrow_mut())
            .into_app_err_with(|| format!("unable to list entity resources for {pid}"))?;

        Ok(rows.into_iter().map(|row| row.resource_id).collect())
    }

    fn list_access_rules(&self, rid: &str) -> Result<Vec<AccessRuleRow>> {
        diesel::sql_query(SQL_ACCESS_RULES)
            .bind::<Text, _>(rid)
            .load(&mut *self.conn.borrow_mut())
            .into_app_err_with(|| format!("unable to list access rules for '{rid}'"))
    }

    fn resource_create_date(&self, rid: &str) -> Result<Option<NaiveDateTime>> {
        let rows: Vec<CreateDateRow> = diesel::sql_query(SQL_RESOURCE_CREATE_DATE)
            .bind::<Text, _>(rid)
            .load(&mut *self.conn.borrow_mut())
            .into_app_err_with(|| format!("unable to query create date for '{rid}'"))?;

        Ok(rows.into_iter().next().map(|row| row.date_created))
    }

    fn list_newest_package_ids(&self) -> Result<HashSet<PackageId>> {
        let rows: Vec<PackageIdRow> = diesel::sql_query(SQL_NEWEST_PACKAGES)
            .load(&mut *self.conn.borrow_mut())
            .into_app_err("unable to list newest package identifiers")?;

        rows.iter().map(|row| PackageId::parse(&row.package_id)).collect()
    }

    fn explicit_deny_resources(&self) -> Result<Vec<String>> {
        self.access_matrix_scan("public", "deny")
    }

    fn authenticated_allow_resources(&self) -> Result<Vec<String>> {
        self.access_matrix_scan("authenticated", "allow")
    }
}

impl PackageSource for PastaRegistry {
    fn packages_created_after(&self, from: NaiveDateTime, limit: Option<u32>) -> Result<Vec<PackageRow>> {
        let sql = match limit {
            Some(limit) => format!("{SQL_PACKAGES_CREATED_AFTER} LIMIT {limit}"),
            None => SQL_PACKAGES_CREATED_AFTER.to_owned(),
        };

        let rows: Vec<PackageRegistryRow> = diesel::sql_query(sql)
            .bind::<Timestamp, _>(from)
            .load(&mut *self.conn.borrow_mut())
            .into_app_err("unable to query the package registry")?;

        rows.into_iter()
            .map(|row| {
                Ok(PackageRow {
                    package_id: PackageId::parse(&row.package_id)?,
                    date_created: row.date_created,
                    date_deactivated: row.date_deactivated,
                    doi: row.doi,
                })
            })
            .collect()
    }
}
