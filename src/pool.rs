//! Run orchestration: package acquisition and the embargo passes.

use crate::Result;
use crate::access::{EmbargoCategory, classify};
use crate::classifier::PackageClassifier;
use crate::config::Config;
use crate::eml;
use crate::fetch::{FetchOutcome, MetadataFetcher};
use crate::last_date;
use crate::ledger::{EmbargoLedger, PackagePool, PackageRecord};
use crate::package_id::PackageId;
use crate::registry::{PackageSource, RegistryQuery};
use camino::Utf8PathBuf;
use chrono::NaiveDateTime;
use std::collections::HashSet;

/// Log target for `pool`
const LOG_TARGET: &str = "      pool";

/// Pull packages created after the newest locally known one into the pool.
///
/// Returns the number of rows retrieved; the caller loops until a pull comes
/// back empty.
pub fn acquire_new_packages(
    pool: &PackagePool,
    source: &dyn PackageSource,
    start_date: NaiveDateTime,
    limit: Option<u32>,
) -> Result<usize> {
    let from = pool.most_recent_create_date()?.unwrap_or(start_date);

    let rows = source.packages_created_after(from, limit)?;
    let count = rows.len();
    for row in rows {
        let record = PackageRecord {
            pid: row.package_id.to_string(),
            date_created: row.date_created,
            date_deactivated: row.date_deactivated,
            doi: row.doi,
        };

        if pool.insert(&record)? {
            log::debug!(target: LOG_TARGET, "Inserting package: {}", record.pid);
        }
    }

    Ok(count)
}

/// Drives the embargo passes over the ledger, the package pool, and the two
/// upstream collaborators. Single-threaded, run to completion; partial progress
/// is retained and an idempotent re-run recovers forward.
pub struct EmbargoPool<'a> {
    ledger: &'a EmbargoLedger,
    packages: &'a PackagePool,
    fetcher: &'a dyn MetadataFetcher,
    registry: &'a dyn RegistryQuery,
    checkpoint_path: Utf8PathBuf,
    start_date: NaiveDateTime,
    ignored_scopes: Vec<String>,
}

impl core::fmt::Debug for EmbargoPool<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EmbargoPool").finish_non_exhaustive()
    }
}

impl<'a> EmbargoPool<'a> {
    pub fn new(
        ledger: &'a EmbargoLedger,
        packages: &'a PackagePool,
        fetcher: &'a dyn MetadataFetcher,
        registry: &'a dyn RegistryQuery,
        config: &Config,
    ) -> Self {
        Self {
            ledger,
            packages,
            fetcher,
            registry,
            checkpoint_path: config.checkpoint_path(),
            start_date: config.start_date,
            ignored_scopes: config.ignored_scopes.clone(),
        }
    }

    /// The full embargo pass: explicit, ephemeral, then implicit.
    ///
    /// Returns the count of newly recorded embargoed resources.
    pub fn add_new_embargoed_resources(&self) -> Result<usize> {
        let mut count = self.add_explicit_resources()?;
        let _ = self.add_ephemeral_resources()?;
        count += self.add_implicit_resources()?;
        Ok(count)
    }

    /// Rebuild the explicit slice of the ledger from the registry's access
    /// matrix. A resource is explicitly embargoed iff the matrix carries a
    /// `deny(public, read)` row for it.
    pub fn add_explicit_resources(&self) -> Result<usize> {
        let _ = self.ledger.delete_category(EmbargoCategory::Explicit)?;

        let authenticated: HashSet<String> = self.registry.authenticated_allow_resources()?.into_iter().collect();

        let mut count = 0;
        for rid in self.registry.explicit_deny_resources()? {
            let pid = PackageId::from_resource_url(&rid)?;
            if self.ledger.insert(&rid, &pid, EmbargoCategory::Explicit, authenticated.contains(&rid))? {
                count += 1;
            }
        }

        log::info!(target: LOG_TARGET, "Found {count} explicit embargoes");
        Ok(count)
    }

    /// Mark explicit embargoes that the owning package's own metadata no longer
    /// confirms. Package-level embargoes are exempt: their metadata cannot be
    /// expected to confirm anything while the whole package is denied.
    pub fn add_ephemeral_resources(&self) -> Result<usize> {
        let package_level_pids: HashSet<String> = self
            .ledger
            .get_package_level_embargoes()?
            .into_iter()
            .map(|record| record.pid)
            .collect();

        let verified = self.verify_metadata_embargo()?;

        let mut count = 0;
        for record in self.ledger.get_by_category(EmbargoCategory::Explicit)? {
            if package_level_pids.contains(&record.pid) || verified.contains(&record.rid) {
                continue;
            }

            let Some(observed) = self.registry.resource_create_date(&record.rid)? else {
                log::warn!(target: LOG_TARGET, "No create date for ephemeral candidate '{}'", record.rid);
                continue;
            };

            log::debug!(target: LOG_TARGET, "Found ephemeral embargo: {} - {}", record.pid, record.rid);
            let _ = self.ledger.update_ephemeral_marker(&record.rid, observed)?;
            count += 1;
        }

        log::info!(target: LOG_TARGET, "Found {count} ephemeral embargoes");
        Ok(count)
    }

    /// Entity resources whose embargo is confirmed by a `deny(public, read)`
    /// rule in the owning package's metadata, fetched with elevated credentials
    /// since embargoed packages are often unreadable to the public.
    pub fn verify_metadata_embargo(&self) -> Result<HashSet<String>> {
        let mut verified = HashSet::new();
        for pid in self.ledger.get_distinct_package_ids(Some(EmbargoCategory::Explicit))? {
            match self.fetcher.fetch(&pid, true)? {
                FetchOutcome::AuthorizationDenied => {
                    log::warn!(target: LOG_TARGET, "ACL for package {pid} does not permit read");
                }
                FetchOutcome::Document(document) => {
                    for entity in eml::parse(&document)?.entities {
                        if classify(entity.access.as_ref(), None).category == Some(EmbargoCategory::Explicit) {
                            let _ = verified.insert(entity.url);
                        }
                    }
                }
            }
        }

        Ok(verified)
    }

    /// Classify packages created since the checkpoint and record every embargo
    /// found. A per-package failure never aborts the run; the checkpoint only
    /// advances while the processed prefix is failure-free, so failed packages
    /// are re-examined next run.
    pub fn add_implicit_resources(&self) -> Result<usize> {
        let from = last_date::read(&self.checkpoint_path, self.start_date)?;
        let classifier = PackageClassifier::new(self.fetcher, self.registry);

        let mut count = 0;
        let mut failed = false;
        for package in self.packages.get_all(Some(from))? {
            let pid = PackageId::parse(&package.pid)?;

            if !self.ignored_scopes.iter().any(|scope| scope == pid.scope()) {
                log::info!(target: LOG_TARGET, "Testing package for entity embargo(s): {pid}");

                match classifier.classify_package(&pid) {
                    Ok(classifications) => {
                        for c in &classifications {
                            if self.ledger.insert(&c.resource_id, &c.package_id, c.category, c.allows_authenticated)? {
                                log::debug!(target: LOG_TARGET, "Adding {} resource: {pid}, {}", c.category.as_str(), c.resource_id);
                                count += 1;
                            }
                        }
                    }
                    Err(e) => {
                        log::error!(target: LOG_TARGET, "Unable to classify {pid}: {e}");
                        failed = true;
                    }
                }
            }

            if !failed {
                last_date::write(&self.checkpoint_path, package.date_created)?;
            }
        }

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{AccessRuleRow, PackageRow};
    use camino::Utf8PathBuf;
    use chrono::NaiveDate;
    use ohno::app_err;
    use std::collections::HashMap;
    use tempfile::TempDir;

    const BASE: &str = "https://pasta.lternet.edu/package/";

    #[derive(Default)]
    struct ScriptedFetcher {
        public_docs: HashMap<String, String>,
        elevated_docs: HashMap<String, String>,
        denied: HashSet<String>,
        failing: HashSet<String>,
    }

    impl MetadataFetcher for ScriptedFetcher {
        fn fetch(&self, pid: &PackageId, elevated: bool) -> Result<FetchOutcome> {
            let key = pid.to_string();
            if self.failing.contains(&key) {
                return Err(app_err!("error accessing {key} metadata - response code: 500"));
            }

            if self.denied.contains(&key) {
                return Ok(FetchOutcome::AuthorizationDenied);
            }

            let docs = if elevated { &self.elevated_docs } else { &self.public_docs };
            docs.get(&key)
                .map(|doc| FetchOutcome::Document(doc.clone()))
                .ok_or_else(|| app_err!("no scripted metadata for {key}"))
        }

        fn metadata_resource(&self, pid: &PackageId) -> String {
            format!("{BASE}metadata/eml/{}/{}/{}", pid.scope(), pid.identifier(), pid.revision())
        }
    }

    #[derive(Default)]
    struct ScriptedRegistry {
        deny_resources: Vec<String>,
        auth_resources: Vec<String>,
        entities: HashMap<String, Vec<String>>,
        create_dates: HashMap<String, NaiveDateTime>,
        packages: Vec<PackageRow>,
    }

    impl RegistryQuery for ScriptedRegistry {
        fn list_entity_resource_ids(&self, pid: &PackageId) -> Result<Vec<String>> {
            Ok(self.entities.get(&pid.to_string()).cloned().unwrap_or_default())
        }

        fn list_access_rules(&self, _rid: &str) -> Result<Vec<AccessRuleRow>> {
            Ok(vec![])
        }

        fn resource_create_date(&self, rid: &str) -> Result<Option<NaiveDateTime>> {
            Ok(self.create_dates.get(rid).copied())
        }

        fn list_newest_package_ids(&self) -> Result<HashSet<PackageId>> {
            Ok(HashSet::new())
        }

        fn explicit_deny_resources(&self) -> Result<Vec<String>> {
            Ok(self.deny_resources.clone())
        }

        fn authenticated_allow_resources(&self) -> Result<Vec<String>> {
            Ok(self.auth_resources.clone())
        }
    }

    impl PackageSource for ScriptedRegistry {
        fn packages_created_after(&self, from: NaiveDateTime, limit: Option<u32>) -> Result<Vec<PackageRow>> {
            let mut rows: Vec<_> = self.packages.iter().filter(|row| row.date_created > from).cloned().collect();
            rows.sort_by_key(|row| row.date_created);
            if let Some(limit) = limit {
                rows.truncate(limit as usize);
            }
            Ok(rows)
        }
    }

    struct Fixture {
        _dir: TempDir,
        config: Config,
        ledger: EmbargoLedger,
        packages: PackagePool,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let config = Config {
            data_dir: Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap(),
            ..Config::default()
        };
        let ledger = EmbargoLedger::open(&config.embargo_db_path()).unwrap();
        let packages = PackagePool::open(&config.package_db_path()).unwrap();
        Fixture {
            _dir: dir,
            config,
            ledger,
            packages,
        }
    }

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 5, d).unwrap().and_hms_opt(12, 0, 0).unwrap()
    }

    const DATA_RID: &str = "https://pasta.lternet.edu/package/data/eml/edi/512/1/aaa";
    const DATA_RID_2: &str = "https://pasta.lternet.edu/package/data/eml/edi/512/1/bbb";
    const METADATA_RID: &str = "https://pasta.lternet.edu/package/metadata/eml/knb-lter-fce/1210/3";

    #[test]
    fn explicit_pass_rebuilds_from_the_access_matrix() {
        let f = fixture();
        let fetcher = ScriptedFetcher::default();
        let registry = ScriptedRegistry {
            deny_resources: vec![DATA_RID.to_owned(), DATA_RID_2.to_owned(), METADATA_RID.to_owned()],
            auth_resources: vec![DATA_RID.to_owned()],
            ..ScriptedRegistry::default()
        };

        // A stale explicit record vanishes on rebuild.
        f.ledger
            .insert("stale", &PackageId::parse("edi.1.1").unwrap(), EmbargoCategory::Explicit, false)
            .unwrap();

        let pool = EmbargoPool::new(&f.ledger, &f.packages, &fetcher, &registry, &f.config);
        assert_eq!(pool.add_explicit_resources().unwrap(), 3);

        assert!(f.ledger.get_by_resource_id("stale").unwrap().is_none());
        assert!(f.ledger.get_by_resource_id(DATA_RID).unwrap().unwrap().allows_authenticated);
        assert!(!f.ledger.get_by_resource_id(DATA_RID_2).unwrap().unwrap().allows_authenticated);
    }

    #[test]
    fn ephemeral_pass_marks_unconfirmed_data_resources() {
        let f = fixture();

        // Metadata for edi.512.1 confirms only the first entity's deny rule.
        let confirming = format!(
            "<eml><dataset><dataTable><physical><distribution>\
             <online><url>{DATA_RID}</url></online>\
             <access><deny><principal>public</principal><permission>read</permission></deny></access>\
             </distribution></physical></dataTable>\
             <dataTable><physical><distribution>\
             <online><url>{DATA_RID_2}</url></online>\
             <access><allow><principal>public</principal><permission>read</permission></allow></access>\
             </distribution></physical></dataTable></dataset></eml>"
        );

        let mut fetcher = ScriptedFetcher::default();
        let _ = fetcher.elevated_docs.insert("edi.512.1".to_owned(), confirming);
        let _ = fetcher.denied.insert("knb-lter-fce.1210.3".to_owned());

        let mut registry = ScriptedRegistry::default();
        let _ = registry.create_dates.insert(DATA_RID_2.to_owned(), day(13));

        let edi = PackageId::parse("edi.512.1").unwrap();
        let fce = PackageId::parse("knb-lter-fce.1210.3").unwrap();
        f.ledger.insert(DATA_RID, &edi, EmbargoCategory::Explicit, false).unwrap();
        f.ledger.insert(DATA_RID_2, &edi, EmbargoCategory::Explicit, false).unwrap();
        f.ledger.insert(METADATA_RID, &fce, EmbargoCategory::Explicit, false).unwrap();

        let pool = EmbargoPool::new(&f.ledger, &f.packages, &fetcher, &registry, &f.config);
        assert_eq!(pool.add_ephemeral_resources().unwrap(), 1);

        let marked = f.ledger.get_by_resource_id(DATA_RID_2).unwrap().unwrap();
        assert_eq!(marked.date_ephemeral, Some(day(13)));

        // Confirmed and package-level records stay untouched.
        assert_eq!(f.ledger.get_by_resource_id(DATA_RID).unwrap().unwrap().date_ephemeral, None);
        assert_eq!(f.ledger.get_by_resource_id(METADATA_RID).unwrap().unwrap().date_ephemeral, None);
    }

    #[test]
    fn implicit_pass_classifies_new_packages_and_advances_the_checkpoint() {
        let f = fixture();

        let implicit_doc = format!(
            "<eml><dataset><dataTable><physical><distribution>\
             <online><url>{DATA_RID}</url></online>\
             </distribution></physical></dataTable></dataset></eml>"
        );
        let public_doc = "<eml>\
             <access><allow><principal>public</principal><permission>read</permission></allow></access>\
             <dataset/></eml>";

        let mut fetcher = ScriptedFetcher::default();
        let _ = fetcher.public_docs.insert("edi.512.1".to_owned(), implicit_doc);
        let _ = fetcher.public_docs.insert("edi.513.1".to_owned(), public_doc.to_owned());

        let registry = ScriptedRegistry::default();

        for (pid, d) in [("edi.512.1", 13), ("edi.513.1", 14), ("ecotrends.1.1", 15)] {
            f.packages
                .insert(&PackageRecord {
                    pid: pid.to_owned(),
                    date_created: day(d),
                    date_deactivated: None,
                    doi: None,
                })
                .unwrap();
        }

        let pool = EmbargoPool::new(&f.ledger, &f.packages, &fetcher, &registry, &f.config);

        // Metadata + entity for the implicit package; nothing for the public one;
        // the ignored scope is skipped without a fetch.
        assert_eq!(pool.add_implicit_resources().unwrap(), 2);
        assert_eq!(f.ledger.count().unwrap(), 2);

        let checkpoint = last_date::read(&f.config.checkpoint_path(), f.config.start_date).unwrap();
        assert_eq!(checkpoint, day(15));

        // Re-running from the advanced checkpoint finds nothing new.
        assert_eq!(pool.add_implicit_resources().unwrap(), 0);
    }

    #[test]
    fn implicit_pass_survives_per_package_failures_without_advancing_past_them() {
        let f = fixture();

        let mut fetcher = ScriptedFetcher::default();
        let _ = fetcher.failing.insert("edi.512.1".to_owned());
        let _ = fetcher.denied.insert("edi.513.1".to_owned());

        let mut registry = ScriptedRegistry::default();
        let _ = registry.entities.insert("edi.513.1".to_owned(), vec!["r1".to_owned()]);

        for (pid, d) in [("edi.512.1", 13), ("edi.513.1", 14)] {
            f.packages
                .insert(&PackageRecord {
                    pid: pid.to_owned(),
                    date_created: day(d),
                    date_deactivated: None,
                    doi: None,
                })
                .unwrap();
        }

        let pool = EmbargoPool::new(&f.ledger, &f.packages, &fetcher, &registry, &f.config);

        // The second package is still processed (auth-denied: metadata + entity).
        assert_eq!(pool.add_implicit_resources().unwrap(), 2);

        // The checkpoint stayed put, so the failed package is retried next run.
        let checkpoint = last_date::read(&f.config.checkpoint_path(), f.config.start_date).unwrap();
        assert_eq!(checkpoint, f.config.start_date);
    }

    #[test]
    fn package_acquisition_is_incremental_and_deduplicating() {
        let f = fixture();

        let registry = ScriptedRegistry {
            packages: vec![
                PackageRow {
                    package_id: PackageId::parse("edi.1.1").unwrap(),
                    date_created: day(10),
                    date_deactivated: None,
                    doi: Some("doi:10.6073/pasta/1".to_owned()),
                },
                PackageRow {
                    package_id: PackageId::parse("edi.2.1").unwrap(),
                    date_created: day(20),
                    date_deactivated: None,
                    doi: None,
                },
            ],
            ..ScriptedRegistry::default()
        };

        assert_eq!(acquire_new_packages(&f.packages, &registry, f.config.start_date, Some(1)).unwrap(), 1);
        assert_eq!(f.packages.count().unwrap(), 1);

        assert_eq!(acquire_new_packages(&f.packages, &registry, f.config.start_date, Some(1)).unwrap(), 1);
        assert_eq!(f.packages.count().unwrap(), 2);

        assert_eq!(acquire_new_packages(&f.packages, &registry, f.config.start_date, Some(1)).unwrap(), 0);
    }
}
