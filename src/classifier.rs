//! Per-package embargo classification.

use crate::Result;
use crate::access::{EmbargoCategory, classify};
use crate::eml;
use crate::fetch::{FetchOutcome, MetadataFetcher};
use crate::package_id::PackageId;
use crate::registry::RegistryQuery;

/// Log target for `classifier`
const LOG_TARGET: &str = "classifier";

/// The verdict for one resource. Resources that are not embargoed are never
/// represented; they simply produce no classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbargoClassification {
    pub resource_id: String,
    pub package_id: PackageId,
    pub category: EmbargoCategory,
    pub allows_authenticated: bool,
}

/// Produces the full list of embargo classifications for one package.
///
/// Classification is derived from scratch on every call; the same document always
/// yields the same list, in document order.
pub struct PackageClassifier<'a> {
    fetcher: &'a dyn MetadataFetcher,
    registry: &'a dyn RegistryQuery,
}

impl core::fmt::Debug for PackageClassifier<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PackageClassifier").finish_non_exhaustive()
    }
}

impl<'a> PackageClassifier<'a> {
    pub fn new(fetcher: &'a dyn MetadataFetcher, registry: &'a dyn RegistryQuery) -> Self {
        Self { fetcher, registry }
    }

    /// Classify every resource of one package.
    ///
    /// An authorization denial while fetching the metadata is itself decisive:
    /// the package-level metadata and every registered entity are explicitly
    /// embargoed. The entity list comes from the registry in that case, since it
    /// cannot be read out of the unreadable document.
    ///
    /// # Errors
    ///
    /// Returns an error for transport faults and unparseable documents; the
    /// caller is expected to log and continue with the next package.
    pub fn classify_package(&self, pid: &PackageId) -> Result<Vec<EmbargoClassification>> {
        let eml = match self.fetcher.fetch(pid, false)? {
            FetchOutcome::Document(eml) => eml,
            FetchOutcome::AuthorizationDenied => {
                log::warn!(target: LOG_TARGET, "Package is not public read: {pid}");
                return self.classify_unreadable(pid);
            }
        };

        let document = eml::parse(&eml)?;
        let package = classify(document.package_access.as_ref(), None);

        let mut classifications = Vec::new();
        if let Some(category) = package.category {
            classifications.push(EmbargoClassification {
                resource_id: self.fetcher.metadata_resource(pid),
                package_id: pid.clone(),
                category,
                allows_authenticated: package.allows_authenticated,
            });
        }

        for entity in &document.entities {
            let verdict = classify(entity.access.as_ref(), package.category);
            if let Some(category) = verdict.category {
                classifications.push(EmbargoClassification {
                    resource_id: entity.url.clone(),
                    package_id: pid.clone(),
                    category,
                    allows_authenticated: verdict.allows_authenticated,
                });
            }
        }

        Ok(classifications)
    }

    fn classify_unreadable(&self, pid: &PackageId) -> Result<Vec<EmbargoClassification>> {
        let mut classifications = vec![EmbargoClassification {
            resource_id: self.fetcher.metadata_resource(pid),
            package_id: pid.clone(),
            category: EmbargoCategory::Explicit,
            allows_authenticated: false,
        }];

        for resource_id in self.registry.list_entity_resource_ids(pid)? {
            classifications.push(EmbargoClassification {
                resource_id,
                package_id: pid.clone(),
                category: EmbargoCategory::Explicit,
                allows_authenticated: false,
            });
        }

        Ok(classifications)
    }
}
