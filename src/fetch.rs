//! Metadata retrieval from the package repository's REST API.

use crate::Result;
use crate::package_id::PackageId;
use core::time::Duration;
use ohno::{IntoAppError, bail};
use reqwest::StatusCode;
use reqwest::blocking::Client;

/// Log target for `fetch`
const LOG_TARGET: &str = "     fetch";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// The outcome of a metadata fetch.
///
/// An authorization denial is not an error: the classifier treats it as positive
/// evidence of a package-level embargo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Document(String),
    AuthorizationDenied,
}

/// Credentials for elevated metadata access.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub distinguished_name: String,
    pub password: String,
}

/// Retrieves EML metadata documents for packages.
pub trait MetadataFetcher {
    /// Fetch the metadata document for a package.
    ///
    /// # Errors
    ///
    /// Returns an error for any transport or server fault other than an
    /// authorization denial.
    fn fetch(&self, pid: &PackageId, elevated: bool) -> Result<FetchOutcome>;

    /// The canonical URL of the package's own metadata resource.
    fn metadata_resource(&self, pid: &PackageId) -> String;
}

/// `MetadataFetcher` over the PASTA+ REST API.
#[derive(Debug)]
pub struct PastaClient {
    base_url: String,
    credentials: Option<Credentials>,
    client: Client,
}

impl PastaClient {
    /// Create a client for the given base URL (ending in `/`), with optional
    /// credentials for elevated fetches.
    pub fn new(base_url: &str, credentials: Option<Credentials>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .into_app_err("unable to create HTTP client")?;

        Ok(Self {
            base_url: base_url.to_owned(),
            credentials,
            client,
        })
    }
}

impl MetadataFetcher for PastaClient {
    fn fetch(&self, pid: &PackageId, elevated: bool) -> Result<FetchOutcome> {
        let url = self.metadata_resource(pid);

        let mut request = self.client.get(&url);
        if elevated {
            let Some(credentials) = &self.credentials else {
                bail!("elevated metadata fetch for {pid} requested but no credentials are configured");
            };

            request = request.basic_auth(&credentials.distinguished_name, Some(&credentials.password));
        }

        log::debug!(target: LOG_TARGET, "Fetching metadata for {pid} (elevated: {elevated})");

        let response = request
            .send()
            .into_app_err_with(|| format!("unable to fetch metadata for {pid}"))?;

        match response.status() {
            StatusCode::OK => Ok(FetchOutcome::Document(
                response
                    .text()
                    .into_app_err_with(|| format!("unable to read metadata for {pid}"))?,
            )),
            StatusCode::UNAUTHORIZED => Ok(FetchOutcome::AuthorizationDenied),
            status => bail!("error accessing {pid} metadata - response code: {status}"),
        }
    }

    fn metadata_resource(&self, pid: &PackageId) -> String {
        format!(
            "{}metadata/eml/{}/{}/{}",
            self.base_url,
            pid.scope(),
            pid.identifier(),
            pid.revision()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_resource_renders_canonical_url() {
        let client = PastaClient::new("https://pasta.lternet.edu/package/", None).unwrap();
        let pid = PackageId::parse("edi.512.1").unwrap();
        assert_eq!(
            client.metadata_resource(&pid),
            "https://pasta.lternet.edu/package/metadata/eml/edi/512/1"
        );
    }

    #[test]
    fn elevated_fetch_without_credentials_is_an_error() {
        let client = PastaClient::new("https://pasta.lternet.edu/package/", None).unwrap();
        let pid = PackageId::parse("edi.512.1").unwrap();
        let err = client.fetch(&pid, true).unwrap_err();
        assert!(err.to_string().contains("no credentials"));
    }
}
