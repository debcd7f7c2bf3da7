use crate::Result;
use core::fmt::{Display, Formatter};
use ohno::{IntoAppError, bail};

/// Identifies one revision of a data package: `scope.identifier.revision`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageId {
    scope: Box<str>,
    identifier: u32,
    revision: u32,
}

impl PackageId {
    pub fn new(scope: &str, identifier: u32, revision: u32) -> Self {
        Self {
            scope: Box::from(scope),
            identifier,
            revision,
        }
    }

    /// Parse the canonical `scope.identifier.revision` rendering.
    pub fn parse(pid: &str) -> Result<Self> {
        let pid = pid.trim();
        let Some((scope, rest)) = pid.split_once('.') else {
            bail!("invalid package identifier: {pid}");
        };

        let Some((identifier, revision)) = rest.split_once('.') else {
            bail!("invalid package identifier: {pid}");
        };

        if scope.is_empty() || revision.contains('.') {
            bail!("invalid package identifier: {pid}");
        }

        Ok(Self {
            scope: Box::from(scope),
            identifier: identifier
                .parse::<u32>()
                .into_app_err_with(|| format!("invalid package identifier: {pid}"))?,
            revision: revision
                .parse::<u32>()
                .into_app_err_with(|| format!("invalid package identifier: {pid}"))?,
        })
    }

    /// Derive the owning package identifier from a metadata or data resource URL.
    ///
    /// Resource URLs embed the triple as path segments after `/metadata/eml/` or
    /// `/data/eml/`.
    pub fn from_resource_url(url: &str) -> Result<Self> {
        let tail = url
            .split_once("/metadata/eml/")
            .or_else(|| url.split_once("/data/eml/"))
            .map(|(_, tail)| tail);

        let Some(tail) = tail else {
            bail!("not a package resource URL: {url}");
        };

        let mut segments = tail.split('/');
        match (segments.next(), segments.next(), segments.next()) {
            (Some(scope), Some(identifier), Some(revision)) if !scope.is_empty() => {
                Self::parse(&format!("{scope}.{identifier}.{revision}"))
            }
            _ => bail!("not a package resource URL: {url}"),
        }
    }

    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    #[must_use]
    pub const fn identifier(&self) -> u32 {
        self.identifier
    }

    #[must_use]
    pub const fn revision(&self) -> u32 {
        self.revision
    }
}

impl Display for PackageId {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}.{}", self.scope, self.identifier, self.revision)
    }
}
