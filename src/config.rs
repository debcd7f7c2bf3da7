use crate::Result;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{NaiveDate, NaiveDateTime};
use ohno::IntoAppError;
use serde::Deserialize;
use std::fs;

fn default_base_url() -> String {
    "https://pasta.lternet.edu/package/".to_owned()
}

fn default_data_dir() -> Utf8PathBuf {
    Utf8PathBuf::from(".")
}

fn default_embargo_db() -> String {
    "embargo.sqlite".to_owned()
}

fn default_package_db() -> String {
    "packages.sqlite".to_owned()
}

fn default_lock_file() -> String {
    "sniffer.lock".to_owned()
}

fn default_checkpoint_file() -> String {
    "embargo.date".to_owned()
}

/// Registry history begins in 2013; the first full scan starts there.
fn default_start_date() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2013, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

fn default_ignored_scopes() -> Vec<String> {
    vec![
        "ecotrends".to_owned(),
        "lter-landsat".to_owned(),
        "lter-landsat-ledaps".to_owned(),
    ]
}

/// Tool configuration.
///
/// All fields are optional in the file; unspecified fields use the production
/// defaults. Credentials are never read from the file; they arrive through the
/// command line or the environment.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Base URL of the package repository's REST API, ending in `/`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Directory holding the local databases, the checkpoint, and the lock file.
    #[serde(default = "default_data_dir")]
    pub data_dir: Utf8PathBuf,

    #[serde(default = "default_embargo_db")]
    pub embargo_db: String,

    #[serde(default = "default_package_db")]
    pub package_db: String,

    #[serde(default = "default_lock_file")]
    pub lock_file: String,

    #[serde(default = "default_checkpoint_file")]
    pub checkpoint_file: String,

    /// Where incremental package acquisition starts when the pool is empty.
    #[serde(default = "default_start_date")]
    pub start_date: NaiveDateTime,

    /// Retired scopes that are never scanned for embargoes.
    #[serde(default = "default_ignored_scopes")]
    pub ignored_scopes: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            data_dir: default_data_dir(),
            embargo_db: default_embargo_db(),
            package_db: default_package_db(),
            lock_file: default_lock_file(),
            checkpoint_file: default_checkpoint_file(),
            start_date: default_start_date(),
            ignored_scopes: default_ignored_scopes(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, or the defaults when no path is given.
    pub fn load(path: Option<&Utf8Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let text = fs::read_to_string(path).into_app_err_with(|| format!("unable to read config file '{path}'"))?;
        toml::from_str(&text).into_app_err_with(|| format!("unable to parse config file '{path}'"))
    }

    #[must_use]
    pub fn embargo_db_path(&self) -> Utf8PathBuf {
        self.data_dir.join(&self.embargo_db)
    }

    #[must_use]
    pub fn package_db_path(&self) -> Utf8PathBuf {
        self.data_dir.join(&self.package_db)
    }

    #[must_use]
    pub fn lock_path(&self) -> Utf8PathBuf {
        self.data_dir.join(&self.lock_file)
    }

    #[must_use]
    pub fn checkpoint_path(&self) -> Utf8PathBuf {
        self.data_dir.join(&self.checkpoint_file)
    }
}
