//! embargo-sniffer crate
//!
//! This crate is an implementation detail of the `embargo-sniffer` tool. This crate's API is fluid and may change
//! without warning and in a semver-incompatible way.

/// Result type alias using `ohno::AppError` as the default error type.
pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

#[doc(hidden)]
pub mod access;

#[doc(hidden)]
pub mod classifier;

#[doc(hidden)]
pub mod config;

#[doc(hidden)]
pub mod eml;

#[doc(hidden)]
pub mod fetch;

#[doc(hidden)]
pub mod last_date;

#[doc(hidden)]
pub mod ledger;

#[doc(hidden)]
pub mod lock;

#[doc(hidden)]
pub mod package_id;

#[doc(hidden)]
pub mod pool;

#[doc(hidden)]
pub mod registry;
