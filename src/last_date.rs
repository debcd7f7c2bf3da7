//! Last-processed-date checkpoint for incremental embargo verification.

use crate::Result;
use camino::Utf8Path;
use chrono::NaiveDateTime;
use ohno::IntoAppError;
use std::fs;

const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Read the checkpoint, falling back to `default` when no checkpoint exists yet.
pub fn read(path: &Utf8Path, default: NaiveDateTime) -> Result<NaiveDateTime> {
    if !path.exists() {
        return Ok(default);
    }

    let text = fs::read_to_string(path).into_app_err_with(|| format!("unable to read checkpoint file '{path}'"))?;
    NaiveDateTime::parse_from_str(text.trim(), FORMAT)
        .into_app_err_with(|| format!("invalid checkpoint timestamp in '{path}'"))
}

/// Advance the checkpoint.
pub fn write(path: &Utf8Path, date: NaiveDateTime) -> Result<()> {
    fs::write(path, date.format(FORMAT).to_string())
        .into_app_err_with(|| format!("unable to write checkpoint file '{path}'"))
}
