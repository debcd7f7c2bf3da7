use crate::Result;
use camino::{Utf8Path, Utf8PathBuf};
use fs4::fs_std::FileExt;
use ohno::{IntoAppError, bail};
use std::fs::{File, OpenOptions};

/// Log target for `lock`
const LOG_TARGET: &str = "      lock";

/// Guard that releases the run lock when dropped.
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: Utf8PathBuf,
}

impl Drop for RunLock {
    fn drop(&mut self) {
        // Lock is also released when the file is closed; log if explicit unlock fails
        if let Err(e) = FileExt::unlock(&self.file) {
            log::warn!(target: LOG_TARGET, "Failed to release run lock at '{}': {e}", self.path);
        } else {
            log::info!(target: LOG_TARGET, "Run lock at '{}' released", self.path);
        }
    }
}

impl RunLock {
    /// Acquire the process-wide run lock using advisory file locking.
    ///
    /// Fails fast when another instance holds the lock instead of waiting; two
    /// concurrent runs would fight over the same ledgers.
    pub fn acquire(path: &Utf8Path) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .into_app_err_with(|| format!("unable to open run lock file at '{path}'"))?;

        let acquired = file
            .try_lock_exclusive()
            .into_app_err_with(|| format!("unable to acquire run lock at '{path}'"))?;

        if !acquired {
            bail!("another instance holds the run lock at '{path}', exiting");
        }

        log::info!(target: LOG_TARGET, "Run lock at '{path}' acquired");
        Ok(Self {
            file,
            path: path.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    #[test]
    fn second_acquire_fails_while_lock_is_held() {
        let dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("run.lock")).unwrap();

        let guard = RunLock::acquire(&path).unwrap();
        assert!(RunLock::acquire(&path).is_err());

        drop(guard);
        assert!(RunLock::acquire(&path).is_ok());
    }
}
