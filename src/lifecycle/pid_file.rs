//! Single-instance pid file.
//!
//! # Responsibilities
//! - Create (or reuse) the pid file and take an exclusive `flock` on it
//! - Refuse to start when another live process holds the lock
//! - Record this process's pid; remove the file on drop

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use crate::error::StartupError;

/// A locked pid file. The lock lives as long as this value.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
    _file: File,
}

impl PidFile {
    pub fn acquire(path: &Path) -> Result<Self, StartupError> {
        let fail = |message: String| StartupError::PidFile {
            path: path.display().to_string(),
            message,
        };

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .mode(0o644)
            .open(path)
            .map_err(|e| fail(format!("cannot open: {}", e)))?;

        // SAFETY: flock on a descriptor we own.
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if rc != 0 {
            let err = io::Error::last_os_error();
            return Err(fail(if err.kind() == io::ErrorKind::WouldBlock {
                "another instance is already running".to_string()
            } else {
                format!("cannot lock: {}", err)
            }));
        }

        let pid = std::process::id();
        file.set_len(0)
            .and_then(|()| writeln!(file, "{}", pid))
            .and_then(|()| file.sync_all())
            .map_err(|e| fail(format!("cannot write pid: {}", e)))?;

        tracing::debug!(path = %path.display(), pid, "Pid file locked");
        Ok(Self {
            path: path.to_path_buf(),
            _file: file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::debug!(path = %self.path.display(), error = %e, "Failed to remove pid file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("secret-passage-{}-{}.pid", name, std::process::id()))
    }

    #[test]
    fn writes_pid_and_removes_on_drop() {
        let path = temp_path("write");
        let pid_file = PidFile::acquire(&path).unwrap();
        let contents = fs::read_to_string(pid_file.path()).unwrap();
        assert_eq!(contents.trim(), std::process::id().to_string());

        drop(pid_file);
        assert!(!path.exists());
    }

    #[test]
    fn second_instance_is_refused() {
        let path = temp_path("lock");
        let _held = PidFile::acquire(&path).unwrap();
        let err = PidFile::acquire(&path).unwrap_err();
        assert!(err.to_string().contains("already running"), "{}", err);
    }
}
