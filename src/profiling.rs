//! CPU profiling
//!
//! Attaches `perf record` to the running process and streams its samples into
//! a user-named file. The recorder is stopped (and its output flushed) when
//! the [`CpuProfiler`] guard is dropped, so it must outlive the comparison run.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use thiserror::Error;
use tracing::{info, warn};

/// Sampling frequency passed to `perf record -F`
const SAMPLE_FREQUENCY: &str = "99";

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("could not create CPU profile {}: {source}", .path.display())]
    CreateFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not start CPU profile: perf not found in PATH ({0})")]
    PerfUnavailable(#[from] which::Error),
    #[error("could not start CPU profile: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Running profiler; stops on drop
pub struct CpuProfiler {
    child: Option<Child>,
    path: PathBuf,
}

impl CpuProfiler {
    /// Create `path` and start recording the current process into it
    pub fn start(path: &Path) -> Result<Self, ProfileError> {
        let file = File::create(path).map_err(|source| ProfileError::CreateFile {
            path: path.to_path_buf(),
            source,
        })?;
        let perf = which::which("perf")?;

        let child = Command::new(perf)
            .arg("record")
            .arg("-F")
            .arg(SAMPLE_FREQUENCY)
            .arg("-g")
            .arg("-p")
            .arg(std::process::id().to_string())
            // pipe mode: samples go to stdout, i.e. the profile file
            .arg("-o")
            .arg("-")
            .stdin(Stdio::null())
            .stdout(Stdio::from(file))
            .stderr(Stdio::null())
            .spawn()
            .map_err(ProfileError::Spawn)?;

        info!(path = %path.display(), pid = child.id(), "CPU profiling started");
        Ok(Self {
            child: Some(child),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn stop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        // perf only finalizes its output on SIGINT
        #[cfg(unix)]
        {
            // SAFETY: kill(2) with a pid we spawned and still own
            let rc = unsafe { libc::kill(child.id() as libc::pid_t, libc::SIGINT) };
            if rc != 0 {
                let _ = child.kill();
            }
        }
        #[cfg(not(unix))]
        {
            let _ = child.kill();
        }

        match child.wait() {
            Ok(status) => info!(path = %self.path.display(), %status, "CPU profile written"),
            Err(e) => warn!(path = %self.path.display(), error = %e, "CPU profiler did not exit cleanly"),
        }
    }
}

impl Drop for CpuProfiler {
    fn drop(&mut self) {
        self.stop();
    }
}
