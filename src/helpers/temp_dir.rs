use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

use tracing::trace;

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique-per-process suffix: millis, pid and a counter.
fn time_thread_id() -> String {
    format!(
        "{}-{}-{}",
        chrono::Utc::now().timestamp_millis(),
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}

pub struct TempDir {
    path: PathBuf,
}
impl TempDir {
    /// Creates a scratch directory next to the final output so finished files
    /// can be moved instead of copied across file systems.
    pub async fn with_prefix_in<T: Into<OsString>>(
        parent: &Path,
        dir_name_prefix: T,
    ) -> Result<Self, std::io::Error> {
        let mut f: OsString = dir_name_prefix.into();
        f.push(time_thread_id());
        let path = parent.join(f);

        tokio::fs::create_dir_all(&path).await?;

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempDir {
    /// Inside a tokio runtime the removal runs on the blocking pool, so the
    /// directory may outlive the drop by a moment.
    fn drop(&mut self) {
        let path = std::mem::take(&mut self.path);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || remove(&path));
            }
            Err(_) => remove(&path),
        }
    }
}

fn remove(path: &Path) {
    if let Err(e) = fs::remove_dir_all(path) {
        trace!(?path, ?e, "Could not remove temp dir");
    }
}
