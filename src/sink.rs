//! Writing NZB files to a local folder and cleaning it up.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info, warn};

use crate::config::SinkConfig;
use crate::error::Result;
use crate::utils::FILENAME_FORBIDDEN;

const SECONDS_PER_DAY: u64 = 24 * 3600;

/// File name (without directory) for an NZB
///
/// The password is appended as `{{password}}`, which download clients pick up
/// from the name. A password with characters that are not allowed in file
/// names is left out.
pub fn nzb_file_name(tag: &str, password: Option<&str>) -> String {
    match password {
        Some(pw) if !pw.is_empty() && !pw.contains(FILENAME_FORBIDDEN) => {
            format!("{tag}{{{{{pw}}}}}.nzb")
        }
        Some(pw) if !pw.is_empty() => {
            warn!("password contains forbidden characters, not added to file name");
            format!("{tag}.nzb")
        }
        _ => format!("{tag}.nzb"),
    }
}

/// Writes NZB documents into a folder
#[derive(Clone, Debug)]
pub struct FileSink {
    dir: PathBuf,
    pass_to_file: bool,
}

impl FileSink {
    /// Create a sink from its configuration
    pub fn new(config: &SinkConfig) -> Self {
        Self {
            dir: config.nzb_dir.clone(),
            pass_to_file: config.pass_to_file,
        }
    }

    /// Target folder
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write an NZB and return its path
    ///
    /// Creates the folder if needed and replaces an existing file of the same
    /// name.
    pub async fn write(&self, tag: &str, password: Option<&str>, text: &str) -> Result<PathBuf> {
        let password = password.filter(|_| self.pass_to_file);
        let path = self.dir.join(nzb_file_name(tag, password));

        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(&path, text).await?;

        info!(path = %path.display(), bytes = text.len(), "NZB saved");
        Ok(path)
    }
}

/// Delete `*.nzb` files in `dir` that are at least `max_age_days` old
///
/// Age is counted in whole days since the last modification. Other files and
/// subfolders are left alone. Returns the number of deleted files.
pub async fn clean_nzb_folder(dir: &Path, max_age_days: u32, now: SystemTime) -> Result<usize> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut deleted = 0;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("nzb") {
            continue;
        }

        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }

        // files from the future count as new
        let age_days = now
            .duration_since(metadata.modified()?)
            .map(|age| age.as_secs() / SECONDS_PER_DAY)
            .unwrap_or(0);

        if age_days >= u64::from(max_age_days) {
            debug!(path = %path.display(), age_days, "deleting old NZB");
            tokio::fs::remove_file(&path).await?;
            deleted += 1;
        }
    }

    info!(dir = %dir.display(), deleted, "NZB folder cleaned");
    Ok(deleted)
}

/// When the daily cleanup of the NZB folder is due
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CleanupPolicy {
    /// Cleanup switched on
    pub enabled: bool,
    /// Minimum age in days of deleted files
    pub max_age_days: u32,
    /// Unix timestamp of the last run
    pub last_run: Option<i64>,
}

impl CleanupPolicy {
    /// Policy from the sink configuration
    pub fn new(config: &SinkConfig) -> Self {
        Self {
            enabled: config.clean_up_enable,
            max_age_days: config.clean_up_max_age_days,
            last_run: config.clean_up_last_run,
        }
    }

    /// Whether a cleanup should run at `now` (Unix timestamp)
    pub fn is_due(&self, now: i64) -> bool {
        if !self.enabled {
            return false;
        }
        match self.last_run {
            Some(last) => now - last >= SECONDS_PER_DAY as i64,
            None => true,
        }
    }

    /// Run the cleanup if due and return the updated policy with the count
    ///
    /// The caller persists `last_run` of the returned policy.
    pub async fn run(self, dir: &Path, now: SystemTime) -> Result<(Self, Option<usize>)> {
        let timestamp = now
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        if !self.is_due(timestamp) {
            return Ok((self, None));
        }

        let deleted = clean_nzb_folder(dir, self.max_age_days, now).await?;
        Ok((
            Self {
                last_run: Some(timestamp),
                ..self
            },
            Some(deleted),
        ))
    }
}
