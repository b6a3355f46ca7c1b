//! Permanent storage for uploaded recordings.
//!
//! Each accepted upload is written once under the audio directory as
//! `{YYYYMMDD_HHMMSS}_{task_id}_{original_filename}` and never deleted here.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use axum::body::Bytes;
use chrono::{DateTime, Local, Utc};
use regex::Regex;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info};

use crate::task::TaskId;

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\x00-\x1f\x7f:*?<>|]").expect("valid regex"));

#[async_trait]
pub trait BlobRelocator: Send + Sync {
    /// Persist `bytes` for `task_id` and return the final path.
    ///
    /// Either the whole content is present at the returned path or an error is
    /// returned and nothing is visible under the final name.
    async fn relocate(
        &self,
        bytes: Bytes,
        original_filename: &str,
        task_id: TaskId,
        created_at: DateTime<Utc>,
    ) -> Result<PathBuf>;
}

pub struct FileRelocator {
    dir: PathBuf,
}

impl FileRelocator {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl BlobRelocator for FileRelocator {
    async fn relocate(
        &self,
        bytes: Bytes,
        original_filename: &str,
        task_id: TaskId,
        created_at: DateTime<Utc>,
    ) -> Result<PathBuf> {
        let target = self
            .dir
            .join(persistent_name(created_at, task_id, original_filename));
        let dir = self.dir.clone();

        info!(
            "Moving upload for task {} to persistent storage: {:?}",
            task_id, target
        );

        let written = tokio::task::spawn_blocking(move || write_atomically(&dir, &target, &bytes))
            .await
            .context("Storage worker panicked")??;

        info!("File stored successfully: {:?}", written);
        Ok(written)
    }
}

fn write_atomically(dir: &Path, target: &Path, bytes: &[u8]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create audio directory {}", dir.display()))?;

    // Hidden sibling so the rename stays on one filesystem.
    let mut staged = tempfile::Builder::new()
        .prefix(".upload-")
        .suffix(".part")
        .tempfile_in(dir)
        .with_context(|| format!("Failed to create staging file in {}", dir.display()))?;

    staged
        .write_all(bytes)
        .context("Failed to write audio content")?;
    staged
        .as_file()
        .sync_all()
        .context("Failed to flush audio content to disk")?;

    let written = staged.as_file().metadata()?.len();
    if written != bytes.len() as u64 {
        bail!(
            "Short write: {} of {} bytes staged",
            written,
            bytes.len()
        );
    }

    // A dropped staging file removes itself, so failures leave nothing behind.
    staged
        .persist_noclobber(target)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to move audio into {}", target.display()))?;

    debug!("Persisted {} bytes to {:?}", bytes.len(), target);
    Ok(target.to_path_buf())
}

pub fn persistent_name(created_at: DateTime<Utc>, task_id: TaskId, original_filename: &str) -> String {
    let timestamp = created_at.with_timezone(&Local).format("%Y%m%d_%H%M%S");
    format!("{}_{}_{}", timestamp, task_id, sanitize_filename(original_filename))
}

/// Final path component of a client-supplied name, with characters that are
/// unsafe in file names replaced by `_`.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    let cleaned = UNSAFE_CHARS.replace_all(base, "_").into_owned();

    match cleaned.as_str() {
        "" | "." | ".." => "audio".to_string(),
        _ => cleaned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn listing(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("meeting.mp3"), "meeting.mp3");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\họp nhóm.m4a"), "họp nhóm.m4a");
        assert_eq!(sanitize_filename("a\u{0}b?.wav"), "a_b_.wav");
        assert_eq!(sanitize_filename("dir/"), "audio");
        assert_eq!(sanitize_filename(".."), "audio");
    }

    #[test]
    fn test_persistent_name_layout() {
        let id = Uuid::new_v4();
        let created = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let name = persistent_name(created, id, "meeting.mp3");

        let expected_stamp = created.with_timezone(&Local).format("%Y%m%d_%H%M%S").to_string();
        assert_eq!(name, format!("{}_{}_meeting.mp3", expected_stamp, id));
        assert_eq!(expected_stamp.len(), 15);
    }

    #[tokio::test]
    async fn test_relocate_writes_full_content() {
        let dir = tempfile::tempdir().unwrap();
        let relocator = FileRelocator::new(dir.path().join("audio"));
        let id = Uuid::new_v4();
        let payload = Bytes::from(vec![7u8; 64 * 1024]);

        let path = relocator
            .relocate(payload.clone(), "meeting.mp3", id, Utc::now())
            .await
            .unwrap();

        assert!(path.starts_with(relocator.dir()));
        assert_eq!(std::fs::read(&path).unwrap(), payload.to_vec());
        let names = listing(relocator.dir());
        assert_eq!(names.len(), 1, "no staging leftovers: {names:?}");
        assert!(names[0].ends_with(&format!("_{}_meeting.mp3", id)));
    }

    #[tokio::test]
    async fn test_relocate_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let relocator = FileRelocator::new(dir.path());
        let id = Uuid::new_v4();
        let created = Utc::now();

        let first = relocator
            .relocate(Bytes::from_static(b"first"), "a.wav", id, created)
            .await
            .unwrap();
        let second = relocator
            .relocate(Bytes::from_static(b"second"), "a.wav", id, created)
            .await;

        assert!(second.is_err());
        assert_eq!(std::fs::read(&first).unwrap(), b"first");
        assert_eq!(listing(dir.path()).len(), 1);
    }

    #[tokio::test]
    async fn test_relocate_fails_cleanly_when_dir_unusable() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();

        let relocator = FileRelocator::new(&blocker);
        let result = relocator
            .relocate(Bytes::from_static(b"audio"), "a.wav", Uuid::new_v4(), Utc::now())
            .await;

        let err = result.unwrap_err();
        assert!(format!("{err:#}").contains("audio directory"));
        assert_eq!(listing(dir.path()), vec!["not-a-dir".to_string()]);
    }
}
