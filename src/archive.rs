//! Archive extraction and media collection.
//!
//! Every upload gets its own extraction workspace: a fresh temporary
//! directory beneath the configured base directory, removed on every
//! exit path. Extraction itself is blocking (the `zip` crate works on
//! `Read + Seek`), so the async entry point runs it on tokio's
//! blocking pool.

use crate::config::{MediaKind, MediaPolicy};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use thiserror::Error;
use tracing::warn;

/// Failure while opening or unpacking an uploaded archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The bytes are not a readable archive (corrupt, truncated, or
    /// not the claimed format).
    #[error("archive is not readable: {0}")]
    Malformed(#[from] zip::result::ZipError),

    /// Filesystem failure while reading the archive or writing entries.
    #[error("i/o failure during extraction: {0}")]
    Io(#[from] io::Error),
}

/// Scoped extraction directory for a single upload.
///
/// The directory lives beneath the configured base dir and is removed
/// when the workspace is dropped, so no invocation can see another's
/// files and failed runs leave nothing behind.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Creates a fresh workspace under `base`, creating `base` itself
    /// if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the base directory or the workspace cannot
    /// be created.
    pub fn create(base: &Path) -> io::Result<Self> {
        fs::create_dir_all(base)?;
        let dir = TempDir::with_prefix_in("upload-", base)?;
        Ok(Self { dir })
    }

    /// Path of the workspace directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Deterministic download path for a user's archive inside this
    /// workspace: `<user_id>_media.<ext>`.
    #[must_use]
    pub fn archive_path(&self, user_id: u64, ext: &str) -> PathBuf {
        self.path().join(format!("{user_id}_media.{ext}"))
    }

    /// Removes the workspace, logging instead of failing if the
    /// directory cannot be deleted.
    pub fn cleanup(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!("Failed to remove workspace {}: {}", path.display(), e);
        }
    }
}

/// One extracted file classified as supported media.
#[derive(Debug, Clone)]
pub struct MediaItem {
    /// Location of the file inside the workspace.
    pub path: PathBuf,
    /// File name, used for progress logging.
    pub file_name: String,
    /// How the file will be published.
    pub kind: MediaKind,
}

/// Unpacks `archive_path` into `dest` on the blocking pool.
///
/// Entry paths are sanitized by the `zip` crate, so a crafted archive
/// cannot write outside `dest`.
///
/// # Errors
///
/// Returns [`ArchiveError::Malformed`] for unreadable archives and
/// [`ArchiveError::Io`] for filesystem failures.
pub async fn extract(archive_path: PathBuf, dest: PathBuf) -> Result<(), ArchiveError> {
    tokio::task::spawn_blocking(move || extract_blocking(&archive_path, &dest))
        .await
        .map_err(|e| ArchiveError::Io(io::Error::other(e)))?
}

fn extract_blocking(archive_path: &Path, dest: &Path) -> Result<(), ArchiveError> {
    let file = fs::File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    archive.extract(dest)?;
    Ok(())
}

/// Lists the top-level files of `dir` that the policy classifies as
/// supported media, sorted by file name.
///
/// Directories and nested entries are not descended into; the uploaded
/// archive file itself carries an archive extension and therefore never
/// classifies as media.
///
/// # Errors
///
/// Returns an error if the directory cannot be read.
pub fn collect_media(dir: &Path, policy: &MediaPolicy) -> io::Result<Vec<MediaItem>> {
    let mut items = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if let Some(kind) = policy.classify(&file_name) {
            items.push(MediaItem {
                path: entry.path(),
                file_name,
                kind,
            });
        }
    }
    items.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use anyhow::Result;
    use std::io::Write;

    fn default_policy() -> MediaPolicy {
        Settings {
            telegram_token: "dummy".to_string(),
            extract_dir: "unused".to_string(),
            photo_extensions_str: None,
            video_extensions_str: None,
            archive_extensions_str: None,
        }
        .media_policy()
    }

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) -> Result<()> {
        let file = fs::File::create(path)?;
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (name, bytes) in entries {
            writer.start_file(*name, options)?;
            writer.write_all(bytes)?;
        }
        writer.finish()?;
        Ok(())
    }

    #[test]
    fn test_workspace_creates_base_and_cleans_up() -> Result<()> {
        let root = tempfile::tempdir()?;
        let base = root.path().join("extract_base");

        let ws = Workspace::create(&base)?;
        let ws_path = ws.path().to_path_buf();
        assert!(ws_path.is_dir());
        assert!(ws_path.starts_with(&base));

        ws.cleanup();
        assert!(!ws_path.exists());
        // Base directory survives for the next upload
        assert!(base.is_dir());
        Ok(())
    }

    #[test]
    fn test_archive_path_is_deterministic() -> Result<()> {
        let root = tempfile::tempdir()?;
        let ws = Workspace::create(root.path())?;
        let path = ws.archive_path(42, "zip");
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("42_media.zip")
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_extract_and_collect_media() -> Result<()> {
        let root = tempfile::tempdir()?;
        let ws = Workspace::create(root.path())?;
        let archive = ws.archive_path(7, "zip");
        write_zip(
            &archive,
            &[
                ("a.jpg", b"jpg-bytes".as_slice()),
                ("b.mp4", b"mp4-bytes".as_slice()),
                ("c.txt", b"not media".as_slice()),
                ("d.png", b"png-bytes".as_slice()),
            ],
        )?;

        extract(archive, ws.path().to_path_buf()).await?;

        let media = collect_media(ws.path(), &default_policy())?;
        let names: Vec<&str> = media.iter().map(|m| m.file_name.as_str()).collect();
        // c.txt is unsupported and the downloaded .zip never classifies
        assert_eq!(names, vec!["a.jpg", "b.mp4", "d.png"]);
        assert_eq!(media[0].kind, MediaKind::Photo);
        assert_eq!(media[1].kind, MediaKind::Video);
        assert_eq!(media[2].kind, MediaKind::Photo);
        Ok(())
    }

    #[tokio::test]
    async fn test_extract_rejects_corrupt_bytes() -> Result<()> {
        let root = tempfile::tempdir()?;
        let ws = Workspace::create(root.path())?;
        let archive = ws.archive_path(7, "zip");
        fs::write(&archive, b"definitely not a zip archive")?;

        let result = extract(archive, ws.path().to_path_buf()).await;
        assert!(matches!(result, Err(ArchiveError::Malformed(_))));
        Ok(())
    }

    #[test]
    fn test_collect_media_skips_directories() -> Result<()> {
        let root = tempfile::tempdir()?;
        let ws = Workspace::create(root.path())?;
        fs::create_dir(ws.path().join("nested.jpg"))?;
        fs::write(ws.path().join("top.jpg"), b"bytes")?;

        let media = collect_media(ws.path(), &default_policy())?;
        assert_eq!(media.len(), 1);
        assert_eq!(media[0].file_name, "top.jpg");
        Ok(())
    }
}
