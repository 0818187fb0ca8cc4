//! Configuration and settings management
//!
//! Loads settings from environment variables and defines the media
//! classification policy.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Default base directory for extraction workspaces.
pub const DEFAULT_EXTRACT_DIR: &str = "extracted_files";

/// Maximum document size the bot will download (20 MB).
///
/// The Bot API refuses `getFile` for anything larger, so oversized
/// uploads are rejected before the status message is even sent.
pub const MAX_ARCHIVE_BYTES: u32 = 20 * 1024 * 1024;

/// Extensions treated as photos when no override is configured.
const DEFAULT_PHOTO_EXTENSIONS: &str = "jpg,jpeg,png";
/// Extensions treated as videos when no override is configured.
const DEFAULT_VIDEO_EXTENSIONS: &str = "mp4,mkv,mov";
/// Extensions accepted as uploadable archives when no override is configured.
const DEFAULT_ARCHIVE_EXTENSIONS: &str = "zip";

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub telegram_token: String,

    /// Base directory under which per-upload workspaces are created
    #[serde(default = "default_extract_dir")]
    pub extract_dir: String,

    /// Comma-separated list of photo extensions
    #[serde(rename = "photo_extensions")]
    pub photo_extensions_str: Option<String>,

    /// Comma-separated list of video extensions
    #[serde(rename = "video_extensions")]
    pub video_extensions_str: Option<String>,

    /// Comma-separated list of accepted archive extensions
    #[serde(rename = "archive_extensions")]
    pub archive_extensions_str: Option<String>,
}

fn default_extract_dir() -> String {
    DEFAULT_EXTRACT_DIR.to_string()
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(File::with_name("config/default").required(false))
            // Add in the current environment file
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Add in a local configuration file
            // This file shouldn't be checked into git
            .add_source(File::with_name("config/local").required(false))
            // Add in settings from the environment (with a prefix of APP)
            .add_source(Environment::with_prefix("APP").separator("__"))
            // Also add settings from environment variables directly (without prefix)
            // ignore_empty treats empty env vars as unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        s.try_deserialize()
    }

    /// Base directory for extraction workspaces.
    #[must_use]
    pub fn extract_dir(&self) -> PathBuf {
        PathBuf::from(&self.extract_dir)
    }

    /// Builds the media classification policy from the configured
    /// allow-lists, falling back to the defaults for unset lists.
    #[must_use]
    pub fn media_policy(&self) -> MediaPolicy {
        MediaPolicy {
            photos: parse_extension_list(
                self.photo_extensions_str
                    .as_deref()
                    .unwrap_or(DEFAULT_PHOTO_EXTENSIONS),
            ),
            videos: parse_extension_list(
                self.video_extensions_str
                    .as_deref()
                    .unwrap_or(DEFAULT_VIDEO_EXTENSIONS),
            ),
            archives: parse_extension_list(
                self.archive_extensions_str
                    .as_deref()
                    .unwrap_or(DEFAULT_ARCHIVE_EXTENSIONS),
            ),
        }
    }
}

/// Splits a configured extension list on commas, semicolons or
/// whitespace, lowercasing each entry and dropping leading dots.
fn parse_extension_list(raw: &str) -> HashSet<String> {
    raw.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(|token| token.trim_start_matches('.').to_ascii_lowercase())
        .collect()
}

/// Kind of supported media, decided purely by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Published via `sendPhoto`
    Photo,
    /// Published via `sendVideo`
    Video,
}

/// Extension allow-lists governing what the relay accepts and posts.
///
/// This is the only policy surface of the system: classification is by
/// extension alone, no content sniffing.
#[derive(Debug, Clone)]
pub struct MediaPolicy {
    photos: HashSet<String>,
    videos: HashSet<String>,
    archives: HashSet<String>,
}

impl MediaPolicy {
    /// Classifies a file name into a supported media kind, or `None`
    /// for unsupported entries.
    #[must_use]
    pub fn classify(&self, file_name: &str) -> Option<MediaKind> {
        let ext = extension_of(file_name)?;
        if self.photos.contains(&ext) {
            Some(MediaKind::Photo)
        } else if self.videos.contains(&ext) {
            Some(MediaKind::Video)
        } else {
            None
        }
    }

    /// Whether the file name carries a recognized archive extension.
    #[must_use]
    pub fn is_archive(&self, file_name: &str) -> bool {
        extension_of(file_name).is_some_and(|ext| self.archives.contains(&ext))
    }

    /// The lowercased archive extension of `file_name`, if recognized.
    #[must_use]
    pub fn archive_extension(&self, file_name: &str) -> Option<String> {
        extension_of(file_name).filter(|ext| self.archives.contains(ext))
    }
}

fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}
