//! Cache-aware audio fetcher
//!
//! Turns `(locator, id)` into a local file under the cache directory by
//! running the external downloader. A file already present for `id` is
//! returned without running anything.
//!
//! All fetches are serialized: one exclusive lock spans the cache check, the
//! downloader run and the output lookup, so only one downloader process ever
//! writes into the cache directory.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Extensions recognized as a cache hit, in lookup order
pub const CACHED_EXTENSIONS: [&str; 6] = ["m4a", "mp3", "webm", "opus", "aac", "wav"];

/// Container requested from the downloader before falling back to best audio
pub const PREFERRED_EXTENSION: &str = "m4a";

/// Suffixes the downloader uses for in-progress files
const PARTIAL_SUFFIXES: [&str; 3] = [".part", ".ytdl", ".temp"];

/// Source of local audio files
#[async_trait]
pub trait AudioFetcher: Send + Sync {
    /// Return a local path holding the audio for `locator`, keyed by `id`
    async fn fetch(&self, locator: &str, id: &str) -> Result<PathBuf>;
}

/// Fetcher backed by yt-dlp (or a compatible tool)
pub struct YtDlpFetcher {
    tool: PathBuf,
    cache_dir: PathBuf,
    lock: Mutex<()>,
}

impl YtDlpFetcher {
    /// Create a fetcher, creating the cache directory if needed
    pub fn new(tool: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Result<Self> {
        let cache_dir = cache_dir.into();
        std::fs::create_dir_all(&cache_dir)?;

        Ok(Self {
            tool: tool.into(),
            cache_dir,
            lock: Mutex::new(()),
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Existing cached file for `id`, if any
    pub fn cached_path(&self, id: &str) -> Option<PathBuf> {
        CACHED_EXTENSIONS
            .iter()
            .map(|ext| self.cache_dir.join(format!("{}.{}", id, ext)))
            .find(|path| path.is_file())
    }

    /// Arguments for one download
    ///
    /// `-f bestaudio[ext=m4a]/bestaudio --no-playlist --no-mtime -o <cache>/<id>.%(ext)s <locator>`
    pub fn download_args(&self, locator: &str, id: &str) -> Vec<OsString> {
        let template = self.cache_dir.join(format!("{}.%(ext)s", id));
        vec![
            "-f".into(),
            format!("bestaudio[ext={}]/bestaudio", PREFERRED_EXTENSION).into(),
            "--no-playlist".into(),
            "--no-mtime".into(),
            "-o".into(),
            template.into_os_string(),
            locator.into(),
        ]
    }

    /// First completed file named `<id>.*` in the cache directory
    fn find_output(&self, id: &str) -> Result<Option<PathBuf>> {
        let prefix = format!("{}.", id);
        let mut matches: Vec<PathBuf> = std::fs::read_dir(&self.cache_dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                name.starts_with(&prefix)
                    && !PARTIAL_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
            })
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        matches.sort();
        Ok(matches.into_iter().next())
    }

    async fn run_downloader(&self, locator: &str, id: &str) -> Result<()> {
        let output = Command::new(&self.tool)
            .args(self.download_args(locator, id))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::Fetch {
                id: id.to_string(),
                reason: format!("failed to run {}: {}", self.tool.display(), e),
            })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = stderr
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .unwrap_or("no output");
        Err(Error::Fetch {
            id: id.to_string(),
            reason: format!("{} exited with {}: {}", self.tool.display(), output.status, detail.trim()),
        })
    }
}

#[async_trait]
impl AudioFetcher for YtDlpFetcher {
    async fn fetch(&self, locator: &str, id: &str) -> Result<PathBuf> {
        validate_id(id)?;

        let _guard = self.lock.lock().await;

        if let Some(path) = self.cached_path(id) {
            info!(id = %id, path = %path.display(), "File already cached");
            return Ok(path);
        }

        info!(id = %id, locator = %locator, "Starting download");
        self.run_downloader(locator, id).await?;

        match self.find_output(id)? {
            Some(path) => {
                info!(id = %id, path = %path.display(), "Download finished");
                Ok(path)
            }
            None => {
                warn!(id = %id, "Downloader succeeded but produced no file");
                Err(Error::Fetch {
                    id: id.to_string(),
                    reason: format!("download finished but no file matches {}.*", id),
                })
            }
        }
    }
}

/// Ids become file names in the shared cache directory
fn validate_id(id: &str) -> Result<()> {
    let bad = id.is_empty()
        || id.starts_with('.')
        || id.contains(['/', '\\'])
        || id.chars().any(char::is_control);
    if bad {
        debug!(id = %id, "Rejecting id unusable as a file name");
        return Err(Error::Fetch {
            id: id.to_string(),
            reason: "id is not usable as a cache file name".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_download_args_follow_invocation_contract() {
        let dir = TempDir::new().unwrap();
        let fetcher = YtDlpFetcher::new("yt-dlp", dir.path()).unwrap();

        let args: Vec<String> = fetcher
            .download_args("https://youtu.be/abc", "abc")
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(args[0], "-f");
        assert_eq!(args[1], "bestaudio[ext=m4a]/bestaudio");
        assert_eq!(args[2], "--no-playlist");
        assert_eq!(args[3], "--no-mtime");
        assert_eq!(args[4], "-o");
        assert_eq!(
            args[5],
            dir.path().join("abc.%(ext)s").to_string_lossy()
        );
        assert_eq!(args[6], "https://youtu.be/abc");
    }

    #[test]
    fn test_cached_path_checks_known_extensions() {
        let dir = TempDir::new().unwrap();
        let fetcher = YtDlpFetcher::new("yt-dlp", dir.path()).unwrap();
        assert_eq!(fetcher.cached_path("song"), None);

        std::fs::write(dir.path().join("song.flac"), b"x").unwrap();
        assert_eq!(fetcher.cached_path("song"), None);

        std::fs::write(dir.path().join("song.opus"), b"x").unwrap();
        assert_eq!(fetcher.cached_path("song"), Some(dir.path().join("song.opus")));
    }

    #[test]
    fn test_find_output_skips_partial_files() {
        let dir = TempDir::new().unwrap();
        let fetcher = YtDlpFetcher::new("yt-dlp", dir.path()).unwrap();

        std::fs::write(dir.path().join("id1.webm.part"), b"x").unwrap();
        std::fs::write(dir.path().join("id10.m4a"), b"x").unwrap();
        assert_eq!(fetcher.find_output("id1").unwrap(), None);

        std::fs::write(dir.path().join("id1.webm"), b"x").unwrap();
        assert_eq!(fetcher.find_output("id1").unwrap(), Some(dir.path().join("id1.webm")));
    }

    #[tokio::test]
    async fn test_unusable_ids_rejected_before_running_tool() {
        let dir = TempDir::new().unwrap();
        let fetcher = YtDlpFetcher::new("/nonexistent/tool", dir.path()).unwrap();

        for id in ["../escape", "a/b", ".hidden", ""] {
            let err = fetcher.fetch("https://example.com", id).await.unwrap_err();
            assert!(matches!(err, Error::Fetch { .. }), "{}: {:?}", id, err);
        }
    }

    #[tokio::test]
    async fn test_missing_tool_is_fetch_error() {
        let dir = TempDir::new().unwrap();
        let fetcher = YtDlpFetcher::new("/nonexistent/tool", dir.path()).unwrap();

        let err = fetcher.fetch("https://example.com/a", "abc").await.unwrap_err();
        match err {
            Error::Fetch { id, reason } => {
                assert_eq!(id, "abc");
                assert!(reason.contains("failed to run"), "{}", reason);
            }
            other => panic!("expected Fetch, got {:?}", other),
        }
    }
}
