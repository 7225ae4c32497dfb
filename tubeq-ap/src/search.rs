//! Track search through the downloader's flat-playlist JSON dump

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};
use tubeq_common::api::types::SearchResult;

/// Number of hits requested per search
pub const SEARCH_LIMIT: usize = 10;

#[async_trait]
pub trait TrackSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>>;
}

/// Search using `ytsearchN:<query> --dump-json --flat-playlist`
pub struct YtDlpSearch {
    tool: PathBuf,
    cookies: Option<PathBuf>,
}

impl YtDlpSearch {
    pub fn new(tool: impl Into<PathBuf>, cookies: Option<PathBuf>) -> Self {
        Self {
            tool: tool.into(),
            cookies,
        }
    }

    fn search_args(&self, query: &str) -> Vec<String> {
        let mut args = vec![
            format!("ytsearch{}:{}", SEARCH_LIMIT, query),
            "--dump-json".to_string(),
            "--flat-playlist".to_string(),
            "--no-warnings".to_string(),
        ];
        if let Some(cookies) = self.cookies.as_ref().filter(|p| p.is_file()) {
            args.push("--cookies".to_string());
            args.push(cookies.to_string_lossy().into_owned());
        }
        args
    }
}

#[async_trait]
impl TrackSearch for YtDlpSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::BadRequest("Missing query".to_string()));
        }

        let output = Command::new(&self.tool)
            .args(self.search_args(query))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::Search(format!("failed to run {}: {}", self.tool.display(), e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(status = %output.status, "Search failed: {}", stderr.trim());
            return Err(Error::Search(format!("{} exited with {}", self.tool.display(), output.status)));
        }

        let results = parse_search_output(&String::from_utf8_lossy(&output.stdout));
        debug!(query = %query, hits = results.len(), "Search complete");
        Ok(results)
    }
}

/// Subset of one flat-playlist JSON line
#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    uploader: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    webpage_url: Option<String>,
}

/// Parse line-delimited JSON, skipping lines that do not decode
pub fn parse_search_output(stdout: &str) -> Vec<SearchResult> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str::<Entry>(line).ok())
        .map(|entry| {
            let url = entry
                .url
                .filter(|u| !u.is_empty())
                .or(entry.webpage_url.filter(|u| !u.is_empty()))
                .unwrap_or_else(|| {
                    if entry.id.is_empty() {
                        String::new()
                    } else {
                        format!("https://www.youtube.com/watch?v={}", entry.id)
                    }
                });
            let thumbnail = if entry.id.is_empty() {
                String::new()
            } else {
                format!("https://i.ytimg.com/vi/{}/hqdefault.jpg", entry.id)
            };

            SearchResult {
                duration_seconds: entry.duration.filter(|d| *d > 0.0).map_or(0, |d| d as u64),
                uploader: entry.uploader.unwrap_or_default(),
                title: entry.title,
                id: entry.id,
                url,
                thumbnail,
            }
        })
        .collect()
}
