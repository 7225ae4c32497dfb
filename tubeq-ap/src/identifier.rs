//! Stable short identifiers for locators
//!
//! A supplied id always wins. Otherwise a video id is extracted from known
//! URL shapes, and anything else is keyed by the first 12 hex characters of
//! the SHA-256 of the locator. Pure: the same input always yields the same id.

use sha2::{Digest, Sha256};
use url::Url;

/// Length of the hash-derived fallback id
const HASH_ID_LEN: usize = 12;

/// Length of a video id
const VIDEO_ID_LEN: usize = 11;

/// Resolve the id for `locator`
pub fn resolve(locator: &str, supplied_id: &str) -> String {
    let supplied = supplied_id.trim();
    if !supplied.is_empty() {
        return supplied.to_string();
    }

    if let Some(id) = extract_video_id(locator) {
        return id;
    }

    hash_id(locator)
}

/// First 12 hex characters of SHA-256(locator)
pub fn hash_id(locator: &str) -> String {
    let digest = Sha256::digest(locator.as_bytes());
    let mut id = hex::encode(digest);
    id.truncate(HASH_ID_LEN);
    id
}

/// Extract a video id from watch / short-link / shorts / embed / live URLs
pub fn extract_video_id(locator: &str) -> Option<String> {
    let url = Url::parse(locator.trim()).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    let candidate = match host {
        "youtu.be" => url.path_segments()?.next().map(str::to_string),
        "youtube.com" | "m.youtube.com" | "music.youtube.com" | "youtube-nocookie.com" => {
            let mut segments = url.path_segments()?;
            match segments.next() {
                Some("watch") => url
                    .query_pairs()
                    .find(|(k, _)| k == "v")
                    .map(|(_, v)| v.into_owned()),
                Some("shorts") | Some("embed") | Some("live") | Some("v") => {
                    segments.next().map(str::to_string)
                }
                _ => None,
            }
        }
        _ => None,
    }?;

    is_video_id(&candidate).then_some(candidate)
}

fn is_video_id(s: &str) -> bool {
    s.len() == VIDEO_ID_LEN
        && s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
