//! Player JSON IPC client
//!
//! Wire format: one JSON object per line.
//! - Request: `{"command": [verb, args...]}` or, when a reply is wanted,
//!   `{"command": [...], "request_id": <int>}`
//! - Reply: `{"request_id": <int>, "error": "success" | <detail>, "data": <any>}`
//!
//! The player interleaves unsolicited event lines (`{"event": ...}`) on the
//! same connection, so a correlated request reads until the line carrying its
//! own `request_id` shows up.
//!
//! Two call shapes:
//! - [`IpcClient::send_command`]: fire-and-forget on a fresh connection,
//!   retried on connect failure with a fixed backoff
//! - [`IpcClient::request`]: correlated, single attempt, bounded by a deadline

use crate::config::PlayerSettings;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, trace, warn};

/// Value of the `error` field on a successful reply
pub const SUCCESS: &str = "success";

/// Typed view of a reply's `data` field
///
/// Callers pick the variant they expect for the property they asked for.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<PropertyValue>),
    Map(BTreeMap<String, PropertyValue>),
}

impl PropertyValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[PropertyValue]> {
        match self {
            PropertyValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, PropertyValue>> {
        match self {
            PropertyValue::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Field of a map value
    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.as_map().and_then(|map| map.get(key))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PropertyValue::Null)
    }
}

#[derive(Debug, Serialize)]
struct Request<'a> {
    command: &'a [Value],
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<u64>,
}

/// Any line received from the player: a reply or an event
#[derive(Debug, Deserialize)]
struct Incoming {
    #[serde(default)]
    request_id: Option<u64>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    data: Option<PropertyValue>,
    #[serde(default)]
    event: Option<String>,
}

/// Encode one newline-terminated request
pub fn encode_frame(command: &[Value], request_id: Option<u64>) -> Result<Vec<u8>> {
    let mut frame = serde_json::to_vec(&Request {
        command,
        request_id,
    })?;
    frame.push(b'\n');
    Ok(frame)
}

trait IpcStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> IpcStream for T {}

#[cfg(unix)]
async fn connect(path: &Path) -> std::io::Result<Box<dyn IpcStream>> {
    let stream = tokio::net::UnixStream::connect(path).await?;
    Ok(Box::new(stream))
}

#[cfg(windows)]
async fn connect(path: &Path) -> std::io::Result<Box<dyn IpcStream>> {
    let pipe = tokio::net::windows::named_pipe::ClientOptions::new().open(path)?;
    Ok(Box::new(pipe))
}

#[cfg(not(any(unix, windows)))]
async fn connect(path: &Path) -> std::io::Result<Box<dyn IpcStream>> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        format!("no IPC transport for {} on this platform", path.display()),
    ))
}

/// Whether something is accepting connections at `path`
#[cfg(windows)]
pub(crate) async fn endpoint_ready(path: &Path) -> bool {
    tokio::net::windows::named_pipe::ClientOptions::new()
        .open(path)
        .is_ok()
}

/// Whether the socket file at `path` exists yet
#[cfg(not(windows))]
pub(crate) async fn endpoint_ready(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Request/response client for the player's IPC endpoint
pub struct IpcClient {
    socket_path: PathBuf,
    retry_attempts: u32,
    retry_backoff: Duration,
    request_timeout: Duration,
    next_request_id: AtomicU64,
}

impl IpcClient {
    pub fn new(settings: &PlayerSettings) -> Self {
        Self {
            socket_path: settings.socket_path.clone(),
            retry_attempts: settings.retry_attempts.max(1),
            retry_backoff: settings.retry_backoff,
            request_timeout: settings.request_timeout,
            next_request_id: AtomicU64::new(1),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Fire-and-forget: connect (with retries), write one frame, close
    pub async fn send_command(&self, command: Vec<Value>) -> Result<()> {
        let frame = encode_frame(&command, None)?;

        let mut last_err = None;
        for attempt in 1..=self.retry_attempts {
            match connect(&self.socket_path).await {
                Ok(mut stream) => {
                    trace!(?command, "IPC command");
                    stream
                        .write_all(&frame)
                        .await
                        .map_err(|e| Error::PlayerIpc(format!("write failed: {}", e)))?;
                    stream
                        .flush()
                        .await
                        .map_err(|e| Error::PlayerIpc(format!("write failed: {}", e)))?;
                    // The player may already have closed its end
                    let _ = stream.shutdown().await;
                    return Ok(());
                }
                Err(e) => {
                    debug!(attempt, error = %e, "IPC connect failed");
                    last_err = Some(e);
                    if attempt < self.retry_attempts {
                        tokio::time::sleep(self.retry_backoff).await;
                    }
                }
            }
        }

        let detail = last_err.map_or_else(|| "no attempt made".to_string(), |e| e.to_string());
        warn!(socket = %self.socket_path.display(), "Player unreachable: {}", detail);
        Err(Error::PlayerIpc(format!(
            "unreachable at {}: {}",
            self.socket_path.display(),
            detail
        )))
    }

    /// Correlated request: write with a fresh `request_id`, read until the
    /// matching reply arrives or the deadline passes
    pub async fn request(&self, command: Vec<Value>) -> Result<PropertyValue> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let frame = encode_frame(&command, Some(request_id))?;

        let mut stream = connect(&self.socket_path).await.map_err(|e| {
            Error::PlayerIpc(format!(
                "unreachable at {}: {}",
                self.socket_path.display(),
                e
            ))
        })?;
        stream
            .write_all(&frame)
            .await
            .map_err(|e| Error::PlayerIpc(format!("write failed: {}", e)))?;

        match tokio::time::timeout(self.request_timeout, read_reply(stream, request_id)).await {
            Ok(result) => result,
            Err(_) => Err(Error::PlayerIpc(format!(
                "no reply to request {} within {:?}",
                request_id, self.request_timeout
            ))),
        }
    }
}

async fn read_reply(stream: Box<dyn IpcStream>, request_id: u64) -> Result<PropertyValue> {
    let mut lines = BufReader::new(stream).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| Error::PlayerIpc(format!("read failed: {}", e)))?
    {
        let message: Incoming = match serde_json::from_str(&line) {
            Ok(message) => message,
            Err(e) => {
                debug!(error = %e, "Ignoring undecodable IPC line");
                continue;
            }
        };

        if message.request_id != Some(request_id) {
            if let Some(event) = &message.event {
                trace!(event = %event, "Skipping player event");
            }
            continue;
        }

        return match message.error.as_deref() {
            Some(detail) if detail != SUCCESS => Err(Error::PlayerIpc(detail.to_string())),
            _ => Ok(message.data.unwrap_or_default()),
        };
    }

    Err(Error::PlayerIpc(format!(
        "connection closed before reply to request {}",
        request_id
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fire_and_forget_frame_has_no_request_id() {
        let frame = encode_frame(&[json!("cycle"), json!("pause")], None).unwrap();
        assert_eq!(frame, b"{\"command\":[\"cycle\",\"pause\"]}\n");
    }

    #[test]
    fn test_correlated_frame_carries_request_id() {
        let frame = encode_frame(&[json!("get_property"), json!("path")], Some(7)).unwrap();
        let text = String::from_utf8(frame).unwrap();
        assert!(text.ends_with('\n'));
        let value: Value = serde_json::from_str(text.trim_end()).unwrap();
        assert_eq!(value["request_id"], 7);
        assert_eq!(value["command"][1], "path");
    }

    #[test]
    fn test_property_value_variants() {
        let value: PropertyValue = serde_json::from_str(
            r#"[{"filename": "/c/a.m4a", "current": true, "id": 1}, null, 2.5, "x"]"#,
        )
        .unwrap();

        let items = value.as_list().unwrap();
        assert_eq!(items[0].get("filename").and_then(PropertyValue::as_str), Some("/c/a.m4a"));
        assert_eq!(items[0].get("current").and_then(PropertyValue::as_bool), Some(true));
        assert_eq!(items[0].get("id").and_then(PropertyValue::as_f64), Some(1.0));
        assert!(items[1].is_null());
        assert_eq!(items[2].as_f64(), Some(2.5));
        assert_eq!(items[3].as_str(), Some("x"));
        assert_eq!(items[3].as_f64(), None);
    }

    #[test]
    fn test_event_line_decodes_as_incoming() {
        let msg: Incoming = serde_json::from_str(r#"{"event": "playback-restart"}"#).unwrap();
        assert_eq!(msg.request_id, None);
        assert_eq!(msg.event.as_deref(), Some("playback-restart"));

        let msg: Incoming =
            serde_json::from_str(r#"{"request_id": 3, "error": "success", "data": null}"#).unwrap();
        assert_eq!(msg.request_id, Some(3));
        assert_eq!(msg.data, None);
    }
}
