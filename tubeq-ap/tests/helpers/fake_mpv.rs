//! Fake player IPC endpoint
//!
//! Listens on a unix socket, records every decoded request line, and answers
//! correlated requests with whatever lines the responder returns.

#![cfg(unix)]

use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::task::JoinHandle;
use tubeq_ap::config::PlayerSettings;

/// Lines to write back for one request carrying a `request_id`
pub type Responder = Arc<dyn Fn(&Value) -> Vec<String> + Send + Sync>;

pub struct FakeMpv {
    pub socket_path: PathBuf,
    received: Arc<Mutex<Vec<Value>>>,
    task: JoinHandle<()>,
}

impl FakeMpv {
    pub fn start(dir: &Path, responder: Responder) -> Self {
        let socket_path = dir.join("mpv.sock");
        let listener = UnixListener::bind(&socket_path).unwrap();
        let received = Arc::new(Mutex::new(Vec::new()));

        let log = received.clone();
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let log = log.clone();
                let responder = responder.clone();
                tokio::spawn(async move {
                    let (read, mut write) = stream.into_split();
                    let mut lines = BufReader::new(read).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        let Ok(request) = serde_json::from_str::<Value>(&line) else {
                            continue;
                        };
                        log.lock().unwrap().push(request.clone());
                        if request.get("request_id").is_some() {
                            for reply in responder(&request) {
                                if write.write_all(format!("{}\n", reply).as_bytes()).await.is_err() {
                                    return;
                                }
                            }
                        }
                    }
                });
            }
        });

        Self {
            socket_path,
            received,
            task,
        }
    }

    /// Answer every request with `{"error": "success", "data": data}`
    pub fn replying_with(dir: &Path, data: Value) -> Self {
        Self::start(
            dir,
            Arc::new(move |request: &Value| {
                vec![serde_json::json!({
                    "request_id": request["request_id"],
                    "error": "success",
                    "data": data,
                })
                .to_string()]
            }),
        )
    }

    pub fn received(&self) -> Vec<Value> {
        self.received.lock().unwrap().clone()
    }

    /// Wait until at least `n` requests have arrived
    pub async fn wait_for_requests(&self, n: usize) -> Vec<Value> {
        super::wait_for(&format!("{} IPC requests", n), || {
            self.received.lock().unwrap().len() >= n
        })
        .await;
        self.received()
    }

    /// Player settings pointing at this endpoint, with short timings
    pub fn settings(&self) -> PlayerSettings {
        let mut settings = PlayerSettings::new("mpv", &self.socket_path);
        settings.retry_backoff = Duration::from_millis(20);
        settings.request_timeout = Duration::from_millis(500);
        settings
    }
}

impl Drop for FakeMpv {
    fn drop(&mut self) {
        self.task.abort();
    }
}
