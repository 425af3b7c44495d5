use std::time::Duration;

use reqwest::header::CACHE_CONTROL;
use thiserror::Error;
use tracing::debug;

use crate::models::ScoutRecord;

pub const BRIDGE_PORT: u16 = 8000;
const DEFAULT_HOST: &str = "localhost";

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("bridge answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("bridge returned an unreadable body: {0}")]
    Body(String),
}

/// Reduces whatever the user typed as the bridge address to a bare host and
/// builds the bridge base URL from it.
pub fn bridge_url(host: &str) -> String {
    let trimmed = host.trim();
    let without_scheme = trimmed
        .strip_prefix("http://")
        .or_else(|| trimmed.strip_prefix("https://"))
        .unwrap_or(trimmed);
    let bare = without_scheme
        .split(['/', ':'])
        .next()
        .filter(|h| !h.is_empty())
        .unwrap_or(DEFAULT_HOST);
    format!("http://{bare}:{BRIDGE_PORT}")
}

#[derive(Debug, Clone)]
pub struct SyncClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl SyncClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SyncError> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn fetch_remote(&self) -> Result<String, SyncError> {
        let url = format!("{}/api/csv", self.base_url);
        debug!(%url, "pulling dataset from bridge");

        let response = self
            .http_client
            .get(&url)
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .text()
            .await
            .map_err(|e| SyncError::Body(e.to_string()))
    }

    pub async fn push_remote(&self, records: &[ScoutRecord]) -> Result<(), SyncError> {
        let url = format!("{}/api/scout/upload", self.base_url);
        debug!(%url, records = records.len(), "pushing records to bridge");

        let response = self.http_client.post(&url).json(records).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};

    #[derive(Clone, Default)]
    pub(crate) struct FakeBridge {
        pub csv: Arc<Mutex<Option<String>>>,
        pub uploads: Arc<Mutex<Vec<serde_json::Value>>>,
    }

    /// Serves `/api/csv` and `/api/scout/upload` on an ephemeral port and
    /// returns its base URL. A `None` CSV answers 500.
    pub(crate) async fn spawn_bridge(bridge: FakeBridge) -> String {
        let csv = bridge.csv.clone();
        let uploads = bridge.uploads.clone();
        let app = Router::new()
            .route(
                "/api/csv",
                get(move || {
                    let csv = csv.clone();
                    async move {
                        match csv.lock().expect("csv lock").clone() {
                            Some(body) => (StatusCode::OK, body),
                            None => (StatusCode::INTERNAL_SERVER_ERROR, "boom".to_string()),
                        }
                    }
                }),
            )
            .route(
                "/api/scout/upload",
                post(move |Json(body): Json<serde_json::Value>| {
                    let uploads = uploads.clone();
                    async move {
                        uploads.lock().expect("uploads lock").push(body);
                        StatusCode::OK
                    }
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}")
    }

    /// A base URL nothing is listening on.
    pub(crate) async fn closed_url() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");
        drop(listener);
        format!("http://{addr}")
    }

    #[test]
    fn bridge_url_strips_scheme_and_port() {
        assert_eq!(bridge_url("192.168.1.20"), "http://192.168.1.20:8000");
        assert_eq!(bridge_url("http://192.168.1.20:5000"), "http://192.168.1.20:8000");
        assert_eq!(bridge_url("https://bridge.local/api"), "http://bridge.local:8000");
        assert_eq!(bridge_url("  "), "http://localhost:8000");
    }

    #[tokio::test]
    async fn fetch_returns_csv_body() {
        let bridge = FakeBridge::default();
        *bridge.csv.lock().expect("csv lock") = Some("team_num,match_num\n1,2\n".to_string());
        let url = spawn_bridge(bridge).await;

        let client = SyncClient::new(url, Duration::from_secs(2)).expect("client builds");
        let body = client.fetch_remote().await.expect("fetch succeeds");
        assert_eq!(body, "team_num,match_num\n1,2\n");
    }

    #[tokio::test]
    async fn fetch_reports_server_errors() {
        let url = spawn_bridge(FakeBridge::default()).await;
        let client = SyncClient::new(url, Duration::from_secs(2)).expect("client builds");
        let err = client.fetch_remote().await.expect_err("500 is a failure");
        assert!(matches!(err, SyncError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn push_posts_records_as_json() {
        let bridge = FakeBridge::default();
        let uploads = bridge.uploads.clone();
        let url = spawn_bridge(bridge).await;
        let client = SyncClient::new(format!("{url}/"), Duration::from_secs(2)).expect("client builds");

        let record = crate::normalize::normalize_row(
            &serde_json::json!({ "team_num": 118, "match_num": 5 })
                .as_object()
                .cloned()
                .expect("object"),
        );
        client.push_remote(&[record]).await.expect("push succeeds");

        let uploads = uploads.lock().expect("uploads lock");
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0][0]["team_num"], 118);
    }

    #[tokio::test]
    async fn unreachable_bridge_is_a_network_error() {
        let client = SyncClient::new(closed_url().await, Duration::from_secs(2)).expect("client builds");
        let err = client.fetch_remote().await.expect_err("nothing listening");
        assert!(matches!(err, SyncError::Network(_)));
        assert!(client.push_remote(&[]).await.is_err());
    }
}
