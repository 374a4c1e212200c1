use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::StoreError;
use crate::store::retry::RetryPolicy;
use crate::store::traits::{ContentStore, RemoteStore};
use crate::store::types::{filter_params, Filter, SelectQuery};

/// HTTP client for the hosted relational API (`/rest/v1`) and object storage (`/storage/v1`)
#[derive(Clone)]
pub struct RestStore {
    client: Client,
    base_url: String,
    api_key: String,
    access_token: Option<String>,
    retry: RetryPolicy,
}

/// Error body returned by the store; both the REST and the storage API use `message`
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl RestStore {
    pub fn with_timeout(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let api_key = api_key.into();
        if base_url.is_empty() || api_key.is_empty() {
            return Err(StoreError::Config(
                "store URL and API key must both be set".into(),
            ));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            api_key,
            access_token: None,
            retry: RetryPolicy::default(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, StoreError> {
        let store = Self::with_timeout(&config.store_url, &config.store_api_key, config.http_timeout)?
            .with_retry_policy(config.retry_policy());
        Ok(match &config.access_token {
            Some(token) => store.with_access_token(token),
            None => store,
        })
    }

    /// Use a signed-in session's token instead of the anonymous key
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn bearer(&self) -> &str {
        self.access_token.as_deref().unwrap_or(&self.api_key)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn object_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, path)
    }

    async fn error_from(response: Response) -> StoreError {
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        let body: Option<ErrorBody> = serde_json::from_str(&text).ok();

        let (code, message) = match body {
            Some(body) => (body.code, body.message.or(body.error).unwrap_or(text)),
            None => (None, text),
        };
        warn!(status, code = ?code, message = %message, "Store request rejected");

        StoreError::Api {
            status,
            code,
            message,
        }
    }
}

#[async_trait]
impl RemoteStore for RestStore {
    async fn select(&self, table: &str, query: &SelectQuery) -> Result<Vec<Value>, StoreError> {
        let url = &self.table_url(table);
        let params = &query.to_params();
        debug!(table, ?params, "Selecting rows");

        self.retry
            .run("select", move || async move {
                let response = self
                    .client
                    .get(url)
                    .query(params)
                    .header("apikey", &self.api_key)
                    .bearer_auth(self.bearer())
                    .send()
                    .await?;

                if !response.status().is_success() {
                    return Err(Self::error_from(response).await);
                }

                match response.json::<Value>().await? {
                    Value::Array(rows) => Ok(rows),
                    Value::Null => Ok(Vec::new()),
                    row => Ok(vec![row]),
                }
            })
            .await
    }

    async fn insert(&self, table: &str, record: Value) -> Result<Value, StoreError> {
        let url = &self.table_url(table);
        let record = &record;
        debug!(table, "Inserting row");

        self.retry
            .run("insert", move || async move {
                let response = self
                    .client
                    .post(url)
                    .header("apikey", &self.api_key)
                    .header("Prefer", "return=representation")
                    .bearer_auth(self.bearer())
                    .json(record)
                    .send()
                    .await?;

                if !response.status().is_success() {
                    return Err(Self::error_from(response).await);
                }

                // Inserts come back as a one-element array
                match response.json::<Value>().await? {
                    Value::Array(rows) => rows.into_iter().next().ok_or_else(|| {
                        StoreError::Decode(format!("insert into {} returned no rows", table))
                    }),
                    row => Ok(row),
                }
            })
            .await
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<(), StoreError> {
        let url = &self.table_url(table);
        let params = &filter_params(filters);
        debug!(table, ?params, "Deleting rows");

        self.retry
            .run("delete", move || async move {
                let response = self
                    .client
                    .delete(url)
                    .query(params)
                    .header("apikey", &self.api_key)
                    .bearer_auth(self.bearer())
                    .send()
                    .await?;

                if !response.status().is_success() {
                    return Err(Self::error_from(response).await);
                }
                Ok(())
            })
            .await
    }
}

#[async_trait]
impl ContentStore for RestStore {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<(), StoreError> {
        let url = &self.object_url(bucket, path);
        let bytes = &bytes;
        debug!(bucket, path, size = bytes.len(), "Uploading object");

        self.retry
            .run("upload", move || async move {
                let response = self
                    .client
                    .post(url)
                    .header("apikey", &self.api_key)
                    .header("Content-Type", content_type)
                    .bearer_auth(self.bearer())
                    .body(bytes.clone())
                    .send()
                    .await?;

                if !response.status().is_success() {
                    return Err(Self::error_from(response).await);
                }
                Ok(())
            })
            .await
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, bucket, path
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RemoteStoreExt;
    use serde_json::json;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    fn store(base_url: &str) -> RestStore {
        RestStore::with_timeout(base_url, "anon", Duration::from_secs(5))
            .unwrap()
            .with_retry_policy(RetryPolicy::new(2, Duration::ZERO))
    }

    /// Local HTTP endpoint that answers every request the same way
    struct StubServer {
        addr: SocketAddr,
        connections: Arc<AtomicUsize>,
        requests: Arc<Mutex<Vec<String>>>,
    }

    impl StubServer {
        /// `None` hangs up right after reading the request
        async fn start(response: Option<String>) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let connections = Arc::new(AtomicUsize::new(0));
            let requests = Arc::new(Mutex::new(Vec::new()));

            let (seen, log) = (connections.clone(), requests.clone());
            tokio::spawn(async move {
                while let Ok((mut socket, _)) = listener.accept().await {
                    seen.fetch_add(1, Ordering::SeqCst);
                    let request = read_request(&mut socket).await;
                    log.lock().unwrap().push(request);
                    if let Some(response) = &response {
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    }
                }
            });

            Self {
                addr,
                connections,
                requests,
            }
        }

        fn url(&self) -> String {
            format!("http://{}", self.addr)
        }

        fn connections(&self) -> usize {
            self.connections.load(Ordering::SeqCst)
        }
    }

    fn json_response(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        )
    }

    /// Headers plus `content-length` bytes of body, lowercased
    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                let body_len = head
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + body_len {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).to_lowercase()
    }

    #[test]
    fn rejects_missing_settings() {
        assert!(matches!(
            RestStore::with_timeout("", "key", Duration::from_secs(5)),
            Err(StoreError::Config(_))
        ));
        assert!(matches!(
            RestStore::with_timeout("https://x.supabase.co", "", Duration::from_secs(5)),
            Err(StoreError::Config(_))
        ));
    }

    #[test]
    fn builds_urls_without_double_slashes() {
        let store = store("https://proj.supabase.co/");
        assert_eq!(
            store.table_url("listings"),
            "https://proj.supabase.co/rest/v1/listings"
        );
        assert_eq!(
            store.public_url("listing-images", "abc/0.jpg"),
            "https://proj.supabase.co/storage/v1/object/public/listing-images/abc/0.jpg"
        );
    }

    #[test]
    fn bearer_prefers_session_token() {
        let store = store("https://proj.supabase.co");
        assert_eq!(store.bearer(), "anon");
        let store = store.with_access_token("jwt");
        assert_eq!(store.bearer(), "jwt");
    }

    #[tokio::test]
    async fn dropped_connections_are_retried_then_surface_as_transport() {
        let server = StubServer::start(None).await;

        let err = store(&server.url())
            .select("listings", &SelectQuery::new())
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Transport(_)), "got {:?}", err);
        assert_eq!(server.connections(), 3);
    }

    #[tokio::test]
    async fn constraint_violation_maps_to_api_error_without_retry() {
        let body = r#"{"code":"23502","message":"null value in column \"title\""}"#;
        let server = StubServer::start(Some(json_response("400 Bad Request", body))).await;

        let err = store(&server.url())
            .insert("listings", json!({"owner_id": "u1"}))
            .await
            .unwrap_err();

        match &err {
            StoreError::Api {
                status,
                code,
                message,
            } => {
                assert_eq!(*status, 400);
                assert_eq!(code.as_deref(), Some("23502"));
                assert!(message.contains("title"));
            }
            other => panic!("expected Api error, got {:?}", other),
        }
        assert!(err.hint().unwrap().contains("required fields"));
        assert_eq!(server.connections(), 1);
    }

    #[tokio::test]
    async fn refused_connection_is_transient() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let err = store(&format!("http://127.0.0.1:{}", port))
            .delete("favorites", &[Filter::eq("user_id", "u1")])
            .await
            .unwrap_err();

        assert!(err.is_transient(), "got {:?}", err);
    }

    #[tokio::test]
    async fn insert_asks_for_the_row_back_and_returns_it() {
        let body = r#"[{"id":"l1","title":"Abaya"}]"#;
        let server = StubServer::start(Some(json_response("201 Created", body))).await;

        let row: Value = store(&server.url())
            .with_access_token("jwt")
            .insert_as("listings", &json!({"title": "Abaya"}))
            .await
            .unwrap();
        assert_eq!(row, json!({"id": "l1", "title": "Abaya"}));

        let requests = server.requests.lock().unwrap();
        let request = &requests[0];
        assert!(request.starts_with("post /rest/v1/listings "));
        assert!(request.contains("prefer: return=representation"));
        assert!(request.contains("apikey: anon"));
        assert!(request.contains("authorization: bearer jwt"));
        assert!(request.contains(r#""title":"abaya""#));
    }

    #[tokio::test]
    async fn select_sends_query_params_and_reads_rows() {
        let body = r#"[{"id":"l1"},{"id":"l2"}]"#;
        let server = StubServer::start(Some(json_response("200 OK", body))).await;

        let query = SelectQuery::new().filter(Filter::eq("status", "active")).limit(2);
        let rows = store(&server.url()).select("listings", &query).await.unwrap();
        assert_eq!(rows.len(), 2);

        let requests = server.requests.lock().unwrap();
        assert!(requests[0].starts_with("get /rest/v1/listings?"));
        assert!(requests[0].contains("status=eq.active"));
        assert!(requests[0].contains("limit=2"));
    }
}
