use crate::error::ClientError;
use crate::wire::{
    self, AttendanceRecord, HistoryResponse, MatchRequest, MatchResponse, RegisterReply,
    Registration,
};
use crate::MatchService;
use async_trait::async_trait;
use fras_core::{Embedding, MatchResult};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Client for the attendance service's `/api` routes.
#[derive(Clone)]
pub struct HttpClient {
    base_url: String,
    http: reqwest::Client,
}

impl HttpClient {
    /// Build a client for `base_url` (e.g. `http://127.0.0.1:8000`).
    /// Every request is bounded by `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ClientError::InvalidUrl(base_url));
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { base_url, http })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{path}", self.base_url)
    }

    /// Enroll a student's descriptor.
    pub async fn register(&self, registration: &Registration) -> Result<RegisterReply, ClientError> {
        tracing::info!(student_id = %registration.student_id, "registering student");
        let response = self
            .http
            .post(self.url("register"))
            .json(registration)
            .send()
            .await?;
        read_json(response).await
    }

    /// Most recent attendance records, newest first.
    pub async fn attendance_history(&self, limit: u32) -> Result<Vec<AttendanceRecord>, ClientError> {
        let response = self
            .http
            .get(self.url("attendance/history"))
            .query(&[("limit", limit)])
            .send()
            .await?;
        let history: HistoryResponse = read_json(response).await?;
        Ok(history.records)
    }
}

#[async_trait]
impl MatchService for HttpClient {
    async fn match_embedding(&self, embedding: &Embedding) -> Result<MatchResult, ClientError> {
        let started = std::time::Instant::now();
        let response = self
            .http
            .post(self.url("match"))
            .json(&MatchRequest { embedding })
            .send()
            .await?;
        let body: MatchResponse = read_json(response).await?;
        let result = body.into_result()?;
        tracing::debug!(
            matched = result.matched,
            distance = ?result.distance,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "match response"
        );
        Ok(result)
    }
}

/// Read a response body, mapping non-2xx to `Status` and bad JSON to `Malformed`.
async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let status = response.status();
    let body = response.bytes().await?;

    if !status.is_success() {
        return Err(ClientError::Status {
            status: status.as_u16(),
            detail: wire::error_detail(&body),
        });
    }

    serde_json::from_slice(&body).map_err(|e| ClientError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve exactly one HTTP exchange; resolves to the raw request text.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = sock.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                if request_complete(&request) {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            sock.write_all(response.as_bytes()).await.unwrap();
            sock.shutdown().await.ok();
            String::from_utf8_lossy(&request).into_owned()
        });
        (format!("http://{addr}"), handle)
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..header_end]
            .lines()
            .find_map(|l| {
                let (k, v) = l.split_once(':')?;
                k.eq_ignore_ascii_case("content-length")
                    .then(|| v.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        raw.len() >= header_end + 4 + content_length
    }

    fn client(base: &str) -> HttpClient {
        HttpClient::new(base, Duration::from_secs(5)).unwrap()
    }

    fn embedding() -> Embedding {
        Embedding::new(vec![0.25; 128]).unwrap()
    }

    #[tokio::test]
    async fn test_match_posts_embedding_and_parses_result() {
        let (base, server) = serve_once(
            "200 OK",
            r#"{"matched": true, "student_id": "S1", "distance": 0.42}"#,
        )
        .await;

        let result = client(&base).match_embedding(&embedding()).await.unwrap();
        assert!(result.matched);
        assert_eq!(result.student_id.as_deref(), Some("S1"));

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/match "), "{request}");
        let body = &request[request.find("\r\n\r\n").unwrap() + 4..];
        let json: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(json["embedding"].as_array().unwrap().len(), 128);
    }

    #[tokio::test]
    async fn test_match_server_error_maps_to_status() {
        let (base, _server) =
            serve_once("404 Not Found", r#"{"detail": "No students registered"}"#).await;

        let err = client(&base).match_embedding(&embedding()).await.unwrap_err();
        match err {
            ClientError::Status { status, detail } => {
                assert_eq!(status, 404);
                assert_eq!(detail, "No students registered");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_match_garbage_body_is_malformed() {
        let (base, _server) = serve_once("200 OK", "<html>oops</html>").await;
        let err = client(&base).match_embedding(&embedding()).await.unwrap_err();
        assert!(matches!(err, ClientError::Malformed(_)), "{err}");
    }

    #[tokio::test]
    async fn test_match_connection_refused_is_transport() {
        // Bind then drop to get a port nobody listens on.
        let port = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };
        let err = client(&format!("http://127.0.0.1:{port}"))
            .match_embedding(&embedding())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)), "{err}");
    }

    #[tokio::test]
    async fn test_register_reports_duplicate() {
        let (base, server) =
            serve_once("400 Bad Request", r#"{"detail": "Student ID already exists"}"#).await;
        let reg = Registration {
            student_id: "S1".into(),
            name: "Ada".into(),
            embedding: embedding(),
            wallet: Some("0.0.1234".into()),
            network: Some("testnet".into()),
        };
        let err = client(&base).register(&reg).await.unwrap_err();
        assert!(err.to_string().contains("Student ID already exists"));

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/register "));
        assert!(request.contains(r#""wallet":"0.0.1234""#));
    }

    #[tokio::test]
    async fn test_history_sends_limit() {
        let (base, server) = serve_once(
            "200 OK",
            r#"{"records": [{"id": 1, "student_id": "S1", "timestamp": "2024-03-01T09:00:00", "unit": "CS101"}]}"#,
        )
        .await;
        let records = client(&base).attendance_history(5).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].unit, "CS101");

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /api/attendance/history?limit=5 "), "{request}");
    }

    #[test]
    fn test_rejects_non_http_base() {
        assert!(matches!(
            HttpClient::new("ftp://example.org", Duration::from_secs(1)),
            Err(ClientError::InvalidUrl(_))
        ));
        let c = client("http://127.0.0.1:8000/");
        assert_eq!(c.url("match"), "http://127.0.0.1:8000/api/match");
    }
}
