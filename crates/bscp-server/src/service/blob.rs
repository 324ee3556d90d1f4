// Blob store client used when confirming commits

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, header::CONTENT_LENGTH};
use tracing::debug;

use bscp_api::ContentRef;
use bscp_common::{BscpError, BscpResult};
use bscp_release::BlobStore;

/// Checks uploads with `HEAD {endpoint}/api/v1/biz/{biz_id}/content/{content_id}`.
///
/// A blob exists when the store answers 2xx with a `Content-Length` equal to
/// the committed size; 404 means not uploaded.
pub struct HttpBlobStore {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpBlobStore {
    pub fn new(endpoint: String, timeout: Duration) -> BscpResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BscpError::InternalError(format!("http client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn content_url(&self, biz_id: i64, content_id: &str) -> String {
        format!(
            "{}/api/v1/biz/{}/content/{}",
            self.endpoint, biz_id, content_id
        )
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn exists(&self, biz_id: i64, content: &ContentRef) -> BscpResult<bool> {
        let url = self.content_url(biz_id, &content.content_id);
        let response = self
            .client
            .head(&url)
            .send()
            .await
            .map_err(|e| BscpError::DownstreamError(format!("blob store: {}", e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !status.is_success() {
            return Err(BscpError::DownstreamError(format!(
                "blob store answered {} for {}",
                status, content.content_id
            )));
        }

        let size = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        debug!(biz_id, content_id = %content.content_id, stored_size = ?size, "Blob checked");
        Ok(size == Some(content.content_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answer one HTTP request with `status_line` and `Content-Length: length`.
    async fn serve_once(status_line: &'static str, length: u64) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let reply = format!(
                "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status_line, length
            );
            let _ = socket.write_all(reply.as_bytes()).await;
        });

        format!("http://{}", addr)
    }

    fn content(size: u64) -> ContentRef {
        ContentRef {
            content_id: "ab".repeat(32),
            content_size: size,
        }
    }

    #[test]
    fn test_content_url() {
        let store =
            HttpBlobStore::new("http://blob:8080/".to_string(), Duration::from_secs(1)).unwrap();
        assert_eq!(
            store.content_url(7, "abc"),
            "http://blob:8080/api/v1/biz/7/content/abc"
        );
    }

    #[tokio::test]
    async fn test_matching_size_exists() {
        let endpoint = serve_once("200 OK", 42).await;
        let store = HttpBlobStore::new(endpoint, Duration::from_secs(2)).unwrap();
        assert!(store.exists(7, &content(42)).await.unwrap());
    }

    #[tokio::test]
    async fn test_size_mismatch_does_not_exist() {
        let endpoint = serve_once("200 OK", 41).await;
        let store = HttpBlobStore::new(endpoint, Duration::from_secs(2)).unwrap();
        assert!(!store.exists(7, &content(42)).await.unwrap());
    }

    #[tokio::test]
    async fn test_not_found() {
        let endpoint = serve_once("404 Not Found", 0).await;
        let store = HttpBlobStore::new(endpoint, Duration::from_secs(2)).unwrap();
        assert!(!store.exists(7, &content(42)).await.unwrap());
    }

    #[tokio::test]
    async fn test_server_error_is_downstream_error() {
        let endpoint = serve_once("503 Service Unavailable", 0).await;
        let store = HttpBlobStore::new(endpoint, Duration::from_secs(2)).unwrap();
        let err = store.exists(7, &content(42)).await.unwrap_err();
        assert!(matches!(err, BscpError::DownstreamError(_)));
    }
}
