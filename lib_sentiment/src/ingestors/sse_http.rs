//! # SSE over HTTP
//!
//! `reqwest`-backed [`StreamTransport`] for the sentiment backend.
//!
//! ## Key Features:
//! - **Base URL + path**: the endpoint is the configured base URL joined with
//!   the stream path, validated once at construction.
//! - **No read timeout**: the stream is long-lived and may sit idle between
//!   heartbeats. Only the TCP/TLS connect phase can time out.
//! - **No retries**: unlike a request/response client, a failed attempt is
//!   reported straight back to the lifecycle controller.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CACHE_CONTROL};
use url::Url;

use super::transport::{ByteStream, StreamTransport};
use crate::configs::StreamConfig;
use crate::types::{StreamError, StreamResult};

const API_KEY_HEADER: &str = "x-api-key";

/// HTTP transport holding a reusable client and the resolved endpoint.
#[derive(Debug, Clone)]
pub struct HttpSseTransport {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpSseTransport {
    /// Creates a transport for `base_url` joined with `stream_path`.
    ///
    /// # Errors
    /// `InvalidConfig` when the URL does not parse or the API key is not a
    /// valid header value, `Transport` when the client cannot be built.
    pub fn new(
        base_url: &str,
        stream_path: &str,
        api_key: &str,
        connect_timeout: Option<Duration>,
    ) -> StreamResult<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| StreamError::InvalidConfig(format!("Invalid base URL {}: {}", base_url, e)))?;
        let endpoint = base
            .join(stream_path)
            .map_err(|e| StreamError::InvalidConfig(format!("Invalid stream path {}: {}", stream_path, e)))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        let key = HeaderValue::from_str(api_key)
            .map_err(|_| StreamError::InvalidConfig("API key is not a valid header value".into()))?;
        headers.insert(API_KEY_HEADER, key);

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| StreamError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, endpoint })
    }

    pub fn from_config(config: &StreamConfig) -> StreamResult<Self> {
        Self::new(
            &config.base_url,
            &config.stream_path,
            &config.api_key,
            config.connect_timeout(),
        )
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl StreamTransport for HttpSseTransport {
    async fn open(&self) -> StreamResult<ByteStream> {
        log::info!("Opening sentiment stream at {}", self.endpoint);

        let response = self
            .client
            .get(self.endpoint.clone())
            .send()
            .await
            .map_err(|e| StreamError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            log::warn!("Sentiment stream rejected with status {}", status);
            return Err(StreamError::HttpStatus(status.as_u16()));
        }

        let bytes = response
            .bytes_stream()
            .map_err(|e| StreamError::Transport(e.to_string()));
        Ok(Box::pin(bytes))
    }

    fn describe(&self) -> String {
        self.endpoint.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// One-shot mock server: captures the request head, replies with `status_line` and `body`,
    /// then closes the connection.
    async fn serve_once(status_line: &'static str, body: String) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            let _ = tx.send(String::from_utf8_lossy(&head).to_string());

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n{}",
                status_line, body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        (format!("http://127.0.0.1:{}", port), rx)
    }

    #[tokio::test]
    async fn sends_sse_headers_and_streams_body() {
        let body = "data: {\"type\": \"heartbeat\"}\n\n".to_string();
        let (base, request) = serve_once("200 OK", body.clone()).await;

        let transport = HttpSseTransport::new(&base, "/sentiment/stream", "test-key", None).unwrap();
        let mut stream = transport.open().await.unwrap();

        let mut received = Vec::new();
        while let Some(chunk) = stream.next().await {
            received.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(String::from_utf8(received).unwrap(), body);

        let head = request.await.unwrap().to_lowercase();
        assert!(head.starts_with("get /sentiment/stream "));
        assert!(head.contains("accept: text/event-stream"));
        assert!(head.contains("cache-control: no-cache"));
        assert!(head.contains("x-api-key: test-key"));
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let (base, _request) = serve_once("503 Service Unavailable", String::new()).await;
        let transport = HttpSseTransport::new(&base, "/sentiment/stream", "k", None).unwrap();

        match transport.open().await {
            Err(StreamError::HttpStatus(code)) => assert_eq!(code, 503),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("expected an HTTP status error"),
        }
    }

    #[tokio::test]
    async fn refused_connection_is_a_transport_error() {
        // Bind then drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let base = format!("http://127.0.0.1:{}", port);
        let transport = HttpSseTransport::new(&base, "/sentiment/stream", "k", Some(Duration::from_secs(2))).unwrap();
        assert!(matches!(transport.open().await, Err(StreamError::Transport(_))));
    }

    #[test]
    fn endpoint_joins_base_and_path() {
        let transport = HttpSseTransport::new(
            "https://backend.example.com:5003",
            "/sentiment/stream",
            "k",
            None,
        )
        .unwrap();
        assert_eq!(transport.describe(), "https://backend.example.com:5003/sentiment/stream");
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(matches!(
            HttpSseTransport::new("not a url", "/sentiment/stream", "k", None),
            Err(StreamError::InvalidConfig(_))
        ));
    }
}
