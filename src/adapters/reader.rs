//! HTTP reader with streaming, bounded-memory body handling.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::contracts::reader::{ReadContentType, ReadResult, ReaderClient};
use crate::error::{Error, Result};

use super::retry::{retry_with_backoff, RetryConfig};

/// Default cap on bytes buffered from one response body.
pub const DEFAULT_MAX_BODY_BYTES: u64 = 2 * 1024 * 1024;

/// Thin HTTP reader.
///
/// Streams the body and stops at the byte cap. Text-bearing content types
/// pass through as UTF-8; PDF extraction is an external collaborator's
/// job, so PDF and other binary bodies surface as UnsupportedContent.
pub struct HttpReader {
    http: Client,
    max_body_bytes: u64,
}

impl HttpReader {
    pub fn new(timeout: Duration) -> Self {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            http,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_max_body_bytes(mut self, max: u64) -> Self {
        self.max_body_bytes = max;
        self
    }
}

#[async_trait]
impl ReaderClient for HttpReader {
    async fn read(&self, url: &str) -> Result<ReadResult> {
        let started = Instant::now();

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| classify_reqwest("reader", e))?;

        let status = response.status();
        if status.is_server_error() || status.as_u16() == 429 {
            return Err(Error::transient("reader", format!("status {status}")));
        }
        if !status.is_success() {
            return Err(Error::permanent("reader", format!("status {status}")));
        }

        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let content_type = ReadContentType::from_mime(&mime)
            .ok_or_else(|| Error::UnsupportedContent(mime.clone()))?;
        if content_type == ReadContentType::Pdf {
            // Text extraction from PDF is delegated to an external reader.
            return Err(Error::UnsupportedContent("application/pdf".into()));
        }

        let mut body: Vec<u8> = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| classify_reqwest("reader", e))?;
            let remaining = self.max_body_bytes as usize - body.len();
            if chunk.len() >= remaining {
                body.extend_from_slice(&chunk[..remaining]);
                debug!(url, cap = self.max_body_bytes, "body truncated at cap");
                break;
            }
            body.extend_from_slice(&chunk);
        }

        let bytes_read = body.len() as u64;
        let text = String::from_utf8_lossy(&body).into_owned();

        Ok(ReadResult {
            text,
            bytes_read,
            latency: started.elapsed(),
            content_type,
        })
    }
}

fn classify_reqwest(service: &str, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::timeout(0)
    } else if e.is_connect() || e.is_request() {
        Error::transient_with_source(service, "request failed", e)
    } else {
        Error::permanent(service, e.to_string())
    }
}

/// Wraps any [`ReaderClient`] with bounded retry and per-call timeouts.
pub struct RetryingReader {
    inner: Arc<dyn ReaderClient>,
    config: RetryConfig,
}

impl RetryingReader {
    pub fn new(inner: Arc<dyn ReaderClient>) -> Self {
        Self {
            inner,
            config: RetryConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RetryConfig) -> Self {
        self.config = config;
        self
    }
}

#[async_trait]
impl ReaderClient for RetryingReader {
    async fn read(&self, url: &str) -> Result<ReadResult> {
        retry_with_backoff(&self.config, "read", || self.inner.read(url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyReader {
        calls: AtomicU32,
        fail_first: u32,
    }

    #[async_trait]
    impl ReaderClient for FlakyReader {
        async fn read(&self, _url: &str) -> Result<ReadResult> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                return Err(Error::transient("reader", "connection reset"));
            }
            Ok(ReadResult {
                text: "page text".into(),
                bytes_read: 9,
                latency: Duration::from_millis(3),
                content_type: ReadContentType::Html,
            })
        }
    }

    #[tokio::test]
    async fn test_retrying_reader_recovers() {
        let flaky = Arc::new(FlakyReader {
            calls: AtomicU32::new(0),
            fail_first: 1,
        });
        let adapter = RetryingReader::new(flaky.clone()).with_config(RetryConfig {
            max_retries: 2,
            base_delay_ms: 1,
            backoff_factor: 1.0,
            timeout: Duration::from_secs(1),
        });

        let result = adapter.read("https://example.com/").await.unwrap();
        assert_eq!(result.text, "page text");
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 2);
    }

    struct UnsupportedReader;

    #[async_trait]
    impl ReaderClient for UnsupportedReader {
        async fn read(&self, _url: &str) -> Result<ReadResult> {
            Err(Error::UnsupportedContent("image/png".into()))
        }
    }

    #[tokio::test]
    async fn test_unsupported_content_not_retried() {
        let adapter = RetryingReader::new(Arc::new(UnsupportedReader));
        let err = adapter.read("https://example.com/x.png").await.unwrap_err();
        assert_eq!(err.taxonomy_tag(), "unsupported-content");
    }
}
