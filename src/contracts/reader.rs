//! Page-reader contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::Result;

/// Content types the reader can extract text from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadContentType {
    Html,
    Pdf,
    Json,
    Xml,
    PlainText,
    Markdown,
}

impl ReadContentType {
    /// Map a MIME type to a supported content type.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let mime = mime.split(';').next().unwrap_or("").trim();
        match mime {
            "text/html" | "application/xhtml+xml" => Some(Self::Html),
            "application/pdf" => Some(Self::Pdf),
            "application/json" => Some(Self::Json),
            "application/xml" | "text/xml" => Some(Self::Xml),
            "text/plain" | "" => Some(Self::PlainText),
            "text/markdown" => Some(Self::Markdown),
            _ => None,
        }
    }
}

/// Result of reading one URL. Text is always UTF-8.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadResult {
    pub text: String,
    pub bytes_read: u64,
    pub latency: Duration,
    pub content_type: ReadContentType,
}

/// Reader contract.
///
/// Implementations must stream where possible and bound memory per call;
/// unsupported binary content returns [`crate::Error::UnsupportedContent`].
#[async_trait]
pub trait ReaderClient: Send + Sync {
    async fn read(&self, url: &str) -> Result<ReadResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_mapping() {
        assert_eq!(
            ReadContentType::from_mime("text/html; charset=utf-8"),
            Some(ReadContentType::Html)
        );
        assert_eq!(
            ReadContentType::from_mime("application/pdf"),
            Some(ReadContentType::Pdf)
        );
        assert_eq!(ReadContentType::from_mime("image/png"), None);
    }
}
