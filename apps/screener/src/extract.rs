//! Resume text extraction.

use async_trait::async_trait;
use bytes::Bytes;
use tracing::warn;

#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Plain text of the document, or `None` when it cannot be read.
    async fn extract(&self, raw_bytes: Bytes) -> Option<String>;
}

/// PDF extraction via `pdf-extract`.
///
/// Parsing is CPU-bound and the parser can panic on malformed files, so it
/// runs inside `spawn_blocking`; a panic surfaces as a `JoinError` and is
/// treated like any other unreadable document.
pub struct PdfTextExtractor;

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    async fn extract(&self, raw_bytes: Bytes) -> Option<String> {
        let joined =
            tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&raw_bytes)).await;

        let text = match joined {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!("PDF extraction failed: {e}");
                return None;
            }
            Err(e) => {
                warn!("PDF extraction aborted: {e}");
                return None;
            }
        };

        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}
