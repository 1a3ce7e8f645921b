use base64::{Engine as _, engine::general_purpose::STANDARD};
use std::path::Path;
use std::sync::Arc;

use crate::error::LlmError;

pub const PDF_MIME_TYPE: &str = "application/pdf";

/// A document attached inline to every request, encoded once.
#[derive(Debug, Clone)]
pub struct PdfDocument {
    name: String,
    mime_type: &'static str,
    encoded: Arc<str>,
}

impl PdfDocument {
    pub async fn load(path: &Path) -> Result<Self, LlmError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| LlmError::Document {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::from_bytes(path.display().to_string(), &bytes))
    }

    pub fn from_bytes(name: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            name: name.into(),
            mime_type: PDF_MIME_TYPE,
            encoded: STANDARD.encode(bytes).into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    /// Base64 payload as sent to the provider.
    pub fn base64_data(&self) -> &str {
        &self.encoded
    }
}
