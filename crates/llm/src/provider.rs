use serde_json::Value;
use std::future::Future;

use crate::document::PdfDocument;
use crate::error::LlmError;

/// One completion call: a document, a prompt and an optional JSON response schema.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub document: &'a PdfDocument,
    pub prompt: &'a str,
    pub schema: Option<&'a Value>,
}

/// A single, non-retrying call to a generative model.
pub trait CompletionProvider {
    fn generate(
        &self,
        request: CompletionRequest<'_>,
    ) -> impl Future<Output = Result<String, LlmError>> + Send;
}
