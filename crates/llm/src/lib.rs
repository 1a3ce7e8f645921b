pub mod document;
pub mod error;
pub mod gemini;
pub mod provider;
pub mod retry;

#[cfg(any(test, feature = "test-fixtures"))]
pub mod testing;

pub use document::PdfDocument;
pub use error::LlmError;
pub use gemini::GeminiClient;
pub use provider::{CompletionProvider, CompletionRequest};
pub use retry::{RetryPolicy, RetryingClient};
