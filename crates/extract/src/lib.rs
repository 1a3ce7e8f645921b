pub mod answers;
pub mod enrich;
pub mod merge;
pub mod normalizer;
pub mod prompt;
pub mod schema;

pub use answers::{AnswerExtraction, PageOutcome, extract_answers, parse_answers};
pub use enrich::enrich;
pub use merge::{build_answer_map, fill};
pub use schema::{Answer, AnswerMap, AnswerRecord, EnrichedField, EnrichedPages};

use forms::PageFieldSet;
use llm::{CompletionProvider, LlmError, PdfDocument, RetryingClient};

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Enrichment requests allowed in flight at once.
    pub max_concurrency: usize,
    /// Outer attempts per page in the answer extraction stage.
    pub page_attempts: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            page_attempts: 3,
        }
    }
}

/// The two LLM stages sharing one retrying client.
pub struct FormPipeline<P> {
    client: RetryingClient<P>,
    settings: PipelineSettings,
}

impl<P: CompletionProvider> FormPipeline<P> {
    pub fn new(client: RetryingClient<P>, settings: PipelineSettings) -> Self {
        Self { client, settings }
    }

    pub fn client(&self) -> &RetryingClient<P> {
        &self.client
    }

    /// Describe each page's fields against the PA form.
    pub async fn enrich(
        &self,
        form: &PdfDocument,
        fields: &PageFieldSet,
    ) -> Result<EnrichedPages, LlmError> {
        enrich::enrich(&self.client, form, fields, self.settings.max_concurrency).await
    }

    /// Answer each enriched page from the referral package.
    pub async fn extract_answers(
        &self,
        referral: &PdfDocument,
        enriched: &EnrichedPages,
    ) -> AnswerExtraction {
        answers::extract_answers(&self.client, referral, enriched, self.settings.page_attempts)
            .await
    }
}
