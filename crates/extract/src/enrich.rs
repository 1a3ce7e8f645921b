use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{error, info, warn};

use forms::PageFieldSet;
use llm::{CompletionProvider, LlmError, PdfDocument, RetryingClient};

use crate::normalizer::enrichment_coverage;
use crate::prompt::build_context_prompt;
use crate::schema::EnrichedPages;

/// Describe every page's fields against the PA form itself.
///
/// Pages are requested concurrently, at most `max_concurrency` at a time. The
/// first failing page fails the whole stage and drops the requests still in
/// flight.
pub async fn enrich<P: CompletionProvider>(
    client: &RetryingClient<P>,
    form: &PdfDocument,
    fields: &PageFieldSet,
    max_concurrency: usize,
) -> Result<EnrichedPages, LlmError> {
    info!(
        pages = fields.page_count(),
        max_concurrency, "Starting context enrichment"
    );

    let results: Vec<(u32, String)> = stream::iter(fields.iter())
        .map(|(page, page_fields)| async move {
            let prompt = build_context_prompt(page_fields);
            info!(page, fields = page_fields.len(), "Enriching page");

            let text = client
                .complete(form, &prompt, None)
                .await
                .inspect_err(|e| error!(page, error = %e, "Enrichment failed"))?;
            Ok::<_, LlmError>((page, text))
        })
        .buffer_unordered(max_concurrency.max(1))
        .try_collect()
        .await?;

    let mut enriched = EnrichedPages::new();
    for (page, text) in results {
        if let Some(page_fields) = fields.get(page) {
            let coverage = enrichment_coverage(page_fields, &text);
            if !coverage.parsed {
                warn!(page, "Enrichment output is not a JSON array of fields, forwarding as-is");
            } else if !coverage.missing.is_empty() || coverage.long_context > 0 {
                warn!(
                    page,
                    described = coverage.described,
                    expected = coverage.expected,
                    missing = ?coverage.missing,
                    long_context = coverage.long_context,
                    "Enrichment incomplete"
                );
            }
        }
        enriched.insert(page, text);
    }

    info!(pages = enriched.len(), "Context enrichment complete");
    Ok(enriched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use forms::{FieldRecord, WidgetType};
    use llm::RetryPolicy;
    use llm::testing::{ScriptedProvider, overloaded};
    use std::time::Duration;

    fn field_set(pages: u32) -> PageFieldSet {
        PageFieldSet::from_records((1..=pages).map(|page| {
            FieldRecord::new(format!("T{page}"), WidgetType::Text, None, page, format!("Label {page}"))
        }))
    }

    fn form() -> PdfDocument {
        PdfDocument::from_bytes("pa.pdf", b"%PDF-1.5")
    }

    /// Echo the field name found in the prompt so results can be matched to pages.
    fn echo_field_name(prompt: &str) -> String {
        let data = &prompt[prompt.find("<PA_FORM_DATA>").unwrap()..];
        let start = data.find(r#""name": ""#).unwrap() + 9;
        let end = start + data[start..].find('"').unwrap();
        format!("described {}", &data[start..end])
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_keyed_by_page() {
        let provider = ScriptedProvider::from_fn(|_, request| Ok(echo_field_name(request.prompt)))
            .with_delay(Duration::from_millis(50));
        let client = RetryingClient::new(provider, RetryPolicy::default());

        let enriched = enrich(&client, &form(), &field_set(3), 8).await.unwrap();

        assert_eq!(enriched.len(), 3);
        assert_eq!(enriched[&1], "described T1");
        assert_eq!(enriched[&3], "described T3");
        assert_eq!(client.provider().max_in_flight(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_is_bounded() {
        let provider = ScriptedProvider::from_fn(|_, request| Ok(echo_field_name(request.prompt)))
            .with_delay(Duration::from_millis(50));
        let client = RetryingClient::new(provider, RetryPolicy::default());

        let enriched = enrich(&client, &form(), &field_set(6), 2).await.unwrap();

        assert_eq!(enriched.len(), 6);
        assert_eq!(client.provider().call_count(), 6);
        assert!(client.provider().max_in_flight() <= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_failing_page_fails_stage() {
        let provider = ScriptedProvider::from_fn(|_, request| {
            if request.prompt.contains(r#""name": "T2""#) {
                Err(LlmError::Api {
                    status: 400,
                    message: "invalid argument".into(),
                })
            } else {
                Ok("[]".into())
            }
        });
        let client = RetryingClient::new(provider, RetryPolicy::default());

        let err = enrich(&client, &form(), &field_set(3), 3).await.unwrap_err();
        assert!(matches!(err, LlmError::Api { status: 400, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_page_recovers_within_client_budget() {
        let provider = ScriptedProvider::from_fn(|index, _| match index {
            0 => Err(overloaded()),
            _ => Ok("[]".into()),
        });
        let client = RetryingClient::new(provider, RetryPolicy::default());

        let enriched = enrich(&client, &form(), &field_set(1), 1).await.unwrap();
        assert_eq!(enriched[&1], "[]");
        assert_eq!(client.provider().call_count(), 2);
    }

    #[tokio::test]
    async fn test_empty_field_set_makes_no_calls() {
        let client = RetryingClient::new(ScriptedProvider::sequence(vec![]), RetryPolicy::default());

        let enriched = enrich(&client, &form(), &PageFieldSet::new(), 4).await.unwrap();
        assert!(enriched.is_empty());
        assert_eq!(client.provider().call_count(), 0);
    }
}
