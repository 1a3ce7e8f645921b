use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use llm::{CompletionProvider, LlmError, PdfDocument, RetryingClient};

use crate::normalizer::strip_code_fences;
use crate::prompt::{answer_schema, build_referral_prompt};
use crate::schema::{AnswerRecord, EnrichedPages};

/// What happened to one page of the answer extraction stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PageOutcome {
    Answered { records: usize, skipped: usize },
    /// The provider answered but the text was not a JSON array.
    ParseFailure,
    /// Still overloaded after every attempt.
    Exhausted,
    /// The provider returned no text on every attempt.
    Empty,
    Failed { error: String },
}

#[derive(Debug, Clone, Default)]
pub struct AnswerExtraction {
    pub records: Vec<AnswerRecord>,
    pub outcomes: BTreeMap<u32, PageOutcome>,
}

impl AnswerExtraction {
    pub fn parse_failures(&self) -> usize {
        self.outcomes
            .values()
            .filter(|o| matches!(o, PageOutcome::ParseFailure))
            .count()
    }

    pub fn failed_pages(&self) -> Vec<u32> {
        self.outcomes
            .iter()
            .filter(|(_, o)| !matches!(o, PageOutcome::Answered { .. }))
            .map(|(page, _)| *page)
            .collect()
    }
}

/// Parse a structured response into answer records.
///
/// Returns the records in model order plus the number of array elements that
/// did not decode. Fails only when the text is not a JSON array.
pub fn parse_answers(text: &str) -> Result<(Vec<AnswerRecord>, usize), serde_json::Error> {
    let items: Vec<Value> = serde_json::from_str(strip_code_fences(text))?;

    let mut records = Vec::with_capacity(items.len());
    let mut skipped = 0;
    for item in items {
        match serde_json::from_value::<AnswerRecord>(item) {
            Ok(record) => records.push(record),
            Err(e) => {
                skipped += 1;
                warn!(error = %e, "Skipping malformed answer entry");
            }
        }
    }
    Ok((records, skipped))
}

/// Answer every enriched page from the referral package, one page at a time.
///
/// Never fails: pages that cannot be answered contribute no records and are
/// reported in [`AnswerExtraction::outcomes`].
pub async fn extract_answers<P: CompletionProvider>(
    client: &RetryingClient<P>,
    referral: &PdfDocument,
    enriched: &EnrichedPages,
    page_attempts: usize,
) -> AnswerExtraction {
    let schema = answer_schema();
    let mut extraction = AnswerExtraction::default();

    for (&page, page_text) in enriched {
        info!(page, "Processing page");
        let prompt = build_referral_prompt(page_text);
        let outcome = answer_page(
            client,
            referral,
            page,
            &prompt,
            &schema,
            page_attempts,
            &mut extraction.records,
        )
        .await;
        extraction.outcomes.insert(page, outcome);
    }

    info!(
        pages = extraction.outcomes.len(),
        answers = extraction.records.len(),
        parse_failures = extraction.parse_failures(),
        "Answer extraction complete"
    );
    extraction
}

async fn answer_page<P: CompletionProvider>(
    client: &RetryingClient<P>,
    referral: &PdfDocument,
    page: u32,
    prompt: &str,
    schema: &Value,
    page_attempts: usize,
    records: &mut Vec<AnswerRecord>,
) -> PageOutcome {
    let attempts = page_attempts.max(1);

    for attempt in 0..attempts {
        match client.complete(referral, prompt, Some(schema)).await {
            Ok(response) => {
                debug!(page, response = %response, "Answer response");
                return match parse_answers(&response) {
                    Ok((parsed, skipped)) => {
                        let count = parsed.len();
                        records.extend(parsed);
                        PageOutcome::Answered {
                            records: count,
                            skipped,
                        }
                    }
                    Err(e) => {
                        warn!(page, error = %e, response = %response, "Failed to parse answers");
                        PageOutcome::ParseFailure
                    }
                };
            }
            Err(LlmError::EmptyResponse) if attempt + 1 < attempts => {
                warn!(
                    page,
                    attempt = attempt + 1,
                    page_attempts = attempts,
                    "Empty response, retrying page"
                );
            }
            Err(LlmError::EmptyResponse) => {
                error!(page, attempts, "No response for page after all attempts");
                return PageOutcome::Empty;
            }
            Err(e) if e.is_transient() && attempt + 1 < attempts => {
                let backoff = client.policy().backoff(attempt);
                warn!(
                    page,
                    attempt = attempt + 1,
                    page_attempts = attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "Provider overloaded, retrying page"
                );
                sleep(backoff).await;
            }
            Err(e) if e.is_transient() => {
                error!(page, attempts, error = %e, "Max attempts reached for page");
                return PageOutcome::Exhausted;
            }
            Err(e) => {
                error!(page, error = %e, "Error processing page");
                return PageOutcome::Failed {
                    error: e.to_string(),
                };
            }
        }
    }

    PageOutcome::Exhausted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Answer;
    use llm::testing::{ScriptedProvider, overloaded};
    use llm::RetryPolicy;

    fn referral() -> PdfDocument {
        PdfDocument::from_bytes("referral.pdf", b"%PDF-1.5")
    }

    fn pages(n: u32) -> EnrichedPages {
        (1..=n).map(|p| (p, format!("[{{\"name\": \"T{p}\"}}]"))).collect()
    }

    fn answer_json(name: &str, page: u32, answer: &str) -> String {
        format!(r#"[{{"name": "{name}", "page": {page}, "field_label": "x", "answer": "{answer}"}}]"#)
    }

    #[test]
    fn test_parse_skips_malformed_entries() {
        let (records, skipped) = parse_answers(
            r#"[{"name": "T1", "page": 1, "field_label": "a", "answer": "x"},
                {"page": 1, "answer": "no name"},
                {"name": "T2", "page": 1, "field_label": "b", "answer": "MISSING"}]"#,
        )
        .unwrap();

        assert_eq!(skipped, 1);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].answer, Answer::Missing);
        assert!(parse_answers(r#"{"name": "T1"}"#).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pages_processed_in_order() {
        let provider = ScriptedProvider::from_fn(|_, request| {
            let page = if request.prompt.contains("\"T1\"") { 1 } else { 2 };
            Ok(answer_json(&format!("T{page}"), page, "v"))
        });
        let client = RetryingClient::new(provider, RetryPolicy::default());

        let extraction = extract_answers(&client, &referral(), &pages(2), 3).await;

        let names: Vec<_> = extraction.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["T1", "T2"]);
        assert!(client.provider().prompts()[0].contains("\"T1\""));
        assert_eq!(client.provider().max_in_flight(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_json_contributes_nothing() {
        let provider = ScriptedProvider::sequence(vec![
            Ok("this is not json".into()),
            Ok(answer_json("T2", 2, "06/15/2024")),
        ]);
        let client = RetryingClient::new(provider, RetryPolicy::default());

        let extraction = extract_answers(&client, &referral(), &pages(2), 3).await;

        assert_eq!(extraction.records.len(), 1);
        assert_eq!(extraction.records[0].name, "T2");
        assert_eq!(extraction.outcomes[&1], PageOutcome::ParseFailure);
        assert_eq!(extraction.parse_failures(), 1);
        // parse failures are not retried
        assert_eq!(client.provider().call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_transient_error_skips_page() {
        let provider = ScriptedProvider::sequence(vec![
            Err(LlmError::Api {
                status: 400,
                message: "bad request".into(),
            }),
            Ok(answer_json("T2", 2, "yes")),
        ]);
        let client = RetryingClient::new(provider, RetryPolicy::default());

        let extraction = extract_answers(&client, &referral(), &pages(2), 3).await;

        assert!(matches!(extraction.outcomes[&1], PageOutcome::Failed { .. }));
        assert_eq!(extraction.failed_pages(), vec![1]);
        assert_eq!(extraction.records.len(), 1);
        assert_eq!(client.provider().call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_attempts_wrap_client_retries() {
        let provider = ScriptedProvider::from_fn(|_, _| Err(overloaded()));
        let client = RetryingClient::new(provider, RetryPolicy::new(2, 60, 120));

        let extraction = extract_answers(&client, &referral(), &pages(1), 3).await;

        assert_eq!(extraction.outcomes[&1], PageOutcome::Exhausted);
        assert!(extraction.records.is_empty());
        assert_eq!(client.provider().call_count(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicates_across_pages_are_kept() {
        let provider = ScriptedProvider::sequence(vec![
            Ok(answer_json("T1", 1, "first")),
            Ok(answer_json("T1", 2, "second")),
        ]);
        let client = RetryingClient::new(provider, RetryPolicy::default());

        let extraction = extract_answers(&client, &referral(), &pages(2), 3).await;

        assert_eq!(extraction.records.len(), 2);
        assert_eq!(extraction.records[1].answer, Answer::Value("second".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_response_retries_page() {
        let provider = ScriptedProvider::sequence(vec![
            Err(LlmError::EmptyResponse),
            Ok(answer_json("T1", 1, "06/15/2024")),
        ]);
        let client = RetryingClient::new(provider, RetryPolicy::default());

        let extraction = extract_answers(&client, &referral(), &pages(1), 3).await;

        assert_eq!(client.provider().call_count(), 2);
        assert_eq!(extraction.records.len(), 1);
        assert_eq!(extraction.records[0].answer, Answer::Value("06/15/2024".into()));
        assert!(matches!(extraction.outcomes[&1], PageOutcome::Answered { records: 1, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_response_every_attempt() {
        let provider = ScriptedProvider::from_fn(|_, _| Err(LlmError::EmptyResponse));
        let client = RetryingClient::new(provider, RetryPolicy::default());

        let extraction = extract_answers(&client, &referral(), &pages(1), 3).await;

        assert_eq!(extraction.outcomes[&1], PageOutcome::Empty);
        assert_eq!(extraction.failed_pages(), vec![1]);
        assert_eq!(client.provider().call_count(), 3);
    }
}
