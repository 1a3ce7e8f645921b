use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::LazyLock;

use forms::FieldRecord;

use crate::schema::EnrichedField;

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*```[a-zA-Z]*\s*\n?(.*?)\n?\s*```\s*$").expect("valid fence regex")
});

/// Strip a surrounding markdown code fence, if any, and trim.
pub fn strip_code_fences(text: &str) -> &str {
    match CODE_FENCE.captures(text).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => text.trim(),
    }
}

/// How well one page's enrichment text describes the page's fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coverage {
    pub expected: usize,
    pub described: usize,
    pub missing: Vec<String>,
    pub long_context: usize,
    pub parsed: bool,
}

/// Lenient check of the enrichment output against the extracted fields.
pub fn enrichment_coverage(fields: &[FieldRecord], raw: &str) -> Coverage {
    let described: Vec<EnrichedField> = serde_json::from_str::<Vec<Value>>(strip_code_fences(raw))
        .map(|items| {
            items
                .into_iter()
                .filter_map(|item| serde_json::from_value::<EnrichedField>(item).ok())
                .collect()
        })
        .unwrap_or_default();
    let parsed = !described.is_empty();

    let names: HashSet<&str> = described.iter().map(|f| f.name.as_str()).collect();
    let missing = fields
        .iter()
        .filter(|f| !names.contains(f.name.as_str()))
        .map(|f| f.name.clone())
        .collect();
    let long_context = described
        .iter()
        .filter(|f| f.context.split_whitespace().count() > 25)
        .count();

    Coverage {
        expected: fields.len(),
        described: described.len(),
        missing,
        long_context,
        parsed,
    }
}
