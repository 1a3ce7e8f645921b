use std::path::Path;
use tracing::{error, info, warn};

use forms::FormFiller;

use crate::schema::{AnswerMap, AnswerRecord};

/// Collapse answer records into a name to value map.
///
/// Records without a name or a usable value are dropped; a later record for
/// the same name replaces an earlier one.
pub fn build_answer_map(records: &[AnswerRecord]) -> AnswerMap {
    let mut answers = AnswerMap::new();
    for record in records {
        if record.name.trim().is_empty() {
            continue;
        }
        if let Some(value) = record.answer.value() {
            answers.insert(record.name.clone(), value.to_string());
        }
    }
    answers
}

/// Write `records` into the widgets of `target`, saving the result to `output`.
///
/// Returns false when there is nothing to write or the document cannot be
/// opened or saved. Individual widget failures are logged and do not fail the
/// fill.
pub fn fill(target: &Path, records: &[AnswerRecord], output: &Path) -> bool {
    let answers = build_answer_map(records);
    if answers.is_empty() {
        warn!(records = records.len(), "No answers loaded");
        return false;
    }
    info!(answers = answers.len(), "Loaded answers");

    match FormFiller::fill(target, &answers, output) {
        Ok(report) => {
            if report.failed > 0 {
                warn!(failed = report.failed, "Some fields could not be filled");
            }
            true
        }
        Err(e) => {
            error!(error = %e, "Form filling failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Answer;
    use forms::FormReader;
    use forms::testing::sample_form;

    fn record(name: &str, answer: &str) -> AnswerRecord {
        AnswerRecord {
            name: name.to_string(),
            page: 1,
            field_label: String::new(),
            answer: Answer::from(answer),
        }
    }

    #[test]
    fn test_last_write_wins_and_sentinels_dropped() {
        let answers = build_answer_map(&[
            record("T1", "MISSING"),
            record("T1", "06/15/2024"),
            record("T2", ""),
        ]);

        assert_eq!(answers.len(), 1);
        assert_eq!(answers["T1"], "06/15/2024");
    }

    #[test]
    fn test_nameless_records_dropped() {
        let answers = build_answer_map(&[record("", "INJECTED"), record("  ", "x"), record("T1", "v")]);

        assert_eq!(answers.len(), 1);
        assert!(!answers.contains_key(""));
    }

    #[test]
    fn test_sentinel_does_not_overwrite_value() {
        let answers = build_answer_map(&[
            record("CB1", "Yes"),
            record("CB1", "UNCLEAR"),
            record("CB1", "MISSING"),
            record("T5", "first"),
            record("T5", "second"),
        ]);

        assert_eq!(answers["CB1"], "Yes");
        assert_eq!(answers["T5"], "second");
    }

    #[test]
    fn test_fill_without_answers_returns_false() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("pa.pdf");
        let output = dir.path().join("filled.pdf");
        sample_form().save(&target).unwrap();

        assert!(!fill(&target, &[record("T1", "MISSING")], &output));
        assert!(!output.exists());
    }

    #[test]
    fn test_fill_unreadable_target_returns_false() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("missing.pdf");
        let output = dir.path().join("filled.pdf");

        assert!(!fill(&target, &[record("T1", "value")], &output));
    }

    #[test]
    fn test_unclear_checkbox_left_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("pa.pdf");
        let output = dir.path().join("filled.pdf");
        sample_form().save(&target).unwrap();

        assert!(fill(&target, &[record("CB1", "UNCLEAR"), record("T1", "M54.5")], &output));

        let before = FormReader::extract_fields(&target).unwrap();
        let after = FormReader::extract_fields(&output).unwrap();
        assert_eq!(after.get(1).unwrap()[0].raw_value, before.get(1).unwrap()[0].raw_value);
        assert_eq!(after.get(2).unwrap()[0].raw_value.as_deref(), Some("M54.5"));
    }
}
