use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::info;

use extract::{AnswerRecord, EnrichedPages};

/// Write an intermediate artifact as pretty JSON, creating parent directories.
pub async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), "Wrote artifact");
    Ok(())
}

pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

pub async fn read_enrichment(path: &Path) -> Result<EnrichedPages> {
    read_json(path).await
}

/// Answers are read as leniently as the model output they came from.
pub async fn read_answers(path: &Path) -> Result<Vec<AnswerRecord>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let (records, _) = extract::parse_answers(&raw)
        .with_context(|| format!("Answers file is not a JSON array: {}", path.display()))?;
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use extract::Answer;

    #[tokio::test]
    async fn test_enrichment_file_uses_page_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("enrichment.json");
        let enriched: EnrichedPages = [(1, "first".to_string()), (10, "tenth".to_string())].into();

        write_json(&path, &enriched).await.unwrap();

        let raw: serde_json::Value = read_json(&path).await.unwrap();
        assert_eq!(raw["1"], "first");
        assert_eq!(read_enrichment(&path).await.unwrap(), enriched);
    }

    #[tokio::test]
    async fn test_answers_file_tolerates_bad_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("answers.json");
        tokio::fs::write(
            &path,
            r#"[{"name": "T1", "page": 1, "field_label": "a", "answer": "UNCLEAR"}, {"oops": 1}]"#,
        )
        .await
        .unwrap();

        let records = read_answers(&path).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].answer, Answer::Unclear);
    }
}
