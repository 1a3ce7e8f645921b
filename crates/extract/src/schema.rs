use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw enrichment text per page, exactly as the model returned it.
pub type EnrichedPages = BTreeMap<u32, String>;

/// Field name to the value written into the form.
pub type AnswerMap = BTreeMap<String, String>;

/// A model answer, with the `MISSING`/`UNCLEAR` sentinels decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Answer {
    Value(String),
    Missing,
    Unclear,
}

impl Answer {
    pub fn value(&self) -> Option<&str> {
        match self {
            Answer::Value(v) => Some(v),
            Answer::Missing | Answer::Unclear => None,
        }
    }
}

impl From<String> for Answer {
    fn from(raw: String) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("MISSING") {
            Answer::Missing
        } else if trimmed.eq_ignore_ascii_case("UNCLEAR") {
            Answer::Unclear
        } else {
            Answer::Value(raw)
        }
    }
}

impl From<&str> for Answer {
    fn from(raw: &str) -> Self {
        Answer::from(raw.to_string())
    }
}

impl From<Answer> for String {
    fn from(answer: Answer) -> Self {
        match answer {
            Answer::Value(v) => v,
            Answer::Missing => "MISSING".to_string(),
            Answer::Unclear => "UNCLEAR".to_string(),
        }
    }
}

/// One answered field from the referral package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub name: String,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub field_label: String,
    pub answer: Answer,
}

/// A field description produced by the enrichment stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedField {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub field_label: String,
    pub question: String,
    #[serde(default)]
    pub context: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels_decode() {
        assert_eq!(Answer::from("MISSING"), Answer::Missing);
        assert_eq!(Answer::from(" missing "), Answer::Missing);
        assert_eq!(Answer::from(""), Answer::Missing);
        assert_eq!(Answer::from("UNCLEAR"), Answer::Unclear);
        assert_eq!(Answer::from("06/15/2024"), Answer::Value("06/15/2024".into()));
    }

    #[test]
    fn test_answer_record_wire_format() {
        let record: AnswerRecord = serde_json::from_str(
            r#"{"name": "T3", "page": 3, "field_label": "Diagnosis code (ICD-10)", "answer": "MISSING"}"#,
        )
        .unwrap();
        assert_eq!(record.answer, Answer::Missing);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["answer"], "MISSING");
        assert_eq!(json["field_label"], "Diagnosis code (ICD-10)");
    }
}
