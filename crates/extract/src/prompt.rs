use forms::FieldRecord;
use serde_json::{Value, json};

/// Ask for an explicit question and short clinical context per field of one page.
pub fn build_context_prompt(fields: &[FieldRecord]) -> String {
    let fields_json =
        serde_json::to_string_pretty(fields).unwrap_or_else(|_| format!("{fields:?}"));

    format!(
        r#"You are given a Prior Authorization (PA) form PDF.

For each form field listed below, working in page order:
1. State the question the field is implicitly asking.
   - Checkboxes: phrase the label as a yes/no question.
   - Text fields: phrase it as a request for information.
   - Dates: say which event or action the date refers to.
2. Write clinical context of at most 25 words covering:
   - the section of the form the field belongs to
   - whether it is a primary question or a sub-question
   - whose information is requested (patient, provider, insurer)
   - dependencies on other fields
   - why the information matters clinically
3. Keep related fields connected: note parent/child questions and
   fields that only apply depending on another answer.

RULES:
- Every field gets both a question and a context
- Keep field names, types, pages and labels exactly as given
- Output ONLY a JSON array, no markdown, no code blocks
- Use double quotes for all strings

OUTPUT FORMAT:
[
  {{
    "name": "CB1",
    "type": "checkbox",
    "page": 2,
    "field_label": "Start of treatment",
    "question": "Is this a new treatment start for the patient? (yes/no)",
    "context": "Distinguishes a first request for this medication from a continuation of existing therapy."
  }}
]

<PA_FORM_DATA>
{fields_json}
</PA_FORM_DATA>"#
    )
}

/// Ask for answers to one page's enriched fields from the referral package.
pub fn build_referral_prompt(enriched_page: &str) -> String {
    format!(
        r#"You are processing a Prior Authorization (PA) form. You are given the PA
form fields, each with a question and context, and a referral package PDF.
Answer every field from the referral package.

RULES:
1. Give the exact answer found in the referral (dates, diagnoses, medications, dosages, ...).
2. Answer "MISSING" when the referral does not contain the information and
   "UNCLEAR" when it is ambiguous.
3. Use the precise values and terminology of the source document.
4. Format dates as MM/DD/YYYY unless the field asks otherwise.
5. Output only valid JSON.

<PA_FORM_DATA>
{enriched_page}
</PA_FORM_DATA>

OUTPUT FORMAT:
A JSON array with one object per field:
- name: the field identifier (e.g. "CB1")
- page: the page number
- field_label: the original field label
- answer: the answer taken from the referral package

[
  {{"name": "CB1", "page": 2, "field_label": "Start of treatment", "answer": "Yes"}},
  {{"name": "T2", "page": 2, "field_label": "Start date: (MM/DD/YYYY)", "answer": "06/15/2024"}},
  {{"name": "T3", "page": 3, "field_label": "Diagnosis code (ICD-10)", "answer": "MISSING"}}
]"#
    )
}

/// Response schema for the answer extraction call.
pub fn answer_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "name": {"type": "STRING"},
                "page": {"type": "INTEGER"},
                "field_label": {"type": "STRING"},
                "answer": {
                    "type": "STRING",
                    "description": "Answer to the question on the PA form"
                }
            },
            "required": ["name", "page", "field_label", "answer"]
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use forms::WidgetType;

    #[test]
    fn test_context_prompt_embeds_fields() {
        let fields = vec![FieldRecord::new(
            "CB1".into(),
            WidgetType::CheckBox,
            None,
            1,
            "Start of treatment".into(),
        )];
        let prompt = build_context_prompt(&fields);

        assert!(prompt.contains(r#""name": "CB1""#));
        assert!(prompt.contains(r#""label": "Start of treatment""#));
        assert!(prompt.contains("25 words"));
    }

    #[test]
    fn test_referral_prompt_embeds_page_text() {
        let prompt = build_referral_prompt(r#"[{"name": "T1"}]"#);
        assert!(prompt.contains(r#"[{"name": "T1"}]"#));
        assert!(prompt.contains("MISSING"));
    }
}
