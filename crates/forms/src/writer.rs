use lopdf::{Document, Object, ObjectId};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::FormError;
use crate::field::WidgetType;
use crate::pdf;

/// Answer strings that check a checkbox; compared case-insensitively.
const CHECKED_VALUES: [&str; 4] = ["yes", "true", "checked", "1"];

pub fn is_checked(value: &str) -> bool {
    let value = value.to_lowercase();
    CHECKED_VALUES.contains(&value.as_str())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FillReport {
    pub total_widgets: usize,
    pub filled: usize,
    pub skipped_ineligible: usize,
    pub unmatched: usize,
    pub failed: usize,
}

/// A value change resolved against the document, applied in a second pass.
struct PendingFill {
    name: String,
    widget_id: Option<ObjectId>,
    field_id: Option<ObjectId>,
    update: FieldUpdate,
}

enum FieldUpdate {
    Text(Object),
    Checkbox { state: Vec<u8> },
}

pub struct FormFiller;

impl FormFiller {
    /// Open `target`, apply `answers` to matching widgets and save to `output`.
    pub fn fill(
        target: &Path,
        answers: &BTreeMap<String, String>,
        output: &Path,
    ) -> Result<FillReport, FormError> {
        let mut doc = Document::load(target).map_err(|source| FormError::Open {
            path: target.to_path_buf(),
            source,
        })?;
        info!(path = %target.display(), pages = doc.get_pages().len(), "Opened PDF");

        let report = Self::fill_document(&mut doc, answers)?;

        doc.save(output).map_err(|source| FormError::Save {
            path: output.to_path_buf(),
            source: lopdf::Error::IO(source),
        })?;
        info!(path = %output.display(), "Saved filled PDF");

        Ok(report)
    }

    pub fn fill_document(
        doc: &mut Document,
        answers: &BTreeMap<String, String>,
    ) -> Result<FillReport, FormError> {
        let mut report = FillReport::default();
        let mut pending = Vec::new();

        for widget in pdf::widgets(doc)? {
            report.total_widgets += 1;
            let info = pdf::inspect(doc, &widget);

            if !info.widget_type.is_fillable() {
                debug!(page = widget.page, name = %info.name, field_type = info.widget_type.code(), "Skipped, not a fillable field");
                report.skipped_ineligible += 1;
                continue;
            }

            if info.name.is_empty() {
                debug!(page = widget.page, "Nameless field, never matched");
                report.unmatched += 1;
                continue;
            }

            let Some(value) = answers.get(&info.name) else {
                debug!(page = widget.page, name = %info.name, "No answer for field");
                report.unmatched += 1;
                continue;
            };

            let update = match info.widget_type {
                WidgetType::CheckBox => FieldUpdate::Checkbox {
                    state: if is_checked(value) {
                        pdf::checkbox_on_state(doc, widget.dict)
                    } else {
                        b"Off".to_vec()
                    },
                },
                _ => FieldUpdate::Text(pdf::encode_text(value)),
            };

            pending.push(PendingFill {
                name: info.name,
                widget_id: widget.id,
                field_id: info.field_id,
                update,
            });
        }

        for fill in pending {
            match Self::apply(doc, &fill) {
                Ok(()) => {
                    report.filled += 1;
                    debug!(name = %fill.name, "Filled field");
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(name = %fill.name, error = %e, "Failed to fill field");
                }
            }
        }

        if report.filled > 0 {
            pdf::set_need_appearances(doc)?;
        }

        info!(
            total_widgets = report.total_widgets,
            filled = report.filled,
            skipped = report.skipped_ineligible,
            unmatched = report.unmatched,
            failed = report.failed,
            "Form fill summary"
        );
        Ok(report)
    }

    fn apply(doc: &mut Document, fill: &PendingFill) -> Result<(), FormError> {
        let widget_id = fill
            .widget_id
            .ok_or_else(|| FormError::InlineWidget(fill.name.clone()))?;
        let field_id = fill.field_id.unwrap_or(widget_id);

        let malformed = |e: lopdf::Error| FormError::Malformed(format!("{}: {e}", fill.name));

        match &fill.update {
            FieldUpdate::Text(value) => {
                doc.get_dictionary_mut(field_id)
                    .map_err(malformed)?
                    .set("V", value.clone());
            }
            FieldUpdate::Checkbox { state } => {
                doc.get_dictionary_mut(field_id)
                    .map_err(malformed)?
                    .set("V", Object::Name(state.clone()));
                doc.get_dictionary_mut(widget_id)
                    .map_err(malformed)?
                    .set("AS", Object::Name(state.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::FormReader;
    use crate::testing::{assemble, checkbox, sample_form, text_field};
    use lopdf::dictionary;

    fn answers(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn widget_state(doc: &Document, name: &str) -> Option<String> {
        pdf::widgets(doc)
            .unwrap()
            .into_iter()
            .find(|w| pdf::inspect(doc, w).name == name)
            .and_then(|w| w.dict.get(b"AS").ok().and_then(|o| o.as_name().ok()))
            .map(|n| String::from_utf8_lossy(n).into_owned())
    }

    #[test]
    fn test_checkbox_interpretation() {
        for value in ["Yes", "yes", "TRUE", "Checked", "1"] {
            assert!(is_checked(value), "{value} should check");
        }
        for value in ["No", "maybe", "", "0", "false", "yes please"] {
            assert!(!is_checked(value), "{value} should not check");
        }
    }

    #[test]
    fn test_fill_text_and_checkbox() {
        let mut doc = sample_form();
        let report = FormFiller::fill_document(
            &mut doc,
            &answers(&[("CB1", "Yes"), ("patient.dob", "01/02/1980"), ("Sig1", "x")]),
        )
        .unwrap();

        assert_eq!(report.total_widgets, 4);
        assert_eq!(report.filled, 2);
        assert_eq!(report.skipped_ineligible, 1);
        assert_eq!(report.unmatched, 1);
        assert_eq!(report.failed, 0);

        let fields = FormReader::extract_from_document(&doc).unwrap();
        let page2 = fields.get(2).unwrap();
        assert_eq!(page2[0].raw_value.as_deref(), Some("original"));
        assert_eq!(page2[1].raw_value.as_deref(), Some("01/02/1980"));
        assert_eq!(fields.get(1).unwrap()[0].raw_value.as_deref(), Some("Yes"));
        assert_eq!(widget_state(&doc, "CB1").as_deref(), Some("Yes"));
    }

    #[test]
    fn test_checkbox_uses_declared_on_state() {
        let mut doc = Document::with_version("1.5");
        let cb = checkbox(&mut doc, "CB7", "Urgent", "On");
        let cb_off = checkbox(&mut doc, "CB8", "Routine", "On");
        let mut doc = assemble(doc, vec![vec![cb, cb_off]], vec![cb, cb_off]);

        FormFiller::fill_document(&mut doc, &answers(&[("CB7", "true"), ("CB8", "No")])).unwrap();

        assert_eq!(widget_state(&doc, "CB7").as_deref(), Some("On"));
        assert_eq!(widget_state(&doc, "CB8").as_deref(), Some("Off"));
    }

    #[test]
    fn test_fill_writes_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("pa.pdf");
        let output = dir.path().join("filled.pdf");
        sample_form().save(&target).unwrap();

        let report = FormFiller::fill(&target, &answers(&[("T1", "M54.5")]), &output).unwrap();
        assert_eq!(report.filled, 1);

        let original = FormReader::extract_fields(&target).unwrap();
        let filled = FormReader::extract_fields(&output).unwrap();
        assert_eq!(original.get(2).unwrap()[0].raw_value.as_deref(), Some("original"));
        assert_eq!(filled.get(2).unwrap()[0].raw_value.as_deref(), Some("M54.5"));
    }

    #[test]
    fn test_nameless_widget_never_matched() {
        let mut doc = Document::with_version("1.5");
        let t1 = text_field(&mut doc, "T1", "Diagnosis", "original");
        let nameless = doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "FT" => "Tx",
            "V" => Object::string_literal("orig"),
        });
        let mut doc = assemble(doc, vec![vec![t1, nameless]], vec![t1, nameless]);

        let report =
            FormFiller::fill_document(&mut doc, &answers(&[("", "INJECTED"), ("T1", "M54.5")]))
                .unwrap();

        assert_eq!(report.filled, 1);
        assert_eq!(report.unmatched, 1);
        let fields = FormReader::extract_from_document(&doc).unwrap();
        let page1 = fields.get(1).unwrap();
        assert_eq!(page1[0].raw_value.as_deref(), Some("M54.5"));
        assert_eq!(page1[1].name, "");
        assert_eq!(page1[1].raw_value.as_deref(), Some("orig"));
    }
}
