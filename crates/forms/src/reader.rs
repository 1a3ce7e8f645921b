use lopdf::Document;
use std::path::Path;
use tracing::{debug, info};

use crate::error::FormError;
use crate::field::{FieldRecord, PageFieldSet};
use crate::pdf;

pub struct FormReader;

impl FormReader {
    /// Read every widget of a fillable PDF, grouped by page.
    pub fn extract_fields(path: &Path) -> Result<PageFieldSet, FormError> {
        let doc = Document::load(path).map_err(|source| FormError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let fields = Self::extract_from_document(&doc)?;
        info!(
            path = %path.display(),
            pages = fields.page_count(),
            fields = fields.field_count(),
            "Extracted form fields"
        );
        Ok(fields)
    }

    pub fn extract_from_document(doc: &Document) -> Result<PageFieldSet, FormError> {
        let mut set = PageFieldSet::new();

        for widget in pdf::widgets(doc)? {
            let info = pdf::inspect(doc, &widget);
            debug!(
                page = widget.page,
                name = %info.name,
                field_type = info.widget_type.code(),
                "Found widget"
            );
            set.push(FieldRecord::new(
                info.name,
                info.widget_type,
                info.value,
                widget.page,
                info.label.unwrap_or_default(),
            ));
        }

        Ok(set)
    }
}
