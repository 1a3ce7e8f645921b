pub mod error;
pub mod field;
pub mod reader;
pub mod writer;

mod pdf;

#[cfg(any(test, feature = "test-fixtures"))]
pub mod testing;

pub use error::FormError;
pub use field::{FieldKind, FieldRecord, PageFieldSet, WidgetType};
pub use reader::FormReader;
pub use writer::{FillReport, FormFiller, is_checked};

use std::path::Path;

/// Read a fillable PDF's widgets grouped by page.
pub fn extract_fields(path: &Path) -> Result<PageFieldSet, FormError> {
    FormReader::extract_fields(path)
}
