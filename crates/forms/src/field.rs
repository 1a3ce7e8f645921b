use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Widget type codes as reported by the PDF reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WidgetType {
    Unknown,
    Button,
    CheckBox,
    ComboBox,
    ListBox,
    RadioButton,
    Signature,
    Text,
}

impl WidgetType {
    // /Ff bits (PDF 32000-1, 12.7.4)
    const FLAG_RADIO: i64 = 1 << 15;
    const FLAG_PUSHBUTTON: i64 = 1 << 16;
    const FLAG_COMBO: i64 = 1 << 17;

    /// Classify a widget from its inherited `/FT` name and `/Ff` flags.
    pub fn from_field_type(ft: Option<&[u8]>, flags: i64) -> Self {
        match ft {
            Some(b"Btn") => {
                if flags & Self::FLAG_PUSHBUTTON != 0 {
                    WidgetType::Button
                } else if flags & Self::FLAG_RADIO != 0 {
                    WidgetType::RadioButton
                } else {
                    WidgetType::CheckBox
                }
            }
            Some(b"Tx") => WidgetType::Text,
            Some(b"Ch") => {
                if flags & Self::FLAG_COMBO != 0 {
                    WidgetType::ComboBox
                } else {
                    WidgetType::ListBox
                }
            }
            Some(b"Sig") => WidgetType::Signature,
            _ => WidgetType::Unknown,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            WidgetType::Unknown => 0,
            WidgetType::Button => 1,
            WidgetType::CheckBox => 2,
            WidgetType::ComboBox => 3,
            WidgetType::ListBox => 4,
            WidgetType::RadioButton => 5,
            WidgetType::Signature => 6,
            WidgetType::Text => 7,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            WidgetType::Unknown => "unknown",
            WidgetType::Button => "Button",
            WidgetType::CheckBox => "CheckBox",
            WidgetType::ComboBox => "ComboBox",
            WidgetType::ListBox => "ListBox",
            WidgetType::RadioButton => "RadioButton",
            WidgetType::Signature => "Signature",
            WidgetType::Text => "Text",
        }
    }

    /// Only text boxes and checkboxes receive answers.
    pub fn is_fillable(self) -> bool {
        matches!(self, WidgetType::Text | WidgetType::CheckBox)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Checkbox,
    Other,
}

impl From<WidgetType> for FieldKind {
    fn from(widget_type: WidgetType) -> Self {
        match widget_type {
            WidgetType::CheckBox => FieldKind::Checkbox,
            WidgetType::Text => FieldKind::Text,
            _ => FieldKind::Other,
        }
    }
}

/// One fillable widget as read from the form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    #[serde(rename = "value")]
    pub raw_value: Option<String>,
    pub page: u32,
    pub label: String,
    #[serde(rename = "field_type")]
    pub provider_type_code: i32,
    #[serde(rename = "field_type_string")]
    pub provider_type_name: String,
}

impl FieldRecord {
    pub fn new(
        name: String,
        widget_type: WidgetType,
        raw_value: Option<String>,
        page: u32,
        label: String,
    ) -> Self {
        Self {
            name,
            kind: widget_type.into(),
            raw_value,
            page,
            label,
            provider_type_code: widget_type.code(),
            provider_type_name: widget_type.name().to_string(),
        }
    }
}

/// Field records grouped by 1-based page number, in page order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageFieldSet {
    pages: BTreeMap<u32, Vec<FieldRecord>>,
}

impl PageFieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Group records under their own page so the page key always matches.
    pub fn from_records(records: impl IntoIterator<Item = FieldRecord>) -> Self {
        let mut set = Self::new();
        for record in records {
            set.push(record);
        }
        set
    }

    pub fn push(&mut self, record: FieldRecord) {
        self.pages.entry(record.page).or_default().push(record);
    }

    pub fn get(&self, page: u32) -> Option<&[FieldRecord]> {
        self.pages.get(&page).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &[FieldRecord])> {
        self.pages.iter().map(|(page, fields)| (*page, fields.as_slice()))
    }

    pub fn pages(&self) -> impl Iterator<Item = u32> + '_ {
        self.pages.keys().copied()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn field_count(&self) -> usize {
        self.pages.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}
