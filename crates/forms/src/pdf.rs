//! Low-level AcroForm helpers over the `lopdf` object model.

use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};

use crate::error::FormError;
use crate::field::WidgetType;

/// Parent chains deeper than this are treated as cyclic.
const MAX_FIELD_DEPTH: usize = 32;

/// Follow indirect references until a direct object is reached.
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    let mut current = obj;
    for _ in 0..MAX_FIELD_DEPTH {
        match current {
            Object::Reference(id) => current = doc.get_object(*id).ok()?,
            other => return Some(other),
        }
    }
    None
}

fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    resolve(doc, obj).and_then(|o| o.as_dict().ok())
}

/// Decode a PDF text string: UTF-16BE with BOM, then UTF-8, then Latin-1.
pub(crate) fn decode_text(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Encode a value as a PDF text string, UTF-16BE when it is not plain ASCII.
pub(crate) fn encode_text(value: &str) -> Object {
    if value.is_ascii() {
        return Object::string_literal(value);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in value.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

fn object_text(doc: &Document, obj: &Object) -> Option<String> {
    match resolve(doc, obj)? {
        Object::String(bytes, _) => Some(decode_text(bytes)),
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        _ => None,
    }
}

/// A widget annotation found in a page's `/Annots` array.
pub(crate) struct PageWidget<'a> {
    pub page: u32,
    pub id: Option<ObjectId>,
    pub dict: &'a Dictionary,
}

/// Every widget annotation of the document, in page order.
pub(crate) fn widgets(doc: &Document) -> Result<Vec<PageWidget<'_>>, FormError> {
    let mut found = Vec::new();

    for (page, page_id) in doc.get_pages() {
        let page_dict = doc
            .get_object(page_id)
            .and_then(|o| o.as_dict())
            .map_err(|e| FormError::Malformed(format!("page {page}: {e}")))?;

        let annots = match page_dict.get(b"Annots") {
            Ok(obj) => obj,
            Err(_) => continue,
        };
        let Some(Object::Array(entries)) = resolve(doc, annots) else {
            continue;
        };

        for entry in entries {
            let id = match entry {
                Object::Reference(id) => Some(*id),
                _ => None,
            };
            let Some(dict) = resolve_dict(doc, entry) else {
                continue;
            };
            let is_widget = matches!(dict.get(b"Subtype"), Ok(Object::Name(n)) if n == b"Widget");
            if is_widget {
                found.push(PageWidget { page, id, dict });
            }
        }
    }

    Ok(found)
}

/// Field attributes of a widget, inherited along its `/Parent` chain.
pub(crate) struct WidgetInfo {
    pub name: String,
    pub widget_type: WidgetType,
    pub value: Option<String>,
    pub label: Option<String>,
    /// The terminal field dictionary (the first in the chain carrying `/T`).
    pub field_id: Option<ObjectId>,
}

pub(crate) fn inspect(doc: &Document, widget: &PageWidget<'_>) -> WidgetInfo {
    let chain = field_chain(doc, widget.id, widget.dict);

    let mut parts = Vec::new();
    let mut field_id = None;
    let mut terminal_seen = false;
    for (id, dict) in &chain {
        if let Some(part) = dict.get(b"T").ok().and_then(|t| object_text(doc, t)) {
            if !terminal_seen {
                field_id = *id;
                terminal_seen = true;
            }
            parts.push(part);
        }
    }
    parts.reverse();

    let inherited = |key: &[u8]| chain.iter().find_map(|(_, d)| d.get(key).ok());

    let ft = inherited(b"FT")
        .and_then(|o| resolve(doc, o))
        .and_then(|o| o.as_name().ok());
    let flags = inherited(b"Ff")
        .and_then(|o| resolve(doc, o))
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(0);

    WidgetInfo {
        name: parts.join("."),
        widget_type: WidgetType::from_field_type(ft, flags),
        value: inherited(b"V").and_then(|o| object_text(doc, o)),
        label: inherited(b"TU").and_then(|o| object_text(doc, o)),
        field_id,
    }
}

fn field_chain<'a>(
    doc: &'a Document,
    id: Option<ObjectId>,
    dict: &'a Dictionary,
) -> Vec<(Option<ObjectId>, &'a Dictionary)> {
    let mut chain = vec![(id, dict)];
    let mut current = dict;
    while chain.len() < MAX_FIELD_DEPTH {
        let Ok(Object::Reference(parent_id)) = current.get(b"Parent") else {
            break;
        };
        let Ok(parent) = doc.get_dictionary(*parent_id) else {
            break;
        };
        chain.push((Some(*parent_id), parent));
        current = parent;
    }
    chain
}

/// The appearance state a checkbox uses for "checked"; `Yes` when unspecified.
pub(crate) fn checkbox_on_state(doc: &Document, widget: &Dictionary) -> Vec<u8> {
    widget
        .get(b"AP")
        .ok()
        .and_then(|ap| resolve_dict(doc, ap))
        .and_then(|ap| ap.get(b"N").ok())
        .and_then(|n| resolve_dict(doc, n))
        .and_then(|normal| {
            normal
                .iter()
                .map(|(key, _)| key)
                .find(|key| key.as_slice() != b"Off")
                .cloned()
        })
        .unwrap_or_else(|| b"Yes".to_vec())
}

/// Ask viewers to regenerate widget appearances from the new values.
pub(crate) fn set_need_appearances(doc: &mut Document) -> Result<(), FormError> {
    let root = doc
        .trailer
        .get(b"Root")
        .and_then(|o| o.as_reference())
        .map_err(|e| FormError::Malformed(format!("missing catalog: {e}")))?;

    let acro_form = doc
        .get_dictionary(root)
        .and_then(|catalog| catalog.get(b"AcroForm"))
        .ok()
        .cloned();

    match acro_form {
        Some(Object::Reference(id)) => {
            let form = doc
                .get_dictionary_mut(id)
                .map_err(|e| FormError::Malformed(format!("AcroForm: {e}")))?;
            form.set("NeedAppearances", true);
        }
        Some(Object::Dictionary(_)) => {
            let catalog = doc
                .get_dictionary_mut(root)
                .map_err(|e| FormError::Malformed(format!("catalog: {e}")))?;
            if let Ok(Object::Dictionary(form)) = catalog.get_mut(b"AcroForm") {
                form.set("NeedAppearances", true);
            }
        }
        _ => {}
    }
    Ok(())
}
