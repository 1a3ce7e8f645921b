//! In-memory AcroForm fixtures for tests.

pub use lopdf::Document;
use lopdf::{Object, ObjectId, dictionary};

fn rect() -> Object {
    vec![
        Object::Integer(50),
        Object::Integer(50),
        Object::Integer(200),
        Object::Integer(70),
    ]
    .into()
}

fn refs(ids: Vec<ObjectId>) -> Object {
    ids.into_iter().map(Object::Reference).collect::<Vec<_>>().into()
}

/// A document with `pages` empty pages and no form fields.
pub fn blank_document(pages: usize) -> Document {
    assemble(Document::with_version("1.5"), vec![Vec::new(); pages], Vec::new())
}

pub fn checkbox(doc: &mut Document, name: &str, label: &str, on_state: &str) -> ObjectId {
    doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Btn",
        "T" => Object::string_literal(name),
        "TU" => Object::string_literal(label),
        "V" => "Off",
        "AS" => "Off",
        "Rect" => rect(),
        "AP" => dictionary! {
            "N" => dictionary! {
                "Off" => Object::Null,
                on_state => Object::Null,
            },
        },
    })
}

pub fn text_field(doc: &mut Document, name: &str, label: &str, value: &str) -> ObjectId {
    doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Tx",
        "T" => Object::string_literal(name),
        "TU" => Object::string_literal(label),
        "V" => Object::string_literal(value),
        "Rect" => rect(),
    })
}

/// Two pages: checkbox `CB1` on page 1; text `T1`, a nested text field
/// `patient.dob` (separate widget kid) and a signature `Sig1` on page 2.
pub fn sample_form() -> Document {
    let mut doc = Document::with_version("1.5");

    let cb1 = checkbox(&mut doc, "CB1", "Start of treatment", "Yes");
    let t1 = text_field(&mut doc, "T1", "Diagnosis", "original");

    let patient = doc.new_object_id();
    let dob = doc.new_object_id();
    let dob_widget = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "Parent" => dob,
        "Rect" => rect(),
    });
    doc.objects.insert(
        dob,
        Object::Dictionary(dictionary! {
            "FT" => "Tx",
            "T" => Object::string_literal("dob"),
            "TU" => Object::string_literal("Date of birth"),
            "Parent" => patient,
            "Kids" => refs(vec![dob_widget]),
        }),
    );
    doc.objects.insert(
        patient,
        Object::Dictionary(dictionary! {
            "T" => Object::string_literal("patient"),
            "Kids" => refs(vec![dob]),
        }),
    );

    let sig1 = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Sig",
        "T" => Object::string_literal("Sig1"),
        "Rect" => rect(),
    });

    assemble(
        doc,
        vec![vec![cb1], vec![t1, dob_widget, sig1]],
        vec![cb1, t1, patient, sig1],
    )
}

/// Wire pages, annotations and the AcroForm into a catalog.
pub fn assemble(mut doc: Document, pages: Vec<Vec<ObjectId>>, fields: Vec<ObjectId>) -> Document {
    let pages_id = doc.new_object_id();

    let mut kids = Vec::new();
    for annots in pages {
        let page = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ],
            "Annots" => refs(annots),
        });
        kids.push(Object::Reference(page));
    }
    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let acro_form = doc.add_object(dictionary! { "Fields" => refs(fields) });
    let catalog = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
        "AcroForm" => acro_form,
    });
    doc.trailer.set("Root", catalog);
    doc
}
