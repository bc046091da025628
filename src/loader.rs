//! PDF document loading and per-page text extraction.

use lopdf::Document;
use thiserror::Error;

use crate::rag::PageText;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("not a PDF file")]
    NotPdf,

    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),

    #[error("document has no pages")]
    Empty,
}

pub type Result<T> = std::result::Result<T, LoadError>;

/// Check whether a byte buffer starts with the PDF magic bytes.
pub fn is_pdf(data: &[u8]) -> bool {
    data.len() >= 4 && &data[0..4] == b"%PDF"
}

/// Extract per-page plain text from PDF bytes.
///
/// Returns one entry per page, in document order. A page whose text cannot
/// be decoded yields an empty string instead of failing the whole document.
pub fn load_pdf(data: &[u8]) -> Result<Vec<PageText>> {
    if !is_pdf(data) {
        return Err(LoadError::NotPdf);
    }

    let doc = Document::load_mem(data)?;
    let pages = doc.get_pages();
    if pages.is_empty() {
        return Err(LoadError::Empty);
    }

    let mut out = Vec::with_capacity(pages.len());
    for &page_number in pages.keys() {
        let text = doc.extract_text(&[page_number]).unwrap_or_default();
        out.push(PageText { page_number, text });
    }
    Ok(out)
}

/// Build a minimal PDF with one text page per entry, for tests.
#[cfg(test)]
pub(crate) fn build_pdf(pages: &[&str]) -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![50.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode page content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).expect("serialize PDF");
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_pdf() {
        assert!(is_pdf(b"%PDF-1.4"));
        assert!(!is_pdf(b"Not a PDF"));
        assert!(!is_pdf(b"%PD"));
    }

    #[test]
    fn test_load_pdf_page_order() {
        let data = build_pdf(&["First page text.", "Second page text.", "Third page text."]);
        let pages = load_pdf(&data).unwrap();

        assert_eq!(pages.len(), 3);
        for (i, page) in pages.iter().enumerate() {
            assert_eq!(page.page_number, i as u32 + 1);
        }
        assert!(pages[0].text.contains("First page text."));
        assert!(pages[1].text.contains("Second page text."));
        assert!(pages[2].text.contains("Third page text."));
    }

    #[test]
    fn test_load_pdf_rejects_non_pdf() {
        assert!(matches!(load_pdf(b"plain text"), Err(LoadError::NotPdf)));
    }

    #[test]
    fn test_load_pdf_rejects_garbage_with_magic() {
        let result = load_pdf(b"%PDF-1.4 this is not actually a pdf body");
        assert!(matches!(result, Err(LoadError::Parse(_)) | Err(LoadError::Empty)));
    }
}
