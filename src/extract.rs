//! PDF text extraction.
//!
//! Walks the pages of a PDF in document order and collects whatever text
//! layer each page carries. Pages without an extractable text layer
//! (scanned image-only pages) are skipped by default.

use crate::errors::{StudyPalError, StudyPalResult};

/// What to do when a page yields no extractable text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyPagePolicy {
    /// Skip the page and keep going (default).
    #[default]
    Skip,
    /// Abort the whole extraction.
    Fail,
}

/// Text pulled out of a PDF. Page texts stay separate so the chunker can
/// respect page boundaries; page counts are kept for logging and metadata.
#[derive(Debug, Clone)]
pub struct ExtractedText {
    /// Text of each page that had a text layer, in document order.
    pub pages: Vec<String>,
    pub page_count: usize,
    pub skipped_pages: usize,
}

impl ExtractedText {
    /// The whole document as one blob, pages joined by newlines.
    pub fn text(&self) -> String {
        self.pages.join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// Extract the text content of every page, in document order.
///
/// Fails with `Extraction` when the bytes are not a parseable PDF, or when
/// a page has no text layer and the policy is `Fail`.
pub fn extract_pdf_text(bytes: &[u8], policy: EmptyPagePolicy) -> StudyPalResult<ExtractedText> {
    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| StudyPalError::Extraction(format!("not a parseable PDF: {e}")))?;

    let pages = doc.get_pages();
    let page_count = pages.len();
    let mut parts: Vec<String> = Vec::with_capacity(page_count);
    let mut skipped = 0usize;

    // get_pages returns a BTreeMap keyed by 1-based page number, so
    // iteration order is document order.
    for page_no in pages.keys() {
        let page_text = match doc.extract_text(&[*page_no]) {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                tracing::debug!(page = page_no, error = %e, "page has no extractable text");
                String::new()
            }
        };

        if page_text.is_empty() {
            match policy {
                EmptyPagePolicy::Skip => {
                    tracing::warn!(page = page_no, "skipping page without text layer");
                    skipped += 1;
                    continue;
                }
                EmptyPagePolicy::Fail => {
                    return Err(StudyPalError::Extraction(format!(
                        "page {page_no} has no extractable text layer"
                    )));
                }
            }
        }

        parts.push(page_text);
    }

    tracing::debug!(
        pages = page_count,
        skipped = skipped,
        chars = parts.iter().map(String::len).sum::<usize>(),
        "PDF text extracted"
    );

    Ok(ExtractedText {
        pages: parts,
        page_count,
        skipped_pages: skipped,
    })
}

#[cfg(test)]
pub(crate) mod test_pdf {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    /// Build a minimal single-font PDF with one page per input string.
    /// Pages with an empty string get no text operators at all.
    pub fn build(pages: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let mut operations = Vec::new();
            if !text.is_empty() {
                operations.extend([
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![50.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ]);
            }
            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                content.encode().expect("encode content stream"),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).expect("serialize test PDF");
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_pages_in_order() {
        let bytes = test_pdf::build(&["Alpha section text.", "Beta section text."]);
        let extracted = extract_pdf_text(&bytes, EmptyPagePolicy::Skip).unwrap();
        assert_eq!(extracted.page_count, 2);
        assert_eq!(extracted.skipped_pages, 0);
        assert_eq!(extracted.pages.len(), 2);
        assert!(extracted.pages[0].contains("Alpha section text."));
        assert!(extracted.pages[1].contains("Beta section text."));

        let blob = extracted.text();
        let alpha = blob.find("Alpha section text.").unwrap();
        let beta = blob.find("Beta section text.").unwrap();
        assert!(alpha < beta, "pages must be concatenated in document order");
    }

    #[test]
    fn skips_empty_pages_by_default() {
        let bytes = test_pdf::build(&["Alpha section text.", ""]);
        let extracted = extract_pdf_text(&bytes, EmptyPagePolicy::Skip).unwrap();
        assert_eq!(extracted.page_count, 2);
        assert_eq!(extracted.skipped_pages, 1);
        assert_eq!(extracted.pages.len(), 1);
        assert!(extracted.pages[0].contains("Alpha section text."));
    }

    #[test]
    fn fail_policy_aborts_on_empty_page() {
        let bytes = test_pdf::build(&["Alpha section text.", ""]);
        let err = extract_pdf_text(&bytes, EmptyPagePolicy::Fail).unwrap_err();
        assert_eq!(err.kind(), "extraction");
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        let err = extract_pdf_text(b"definitely not a pdf", EmptyPagePolicy::Skip).unwrap_err();
        assert_eq!(err.kind(), "extraction");
    }
}
