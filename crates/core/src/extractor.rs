use crate::error::IngestError;
use lopdf::Document;
use tracing::debug;

pub trait PdfExtractor {
    /// Text of every page in page order, joined by `\n`. Pages without a
    /// recoverable text layer are skipped; an empty string is a valid result.
    fn extract_text(&self, bytes: &[u8]) -> Result<String, IngestError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_text(&self, bytes: &[u8]) -> Result<String, IngestError> {
        let document =
            Document::load_mem(bytes).map_err(|error| IngestError::Extraction(error.to_string()))?;

        let pages = document.get_pages().into_keys().map(|page_no| {
            let extracted = document.extract_text(&[page_no]);
            if let Err(error) = &extracted {
                debug!(page = page_no, %error, "page has no extractable text");
            }
            extracted
        });

        Ok(join_page_texts(pages))
    }
}

/// Joins per-page results, dropping failed and blank pages entirely.
pub fn join_page_texts<I, E>(pages: I) -> String
where
    I: IntoIterator<Item = Result<String, E>>,
{
    pages
        .into_iter()
        .filter_map(Result::ok)
        .map(|text| text.trim_end().to_string())
        .filter(|text| !text.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
