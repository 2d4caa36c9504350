mod assemble;
#[cfg(test)]
pub mod fixtures;
mod io;

pub use assemble::PageAssembler;
pub use io::{IoPolicy, load_document, write_atomic};

use lopdf::Document;
use tracing::debug;

pub fn page_texts(document: &Document) -> Vec<String> {
    document
        .get_pages()
        .keys()
        .map(|&page_number| match document.extract_text(&[page_number]) {
            Ok(text) => text,
            Err(err) => {
                debug!(page = page_number, error = %err, "page text extraction failed");
                String::new()
            }
        })
        .collect()
}

pub fn page_count(document: &Document) -> usize {
    document.get_pages().len()
}
