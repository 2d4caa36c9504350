use std::collections::HashSet;

use anyhow::{Context, Result, bail};
use lopdf::{Dictionary, Document, Object, ObjectId, dictionary};

const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];
const MAX_TREE_DEPTH: usize = 64;

pub struct PageAssembler {
    document: Document,
    next_id: u32,
    pages: Vec<ObjectId>,
}

impl Default for PageAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl PageAssembler {
    pub fn new() -> Self {
        Self {
            document: Document::with_version("1.5"),
            next_id: 1,
            pages: Vec::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn append_all(&mut self, source: Document) -> Result<usize> {
        let numbers: Vec<u32> = source.get_pages().keys().copied().collect();
        self.append_pages(source, &numbers)
    }

    pub fn append_pages(&mut self, mut source: Document, page_numbers: &[u32]) -> Result<usize> {
        let available = source.get_pages().len() as u32;
        if let Some(missing) = page_numbers
            .iter()
            .find(|&&number| number == 0 || number > available)
        {
            bail!("page {missing} requested from a document with {available} pages");
        }

        source.renumber_objects_with(self.next_id);
        let source_pages = source.get_pages();

        let mut selected = Vec::with_capacity(page_numbers.len());
        for number in page_numbers {
            let page_id = *source_pages
                .get(number)
                .with_context(|| format!("page {number} vanished after renumbering"))?;
            selected.push((page_id, flattened_page(&source, page_id)?));
        }
        let selected_ids: HashSet<ObjectId> = selected.iter().map(|(id, _)| *id).collect();

        for (object_id, object) in std::mem::take(&mut source.objects) {
            match object.type_name().unwrap_or("") {
                "Catalog" | "Pages" | "Page" | "Outlines" | "Outline" => {}
                _ if selected_ids.contains(&object_id) => {}
                _ => {
                    self.document.objects.insert(object_id, object);
                }
            }
        }

        for (page_id, page) in selected {
            self.document
                .objects
                .insert(page_id, Object::Dictionary(page));
            self.pages.push(page_id);
        }

        self.next_id = self.next_id.max(source.max_id + 1);
        Ok(page_numbers.len())
    }

    pub fn into_bytes(mut self) -> Result<Vec<u8>> {
        if self.pages.is_empty() {
            bail!("refusing to write a document without pages");
        }

        let pages_id = (self.next_id, 0);
        let catalog_id = (self.next_id + 1, 0);

        for page_id in &self.pages {
            if let Ok(Object::Dictionary(page)) = self.document.get_object_mut(*page_id) {
                page.set("Parent", Object::Reference(pages_id));
            }
        }

        let kids: Vec<Object> = self.pages.iter().copied().map(Object::Reference).collect();
        let page_total = kids.len() as i64;
        self.document.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => page_total,
            }),
        );
        self.document.objects.insert(
            catalog_id,
            Object::Dictionary(dictionary! {
                "Type" => "Catalog",
                "Pages" => pages_id,
            }),
        );
        self.document.trailer.set("Root", catalog_id);
        self.document.max_id = catalog_id.0;
        self.document.compress();

        let mut output = Vec::new();
        self.document
            .save_to(&mut output)
            .context("failed to serialize assembled document")?;
        Ok(output)
    }
}

fn flattened_page(document: &Document, page_id: ObjectId) -> Result<Dictionary> {
    let mut page = document
        .get_dictionary(page_id)
        .with_context(|| format!("page object {page_id:?} is not a dictionary"))?
        .clone();

    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut depth = 0;
    while let Some(parent_id) = parent {
        depth += 1;
        if depth > MAX_TREE_DEPTH {
            bail!("page tree above {page_id:?} is too deep or cyclic");
        }

        let Ok(node) = document.get_dictionary(parent_id) else {
            break;
        };
        for key in INHERITABLE_KEYS {
            if !page.has(key) {
                if let Ok(value) = node.get(key) {
                    page.set(key.to_vec(), value.clone());
                }
            }
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }

    page.remove(b"Parent");
    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::fixtures::{document_with_pages, page_texts_of};

    #[test]
    fn append_pages_preserves_requested_order() {
        let mut assembler = PageAssembler::new();
        let source = document_with_pages(&["one", "two", "three"]);
        assembler.append_pages(source, &[3, 1]).unwrap();
        assembler
            .append_all(document_with_pages(&["four"]))
            .unwrap();

        assert_eq!(assembler.page_count(), 3);
        let bytes = assembler.into_bytes().unwrap();
        let document = Document::load_mem(&bytes).unwrap();
        let texts = page_texts_of(&document);
        assert_eq!(texts.len(), 3);
        assert!(texts[0].contains("three"));
        assert!(texts[1].contains("one"));
        assert!(texts[2].contains("four"));
    }

    #[test]
    fn append_pages_rejects_out_of_range_pages() {
        let mut assembler = PageAssembler::new();
        let err = assembler
            .append_pages(document_with_pages(&["only"]), &[2])
            .unwrap_err();
        assert!(err.to_string().contains("page 2"));
        assert_eq!(assembler.page_count(), 0);
    }

    #[test]
    fn empty_assembly_is_not_written() {
        assert!(PageAssembler::new().into_bytes().is_err());
    }

    #[test]
    fn flattened_page_inherits_resources_from_tree() {
        let document = document_with_pages(&["inherit"]);
        let page_id = *document.get_pages().get(&1).unwrap();
        let page = flattened_page(&document, page_id).unwrap();
        assert!(page.has(b"Resources"));
        assert!(page.has(b"MediaBox"));
        assert!(!page.has(b"Parent"));
    }
}
