use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::cli::IndexArgs;
use crate::model::{IndexEntry, SkipReason};
use crate::pdf::{self, IoPolicy};
use crate::report::{Reporter, TracingReporter};
use crate::util::{file_name_string, list_files_sorted};

const TAX_ID_PATTERN: &str = r"(\d{3})-(\d{2})-(\d{4})";

pub fn run(args: IndexArgs) -> Result<()> {
    let policy = IoPolicy::from_args(&args.io);
    let index = build_index(&args.w2_dir, &policy, &TracingReporter)?;

    if args.show_entries {
        for (tax_id, entry) in index.sorted_entries() {
            println!(
                "{}\t{}\tpage {}",
                mask_tax_id(tax_id),
                entry.document.display(),
                entry.page_index + 1
            );
        }
    }

    info!(
        w2_dir = %args.w2_dir.display(),
        entries = index.len(),
        documents_scanned = index.documents_scanned,
        documents_skipped = index.documents_skipped,
        duplicates_discarded = index.duplicates_discarded,
        "index completed"
    );
    Ok(())
}

#[derive(Debug, Default)]
pub struct TaxIdIndex {
    entries: HashMap<String, IndexEntry>,
    pub documents_scanned: usize,
    pub documents_skipped: usize,
    pub duplicates_discarded: usize,
}

impl TaxIdIndex {
    pub fn insert_if_absent(&mut self, tax_id: String, entry: IndexEntry) -> bool {
        match self.entries.entry(tax_id) {
            Entry::Occupied(_) => {
                self.duplicates_discarded += 1;
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(entry);
                true
            }
        }
    }

    pub fn get(&self, tax_id: &str) -> Option<&IndexEntry> {
        self.entries.get(tax_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn sorted_entries(&self) -> Vec<(&str, &IndexEntry)> {
        let mut entries: Vec<(&str, &IndexEntry)> = self
            .entries
            .iter()
            .map(|(tax_id, entry)| (tax_id.as_str(), entry))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }
}

pub struct TaxIdMatcher {
    pattern: Regex,
}

impl TaxIdMatcher {
    pub fn new() -> Result<Self> {
        let pattern = Regex::new(TAX_ID_PATTERN).context("failed to compile tax ID regex")?;
        Ok(Self { pattern })
    }

    pub fn find_all(&self, text: &str) -> Vec<String> {
        self.pattern
            .captures_iter(text)
            .map(|captures| {
                let mut digits = String::with_capacity(9);
                for group in 1..=3 {
                    if let Some(part) = captures.get(group) {
                        digits.push_str(part.as_str());
                    }
                }
                digits
            })
            .filter(|digits| digits.len() == 9)
            .collect()
    }
}

pub fn build_index(
    w2_dir: &Path,
    policy: &IoPolicy,
    reporter: &dyn Reporter,
) -> Result<TaxIdIndex> {
    let matcher = TaxIdMatcher::new()?;
    let mut index = TaxIdIndex::default();

    let documents = match list_files_sorted(w2_dir, &["pdf"]) {
        Ok(documents) => documents,
        Err(err) => {
            warn!(
                w2_dir = %w2_dir.display(),
                error = %err,
                "wage-statement directory unreadable; index is empty"
            );
            return Ok(index);
        }
    };
    if documents.is_empty() {
        warn!(w2_dir = %w2_dir.display(), "no wage-statement documents found");
    }

    for path in documents {
        let name = file_name_string(&path);
        let document = match pdf::load_document(policy, &path) {
            Ok(document) => document,
            Err(err) => {
                index.documents_skipped += 1;
                reporter.skipped(&name, &SkipReason::UnreadableDocument(format!("{err:#}")));
                continue;
            }
        };

        index.documents_scanned += 1;
        for (page_index, text) in pdf::page_texts(&document).iter().enumerate() {
            for tax_id in matcher.find_all(text) {
                index.insert_if_absent(
                    tax_id,
                    IndexEntry {
                        document: path.clone(),
                        page_index,
                    },
                );
            }
        }
        debug!(document = %name, entries = index.len(), "indexed wage-statement document");
    }

    info!(
        entries = index.len(),
        duplicates_discarded = index.duplicates_discarded,
        "built tax ID index"
    );
    Ok(index)
}

fn mask_tax_id(tax_id: &str) -> String {
    let visible = tax_id.get(tax_id.len().saturating_sub(4)..).unwrap_or_default();
    format!("***-**-{visible}")
}
