use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersonRecord {
    pub first_name: String,
    pub last_name: String,
    pub zip_code: String,
    pub tax_id: String,
    pub source_filename: String,
}

impl PersonRecord {
    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            tax_id: self.tax_id.clone(),
            zip_code: self.zip_code.clone(),
        }
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    pub first_name: String,
    pub last_name: String,
    pub tax_id: String,
    pub zip_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexEntry {
    pub document: PathBuf,
    pub page_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    #[error("unreadable document: {0}")]
    UnreadableDocument(String),
    #[error("malformed filename: {0}")]
    MalformedFilename(String),
    #[error("incomplete record: {0}")]
    IncompleteRecord(String),
    #[error("source document not found: {0}")]
    SourceNotFound(String),
    #[error("no matching wage statement: {0}")]
    NoMatchingWageStatement(String),
    #[error("write failure: {0}")]
    WriteFailure(String),
}

impl SkipReason {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnreadableDocument(_) => "unreadable_document",
            Self::MalformedFilename(_) => "malformed_filename",
            Self::IncompleteRecord(_) => "incomplete_record",
            Self::SourceNotFound(_) => "source_not_found",
            Self::NoMatchingWageStatement(_) => "no_matching_wage_statement",
            Self::WriteFailure(_) => "write_failure",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MergeOutcome {
    Merged { path: PathBuf, pages: usize },
    Skipped { reason: SkipReason },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleManifest {
    pub path: PathBuf,
    pub page_count: usize,
    pub names: Vec<(String, String)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkipEntry {
    pub unit: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordOutcome {
    pub name: String,
    pub source_filename: String,
    pub outcome: MergeOutcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeCounts {
    pub index_entries: usize,
    pub index_duplicates_discarded: usize,
    pub records_loaded: usize,
    pub rows_rejected: usize,
    pub merged: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MergeRunReport {
    pub report_version: u32,
    pub started_at: String,
    pub finished_at: String,
    pub company_dir: String,
    pub w2_dir: String,
    pub people_dir: String,
    pub output_dir: String,
    pub suffix_policy: String,
    pub jobs: usize,
    pub counts: MergeCounts,
    pub records: Vec<RecordOutcome>,
    pub skipped_inputs: Vec<SkipEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CombineRunReport {
    pub report_version: u32,
    pub started_at: String,
    pub finished_at: String,
    pub merged_dir: String,
    pub output_dir: String,
    pub bundle_size: usize,
    pub candidate_count: usize,
    pub bundles: Vec<BundleManifest>,
    pub skipped: Vec<SkipEntry>,
}
