use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use regex::Regex;

const MERGED_NAME_PATTERN: &str = r"^([A-Za-z-]+)_([A-Za-z-]+)_(\d{6})\.pdf$";

pub const SEQUENCE_LIMIT: u32 = 1_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergedName {
    Parsed {
        last: String,
        first: String,
        sequence: u32,
    },
    Unparsed,
}

pub fn merged_file_name(last: &str, first: &str, sequence: u32) -> String {
    format!("{last}_{first}_{sequence:06}.pdf")
}

pub fn combined_file_name(timestamp: NaiveDateTime) -> String {
    format!("combined_{}.pdf", timestamp.format("%Y%m%d_%H%M%S_%6f"))
}

pub struct MergedNameParser {
    pattern: Regex,
}

impl MergedNameParser {
    pub fn new() -> Result<Self> {
        let pattern =
            Regex::new(MERGED_NAME_PATTERN).context("failed to compile merged filename regex")?;
        Ok(Self { pattern })
    }

    pub fn parse(&self, file_name: &str) -> MergedName {
        let Some(captures) = self.pattern.captures(file_name) else {
            return MergedName::Unparsed;
        };

        let sequence = captures
            .get(3)
            .and_then(|digits| digits.as_str().parse::<u32>().ok());
        match (captures.get(1), captures.get(2), sequence) {
            (Some(last), Some(first), Some(sequence)) => MergedName::Parsed {
                last: last.as_str().to_string(),
                first: first.as_str().to_string(),
                sequence,
            },
            _ => MergedName::Unparsed,
        }
    }
}
