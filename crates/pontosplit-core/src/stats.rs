//! Page outcomes and job statistics

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How a page got its filename
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// Employee name extracted and accepted
    Named,
    /// Placeholder name, flagged for human review
    Manual,
}

/// Result of processing one page
#[derive(Debug, Clone, PartialEq)]
pub struct PageOutcome {
    /// 0-based
    pub index: u32,
    /// Sanitized stem before collision resolution
    pub stem: String,
    pub kind: OutcomeKind,
    /// Path actually written; `None` for a dry run
    pub path: Option<PathBuf>,
}

impl PageOutcome {
    /// 1-based page number as shown to users
    pub fn page_number(&self) -> u32 {
        self.index + 1
    }

    /// Stem of the file on disk, or the derived stem when nothing was written
    pub fn final_stem(&self) -> String {
        self.path
            .as_ref()
            .and_then(|p| p.file_stem())
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.stem.clone())
    }
}

/// Statistics for a single source document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileStats {
    pub file: String,
    /// Page count of the document, whether or not every page was processed
    pub pages: u32,
    pub renamed: u32,
    pub manual: u32,
    pub manual_pages: Vec<String>,
}

impl FileStats {
    pub fn new(file: impl Into<String>, pages: u32) -> Self {
        Self {
            file: file.into(),
            pages,
            ..Default::default()
        }
    }

    pub fn record(&mut self, outcome: &PageOutcome) {
        match outcome.kind {
            OutcomeKind::Named => self.renamed += 1,
            OutcomeKind::Manual => {
                self.manual += 1;
                self.manual_pages.push(manual_descriptor(
                    outcome.page_number(),
                    &self.file,
                ));
            }
        }
    }

    /// Pages processed so far
    pub fn processed(&self) -> u32 {
        self.renamed + self.manual
    }
}

/// Human-readable pointer to a page that needs manual naming
pub fn manual_descriptor(page_number: u32, file: &str) -> String {
    format!("Page {} of {}.pdf", page_number, file)
}

/// Per-file row in a job summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileBreakdown {
    pub file: String,
    pub pages: u32,
    pub renamed: u32,
    pub manual: u32,
}

/// Aggregated counters for a whole job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobStatistics {
    pub renamed: u32,
    pub manual: u32,
    pub manual_pages: Vec<String>,
    pub files: Vec<FileBreakdown>,
}

impl JobStatistics {
    /// Fold one document's statistics into the job totals
    pub fn absorb(&mut self, stats: FileStats) {
        self.renamed += stats.renamed;
        self.manual += stats.manual;
        self.files.push(FileBreakdown {
            file: stats.file,
            pages: stats.pages,
            renamed: stats.renamed,
            manual: stats.manual,
        });
        self.manual_pages.extend(stats.manual_pages);
    }

    pub fn processed(&self) -> u32 {
        self.renamed + self.manual
    }
}
