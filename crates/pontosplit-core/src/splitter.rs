//! Per-document page splitting
//!
//! Every page of a source document becomes its own PDF, named after the
//! employee found in the page text or, failing that, after the document and
//! page number with a `MANUAL_` marker.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::document::DocumentLoader;
use crate::error::Result;
use crate::events::{ProgressEvent, ProgressSink};
use crate::extract::extract_name;
use crate::normalize::normalize_text;
use crate::sanitize::{safe_identifier, sanitize_filename, sanitize_name_tokens};
use crate::stats::{FileStats, OutcomeKind, PageOutcome};

pub const MANUAL_PREFIX: &str = "MANUAL";
const PDF_EXTENSION: &str = "pdf";

/// Display name of a source document: filename without extension
pub fn display_name(source: &Path) -> String {
    source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| source.display().to_string())
}

/// Folder name for a document's pages under the processing root.
///
/// Never resolves to `.` or `..`, so a document cannot write outside its own folder.
pub fn document_dir_name(doc_name: &str) -> String {
    let clean = sanitize_filename(doc_name);
    if clean.chars().all(|c| c == '.') {
        safe_identifier(&clean)
    } else {
        clean
    }
}

/// Placeholder stem for a page whose name could not be extracted
pub fn manual_stem(doc_name: &str, index: u32) -> String {
    format!("{}_{}_{}", MANUAL_PREFIX, doc_name, index + 1)
}

/// Decide the filename stem for a page from its raw text
pub fn classify_page(text: Option<&str>, doc_name: &str, index: u32) -> (String, OutcomeKind) {
    let raw = text.unwrap_or("");
    let normalized = normalize_text(raw);
    let candidate = extract_name(&normalized, text);

    match sanitize_name_tokens(candidate.as_deref()) {
        Some(name) => (sanitize_filename(&name), OutcomeKind::Named),
        None => (
            sanitize_filename(&manual_stem(doc_name, index)),
            OutcomeKind::Manual,
        ),
    }
}

/// Write `bytes` to `<dir>/<stem>.<ext>`, or `<stem>_1`, `<stem>_2`, ... if
/// taken. Never overwrites.
pub fn write_unique(dir: &Path, stem: &str, ext: &str, bytes: &[u8]) -> Result<PathBuf> {
    let mut suffix = 0u32;
    loop {
        let name = if suffix == 0 {
            format!("{}.{}", stem, ext)
        } else {
            format!("{}_{}.{}", stem, suffix, ext)
        };
        let path = dir.join(name);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(bytes)?;
                return Ok(path);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => suffix += 1,
            Err(e) => return Err(e.into()),
        }
    }
}

/// Splits documents page by page, reporting progress to `sink`
pub struct Splitter<'a> {
    pub loader: &'a dyn DocumentLoader,
    pub sink: &'a dyn ProgressSink,
    /// Checked once before each page
    pub is_cancelled: &'a dyn Fn() -> bool,
    pub compress: bool,
}

impl<'a> Splitter<'a> {
    /// Split `source` into `out_dir`; with `out_dir = None` pages are
    /// classified and reported but nothing is written.
    pub fn split(&self, source: &Path, out_dir: Option<&Path>) -> Result<FileStats> {
        let doc_name = display_name(source);
        let doc = self.loader.open(source)?;
        let total = doc.page_count();

        if let Some(dir) = out_dir {
            fs::create_dir_all(dir)?;
        }

        let mut stats = FileStats::new(doc_name.clone(), total);
        self.sink.emit(ProgressEvent::FileStart {
            file: doc_name.clone(),
            pages: total,
        });

        for index in 0..total {
            if (self.is_cancelled)() {
                tracing::info!(
                    "Cancelled before page {} of {}",
                    index + 1,
                    doc_name
                );
                break;
            }

            let text = doc.page_text(index);
            let (stem, kind) = classify_page(text.as_deref(), &doc_name, index);

            let path = match out_dir {
                Some(dir) => {
                    let bytes = doc.extract_page(index, self.compress)?;
                    Some(write_unique(dir, &stem, PDF_EXTENSION, &bytes)?)
                }
                None => None,
            };

            let outcome = PageOutcome {
                index,
                stem,
                kind,
                path,
            };
            stats.record(&outcome);

            tracing::debug!(
                "{} page {}: {:?} -> {}",
                doc_name,
                outcome.page_number(),
                outcome.kind,
                outcome.final_stem()
            );
            self.sink.emit(ProgressEvent::PageDone {
                file: doc_name.clone(),
                page: outcome.page_number(),
                new_name: outcome.final_stem(),
            });
        }

        Ok(stats)
    }
}
