//! Output packaging
//!
//! The processing root is packed into one Deflate zip, entries named by their
//! path relative to the root (`<document>/<page>.pdf`).

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::Result;

/// Archive name used when too many inputs were submitted to enumerate ids
pub const GENERIC_ARCHIVE_NAME: &str = "renamed_documents.zip";
/// Archive name used when no input carries a numeric id
pub const NO_ID_ARCHIVE_NAME: &str = "split_documents.zip";
/// Archive built from whatever was produced before a cancellation
pub const PARTIAL_ARCHIVE_NAME: &str = "partial_cancelled.zip";

const ID_SEPARATOR: &str = "_&_";
const DEFLATE_LEVEL: i64 = 6;

lazy_static! {
    static ref NUMERIC_ID: Regex = Regex::new(r"\b(\d{3,})\b").unwrap();
}

/// Archive naming policy
#[derive(Debug, Clone, Copy)]
pub struct ArchiveNaming {
    /// More inputs than this get the generic name
    pub threshold: usize,
    /// Joined id list is truncated when it reaches this many characters
    pub max_base_len: usize,
}

impl Default for ArchiveNaming {
    fn default() -> Self {
        Self {
            threshold: 5,
            max_base_len: 60,
        }
    }
}

impl ArchiveNaming {
    /// Derive the archive filename from the submitted input filenames.
    ///
    /// Numeric ids of three or more digits are collected from every input
    /// stem, de-duplicated, sorted numerically and joined with `_&_`.
    pub fn archive_name<S: AsRef<str>>(&self, filenames: &[S]) -> String {
        if filenames.len() > self.threshold {
            return GENERIC_ARCHIVE_NAME.to_string();
        }

        let mut ids = BTreeSet::new();
        for name in filenames {
            let stem = Path::new(name.as_ref())
                .file_stem()
                .map(|s| s.to_string_lossy().to_uppercase())
                .unwrap_or_default();
            for caps in NUMERIC_ID.captures_iter(&stem) {
                ids.insert(caps[1].to_string());
            }
        }

        if ids.is_empty() {
            return NO_ID_ARCHIVE_NAME.to_string();
        }

        let mut ids: Vec<String> = ids.into_iter().collect();
        ids.sort_by_key(|id| (id.parse::<u128>().unwrap_or(u128::MAX), id.clone()));

        let base = ids.join(ID_SEPARATOR);
        let base = if base.chars().count() < self.max_base_len {
            base
        } else {
            let keep = self.max_base_len.saturating_sub(3);
            format!("{}...", base.chars().take(keep).collect::<String>())
        };
        format!("{}.zip", base)
    }
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)?
        .collect::<std::result::Result<Vec<_>, _>>()?
        .into_iter()
        .map(|e| e.path())
        .collect();
    entries.sort();
    for path in entries {
        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

/// Pack every file under `folder` into a zip at `zip_path`.
///
/// Returns the number of entries written.
pub fn make_zip(folder: &Path, zip_path: &Path) -> Result<usize> {
    let mut files = Vec::new();
    collect_files(folder, &mut files)?;

    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(DEFLATE_LEVEL));

    let mut writer = ZipWriter::new(BufWriter::new(File::create(zip_path)?));
    for path in &files {
        let relative = path.strip_prefix(folder).unwrap_or(path);
        let entry = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        writer.start_file(entry, options)?;
        std::io::copy(&mut File::open(path)?, &mut writer)?;
    }
    let mut inner = writer.finish()?;
    inner.flush()?;

    tracing::debug!(
        "Packed {} files from {} into {}",
        files.len(),
        folder.display(),
        zip_path.display()
    );
    Ok(files.len())
}
