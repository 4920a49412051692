//! PDF document access
//!
//! The splitter only needs four capabilities from a PDF engine: page count,
//! per-page text, single-page extraction and serialization. They sit behind
//! [`SourceDocument`] so the pipeline can run against lopdf in production and
//! against in-memory documents in tests.

use lopdf::Document;
use std::path::Path;

use crate::error::{PontoSplitError, Result};

/// An opened, read-only source document
pub trait SourceDocument {
    fn page_count(&self) -> u32;

    /// Embedded text of a page (0-based). `None` when the page has no
    /// extractable text.
    fn page_text(&self, index: u32) -> Option<String>;

    /// Copy a single page (0-based) into a new serialized PDF.
    ///
    /// With `compress`, an optimized encoding is attempted first and a plain
    /// serialization is used if it fails.
    fn extract_page(&self, index: u32, compress: bool) -> Result<Vec<u8>>;
}

/// Opens documents by path
pub trait DocumentLoader: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn SourceDocument>>;
}

/// lopdf-backed loader
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfLoader;

impl DocumentLoader for LopdfLoader {
    fn open(&self, path: &Path) -> Result<Box<dyn SourceDocument>> {
        let doc = Document::load(path).map_err(|e| {
            PontoSplitError::ParseError(format!("{}: {}", path.display(), e))
        })?;
        Ok(Box::new(LopdfDocument::new(doc)))
    }
}

pub struct LopdfDocument {
    doc: Document,
    page_count: u32,
}

impl LopdfDocument {
    pub fn new(doc: Document) -> Self {
        let page_count = doc.get_pages().len() as u32;
        Self { doc, page_count }
    }

    pub fn load_mem(bytes: &[u8]) -> Result<Self> {
        let doc =
            Document::load_mem(bytes).map_err(|e| PontoSplitError::ParseError(e.to_string()))?;
        Ok(Self::new(doc))
    }

    fn check_index(&self, index: u32) -> Result<u32> {
        if index >= self.page_count {
            return Err(PontoSplitError::PageOutOfRange {
                page: index + 1,
                count: self.page_count,
            });
        }
        Ok(index + 1)
    }
}

impl SourceDocument for LopdfDocument {
    fn page_count(&self) -> u32 {
        self.page_count
    }

    fn page_text(&self, index: u32) -> Option<String> {
        let page_number = self.check_index(index).ok()?;
        match self.doc.extract_text(&[page_number]) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::debug!("No text on page {}: {}", page_number, e);
                None
            }
        }
    }

    fn extract_page(&self, index: u32, compress: bool) -> Result<Vec<u8>> {
        let page_number = self.check_index(index)?;

        // Delete every other page (highest first so numbering stays valid)
        let mut single = self.doc.clone();
        let others: Vec<u32> = (1..=self.page_count)
            .rev()
            .filter(|&p| p != page_number)
            .collect();
        if !others.is_empty() {
            single.delete_pages(&others);
        }

        serialize(single, compress)
    }
}

fn save_bytes(doc: &mut Document) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| PontoSplitError::OperationError(format!("Save failed: {}", e)))?;
    Ok(buffer)
}

fn serialize(mut doc: Document, compress: bool) -> Result<Vec<u8>> {
    // Drop everything the deleted pages left behind before any copy is made
    doc.prune_objects();

    if compress {
        let mut optimized = doc.clone();
        optimized.delete_zero_length_streams();
        optimized.renumber_objects();
        optimized.compress();
        match save_bytes(&mut optimized) {
            Ok(bytes) => return Ok(bytes),
            Err(e) => tracing::warn!("Optimized save failed, using plain save: {}", e),
        }
    }

    save_bytes(&mut doc)
}

/// In-process PDF builders for tests
#[cfg(any(test, feature = "test-util"))]
pub mod fixtures {
    use lopdf::{content::Content, content::Operation, dictionary, Document, Object, Stream};

    /// Build a PDF with one page per entry; each line of an entry is drawn as a
    /// separate text object in Helvetica (WinAnsi).
    pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut page_ids = Vec::new();
        for text in pages {
            let mut operations = Vec::new();
            for (i, line) in text.lines().enumerate() {
                operations.push(Operation::new("BT", vec![]));
                operations.push(Operation::new("Tf", vec!["F1".into(), 12i64.into()]));
                operations.push(Operation::new(
                    "Td",
                    vec![72i64.into(), (720 - 16 * i as i64).into()],
                ));
                operations.push(Operation::new("Tj", vec![Object::string_literal(line)]));
                operations.push(Operation::new("ET", vec![]));
            }
            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(
                lopdf::Dictionary::new(),
                content.encode().unwrap(),
            ));

            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0i64.into(), 0i64.into(), 612i64.into(), 792i64.into()],
                "Contents" => content_id,
                "Resources" => resources_id,
            });
            page_ids.push(page_id);
        }

        let pages_dict = dictionary! {
            "Type" => "Pages",
            "Count" => page_ids.len() as i64,
            "Kids" => page_ids.iter().map(|id| Object::Reference(*id)).collect::<Vec<_>>(),
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    /// A PDF with `n` pages labelled "Page 1".."Page n"
    pub fn numbered_pdf(n: u32) -> Vec<u8> {
        let texts: Vec<String> = (1..=n).map(|i| format!("Page {}", i)).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        pdf_with_pages(&refs)
    }
}

/// In-memory documents for exercising the pipeline without PDF bytes
#[cfg(any(test, feature = "test-util"))]
pub mod memory {
    use super::{DocumentLoader, SourceDocument};
    use crate::error::{PontoSplitError, Result};
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Loader keyed by path; each document is a list of page texts
    #[derive(Debug, Default)]
    pub struct MemoryLoader {
        documents: HashMap<PathBuf, Vec<Option<String>>>,
        extractions: Arc<AtomicUsize>,
    }

    impl MemoryLoader {
        pub fn with_document(mut self, path: impl Into<PathBuf>, pages: Vec<Option<&str>>) -> Self {
            self.documents.insert(
                path.into(),
                pages.into_iter().map(|p| p.map(str::to_string)).collect(),
            );
            self
        }

        /// Number of single-page extractions performed so far
        pub fn extractions(&self) -> usize {
            self.extractions.load(Ordering::SeqCst)
        }
    }

    impl DocumentLoader for MemoryLoader {
        fn open(&self, path: &Path) -> Result<Box<dyn SourceDocument>> {
            let pages = self.documents.get(path).cloned().ok_or_else(|| {
                PontoSplitError::ParseError(format!("{}: no such document", path.display()))
            })?;
            Ok(Box::new(MemoryDocument {
                pages,
                extractions: Arc::clone(&self.extractions),
            }))
        }
    }

    pub struct MemoryDocument {
        pages: Vec<Option<String>>,
        extractions: Arc<AtomicUsize>,
    }

    impl SourceDocument for MemoryDocument {
        fn page_count(&self) -> u32 {
            self.pages.len() as u32
        }

        fn page_text(&self, index: u32) -> Option<String> {
            self.pages.get(index as usize).cloned().flatten()
        }

        fn extract_page(&self, index: u32, _compress: bool) -> Result<Vec<u8>> {
            if index as usize >= self.pages.len() {
                return Err(PontoSplitError::PageOutOfRange {
                    page: index + 1,
                    count: self.page_count(),
                });
            }
            self.extractions.fetch_add(1, Ordering::SeqCst);
            Ok(format!("%PDF-memory page {}", index + 1).into_bytes())
        }
    }
}
