//! ZIP archive codec for Word-format document archives.
//!
//! A Word document is a ZIP container holding a handful of XML parts. This
//! crate only understands enough of the format to locate and swap the main
//! document part; every other part is carried through unchanged.

use std::io::{Cursor, Read, Write};

use thiserror::Error;

/// Well-known path of the main document part inside the archive.
pub const MAIN_DOCUMENT_PATH: &str = "word/document.xml";

const CONTENT_TYPES_PATH: &str = "[Content_Types].xml";
const RELATIONSHIPS_PATH: &str = "_rels/.rels";

const MIN_ARCHIVE_BYTES: usize = 1000;
const MAX_ARCHIVE_BYTES: usize = 100 * 1024 * 1024;

/// Errors surfaced while opening, reading, or re-packing an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("input is smaller than the minimum valid archive size ({MIN_ARCHIVE_BYTES} bytes)")]
    TooSmall,
    #[error("input exceeds the maximum archive size ({MAX_ARCHIVE_BYTES} bytes)")]
    TooLarge,
    #[error("input is not a recognized ZIP container: {0}")]
    InvalidContainer(String),
    #[error("archive is missing required part: {0}")]
    MissingPart(&'static str),
    #[error("part '{path}' could not be read: {reason}")]
    CorruptedPart { path: String, reason: String },
}

/// An ordered mapping from part path to raw bytes, preserving the order
/// parts were read in so re-packing does not reshuffle unrelated parts.
#[derive(Debug, Clone, Default)]
struct PartTable {
    order: Vec<String>,
    parts: std::collections::HashMap<String, Vec<u8>>,
}

impl PartTable {
    fn insert(&mut self, path: String, bytes: Vec<u8>) {
        if !self.parts.contains_key(&path) {
            self.order.push(path.clone());
        }
        self.parts.insert(path, bytes);
    }

    fn get(&self, path: &str) -> Option<&[u8]> {
        self.parts.get(path).map(Vec::as_slice)
    }

    fn contains(&self, path: &str) -> bool {
        self.parts.contains_key(path)
    }
}

/// An opened Word document archive.
#[derive(Debug, Clone)]
pub struct Archive {
    parts: PartTable,
}

impl Archive {
    /// Open and validate a Word-format archive from raw bytes.
    pub fn open(bytes: &[u8]) -> Result<Self, ArchiveError> {
        if bytes.len() < MIN_ARCHIVE_BYTES {
            return Err(ArchiveError::TooSmall);
        }
        if bytes.len() > MAX_ARCHIVE_BYTES {
            return Err(ArchiveError::TooLarge);
        }

        let reader = Cursor::new(bytes);
        let mut zip = zip::ZipArchive::new(reader)
            .map_err(|e| ArchiveError::InvalidContainer(e.to_string()))?;

        let mut parts = PartTable::default();
        for i in 0..zip.len() {
            let mut entry = zip
                .by_index(i)
                .map_err(|e| ArchiveError::InvalidContainer(e.to_string()))?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            let mut buf = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut buf)
                .map_err(|e| ArchiveError::CorruptedPart {
                    path: name.clone(),
                    reason: e.to_string(),
                })?;
            parts.insert(name, buf);
        }

        for required in [CONTENT_TYPES_PATH, RELATIONSHIPS_PATH, MAIN_DOCUMENT_PATH] {
            if !parts.contains(required) {
                return Err(ArchiveError::MissingPart(required));
            }
        }

        Ok(Self { parts })
    }

    /// Read the main document part's XML as a UTF-8 string.
    pub fn read_main(&self) -> Result<String, ArchiveError> {
        let bytes = self
            .parts
            .get(MAIN_DOCUMENT_PATH)
            .ok_or(ArchiveError::MissingPart(MAIN_DOCUMENT_PATH))?;
        String::from_utf8(bytes.to_vec()).map_err(|e| ArchiveError::CorruptedPart {
            path: MAIN_DOCUMENT_PATH.to_string(),
            reason: e.to_string(),
        })
    }

    /// Replace the main document part's XML.
    pub fn write_main(&mut self, xml: String) {
        self.parts.insert(MAIN_DOCUMENT_PATH.to_string(), xml.into_bytes());
    }

    /// Re-pack the archive into bytes, preserving part order.
    pub fn pack(&self) -> Result<Vec<u8>, ArchiveError> {
        let mut buf = Vec::new();
        {
            let cursor = Cursor::new(&mut buf);
            let mut writer = zip::ZipWriter::new(cursor);
            let options: zip::write::FileOptions<'_, ()> = zip::write::FileOptions::default()
                .compression_method(zip::CompressionMethod::Deflated);

            for path in &self.parts.order {
                let bytes = self.parts.get(path).expect("part listed in order exists");
                writer
                    .start_file(path, options)
                    .map_err(|e| ArchiveError::InvalidContainer(e.to_string()))?;
                writer
                    .write_all(bytes)
                    .map_err(|e| ArchiveError::InvalidContainer(e.to_string()))?;
            }

            writer
                .finish()
                .map_err(|e| ArchiveError::InvalidContainer(e.to_string()))?;
        }
        Ok(buf)
    }

    /// Iterate over all part paths other than the main document part.
    pub fn passthrough_paths(&self) -> impl Iterator<Item = &str> {
        self.parts
            .order
            .iter()
            .map(String::as_str)
            .filter(|p| *p != MAIN_DOCUMENT_PATH)
    }
}
