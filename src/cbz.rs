//! CBZ (zip of page images) access.
//!
//! The archive is listed once at open time; page reads reopen the file so a
//! [`CbzArchive`] can be shared with background decode workers.

extern crate alloc;

use alloc::string::String;
use alloc::vec::Vec;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use zip::ZipArchive;

use crate::book::read_entry;
use crate::error::{ErrorPhase, FolioError};

/// Entry extensions treated as pages (compared case-insensitively).
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp"];

/// Whether an archive entry name looks like a page image.
pub fn is_image_name(name: &str) -> bool {
    if name.ends_with('/') {
        return false;
    }
    match name.rsplit_once('.') {
        Some((_, ext)) => IMAGE_EXTENSIONS
            .iter()
            .any(|known| ext.eq_ignore_ascii_case(known)),
        None => false,
    }
}

/// A comic archive: lexicographically sorted image entries.
#[derive(Clone, Debug)]
pub struct CbzArchive {
    path: PathBuf,
    entries: Vec<String>,
}

impl CbzArchive {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, FolioError> {
        let path = path.as_ref().to_path_buf();
        let mut archive = open_zip(&path, ErrorPhase::Open)?;
        let mut entries: Vec<String> = archive
            .file_names()
            .filter(|name| is_image_name(name))
            .map(String::from)
            .collect();
        entries.sort();
        if entries.is_empty() {
            log::warn!("CBZ {} has no image entries", path.display());
        }
        // Touch the first entry so truncated archives fail at open time.
        if let Some(first) = entries.first() {
            archive
                .by_name(first)
                .map_err(|err| FolioError::zip(ErrorPhase::Container, err))?;
        }
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File stem, used as the display title.
    pub fn title(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| String::from("Untitled"))
    }

    /// Page entry names in reading order.
    pub fn entry_names(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read the encoded bytes of page `index`.
    pub fn read_page(&self, index: usize) -> Result<Vec<u8>, FolioError> {
        let name = self.entries.get(index).ok_or(FolioError::PageOutOfRange {
            index,
            count: self.entries.len(),
        })?;
        let mut archive = open_zip(&self.path, ErrorPhase::Image)?;
        read_entry(&mut archive, name, ErrorPhase::Image)
    }
}

fn open_zip(path: &Path, phase: ErrorPhase) -> Result<ZipArchive<BufReader<File>>, FolioError> {
    let file = File::open(path).map_err(|err| FolioError::io(phase, err))?;
    ZipArchive::new(BufReader::new(file)).map_err(|err| FolioError::zip(phase, err))
}
