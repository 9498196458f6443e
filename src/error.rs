//! Error types for container access and chapter loading.

extern crate alloc;

use alloc::string::String;
use core::fmt;

/// Processing phase where an error originated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorPhase {
    /// Opening the book file or archive.
    Open,
    /// Reading container structure (container.xml, OPF, archive directory).
    Container,
    /// Reading or decoding a chapter.
    Chapter,
    /// Reading or decoding a page image.
    Image,
}

impl fmt::Display for ErrorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Open => "open",
            Self::Container => "container",
            Self::Chapter => "chapter",
            Self::Image => "image",
        };
        f.write_str(name)
    }
}

/// Errors surfaced by book containers.
///
/// Content problems inside a chapter (bad markup, undecodable text) are not
/// represented here; the converter recovers from those locally.
#[derive(Debug)]
pub enum FolioError {
    /// Filesystem failure.
    Io {
        phase: ErrorPhase,
        source: std::io::Error,
    },
    /// Zip directory or entry failure.
    Zip {
        phase: ErrorPhase,
        source: zip::result::ZipError,
    },
    /// Container XML (container.xml / OPF) failed to parse.
    Xml {
        phase: ErrorPhase,
        message: String,
    },
    /// Structurally invalid EPUB.
    InvalidEpub(String),
    /// A referenced archive entry does not exist.
    MissingEntry(String),
    /// Chapter index outside `[0, chapter_count)`.
    ChapterOutOfRange { index: usize, count: usize },
    /// Page index outside `[0, page_count)`.
    PageOutOfRange { index: usize, count: usize },
    /// Image bytes could not be decoded.
    Decode { phase: ErrorPhase, message: String },
}

impl FolioError {
    /// Phase that produced this error, when known.
    pub fn phase(&self) -> Option<ErrorPhase> {
        match self {
            Self::Io { phase, .. }
            | Self::Zip { phase, .. }
            | Self::Xml { phase, .. }
            | Self::Decode { phase, .. } => Some(*phase),
            Self::InvalidEpub(_) | Self::MissingEntry(_) => Some(ErrorPhase::Container),
            Self::ChapterOutOfRange { .. } => Some(ErrorPhase::Chapter),
            Self::PageOutOfRange { .. } => Some(ErrorPhase::Image),
        }
    }

    pub(crate) fn io(phase: ErrorPhase, source: std::io::Error) -> Self {
        Self::Io { phase, source }
    }

    pub(crate) fn zip(phase: ErrorPhase, source: zip::result::ZipError) -> Self {
        match source {
            zip::result::ZipError::FileNotFound => Self::MissingEntry(String::from("<unknown>")),
            source => Self::Zip { phase, source },
        }
    }

    pub(crate) fn xml(phase: ErrorPhase, message: impl Into<String>) -> Self {
        Self::Xml {
            phase,
            message: message.into(),
        }
    }
}

impl fmt::Display for FolioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { phase, source } => write!(f, "{}: I/O error: {}", phase, source),
            Self::Zip { phase, source } => write!(f, "{}: ZIP error: {}", phase, source),
            Self::Xml { phase, message } => write!(f, "{}: XML error: {}", phase, message),
            Self::InvalidEpub(msg) => write!(f, "invalid EPUB: {}", msg),
            Self::MissingEntry(name) => write!(f, "missing archive entry: {}", name),
            Self::ChapterOutOfRange { index, count } => {
                write!(f, "chapter index {} out of range (count={})", index, count)
            }
            Self::PageOutOfRange { index, count } => {
                write!(f, "page index {} out of range (count={})", index, count)
            }
            Self::Decode { phase, message } => write!(f, "{}: decode error: {}", phase, message),
        }
    }
}

impl std::error::Error for FolioError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Zip { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<std::io::Error> for FolioError {
    fn from(source: std::io::Error) -> Self {
        Self::io(ErrorPhase::Open, source)
    }
}

impl From<zip::result::ZipError> for FolioError {
    fn from(source: zip::result::ZipError) -> Self {
        Self::zip(ErrorPhase::Container, source)
    }
}
