//! EPUB container access.
//!
//! Resolves `META-INF/container.xml` to the OPF package, reads Dublin Core
//! metadata, and exposes the spine as an ordered chapter sequence.

extern crate alloc;

use alloc::string::String;
use alloc::vec::Vec;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use zip::ZipArchive;

use crate::error::{ErrorPhase, FolioError};

const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Ordered chapter content indexable by chapter index.
pub trait ChapterSource {
    /// Number of chapters.
    fn chapter_count(&self) -> usize;

    /// Raw markup bytes of chapter `index`.
    fn read_chapter(&mut self, index: usize) -> Result<Vec<u8>, FolioError>;
}

/// Dublin Core fields shown by the reader.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Metadata {
    pub title: Option<String>,
    pub creator: Option<String>,
    pub language: Option<String>,
}

/// One manifest entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestItem {
    pub id: String,
    /// Archive path, resolved against the OPF directory.
    pub path: String,
    pub media_type: String,
    pub properties: Option<String>,
}

impl ManifestItem {
    fn is_html(&self) -> bool {
        matches!(
            self.media_type.as_str(),
            "application/xhtml+xml" | "text/html" | "application/xml+xhtml"
        )
    }

    fn is_nav(&self) -> bool {
        self.properties
            .as_deref()
            .is_some_and(|props| props.split_ascii_whitespace().any(|p| p == "nav"))
    }
}

/// Parsed OPF package.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Package {
    pub metadata: Metadata,
    /// Manifest in document order.
    pub manifest: Vec<ManifestItem>,
    pub spine_ids: Vec<String>,
}

impl Package {
    fn item(&self, id: &str) -> Option<&ManifestItem> {
        self.manifest.iter().find(|item| item.id == id)
    }

    /// Chapter paths in spine order, or every HTML manifest item when the
    /// spine yields nothing.
    pub fn chapter_paths(&self) -> Vec<String> {
        let spine: Vec<String> = self
            .spine_ids
            .iter()
            .filter_map(|id| self.item(id))
            .filter(|item| item.is_html())
            .map(|item| item.path.clone())
            .collect();
        if !spine.is_empty() {
            return spine;
        }
        self.manifest
            .iter()
            .filter(|item| item.is_html())
            .map(|item| item.path.clone())
            .collect()
    }

    /// Archive path of the EPUB 3 navigation document.
    pub fn nav_path(&self) -> Option<&str> {
        self.manifest
            .iter()
            .find(|item| item.is_nav())
            .map(|item| item.path.as_str())
    }
}

/// An opened EPUB file.
pub struct EpubBook<R: Read + Seek = BufReader<File>> {
    archive: ZipArchive<R>,
    package: Package,
    chapters: Vec<String>,
    fallback_title: Option<String>,
}

impl EpubBook<BufReader<File>> {
    /// Open an EPUB from disk. The file stem is kept as a title fallback.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, FolioError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|err| FolioError::io(ErrorPhase::Open, err))?;
        let mut book = Self::from_reader(BufReader::new(file))?;
        book.fallback_title = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned());
        Ok(book)
    }
}

impl<R: Read + Seek> EpubBook<R> {
    /// Open an EPUB from any seekable reader.
    pub fn from_reader(reader: R) -> Result<Self, FolioError> {
        let mut archive =
            ZipArchive::new(reader).map_err(|err| FolioError::zip(ErrorPhase::Open, err))?;

        let container = read_entry(&mut archive, CONTAINER_PATH, ErrorPhase::Container)?;
        let opf_path = parse_container_xml(&container)?;
        let opf = read_entry(&mut archive, &opf_path, ErrorPhase::Container)?;
        let package = parse_opf(&opf, opf_base(&opf_path))?;
        let chapters = package.chapter_paths();
        if chapters.is_empty() {
            log::warn!("EPUB package {} lists no HTML content", opf_path);
        }

        Ok(Self {
            archive,
            package,
            chapters,
            fallback_title: None,
        })
    }

    pub fn metadata(&self) -> &Metadata {
        &self.package.metadata
    }

    pub fn package(&self) -> &Package {
        &self.package
    }

    /// Metadata title, else the file stem, else `"Untitled"`.
    pub fn title(&self) -> String {
        self.package
            .metadata
            .title
            .clone()
            .filter(|title| !title.trim().is_empty())
            .or_else(|| self.fallback_title.clone())
            .unwrap_or_else(|| String::from("Untitled"))
    }

    /// Archive paths of all chapters in reading order.
    pub fn chapter_paths(&self) -> &[String] {
        &self.chapters
    }

    /// Read any archive entry by path.
    pub fn read_entry(&mut self, path: &str) -> Result<Vec<u8>, FolioError> {
        read_entry(&mut self.archive, path, ErrorPhase::Chapter)
    }
}

impl<R: Read + Seek> ChapterSource for EpubBook<R> {
    fn chapter_count(&self) -> usize {
        self.chapters.len()
    }

    fn read_chapter(&mut self, index: usize) -> Result<Vec<u8>, FolioError> {
        let count = self.chapters.len();
        let path = self
            .chapters
            .get(index)
            .cloned()
            .ok_or(FolioError::ChapterOutOfRange { index, count })?;
        read_entry(&mut self.archive, &path, ErrorPhase::Chapter)
    }
}

pub(crate) fn read_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: &str,
    phase: ErrorPhase,
) -> Result<Vec<u8>, FolioError> {
    let mut entry = archive.by_name(path).map_err(|err| match err {
        zip::result::ZipError::FileNotFound => FolioError::MissingEntry(String::from(path)),
        err => FolioError::zip(phase, err),
    })?;
    let mut out = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
    entry
        .read_to_end(&mut out)
        .map_err(|err| FolioError::io(phase, err))?;
    Ok(out)
}

fn strip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data)
}

fn opf_base(opf_path: &str) -> &str {
    match opf_path.rfind('/') {
        Some(idx) => &opf_path[..=idx],
        None => "",
    }
}

/// Join `href` onto `base`, dropping any fragment and resolving `.`/`..`.
fn resolve_href(base: &str, href: &str) -> String {
    let href = href.split('#').next().unwrap_or(href);
    let href = href.replace("%20", " ");
    let joined = if href.starts_with('/') {
        String::from(href.trim_start_matches('/'))
    } else {
        alloc::format!("{}{}", base, href)
    };
    let mut parts: Vec<&str> = Vec::new();
    for part in joined.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            part => parts.push(part),
        }
    }
    parts.join("/")
}

/// Parse `META-INF/container.xml` and return the OPF path.
pub fn parse_container_xml(bytes: &[u8]) -> Result<String, FolioError> {
    let content = String::from_utf8_lossy(strip_bom(bytes));
    let mut reader = Reader::from_str(&content);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e))
                if e.local_name().as_ref() == b"rootfile" =>
            {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"full-path" {
                        let value = reader
                            .decoder()
                            .decode(attr.value.as_ref())
                            .map_err(|err| FolioError::xml(ErrorPhase::Container, err.to_string()))?;
                        return Ok(value.into_owned());
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(FolioError::xml(ErrorPhase::Container, err.to_string())),
            _ => {}
        }
    }

    Err(FolioError::InvalidEpub(String::from(
        "no rootfile found in container.xml",
    )))
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum MetaField {
    Title,
    Creator,
    Language,
}

/// Parse an OPF package document; manifest hrefs are resolved against `base`.
pub fn parse_opf(bytes: &[u8], base: &str) -> Result<Package, FolioError> {
    let content = String::from_utf8_lossy(strip_bom(bytes));
    let mut reader = Reader::from_str(&content);
    reader.config_mut().trim_text(false);

    let mut package = Package::default();
    let mut in_metadata = false;
    let mut field: Option<MetaField> = None;
    let mut text = String::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|err| FolioError::xml(ErrorPhase::Container, err.to_string()))?;
        match event {
            Event::Start(e) => match e.local_name().as_ref() {
                b"metadata" => in_metadata = true,
                b"title" if in_metadata => field = Some(MetaField::Title),
                b"creator" if in_metadata => field = Some(MetaField::Creator),
                b"language" if in_metadata => field = Some(MetaField::Language),
                b"item" => push_manifest_item(&reader, &e, base, &mut package),
                b"itemref" => push_itemref(&reader, &e, &mut package),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"item" => push_manifest_item(&reader, &e, base, &mut package),
                b"itemref" => push_itemref(&reader, &e, &mut package),
                _ => {}
            },
            Event::Text(e) if field.is_some() => {
                if let Ok(decoded) = e.decode() {
                    text.push_str(&decoded);
                }
            }
            Event::GeneralRef(e) if field.is_some() => {
                if let Ok(name) = e.decode() {
                    let reference = alloc::format!("&{};", name);
                    if let Ok(resolved) = quick_xml::escape::unescape(&reference) {
                        text.push_str(&resolved);
                    }
                }
            }
            Event::End(e) => {
                if e.local_name().as_ref() == b"metadata" {
                    in_metadata = false;
                }
                if let Some(current) = field.take() {
                    let value = text.trim();
                    let meta = &mut package.metadata;
                    let slot = match current {
                        MetaField::Title => &mut meta.title,
                        MetaField::Creator => &mut meta.creator,
                        MetaField::Language => &mut meta.language,
                    };
                    if slot.is_none() && !value.is_empty() {
                        *slot = Some(String::from(value));
                    }
                    text.clear();
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(package)
}

fn push_manifest_item(
    reader: &Reader<&[u8]>,
    e: &quick_xml::events::BytesStart<'_>,
    base: &str,
    package: &mut Package,
) {
    let mut id = String::new();
    let mut href = String::new();
    let mut media_type = String::new();
    let mut properties = None;
    for attr in e.attributes().flatten() {
        let Ok(value) = reader.decoder().decode(attr.value.as_ref()) else {
            continue;
        };
        match attr.key.as_ref() {
            b"id" => id = value.into_owned(),
            b"href" => href = value.into_owned(),
            b"media-type" => media_type = value.into_owned(),
            b"properties" => properties = Some(value.into_owned()),
            _ => {}
        }
    }
    if id.is_empty() || href.is_empty() {
        return;
    }
    package.manifest.push(ManifestItem {
        id,
        path: resolve_href(base, &href),
        media_type,
        properties,
    });
}

fn push_itemref(
    reader: &Reader<&[u8]>,
    e: &quick_xml::events::BytesStart<'_>,
    package: &mut Package,
) {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == b"idref" {
            if let Ok(value) = reader.decoder().decode(attr.value.as_ref()) {
                package.spine_ids.push(value.into_owned());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_points_at_opf() {
        let xml = br#"<?xml version="1.0"?>
            <container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
              <rootfiles><rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/></rootfiles>
            </container>"#;
        assert_eq!(parse_container_xml(xml).unwrap(), "OEBPS/content.opf");
    }

    #[test]
    fn container_without_rootfile_is_invalid() {
        let err = parse_container_xml(b"<container/>").unwrap_err();
        assert!(matches!(err, FolioError::InvalidEpub(_)));
    }

    #[test]
    fn opf_reads_metadata_and_spine() {
        let opf = br#"<package xmlns="http://www.idpf.org/2007/opf" xmlns:dc="http://purl.org/dc/elements/1.1/">
            <metadata><dc:title>Moby &amp; Dick</dc:title><dc:creator>Herman Melville</dc:creator>
              <dc:language>en</dc:language></metadata>
            <manifest>
              <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
              <item id="c2" href="text/c2.xhtml" media-type="application/xhtml+xml"/>
              <item id="c1" href="text/c1.xhtml" media-type="application/xhtml+xml"/>
              <item id="css" href="style.css" media-type="text/css"/>
            </manifest>
            <spine><itemref idref="c1"/><itemref idref="css"/><itemref idref="c2"/></spine>
            </package>"#;
        let package = parse_opf(opf, "OEBPS/").unwrap();
        assert_eq!(package.metadata.title.as_deref(), Some("Moby & Dick"));
        assert_eq!(package.metadata.creator.as_deref(), Some("Herman Melville"));
        assert_eq!(package.metadata.language.as_deref(), Some("en"));
        assert_eq!(
            package.chapter_paths(),
            vec!["OEBPS/text/c1.xhtml", "OEBPS/text/c2.xhtml"]
        );
        assert_eq!(package.nav_path(), Some("OEBPS/nav.xhtml"));
    }

    #[test]
    fn empty_spine_falls_back_to_manifest_html() {
        let opf = br#"<package><manifest>
            <item id="a" href="a.html" media-type="text/html"/>
            <item id="img" href="i.png" media-type="image/png"/>
            <item id="b" href="b.xhtml" media-type="application/xhtml+xml"/>
            </manifest><spine/></package>"#;
        let package = parse_opf(opf, "").unwrap();
        assert_eq!(package.chapter_paths(), vec!["a.html", "b.xhtml"]);
    }

    #[test]
    fn hrefs_resolve_relative_segments() {
        assert_eq!(resolve_href("OPS/text/", "../img/a.png#x"), "OPS/img/a.png");
        assert_eq!(resolve_href("OPS/", "ch%201.xhtml"), "OPS/ch 1.xhtml");
        assert_eq!(resolve_href("", "./c.xhtml"), "c.xhtml");
    }
}
