use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Minimal EPUB writer for integration tests.
#[derive(Default)]
pub struct EpubFixture {
    title: Option<String>,
    creator: Option<String>,
    chapters: Vec<(String, String)>,
    nav: Option<String>,
    spine: bool,
    container: bool,
}

impl EpubFixture {
    pub fn new() -> Self {
        Self {
            spine: true,
            container: true,
            ..Self::default()
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn creator(mut self, creator: &str) -> Self {
        self.creator = Some(creator.to_string());
        self
    }

    /// Add a chapter at `OEBPS/<name>`.
    pub fn chapter(mut self, name: &str, body: &str) -> Self {
        self.chapters.push((name.to_string(), xhtml(body)));
        self
    }

    /// Add a chapter whose bytes are written verbatim.
    pub fn raw_chapter(mut self, name: &str, markup: &str) -> Self {
        self.chapters.push((name.to_string(), markup.to_string()));
        self
    }

    /// Navigation document listed in the manifest, not the spine.
    pub fn nav(mut self, body: &str) -> Self {
        self.nav = Some(xhtml(body));
        self
    }

    /// Leave the spine empty so readers fall back to the manifest.
    pub fn without_spine(mut self) -> Self {
        self.spine = false;
        self
    }

    pub fn without_container(mut self) -> Self {
        self.container = false;
        self
    }

    pub fn write(&self, dir: &Path, file_name: &str) -> PathBuf {
        let path = dir.join(file_name);
        let mut zip = ZipWriter::new(File::create(&path).unwrap());
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        zip.start_file("mimetype", stored).unwrap();
        zip.write_all(b"application/epub+zip").unwrap();
        if self.container {
            zip.start_file("META-INF/container.xml", deflated).unwrap();
            zip.write_all(CONTAINER.as_bytes()).unwrap();
        }
        zip.start_file("OEBPS/content.opf", deflated).unwrap();
        zip.write_all(self.opf().as_bytes()).unwrap();
        for (name, markup) in &self.chapters {
            zip.start_file(format!("OEBPS/{name}"), deflated).unwrap();
            zip.write_all(markup.as_bytes()).unwrap();
        }
        if let Some(nav) = &self.nav {
            zip.start_file("OEBPS/nav.xhtml", deflated).unwrap();
            zip.write_all(nav.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
        path
    }

    fn opf(&self) -> String {
        let mut metadata = String::new();
        if let Some(title) = &self.title {
            metadata.push_str(&format!("<dc:title>{title}</dc:title>"));
        }
        if let Some(creator) = &self.creator {
            metadata.push_str(&format!("<dc:creator>{creator}</dc:creator>"));
        }
        metadata.push_str("<dc:language>en</dc:language>");

        let mut manifest = String::new();
        let mut spine = String::new();
        for (idx, (name, _)) in self.chapters.iter().enumerate() {
            manifest.push_str(&format!(
                r#"<item id="c{idx}" href="{name}" media-type="application/xhtml+xml"/>"#
            ));
            if self.spine {
                spine.push_str(&format!(r#"<itemref idref="c{idx}"/>"#));
            }
        }
        if self.nav.is_some() {
            manifest.push_str(
                r#"<item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>"#,
            );
        }
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">{metadata}</metadata>
  <manifest>{manifest}</manifest>
  <spine>{spine}</spine>
</package>"#
        )
    }
}

const CONTAINER: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

pub fn xhtml(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head><title>t</title><style>p {{ margin: 0 }}</style></head>
<body>{body}</body>
</html>"#
    )
}

/// Write a zip with the given entries, in the given order.
pub fn write_zip(dir: &Path, file_name: &str, entries: &[(&str, &[u8])]) -> PathBuf {
    let path = dir.join(file_name);
    let mut zip = ZipWriter::new(File::create(&path).unwrap());
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, bytes) in entries {
        zip.start_file(*name, stored).unwrap();
        zip.write_all(bytes).unwrap();
    }
    zip.finish().unwrap();
    path
}
