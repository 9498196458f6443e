#![allow(dead_code)]

use std::fs::File;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const CONTAINER: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles><rootfile full-path="content.opf" media-type="application/oebps-package+xml"/></rootfiles>
</container>"#;

/// Write an EPUB whose chapters hold the given body markup.
pub fn write_epub(dir: &Path, file_name: &str, title: &str, chapters: &[String]) -> PathBuf {
    let mut manifest = String::new();
    let mut spine = String::new();
    for idx in 0..chapters.len() {
        manifest.push_str(&format!(
            r#"<item id="c{idx}" href="c{idx}.xhtml" media-type="application/xhtml+xml"/>"#
        ));
        spine.push_str(&format!(r#"<itemref idref="c{idx}"/>"#));
    }
    let opf = format!(
        r#"<package xmlns="http://www.idpf.org/2007/opf" version="3.0">
<metadata xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>{title}</dc:title></metadata>
<manifest>{manifest}</manifest><spine>{spine}</spine></package>"#
    );

    let path = dir.join(file_name);
    let mut zip = ZipWriter::new(File::create(&path).unwrap());
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file("META-INF/container.xml", options).unwrap();
    zip.write_all(CONTAINER.as_bytes()).unwrap();
    zip.start_file("content.opf", options).unwrap();
    zip.write_all(opf.as_bytes()).unwrap();
    for (idx, body) in chapters.iter().enumerate() {
        zip.start_file(format!("c{idx}.xhtml"), options).unwrap();
        zip.write_all(format!("<html><body>{body}</body></html>").as_bytes())
            .unwrap();
    }
    zip.finish().unwrap();
    path
}

/// `count` one-line paragraphs.
pub fn paragraphs(count: usize) -> String {
    (0..count).map(|i| format!("<p>Line {i}</p>")).collect()
}

/// PNG of a flat gray image.
pub fn png(width: u32, height: u32, value: u8) -> Vec<u8> {
    let img = GrayImage::from_pixel(width, height, Luma([value]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(img)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

/// Write a CBZ with the given entries.
pub fn write_cbz(dir: &Path, file_name: &str, entries: &[(&str, Vec<u8>)]) -> PathBuf {
    let path = dir.join(file_name);
    let mut zip = ZipWriter::new(File::create(&path).unwrap());
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, bytes) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(bytes).unwrap();
    }
    zip.finish().unwrap();
    path
}
