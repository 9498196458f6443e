mod common;

use common::fixtures::write_zip;
use folio::{CbzArchive, ErrorPhase, FolioError};

#[test]
fn pages_are_image_entries_in_name_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_zip(
        dir.path(),
        "Issue 1.cbz",
        &[
            ("p10.png", b"ten".as_slice()),
            ("ComicInfo.xml", b"<ComicInfo/>".as_slice()),
            ("p02.JPG", b"two".as_slice()),
            ("p01.jpeg", b"one".as_slice()),
        ],
    );

    let cbz = CbzArchive::open(&path).unwrap();
    assert_eq!(cbz.title(), "Issue 1");
    assert_eq!(cbz.entry_names(), ["p01.jpeg", "p02.JPG", "p10.png"]);
    assert_eq!(cbz.read_page(0).unwrap(), b"one");
    assert_eq!(cbz.read_page(2).unwrap(), b"ten");
    assert!(matches!(
        cbz.read_page(3),
        Err(FolioError::PageOutOfRange { index: 3, count: 3 })
    ));
}

#[test]
fn archive_without_images_opens_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_zip(dir.path(), "text.cbz", &[("notes.txt", b"hi".as_slice())]);
    let cbz = CbzArchive::open(&path).unwrap();
    assert!(cbz.is_empty());
    assert_eq!(cbz.len(), 0);
}

#[test]
fn corrupt_archive_fails_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.cbz");
    std::fs::write(&path, b"PK not really").unwrap();
    let err = CbzArchive::open(&path).err().unwrap();
    assert_eq!(err.phase(), Some(ErrorPhase::Open));
}
