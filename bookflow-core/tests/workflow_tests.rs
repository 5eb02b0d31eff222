//! Workflow tests for bookflow-core
//!
//! These tests run complete source → target pipelines against fixtures built
//! on the fly in temporary directories.
//!
//! ## Test Strategy
//!
//! 1. **Import tests**: EPUB trees and JSON files into a Calibre database,
//!    including per-item error isolation and the EPUB version gate
//! 2. **Re-import tests**: a mapping file pins ids so repeated runs update
//!    the same entries
//! 3. **Round-trip tests**: records written to CSV or JSON and read back keep
//!    their title, authors, series and identifiers
//! 4. **Cache tree tests**: Google Books and per-author cache files

use bookflow_core::calibre::CalibreDb;
use bookflow_core::reader::{CsvReader, JsonReader, LocalBooksReader};
use bookflow_core::writer::{CallbackWriter, CsvWriter, JsonWriter};
use bookflow_core::{
    AuthorInfo, BookInfo, Converter, SeriesInfo, SourceType, Workflow, WorkflowConfig, Writer,
};
use std::cell::RefCell;
use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;
use std::rc::Rc;
use tempfile::TempDir;

// =============================================================================
// Fixtures
// =============================================================================

const CONTAINER_XML: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

/// Minimal EPUB metadata for a fixture file
struct EpubFixture {
    version: &'static str,
    title: &'static str,
    author: &'static str,
    uuid: &'static str,
    series: Option<(&'static str, &'static str)>,
    modified: Option<&'static str>,
    identifier: Option<&'static str>,
}

impl EpubFixture {
    fn new(title: &'static str, author: &'static str, uuid: &'static str) -> Self {
        Self {
            version: "2.0",
            title,
            author,
            uuid,
            series: None,
            modified: None,
            identifier: None,
        }
    }

    fn version(mut self, version: &'static str) -> Self {
        self.version = version;
        self
    }

    fn series(mut self, name: &'static str, index: &'static str) -> Self {
        self.series = Some((name, index));
        self
    }

    fn modified(mut self, modified: &'static str) -> Self {
        self.modified = Some(modified);
        self
    }

    /// Replace the `urn:uuid:` package identifier with a raw value
    fn identifier(mut self, identifier: &'static str) -> Self {
        self.identifier = Some(identifier);
        self
    }

    fn is_version_3(&self) -> bool {
        self.version.starts_with('3')
    }

    /// Calibre series meta for EPUB 2, a series collection for EPUB 3
    fn series_metadata(&self) -> String {
        match self.series {
            Some((name, index)) if self.is_version_3() => format!(
                r##"<meta property="belongs-to-collection" id="series">{}</meta>
                    <meta refines="#series" property="collection-type">series</meta>
                    <meta refines="#series" property="group-position">{}</meta>"##,
                name, index
            ),
            Some((name, index)) => format!(
                r#"<meta name="calibre:series" content="{}"/>
                   <meta name="calibre:series_index" content="{}"/>"#,
                name, index
            ),
            None => String::new(),
        }
    }

    fn modified_metadata(&self) -> String {
        match self.modified {
            Some(modified) if self.is_version_3() => {
                format!(r#"<meta property="dcterms:modified">{}</meta>"#, modified)
            }
            Some(modified) => {
                format!(r#"<dc:date opf:event="modification">{}</dc:date>"#, modified)
            }
            None => String::new(),
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        let series = self.series_metadata();
        let modified = self.modified_metadata();
        let identifier = self
            .identifier
            .map(str::to_string)
            .unwrap_or_else(|| format!("urn:uuid:{}", self.uuid));
        let opf = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="{}" unique-identifier="bookid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
    <dc:title>{}</dc:title>
    <dc:creator opf:role="aut">{}</dc:creator>
    <dc:language>en</dc:language>
    <dc:identifier id="bookid">{}</dc:identifier>
    <dc:date opf:event="publication">1900-05-17</dc:date>
    {}
    {}
  </metadata>
  <manifest/>
  <spine/>
</package>"#,
            self.version, self.title, self.author, identifier, series, modified
        );

        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        writer.start_file("mimetype", options).unwrap();
        writer.write_all(b"application/epub+zip").unwrap();
        writer.start_file("META-INF/container.xml", options).unwrap();
        writer.write_all(CONTAINER_XML.as_bytes()).unwrap();
        writer.start_file("OEBPS/content.opf", options).unwrap();
        writer.write_all(opf.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    fn write_to(&self, root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, self.to_bytes()).unwrap();
    }
}

/// A small library: three valid books across two author folders
fn library() -> TempDir {
    let dir = TempDir::new().unwrap();
    EpubFixture::new("Alice's Adventures in Wonderland", "Lewis Carroll", "1b2c3d4e-0000-4000-8000-000000000001")
        .series("Alice", "1")
        .write_to(dir.path(), "Carroll/alice.epub");
    EpubFixture::new("Through the Looking-Glass", "Lewis Carroll", "1b2c3d4e-0000-4000-8000-000000000002")
        .series("Alice", "2")
        .write_to(dir.path(), "Carroll/looking-glass.epub");
    EpubFixture::new("The Wonderful Wizard of Oz", "L. Frank Baum", "1b2c3d4e-0000-4000-8000-000000000003")
        .write_to(dir.path(), "Baum/oz.epub");
    dir
}

fn sample_records() -> Vec<BookInfo> {
    let mut mort = BookInfo::new("local", "mort")
        .with_title("Mort")
        .with_path("/library", "Terry Pratchett");
    mort.add_author(AuthorInfo::new("Terry Pratchett"));
    mort.add_series(SeriesInfo::new("Discworld", 4.0));
    mort.add_identifier("isbn", "9780552131063");
    mort.language = "en".to_string();

    let mut omens = BookInfo::new("local", "good-omens")
        .with_title("Good Omens, the Nice and Accurate Prophecies")
        .with_path("/library", "Terry Pratchett");
    omens.add_author(AuthorInfo::new("Terry Pratchett"));
    omens.add_author(AuthorInfo::new("Neil Gaiman"));
    omens.add_identifier("google", "_ogXogEACAAJ");
    omens.set_creation_date("1990-05-01");

    vec![mort, omens]
}

/// Collect every record a workflow writes
fn capture() -> (CallbackWriter, Rc<RefCell<Vec<BookInfo>>>) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&seen);
    let writer = CallbackWriter::new(move |book: &BookInfo, id| {
        log.borrow_mut().push(book.clone());
        Ok(id)
    });
    (writer, seen)
}

fn assert_same_records(expected: &[BookInfo], actual: &[BookInfo]) {
    assert_eq!(expected.len(), actual.len(), "record count differs");
    for (want, got) in expected.iter().zip(actual) {
        assert_eq!(want.title, got.title);
        assert_eq!(want.authors, got.authors, "authors of {}", want.title);
        assert_eq!(want.series, got.series, "series of {}", want.title);
        assert_eq!(want.identifiers, got.identifiers, "identifiers of {}", want.title);
    }
}

// =============================================================================
// Import Tests
// =============================================================================

#[test]
fn test_local_import_isolates_corrupt_files() {
    let books = library();
    fs::write(books.path().join("Baum/broken.epub"), b"this is not a zip archive").unwrap();
    let target = TempDir::new().unwrap();
    let db_path = target.path().join("metadata.db");

    let mut workflow =
        Workflow::import(SourceType::LocalBooks, books.path(), &db_path, true, None).unwrap();
    let report = workflow.process(books.path(), "").unwrap();

    assert_eq!(report.ok_count(), 3);
    assert_eq!(report.error_count(), 1);
    assert!(report.errors.contains_key("Baum/broken.epub"));
    assert!(report.messages[0].starts_with("Local "));
    assert!(report.messages[0].ends_with("3 files OK - 1 files Error"));

    let db = CalibreDb::open(&db_path, false).unwrap();
    assert_eq!(db.book_count().unwrap(), 3);
    let names: Vec<String> = db.authors().unwrap().into_iter().map(|a| a.name).collect();
    assert_eq!(names, vec!["L. Frank Baum", "Lewis Carroll"]);
}

#[test]
fn test_version_gate_rejects_unsupported_epub() {
    let books = library();
    EpubFixture::new("Ancient", "Nobody", "1b2c3d4e-0000-4000-8000-000000000009")
        .version("1.0")
        .write_to(books.path(), "Old/ancient.epub");
    let target = TempDir::new().unwrap();

    let mut workflow = Workflow::import(
        SourceType::LocalBooks,
        books.path(),
        &target.path().join("metadata.db"),
        true,
        None,
    )
    .unwrap();
    let report = workflow.process(books.path(), "").unwrap();

    assert_eq!(report.ok_count(), 3);
    assert!(report.errors["Old/ancient.epub"].contains("Incorrect version: 1.0"));
}

#[test]
fn test_imported_metadata_lands_in_calibre() {
    let books = library();
    let target = TempDir::new().unwrap();
    let db_path = target.path().join("metadata.db");

    Workflow::import(SourceType::LocalBooks, books.path(), &db_path, true, None)
        .unwrap()
        .process(books.path(), "Carroll")
        .unwrap();

    let db = CalibreDb::open(&db_path, false).unwrap();
    let ids = db.book_ids().unwrap();
    assert_eq!(ids.len(), 2);

    let alice = db.load_book(ids[0]).unwrap().unwrap();
    assert_eq!(alice.title, "Alice's Adventures in Wonderland");
    assert_eq!(alice.item_key(), "Carroll/alice");
    assert_eq!(alice.uuid, "1b2c3d4e-0000-4000-8000-000000000001");
    assert_eq!(alice.creation_date.as_deref(), Some("1900-05-17 00:00:00"));
    let series = alice.primary_series().unwrap();
    assert_eq!((series.name.as_str(), series.index), ("Alice", 1.0));
    assert_eq!(alice.first_author().unwrap().sort, "Carroll, Lewis");
}

#[test]
fn test_epub3_collection_and_dates_reach_the_target() {
    let books = TempDir::new().unwrap();
    EpubFixture::new("The Colour of Magic", "Terry Pratchett", "1b2c3d4e-0000-4000-8000-000000000031")
        .version("3.0")
        .series("Discworld", "1")
        .modified("2021-01-02T03:04:05Z")
        .write_to(books.path(), "Pratchett/colour-of-magic.epub");
    EpubFixture::new("Mort", "Terry Pratchett", "1b2c3d4e-0000-4000-8000-000000000032")
        .series("Discworld", "4")
        .modified("2019-06-07T08:09:10Z")
        .write_to(books.path(), "Pratchett/mort.epub");

    let (capture, seen) = capture();
    let mut workflow = Workflow::new(Box::new(LocalBooksReader::new()), Box::new(capture), None);
    let report = workflow.process(books.path(), "").unwrap();
    assert!(report.messages[0].ends_with("2 files OK - 0 files Error"));

    let seen = seen.borrow();
    let colour = &seen[0];
    assert_eq!(colour.title, "The Colour of Magic");
    let series = colour.primary_series().unwrap();
    assert_eq!((series.name.as_str(), series.index), ("Discworld", 1.0));
    assert_eq!(colour.creation_date.as_deref(), Some("1900-05-17 00:00:00"));
    assert_eq!(colour.modification_date.as_deref(), Some("2021-01-02 03:04:05"));
    assert_eq!(colour.uuid, "1b2c3d4e-0000-4000-8000-000000000031");

    let mort = &seen[1];
    assert_eq!(mort.primary_series().unwrap().index, 4.0);
    assert_eq!(mort.modification_date.as_deref(), Some("2019-06-07 08:09:10"));
}

#[test]
fn test_non_ascii_identifier_does_not_stop_the_import() {
    let books = library();
    EpubFixture::new("Le Petit Prince", "Antoine de Saint-Exupéry", "")
        .identifier("ééééé-livre")
        .write_to(books.path(), "Saint-Exupery/petit-prince.epub");

    let (capture, seen) = capture();
    let mut workflow = Workflow::new(Box::new(LocalBooksReader::new()), Box::new(capture), None);
    let report = workflow.process(books.path(), "").unwrap();

    assert!(report.errors.is_empty(), "{:?}", report.errors);
    assert!(report.messages[0].ends_with("4 files OK - 0 files Error"));
    let prince = seen
        .borrow()
        .iter()
        .find(|book| book.id == "petit-prince")
        .cloned()
        .unwrap();
    assert_eq!(prince.uuid, "ééééé-livre");
    assert_eq!(prince.title, "Le Petit Prince");
}

// =============================================================================
// Re-import Tests
// =============================================================================

#[test]
fn test_mapped_reimport_is_idempotent() {
    let books = library();
    let target = TempDir::new().unwrap();
    let db_path = target.path().join("metadata.db");
    let mapping = target.path().join("ids.txt");
    fs::write(
        &mapping,
        "# path,id\nCarroll/alice.epub,10\nCarroll/looking-glass,11\nBaum/oz.epub=12\n",
    )
    .unwrap();

    for _ in 0..2 {
        let mut workflow =
            Workflow::import(SourceType::LocalBooks, books.path(), &db_path, true, Some(&mapping))
                .unwrap();
        let report = workflow.process(books.path(), "").unwrap();
        assert_eq!(report.books["Carroll/alice.epub"], 10);
        assert_eq!(report.books["Carroll/looking-glass.epub"], 11);
        assert_eq!(report.books["Baum/oz.epub"], 12);
    }

    let db = CalibreDb::open(&db_path, false).unwrap();
    assert_eq!(db.book_ids().unwrap(), vec![10, 11, 12]);
    assert_eq!(db.authors().unwrap().len(), 2);
}

#[test]
fn test_mapping_lookups_are_stable() {
    let dir = TempDir::new().unwrap();
    let mapping = dir.path().join("ids.json");
    fs::write(&mapping, r#"{"Carroll/alice.epub": 10, "Baum/oz": 12}"#).unwrap();

    let converter = Converter::load(&mapping).unwrap();
    for _ in 0..3 {
        assert_eq!(converter.book_id("Carroll/alice.epub"), 10);
        assert_eq!(converter.book_id("Baum/oz.epub"), 12);
        assert_eq!(converter.book_id("Baum/unknown.epub"), 0);
    }
}

// =============================================================================
// Round-trip Tests
// =============================================================================

#[test]
fn test_csv_round_trip() {
    let dir = TempDir::new().unwrap();
    let csv_path = dir.path().join("books.csv");
    let records = sample_records();

    let mut writer = CsvWriter::open(&csv_path, true).unwrap();
    for book in &records {
        writer.add_book(book, 0).unwrap();
    }
    writer.finish().unwrap();

    let (capture, seen) = capture();
    let mut reimport = Workflow::new(Box::new(CsvReader::new()), Box::new(capture), None);
    let report = reimport.process(dir.path(), "books.csv").unwrap();

    assert_eq!(report.messages[0], "CSV books.csv - 2 files OK - 0 files Error");
    assert_same_records(&records, &seen.borrow());
    assert_eq!(seen.borrow()[1].creation_date.as_deref(), Some("1990-05-01 00:00:00"));
}

#[test]
fn test_json_round_trip_both_layouts() {
    let records = sample_records();

    for (target, files) in [("books.json", 1), ("cache", 2)] {
        let dir = TempDir::new().unwrap();
        let target_path = dir.path().join(target);

        let mut writer = JsonWriter::open(&target_path, true).unwrap();
        for book in &records {
            writer.add_book(book, 0).unwrap();
        }
        writer.finish().unwrap();

        let (capture, seen) = capture();
        let mut reimport = Workflow::new(Box::new(JsonReader::new()), Box::new(capture), None);
        let report = reimport.process(dir.path(), target).unwrap();

        assert_eq!(report.ok_count(), files, "layout {}", target);
        assert_eq!(report.books.len(), 2, "layout {}", target);
        assert_same_records(&records, &seen.borrow());
    }
}

#[test]
fn test_calibre_export_to_csv() {
    let books = library();
    let target = TempDir::new().unwrap();
    let db_path = target.path().join("metadata.db");
    Workflow::import(SourceType::LocalBooks, books.path(), &db_path, true, None)
        .unwrap()
        .process(books.path(), "")
        .unwrap();

    let csv_path = target.path().join("export/books.csv");
    let mut export = Workflow::export(&db_path, SourceType::CsvFiles, &csv_path, true).unwrap();
    let report = export.process(target.path(), "").unwrap();
    assert_eq!(report.ok_count(), 3);

    let content = fs::read_to_string(&csv_path).unwrap();
    assert_eq!(content.lines().count(), 4);
    assert!(content.contains("Through the Looking-Glass"));
}

// =============================================================================
// Cache Tree Tests
// =============================================================================

#[test]
fn test_google_volume_import() {
    let dir = TempDir::new().unwrap();
    let volumes = dir.path().join("volumes");
    fs::create_dir_all(&volumes).unwrap();
    fs::write(
        volumes.join("_ogXogEACAAJ.en.json"),
        r#"{
            "kind": "books#volume",
            "id": "_ogXogEACAAJ",
            "volumeInfo": {
                "title": "Good Omens",
                "authors": ["Terry Pratchett", "Neil Gaiman"],
                "publishedDate": "2006-11-28",
                "industryIdentifiers": [{"type": "ISBN_13", "identifier": "9780060853983"}]
            }
        }"#,
    )
    .unwrap();

    let mut workflow = Workflow::from_config(&WorkflowConfig {
        source: SourceType::JsonFiles,
        source_path: None,
        target: SourceType::Calibre,
        target_path: dir.path().join("metadata.db"),
        create: true,
        mapping_file: None,
    })
    .unwrap();
    workflow.process(dir.path(), "volumes/_ogXogEACAAJ.en.json").unwrap();

    assert!(workflow.errors().is_empty());
    assert!(workflow.messages()[0].ends_with(" - 1 files OK - 0 files Error"));

    let db = CalibreDb::open(&dir.path().join("metadata.db"), false).unwrap();
    let book = db.load_book(1).unwrap().unwrap();
    assert_eq!(book.title, "Good Omens");
    assert_eq!(book.language, "en");
    assert_eq!(book.identifiers["google"], "_ogXogEACAAJ");
}

#[test]
fn test_author_cache_directory() {
    let dir = TempDir::new().unwrap();
    let authors = dir.path().join("authors");
    fs::create_dir_all(&authors).unwrap();
    for n in 0..40 {
        let page = serde_json::json!({
            "kind": "books#volumes",
            "totalItems": 2,
            "items": [
                {
                    "kind": "books#volume",
                    "id": format!("vol{:03}", n),
                    "volumeInfo": {"title": format!("Book {}", n), "authors": [format!("Author {}", n)]}
                },
                {
                    "kind": "books#volume",
                    "id": "anthology",
                    "volumeInfo": {"title": "Collected Stories", "authors": ["Various"]}
                }
            ]
        });
        fs::write(authors.join(format!("Author {}.en.40.json", n)), page.to_string()).unwrap();
    }
    let present = fs::read_dir(&authors).unwrap().count();

    let target = dir.path().join("out");
    let mut workflow = Workflow::new(
        Box::new(JsonReader::new()),
        Box::new(JsonWriter::open(&target, true).unwrap()),
        None,
    );
    let report = workflow.process(dir.path(), "authors").unwrap();

    assert!(report.errors.is_empty(), "{:?}", report.errors);
    assert_eq!(report.ok_count(), present);
    assert_eq!(report.ok_count(), 40);
    assert_eq!(report.messages[0], "JSON authors - 40 files OK - 0 files Error");
    assert_eq!(
        report.books["authors/Author 0.en.40.json#2"],
        report.books["authors/Author 39.en.40.json#2"]
    );
    assert_eq!(fs::read_dir(target.join("books")).unwrap().count(), 41);
}

#[test]
fn test_custom_pattern_reader() {
    let books = library();
    EpubFixture::new("Kobo Copy", "Lewis Carroll", "1b2c3d4e-0000-4000-8000-000000000004")
        .write_to(books.path(), "Carroll/alice.kepub.epub");

    let (capture, seen) = capture();
    let mut workflow = Workflow::new(
        Box::new(LocalBooksReader::with_pattern("*.kepub.epub")),
        Box::new(capture),
        None,
    );
    let report = workflow.process(books.path(), "").unwrap();

    assert_eq!(report.ok_count(), 1);
    assert_eq!(seen.borrow()[0].id, "alice.kepub");
}
