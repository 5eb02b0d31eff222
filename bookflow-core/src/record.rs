//! Canonical flat CSV row
//!
//! The column order is a compatibility surface: files written by one version
//! must stay readable by the next. Structured fields are stored as compact
//! JSON inside their cell so that a CSV round trip loses nothing.

use crate::error::ParseError;
use crate::types::{AuthorInfo, BookInfo, SeriesInfo};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Column names in file order
pub const CSV_HEADERS: &[&str] = &[
    "id",
    "key",
    "source",
    "title",
    "authors",
    "series",
    "language",
    "identifiers",
    "subjects",
    "publisher",
    "description",
    "isbn",
    "uuid",
    "uri",
    "rights",
    "cover",
    "creation_date",
    "modification_date",
    "timestamp",
    "path",
    "base_path",
];

/// One book as a CSV row
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CsvRecord {
    /// Target-side numeric id
    pub id: i64,
    /// Source-local id of the book
    pub key: String,
    pub source: String,
    pub title: String,
    pub authors: String,
    pub series: String,
    pub language: String,
    pub identifiers: String,
    pub subjects: String,
    pub publisher: String,
    pub description: String,
    pub isbn: String,
    pub uuid: String,
    pub uri: String,
    pub rights: String,
    pub cover: String,
    pub creation_date: String,
    pub modification_date: String,
    pub timestamp: String,
    pub path: String,
    pub base_path: String,
}

impl CsvRecord {
    pub fn from_book(book: &BookInfo, id: i64) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id,
            key: book.id.clone(),
            source: book.source.clone(),
            title: book.title.clone(),
            authors: json_cell(&book.authors, Vec::is_empty)?,
            series: json_cell(&book.series, Vec::is_empty)?,
            language: book.language.clone(),
            identifiers: json_cell(&book.identifiers, BTreeMap::is_empty)?,
            subjects: json_cell(&book.subjects, BTreeSet::is_empty)?,
            publisher: book.publisher.clone().unwrap_or_default(),
            description: book.description.clone().unwrap_or_default(),
            isbn: book.isbn.clone(),
            uuid: book.uuid.clone(),
            uri: book.uri.clone(),
            rights: book.rights.clone().unwrap_or_default(),
            cover: book.cover.clone().unwrap_or_default(),
            creation_date: book.creation_date.clone().unwrap_or_default(),
            modification_date: book.modification_date.clone().unwrap_or_default(),
            timestamp: book.timestamp.clone().unwrap_or_default(),
            path: book.path.clone(),
            base_path: book.base_path.clone(),
        })
    }

    /// Rebuild the record; identifiers are taken as written, not re-derived
    pub fn to_book(&self) -> Result<BookInfo, ParseError> {
        let mut book = BookInfo::new(self.source.clone(), self.key.clone())
            .with_title(self.title.clone())
            .with_path(self.base_path.clone(), self.path.clone());

        let authors: Vec<AuthorInfo> = parse_cell(&self.authors, "authors")?;
        for author in authors {
            book.add_author(author);
        }
        let series: Vec<SeriesInfo> = parse_cell(&self.series, "series")?;
        for series in series {
            book.add_series(series);
        }
        book.identifiers = parse_cell(&self.identifiers, "identifiers")?;
        book.subjects = parse_cell(&self.subjects, "subjects")?;

        book.language = self.language.clone();
        book.publisher = non_empty(&self.publisher);
        book.description = non_empty(&self.description);
        book.isbn = self.isbn.clone();
        book.uuid = self.uuid.clone();
        book.uri = self.uri.clone();
        book.rights = non_empty(&self.rights);
        book.cover = non_empty(&self.cover);
        book.creation_date = non_empty(&self.creation_date);
        book.modification_date = non_empty(&self.modification_date);
        book.timestamp = non_empty(&self.timestamp);
        book.normalize_dates();
        Ok(book)
    }
}

fn json_cell<T: Serialize>(value: &T, is_empty: fn(&T) -> bool) -> Result<String, serde_json::Error> {
    if is_empty(value) {
        Ok(String::new())
    } else {
        serde_json::to_string(value)
    }
}

fn parse_cell<T: Default + for<'de> Deserialize<'de>>(cell: &str, column: &str) -> Result<T, ParseError> {
    if cell.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(cell)
        .map_err(|e| ParseError::MalformedContent(format!("column {}: {}", column, e)))
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_columns_survive() {
        let mut book = BookInfo::new("local", "mort").with_title("Mort");
        book.add_author(AuthorInfo::new("Terry Pratchett"));
        book.add_series(SeriesInfo::new("Discworld", 4.0));
        book.add_identifier("isbn", "9780552131063");
        book.subjects.insert("Fantasy".to_string());

        let row = CsvRecord::from_book(&book, 9).unwrap();
        assert_eq!(row.id, 9);
        assert!(row.authors.contains("Terry Pratchett"));

        let back = row.to_book().unwrap();
        assert_eq!(back.authors, book.authors);
        assert_eq!(back.series, book.series);
        assert_eq!(back.identifiers, book.identifiers);
        assert_eq!(back.subjects, book.subjects);
    }

    #[test]
    fn test_bad_cell_is_malformed_content() {
        let row = CsvRecord {
            key: "x".to_string(),
            title: "X".to_string(),
            authors: "[not json".to_string(),
            ..Default::default()
        };
        let err = row.to_book().unwrap_err();
        assert!(err.to_string().contains("column authors"));
    }

    #[test]
    fn test_headers_match_fields() {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.serialize(CsvRecord::default()).unwrap();
        let data = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        insta::assert_snapshot!(
            data.lines().next().unwrap(),
            @"id,key,source,title,authors,series,language,identifiers,subjects,publisher,description,isbn,uuid,uri,rights,cover,creation_date,modification_date,timestamp,path,base_path"
        );
        assert_eq!(data.lines().next().unwrap(), CSV_HEADERS.join(","));
    }
}
