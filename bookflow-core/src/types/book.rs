//! The BookInfo record - the unit of work moved from readers to writers

use super::date::normalize_date;
use super::{AuthorInfo, SeriesInfo};
use crate::error::ParseError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Normalized metadata for one book, independent of where it came from
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BookInfo {
    /// Origin tag: "local", "calibre", "csv", "json" or an API name
    pub source: String,

    pub base_path: String,

    /// Directory of the item relative to `base_path`
    pub path: String,

    /// Source-local identifier, e.g. the file stem
    pub id: String,

    pub uuid: String,

    pub uri: String,

    pub title: String,

    pub language: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub subjects: BTreeSet<String>,

    /// Cover location relative to the item
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,

    pub isbn: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rights: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,

    /// Scheme → value, e.g. `isbn` → `9780261103344`
    pub identifiers: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub modification_date: Option<String>,

    /// Explicit override; see [`BookInfo::timestamp`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    pub authors: Vec<AuthorInfo>,

    pub series: Vec<SeriesInfo>,
}

impl BookInfo {
    /// Create an empty record for a source item
    pub fn new(source: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_path(mut self, base_path: impl Into<String>, path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self.path = path.into();
        self
    }

    /// Add an author, replacing any existing entry with the same id
    pub fn add_author(&mut self, author: AuthorInfo) {
        match self.authors.iter_mut().find(|a| a.id == author.id) {
            Some(existing) => *existing = author,
            None => self.authors.push(author),
        }
    }

    /// Add a series, replacing any existing entry with the same id
    pub fn add_series(&mut self, series: SeriesInfo) {
        match self.series.iter_mut().find(|s| s.id == series.id) {
            Some(existing) => *existing = series,
            None => self.series.push(series),
        }
    }

    pub fn add_identifier(&mut self, scheme: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        if !value.is_empty() {
            self.identifiers.insert(scheme.into().to_lowercase(), value);
        }
    }

    pub fn author(&self, id: &str) -> Option<&AuthorInfo> {
        self.authors.iter().find(|a| a.id == id)
    }

    pub fn first_author(&self) -> Option<&AuthorInfo> {
        self.authors.first()
    }

    pub fn primary_series(&self) -> Option<&SeriesInfo> {
        self.series.first()
    }

    /// Set the creation date, normalizing it
    pub fn set_creation_date(&mut self, value: &str) {
        self.creation_date = normalize_date(value);
    }

    /// Set the modification date, normalizing it
    pub fn set_modification_date(&mut self, value: &str) {
        self.modification_date = normalize_date(value);
    }

    /// Timestamp used for "latest" ordering: the override, else the creation date
    pub fn timestamp(&self) -> Option<&str> {
        self.timestamp.as_deref().or(self.creation_date.as_deref())
    }

    /// Key identifying the item within its source: `path/id`, or `id` alone
    pub fn item_key(&self) -> String {
        let path = self.path.trim_matches('/');
        if path.is_empty() {
            self.id.clone()
        } else {
            format!("{}/{}", path, self.id)
        }
    }

    /// Most recent first; records without a timestamp sort last
    pub fn cmp_latest(&self, other: &Self) -> Ordering {
        match (self.timestamp(), other.timestamp()) {
            (Some(a), Some(b)) => b.cmp(a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }

    /// Check the record invariants before it is handed to a writer
    pub fn validate(&self) -> Result<(), ParseError> {
        if self.id.trim().is_empty() {
            return Err(ParseError::MissingField("id".to_string()));
        }
        Ok(())
    }

    /// Dates in canonical form, dropping values that cannot be parsed
    pub fn normalize_dates(&mut self) {
        for date in [
            &mut self.creation_date,
            &mut self.modification_date,
            &mut self.timestamp,
        ] {
            *date = date.as_deref().and_then(normalize_date);
        }
    }
}
