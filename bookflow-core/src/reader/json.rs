//! JSON file and cache tree reader
//!
//! A JSON source is either a single file or a directory tree of `*.json`
//! files following the cache naming convention
//! `<category>/<key>.<lang>.json` (and `<key>.<lang>.<pageSize>.json` for
//! paginated query caches). A file holds one of:
//!
//! - `null`: a cached miss, no records and no error
//! - a record object, or an array of record objects
//! - an object mapping numeric ids to records (the single-file export layout)
//! - a Google Books `books#volume` object or `books#volumes` result list

use super::{relative_path, source_name, source_root, BookSink, ItemLog, ProcessReport, Reader};
use crate::error::{ParseError, Result};
use crate::types::{AuthorInfo, BookInfo};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Language segment used when a record has none
pub const UNDETERMINED_LANGUAGE: &str = "und";

/// A path in the JSON cache tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePath {
    /// Directory part, e.g. `books` or `authors/query`; may be empty
    pub category: String,
    pub key: String,
    pub lang: String,
    pub page_size: Option<u32>,
}

impl CachePath {
    /// `lang` falls back to [`UNDETERMINED_LANGUAGE`] unless it is a
    /// non-empty tag of ASCII letters, digits and `-`
    pub fn new(category: impl Into<String>, key: impl Into<String>, lang: &str) -> Self {
        let lang = lang.trim();
        let lang = if !lang.is_empty() && lang.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            lang.to_string()
        } else {
            UNDETERMINED_LANGUAGE.to_string()
        };
        Self {
            category: category.into(),
            key: key.into(),
            lang,
            page_size: None,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Parse a relative path such as `books/42.en.json`.
    ///
    /// The key may itself contain dots; only the trailing segments are
    /// interpreted.
    pub fn parse(path: &str) -> Option<Self> {
        let path = path.replace('\\', "/");
        let (category, file) = match path.rsplit_once('/') {
            Some((dir, file)) => (dir.trim_matches('/').to_string(), file),
            None => (String::new(), path.as_str()),
        };
        let stem = file.strip_suffix(".json")?;
        let mut parts: Vec<&str> = stem.split('.').collect();

        let page_size = match parts.last() {
            Some(last) if parts.len() >= 3 && last.chars().all(|c| c.is_ascii_digit()) => {
                let size = last.parse().ok();
                parts.pop();
                size
            }
            _ => None,
        };
        if parts.len() < 2 {
            return None;
        }
        let lang = parts.pop()?.to_string();
        let key = parts.join(".");
        if key.is_empty() || lang.is_empty() {
            return None;
        }

        Some(Self {
            category,
            key,
            lang,
            page_size,
        })
    }

    /// Relative path with forward slashes
    pub fn to_path(&self) -> String {
        let file = match self.page_size {
            Some(size) => format!("{}.{}.{}.json", self.key, self.lang, size),
            None => format!("{}.{}.json", self.key, self.lang),
        };
        if self.category.is_empty() {
            file
        } else {
            format!("{}/{}", self.category, file)
        }
    }
}

/// Decode one JSON document into zero or more records
pub fn decode_json(value: Value) -> std::result::Result<Vec<BookInfo>, ParseError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .into_iter()
            .filter(|item| !item.is_null())
            .map(decode_object)
            .collect(),
        Value::Object(map) => match map.get("kind").and_then(Value::as_str) {
            Some("books#volume") => Ok(vec![decode_volume(Value::Object(map))?]),
            Some("books#volumes") => {
                let list: VolumeList = from_value(Value::Object(map))?;
                list.items
                    .into_iter()
                    .map(GoogleVolume::into_book)
                    .collect()
            }
            _ if is_id_map(&map) => {
                let mut entries: Vec<(i64, Value)> = map
                    .into_iter()
                    .filter_map(|(id, value)| Some((id.parse().ok()?, value)))
                    .collect();
                entries.sort_by_key(|(id, _)| *id);
                entries
                    .into_iter()
                    .filter(|(_, value)| !value.is_null())
                    .map(|(_, value)| decode_object(value))
                    .collect()
            }
            _ => Ok(vec![decode_object(Value::Object(map))?]),
        },
        other => Err(ParseError::MalformedContent(format!(
            "expected object or array, found {}",
            kind_name(&other)
        ))),
    }
}

fn decode_object(value: Value) -> std::result::Result<BookInfo, ParseError> {
    if value.get("kind").and_then(Value::as_str) == Some("books#volume") {
        return decode_volume(value);
    }
    let mut book: BookInfo = from_value(value)?;
    book.normalize_dates();
    Ok(book)
}

fn decode_volume(value: Value) -> std::result::Result<BookInfo, ParseError> {
    from_value::<GoogleVolume>(value)?.into_book()
}

fn from_value<T: for<'de> Deserialize<'de>>(value: Value) -> std::result::Result<T, ParseError> {
    serde_json::from_value(value).map_err(|e| ParseError::MalformedContent(e.to_string()))
}

fn is_id_map(map: &Map<String, Value>) -> bool {
    !map.is_empty()
        && map.iter().all(|(key, value)| {
            key.parse::<i64>().is_ok() && (value.is_object() || value.is_null())
        })
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Deserialize)]
struct VolumeList {
    #[serde(default)]
    items: Vec<GoogleVolume>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleVolume {
    id: String,
    #[serde(default)]
    self_link: Option<String>,
    #[serde(default)]
    volume_info: VolumeInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct VolumeInfo {
    title: Option<String>,
    subtitle: Option<String>,
    authors: Vec<String>,
    publisher: Option<String>,
    published_date: Option<String>,
    description: Option<String>,
    industry_identifiers: Vec<IndustryIdentifier>,
    categories: Vec<String>,
    language: Option<String>,
    image_links: Option<ImageLinks>,
    info_link: Option<String>,
    canonical_volume_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IndustryIdentifier {
    #[serde(rename = "type")]
    kind: String,
    identifier: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ImageLinks {
    small_thumbnail: Option<String>,
    thumbnail: Option<String>,
}

impl GoogleVolume {
    fn into_book(self) -> std::result::Result<BookInfo, ParseError> {
        let info = self.volume_info;
        let mut title = info.title.unwrap_or_default();
        if let Some(subtitle) = info.subtitle.filter(|s| !s.is_empty()) {
            title = if title.is_empty() {
                subtitle
            } else {
                format!("{}: {}", title, subtitle)
            };
        }

        let mut book = BookInfo::new("google", self.id.clone()).with_title(title);
        for name in info.authors {
            book.add_author(AuthorInfo::new(name));
        }
        book.publisher = info.publisher;
        book.description = info.description;
        book.language = info.language.unwrap_or_default();
        book.subjects = info.categories.into_iter().collect();
        if let Some(date) = info.published_date {
            book.set_creation_date(&date);
        }

        book.add_identifier("google", self.id);
        let mut isbn10 = None;
        for identifier in info.industry_identifiers {
            match identifier.kind.as_str() {
                "ISBN_13" => {
                    book.isbn = identifier.identifier.clone();
                    book.add_identifier("isbn", identifier.identifier);
                }
                "ISBN_10" => {
                    isbn10 = Some(identifier.identifier.clone());
                    book.add_identifier("isbn10", identifier.identifier);
                }
                other => book.add_identifier(other, identifier.identifier),
            }
        }
        if book.isbn.is_empty() {
            book.isbn = isbn10.unwrap_or_default();
        }

        book.uri = info
            .canonical_volume_link
            .or(info.info_link)
            .or(self.self_link)
            .unwrap_or_default();
        book.cover = info
            .image_links
            .and_then(|links| links.thumbnail.or(links.small_thumbnail));

        Ok(book)
    }
}

/// Reads records from a JSON file or a tree of JSON files
#[derive(Default)]
pub struct JsonReader;

impl JsonReader {
    pub fn new() -> Self {
        Self
    }

    fn read_file(&self, file: &Path, item: &str) -> std::result::Result<Vec<BookInfo>, ParseError> {
        let text = fs::read_to_string(file).map_err(|e| ParseError::Unreadable(e.to_string()))?;
        let value: Value =
            serde_json::from_str(&text).map_err(|e| ParseError::MalformedContent(e.to_string()))?;
        let mut books = decode_json(value)?;

        // Cache files carry the language in their name
        if let Some(cache) = CachePath::parse(item) {
            if cache.lang != UNDETERMINED_LANGUAGE {
                for book in books.iter_mut().filter(|b| b.language.is_empty()) {
                    book.language = cache.lang.clone();
                }
            }
        }
        Ok(books)
    }
}

impl Reader for JsonReader {
    fn label(&self) -> &str {
        "JSON"
    }

    fn process(
        &mut self,
        base_path: &Path,
        local_path: &str,
        sink: &mut dyn BookSink,
    ) -> Result<ProcessReport> {
        let root = source_root(base_path, local_path);
        let name = source_name(base_path, local_path);
        let mut log = ItemLog::new();

        let files: Vec<PathBuf> = if root.is_file() {
            vec![root.clone()]
        } else if root.is_dir() {
            let mut files = Vec::new();
            for entry in WalkDir::new(&root).sort_by_file_name() {
                match entry {
                    Ok(entry) if entry.file_type().is_file() && is_json(entry.path()) => {
                        files.push(entry.into_path());
                    }
                    Ok(_) => {}
                    Err(err) => {
                        let item = err
                            .path()
                            .map(|p| relative_path(p, base_path))
                            .unwrap_or_else(|| name.clone());
                        log.error(&item, ParseError::Unreadable(err.to_string()));
                    }
                }
            }
            files
        } else {
            log.error(&name, ParseError::Unreadable(format!("{} not found", root.display())));
            return Ok(log.finish(self.label(), &name));
        };
        tracing::debug!("Reading {} JSON files under {:?}", files.len(), root);

        for file in files {
            let mut item = relative_path(&file, base_path);
            if item.is_empty() {
                item = file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
            }

            match self.read_file(&file, &item) {
                Ok(books) => {
                    log.begin_file();
                    let single = books.len() == 1;
                    let mut ok = true;
                    for (n, book) in books.into_iter().enumerate() {
                        let entry = if single {
                            item.clone()
                        } else {
                            format!("{}#{}", item, n + 1)
                        };
                        let key = book.item_key();
                        let delivered = log.deliver(sink, &entry, &key, Ok(book))?;
                        ok = ok && delivered;
                    }
                    log.count(ok);
                }
                Err(err) => log.error(&item, err),
            }
        }

        Ok(log.finish(self.label(), &name))
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}
