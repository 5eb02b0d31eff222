//! Calibre `metadata.db` access
//!
//! Works against an existing Calibre library or a freshly created database
//! with the same core tables. Calibre's own triggers call the SQL functions
//! `title_sort()` and `uuid4()`, so both are registered on every connection.

use crate::error::{ConfigError, WriteError};
use crate::types::{author_sort, title_sort, AuthorInfo, BookInfo, SeriesInfo};
use rusqlite::functions::FunctionFlags;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Transaction};
use std::path::Path;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS books (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL DEFAULT 'Unknown',
    sort TEXT,
    timestamp TIMESTAMP,
    pubdate TIMESTAMP,
    series_index REAL NOT NULL DEFAULT 1.0,
    author_sort TEXT,
    isbn TEXT DEFAULT '',
    lccn TEXT DEFAULT '',
    path TEXT NOT NULL DEFAULT '',
    flags INTEGER NOT NULL DEFAULT 1,
    uuid TEXT,
    has_cover BOOL DEFAULT 0,
    last_modified TIMESTAMP NOT NULL DEFAULT '2000-01-01 00:00:00+00:00'
);
CREATE TABLE IF NOT EXISTS authors (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL COLLATE NOCASE,
    sort TEXT COLLATE NOCASE,
    link TEXT NOT NULL DEFAULT '',
    UNIQUE(name)
);
CREATE TABLE IF NOT EXISTS books_authors_link (
    id INTEGER PRIMARY KEY,
    book INTEGER NOT NULL,
    author INTEGER NOT NULL,
    UNIQUE(book, author)
);
CREATE TABLE IF NOT EXISTS series (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL COLLATE NOCASE,
    sort TEXT COLLATE NOCASE,
    link TEXT NOT NULL DEFAULT '',
    UNIQUE(name)
);
CREATE TABLE IF NOT EXISTS books_series_link (
    id INTEGER PRIMARY KEY,
    book INTEGER NOT NULL,
    series INTEGER NOT NULL,
    UNIQUE(book)
);
CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL COLLATE NOCASE,
    link TEXT NOT NULL DEFAULT '',
    UNIQUE(name)
);
CREATE TABLE IF NOT EXISTS books_tags_link (
    id INTEGER PRIMARY KEY,
    book INTEGER NOT NULL,
    tag INTEGER NOT NULL,
    UNIQUE(book, tag)
);
CREATE TABLE IF NOT EXISTS publishers (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL COLLATE NOCASE,
    sort TEXT COLLATE NOCASE,
    link TEXT NOT NULL DEFAULT '',
    UNIQUE(name)
);
CREATE TABLE IF NOT EXISTS books_publishers_link (
    id INTEGER PRIMARY KEY,
    book INTEGER NOT NULL,
    publisher INTEGER NOT NULL,
    UNIQUE(book)
);
CREATE TABLE IF NOT EXISTS languages (
    id INTEGER PRIMARY KEY,
    lang_code TEXT NOT NULL COLLATE NOCASE,
    link TEXT NOT NULL DEFAULT '',
    UNIQUE(lang_code)
);
CREATE TABLE IF NOT EXISTS books_languages_link (
    id INTEGER PRIMARY KEY,
    book INTEGER NOT NULL,
    lang_code INTEGER NOT NULL,
    item_order INTEGER NOT NULL DEFAULT 0,
    UNIQUE(book, lang_code)
);
CREATE TABLE IF NOT EXISTS identifiers (
    id INTEGER PRIMARY KEY,
    book INTEGER NOT NULL,
    type TEXT NOT NULL DEFAULT 'isbn' COLLATE NOCASE,
    val TEXT NOT NULL COLLATE NOCASE,
    UNIQUE(book, type)
);
CREATE TABLE IF NOT EXISTS comments (
    id INTEGER PRIMARY KEY,
    book INTEGER NOT NULL,
    text TEXT NOT NULL COLLATE NOCASE,
    UNIQUE(book)
);
";

/// An author row
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorRow {
    pub id: i64,
    pub name: String,
    pub sort: String,
    pub link: String,
}

/// Handle on a Calibre metadata database
pub struct CalibreDb {
    conn: Connection,
}

impl CalibreDb {
    /// Open a database for writing.
    ///
    /// A missing file is a configuration error unless `create` is set, in
    /// which case the file and its schema are created.
    pub fn open(path: &Path, create: bool) -> Result<Self, ConfigError> {
        let exists = path.exists();
        if !exists && !create {
            return Err(ConfigError::DestinationMissing(path.to_path_buf()));
        }

        let conn = Connection::open(path).map_err(|e| destination_error(path, e))?;
        register_functions(&conn).map_err(|e| destination_error(path, e))?;
        if !exists {
            conn.execute_batch(SCHEMA)
                .map_err(|e| destination_error(path, e))?;
            tracing::info!("Created Calibre database at {:?}", path);
        } else {
            // Fail now rather than on the first record if this is not a library
            conn.query_row("SELECT COUNT(*) FROM books", [], |row| row.get::<_, i64>(0))
                .map_err(|e| destination_error(path, e))?;
        }

        Ok(Self { conn })
    }

    /// Open an existing database without write access
    pub fn open_read_only(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::DestinationMissing(path.to_path_buf()));
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| destination_error(path, e))?;
        register_functions(&conn).map_err(|e| destination_error(path, e))?;
        Ok(Self { conn })
    }

    /// In-memory database with the library schema
    pub fn open_in_memory() -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        register_functions(&conn)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn book_count(&self) -> rusqlite::Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM books", [], |row| row.get(0))
    }

    /// All book ids in ascending order
    pub fn book_ids(&self) -> rusqlite::Result<Vec<i64>> {
        let mut stmt = self.conn.prepare("SELECT id FROM books ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    /// `(id, books.path)` for every book, ascending by id
    pub fn book_paths(&self) -> rusqlite::Result<Vec<(i64, String)>> {
        let mut stmt = self.conn.prepare("SELECT id, path FROM books ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<(i64, String)>>>()?;
        Ok(rows)
    }

    pub fn authors(&self) -> rusqlite::Result<Vec<AuthorRow>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, COALESCE(sort, ''), link FROM authors ORDER BY sort, id")?;
        let authors = stmt
            .query_map([], |row| {
                Ok(AuthorRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    sort: row.get(2)?,
                    link: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(authors)
    }

    /// Update the external link of an author; returns whether the author exists
    pub fn set_author_link(&self, author_id: i64, link: &str) -> rusqlite::Result<bool> {
        let changed = self.conn.execute(
            "UPDATE authors SET link = ?1 WHERE id = ?2",
            params![link, author_id],
        )?;
        Ok(changed > 0)
    }

    /// Load one book with its linked authors, series, tags and identifiers
    pub fn load_book(&self, id: i64) -> rusqlite::Result<Option<BookInfo>> {
        let row = self
            .conn
            .query_row(
                "SELECT title, COALESCE(timestamp, ''), COALESCE(pubdate, ''), series_index,
                        COALESCE(isbn, ''), path, COALESCE(uuid, ''), has_cover,
                        COALESCE(last_modified, '')
                 FROM books WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, f64>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                        row.get::<_, bool>(7)?,
                        row.get::<_, String>(8)?,
                    ))
                },
            )
            .optional()?;

        let Some((title, timestamp, pubdate, series_index, isbn, path, uuid, has_cover, modified)) =
            row
        else {
            return Ok(None);
        };

        let (dir, key) = match path.trim_matches('/').rsplit_once('/') {
            Some((dir, key)) => (dir.to_string(), key.to_string()),
            None if !path.trim().is_empty() => (String::new(), path.trim_matches('/').to_string()),
            None => (String::new(), id.to_string()),
        };

        let mut book = BookInfo::new("calibre", key).with_title(title);
        book.path = dir;
        book.uuid = uuid;
        book.isbn = isbn;
        book.set_creation_date(&pubdate);
        book.set_modification_date(&modified);
        book.timestamp = crate::types::normalize_date(&timestamp)
            .filter(|ts| Some(ts.as_str()) != book.creation_date.as_deref());
        if has_cover {
            book.cover = Some("cover.jpg".to_string());
        }

        let mut stmt = self.conn.prepare(
            "SELECT a.id, a.name, COALESCE(a.sort, ''), a.link
             FROM books_authors_link bal JOIN authors a ON a.id = bal.author
             WHERE bal.book = ?1 ORDER BY bal.id",
        )?;
        let authors = stmt
            .query_map(params![id], |row| {
                let link: String = row.get(3)?;
                Ok(AuthorInfo {
                    id: row.get::<_, i64>(0)?.to_string(),
                    name: row.get(1)?,
                    sort: row.get(2)?,
                    link: (!link.is_empty()).then_some(link),
                    description: None,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for author in authors {
            book.add_author(author);
        }

        let series = self
            .conn
            .query_row(
                "SELECT s.id, s.name, COALESCE(s.sort, s.name), s.link
                 FROM books_series_link bsl JOIN series s ON s.id = bsl.series
                 WHERE bsl.book = ?1",
                params![id],
                |row| {
                    let link: String = row.get(3)?;
                    Ok(SeriesInfo {
                        id: row.get::<_, i64>(0)?.to_string(),
                        name: row.get(1)?,
                        sort: row.get(2)?,
                        index: series_index,
                        link: (!link.is_empty()).then_some(link),
                        description: None,
                    })
                },
            )
            .optional()?;
        if let Some(series) = series {
            book.add_series(series);
        }

        let mut stmt = self.conn.prepare(
            "SELECT t.name FROM books_tags_link btl JOIN tags t ON t.id = btl.tag
             WHERE btl.book = ?1",
        )?;
        book.subjects = stmt
            .query_map(params![id], |row| row.get(0))?
            .collect::<rusqlite::Result<_>>()?;

        let mut stmt = self
            .conn
            .prepare("SELECT type, val FROM identifiers WHERE book = ?1 ORDER BY type")?;
        let identifiers = stmt
            .query_map(params![id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for (scheme, value) in identifiers {
            match scheme.to_lowercase().as_str() {
                "uri" => book.uri = value.clone(),
                "isbn" if book.isbn.is_empty() => book.isbn = value.clone(),
                _ => {}
            }
            book.add_identifier(scheme, value);
        }

        book.language = self
            .conn
            .query_row(
                "SELECT l.lang_code FROM books_languages_link bll
                 JOIN languages l ON l.id = bll.lang_code
                 WHERE bll.book = ?1 ORDER BY bll.item_order LIMIT 1",
                params![id],
                |row| row.get(0),
            )
            .optional()?
            .unwrap_or_default();

        book.description = self
            .conn
            .query_row(
                "SELECT text FROM comments WHERE book = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;

        book.publisher = self
            .conn
            .query_row(
                "SELECT p.name FROM books_publishers_link bpl
                 JOIN publishers p ON p.id = bpl.publisher WHERE bpl.book = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;

        Ok(Some(book))
    }

    /// Insert or update a book and relink its metadata.
    ///
    /// `id > 0` targets that row (inserting it with that id if absent);
    /// `id == 0` lets the database allocate a new id. Returns the row id.
    pub fn upsert_book(&mut self, book: &BookInfo, id: i64) -> Result<i64, WriteError> {
        let tx = self.conn.transaction()?;

        let exists = id > 0
            && tx
                .query_row("SELECT 1 FROM books WHERE id = ?1", params![id], |_| Ok(()))
                .optional()?
                .is_some();

        let author_sort_value = book
            .first_author()
            .map(|a| if a.sort.is_empty() { author_sort(&a.name) } else { a.sort.clone() })
            .unwrap_or_default();
        let series_index = book.primary_series().map(|s| s.index).unwrap_or(1.0);
        let uuid = if book.uuid.is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            book.uuid.clone()
        };
        let modified = book
            .modification_date
            .clone()
            .unwrap_or_else(|| chrono::Utc::now().format(crate::types::date::DATE_FORMAT).to_string());

        let book_id = if exists {
            tx.execute(
                "UPDATE books SET title = ?1, sort = ?2, timestamp = ?3, pubdate = ?4,
                    series_index = ?5, author_sort = ?6, isbn = ?7, path = ?8, uuid = ?9,
                    has_cover = ?10, last_modified = ?11
                 WHERE id = ?12",
                params![
                    book.title,
                    title_sort(&book.title),
                    book.timestamp(),
                    book.creation_date,
                    series_index,
                    author_sort_value,
                    book.isbn,
                    book.item_key(),
                    uuid,
                    book.cover.is_some(),
                    modified,
                    id,
                ],
            )?;
            id
        } else {
            tx.execute(
                "INSERT INTO books (id, title, sort, timestamp, pubdate, series_index,
                    author_sort, isbn, path, uuid, has_cover, last_modified)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    (id > 0).then_some(id),
                    book.title,
                    title_sort(&book.title),
                    book.timestamp(),
                    book.creation_date,
                    series_index,
                    author_sort_value,
                    book.isbn,
                    book.item_key(),
                    uuid,
                    book.cover.is_some(),
                    modified,
                ],
            )?;
            tx.last_insert_rowid()
        };

        relink_book(&tx, book_id, book)?;
        tx.commit()?;
        Ok(book_id)
    }
}

fn relink_book(tx: &Transaction, book_id: i64, book: &BookInfo) -> rusqlite::Result<()> {
    for table in [
        "books_authors_link",
        "books_series_link",
        "books_tags_link",
        "books_publishers_link",
        "books_languages_link",
        "identifiers",
        "comments",
    ] {
        tx.execute(&format!("DELETE FROM {} WHERE book = ?1", table), params![book_id])?;
    }

    for author in &book.authors {
        let sort = if author.sort.is_empty() {
            author_sort(&author.name)
        } else {
            author.sort.clone()
        };
        tx.execute(
            "INSERT OR IGNORE INTO authors (name, sort) VALUES (?1, ?2)",
            params![author.name, sort],
        )?;
        if let Some(link) = &author.link {
            tx.execute(
                "UPDATE authors SET link = ?1 WHERE name = ?2",
                params![link, author.name],
            )?;
        }
        tx.execute(
            "INSERT OR IGNORE INTO books_authors_link (book, author)
             SELECT ?1, id FROM authors WHERE name = ?2",
            params![book_id, author.name],
        )?;
    }

    if let Some(series) = book.primary_series() {
        tx.execute(
            "INSERT OR IGNORE INTO series (name, sort) VALUES (?1, ?2)",
            params![series.name, series.sort],
        )?;
        tx.execute(
            "INSERT INTO books_series_link (book, series)
             SELECT ?1, id FROM series WHERE name = ?2",
            params![book_id, series.name],
        )?;
    }

    for subject in &book.subjects {
        tx.execute("INSERT OR IGNORE INTO tags (name) VALUES (?1)", params![subject])?;
        tx.execute(
            "INSERT OR IGNORE INTO books_tags_link (book, tag)
             SELECT ?1, id FROM tags WHERE name = ?2",
            params![book_id, subject],
        )?;
    }

    if let Some(publisher) = book.publisher.as_deref().filter(|p| !p.is_empty()) {
        tx.execute(
            "INSERT OR IGNORE INTO publishers (name, sort) VALUES (?1, ?1)",
            params![publisher],
        )?;
        tx.execute(
            "INSERT INTO books_publishers_link (book, publisher)
             SELECT ?1, id FROM publishers WHERE name = ?2",
            params![book_id, publisher],
        )?;
    }

    if !book.language.is_empty() {
        tx.execute(
            "INSERT OR IGNORE INTO languages (lang_code) VALUES (?1)",
            params![book.language],
        )?;
        tx.execute(
            "INSERT INTO books_languages_link (book, lang_code, item_order)
             SELECT ?1, id, 0 FROM languages WHERE lang_code = ?2",
            params![book_id, book.language],
        )?;
    }

    let mut identifiers = book.identifiers.clone();
    if !book.isbn.is_empty() {
        identifiers.entry("isbn".to_string()).or_insert_with(|| book.isbn.clone());
    }
    if !book.uri.is_empty() {
        identifiers.entry("uri".to_string()).or_insert_with(|| book.uri.clone());
    }
    for (scheme, value) in &identifiers {
        tx.execute(
            "INSERT OR REPLACE INTO identifiers (book, type, val) VALUES (?1, ?2, ?3)",
            params![book_id, scheme, value],
        )?;
    }

    if let Some(description) = book.description.as_deref().filter(|d| !d.is_empty()) {
        tx.execute(
            "INSERT INTO comments (book, text) VALUES (?1, ?2)",
            params![book_id, description],
        )?;
    }

    Ok(())
}

/// Calibre triggers depend on these application-defined functions
fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "title_sort",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let title: String = ctx.get(0)?;
            Ok(title_sort(&title))
        },
    )?;
    conn.create_scalar_function("uuid4", 0, FunctionFlags::SQLITE_UTF8, |_| {
        Ok(uuid::Uuid::new_v4().to_string())
    })?;
    Ok(())
}

fn destination_error(path: &Path, err: rusqlite::Error) -> ConfigError {
    ConfigError::Destination {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}
