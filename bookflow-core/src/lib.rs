//! Bookflow Core Library
//!
//! This crate moves ebook metadata between sources and targets: a Calibre
//! library, a tree of EPUB files, CSV files and JSON files. Every source is
//! decoded into a normalized [`BookInfo`] record by a [`Reader`] and handed to
//! a [`Writer`]; a [`Workflow`] ties the two together with an optional
//! [`Converter`] that pins target ids.

pub mod calibre;
pub mod converter;
pub mod epub;
pub mod error;
pub mod reader;
pub mod record;
pub mod source;
pub mod types;
pub mod workflow;
pub mod writer;

pub use converter::Converter;
pub use error::{BookflowError, ConfigError, ParseError, Result, WriteError};
pub use reader::{reader_for, BookSink, ProcessReport, Reader};
pub use source::SourceType;
pub use types::{AuthorInfo, BookInfo, SeriesInfo};
pub use workflow::{Workflow, WorkflowConfig};
pub use writer::{writer_for, FileWriter, Writer};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_book_creation() {
        let book = BookInfo::new("local", "alice").with_title("Alice in Wonderland");
        assert_eq!(book.title, "Alice in Wonderland");
        assert_eq!(book.item_key(), "alice");
        assert!(book.validate().is_ok());
    }
}
