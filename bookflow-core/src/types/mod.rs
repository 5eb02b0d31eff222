//! Normalized record model shared by all readers and writers

mod author;
mod book;
pub mod date;
mod series;

pub use author::{author_sort, AuthorInfo};
pub use book::BookInfo;
pub use date::normalize_date;
pub use series::{format_index, parse_index, title_sort, SeriesInfo};
