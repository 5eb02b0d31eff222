//! Progress display for workflow runs

use bookflow_core::{BookInfo, FileWriter, WriteError, Writer};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Wraps a writer and ticks a spinner for every stored record
pub struct ProgressWriter {
    inner: Box<dyn Writer>,
    bar: ProgressBar,
}

impl ProgressWriter {
    pub fn new(inner: Box<dyn Writer>) -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} [{elapsed_precise}] {pos} records {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { inner, bar }
    }
}

impl Writer for ProgressWriter {
    fn format_name(&self) -> &str {
        self.inner.format_name()
    }

    fn add_book(&mut self, book: &BookInfo, id: i64) -> Result<i64, WriteError> {
        let stored = self.inner.add_book(book, id)?;
        self.bar.inc(1);
        self.bar.set_message(book.title.clone());
        Ok(stored)
    }

    fn finish(&mut self) -> Result<(), WriteError> {
        self.bar.set_message(format!("saving {}", self.inner.format_name()));
        let result = self.inner.finish();
        self.bar.finish_and_clear();
        result
    }

    fn as_file_writer(&self) -> Option<&dyn FileWriter> {
        self.inner.as_file_writer()
    }
}
