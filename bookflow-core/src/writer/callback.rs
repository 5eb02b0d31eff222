//! Writer that hands records to caller code

use super::Writer;
use crate::error::WriteError;
use crate::types::BookInfo;

type Callback = Box<dyn FnMut(&BookInfo, i64) -> Result<i64, WriteError>>;

/// Forwards every record to a closure and returns the id it reports
pub struct CallbackWriter {
    callback: Callback,
}

impl CallbackWriter {
    pub fn new<F>(callback: F) -> Self
    where
        F: FnMut(&BookInfo, i64) -> Result<i64, WriteError> + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }
}

impl Writer for CallbackWriter {
    fn format_name(&self) -> &str {
        "Callback"
    }

    fn add_book(&mut self, book: &BookInfo, id: i64) -> Result<i64, WriteError> {
        (self.callback)(book, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_forwards_records_and_results() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        let mut writer = CallbackWriter::new(move |book: &BookInfo, id| {
            if book.title.is_empty() {
                return Err(WriteError::Rejected("untitled".to_string()));
            }
            log.borrow_mut().push(book.title.clone());
            Ok(id + 100)
        });

        assert_eq!(writer.add_book(&BookInfo::new("csv", "a").with_title("A"), 1).unwrap(), 101);
        assert!(writer.add_book(&BookInfo::new("csv", "b"), 2).is_err());
        assert_eq!(*seen.borrow(), vec!["A".to_string()]);
    }
}
