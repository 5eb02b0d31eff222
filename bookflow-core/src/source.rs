//! Enumerated source and target types

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kinds of metadata sources and targets.
///
/// Not every kind works on both ends: `LocalBooks` can only be read and
/// `Callback` can only be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum SourceType {
    #[serde(alias = "calibre_db")]
    Calibre = 1,
    #[serde(rename = "local", alias = "local_books")]
    LocalBooks = 2,
    #[serde(rename = "csv", alias = "csv_files")]
    CsvFiles = 3,
    #[serde(rename = "json", alias = "json_files")]
    JsonFiles = 4,
    Callback = 5,
}

impl SourceType {
    /// Constant name of the type, as used in error messages
    pub fn name(&self) -> &'static str {
        match self {
            SourceType::Calibre => "CALIBRE_DB",
            SourceType::LocalBooks => "LOCAL_BOOKS",
            SourceType::CsvFiles => "CSV_FILES",
            SourceType::JsonFiles => "JSON_FILES",
            SourceType::Callback => "CALLBACK",
        }
    }

    pub fn can_read(&self) -> bool {
        !matches!(self, SourceType::Callback)
    }

    pub fn can_write(&self) -> bool {
        !matches!(self, SourceType::LocalBooks)
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), *self as u8)
    }
}

impl TryFrom<u8> for SourceType {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(SourceType::Calibre),
            2 => Ok(SourceType::LocalBooks),
            3 => Ok(SourceType::CsvFiles),
            4 => Ok(SourceType::JsonFiles),
            5 => Ok(SourceType::Callback),
            other => Err(ConfigError::UnknownSourceType(other.to_string())),
        }
    }
}

impl FromStr for SourceType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "calibre" | "calibre_db" | "db" => Ok(SourceType::Calibre),
            "local" | "local_books" | "epub" => Ok(SourceType::LocalBooks),
            "csv" | "csv_files" => Ok(SourceType::CsvFiles),
            "json" | "json_files" => Ok(SourceType::JsonFiles),
            "callback" => Ok(SourceType::Callback),
            other => match other.parse::<u8>() {
                Ok(n) => SourceType::try_from(n),
                Err(_) => Err(ConfigError::UnknownSourceType(s.to_string())),
            },
        }
    }
}
