//! Series information

use serde::{Deserialize, Serialize};

fn default_index() -> f64 {
    1.0
}

/// Series information for books that are part of a series
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeriesInfo {
    pub id: String,

    /// Series name
    pub name: String,

    pub sort: String,

    /// Position in series (can be fractional for novellas, etc.)
    #[serde(default = "default_index")]
    pub index: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SeriesInfo {
    /// Create a series keyed by its name
    pub fn new(name: impl Into<String>, index: f64) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            sort: title_sort(&name),
            name,
            index,
            link: None,
            description: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Render the index without a trailing `.0` when it is integral
    pub fn index_label(&self) -> String {
        format_index(self.index)
    }
}

/// Parse a series position such as `"3"`, `"2.5"` or `"1,5"`
pub fn parse_index(value: &str) -> Option<f64> {
    let value = value.trim().replace(',', ".");
    value.parse::<f64>().ok().filter(|n| n.is_finite())
}

pub fn format_index(index: f64) -> String {
    if index.fract() == 0.0 {
        format!("{}", index as i64)
    } else {
        format!("{}", index)
    }
}

const ARTICLES: &[&str] = &["the", "a", "an"];

/// Move a leading English article to the end ("The Hobbit" → "Hobbit, The").
pub fn title_sort(title: &str) -> String {
    let title = title.trim();
    if let Some((first, rest)) = title.split_once(' ') {
        if ARTICLES.contains(&first.to_lowercase().as_str()) && !rest.trim().is_empty() {
            return format!("{}, {}", rest.trim(), first);
        }
    }
    title.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_label() {
        assert_eq!(SeriesInfo::new("Discworld", 3.0).index_label(), "3");
        assert_eq!(SeriesInfo::new("Discworld", 2.5).index_label(), "2.5");
    }

    #[test]
    fn test_parse_index() {
        assert_eq!(parse_index("4"), Some(4.0));
        assert_eq!(parse_index(" 1,5 "), Some(1.5));
        assert_eq!(parse_index("first"), None);
        assert_eq!(parse_index("NaN"), None);
    }

    #[test]
    fn test_title_sort() {
        assert_eq!(title_sort("The Hobbit"), "Hobbit, The");
        assert_eq!(title_sort("An Unexpected Party"), "Unexpected Party, An");
        assert_eq!(title_sort("Theory of Everything"), "Theory of Everything");
        assert_eq!(title_sort("The"), "The");
    }
}
