//! Author information

use serde::{Deserialize, Serialize};

/// An author as attached to a book record
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AuthorInfo {
    /// Stable identifier chosen by the source adapter
    pub id: String,

    /// Display form, e.g. "Ursula K. Le Guin"
    pub name: String,

    /// Filing form, e.g. "Le Guin, Ursula K."
    pub sort: String,

    /// External reference URL, filled in by a later matching step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl AuthorInfo {
    /// Create an author keyed by its display name
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            sort: author_sort(&name),
            name,
            link: None,
            description: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = sort.into();
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}

const NAME_SUFFIXES: &[&str] = &["jr", "jr.", "sr", "sr.", "ii", "iii", "iv", "phd", "md"];

/// Compute the family-name-first filing form of an author name.
///
/// Names that already contain a comma are assumed to be in filing form.
pub fn author_sort(name: &str) -> String {
    let name = name.trim();
    if name.contains(',') {
        return name.to_string();
    }

    let mut parts: Vec<&str> = name.split_whitespace().collect();
    if parts.len() < 2 {
        return name.to_string();
    }

    let suffix = match parts.last() {
        Some(last) if NAME_SUFFIXES.contains(&last.to_lowercase().as_str()) => parts.pop(),
        _ => None,
    };
    if parts.len() < 2 {
        return name.to_string();
    }

    let family = parts.pop().unwrap_or_default();
    let mut sort = format!("{}, {}", family, parts.join(" "));
    if let Some(suffix) = suffix {
        sort.push(' ');
        sort.push_str(suffix);
    }
    sort
}
