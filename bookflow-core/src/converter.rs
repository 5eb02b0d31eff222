//! Id mapper: resolves a source path to a stable target id
//!
//! The mapping file is prepared outside of Bookflow and only ever read here.
//! Unmapped paths resolve to `0`, which leaves id allocation to the target.

use crate::error::ConfigError;
use std::collections::HashMap;
use std::path::Path;

/// Read-only lookup table from source path to target id
#[derive(Debug, Clone, Default)]
pub struct Converter {
    ids: HashMap<String, i64>,
}

impl Converter {
    /// Build a converter from in-memory pairs
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        Self {
            ids: pairs
                .into_iter()
                .map(|(path, id)| (normalize_key(&path.into()), id))
                .collect(),
        }
    }

    /// Load a mapping file.
    ///
    /// `.json` files hold an object of path → id. Anything else is read as
    /// text with one `path,id`, `path=id` or `path<TAB>id` entry per line.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::MappingFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let converter = if is_json {
            let ids: HashMap<String, i64> =
                serde_json::from_str(&content).map_err(|e| ConfigError::MappingFile {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;
            Self::from_pairs(ids)
        } else {
            Self::parse_text(&content).map_err(|reason| ConfigError::MappingFile {
                path: path.to_path_buf(),
                reason,
            })?
        };

        tracing::debug!("Loaded {} id mappings from {:?}", converter.len(), path);
        Ok(converter)
    }

    fn parse_text(content: &str) -> Result<Self, String> {
        let mut ids = HashMap::new();
        for (n, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line
                .rfind([',', '=', '\t'])
                .map(|pos| (&line[..pos], &line[pos + 1..]))
                .ok_or_else(|| format!("line {}: expected path and id", n + 1))?;
            let id: i64 = value
                .trim()
                .parse()
                .map_err(|_| format!("line {}: invalid id '{}'", n + 1, value.trim()))?;
            let key = key.trim().trim_matches('"');
            if key.is_empty() {
                return Err(format!("line {}: empty path", n + 1));
            }
            ids.insert(normalize_key(key), id);
        }
        Ok(Self { ids })
    }

    /// Target id for a source path, `0` when the path is not mapped.
    ///
    /// Falls back to the path without its extension, so an entry for
    /// `Author/Book` also covers `Author/Book.epub`.
    pub fn book_id(&self, path: &str) -> i64 {
        let key = normalize_key(path);
        if let Some(id) = self.ids.get(&key) {
            return *id;
        }
        let stem = Path::new(&key).with_extension("");
        stem.to_str()
            .and_then(|s| self.ids.get(s))
            .copied()
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

fn normalize_key(path: &str) -> String {
    path.replace('\\', "/").trim_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;

    #[test]
    fn test_text_mapping() {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        writeln!(file, "# exported ids").unwrap();
        writeln!(file, "Carroll, Lewis/Alice.epub,12").unwrap();
        writeln!(file, "Verne/Around the World.epub=7").unwrap();
        writeln!(file, "Homer/Odyssey.epub\t3").unwrap();
        writeln!(file).unwrap();

        let converter = Converter::load(file.path()).unwrap();
        assert_eq!(converter.len(), 3);
        assert_eq!(converter.book_id("Carroll, Lewis/Alice.epub"), 12);
        assert_eq!(converter.book_id("Verne/Around the World.epub"), 7);
        assert_eq!(converter.book_id("/Homer/Odyssey.epub"), 3);
        assert_eq!(converter.book_id("Homer/Iliad.epub"), 0);
    }

    #[test]
    fn test_json_mapping() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"Verne/Nautilus": 5}}"#).unwrap();

        let converter = Converter::load(file.path()).unwrap();
        assert_eq!(converter.book_id("Verne/Nautilus"), 5);
        assert_eq!(converter.book_id("Verne/Nautilus.epub"), 5);
    }

    #[test]
    fn test_malformed_mapping_is_fatal() {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        writeln!(file, "Verne/Nautilus.epub,five").unwrap();

        let err = Converter::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_missing_mapping_is_fatal() {
        let err = Converter::load(Path::new("/nonexistent/mapping.txt")).unwrap_err();
        assert!(matches!(err, ConfigError::MappingFile { .. }));
    }

    proptest! {
        #[test]
        fn lookups_are_stable(paths in proptest::collection::hash_map("[a-z]{1,8}/[a-z]{1,8}", 1i64..10_000, 1..20)) {
            let converter = Converter::from_pairs(paths.clone());
            for (path, id) in &paths {
                prop_assert_eq!(converter.book_id(path), *id);
                prop_assert_eq!(converter.book_id(path), *id);
            }
            prop_assert_eq!(converter.book_id("0/unmapped"), 0);
        }
    }
}
