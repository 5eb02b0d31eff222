//! EPUB container metadata reader
//!
//! Reads `META-INF/container.xml` to locate the OPF package document and
//! exposes its metadata through typed getters. Only metadata is read; chapter
//! content is never touched.

use crate::error::ParseError;
use crate::types::{normalize_date, parse_index};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use zip::ZipArchive;

const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Package format versions this reader understands
pub const SUPPORTED_VERSIONS: &[u8] = &[2, 3];

/// A creator of the book with its optional filing form
#[derive(Debug, Clone, PartialEq)]
pub struct Creator {
    pub name: String,
    pub sort: Option<String>,
}

/// Location of the cover image inside the container
#[derive(Debug, Clone, PartialEq)]
pub struct CoverInfo {
    /// Path inside the zip archive
    pub path: String,
    pub media_type: String,
}

/// One child element of `<metadata>`
#[derive(Debug, Clone, Default)]
struct MetaElement {
    name: String,
    attrs: HashMap<String, String>,
    text: String,
}

impl MetaElement {
    fn from_start(e: &BytesStart) -> Self {
        Self {
            name: local_name(e),
            attrs: attributes(e),
            text: String::new(),
        }
    }

    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(|s| s.as_str())
    }

    fn value(&self) -> Option<&str> {
        let text = self.text.trim();
        (!text.is_empty()).then_some(text)
    }
}

#[derive(Debug, Clone)]
struct ManifestItem {
    id: String,
    href: String,
    media_type: String,
    properties: String,
}

/// Metadata view over an opened EPUB file
#[derive(Debug, Clone)]
pub struct EpubContainer {
    version: String,
    major_version: u8,
    unique_identifier_ref: Option<String>,
    opf_dir: String,
    metadata: Vec<MetaElement>,
    manifest: Vec<ManifestItem>,
}

impl EpubContainer {
    /// Open an EPUB file and check its package version
    pub fn open(path: &Path) -> Result<Self, ParseError> {
        let file = File::open(path)
            .map_err(|e| ParseError::Unreadable(format!("{}: {}", path.display(), e)))?;
        Self::from_reader(BufReader::new(file))
    }

    /// Read an EPUB from any seekable source
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self, ParseError> {
        let mut archive =
            ZipArchive::new(reader).map_err(|e| ParseError::InvalidEpub(e.to_string()))?;

        let container = read_entry(&mut archive, CONTAINER_PATH)?;
        let opf_path = find_rootfile(&container)?;
        let opf = read_entry(&mut archive, &opf_path)?;

        let opf_dir = Path::new(&opf_path)
            .parent()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default();

        let epub = parse_package(&opf, opf_dir)?;
        tracing::trace!(
            "Parsed OPF {} (version {}, {} metadata elements)",
            opf_path,
            epub.version,
            epub.metadata.len()
        );
        Ok(epub)
    }

    /// Major package version, 2 or 3
    pub fn version(&self) -> u8 {
        self.major_version
    }

    /// Version attribute exactly as found in the package document
    pub fn version_string(&self) -> &str {
        &self.version
    }

    pub fn title(&self) -> Option<String> {
        let titles: Vec<&MetaElement> = self.elements("title").collect();
        titles
            .iter()
            .find(|t| {
                t.attr("id")
                    .and_then(|id| self.refinement(id, "title-type"))
                    .map(|kind| kind == "main")
                    .unwrap_or(false)
            })
            .or_else(|| titles.first())
            .and_then(|t| t.value())
            .map(str::to_string)
    }

    /// Creators with the `aut` role, or with no role at all
    pub fn authors(&self) -> Vec<Creator> {
        self.elements("creator")
            .filter(|el| {
                let role = el
                    .attr("role")
                    .or_else(|| el.attr("id").and_then(|id| self.refinement(id, "role")));
                role.map(|r| r.eq_ignore_ascii_case("aut")).unwrap_or(true)
            })
            .filter_map(|el| {
                let name = el.value()?.to_string();
                let sort = el
                    .attr("file-as")
                    .or_else(|| el.attr("id").and_then(|id| self.refinement(id, "file-as")))
                    .filter(|s| !s.trim().is_empty())
                    .map(str::to_string);
                Some(Creator { name, sort })
            })
            .collect()
    }

    pub fn language(&self) -> Option<String> {
        self.first_value("language")
    }

    pub fn description(&self) -> Option<String> {
        self.first_value("description")
    }

    pub fn subjects(&self) -> Vec<String> {
        self.elements("subject")
            .filter_map(|el| el.value())
            .map(str::to_string)
            .collect()
    }

    pub fn publisher(&self) -> Option<String> {
        self.first_value("publisher")
    }

    /// The `dc:rights` statement
    pub fn copyright(&self) -> Option<String> {
        self.first_value("rights")
    }

    /// All identifiers with a recognisable scheme, as (scheme, value) pairs
    pub fn identifiers(&self) -> Vec<(String, String)> {
        self.elements("identifier")
            .filter_map(|el| {
                let raw = el.value()?;
                let declared = el
                    .attr("scheme")
                    .or_else(|| el.attr("id").and_then(|id| self.refinement(id, "identifier-type")));
                let (scheme, value) = classify_identifier(declared, raw)?;
                Some((scheme, value))
            })
            .collect()
    }

    /// Value of the identifier referenced by the package `unique-identifier`
    pub fn unique_identifier(&self) -> Option<String> {
        let reference = self.unique_identifier_ref.as_deref()?;
        self.elements("identifier")
            .find(|el| el.attr("id") == Some(reference))
            .and_then(|el| el.value())
            .map(|v| strip_prefix_ci(v, "urn:uuid:").to_string())
    }

    pub fn uuid(&self) -> Option<String> {
        self.identifier_with_scheme("uuid")
    }

    pub fn uri(&self) -> Option<String> {
        self.identifier_with_scheme("uri")
    }

    pub fn isbn(&self) -> Option<String> {
        self.identifier_with_scheme("isbn")
    }

    /// Flat series name (`calibre:series`)
    pub fn series(&self) -> Option<String> {
        self.meta_content("calibre:series")
    }

    /// Flat series position (`calibre:series_index`)
    pub fn series_index(&self) -> Option<f64> {
        self.meta_content("calibre:series_index")
            .and_then(|v| parse_index(&v))
    }

    /// Series for this book: a `belongs-to-collection` on version 3
    /// packages, otherwise the flat series metadata.
    pub fn series_or_collection(&self) -> Option<(String, f64)> {
        if self.major_version >= 3 {
            if let Some(collection) = self.collection() {
                return Some(collection);
            }
        }
        self.series()
            .map(|name| (name, self.series_index().unwrap_or(1.0)))
    }

    fn collection(&self) -> Option<(String, f64)> {
        let collections: Vec<&MetaElement> = self
            .elements("meta")
            .filter(|el| el.attr("property") == Some("belongs-to-collection"))
            .filter(|el| el.attr("refines").is_none())
            .collect();

        let is_series = |el: &MetaElement| {
            el.attr("id")
                .and_then(|id| self.refinement(id, "collection-type"))
                .map(|kind| kind == "series")
                .unwrap_or(false)
        };
        let chosen = collections
            .iter()
            .find(|el| is_series(el))
            .or_else(|| collections.first())?;

        let name = chosen.value()?.to_string();
        let index = chosen
            .attr("id")
            .and_then(|id| self.refinement(id, "group-position"))
            .and_then(parse_index)
            .unwrap_or(1.0);
        Some((name, index))
    }

    /// Creation date in canonical form
    pub fn creation_date(&self) -> Option<String> {
        let dates: Vec<&MetaElement> = self.elements("date").collect();
        let by_event = |event: &str| {
            dates
                .iter()
                .find(|d| d.attr("event").map(|e| e.eq_ignore_ascii_case(event)).unwrap_or(false))
                .and_then(|d| d.value())
        };

        let raw = if self.major_version >= 3 {
            dates.first().and_then(|d| d.value())
        } else {
            by_event("creation")
                .or_else(|| by_event("publication"))
                .or_else(|| {
                    dates
                        .iter()
                        .find(|d| d.attr("event").is_none())
                        .and_then(|d| d.value())
                })
        };
        raw.and_then(normalize_date)
    }

    /// Modification date in canonical form
    pub fn modification_date(&self) -> Option<String> {
        if let Some(modified) = self.meta_property("dcterms:modified") {
            return normalize_date(&modified);
        }
        self.elements("date")
            .find(|d| {
                d.attr("event")
                    .map(|e| e.eq_ignore_ascii_case("modification"))
                    .unwrap_or(false)
            })
            .and_then(|d| d.value())
            .and_then(normalize_date)
    }

    pub fn cover_info(&self) -> Option<CoverInfo> {
        let by_property = self
            .manifest
            .iter()
            .find(|item| item.properties.split_whitespace().any(|p| p == "cover-image"));

        let by_meta = || {
            let cover_id = self.meta_content("cover")?;
            self.manifest.iter().find(|item| item.id == cover_id)
        };

        let by_id = || {
            self.manifest.iter().find(|item| {
                matches!(item.id.as_str(), "cover" | "cover-image" | "coverimage")
                    && item.media_type.starts_with("image/")
            })
        };

        let item = by_property.or_else(by_meta).or_else(by_id)?;
        Some(CoverInfo {
            path: self.resolve(&item.href),
            media_type: item.media_type.clone(),
        })
    }

    fn resolve(&self, href: &str) -> String {
        if self.opf_dir.is_empty() {
            href.to_string()
        } else {
            format!("{}/{}", self.opf_dir, href)
        }
    }

    fn elements<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MetaElement> + 'a {
        self.metadata.iter().filter(move |el| el.name == name)
    }

    fn first_value(&self, name: &str) -> Option<String> {
        self.elements(name)
            .find_map(|el| el.value())
            .map(str::to_string)
    }

    /// `<meta name="..." content="..."/>`
    fn meta_content(&self, name: &str) -> Option<String> {
        self.elements("meta")
            .find(|el| el.attr("name") == Some(name))
            .and_then(|el| el.attr("content"))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    /// `<meta property="...">value</meta>` that refines nothing
    fn meta_property(&self, property: &str) -> Option<String> {
        self.elements("meta")
            .find(|el| el.attr("property") == Some(property) && el.attr("refines").is_none())
            .and_then(|el| el.value())
            .map(str::to_string)
    }

    /// `<meta refines="#id" property="...">value</meta>`
    fn refinement(&self, id: &str, property: &str) -> Option<&str> {
        self.elements("meta")
            .find(|el| {
                el.attr("property") == Some(property)
                    && el.attr("refines").map(|r| r.trim_start_matches('#')) == Some(id)
            })
            .and_then(|el| el.value())
    }

    fn identifier_with_scheme(&self, scheme: &str) -> Option<String> {
        self.identifiers()
            .into_iter()
            .find(|(s, _)| s == scheme)
            .map(|(_, v)| v)
    }
}

/// Work out the scheme of an identifier and strip URN-style prefixes
fn classify_identifier(declared: Option<&str>, raw: &str) -> Option<(String, String)> {
    let lower = raw.to_lowercase();
    let from_value = if lower.starts_with("urn:isbn:") || lower.starts_with("isbn:") {
        Some("isbn")
    } else if lower.starts_with("urn:uuid:") {
        Some("uuid")
    } else if lower.starts_with("http://") || lower.starts_with("https://") {
        Some("uri")
    } else if lower.starts_with("doi:") {
        Some("doi")
    } else {
        None
    };

    let scheme = match declared.map(|s| s.trim().to_lowercase()) {
        Some(s) if s == "url" => "uri".to_string(),
        Some(s) if s == "15" => "isbn".to_string(),
        Some(s) if !s.is_empty() => s,
        _ => from_value?.to_string(),
    };

    let value = match scheme.as_str() {
        "isbn" => clean_isbn(raw),
        "uuid" => strip_prefix_ci(raw, "urn:uuid:").to_string(),
        "doi" => strip_prefix_ci(raw, "doi:").to_string(),
        _ => raw.to_string(),
    };
    (!value.is_empty()).then_some((scheme, value))
}

fn clean_isbn(raw: &str) -> String {
    let raw = strip_prefix_ci(strip_prefix_ci(raw, "urn:isbn:"), "isbn:");
    raw.chars()
        .filter(|c| c.is_ascii_digit() || *c == 'X' || *c == 'x')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

fn strip_prefix_ci<'a>(value: &'a str, prefix: &str) -> &'a str {
    match value.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => &value[prefix.len()..],
        _ => value,
    }
}

fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<String, ParseError> {
    let mut entry = archive
        .by_name(name)
        .map_err(|_| ParseError::InvalidEpub(format!("Missing {}", name)))?;
    let mut content = String::new();
    entry
        .read_to_string(&mut content)
        .map_err(|e| ParseError::InvalidEpub(format!("{}: {}", name, e)))?;
    Ok(content)
}

fn local_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attributes(e: &BytesStart) -> HashMap<String, String> {
    e.attributes()
        .flatten()
        .map(|a| {
            let key = String::from_utf8_lossy(a.key.local_name().as_ref()).into_owned();
            let value = a
                .unescape_value()
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| String::from_utf8_lossy(&a.value).into_owned());
            (key, value)
        })
        .collect()
}

/// Find `<rootfile full-path="..."/>` in container.xml
fn find_rootfile(xml: &str) -> Result<String, ParseError> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"rootfile" => {
                if let Some(path) = attributes(&e).remove("full-path") {
                    return Ok(path);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ParseError::InvalidEpub(format!(
                    "Malformed {}: {}",
                    CONTAINER_PATH, e
                )))
            }
            _ => {}
        }
    }
    Err(ParseError::InvalidEpub(format!(
        "No rootfile in {}",
        CONTAINER_PATH
    )))
}

fn parse_package(xml: &str, opf_dir: String) -> Result<EpubContainer, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut version = None;
    let mut unique_identifier_ref = None;
    let mut metadata = Vec::new();
    let mut manifest = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut current: Option<MetaElement> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            ParseError::InvalidEpub(format!(
                "Malformed package document at {}: {}",
                reader.buffer_position(),
                e
            ))
        })?;

        match event {
            Event::Start(e) | Event::Empty(e) if local_name(&e) == "package" => {
                let attrs = attributes(&e);
                version = attrs.get("version").cloned();
                unique_identifier_ref = attrs.get("unique-identifier").cloned();
                stack.push("package".to_string());
            }
            Event::Start(e) => {
                let name = local_name(&e);
                if current.is_none() && stack.last().map(String::as_str) == Some("metadata") {
                    current = Some(MetaElement::from_start(&e));
                } else if name == "item" && stack.last().map(String::as_str) == Some("manifest") {
                    manifest.push(manifest_item(&e));
                }
                stack.push(name);
            }
            Event::Empty(e) => {
                let name = local_name(&e);
                if current.is_none() && stack.last().map(String::as_str) == Some("metadata") {
                    metadata.push(MetaElement::from_start(&e));
                } else if name == "item" && stack.last().map(String::as_str) == Some("manifest") {
                    manifest.push(manifest_item(&e));
                }
            }
            Event::Text(t) => {
                if let Some(el) = current.as_mut() {
                    let text = t
                        .unescape()
                        .map(|c| c.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&t).into_owned());
                    if !el.text.is_empty() {
                        el.text.push(' ');
                    }
                    el.text.push_str(&text);
                }
            }
            Event::CData(c) => {
                if let Some(el) = current.as_mut() {
                    el.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(_) => {
                stack.pop();
                if current.is_some() && stack.last().map(String::as_str) == Some("metadata") {
                    metadata.extend(current.take());
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let version = version.unwrap_or_default();
    let major_version = check_version(&version)?;

    Ok(EpubContainer {
        version,
        major_version,
        unique_identifier_ref,
        opf_dir,
        metadata,
        manifest,
    })
}

fn manifest_item(e: &BytesStart) -> ManifestItem {
    let mut attrs = attributes(e);
    ManifestItem {
        id: attrs.remove("id").unwrap_or_default(),
        href: attrs.remove("href").unwrap_or_default(),
        media_type: attrs.remove("media-type").unwrap_or_default(),
        properties: attrs.remove("properties").unwrap_or_default(),
    }
}

/// Accept only package versions 2.x and 3.x
fn check_version(version: &str) -> Result<u8, ParseError> {
    let major = version
        .trim()
        .split('.')
        .next()
        .and_then(|m| m.parse::<u8>().ok());

    match major {
        Some(major) if SUPPORTED_VERSIONS.contains(&major) => Ok(major),
        _ if version.trim().is_empty() => Err(ParseError::IncorrectVersion("missing".to_string())),
        _ => Err(ParseError::IncorrectVersion(version.trim().to_string())),
    }
}
