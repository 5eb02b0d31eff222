//! Author commands

use anyhow::{bail, Context, Result};
use bookflow_core::calibre::CalibreDb;
use serde::Serialize;
use std::path::Path;

/// Author output
#[derive(Serialize)]
struct AuthorEntry {
    id: i64,
    name: String,
    sort: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    link: String,
}

fn open_db(db: &Path) -> Result<CalibreDb> {
    CalibreDb::open(db, false).with_context(|| format!("Failed to open {}", db.display()))
}

/// List the authors of a Calibre database
pub fn authors(db: &Path, json: bool) -> Result<()> {
    let authors: Vec<AuthorEntry> = open_db(db)?
        .authors()
        .context("Failed to read authors")?
        .into_iter()
        .map(|row| AuthorEntry {
            id: row.id,
            name: row.name,
            sort: row.sort,
            link: row.link,
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&authors)?);
    } else {
        for author in &authors {
            if author.link.is_empty() {
                println!("{:>6}  {}", author.id, author.sort);
            } else {
                println!("{:>6}  {}  <{}>", author.id, author.sort, author.link);
            }
        }
        println!("{} authors", authors.len());
    }

    Ok(())
}

/// Set the external link of one author
pub fn link_author(db: &Path, author_id: i64, link: &str) -> Result<()> {
    let found = open_db(db)?
        .set_author_link(author_id, link)
        .context("Failed to update author")?;
    if !found {
        bail!("No author with id {}", author_id);
    }

    tracing::info!("Linked author {} to {}", author_id, link);
    println!("Author {} linked to {}", author_id, link);
    Ok(())
}
