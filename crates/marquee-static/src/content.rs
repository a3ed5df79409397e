//! Site content loaded from JSON files.

use std::fs;
use std::path::{Path, PathBuf};

use marquee_events::Author;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A job listing, passed to templates as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Job(pub serde_json::Value);

/// A past talk, passed to templates as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Talk(pub serde_json::Value);

/// Errors that can occur while loading content.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// No author carries the requested name.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Could not find author with name {name}")]
pub struct AuthorNotFound {
    pub name: String,
}

/// Everything the pages are rendered from.
#[derive(Debug, Clone, Default)]
pub struct Content {
    pub talks: Vec<Talk>,
    pub authors: Vec<Author>,
    pub jobs: Vec<Job>,
}

impl Content {
    /// Load `talks.json`, `authors.json` and `jobs.json` from a content directory.
    pub fn load(dir: &Path) -> Result<Self, ContentError> {
        let content = Self {
            talks: read_json(&dir.join("talks.json"))?,
            authors: read_json(&dir.join("authors.json"))?,
            jobs: read_json(&dir.join("jobs.json"))?,
        };

        tracing::debug!(
            "Loaded {} talks, {} authors and {} jobs from {}",
            content.talks.len(),
            content.authors.len(),
            content.jobs.len(),
            dir.display()
        );

        Ok(content)
    }

    /// Look up an author by exact name.
    pub fn find_author(&self, name: &str) -> Result<&Author, AuthorNotFound> {
        find_author(&self.authors, name)
    }
}

pub(crate) fn find_author<'a>(authors: &'a [Author], name: &str) -> Result<&'a Author, AuthorNotFound> {
    authors
        .iter()
        .find(|author| author.name == name)
        .ok_or_else(|| AuthorNotFound {
            name: name.to_string(),
        })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ContentError> {
    let raw = fs::read_to_string(path).map_err(|source| ContentError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&raw).map_err(|source| ContentError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
