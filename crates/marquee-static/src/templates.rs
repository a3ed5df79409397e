//! Template engine for rendering site pages.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use marquee_events::{parse_period, Author};
use minijinja::{path_loader, AutoEscape, Environment, Error, ErrorKind, Value};
use sha2::{Digest, Sha256};

use crate::content::{find_author, AuthorNotFound};
use crate::pages::Page;

/// Errors that can occur while rendering a page.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("{0}")]
    AuthorNotFound(AuthorNotFound),

    #[error("Template not found: {0}")]
    MissingTemplate(PathBuf),

    #[error("Failed to read template {path}: {source}")]
    ReadTemplate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to render {template}: {source}")]
    Template {
        template: String,
        #[source]
        source: minijinja::Error,
    },

    #[error("Failed to build render scope: {0}")]
    Scope(#[from] serde_json::Error),
}

/// Settings exposed to every template.
#[derive(Debug, Clone, Default)]
pub struct TemplateOptions {
    /// Include the live-reload client
    pub livereload: bool,
}

/// Template engine using minijinja.
///
/// Templates are read from the source directory; layouts and partials are
/// resolved through the same directory.
pub struct TemplateEngine {
    env: Environment<'static>,
    source_dir: PathBuf,
}

impl TemplateEngine {
    /// Create an engine rooted at `source_dir` with the site helpers registered.
    pub fn new(source_dir: &Path, authors: Vec<Author>, options: &TemplateOptions) -> Self {
        let mut env = Environment::new();
        env.set_loader(path_loader(source_dir.to_path_buf()));
        env.set_auto_escape_callback(|_| AutoEscape::Html);

        let authors: Arc<[Author]> = authors.into();
        env.add_function("find_author_by_name", move |name: String| -> Result<Value, Error> {
            match find_author(&authors, &name) {
                Ok(author) => Ok(Value::from_serialize(author)),
                Err(missing) => Err(Error::new(
                    ErrorKind::InvalidOperation,
                    missing.to_string(),
                )
                .with_source(missing)),
            }
        });
        env.add_function("format_date", format_date);
        env.add_filter("format_date", format_date);
        env.add_function("avatar_url", |email: String| avatar_url(&email));
        env.add_global("livereload", Value::from(options.livereload));

        Self {
            env,
            source_dir: source_dir.to_path_buf(),
        }
    }

    /// Render one page with the navigation list of all pages.
    pub fn render_page(&self, page: &Page, pages: &[Page]) -> Result<String, RenderError> {
        let path = self.source_dir.join(&page.file_basename);
        let source = fs::read_to_string(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                RenderError::MissingTemplate(path.clone())
            } else {
                RenderError::ReadTemplate {
                    path: path.clone(),
                    source,
                }
            }
        })?;

        let scope = page_scope(page, pages)?;

        self.env
            .render_named_str(&page.file_basename, &source, &scope)
            .map_err(|err| classify_error(&page.file_basename, err))
    }
}

/// Build the values visible to a page's template.
///
/// The shared navigation list comes first; the page's own fields are laid
/// over it and win on a name collision.
pub fn page_scope(page: &Page, pages: &[Page]) -> Result<serde_json::Value, RenderError> {
    let mut scope = serde_json::Map::new();
    scope.insert("pages".to_string(), serde_json::to_value(pages)?);

    if let serde_json::Value::Object(fields) = serde_json::to_value(page)? {
        scope.extend(fields);
    }

    Ok(serde_json::Value::Object(scope))
}

fn classify_error(template: &str, err: Error) -> RenderError {
    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        if let Some(missing) = cause.downcast_ref::<AuthorNotFound>() {
            return RenderError::AuthorNotFound(missing.clone());
        }
        source = std::error::Error::source(cause);
    }

    RenderError::Template {
        template: template.to_string(),
        source: err,
    }
}

/// Gravatar URL for an email address.
pub fn avatar_url(email: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(email.trim().to_lowercase().as_bytes());
    format!("https://www.gravatar.com/avatar/{:x}", hasher.finalize())
}

/// Format a date string with a strftime pattern.
fn format_date(value: String, pattern: String) -> Result<String, Error> {
    let datetime = parse_date(&value).ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("cannot read {:?} as a date", value),
        )
    })?;

    let mut formatted = String::new();
    write!(formatted, "{}", datetime.format(&pattern)).map_err(|_| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("invalid date pattern {:?}", pattern),
        )
    })?;

    Ok(formatted)
}

fn parse_date(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();

    if let Ok(datetime) = DateTime::parse_from_rfc3339(value) {
        return Some(datetime.naive_local());
    }
    if let Ok(datetime) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Some(datetime);
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{}-01", value), "%Y-%m-%d"))
        .ok()
        .or_else(|| parse_period(value))
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}
