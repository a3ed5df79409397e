//! Configuration file (site.toml).

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use marquee_events::{EventSource, HttpEventSource};
use marquee_static::assets::{default_copy_rules, CopyRule, ScriptsConfig, StylesConfig};
use marquee_static::{default_pages, BuildConfig, PageSpec, Pipeline};
use serde::Deserialize;

/// Configuration file structure.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub site: SiteSettings,
    #[serde(default)]
    pub styles: StylesConfig,
    #[serde(default)]
    pub scripts: ScriptsConfig,
    #[serde(default)]
    pub events: EventsSettings,
    #[serde(default)]
    pub server: ServerSettings,
    /// Replaces the default copy rules when present
    pub copy: Option<Vec<CopyRule>>,
    /// Replaces the default pages when non-empty
    #[serde(default)]
    pub pages: Vec<PageSpec>,
}

#[derive(Debug, Deserialize)]
pub struct SiteSettings {
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default = "default_output")]
    pub output: String,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            source: default_source(),
            output: default_output(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EventsSettings {
    /// URL template with a `{handle}` placeholder
    pub url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EventsSettings {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_source() -> String {
    "src".to_string()
}
fn default_output() -> String {
    "target".to_string()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    35729
}

/// Load configuration from `path` if it exists.
/// Returns an error if the config file exists but is malformed.
pub fn load_config(path: &Path) -> Result<ConfigFile> {
    if path.exists() {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: ConfigFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        tracing::info!("Loaded config from {}", path.display());
        return Ok(config);
    }

    tracing::debug!("{} not found, using defaults", path.display());
    Ok(ConfigFile::default())
}

impl ConfigFile {
    pub fn source_dir(&self) -> PathBuf {
        PathBuf::from(&self.site.source)
    }

    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(&self.site.output)
    }

    /// Build settings for the static pipeline.
    pub fn build_config(&self, livereload: bool) -> BuildConfig {
        BuildConfig {
            source_dir: self.source_dir(),
            output_dir: self.output_dir(),
            pages: if self.pages.is_empty() {
                default_pages()
            } else {
                self.pages.clone()
            },
            styles: self.styles.clone(),
            scripts: self.scripts.clone(),
            copy: self.copy.clone().unwrap_or_else(default_copy_rules),
            livereload,
        }
    }

    /// The configured events service, if any.
    pub fn event_source(&self) -> Result<Option<Arc<dyn EventSource>>> {
        let Some(url) = &self.events.url else {
            return Ok(None);
        };

        let source = HttpEventSource::new(url.clone(), Duration::from_secs(self.events.timeout_secs))
            .context("Invalid [events] configuration")?;
        Ok(Some(Arc::new(source)))
    }

    /// A pipeline wired with the configured event source.
    pub fn pipeline(&self, livereload: bool) -> Result<Pipeline> {
        let pipeline = Pipeline::new(self.build_config(livereload));
        Ok(match self.event_source()? {
            Some(source) => pipeline.with_event_source(source),
            None => pipeline,
        })
    }
}
