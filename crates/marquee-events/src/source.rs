//! Client for the external events service.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// An event as the events service reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Event title
    pub title: String,

    /// Activity classifier: "speaking", "attending" or "tracking"
    #[serde(alias = "subsubtitle_class")]
    pub activity: String,

    /// Month-year period, e.g. "Jan 2024"
    pub month: String,

    /// Remaining fields (url, place, dates, ...)
    #[serde(flatten)]
    pub details: BTreeMap<String, serde_json::Value>,
}

/// Errors returned by an [`EventSource`].
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("No events profile found for '{handle}'")]
    NotFound { handle: String },

    #[error("Events service returned {status} for '{handle}'")]
    Status { handle: String, status: u16 },

    #[error("Invalid events handle: {0:?}")]
    InvalidHandle(String),

    #[error("Events URL template must contain {{handle}}: {0}")]
    InvalidUrl(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Malformed events response for '{handle}': {source}")]
    Decode {
        handle: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Source of a user's upcoming events.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Fetch the upcoming events for one handle.
    async fn upcoming_events(&self, handle: &str) -> Result<Vec<RawEvent>, SourceError>;
}

/// Response bodies may be a bare list or wrapped in an `events` field.
#[derive(Deserialize)]
#[serde(untagged)]
enum EventsBody {
    List(Vec<RawEvent>),
    Wrapped { events: Vec<RawEvent> },
}

/// [`EventSource`] backed by an HTTP JSON endpoint.
///
/// The endpoint is a URL template with a `{handle}` placeholder, e.g.
/// `https://events.example.com/people/{handle}/upcoming.json`.
#[derive(Debug, Clone)]
pub struct HttpEventSource {
    client: reqwest::Client,
    url_template: String,
}

impl HttpEventSource {
    /// Default per-request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Create a client for the given URL template.
    pub fn new(url_template: impl Into<String>, timeout: Duration) -> Result<Self, SourceError> {
        let url_template = url_template.into();
        if !url_template.contains("{handle}") {
            return Err(SourceError::InvalidUrl(url_template));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("marquee/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            url_template,
        })
    }

    fn url_for(&self, handle: &str) -> Result<String, SourceError> {
        let valid = !handle.is_empty()
            && !handle.chars().all(|c| c == '.')
            && handle
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(SourceError::InvalidHandle(handle.to_string()));
        }

        Ok(self.url_template.replace("{handle}", handle))
    }
}

#[async_trait]
impl EventSource for HttpEventSource {
    async fn upcoming_events(&self, handle: &str) -> Result<Vec<RawEvent>, SourceError> {
        let url = self.url_for(handle)?;
        tracing::debug!(handle, url = %url, "Fetching upcoming events");

        let response = self.client.get(&url).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound {
                handle: handle.to_string(),
            });
        }
        if !status.is_success() {
            return Err(SourceError::Status {
                handle: handle.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let events = match serde_json::from_str(&body) {
            Ok(EventsBody::List(events)) | Ok(EventsBody::Wrapped { events }) => events,
            Err(source) => {
                return Err(SourceError::Decode {
                    handle: handle.to_string(),
                    source,
                })
            }
        };

        tracing::debug!(handle, count = events.len(), "Fetched upcoming events");
        Ok(events)
    }
}
