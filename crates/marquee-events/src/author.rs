//! Site authors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A person credited on the site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    /// Display name, also the lookup key used by templates
    pub name: String,

    /// Email or other identifier used to derive the avatar
    #[serde(default)]
    pub email: String,

    /// Handle on the external events service
    #[serde(default, alias = "lanyrd", skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,

    /// Any other profile fields, passed through to templates
    #[serde(flatten)]
    pub profile: BTreeMap<String, serde_json::Value>,
}

impl Author {
    /// The events handle, if the author has a non-empty one.
    pub fn event_handle(&self) -> Option<&str> {
        self.handle.as_deref().filter(|h| !h.is_empty())
    }
}
