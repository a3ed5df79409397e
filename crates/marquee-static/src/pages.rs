//! The fixed set of pages a site is made of.

use std::path::Path;

use marquee_events::GroupedEvents;
use serde::{Deserialize, Serialize};

use crate::content::{Content, Job, Talk};

/// A page as declared in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSpec {
    /// Page title
    pub title: String,

    /// Shorter title for navigation menus
    #[serde(default)]
    pub menu_title: Option<String>,

    /// Template file name, relative to the source directory
    pub template: String,

    /// Meta description
    #[serde(default)]
    pub description: Option<String>,

    /// Attach the job listings
    #[serde(default)]
    pub jobs: bool,

    /// Attach the talk listings
    #[serde(default)]
    pub talks: bool,

    /// Attach the aggregated upcoming events
    #[serde(default)]
    pub upcoming_events: bool,
}

/// A page ready to render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub menu_title: Option<String>,
    pub file_basename: String,
    pub output_basename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jobs: Option<Vec<Job>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub talks: Option<Vec<Talk>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upcoming_events: Option<GroupedEvents>,
}

/// Resolve page declarations against loaded content.
///
/// Events are attached only to pages that ask for them.
pub fn build_pages(specs: &[PageSpec], content: &Content, events: &GroupedEvents) -> Vec<Page> {
    specs
        .iter()
        .map(|spec| Page {
            title: spec.title.clone(),
            menu_title: spec.menu_title.clone(),
            file_basename: spec.template.clone(),
            output_basename: output_basename(&spec.template),
            description: spec.description.clone(),
            jobs: spec.jobs.then(|| content.jobs.clone()),
            talks: spec.talks.then(|| content.talks.clone()),
            upcoming_events: spec.upcoming_events.then(|| events.clone()),
        })
        .collect()
}

/// `events-&-talks.jinja` -> `events-&-talks.html`
fn output_basename(template: &str) -> String {
    Path::new(template)
        .with_extension("html")
        .to_string_lossy()
        .into_owned()
}

/// Pages used when the configuration declares none.
pub fn default_pages() -> Vec<PageSpec> {
    vec![
        PageSpec {
            title: "Home".to_string(),
            menu_title: None,
            template: "index.jinja".to_string(),
            description: Some(
                "The innovation of a startup combined with the authority of our journalism."
                    .to_string(),
            ),
            jobs: true,
            talks: false,
            upcoming_events: false,
        },
        PageSpec {
            title: "Open Source".to_string(),
            menu_title: None,
            template: "open-source.jinja".to_string(),
            description: None,
            jobs: false,
            talks: false,
            upcoming_events: false,
        },
        PageSpec {
            title: "Events & Talks".to_string(),
            menu_title: None,
            template: "events-&-talks.jinja".to_string(),
            description: None,
            jobs: false,
            talks: true,
            upcoming_events: true,
        },
        PageSpec {
            title: "Join the Development Team".to_string(),
            menu_title: Some("Join the Team".to_string()),
            template: "join-the-team.jinja".to_string(),
            description: Some("Come join the team of developers behind the site.".to_string()),
            jobs: true,
            talks: false,
            upcoming_events: false,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_template_extension() {
        assert_eq!(output_basename("index.jinja"), "index.html");
        assert_eq!(output_basename("events-&-talks.jinja"), "events-&-talks.html");
        assert_eq!(output_basename("about"), "about.html");
    }

    #[test]
    fn attaches_events_only_where_requested() {
        let content = Content {
            jobs: vec![Job(serde_json::json!({"title": "Engineer"}))],
            ..Default::default()
        };
        let mut events = GroupedEvents::new();
        events.insert("speaking".to_string(), Vec::new());

        let pages = build_pages(&default_pages(), &content, &events);

        assert_eq!(pages.len(), 4);
        let with_events: Vec<&str> = pages
            .iter()
            .filter(|p| p.upcoming_events.is_some())
            .map(|p| p.title.as_str())
            .collect();
        assert_eq!(with_events, vec!["Events & Talks"]);
        assert_eq!(pages[0].jobs.as_ref().unwrap().len(), 1);
        assert!(pages[1].jobs.is_none());
        assert_eq!(pages[3].output_basename, "join-the-team.html");
    }

    #[test]
    fn spec_flags_default_to_off() {
        let spec: PageSpec =
            serde_json::from_str(r#"{"title": "About", "template": "about.jinja"}"#).unwrap();

        assert!(!spec.jobs && !spec.talks && !spec.upcoming_events);
        assert_eq!(spec.menu_title, None);
    }
}
