//! Static site generator for marquee sites.
//!
//! Renders the site's pages from JSON content through minijinja templates,
//! and runs the stylesheet, script and asset tasks that sit beside them.

pub mod assets;
pub mod builder;
pub mod content;
pub mod pages;
pub mod templates;

pub use builder::{BuildConfig, BuildError, BuildResult, Pipeline, Task};
pub use content::{AuthorNotFound, Content, ContentError, Job, Talk};
pub use pages::{build_pages, default_pages, Page, PageSpec};
pub use templates::{RenderError, TemplateEngine, TemplateOptions};
