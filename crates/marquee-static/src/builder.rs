//! Build tasks and the pipeline that runs them.

use std::fmt;
use std::fs;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use marquee_events::{aggregate, AggregateError, Author, EventSource, GroupedEvents};
use rayon::prelude::*;

use crate::assets::{default_copy_rules, AssetPipeline, CopyRule, ScriptsConfig, StylesConfig};
use crate::content::{Content, ContentError};
use crate::pages::{build_pages, default_pages, Page, PageSpec};
use crate::templates::{RenderError, TemplateEngine, TemplateOptions};

/// Configuration for building a site.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Source directory (templates, content, css, js, images)
    pub source_dir: PathBuf,

    /// Output directory
    pub output_dir: PathBuf,

    /// Pages to render, in navigation order
    pub pages: Vec<PageSpec>,

    /// Stylesheet settings
    pub styles: StylesConfig,

    /// Script bundle settings
    pub scripts: ScriptsConfig,

    /// Static files to copy
    pub copy: Vec<CopyRule>,

    /// Render the live-reload client into pages
    pub livereload: bool,
}

impl BuildConfig {
    /// Directory holding the JSON content files.
    pub fn content_dir(&self) -> PathBuf {
        self.source_dir.join("content")
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("src"),
            output_dir: PathBuf::from("target"),
            pages: default_pages(),
            styles: StylesConfig::default(),
            scripts: ScriptsConfig::default(),
            copy: default_copy_rules(),
            livereload: false,
        }
    }
}

/// Result of a full build.
#[derive(Debug)]
pub struct BuildResult {
    /// Number of pages written
    pub pages: usize,

    /// Number of static files copied
    pub assets: usize,

    /// Total build time in milliseconds
    pub duration_ms: u64,

    /// Output directory
    pub output_dir: PathBuf,
}

/// Errors that can occur during build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Failed to read {0}")]
    ReadError(String),

    #[error("Failed to write output: {0}")]
    WriteError(String),

    #[error("Failed to compile styles: {0}")]
    StyleError(String),

    #[error(transparent)]
    Content(#[from] ContentError),

    #[error(transparent)]
    Events(#[from] AggregateError),

    #[error("Failed to render page '{page}': {source}")]
    Render {
        page: String,
        #[source]
        source: RenderError,
    },
}

/// A named build step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    CompileStyles,
    BundleScripts,
    CopyAssets,
    FetchEvents,
    GeneratePages,
}

impl Task {
    /// Name used on the command line and in logs.
    pub fn name(self) -> &'static str {
        match self {
            Task::CompileStyles => "compile-styles",
            Task::BundleScripts => "bundle-scripts",
            Task::CopyAssets => "copy-assets",
            Task::FetchEvents => "fetch-events",
            Task::GeneratePages => "generate-pages",
        }
    }

    /// Tasks whose output this task consumes.
    pub fn dependencies(self) -> &'static [Task] {
        match self {
            Task::GeneratePages => &[Task::FetchEvents],
            _ => &[],
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Runs build tasks against one configuration.
pub struct Pipeline {
    config: BuildConfig,
    events: Option<Arc<dyn EventSource>>,
}

impl Pipeline {
    /// Create a pipeline without an event source; the events page gets no events.
    pub fn new(config: BuildConfig) -> Self {
        Self {
            config,
            events: None,
        }
    }

    /// Use `source` to fetch upcoming events.
    pub fn with_event_source(mut self, source: Arc<dyn EventSource>) -> Self {
        self.events = Some(source);
        self
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Run a single task, logging its start and duration.
    pub async fn run(&self, task: Task) -> Result<(), BuildError> {
        match task {
            Task::CompileStyles => {
                timed(task, async { self.compile_styles() }).await?;
            }
            Task::BundleScripts => {
                timed(task, async { self.bundle_scripts() }).await?;
            }
            Task::CopyAssets => {
                timed(task, async { self.copy_assets() }).await?;
            }
            Task::FetchEvents => {
                let events = timed(task, self.fetch_events()).await?;
                for (activity, list) in &events {
                    tracing::info!("{}: {} events", activity, list.len());
                }
            }
            Task::GeneratePages => {
                timed(task, self.generate_pages()).await?;
            }
        }
        Ok(())
    }

    /// Run every default task in order, stopping at the first failure.
    pub async fn run_default(&self) -> Result<BuildResult, BuildError> {
        let start = Instant::now();

        timed(Task::CompileStyles, async { self.compile_styles() }).await?;
        timed(Task::BundleScripts, async { self.bundle_scripts() }).await?;
        let assets = timed(Task::CopyAssets, async { self.copy_assets() }).await?;
        let pages = timed(Task::GeneratePages, self.generate_pages()).await?;

        Ok(BuildResult {
            pages,
            assets,
            duration_ms: start.elapsed().as_millis() as u64,
            output_dir: self.config.output_dir.clone(),
        })
    }

    /// Compile the entry stylesheet. Returns the output path.
    pub fn compile_styles(&self) -> Result<PathBuf, BuildError> {
        let styles = &self.config.styles;
        let source_path = self.config.source_dir.join(&styles.entry);
        let css = fs::read_to_string(&source_path)
            .map_err(|e| BuildError::ReadError(format!("{}: {}", source_path.display(), e)))?;

        let compiled = AssetPipeline::compile_css(
            &css,
            &source_path.to_string_lossy(),
            &styles.targets,
            styles.minify,
        )
        .map_err(BuildError::StyleError)?;

        let output_path = self.config.output_dir.join(&styles.output);
        write_file(&output_path, &compiled)?;
        tracing::debug!("Compiled {} -> {}", source_path.display(), output_path.display());

        Ok(output_path)
    }

    /// Bundle script modules into one file. Returns the number of modules bundled.
    pub fn bundle_scripts(&self) -> Result<usize, BuildError> {
        let modules = AssetPipeline::script_modules(&self.config.source_dir, &self.config.scripts)
            .map_err(BuildError::ReadError)?;

        let sources = modules
            .iter()
            .map(|path| {
                let code = fs::read_to_string(path)
                    .map_err(|e| BuildError::ReadError(format!("{}: {}", path.display(), e)))?;
                let name = path
                    .strip_prefix(&self.config.source_dir)
                    .unwrap_or(path)
                    .display()
                    .to_string();
                Ok((name, code))
            })
            .collect::<Result<Vec<_>, BuildError>>()?;

        let output_path = self.config.output_dir.join(&self.config.scripts.output);
        write_file(&output_path, &AssetPipeline::bundle_scripts(&sources))?;

        Ok(sources.len())
    }

    /// Copy static files. Returns the number of files copied.
    pub fn copy_assets(&self) -> Result<usize, BuildError> {
        AssetPipeline::copy_assets(&self.config.source_dir, &self.config.output_dir, &self.config.copy)
            .map_err(BuildError::WriteError)
    }

    /// Load content and aggregate upcoming events for its authors.
    pub async fn fetch_events(&self) -> Result<GroupedEvents, BuildError> {
        let content = Content::load(&self.config.content_dir())?;
        self.aggregate(&content.authors).await
    }

    async fn aggregate(&self, authors: &[Author]) -> Result<GroupedEvents, BuildError> {
        match &self.events {
            Some(source) => Ok(aggregate(source.as_ref(), authors).await?),
            None => {
                tracing::warn!("No event source configured; upcoming events will be empty");
                Ok(GroupedEvents::new())
            }
        }
    }

    /// Fetch events, then render every page. Returns the number of pages written.
    ///
    /// Nothing is rendered if fetching events fails.
    pub async fn generate_pages(&self) -> Result<usize, BuildError> {
        let content = Content::load(&self.config.content_dir())?;
        let events = self.aggregate(&content.authors).await?;
        let pages = build_pages(&self.config.pages, &content, &events);

        self.render_all(&pages, &content.authors)
    }

    /// Render and write every page.
    ///
    /// Each page is attempted; a page that fails is not written, and the
    /// first failure is returned once all pages have been tried.
    pub fn render_all(&self, pages: &[Page], authors: &[Author]) -> Result<usize, BuildError> {
        fs::create_dir_all(&self.config.output_dir)
            .map_err(|e| BuildError::WriteError(e.to_string()))?;

        let engine = TemplateEngine::new(
            &self.config.source_dir,
            authors.to_vec(),
            &TemplateOptions {
                livereload: self.config.livereload,
            },
        );

        let results: Vec<Result<(), BuildError>> = pages
            .par_iter()
            .map(|page| self.write_page(&engine, page, pages))
            .collect();

        let mut written = 0;
        let mut first_error = None;
        for result in results {
            match result {
                Ok(()) => written += 1,
                Err(e) => {
                    tracing::error!("{}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(written),
        }
    }

    fn write_page(&self, engine: &TemplateEngine, page: &Page, pages: &[Page]) -> Result<(), BuildError> {
        let html = engine
            .render_page(page, pages)
            .map_err(|source| BuildError::Render {
                page: page.title.clone(),
                source,
            })?;

        let output_path = self.config.output_dir.join(&page.output_basename);
        fs::write(&output_path, html)
            .map_err(|e| BuildError::WriteError(format!("{}: {}", output_path.display(), e)))?;
        tracing::debug!("Wrote {}", output_path.display());

        Ok(())
    }
}

async fn timed<T, F>(task: Task, work: F) -> Result<T, BuildError>
where
    F: Future<Output = Result<T, BuildError>>,
{
    tracing::info!("Starting '{}'...", task);
    let start = Instant::now();

    let result = work.await;
    let elapsed = start.elapsed().as_millis();
    match &result {
        Ok(_) => tracing::info!("Finished '{}' after {}ms", task, elapsed),
        Err(e) => tracing::error!("'{}' errored after {}ms: {}", task, elapsed, e),
    }

    result
}

fn write_file(path: &std::path::Path, contents: &str) -> Result<(), BuildError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| BuildError::WriteError(e.to_string()))?;
    }
    fs::write(path, contents).map_err(|e| BuildError::WriteError(format!("{}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use marquee_events::{RawEvent, SourceError};
    use std::collections::BTreeMap;
    use std::path::Path;
    use tempfile::tempdir;

    struct FixedSource;

    #[async_trait]
    impl EventSource for FixedSource {
        async fn upcoming_events(&self, handle: &str) -> Result<Vec<RawEvent>, SourceError> {
            let solo = if handle == "ada" { "Conf A" } else { "Conf B" };
            Ok(vec![
                RawEvent {
                    title: solo.to_string(),
                    activity: "speaking".to_string(),
                    month: "Jan 2024".to_string(),
                    details: BTreeMap::new(),
                },
                RawEvent {
                    title: "Shared".to_string(),
                    activity: "attending".to_string(),
                    month: "Feb 2024".to_string(),
                    details: BTreeMap::new(),
                },
            ])
        }
    }

    struct DownSource;

    #[async_trait]
    impl EventSource for DownSource {
        async fn upcoming_events(&self, handle: &str) -> Result<Vec<RawEvent>, SourceError> {
            Err(SourceError::Status {
                handle: handle.to_string(),
                status: 502,
            })
        }
    }

    const EVENTS_TEMPLATE: &str = "{% for activity, events in upcoming_events | items %}[{{ activity }}]{% for e in events %}{{ e.title }}:{% for u in e.users %}{{ u.name }},{% endfor %}{% endfor %}{% endfor %}";

    fn write_site(src: &Path, index: &str) {
        fs::create_dir_all(src.join("content")).unwrap();
        fs::create_dir_all(src.join("css")).unwrap();
        fs::create_dir_all(src.join("js/lib")).unwrap();
        fs::create_dir_all(src.join("images")).unwrap();
        fs::write(
            src.join("content/authors.json"),
            r#"[
                {"name": "Ada", "email": "ada@example.com", "handle": "ada"},
                {"name": "Grace", "email": "grace@example.com", "lanyrd": "grace"},
                {"name": "Linus", "email": "linus@example.com"}
            ]"#,
        )
        .unwrap();
        fs::write(src.join("content/talks.json"), r#"[{"title": "Scaling", "author": "Ada"}]"#).unwrap();
        fs::write(src.join("content/jobs.json"), r#"[{"title": "Engineer"}]"#).unwrap();
        fs::write(src.join("index.jinja"), index).unwrap();
        fs::write(src.join("open-source.jinja"), "<h1>{{ title }}</h1>").unwrap();
        fs::write(src.join("events-&-talks.jinja"), EVENTS_TEMPLATE).unwrap();
        fs::write(src.join("join-the-team.jinja"), "{{ menu_title }}: {{ jobs | length }}").unwrap();
        fs::write(src.join("css/main.css"), ".a { display: flex; }").unwrap();
        fs::write(src.join("js/app.js"), "start();").unwrap();
        fs::write(src.join("js/util.js"), "function start() {}").unwrap();
        fs::write(src.join("js/lib/vendor.js"), "// vendor").unwrap();
        fs::write(src.join("images/logo.svg"), "<svg/>").unwrap();
    }

    fn config(root: &Path) -> BuildConfig {
        BuildConfig {
            source_dir: root.join("src"),
            output_dir: root.join("target"),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn builds_whole_site() {
        let temp = tempdir().unwrap();
        write_site(&temp.path().join("src"), "{% for p in pages %}{{ p.output_basename }} {% endfor %}");

        let pipeline = Pipeline::new(config(temp.path())).with_event_source(Arc::new(FixedSource));
        let result = pipeline.run_default().await.unwrap();

        let out = temp.path().join("target");
        assert_eq!(result.pages, 4);
        assert_eq!(result.assets, 2);
        assert!(out.join("css/main.css").exists());
        assert!(out.join("images/logo.svg").exists());
        assert!(out.join("js/lib/vendor.js").exists());

        let bundle = fs::read_to_string(out.join("js/bundle.js")).unwrap();
        assert!(bundle.find("function start").unwrap() < bundle.find("start();").unwrap());

        let index = fs::read_to_string(out.join("index.html")).unwrap();
        assert!(index.contains("events-&amp;-talks.html"));
        let team = fs::read_to_string(out.join("join-the-team.html")).unwrap();
        assert_eq!(team, "Join the Team: 1");
    }

    #[tokio::test]
    async fn attaches_events_to_events_page() {
        let temp = tempdir().unwrap();
        write_site(&temp.path().join("src"), "home");

        let pipeline = Pipeline::new(config(temp.path())).with_event_source(Arc::new(FixedSource));
        pipeline.run(Task::GeneratePages).await.unwrap();

        let html = fs::read_to_string(temp.path().join("target/events-&-talks.html")).unwrap();
        assert_eq!(html, "[attending]Shared:Ada,Grace,[speaking]Conf A:Ada,Conf B:Grace,");
    }

    #[tokio::test]
    async fn failed_fetch_blocks_generation() {
        let temp = tempdir().unwrap();
        write_site(&temp.path().join("src"), "home");

        let pipeline = Pipeline::new(config(temp.path())).with_event_source(Arc::new(DownSource));
        let err = pipeline.run(Task::GeneratePages).await.unwrap_err();

        assert!(matches!(err, BuildError::Events(AggregateError::Source { .. })));
        assert!(!temp.path().join("target/index.html").exists());
    }

    #[tokio::test]
    async fn missing_author_fails_only_that_page() {
        let temp = tempdir().unwrap();
        write_site(&temp.path().join("src"), "{{ find_author_by_name('Nobody').email }}");

        let pipeline = Pipeline::new(config(temp.path()));
        let err = pipeline.generate_pages().await.unwrap_err();

        assert!(matches!(
            err,
            BuildError::Render { source: RenderError::AuthorNotFound(_), .. }
        ));
        let out = temp.path().join("target");
        assert!(!out.join("index.html").exists());
        assert!(out.join("open-source.html").exists());
    }

    #[tokio::test]
    async fn renders_without_event_source() {
        let temp = tempdir().unwrap();
        write_site(&temp.path().join("src"), "home");

        let pipeline = Pipeline::new(config(temp.path()));
        let written = pipeline.generate_pages().await.unwrap();

        assert_eq!(written, 4);
        let html = fs::read_to_string(temp.path().join("target/events-&-talks.html")).unwrap();
        assert_eq!(html, "");
    }

    #[tokio::test]
    async fn fetch_events_groups_by_activity() {
        let temp = tempdir().unwrap();
        write_site(&temp.path().join("src"), "home");

        let pipeline = Pipeline::new(config(temp.path())).with_event_source(Arc::new(FixedSource));
        let events = pipeline.fetch_events().await.unwrap();

        assert_eq!(events.keys().collect::<Vec<_>>(), vec!["attending", "speaking"]);
        assert_eq!(events["attending"][0].users.len(), 2);
    }

    #[test]
    fn generate_depends_on_fetch() {
        assert_eq!(Task::GeneratePages.dependencies(), &[Task::FetchEvents]);
        assert!(Task::CompileStyles.dependencies().is_empty());
        assert_eq!(Task::BundleScripts.to_string(), "bundle-scripts");
    }
}
