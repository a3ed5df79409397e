//! Asset pipeline for stylesheets, scripts and static files.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use lightningcss::stylesheet::{MinifyOptions, ParserFlags, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use serde::Deserialize;
use walkdir::WalkDir;

/// Stylesheet compilation settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StylesConfig {
    /// Entry stylesheet, relative to the source directory
    pub entry: PathBuf,
    /// Output path, relative to the output directory
    pub output: PathBuf,
    /// Minify the compiled stylesheet
    pub minify: bool,
    /// Oldest supported major version per browser, e.g. `safari = 7`
    pub targets: BTreeMap<String, u32>,
}

impl Default for StylesConfig {
    fn default() -> Self {
        Self {
            entry: PathBuf::from("css/main.css"),
            output: PathBuf::from("css/main.css"),
            minify: true,
            targets: BTreeMap::from([("safari".to_string(), 7)]),
        }
    }
}

/// Script bundling settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScriptsConfig {
    /// Entry module, relative to the source directory; bundled last
    pub entry: PathBuf,
    /// Bundle path, relative to the output directory
    pub output: PathBuf,
    /// Explicit module order; defaults to the entry's siblings, sorted, then the entry
    pub modules: Option<Vec<PathBuf>>,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            entry: PathBuf::from("js/app.js"),
            output: PathBuf::from("js/bundle.js"),
            modules: None,
        }
    }
}

/// Copy every file under `from` to `to`, optionally filtered by extension.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CopyRule {
    /// Directory relative to the source directory
    pub from: PathBuf,
    /// Directory relative to the output directory
    pub to: PathBuf,
    /// File extensions to copy; empty copies everything
    #[serde(default)]
    pub extensions: Vec<String>,
}

impl CopyRule {
    fn matches(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        self.extensions.iter().any(|allowed| allowed == ext)
    }
}

/// Copy rules matching the site's source layout.
pub fn default_copy_rules() -> Vec<CopyRule> {
    vec![
        CopyRule {
            from: PathBuf::from("images"),
            to: PathBuf::from("images"),
            extensions: vec![],
        },
        CopyRule {
            from: PathBuf::from("js/lib"),
            to: PathBuf::from("js/lib"),
            extensions: vec!["js".to_string()],
        },
        CopyRule {
            from: PathBuf::from("enhanced-views"),
            to: PathBuf::from("enhanced-views"),
            extensions: vec!["jinja".to_string()],
        },
    ]
}

/// Asset pipeline utilities.
pub struct AssetPipeline;

impl AssetPipeline {
    /// Compile a stylesheet with lightningcss, adding vendor prefixes for the targets.
    pub fn compile_css(
        css: &str,
        filename: &str,
        targets: &BTreeMap<String, u32>,
        minify: bool,
    ) -> Result<String, String> {
        let targets = if targets.is_empty() {
            Targets::default()
        } else {
            Targets::from(browser_targets(targets)?)
        };

        let mut stylesheet = StyleSheet::parse(
            css,
            ParserOptions {
                filename: filename.to_string(),
                flags: ParserFlags::NESTING,
                ..Default::default()
            },
        )
        .map_err(|e| format!("CSS parse error: {}", e))?;

        stylesheet
            .minify(MinifyOptions {
                targets,
                ..Default::default()
            })
            .map_err(|e| format!("CSS minify error: {}", e))?;

        let compiled = stylesheet
            .to_css(PrinterOptions {
                minify,
                targets,
                ..Default::default()
            })
            .map_err(|e| format!("CSS print error: {}", e))?;

        Ok(compiled.code)
    }

    /// Concatenate script modules into one bundle, in the given order.
    pub fn bundle_scripts(modules: &[(String, String)]) -> String {
        let mut bundle = String::new();
        for (name, code) in modules {
            bundle.push_str(&format!("// {}\n", name));
            bundle.push_str(code.trim_end());
            bundle.push_str("\n;\n");
        }
        bundle
    }

    /// Resolve the ordered list of script modules to bundle.
    pub fn script_modules(source_dir: &Path, config: &ScriptsConfig) -> Result<Vec<PathBuf>, String> {
        if let Some(modules) = &config.modules {
            return Ok(modules.iter().map(|m| source_dir.join(m)).collect());
        }

        let entry = source_dir.join(&config.entry);
        let dir = entry.parent().unwrap_or(source_dir);

        let mut siblings: Vec<PathBuf> = fs::read_dir(dir)
            .map_err(|e| format!("{}: {}", dir.display(), e))?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().and_then(|e| e.to_str()) == Some("js"))
            .filter(|p| *p != entry)
            .collect();
        siblings.sort();
        siblings.push(entry);

        Ok(siblings)
    }

    /// Copy the files selected by `rules`. Returns the number of files copied.
    pub fn copy_assets(source_dir: &Path, output_dir: &Path, rules: &[CopyRule]) -> Result<usize, String> {
        let mut copied = 0;

        for rule in rules {
            let from = source_dir.join(&rule.from);
            if !from.exists() {
                tracing::debug!("Nothing to copy from {}", from.display());
                continue;
            }

            for entry in WalkDir::new(&from)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let path = entry.path();
                if !path.is_file() || !rule.matches(path) {
                    continue;
                }

                let relative = path.strip_prefix(&from).unwrap_or(path);
                let dest = output_dir.join(&rule.to).join(relative);
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent).map_err(|e| format!("{}: {}", parent.display(), e))?;
                }
                fs::copy(path, &dest).map_err(|e| format!("{}: {}", path.display(), e))?;
                copied += 1;
            }
        }

        Ok(copied)
    }
}

/// Map `browser -> major version` pairs onto lightningcss targets.
fn browser_targets(targets: &BTreeMap<String, u32>) -> Result<Browsers, String> {
    let mut browsers = Browsers::default();

    for (name, major) in targets {
        let version = Some(major << 16);
        match name.as_str() {
            "android" => browsers.android = version,
            "chrome" => browsers.chrome = version,
            "edge" => browsers.edge = version,
            "firefox" => browsers.firefox = version,
            "ie" => browsers.ie = version,
            "ios_saf" | "ios" => browsers.ios_saf = version,
            "opera" => browsers.opera = version,
            "safari" => browsers.safari = version,
            "samsung" => browsers.samsung = version,
            other => return Err(format!("Unknown browser target: {}", other)),
        }
    }

    Ok(browsers)
}
