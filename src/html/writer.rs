//! Entry-document stage.
//!
//! [`HtmlWriter`] filters a file tree: the manifest's entry document is
//! rewritten, other HTML documents are dropped, everything else is copied
//! through. Rewriting an entry document:
//! 1. Marks every `<script>` whose root-relative path is not one of the
//!    expected bundles with `data-fastboot-ignore`
//! 2. Inserts a `<fastboot-script>` for each manifest file not already
//!    referenced, vendor first, immediately before the app's own script tag
//! 3. Embeds each config namespace as a percent-encoded JSON `<meta>` tag at
//!    the end of `<head>`

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::checksum_cache::write_atomic;
use crate::config::OutputPaths;
use crate::config_map::ConfigMap;
use crate::fastboot_config::PreparedBuild;
use crate::html::dom::{Document, NodeId};
use crate::html::parser;
use crate::manifest::Manifest;
use crate::utils::{fastboot_variant_path, root_url_for, strip_leading_slash, url_within};
use crate::BuildError;

/// Tag used for injected server-side bundles; browsers ignore it.
pub const FASTBOOT_SCRIPT_TAG: &str = "fastboot-script";

/// Marker telling the server runtime not to execute a script.
pub const IGNORE_ATTRIBUTE: &str = "data-fastboot-ignore";

/// Suffix of the per-namespace config meta tag name.
pub const CONFIG_META_SUFFIX: &str = "config/fastboot-environment";

// ---------------------------------------------------------------------------
// NodeRange
// ---------------------------------------------------------------------------

/// Insertion cursor bound to a fixed anchor node.
///
/// Every insert lands immediately before the anchor, so successive inserts
/// keep the order they were made in.
#[derive(Debug, Clone, Copy)]
pub struct NodeRange {
    end: NodeId,
}

impl NodeRange {
    pub fn new(anchor: NodeId) -> Self {
        Self { end: anchor }
    }

    pub fn insert_node(&self, doc: &mut Document, node: NodeId) {
        let inserted = doc.insert_before(node, self.end);
        debug_assert!(inserted, "insertion anchor must be attached");
    }

    pub fn insert_as_script_tag(&self, doc: &mut Document, src: &str) {
        let tag = doc.create_element(FASTBOOT_SCRIPT_TAG);
        if let Some(el) = doc.element_mut(tag) {
            el.set_attr("src", src);
        }
        self.insert_node(doc, tag);
    }
}

// ---------------------------------------------------------------------------
// TreeReport
// ---------------------------------------------------------------------------

/// What one [`HtmlWriter::build`] did, paths relative to the tree root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeReport {
    pub rewritten: Option<PathBuf>,
    pub copied: Vec<PathBuf>,
    pub dropped: Vec<PathBuf>,
}

// ---------------------------------------------------------------------------
// HtmlWriter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct HtmlWriter {
    manifest: Manifest,
    config: ConfigMap,
    root_url: String,
    app_js_path: String,
    expected_files: Vec<String>,
}

impl HtmlWriter {
    pub fn new(manifest: Manifest, config: ConfigMap, app_name: &str, output_paths: &OutputPaths) -> Self {
        let root_url = root_url_for(&config, app_name);
        let app_js_path = strip_leading_slash(&output_paths.app.js).to_string();
        let expected_files = vec![
            strip_leading_slash(&output_paths.vendor.js).to_string(),
            app_js_path.clone(),
            fastboot_variant_path(&app_js_path),
        ];
        Self {
            manifest,
            config,
            root_url,
            app_js_path,
            expected_files,
        }
    }

    pub fn from_prepared(prepared: &PreparedBuild, output_paths: &OutputPaths) -> Self {
        Self::new(
            prepared.manifest.clone(),
            prepared.config.clone(),
            &prepared.app_name,
            output_paths,
        )
    }

    pub fn root_url(&self) -> &str {
        &self.root_url
    }

    pub fn html_file(&self) -> &str {
        &self.manifest.html_file
    }

    /// Where a file of the input tree lands in the output tree.
    ///
    /// Non-HTML files keep their path, the entry document keeps its path, any
    /// other HTML document is dropped (`None`).
    pub fn dest_file_path<'p>(&self, relative: &'p str) -> Option<&'p str> {
        if !is_html(relative) || relative == self.manifest.html_file {
            Some(relative)
        } else {
            None
        }
    }

    fn relative_src(&self, doc: &Document, script: NodeId) -> Option<String> {
        let src = doc.element(script)?.attr("src")?;
        url_within(src, &self.root_url)
    }

    /// Rewrite one entry document.
    pub fn process_string(&self, content: &str) -> Result<String, BuildError> {
        let mut doc = parser::parse(content)?;

        let scripts = doc.elements_by_tag("script");
        let script_srcs: Vec<Option<String>> = scripts
            .iter()
            .map(|&id| self.relative_src(&doc, id))
            .collect();

        let anchor = scripts
            .iter()
            .zip(&script_srcs)
            .find(|(_, src)| src.as_deref() == Some(self.app_js_path.as_str()))
            .map(|(&id, _)| id)
            .ok_or_else(|| BuildError::MissingAppScript {
                expected: self.app_js_path.clone(),
            })?;

        for (&id, src) in scripts.iter().zip(&script_srcs) {
            let expected = src
                .as_ref()
                .is_some_and(|src| self.expected_files.contains(src));
            if !expected {
                if let Some(el) = doc.element_mut(id) {
                    el.set_attr(IGNORE_ATTRIBUTE, "");
                }
            }
        }

        let fastboot_scripts: Vec<String> = self
            .manifest
            .script_files()
            .filter_map(|src| url_within(src, &self.root_url))
            .filter(|src| !script_srcs.iter().flatten().any(|existing| existing == src))
            .collect();

        let range = NodeRange::new(anchor);
        for src in &fastboot_scripts {
            range.insert_as_script_tag(&mut doc, src);
        }
        debug!(injected = fastboot_scripts.len(), "inserted fastboot scripts");

        self.insert_config(&mut doc)?;
        Ok(doc.serialize())
    }

    fn insert_config(&self, doc: &mut Document) -> Result<(), BuildError> {
        let head = doc.ensure_head();
        let placeholder = doc.create_text("");
        doc.append_child(head, placeholder);
        let range = NodeRange::new(placeholder);

        for (namespace, config) in self.config.iter() {
            let json = serde_json::to_string(config).map_err(|source| {
                BuildError::ConfigSerialization {
                    namespace: namespace.to_string(),
                    source,
                }
            })?;

            let meta = doc.create_element("meta");
            if let Some(el) = doc.element_mut(meta) {
                el.set_attr("name", format!("{namespace}/{CONFIG_META_SUFFIX}"));
                el.set_attr("content", urlencoding::encode(&json).into_owned());
            }
            range.insert_node(doc, meta);
            let newline = doc.create_text("\n");
            range.insert_node(doc, newline);
        }
        Ok(())
    }

    /// Filter `input_dir` into `output_dir`.
    ///
    /// The entry document is parsed and rewritten before anything is written,
    /// so a failing rewrite leaves the output tree untouched.
    pub fn build(&self, input_dir: &Path, output_dir: &Path) -> Result<TreeReport, BuildError> {
        let mut report = TreeReport::default();
        let mut copies: Vec<(PathBuf, PathBuf)> = Vec::new();
        let mut entry: Option<(PathBuf, String)> = None;

        for item in WalkDir::new(input_dir).sort_by_file_name() {
            let item = item.map_err(|err| BuildError::Io(err.into()))?;
            if !item.file_type().is_file() {
                continue;
            }
            let Ok(relative) = item.path().strip_prefix(input_dir) else {
                continue;
            };
            let key = relative_key(relative);

            match self.dest_file_path(&key) {
                None => report.dropped.push(relative.to_path_buf()),
                Some(_) if is_html(&key) => {
                    let content = fs::read_to_string(item.path())?;
                    entry = Some((relative.to_path_buf(), self.process_string(&content)?));
                }
                Some(_) => copies.push((item.path().to_path_buf(), relative.to_path_buf())),
            }
        }

        for (source, relative) in copies {
            let target = output_dir.join(&relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&source, &target)?;
            report.copied.push(relative);
        }

        match entry {
            Some((relative, content)) => {
                let target = output_dir.join(&relative);
                write_atomic(&target, &content)?;
                info!(path = %target.display(), "rewrote entry document");
                report.rewritten = Some(relative);
            }
            None => warn!(
                html_file = %self.manifest.html_file,
                "entry document not found in input tree"
            ),
        }

        Ok(report)
    }
}

fn is_html(path: &str) -> bool {
    Path::new(path)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("html"))
}

/// `/`-separated path used to compare against the manifest's `htmlFile`.
fn relative_key(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
