//! Manifest stage.
//!
//! [`FastbootConfig`] is created once per build configuration and invoked on
//! every rebuild. Each [`FastbootConfig::build`]:
//! 1. Merges the host app config with extension contributions
//! 2. Resolves the dependency allowlist (first declaration wins)
//! 3. Derives the manifest and threads it through extension hooks
//! 4. Serializes the descriptor and writes `package.json` only if it changed
//!
//! Every failure is raised before the write.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::checksum_cache::ChecksumCache;
use crate::config::{AppConfig, HostPattern, OutputPaths, PackageManifest};
use crate::config_map::ConfigMap;
use crate::dependencies::{self, DependencyResolution};
use crate::extension::Extension;
use crate::manifest::{Descriptor, Manifest, DEFAULT_HTML_FILE};
use crate::{BuildError, Diagnostic};

/// Name of the descriptor file inside the output directory.
pub const PACKAGE_JSON: &str = "package.json";

// ---------------------------------------------------------------------------
// PreparedBuild
// ---------------------------------------------------------------------------

/// Everything one build computes, before serialization.
#[derive(Debug, Clone)]
pub struct PreparedBuild {
    pub app_name: String,
    pub config: ConfigMap,
    pub dependencies: DependencyResolution,
    pub manifest: Manifest,
    pub host_allowlist: Option<Vec<HostPattern>>,
}

impl PreparedBuild {
    pub fn descriptor(&self) -> Descriptor {
        let allowlist = &self.dependencies.allowlist;
        Descriptor::new(
            &self.app_name,
            allowlist.versions().clone(),
            allowlist.modules().to_vec(),
            self.host_allowlist.as_deref(),
            self.manifest.clone(),
        )
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.dependencies
            .conflicts
            .iter()
            .map(|conflict| conflict.to_diagnostic())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// BuildReport
// ---------------------------------------------------------------------------

/// Result of one [`FastbootConfig::build`] call.
#[derive(Debug, Clone)]
pub struct BuildReport {
    /// Path of the descriptor file.
    pub path: PathBuf,
    /// Whether the file was written (false when content was unchanged).
    pub written: bool,
    pub prepared: PreparedBuild,
    pub diagnostics: Vec<Diagnostic>,
}

// ---------------------------------------------------------------------------
// FastbootConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FastbootConfig {
    app_config: AppConfig,
    output_paths: OutputPaths,
    project: PackageManifest,
    extensions: Vec<Extension>,
    checksums: ChecksumCache,
}

impl FastbootConfig {
    pub fn new(
        app_config: AppConfig,
        output_paths: OutputPaths,
        project: PackageManifest,
        extensions: Vec<Extension>,
    ) -> Self {
        Self {
            app_config,
            output_paths,
            project,
            extensions,
            checksums: ChecksumCache::new(),
        }
    }

    pub fn app_name(&self) -> &str {
        &self.app_config.module_prefix
    }

    pub fn output_paths(&self) -> &OutputPaths {
        &self.output_paths
    }

    pub fn checksums(&self) -> &ChecksumCache {
        &self.checksums
    }

    /// Replace the project's package metadata between rebuilds.
    pub fn set_project(&mut self, project: PackageManifest) {
        self.project = project;
    }

    pub fn set_extensions(&mut self, extensions: Vec<Extension>) {
        self.extensions = extensions;
    }

    pub fn html_file(&self) -> &str {
        self.app_config.html_file().unwrap_or(DEFAULT_HTML_FILE)
    }

    /// Host config first, then each extension's contribution merged in.
    pub fn merge_config(&self) -> Result<ConfigMap, BuildError> {
        let mut config = ConfigMap::new();
        config.insert(self.app_name(), self.app_config.to_value()?);

        for extension in &self.extensions {
            if let Some(contribution) = extension.contribute_config()? {
                debug!(
                    extension = extension.name(),
                    namespaces = contribution.len(),
                    "merging config contribution"
                );
                config.merge(contribution);
            }
        }
        Ok(config)
    }

    pub fn resolve_dependencies(&self) -> Result<DependencyResolution, BuildError> {
        let resolution = dependencies::resolve(&self.extensions, &self.project)?;
        for conflict in &resolution.conflicts {
            warn!("{}", conflict.message());
        }
        Ok(resolution)
    }

    pub fn build_manifest(&self) -> Result<Manifest, BuildError> {
        Manifest::from_output_paths(&self.output_paths, self.html_file())
            .rewrite_with(&self.extensions)
    }

    /// Compute the full build state without touching the filesystem.
    pub fn prepare(&self) -> Result<PreparedBuild, BuildError> {
        Ok(PreparedBuild {
            app_name: self.app_name().to_string(),
            config: self.merge_config()?,
            dependencies: self.resolve_dependencies()?,
            manifest: self.build_manifest()?,
            host_allowlist: self.app_config.host_allowlist().map(<[HostPattern]>::to_vec),
        })
    }

    /// Serialized descriptor for the current inputs.
    pub fn to_json_string(&self) -> Result<String, BuildError> {
        self.prepare()?.descriptor().to_json_string()
    }

    /// Run one build into `out_dir`.
    pub fn build(&self, out_dir: &Path) -> Result<BuildReport, BuildError> {
        let prepared = self.prepare()?;
        let content = prepared.descriptor().to_json_string()?;
        let path = out_dir.join(PACKAGE_JSON);

        let written = self.checksums.write_if_changed(&path, &content)?;
        let mut diagnostics = prepared.diagnostics();
        if written {
            info!(path = %path.display(), bytes = content.len(), "wrote descriptor");
            diagnostics.push(Diagnostic::info(format!("Written to {}", path.display())));
        } else {
            debug!(path = %path.display(), "descriptor unchanged, skipping write");
        }

        Ok(BuildReport {
            path,
            written,
            prepared,
            diagnostics,
        })
    }
}
