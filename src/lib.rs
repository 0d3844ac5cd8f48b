//! # FastBoot Build
//!
//! Build stage that prepares a client application bundle for the FastBoot
//! server-side rendering runtime.
//!
//! Two stages run on every rebuild:
//! 1. [`FastbootConfig`] merges extension contributions into a config map, a
//!    dependency allowlist and an asset manifest, then writes `package.json`
//!    only when its bytes changed.
//! 2. [`HtmlWriter`] rewrites the entry HTML document so the manifest's assets
//!    are referenced in load order and per-namespace config is embedded.
//!
//! Output is deterministic: identical inputs produce byte-identical files.

pub mod checksum_cache;
pub mod config;
pub mod config_map;
pub mod dependencies;
pub mod extension;
pub mod fastboot_config;
pub mod html;
pub mod manifest;
pub mod utils;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use config::{AppConfig, BuildConfig, FastbootAppConfig, HostPattern, OutputPaths, PackageManifest};
pub use config_map::ConfigMap;
pub use dependencies::{DependencyAllowlist, DependencyConflict};
pub use extension::Extension;
pub use fastboot_config::{BuildReport, FastbootConfig, PACKAGE_JSON};
pub use html::writer::HtmlWriter;
pub use manifest::{Descriptor, Manifest, SCHEMA_VERSION};

// ---------------------------------------------------------------------------
// Diagnostic
// ---------------------------------------------------------------------------

/// A structured diagnostic emitted during a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
    pub context: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticLevel {
    Error,
    Warning,
    Info,
}

impl Diagnostic {
    pub fn warning(message: impl Into<String>, context: Option<String>) -> Self {
        Self {
            level: DiagnosticLevel::Warning,
            message: message.into(),
            context,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Info,
            message: message.into(),
            context: None,
        }
    }
}

// ---------------------------------------------------------------------------
// BuildError
// ---------------------------------------------------------------------------

/// Errors that abort the build. Every variant is raised before any file is
/// written.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("`fastbootConfigTree` requires a map to be returned [extension: {extension}]")]
    InvalidConfigContribution { extension: String },

    #[error("{extension} did not return the updated manifest from updateFastBootManifest hook")]
    ManifestHookFailed { extension: String },

    #[error("Could not find FastBoot dependency '{name}' in project package.json dependencies")]
    UnresolvedProjectDependency { name: String },

    #[error(
        "ember-addon.fastBootDependencies has been replaced with ember-addon.fastbootDependencies [addon: {package}]"
    )]
    LegacyDependencyKey { package: String },

    #[error("App script `{expected}` not found in HTML; the template and outputPaths.app.js have diverged")]
    MissingAppScript { expected: String },

    #[error("HTML parse error at line {line}: {message}")]
    HtmlParse { line: usize, message: String },

    #[error("Config for namespace `{namespace}` could not be serialized: {source}")]
    ConfigSerialization {
        namespace: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid host allowlist pattern `{pattern}`: {source}")]
    InvalidHostPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
