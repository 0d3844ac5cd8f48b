//! Build inputs.
//!
//! Everything the build consumes arrives as JSON from the host build tool:
//! the host app's environment config, output-path naming, the project's own
//! `package.json` and the packages of contributing extensions.

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config_map::ConfigMap;
use crate::extension::Extension;
use crate::BuildError;

// ---------------------------------------------------------------------------
// Host App Config
// ---------------------------------------------------------------------------

/// The host application's environment config.
///
/// Keys other than the ones modelled here are carried through untouched, so
/// the host namespace's entry in the [`ConfigMap`] is the complete config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub module_prefix: String,
    #[serde(rename = "rootURL", default, skip_serializing_if = "Option::is_none")]
    pub root_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fastboot: Option<FastbootAppConfig>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AppConfig {
    pub fn new(module_prefix: impl Into<String>) -> Self {
        Self {
            module_prefix: module_prefix.into(),
            root_url: None,
            fastboot: None,
            extra: Map::new(),
        }
    }

    pub fn with_root_url(mut self, root_url: impl Into<String>) -> Self {
        self.root_url = Some(root_url.into());
        self
    }

    pub fn with_fastboot(mut self, fastboot: FastbootAppConfig) -> Self {
        self.fastboot = Some(fastboot);
        self
    }

    /// The config object stored under the host namespace.
    pub fn to_value(&self) -> Result<Value, BuildError> {
        serde_json::to_value(self).map_err(|source| BuildError::ConfigSerialization {
            namespace: self.module_prefix.clone(),
            source,
        })
    }

    pub fn html_file(&self) -> Option<&str> {
        self.fastboot.as_ref()?.html_file.as_deref()
    }

    pub fn host_allowlist(&self) -> Option<&[HostPattern]> {
        self.fastboot.as_ref()?.host_allowlist.as_deref()
    }
}

/// The `fastboot` section of the host app config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FastbootAppConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_file: Option<String>,
    #[serde(
        rename = "hostAllowList",
        alias = "hostAllowlist",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub host_allowlist: Option<Vec<HostPattern>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Host Allowlist
// ---------------------------------------------------------------------------

/// One entry of the host allowlist: a literal hostname or a regex.
///
/// In JSON a regex is written delimited by slashes (`"/localhost:\\d+/"`),
/// which is also how it is written back into the descriptor.
#[derive(Clone)]
pub enum HostPattern {
    Literal(String),
    Pattern(Regex),
}

impl HostPattern {
    pub fn literal(host: impl Into<String>) -> Self {
        Self::Literal(host.into())
    }

    pub fn pattern(source: &str) -> Result<Self, BuildError> {
        Regex::new(source)
            .map(Self::Pattern)
            .map_err(|source_err| BuildError::InvalidHostPattern {
                pattern: source.to_string(),
                source: source_err,
            })
    }

    /// Parse the JSON form: `/.../` is a regex, anything else a literal.
    pub fn parse(raw: &str) -> Result<Self, BuildError> {
        match raw
            .strip_prefix('/')
            .and_then(|rest| rest.strip_suffix('/'))
        {
            Some(source) if raw.len() > 1 => Self::pattern(source),
            _ => Ok(Self::literal(raw)),
        }
    }

    /// Descriptor form of the entry.
    pub fn normalized(&self) -> String {
        match self {
            Self::Literal(host) => host.clone(),
            Self::Pattern(regex) => format!("/{}/", regex.as_str()),
        }
    }
}

impl fmt::Debug for HostPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(host) => f.debug_tuple("Literal").field(host).finish(),
            Self::Pattern(regex) => f.debug_tuple("Pattern").field(&regex.as_str()).finish(),
        }
    }
}

impl PartialEq for HostPattern {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Literal(a), Self::Literal(b)) => a == b,
            (Self::Pattern(a), Self::Pattern(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

impl Serialize for HostPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.normalized())
    }
}

impl<'de> Deserialize<'de> for HostPattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Output Paths
// ---------------------------------------------------------------------------

/// Output-path naming of the compiled bundles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputPaths {
    pub app: AssetPaths,
    pub vendor: AssetPaths,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetPaths {
    pub js: String,
}

impl OutputPaths {
    pub fn new(app_js: impl Into<String>, vendor_js: impl Into<String>) -> Self {
        Self {
            app: AssetPaths { js: app_js.into() },
            vendor: AssetPaths {
                js: vendor_js.into(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Package Metadata
// ---------------------------------------------------------------------------

/// The subset of a `package.json` the build reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<BTreeMap<String, String>>,
    /// Project-level allowlisted modules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fastboot_dependencies: Option<Vec<String>>,
    #[serde(rename = "ember-addon", default, skip_serializing_if = "Option::is_none")]
    pub ember_addon: Option<AddonMetadata>,
}

/// The `ember-addon` section of an extension's `package.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddonMetadata {
    #[serde(rename = "fastbootDependencies", default, skip_serializing_if = "Option::is_none")]
    pub fastboot_dependencies: Option<Vec<String>>,
    #[serde(rename = "fastBootDependencies", default, skip_serializing_if = "Option::is_none")]
    pub legacy_fastboot_dependencies: Option<Vec<String>>,
}

impl PackageManifest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_dependency(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.dependencies
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), version.into());
        self
    }

    pub fn with_fastboot_dependencies<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fastboot_dependencies = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_addon_fastboot_dependencies<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ember_addon
            .get_or_insert_with(AddonMetadata::default)
            .fastboot_dependencies = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn dependency_version(&self, name: &str) -> Option<&str> {
        self.dependencies.as_ref()?.get(name).map(String::as_str)
    }

    /// Modules this package allowlists as an extension.
    ///
    /// The pre-rename `fastBootDependencies` key is rejected so it cannot be
    /// silently ignored.
    pub fn addon_fastboot_dependencies(&self) -> Result<&[String], BuildError> {
        let Some(addon) = &self.ember_addon else {
            return Ok(&[]);
        };
        if addon.legacy_fastboot_dependencies.is_some() {
            return Err(BuildError::LegacyDependencyKey {
                package: self.name.clone(),
            });
        }
        Ok(addon.fastboot_dependencies.as_deref().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Build Config (binary payload)
// ---------------------------------------------------------------------------

/// The JSON payload the `fastboot-build` binary reads from stdin.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BuildConfig {
    pub app_config: AppConfig,
    pub output_paths: OutputPaths,
    #[serde(default)]
    pub project: PackageManifest,
    #[serde(default)]
    pub extensions: Vec<ExtensionConfig>,
}

/// A data-only extension: its package and an optional static config
/// contribution.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExtensionConfig {
    pub name: String,
    #[serde(default)]
    pub package: Option<PackageManifest>,
    #[serde(default)]
    pub fastboot_config: Option<ConfigMap>,
}

impl BuildConfig {
    pub fn from_json(payload: &str) -> Result<Self, BuildError> {
        Ok(serde_json::from_str(payload)?)
    }

    /// Materialize the extension list in declaration order.
    pub fn extensions(&self) -> Vec<Extension> {
        self.extensions
            .iter()
            .map(|spec| {
                let package = spec
                    .package
                    .clone()
                    .unwrap_or_else(|| PackageManifest::new(spec.name.clone()));
                let mut extension = Extension::new(spec.name.clone()).with_package(package);
                if let Some(contribution) = spec.fastboot_config.clone() {
                    extension =
                        extension.with_config_contribution(move || Some(contribution.clone()));
                }
                extension
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn host_pattern_parses_delimited_regex() {
        let pattern = HostPattern::parse(r"/localhost:\d+/").unwrap();
        assert!(matches!(pattern, HostPattern::Pattern(_)));
        assert_eq!(pattern.normalized(), r"/localhost:\d+/");

        let literal = HostPattern::parse("example.com").unwrap();
        assert_eq!(literal, HostPattern::literal("example.com"));
        assert_eq!(HostPattern::parse("/").unwrap(), HostPattern::literal("/"));
    }

    #[test]
    fn host_pattern_rejects_invalid_regex() {
        let err = HostPattern::parse("/(unclosed/").unwrap_err();
        assert!(matches!(err, BuildError::InvalidHostPattern { .. }));
    }

    #[test]
    fn app_config_round_trips_unknown_keys() {
        let raw = json!({
            "modulePrefix": "app",
            "rootURL": "/",
            "locationType": "auto",
            "fastboot": { "hostAllowList": ["example.com", "/localhost:\\d+/"], "redirectCode": 302 }
        });
        let config: AppConfig = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(config.module_prefix, "app");
        assert_eq!(config.root_url.as_deref(), Some("/"));
        assert_eq!(config.host_allowlist().map(<[HostPattern]>::len), Some(2));
        assert_eq!(config.to_value().unwrap(), raw);
    }

    #[test]
    fn host_allowlist_accepts_lowercase_l_spelling() {
        let config: AppConfig = serde_json::from_value(json!({
            "modulePrefix": "app",
            "fastboot": { "hostAllowlist": ["example.com"] }
        }))
        .unwrap();
        assert_eq!(
            config.host_allowlist(),
            Some(&[HostPattern::literal("example.com")][..])
        );
        let fastboot = config.fastboot.as_ref().unwrap();
        assert!(fastboot.extra.is_empty());
    }

    #[test]
    fn legacy_addon_key_is_rejected() {
        let package: PackageManifest = serde_json::from_value(json!({
            "name": "old-addon",
            "ember-addon": { "fastBootDependencies": ["x"] }
        }))
        .unwrap();
        let err = package.addon_fastboot_dependencies().unwrap_err();
        assert!(err.to_string().contains("old-addon"));
    }

    #[test]
    fn build_config_materializes_extensions() {
        let config = BuildConfig::from_json(
            r#"{
                "appConfig": { "modulePrefix": "app" },
                "outputPaths": { "app": { "js": "/assets/app.js" }, "vendor": { "js": "/assets/vendor.js" } },
                "extensions": [
                    { "name": "addon-a", "fastbootConfig": { "addon-a": { "on": true } } },
                    { "name": "addon-b" }
                ]
            }"#,
        )
        .unwrap();

        let extensions = config.extensions();
        assert_eq!(extensions.len(), 2);
        assert_eq!(extensions[0].package().name, "addon-a");
        let contributed = extensions[0].contribute_config().unwrap().unwrap();
        assert_eq!(contributed.get("addon-a"), Some(&json!({ "on": true })));
        assert!(extensions[1].contribute_config().unwrap().is_none());
    }
}
