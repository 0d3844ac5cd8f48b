//! Asset manifest and the serialized `package.json` descriptor.
//!
//! The manifest lists the files the server runtime must load. It is derived
//! once per build from output-path naming, then threaded through every
//! extension's rewrite hook. The descriptor wraps it with the dependency
//! allowlist and host allowlist and serializes with sorted keys.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{HostPattern, OutputPaths};
use crate::extension::Extension;
use crate::utils::{fastboot_variant_path, strip_leading_slash};
use crate::BuildError;

/// Descriptor schema version. Bump on any breaking change to its shape.
pub const SCHEMA_VERSION: u32 = 5;

/// Entry document name when the app config does not override it.
pub const DEFAULT_HTML_FILE: &str = "index.html";

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub app_files: Vec<String>,
    pub vendor_files: Vec<String>,
    pub html_file: String,
}

impl Manifest {
    /// Derive the manifest from output-path naming. All paths are relative.
    pub fn from_output_paths(paths: &OutputPaths, html_file: &str) -> Self {
        let app = strip_leading_slash(&paths.app.js);
        let vendor = strip_leading_slash(&paths.vendor.js);
        Self {
            app_files: vec![app.to_string(), fastboot_variant_path(app)],
            vendor_files: vec![vendor.to_string()],
            html_file: html_file.to_string(),
        }
    }

    /// Pass the manifest through each extension's hook, in order.
    pub fn rewrite_with(self, extensions: &[Extension]) -> Result<Self, BuildError> {
        extensions
            .iter()
            .try_fold(self, |manifest, extension| extension.rewrite_manifest(manifest))
    }

    /// Vendor files followed by app files: the load order.
    pub fn script_files(&self) -> impl Iterator<Item = &str> {
        self.vendor_files
            .iter()
            .chain(self.app_files.iter())
            .map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

/// Content of the generated `package.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    pub name: String,
    pub dependencies: BTreeMap<String, String>,
    pub fastboot: FastbootSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FastbootSection {
    pub module_allowlist: Vec<String>,
    pub schema_version: u32,
    /// Omitted entirely when the app configures no allowlist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_allowlist: Option<Vec<String>>,
    pub manifest: Manifest,
    /// Duplicate of `manifest.htmlFile` for older manifest consumers.
    pub html_entrypoint: String,
}

impl Descriptor {
    pub fn new(
        name: &str,
        dependencies: BTreeMap<String, String>,
        module_allowlist: Vec<String>,
        host_allowlist: Option<&[HostPattern]>,
        manifest: Manifest,
    ) -> Self {
        Self {
            name: name.to_string(),
            dependencies,
            fastboot: FastbootSection {
                module_allowlist,
                schema_version: SCHEMA_VERSION,
                host_allowlist: host_allowlist
                    .map(|hosts| hosts.iter().map(HostPattern::normalized).collect()),
                html_entrypoint: manifest.html_file.clone(),
                manifest,
            },
        }
    }

    /// Serialize with sorted keys and 2-space indentation.
    ///
    /// Going through `serde_json::Value` orders every object's keys, so the
    /// bytes depend only on logical content.
    pub fn to_json_string(&self) -> Result<String, BuildError> {
        let value = serde_json::to_value(self)?;
        Ok(serde_json::to_string_pretty(&value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn manifest_paths_are_stripped_and_variant_named() {
        let manifest = Manifest::from_output_paths(
            &OutputPaths::new("/assets/my-app.js", "/assets/vendor.js"),
            DEFAULT_HTML_FILE,
        );
        assert_eq!(
            manifest.app_files,
            vec!["assets/my-app.js", "assets/my-app-fastboot.js"]
        );
        assert_eq!(manifest.vendor_files, vec!["assets/vendor.js"]);
        assert_eq!(
            manifest.script_files().collect::<Vec<_>>(),
            vec!["assets/vendor.js", "assets/my-app.js", "assets/my-app-fastboot.js"]
        );
    }

    #[test]
    fn hooks_run_in_registration_order() {
        let first = Extension::new("first").with_manifest_hook(|mut m| {
            m.vendor_files.push("first.js".into());
            Some(m)
        });
        let second = Extension::new("second").with_manifest_hook(|mut m| {
            m.vendor_files.push("second.js".into());
            Some(m)
        });

        let manifest = Manifest::from_output_paths(&OutputPaths::new("app.js", "vendor.js"), "index.html")
            .rewrite_with(&[first, second])
            .unwrap();
        assert_eq!(manifest.vendor_files, vec!["vendor.js", "first.js", "second.js"]);
    }

    #[test]
    fn hook_failure_stops_the_chain() {
        let bad = Extension::new("bad").with_manifest_hook(|_| None);
        let never = Extension::new("never").with_manifest_hook(|_| panic!("must not run"));
        let err = Manifest::from_output_paths(&OutputPaths::new("app.js", "vendor.js"), "index.html")
            .rewrite_with(&[bad, never])
            .unwrap_err();
        assert!(matches!(err, BuildError::ManifestHookFailed { ref extension } if extension == "bad"));
    }

    #[test]
    fn descriptor_serializes_with_sorted_keys_and_omits_host_allowlist() {
        let manifest = Manifest::from_output_paths(&OutputPaths::new("app.js", "vendor.js"), "index.html");
        let json = Descriptor::new("app", BTreeMap::new(), vec![], None, manifest)
            .to_json_string()
            .unwrap();

        let expected = r#"{
  "dependencies": {},
  "fastboot": {
    "htmlEntrypoint": "index.html",
    "manifest": {
      "appFiles": [
        "app.js",
        "app-fastboot.js"
      ],
      "htmlFile": "index.html",
      "vendorFiles": [
        "vendor.js"
      ]
    },
    "moduleAllowlist": [],
    "schemaVersion": 5
  },
  "name": "app"
}"#;
        assert_eq!(json, expected);
    }

    #[test]
    fn descriptor_normalizes_host_allowlist() {
        let manifest = Manifest::from_output_paths(&OutputPaths::new("app.js", "vendor.js"), "index.html");
        let hosts = vec![
            HostPattern::literal("example.com"),
            HostPattern::pattern(r"localhost:\d+").unwrap(),
        ];
        let descriptor = Descriptor::new("app", BTreeMap::new(), vec![], Some(&hosts), manifest);
        assert_eq!(
            descriptor.fastboot.host_allowlist,
            Some(vec!["example.com".to_string(), r"/localhost:\d+/".to_string()])
        );
    }
}
