//! Byte-identical output and write-if-changed behaviour across rebuilds.

use std::collections::BTreeMap;
use std::fs;

use fastboot_build::{
    AppConfig, ConfigMap, Descriptor, Extension, FastbootConfig, HtmlWriter, Manifest,
    OutputPaths, PackageManifest, PACKAGE_JSON,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn sha256(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    hex::encode(hasher.finalize())
}

fn config_addon(name: &'static str) -> Extension {
    Extension::new(name).with_config_contribution(move || {
        let mut map = ConfigMap::new();
        map.insert(name, json!({ "enabled": true }));
        Some(map)
    })
}

/// Declares `shared@^1.0.0` and rewrites app bundles to their minified names.
fn minifier() -> Extension {
    Extension::new("minifier")
        .with_package(
            PackageManifest::new("minifier")
                .with_dependency("shared", "^1.0.0")
                .with_addon_fastboot_dependencies(["shared"]),
        )
        .with_manifest_hook(|mut manifest| {
            manifest.app_files = manifest
                .app_files
                .iter()
                .map(|f| f.replace(".js", ".min.js"))
                .collect();
            Some(manifest)
        })
}

/// Declares the same `shared@^1.0.0` and appends a vendor polyfill.
fn polyfills() -> Extension {
    Extension::new("polyfills")
        .with_package(
            PackageManifest::new("polyfills")
                .with_dependency("shared", "^1.0.0")
                .with_addon_fastboot_dependencies(["shared"]),
        )
        .with_manifest_hook(|mut manifest| {
            manifest.vendor_files.push("assets/polyfill.js".into());
            Some(manifest)
        })
}

fn subject(extensions: Vec<Extension>) -> FastbootConfig {
    let project = PackageManifest::new("app")
        .with_dependency("apple", "*")
        .with_dependency("orange", "^1.0.0")
        .with_fastboot_dependencies(["apple", "orange"]);
    FastbootConfig::new(
        AppConfig::new("app"),
        OutputPaths::new("/assets/app.js", "/assets/vendor.js"),
        project,
        extensions,
    )
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <meta name="app/config/environment" content="%7B%7D">
</head>
<body>
  <script src="/assets/vendor.js"></script>
  <script src="/assets/app.js"></script>
</body>
</html>
"#;

// ============================================================================
// Deterministic descriptor
// ============================================================================

#[test]
fn repeated_serialization_is_byte_identical() {
    let builder = subject(vec![config_addon("a"), config_addon("b")]);
    let first = builder.to_json_string().unwrap();
    let second = builder.to_json_string().unwrap();
    assert_eq!(sha256(&first), sha256(&second));
}

#[test]
fn extension_order_does_not_leak_into_descriptor_bytes() {
    let forward = subject(vec![minifier(), polyfills()]).to_json_string().unwrap();
    let reverse = subject(vec![polyfills(), minifier()]).to_json_string().unwrap();
    assert_eq!(sha256(&forward), sha256(&reverse));

    // The extensions really did shape the descriptor.
    let descriptor: serde_json::Value = serde_json::from_str(&forward).unwrap();
    assert_eq!(descriptor["dependencies"]["shared"], json!("^1.0.0"));
    assert_eq!(
        descriptor["fastboot"]["manifest"]["appFiles"],
        json!(["assets/app.min.js", "assets/app-fastboot.min.js"])
    );
    assert_eq!(
        descriptor["fastboot"]["manifest"]["vendorFiles"],
        json!(["assets/vendor.js", "assets/polyfill.js"])
    );
}

#[test]
fn dependency_map_insertion_order_is_irrelevant() {
    let manifest = Manifest::from_output_paths(&OutputPaths::new("app.js", "vendor.js"), "index.html");

    let mut forward = BTreeMap::new();
    forward.insert("a".to_string(), "1".to_string());
    forward.insert("b".to_string(), "2".to_string());
    let mut reverse = BTreeMap::new();
    reverse.insert("b".to_string(), "2".to_string());
    reverse.insert("a".to_string(), "1".to_string());

    let one = Descriptor::new("app", forward, vec!["a".into(), "b".into()], None, manifest.clone());
    let two = Descriptor::new("app", reverse, vec!["a".into(), "b".into()], None, manifest);
    assert_eq!(one.to_json_string().unwrap(), two.to_json_string().unwrap());
}

#[test]
fn descriptor_uses_two_space_indentation() {
    let json = subject(vec![]).to_json_string().unwrap();
    assert!(json.starts_with("{\n  \"dependencies\": {\n    \"apple\": \"*\","));
}

// ============================================================================
// Write-if-changed
// ============================================================================

#[test]
fn unchanged_rebuild_skips_the_write() {
    let dir = tempfile::tempdir().unwrap();
    let builder = subject(vec![]);

    let first = builder.build(dir.path()).unwrap();
    assert!(first.written);
    let modified = fs::metadata(dir.path().join(PACKAGE_JSON)).unwrap().modified().unwrap();

    let second = builder.build(dir.path()).unwrap();
    assert!(!second.written);
    assert_eq!(
        fs::metadata(dir.path().join(PACKAGE_JSON)).unwrap().modified().unwrap(),
        modified
    );
}

#[test]
fn only_logical_changes_trigger_a_write() {
    let dir = tempfile::tempdir().unwrap();
    let mut builder = subject(vec![]);
    assert!(builder.build(dir.path()).unwrap().written);

    // A dependency outside the allowlist does not change the descriptor.
    builder.set_project(
        PackageManifest::new("app")
            .with_dependency("apple", "*")
            .with_dependency("orange", "^1.0.0")
            .with_dependency("pizza", "^3.0.0")
            .with_fastboot_dependencies(["apple", "orange"]),
    );
    assert!(!builder.build(dir.path()).unwrap().written);

    builder.set_project(
        PackageManifest::new("app")
            .with_dependency("apple", "^3.0.0")
            .with_dependency("orange", "^1.0.0")
            .with_fastboot_dependencies(["apple", "orange"]),
    );
    let report = builder.build(dir.path()).unwrap();
    assert!(report.written);

    let raw = fs::read_to_string(dir.path().join(PACKAGE_JSON)).unwrap();
    let descriptor: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(descriptor["dependencies"], json!({ "apple": "^3.0.0", "orange": "^1.0.0" }));
}

#[test]
fn cache_is_shared_by_clones_of_the_builder() {
    let dir = tempfile::tempdir().unwrap();
    let builder = subject(vec![]);
    let clone = builder.clone();

    assert!(builder.build(dir.path()).unwrap().written);
    assert!(!clone.build(dir.path()).unwrap().written);
    assert_eq!(builder.checksums().len(), 1);
}

// ============================================================================
// Deterministic HTML
// ============================================================================

#[test]
fn html_rewrite_is_byte_identical_across_runs() {
    let builder = subject(vec![config_addon("a")]);
    let prepared = builder.prepare().unwrap();
    let writer = HtmlWriter::from_prepared(&prepared, builder.output_paths());

    let first = writer.process_string(INDEX_HTML).unwrap();
    let second = writer.process_string(INDEX_HTML).unwrap();
    assert_eq!(sha256(&first), sha256(&second));
}
