//! Path and URL helpers shared by the manifest and HTML stages.
//!
//! - Leading-separator stripping for manifest paths
//! - Server-only variant naming (`app.js` → `app-fastboot.js`)
//! - rootURL normalization and root-relative URL resolution

use std::sync::OnceLock;

use regex::Regex;

use crate::config_map::ConfigMap;

/// Suffix appended to the app bundle stem to name its server-only variant.
pub const FASTBOOT_VARIANT_SUFFIX: &str = "-fastboot.js";

/// Default rootURL when the host app config does not declare one.
pub const DEFAULT_ROOT_URL: &str = "/";

// ---------------------------------------------------------------------------
// Manifest Paths
// ---------------------------------------------------------------------------

/// Strip leading `/` separators so the path is relative to the dist root.
pub fn strip_leading_slash(path: &str) -> &str {
    path.trim_start_matches('/')
}

/// Name the server-only variant of an app bundle path.
///
/// The `.js` extension (if any) is replaced by [`FASTBOOT_VARIANT_SUFFIX`].
pub fn fastboot_variant_path(app_path: &str) -> String {
    let stem = app_path.strip_suffix(".js").unwrap_or(app_path);
    format!("{stem}{FASTBOOT_VARIANT_SUFFIX}")
}

// ---------------------------------------------------------------------------
// rootURL
// ---------------------------------------------------------------------------

/// Force a trailing separator onto a rootURL.
pub fn normalize_root_url(root: &str) -> String {
    if root.ends_with('/') {
        root.to_string()
    } else {
        format!("{root}/")
    }
}

/// Read `rootURL` from the host namespace's config entry, defaulting to `/`.
pub fn root_url_for(config: &ConfigMap, app_name: &str) -> String {
    let root = config
        .get(app_name)
        .and_then(|entry| entry.get("rootURL"))
        .and_then(|value| value.as_str())
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_ROOT_URL);
    normalize_root_url(root)
}

fn scheme_regex() -> &'static Regex {
    static SCHEME: OnceLock<Regex> = OnceLock::new();
    SCHEME.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").expect("static regex"))
}

/// Resolve `candidate` relative to `root`.
///
/// Relative references are already root-relative and come back unchanged
/// (minus a leading `./`). Absolute paths under `root` have the root prefix
/// removed. Anything else (other roots, other origins, `data:` URLs) is
/// foreign and yields `None`.
pub fn url_within(candidate: &str, root: &str) -> Option<String> {
    if candidate.starts_with("//") || scheme_regex().is_match(candidate) {
        return None;
    }

    if !candidate.starts_with('/') {
        let relative = candidate.strip_prefix("./").unwrap_or(candidate);
        return Some(relative.to_string());
    }

    let root = normalize_root_url(root);
    candidate.strip_prefix(root.as_str()).map(str::to_string)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
