//! Contributing extensions.
//!
//! An extension is an independently packaged unit that may contribute
//! runtime config, allowlist modules through its `package.json`, and rewrite
//! the asset manifest. Hooks are plain callables run in registration order;
//! each one must return a value or the build stops and names the extension.

use std::fmt;
use std::sync::Arc;

use crate::config::PackageManifest;
use crate::config_map::ConfigMap;
use crate::manifest::Manifest;
use crate::BuildError;

/// Returns the extension's config contribution. `None` violates the contract.
pub type ConfigContribution = Arc<dyn Fn() -> Option<ConfigMap> + Send + Sync>;

/// Receives the current manifest and returns the rewritten one. `None`
/// violates the contract.
pub type ManifestHook = Arc<dyn Fn(Manifest) -> Option<Manifest> + Send + Sync>;

#[derive(Clone)]
pub struct Extension {
    name: String,
    package: PackageManifest,
    config_contribution: Option<ConfigContribution>,
    manifest_hook: Option<ManifestHook>,
}

impl Extension {
    /// A bare extension whose package is named after it and declares nothing.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            package: PackageManifest::new(name.clone()),
            name,
            config_contribution: None,
            manifest_hook: None,
        }
    }

    pub fn with_package(mut self, package: PackageManifest) -> Self {
        self.package = package;
        self
    }

    pub fn with_config_contribution<F>(mut self, contribution: F) -> Self
    where
        F: Fn() -> Option<ConfigMap> + Send + Sync + 'static,
    {
        self.config_contribution = Some(Arc::new(contribution));
        self
    }

    pub fn with_manifest_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(Manifest) -> Option<Manifest> + Send + Sync + 'static,
    {
        self.manifest_hook = Some(Arc::new(hook));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn package(&self) -> &PackageManifest {
        &self.package
    }

    /// Run the config contribution, if the extension offers one.
    pub fn contribute_config(&self) -> Result<Option<ConfigMap>, BuildError> {
        let Some(contribution) = &self.config_contribution else {
            return Ok(None);
        };
        contribution()
            .map(Some)
            .ok_or_else(|| BuildError::InvalidConfigContribution {
                extension: self.name.clone(),
            })
    }

    /// Thread the manifest through the extension's rewrite hook. Extensions
    /// without a hook pass it through unchanged.
    pub fn rewrite_manifest(&self, manifest: Manifest) -> Result<Manifest, BuildError> {
        let Some(hook) = &self.manifest_hook else {
            return Ok(manifest);
        };
        hook(manifest).ok_or_else(|| BuildError::ManifestHookFailed {
            extension: self.name.clone(),
        })
    }

    /// Modules allowlisted by this extension's package.
    pub fn fastboot_dependencies(&self) -> Result<&[String], BuildError> {
        self.package.addon_fastboot_dependencies()
    }
}

impl fmt::Debug for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extension")
            .field("name", &self.name)
            .field("package", &self.package.name)
            .field("config_contribution", &self.config_contribution.is_some())
            .field("manifest_hook", &self.manifest_hook.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> Manifest {
        Manifest {
            app_files: vec!["app.js".into()],
            vendor_files: vec!["vendor.js".into()],
            html_file: "index.html".into(),
        }
    }

    #[test]
    fn falsy_config_contribution_names_extension() {
        let ext = Extension::new("broken-addon").with_config_contribution(|| None);
        let err = ext.contribute_config().unwrap_err();
        assert!(matches!(
            err,
            BuildError::InvalidConfigContribution { ref extension } if extension == "broken-addon"
        ));
    }

    #[test]
    fn missing_hook_passes_manifest_through() {
        let ext = Extension::new("plain");
        assert_eq!(ext.rewrite_manifest(manifest()).unwrap(), manifest());
    }

    #[test]
    fn falsy_manifest_hook_names_extension() {
        let ext = Extension::new("bad-hook").with_manifest_hook(|_| None);
        let err = ext.rewrite_manifest(manifest()).unwrap_err();
        assert!(err.to_string().starts_with("bad-hook did not return"));
    }
}
