//! Dependency allowlist resolution.
//!
//! Extensions and the project each name the modules the server runtime may
//! load. Declarations are folded in order (extensions in registration order,
//! then the project) into a version map plus a deduplicated module list. The
//! first declaration of a module wins; later ones are dropped and reported as
//! [`DependencyConflict`]s.

use std::collections::BTreeMap;

use crate::config::PackageManifest;
use crate::extension::Extension;
use crate::{BuildError, Diagnostic};

/// One `(module, version)` pair and the package that declared it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub module: String,
    pub version: Option<String>,
    pub declared_by: String,
}

/// Resolved allowlist: module → pinned version, plus the module list in
/// first-declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyAllowlist {
    versions: BTreeMap<String, String>,
    modules: Vec<String>,
}

impl DependencyAllowlist {
    /// Pinned versions, keyed by module. Modules declared without a
    /// resolvable version are absent here but still allowlisted.
    pub fn versions(&self) -> &BTreeMap<String, String> {
        &self.versions
    }

    pub fn modules(&self) -> &[String] {
        &self.modules
    }

    pub fn contains(&self, module: &str) -> bool {
        self.modules.iter().any(|m| m == module)
    }
}

/// A duplicate declaration that was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyConflict {
    pub module: String,
    /// Version in effect after the fold.
    pub kept: Option<String>,
    /// Version carried by the dropped declaration.
    pub dropped: Option<String>,
    pub declared_by: String,
}

impl DependencyConflict {
    pub fn message(&self) -> String {
        let kept = self.kept.as_deref().unwrap_or("<none>");
        match &self.dropped {
            Some(dropped) => format!(
                "Duplicate FastBoot dependency {}. Versions may mismatch. Using range {} (ignoring {} from {}).",
                self.module, kept, dropped, self.declared_by,
            ),
            None => format!(
                "Duplicate FastBoot dependency {}. Using range {} (redeclared by {}).",
                self.module, kept, self.declared_by,
            ),
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::warning(self.message(), Some(self.declared_by.clone()))
    }
}

/// Output of [`resolve`]: the allowlist and every dropped duplicate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyResolution {
    pub allowlist: DependencyAllowlist,
    pub conflicts: Vec<DependencyConflict>,
}

/// Fold declarations into an allowlist, first declaration wins.
///
/// A duplicate never overrides a pinned version. If the first declaration
/// carried no version, the first later declaration that does fills it in
/// silently; every other duplicate is a conflict.
pub fn fold<I>(declarations: I) -> DependencyResolution
where
    I: IntoIterator<Item = Declaration>,
{
    declarations
        .into_iter()
        .fold(DependencyResolution::default(), |mut acc, decl| {
            let allowlist = &mut acc.allowlist;

            if !allowlist.contains(&decl.module) {
                if let Some(version) = decl.version {
                    allowlist.versions.insert(decl.module.clone(), version);
                }
                allowlist.modules.push(decl.module);
                return acc;
            }

            // Filling in a missing version is not a conflict.
            if !allowlist.versions.contains_key(&decl.module) && decl.version.is_some() {
                allowlist.versions.extend(decl.version.map(|v| (decl.module, v)));
                return acc;
            }

            acc.conflicts.push(DependencyConflict {
                kept: allowlist.versions.get(&decl.module).cloned(),
                module: decl.module,
                dropped: decl.version,
                declared_by: decl.declared_by,
            });
            acc
        })
}

/// Collect declarations from extensions, then the project.
///
/// Extension modules resolve against the extension's own `dependencies`
/// and may resolve to no version. Project modules must be present in the
/// project's `dependencies`.
pub fn declarations(
    extensions: &[Extension],
    project: &PackageManifest,
) -> Result<Vec<Declaration>, BuildError> {
    let mut out = Vec::new();

    for extension in extensions {
        let package = extension.package();
        for module in extension.fastboot_dependencies()? {
            out.push(Declaration {
                module: module.clone(),
                version: package.dependency_version(module).map(str::to_string),
                declared_by: package.name.clone(),
            });
        }
    }

    for module in project.fastboot_dependencies.iter().flatten() {
        let version = project
            .dependency_version(module)
            .ok_or_else(|| BuildError::UnresolvedProjectDependency {
                name: module.clone(),
            })?;
        out.push(Declaration {
            module: module.clone(),
            version: Some(version.to_string()),
            declared_by: project.name.clone(),
        });
    }

    Ok(out)
}

/// Resolve the allowlist for a project and its extensions.
pub fn resolve(
    extensions: &[Extension],
    project: &PackageManifest,
) -> Result<DependencyResolution, BuildError> {
    Ok(fold(declarations(extensions, project)?))
}
