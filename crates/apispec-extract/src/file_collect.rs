use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use apispec_core::{Error, Result};
use ignore::WalkBuilder;
use tracing::{debug, info, warn};

/// One directory's worth of `.go` files, presumed (per Go's package model)
/// to all belong to the same package.
#[derive(Debug, Clone)]
pub struct PackageFiles {
    /// Import path, derived from the module path in `go.mod` plus the
    /// directory's path relative to the module root.
    pub import_path: String,
    pub files: Vec<PathBuf>,
}

/// Reads the `module` directive out of a `go.mod` file. Fatal if missing —
/// the module root must contain the module manifest.
pub fn read_module_path(module_root: &Path) -> Result<String> {
    let go_mod = module_root.join("go.mod");
    let content = fs::read_to_string(&go_mod)
        .map_err(|_| Error::ModuleRoot(format!("no go.mod found under {}", module_root.display())))?;

    for line in content.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("module ") {
            return Ok(rest.trim().to_string());
        }
    }

    Err(Error::ModuleRoot(format!(
        "go.mod under {} has no module directive",
        module_root.display()
    )))
}

/// Walks the module root and groups `.go` files by containing directory,
/// skipping vendor/build directories and (by default) `_test.go` files —
/// `exclude_tests` in [`apispec_core::Analysis`] controls the latter.
///
/// Package/directory patterns in `include`/`exclude` are glob-matched
/// against the derived import path; an empty `include` matches everything.
pub fn collect_packages(
    module_root: &Path,
    module_path: &str,
    exclude_tests: bool,
    include: &[String],
    exclude: &[String],
) -> Result<Vec<PackageFiles>> {
    info!("collecting Go packages under {}", module_root.display());

    let include_set = build_globset(include);
    let exclude_set = build_globset(exclude);

    let mut by_dir: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();

    let mut walker = WalkBuilder::new(module_root);
    walker.hidden(false).git_ignore(true).git_exclude(true);
    walker.filter_entry(|entry| entry.file_name() != "vendor" && entry.file_name() != "testdata");

    for dent in walker.build() {
        let dent = match dent {
            Ok(d) => d,
            Err(e) => {
                warn!("walker error: {e}");
                continue;
            }
        };
        let path = dent.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some("go") {
            continue;
        }
        let is_test = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with("_test.go"));
        if is_test && exclude_tests {
            continue;
        }
        let dir = path.parent().unwrap_or(module_root).to_path_buf();
        by_dir.entry(dir).or_default().push(path.to_path_buf());
    }

    let mut packages = Vec::new();
    for (dir, mut files) in by_dir {
        files.sort();
        let import_path = directory_import_path(module_root, module_path, &dir);

        if let Some(set) = &include_set {
            if !set.is_match(&import_path) {
                continue;
            }
        }
        if let Some(set) = &exclude_set {
            if set.is_match(&import_path) {
                continue;
            }
        }

        debug!("package {import_path}: {} file(s)", files.len());
        packages.push(PackageFiles { import_path, files });
    }

    packages.sort_by(|a, b| a.import_path.cmp(&b.import_path));
    Ok(packages)
}

fn directory_import_path(module_root: &Path, module_path: &str, dir: &Path) -> String {
    let rel = dir.strip_prefix(module_root).unwrap_or(dir);
    if rel.as_os_str().is_empty() {
        module_path.to_string()
    } else {
        let rel_str = rel.to_string_lossy().replace(std::path::MAIN_SEPARATOR, "/");
        format!("{module_path}/{rel_str}")
    }
}

fn build_globset(patterns: &[String]) -> Option<globset::GlobSet> {
    if patterns.is_empty() {
        return None;
    }
    let mut builder = globset::GlobSetBuilder::new();
    let mut added = false;
    for pattern in patterns {
        match globset::Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
                added = true;
            }
            Err(e) => warn!("invalid glob pattern '{pattern}': {e}"),
        }
    }
    if added {
        builder.build().ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn reads_module_path() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("go.mod"), "module example.com/widgets\n\ngo 1.22\n").unwrap();
        assert_eq!(read_module_path(dir.path()).unwrap(), "example.com/widgets");
    }

    #[test]
    fn missing_go_mod_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_module_path(dir.path()).is_err());
    }

    #[test]
    fn groups_files_by_directory_and_derives_import_path() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("go.mod"), "module example.com/widgets\n").unwrap();
        fs::write(dir.path().join("main.go"), "package main\n").unwrap();
        fs::create_dir_all(dir.path().join("handlers")).unwrap();
        fs::write(dir.path().join("handlers/users.go"), "package handlers\n").unwrap();
        fs::write(dir.path().join("handlers/users_test.go"), "package handlers\n").unwrap();

        let module_path = read_module_path(dir.path()).unwrap();
        let packages = collect_packages(dir.path(), &module_path, true, &[], &[]).unwrap();

        assert_eq!(packages.len(), 2);
        let handlers = packages
            .iter()
            .find(|p| p.import_path == "example.com/widgets/handlers")
            .expect("handlers package present");
        assert_eq!(handlers.files.len(), 1);
    }
}
