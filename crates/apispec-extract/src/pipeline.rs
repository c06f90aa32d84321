//! C3's entry point: walks a Go module, parses and extracts every package in
//! parallel, merges the results into one [`MetadataStore`] in deterministic
//! order, then runs the cross-package linking pass so nothing downstream
//! ever sees a [`apispec_core::Callee::Unresolved`].

use std::fs;
use std::path::Path;

use apispec_core::{Analysis, Diagnostic, DiagnosticKind, MetadataStore, Result};
use rayon::prelude::*;
use tracing::warn;

use crate::file_collect::{self, PackageFiles};
use crate::languages::{extract_package, go_parser, ParsedFile};
use crate::resolve;

pub struct ExtractionOutcome {
    pub store: MetadataStore,
    pub diagnostics: Vec<Diagnostic>,
}

/// Runs the whole of C3 over `module_root`: discovers the module's packages
/// (honoring `analysis`'s include/exclude/test filters), extracts each one
/// on a rayon thread, merges the per-package builders sequentially in
/// import-path order, and links cross-package calls.
pub fn extract_module(module_root: &Path, analysis: &Analysis) -> Result<ExtractionOutcome> {
    let module_path = file_collect::read_module_path(module_root)?;
    let packages = file_collect::collect_packages(
        module_root,
        &module_path,
        analysis.exclude_tests,
        &analysis.include_packages,
        &analysis.exclude_packages,
    )?;

    let mut store = MetadataStore::new();

    // Parallel phase: each package is parsed and extracted independently
    // against the shared (lock-protected) string pool and type table.
    // `packages` is already sorted by import path and `par_iter` preserves
    // input order through `collect`, so the sequential merge below stays
    // deterministic without needing to re-sort.
    let extracted: Vec<(apispec_core::Handle, apispec_core::PackageBuilder, Vec<Diagnostic>)> =
        packages
            .par_iter()
            .map(|pkg| extract_one_package(&store, pkg))
            .collect();

    let mut diagnostics = Vec::new();
    for (import_path, builder, diags) in extracted {
        let _ = import_path;
        diagnostics.extend(diags);
        store.insert_package(builder);
    }

    resolve::link(&mut store, &mut diagnostics);

    Ok(ExtractionOutcome { store, diagnostics })
}

fn extract_one_package(
    store: &MetadataStore,
    pkg: &PackageFiles,
) -> (apispec_core::Handle, apispec_core::PackageBuilder, Vec<Diagnostic>) {
    let mut diagnostics = Vec::new();
    let import_path = store.pool.intern(&pkg.import_path);

    let mut parsed = Vec::with_capacity(pkg.files.len());
    for path in &pkg.files {
        let source = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::PackageSkipped,
                    None,
                    format!("could not read {}: {e}", path.display()),
                ));
                continue;
            }
        };
        let mut parser = match go_parser() {
            Ok(p) => p,
            Err(e) => {
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::PackageSkipped,
                    None,
                    format!("could not set up the Go grammar: {e}"),
                ));
                continue;
            }
        };
        let tree = match parser.parse(&source, None) {
            Some(tree) => tree,
            None => {
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::PackageSkipped,
                    None,
                    format!("failed to parse {}", path.display()),
                ));
                continue;
            }
        };
        let file_handle = store.pool.intern(&path.to_string_lossy());
        parsed.push(ParsedFile {
            path: file_handle,
            source,
            tree,
        });
    }

    if parsed.is_empty() && !pkg.files.is_empty() {
        warn!("package {} produced no parseable files", pkg.import_path);
    }

    let builder = extract_package(&store.pool, &store.types, import_path, &parsed, &mut diagnostics);
    (import_path, builder, diagnostics)
}
