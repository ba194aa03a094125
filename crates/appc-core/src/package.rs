//! C2: Package collector. Recursively enumerates directories from the app
//! root in alphabetical order, parses every source file under build
//! constraints, and groups files by declared package name (spec.md §4.1).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::ast;
use crate::buildtags;
use crate::diagnostics::{Diagnostic, DiagnosticList};
use crate::parser;
use crate::source::{FileId, SourceFile};

/// File extension this front-end recognizes as source, per spec.md's
/// "source language's" extension (the wire directives in spec.md §6 are
/// Go-shaped: `//encore:api`, `go.mod`).
pub const SOURCE_EXTENSION: &str = "go";

pub type PackageId = u32;

/// One parsed file: its loaded bytes/line-index/reference map plus the
/// syntax tree the parser produced for it.
pub struct ParsedFile {
    pub source: SourceFile,
    pub ast: ast::File,
}

/// Essential attributes of a Package per spec.md's Data Model. `service` and
/// `resources` start empty and are filled in by later phases (C7 appends
/// resources, C8/C9 set the service back-reference).
pub struct Package {
    pub import_path: String,
    pub rel_path: String,
    pub dir: PathBuf,
    pub name: String,
    pub files: Vec<FileId>,
    pub doc: Option<String>,
    pub service: Option<crate::endpoint::ServiceId>,
    pub secret_names: Vec<String>,
    pub resources: Vec<crate::refs::ResourceRef>,
}

pub struct CollectOutput {
    pub packages: Vec<Package>,
    pub files: Vec<ParsedFile>,
}

pub struct CollectConfig<'a> {
    pub app_root: &'a Path,
    pub module_import_path: &'a str,
    pub build_tags: &'a [String],
    pub include_test_files: bool,
    /// Glob patterns (matched against the full path) pruned from collection,
    /// on top of the built-in `.git`/`node_modules`/`vendor` skip list.
    pub exclude: &'a [String],
}

pub fn collect(cfg: &CollectConfig, diags: &mut DiagnosticList) -> CollectOutput {
    let mut files: Vec<ParsedFile> = Vec::new();
    let mut packages: Vec<Package> = Vec::new();
    let tags = buildtags::effective_tags(cfg.build_tags);
    let exclude: Vec<glob::Pattern> = cfg.exclude.iter().filter_map(|p| glob::Pattern::new(p).ok()).collect();

    // Breadth of directories is collected up front so iteration order does
    // not depend on filesystem readdir ordering (spec.md §4.1: "stable
    // ordering by relative path").
    let mut all_dirs = collect_dirs(cfg.app_root, &exclude);
    all_dirs.sort();

    for dir in all_dirs {
        collect_one_dir(cfg, &dir, &tags, &mut files, &mut packages, diags);
    }

    packages.sort_by(|a, b| a.rel_path.cmp(&b.rel_path).then(a.name.cmp(&b.name)));
    CollectOutput { packages, files }
}

/// Recursively enumerates directories under `root`, pruning the built-in
/// ignore list and `exclude` globs at each level so excluded subtrees are
/// never descended into. Final ordering is imposed by the caller, so the
/// walker's own order is irrelevant here.
fn collect_dirs(root: &Path, exclude: &[glob::Pattern]) -> Vec<PathBuf> {
    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !e.file_type().is_dir() || !is_pruned_dir(e.path(), exclude))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_dir())
        .map(|e| e.path().to_path_buf())
        .collect()
}

fn is_pruned_dir(p: &Path, exclude: &[glob::Pattern]) -> bool {
    if matches!(
        p.file_name().and_then(|n| n.to_str()),
        Some(".git") | Some("node_modules") | Some("vendor")
    ) {
        return true;
    }
    exclude.iter().any(|pat| pat.matches_path(p))
}

fn collect_one_dir(
    cfg: &CollectConfig,
    dir: &Path,
    tags: &std::collections::HashSet<String>,
    files: &mut Vec<ParsedFile>,
    packages: &mut Vec<Package>,
    diags: &mut DiagnosticList,
) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    let mut candidates: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some(SOURCE_EXTENSION))
        .collect();
    candidates.sort();

    // package name -> files, in filename order, per spec.md §4.1.
    let mut by_package: BTreeMap<String, Vec<FileId>> = BTreeMap::new();
    let mut docs: BTreeMap<String, Option<String>> = BTreeMap::new();

    for path in candidates {
        let is_test_file = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(|s| s.ends_with("_test"))
            .unwrap_or(false);
        if is_test_file && !cfg.include_test_files {
            continue;
        }
        let Ok(bytes) = std::fs::read(&path) else {
            diags.report(Diagnostic::error(
                crate::source::Position::new(0, 0, 0, 0),
                format!("could not read {}", path.display()),
            ));
            continue;
        };
        let leading = leading_comment_lines(&bytes);
        let leading_refs: Vec<&str> = leading.iter().map(String::as_str).collect();
        if let Some(expr) = buildtags::parse_constraints(&leading_refs) {
            if !expr.eval(tags) {
                continue;
            }
        }

        let file_id = files.len() as FileId;
        let parsed = parser::parse_file(file_id, &bytes);
        for d in parsed.diagnostics {
            diags.report(d);
            // Files that fail to parse still produce diagnostics but do not
            // abort collection (spec.md §4.1).
        }
        let package_name = parsed.file.package_name.clone();
        let doc = parsed.file.doc.clone();
        let source = SourceFile::new(file_id, path.clone(), bytes);
        files.push(ParsedFile {
            source,
            ast: parsed.file,
        });
        by_package.entry(package_name.clone()).or_default().push(file_id);
        docs.entry(package_name).or_insert(doc);
    }

    if by_package.is_empty() {
        // Empty directories (or directories with only skipped test files)
        // are silently skipped (spec.md §4.1, §8 "Empty package directories
        // are not packages").
        return;
    }

    if by_package.len() > 1 {
        let names: Vec<&String> = by_package.keys().collect();
        let is_tolerated_test_pair = by_package.len() == 2
            && names.iter().any(|n| !n.ends_with("_test"))
            && names.iter().any(|n| n.ends_with("_test"));
        if !is_tolerated_test_pair {
            diags.report(Diagnostic::error(
                crate::source::Position::new(0, 0, 0, 0),
                format!(
                    "directory {} contains more than one package: {}",
                    dir.display(),
                    names
                        .iter()
                        .map(|s| s.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            ));
        }
    }

    let rel_path = dir
        .strip_prefix(cfg.app_root)
        .unwrap_or(dir)
        .to_string_lossy()
        .replace('\\', "/");
    let import_path = if rel_path.is_empty() {
        cfg.module_import_path.to_string()
    } else {
        format!("{}/{}", cfg.module_import_path, rel_path)
    };

    for (name, file_ids) in by_package {
        let doc = docs.get(&name).cloned().flatten();
        packages.push(Package {
            import_path: import_path.clone(),
            rel_path: rel_path.clone(),
            dir: dir.to_path_buf(),
            name,
            files: file_ids,
            doc,
            service: None,
            secret_names: Vec::new(),
            resources: Vec::new(),
        });
    }
}

/// Collects every top-of-file `//` comment line up to (not including) the
/// `package` clause, regardless of blank lines, since `//go:build`/`//
/// +build` constraints may be separated from the package doc comment by a
/// blank line.
fn leading_comment_lines(bytes: &[u8]) -> Vec<String> {
    let text = String::from_utf8_lossy(bytes);
    let mut lines = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("//") {
            lines.push(rest.trim_start().to_string());
            continue;
        }
        break;
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, contents: &str) {
        let mut f = std::fs::File::create(dir.join(name)).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    #[test]
    fn collects_single_package_directory() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(tmp.path(), "main.go", "package svc\n\nfunc F() {}\n");
        let mut diags = DiagnosticList::new(10);
        let cfg = CollectConfig {
            app_root: tmp.path(),
            module_import_path: "example.com/app",
            build_tags: &[],
            include_test_files: false,
            exclude: &[],
        };
        let out = collect(&cfg, &mut diags);
        assert_eq!(out.packages.len(), 1);
        assert_eq!(out.packages[0].name, "svc");
        assert!(!diags.has_errors());
    }

    #[test]
    fn empty_directory_is_not_a_package() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("empty")).unwrap();
        let mut diags = DiagnosticList::new(10);
        let cfg = CollectConfig {
            app_root: tmp.path(),
            module_import_path: "example.com/app",
            build_tags: &[],
            include_test_files: false,
            exclude: &[],
        };
        let out = collect(&cfg, &mut diags);
        assert!(out.packages.is_empty());
    }

    #[test]
    fn test_only_directory_skipped_without_test_mode() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(tmp.path(), "main_test.go", "package svc\n\nfunc F() {}\n");
        let mut diags = DiagnosticList::new(10);
        let cfg = CollectConfig {
            app_root: tmp.path(),
            module_import_path: "example.com/app",
            build_tags: &[],
            include_test_files: false,
            exclude: &[],
        };
        let out = collect(&cfg, &mut diags);
        assert!(out.packages.is_empty());
    }

    #[test]
    fn internal_test_package_pair_tolerated() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(tmp.path(), "main.go", "package svc\n\nfunc F() {}\n");
        write_file(tmp.path(), "main_test.go", "package svc_test\n\nfunc T() {}\n");
        let mut diags = DiagnosticList::new(10);
        let cfg = CollectConfig {
            app_root: tmp.path(),
            module_import_path: "example.com/app",
            build_tags: &[],
            include_test_files: true,
            exclude: &[],
        };
        let out = collect(&cfg, &mut diags);
        assert_eq!(out.packages.len(), 2);
        assert!(!diags.has_errors());
    }

    #[test]
    fn build_constraint_excludes_file() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(
            tmp.path(),
            "windows.go",
            "//go:build windows\n\npackage svc\n\nfunc F() {}\n",
        );
        let mut diags = DiagnosticList::new(10);
        let cfg = CollectConfig {
            app_root: tmp.path(),
            module_import_path: "example.com/app",
            build_tags: &[],
            include_test_files: false,
            exclude: &[],
        };
        let out = collect(&cfg, &mut diags);
        assert!(out.packages.is_empty());
    }
}
