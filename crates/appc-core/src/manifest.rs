//! Module manifest grammar (SPEC_FULL.md supplement): the `go.mod`-shaped
//! file declaring the app's module import path and its dependency
//! requirements, which the package collector needs up front to compute
//! import paths (spec.md §4.1's `module_import_path`).

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub module_path: String,
    pub language_version: Option<String>,
    pub requires: Vec<Requirement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub path: String,
    pub version: String,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ManifestError {
    #[error("manifest is missing a module declaration")]
    MissingModule,
}

/// Parses a manifest file's text. Unknown directives are ignored rather
/// than rejected, since this front-end only needs `module` and `require`.
pub fn parse(text: &str) -> Result<Manifest, ManifestError> {
    let mut manifest = Manifest::default();
    let mut in_require_block = false;

    for raw_line in text.lines() {
        let line = strip_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        if in_require_block {
            if line == ")" {
                in_require_block = false;
                continue;
            }
            if let Some(req) = parse_requirement_line(line) {
                manifest.requires.push(req);
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix("module ") {
            manifest.module_path = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("go ") {
            manifest.language_version = Some(rest.trim().to_string());
        } else if line == "require (" {
            in_require_block = true;
        } else if let Some(rest) = line.strip_prefix("require ") {
            if let Some(req) = parse_requirement_line(rest.trim()) {
                manifest.requires.push(req);
            }
        }
    }

    if manifest.module_path.is_empty() {
        return Err(ManifestError::MissingModule);
    }
    Ok(manifest)
}

fn strip_comment(line: &str) -> &str {
    match line.find("//") {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn parse_requirement_line(line: &str) -> Option<Requirement> {
    let mut parts = line.split_whitespace();
    let path = parts.next()?.to_string();
    let version = parts.next()?.to_string();
    Some(Requirement { path, version })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_module_and_go_version() {
        let m = parse("module example.com/app\n\ngo 1.22\n").unwrap();
        assert_eq!(m.module_path, "example.com/app");
        assert_eq!(m.language_version.as_deref(), Some("1.22"));
    }

    #[test]
    fn parses_require_block() {
        let m = parse(
            "module example.com/app\n\nrequire (\n\tencore.dev v1.40.0\n\tgithub.com/foo/bar v0.1.0\n)\n",
        )
        .unwrap();
        assert_eq!(m.requires.len(), 2);
        assert_eq!(m.requires[0].path, "encore.dev");
        assert_eq!(m.requires[0].version, "v1.40.0");
    }

    #[test]
    fn parses_single_line_require() {
        let m = parse("module example.com/app\n\nrequire encore.dev v1.40.0\n").unwrap();
        assert_eq!(m.requires.len(), 1);
    }

    #[test]
    fn missing_module_is_an_error() {
        assert!(matches!(parse("go 1.22\n"), Err(ManifestError::MissingModule)));
    }

    #[test]
    fn ignores_trailing_line_comments() {
        let m = parse("module example.com/app // the app module\n").unwrap();
        assert_eq!(m.module_path, "example.com/app");
    }
}
