//! Build-constraint expression parsing (SPEC_FULL.md §2). Supports both the
//! modern `//go:build <expr>` boolean-expression form and the legacy
//! `// +build tag1,tag2 tag3` line form, evaluated against a configured tag
//! set plus a reserved tag identifying this toolchain (spec.md §4.1).

use std::collections::HashSet;

/// The tag every build recognizes regardless of `PipelineConfig.build_tags`,
/// standing in for "this toolchain" per spec.md §4.1.
pub const TOOLCHAIN_TAG: &str = "encore";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildExpr {
    Tag(String),
    Not(Box<BuildExpr>),
    And(Box<BuildExpr>, Box<BuildExpr>),
    Or(Box<BuildExpr>, Box<BuildExpr>),
}

impl BuildExpr {
    #[must_use]
    pub fn eval(&self, tags: &HashSet<String>) -> bool {
        match self {
            BuildExpr::Tag(t) => tags.contains(t),
            BuildExpr::Not(e) => !e.eval(tags),
            BuildExpr::And(a, b) => a.eval(tags) && b.eval(tags),
            BuildExpr::Or(a, b) => a.eval(tags) || b.eval(tags),
        }
    }
}

/// Builds the effective tag set for one file's constraint evaluation:
/// configured tags plus the reserved toolchain tag.
#[must_use]
pub fn effective_tags(configured: &[String]) -> HashSet<String> {
    let mut set: HashSet<String> = configured.iter().cloned().collect();
    set.insert(TOOLCHAIN_TAG.to_string());
    set
}

/// Scans a file's leading comment lines for build constraints and returns
/// the combined expression (constraints from multiple lines are ANDed).
/// Returns `None` when there are no constraints, meaning the file always
/// applies.
#[must_use]
pub fn parse_constraints(leading_lines: &[&str]) -> Option<BuildExpr> {
    let mut combined: Option<BuildExpr> = None;
    for line in leading_lines {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("go:build ") {
            let expr = parse_go_build_expr(rest.trim());
            combined = Some(match combined {
                Some(c) => BuildExpr::And(Box::new(c), Box::new(expr)),
                None => expr,
            });
        } else if let Some(rest) = trimmed.strip_prefix("+build ") {
            let expr = parse_legacy_build_line(rest.trim());
            combined = Some(match combined {
                Some(c) => BuildExpr::And(Box::new(c), Box::new(expr)),
                None => expr,
            });
        }
    }
    combined
}

/// `a,b c !d` — space-separated OR groups of comma-separated AND terms,
/// each term optionally negated with a leading `!`.
fn parse_legacy_build_line(line: &str) -> BuildExpr {
    let mut or_terms: Vec<BuildExpr> = Vec::new();
    for group in line.split_whitespace() {
        let mut and_terms: Vec<BuildExpr> = Vec::new();
        for term in group.split(',') {
            let term = term.trim();
            if term.is_empty() {
                continue;
            }
            and_terms.push(if let Some(t) = term.strip_prefix('!') {
                BuildExpr::Not(Box::new(BuildExpr::Tag(t.to_string())))
            } else {
                BuildExpr::Tag(term.to_string())
            });
        }
        if let Some(term) = fold_and(and_terms) {
            or_terms.push(term);
        }
    }
    fold_or(or_terms).unwrap_or(BuildExpr::Tag(String::new()))
}

fn fold_and(terms: Vec<BuildExpr>) -> Option<BuildExpr> {
    terms
        .into_iter()
        .reduce(|a, b| BuildExpr::And(Box::new(a), Box::new(b)))
}

fn fold_or(terms: Vec<BuildExpr>) -> Option<BuildExpr> {
    terms
        .into_iter()
        .reduce(|a, b| BuildExpr::Or(Box::new(a), Box::new(b)))
}

/// A small recursive-descent parser for the `//go:build` boolean grammar:
/// `&&`, `||`, `!`, parens, and bare tag identifiers.
fn parse_go_build_expr(input: &str) -> BuildExpr {
    let mut p = BuildExprParser {
        bytes: input.as_bytes(),
        pos: 0,
    };
    p.parse_or()
}

struct BuildExprParser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> BuildExprParser<'a> {
    fn skip_ws(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos] == b' ' {
            self.pos += 1;
        }
    }

    fn parse_or(&mut self) -> BuildExpr {
        let mut lhs = self.parse_and();
        loop {
            self.skip_ws();
            if self.bytes[self.pos..].starts_with(b"||") {
                self.pos += 2;
                let rhs = self.parse_and();
                lhs = BuildExpr::Or(Box::new(lhs), Box::new(rhs));
            } else {
                break;
            }
        }
        lhs
    }

    fn parse_and(&mut self) -> BuildExpr {
        let mut lhs = self.parse_unary();
        loop {
            self.skip_ws();
            if self.bytes[self.pos..].starts_with(b"&&") {
                self.pos += 2;
                let rhs = self.parse_unary();
                lhs = BuildExpr::And(Box::new(lhs), Box::new(rhs));
            } else {
                break;
            }
        }
        lhs
    }

    fn parse_unary(&mut self) -> BuildExpr {
        self.skip_ws();
        if self.pos < self.bytes.len() && self.bytes[self.pos] == b'!' {
            self.pos += 1;
            return BuildExpr::Not(Box::new(self.parse_unary()));
        }
        if self.pos < self.bytes.len() && self.bytes[self.pos] == b'(' {
            self.pos += 1;
            let inner = self.parse_or();
            self.skip_ws();
            if self.pos < self.bytes.len() && self.bytes[self.pos] == b')' {
                self.pos += 1;
            }
            return inner;
        }
        self.parse_tag()
    }

    fn parse_tag(&mut self) -> BuildExpr {
        self.skip_ws();
        let start = self.pos;
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            if b == b' ' || b == b'&' || b == b'|' || b == b')' || b == b'(' {
                break;
            }
            self.pos += 1;
        }
        let tag = std::str::from_utf8(&self.bytes[start..self.pos]).unwrap_or("").to_string();
        BuildExpr::Tag(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(list: &[&str]) -> HashSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_tag_matches() {
        let expr = parse_go_build_expr("linux");
        assert!(expr.eval(&tags(&["linux"])));
        assert!(!expr.eval(&tags(&["darwin"])));
    }

    #[test]
    fn and_or_not_precedence() {
        let expr = parse_go_build_expr("linux && !cgo || darwin");
        assert!(expr.eval(&tags(&["linux"])));
        assert!(!expr.eval(&tags(&["linux", "cgo"])));
        assert!(expr.eval(&tags(&["darwin"])));
    }

    #[test]
    fn legacy_build_line_or_of_and() {
        let expr = parse_legacy_build_line("linux,amd64 darwin");
        assert!(expr.eval(&tags(&["linux", "amd64"])));
        assert!(expr.eval(&tags(&["darwin"])));
        assert!(!expr.eval(&tags(&["linux"])));
    }

    #[test]
    fn effective_tags_always_include_toolchain() {
        let set = effective_tags(&["foo".to_string()]);
        assert!(set.contains(TOOLCHAIN_TAG));
        assert!(set.contains("foo"));
    }

    #[test]
    fn no_constraints_means_always_applies() {
        assert!(parse_constraints(&["a regular doc comment"]).is_none());
    }
}
