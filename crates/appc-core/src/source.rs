//! Source positions and file contents. Grounds the `Span`/`LineIndex` idiom
//! of the teacher's `diagnostics.rs`, widened to the `(file, byte-offset,
//! line, column)` tuple spec.md's Data Model calls `Position`: every
//! diagnostic and every AST node carries one, and offsets/lines always agree
//! with the exact bytes the rewriter edits.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Stable identity for a package (see [`crate::package::Package`]). Interning
/// keeps `Position` and AST nodes cheap to copy.
pub type FileId = u32;

/// A `(file, byte-offset, line, column)` tuple. Line and column are 1-indexed
/// for display, matching spec.md §7's `<path>:<line>:<col>: <message>` format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub file: FileId,
    pub offset: u32,
    pub line: u32,
    pub column: u32,
}

impl Position {
    #[must_use]
    pub fn new(file: FileId, offset: u32, line: u32, column: u32) -> Self {
        Self {
            file,
            offset,
            line,
            column,
        }
    }
}

/// A half-open byte range `[start, end)` within a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    #[must_use]
    pub fn new(start: u32, end: u32) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    #[must_use]
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    #[must_use]
    pub fn contains(&self, offset: u32) -> bool {
        self.start <= offset && offset < self.end
    }
}

/// Byte-offset → line/column index, built once per file at load time.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<u32>,
}

impl LineIndex {
    #[must_use]
    pub fn new(source: &[u8]) -> Self {
        let mut line_starts = vec![0u32];
        for (i, &b) in source.iter().enumerate() {
            if b == b'\n' {
                line_starts.push((i + 1) as u32);
            }
        }
        Self { line_starts }
    }

    /// Returns 1-indexed `(line, column)` for a byte offset.
    #[must_use]
    pub fn line_col(&self, offset: u32) -> (u32, u32) {
        let line = self
            .line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        let line_start = self.line_starts[line];
        ((line + 1) as u32, (offset - line_start) + 1)
    }
}

/// A loaded source file: raw bytes, the parsed tree (attached later by
/// [`crate::parser`]), a byte-accurate line index, and the reference map
/// written by C9 and consumed by C13. The reference map's keys are
/// [`crate::ast::NodeId`]s, stable for the lifetime of a single pipeline run.
#[derive(Clone)]
pub struct SourceFile {
    pub id: FileId,
    pub path: PathBuf,
    pub bytes: Arc<[u8]>,
    pub line_index: LineIndex,
    /// References recorded against AST nodes in this file; written by C9,
    /// consumed by C13. See spec.md Data Model, "File".
    pub references: indexmap::IndexMap<crate::ast::NodeId, crate::refs::Reference>,
}

impl SourceFile {
    #[must_use]
    pub fn new(id: FileId, path: PathBuf, bytes: Vec<u8>) -> Self {
        let line_index = LineIndex::new(&bytes);
        Self {
            id,
            path,
            bytes: Arc::from(bytes.into_boxed_slice()),
            line_index,
            references: indexmap::IndexMap::new(),
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        // Source files are required to be valid UTF-8; invalid encodings are
        // rejected by the package collector (C2) as a parse diagnostic, so by
        // the time a `SourceFile` exists this always succeeds.
        std::str::from_utf8(&self.bytes).unwrap_or("")
    }

    #[must_use]
    pub fn slice(&self, span: Span) -> &[u8] {
        &self.bytes[span.start as usize..span.end as usize]
    }

    #[must_use]
    pub fn position_at(&self, offset: u32) -> Position {
        let (line, column) = self.line_index.line_col(offset);
        Position::new(self.id, offset, line, column)
    }

    /// Path relative to `root`, slash-separated, for stable cross-platform
    /// output (overlay entries, metadata trace nodes).
    #[must_use]
    pub fn relative_path(&self, root: &Path) -> String {
        self.path
            .strip_prefix(root)
            .unwrap_or(&self.path)
            .to_string_lossy()
            .replace('\\', "/")
    }
}

impl fmt::Debug for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceFile")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_index_tracks_newlines() {
        let idx = LineIndex::new(b"abc\ndef\nghi");
        assert_eq!(idx.line_col(0), (1, 1));
        assert_eq!(idx.line_col(4), (2, 1));
        assert_eq!(idx.line_col(8), (3, 1));
    }

    #[test]
    fn line_index_empty_source() {
        let idx = LineIndex::new(b"");
        assert_eq!(idx.line_col(0), (1, 1));
    }

    #[test]
    fn span_contains() {
        let s = Span::new(3, 7);
        assert!(s.contains(3));
        assert!(s.contains(6));
        assert!(!s.contains(7));
    }
}
