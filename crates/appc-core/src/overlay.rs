//! C13: Overlay rewriter. Accumulates span-level edits per file (insertions
//! and replacements, never deletions of code the rest of the pipeline
//! relied on) and renders each edited file into the overlay the build
//! toolchain compiles instead of the original source (spec.md §4.13).

use std::collections::BTreeMap;

use crate::source::{FileId, Span};

/// One edit: replace `span` (possibly empty, for a pure insertion) with
/// `replacement`. Edits within one file must not overlap; [`Overlay::push`]
/// enforces this.
#[derive(Debug, Clone)]
pub struct OverlayEntry {
    pub span: Span,
    pub replacement: String,
}

#[derive(Debug, Default)]
pub struct Overlay {
    by_file: BTreeMap<FileId, Vec<OverlayEntry>>,
}

impl Overlay {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an edit. Panics are avoided in favor of returning `false` for
    /// an overlapping edit, since overlap indicates two rewrite rules fired
    /// on the same construct — a bug in an earlier phase, not a condition a
    /// single file's rewrite should die on (spec.md §4.13 edge case).
    pub fn push(&mut self, file: FileId, entry: OverlayEntry) -> bool {
        let entries = self.by_file.entry(file).or_default();
        if entries.iter().any(|e| spans_overlap(e.span, entry.span)) {
            return false;
        }
        entries.push(entry);
        true
    }

    #[must_use]
    pub fn files(&self) -> impl Iterator<Item = FileId> + '_ {
        self.by_file.keys().copied()
    }

    /// Renders `original` with every recorded edit for `file` applied, in
    /// span-start order. Overlapping insertions at the exact same offset
    /// are applied in the order they were pushed.
    #[must_use]
    pub fn render(&self, file: FileId, original: &[u8]) -> Vec<u8> {
        let Some(entries) = self.by_file.get(&file) else {
            return original.to_vec();
        };
        let mut sorted: Vec<&OverlayEntry> = entries.iter().collect();
        sorted.sort_by_key(|e| (e.span.start, e.span.end));

        let mut out = Vec::with_capacity(original.len());
        let mut cursor = 0u32;
        for entry in sorted {
            let start = entry.span.start.min(original.len() as u32);
            if start > cursor {
                out.extend_from_slice(&original[cursor as usize..start as usize]);
            }
            out.extend_from_slice(entry.replacement.as_bytes());
            cursor = entry.span.end.max(cursor).min(original.len() as u32);
        }
        if (cursor as usize) < original.len() {
            out.extend_from_slice(&original[cursor as usize..]);
        }
        out
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_file.is_empty()
    }
}

fn spans_overlap(a: Span, b: Span) -> bool {
    a.start < b.end && b.start < a.end
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_single_insertion() {
        let mut overlay = Overlay::new();
        overlay.push(
            0,
            OverlayEntry {
                span: Span::new(7, 7),
                replacement: "X".to_string(),
            },
        );
        let out = overlay.render(0, b"package app");
        assert_eq!(out, b"package Xapp");
    }

    #[test]
    fn rejects_overlapping_edits() {
        let mut overlay = Overlay::new();
        assert!(overlay.push(
            0,
            OverlayEntry {
                span: Span::new(0, 5),
                replacement: "a".to_string(),
            }
        ));
        assert!(!overlay.push(
            0,
            OverlayEntry {
                span: Span::new(3, 8),
                replacement: "b".to_string(),
            }
        ));
    }

    #[test]
    fn untouched_file_renders_unchanged() {
        let overlay = Overlay::new();
        assert_eq!(overlay.render(0, b"hello"), b"hello");
    }

    #[test]
    fn renders_replacement_spanning_multiple_bytes() {
        let mut overlay = Overlay::new();
        overlay.push(
            0,
            OverlayEntry {
                span: Span::new(0, 7),
                replacement: "module".to_string(),
            },
        );
        let out = overlay.render(0, b"package app");
        assert_eq!(out, b"module app");
    }
}
