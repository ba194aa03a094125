//! C1: Diagnostic list. Accumulates positioned errors, deduplicates
//! same-position spam, and exposes the bailout mechanism phases use when a
//! fatal condition is reached within a phase (spec.md §2, §5, §7).

use std::collections::HashSet;
use std::fmt;

use crate::error::AbortSentinel;
use crate::source::Position;

/// Severity of a single diagnostic. Only `Error` counts toward the abort
/// threshold; `Warning`/`Hint` are informational and never abort a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Hint,
    Warning,
    Error,
}

impl Severity {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Hint => "hint",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single positioned, human-readable diagnostic (spec.md §7's "Source
/// diagnostic" kind). Display format matches spec.md §7:
/// `<path>:<line>:<col>: <message>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub position: Position,
    pub severity: Severity,
    pub message: String,
    /// Optional secondary position, e.g. the earlier declaration a path
    /// conflict (spec.md §3 scenario) cites.
    pub related: Option<(Position, String)>,
    /// Optional fix-it suggestion text (e.g. the nearest allowed cron
    /// "every" value, spec.md §4.9).
    pub suggestion: Option<String>,
}

impl Diagnostic {
    #[must_use]
    pub fn error(position: Position, message: impl Into<String>) -> Self {
        Self {
            position,
            severity: Severity::Error,
            message: message.into(),
            related: None,
            suggestion: None,
        }
    }

    #[must_use]
    pub fn warning(position: Position, message: impl Into<String>) -> Self {
        Self {
            position,
            severity: Severity::Warning,
            message: message.into(),
            related: None,
            suggestion: None,
        }
    }

    #[must_use]
    pub fn with_related(mut self, position: Position, message: impl Into<String>) -> Self {
        self.related = Some((position, message.into()));
        self
    }

    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Render relative to an already-relativized path string; `Diagnostic`
    /// itself only stores a `FileId`, resolved via the caller's file table.
    #[must_use]
    pub fn format(&self, path: &str) -> String {
        let mut s = format!(
            "{}:{}:{}: {}",
            path, self.position.line, self.position.column, self.message
        );
        if let Some(suggestion) = &self.suggestion {
            s.push_str(&format!(" (suggestion: {suggestion})"));
        }
        s
    }
}

/// Fluent builder mirroring the teacher's `DiagnosticBuilder`, useful when a
/// diagnostic is assembled across several call sites before being pushed.
#[derive(Debug, Default)]
pub struct DiagnosticBuilder {
    position: Option<Position>,
    severity: Severity2,
    message: Option<String>,
    related: Option<(Position, String)>,
    suggestion: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum Severity2 {
    Default,
    Explicit(Severity),
}

impl Default for Severity2 {
    fn default() -> Self {
        Severity2::Default
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DiagnosticBuilderError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

impl DiagnosticBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn at(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    #[must_use]
    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = Severity2::Explicit(severity);
        self
    }

    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn related(mut self, position: Position, message: impl Into<String>) -> Self {
        self.related = Some((position, message.into()));
        self
    }

    #[must_use]
    pub fn suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn build(self) -> Result<Diagnostic, DiagnosticBuilderError> {
        let position = self.position.ok_or(DiagnosticBuilderError::MissingField("position"))?;
        let message = self.message.ok_or(DiagnosticBuilderError::MissingField("message"))?;
        let severity = match self.severity {
            Severity2::Default => Severity::Error,
            Severity2::Explicit(s) => s,
        };
        Ok(Diagnostic {
            position,
            severity,
            message,
            related: self.related,
            suggestion: self.suggestion,
        })
    }
}

/// The accumulator every phase pushes into. Implements spec.md §7's
/// propagation policy: duplicate same-position entries are dropped, the
/// total is capped at `threshold` (default 10), and a phase may explicitly
/// request abort (e.g. after an internal invariant violation).
#[derive(Debug)]
pub struct DiagnosticList {
    diagnostics: Vec<Diagnostic>,
    seen_positions: HashSet<Position>,
    threshold: usize,
    aborted: bool,
}

impl DiagnosticList {
    #[must_use]
    pub fn new(threshold: usize) -> Self {
        Self {
            diagnostics: Vec::new(),
            seen_positions: HashSet::new(),
            threshold,
            aborted: false,
        }
    }

    /// Push a diagnostic. Returns `Err(AbortSentinel)` if this push caused
    /// the accumulator to abort (duplicate position, threshold exceeded);
    /// the caller should propagate the sentinel up to its phase boundary.
    pub(crate) fn push(&mut self, diagnostic: Diagnostic) -> Result<(), AbortSentinel> {
        if self.aborted {
            return Err(AbortSentinel);
        }
        if diagnostic.severity == Severity::Error
            && !self.seen_positions.insert(diagnostic.position)
        {
            // Same-position duplicate: spec.md §7(a), abort without even
            // recording the dup (the first one at that position already is).
            self.aborted = true;
            return Err(AbortSentinel);
        }
        self.diagnostics.push(diagnostic);
        let error_count = self
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count();
        if error_count > self.threshold {
            self.aborted = true;
            return Err(AbortSentinel);
        }
        Ok(())
    }

    /// Non-failing push for call sites that want to keep going regardless of
    /// abort status, checking `is_aborted` at their own phase boundary
    /// instead of per-push.
    pub fn report(&mut self, diagnostic: Diagnostic) {
        let _ = self.push(diagnostic);
    }

    /// Explicit abort request, e.g. after an internal invariant violation
    /// (spec.md §7(c)).
    pub(crate) fn abort(&mut self) -> AbortSentinel {
        self.aborted = true;
        AbortSentinel
    }

    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Consumes the list, returning diagnostics sorted by `(file, line,
    /// column)` — required when packages are parsed in parallel (spec.md
    /// §5) so output ordering stays deterministic regardless of completion
    /// order.
    #[must_use]
    pub fn into_sorted(mut self) -> Vec<Diagnostic> {
        self.diagnostics.sort_by(|a, b| {
            (a.position.file, a.position.line, a.position.column).cmp(&(
                b.position.file,
                b.position.line,
                b.position.column,
            ))
        });
        self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Position;

    fn pos(line: u32) -> Position {
        Position::new(0, 0, line, 1)
    }

    #[test]
    fn dedups_same_position() {
        let mut list = DiagnosticList::new(10);
        list.push(Diagnostic::error(pos(1), "first")).unwrap();
        let result = list.push(Diagnostic::error(pos(1), "dup"));
        assert!(result.is_err());
        assert!(list.is_aborted());
    }

    #[test]
    fn aborts_past_threshold() {
        let mut list = DiagnosticList::new(2);
        list.push(Diagnostic::error(pos(1), "a")).unwrap();
        list.push(Diagnostic::error(pos(2), "b")).unwrap();
        let result = list.push(Diagnostic::error(pos(3), "c"));
        assert!(result.is_err());
    }

    #[test]
    fn warnings_do_not_count_toward_threshold() {
        let mut list = DiagnosticList::new(1);
        list.push(Diagnostic::warning(pos(1), "w1")).unwrap();
        list.push(Diagnostic::warning(pos(2), "w2")).unwrap();
        list.push(Diagnostic::error(pos(3), "e1")).unwrap();
        assert!(!list.is_aborted());
    }

    #[test]
    fn sorted_output_is_deterministic() {
        let mut list = DiagnosticList::new(10);
        list.push(Diagnostic::error(pos(5), "late")).unwrap();
        list.push(Diagnostic::error(pos(1), "early")).unwrap();
        let sorted = list.into_sorted();
        assert_eq!(sorted[0].message, "early");
        assert_eq!(sorted[1].message, "late");
    }

    #[test]
    fn builder_requires_position_and_message() {
        let err = DiagnosticBuilder::new().message("no position").build();
        assert!(matches!(err, Err(DiagnosticBuilderError::MissingField("position"))));
    }

    proptest::proptest! {
        #[test]
        fn builder_roundtrips_message(line in 1u32..10_000, msg in "[a-zA-Z0-9 ]{1,40}") {
            let d = DiagnosticBuilder::new()
                .at(Position::new(0, 0, line, 1))
                .message(msg.clone())
                .build()
                .unwrap();
            proptest::prop_assert_eq!(d.message, msg);
            proptest::prop_assert_eq!(d.position.line, line);
        }
    }
}
