//! Ambient, non-diagnostic error type. `Diagnostic`s (see [`crate::diagnostics`])
//! carry source-position errors that accumulate across a phase; `PipelineError`
//! carries the three failure kinds from spec.md §7 that abort the run outright
//! (structural, build-tool, internal), plus the accumulated-diagnostics case
//! itself, so that [`crate::pipeline::Pipeline::run`] has a single `Result` type.

use std::path::PathBuf;

use crate::diagnostics::Diagnostic;

/// Errors `Pipeline::run` can return. Mirrors spec.md §7's four error kinds,
/// minus "source diagnostic" which is represented by [`PipelineError::Diagnostics`]
/// once the accumulator aborts rather than by a variant per diagnostic.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The diagnostic accumulator aborted: duplicate position, threshold
    /// exceeded, or a phase explicitly requested abort after an invariant
    /// violation. Carries everything accumulated up to that point.
    #[error("{} diagnostic(s), aborting", .0.len())]
    Diagnostics(Vec<Diagnostic>),

    /// Missing manifest, unreadable tree, or any other I/O failure reading
    /// app/runtime module inputs. Terminates the pipeline with the raw error.
    #[error("structural error reading {path}: {source}")]
    Structural {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The external build tool exited non-zero. The core never invokes the
    /// toolchain itself (spec.md §1); this variant exists so a caller that
    /// does invoke it can round-trip the failure back through the same
    /// error surface after path-rewriting its stderr blob (spec.md §4.12).
    #[error("build tool failed: {stderr}")]
    BuildTool { stderr: String },

    /// An internal invariant was violated in a way that could not be
    /// converted to a diagnostic at the point it was discovered (the
    /// common case is handled by catching it as a diagnostic instead; this
    /// variant is for violations discovered outside any phase boundary,
    /// e.g. in the pipeline driver itself).
    #[error("internal invariant violation: {0}")]
    Internal(String),
}

impl From<std::io::Error> for PipelineError {
    fn from(source: std::io::Error) -> Self {
        PipelineError::Structural {
            path: PathBuf::new(),
            source,
        }
    }
}

/// Sentinel used by a phase to unwind out of deeply nested recursion when the
/// diagnostic accumulator aborts (spec.md §5, "a phase may 'abort' by raising
/// a special sentinel that the phase driver catches"). Never escapes the top
/// of the pipeline; [`crate::pipeline::Pipeline::run`] always converts it to
/// [`PipelineError::Diagnostics`] before returning.
#[derive(Debug)]
pub(crate) struct AbortSentinel;

impl std::fmt::Display for AbortSentinel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "diagnostic accumulator aborted")
    }
}

impl std::error::Error for AbortSentinel {}

pub(crate) type PhaseResult<T> = Result<T, AbortSentinel>;
