//! # appc-core
//!
//! Parser, resolver, schema extractor and source-to-source rewriter for the
//! app-tree compiler front-end: the part of the pipeline that turns a
//! developer's cloud-service source tree into a validated, annotated app
//! tree plus an overlay of rewritten files ready to hand to the external
//! build toolchain.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         PIPELINE STAGES                          │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  source tree ─► package collector ─► name resolver               │
//! │                      (C2)                (C3)                    │
//! │                                            │                     │
//! │                 directive/tag parser ◄─────┘                    │
//! │                         (C4)                                     │
//! │                          │                                       │
//! │              ┌───────────┴───────────┐                           │
//! │              ▼                       ▼                           │
//! │      schema extractor        resource registry + dispatcher      │
//! │           (C5)                     (C6 / C7)                     │
//! │                                       │                           │
//! │                            endpoint & service discovery (C8)      │
//! │                                       │                           │
//! │                             reference classifier (C9)             │
//! │                                       │                           │
//! │                              constant evaluator (C10)             │
//! │                                       │                           │
//! │                               app validator (C11)                │
//! │                                       │                           │
//! │                   ┌───────────────────┼───────────────────┐       │
//! │                   ▼                   ▼                   ▼       │
//! │         metadata emitter (C12)  overlay rewriter (C13)  sensitive │
//! │                                                        analyzer  │
//! │                                                          (C14)   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The pipeline is single-threaded and cooperative-sequential (see
//! [`pipeline`]): each stage runs to completion before the next begins, and
//! iteration order within a stage is always deterministic.

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod ast;
pub mod buildtags;
pub mod config;
pub mod consteval;
pub mod dispatch;
pub mod diagnostics;
pub mod directive;
pub mod endpoint;
pub mod error;
pub mod lexer;
pub mod manifest;
pub mod metadata;
pub mod overlay;
pub mod package;
pub mod parser;
pub mod pipeline;
pub mod refs;
pub mod registry;
pub mod resolve;
pub mod resources;
pub mod schema;
pub mod sensitive;
pub mod source;
pub mod templates;
pub mod token;
pub mod validate;

// Re-exports
pub use config::{ConfigError, PipelineConfig};
pub use diagnostics::{Diagnostic, DiagnosticBuilder, DiagnosticList, Severity};
pub use error::PipelineError;
pub use metadata::Metadata;
pub use overlay::{Overlay, OverlayEntry};
pub use pipeline::{Pipeline, PipelineOutput};
pub use schema::{Decl, Field, Schema, SchemaTable, Type};
pub use source::{LineIndex, Position, SourceFile};

/// Crate version, as reported in the metadata document.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Fatal diagnostic threshold per spec.md §7 ("Propagation policy").
pub const DEFAULT_DIAGNOSTIC_THRESHOLD: usize = 10;

/// Convenience re-exports for consumers wiring up the whole pipeline.
pub mod prelude {
    pub use crate::config::PipelineConfig;
    pub use crate::diagnostics::{Diagnostic, DiagnosticList, Severity};
    pub use crate::error::PipelineError;
    pub use crate::metadata::Metadata;
    pub use crate::overlay::Overlay;
    pub use crate::pipeline::{Pipeline, PipelineOutput};
    pub use crate::schema::SchemaTable;
    pub use crate::source::Position;
}
