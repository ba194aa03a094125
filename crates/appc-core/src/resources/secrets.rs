//! Secrets block: a package-level `var secrets struct { ... }` value decl
//! whose field names become secret names threaded through to `Package`
//! (spec.md §4.6, §4.9's `secrets-block` reference kind).

use crate::source::Position;

#[derive(Debug, Clone)]
pub struct SecretsBlock {
    pub package_import_path: String,
    pub names: Vec<String>,
    pub position: Position,
}
