//! `config.Load[T]()` resource: one per package, wrapping that package's
//! top-level config schema (spec.md §4.6, §9 Open Question #2).

use crate::schema::Type;
use crate::source::Position;

#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub package_import_path: String,
    pub root_type: Type,
    pub position: Position,
}
