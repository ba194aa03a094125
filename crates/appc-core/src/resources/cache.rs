//! Cache cluster and keyspace resources: `cache.NewCluster(name, cfg)` and
//! the typed `cache.NewStringKeyspace[...]`/`cache.NewStructKeyspace[...]`
//! family layered on top of it (spec.md §4.6).

use crate::schema::Type;
use crate::source::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionPolicy {
    AllKeysLru,
    AllKeysLfu,
    NoEviction,
}

#[derive(Debug, Clone)]
pub struct CacheCluster {
    pub name: String,
    pub eviction_policy: EvictionPolicy,
    pub position: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyspaceValueKind {
    String,
    Int,
    Float,
    Struct,
    List,
}

#[derive(Debug, Clone)]
pub struct CacheKeyspace {
    pub cluster_name: String,
    pub key_pattern: String,
    pub key_type: Type,
    pub value_kind: KeyspaceValueKind,
    pub value_type: Option<Type>,
    pub position: Position,
}
