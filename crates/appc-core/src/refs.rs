//! C9: Reference classifier. Walks the call/selector expressions C3 already
//! found and classifies each one that touches a resource or API construct
//! (spec.md §4.9's Reference kind enum).

use crate::ast::NodeId;
use crate::endpoint::EndpointId;
use crate::source::{FileId, Position};

/// Index into one of the kind-specific resource tables owned by
/// [`crate::dispatch`]'s output, so a reference can point back at the
/// resource it touches without every reference type needing its own enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceRef {
    SqlDb(u32),
    PubsubTopic(u32),
    PubsubSubscription(u32),
    CacheCluster(u32),
    CacheKeyspace(u32),
    Cron(u32),
    Secrets(u32),
    ConfigLoad(u32),
}

/// spec.md §4.9's Reference kind enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    EndpointDef,
    EndpointRef,
    SqldbCall,
    LogCall,
    SecretsBlock,
    CronDef,
    PubsubTopicDef,
    PubsubPublish,
    PubsubSubscribe,
    CacheClusterDef,
    CacheKeyspaceDef,
    ConfigLoad,
}

/// One classified use site, keyed in [`crate::source::SourceFile::references`]
/// by the AST node id of the expression it was found at.
#[derive(Debug, Clone)]
pub struct Reference {
    pub kind: ReferenceKind,
    pub node: NodeId,
    /// The file this reference occurs in, so a later whole-program check can
    /// map it back to a declaring package/service without re-walking the AST.
    pub file: FileId,
    pub position: Position,
    pub resource: Option<ResourceRef>,
    /// The endpoint this reference occurs inside of (for `EndpointRef`
    /// cross-service calls) or defines (for `EndpointDef`).
    pub endpoint: Option<EndpointId>,
    /// The qualified function/method name the reference resolved to, kept
    /// for diagnostics and metadata emission (e.g. `sqldb.Exec`).
    pub callee: String,
}

impl Reference {
    #[must_use]
    pub fn new(kind: ReferenceKind, node: NodeId, file: FileId, position: Position, callee: impl Into<String>) -> Self {
        Self {
            kind,
            node,
            file,
            position,
            resource: None,
            endpoint: None,
            callee: callee.into(),
        }
    }

    #[must_use]
    pub fn with_resource(mut self, resource: ResourceRef) -> Self {
        self.resource = Some(resource);
        self
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: EndpointId) -> Self {
        self.endpoint = Some(endpoint);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_chain_sets_optional_fields() {
        let r = Reference::new(ReferenceKind::SqldbCall, 7, 0, Position::new(0, 0, 1, 1), "sqldb.Exec")
            .with_resource(ResourceRef::SqlDb(2))
            .with_endpoint(5);
        assert_eq!(r.resource, Some(ResourceRef::SqlDb(2)));
        assert_eq!(r.endpoint, Some(5));
        assert_eq!(r.callee, "sqldb.Exec");
    }
}
