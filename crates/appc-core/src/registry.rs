//! C6: Resource registry. A static table mapping `(import path, constructor
//! identifier, type-arg arity)` to the resource kind it constructs, so C7's
//! dispatcher can recognize a call site without hardcoding package paths
//! inline (spec.md §4.6).

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    SqlDatabase,
    PubsubTopic,
    PubsubSubscription,
    CacheCluster,
    CacheKeyspace,
    Cron,
    Secrets,
    ConfigLoad,
}

#[derive(Debug, Clone, Copy)]
pub struct ConstructorEntry {
    pub import_path: &'static str,
    pub func_name: &'static str,
    /// `None` matches any arity; `Some(n)` requires exactly `n` type args.
    pub type_arg_arity: Option<usize>,
    pub kind: ResourceKind,
}

/// The static constructor table (spec.md §4.6's resource kinds). Ordered by
/// import path for readability; lookup does a linear scan since the table
/// is small and fixed at compile time.
pub const CONSTRUCTORS: &[ConstructorEntry] = &[
    ConstructorEntry {
        import_path: "encore.dev/storage/sqldb",
        func_name: "NewDatabase",
        type_arg_arity: Some(0),
        kind: ResourceKind::SqlDatabase,
    },
    ConstructorEntry {
        import_path: "encore.dev/pubsub",
        func_name: "NewTopic",
        type_arg_arity: Some(1),
        kind: ResourceKind::PubsubTopic,
    },
    ConstructorEntry {
        import_path: "encore.dev/pubsub",
        func_name: "NewSubscription",
        type_arg_arity: Some(1),
        kind: ResourceKind::PubsubSubscription,
    },
    ConstructorEntry {
        import_path: "encore.dev/storage/cache",
        func_name: "NewCluster",
        type_arg_arity: Some(0),
        kind: ResourceKind::CacheCluster,
    },
    ConstructorEntry {
        import_path: "encore.dev/storage/cache",
        func_name: "NewStringKeyspace",
        type_arg_arity: Some(1),
        kind: ResourceKind::CacheKeyspace,
    },
    ConstructorEntry {
        import_path: "encore.dev/storage/cache",
        func_name: "NewIntKeyspace",
        type_arg_arity: Some(1),
        kind: ResourceKind::CacheKeyspace,
    },
    ConstructorEntry {
        import_path: "encore.dev/storage/cache",
        func_name: "NewFloatKeyspace",
        type_arg_arity: Some(1),
        kind: ResourceKind::CacheKeyspace,
    },
    ConstructorEntry {
        import_path: "encore.dev/storage/cache",
        func_name: "NewStructKeyspace",
        type_arg_arity: Some(2),
        kind: ResourceKind::CacheKeyspace,
    },
    ConstructorEntry {
        import_path: "encore.dev/storage/cache",
        func_name: "NewListKeyspace",
        type_arg_arity: Some(2),
        kind: ResourceKind::CacheKeyspace,
    },
    ConstructorEntry {
        import_path: "encore.dev/config",
        func_name: "Load",
        type_arg_arity: Some(1),
        kind: ResourceKind::ConfigLoad,
    },
];

/// Looks up the resource kind a call to `(import_path, func_name)` with
/// `type_arg_count` type arguments constructs, if any.
#[must_use]
pub fn lookup(import_path: &str, func_name: &str, type_arg_count: usize) -> Option<ResourceKind> {
    CONSTRUCTORS
        .iter()
        .find(|e| {
            e.import_path == import_path
                && e.func_name == func_name
                && match e.type_arg_arity {
                    None => true,
                    Some(n) => n == type_arg_count,
                }
        })
        .map(|e| e.kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_pubsub_topic_constructor() {
        let kind = lookup("encore.dev/pubsub", "NewTopic", 1);
        assert_eq!(kind, Some(ResourceKind::PubsubTopic));
    }

    #[test]
    fn arity_mismatch_does_not_match() {
        let kind = lookup("encore.dev/pubsub", "NewTopic", 0);
        assert_eq!(kind, None);
    }

    #[test]
    fn unknown_import_path_returns_none() {
        assert_eq!(lookup("fmt", "Println", 0), None);
    }
}
