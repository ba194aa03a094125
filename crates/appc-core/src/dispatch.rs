//! C7: Resource parser dispatcher. For every call site C3 found that the
//! registry (C6) recognizes as a resource constructor, parses that call's
//! arguments into the resource's typed form and records a reference.
//! Per-call-site parsing runs behind `catch_unwind` so one malformed
//! constructor call cannot abort the whole package (spec.md §4.7, grounded
//! in the teacher's `LintVisitor::check_node` panic boundary).

use std::panic::{self, AssertUnwindSafe};

use crate::ast::ExprKind;
use crate::diagnostics::{Diagnostic, DiagnosticList};
use crate::refs::{Reference, ReferenceKind, ResourceRef};
use crate::registry::{self, ResourceKind};
use crate::resolve::{CalleeShape, CallSite};
use crate::resources::cache::{CacheCluster, CacheKeyspace, EvictionPolicy, KeyspaceValueKind};
use crate::resources::config::ConfigLoad;
use crate::resources::cron::{self, CronJob};
use crate::resources::pubsub::{DeliveryGuarantee, PubsubTopic, Subscription};
use crate::schema::Type;
use crate::source::Position;

/// Accumulated, per-app resource tables. Indices into each `Vec` are the
/// `u32` payload of the matching [`crate::refs::ResourceRef`] variant.
#[derive(Debug, Default)]
pub struct ResourceTables {
    pub sql_databases: Vec<String>,
    pub pubsub_topics: Vec<PubsubTopic>,
    pub pubsub_subscriptions: Vec<Subscription>,
    pub cache_clusters: Vec<CacheCluster>,
    pub cache_keyspaces: Vec<CacheKeyspace>,
    pub cron_jobs: Vec<CronJob>,
    pub config_loads: Vec<ConfigLoad>,
}

/// One call site, already known to be a composite-literal-bearing
/// constructor invocation, plus the information the dispatcher needs beyond
/// what `CallSite` tracks: the raw argument expressions, when the callee
/// expression carried explicit type arguments their extracted schema types
/// (e.g. the `Msg` in `pubsub.NewTopic[Msg](...)`), the import path of the
/// package the call occurs in, and (for subscription calls) the resolved
/// handler reference.
pub struct DispatchInput<'a> {
    pub call: &'a CallSite,
    pub type_args: Vec<Type>,
    pub package_import_path: &'a str,
    /// `(handler function name, cross-package import path if qualified)`,
    /// pre-resolved while the package's import map was still in scope.
    pub handler_ref: (String, Option<String>),
}

pub struct DispatchOutput {
    pub tables: ResourceTables,
    pub references: Vec<Reference>,
    /// `(resource, declaring package import path, declaration position)`
    /// for every dispatched resource, in dispatch order — lets a later
    /// whole-program check map a resource back to the package it lives in
    /// without threading package context into every resource struct.
    pub resource_origins: Vec<(ResourceRef, String, Position)>,
}

pub fn dispatch(inputs: Vec<DispatchInput<'_>>, diags: &mut DiagnosticList) -> DispatchOutput {
    let mut tables = ResourceTables::default();
    let mut references = Vec::new();
    let mut resource_origins = Vec::new();

    for input in inputs {
        let (import_path, func_name) = match callee_path(&input.call.callee) {
            Some(p) => p,
            None => continue,
        };
        let Some(kind) = registry::lookup(import_path, func_name, input.type_args.len()) else {
            continue;
        };

        let call = input.call;
        let package_import_path = input.package_import_path;
        let result = panic::catch_unwind(AssertUnwindSafe(|| dispatch_one(kind, &input, call.position)));
        match result {
            Ok(Ok(outcome)) => apply_outcome(outcome, call, package_import_path, &mut tables, &mut references, &mut resource_origins),
            Ok(Err(diag)) => diags.report(diag),
            Err(_) => diags.report(Diagnostic::error(
                call.position,
                format!("internal error parsing {func_name} call"),
            )),
        }
    }

    DispatchOutput { tables, references, resource_origins }
}

enum Outcome {
    SqlDatabase(String),
    PubsubTopic(PubsubTopic),
    PubsubSubscription(Subscription),
    CacheCluster(CacheCluster),
    CacheKeyspace(CacheKeyspace),
    Cron(CronJob),
    ConfigLoad(ConfigLoad),
}

fn apply_outcome(
    outcome: Outcome,
    call: &CallSite,
    package_import_path: &str,
    tables: &mut ResourceTables,
    refs: &mut Vec<Reference>,
    resource_origins: &mut Vec<(ResourceRef, String, Position)>,
) {
    let (kind, resource) = match outcome {
        Outcome::SqlDatabase(name) => {
            tables.sql_databases.push(name);
            (
                ReferenceKind::SqldbCall,
                ResourceRef::SqlDb((tables.sql_databases.len() - 1) as u32),
            )
        }
        Outcome::PubsubTopic(t) => {
            tables.pubsub_topics.push(t);
            (
                ReferenceKind::PubsubTopicDef,
                ResourceRef::PubsubTopic((tables.pubsub_topics.len() - 1) as u32),
            )
        }
        Outcome::PubsubSubscription(s) => {
            tables.pubsub_subscriptions.push(s);
            (
                ReferenceKind::PubsubSubscribe,
                ResourceRef::PubsubSubscription((tables.pubsub_subscriptions.len() - 1) as u32),
            )
        }
        Outcome::CacheCluster(c) => {
            tables.cache_clusters.push(c);
            (
                ReferenceKind::CacheClusterDef,
                ResourceRef::CacheCluster((tables.cache_clusters.len() - 1) as u32),
            )
        }
        Outcome::CacheKeyspace(k) => {
            tables.cache_keyspaces.push(k);
            (
                ReferenceKind::CacheKeyspaceDef,
                ResourceRef::CacheKeyspace((tables.cache_keyspaces.len() - 1) as u32),
            )
        }
        Outcome::Cron(c) => {
            tables.cron_jobs.push(c);
            (
                ReferenceKind::CronDef,
                ResourceRef::Cron((tables.cron_jobs.len() - 1) as u32),
            )
        }
        Outcome::ConfigLoad(c) => {
            tables.config_loads.push(c);
            (
                ReferenceKind::ConfigLoad,
                ResourceRef::ConfigLoad((tables.config_loads.len() - 1) as u32),
            )
        }
    };
    resource_origins.push((resource, package_import_path.to_string(), call.position));
    refs.push(
        Reference::new(kind, call.node, call.file, call.position, call.enclosing_func.clone().unwrap_or_default())
            .with_resource(resource),
    );
}

fn dispatch_one(kind: ResourceKind, input: &DispatchInput<'_>, position: Position) -> Result<Outcome, Diagnostic> {
    let call = input.call;
    match kind {
        ResourceKind::SqlDatabase => {
            let name = string_literal_arg(call, 0)
                .ok_or_else(|| Diagnostic::error(position, "sqldb.NewDatabase requires a string literal name"))?;
            Ok(Outcome::SqlDatabase(name))
        }
        ResourceKind::PubsubTopic => {
            let name = string_literal_arg(call, 0)
                .ok_or_else(|| Diagnostic::error(position, "pubsub.NewTopic requires a string literal name"))?;
            let message_type = input
                .type_args
                .first()
                .cloned()
                .unwrap_or(Type::Builtin(crate::schema::Builtin::Any));
            Ok(Outcome::PubsubTopic(PubsubTopic {
                name,
                message_type,
                delivery_guarantee: DeliveryGuarantee::AtLeastOnce,
                ordering_key: None,
                position,
            }))
        }
        ResourceKind::PubsubSubscription => {
            let name = string_literal_arg(call, 0)
                .ok_or_else(|| Diagnostic::error(position, "pubsub.NewSubscription requires a string literal name"))?;
            let (handler_func, handler_package) = input.handler_ref.clone();
            Ok(Outcome::PubsubSubscription(Subscription {
                name,
                topic_name: String::new(),
                handler_func,
                handler_package,
                ack_deadline_seconds: None,
                max_retries: None,
                position,
            }))
        }
        ResourceKind::CacheCluster => {
            let name = string_literal_arg(call, 0)
                .ok_or_else(|| Diagnostic::error(position, "cache.NewCluster requires a string literal name"))?;
            Ok(Outcome::CacheCluster(CacheCluster {
                name,
                eviction_policy: EvictionPolicy::AllKeysLru,
                position,
            }))
        }
        ResourceKind::CacheKeyspace => {
            let key_pattern = string_literal_arg(call, 0).unwrap_or_default();
            let value_kind = match input.type_args.len() {
                2 => KeyspaceValueKind::Struct,
                _ => KeyspaceValueKind::String,
            };
            Ok(Outcome::CacheKeyspace(CacheKeyspace {
                cluster_name: String::new(),
                key_pattern,
                key_type: Type::Builtin(crate::schema::Builtin::String),
                value_kind,
                value_type: input.type_args.last().cloned(),
                position,
            }))
        }
        ResourceKind::Cron => unreachable!("cron jobs are dispatched from directives, not calls"),
        ResourceKind::Secrets => unreachable!("secrets blocks are dispatched from var decls, not calls"),
        ResourceKind::ConfigLoad => Ok(Outcome::ConfigLoad(ConfigLoad {
            package_import_path: input.package_import_path.to_string(),
            root_type: input
                .type_args
                .first()
                .cloned()
                .unwrap_or(Type::Builtin(crate::schema::Builtin::Any)),
            position,
        })),
    }
}

fn callee_path(shape: &CalleeShape) -> Option<(&str, &str)> {
    match shape {
        CalleeShape::Imported { import_path, name } => Some((import_path.as_str(), name.as_str())),
        _ => None,
    }
}

fn string_literal_arg(call: &CallSite, index: usize) -> Option<String> {
    match call.args.get(index).map(|e| &e.kind) {
        Some(ExprKind::String(s)) => Some(s.clone()),
        _ => None,
    }
}

/// Scans a `pubsub.NewSubscription(topic, name, pubsub.SubscriptionConfig{
/// Handler: ... })` call's last composite-literal argument for its `Handler`
/// field and resolves the function it names. A bare identifier
/// (`Handler: MyFunc`) is pinned by Go scoping to the subscribing call's own
/// package, so it resolves with `None`; a package-qualified selector
/// (`Handler: otherpkg.MyFunc`) is resolved against `resolve_import`, the
/// subscribing package's own import map.
pub(crate) fn extract_handler_ref(call: &CallSite, resolve_import: &dyn Fn(&str) -> Option<String>) -> (String, Option<String>) {
    let Some(last) = call.args.last() else {
        return (String::new(), None);
    };
    let ExprKind::CompositeLit(_, elts) = &last.kind else {
        return (String::new(), None);
    };
    for elt in elts {
        let Some(key) = &elt.key else { continue };
        let ExprKind::Ident(key_name) = &key.kind else { continue };
        if key_name != "Handler" {
            continue;
        }
        return match &elt.value.kind {
            ExprKind::Ident(name) => (name.clone(), None),
            ExprKind::Selector(base, name) => {
                if let ExprKind::Ident(alias) = &base.kind {
                    (name.clone(), resolve_import(alias))
                } else {
                    (name.clone(), None)
                }
            }
            _ => (String::new(), None),
        };
    }
    (String::new(), None)
}

/// Builds a directive-derived cron job outside the call-dispatch path, since
/// crons are declared via `//encore:cron` doc comments on an empty func, not
/// via a resource constructor call (spec.md §4.6).
pub fn dispatch_cron_directive(
    directive: &crate::directive::CronDirective,
    package_import_path: &str,
    position: Position,
    diags: &mut DiagnosticList,
) -> CronJob {
    let schedule = cron::parse_schedule(&directive.schedule, position, diags);
    CronJob {
        name: directive.name.clone(),
        title: directive.title.clone(),
        schedule,
        package_import_path: package_import_path.to_string(),
        position,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expr, ExprKind};
    use crate::resolve::CallSite;
    use crate::source::Position;

    fn dummy_callee_expr() -> Expr {
        Expr {
            id: 0,
            span: crate::source::Span::new(0, 0),
            kind: ExprKind::Ident("dummy".to_string()),
        }
    }

    fn string_expr(id: u32, s: &str) -> Expr {
        Expr {
            id,
            span: crate::source::Span::new(0, 0),
            kind: ExprKind::String(s.to_string()),
        }
    }

    #[test]
    fn dispatches_sqldb_new_database() {
        let call = CallSite {
            node: 1,
            file: 0,
            position: Position::new(0, 0, 1, 1),
            callee: CalleeShape::Imported {
                import_path: "encore.dev/storage/sqldb".to_string(),
                name: "NewDatabase".to_string(),
            },
            callee_expr: dummy_callee_expr(),
            args: vec![string_expr(2, "mydb")],
            enclosing_func: None,
        };
        let mut diags = DiagnosticList::new(10);
        let out = dispatch(
            vec![DispatchInput {
                call: &call,
                type_args: Vec::new(),
                package_import_path: "example.com/app/svc",
                handler_ref: (String::new(), None),
            }],
            &mut diags,
        );
        assert_eq!(out.tables.sql_databases, vec!["mydb".to_string()]);
        assert_eq!(out.references.len(), 1);
        assert!(!diags.has_errors());
    }

    #[test]
    fn non_registry_call_is_ignored() {
        let call = CallSite {
            node: 1,
            file: 0,
            position: Position::new(0, 0, 1, 1),
            callee: CalleeShape::Imported {
                import_path: "fmt".to_string(),
                name: "Println".to_string(),
            },
            callee_expr: dummy_callee_expr(),
            args: Vec::new(),
            enclosing_func: None,
        };
        let mut diags = DiagnosticList::new(10);
        let out = dispatch(
            vec![DispatchInput {
                call: &call,
                type_args: Vec::new(),
                package_import_path: "example.com/app/svc",
                handler_ref: (String::new(), None),
            }],
            &mut diags,
        );
        assert!(out.references.is_empty());
    }

    #[test]
    fn cache_struct_keyspace_is_distinguished_from_string_keyspace() {
        let call = CallSite {
            node: 1,
            file: 0,
            position: Position::new(0, 0, 1, 1),
            callee: CalleeShape::Imported {
                import_path: "encore.dev/storage/cache".to_string(),
                name: "NewStructKeyspace".to_string(),
            },
            callee_expr: dummy_callee_expr(),
            args: vec![string_expr(2, "user/:id")],
            enclosing_func: None,
        };
        let mut diags = DiagnosticList::new(10);
        let out = dispatch(
            vec![DispatchInput {
                call: &call,
                type_args: vec![
                    Type::Builtin(crate::schema::Builtin::String),
                    Type::Builtin(crate::schema::Builtin::Int),
                ],
                package_import_path: "example.com/app/svc",
                handler_ref: (String::new(), None),
            }],
            &mut diags,
        );
        let keyspace = &out.tables.cache_keyspaces[0];
        assert_eq!(keyspace.value_kind, KeyspaceValueKind::Struct);
        assert_eq!(
            keyspace.value_type,
            Some(Type::Builtin(crate::schema::Builtin::Int))
        );
    }

    #[test]
    fn missing_name_argument_reports_diagnostic_not_panic() {
        let call = CallSite {
            node: 1,
            file: 0,
            position: Position::new(0, 0, 1, 1),
            callee: CalleeShape::Imported {
                import_path: "encore.dev/storage/sqldb".to_string(),
                name: "NewDatabase".to_string(),
            },
            callee_expr: dummy_callee_expr(),
            args: Vec::new(),
            enclosing_func: None,
        };
        let mut diags = DiagnosticList::new(10);
        let _ = dispatch(
            vec![DispatchInput {
                call: &call,
                type_args: Vec::new(),
                package_import_path: "example.com/app/svc",
                handler_ref: (String::new(), None),
            }],
            &mut diags,
        );
        assert!(diags.has_errors());
    }
}
