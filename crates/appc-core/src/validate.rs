//! C11: App validator. Runs the whole-program checks that cannot be done
//! while a single package or resource is still being processed in
//! isolation — they need every service, endpoint, resource and reference
//! collected first (spec.md §4.10).

use std::collections::{HashMap, HashSet};

use crate::diagnostics::{Diagnostic, DiagnosticList};
use crate::dispatch::ResourceTables;
use crate::endpoint::{Endpoint, ServiceId, Visibility};
use crate::refs::{Reference, ResourceRef};
use crate::schema::{DeclId, SchemaTable, Type};
use crate::source::{FileId, Position};

/// Input bundle gathered from the earlier phases; validator functions only
/// read from it.
pub struct ValidateInput<'a> {
    pub endpoints: &'a [Endpoint],
    /// Whether any function in the app carries an `//encore:authhandler`
    /// directive.
    pub auth_handler_declared: bool,
    pub resources: &'a ResourceTables,
    /// Declaring package import path and position for every dispatched
    /// resource, keyed by the same [`ResourceRef`] a [`Reference`] points at.
    pub resource_origins: &'a HashMap<ResourceRef, (String, Position)>,
    pub references: &'a [Reference],
    /// Package import path -> the service it owns, or `None` if the package
    /// owns no service (declares no endpoint).
    pub package_service: &'a HashMap<String, Option<ServiceId>>,
    pub file_package: &'a HashMap<FileId, String>,
    pub schema_table: &'a SchemaTable,
}

/// Runs all six whole-program checks from spec.md §4.10 and accumulates
/// their diagnostics. None of the checks is fatal on its own; the
/// pipeline's overall abort threshold (spec.md §7) governs whether
/// validation failures halt later phases.
pub fn validate_app(input: &ValidateInput<'_>, diags: &mut DiagnosticList) {
    check_auth_endpoint_requires_handler(input, diags);
    check_resources_declared_in_service_packages(input, diags);
    check_cross_service_resource_references(input, diags);
    check_cron_jobs(input, diags);
    check_subscription_handler_same_service(input, diags);
    check_no_nested_config_value(input, diags);
}

/// 1. If any endpoint uses access mode `auth` and no auth handler is
/// declared, emit one diagnostic on the first such endpoint.
fn check_auth_endpoint_requires_handler(input: &ValidateInput<'_>, diags: &mut DiagnosticList) {
    if input.auth_handler_declared {
        return;
    }
    if let Some(first) = input.endpoints.iter().find(|e| e.visibility == Visibility::Auth) {
        diags.report(Diagnostic::error(
            first.position,
            format!(
                "endpoint {:?} uses access mode auth but the app declares no //encore:authhandler",
                first.name
            ),
        ));
    }
}

/// 2. If any resource is declared in a package whose owning service is
/// nil, emit a diagnostic per resource.
fn check_resources_declared_in_service_packages(input: &ValidateInput<'_>, diags: &mut DiagnosticList) {
    for (_resource, (package, position)) in input.resource_origins {
        let owns_service = input.package_service.get(package).copied().flatten().is_some();
        if !owns_service {
            diags.report(Diagnostic::error(
                *position,
                format!("resource declared in package {package:?}, which owns no service"),
            ));
        }
    }
}

/// 3. For every reference whose target is a resource, if the target
/// resource's file is in a different service than the referring file,
/// emit a diagnostic.
fn check_cross_service_resource_references(input: &ValidateInput<'_>, diags: &mut DiagnosticList) {
    for reference in input.references {
        let Some(resource) = reference.resource else { continue };
        let Some((target_package, _)) = input.resource_origins.get(&resource) else { continue };
        let Some(referrer_package) = input.file_package.get(&reference.file) else { continue };
        let target_service = input.package_service.get(target_package).copied().flatten();
        let referrer_service = input.package_service.get(referrer_package).copied().flatten();
        if let (Some(target), Some(referrer)) = (target_service, referrer_service) {
            if target != referrer {
                diags.report(Diagnostic::error(
                    reference.position,
                    format!("reference to a resource declared in package {target_package:?} crosses into a different service"),
                ));
            }
        }
    }
}

/// 4. For every cron job, ensure its endpoint is in an existing service
/// and the job ID is unique within the app. `//encore:cron` targets the
/// function it annotates directly, so the job's declaring package is its
/// "endpoint" for the service-membership half of this check.
fn check_cron_jobs(input: &ValidateInput<'_>, diags: &mut DiagnosticList) {
    let mut seen: HashSet<&str> = HashSet::new();
    for job in &input.resources.cron_jobs {
        if !seen.insert(job.name.as_str()) {
            diags.report(Diagnostic::error(job.position, format!("duplicate cron job name {:?}", job.name)));
        }
        let owns_service = input
            .package_service
            .get(&job.package_import_path)
            .copied()
            .flatten()
            .is_some();
        if !owns_service {
            diags.report(Diagnostic::error(
                job.position,
                format!(
                    "cron job {:?} is declared in package {:?}, which owns no service",
                    job.name, job.package_import_path
                ),
            ));
        }
    }
}

/// 5. For every topic, ensure the subscriber's handler is defined in the
/// same service as the subscription call. A bare-identifier handler
/// (`Handler: MyFunc`) is pinned by Go scoping to the subscribing call's
/// own package and trivially satisfies this; only a package-qualified
/// handler (`Handler: otherpkg.MyFunc`) needs an actual cross-package
/// comparison.
fn check_subscription_handler_same_service(input: &ValidateInput<'_>, diags: &mut DiagnosticList) {
    for (idx, sub) in input.resources.pubsub_subscriptions.iter().enumerate() {
        let Some(handler_package) = &sub.handler_package else { continue };
        let resource = ResourceRef::PubsubSubscription(idx as u32);
        let Some((subscribing_package, _)) = input.resource_origins.get(&resource) else { continue };
        let handler_service = input.package_service.get(handler_package).copied().flatten();
        let subscribing_service = input.package_service.get(subscribing_package).copied().flatten();
        if handler_service != subscribing_service {
            diags.report(Diagnostic::error(
                sub.position,
                format!(
                    "subscription {:?} handler is declared in package {:?}, a different service than the subscribing call",
                    sub.name, handler_package
                ),
            ));
        }
    }
}

/// 6. For every config load, ensure no nested `Value[Value[T]]` in the
/// loaded type, walking schema types; a list-of-values wrapper is
/// permitted as the single exception (spec.md §9 Open Question #2). This
/// walks through `Type::Named` indirection, catching nesting hidden
/// behind a type alias that the syntactic check in `schema::extract_type_expr`
/// cannot see at construction time.
fn check_no_nested_config_value(input: &ValidateInput<'_>, diags: &mut DiagnosticList) {
    for load in &input.resources.config_loads {
        let mut visited = HashSet::new();
        walk_for_nested_config_value(&load.root_type, input.schema_table, &mut visited, load.position, diags);
    }
}

fn walk_for_nested_config_value(
    ty: &Type,
    table: &SchemaTable,
    visited: &mut HashSet<DeclId>,
    position: Position,
    diags: &mut DiagnosticList,
) {
    match ty {
        Type::ConfigWrapper { elem, is_list } => {
            if let Type::ConfigWrapper { is_list: inner_is_list, .. } = resolve_through_named(elem, table, 0) {
                if !(*is_list && !inner_is_list) {
                    diags.report(Diagnostic::error(position, "nested config.Value[config.Value[T]] is not allowed"));
                }
            }
            walk_for_nested_config_value(elem, table, visited, position, diags);
        }
        Type::List(inner) | Type::Pointer(inner) => walk_for_nested_config_value(inner, table, visited, position, diags),
        Type::Map(_, value) => walk_for_nested_config_value(value, table, visited, position, diags),
        Type::Struct { fields } => {
            for field in fields {
                walk_for_nested_config_value(&field.ty, table, visited, position, diags);
            }
        }
        Type::Named { decl, .. } => {
            if visited.insert(*decl) {
                if let Some(root) = table.get(*decl).root.clone() {
                    walk_for_nested_config_value(&root, table, visited, position, diags);
                }
            }
        }
        _ => {}
    }
}

/// Follows `Type::Named` indirection up to a fixed depth, so a wrapper
/// hidden behind a type alias is still visible to the nesting check above.
fn resolve_through_named(ty: &Type, table: &SchemaTable, depth: u32) -> Type {
    if depth > 16 {
        return ty.clone();
    }
    if let Type::Named { decl, .. } = ty {
        if let Some(root) = &table.get(*decl).root {
            return resolve_through_named(root, table, depth + 1);
        }
    }
    ty.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::{EndpointPath, HttpMethod};
    use crate::refs::ReferenceKind;
    use crate::resources::cron::{CronJob, Schedule};
    use crate::resources::pubsub::Subscription;
    use crate::schema::Builtin;

    fn pos() -> Position {
        Position::new(0, 0, 1, 1)
    }

    fn endpoint(id: u32, service: ServiceId, visibility: Visibility) -> Endpoint {
        Endpoint {
            id,
            service,
            name: format!("Endpoint{id}"),
            doc: None,
            visibility,
            raw: false,
            methods: vec![HttpMethod::Get],
            path: EndpointPath::default(),
            request_type: None,
            response_type: None,
            position: pos(),
        }
    }

    struct Fixture {
        resources: ResourceTables,
        resource_origins: HashMap<ResourceRef, (String, Position)>,
        package_service: HashMap<String, Option<ServiceId>>,
        file_package: HashMap<FileId, String>,
        schema_table: SchemaTable,
        endpoints: Vec<Endpoint>,
    }

    fn fixture() -> Fixture {
        Fixture {
            resources: ResourceTables::default(),
            resource_origins: HashMap::new(),
            package_service: HashMap::new(),
            file_package: HashMap::new(),
            schema_table: SchemaTable::new(),
            endpoints: Vec::new(),
        }
    }

    fn input(f: &Fixture, auth_handler_declared: bool) -> ValidateInput<'_> {
        ValidateInput {
            endpoints: &f.endpoints,
            auth_handler_declared,
            resources: &f.resources,
            resource_origins: &f.resource_origins,
            references: &[],
            package_service: &f.package_service,
            file_package: &f.file_package,
            schema_table: &f.schema_table,
        }
    }

    #[test]
    fn flags_auth_endpoint_with_no_auth_handler() {
        let mut f = fixture();
        f.endpoints.push(endpoint(0, 0, Visibility::Public));
        f.endpoints.push(endpoint(1, 0, Visibility::Auth));
        let mut diags = DiagnosticList::new(10);
        validate_app(&input(&f, false), &mut diags);
        assert!(diags.has_errors());
    }

    #[test]
    fn allows_auth_endpoint_when_auth_handler_declared() {
        let mut f = fixture();
        f.endpoints.push(endpoint(0, 0, Visibility::Auth));
        let mut diags = DiagnosticList::new(10);
        validate_app(&input(&f, true), &mut diags);
        assert!(!diags.has_errors());
    }

    #[test]
    fn flags_resource_in_package_with_no_service() {
        let mut f = fixture();
        f.resources.sql_databases.push("mydb".to_string());
        f.resource_origins
            .insert(ResourceRef::SqlDb(0), ("app/db".to_string(), pos()));
        f.package_service.insert("app/db".to_string(), None);
        let mut diags = DiagnosticList::new(10);
        validate_app(&input(&f, true), &mut diags);
        assert!(diags.has_errors());
    }

    #[test]
    fn allows_resource_in_package_that_owns_a_service() {
        let mut f = fixture();
        f.resources.sql_databases.push("mydb".to_string());
        f.resource_origins
            .insert(ResourceRef::SqlDb(0), ("app/svc".to_string(), pos()));
        f.package_service.insert("app/svc".to_string(), Some(0));
        let mut diags = DiagnosticList::new(10);
        validate_app(&input(&f, true), &mut diags);
        assert!(!diags.has_errors());
    }

    #[test]
    fn flags_cross_service_resource_reference() {
        let mut f = fixture();
        f.resources.sql_databases.push("mydb".to_string());
        f.resource_origins
            .insert(ResourceRef::SqlDb(0), ("app/db".to_string(), pos()));
        f.package_service.insert("app/db".to_string(), Some(0));
        f.package_service.insert("app/other".to_string(), Some(1));
        f.file_package.insert(7, "app/other".to_string());
        let reference = Reference::new(ReferenceKind::SqldbCall, 1, 7, pos(), "sqldb.Exec")
            .with_resource(ResourceRef::SqlDb(0));
        let refs = vec![reference];
        let input = ValidateInput {
            endpoints: &f.endpoints,
            auth_handler_declared: true,
            resources: &f.resources,
            resource_origins: &f.resource_origins,
            references: &refs,
            package_service: &f.package_service,
            file_package: &f.file_package,
            schema_table: &f.schema_table,
        };
        let mut diags = DiagnosticList::new(10);
        validate_app(&input, &mut diags);
        assert!(diags.has_errors());
    }

    #[test]
    fn allows_same_service_resource_reference() {
        let mut f = fixture();
        f.resources.sql_databases.push("mydb".to_string());
        f.resource_origins
            .insert(ResourceRef::SqlDb(0), ("app/svc".to_string(), pos()));
        f.package_service.insert("app/svc".to_string(), Some(0));
        f.file_package.insert(7, "app/svc".to_string());
        let reference = Reference::new(ReferenceKind::SqldbCall, 1, 7, pos(), "sqldb.Exec")
            .with_resource(ResourceRef::SqlDb(0));
        let refs = vec![reference];
        let input = ValidateInput {
            endpoints: &f.endpoints,
            auth_handler_declared: true,
            resources: &f.resources,
            resource_origins: &f.resource_origins,
            references: &refs,
            package_service: &f.package_service,
            file_package: &f.file_package,
            schema_table: &f.schema_table,
        };
        let mut diags = DiagnosticList::new(10);
        validate_app(&input, &mut diags);
        assert!(!diags.has_errors());
    }

    #[test]
    fn flags_duplicate_cron_names() {
        let mut f = fixture();
        f.package_service.insert("app/cron".to_string(), Some(0));
        f.resources.cron_jobs.push(CronJob {
            name: "daily".into(),
            title: None,
            schedule: Schedule::Every(60),
            package_import_path: "app/cron".to_string(),
            position: pos(),
        });
        f.resources.cron_jobs.push(CronJob {
            name: "daily".into(),
            title: None,
            schedule: Schedule::Every(30),
            package_import_path: "app/cron".to_string(),
            position: pos(),
        });
        let mut diags = DiagnosticList::new(10);
        validate_app(&input(&f, true), &mut diags);
        assert!(diags.has_errors());
    }

    #[test]
    fn flags_cron_job_in_package_with_no_service() {
        let mut f = fixture();
        f.package_service.insert("app/cron".to_string(), None);
        f.resources.cron_jobs.push(CronJob {
            name: "daily".into(),
            title: None,
            schedule: Schedule::Every(60),
            package_import_path: "app/cron".to_string(),
            position: pos(),
        });
        let mut diags = DiagnosticList::new(10);
        validate_app(&input(&f, true), &mut diags);
        assert!(diags.has_errors());
    }

    #[test]
    fn flags_subscription_handler_in_different_service() {
        let mut f = fixture();
        f.resources.pubsub_subscriptions.push(Subscription {
            name: "sub".into(),
            topic_name: "topic".into(),
            handler_func: "Handle".into(),
            handler_package: Some("app/other".to_string()),
            ack_deadline_seconds: None,
            max_retries: None,
            position: pos(),
        });
        f.resource_origins
            .insert(ResourceRef::PubsubSubscription(0), ("app/sub".to_string(), pos()));
        f.package_service.insert("app/sub".to_string(), Some(0));
        f.package_service.insert("app/other".to_string(), Some(1));
        let mut diags = DiagnosticList::new(10);
        validate_app(&input(&f, true), &mut diags);
        assert!(diags.has_errors());
    }

    #[test]
    fn allows_bare_identifier_subscription_handler() {
        let mut f = fixture();
        f.resources.pubsub_subscriptions.push(Subscription {
            name: "sub".into(),
            topic_name: "topic".into(),
            handler_func: "Handle".into(),
            handler_package: None,
            ack_deadline_seconds: None,
            max_retries: None,
            position: pos(),
        });
        f.resource_origins
            .insert(ResourceRef::PubsubSubscription(0), ("app/sub".to_string(), pos()));
        f.package_service.insert("app/sub".to_string(), Some(0));
        let mut diags = DiagnosticList::new(10);
        validate_app(&input(&f, true), &mut diags);
        assert!(!diags.has_errors());
    }

    #[test]
    fn flags_nested_config_value() {
        let mut f = fixture();
        let (inner, _) = f.schema_table.reserve("app/cfg", "Inner", None, pos(), Vec::new());
        f.schema_table.set_root(
            inner,
            Type::ConfigWrapper {
                elem: Box::new(Type::Builtin(Builtin::String)),
                is_list: false,
            },
        );
        f.resources.config_loads.push(crate::resources::config::ConfigLoad {
            package_import_path: "app/cfg".to_string(),
            root_type: Type::ConfigWrapper {
                elem: Box::new(Type::Named { decl: inner, type_args: Vec::new() }),
                is_list: false,
            },
            position: pos(),
        });
        let mut diags = DiagnosticList::new(10);
        validate_app(&input(&f, true), &mut diags);
        assert!(diags.has_errors());
    }

    #[test]
    fn allows_values_list_wrapping_a_plain_value() {
        let mut f = fixture();
        f.resources.config_loads.push(crate::resources::config::ConfigLoad {
            package_import_path: "app/cfg".to_string(),
            root_type: Type::ConfigWrapper {
                elem: Box::new(Type::Struct { fields: Vec::new() }),
                is_list: true,
            },
            position: pos(),
        });
        let mut diags = DiagnosticList::new(10);
        validate_app(&input(&f, true), &mut diags);
        assert!(!diags.has_errors());
    }
}
