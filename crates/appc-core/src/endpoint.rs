//! C8: Endpoint & service discovery. A service is one package directory that
//! contains at least one endpoint; an endpoint is an exported function
//! carrying an `//encore:api` directive (spec.md §4.8).

use std::collections::HashMap;

use crate::diagnostics::{Diagnostic, DiagnosticList};
use crate::directive::ApiDirective;
use crate::package::PackageId;
use crate::schema::Type;
use crate::source::Position;

pub type ServiceId = u32;
pub type EndpointId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
    Auth,
}

/// One `:name`/`*name`/literal segment of an endpoint path (spec.md Data
/// Model, "Path").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Literal(String),
    Param(String),
    Wildcard(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointPath {
    pub segments: Vec<PathSegment>,
}

impl EndpointPath {
    /// Parses a `/foo/:bar/*rest`-shaped literal, enforcing that a wildcard
    /// segment is syntactically last (spec.md §4.8 edge case).
    pub fn parse(raw: &str, diags: &mut DiagnosticList, position: Position) -> Self {
        let mut segments = Vec::new();
        let mut saw_wildcard = false;
        for part in raw.split('/').filter(|s| !s.is_empty()) {
            if saw_wildcard {
                diags.report(Diagnostic::error(position, "wildcard path segment must be last"));
                break;
            }
            if let Some(name) = part.strip_prefix(':') {
                segments.push(PathSegment::Param(name.to_string()));
            } else if let Some(name) = part.strip_prefix('*') {
                segments.push(PathSegment::Wildcard(name.to_string()));
                saw_wildcard = true;
            } else {
                segments.push(PathSegment::Literal(part.to_string()));
            }
        }
        EndpointPath { segments }
    }

    /// A key that two paths collide on regardless of parameter names:
    /// literal segments by value, parameters and wildcards collapsed to a
    /// single placeholder (spec.md §4.8: path conflicts are determined by
    /// shape, not by parameter naming).
    #[must_use]
    pub fn conflict_key(&self) -> Vec<String> {
        self.segments
            .iter()
            .map(|s| match s {
                PathSegment::Literal(l) => format!("L:{l}"),
                PathSegment::Param(_) => "P".to_string(),
                PathSegment::Wildcard(_) => "W".to_string(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Any,
}

impl HttpMethod {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s.to_ascii_uppercase().as_str() {
            "GET" => HttpMethod::Get,
            "POST" => HttpMethod::Post,
            "PUT" => HttpMethod::Put,
            "DELETE" => HttpMethod::Delete,
            "PATCH" => HttpMethod::Patch,
            "HEAD" => HttpMethod::Head,
            "*" | "ANY" => HttpMethod::Any,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Endpoint {
    pub id: EndpointId,
    pub service: ServiceId,
    pub name: String,
    pub doc: Option<String>,
    pub visibility: Visibility,
    pub raw: bool,
    pub methods: Vec<HttpMethod>,
    pub path: EndpointPath,
    pub request_type: Option<Type>,
    pub response_type: Option<Type>,
    pub position: Position,
}

#[derive(Debug, Clone)]
pub struct Service {
    pub id: ServiceId,
    pub name: String,
    pub package: PackageId,
    pub endpoints: Vec<EndpointId>,
}

pub struct DiscoverOutput {
    pub services: Vec<Service>,
    pub endpoints: Vec<Endpoint>,
}

/// A function candidate for endpoint discovery: already resolved to an
/// `//encore:api` directive and request/response schema by earlier phases.
pub struct EndpointCandidate {
    pub package: PackageId,
    pub package_name: String,
    pub func_name: String,
    pub directive: ApiDirective,
    pub request_type: Option<Type>,
    pub response_type: Option<Type>,
    pub position: Position,
}

/// Groups candidates into services (one per package) and validates path
/// uniqueness per method across the whole app (spec.md §4.8 invariant:
/// "no two endpoints may register the same method on a conflicting path").
pub fn discover(candidates: Vec<EndpointCandidate>, diags: &mut DiagnosticList) -> DiscoverOutput {
    let mut services: Vec<Service> = Vec::new();
    let mut service_by_package: HashMap<PackageId, ServiceId> = HashMap::new();
    let mut endpoints: Vec<Endpoint> = Vec::new();
    // method -> conflict_key -> (endpoint id, original path) for collision reporting.
    let mut seen_paths: HashMap<(HttpMethod, Vec<String>), EndpointId> = HashMap::new();

    for cand in candidates {
        let service_id = *service_by_package.entry(cand.package).or_insert_with(|| {
            let id = services.len() as ServiceId;
            services.push(Service {
                id,
                name: cand.package_name.clone(),
                package: cand.package,
                endpoints: Vec::new(),
            });
            id
        });

        let path = EndpointPath::parse(&cand.directive.path, diags, cand.position);
        let methods = if cand.directive.methods.is_empty() {
            vec![HttpMethod::Any]
        } else {
            cand.directive.methods.clone()
        };

        let endpoint_id = endpoints.len() as EndpointId;
        for method in &methods {
            let key = (*method, path.conflict_key());
            if let Some(&existing) = seen_paths.get(&key) {
                diags.report(Diagnostic::error(
                    cand.position,
                    format!(
                        "endpoint {} conflicts with endpoint id {existing} on method/path",
                        cand.func_name
                    ),
                ));
            } else {
                seen_paths.insert(key, endpoint_id);
            }
        }

        if cand.directive.visibility == Visibility::Auth {
            let has_identifying_field = match &cand.request_type {
                Some(Type::Struct { fields }) => {
                    fields.iter().any(|f| f.header_name.is_some() || f.query_name.is_some())
                }
                _ => false,
            };
            if !has_identifying_field {
                diags.report(Diagnostic::error(
                    cand.position,
                    format!(
                        "auth handler {} must take a request type with at least one header or query field",
                        cand.func_name
                    ),
                ));
            }
        }

        services[service_id as usize].endpoints.push(endpoint_id);
        endpoints.push(Endpoint {
            id: endpoint_id,
            service: service_id,
            name: cand.func_name,
            doc: None,
            visibility: cand.directive.visibility,
            raw: cand.directive.raw,
            methods,
            path,
            request_type: cand.request_type,
            response_type: cand.response_type,
            position: cand.position,
        });
    }

    DiscoverOutput { services, endpoints }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::ApiDirective;

    fn candidate(package: PackageId, name: &str, path: &str, method: &str, pos_line: u32) -> EndpointCandidate {
        EndpointCandidate {
            package,
            package_name: "svc".to_string(),
            func_name: name.to_string(),
            directive: ApiDirective {
                visibility: Visibility::Public,
                raw: false,
                methods: vec![HttpMethod::parse(method).unwrap()],
                path: path.to_string(),
            },
            request_type: None,
            response_type: None,
            position: Position::new(0, 0, pos_line, 1),
        }
    }

    #[test]
    fn groups_endpoints_into_one_service_per_package() {
        let mut diags = DiagnosticList::new(10);
        let out = discover(
            vec![
                candidate(0, "A", "/a", "GET", 1),
                candidate(0, "B", "/b", "GET", 2),
            ],
            &mut diags,
        );
        assert_eq!(out.services.len(), 1);
        assert_eq!(out.services[0].endpoints.len(), 2);
        assert!(!diags.has_errors());
    }

    #[test]
    fn conflicting_paths_flagged() {
        let mut diags = DiagnosticList::new(10);
        let _ = discover(
            vec![
                candidate(0, "A", "/items/:id", "GET", 1),
                candidate(0, "B", "/items/:other", "GET", 2),
            ],
            &mut diags,
        );
        assert!(diags.has_errors());
    }

    #[test]
    fn wildcard_must_be_last_segment() {
        let mut diags = DiagnosticList::new(10);
        let path = EndpointPath::parse("/a/*rest/b", &mut diags, Position::new(0, 0, 1, 1));
        assert!(diags.has_errors());
        assert_eq!(path.segments.len(), 2);
    }

    #[test]
    fn distinct_methods_on_same_path_do_not_conflict() {
        let mut diags = DiagnosticList::new(10);
        let _ = discover(
            vec![
                candidate(0, "A", "/items", "GET", 1),
                candidate(0, "B", "/items", "POST", 2),
            ],
            &mut diags,
        );
        assert!(!diags.has_errors());
    }
}
