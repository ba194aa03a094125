//! C12: Metadata emitter. Serializes the validated app graph into the
//! document the build toolchain consumes (spec.md §4.12). Every id in the
//! document — trace nodes, services, endpoints — is assigned in a fixed
//! deterministic order so two runs over identical source produce
//! byte-identical output.

use serde::Serialize;

use crate::dispatch::ResourceTables;
use crate::endpoint::{Endpoint, HttpMethod, PathSegment, Service, Visibility};

#[derive(Debug, Serialize)]
pub struct Metadata {
    pub app_revision: String,
    pub services: Vec<ServiceMeta>,
    pub sql_databases: Vec<String>,
    pub pubsub_topics: Vec<PubsubTopicMeta>,
    pub cache_clusters: Vec<String>,
    pub cron_jobs: Vec<CronJobMeta>,
    /// Assigned in emission order, not discovery order, so renumbering a
    /// trace tool's node ids never depends on hash-map iteration.
    pub trace_nodes: Vec<TraceNode>,
}

#[derive(Debug, Serialize)]
pub struct ServiceMeta {
    pub name: String,
    pub endpoints: Vec<EndpointMeta>,
}

#[derive(Debug, Serialize)]
pub struct EndpointMeta {
    pub name: String,
    pub visibility: &'static str,
    pub raw: bool,
    pub methods: Vec<&'static str>,
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct PubsubTopicMeta {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct CronJobMeta {
    pub name: String,
    pub title: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TraceNode {
    pub id: u32,
    pub kind: &'static str,
    pub name: String,
}

fn visibility_str(v: Visibility) -> &'static str {
    match v {
        Visibility::Public => "public",
        Visibility::Private => "private",
        Visibility::Auth => "auth",
    }
}

fn method_str(m: HttpMethod) -> &'static str {
    match m {
        HttpMethod::Get => "GET",
        HttpMethod::Post => "POST",
        HttpMethod::Put => "PUT",
        HttpMethod::Delete => "DELETE",
        HttpMethod::Patch => "PATCH",
        HttpMethod::Head => "HEAD",
        HttpMethod::Any => "*",
    }
}

fn render_path(segments: &[PathSegment]) -> String {
    let mut out = String::new();
    for seg in segments {
        out.push('/');
        match seg {
            PathSegment::Literal(l) => out.push_str(l),
            PathSegment::Param(p) => {
                out.push(':');
                out.push_str(p);
            }
            PathSegment::Wildcard(w) => {
                out.push('*');
                out.push_str(w);
            }
        }
    }
    if out.is_empty() {
        "/".to_string()
    } else {
        out
    }
}

/// Builds the metadata document. `endpoints` must be indexable by the
/// `EndpointId`s stored in each service's `endpoints` list (i.e. the full
/// endpoint table from discovery, not a filtered subset).
#[must_use]
pub fn build(app_revision: &str, services: &[Service], endpoints: &[Endpoint], resources: &ResourceTables) -> Metadata {
    let mut trace_nodes = Vec::new();
    let mut next_trace_id = 0u32;

    let service_metas: Vec<ServiceMeta> = services
        .iter()
        .map(|svc| {
            trace_nodes.push(TraceNode {
                id: next_trace_id,
                kind: "service",
                name: svc.name.clone(),
            });
            next_trace_id += 1;
            let endpoint_metas = svc
                .endpoints
                .iter()
                .map(|&id| {
                    let ep = &endpoints[id as usize];
                    trace_nodes.push(TraceNode {
                        id: next_trace_id,
                        kind: "endpoint",
                        name: format!("{}.{}", svc.name, ep.name),
                    });
                    next_trace_id += 1;
                    EndpointMeta {
                        name: ep.name.clone(),
                        visibility: visibility_str(ep.visibility),
                        raw: ep.raw,
                        methods: ep.methods.iter().copied().map(method_str).collect(),
                        path: render_path(&ep.path.segments),
                    }
                })
                .collect();
            ServiceMeta {
                name: svc.name.clone(),
                endpoints: endpoint_metas,
            }
        })
        .collect();

    for job in &resources.cron_jobs {
        trace_nodes.push(TraceNode {
            id: next_trace_id,
            kind: "cron_job",
            name: job.name.clone(),
        });
        next_trace_id += 1;
    }

    Metadata {
        app_revision: app_revision.to_string(),
        services: service_metas,
        sql_databases: resources.sql_databases.clone(),
        pubsub_topics: resources
            .pubsub_topics
            .iter()
            .map(|t| PubsubTopicMeta { name: t.name.clone() })
            .collect(),
        cache_clusters: resources.cache_clusters.iter().map(|c| c.name.clone()).collect(),
        cron_jobs: resources
            .cron_jobs
            .iter()
            .map(|j| CronJobMeta {
                name: j.name.clone(),
                title: j.title.clone(),
            })
            .collect(),
        trace_nodes,
    }
}

impl Metadata {
    /// Serializes to pretty JSON with a trailing newline, matching the
    /// format the build toolchain reads off disk.
    ///
    /// # Errors
    /// Returns an error if serialization fails, which should not happen for
    /// a well-formed `Metadata` value (all fields are plain data).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let mut s = serde_json::to_string_pretty(self)?;
        s.push('\n');
        Ok(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::EndpointPath;

    #[test]
    fn trace_node_ids_are_assigned_in_emission_order() {
        let services = vec![Service {
            id: 0,
            name: "svc".into(),
            package: 0,
            endpoints: vec![0, 1],
        }];
        let endpoints = vec![
            Endpoint {
                id: 0,
                service: 0,
                name: "A".into(),
                doc: None,
                visibility: Visibility::Public,
                raw: false,
                methods: vec![HttpMethod::Get],
                path: EndpointPath { segments: vec![] },
                request_type: None,
                response_type: None,
                position: crate::source::Position::new(0, 0, 1, 1),
            },
            Endpoint {
                id: 1,
                service: 0,
                name: "B".into(),
                doc: None,
                visibility: Visibility::Public,
                raw: false,
                methods: vec![HttpMethod::Get],
                path: EndpointPath { segments: vec![] },
                request_type: None,
                response_type: None,
                position: crate::source::Position::new(0, 0, 1, 1),
            },
        ];
        let resources = ResourceTables::default();
        let meta = build("rev1", &services, &endpoints, &resources);
        assert_eq!(meta.trace_nodes[0].id, 0);
        assert_eq!(meta.trace_nodes[1].id, 1);
        assert_eq!(meta.trace_nodes[2].id, 2);
        assert_eq!(meta.trace_nodes[0].kind, "service");
    }

    #[test]
    fn serializes_to_json_with_trailing_newline() {
        let meta = build("rev1", &[], &[], &ResourceTables::default());
        let json = meta.to_json().unwrap();
        assert!(json.ends_with('\n'));
        assert!(json.contains("\"app_revision\": \"rev1\""));
    }
}
