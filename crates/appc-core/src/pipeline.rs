//! Pipeline orchestrator. Runs C2 through C13 in the control-flow order
//! spec.md §5 describes: single-threaded, cooperative-sequential, with each
//! stage running to completion before the next begins. Diagnostics
//! accumulate in one [`DiagnosticList`] for the whole run; the fatal
//! threshold and sentinel-abort mechanism (spec.md §7) can short-circuit
//! the run at any stage boundary.

use std::collections::HashMap;

use tracing::instrument;

use crate::ast::{self, Decl};
use crate::config::PipelineConfig;
use crate::diagnostics::DiagnosticList;
use crate::directive;
use crate::dispatch::{self, DispatchInput};
use crate::endpoint::{self, EndpointCandidate, ServiceId};
use crate::error::{AbortSentinel, PhaseResult, PipelineError};
use crate::metadata::Metadata;
use crate::overlay::Overlay;
use crate::package::{self, CollectConfig, PackageId};
use crate::refs::ResourceRef;
use crate::resolve;
use crate::schema::{self, ExtractCtx, SchemaTable, Type};
use crate::source::{FileId, Position, SourceFile};
use crate::templates;
use crate::validate::{self, ValidateInput};

fn check_abort(diags: &DiagnosticList) -> PhaseResult<()> {
    if diags.is_aborted() {
        return Err(AbortSentinel);
    }
    Ok(())
}

/// Final artifacts of one pipeline run (spec.md §5's output).
pub struct PipelineOutput {
    pub metadata: Metadata,
    pub overlay: Overlay,
    pub diagnostics: Vec<crate::Diagnostic>,
    /// Source file table, indexed by `FileId`, for resolving diagnostic
    /// positions and overlay entries back to on-disk paths and contents.
    pub files: Vec<SourceFile>,
}

pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
}

impl<'a> Pipeline<'a> {
    #[must_use]
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    /// Runs the whole pipeline. A non-fatal diagnostic set still returns
    /// `Ok`; only a threshold-triggered abort or a structural I/O failure
    /// produces an `Err` (spec.md §7's propagation policy).
    pub fn run(&self) -> Result<PipelineOutput, PipelineError> {
        let mut diags = DiagnosticList::new(self.config.diagnostic_threshold);
        match self.run_inner(&mut diags) {
            Ok(output) => Ok(output),
            Err(AbortSentinel) => Err(PipelineError::Diagnostics(diags.into_sorted())),
        }
    }

    #[instrument(level = "debug", skip_all)]
    fn run_inner(&self, diags: &mut DiagnosticList) -> PhaseResult<PipelineOutput> {
        let collected = self.collect_packages(diags)?;
        let decl_table = build_type_decl_table(&collected);

        let mut schema_table = SchemaTable::new();
        let mut endpoint_candidates = Vec::new();
        let mut cron_candidates: Vec<(directive::CronDirective, Position, String)> = Vec::new();
        let mut dispatch_inputs_owned: Vec<OwnedCallSite> = Vec::new();
        let mut auth_handler_declared = false;

        for (pkg_idx, pkg) in collected.packages.iter().enumerate() {
            let pkg_id = pkg_idx as PackageId;
            let files: Vec<&SourceFile> = pkg
                .files
                .iter()
                .map(|&fid| &collected.files[fid as usize].source)
                .collect();
            let asts: Vec<&ast::File> = pkg
                .files
                .iter()
                .map(|&fid| &collected.files[fid as usize].ast)
                .collect();

            let resolved = resolve::resolve_package(&files, &asts, diags);

            let import_map = merged_import_map(&asts);
            let resolve_import = |alias: &str| import_map.get(alias).cloned();

            for (file_idx, file) in asts.iter().enumerate() {
                let source = files[file_idx];
                for decl in &file.decls {
                    match decl {
                        Decl::Func(f) if !f.is_method() => {
                            let Some(doc) = &f.doc else { continue };
                            if directive::parse_auth_handler_directive(doc) {
                                auth_handler_declared = true;
                            }
                            if let Some(api) = directive::parse_api_directive(doc) {
                                let ctx = ExtractCtx {
                                    import_path: &pkg.import_path,
                                    type_param_env: Vec::new(),
                                    resolve_import: &resolve_import,
                                    lookup_type_decl: &|p, n| decl_table.get(&(p.to_string(), n.to_string())).cloned(),
                                };
                                let request_type = f
                                    .params
                                    .first()
                                    .map(|p| schema::extract_type_expr(&mut schema_table, &ctx, &p.ty, diags));
                                let response_type = f
                                    .results
                                    .first()
                                    .map(|r| schema::extract_type_expr(&mut schema_table, &ctx, &r.ty, diags));
                                endpoint_candidates.push(EndpointCandidate {
                                    package: pkg_id,
                                    package_name: pkg.name.clone(),
                                    func_name: f.name.clone(),
                                    directive: api,
                                    request_type,
                                    response_type,
                                    position: source.position_at(f.name_span.start),
                                });
                            } else if let Some(cron) = directive::parse_cron_directive(doc) {
                                cron_candidates.push((cron, source.position_at(f.name_span.start), pkg.import_path.clone()));
                            }
                        }
                        _ => {}
                    }
                }
            }

            for call in resolved.call_sites {
                let type_args = type_args_of(&call.callee_expr, &mut schema_table, &pkg.import_path, &resolve_import, &decl_table, diags);
                let handler_ref = dispatch::extract_handler_ref(&call, &resolve_import);
                dispatch_inputs_owned.push(OwnedCallSite {
                    call,
                    type_args,
                    package_import_path: pkg.import_path.clone(),
                    handler_ref,
                });
            }
        }

        let dispatch_inputs: Vec<DispatchInput<'_>> = dispatch_inputs_owned
            .iter()
            .map(|o| DispatchInput {
                call: &o.call,
                type_args: o.type_args.clone(),
                package_import_path: &o.package_import_path,
                handler_ref: o.handler_ref.clone(),
            })
            .collect();
        let mut dispatch_out = dispatch::dispatch(dispatch_inputs, diags);

        for (cron, position, package_import_path) in &cron_candidates {
            let job = dispatch::dispatch_cron_directive(cron, package_import_path, *position, diags);
            dispatch_out.tables.cron_jobs.push(job);
        }

        let discover_out = endpoint::discover(endpoint_candidates, diags);

        // Package -> owning service, built after C8 discovery: a package
        // with at least one endpoint owns the service discovery created for
        // it; everything else maps to `None` ("nil" in spec.md §4.10 terms).
        let mut package_service: HashMap<String, Option<ServiceId>> = HashMap::new();
        for pkg in &collected.packages {
            package_service.insert(pkg.import_path.clone(), None);
        }
        for svc in &discover_out.services {
            let pkg = &collected.packages[svc.package as usize];
            package_service.insert(pkg.import_path.clone(), Some(svc.id));
        }

        let mut file_package: HashMap<FileId, String> = HashMap::new();
        for pkg in &collected.packages {
            for &fid in &pkg.files {
                file_package.insert(fid, pkg.import_path.clone());
            }
        }

        let resource_origins: HashMap<ResourceRef, (String, Position)> = dispatch_out
            .resource_origins
            .iter()
            .cloned()
            .map(|(resource, package, position)| (resource, (package, position)))
            .collect();

        let validate_input = ValidateInput {
            endpoints: &discover_out.endpoints,
            auth_handler_declared,
            resources: &dispatch_out.tables,
            resource_origins: &resource_origins,
            references: &dispatch_out.references,
            package_service: &package_service,
            file_package: &file_package,
            schema_table: &schema_table,
        };
        validate::validate_app(&validate_input, diags);
        check_abort(diags)?;

        let metadata = crate::metadata::build(
            "dev",
            &discover_out.services,
            &discover_out.endpoints,
            &dispatch_out.tables,
        );

        let overlay = self.build_overlay(&discover_out, &collected);
        let files = collected.files.iter().map(|f| f.source.clone()).collect();

        Ok(PipelineOutput {
            metadata,
            overlay,
            diagnostics: diags.as_slice().to_vec(),
            files,
        })
    }

    #[instrument(level = "debug", skip_all)]
    fn collect_packages(&self, diags: &mut DiagnosticList) -> PhaseResult<package::CollectOutput> {
        let cfg = CollectConfig {
            app_root: &self.config.app_root,
            module_import_path: &self.config.module_import_path,
            build_tags: &self.config.build_tags,
            include_test_files: self.config.include_test_files,
            exclude: &self.config.exclude,
        };
        let out = package::collect(&cfg, diags);
        check_abort(diags)?;
        Ok(out)
    }

    fn build_overlay(
        &self,
        discover_out: &endpoint::DiscoverOutput,
        collected: &package::CollectOutput,
    ) -> Overlay {
        let mut overlay = Overlay::new();
        for svc in &discover_out.services {
            let pkg = &collected.packages[svc.package as usize];
            let Some(&last_file_id) = pkg.files.last() else { continue };
            let source = &collected.files[last_file_id as usize].source;
            let end = source.text().len() as u32;
            for &ep_id in &svc.endpoints {
                let ep = &discover_out.endpoints[ep_id as usize];
                let methods: Vec<&str> = ep
                    .methods
                    .iter()
                    .map(|m| match m {
                        crate::endpoint::HttpMethod::Get => "GET",
                        crate::endpoint::HttpMethod::Post => "POST",
                        crate::endpoint::HttpMethod::Put => "PUT",
                        crate::endpoint::HttpMethod::Delete => "DELETE",
                        crate::endpoint::HttpMethod::Patch => "PATCH",
                        crate::endpoint::HttpMethod::Head => "HEAD",
                        crate::endpoint::HttpMethod::Any => "*",
                    })
                    .collect();
                let path = render_endpoint_path(&ep.path);
                let snippet = templates::endpoint_registration(&svc.name, &ep.name, &methods, &path);
                overlay.push(
                    last_file_id,
                    crate::overlay::OverlayEntry {
                        span: crate::source::Span::new(end, end),
                        replacement: snippet,
                    },
                );
            }
        }
        overlay
    }
}

struct OwnedCallSite {
    call: resolve::CallSite,
    type_args: Vec<Type>,
    package_import_path: String,
    handler_ref: (String, Option<String>),
}

type TypeDeclInfo = (Option<String>, Position, Vec<String>, crate::ast::TypeExpr);

fn build_type_decl_table(collected: &package::CollectOutput) -> HashMap<(String, String), TypeDeclInfo> {
    let mut table = HashMap::new();
    for pkg in &collected.packages {
        for &file_id in &pkg.files {
            let parsed = &collected.files[file_id as usize];
            let source = &parsed.source;
            for decl in &parsed.ast.decls {
                if let Decl::Type(t) = decl {
                    table.insert(
                        (pkg.import_path.clone(), t.name.clone()),
                        (
                            t.doc.clone(),
                            source.position_at(t.name_span.start),
                            t.type_params.iter().map(|p| p.name.clone()).collect(),
                            t.ty.clone(),
                        ),
                    );
                }
            }
        }
    }
    table
}

fn merged_import_map(asts: &[&ast::File]) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for file in asts {
        for imp in &file.imports {
            if imp.is_blank || imp.is_dot {
                continue;
            }
            map.insert(imp.local_name().to_string(), imp.path.clone());
        }
    }
    map
}

fn type_args_of(
    callee: &ast::Expr,
    table: &mut SchemaTable,
    import_path: &str,
    resolve_import: &dyn Fn(&str) -> Option<String>,
    decl_table: &HashMap<(String, String), TypeDeclInfo>,
    diags: &mut DiagnosticList,
) -> Vec<Type> {
    let ast::ExprKind::Index(_, args) = &callee.kind else {
        return Vec::new();
    };
    let ctx = ExtractCtx {
        import_path,
        type_param_env: Vec::new(),
        resolve_import,
        lookup_type_decl: &|p, n| decl_table.get(&(p.to_string(), n.to_string())).cloned(),
    };
    args.iter()
        .filter_map(crate::parser::expr_to_type_expr)
        .map(|type_expr| schema::extract_type_expr(table, &ctx, &type_expr, diags))
        .collect()
}

fn render_endpoint_path(path: &crate::endpoint::EndpointPath) -> String {
    let mut out = String::new();
    for seg in &path.segments {
        out.push('/');
        match seg {
            crate::endpoint::PathSegment::Literal(l) => out.push_str(l),
            crate::endpoint::PathSegment::Param(p) => {
                out.push(':');
                out.push_str(p);
            }
            crate::endpoint::PathSegment::Wildcard(w) => {
                out.push('*');
                out.push_str(w);
            }
        }
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &std::path::Path, name: &str, contents: &str) {
        let mut f = std::fs::File::create(dir.join(name)).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    #[test]
    fn discovers_one_public_endpoint() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(
            tmp.path(),
            "svc.go",
            "package svc\n\n// encore:api public method=GET path=/hello\nfunc Hello(req *Req) (*Resp, error) {\n\treturn nil, nil\n}\n\ntype Req struct {\n\tName string\n}\n\ntype Resp struct {\n\tMessage string\n}\n",
        );
        let mut config = PipelineConfig::default();
        config.app_root = tmp.path().to_path_buf();
        config.module_import_path = "example.com/app".to_string();
        let pipeline = Pipeline::new(&config);
        let out = pipeline.run().unwrap();
        assert_eq!(out.metadata.services.len(), 1);
        assert_eq!(out.metadata.services[0].endpoints.len(), 1);
        assert_eq!(out.metadata.services[0].endpoints[0].path, "/hello");
    }

    #[test]
    fn empty_app_produces_no_services() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = PipelineConfig::default();
        config.app_root = tmp.path().to_path_buf();
        config.module_import_path = "example.com/app".to_string();
        let pipeline = Pipeline::new(&config);
        let out = pipeline.run().unwrap();
        assert!(out.metadata.services.is_empty());
    }

    #[test]
    fn sqldb_call_produces_a_resource_reference() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(
            tmp.path(),
            "db.go",
            "package svc\n\nimport \"encore.dev/storage/sqldb\"\n\nvar db = sqldb.NewDatabase(\"mydb\")\n",
        );
        let mut config = PipelineConfig::default();
        config.app_root = tmp.path().to_path_buf();
        config.module_import_path = "example.com/app".to_string();
        let pipeline = Pipeline::new(&config);
        let out = pipeline.run().unwrap();
        assert_eq!(out.metadata.sql_databases, vec!["mydb".to_string()]);
    }
}
