//! C3: Name resolver. Runs per package in four passes (spec.md §4.2):
//! collect package-scope declarations, process imports, walk each
//! declaration's body with a lexical scope stack, and accumulate every call
//! expression found for later phases to classify.

use std::collections::HashMap;

use crate::ast::{self, Decl, Expr, ExprKind, NodeId, Stmt};
use crate::diagnostics::{Diagnostic, DiagnosticList};
use crate::source::{FileId, Position, SourceFile};

/// A resolved package-scope binding: a type, func, var, or const declared
/// somewhere in the package (spec.md §4.2, pass 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Type,
    Func,
    Value,
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub kind: BindingKind,
    pub decl_index: usize,
    pub file: FileId,
}

/// One call expression found anywhere in the package, with enough context
/// for C9 to classify it: the callee's resolved shape and the enclosing
/// function, if any.
#[derive(Debug, Clone)]
pub struct CallSite {
    pub node: NodeId,
    pub file: FileId,
    pub position: Position,
    pub callee: CalleeShape,
    /// The raw callee expression, kept alongside the classified shape so a
    /// later phase can recover generic type arguments from a
    /// `pkg.Ctor[Msg]`-shaped `Index` callee (spec.md §4.6's type-arg
    /// arity matching).
    pub callee_expr: Expr,
    pub args: Vec<Expr>,
    pub enclosing_func: Option<String>,
}

/// How a call's callee expression resolved, independent of what it might
/// mean semantically (that's C9's job).
#[derive(Debug, Clone)]
pub enum CalleeShape {
    /// A bare identifier naming a package-scope binding, or an unresolved
    /// local/builtin name.
    Local(String),
    /// `pkg.Name` where `pkg` is a resolved import alias.
    Imported { import_path: String, name: String },
    /// `recv.Method(...)` / `x.Field.Method(...)` where the base could not
    /// be resolved to an import (ordinary method call or unresolved chain).
    Selector { base: Box<CalleeShape>, name: String },
    Other,
}

pub struct ResolveOutput {
    pub bindings: HashMap<String, Binding>,
    pub call_sites: Vec<CallSite>,
}

/// Resolves one package: `files` are this package's parsed files in the
/// same order as `sources`.
pub fn resolve_package(
    sources: &[&SourceFile],
    files: &[&ast::File],
    diags: &mut DiagnosticList,
) -> ResolveOutput {
    let mut bindings: HashMap<String, Binding> = HashMap::new();

    // Pass 1: package-scope declarations, across all files in the package.
    for (file_idx, file) in files.iter().enumerate() {
        for (decl_idx, decl) in file.decls.iter().enumerate() {
            let (kind, names): (BindingKind, Vec<String>) = match decl {
                Decl::Func(f) if !f.is_method() => (BindingKind::Func, vec![f.name.clone()]),
                Decl::Func(_) => continue,
                Decl::Type(t) => (BindingKind::Type, vec![t.name.clone()]),
                Decl::Var(v) | Decl::Const(v) => (BindingKind::Value, v.names.clone()),
            };
            for name in names {
                if name == "_" {
                    continue;
                }
                let file_id = sources[file_idx].id;
                if let Some(existing) = bindings.get(&name) {
                    if existing.file != file_id || existing.decl_index != decl_idx {
                        diags.report(Diagnostic::error(
                            sources[file_idx].position_at(decl.span().start),
                            format!("{name} redeclared in this package"),
                        ));
                    }
                }
                bindings.insert(
                    name,
                    Binding {
                        kind,
                        decl_index: decl_idx,
                        file: file_id,
                    },
                );
            }
        }
    }

    // Pass 2: import specs, per file (aliases only matter within their own file).
    let mut imports_by_file: Vec<HashMap<String, String>> = Vec::with_capacity(files.len());
    for file in files {
        let mut map = HashMap::new();
        for imp in &file.imports {
            if imp.is_blank || imp.is_dot {
                continue;
            }
            map.insert(imp.local_name().to_string(), imp.path.clone());
        }
        imports_by_file.push(map);
    }

    // Pass 3 + 4: walk bodies with a scope stack, collecting call sites.
    let mut call_sites = Vec::new();
    for (file_idx, file) in files.iter().enumerate() {
        let source = sources[file_idx];
        let import_map = &imports_by_file[file_idx];
        for decl in &file.decls {
            if let Decl::Func(f) = decl {
                if let Some(body) = &f.body {
                    let mut scopes: Vec<Vec<String>> = vec![Vec::new()];
                    for p in &f.params {
                        if let Some(name) = &p.name {
                            scopes.last_mut().unwrap().push(name.clone());
                        }
                    }
                    walk_block(
                        body,
                        source,
                        import_map,
                        &mut scopes,
                        Some(&f.name),
                        &mut call_sites,
                    );
                }
            }
        }
    }

    ResolveOutput { bindings, call_sites }
}

fn walk_block(
    block: &ast::Block,
    source: &SourceFile,
    imports: &HashMap<String, String>,
    scopes: &mut Vec<Vec<String>>,
    enclosing_func: Option<&str>,
    out: &mut Vec<CallSite>,
) {
    scopes.push(Vec::new());
    for stmt in &block.stmts {
        walk_stmt(stmt, source, imports, scopes, enclosing_func, out);
    }
    scopes.pop();
}

fn walk_stmt(
    stmt: &Stmt,
    source: &SourceFile,
    imports: &HashMap<String, String>,
    scopes: &mut Vec<Vec<String>>,
    enclosing_func: Option<&str>,
    out: &mut Vec<CallSite>,
) {
    match stmt {
        Stmt::Block(b) => walk_block(b, source, imports, scopes, enclosing_func, out),
        Stmt::Expr(e) => walk_expr(e, source, imports, enclosing_func, out),
        Stmt::Assign { lhs, rhs, define } => {
            for e in rhs {
                walk_expr(e, source, imports, enclosing_func, out);
            }
            if *define {
                for e in lhs {
                    if let ExprKind::Ident(name) = &e.kind {
                        scopes.last_mut().unwrap().push(name.clone());
                    }
                }
            } else {
                for e in lhs {
                    walk_expr(e, source, imports, enclosing_func, out);
                }
            }
        }
        Stmt::Return(exprs) | Stmt::Other(exprs) => {
            for e in exprs {
                walk_expr(e, source, imports, enclosing_func, out);
            }
        }
        Stmt::LocalDecl(decl) => {
            if let Decl::Var(v) | Decl::Const(v) = decl {
                for e in &v.values {
                    walk_expr(e, source, imports, enclosing_func, out);
                }
                for name in &v.names {
                    scopes.last_mut().unwrap().push(name.clone());
                }
            }
        }
        Stmt::If { init, cond, then, els } => {
            scopes.push(Vec::new());
            if let Some(init) = init {
                walk_stmt(init, source, imports, scopes, enclosing_func, out);
            }
            walk_expr(cond, source, imports, enclosing_func, out);
            walk_block(then, source, imports, scopes, enclosing_func, out);
            if let Some(els) = els {
                walk_stmt(els, source, imports, scopes, enclosing_func, out);
            }
            scopes.pop();
        }
        Stmt::For { init, cond, post, body } => {
            scopes.push(Vec::new());
            if let Some(init) = init {
                walk_stmt(init, source, imports, scopes, enclosing_func, out);
            }
            if let Some(cond) = cond {
                walk_expr(cond, source, imports, enclosing_func, out);
            }
            if let Some(post) = post {
                walk_stmt(post, source, imports, scopes, enclosing_func, out);
            }
            walk_block(body, source, imports, scopes, enclosing_func, out);
            scopes.pop();
        }
        Stmt::Switch { init, tag, cases } => {
            scopes.push(Vec::new());
            if let Some(init) = init {
                walk_stmt(init, source, imports, scopes, enclosing_func, out);
            }
            if let Some(tag) = tag {
                walk_expr(tag, source, imports, enclosing_func, out);
            }
            for case in cases {
                for v in &case.values {
                    walk_expr(v, source, imports, enclosing_func, out);
                }
                scopes.push(Vec::new());
                for s in &case.body {
                    walk_stmt(s, source, imports, scopes, enclosing_func, out);
                }
                scopes.pop();
            }
            scopes.pop();
        }
        Stmt::Go(e) | Stmt::Defer(e) => walk_expr(e, source, imports, enclosing_func, out),
        Stmt::Branch(_) => {}
        Stmt::Labeled(_, inner) => walk_stmt(inner, source, imports, scopes, enclosing_func, out),
    }
}

fn walk_expr(
    expr: &Expr,
    source: &SourceFile,
    imports: &HashMap<String, String>,
    enclosing_func: Option<&str>,
    out: &mut Vec<CallSite>,
) {
    match &expr.kind {
        ExprKind::Call(callee, args) => {
            let shape = classify_callee(callee, imports);
            out.push(CallSite {
                node: expr.id,
                file: source.id,
                position: source.position_at(expr.span.start),
                callee: shape,
                callee_expr: (**callee).clone(),
                args: args.clone(),
                enclosing_func: enclosing_func.map(str::to_string),
            });
            walk_expr(callee, source, imports, enclosing_func, out);
            for a in args {
                walk_expr(a, source, imports, enclosing_func, out);
            }
        }
        ExprKind::Unary(_, inner) | ExprKind::Paren(inner) => {
            walk_expr(inner, source, imports, enclosing_func, out);
        }
        ExprKind::Binary(_, a, b) => {
            walk_expr(a, source, imports, enclosing_func, out);
            walk_expr(b, source, imports, enclosing_func, out);
        }
        ExprKind::Selector(base, _) => walk_expr(base, source, imports, enclosing_func, out),
        ExprKind::Index(base, args) => {
            walk_expr(base, source, imports, enclosing_func, out);
            for a in args {
                walk_expr(a, source, imports, enclosing_func, out);
            }
        }
        ExprKind::CompositeLit(_, elts) => {
            for elt in elts {
                // Composite-literal identifier keys are deliberately left
                // unresolved (canonical decision on the spec's generics
                // open question): only the value side is walked.
                walk_expr(&elt.value, source, imports, enclosing_func, out);
            }
        }
        ExprKind::Ident(_)
        | ExprKind::Int(_)
        | ExprKind::Float(_)
        | ExprKind::String(_)
        | ExprKind::RawString(_)
        | ExprKind::Bool(_)
        | ExprKind::TypeExprValue(_) => {}
    }
}

fn classify_callee(expr: &Expr, imports: &HashMap<String, String>) -> CalleeShape {
    match &expr.kind {
        ExprKind::Ident(name) => CalleeShape::Local(name.clone()),
        ExprKind::Selector(base, name) => {
            if let ExprKind::Ident(pkg) = &base.kind {
                if let Some(import_path) = imports.get(pkg) {
                    return CalleeShape::Imported {
                        import_path: import_path.clone(),
                        name: name.clone(),
                    };
                }
            }
            CalleeShape::Selector {
                base: Box::new(classify_callee(base, imports)),
                name: name.clone(),
            }
        }
        ExprKind::Paren(inner) => classify_callee(inner, imports),
        ExprKind::Index(base, _) => classify_callee(base, imports),
        _ => CalleeShape::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_file;
    use crate::source::SourceFile;
    use std::path::PathBuf;

    fn parse(src: &str) -> (SourceFile, ast::File) {
        let out = parse_file(0, src.as_bytes());
        (SourceFile::new(0, PathBuf::from("f.go"), src.as_bytes().to_vec()), out.file)
    }

    #[test]
    fn collects_package_scope_bindings() {
        let (source, file) = parse("package app\n\nfunc F() {}\n\ntype T struct{}\n");
        let mut diags = DiagnosticList::new(10);
        let out = resolve_package(&[&source], &[&file], &mut diags);
        assert!(out.bindings.contains_key("F"));
        assert!(out.bindings.contains_key("T"));
    }

    #[test]
    fn classifies_imported_call() {
        let (source, file) = parse(
            "package app\n\nimport \"encore.dev/storage/sqldb\"\n\nfunc F() {\n\tsqldb.Exec(nil)\n}\n",
        );
        let mut diags = DiagnosticList::new(10);
        let out = resolve_package(&[&source], &[&file], &mut diags);
        assert_eq!(out.call_sites.len(), 1);
        match &out.call_sites[0].callee {
            CalleeShape::Imported { import_path, name } => {
                assert_eq!(import_path, "encore.dev/storage/sqldb");
                assert_eq!(name, "Exec");
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn redeclaration_in_same_package_flagged() {
        let (source, file) = parse("package app\n\nfunc F() {}\n\nfunc F() {}\n");
        let mut diags = DiagnosticList::new(10);
        let _ = resolve_package(&[&source], &[&file], &mut diags);
        assert!(diags.has_errors());
    }
}
