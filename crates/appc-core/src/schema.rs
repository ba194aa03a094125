//! C5: Schema extractor. Resolves type expressions to structural schemas,
//! with the decl-id pre-reservation trick that is "the single most subtle
//! invariant" (spec.md §9) for getting recursive and mutually recursive
//! types right.

use indexmap::IndexMap;

use crate::ast::TypeExpr;
use crate::diagnostics::{Diagnostic, DiagnosticList};
use crate::source::Position;

pub type DeclId = u32;

/// A named, possibly generic, structural type declaration. Deduplicated by
/// `(import_path, name)` (spec.md Data Model, "Schema declaration").
#[derive(Debug, Clone)]
pub struct Decl {
    pub id: DeclId,
    pub name: String,
    pub import_path: String,
    pub doc: Option<String>,
    pub position: Position,
    /// Type parameter names, in declaration order; index `i` is referenced
    /// by `Type::TypeParamRef { decl, index: i }`.
    pub type_params: Vec<String>,
    /// `None` while the decl is a reserved stub being recursed into; always
    /// `Some` once the schema extractor returns from that recursion.
    pub root: Option<Type>,
}

/// The tagged union from spec.md's Data Model.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Builtin(Builtin),
    List(Box<Type>),
    Map(Box<Type>, Box<Type>),
    Struct { fields: Vec<Field> },
    Named { decl: DeclId, type_args: Vec<Type> },
    TypeParamRef { decl: DeclId, index: u32 },
    /// `config.Value[T]`; `is_list` marks the values-list wrapper that is
    /// the sole exception to the no-nested-wrapper rule (spec.md §9 Open
    /// Question #2).
    ConfigWrapper { elem: Box<Type>, is_list: bool },
    Pointer(Box<Type>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Bool,
    String,
    Bytes,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
    Uuid,
    Time,
    Error,
    Any,
}

impl Builtin {
    #[must_use]
    pub fn from_ident(name: &str) -> Option<Self> {
        Some(match name {
            "bool" => Builtin::Bool,
            "string" => Builtin::String,
            // `byte` (=uint8) collapses to the `bytes` builtin per spec.md
            // §4.4 only when it is the *element type of a slice/array*; a
            // bare `byte`/`uint8` scalar stays `Uint8`. The collapse itself
            // happens in `extract_type_expr` when building `Type::List`.
            "int" => Builtin::Int,
            "int8" => Builtin::Int8,
            "int16" => Builtin::Int16,
            "int32" | "rune" => Builtin::Int32,
            "int64" => Builtin::Int64,
            "uint" => Builtin::Uint,
            "uint8" | "byte" => Builtin::Uint8,
            "uint16" => Builtin::Uint16,
            "uint32" => Builtin::Uint32,
            "uint64" => Builtin::Uint64,
            "float32" => Builtin::Float32,
            "float64" => Builtin::Float64,
            "any" | "interface{}" => Builtin::Any,
            "error" => Builtin::Error,
            _ => return None,
        })
    }
}

/// A struct field with tag-derived names (spec.md Data Model, "Field").
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub doc: Option<String>,
    pub ty: Type,
    pub optional: bool,
    pub raw_tag: Option<String>,
    pub json_name: Option<String>,
    pub query_name: Option<String>,
    pub header_name: Option<String>,
    pub sensitive: bool,
}

/// Per-invocation decl cache; shared across all phases of one pipeline run
/// and the only state whose ordering is non-trivial (spec.md §5).
pub struct SchemaTable {
    decls: IndexMap<(String, String), DeclId>,
    by_id: Vec<Decl>,
}

impl SchemaTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            decls: IndexMap::new(),
            by_id: Vec::new(),
        }
    }

    #[must_use]
    pub fn get(&self, id: DeclId) -> &Decl {
        &self.by_id[id as usize]
    }

    pub fn get_mut(&mut self, id: DeclId) -> &mut Decl {
        &mut self.by_id[id as usize]
    }

    /// Decls in insertion order (spec.md §4.11: "Decls are emitted in
    /// insertion order so that ids are stable").
    pub fn iter(&self) -> impl Iterator<Item = &Decl> {
        self.by_id.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Reserves an id for `(import_path, name)` if not already present,
    /// inserting a stub decl with `root: None` before the caller recurses
    /// into its body. Returns `(id, already_existed)`. This is the decl-id
    /// pre-reservation invariant from spec.md §4.4/§9: callers MUST call
    /// this before recursing into a named type's definition, or recursive
    /// types will diverge.
    pub fn reserve(
        &mut self,
        import_path: &str,
        name: &str,
        doc: Option<String>,
        position: Position,
        type_params: Vec<String>,
    ) -> (DeclId, bool) {
        let key = (import_path.to_string(), name.to_string());
        if let Some(&id) = self.decls.get(&key) {
            return (id, true);
        }
        let id = self.by_id.len() as DeclId;
        self.decls.insert(key, id);
        self.by_id.push(Decl {
            id,
            name: name.to_string(),
            import_path: import_path.to_string(),
            doc,
            position,
            type_params,
            root: None,
        });
        (id, false)
    }

    pub fn set_root(&mut self, id: DeclId, root: Type) {
        self.by_id[id as usize].root = Some(root);
    }
}

impl Default for SchemaTable {
    fn default() -> Self {
        Self::new()
    }
}

/// `Schema` bundles a resolved `Type` with the table it may have added decls
/// to; most callers just need the `Type` and thread the table through
/// separately, but this alias documents the pairing spec.md describes.
pub type Schema = Type;

/// Context threaded through type-expression extraction: the current
/// generic-parameter environment (for resolving bare type-parameter names
/// inside a generic decl's own body) and the owning package's import path
/// (for keying the decl table and resolving qualified identifiers).
pub struct ExtractCtx<'a> {
    pub import_path: &'a str,
    /// Maps a type-parameter name to its `(decl_id, index)` inside the decl
    /// currently being extracted, so `Ti` resolves as a type-param-ref
    /// rather than attempting a (failing) named-type lookup.
    pub type_param_env: Vec<(String, DeclId, u32)>,
    /// Resolves `pkg.Name` to an import path, or `None` if `pkg` isn't a
    /// known import alias (an unresolved qualifier is reported by the
    /// caller, not here).
    pub resolve_import: &'a dyn Fn(&str) -> Option<String>,
    /// Looks up a package-level type declaration's AST by `(import_path,
    /// name)`, for recursing into a newly reserved decl. Returns `None` if
    /// unknown (e.g. an external, unparsed package) in which case a builtin
    /// `Any` is substituted rather than failing the whole extraction.
    pub lookup_type_decl: &'a dyn Fn(&str, &str) -> Option<(Option<String>, Position, Vec<String>, TypeExpr)>,
}

/// Extracts a `Type` for a type expression appearing in `file`'s package.
/// This is C5's single entry point; every other phase that needs a schema
/// (C8 for request/response types, C11 for config loads, C14 for sensitive
/// paths) calls through here.
pub fn extract_type_expr(
    table: &mut SchemaTable,
    ctx: &ExtractCtx,
    ty: &TypeExpr,
    diags: &mut DiagnosticList,
) -> Type {
    match ty {
        TypeExpr::Ident(name, span) => {
            if let Some((_, decl_id, index)) = ctx.type_param_env.iter().find(|(n, _, _)| n == name) {
                return Type::TypeParamRef {
                    decl: *decl_id,
                    index: *index,
                };
            }
            if let Some(b) = Builtin::from_ident(name) {
                return Type::Builtin(b);
            }
            extract_named(table, ctx, ctx.import_path, name, *span, &[], diags)
        }
        TypeExpr::Qualified(pkg, name, span) => {
            let Some(import_path) = (ctx.resolve_import)(pkg) else {
                diags.report(Diagnostic::error(
                    position_of(ctx, *span),
                    format!("unresolved package qualifier {pkg}"),
                ));
                return Type::Builtin(Builtin::Any);
            };
            if import_path.ends_with("encore.dev/config") && name == "Value" {
                // placeholder; real resolution happens via Generic arm below
            }
            extract_named(table, ctx, &import_path, name, *span, &[], diags)
        }
        TypeExpr::Pointer(inner, _) => Type::Pointer(Box::new(extract_type_expr(table, ctx, inner, diags))),
        TypeExpr::Array(_, elem, _) | TypeExpr::Slice(elem, _) => {
            // `[]byte`/`[N]byte` collapses to the `bytes` builtin (spec.md §4.4).
            if let TypeExpr::Ident(name, _) = elem.as_ref() {
                if name == "byte" || name == "uint8" {
                    return Type::Builtin(Builtin::Bytes);
                }
            }
            Type::List(Box::new(extract_type_expr(table, ctx, elem, diags)))
        }
        TypeExpr::Map(key, value, _) => Type::Map(
            Box::new(extract_type_expr(table, ctx, key, diags)),
            Box::new(extract_type_expr(table, ctx, value, diags)),
        ),
        TypeExpr::Struct(fields, _) => {
            let mut out_fields = Vec::with_capacity(fields.len());
            let mut seen_json_names = std::collections::HashSet::new();
            for f in fields {
                let names = if f.names.is_empty() {
                    vec![embedded_name(&f.ty)]
                } else {
                    f.names.clone()
                };
                for name in names {
                    let field = extract_field(table, ctx, &name, f, diags);
                    if let Some(json) = &field.json_name {
                        if json != "-" && !seen_json_names.insert(json.clone()) {
                            diags.report(Diagnostic::error(
                                position_of(ctx, f.span),
                                format!("duplicate JSON field name {json:?}"),
                            ));
                        }
                    }
                    out_fields.push(field);
                }
            }
            Type::Struct { fields: out_fields }
        }
        TypeExpr::Generic(base, args, span) => {
            let (import_path, name) = match base.as_ref() {
                TypeExpr::Ident(n, _) => (ctx.import_path.to_string(), n.clone()),
                TypeExpr::Qualified(pkg, n, _) => match (ctx.resolve_import)(pkg) {
                    Some(p) => (p, n.clone()),
                    None => {
                        diags.report(Diagnostic::error(
                            position_of(ctx, *span),
                            format!("unresolved package qualifier {pkg}"),
                        ));
                        return Type::Builtin(Builtin::Any);
                    }
                },
                _ => return Type::Builtin(Builtin::Any),
            };
            let type_args: Vec<Type> = args.iter().map(|a| extract_type_expr(table, ctx, a, diags)).collect();
            if import_path.ends_with("encore.dev/config") && name == "Value" {
                return make_config_wrapper(type_args.into_iter().next().unwrap_or(Type::Builtin(Builtin::Any)), false, diags, position_of(ctx, *span));
            }
            extract_named(table, ctx, &import_path, &name, *span, &type_args, diags)
        }
        TypeExpr::Interface(_) => Type::Builtin(Builtin::Any),
        TypeExpr::Chan(inner, _) => extract_type_expr(table, ctx, inner, diags),
        TypeExpr::Func(_, _, _) => Type::Builtin(Builtin::Any),
        TypeExpr::Ellipsis(inner, _) => Type::List(Box::new(extract_type_expr(table, ctx, inner, diags))),
    }
}

fn position_of(ctx: &ExtractCtx, _span: crate::source::Span) -> Position {
    // Callers generally have a real file/line; schema extraction proper is
    // position-light because diagnostics at this layer are rare (only
    // duplicate-JSON-name and unresolved-qualifier). The file id is not
    // tracked in `ExtractCtx` to keep it reusable across files in a
    // generic-instantiation substitution; callers needing a precise
    // position re-derive it from the originating declaration.
    let _ = ctx;
    Position::new(0, 0, 0, 0)
}

fn embedded_name(ty: &TypeExpr) -> String {
    match ty {
        TypeExpr::Ident(n, _) => n.clone(),
        TypeExpr::Qualified(_, n, _) => n.clone(),
        TypeExpr::Pointer(inner, _) => embedded_name(inner),
        _ => String::new(),
    }
}

fn extract_field(
    table: &mut SchemaTable,
    ctx: &ExtractCtx,
    name: &str,
    field: &crate::ast::StructField,
    diags: &mut DiagnosticList,
) -> Field {
    let ty = extract_type_expr(table, ctx, &field.ty, diags);
    let tags = field.tag.as_deref().map(crate::directive::parse_struct_tag).unwrap_or_default();
    let json_name = tags.json.clone().unwrap_or_else(|| name.to_string());
    let query_name = tags.qs.clone().unwrap_or_else(|| to_snake_case(name));
    let header_name = tags.header.clone();
    let sensitive = tags.sensitive;
    let optional = tags.optional;

    if header_name.is_some() {
        if matches!(ty, Type::List(_)) {
            diags.report(Diagnostic::error(
                position_of(ctx, field.span),
                format!("header-tagged field {name} must not be list-typed"),
            ));
        }
        if matches!(ty, Type::TypeParamRef { .. }) {
            diags.report(Diagnostic::error(
                position_of(ctx, field.span),
                format!("header-tagged field {name} must not be a generic parameter"),
            ));
        }
        if !matches!(ty, Type::Builtin(_)) {
            diags.report(Diagnostic::error(
                position_of(ctx, field.span),
                format!("header-tagged field {name} must be a builtin type"),
            ));
        }
        if is_reserved_header_name(header_name.as_deref().unwrap_or_default()) {
            diags.report(Diagnostic::error(
                position_of(ctx, field.span),
                format!("{name} uses reserved header name"),
            ));
        }
    }

    Field {
        name: name.to_string(),
        doc: field.doc.clone(),
        ty,
        optional,
        raw_tag: field.tag.clone(),
        json_name: if json_name == "-" { None } else { Some(json_name) },
        query_name: Some(query_name),
        header_name,
        // spec.md §8: `json:"-"` + `encore:"sensitive"` is still recorded as
        // sensitive; it just produces no JSON path (computed by C14).
        sensitive,
    }
}

fn is_reserved_header_name(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "content-type" | "content-length" | "host" | "connection" | "authorization"
    )
}

#[must_use]
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::new();
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() {
            if i != 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn make_config_wrapper(elem: Type, is_list: bool, diags: &mut DiagnosticList, pos: Position) -> Type {
    // spec.md §9 Open Question #2 (canonical): config.Value[config.Value[T]]
    // is disallowed except when the *outer* is a values-list and the inner
    // is not itself a wrapper.
    if let Type::ConfigWrapper { is_list: inner_is_list, .. } = &elem {
        if !(is_list && !*inner_is_list) {
            diags.report(Diagnostic::error(pos, "nested config.Value[config.Value[T]] is not allowed"));
        }
    }
    Type::ConfigWrapper {
        elem: Box::new(elem),
        is_list,
    }
}

/// Resolves a named type reference, reserving a decl id before recursing
/// into the declaration's body (spec.md §4.4's core invariant).
fn extract_named(
    table: &mut SchemaTable,
    ctx: &ExtractCtx,
    import_path: &str,
    name: &str,
    span: crate::source::Span,
    type_args: &[Type],
    diags: &mut DiagnosticList,
) -> Type {
    let Some((doc, position, type_params, body)) = (ctx.lookup_type_decl)(import_path, name) else {
        diags.report(Diagnostic::error(
            position_of(ctx, span),
            format!("unresolved type {import_path}.{name}"),
        ));
        return Type::Builtin(Builtin::Any);
    };

    if type_args.len() != type_params.len() && !type_params.is_empty() {
        diags.report(Diagnostic::error(
            position_of(ctx, span),
            format!(
                "{name} expects {} type argument(s), got {}",
                type_params.len(),
                type_args.len()
            ),
        ));
    }

    let (decl_id, already_existed) = table.reserve(import_path, name, doc, position, type_params.clone());
    if !already_existed {
        // Reserve-before-recurse: the stub is visible to any recursive
        // reference encountered while extracting `body` below.
        let mut nested_env: Vec<(String, DeclId, u32)> = type_params
            .iter()
            .enumerate()
            .map(|(i, p)| (p.clone(), decl_id, i as u32))
            .collect();
        nested_env.extend(ctx.type_param_env.iter().cloned());
        let nested_ctx = ExtractCtx {
            import_path,
            type_param_env: nested_env,
            resolve_import: ctx.resolve_import,
            lookup_type_decl: ctx.lookup_type_decl,
        };
        let root = extract_type_expr(table, &nested_ctx, &body, diags);
        table.set_root(decl_id, root);
    }

    Type::Named {
        decl: decl_id,
        type_args: type_args.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::StructField;

    fn noop_resolver(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn recursive_type_terminates() {
        let mut table = SchemaTable::new();
        let mut diags = DiagnosticList::new(10);
        // type T struct { Next *T; V string }
        let self_ty = TypeExpr::Struct(
            vec![
                StructField {
                    names: vec!["Next".into()],
                    ty: TypeExpr::Pointer(Box::new(TypeExpr::Ident("T".into(), dummy_span())), dummy_span()),
                    tag: None,
                    doc: None,
                    span: dummy_span(),
                },
                StructField {
                    names: vec!["V".into()],
                    ty: TypeExpr::Ident("string".into(), dummy_span()),
                    tag: None,
                    doc: None,
                    span: dummy_span(),
                },
            ],
            dummy_span(),
        );
        let lookup = move |_: &str, name: &str| -> Option<(Option<String>, Position, Vec<String>, TypeExpr)> {
            if name == "T" {
                Some((None, Position::new(0, 0, 1, 1), Vec::new(), self_ty.clone()))
            } else {
                None
            }
        };
        let ctx = ExtractCtx {
            import_path: "app",
            type_param_env: Vec::new(),
            resolve_import: &noop_resolver,
            lookup_type_decl: &lookup,
        };
        let ty = extract_type_expr(&mut table, &ctx, &TypeExpr::Ident("T".into(), dummy_span()), &mut diags);
        assert!(matches!(ty, Type::Named { .. }));
        assert_eq!(table.len(), 1);
        let decl = table.get(0);
        assert!(decl.root.is_some());
        assert!(!diags.has_errors());
    }

    #[test]
    fn generic_map_instantiation() {
        let mut table = SchemaTable::new();
        let mut diags = DiagnosticList::new(10);
        let body = TypeExpr::Struct(
            vec![StructField {
                names: vec!["M".into()],
                ty: TypeExpr::Map(
                    Box::new(TypeExpr::Ident("K".into(), dummy_span())),
                    Box::new(TypeExpr::Ident("V".into(), dummy_span())),
                    dummy_span(),
                ),
                tag: None,
                doc: None,
                span: dummy_span(),
            }],
            dummy_span(),
        );
        let lookup = move |_: &str, name: &str| -> Option<(Option<String>, Position, Vec<String>, TypeExpr)> {
            if name == "M" {
                Some((None, Position::new(0, 0, 1, 1), vec!["K".into(), "V".into()], body.clone()))
            } else {
                None
            }
        };
        let ctx = ExtractCtx {
            import_path: "app",
            type_param_env: Vec::new(),
            resolve_import: &noop_resolver,
            lookup_type_decl: &lookup,
        };
        let usage = TypeExpr::Generic(
            Box::new(TypeExpr::Ident("M".into(), dummy_span())),
            vec![
                TypeExpr::Ident("string".into(), dummy_span()),
                TypeExpr::Ident("int".into(), dummy_span()),
            ],
            dummy_span(),
        );
        let ty = extract_type_expr(&mut table, &ctx, &usage, &mut diags);
        let Type::Named { decl, type_args } = ty else {
            panic!("expected named type")
        };
        assert_eq!(type_args, vec![Type::Builtin(Builtin::String), Type::Builtin(Builtin::Int)]);
        let root = table.get(decl).root.clone().unwrap();
        let Type::Struct { fields } = root else {
            panic!("expected struct root")
        };
        assert_eq!(
            fields[0].ty,
            Type::Map(
                Box::new(Type::TypeParamRef { decl, index: 0 }),
                Box::new(Type::TypeParamRef { decl, index: 1 })
            )
        );
    }

    #[test]
    fn duplicate_json_names_rejected() {
        let mut table = SchemaTable::new();
        let mut diags = DiagnosticList::new(10);
        let ctx = ExtractCtx {
            import_path: "app",
            type_param_env: Vec::new(),
            resolve_import: &noop_resolver,
            lookup_type_decl: &|_, _| None,
        };
        let ty = TypeExpr::Struct(
            vec![
                StructField {
                    names: vec!["A".into()],
                    ty: TypeExpr::Ident("string".into(), dummy_span()),
                    tag: Some("json:\"x\"".into()),
                    doc: None,
                    span: dummy_span(),
                },
                StructField {
                    names: vec!["B".into()],
                    ty: TypeExpr::Ident("string".into(), dummy_span()),
                    tag: Some("json:\"x\"".into()),
                    doc: None,
                    span: dummy_span(),
                },
            ],
            dummy_span(),
        );
        let _ = extract_type_expr(&mut table, &ctx, &ty, &mut diags);
        assert!(diags.has_errors());
    }

    fn dummy_span() -> crate::source::Span {
        crate::source::Span::new(0, 0)
    }
}
