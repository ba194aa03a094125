//! Syntax tree produced by [`crate::parser`]. Covers exactly the surface
//! later phases need: package/import/func/type/var/const declarations,
//! receivers, generics, struct field tags, composite literals, and the
//! statement forms needed to find call expressions, assignments and
//! returns. Not a complete Go grammar — e.g. `select`/`goto` bodies are
//! parsed only deep enough to stay brace-balanced.

use crate::source::Span;

/// Identity of an AST node, stable for the lifetime of one pipeline run.
/// Used as the key of [`crate::source::SourceFile::references`] (C9 writes,
/// C13 reads) and by the dispatcher (C7) to record resource definitions.
pub type NodeId = u32;

#[derive(Debug, Clone)]
pub struct File {
    pub package_name: String,
    pub package_span: Span,
    pub doc: Option<String>,
    pub imports: Vec<ImportSpec>,
    pub decls: Vec<Decl>,
}

#[derive(Debug, Clone)]
pub struct ImportSpec {
    pub id: NodeId,
    pub path: String,
    pub alias: Option<String>,
    pub is_dot: bool,
    pub is_blank: bool,
    pub span: Span,
}

impl ImportSpec {
    /// The local name this import is referenced by: the alias, the blank
    /// `_`, or the last path segment.
    #[must_use]
    pub fn local_name(&self) -> &str {
        if let Some(alias) = &self.alias {
            return alias;
        }
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

#[derive(Debug, Clone)]
pub enum Decl {
    Func(FuncDecl),
    Type(TypeDecl),
    Var(ValueDecl),
    Const(ValueDecl),
}

impl Decl {
    #[must_use]
    pub fn span(&self) -> Span {
        match self {
            Decl::Func(f) => f.span,
            Decl::Type(t) => t.span,
            Decl::Var(v) | Decl::Const(v) => v.span,
        }
    }

    #[must_use]
    pub fn doc(&self) -> Option<&str> {
        match self {
            Decl::Func(f) => f.doc.as_deref(),
            Decl::Type(t) => t.doc.as_deref(),
            Decl::Var(v) | Decl::Const(v) => v.doc.as_deref(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Receiver {
    pub name: Option<String>,
    pub type_name: String,
    pub pointer: bool,
}

#[derive(Debug, Clone)]
pub struct TypeParam {
    pub name: String,
    /// Constraint is parsed but not interpreted (`any`, interface unions,
    /// etc.) — only the ordered list of names matters to the schema
    /// extractor (spec.md §4.4).
    pub constraint: TypeExpr,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: Option<String>,
    pub ty: TypeExpr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct FuncDecl {
    pub id: NodeId,
    pub name: String,
    pub doc: Option<String>,
    pub receiver: Option<Receiver>,
    pub type_params: Vec<TypeParam>,
    pub params: Vec<Param>,
    pub results: Vec<Param>,
    pub body: Option<Block>,
    pub span: Span,
    pub name_span: Span,
}

impl FuncDecl {
    #[must_use]
    pub fn is_method(&self) -> bool {
        self.receiver.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct TypeDecl {
    pub id: NodeId,
    pub name: String,
    pub doc: Option<String>,
    pub type_params: Vec<TypeParam>,
    pub ty: TypeExpr,
    pub span: Span,
    pub name_span: Span,
}

#[derive(Debug, Clone)]
pub struct ValueDecl {
    pub id: NodeId,
    pub names: Vec<String>,
    pub ty: Option<TypeExpr>,
    pub values: Vec<Expr>,
    pub doc: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct StructField {
    /// Empty means an embedded field; the field's name is the type's last
    /// identifier in that case.
    pub names: Vec<String>,
    pub ty: TypeExpr,
    /// Raw tag text with the surrounding backticks stripped.
    pub tag: Option<String>,
    pub doc: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum TypeExpr {
    Ident(String, Span),
    /// `pkg.Name`
    Qualified(String, String, Span),
    Pointer(Box<TypeExpr>, Span),
    /// `[N]T` when `len` is `Some`, `[...]T` when `None` but sized.
    Array(Option<Box<Expr>>, Box<TypeExpr>, Span),
    Slice(Box<TypeExpr>, Span),
    Map(Box<TypeExpr>, Box<TypeExpr>, Span),
    Struct(Vec<StructField>, Span),
    Interface(Span),
    Chan(Box<TypeExpr>, Span),
    /// `Name[T1, ..., Tn]`
    Generic(Box<TypeExpr>, Vec<TypeExpr>, Span),
    Func(Vec<Param>, Vec<Param>, Span),
    Ellipsis(Box<TypeExpr>, Span),
}

impl TypeExpr {
    #[must_use]
    pub fn span(&self) -> Span {
        match self {
            TypeExpr::Ident(_, s)
            | TypeExpr::Qualified(_, _, s)
            | TypeExpr::Pointer(_, s)
            | TypeExpr::Array(_, _, s)
            | TypeExpr::Slice(_, s)
            | TypeExpr::Map(_, _, s)
            | TypeExpr::Struct(_, s)
            | TypeExpr::Interface(s)
            | TypeExpr::Chan(_, s)
            | TypeExpr::Generic(_, _, s)
            | TypeExpr::Func(_, _, s)
            | TypeExpr::Ellipsis(_, s) => *s,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub id: NodeId,
    pub span: Span,
    pub kind: ExprKind,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Ident(String),
    Int(String),
    Float(String),
    String(String),
    RawString(String),
    Bool(bool),
    Unary(UnOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Paren(Box<Expr>),
    Selector(Box<Expr>, String),
    /// `base[args...]` — a single index expression (`arr[i]`) or a generic
    /// instantiation (`pkg.Ctor[A, B]`), disambiguated by `args.len()`.
    Index(Box<Expr>, Vec<Expr>),
    Call(Box<Expr>, Vec<Expr>),
    CompositeLit(Option<TypeExpr>, Vec<CompositeElt>),
    TypeExprValue(TypeExpr),
}

#[derive(Debug, Clone)]
pub struct CompositeElt {
    pub key: Option<Expr>,
    pub value: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
    Addr,
    Deref,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    LAnd,
    LOr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Default)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Block(Block),
    Expr(Expr),
    Assign {
        lhs: Vec<Expr>,
        rhs: Vec<Expr>,
        define: bool,
    },
    Return(Vec<Expr>),
    LocalDecl(Decl),
    If {
        init: Option<Box<Stmt>>,
        cond: Expr,
        then: Block,
        els: Option<Box<Stmt>>,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        post: Option<Box<Stmt>>,
        body: Block,
    },
    Switch {
        init: Option<Box<Stmt>>,
        tag: Option<Expr>,
        cases: Vec<SwitchCase>,
    },
    Go(Expr),
    Defer(Expr),
    Branch(&'static str),
    Labeled(String, Box<Stmt>),
    /// Anything the pragmatic statement grammar didn't model in detail
    /// (select bodies, goto targets) but whose inner expressions still need
    /// to be visited for call-expression discovery.
    Other(Vec<Expr>),
}

#[derive(Debug, Clone)]
pub struct SwitchCase {
    pub values: Vec<Expr>,
    pub body: Vec<Stmt>,
}

impl Default for Span {
    fn default() -> Self {
        Span::new(0, 0)
    }
}
