//! Token kinds for the Go-shaped source lexer. Covers exactly the surface
//! the rest of the pipeline needs: package/import/func/type/var/const
//! declarations, generics, struct tags, composite literals, and the small
//! set of expressions/statements C3/C9/C10 inspect. Not a general-purpose
//! Go tokenizer — e.g. no complex numbers, no goto labels beyond what's
//! needed to skip over statement bodies.

use crate::source::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Literals
    Ident,
    Int,
    Float,
    String,
    RawString,
    // Keywords
    Package,
    Import,
    Func,
    Type,
    Var,
    Const,
    Struct,
    Interface,
    Map,
    Chan,
    Return,
    If,
    Else,
    For,
    Range,
    Switch,
    Case,
    Default,
    Break,
    Continue,
    Go,
    Defer,
    Select,
    Goto,
    Fallthrough,
    // Punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Colon,
    Dot,
    Ellipsis,
    // Operators
    Assign,
    Define, // :=
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    Pipe,
    Caret,
    Bang,
    Lt,
    Gt,
    Le,
    Ge,
    EqEq,
    Ne,
    AmpAmp,
    PipePipe,
    Shl,
    Shr,
    // Comments (doc comments are attached to the following decl by the parser)
    LineComment,
    BlockComment,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// True if a newline appears between this token and the previous one;
    /// used to synthesize automatic statement terminators the way Go's
    /// lexer does, since we don't require callers to write semicolons.
    pub preceded_by_newline: bool,
}

impl Token {
    #[must_use]
    pub fn new(kind: TokenKind, span: Span, preceded_by_newline: bool) -> Self {
        Self {
            kind,
            span,
            preceded_by_newline,
        }
    }
}

pub(crate) fn keyword(ident: &str) -> Option<TokenKind> {
    Some(match ident {
        "package" => TokenKind::Package,
        "import" => TokenKind::Import,
        "func" => TokenKind::Func,
        "type" => TokenKind::Type,
        "var" => TokenKind::Var,
        "const" => TokenKind::Const,
        "struct" => TokenKind::Struct,
        "interface" => TokenKind::Interface,
        "map" => TokenKind::Map,
        "chan" => TokenKind::Chan,
        "return" => TokenKind::Return,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "for" => TokenKind::For,
        "range" => TokenKind::Range,
        "switch" => TokenKind::Switch,
        "case" => TokenKind::Case,
        "default" => TokenKind::Default,
        "break" => TokenKind::Break,
        "continue" => TokenKind::Continue,
        "go" => TokenKind::Go,
        "defer" => TokenKind::Defer,
        "select" => TokenKind::Select,
        "goto" => TokenKind::Goto,
        "fallthrough" => TokenKind::Fallthrough,
        _ => return None,
    })
}
