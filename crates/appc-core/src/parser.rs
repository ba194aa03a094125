//! Recursive-descent parser. Turns a token stream (see [`crate::lexer`])
//! into the tree defined in [`crate::ast`]. Composite-literal disambiguation
//! follows the same trick the reference Go parser uses: a flag suppresses
//! parsing `{` as a composite literal brace while inside an `if`/`for`/
//! `switch` header, where `{` instead opens the body.

use crate::ast::*;
use crate::diagnostics::Diagnostic;
use crate::lexer::{lex, CommentGroup};
use crate::source::{FileId, Span};
use crate::token::{Token, TokenKind};

pub struct ParseOutput {
    pub file: File,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn parse_file(file_id: FileId, source: &[u8]) -> ParseOutput {
    let lexed = lex(file_id, source);
    let mut p = Parser {
        file_id,
        src: source,
        tokens: lexed.tokens,
        comments: lexed.comments,
        pos: 0,
        next_node_id: 0,
        diagnostics: lexed.diagnostics,
        composite_lit_ok: true,
    };
    let file = p.parse_file();
    ParseOutput {
        file,
        diagnostics: p.diagnostics,
    }
}

struct Parser<'a> {
    file_id: FileId,
    src: &'a [u8],
    tokens: Vec<Token>,
    comments: Vec<CommentGroup>,
    pos: usize,
    next_node_id: NodeId,
    diagnostics: Vec<Diagnostic>,
    composite_lit_ok: bool,
}

impl<'a> Parser<'a> {
    fn node_id(&mut self) -> NodeId {
        self.next_node_id += 1;
        self.next_node_id
    }

    fn position(&self, offset: u32) -> crate::source::Position {
        // Line/column computed lazily here since the parser doesn't carry a
        // LineIndex; callers that need precise positions re-derive them from
        // the owning SourceFile's LineIndex using this offset.
        crate::source::Position::new(self.file_id, offset, 0, 0)
    }

    fn error(&mut self, offset: u32, msg: impl Into<String>) {
        self.diagnostics.push(Diagnostic::error(self.position(offset), msg));
    }

    fn cur(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn cur_kind(&self) -> TokenKind {
        self.cur().kind
    }

    fn text(&self, span: Span) -> &str {
        std::str::from_utf8(&self.src[span.start as usize..span.end as usize]).unwrap_or("")
    }

    fn bump(&mut self) -> Token {
        let t = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, kind: TokenKind) -> Option<Token> {
        if self.cur_kind() == kind {
            Some(self.bump())
        } else {
            None
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Token {
        if let Some(t) = self.eat(kind) {
            t
        } else {
            self.error(self.cur().span.start, format!("expected {what}"));
            self.cur().clone()
        }
    }

    fn doc_for(&self, decl_start: u32) -> Option<String> {
        let group = self
            .comments
            .iter()
            .filter(|g| g.span.end <= decl_start)
            .max_by_key(|g| g.span.end)?;
        let gap = &self.src[group.span.end as usize..decl_start as usize];
        if bytes_contain_blank_line(gap) {
            return None;
        }
        Some(group.joined_text())
    }

    // ---- top level ----

    fn parse_file(&mut self) -> File {
        let pkg_tok_start = self.cur().span.start;
        let doc = self.doc_for(pkg_tok_start);
        self.expect(TokenKind::Package, "'package'");
        let name_tok = self.expect(TokenKind::Ident, "package name");
        let package_name = self.text(name_tok.span).to_string();
        self.skip_terminator();

        let mut imports = Vec::new();
        while self.cur_kind() == TokenKind::Import {
            self.parse_import_decl(&mut imports);
            self.skip_terminator();
        }

        let mut decls = Vec::new();
        loop {
            match self.cur_kind() {
                TokenKind::Eof => break,
                TokenKind::Func => decls.push(Decl::Func(self.parse_func_decl())),
                TokenKind::Type => decls.push(Decl::Type(self.parse_type_decl())),
                TokenKind::Var => decls.push(Decl::Var(self.parse_value_decl(false))),
                TokenKind::Const => decls.push(Decl::Const(self.parse_value_decl(true))),
                _ => {
                    // Recover by skipping to the next recognizable top-level
                    // keyword so one malformed declaration doesn't abort the
                    // whole file (spec.md §4.1: parse failures produce
                    // diagnostics but do not abort collection).
                    self.error(self.cur().span.start, "expected declaration");
                    self.bump();
                }
            }
            self.skip_terminator();
        }

        File {
            package_name,
            package_span: name_tok.span,
            doc,
            imports,
            decls,
        }
    }

    fn skip_terminator(&mut self) {
        while self.cur_kind() == TokenKind::Semicolon {
            self.bump();
        }
    }

    fn parse_import_decl(&mut self, out: &mut Vec<ImportSpec>) {
        self.bump(); // 'import'
        if self.eat(TokenKind::LParen).is_some() {
            while self.cur_kind() != TokenKind::RParen && self.cur_kind() != TokenKind::Eof {
                if let Some(spec) = self.parse_import_spec() {
                    out.push(spec);
                }
                self.skip_terminator();
            }
            self.eat(TokenKind::RParen);
        } else if let Some(spec) = self.parse_import_spec() {
            out.push(spec);
        }
    }

    fn parse_import_spec(&mut self) -> Option<ImportSpec> {
        let start = self.cur().span.start;
        let (alias, is_dot, is_blank) = match self.cur_kind() {
            TokenKind::Dot => {
                self.bump();
                (None, true, false)
            }
            TokenKind::Ident => {
                let t = self.bump();
                let name = self.text(t.span).to_string();
                if name == "_" {
                    (None, false, true)
                } else {
                    (Some(name), false, false)
                }
            }
            _ => (None, false, false),
        };
        let path_tok = self.eat(TokenKind::String)?;
        let raw = self.text(path_tok.span);
        let path = raw.trim_matches('"').to_string();
        Some(ImportSpec {
            id: self.node_id(),
            path,
            alias,
            is_dot,
            is_blank,
            span: Span::new(start, path_tok.span.end),
        })
    }

    fn parse_type_params(&mut self) -> Vec<TypeParam> {
        let mut params = Vec::new();
        if self.eat(TokenKind::LBracket).is_none() {
            return params;
        }
        while self.cur_kind() != TokenKind::RBracket && self.cur_kind() != TokenKind::Eof {
            let mut names = vec![self.text(self.expect(TokenKind::Ident, "type parameter name").span).to_string()];
            while self.eat(TokenKind::Comma).is_some() {
                if self.cur_kind() == TokenKind::Ident
                    && !matches!(self.peek_kind(1), TokenKind::Comma | TokenKind::RBracket)
                {
                    // `K, V any` style grouped names sharing one constraint
                    names.push(self.text(self.bump().span).to_string());
                } else {
                    break;
                }
            }
            let constraint = self.parse_type_expr();
            for name in names {
                params.push(TypeParam {
                    name,
                    constraint: constraint.clone(),
                });
            }
            self.eat(TokenKind::Comma);
        }
        self.eat(TokenKind::RBracket);
        params
    }

    fn peek_kind(&self, n: usize) -> TokenKind {
        self.tokens.get(self.pos + n).map_or(TokenKind::Eof, |t| t.kind)
    }

    fn parse_func_decl(&mut self) -> FuncDecl {
        let start = self.cur().span.start;
        let doc = self.doc_for(start);
        self.bump(); // 'func'

        let receiver = if self.cur_kind() == TokenKind::LParen {
            Some(self.parse_receiver())
        } else {
            None
        };

        let name_tok = self.expect(TokenKind::Ident, "function name");
        let name = self.text(name_tok.span).to_string();
        let type_params = if receiver.is_none() { self.parse_type_params() } else { Vec::new() };
        let params = self.parse_param_list();
        let results = self.parse_results();
        let body = if self.cur_kind() == TokenKind::LBrace {
            Some(self.parse_block())
        } else {
            None
        };
        let end = self.tokens[self.pos.saturating_sub(1)].span.end;
        FuncDecl {
            id: self.node_id(),
            name,
            doc,
            receiver,
            type_params,
            params,
            results,
            body,
            span: Span::new(start, end),
            name_span: name_tok.span,
        }
    }

    fn parse_receiver(&mut self) -> Receiver {
        self.bump(); // '('
        let name = if self.cur_kind() == TokenKind::Ident
            && !matches!(self.peek_kind(1), TokenKind::RParen)
        {
            Some(self.text(self.bump().span).to_string())
        } else {
            None
        };
        let pointer = self.eat(TokenKind::Star).is_some();
        let type_name = if self.cur_kind() == TokenKind::Ident {
            self.text(self.bump().span).to_string()
        } else {
            String::new()
        };
        // generic receivers `(s *Foo[T])` — skip the bracketed params.
        if self.cur_kind() == TokenKind::LBracket {
            let mut depth = 0i32;
            loop {
                match self.cur_kind() {
                    TokenKind::LBracket => {
                        depth += 1;
                        self.bump();
                    }
                    TokenKind::RBracket => {
                        depth -= 1;
                        self.bump();
                        if depth == 0 {
                            break;
                        }
                    }
                    TokenKind::Eof => break,
                    _ => {
                        self.bump();
                    }
                }
            }
        }
        self.eat(TokenKind::RParen);
        Receiver {
            name,
            type_name,
            pointer,
        }
    }

    fn parse_param_list(&mut self) -> Vec<Param> {
        self.expect(TokenKind::LParen, "'('");
        let mut params = Vec::new();
        while self.cur_kind() != TokenKind::RParen && self.cur_kind() != TokenKind::Eof {
            params.extend(self.parse_param_group());
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.eat(TokenKind::RParen);
        params
    }

    /// Parses one comma-terminated group, e.g. `a, b int` producing two
    /// `Param`s sharing the trailing type, or a single unnamed `int`.
    fn parse_param_group(&mut self) -> Vec<Param> {
        let start = self.cur().span.start;
        let mut names = Vec::new();
        let save = self.pos;
        while self.cur_kind() == TokenKind::Ident {
            let ident_start = self.pos;
            let tok = self.bump();
            if self.cur_kind() == TokenKind::Comma && self.peek_kind(1) == TokenKind::Ident {
                names.push(self.text(tok.span).to_string());
                self.bump(); // comma
                continue;
            }
            if self.is_type_start() && self.cur_kind() != TokenKind::Dot {
                names.push(self.text(tok.span).to_string());
                let ty = self.parse_type_expr();
                return names
                    .into_iter()
                    .map(|n| Param {
                        name: Some(n),
                        ty: ty.clone(),
                        span: Span::new(start, ty.span().end),
                    })
                    .collect();
            }
            // Not actually a name list; rewind and treat as an unnamed type.
            self.pos = ident_start;
            break;
        }
        let _ = save;
        let ty = self.parse_type_expr();
        vec![Param {
            name: None,
            ty: ty.clone(),
            span: Span::new(start, ty.span().end),
        }]
    }

    fn is_type_start(&self) -> bool {
        matches!(
            self.cur_kind(),
            TokenKind::Ident
                | TokenKind::Star
                | TokenKind::LBracket
                | TokenKind::Map
                | TokenKind::Struct
                | TokenKind::Interface
                | TokenKind::Chan
                | TokenKind::Func
                | TokenKind::Ellipsis
        )
    }

    fn parse_results(&mut self) -> Vec<Param> {
        match self.cur_kind() {
            TokenKind::LParen => self.parse_param_list(),
            TokenKind::LBrace | TokenKind::Semicolon | TokenKind::Eof => Vec::new(),
            _ if self.is_type_start() => {
                let start = self.cur().span.start;
                let ty = self.parse_type_expr();
                vec![Param {
                    name: None,
                    ty: ty.clone(),
                    span: Span::new(start, ty.span().end),
                }]
            }
            _ => Vec::new(),
        }
    }

    fn parse_type_decl(&mut self) -> TypeDecl {
        let start = self.cur().span.start;
        let doc = self.doc_for(start);
        self.bump(); // 'type'
        let name_tok = self.expect(TokenKind::Ident, "type name");
        let name = self.text(name_tok.span).to_string();
        let type_params = self.parse_type_params();
        self.eat(TokenKind::Assign); // alias `type X = Y`, tracked loosely
        let ty = self.parse_type_expr();
        TypeDecl {
            id: self.node_id(),
            name,
            doc,
            type_params,
            span: Span::new(start, ty.span().end),
            ty,
            name_span: name_tok.span,
        }
    }

    fn parse_value_decl(&mut self, _is_const: bool) -> ValueDecl {
        let start = self.cur().span.start;
        let doc = self.doc_for(start);
        self.bump(); // 'var' | 'const'
        if self.eat(TokenKind::LParen).is_some() {
            // Only the first spec in a grouped block is retained as the
            // canonical ValueDecl; later phases only need file-level var
            // declarations to locate resource constructor calls, which are
            // always single-spec in practice (spec.md §4.5 examples).
            let first = self.parse_value_spec(start);
            while self.cur_kind() != TokenKind::RParen && self.cur_kind() != TokenKind::Eof {
                let _ = self.parse_value_spec(self.cur().span.start);
                self.skip_terminator();
            }
            self.eat(TokenKind::RParen);
            return ValueDecl { doc, ..first };
        }
        let mut spec = self.parse_value_spec(start);
        spec.doc = doc;
        spec
    }

    fn parse_value_spec(&mut self, start: u32) -> ValueDecl {
        let mut names = vec![self.text(self.expect(TokenKind::Ident, "identifier").span).to_string()];
        while self.eat(TokenKind::Comma).is_some() {
            names.push(self.text(self.expect(TokenKind::Ident, "identifier").span).to_string());
        }
        let ty = if self.is_type_start() && self.cur_kind() != TokenKind::Assign {
            Some(self.parse_type_expr())
        } else {
            None
        };
        let mut values = Vec::new();
        if self.eat(TokenKind::Assign).is_some() {
            values.push(self.parse_expr());
            while self.eat(TokenKind::Comma).is_some() {
                values.push(self.parse_expr());
            }
        }
        let end = self.tokens[self.pos.saturating_sub(1)].span.end;
        ValueDecl {
            id: self.node_id(),
            names,
            ty,
            values,
            doc: None,
            span: Span::new(start, end),
        }
    }

    // ---- types ----

    fn parse_type_expr(&mut self) -> TypeExpr {
        let start = self.cur().span.start;
        let base = match self.cur_kind() {
            TokenKind::Star => {
                self.bump();
                let inner = self.parse_type_expr();
                TypeExpr::Pointer(Box::new(inner), Span::new(start, self.prev_end()))
            }
            TokenKind::Ellipsis => {
                self.bump();
                let inner = self.parse_type_expr();
                TypeExpr::Ellipsis(Box::new(inner), Span::new(start, self.prev_end()))
            }
            TokenKind::LBracket => {
                self.bump();
                let len = if self.cur_kind() == TokenKind::RBracket {
                    None
                } else if self.eat(TokenKind::Ellipsis).is_some() {
                    None
                } else {
                    Some(Box::new(self.parse_expr()))
                };
                self.eat(TokenKind::RBracket);
                let elem = self.parse_type_expr();
                TypeExpr::Array(len, Box::new(elem), Span::new(start, self.prev_end()))
            }
            TokenKind::Map => {
                self.bump();
                self.eat(TokenKind::LBracket);
                let key = self.parse_type_expr();
                self.eat(TokenKind::RBracket);
                let value = self.parse_type_expr();
                TypeExpr::Map(Box::new(key), Box::new(value), Span::new(start, self.prev_end()))
            }
            TokenKind::Chan => {
                self.bump();
                self.eat(TokenKind::Lt); // directional chan `<-`, tolerated loosely
                let elem = self.parse_type_expr();
                TypeExpr::Chan(Box::new(elem), Span::new(start, self.prev_end()))
            }
            TokenKind::Struct => self.parse_struct_type(start),
            TokenKind::Interface => {
                self.bump();
                self.skip_balanced_braces();
                TypeExpr::Interface(Span::new(start, self.prev_end()))
            }
            TokenKind::Func => {
                self.bump();
                let params = self.parse_param_list();
                let results = self.parse_results();
                TypeExpr::Func(params, results, Span::new(start, self.prev_end()))
            }
            TokenKind::Ident => {
                let first = self.text(self.bump().span).to_string();
                let named = if self.eat(TokenKind::Dot).is_some() {
                    let sel = self.text(self.expect(TokenKind::Ident, "identifier").span).to_string();
                    TypeExpr::Qualified(first, sel, Span::new(start, self.prev_end()))
                } else {
                    TypeExpr::Ident(first, Span::new(start, self.prev_end()))
                };
                if self.cur_kind() == TokenKind::LBracket {
                    self.bump();
                    let mut args = vec![self.parse_type_expr()];
                    while self.eat(TokenKind::Comma).is_some() {
                        args.push(self.parse_type_expr());
                    }
                    self.eat(TokenKind::RBracket);
                    TypeExpr::Generic(Box::new(named), args, Span::new(start, self.prev_end()))
                } else {
                    named
                }
            }
            _ => {
                self.error(start, "expected type expression");
                TypeExpr::Ident("<error>".into(), Span::new(start, start))
            }
        };
        base
    }

    fn prev_end(&self) -> u32 {
        self.tokens[self.pos.saturating_sub(1)].span.end
    }

    fn parse_struct_type(&mut self, start: u32) -> TypeExpr {
        self.bump(); // 'struct'
        self.expect(TokenKind::LBrace, "'{'");
        let mut fields = Vec::new();
        while self.cur_kind() != TokenKind::RBrace && self.cur_kind() != TokenKind::Eof {
            fields.push(self.parse_struct_field());
            self.skip_terminator();
        }
        self.eat(TokenKind::RBrace);
        TypeExpr::Struct(fields, Span::new(start, self.prev_end()))
    }

    fn parse_struct_field(&mut self) -> StructField {
        let fstart = self.cur().span.start;
        let doc = self.doc_for(fstart);
        let mut names = Vec::new();
        // Distinguish `Name Type` from an embedded `pkg.Type` / `*Type`.
        let save = self.pos;
        if self.cur_kind() == TokenKind::Ident {
            let first = self.bump();
            if self.cur_kind() == TokenKind::Ident
                || (self.cur_kind() != TokenKind::Dot
                    && self.cur_kind() != TokenKind::LBracket
                    && self.is_type_start())
            {
                names.push(self.text(first.span).to_string());
                while self.eat(TokenKind::Comma).is_some() {
                    names.push(self.text(self.expect(TokenKind::Ident, "field name").span).to_string());
                }
            } else {
                self.pos = save;
            }
        }
        let ty = self.parse_type_expr();
        let tag = self.eat(TokenKind::RawString).map(|t| {
            let raw = self.text(t.span);
            raw.trim_matches('`').to_string()
        });
        StructField {
            names,
            ty: ty.clone(),
            tag,
            doc,
            span: Span::new(fstart, ty.span().end),
        }
    }

    fn skip_balanced_braces(&mut self) {
        if self.eat(TokenKind::LBrace).is_none() {
            return;
        }
        let mut depth = 1i32;
        while depth > 0 && self.cur_kind() != TokenKind::Eof {
            match self.cur_kind() {
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => depth -= 1,
                _ => {}
            }
            self.bump();
        }
    }

    // ---- statements ----

    fn parse_block(&mut self) -> Block {
        let start = self.cur().span.start;
        self.expect(TokenKind::LBrace, "'{'");
        let mut stmts = Vec::new();
        while self.cur_kind() != TokenKind::RBrace && self.cur_kind() != TokenKind::Eof {
            stmts.push(self.parse_stmt());
            self.skip_terminator();
        }
        self.eat(TokenKind::RBrace);
        Block {
            stmts,
            span: Span::new(start, self.prev_end()),
        }
    }

    fn parse_stmt(&mut self) -> Stmt {
        match self.cur_kind() {
            TokenKind::LBrace => Stmt::Block(self.parse_block()),
            TokenKind::Return => {
                self.bump();
                let mut exprs = Vec::new();
                if !matches!(self.cur_kind(), TokenKind::Semicolon | TokenKind::RBrace | TokenKind::Eof) {
                    exprs.push(self.parse_expr());
                    while self.eat(TokenKind::Comma).is_some() {
                        exprs.push(self.parse_expr());
                    }
                }
                Stmt::Return(exprs)
            }
            TokenKind::If => self.parse_if(),
            TokenKind::For => self.parse_for(),
            TokenKind::Switch => self.parse_switch(),
            TokenKind::Go => {
                self.bump();
                Stmt::Go(self.parse_expr())
            }
            TokenKind::Defer => {
                self.bump();
                Stmt::Defer(self.parse_expr())
            }
            TokenKind::Break => {
                self.bump();
                self.eat(TokenKind::Ident);
                Stmt::Branch("break")
            }
            TokenKind::Continue => {
                self.bump();
                self.eat(TokenKind::Ident);
                Stmt::Branch("continue")
            }
            TokenKind::Fallthrough => {
                self.bump();
                Stmt::Branch("fallthrough")
            }
            TokenKind::Goto => {
                self.bump();
                self.eat(TokenKind::Ident);
                Stmt::Branch("goto")
            }
            TokenKind::Var => Stmt::LocalDecl(Decl::Var(self.parse_value_decl(false))),
            TokenKind::Const => Stmt::LocalDecl(Decl::Const(self.parse_value_decl(true))),
            TokenKind::Type => Stmt::LocalDecl(Decl::Type(self.parse_type_decl())),
            TokenKind::Select => {
                self.bump();
                self.skip_balanced_braces();
                Stmt::Other(Vec::new())
            }
            _ => self.parse_simple_stmt(),
        }
    }

    fn parse_simple_stmt(&mut self) -> Stmt {
        let mut lhs = vec![self.parse_expr()];
        while self.eat(TokenKind::Comma).is_some() {
            lhs.push(self.parse_expr());
        }
        match self.cur_kind() {
            TokenKind::Define | TokenKind::Assign => {
                let define = self.cur_kind() == TokenKind::Define;
                self.bump();
                let mut rhs = vec![self.parse_expr()];
                while self.eat(TokenKind::Comma).is_some() {
                    rhs.push(self.parse_expr());
                }
                Stmt::Assign { lhs, rhs, define }
            }
            _ if lhs.len() == 1 => Stmt::Expr(lhs.pop().unwrap()),
            _ => Stmt::Other(lhs),
        }
    }

    fn parse_header_clause(&mut self) -> (Option<Box<Stmt>>, Option<Expr>) {
        let saved = self.composite_lit_ok;
        self.composite_lit_ok = false;
        let mut init = None;
        let mut cond = None;
        if self.cur_kind() != TokenKind::LBrace {
            let first = self.parse_simple_stmt();
            if self.eat(TokenKind::Semicolon).is_some() {
                init = Some(Box::new(first));
                if self.cur_kind() != TokenKind::LBrace {
                    cond = Some(self.parse_expr());
                }
            } else if let Stmt::Expr(e) = first {
                cond = Some(e);
            } else {
                init = Some(Box::new(first));
            }
        }
        self.composite_lit_ok = saved;
        (init, cond)
    }

    fn parse_if(&mut self) -> Stmt {
        self.bump(); // 'if'
        let (init, cond) = self.parse_header_clause();
        let then = self.parse_block();
        let els = if self.cur_kind() == TokenKind::Else {
            self.bump();
            Some(Box::new(if self.cur_kind() == TokenKind::If {
                self.parse_if()
            } else {
                Stmt::Block(self.parse_block())
            }))
        } else {
            None
        };
        Stmt::If {
            init,
            cond: cond.unwrap_or(Expr {
                id: 0,
                span: self.cur().span,
                kind: ExprKind::Bool(true),
            }),
            then,
            els,
        }
    }

    fn parse_for(&mut self) -> Stmt {
        self.bump(); // 'for'
        let saved = self.composite_lit_ok;
        self.composite_lit_ok = false;
        let mut init = None;
        let mut cond = None;
        let mut post = None;
        if self.cur_kind() != TokenKind::LBrace {
            if self.cur_kind() == TokenKind::Semicolon {
                self.bump();
                if self.cur_kind() != TokenKind::Semicolon {
                    cond = Some(self.parse_expr());
                }
                self.expect(TokenKind::Semicolon, "';'");
                if self.cur_kind() != TokenKind::LBrace {
                    post = Some(Box::new(self.parse_simple_stmt()));
                }
            } else {
                let first = self.parse_simple_stmt();
                if self.eat(TokenKind::Semicolon).is_some() {
                    init = Some(Box::new(first));
                    if self.cur_kind() != TokenKind::Semicolon {
                        cond = Some(self.parse_expr());
                    }
                    self.expect(TokenKind::Semicolon, "';'");
                    if self.cur_kind() != TokenKind::LBrace {
                        post = Some(Box::new(self.parse_simple_stmt()));
                    }
                } else if let Stmt::Expr(e) = first {
                    cond = Some(e);
                } else {
                    init = Some(Box::new(first));
                }
            }
        }
        self.composite_lit_ok = saved;
        let body = self.parse_block();
        Stmt::For {
            init,
            cond,
            post,
            body,
        }
    }

    fn parse_switch(&mut self) -> Stmt {
        self.bump(); // 'switch'
        let (init, tag) = self.parse_header_clause();
        self.expect(TokenKind::LBrace, "'{'");
        let mut cases = Vec::new();
        while self.cur_kind() != TokenKind::RBrace && self.cur_kind() != TokenKind::Eof {
            let mut values = Vec::new();
            if self.cur_kind() == TokenKind::Case {
                self.bump();
                values.push(self.parse_expr());
                while self.eat(TokenKind::Comma).is_some() {
                    values.push(self.parse_expr());
                }
            } else {
                self.expect(TokenKind::Default, "'case' or 'default'");
            }
            self.eat(TokenKind::Colon);
            let mut body = Vec::new();
            while !matches!(self.cur_kind(), TokenKind::Case | TokenKind::Default | TokenKind::RBrace | TokenKind::Eof)
            {
                body.push(self.parse_stmt());
                self.skip_terminator();
            }
            cases.push(SwitchCase { values, body });
        }
        self.eat(TokenKind::RBrace);
        Stmt::Switch { init, tag, cases }
    }

    // ---- expressions ----

    fn parse_expr(&mut self) -> Expr {
        self.parse_binary(0)
    }

    fn parse_binary(&mut self, min_prec: u8) -> Expr {
        let mut lhs = self.parse_unary();
        loop {
            let Some((op, prec)) = binop_of(self.cur_kind()) else {
                break;
            };
            if prec < min_prec {
                break;
            }
            self.bump();
            let rhs = self.parse_binary(prec + 1);
            let span = Span::new(lhs.span.start, rhs.span.end);
            lhs = Expr {
                id: self.node_id(),
                span,
                kind: ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)),
            };
        }
        lhs
    }

    fn parse_unary(&mut self) -> Expr {
        let start = self.cur().span.start;
        let op = match self.cur_kind() {
            TokenKind::Minus => Some(UnOp::Neg),
            TokenKind::Bang => Some(UnOp::Not),
            TokenKind::Amp => Some(UnOp::Addr),
            TokenKind::Star => Some(UnOp::Deref),
            TokenKind::Plus => {
                self.bump();
                return self.parse_unary();
            }
            _ => None,
        };
        if let Some(op) = op {
            self.bump();
            let inner = self.parse_unary();
            return Expr {
                id: self.node_id(),
                span: Span::new(start, inner.span.end),
                kind: ExprKind::Unary(op, Box::new(inner)),
            };
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Expr {
        let mut e = self.parse_primary();
        loop {
            match self.cur_kind() {
                TokenKind::Dot => {
                    self.bump();
                    let sel_tok = self.expect(TokenKind::Ident, "selector");
                    let sel = self.text(sel_tok.span).to_string();
                    e = Expr {
                        id: self.node_id(),
                        span: Span::new(e.span.start, sel_tok.span.end),
                        kind: ExprKind::Selector(Box::new(e), sel),
                    };
                }
                TokenKind::LBracket => {
                    self.bump();
                    let mut args = vec![self.parse_expr()];
                    // A generic instantiation (`pkg.Ctor[A, B]`) lists every
                    // type argument comma-separated; a plain index
                    // expression (`arr[i]`) never has a comma here.
                    while self.cur_kind() == TokenKind::Comma {
                        self.bump();
                        args.push(self.parse_expr());
                    }
                    let end_tok = self.expect(TokenKind::RBracket, "']'");
                    e = Expr {
                        id: self.node_id(),
                        span: Span::new(e.span.start, end_tok.span.end),
                        kind: ExprKind::Index(Box::new(e), args),
                    };
                }
                TokenKind::LParen => {
                    self.bump();
                    let mut args = Vec::new();
                    while self.cur_kind() != TokenKind::RParen && self.cur_kind() != TokenKind::Eof {
                        args.push(self.parse_expr());
                        self.eat(TokenKind::Ellipsis);
                        if self.eat(TokenKind::Comma).is_none() {
                            break;
                        }
                    }
                    let end_tok = self.expect(TokenKind::RParen, "')'");
                    e = Expr {
                        id: self.node_id(),
                        span: Span::new(e.span.start, end_tok.span.end),
                        kind: ExprKind::Call(Box::new(e), args),
                    };
                }
                TokenKind::LBrace if self.composite_lit_ok && is_composite_lit_head(&e) => {
                    e = self.parse_composite_lit_body(e);
                }
                _ => break,
            }
        }
        e
    }

    fn parse_composite_lit_body(&mut self, head: Expr) -> Expr {
        let start = head.span.start;
        self.bump(); // '{'
        let saved = self.composite_lit_ok;
        self.composite_lit_ok = true;
        let mut elts = Vec::new();
        while self.cur_kind() != TokenKind::RBrace && self.cur_kind() != TokenKind::Eof {
            let first = self.parse_expr();
            if self.eat(TokenKind::Colon).is_some() {
                let value = self.parse_expr();
                elts.push(CompositeElt {
                    key: Some(first),
                    value,
                });
            } else {
                elts.push(CompositeElt { key: None, value: first });
            }
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.composite_lit_ok = saved;
        let end_tok = self.expect(TokenKind::RBrace, "'}'");
        let ty = expr_to_type_expr(&head);
        Expr {
            id: self.node_id(),
            span: Span::new(start, end_tok.span.end),
            kind: ExprKind::CompositeLit(ty, elts),
        }
    }

    fn parse_primary(&mut self) -> Expr {
        let start = self.cur().span.start;
        match self.cur_kind() {
            TokenKind::Ident => {
                let t = self.bump();
                let text = self.text(t.span).to_string();
                match text.as_str() {
                    "true" => Expr {
                        id: self.node_id(),
                        span: t.span,
                        kind: ExprKind::Bool(true),
                    },
                    "false" => Expr {
                        id: self.node_id(),
                        span: t.span,
                        kind: ExprKind::Bool(false),
                    },
                    _ => Expr {
                        id: self.node_id(),
                        span: t.span,
                        kind: ExprKind::Ident(text),
                    },
                }
            }
            TokenKind::Int => {
                let t = self.bump();
                Expr {
                    id: self.node_id(),
                    span: t.span,
                    kind: ExprKind::Int(self.text(t.span).to_string()),
                }
            }
            TokenKind::Float => {
                let t = self.bump();
                Expr {
                    id: self.node_id(),
                    span: t.span,
                    kind: ExprKind::Float(self.text(t.span).to_string()),
                }
            }
            TokenKind::String => {
                let t = self.bump();
                let raw = self.text(t.span);
                Expr {
                    id: self.node_id(),
                    span: t.span,
                    kind: ExprKind::String(unquote(raw)),
                }
            }
            TokenKind::RawString => {
                let t = self.bump();
                let raw = self.text(t.span);
                Expr {
                    id: self.node_id(),
                    span: t.span,
                    kind: ExprKind::RawString(raw.trim_matches('`').to_string()),
                }
            }
            TokenKind::LParen => {
                self.bump();
                let saved = self.composite_lit_ok;
                self.composite_lit_ok = true;
                let inner = self.parse_expr();
                self.composite_lit_ok = saved;
                let end_tok = self.expect(TokenKind::RParen, "')'");
                Expr {
                    id: self.node_id(),
                    span: Span::new(start, end_tok.span.end),
                    kind: ExprKind::Paren(Box::new(inner)),
                }
            }
            TokenKind::LBracket | TokenKind::Map | TokenKind::Struct | TokenKind::Chan | TokenKind::Interface => {
                let ty = self.parse_type_expr();
                Expr {
                    id: self.node_id(),
                    span: ty.span(),
                    kind: ExprKind::TypeExprValue(ty),
                }
            }
            TokenKind::Func => {
                let ty = self.parse_type_expr();
                if self.cur_kind() == TokenKind::LBrace {
                    self.skip_balanced_braces();
                }
                Expr {
                    id: self.node_id(),
                    span: ty.span(),
                    kind: ExprKind::TypeExprValue(ty),
                }
            }
            _ => {
                self.error(start, "expected expression");
                self.bump();
                Expr {
                    id: self.node_id(),
                    span: Span::new(start, start),
                    kind: ExprKind::Ident("<error>".into()),
                }
            }
        }
    }
}

fn binop_of(kind: TokenKind) -> Option<(BinOp, u8)> {
    Some(match kind {
        TokenKind::PipePipe => (BinOp::LOr, 1),
        TokenKind::AmpAmp => (BinOp::LAnd, 2),
        TokenKind::EqEq => (BinOp::Eq, 3),
        TokenKind::Ne => (BinOp::Ne, 3),
        TokenKind::Lt => (BinOp::Lt, 3),
        TokenKind::Le => (BinOp::Le, 3),
        TokenKind::Gt => (BinOp::Gt, 3),
        TokenKind::Ge => (BinOp::Ge, 3),
        TokenKind::Plus => (BinOp::Add, 4),
        TokenKind::Minus => (BinOp::Sub, 4),
        TokenKind::Pipe => (BinOp::Or, 4),
        TokenKind::Caret => (BinOp::Xor, 4),
        TokenKind::Star => (BinOp::Mul, 5),
        TokenKind::Slash => (BinOp::Div, 5),
        TokenKind::Percent => (BinOp::Rem, 5),
        TokenKind::Amp => (BinOp::And, 5),
        TokenKind::Shl => (BinOp::Shl, 5),
        TokenKind::Shr => (BinOp::Shr, 5),
        _ => return None,
    })
}

fn is_composite_lit_head(e: &Expr) -> bool {
    matches!(e.kind, ExprKind::Ident(_) | ExprKind::Selector(_, _) | ExprKind::TypeExprValue(_))
}

/// Reinterprets an expression parsed in value position as a type, for the
/// cases where Go's grammar is ambiguous without symbol information: a
/// composite literal's head, or a call's callee when it is actually a
/// generic instantiation (`pubsub.NewTopic[Msg]`).
pub(crate) fn expr_to_type_expr(e: &Expr) -> Option<TypeExpr> {
    match &e.kind {
        ExprKind::Ident(name) => Some(TypeExpr::Ident(name.clone(), e.span)),
        ExprKind::Selector(base, sel) => {
            if let ExprKind::Ident(pkg) = &base.kind {
                Some(TypeExpr::Qualified(pkg.clone(), sel.clone(), e.span))
            } else {
                None
            }
        }
        ExprKind::TypeExprValue(ty) => Some(ty.clone()),
        _ => None,
    }
}

fn unquote(raw: &str) -> String {
    let inner = raw.trim_matches('"');
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn bytes_contain_blank_line(gap: &[u8]) -> bool {
    let mut newlines = 0;
    for &b in gap {
        if b == b'\n' {
            newlines += 1;
            if newlines >= 2 {
                return true;
            }
        } else if !b.is_ascii_whitespace() {
            newlines = 0;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_package_and_import() {
        let out = parse_file(0, b"package svc\n\nimport \"context\"\n");
        assert_eq!(out.file.package_name, "svc");
        assert_eq!(out.file.imports.len(), 1);
        assert_eq!(out.file.imports[0].path, "context");
    }

    #[test]
    fn attaches_doc_comment_to_func() {
        let src = b"package svc\n\n//encore:api public\nfunc Ping(ctx context.Context) error { return nil }\n";
        let out = parse_file(0, src);
        let Decl::Func(f) = &out.file.decls[0] else {
            panic!("expected func decl")
        };
        assert_eq!(f.doc.as_deref(), Some("encore:api public"));
    }

    #[test]
    fn parses_struct_with_tags() {
        let src = b"package svc\n\ntype U struct {\n\tID int `json:\"id\"`\n}\n";
        let out = parse_file(0, src);
        let Decl::Type(t) = &out.file.decls[0] else {
            panic!("expected type decl")
        };
        let TypeExpr::Struct(fields, _) = &t.ty else {
            panic!("expected struct type")
        };
        assert_eq!(fields[0].tag.as_deref(), Some("json:\"id\""));
    }

    #[test]
    fn parses_generic_type_decl() {
        let src = b"package svc\n\ntype M[K any, V any] struct {\n\tM map[K]V\n}\n";
        let out = parse_file(0, src);
        let Decl::Type(t) = &out.file.decls[0] else {
            panic!("expected type decl")
        };
        assert_eq!(t.type_params.len(), 2);
    }

    #[test]
    fn finds_call_expr_in_body() {
        let src = b"package svc\n\nfunc F() {\n\tcron.NewJob(\"x\", cron.JobConfig{})\n}\n";
        let out = parse_file(0, src);
        let Decl::Func(f) = &out.file.decls[0] else {
            panic!("expected func")
        };
        let body = f.body.as_ref().unwrap();
        assert!(matches!(body.stmts[0], Stmt::Expr(_)));
    }

    #[test]
    fn if_header_does_not_eat_block_as_composite_lit() {
        let src = b"package svc\n\nfunc F() {\n\tif x {\n\t\treturn\n\t}\n}\n";
        let out = parse_file(0, src);
        assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);
    }
}
