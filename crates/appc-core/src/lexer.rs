//! Tokenizer. Produces a flat token stream plus the comment groups the
//! parser uses to attach documentation (and therefore directives, C4) to
//! the following declaration. Automatic statement termination is handled by
//! tracking whether a newline preceded each token, matching Go's lexer.

use crate::diagnostics::Diagnostic;
use crate::source::{FileId, Span};
use crate::token::{keyword, Token, TokenKind};

/// A contiguous run of `//` or `/* */` comments with no blank line between
/// them and no other token on their lines. The parser treats the group
/// immediately preceding a declaration, on the declaration's line or the
/// line(s) right above it, as that declaration's doc comment.
#[derive(Debug, Clone)]
pub struct CommentGroup {
    pub span: Span,
    /// Text of each line, comment markers stripped.
    pub lines: Vec<String>,
    /// True if at least one blank line separates this group from the next
    /// token — used by the parser to decide whether it documents that
    /// token or is a floating comment.
    pub followed_by_blank_line: bool,
}

impl CommentGroup {
    /// First non-empty line, used for package doc text (spec.md §4.1) and
    /// directive parsing (spec.md §4.3: "first non-empty line of a
    /// documentation-comment group").
    #[must_use]
    pub fn first_non_empty_line(&self) -> Option<&str> {
        self.lines.iter().map(String::as_str).find(|l| !l.trim().is_empty())
    }

    #[must_use]
    pub fn joined_text(&self) -> String {
        self.lines.join("\n")
    }
}

pub struct LexOutput {
    pub tokens: Vec<Token>,
    pub comments: Vec<CommentGroup>,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn lex(file: FileId, source: &[u8]) -> LexOutput {
    Lexer::new(file, source).run()
}

struct Lexer<'a> {
    file: FileId,
    src: &'a [u8],
    pos: usize,
    tokens: Vec<Token>,
    comments: Vec<CommentGroup>,
    diagnostics: Vec<Diagnostic>,
    pending_newline: bool,
}

impl<'a> Lexer<'a> {
    fn new(file: FileId, src: &'a [u8]) -> Self {
        Self {
            file,
            src,
            pos: 0,
            tokens: Vec::new(),
            comments: Vec::new(),
            diagnostics: Vec::new(),
            pending_newline: false,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, n: usize) -> Option<u8> {
        self.src.get(self.pos + n).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn run(mut self) -> LexOutput {
        let mut pending_group: Option<(Span, Vec<String>)> = None;
        loop {
            let start_of_iter = self.pos;
            self.skip_spaces_tracking_newline();
            if let Some(b) = self.peek() {
                if b == b'/' && self.peek_at(1) == Some(b'/') {
                    let (span, line) = self.lex_line_comment();
                    self.push_comment_line(&mut pending_group, span, vec![line]);
                    continue;
                }
                if b == b'/' && self.peek_at(1) == Some(b'*') {
                    let (span, lines) = self.lex_block_comment();
                    self.push_comment_line(&mut pending_group, span, lines);
                    continue;
                }
            }
            // Any non-comment content ends the pending comment group.
            if let Some((span, lines)) = pending_group.take() {
                self.comments.push(CommentGroup {
                    span,
                    lines,
                    followed_by_blank_line: false,
                });
            }
            if self.pos == start_of_iter && self.peek().is_none() {
                break;
            }
            match self.peek() {
                None => break,
                Some(b) if is_ident_start(b) => self.lex_ident_or_keyword(),
                Some(b) if b.is_ascii_digit() => self.lex_number(),
                Some(b'"') => self.lex_string(),
                Some(b'`') => self.lex_raw_string(),
                Some(b) => self.lex_punct(b),
            }
        }
        if let Some((span, lines)) = pending_group.take() {
            self.comments.push(CommentGroup {
                span,
                lines,
                followed_by_blank_line: false,
            });
        }
        self.emit(TokenKind::Eof, self.pos as u32, self.pos as u32);
        LexOutput {
            tokens: self.tokens,
            comments: self.comments,
            diagnostics: self.diagnostics,
        }
    }

    fn push_comment_line(
        &mut self,
        pending: &mut Option<(Span, Vec<String>)>,
        span: Span,
        lines: Vec<String>,
    ) {
        match pending {
            Some((existing_span, existing_lines)) => {
                existing_span.end = span.end;
                existing_lines.extend(lines);
            }
            None => *pending = Some((span, lines)),
        }
    }

    fn skip_spaces_tracking_newline(&mut self) {
        while let Some(b) = self.peek() {
            match b {
                b'\n' => {
                    self.pending_newline = true;
                    self.pos += 1;
                }
                b' ' | b'\t' | b'\r' => {
                    self.pos += 1;
                }
                _ => break,
            }
        }
    }

    fn lex_line_comment(&mut self) -> (Span, String) {
        let start = self.pos as u32;
        self.pos += 2;
        let text_start = self.pos;
        while let Some(b) = self.peek() {
            if b == b'\n' {
                break;
            }
            self.pos += 1;
        }
        let text = String::from_utf8_lossy(&self.src[text_start..self.pos]).into_owned();
        (Span::new(start, self.pos as u32), text.trim_start().to_string())
    }

    fn lex_block_comment(&mut self) -> (Span, Vec<String>) {
        let start = self.pos as u32;
        self.pos += 2;
        let text_start = self.pos;
        while self.pos < self.src.len() {
            if self.peek() == Some(b'*') && self.peek_at(1) == Some(b'/') {
                break;
            }
            self.pos += 1;
        }
        let text = String::from_utf8_lossy(&self.src[text_start..self.pos]).into_owned();
        self.pos = (self.pos + 2).min(self.src.len());
        let lines = text.lines().map(|l| l.trim_start_matches('*').trim().to_string()).collect();
        (Span::new(start, self.pos as u32), lines)
    }

    fn lex_ident_or_keyword(&mut self) {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if is_ident_continue(b) {
                self.pos += 1;
            } else {
                break;
            }
        }
        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap_or("");
        let kind = keyword(text).unwrap_or(TokenKind::Ident);
        self.emit(kind, start as u32, self.pos as u32);
    }

    fn lex_number(&mut self) {
        let start = self.pos;
        let mut is_float = false;
        while let Some(b) = self.peek() {
            if b.is_ascii_digit() || b == b'_' {
                self.pos += 1;
            } else if b == b'.' && !is_float {
                is_float = true;
                self.pos += 1;
            } else if (b == b'e' || b == b'E') && self.pos > start {
                is_float = true;
                self.pos += 1;
                if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                    self.pos += 1;
                }
            } else if b == b'x' || b == b'X' || b.is_ascii_hexdigit() {
                // tolerate hex literals (0x..) without separate float tracking
                self.pos += 1;
            } else {
                break;
            }
        }
        let kind = if is_float { TokenKind::Float } else { TokenKind::Int };
        self.emit(kind, start as u32, self.pos as u32);
    }

    fn lex_string(&mut self) {
        let start = self.pos;
        self.pos += 1;
        while let Some(b) = self.peek() {
            match b {
                b'\\' => {
                    self.pos += 2;
                }
                b'"' => {
                    self.pos += 1;
                    break;
                }
                b'\n' => break,
                _ => self.pos += 1,
            }
        }
        self.emit(TokenKind::String, start as u32, self.pos as u32);
    }

    fn lex_raw_string(&mut self) {
        let start = self.pos;
        self.pos += 1;
        while let Some(b) = self.peek() {
            self.pos += 1;
            if b == b'`' {
                break;
            }
        }
        self.emit(TokenKind::RawString, start as u32, self.pos as u32);
    }

    fn lex_punct(&mut self, b: u8) {
        let start = self.pos;
        let two = (b, self.peek_at(1));
        let (kind, len) = match two {
            (b':', Some(b'=')) => (TokenKind::Define, 2),
            (b'=', Some(b'=')) => (TokenKind::EqEq, 2),
            (b'!', Some(b'=')) => (TokenKind::Ne, 2),
            (b'<', Some(b'=')) => (TokenKind::Le, 2),
            (b'>', Some(b'=')) => (TokenKind::Ge, 2),
            (b'&', Some(b'&')) => (TokenKind::AmpAmp, 2),
            (b'|', Some(b'|')) => (TokenKind::PipePipe, 2),
            (b'<', Some(b'<')) => (TokenKind::Shl, 2),
            (b'>', Some(b'>')) => (TokenKind::Shr, 2),
            (b'.', Some(b'.')) if self.peek_at(2) == Some(b'.') => (TokenKind::Ellipsis, 3),
            _ => (
                match b {
                    b'(' => TokenKind::LParen,
                    b')' => TokenKind::RParen,
                    b'{' => TokenKind::LBrace,
                    b'}' => TokenKind::RBrace,
                    b'[' => TokenKind::LBracket,
                    b']' => TokenKind::RBracket,
                    b',' => TokenKind::Comma,
                    b';' => TokenKind::Semicolon,
                    b':' => TokenKind::Colon,
                    b'.' => TokenKind::Dot,
                    b'=' => TokenKind::Assign,
                    b'+' => TokenKind::Plus,
                    b'-' => TokenKind::Minus,
                    b'*' => TokenKind::Star,
                    b'/' => TokenKind::Slash,
                    b'%' => TokenKind::Percent,
                    b'&' => TokenKind::Amp,
                    b'|' => TokenKind::Pipe,
                    b'^' => TokenKind::Caret,
                    b'!' => TokenKind::Bang,
                    b'<' => TokenKind::Lt,
                    b'>' => TokenKind::Gt,
                    _ => {
                        self.pos += 1;
                        return;
                    }
                },
                1,
            ),
        };
        self.pos += len;
        self.emit(kind, start as u32, self.pos as u32);
    }

    fn emit(&mut self, kind: TokenKind, start: u32, end: u32) {
        let preceded = self.pending_newline;
        self.pending_newline = false;
        self.tokens.push(Token::new(kind, Span::new(start, end), preceded));
    }
}

fn is_ident_start(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphabetic() || b >= 0x80
}

fn is_ident_continue(b: u8) -> bool {
    is_ident_start(b) || b.is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexes_package_clause() {
        let out = lex(0, b"package foo\n");
        assert_eq!(out.tokens[0].kind, TokenKind::Package);
        assert_eq!(out.tokens[1].kind, TokenKind::Ident);
    }

    #[test]
    fn attaches_leading_comment_as_group() {
        let out = lex(0, b"// Doc line\nfunc F() {}\n");
        assert_eq!(out.comments.len(), 1);
        assert_eq!(out.comments[0].lines[0], "Doc line");
    }

    #[test]
    fn tracks_preceding_newline_for_auto_semicolons() {
        let out = lex(0, b"a\nb");
        assert!(out.tokens[1].preceded_by_newline);
    }

    #[test]
    fn raw_string_spans_backticks() {
        let out = lex(0, b"`json:\"id\"`");
        assert_eq!(out.tokens[0].kind, TokenKind::RawString);
    }
}
