use crate::diagnostic::Diagnostic;
use crate::lexeme::Lexeme;
use crate::span::{Span, Spanned};

pub struct Lexer<'src> {
    source: &'src [u8],
    pos: usize,
    /// Open parenthesis/bracket depth; newlines inside are not logical.
    group_depth: usize,
    /// Indentation column stack; always starts with 0.
    indents: Vec<usize>,
    diagnostics: Vec<Diagnostic>,
    /// Recognized-but-unmodeled constructs found while scanning.
    unsupported: Vec<Spanned<String>>,
    /// Whether we've seen a token on the current logical line.
    token_on_line: bool,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source: source.as_bytes(),
            pos: 0,
            group_depth: 0,
            indents: vec![0],
            diagnostics: Vec::new(),
            unsupported: Vec::new(),
            token_on_line: false,
        }
    }

    pub fn tokenize(mut self) -> (Vec<Spanned<Lexeme>>, Vec<Diagnostic>, Vec<Spanned<String>>) {
        let mut tokens = Vec::new();
        loop {
            if !self.token_on_line && self.group_depth == 0 {
                self.handle_line_start(&mut tokens);
            }
            if self.pos >= self.source.len() {
                break;
            }

            self.skip_inline_whitespace_and_comments();
            if self.pos >= self.source.len() {
                break;
            }

            let start = self.pos;
            let ch = self.source[self.pos];

            if ch == b'\n' {
                self.pos += 1;
                if self.group_depth == 0 && self.token_on_line {
                    tokens.push(self.make_token(Lexeme::Newline, start, self.pos));
                    self.token_on_line = false;
                }
                continue;
            }

            self.token_on_line = true;

            if is_ident_start(ch) {
                let tok = self.scan_ident_or_keyword();
                tokens.push(tok);
                continue;
            }

            if ch.is_ascii_digit() {
                let tok = self.scan_number();
                tokens.push(tok);
                continue;
            }

            if ch == b'\'' || ch == b'"' {
                self.scan_string(start, "string literal");
                continue;
            }

            if let Some(tok) = self.scan_symbol(start) {
                tokens.push(tok);
            }
            // scan_symbol returned None: error or unsupported recorded, keep going
        }

        // Close the final line and any open blocks.
        let end = self.pos;
        if self.token_on_line {
            tokens.push(self.make_token(Lexeme::Newline, end, end));
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            tokens.push(self.make_token(Lexeme::Dedent, end, end));
        }
        tokens.push(self.make_token(Lexeme::Eof, end, end));

        (tokens, self.diagnostics, self.unsupported)
    }

    /// Measure the indentation of the next non-blank line and emit
    /// Indent/Dedent tokens against the indentation stack. Blank and
    /// comment-only lines are consumed without affecting layout.
    fn handle_line_start(&mut self, tokens: &mut Vec<Spanned<Lexeme>>) {
        loop {
            let line_start = self.pos;
            let mut col = 0usize;
            while self.pos < self.source.len() {
                match self.source[self.pos] {
                    b' ' => col += 1,
                    // Tabs advance to the next multiple of 8, as the
                    // source language's tokenizer does.
                    b'\t' => col = (col / 8 + 1) * 8,
                    _ => break,
                }
                self.pos += 1;
            }

            if self.pos >= self.source.len() {
                return;
            }
            match self.source[self.pos] {
                b'\n' => {
                    self.pos += 1;
                    continue;
                }
                b'#' => {
                    while self.pos < self.source.len() && self.source[self.pos] != b'\n' {
                        self.pos += 1;
                    }
                    continue;
                }
                b'\r' => {
                    self.pos += 1;
                    continue;
                }
                _ => {}
            }

            let current = *self.indents.last().unwrap();
            if col > current {
                self.indents.push(col);
                tokens.push(self.make_token(Lexeme::Indent, line_start, self.pos));
            } else if col < current {
                while *self.indents.last().unwrap() > col {
                    self.indents.pop();
                    tokens.push(self.make_token(Lexeme::Dedent, line_start, self.pos));
                }
                if *self.indents.last().unwrap() != col {
                    self.diagnostics.push(
                        Diagnostic::error(
                            "unindent does not match any outer indentation level".to_string(),
                            Span::new(line_start as u32, self.pos as u32),
                        )
                        .with_help(
                            "each line must dedent back to an indentation level used above"
                                .to_string(),
                        ),
                    );
                    // Recover by treating it as the nearest level.
                    self.indents.push(col);
                }
            }
            return;
        }
    }

    fn skip_inline_whitespace_and_comments(&mut self) {
        loop {
            while self.pos < self.source.len()
                && matches!(self.source[self.pos], b' ' | b'\t' | b'\r')
            {
                self.pos += 1;
            }
            // Inside parentheses newlines do not end the logical line.
            if self.group_depth > 0
                && self.pos < self.source.len()
                && self.source[self.pos] == b'\n'
            {
                self.pos += 1;
                continue;
            }
            if self.pos < self.source.len() && self.source[self.pos] == b'#' {
                while self.pos < self.source.len() && self.source[self.pos] != b'\n' {
                    self.pos += 1;
                }
                continue;
            }
            break;
        }
    }

    fn scan_ident_or_keyword(&mut self) -> Spanned<Lexeme> {
        let start = self.pos;
        while self.pos < self.source.len() && is_ident_continue(self.source[self.pos]) {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.source[start..self.pos]).unwrap();

        // String prefixes: f"...", r'...', b"..." and friends.
        if text.len() <= 2
            && text.bytes().all(|b| matches!(b, b'f' | b'r' | b'b' | b'u' | b'F' | b'R' | b'B' | b'U'))
            && matches!(self.peek(), Some(b'\'') | Some(b'"'))
        {
            let construct = if text.bytes().any(|b| b == b'f' || b == b'F') {
                "f-string"
            } else {
                "string literal"
            };
            self.scan_string(start, construct);
            // Produce a placeholder identifier so the parser can keep going.
            return self.make_token(Lexeme::Ident("_error_".to_string()), start, self.pos);
        }

        let token = Lexeme::from_keyword(text).unwrap_or_else(|| Lexeme::Ident(text.to_string()));
        self.make_token(token, start, self.pos)
    }

    /// Consume a quoted literal and record it as unsupported.
    fn scan_string(&mut self, start: usize, construct: &str) {
        let quote = self.source[self.pos];
        self.pos += 1;
        while self.pos < self.source.len() {
            match self.source[self.pos] {
                b'\\' => {
                    self.pos += 2;
                }
                b'\n' => break,
                c if c == quote => {
                    self.pos += 1;
                    break;
                }
                _ => self.pos += 1,
            }
        }
        self.push_unsupported(construct, start, self.pos);
    }

    fn scan_number(&mut self) -> Spanned<Lexeme> {
        let start = self.pos;

        // Radix prefixes: 0x, 0o, 0b.
        let radix = if self.source[self.pos] == b'0' {
            match self.peek_at(1) {
                Some(b'x') | Some(b'X') => 16,
                Some(b'o') | Some(b'O') => 8,
                Some(b'b') | Some(b'B') => 2,
                _ => 10,
            }
        } else {
            10
        };
        if radix != 10 {
            self.pos += 2;
        }

        let digits_start = self.pos;
        while self.pos < self.source.len()
            && (self.source[self.pos].is_ascii_alphanumeric() || self.source[self.pos] == b'_')
        {
            self.pos += 1;
        }

        // A '.'-or-exponent tail makes this a float, which is not modeled.
        if radix == 10 {
            let is_float_dot = self.peek() == Some(b'.')
                && self.peek_at(1).is_some_and(|b| b.is_ascii_digit());
            if is_float_dot {
                self.pos += 1;
                while self.pos < self.source.len()
                    && (self.source[self.pos].is_ascii_alphanumeric()
                        || self.source[self.pos] == b'_'
                        || self.source[self.pos] == b'.')
                {
                    self.pos += 1;
                }
                self.push_unsupported("floating-point literal", start, self.pos);
                return self.make_token(Lexeme::Integer(0), start, self.pos);
            }
        }

        let text = std::str::from_utf8(&self.source[digits_start..self.pos]).unwrap();
        if text.bytes().any(|b| b == b'e' || b == b'E') && radix == 10 {
            self.push_unsupported("floating-point literal", start, self.pos);
            return self.make_token(Lexeme::Integer(0), start, self.pos);
        }

        let cleaned: String = text.chars().filter(|&c| c != '_').collect();
        match i128::from_str_radix(&cleaned, radix) {
            Ok(n) => self.make_token(Lexeme::Integer(n), start, self.pos),
            Err(_) => {
                self.diagnostics.push(
                    Diagnostic::error(
                        format!("integer literal '{}' is too large", text),
                        Span::new(start as u32, self.pos as u32),
                    )
                    .with_help(format!("maximum representable value is {}", i128::MAX)),
                );
                self.make_token(Lexeme::Integer(0), start, self.pos)
            }
        }
    }

    fn scan_symbol(&mut self, start: usize) -> Option<Spanned<Lexeme>> {
        let ch = self.source[self.pos];
        self.pos += 1;

        let token = match ch {
            b'(' => {
                self.group_depth += 1;
                Lexeme::LParen
            }
            b')' => {
                self.group_depth = self.group_depth.saturating_sub(1);
                Lexeme::RParen
            }
            b'[' => {
                self.group_depth += 1;
                Lexeme::LBracket
            }
            b']' => {
                self.group_depth = self.group_depth.saturating_sub(1);
                Lexeme::RBracket
            }
            b'{' => {
                self.group_depth += 1;
                Lexeme::LBrace
            }
            b'}' => {
                self.group_depth = self.group_depth.saturating_sub(1);
                Lexeme::RBrace
            }
            b',' => Lexeme::Comma,
            b':' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    self.push_unsupported("assignment expression ':='", start, self.pos);
                    return None;
                }
                Lexeme::Colon
            }
            b';' => Lexeme::Semicolon,
            b'.' => Lexeme::Dot,
            b'@' => Lexeme::At,
            b'+' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    Lexeme::PlusEq
                } else {
                    Lexeme::Plus
                }
            }
            b'-' => match self.peek() {
                Some(b'=') => {
                    self.pos += 1;
                    Lexeme::MinusEq
                }
                Some(b'>') => {
                    self.pos += 1;
                    Lexeme::Arrow
                }
                _ => Lexeme::Minus,
            },
            b'*' => match self.peek() {
                Some(b'=') => {
                    self.pos += 1;
                    Lexeme::StarEq
                }
                Some(b'*') => {
                    self.pos += 1;
                    Lexeme::StarStar
                }
                _ => Lexeme::Star,
            },
            b'/' => match self.peek() {
                Some(b'/') => {
                    self.pos += 1;
                    if self.peek() == Some(b'=') {
                        self.pos += 1;
                        Lexeme::SlashSlashEq
                    } else {
                        Lexeme::SlashSlash
                    }
                }
                _ => Lexeme::Slash,
            },
            b'%' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    Lexeme::PercentEq
                } else {
                    Lexeme::Percent
                }
            }
            b'=' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    Lexeme::EqEq
                } else {
                    Lexeme::Eq
                }
            }
            b'!' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    Lexeme::BangEq
                } else {
                    self.diagnostics.push(
                        Diagnostic::error(
                            "unexpected '!'".to_string(),
                            Span::new(start as u32, self.pos as u32),
                        )
                        .with_help("negation is written `not`, inequality `!=`".to_string()),
                    );
                    return None;
                }
            }
            b'<' => match self.peek() {
                Some(b'=') => {
                    self.pos += 1;
                    Lexeme::LtEq
                }
                Some(b'<') => {
                    self.pos += 1;
                    self.push_unsupported("bitwise shift operator '<<'", start, self.pos);
                    return None;
                }
                _ => Lexeme::Lt,
            },
            b'>' => match self.peek() {
                Some(b'=') => {
                    self.pos += 1;
                    Lexeme::GtEq
                }
                Some(b'>') => {
                    self.pos += 1;
                    self.push_unsupported("bitwise shift operator '>>'", start, self.pos);
                    return None;
                }
                _ => Lexeme::Gt,
            },
            b'&' => {
                self.push_unsupported("bitwise operator '&'", start, self.pos);
                return None;
            }
            b'|' => {
                self.push_unsupported("bitwise operator '|'", start, self.pos);
                return None;
            }
            b'^' => {
                self.push_unsupported("bitwise operator '^'", start, self.pos);
                return None;
            }
            b'~' => {
                self.push_unsupported("bitwise operator '~'", start, self.pos);
                return None;
            }
            b'\\' => {
                self.push_unsupported("backslash line continuation", start, self.pos);
                return None;
            }
            _ => {
                self.diagnostics.push(
                    Diagnostic::error(
                        format!("unexpected character '{}' (U+{:04X})", ch as char, ch),
                        Span::new(start as u32, self.pos as u32),
                    )
                    .with_help("this character is not part of the accepted syntax".to_string()),
                );
                return None;
            }
        };

        Some(self.make_token(token, start, self.pos))
    }

    fn push_unsupported(&mut self, construct: &str, start: usize, end: usize) {
        let span = Span::new(start as u32, end as u32);
        self.diagnostics.push(Diagnostic::error(
            format!("unsupported construct: {}", construct),
            span,
        ));
        self.unsupported.push(Spanned::new(construct.to_string(), span));
    }

    fn peek(&self) -> Option<u8> {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.source.get(self.pos + offset).copied()
    }

    fn make_token(&self, token: Lexeme, start: usize, end: usize) -> Spanned<Lexeme> {
        Spanned::new(token, Span::new(start as u32, end as u32))
    }
}

fn is_ident_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

fn is_ident_continue(ch: u8) -> bool {
    ch.is_ascii_alphanumeric() || ch == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<Lexeme> {
        let (tokens, diags, unsupported) = Lexer::new(source).tokenize();
        assert!(diags.is_empty(), "unexpected errors: {:?}", diags);
        assert!(unsupported.is_empty(), "unexpected unsupported: {:?}", unsupported);
        tokens.into_iter().map(|t| t.node).collect()
    }

    #[test]
    fn test_keywords() {
        let tokens = lex("def if elif else while for in return pass and or not");
        assert_eq!(
            tokens,
            vec![
                Lexeme::Def,
                Lexeme::If,
                Lexeme::Elif,
                Lexeme::Else,
                Lexeme::While,
                Lexeme::For,
                Lexeme::In,
                Lexeme::Return,
                Lexeme::Pass,
                Lexeme::And,
                Lexeme::Or,
                Lexeme::Not,
                Lexeme::Newline,
                Lexeme::Eof,
            ]
        );
    }

    #[test]
    fn test_symbols() {
        let tokens = lex("( ) , : = == != < <= > >= + - * // %");
        assert_eq!(
            tokens,
            vec![
                Lexeme::LParen,
                Lexeme::RParen,
                Lexeme::Comma,
                Lexeme::Colon,
                Lexeme::Eq,
                Lexeme::EqEq,
                Lexeme::BangEq,
                Lexeme::Lt,
                Lexeme::LtEq,
                Lexeme::Gt,
                Lexeme::GtEq,
                Lexeme::Plus,
                Lexeme::Minus,
                Lexeme::Star,
                Lexeme::SlashSlash,
                Lexeme::Percent,
                Lexeme::Newline,
                Lexeme::Eof,
            ]
        );
    }

    #[test]
    fn test_augmented_assignment_symbols() {
        let tokens = lex("+= -= *= //= %=");
        assert_eq!(
            tokens,
            vec![
                Lexeme::PlusEq,
                Lexeme::MinusEq,
                Lexeme::StarEq,
                Lexeme::SlashSlashEq,
                Lexeme::PercentEq,
                Lexeme::Newline,
                Lexeme::Eof,
            ]
        );
    }

    #[test]
    fn test_integers() {
        let tokens = lex("0 1 42 1_000_000 0xff 0b101 0o17");
        assert_eq!(
            tokens,
            vec![
                Lexeme::Integer(0),
                Lexeme::Integer(1),
                Lexeme::Integer(42),
                Lexeme::Integer(1_000_000),
                Lexeme::Integer(255),
                Lexeme::Integer(5),
                Lexeme::Integer(15),
                Lexeme::Newline,
                Lexeme::Eof,
            ]
        );
    }

    #[test]
    fn test_identifiers() {
        let tokens = lex("foo bar_baz x1 _hidden");
        assert_eq!(
            tokens,
            vec![
                Lexeme::Ident("foo".into()),
                Lexeme::Ident("bar_baz".into()),
                Lexeme::Ident("x1".into()),
                Lexeme::Ident("_hidden".into()),
                Lexeme::Newline,
                Lexeme::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_skipped() {
        let tokens = lex("foo  # trailing comment\nbar");
        assert_eq!(
            tokens,
            vec![
                Lexeme::Ident("foo".into()),
                Lexeme::Newline,
                Lexeme::Ident("bar".into()),
                Lexeme::Newline,
                Lexeme::Eof,
            ]
        );
    }

    #[test]
    fn test_indentation_block() {
        let tokens = lex("def f(x):\n    return x\n");
        assert_eq!(
            tokens,
            vec![
                Lexeme::Def,
                Lexeme::Ident("f".into()),
                Lexeme::LParen,
                Lexeme::Ident("x".into()),
                Lexeme::RParen,
                Lexeme::Colon,
                Lexeme::Newline,
                Lexeme::Indent,
                Lexeme::Return,
                Lexeme::Ident("x".into()),
                Lexeme::Newline,
                Lexeme::Dedent,
                Lexeme::Eof,
            ]
        );
    }

    #[test]
    fn test_nested_dedents_close_at_eof() {
        let tokens = lex("def f(x):\n    if x:\n        return 1\n");
        let dedents = tokens.iter().filter(|t| **t == Lexeme::Dedent).count();
        let indents = tokens.iter().filter(|t| **t == Lexeme::Indent).count();
        assert_eq!(indents, 2);
        assert_eq!(dedents, 2, "every Indent must be closed by a Dedent");
    }

    #[test]
    fn test_blank_lines_ignored() {
        let tokens = lex("def f(x):\n\n    # comment line\n\n    return x\n");
        assert!(tokens.contains(&Lexeme::Indent));
        let newlines = tokens.iter().filter(|t| **t == Lexeme::Newline).count();
        assert_eq!(newlines, 2, "blank lines must not produce Newline tokens");
    }

    #[test]
    fn test_implicit_line_joining() {
        let tokens = lex("f(a,\n  b)");
        assert_eq!(
            tokens,
            vec![
                Lexeme::Ident("f".into()),
                Lexeme::LParen,
                Lexeme::Ident("a".into()),
                Lexeme::Comma,
                Lexeme::Ident("b".into()),
                Lexeme::RParen,
                Lexeme::Newline,
                Lexeme::Eof,
            ]
        );
    }

    #[test]
    fn test_true_false_none() {
        let tokens = lex("True False None");
        assert_eq!(
            tokens,
            vec![
                Lexeme::True,
                Lexeme::False,
                Lexeme::NoneKw,
                Lexeme::Newline,
                Lexeme::Eof,
            ]
        );
    }

    // --- Error path tests ---

    fn lex_raw(source: &str) -> (Vec<Lexeme>, Vec<Diagnostic>, Vec<Spanned<String>>) {
        let (tokens, diags, unsupported) = Lexer::new(source).tokenize();
        let lexemes = tokens.into_iter().map(|t| t.node).collect();
        (lexemes, diags, unsupported)
    }

    #[test]
    fn test_error_float_literal() {
        let (_tokens, diags, unsupported) = lex_raw("x = 1.5");
        assert!(!diags.is_empty(), "float literal should produce an error");
        assert_eq!(unsupported.len(), 1);
        assert_eq!(unsupported[0].node, "floating-point literal");
    }

    #[test]
    fn test_error_string_literal() {
        let (_tokens, _diags, unsupported) = lex_raw("x = 'hello'");
        assert_eq!(unsupported.len(), 1);
        assert_eq!(unsupported[0].node, "string literal");
    }

    #[test]
    fn test_error_f_string() {
        let (_tokens, _diags, unsupported) = lex_raw("x = f'{y}'");
        assert_eq!(unsupported.len(), 1);
        assert_eq!(unsupported[0].node, "f-string");
    }

    #[test]
    fn test_error_bitwise_operator() {
        let (_tokens, _diags, unsupported) = lex_raw("x = a & b");
        assert_eq!(unsupported.len(), 1);
        assert!(
            unsupported[0].node.contains("bitwise operator"),
            "should name the bitwise operator, got: {}",
            unsupported[0].node
        );
    }

    #[test]
    fn test_error_walrus() {
        let (_tokens, _diags, unsupported) = lex_raw("if (n := 10) > 5:\n    pass\n");
        assert!(unsupported.iter().any(|u| u.node.contains(":=")));
    }

    #[test]
    fn test_error_integer_too_large() {
        let (_tokens, diags, _) = lex_raw("x = 9999999999999999999999999999999999999999999");
        assert!(!diags.is_empty(), "huge integer should produce an error");
        assert!(
            diags[0].message.contains("too large"),
            "should say the integer is too large, got: {}",
            diags[0].message
        );
    }

    #[test]
    fn test_error_bad_dedent() {
        let (_tokens, diags, _) = lex_raw("def f(x):\n        if x:\n   pass\n");
        assert!(
            diags.iter().any(|d| d.message.contains("unindent")),
            "mismatched dedent should be reported"
        );
    }
}
