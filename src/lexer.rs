//! Lexer (spec §4.1). Converts a source buffer into a packed token stream.
//! Two operating modes are supported: whole-buffer (lex once, up front) and
//! line-by-line (the lexer owns a callback that supplies more source text
//! as the parser's cursor catches up to the end of what has been lexed so
//! far) — used by the REPL and by streaming file mode (spec §6
//! `parse_line_by_line`).

use crate::error::{ParseError, SourcePos};
use crate::string_table::StringTable;
use crate::token::{IntSuffix, Keyword, Token, TokenKind, PUNCTUATORS};

/// Supplies additional source lines on demand, used by the REPL and by
/// streaming file mode so the lexer can pull more text as the parser's
/// cursor catches up to the end of what has been lexed so far.
pub trait LineReader {
    /// Returns the next line of source (without a trailing newline), or
    /// `None` at end of input.
    fn read_line(&mut self) -> Option<String>;
}

/// Adapts any `FnMut() -> Option<String>` closure into a [`LineReader`].
pub struct FnLineReader<F>(pub F);

impl<F: FnMut() -> Option<String>> LineReader for FnLineReader<F> {
    fn read_line(&mut self) -> Option<String> {
        (self.0)()
    }
}

pub struct Lexer<'a> {
    file: String,
    buf: String,
    pos: usize,
    line: u32,
    col: u32,
    reader: Option<Box<dyn LineReader + 'a>>,
    strings: &'a mut StringTable,
    /// Set while scanning a `#define`/`#include` line so the next newline
    /// is emitted as `TokenKind::Eol` instead of being skipped as ordinary
    /// whitespace (spec §4.1: directives are terminated in-band by the
    /// token stream, not by the lexer silently eating the newline).
    in_directive: bool,
}

impl<'a> Lexer<'a> {
    /// Whole-buffer mode: the entire source is already in memory.
    pub fn new(file: impl Into<String>, source: impl Into<String>, strings: &'a mut StringTable) -> Self {
        Self {
            file: file.into(),
            buf: source.into(),
            pos: 0,
            line: 1,
            col: 1,
            reader: None,
            strings,
            in_directive: false,
        }
    }

    /// Line-by-line mode: `reader` is polled for more text whenever the
    /// cursor runs dry.
    pub fn with_reader(
        file: impl Into<String>,
        strings: &'a mut StringTable,
        reader: Box<dyn LineReader + 'a>,
    ) -> Self {
        Self {
            file: file.into(),
            buf: String::new(),
            pos: 0,
            line: 1,
            col: 1,
            reader: Some(reader),
            strings,
            in_directive: false,
        }
    }

    /// Discard everything already consumed. Called by the statement driver
    /// between top-level statements in line-by-line mode so a long-running
    /// REPL or streamed file doesn't retain every line it has ever seen
    /// (spec §3 "Lifecycles": "file-by-line mode re-lexes each line and
    /// discards").
    pub fn discard_consumed(&mut self) {
        if self.pos > 0 {
            self.buf.drain(0..self.pos);
            self.pos = 0;
        }
    }

    fn fill(&mut self) -> bool {
        if self.pos < self.buf.len() {
            return true;
        }
        if let Some(reader) = &mut self.reader {
            if let Some(line) = reader.read_line() {
                self.buf.push_str(&line);
                self.buf.push('\n');
                return true;
            }
        }
        false
    }

    fn peek(&mut self) -> Option<char> {
        if !self.fill() {
            return None;
        }
        self.buf[self.pos..].chars().next()
    }

    fn peek2(&mut self) -> Option<char> {
        if !self.fill() {
            return None;
        }
        let mut it = self.buf[self.pos..].chars();
        it.next();
        it.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        match c {
            '\n' => {
                self.line += 1;
                self.col = 1;
            }
            _ => self.col += 1,
        }
        Some(c)
    }

    fn err(&self, line: u32, col: u32, msg: impl Into<String>) -> ParseError {
        ParseError::new(SourcePos::new(self.file.clone(), line, col), msg)
    }

    /// Lex and return the next token, skipping whitespace and comments.
    pub fn next_token(&mut self) -> Result<Token, ParseError> {
        loop {
            self.skip_whitespace_and_comments()?;
            let (line, col) = (self.line, self.col);
            let Some(c) = self.peek() else {
                return Ok(Token::new(TokenKind::Eof, line, col));
            };

            return match c {
                '\n' if self.in_directive => {
                    self.bump();
                    self.in_directive = false;
                    Ok(Token::new(TokenKind::Eol, line, col))
                }
                'a'..='z' | 'A'..='Z' | '_' => Ok(self.lex_ident_or_keyword(line, col)),
                '0'..='9' => self.lex_number(line, col),
                '.' if self.peek2().is_some_and(|d| d.is_ascii_digit()) => self.lex_number(line, col),
                '"' => self.lex_string(line, col),
                '\'' => self.lex_char(line, col),
                '#' => self.lex_hash(line, col),
                _ => self.lex_punct(line, col),
            };
        }
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), ParseError> {
        loop {
            match self.peek() {
                Some('\n') if self.in_directive => return Ok(()),
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('\\') if self.peek2() == Some('\n') => {
                    // backslash-newline continuation: swallow both, logical
                    // line count does not advance (spec §4.1).
                    self.bump();
                    let saved = self.line;
                    self.bump();
                    self.line = saved;
                    self.col = 1;
                }
                Some('/') if self.peek2() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some('/') if self.peek2() == Some('*') => {
                    let (line, col) = (self.line, self.col);
                    self.bump();
                    self.bump();
                    let mut closed = false;
                    while let Some(c) = self.peek() {
                        if c == '*' && self.peek2() == Some('/') {
                            self.bump();
                            self.bump();
                            closed = true;
                            break;
                        }
                        self.bump();
                    }
                    if !closed {
                        return Err(self.err(line, col, "unterminated block comment"));
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn lex_ident_or_keyword(&mut self, line: u32, col: u32) -> Token {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                s.push(c);
                self.bump();
            } else {
                break;
            }
        }
        if let Some(kw) = Keyword::from_str(&s) {
            Token::new(TokenKind::Keyword(kw), line, col)
        } else {
            let sym = self.strings.intern(&s);
            Token::new(TokenKind::Ident(sym), line, col)
        }
    }

    fn lex_number(&mut self, line: u32, col: u32) -> Result<Token, ParseError> {
        let mut s = String::new();
        let mut is_float = false;

        if self.peek() == Some('0') && matches!(self.peek2(), Some('x') | Some('X')) {
            s.push(self.bump().unwrap());
            s.push(self.bump().unwrap());
            while let Some(c) = self.peek() {
                if c.is_ascii_hexdigit() {
                    s.push(c);
                    self.bump();
                } else {
                    break;
                }
            }
            let value = i64::from_str_radix(&s[2..], 16)
                .map_err(|_| self.err(line, col, format!("invalid hex literal '{s}'")))?;
            let suffix = self.lex_int_suffix();
            return Ok(Token::new(TokenKind::Int { value, suffix }, line, col));
        }

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                s.push(c);
                self.bump();
            } else {
                break;
            }
        }

        if self.peek() == Some('.') {
            is_float = true;
            s.push(self.bump().unwrap());
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    s.push(c);
                    self.bump();
                } else {
                    break;
                }
            }
        }

        if matches!(self.peek(), Some('e') | Some('E')) {
            is_float = true;
            s.push(self.bump().unwrap());
            if matches!(self.peek(), Some('+') | Some('-')) {
                s.push(self.bump().unwrap());
            }
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    s.push(c);
                    self.bump();
                } else {
                    break;
                }
            }
        }

        if is_float {
            let value: f64 = s
                .parse()
                .map_err(|_| self.err(line, col, format!("invalid floating literal '{s}'")))?;
            return Ok(Token::new(TokenKind::Float(value), line, col));
        }

        // Octal: leading zero followed by more digits, no '.'/'e' seen.
        let value = if s.len() > 1 && s.starts_with('0') {
            i64::from_str_radix(&s[1..], 8)
                .map_err(|_| self.err(line, col, format!("invalid octal literal '{s}'")))?
        } else {
            s.parse()
                .map_err(|_| self.err(line, col, format!("invalid integer literal '{s}'")))?
        };
        let suffix = self.lex_int_suffix();
        Ok(Token::new(TokenKind::Int { value, suffix }, line, col))
    }

    fn lex_int_suffix(&mut self) -> IntSuffix {
        let mut unsigned = false;
        let mut long = false;
        loop {
            match self.peek() {
                Some('u') | Some('U') => {
                    unsigned = true;
                    self.bump();
                }
                Some('l') | Some('L') => {
                    long = true;
                    self.bump();
                }
                _ => break,
            }
        }
        match (unsigned, long) {
            (false, false) => IntSuffix::None,
            (true, false) => IntSuffix::Unsigned,
            (false, true) => IntSuffix::Long,
            (true, true) => IntSuffix::UnsignedLong,
        }
    }

    fn lex_escape(&mut self, line: u32, col: u32) -> Result<char, ParseError> {
        match self.bump() {
            Some('n') => Ok('\n'),
            Some('t') => Ok('\t'),
            Some('r') => Ok('\r'),
            Some('\\') => Ok('\\'),
            Some('\'') => Ok('\''),
            Some('"') => Ok('"'),
            Some('0') => Ok('\0'),
            Some('x') => {
                let mut hex = String::new();
                while let Some(c) = self.peek() {
                    if c.is_ascii_hexdigit() {
                        hex.push(c);
                        self.bump();
                    } else {
                        break;
                    }
                }
                let code = u32::from_str_radix(&hex, 16)
                    .map_err(|_| self.err(line, col, "invalid \\x escape"))?;
                char::from_u32(code).ok_or_else(|| self.err(line, col, "invalid \\x escape"))
            }
            Some(d) if d.is_digit(8) => {
                let mut oct = String::new();
                oct.push(d);
                while oct.len() < 3 {
                    if let Some(c) = self.peek() {
                        if c.is_digit(8) {
                            oct.push(c);
                            self.bump();
                            continue;
                        }
                    }
                    break;
                }
                let code = u32::from_str_radix(&oct, 8)
                    .map_err(|_| self.err(line, col, "invalid octal escape"))?;
                char::from_u32(code).ok_or_else(|| self.err(line, col, "invalid octal escape"))
            }
            _ => Err(self.err(line, col, "invalid escape sequence")),
        }
    }

    fn lex_string(&mut self, line: u32, col: u32) -> Result<Token, ParseError> {
        self.bump(); // opening quote
        let mut s = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => return Err(self.err(line, col, "unterminated string literal")),
                Some('"') => {
                    self.bump();
                    break;
                }
                Some('\\') => {
                    self.bump();
                    s.push(self.lex_escape(line, col)?);
                }
                Some(c) => {
                    s.push(c);
                    self.bump();
                }
            }
        }
        let sym = self.strings.intern(&s);
        Ok(Token::new(TokenKind::Str(sym), line, col))
    }

    fn lex_char(&mut self, line: u32, col: u32) -> Result<Token, ParseError> {
        self.bump(); // opening quote
        let value = match self.peek() {
            None | Some('\n') => return Err(self.err(line, col, "unterminated character literal")),
            Some('\\') => {
                self.bump();
                self.lex_escape(line, col)? as i64
            }
            Some(c) => {
                self.bump();
                c as i64
            }
        };
        if self.peek() != Some('\'') {
            return Err(self.err(line, col, "expected closing '\\''"));
        }
        self.bump();
        Ok(Token::new(TokenKind::Char(value), line, col))
    }

    fn lex_hash(&mut self, line: u32, col: u32) -> Result<Token, ParseError> {
        self.bump(); // '#'
        while self.peek() == Some(' ') || self.peek() == Some('\t') {
            self.bump();
        }
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() {
                s.push(c);
                self.bump();
            } else {
                break;
            }
        }
        match s.as_str() {
            "define" => {
                self.in_directive = true;
                Ok(Token::new(TokenKind::HashDefine, line, col))
            }
            "include" => {
                self.in_directive = true;
                Ok(Token::new(TokenKind::HashInclude, line, col))
            }
            other => Err(self.err(line, col, format!("unsupported preprocessor directive '#{other}'"))),
        }
    }

    fn lex_punct(&mut self, line: u32, col: u32) -> Result<Token, ParseError> {
        let rest = &self.buf[self.pos..];
        for (text, punct) in PUNCTUATORS {
            if rest.starts_with(text) {
                for _ in 0..text.chars().count() {
                    self.bump();
                }
                return Ok(Token::new(TokenKind::Punct(*punct), line, col));
            }
        }
        let c = self.peek().unwrap();
        Err(self.err(line, col, format!("stray character '{c}'")))
    }

    /// Lex the entire remaining buffer (whole-buffer mode).
    pub fn lex_all(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token()?;
            let is_eof = tok.is_eof();
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> Vec<TokenKind> {
        let mut strings = StringTable::new();
        let lexer = Lexer::new("test.c", src, &mut strings);
        lexer
            .lex_all()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn lex_tokens(src: &str) -> Vec<Token> {
        let mut strings = StringTable::new();
        let lexer = Lexer::new("test.c", src, &mut strings);
        lexer.lex_all().unwrap()
    }

    #[test]
    fn lexes_keywords_and_idents() {
        let toks = lex("int main");
        assert_eq!(toks[0], TokenKind::Keyword(Keyword::Int));
        assert!(matches!(toks[1], TokenKind::Ident(_)));
    }

    #[test]
    fn maximal_munch_prefers_longer_operator() {
        let toks = lex("a <<= b");
        assert!(toks.iter().any(|t| *t == TokenKind::Punct(crate::token::Punct::ShlEq)));
    }

    #[test]
    fn lexes_hex_octal_and_float() {
        let toks = lex("0x1F 017 3.14 2e3");
        assert_eq!(
            toks[0],
            TokenKind::Int {
                value: 31,
                suffix: IntSuffix::None
            }
        );
        assert_eq!(
            toks[1],
            TokenKind::Int {
                value: 15,
                suffix: IntSuffix::None
            }
        );
        assert_eq!(toks[2], TokenKind::Float(3.14));
        assert_eq!(toks[3], TokenKind::Float(2000.0));
    }

    #[test]
    fn lexes_string_escapes() {
        let mut strings = StringTable::new();
        let lexer = Lexer::new("test.c", r#""a\nb""#, &mut strings);
        let toks = lexer.lex_all().unwrap();
        let TokenKind::Str(sym) = toks[0].kind else {
            panic!("expected string token")
        };
        assert_eq!(strings.resolve(sym), "a\nb");
    }

    #[test]
    fn backslash_continuation_keeps_logical_line() {
        let toks = lex("int \\\nmain");
        // both tokens should report line 1 despite the physical newline
        assert_eq!(toks[0].line, 1);
    }

    #[test]
    fn skips_comments() {
        let toks = lex("int /* c */ x; // trailing\ny;");
        assert!(matches!(toks[0], TokenKind::Keyword(Keyword::Int)));
        assert!(matches!(toks[1], TokenKind::Ident(_)));
    }

    #[test]
    fn rejects_unknown_directive() {
        let mut strings = StringTable::new();
        let lexer = Lexer::new("test.c", "#if FOO", &mut strings);
        assert!(lexer.lex_all().is_err());
    }
}
