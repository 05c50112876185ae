use std::rc::Rc;

use funcy_util::{Log, Span};

use crate::token::{Token, TokenKind};

/// Fixed multi-character operator table, longest lexemes first so a
/// straightforward linear scan implements longest-match.
const MULTI_CHAR_OPS: &[(&str, TokenKind)] = &[
    ("!=", TokenKind::BangEq),
    ("%=", TokenKind::PercentEq),
    ("&&", TokenKind::AmpAmp),
    ("&=", TokenKind::AmpEq),
    ("*=", TokenKind::StarEq),
    ("+=", TokenKind::PlusEq),
    ("-=", TokenKind::MinusEq),
    ("/=", TokenKind::SlashEq),
    ("<=", TokenKind::LtEq),
    ("==", TokenKind::EqEq),
    (">=", TokenKind::GtEq),
    ("|=", TokenKind::PipeEq),
    ("||", TokenKind::PipePipe),
];

fn single_char_op(c: char) -> Option<TokenKind> {
    use TokenKind::*;
    Some(match c {
        '!' => Bang,
        '%' => Percent,
        '&' => Amp,
        '(' => LParen,
        ')' => RParen,
        '*' => Star,
        '+' => Plus,
        ',' => Comma,
        '-' => Minus,
        '/' => Slash,
        ';' => Semi,
        '<' => Lt,
        '=' => Eq,
        '>' => Gt,
        '{' => LBrace,
        '|' => Pipe,
        '}' => RBrace,
        _ => return None,
    })
}

/// Turns a module's source text into a stream of [`Token`]s.
///
/// `allow_intrinsic` gates the `$(` opener: it is only `true` while the
/// resolver is lexing the standard-library module, matching the rule that
/// intrinsic syntax is not available to ordinary Funcy code.
pub struct Lexer<'a> {
    source: &'a str,
    chars: Vec<char>,
    idx: usize,
    span: Span,
    allow_intrinsic: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(module: impl Into<Rc<str>>, source: &'a str, allow_intrinsic: bool) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            idx: 0,
            span: Span::new(module),
            allow_intrinsic,
        }
    }

    fn peek(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.idx + ahead).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek(0)?;
        self.idx += 1;
        self.span.advance(&c.to_string());
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek(0) == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn make(&mut self, kind: TokenKind) -> Token {
        let span = self.span.clone();
        self.span.begin();
        Token::new(kind, span)
    }

    /// Produce the next token, driving the lexer forward by exactly one
    /// token's worth of input.
    pub fn next_token(&mut self, log: &mut Log) -> Token {
        self.skip_trivia(log);
        self.span.begin();

        let Some(c) = self.peek(0) else {
            return self.make(TokenKind::Eof);
        };

        if c.is_ascii_digit() {
            return self.lex_number();
        }
        if c == '"' || c == '\'' {
            return self.lex_quoted(c);
        }
        if c == '_' || c.is_alphabetic() {
            return self.lex_identifier();
        }
        if c == '$' && self.allow_intrinsic && self.peek(1) == Some('(') {
            self.bump();
            self.bump();
            return self.make(TokenKind::DollarParen);
        }

        self.lex_operator()
    }

    /// Skip whitespace, `//` line comments, and nested `/* */` block
    /// comments. An unterminated block comment is logged once at EOF.
    fn skip_trivia(&mut self, log: &mut Log) {
        loop {
            match self.peek(0) {
                Some(c) if (c as u32) <= 32 => {
                    self.bump();
                }
                Some('/') if self.peek(1) == Some('/') => {
                    while !matches!(self.peek(0), None | Some('\n')) {
                        self.bump();
                    }
                }
                Some('/') if self.peek(1) == Some('*') => {
                    let start = self.span.end.clone();
                    self.bump();
                    self.bump();
                    let mut depth = 1usize;
                    while depth > 0 {
                        match self.peek(0) {
                            None => {
                                let mut span = Span::new(Rc::clone(&start.module));
                                span.start = start;
                                span.end = self.span.end.clone();
                                log.log_at(
                                    "Unterminated block comment!",
                                    span,
                                );
                                return;
                            }
                            Some('*') if self.peek(1) == Some('/') => {
                                self.bump();
                                self.bump();
                                depth -= 1;
                            }
                            Some('/') if self.peek(1) == Some('*') => {
                                self.bump();
                                self.bump();
                                depth += 1;
                            }
                            Some(_) => {
                                self.bump();
                            }
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn lex_number(&mut self) -> Token {
        let (base, has_prefix) = if self.peek(0) == Some('0') {
            match self.peek(1) {
                Some('b') | Some('B') => (2, true),
                Some('o') | Some('O') => (8, true),
                Some('x') | Some('X') => (16, true),
                _ => (10, false),
            }
        } else {
            (10, false)
        };

        if has_prefix {
            self.bump();
            self.bump();
        }

        let mut digits = String::new();
        let mut last_was_underscore = false;
        let mut malformed = false;

        loop {
            match self.peek(0) {
                Some(c) if c.is_digit(base) => {
                    digits.push(c);
                    last_was_underscore = false;
                    self.bump();
                }
                Some('_') => {
                    if digits.is_empty() || last_was_underscore {
                        malformed = true;
                    }
                    last_was_underscore = true;
                    self.bump();
                }
                _ => break,
            }
        }

        if last_was_underscore {
            malformed = true;
        }
        if digits.is_empty() {
            malformed = true;
        }
        if !has_prefix && digits.len() > 1 && digits.starts_with('0') {
            malformed = true;
        }

        // A trailing identifier character or an in-base-range-but-wrong digit
        // immediately following the run is also malformed (e.g. `0b102`).
        if let Some(c) = self.peek(0) {
            if c == '_' || c.is_alphanumeric() {
                digits.push(c);
                self.bump();
                malformed = true;
            }
        }

        if malformed {
            return self.make(TokenKind::Error(format!(
                "Malformed {} literal!",
                match base {
                    2 => "binary",
                    8 => "octal",
                    16 => "hexadecimal",
                    _ => "decimal",
                }
            )));
        }

        match i64::from_str_radix(&digits, base) {
            Ok(value) => self.make(TokenKind::LiteralInt(value)),
            Err(_) => self.make(TokenKind::Error("Integer literal out of range!".into())),
        }
    }

    fn lex_identifier(&mut self) -> Token {
        let mut text = String::new();
        while let Some(c) = self.peek(0) {
            if c == '_' || c.is_alphanumeric() {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }

        match TokenKind::keyword(&text) {
            Some(kind) => self.make(kind),
            None => self.make(TokenKind::Identifier(text)),
        }
    }

    /// Consume one escape sequence after a backslash has already been
    /// consumed. Returns `Ok(Some(char))` for a produced character,
    /// `Ok(None)` for a line-continuation (no character produced), or
    /// `Err(message)` for a malformed escape.
    fn lex_escape(&mut self) -> Result<Option<char>, String> {
        match self.peek(0) {
            Some('\r') => {
                self.bump();
                self.eat('\n');
                Ok(None)
            }
            Some('\n') => {
                self.bump();
                Ok(None)
            }
            Some('a') => {
                self.bump();
                Ok(Some('\u{07}'))
            }
            Some('b') => {
                self.bump();
                Ok(Some('\u{08}'))
            }
            Some('f') => {
                self.bump();
                Ok(Some('\u{0C}'))
            }
            Some('n') => {
                self.bump();
                Ok(Some('\n'))
            }
            Some('r') => {
                self.bump();
                Ok(Some('\r'))
            }
            Some('v') => {
                self.bump();
                Ok(Some('\u{0B}'))
            }
            Some('x') => {
                self.bump();
                let mut hex = String::new();
                for _ in 0..2 {
                    match self.peek(0) {
                        Some(c) if c.is_ascii_hexdigit() => {
                            hex.push(c);
                            self.bump();
                        }
                        _ => return Err("Malformed \\x escape sequence!".into()),
                    }
                }
                let byte = u8::from_str_radix(&hex, 16).unwrap();
                Ok(Some(byte as char))
            }
            Some(other) => {
                self.bump();
                Ok(Some(other))
            }
            None => Err("Unterminated escape sequence!".into()),
        }
    }

    fn lex_quoted(&mut self, quote: char) -> Token {
        self.bump(); // opening quote
        let mut content = String::new();
        let mut error: Option<String> = None;

        loop {
            match self.peek(0) {
                None | Some('\n') => {
                    error.get_or_insert_with(|| "Unterminated string or char literal!".into());
                    break;
                }
                Some(c) if c == quote => {
                    self.bump();
                    break;
                }
                Some('\\') => {
                    self.bump();
                    match self.lex_escape() {
                        Ok(Some(c)) => content.push(c),
                        Ok(None) => {}
                        Err(message) => {
                            error.get_or_insert(message);
                        }
                    }
                }
                Some(c) => {
                    content.push(c);
                    self.bump();
                }
            }
        }

        if let Some(message) = error {
            return self.make(TokenKind::Error(message));
        }

        if quote == '\'' {
            self.make(TokenKind::LiteralChr(content))
        } else {
            self.make(TokenKind::LiteralStr(content))
        }
    }

    fn lex_operator(&mut self) -> Token {
        if let (Some(c0), Some(c1)) = (self.peek(0), self.peek(1)) {
            let pair: String = [c0, c1].iter().collect();
            if let Some((_, kind)) = MULTI_CHAR_OPS.iter().find(|(lexeme, _)| *lexeme == pair) {
                self.bump();
                self.bump();
                return self.make(kind.clone());
            }
        }

        let c = self.peek(0).expect("caller already confirmed a character");
        if let Some(kind) = single_char_op(c) {
            self.bump();
            return self.make(kind);
        }

        self.bump();
        self.make(TokenKind::Error(self.unknown_char_message(c)))
    }

    fn unknown_char_message(&self, c: char) -> String {
        let suggestions: Vec<&str> = MULTI_CHAR_OPS
            .iter()
            .map(|(lexeme, _)| *lexeme)
            .filter(|lexeme| lexeme.starts_with(c))
            .collect();

        if suggestions.is_empty() {
            format!("Illegal character '{c}'!")
        } else {
            format!(
                "Illegal character '{c}'! Did you mean one of: {}?",
                suggestions.join(", ")
            )
        }
    }

    /// The raw source text this lexer was constructed with, used by tests
    /// that assert a token's span covers its exact lexeme.
    pub fn source(&self) -> &'a str {
        self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<TokenKind> {
        let mut log = Log::new();
        let mut lexer = Lexer::new("m", source, false);
        let mut out = Vec::new();
        loop {
            let tok = lexer.next_token(&mut log);
            let done = tok.is_eof();
            out.push(tok.kind);
            if done {
                break;
            }
        }
        out
    }

    #[test]
    fn lexes_keywords_and_identifiers() {
        assert_eq!(
            tokens("func main"),
            vec![
                TokenKind::Func,
                TokenKind::Identifier("main".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn lexes_decimal_binary_octal_hex() {
        assert_eq!(
            tokens("10 0b101 0o17 0xFF"),
            vec![
                TokenKind::LiteralInt(10),
                TokenKind::LiteralInt(0b101),
                TokenKind::LiteralInt(0o17),
                TokenKind::LiteralInt(0xFF),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn underscores_allowed_between_digits() {
        assert_eq!(
            tokens("1_000_000"),
            vec![TokenKind::LiteralInt(1_000_000), TokenKind::Eof]
        );
    }

    #[test]
    fn leading_zero_in_decimal_is_malformed() {
        let toks = tokens("007");
        assert!(matches!(toks[0], TokenKind::Error(_)));
    }

    #[test]
    fn bare_zero_is_legal() {
        assert_eq!(tokens("0"), vec![TokenKind::LiteralInt(0), TokenKind::Eof]);
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            tokens(r#""a\nb\x41""#),
            vec![TokenKind::LiteralStr("a\nbA".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn line_continuation_in_string_yields_no_character() {
        assert_eq!(
            tokens("\"a\\\nb\""),
            vec![TokenKind::LiteralStr("ab".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn char_literal_content_passes_through_unvalidated() {
        // Length validation is a semantic-phase concern, not the lexer's.
        assert_eq!(tokens("'a'"), vec![TokenKind::LiteralChr("a".into()), TokenKind::Eof]);
        assert_eq!(tokens("'ab'"), vec![TokenKind::LiteralChr("ab".into()), TokenKind::Eof]);
        assert_eq!(tokens("''"), vec![TokenKind::LiteralChr("".into()), TokenKind::Eof]);
    }

    #[test]
    fn block_comments_nest() {
        assert_eq!(tokens("/* a /* b */ c */ 1"), vec![TokenKind::LiteralInt(1), TokenKind::Eof]);
    }

    #[test]
    fn unterminated_block_comment_is_logged() {
        let mut log = Log::new();
        let mut lexer = Lexer::new("m", "/* never closed", false);
        let tok = lexer.next_token(&mut log);
        assert!(tok.is_eof());
        assert!(log.has_records());
    }

    #[test]
    fn longest_match_operators() {
        assert_eq!(
            tokens("&& & || | == = != !"),
            vec![
                TokenKind::AmpAmp,
                TokenKind::Amp,
                TokenKind::PipePipe,
                TokenKind::Pipe,
                TokenKind::EqEq,
                TokenKind::Eq,
                TokenKind::BangEq,
                TokenKind::Bang,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn dollar_paren_only_when_intrinsics_allowed() {
        let mut log = Log::new();
        let mut lexer = Lexer::new("m", "$(", true);
        assert_eq!(lexer.next_token(&mut log).kind, TokenKind::DollarParen);

        let mut lexer = Lexer::new("m", "$(", false);
        assert!(matches!(
            lexer.next_token(&mut log).kind,
            TokenKind::Error(_)
        ));
    }
}
