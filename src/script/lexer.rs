//! Lexer for the pattern language using logos.

use logos::Logos;

use super::diagnostics::{Diagnostic, LineIndex, Span};

/// Raw token from logos (before literal decoding).
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\f]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*([^*]|\*+[^*/])*\*+/")]
enum RawToken {
    #[token("\n")]
    Newline,

    #[token("val")]
    Val,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("=")]
    Eq,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token(";")]
    Semi,

    #[regex(r"[0-9][0-9_]*", |lex| lex.slice().replace('_', "").parse::<i64>().ok())]
    Int(i64),

    #[regex(r#""([^"\\\n]|\\.)*""#)]
    String,

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,
}

/// Token kinds seen by the parser.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Line break (statement separator outside parentheses)
    Newline,
    /// `val`
    Val,
    /// `true`
    True,
    /// `false`
    False,
    /// `null`
    Null,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `,`
    Comma,
    /// `.`
    Dot,
    /// `=`
    Eq,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `;`
    Semi,
    /// Integer literal
    Int(i64),
    /// Decoded string literal
    Str(String),
    /// Identifier
    Ident(String),
    /// End of input
    Eof,
}

impl TokenKind {
    /// Short description for diagnostics
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Newline => "line break".to_string(),
            TokenKind::Val => "'val'".to_string(),
            TokenKind::True => "'true'".to_string(),
            TokenKind::False => "'false'".to_string(),
            TokenKind::Null => "'null'".to_string(),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::Dot => "'.'".to_string(),
            TokenKind::Eq => "'='".to_string(),
            TokenKind::Plus => "'+'".to_string(),
            TokenKind::Minus => "'-'".to_string(),
            TokenKind::Semi => "';'".to_string(),
            TokenKind::Int(value) => format!("integer {value}"),
            TokenKind::Str(_) => "string literal".to_string(),
            TokenKind::Ident(name) => format!("'{name}'"),
            TokenKind::Eof => "end of input".to_string(),
        }
    }
}

/// A token with its byte span.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// Kind
    pub kind: TokenKind,
    /// Byte span
    pub span: Span,
}

/// Tokenize pattern text.
///
/// Lexing continues past bad input so that every lexical error is reported
/// at once. The token list always ends with [`TokenKind::Eof`].
pub fn tokenize(source: &str, lines: &LineIndex<'_>) -> (Vec<Token>, Vec<Diagnostic>) {
    let mut tokens = Vec::new();
    let mut diagnostics = Vec::new();
    let mut lexer = RawToken::lexer(source);

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let slice = lexer.slice();

        let kind = match result {
            Ok(raw) => match convert(raw, slice) {
                Ok(kind) => kind,
                Err(message) => {
                    diagnostics.push(Diagnostic::error(message).at(lines.locate(span.start)));
                    continue;
                }
            },
            Err(()) => {
                diagnostics.push(Diagnostic::error(lex_error(slice)).at(lines.locate(span.start)));
                continue;
            }
        };
        tokens.push(Token { kind, span });
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        span: source.len()..source.len(),
    });
    (tokens, diagnostics)
}

fn convert(raw: RawToken, slice: &str) -> Result<TokenKind, String> {
    let kind = match raw {
        RawToken::Newline => TokenKind::Newline,
        RawToken::Val => TokenKind::Val,
        RawToken::True => TokenKind::True,
        RawToken::False => TokenKind::False,
        RawToken::Null => TokenKind::Null,
        RawToken::LParen => TokenKind::LParen,
        RawToken::RParen => TokenKind::RParen,
        RawToken::Comma => TokenKind::Comma,
        RawToken::Dot => TokenKind::Dot,
        RawToken::Eq => TokenKind::Eq,
        RawToken::Plus => TokenKind::Plus,
        RawToken::Minus => TokenKind::Minus,
        RawToken::Semi => TokenKind::Semi,
        RawToken::Int(value) => TokenKind::Int(value),
        RawToken::String => TokenKind::Str(unescape_string(&slice[1..slice.len() - 1])?),
        RawToken::Ident => TokenKind::Ident(slice.to_string()),
    };
    Ok(kind)
}

fn lex_error(slice: &str) -> String {
    if slice.starts_with(|c: char| c.is_ascii_digit()) {
        format!("The value '{slice}' is out of range for Int")
    } else if slice.starts_with('"') {
        "Unterminated string literal".to_string()
    } else if slice.starts_with("/*") {
        "Unclosed comment".to_string()
    } else {
        format!("Unexpected character '{slice}'")
    }
}

/// Decode escape sequences of a string literal body.
fn unescape_string(body: &str) -> Result<String, String> {
    let mut result = String::with_capacity(body.len());
    let mut chars = body.chars();

    while let Some(c) = chars.next() {
        if c == '$' {
            return Err("String templates are not supported; escape '$' as '\\$'".to_string());
        }
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('r') => result.push('\r'),
            Some('t') => result.push('\t'),
            Some('\\') => result.push('\\'),
            Some('"') => result.push('"'),
            Some('\'') => result.push('\''),
            Some('$') => result.push('$'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let decoded = u32::from_str_radix(&hex, 16)
                    .ok()
                    .filter(|_| hex.len() == 4)
                    .and_then(char::from_u32)
                    .ok_or_else(|| format!("Illegal escape: '\\u{hex}'"))?;
                result.push(decoded);
            }
            Some(other) => return Err(format!("Illegal escape: '\\{other}'")),
            None => return Err("Illegal escape: '\\'".to_string()),
        }
    }

    Ok(result)
}
