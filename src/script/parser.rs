//! Recursive descent parser for the pattern language.
//!
//! Grammar:
//!
//! ```text
//! script    := sep* (stmt (sep+ stmt)*)? sep* EOF
//! sep       := NEWLINE | ';'
//! stmt      := 'val' IDENT '=' expr | expr
//! expr      := unary ('+' unary)*
//! unary     := '-' unary | postfix
//! postfix   := primary ('.' IDENT | '(' args ')')*
//! primary   := INT | STRING | 'true' | 'false' | 'null' | IDENT | '(' expr ')'
//! args      := (arg (',' arg)* ','?)?
//! arg       := IDENT '=' expr | expr
//! ```
//!
//! Line breaks separate statements only outside parentheses.

use super::ast::{Arg, Expr, ExprKind, Script, Stmt, StmtKind};
use super::diagnostics::{Diagnostic, LineIndex, Span};
use super::lexer::{Token, TokenKind};

type ParseResult<T> = Result<T, Diagnostic>;

/// Parse a token list produced by [`tokenize`](super::lexer::tokenize).
///
/// Parsing recovers at statement boundaries, so one malformed statement
/// does not hide errors in later ones.
pub fn parse(tokens: &[Token], lines: &LineIndex<'_>, max_depth: usize) -> (Script, Vec<Diagnostic>) {
    let mut parser = Parser {
        tokens,
        pos: 0,
        lines,
        paren_depth: 0,
        depth: 0,
        max_depth,
        prev_end: 0,
    };
    parser.script()
}

struct Parser<'t, 'l, 's> {
    tokens: &'t [Token],
    pos: usize,
    lines: &'l LineIndex<'s>,
    paren_depth: usize,
    depth: usize,
    max_depth: usize,
    prev_end: usize,
}

impl Parser<'_, '_, '_> {
    fn script(&mut self) -> (Script, Vec<Diagnostic>) {
        let mut script = Script::default();
        let mut diagnostics = Vec::new();

        loop {
            while matches!(self.kind(), TokenKind::Newline | TokenKind::Semi) {
                self.advance();
            }
            if *self.kind() == TokenKind::Eof {
                break;
            }

            match self.statement() {
                Ok(stmt) => script.statements.push(stmt),
                Err(diagnostic) => {
                    diagnostics.push(diagnostic);
                    self.recover();
                    continue;
                }
            }

            match self.kind() {
                TokenKind::Newline | TokenKind::Semi | TokenKind::Eof => {}
                other => {
                    let message = format!(
                        "Unexpected {} (use ';' to separate expressions on the same line)",
                        other.describe()
                    );
                    diagnostics.push(self.error_here(message));
                    self.recover();
                }
            }
        }

        (script, diagnostics)
    }

    fn recover(&mut self) {
        self.paren_depth = 0;
        self.depth = 0;
        while !matches!(
            self.kind(),
            TokenKind::Newline | TokenKind::Semi | TokenKind::Eof
        ) {
            self.advance();
        }
    }

    fn skip_insignificant(&mut self) {
        if self.paren_depth == 0 {
            return;
        }
        while self.tokens[self.pos].kind == TokenKind::Newline {
            self.pos += 1;
        }
    }

    fn kind(&mut self) -> &TokenKind {
        self.skip_insignificant();
        &self.tokens[self.pos].kind
    }

    /// Kind of the token after the current one, honouring newline skipping.
    fn next_kind(&mut self) -> &TokenKind {
        self.skip_insignificant();
        let mut index = self.pos;
        if self.tokens[index].kind != TokenKind::Eof {
            index += 1;
        }
        if self.paren_depth > 0 {
            while self.tokens[index].kind == TokenKind::Newline {
                index += 1;
            }
        }
        &self.tokens[index].kind
    }

    fn advance(&mut self) -> Token {
        self.skip_insignificant();
        let token = self.tokens[self.pos].clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
            self.prev_end = token.span.end;
        }
        token
    }

    fn start(&mut self) -> usize {
        self.skip_insignificant();
        self.tokens[self.pos].span.start
    }

    fn span_from(&self, start: usize) -> Span {
        start..self.prev_end.max(start)
    }

    fn error_here(&mut self, message: impl Into<String>) -> Diagnostic {
        let start = self.start();
        Diagnostic::error(message).at(self.lines.locate(start))
    }

    fn expect(&mut self, expected: &TokenKind, what: &str) -> ParseResult<Token> {
        if self.kind() == expected {
            return Ok(self.advance());
        }
        let found = self.kind().describe();
        Err(self.error_here(format!("Expecting {what}, found {found}")))
    }

    fn expect_ident(&mut self, what: &str) -> ParseResult<(String, Span)> {
        let found = self.kind().clone();
        match found {
            TokenKind::Ident(name) => {
                let token = self.advance();
                Ok((name, token.span))
            }
            other => Err(self.error_here(format!("Expecting {what}, found {}", other.describe()))),
        }
    }

    fn enter(&mut self) -> ParseResult<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(self.error_here(format!(
                "Expression nesting exceeds the limit of {}",
                self.max_depth
            )));
        }
        Ok(())
    }

    fn statement(&mut self) -> ParseResult<Stmt> {
        let start = self.start();

        if *self.kind() == TokenKind::Val {
            self.advance();
            let (name, name_span) = self.expect_ident("a variable name")?;
            self.expect(&TokenKind::Eq, "'='")?;
            let value = self.expression()?;
            return Ok(Stmt {
                kind: StmtKind::Val {
                    name,
                    name_span,
                    value,
                },
                span: self.span_from(start),
            });
        }

        let expr = self.expression()?;
        Ok(Stmt {
            kind: StmtKind::Expr(expr),
            span: self.span_from(start),
        })
    }

    fn expression(&mut self) -> ParseResult<Expr> {
        self.enter()?;
        let start = self.start();
        let mut lhs = self.unary()?;

        while *self.kind() == TokenKind::Plus {
            self.advance();
            let rhs = self.unary()?;
            lhs = Expr {
                kind: ExprKind::Add(Box::new(lhs), Box::new(rhs)),
                span: self.span_from(start),
            };
        }

        self.depth -= 1;
        Ok(lhs)
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        if *self.kind() != TokenKind::Minus {
            return self.postfix();
        }

        let start = self.start();
        self.advance();
        self.enter()?;
        let operand = self.unary()?;
        self.depth -= 1;
        Ok(Expr {
            kind: ExprKind::Neg(Box::new(operand)),
            span: self.span_from(start),
        })
    }

    fn postfix(&mut self) -> ParseResult<Expr> {
        let start = self.start();
        let mut expr = self.primary()?;

        loop {
            match self.kind() {
                TokenKind::Dot => {
                    self.advance();
                    let (name, _) = self.expect_ident("a member name")?;
                    expr = Expr {
                        kind: ExprKind::Member {
                            target: Box::new(expr),
                            name,
                        },
                        span: self.span_from(start),
                    };
                }
                TokenKind::LParen => {
                    let args = self.arguments()?;
                    expr = Expr {
                        kind: ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                        },
                        span: self.span_from(start),
                    };
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    fn arguments(&mut self) -> ParseResult<Vec<Arg>> {
        self.advance();
        self.paren_depth += 1;
        self.enter()?;
        let mut args = Vec::new();

        while *self.kind() != TokenKind::RParen {
            args.push(self.argument()?);
            match self.kind() {
                TokenKind::Comma => {
                    self.advance();
                }
                TokenKind::RParen => {}
                other => {
                    let message = format!("Expecting ',' or ')', found {}", other.describe());
                    return Err(self.error_here(message));
                }
            }
        }

        self.paren_depth -= 1;
        self.advance();
        self.depth -= 1;
        Ok(args)
    }

    fn argument(&mut self) -> ParseResult<Arg> {
        let named = matches!(self.kind(), TokenKind::Ident(_)) && *self.next_kind() == TokenKind::Eq;
        if !named {
            return Ok(Arg {
                name: None,
                name_span: None,
                value: self.expression()?,
            });
        }

        let (name, name_span) = self.expect_ident("a parameter name")?;
        self.advance();
        Ok(Arg {
            name: Some(name),
            name_span: Some(name_span),
            value: self.expression()?,
        })
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        let start = self.start();
        let kind = match self.kind().clone() {
            TokenKind::Int(value) => ExprKind::Int(value),
            TokenKind::Str(value) => ExprKind::Str(value),
            TokenKind::True => ExprKind::Bool(true),
            TokenKind::False => ExprKind::Bool(false),
            TokenKind::Null => ExprKind::Null,
            TokenKind::Ident(name) => ExprKind::Ident(name),
            TokenKind::LParen => {
                self.advance();
                self.paren_depth += 1;
                let inner = self.expression()?;
                self.paren_depth -= 1;
                self.expect(&TokenKind::RParen, "')'")?;
                return Ok(Expr {
                    kind: inner.kind,
                    span: self.span_from(start),
                });
            }
            other => {
                return Err(self.error_here(format!(
                    "Expecting an expression, found {}",
                    other.describe()
                )))
            }
        };

        self.advance();
        Ok(Expr {
            kind,
            span: self.span_from(start),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::lexer::tokenize;

    fn parse_source(source: &str) -> (Script, Vec<Diagnostic>) {
        let lines = LineIndex::new(source);
        let (tokens, lex_diagnostics) = tokenize(source, &lines);
        assert!(lex_diagnostics.is_empty());
        parse(&tokens, &lines, 16)
    }

    fn single_expr(source: &str) -> Expr {
        let (script, diagnostics) = parse_source(source);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        assert_eq!(script.statements.len(), 1);
        match script.statements.into_iter().next().map(|s| s.kind) {
            Some(StmtKind::Expr(expr)) => expr,
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_statements() {
        let (script, diagnostics) = parse_source("val a = 1\n\nval b = a + 2; b\n");
        assert!(diagnostics.is_empty());
        assert_eq!(script.statements.len(), 3);
        assert!(matches!(
            &script.statements[0].kind,
            StmtKind::Val { name, .. } if name == "a"
        ));
    }

    #[test]
    fn test_parse_named_and_positional_arguments() {
        let expr = single_expr("opcode(Opcode.IF_EQZ, location = InstructionLocation.MatchFirst())");
        let ExprKind::Call { callee, args } = expr.kind else {
            panic!("expected call");
        };
        assert_eq!(callee.path().as_deref(), Some("opcode"));
        assert_eq!(args.len(), 2);
        assert_eq!(args[0].name, None);
        assert_eq!(args[0].value.path().as_deref(), Some("Opcode.IF_EQZ"));
        assert_eq!(args[1].name.as_deref(), Some("location"));
    }

    #[test]
    fn test_newlines_inside_parentheses() {
        let expr = single_expr("Fingerprint(\n    name = \"a\",\n    returnType = \"V\",\n)");
        let ExprKind::Call { args, .. } = expr.kind else {
            panic!("expected call");
        };
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn test_newline_ends_statement_outside_parentheses() {
        let (script, diagnostics) = parse_source("1\n-2");
        assert!(diagnostics.is_empty());
        assert_eq!(script.statements.len(), 2);
        assert!(matches!(
            &script.statements[1].kind,
            StmtKind::Expr(Expr {
                kind: ExprKind::Neg(_),
                ..
            })
        ));

        let (script, diagnostics) = parse_source("listOf(1,\n-2)");
        assert!(diagnostics.is_empty());
        assert_eq!(script.statements.len(), 1);
    }

    #[test]
    fn test_unary_minus_and_addition() {
        let expr = single_expr("-1 + 2");
        assert!(matches!(expr.kind, ExprKind::Add(ref lhs, _) if matches!(lhs.kind, ExprKind::Neg(_))));
    }

    #[test]
    fn test_syntax_errors_have_locations() {
        let (_, diagnostics) = parse_source("val = 3\nFingerprint(name = )\nlistOf(1 2)");
        assert_eq!(diagnostics.len(), 3);
        assert_eq!(diagnostics[0].location.map(|l| l.line), Some(1));
        assert_eq!(diagnostics[1].location.map(|l| l.line), Some(2));
        assert!(diagnostics[2].message.contains("Expecting ',' or ')'"));
    }

    #[test]
    fn test_statements_on_one_line_need_separator() {
        let (_, diagnostics) = parse_source("1 2");
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("use ';'"));
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{}1{}", "listOf(".repeat(20), ")".repeat(20));
        let (_, diagnostics) = parse_source(&deep);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("nesting"));
    }
}
