//! Name resolution and call checking, run before execution.
//!
//! Everything the checker reports is a compile-phase diagnostic: a script
//! with checker errors never starts executing.

use indexmap::IndexMap;

use super::ast::{Expr, ExprKind, Script, StmtKind};
use super::diagnostics::{Diagnostic, LineIndex, Span};
use super::prelude::{bind, Builtin, Namespace};

struct Binding {
    span: Span,
    used: bool,
}

struct Checker<'l, 's> {
    lines: &'l LineIndex<'s>,
    scope: IndexMap<String, Binding>,
    diagnostics: Vec<Diagnostic>,
}

/// How a call's callee resolved.
pub(crate) enum Callee<'e> {
    /// A prelude function
    Builtin(Builtin),
    /// Anything else; not invocable
    Other(&'e Expr),
}

/// Resolve a callee expression to a builtin where possible.
pub(crate) fn resolve_callee(callee: &Expr) -> Callee<'_> {
    match &callee.kind {
        ExprKind::Ident(name) => Builtin::function(name).map_or(Callee::Other(callee), Callee::Builtin),
        ExprKind::Member { target, name } => match &target.kind {
            ExprKind::Ident(ns) if Namespace::lookup(ns) == Some(Namespace::InstructionLocation) => {
                Builtin::location(name).map_or(Callee::Other(callee), Callee::Builtin)
            }
            _ => Callee::Other(callee),
        },
        _ => Callee::Other(callee),
    }
}

/// True when `name` belongs to the prelude and cannot be rebound.
pub(crate) fn is_reserved(name: &str) -> bool {
    Builtin::function(name).is_some() || Namespace::lookup(name).is_some()
}

/// Check a parsed script, returning errors and warnings.
pub fn check(script: &Script, lines: &LineIndex<'_>) -> Vec<Diagnostic> {
    let mut checker = Checker {
        lines,
        scope: IndexMap::new(),
        diagnostics: Vec::new(),
    };

    for stmt in &script.statements {
        match &stmt.kind {
            StmtKind::Val {
                name,
                name_span,
                value,
            } => {
                checker.expr(value);
                if is_reserved(name) {
                    checker.error(format!("Name '{name}' is reserved by the prelude"), name_span);
                } else if checker.scope.contains_key(name) {
                    checker.error(format!("Conflicting declarations: val {name}"), name_span);
                } else {
                    checker.scope.insert(
                        name.clone(),
                        Binding {
                            span: name_span.clone(),
                            used: false,
                        },
                    );
                }
            }
            StmtKind::Expr(expr) => checker.expr(expr),
        }
    }

    let unused: Vec<(String, Span)> = checker
        .scope
        .iter()
        .filter(|(_, binding)| !binding.used)
        .map(|(name, binding)| (name.clone(), binding.span.clone()))
        .collect();
    for (name, span) in unused {
        let location = checker.lines.locate(span.start);
        checker
            .diagnostics
            .push(Diagnostic::warning(format!("Variable '{name}' is never used")).at(location));
    }

    checker.diagnostics
}

impl Checker<'_, '_> {
    fn error(&mut self, message: String, span: &Span) {
        let location = self.lines.locate(span.start);
        self.diagnostics.push(Diagnostic::error(message).at(location));
    }

    fn expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Int(_) | ExprKind::Str(_) | ExprKind::Bool(_) | ExprKind::Null => {}
            ExprKind::Ident(name) => self.ident(name, &expr.span),
            ExprKind::Member { target, name } => self.member(target, name, &expr.span),
            ExprKind::Call { callee, args } => match resolve_callee(callee) {
                Callee::Builtin(builtin) => {
                    if let Err(err) = bind(builtin, args, &expr.span) {
                        self.error(err.message, &err.span);
                    }
                    for arg in args {
                        self.expr(&arg.value);
                    }
                }
                Callee::Other(callee) => {
                    self.expr(callee);
                    let shown = callee.path().unwrap_or_else(|| "expression".to_string());
                    self.error(
                        format!("Expression '{shown}' cannot be invoked as a function"),
                        &callee.span,
                    );
                    for arg in args {
                        self.expr(&arg.value);
                    }
                }
            },
            ExprKind::Neg(operand) => self.expr(operand),
            ExprKind::Add(lhs, rhs) => {
                self.expr(lhs);
                self.expr(rhs);
            }
        }
    }

    fn ident(&mut self, name: &str, span: &Span) {
        if let Some(binding) = self.scope.get_mut(name) {
            binding.used = true;
        } else if Namespace::lookup(name).is_some() {
            self.error(format!("Namespace '{name}' cannot be used as a value"), span);
        } else if Builtin::function(name).is_some() {
            self.error(format!("Function invocation '{name}(...)' expected"), span);
        } else {
            self.error(format!("Unresolved reference: {name}"), span);
        }
    }

    fn member(&mut self, target: &Expr, name: &str, span: &Span) {
        if let ExprKind::Ident(ns_name) = &target.kind {
            if let Some(namespace) = Namespace::lookup(ns_name) {
                if !namespace.has_member(name) {
                    self.error(format!("Unresolved reference: {ns_name}.{name}"), span);
                } else if namespace == Namespace::InstructionLocation {
                    self.error(format!("Function invocation '{ns_name}.{name}(...)' expected"), span);
                }
                return;
            }
        }

        self.expr(target);
        self.error(format!("Unresolved reference: {name}"), span);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::diagnostics::Severity;
    use crate::script::lexer::tokenize;
    use crate::script::parser::parse;

    fn check_source(source: &str) -> Vec<Diagnostic> {
        let lines = LineIndex::new(source);
        let (tokens, lex) = tokenize(source, &lines);
        assert!(lex.is_empty());
        let (script, parse_diagnostics) = parse(&tokens, &lines, 32);
        assert!(parse_diagnostics.is_empty());
        check(&script, &lines)
    }

    fn errors(source: &str) -> Vec<String> {
        check_source(source)
            .into_iter()
            .filter(Diagnostic::is_error)
            .map(|d| d.message)
            .collect()
    }

    #[test]
    fn test_valid_script_has_no_errors() {
        let source = r#"
            val call = methodCall(name = "seekTo", opcode = Opcode.INVOKE_VIRTUAL)
            Fingerprint(
                accessFlags = listOf(AccessFlags.PUBLIC, AccessFlags.FINAL),
                filters = listOf(
                    call,
                    opcode(Opcode.IF_EQZ, after = call, location = InstructionLocation.MatchAfterWithin(2)),
                ),
            )
        "#;
        assert!(check_source(source).is_empty());
    }

    #[test]
    fn test_unresolved_references() {
        let errs = errors("Fingerprint(name = nope, accessFlags = AccessFlags.SHINY)");
        assert_eq!(
            errs,
            vec![
                "Unresolved reference: nope".to_string(),
                "Unresolved reference: AccessFlags.SHINY".to_string(),
            ]
        );
    }

    #[test]
    fn test_bad_calls() {
        assert_eq!(errors("Fingerprint(nmae = \"x\")").len(), 1);
        assert_eq!(errors("opcode()").len(), 1);
        assert_eq!(errors("val x = 1\nx(2)").len(), 1);
        assert_eq!(errors("InstructionLocation.MatchFirst").len(), 1);
        assert_eq!(errors("listOf").len(), 1);
        assert_eq!(errors("Opcode").len(), 1);
    }

    #[test]
    fn test_declarations() {
        assert_eq!(errors("val a = 1\nval a = 2\na"), vec!["Conflicting declarations: val a"]);
        assert_eq!(errors("val listOf = 1"), vec!["Name 'listOf' is reserved by the prelude"]);
        assert_eq!(errors("val a = a"), vec!["Unresolved reference: a"]);
    }

    #[test]
    fn test_unused_variable_is_a_warning() {
        let diagnostics = check_source("val unused = 1\n2");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, Severity::Warning);
        assert!(diagnostics[0].message.contains("'unused'"));
    }
}
