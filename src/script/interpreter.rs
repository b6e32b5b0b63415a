//! Tree-walking interpreter for checked scripts.

use ahash::AHashMap;

use super::ast::{Expr, ExprKind, Script, StmtKind};
use super::checker::{resolve_callee, Callee};
use super::diagnostics::Span;
use super::prelude::{bind, Bound, Builtin, Namespace};
use super::value::{ScriptValue, Value};
use crate::core::config::EvaluationConfig;
use crate::core::method::{AccessFlags, Opcode};
use crate::fingerprint::{Fingerprint, InstructionFilter, InstructionLocation, InstructionMatcher};

/// An error raised while executing a script.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeError {
    /// Error message
    pub message: String,
    /// Span of the failing expression
    pub span: Span,
}

impl RuntimeError {
    fn new(message: impl Into<String>, span: &Span) -> Self {
        Self {
            message: message.into(),
            span: span.clone(),
        }
    }
}

type Eval<T> = Result<T, RuntimeError>;

/// Execute a checked script.
///
/// Values are bounded by `limits.max_value_bytes`, list nesting by
/// `limits.max_nesting_depth`, and `anchor` / `after` chains by
/// `limits.max_chain_depth`.
pub fn execute(script: &Script, limits: &EvaluationConfig) -> Eval<ScriptValue> {
    let mut interpreter = Interpreter {
        env: AHashMap::new(),
        limits,
    };
    let mut result = ScriptValue::NotEvaluated;

    for stmt in &script.statements {
        result = match &stmt.kind {
            StmtKind::Val { name, value, .. } => {
                let value = interpreter.eval(value)?;
                interpreter.env.insert(name.clone(), value);
                ScriptValue::Unit
            }
            StmtKind::Expr(expr) => match interpreter.eval(expr)? {
                Value::Error(message) => ScriptValue::Error { message },
                value => ScriptValue::Value(value),
            },
        };
    }

    Ok(result)
}

struct Interpreter<'a> {
    env: AHashMap<String, Value>,
    limits: &'a EvaluationConfig,
}

fn type_mismatch(param: &str, expected: &str, found: &Value, span: &Span) -> RuntimeError {
    RuntimeError::new(
        format!(
            "Type mismatch: parameter '{param}' expects {expected}, found {}",
            found.type_name()
        ),
        span,
    )
}

impl Interpreter<'_> {
    fn check_weight(&self, weight: usize, span: &Span) -> Eval<()> {
        if weight > self.limits.max_value_bytes {
            return Err(RuntimeError::new(
                format!(
                    "Value exceeds the maximum size of {} bytes",
                    self.limits.max_value_bytes
                ),
                span,
            ));
        }
        Ok(())
    }

    fn eval(&mut self, expr: &Expr) -> Eval<Value> {
        match &expr.kind {
            ExprKind::Int(value) => Ok(Value::Int(*value)),
            ExprKind::Str(value) => Ok(Value::Str(value.clone())),
            ExprKind::Bool(value) => Ok(Value::Bool(*value)),
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Ident(name) => self
                .env
                .get(name)
                .cloned()
                .ok_or_else(|| RuntimeError::new(format!("Unresolved reference: {name}"), &expr.span)),
            ExprKind::Member { target, name } => self.member(target, name, &expr.span),
            ExprKind::Call { callee, args } => match resolve_callee(callee) {
                Callee::Builtin(builtin) => {
                    let bound = bind(builtin, args, &expr.span)
                        .map_err(|err| RuntimeError::new(err.message, &err.span))?;
                    let value = self.call(builtin, &bound, &expr.span)?;
                    self.check_weight(value.weight(), &expr.span)?;
                    Ok(value)
                }
                Callee::Other(callee) => Err(RuntimeError::new(
                    "Expression cannot be invoked as a function",
                    &callee.span,
                )),
            },
            ExprKind::Neg(operand) => match self.eval(operand)? {
                Value::Int(value) => value
                    .checked_neg()
                    .map(Value::Int)
                    .ok_or_else(|| RuntimeError::new("Integer overflow", &expr.span)),
                other => Err(RuntimeError::new(
                    format!("Unary operator '-' cannot be applied to {}", other.type_name()),
                    &expr.span,
                )),
            },
            ExprKind::Add(lhs, rhs) => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                self.add(lhs, rhs, &expr.span)
            }
        }
    }

    fn member(&mut self, target: &Expr, name: &str, span: &Span) -> Eval<Value> {
        let namespace = match &target.kind {
            ExprKind::Ident(ns) => Namespace::lookup(ns),
            _ => None,
        };

        match namespace {
            Some(Namespace::AccessFlags) => AccessFlags::from_name(name)
                .map(Value::AccessFlag)
                .ok_or_else(|| RuntimeError::new(format!("Unresolved reference: AccessFlags.{name}"), span)),
            Some(Namespace::Opcode) => name
                .parse::<Opcode>()
                .map(Value::Opcode)
                .map_err(|_| RuntimeError::new(format!("Unresolved reference: Opcode.{name}"), span)),
            Some(Namespace::InstructionLocation) | None => {
                Err(RuntimeError::new(format!("Unresolved reference: {name}"), span))
            }
        }
    }

    /// Evaluate a bound slot; `null` reads as absent.
    fn slot(&mut self, bound: &Bound<'_>, index: usize) -> Eval<Option<(Value, Span)>> {
        match bound.slot(index) {
            Some(arg) => match self.eval(&arg.value)? {
                Value::Null => Ok(None),
                value => Ok(Some((value, arg.value.span.clone()))),
            },
            None => Ok(None),
        }
    }

    fn string_slot(&mut self, bound: &Bound<'_>, index: usize, param: &str) -> Eval<Option<String>> {
        match self.slot(bound, index)? {
            Some((Value::Str(value), _)) => Ok(Some(value)),
            Some((other, span)) => Err(type_mismatch(param, "String", &other, &span)),
            None => Ok(None),
        }
    }

    fn opcode_slot(&mut self, bound: &Bound<'_>, index: usize, param: &str) -> Eval<Option<Opcode>> {
        match self.slot(bound, index)? {
            Some((Value::Opcode(opcode), _)) => Ok(Some(opcode)),
            Some((other, span)) => Err(type_mismatch(param, "Opcode", &other, &span)),
            None => Ok(None),
        }
    }

    fn int_slot(&mut self, bound: &Bound<'_>, index: usize, param: &str) -> Eval<usize> {
        match self.slot(bound, index)? {
            Some((Value::Int(value), span)) => usize::try_from(value).map_err(|_| {
                RuntimeError::new(format!("Parameter '{param}' must not be negative, was {value}"), &span)
            }),
            Some((other, span)) => Err(type_mismatch(param, "Int", &other, &span)),
            None => Err(RuntimeError::new(
                format!("No value passed for parameter '{param}'"),
                &(0..0),
            )),
        }
    }

    fn string_list_slot(
        &mut self,
        bound: &Bound<'_>,
        index: usize,
        param: &str,
    ) -> Eval<Option<Vec<String>>> {
        match self.slot(bound, index)? {
            Some((Value::List(items), span)) => items
                .into_iter()
                .map(|item| match item {
                    Value::Str(value) => Ok(value),
                    other => Err(type_mismatch(param, "List<String>", &other, &span)),
                })
                .collect::<Eval<Vec<String>>>()
                .map(Some),
            Some((other, span)) => Err(type_mismatch(param, "List<String>", &other, &span)),
            None => Ok(None),
        }
    }

    /// Shared `location` / `after` handling of the filter builders.
    fn place(
        &mut self,
        matcher: InstructionMatcher,
        bound: &Bound<'_>,
        location_index: usize,
        span: &Span,
    ) -> Eval<Value> {
        let location = match self.slot(bound, location_index)? {
            Some((Value::Location(location), _)) => location,
            Some((other, span)) => {
                return Err(type_mismatch("location", "InstructionLocation", &other, &span))
            }
            None => InstructionLocation::MatchAnywhere,
        };
        let after = match self.slot(bound, location_index + 1)? {
            Some((Value::Filter(filter), _)) => Some(filter),
            Some((other, span)) => return Err(type_mismatch("after", "InstructionFilter", &other, &span)),
            None => None,
        };

        if after.is_some() && location == InstructionLocation::MatchFirst {
            return Err(RuntimeError::new(
                "InstructionLocation.MatchFirst() cannot be combined with 'after'",
                span,
            ));
        }
        if let Some(after) = &after {
            if after.chain_depth() >= self.limits.max_chain_depth {
                return Err(RuntimeError::new(
                    format!(
                        "Filter chain is deeper than {} filters",
                        self.limits.max_chain_depth
                    ),
                    span,
                ));
            }
        }

        Ok(Value::Filter(Box::new(InstructionFilter {
            matcher,
            location,
            after,
        })))
    }

    fn call(&mut self, builtin: Builtin, bound: &Bound<'_>, span: &Span) -> Eval<Value> {
        match builtin {
            Builtin::ListOf | Builtin::SetOf => {
                let Bound::Variadic(args) = bound else {
                    return Err(RuntimeError::new("Invalid call", span));
                };
                let mut items = Vec::with_capacity(args.len());
                let mut weight = 0usize;
                for arg in args {
                    let value = self.eval(&arg.value)?;
                    if value.list_depth() >= self.limits.max_nesting_depth {
                        return Err(RuntimeError::new(
                            format!(
                                "Lists are nested deeper than {} levels",
                                self.limits.max_nesting_depth
                            ),
                            &arg.value.span,
                        ));
                    }
                    weight = weight.saturating_add(value.weight());
                    self.check_weight(weight, span)?;
                    if builtin == Builtin::ListOf || !items.contains(&value) {
                        items.push(value);
                    }
                }
                Ok(Value::List(items))
            }
            Builtin::ErrorValue => {
                let message = self.string_slot(bound, 0, "message")?.unwrap_or_default();
                Ok(Value::Error(message))
            }
            Builtin::Fail => {
                let message = self.string_slot(bound, 0, "message")?.unwrap_or_default();
                Err(RuntimeError::new(message, span))
            }
            Builtin::MatchFirst => Ok(Value::Location(InstructionLocation::MatchFirst)),
            Builtin::MatchAfterImmediately => {
                Ok(Value::Location(InstructionLocation::MatchAfterImmediately))
            }
            Builtin::MatchAfterWithin => {
                let max = self.int_slot(bound, 0, "matchDistance")?;
                Ok(Value::Location(InstructionLocation::MatchAfterWithin { max }))
            }
            Builtin::MatchAfterAtLeast => {
                let min = self.int_slot(bound, 0, "minimumDistance")?;
                Ok(Value::Location(InstructionLocation::MatchAfterAtLeast { min }))
            }
            Builtin::MatchAfterRange => {
                let min = self.int_slot(bound, 0, "minimumDistance")?;
                let max = self.int_slot(bound, 1, "maximumDistance")?;
                Ok(Value::Location(InstructionLocation::MatchAfterRange { min, max }))
            }
            Builtin::OpcodeFilter => {
                let opcode = self
                    .opcode_slot(bound, 0, "opcode")?
                    .ok_or_else(|| RuntimeError::new("Parameter 'opcode' must not be null", span))?;
                self.place(InstructionMatcher::Opcode { opcode }, bound, 1, span)
            }
            Builtin::StringFilter => {
                let value = self
                    .string_slot(bound, 0, "string")?
                    .ok_or_else(|| RuntimeError::new("Parameter 'string' must not be null", span))?;
                self.place(InstructionMatcher::String { value }, bound, 1, span)
            }
            Builtin::MethodCall => {
                let matcher = InstructionMatcher::MethodCall {
                    defining_class: self.string_slot(bound, 0, "definingClass")?,
                    name: self.string_slot(bound, 1, "name")?,
                    parameters: self.string_list_slot(bound, 2, "parameters")?,
                    return_type: self.string_slot(bound, 3, "returnType")?,
                    opcode: self.opcode_slot(bound, 4, "opcode")?,
                };
                self.place(matcher, bound, 5, span)
            }
            Builtin::FieldAccess => {
                let matcher = InstructionMatcher::FieldAccess {
                    defining_class: self.string_slot(bound, 0, "definingClass")?,
                    name: self.string_slot(bound, 1, "name")?,
                    field_type: self.string_slot(bound, 2, "type")?,
                    opcode: self.opcode_slot(bound, 3, "opcode")?,
                };
                self.place(matcher, bound, 4, span)
            }
            Builtin::Fingerprint => self.fingerprint(bound, span),
        }
    }

    fn fingerprint(&mut self, bound: &Bound<'_>, span: &Span) -> Eval<Value> {
        let mut fingerprint = Fingerprint {
            defining_class: self.string_slot(bound, 0, "definingClass")?,
            name: self.string_slot(bound, 1, "name")?,
            ..Fingerprint::default()
        };

        fingerprint.access_flags = match self.slot(bound, 2)? {
            Some((Value::AccessFlag(flag), _)) => Some(flag),
            Some((Value::List(items), span)) => Some(items.into_iter().try_fold(
                AccessFlags::empty(),
                |acc, item| match item {
                    Value::AccessFlag(flag) => Ok(acc | flag),
                    other => Err(type_mismatch("accessFlags", "List<AccessFlags>", &other, &span)),
                },
            )?),
            Some((other, span)) => {
                return Err(type_mismatch("accessFlags", "List<AccessFlags>", &other, &span))
            }
            None => None,
        };

        fingerprint.return_type = self.string_slot(bound, 3, "returnType")?;
        fingerprint.parameters = self.string_list_slot(bound, 4, "parameters")?;
        fingerprint.strings = self.string_list_slot(bound, 5, "strings")?.unwrap_or_default();

        fingerprint.opcodes = match self.slot(bound, 6)? {
            Some((Value::List(items), span)) => Some(
                items
                    .into_iter()
                    .map(|item| match item {
                        Value::Opcode(opcode) => Ok(Some(opcode)),
                        Value::Null => Ok(None),
                        other => Err(type_mismatch("opcodes", "List<Opcode?>", &other, &span)),
                    })
                    .collect::<Eval<Vec<Option<Opcode>>>>()?,
            ),
            Some((other, span)) => return Err(type_mismatch("opcodes", "List<Opcode?>", &other, &span)),
            None => None,
        };

        fingerprint.filters = match self.slot(bound, 7)? {
            Some((Value::List(items), span)) => items
                .into_iter()
                .map(|item| match item {
                    Value::Filter(filter) => Ok(*filter),
                    other => Err(type_mismatch("filters", "List<InstructionFilter>", &other, &span)),
                })
                .collect::<Eval<Vec<InstructionFilter>>>()?,
            Some((other, span)) => {
                return Err(type_mismatch("filters", "List<InstructionFilter>", &other, &span))
            }
            None => Vec::new(),
        };

        fingerprint.anchor = match self.slot(bound, 8)? {
            Some((Value::Fingerprint(anchor), _))
                if anchor.anchor_depth() >= self.limits.max_chain_depth =>
            {
                return Err(RuntimeError::new(
                    format!(
                        "Anchor chain is deeper than {} fingerprints",
                        self.limits.max_chain_depth
                    ),
                    span,
                ))
            }
            Some((Value::Fingerprint(anchor), _)) => Some(anchor),
            Some((other, span)) => return Err(type_mismatch("anchor", "Fingerprint", &other, &span)),
            None => None,
        };

        Ok(Value::Fingerprint(Box::new(fingerprint)))
    }

    fn add(&self, lhs: Value, rhs: Value, span: &Span) -> Eval<Value> {
        match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => a
                .checked_add(b)
                .map(Value::Int)
                .ok_or_else(|| RuntimeError::new("Integer overflow", span)),
            (Value::Str(a), rhs) => {
                let tail = rhs.to_display_string();
                self.check_weight(a.len().saturating_add(tail.len()), span)?;
                Ok(Value::Str(a + &tail))
            }
            (Value::List(mut a), Value::List(b)) => {
                let weight = a
                    .iter()
                    .chain(&b)
                    .fold(0usize, |acc, item| acc.saturating_add(item.weight()));
                self.check_weight(weight, span)?;
                a.extend(b);
                Ok(Value::List(a))
            }
            (lhs, rhs) => Err(RuntimeError::new(
                format!(
                    "Operator '+' cannot be applied to '{}' and '{}'",
                    lhs.type_name(),
                    rhs.type_name()
                ),
                span,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::diagnostics::LineIndex;
    use crate::script::lexer::tokenize;
    use crate::script::parser::parse;

    fn run(source: &str) -> Eval<ScriptValue> {
        let lines = LineIndex::new(source);
        let (tokens, _) = tokenize(source, &lines);
        let (script, diagnostics) = parse(&tokens, &lines, 32);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        execute(&script, &EvaluationConfig::default())
    }

    fn value(source: &str) -> Value {
        match run(source) {
            Ok(ScriptValue::Value(value)) => value,
            other => panic!("expected a value, got {other:?}"),
        }
    }

    #[test]
    fn test_script_values() {
        assert_eq!(run("").unwrap(), ScriptValue::NotEvaluated);
        assert_eq!(run("val a = 1").unwrap(), ScriptValue::Unit);
        assert_eq!(
            run("Error(\"nope\")").unwrap(),
            ScriptValue::Error {
                message: "nope".into()
            }
        );
        assert_eq!(value("val a = 40\na + 2"), Value::Int(42));
    }

    #[test]
    fn test_arithmetic_and_concatenation() {
        assert_eq!(value("-(2 + 3)"), Value::Int(-5));
        assert_eq!(value("\"count: \" + 3"), Value::Str("count: 3".into()));
        assert_eq!(
            value("listOf(1) + listOf(2)"),
            Value::List(vec![Value::Int(1), Value::Int(2)])
        );
        assert!(run("1 + \"a\"").is_err());
        assert!(run("9223372036854775807 + 1").is_err());
    }

    #[test]
    fn test_set_of_deduplicates() {
        assert_eq!(
            value("setOf(Opcode.NOP, Opcode.NOP, Opcode.RETURN)"),
            Value::List(vec![Value::Opcode(Opcode::Nop), Value::Opcode(Opcode::Return)])
        );
    }

    #[test]
    fn test_fingerprint_construction() {
        let source = r#"
            val invoke = opcode(Opcode.INVOKE_VIRTUAL)
            Fingerprint(
                definingClass = "Lcom/app/Player;",
                accessFlags = listOf(AccessFlags.PUBLIC, AccessFlags.FINAL),
                returnType = "Z",
                parameters = listOf("J"),
                strings = listOf("seek_position"),
                opcodes = listOf(Opcode.CONST_STRING, null),
                filters = listOf(
                    opcode(Opcode.IF_EQZ, after = invoke, location = InstructionLocation.MatchAfterWithin(2)),
                ),
            )
        "#;

        let Value::Fingerprint(fingerprint) = value(source) else {
            panic!("expected fingerprint");
        };
        assert_eq!(fingerprint.defining_class.as_deref(), Some("Lcom/app/Player;"));
        assert_eq!(
            fingerprint.access_flags,
            Some(AccessFlags::PUBLIC | AccessFlags::FINAL)
        );
        assert_eq!(fingerprint.opcodes, Some(vec![Some(Opcode::ConstString), None]));
        assert_eq!(fingerprint.filters.len(), 1);
        assert_eq!(
            fingerprint.filters[0].location,
            InstructionLocation::MatchAfterWithin { max: 2 }
        );
        assert!(fingerprint.filters[0].after.is_some());
        assert!(fingerprint.name.is_none());
    }

    #[test]
    fn test_runtime_errors() {
        let err = run("Fingerprint(name = 3)").unwrap_err();
        assert!(err.message.contains("parameter 'name' expects String, found Int"));

        let err = run("InstructionLocation.MatchAfterWithin(-1)").unwrap_err();
        assert!(err.message.contains("must not be negative"));

        let err = run("opcode(Opcode.NOP, after = opcode(Opcode.NOP), location = InstructionLocation.MatchFirst())")
            .unwrap_err();
        assert!(err.message.contains("MatchFirst"));

        let err = run("val a = 1\nfail(\"stop here\")\nError(\"unreached\")").unwrap_err();
        assert_eq!(err.message, "stop here");
    }

    #[test]
    fn test_null_arguments_are_absent() {
        let Value::Fingerprint(fingerprint) = value("Fingerprint(name = null, strings = null)") else {
            panic!("expected fingerprint");
        };
        assert_eq!(*fingerprint, Fingerprint::default());
    }
}
