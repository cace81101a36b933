//! Tree-walking evaluator.
//!
//! Three entry points map to the three evaluation modes: [`EvalCtx::read`]
//! produces a value and degrades to null on failure, [`EvalCtx::statement`]
//! runs `let`/`global`/handler statements for their side effects, and
//! [`EvalCtx::assign`] drives two-way bindings with a caller-supplied
//! value. Unresolved identifiers in statement mode become holes; the first
//! terminal write materializes the path on the frame the write rule picks.

use std::collections::HashMap;
use std::rc::Rc;

use serde_json::{Map, Value};

use crate::engine::Engine;
use crate::error::{bounded, DiagnosticKind};
use crate::expression::ast::{Ast, BinaryOp, Lit, UnaryOp};
use crate::expression::ExprError;
use crate::filters::{Method, MethodEntry};
use crate::host::Host;
use crate::scope::{self, Hole, Scope};
use crate::value_ops;

/// Where an unresolved or bare-name write roots itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteRule {
    /// Bare names bind on the local frame; unresolved nested roots
    /// materialize there too.
    Let,
    /// Write through to host data when the name pre-exists there, else to
    /// the engine globals.
    Global,
    /// Walk the chain for an existing owner, else bind on the scope itself.
    Assign,
}

/// Evaluation results richer than plain data: callables from the method
/// registry and unresolved-target holes flow through expressions without
/// ever being materialized into the data model.
#[derive(Clone)]
pub enum Rich {
    Val(Value),
    Callable(Method),
    Namespace(HashMap<String, Method>),
    Hole(Hole),
}

impl Rich {
    fn truthy(&self) -> bool {
        match self {
            Rich::Val(v) => value_ops::is_truthy(v),
            Rich::Hole(_) => false,
            Rich::Callable(_) | Rich::Namespace(_) => true,
        }
    }

    fn into_value(self) -> Result<Value, ExprError> {
        match self {
            Rich::Val(v) => Ok(v),
            Rich::Hole(_) => Ok(Value::Null),
            Rich::Callable(_) | Rich::Namespace(_) => {
                Err(ExprError::new("function value used as data"))
            }
        }
    }
}

pub struct EvalCtx<'a> {
    pub engine: &'a Engine,
    pub host: &'a Host,
    pub scope: &'a Scope,
    pub event: Option<&'a Value>,
    pub node_excerpt: Option<&'a str>,
    pub quiet: bool,
    pub rule: Option<WriteRule>,
}

impl<'a> EvalCtx<'a> {
    pub fn new(engine: &'a Engine, host: &'a Host, scope: &'a Scope) -> Self {
        EvalCtx {
            engine,
            host,
            scope,
            event: None,
            node_excerpt: None,
            quiet: false,
            rule: None,
        }
    }

    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    pub fn with_rule(mut self, rule: WriteRule) -> Self {
        self.rule = Some(rule);
        self
    }

    pub fn with_event(mut self, event: &'a Value) -> Self {
        self.event = Some(event);
        self
    }

    pub fn with_excerpt(mut self, excerpt: &'a str) -> Self {
        self.node_excerpt = Some(excerpt);
        self
    }

    /// Read mode: a value, or null after a logged failure.
    pub fn read(&self, src: &str) -> Value {
        match self.try_read(src) {
            Ok(v) => v,
            Err(err) => {
                self.report(src, &err);
                Value::Null
            }
        }
    }

    pub fn try_read(&self, src: &str) -> Result<Value, ExprError> {
        self.try_rich(src)?.into_value()
    }

    /// Read mode preserving callables, used for predicate-style matching.
    pub fn try_rich(&self, src: &str) -> Result<Rich, ExprError> {
        let ast = self.engine.parse_expr(src)?;
        self.eval(&ast)
    }

    /// Statement mode: side effects only. The write rule must be set.
    pub fn statement(&self, src: &str) {
        let result = self
            .engine
            .parse_expr(src)
            .and_then(|ast| self.eval(&ast));
        if let Err(err) = result {
            self.report(src, &err);
        }
    }

    /// Assignment mode: write `value` into the target path `target_src`
    /// names. Used by two-way bindings.
    pub fn assign(&self, target_src: &str, value: Value) {
        let result = self.engine.parse_expr(target_src).and_then(|ast| {
            let path = self.static_path(&ast)?;
            self.perform_write(&path, value.clone())
        });
        if let Err(err) = result {
            self.report(target_src, &err);
        }
    }

    fn report(&self, src: &str, err: &ExprError) {
        if self.quiet {
            return;
        }
        let mut message = format!("`{}`: {}", bounded(src, 128), err.message);
        if let Some(excerpt) = self.node_excerpt {
            message.push_str(" in ");
            message.push_str(excerpt);
        }
        self.host.diag(DiagnosticKind::Expression, message);
    }

    fn eval(&self, ast: &Ast) -> Result<Rich, ExprError> {
        match ast {
            Ast::Empty | Ast::ImplicitReceiver => Ok(Rich::Val(Value::Null)),
            Ast::Literal(lit) => Ok(Rich::Val(match lit {
                Lit::Number(n) => value_ops::number_value(*n),
                Lit::String(s) => Value::String(s.clone()),
                Lit::Bool(b) => Value::Bool(*b),
                Lit::Null | Lit::Undefined => Value::Null,
            })),
            Ast::LiteralArray(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.eval(item)?.into_value()?);
                }
                Ok(Rich::Val(Value::Array(out)))
            }
            Ast::LiteralMap(entries) => {
                let mut map = Map::new();
                for (key, expr) in entries {
                    map.insert(key.clone(), self.eval(expr)?.into_value()?);
                }
                Ok(Rich::Val(Value::Object(map)))
            }
            Ast::PropertyRead {
                receiver,
                name,
                safe,
            } => {
                if matches!(**receiver, Ast::ImplicitReceiver) {
                    return self.resolve_identifier(name);
                }
                let base = self.eval(receiver)?;
                self.member(base, name, *safe)
            }
            Ast::KeyedRead {
                receiver,
                key,
                safe,
            } => {
                let base = self.eval(receiver)?;
                let key = self.eval(key)?.into_value()?;
                self.member(base, &value_ops::to_display(&key), *safe)
            }
            Ast::Call { callee, args } => self.call(callee, args),
            Ast::PrefixNot(expr) => Ok(Rich::Val(Value::Bool(!self.eval(expr)?.truthy()))),
            Ast::Unary { op, expr } => {
                let v = self.eval(expr)?.into_value()?;
                let n = value_ops::as_number(&v)
                    .ok_or_else(|| ExprError::new("unary operand is not numeric"))?;
                let n = match op {
                    UnaryOp::Minus => -n,
                    UnaryOp::Plus => n,
                };
                Ok(Rich::Val(value_ops::number_value(n)))
            }
            Ast::TypeofExpression(expr) => {
                let name = match self.eval(expr) {
                    Ok(Rich::Hole(_)) => "undefined",
                    Ok(Rich::Callable(_)) | Ok(Rich::Namespace(_)) => "function",
                    Ok(Rich::Val(Value::Null)) => "undefined",
                    Ok(Rich::Val(Value::Bool(_))) => "boolean",
                    Ok(Rich::Val(Value::Number(_))) => "number",
                    Ok(Rich::Val(Value::String(_))) => "string",
                    Ok(Rich::Val(_)) => "object",
                    // An unresolved name under typeof is not an error.
                    Err(_) => "undefined",
                };
                Ok(Rich::Val(Value::String(name.to_string())))
            }
            Ast::Binary { op, left, right } => self.binary(*op, left, right),
            Ast::Conditional {
                condition,
                true_expr,
                false_expr,
            } => {
                if self.eval(condition)?.truthy() {
                    self.eval(true_expr)
                } else {
                    self.eval(false_expr)
                }
            }
            Ast::PropertyWrite {
                receiver,
                name,
                value,
            } => {
                let mut path = self.static_path(receiver)?;
                path.push(name.clone());
                let value = self.eval(value)?.into_value()?;
                self.perform_write(&path, value.clone())?;
                Ok(Rich::Val(value))
            }
            Ast::KeyedWrite {
                receiver,
                key,
                value,
            } => {
                let mut path = self.static_path(receiver)?;
                let key = self.eval(key)?.into_value()?;
                path.push(value_ops::to_display(&key));
                let value = self.eval(value)?.into_value()?;
                self.perform_write(&path, value.clone())?;
                Ok(Rich::Val(value))
            }
            Ast::Chain(stmts) => {
                let mut last = Rich::Val(Value::Null);
                for stmt in stmts {
                    last = self.eval(stmt)?;
                }
                Ok(last)
            }
        }
    }

    fn binary(&self, op: BinaryOp, left: &Ast, right: &Ast) -> Result<Rich, ExprError> {
        match op {
            BinaryOp::And => {
                let l = self.eval(left)?;
                return if l.truthy() { self.eval(right) } else { Ok(l) };
            }
            BinaryOp::Or => {
                let l = self.eval(left)?;
                return if l.truthy() { Ok(l) } else { self.eval(right) };
            }
            BinaryOp::Nullish => {
                let l = self.eval(left)?;
                let is_absent = matches!(&l, Rich::Val(Value::Null) | Rich::Hole(_));
                return if is_absent { self.eval(right) } else { Ok(l) };
            }
            _ => {}
        }
        let l = self.eval(left)?.into_value()?;
        let r = self.eval(right)?.into_value()?;
        let out = match op {
            BinaryOp::Add => {
                if l.is_string() || r.is_string() {
                    Value::String(format!(
                        "{}{}",
                        value_ops::to_display(&l),
                        value_ops::to_display(&r)
                    ))
                } else {
                    self.arith(&l, &r, |a, b| a + b)?
                }
            }
            BinaryOp::Sub => self.arith(&l, &r, |a, b| a - b)?,
            BinaryOp::Mul => self.arith(&l, &r, |a, b| a * b)?,
            BinaryOp::Div => self.arith(&l, &r, |a, b| a / b)?,
            BinaryOp::Mod => self.arith(&l, &r, |a, b| a % b)?,
            BinaryOp::Eq => Value::Bool(value_ops::loose_eq(&l, &r)),
            BinaryOp::Ne => Value::Bool(!value_ops::loose_eq(&l, &r)),
            BinaryOp::StrictEq => Value::Bool(value_ops::strict_eq(&l, &r)),
            BinaryOp::StrictNe => Value::Bool(!value_ops::strict_eq(&l, &r)),
            BinaryOp::Lt => self.relational(&l, &r, |o| o == std::cmp::Ordering::Less),
            BinaryOp::Le => self.relational(&l, &r, |o| o != std::cmp::Ordering::Greater),
            BinaryOp::Gt => self.relational(&l, &r, |o| o == std::cmp::Ordering::Greater),
            BinaryOp::Ge => self.relational(&l, &r, |o| o != std::cmp::Ordering::Less),
            BinaryOp::In => {
                let key = value_ops::to_display(&l);
                match &r {
                    Value::Object(map) => Value::Bool(map.contains_key(&key)),
                    Value::Array(items) => Value::Bool(
                        key.parse::<usize>().map(|i| i < items.len()).unwrap_or(false),
                    ),
                    _ => Value::Bool(false),
                }
            }
            BinaryOp::And | BinaryOp::Or | BinaryOp::Nullish => unreachable!("short-circuited"),
        };
        Ok(Rich::Val(out))
    }

    fn arith(
        &self,
        l: &Value,
        r: &Value,
        f: impl Fn(f64, f64) -> f64,
    ) -> Result<Value, ExprError> {
        match (value_ops::as_number(l), value_ops::as_number(r)) {
            (Some(a), Some(b)) => Ok(value_ops::number_value(f(a, b))),
            _ => Err(ExprError::new("arithmetic operand is not numeric")),
        }
    }

    fn relational(
        &self,
        l: &Value,
        r: &Value,
        f: impl Fn(std::cmp::Ordering) -> bool,
    ) -> Value {
        match value_ops::compare(l, r) {
            Some(ordering) => Value::Bool(f(ordering)),
            None => Value::Bool(false),
        }
    }

    fn member(&self, base: Rich, name: &str, safe: bool) -> Result<Rich, ExprError> {
        match base {
            Rich::Hole(hole) => Ok(Rich::Hole(hole.extended(name))),
            Rich::Namespace(members) => match members.get(name) {
                Some(method) => Ok(Rich::Callable(Rc::clone(method))),
                None => Err(ExprError::new(format!("unknown method `{name}`"))),
            },
            Rich::Callable(_) => Err(ExprError::new("property access on a function")),
            Rich::Val(Value::Null) => {
                if safe {
                    Ok(Rich::Val(Value::Null))
                } else {
                    Err(ExprError::new(format!(
                        "cannot read `{name}` of null"
                    )))
                }
            }
            Rich::Val(Value::Object(map)) => {
                Ok(Rich::Val(map.get(name).cloned().unwrap_or(Value::Null)))
            }
            Rich::Val(Value::Array(items)) => {
                if name == "length" {
                    return Ok(Rich::Val(Value::from(items.len())));
                }
                match name.parse::<usize>() {
                    Ok(i) => Ok(Rich::Val(items.get(i).cloned().unwrap_or(Value::Null))),
                    Err(_) => Ok(Rich::Val(Value::Null)),
                }
            }
            Rich::Val(Value::String(s)) => {
                if name == "length" {
                    Ok(Rich::Val(Value::from(s.chars().count())))
                } else {
                    Ok(Rich::Val(Value::Null))
                }
            }
            Rich::Val(_) => Ok(Rich::Val(Value::Null)),
        }
    }

    fn call(&self, callee: &Ast, args: &[Ast]) -> Result<Rich, ExprError> {
        let mut evaluated = Vec::with_capacity(args.len());
        for arg in args {
            evaluated.push(self.eval(arg)?.into_value()?);
        }
        // Value-receiver calls dispatch to the built-in helpers first.
        if let Ast::PropertyRead {
            receiver, name, ..
        } = callee
        {
            if !matches!(**receiver, Ast::ImplicitReceiver) {
                let base = self.eval(receiver)?;
                return match base {
                    Rich::Namespace(members) => match members.get(name.as_str()) {
                        Some(method) => self.invoke(method, &evaluated),
                        None => Err(ExprError::new(format!("unknown method `{name}`"))),
                    },
                    Rich::Val(value) => match builtin_call(&value, name, &evaluated) {
                        Some(result) => result
                            .map(Rich::Val)
                            .map_err(ExprError::new),
                        None => Err(ExprError::new(format!(
                            "`{name}` is not callable here"
                        ))),
                    },
                    _ => Err(ExprError::new(format!("`{name}` is not callable here"))),
                };
            }
        }
        match self.eval(callee)? {
            Rich::Callable(method) => self.invoke(&method, &evaluated),
            _ => Err(ExprError::new("expression is not callable")),
        }
    }

    fn invoke(&self, method: &Method, args: &[Value]) -> Result<Rich, ExprError> {
        method(args).map(Rich::Val).map_err(ExprError::new)
    }

    fn resolve_identifier(&self, name: &str) -> Result<Rich, ExprError> {
        match name {
            "$data" => return Ok(Rich::Val(self.host.active_data().borrow().clone())),
            "$root" => return Ok(Rich::Val(self.engine.root_data(self.host))),
            "$parent" => return Ok(Rich::Val(self.engine.parent_data(self.host))),
            "$event" => {
                return Ok(Rich::Val(self.event.cloned().unwrap_or(Value::Null)));
            }
            "$node" => {
                return Ok(Rich::Val(
                    self.node_excerpt
                        .map(|e| Value::String(e.to_string()))
                        .unwrap_or(Value::Null),
                ));
            }
            _ => {}
        }
        if let Some(v) = scope::lookup(self.scope, name) {
            return Ok(Rich::Val(v));
        }
        if let Some(entry) = self.host.spliced_method(self.engine, name) {
            return Ok(match entry {
                MethodEntry::Callable(m) => Rich::Callable(m),
                MethodEntry::Namespace(members) => Rich::Namespace(members),
            });
        }
        if let Some(v) = self.engine.global(name) {
            return Ok(Rich::Val(v));
        }
        if self.rule.is_some() {
            return Ok(Rich::Hole(Hole::new(name)));
        }
        Err(ExprError::new(format!("`{name}` is not defined")))
    }

    /// Collapse a write target into a static path. Receivers must be chains
    /// of property/keyed reads off the implicit receiver.
    fn static_path(&self, ast: &Ast) -> Result<Vec<String>, ExprError> {
        match ast {
            Ast::ImplicitReceiver => Ok(Vec::new()),
            Ast::PropertyRead { receiver, name, .. } => {
                let mut path = self.static_path(receiver)?;
                path.push(name.clone());
                Ok(path)
            }
            Ast::KeyedRead { receiver, key, .. } => {
                let mut path = self.static_path(receiver)?;
                let key = self.eval(key)?.into_value()?;
                path.push(value_ops::to_display(&key));
                Ok(path)
            }
            _ => Err(ExprError::new("unsupported assignment target")),
        }
    }

    /// Route a write to the frame the active rule picks.
    fn perform_write(&self, path: &[String], value: Value) -> Result<(), ExprError> {
        let root = match path.first() {
            Some(root) => root.as_str(),
            None => return Err(ExprError::new("empty assignment target")),
        };
        match root {
            "$data" => {
                if path.len() == 1 {
                    return Err(ExprError::new("cannot replace the data object"));
                }
                self.host.write_path(&path[1..], value);
                return Ok(());
            }
            "$parent" | "$root" => {
                let target = if root == "$parent" {
                    self.engine.parent_host(self.host)
                } else {
                    self.engine.root_host(self.host)
                };
                if path.len() == 1 {
                    return Err(ExprError::new("cannot replace the data object"));
                }
                match target {
                    Some(host) => host.write_path(&path[1..], value),
                    None => self.host.write_path(&path[1..], value),
                }
                return Ok(());
            }
            _ => {}
        }

        let rule = self.rule.unwrap_or(WriteRule::Assign);

        // A bare `let` name always declares on the local frame, shadowing
        // anything further down the chain.
        if rule == WriteRule::Let && path.len() == 1 {
            self.scope.set_local(root, value);
            return Ok(());
        }

        if rule == WriteRule::Global {
            let in_data = {
                let data = self.host.active_data();
                let borrowed = data.borrow();
                matches!(&*borrowed, Value::Object(map) if map.contains_key(root))
            };
            if in_data {
                self.host.write_path(path, value);
            } else {
                self.engine.write_global_path(path, value);
            }
            return Ok(());
        }

        if let Some(owner) = scope::find_owner(self.scope, root) {
            if owner.data_cell().is_some() {
                self.host.write_path(path, value);
            } else {
                owner.set_path_local(path, value);
            }
            return Ok(());
        }

        // Unresolved root: materialize where the rule says.
        self.scope.set_path_local(path, value);
        Ok(())
    }
}

/// Built-in helpers callable on plain values.
fn builtin_call(receiver: &Value, name: &str, args: &[Value]) -> Option<Result<Value, String>> {
    let first = args.first();
    let result = match (receiver, name) {
        (Value::Array(items), "includes") => {
            let needle = first.cloned().unwrap_or(Value::Null);
            Value::Bool(items.iter().any(|v| value_ops::loose_eq(v, &needle)))
        }
        (Value::Array(items), "indexOf") => {
            let needle = first.cloned().unwrap_or(Value::Null);
            let idx = items
                .iter()
                .position(|v| value_ops::loose_eq(v, &needle))
                .map(|i| i as i64)
                .unwrap_or(-1);
            Value::from(idx)
        }
        (Value::Array(items), "join") => {
            let sep = first.map(value_ops::to_display).unwrap_or_else(|| ",".to_string());
            Value::String(
                items
                    .iter()
                    .map(value_ops::to_display)
                    .collect::<Vec<_>>()
                    .join(&sep),
            )
        }
        (Value::String(s), "includes") => {
            let needle = first.map(value_ops::to_display).unwrap_or_default();
            Value::Bool(s.contains(&needle))
        }
        (Value::String(s), "split") => {
            let sep = first.map(value_ops::to_display).unwrap_or_default();
            let parts: Vec<Value> = if sep.is_empty() {
                s.chars().map(|c| Value::String(c.to_string())).collect()
            } else {
                s.split(&sep).map(|p| Value::String(p.to_string())).collect()
            };
            Value::Array(parts)
        }
        (Value::String(s), "toUpperCase") => Value::String(s.to_uppercase()),
        (Value::String(s), "toLowerCase") => Value::String(s.to_lowercase()),
        (Value::String(s), "trim") => Value::String(s.trim().to_string()),
        _ => return None,
    };
    Some(Ok(result))
}
