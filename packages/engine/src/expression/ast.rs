//! Expression AST.

/// Literal primitives.
#[derive(Debug, Clone, PartialEq)]
pub enum Lit {
    Number(f64),
    String(String),
    Bool(bool),
    Null,
    Undefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Minus,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    And,
    Or,
    Nullish,
    In,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::StrictEq => "===",
            BinaryOp::StrictNe => "!==",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Nullish => "??",
            BinaryOp::In => "in",
        }
    }
}

/// Expression tree. Reads hang off an implicit receiver (the scope chain);
/// writes are distinct nodes so the evaluator can route them through the
/// frame/hole rules.
#[derive(Debug, Clone, PartialEq)]
pub enum Ast {
    Empty,
    /// The scope chain itself; receiver of bare identifiers.
    ImplicitReceiver,
    Literal(Lit),
    LiteralArray(Vec<Ast>),
    LiteralMap(Vec<(String, Ast)>),
    PropertyRead {
        receiver: Box<Ast>,
        name: String,
        safe: bool,
    },
    KeyedRead {
        receiver: Box<Ast>,
        key: Box<Ast>,
        safe: bool,
    },
    Call {
        callee: Box<Ast>,
        args: Vec<Ast>,
    },
    PrefixNot(Box<Ast>),
    Unary {
        op: UnaryOp,
        expr: Box<Ast>,
    },
    TypeofExpression(Box<Ast>),
    Binary {
        op: BinaryOp,
        left: Box<Ast>,
        right: Box<Ast>,
    },
    Conditional {
        condition: Box<Ast>,
        true_expr: Box<Ast>,
        false_expr: Box<Ast>,
    },
    PropertyWrite {
        receiver: Box<Ast>,
        name: String,
        value: Box<Ast>,
    },
    KeyedWrite {
        receiver: Box<Ast>,
        key: Box<Ast>,
        value: Box<Ast>,
    },
    /// Semicolon-separated statement sequence.
    Chain(Vec<Ast>),
}

impl Ast {
    /// A bare identifier read (`foo`), if this node is one.
    pub fn as_bare_identifier(&self) -> Option<&str> {
        match self {
            Ast::PropertyRead { receiver, name, .. } if matches!(**receiver, Ast::ImplicitReceiver) => {
                Some(name)
            }
            _ => None,
        }
    }
}

/// Compact round-trip rendering used in diagnostics and tests.
pub fn unparse(ast: &Ast) -> String {
    match ast {
        Ast::Empty => String::new(),
        Ast::ImplicitReceiver => String::new(),
        Ast::Literal(Lit::Number(n)) => crate::value_ops::format_number(*n),
        Ast::Literal(Lit::String(s)) => format!("\"{s}\""),
        Ast::Literal(Lit::Bool(b)) => b.to_string(),
        Ast::Literal(Lit::Null) => "null".to_string(),
        Ast::Literal(Lit::Undefined) => "undefined".to_string(),
        Ast::LiteralArray(items) => {
            let inner: Vec<String> = items.iter().map(unparse).collect();
            format!("[{}]", inner.join(", "))
        }
        Ast::LiteralMap(entries) => {
            let inner: Vec<String> = entries
                .iter()
                .map(|(k, v)| format!("{k}: {}", unparse(v)))
                .collect();
            format!("{{{}}}", inner.join(", "))
        }
        Ast::PropertyRead {
            receiver,
            name,
            safe,
        } => {
            let base = unparse(receiver);
            let dot = if *safe { "?." } else { "." };
            if base.is_empty() {
                name.clone()
            } else {
                format!("{base}{dot}{name}")
            }
        }
        Ast::KeyedRead { receiver, key, safe } => {
            let dot = if *safe { "?." } else { "" };
            format!("{}{dot}[{}]", unparse(receiver), unparse(key))
        }
        Ast::Call { callee, args } => {
            let rendered: Vec<String> = args.iter().map(unparse).collect();
            format!("{}({})", unparse(callee), rendered.join(", "))
        }
        Ast::PrefixNot(expr) => format!("!{}", unparse(expr)),
        Ast::Unary { op, expr } => {
            let sign = match op {
                UnaryOp::Minus => "-",
                UnaryOp::Plus => "+",
            };
            format!("{sign}{}", unparse(expr))
        }
        Ast::TypeofExpression(expr) => format!("typeof {}", unparse(expr)),
        Ast::Binary { op, left, right } => {
            format!("{} {} {}", unparse(left), op.symbol(), unparse(right))
        }
        Ast::Conditional {
            condition,
            true_expr,
            false_expr,
        } => format!(
            "{} ? {} : {}",
            unparse(condition),
            unparse(true_expr),
            unparse(false_expr)
        ),
        Ast::PropertyWrite {
            receiver,
            name,
            value,
        } => {
            let base = unparse(receiver);
            if base.is_empty() {
                format!("{name} = {}", unparse(value))
            } else {
                format!("{base}.{name} = {}", unparse(value))
            }
        }
        Ast::KeyedWrite {
            receiver,
            key,
            value,
        } => format!(
            "{}[{}] = {}",
            unparse(receiver),
            unparse(key),
            unparse(value)
        ),
        Ast::Chain(stmts) => {
            let rendered: Vec<String> = stmts.iter().map(unparse).collect();
            rendered.join("; ")
        }
    }
}
