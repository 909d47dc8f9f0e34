use crate::common::{matches_comparison, matches_eq, matches_in, Comparison, TextPattern, Value};
use crate::errors::{ErrorKind, RepoError, RepoResult};
use itertools::Itertools;
use std::fmt::{Display, Formatter};

/// A leaf of a predicate expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A mapped member of the entity, by member name.
    Field(String),
    /// The identifier member of the entity, whatever its name.
    Id,
    /// A captured constant.
    Constant(Value),
}

impl Operand {
    pub fn is_constant(&self) -> bool {
        matches!(self, Operand::Constant(_))
    }
}

impl Display for Operand {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Field(name) => write!(f, "{}", name),
            Operand::Id => write!(f, "<id>"),
            Operand::Constant(value) => write!(f, "{}", value),
        }
    }
}

/// Binary comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    /// The ordering comparison behind a relational operator, `None` for `Eq`/`Ne`.
    pub fn comparison(&self) -> Option<Comparison> {
        match self {
            CompareOp::Eq | CompareOp::Ne => None,
            CompareOp::Gt => Some(Comparison::Gt),
            CompareOp::Gte => Some(Comparison::Gte),
            CompareOp::Lt => Some(Comparison::Lt),
            CompareOp::Lte => Some(Comparison::Lte),
        }
    }

    /// The operator that holds when the operands are swapped.
    pub fn flip(&self) -> CompareOp {
        match self {
            CompareOp::Eq => CompareOp::Eq,
            CompareOp::Ne => CompareOp::Ne,
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::Gte => CompareOp::Lte,
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::Lte => CompareOp::Gte,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
        }
    }

    /// Applies the operator to a field value and a constant.
    pub fn matches(&self, field_value: &Value, operand: &Value) -> bool {
        match self {
            CompareOp::Eq => matches_eq(field_value, operand),
            CompareOp::Ne => !matches_eq(field_value, operand),
            _ => self
                .comparison()
                .map_or(false, |c| matches_comparison(field_value, c, operand)),
        }
    }
}

/// Library helper functions a predicate may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    /// Value equality through a wrapper: `value_equals(a, b)` means `a == b`.
    ValueEquals,
}

impl Display for Function {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Function::ValueEquals => write!(f, "value_equals"),
        }
    }
}

/// Tagged-variant expression tree of a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Always true.
    All,
    Compare {
        op: CompareOp,
        left: Operand,
        right: Operand,
    },
    In {
        operand: Operand,
        values: Vec<Value>,
    },
    NotIn {
        operand: Operand,
        values: Vec<Value>,
    },
    Regex {
        operand: Operand,
        pattern: TextPattern,
    },
    Call {
        function: Function,
        args: Vec<Operand>,
    },
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
}

/// A comparison reduced to one of its two evaluable shapes.
pub enum Oriented<'a> {
    /// A member compared with a constant, member on the left.
    Member {
        member: &'a Operand,
        op: CompareOp,
        value: &'a Value,
    },
    /// Two constants, decidable without looking at any entity.
    Constants(bool),
}

/// Puts a comparison into member-on-the-left form.
///
/// # Errors
///
/// [ErrorKind::FilterError] when both sides are members: comparisons between two
/// fields cannot be expressed as a document filter.
pub fn orient<'a>(op: CompareOp, left: &'a Operand, right: &'a Operand) -> RepoResult<Oriented<'a>> {
    match (left, right) {
        (Operand::Constant(a), Operand::Constant(b)) => Ok(Oriented::Constants(op.matches(a, b))),
        (member, Operand::Constant(value)) => Ok(Oriented::Member { member, op, value }),
        (Operand::Constant(value), member) => Ok(Oriented::Member {
            member,
            op: op.flip(),
            value,
        }),
        _ => {
            log::error!("Comparison between {} and {} is not supported", left, right);
            Err(RepoError::new(
                &format!(
                    "Comparison between two fields ({} {} {}) is not supported",
                    left,
                    op.symbol(),
                    right
                ),
                ErrorKind::FilterError,
            ))
        }
    }
}

/// Arguments of a `value_equals` call.
pub fn value_equals_args(args: &[Operand]) -> RepoResult<(&Operand, &Operand)> {
    match args {
        [left, right] => Ok((left, right)),
        _ => {
            log::error!("value_equals expects 2 arguments, got {}", args.len());
            Err(RepoError::new(
                &format!("value_equals expects 2 arguments, got {}", args.len()),
                ErrorKind::FilterError,
            ))
        }
    }
}

/// Evaluates a membership test on a constant operand.
pub fn constant_in(value: &Value, values: &[Value]) -> bool {
    matches_in(value, values)
}

/// Evaluates a regular expression test on any value.
pub fn regex_matches(value: &Value, pattern: &TextPattern) -> RepoResult<bool> {
    pattern.matches(value)
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::All => write!(f, "true"),
            Expr::Compare { op, left, right } => write!(f, "{} {} {}", left, op.symbol(), right),
            Expr::In { operand, values } => write!(f, "{} in [{}]", operand, values.iter().join(", ")),
            Expr::NotIn { operand, values } => {
                write!(f, "{} not in [{}]", operand, values.iter().join(", "))
            }
            Expr::Regex { operand, pattern } => write!(f, "{} =~ /{}/", operand, pattern),
            Expr::Call { function, args } => write!(f, "{}({})", function, args.iter().join(", ")),
            Expr::And(exprs) => write!(f, "({})", exprs.iter().join(" && ")),
            Expr::Or(exprs) => write!(f, "({})", exprs.iter().join(" || ")),
            Expr::Not(expr) => write!(f, "!({})", expr),
        }
    }
}
