use crate::common::{matches_in, Value};
use crate::errors::{ErrorKind, RepoResult};
use crate::mapping::EntityMapping;
use crate::predicate::{orient, regex_matches, value_equals_args, CompareOp, Expr, Operand, Oriented};

/// Evaluates predicate expressions directly against entity instances.
///
/// Members are read through the mapping's getters, so a member compares exactly
/// as its stored document element would.
pub struct PredicateEvaluator<'a, T> {
    mapping: &'a EntityMapping<T>,
}

impl<'a, T> PredicateEvaluator<'a, T> {
    pub fn new(mapping: &'a EntityMapping<T>) -> Self {
        PredicateEvaluator { mapping }
    }

    /// Evaluates `expr` against `entity`.
    ///
    /// # Errors
    ///
    /// [ErrorKind::FilterError] for an unmapped member, a comparison between two
    /// members or an invalid regular expression.
    pub fn evaluate(&self, expr: &Expr, entity: &T) -> RepoResult<bool> {
        match expr {
            Expr::All => Ok(true),
            Expr::Compare { op, left, right } => self.compare(*op, left, right, entity),
            Expr::In { operand, values } => Ok(matches_in(&self.resolve(operand, entity)?, values)),
            Expr::NotIn { operand, values } => {
                Ok(!matches_in(&self.resolve(operand, entity)?, values))
            }
            Expr::Regex { operand, pattern } => {
                regex_matches(&self.resolve(operand, entity)?, pattern)
            }
            Expr::Call { args, .. } => {
                let (left, right) = value_equals_args(args)?;
                self.compare(CompareOp::Eq, left, right, entity)
            }
            Expr::And(exprs) => {
                for expr in exprs {
                    if !self.evaluate(expr, entity)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Expr::Or(exprs) => {
                for expr in exprs {
                    if self.evaluate(expr, entity)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Expr::Not(expr) => Ok(!self.evaluate(expr, entity)?),
        }
    }

    fn compare(&self, op: CompareOp, left: &Operand, right: &Operand, entity: &T) -> RepoResult<bool> {
        match orient(op, left, right)? {
            Oriented::Constants(result) => Ok(result),
            Oriented::Member { member, op, value } => {
                Ok(op.matches(&self.resolve(member, entity)?, value))
            }
        }
    }

    fn resolve(&self, operand: &Operand, entity: &T) -> RepoResult<Value> {
        match operand {
            Operand::Field(name) => self
                .mapping
                .require_field(name, ErrorKind::FilterError)?
                .get(entity),
            Operand::Id => self.mapping.id_value(entity),
            Operand::Constant(value) => Ok(value.clone()),
        }
    }
}
