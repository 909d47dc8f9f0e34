use crate::predicate::{CompareOp, Expr, Function, Operand};

/// A structural rewrite pass over an expression tree.
///
/// The default methods rebuild the tree unchanged; implementors override the hook
/// for the node kind they rewrite.
pub trait ExprRewriter {
    fn rewrite(&self, expr: &Expr) -> Expr {
        match expr {
            Expr::And(exprs) => Expr::And(exprs.iter().map(|e| self.rewrite(e)).collect()),
            Expr::Or(exprs) => Expr::Or(exprs.iter().map(|e| self.rewrite(e)).collect()),
            Expr::Not(inner) => Expr::Not(Box::new(self.rewrite(inner))),
            Expr::Call { function, args } => self.rewrite_call(*function, args),
            other => other.clone(),
        }
    }

    fn rewrite_call(&self, function: Function, args: &[Operand]) -> Expr {
        Expr::Call {
            function,
            args: args.to_vec(),
        }
    }
}

/// Replaces `value_equals(a, b)` calls with `a == b`.
pub struct EqualityNormalizer;

impl ExprRewriter for EqualityNormalizer {
    fn rewrite_call(&self, function: Function, args: &[Operand]) -> Expr {
        match (function, args) {
            (Function::ValueEquals, [left, right]) => Expr::Compare {
                op: CompareOp::Eq,
                left: left.clone(),
                right: right.clone(),
            },
            _ => Expr::Call {
                function,
                args: args.to_vec(),
            },
        }
    }
}
