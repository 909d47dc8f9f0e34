use crate::errors::{ErrorKind, RepoError, RepoResult};
use crate::mapping::EntityMapping;
use crate::predicate::{constant_in, orient, regex_matches, CompareOp, Expr, Operand, Oriented};
use crate::store::Filter;

/// Compiles a predicate expression into a native store [Filter].
///
/// Member names are replaced by their document element names. Sub-expressions over
/// constants only are decided here and become [Filter::All] or [Filter::none].
/// Helper-equality calls must be normalized first (see
/// [crate::predicate::Predicate::normalized]).
pub struct FilterTranslator<'a, T> {
    mapping: &'a EntityMapping<T>,
}

impl<'a, T> FilterTranslator<'a, T> {
    pub fn new(mapping: &'a EntityMapping<T>) -> Self {
        FilterTranslator { mapping }
    }

    /// Translates `expr` into a filter.
    ///
    /// # Errors
    ///
    /// [ErrorKind::FilterError] for an unmapped member, a comparison between two
    /// members, an invalid regular expression or a helper call left in the tree.
    pub fn translate(&self, expr: &Expr) -> RepoResult<Filter> {
        let filter = match expr {
            Expr::All => Filter::All,
            Expr::Compare { op, left, right } => match orient(*op, left, right)? {
                Oriented::Constants(result) => constant_filter(result),
                Oriented::Member { member, op, value } => {
                    let element = self.element_name(member)?;
                    match (op, op.comparison()) {
                        (CompareOp::Eq, _) => Filter::Eq(element, value.clone()),
                        (CompareOp::Ne, _) => Filter::Ne(element, value.clone()),
                        (_, Some(comparison)) => Filter::Compare(element, comparison, value.clone()),
                        (_, None) => {
                            return Err(RepoError::new(
                                &format!("Unsupported operator {}", op.symbol()),
                                ErrorKind::InternalError,
                            ))
                        }
                    }
                }
            },
            Expr::In { operand, values } => match operand {
                Operand::Constant(value) => constant_filter(constant_in(value, values)),
                member => Filter::In(self.element_name(member)?, values.clone()),
            },
            Expr::NotIn { operand, values } => match operand {
                Operand::Constant(value) => constant_filter(!constant_in(value, values)),
                member => Filter::Nin(self.element_name(member)?, values.clone()),
            },
            Expr::Regex { operand, pattern } => match operand {
                Operand::Constant(value) => constant_filter(regex_matches(value, pattern)?),
                member => {
                    pattern.regex()?;
                    Filter::Regex(self.element_name(member)?, pattern.clone())
                }
            },
            Expr::Call { function, .. } => {
                log::error!("Cannot translate call to {} into a filter", function);
                return Err(RepoError::new(
                    &format!(
                        "Call to {} cannot be translated into a filter; normalize the predicate first",
                        function
                    ),
                    ErrorKind::FilterError,
                ));
            }
            Expr::And(exprs) => Filter::And(self.translate_all(exprs)?),
            Expr::Or(exprs) => Filter::Or(self.translate_all(exprs)?),
            Expr::Not(inner) => Filter::Not(Box::new(self.translate(inner)?)),
        };
        Ok(filter)
    }

    fn translate_all(&self, exprs: &[Expr]) -> RepoResult<Vec<Filter>> {
        exprs.iter().map(|expr| self.translate(expr)).collect()
    }

    fn element_name(&self, operand: &Operand) -> RepoResult<String> {
        match operand {
            Operand::Field(name) => Ok(self
                .mapping
                .require_field(name, ErrorKind::FilterError)?
                .element_name()
                .to_string()),
            Operand::Id => Ok(self.mapping.id_accessor().element_name().to_string()),
            Operand::Constant(value) => Err(RepoError::new(
                &format!("Constant {} is not a document field", value),
                ErrorKind::InternalError,
            )),
        }
    }
}

fn constant_filter(result: bool) -> Filter {
    if result {
        Filter::All
    } else {
        Filter::none()
    }
}
