use crate::common::{TextPattern, Value};
use crate::predicate::{CompareOp, EqualityNormalizer, Expr, ExprRewriter, Function, Operand};
use std::fmt::{Debug, Display, Formatter};
use std::marker::PhantomData;

/// A typed boolean expression over one entity of type `T`.
///
/// A predicate is pure data: an [Expr] tree whose leaves name mapped members of `T`
/// or captured constants. The in-memory backend evaluates it directly; the live
/// backend normalizes and translates it into a store filter.
///
/// Predicates are built with the fluent API rooted at [field], [id] and
/// [constant], and combined with [Predicate::and], [Predicate::or],
/// [Predicate::not] or the `&`, `|` and `!` operators.
///
/// # Examples
///
/// ```rust,ignore
/// use docrepo::predicate::{field, id};
///
/// let recent = field::<Post>("counter").gt(10) & field("text").text_regex("^re");
/// let one = id::<Post>().eq(post.id);
/// ```
pub struct Predicate<T> {
    expr: Expr,
    _marker: PhantomData<fn(&T) -> bool>,
}

impl<T> Predicate<T> {
    /// Wraps an expression tree.
    pub fn new(expr: Expr) -> Self {
        Predicate {
            expr,
            _marker: PhantomData,
        }
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn into_expr(self) -> Expr {
        self.expr
    }

    /// Checks whether this predicate matches every entity.
    pub fn is_all(&self) -> bool {
        self.expr == Expr::All
    }

    /// Creates a predicate matching only when both predicates match.
    ///
    /// Nested conjunctions are flattened.
    pub fn and(self, other: Predicate<T>) -> Predicate<T> {
        let mut exprs = Vec::new();
        for expr in [self.expr, other.expr] {
            match expr {
                Expr::And(inner) => exprs.extend(inner),
                other => exprs.push(other),
            }
        }
        Predicate::new(Expr::And(exprs))
    }

    /// Creates a predicate matching when either predicate matches.
    ///
    /// Nested disjunctions are flattened.
    pub fn or(self, other: Predicate<T>) -> Predicate<T> {
        let mut exprs = Vec::new();
        for expr in [self.expr, other.expr] {
            match expr {
                Expr::Or(inner) => exprs.extend(inner),
                other => exprs.push(other),
            }
        }
        Predicate::new(Expr::Or(exprs))
    }

    /// Creates the negation of this predicate.
    pub fn not(self) -> Predicate<T> {
        Predicate::new(Expr::Not(Box::new(self.expr)))
    }

    /// Returns the expression with every helper-equality call replaced by a plain
    /// equality comparison.
    pub fn normalized(&self) -> Expr {
        EqualityNormalizer.rewrite(&self.expr)
    }
}

impl<T> Clone for Predicate<T> {
    fn clone(&self) -> Self {
        Predicate::new(self.expr.clone())
    }
}

impl<T> Debug for Predicate<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Predicate({})", self.expr)
    }
}

impl<T> Display for Predicate<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.expr)
    }
}

impl<T> PartialEq for Predicate<T> {
    fn eq(&self, other: &Self) -> bool {
        self.expr == other.expr
    }
}

impl<T> std::ops::BitAnd for Predicate<T> {
    type Output = Predicate<T>;

    fn bitand(self, rhs: Self) -> Self::Output {
        self.and(rhs)
    }
}

impl<T> std::ops::BitOr for Predicate<T> {
    type Output = Predicate<T>;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.or(rhs)
    }
}

impl<T> std::ops::Not for Predicate<T> {
    type Output = Predicate<T>;

    fn not(self) -> Self::Output {
        Predicate::not(self)
    }
}

/// One side of a predicate comparison: a member of `T` or a constant.
///
/// Obtained from [field], [id] or [constant].
pub struct FluentField<T> {
    operand: Operand,
    _marker: PhantomData<fn(&T) -> bool>,
}

impl<T> FluentField<T> {
    fn new(operand: Operand) -> Self {
        FluentField {
            operand,
            _marker: PhantomData,
        }
    }

    pub fn operand(&self) -> &Operand {
        &self.operand
    }

    fn compare_value<V: Into<Value>>(self, op: CompareOp, value: V) -> Predicate<T> {
        Predicate::new(Expr::Compare {
            op,
            left: self.operand,
            right: Operand::Constant(value.into()),
        })
    }

    /// Creates an equality predicate.
    ///
    /// When the member holds an array and `value` is not an array, the predicate
    /// matches if any element equals `value`.
    ///
    /// # Arguments
    ///
    /// * `value` - The value to compare against.
    ///
    /// # Returns
    ///
    /// A predicate that matches when the member equals `value`.
    pub fn eq<V: Into<Value>>(self, value: V) -> Predicate<T> {
        self.compare_value(CompareOp::Eq, value)
    }

    /// Creates a not-equal predicate, the negation of [FluentField::eq].
    pub fn ne<V: Into<Value>>(self, value: V) -> Predicate<T> {
        self.compare_value(CompareOp::Ne, value)
    }

    /// Creates a greater-than predicate.
    ///
    /// Values of a different type class never match.
    ///
    /// # Arguments
    ///
    /// * `value` - The value to compare against.
    ///
    /// # Returns
    ///
    /// A predicate that matches when the member is greater than `value`.
    pub fn gt<V: Into<Value>>(self, value: V) -> Predicate<T> {
        self.compare_value(CompareOp::Gt, value)
    }

    /// Creates a greater-than-or-equal predicate.
    pub fn gte<V: Into<Value>>(self, value: V) -> Predicate<T> {
        self.compare_value(CompareOp::Gte, value)
    }

    /// Creates a less-than predicate.
    pub fn lt<V: Into<Value>>(self, value: V) -> Predicate<T> {
        self.compare_value(CompareOp::Lt, value)
    }

    /// Creates a less-than-or-equal predicate.
    pub fn lte<V: Into<Value>>(self, value: V) -> Predicate<T> {
        self.compare_value(CompareOp::Lte, value)
    }

    /// Compares this side with another side of the predicate.
    ///
    /// Comparing two members is representable but fails with
    /// [crate::errors::ErrorKind::FilterError] when evaluated or translated.
    pub fn compare(self, op: CompareOp, other: FluentField<T>) -> Predicate<T> {
        Predicate::new(Expr::Compare {
            op,
            left: self.operand,
            right: other.operand,
        })
    }

    /// Creates an in-array predicate.
    ///
    /// # Arguments
    ///
    /// * `values` - The candidate values.
    ///
    /// # Returns
    ///
    /// A predicate that matches when the member equals any of `values`.
    pub fn in_array<V: Into<Value>>(self, values: Vec<V>) -> Predicate<T> {
        Predicate::new(Expr::In {
            operand: self.operand,
            values: values.into_iter().map(Into::into).collect(),
        })
    }

    /// Creates a not-in-array predicate, the negation of [FluentField::in_array].
    pub fn not_in_array<V: Into<Value>>(self, values: Vec<V>) -> Predicate<T> {
        Predicate::new(Expr::NotIn {
            operand: self.operand,
            values: values.into_iter().map(Into::into).collect(),
        })
    }

    /// Creates a regular expression predicate over a text member.
    ///
    /// # Arguments
    ///
    /// * `pattern` - A pattern in `regex` crate syntax.
    ///
    /// # Returns
    ///
    /// A predicate that matches when the member, or any string element of an array
    /// member, matches `pattern`. Non-text values never match.
    pub fn text_regex(self, pattern: &str) -> Predicate<T> {
        Predicate::new(Expr::Regex {
            operand: self.operand,
            pattern: TextPattern::new(pattern),
        })
    }
}

impl<T> Clone for FluentField<T> {
    fn clone(&self) -> Self {
        FluentField::new(self.operand.clone())
    }
}

/// Starts a predicate over the mapped member named `name`.
pub fn field<T>(name: &str) -> FluentField<T> {
    FluentField::new(Operand::Field(name.to_string()))
}

/// Starts a predicate over the identifier member of `T`.
pub fn id<T>() -> FluentField<T> {
    FluentField::new(Operand::Id)
}

/// A constant operand, for comparisons written constant-first.
pub fn constant<T, V: Into<Value>>(value: V) -> FluentField<T> {
    FluentField::new(Operand::Constant(value.into()))
}

/// Equality through the library helper, `value_equals(left, right)`.
///
/// Backends that cannot translate the helper receive it normalized to a plain
/// equality comparison.
pub fn value_equals<T>(left: FluentField<T>, right: FluentField<T>) -> Predicate<T> {
    Predicate::new(Expr::Call {
        function: Function::ValueEquals,
        args: vec![left.operand, right.operand],
    })
}

/// A predicate matching every entity.
pub fn all<T>() -> Predicate<T> {
    Predicate::new(Expr::All)
}

/// Conjunction of all `predicates`. An empty list matches everything.
pub fn and<T>(predicates: Vec<Predicate<T>>) -> Predicate<T> {
    if predicates.is_empty() {
        return all();
    }
    Predicate::new(Expr::And(predicates.into_iter().map(|p| p.expr).collect()))
}

/// Disjunction of all `predicates`. An empty list matches nothing.
pub fn or<T>(predicates: Vec<Predicate<T>>) -> Predicate<T> {
    Predicate::new(Expr::Or(predicates.into_iter().map(|p| p.expr).collect()))
}

pub fn not<T>(predicate: Predicate<T>) -> Predicate<T> {
    predicate.not()
}

/// Matches the entity whose identifier equals `id_value`.
pub fn by_id<T, V: Into<Value>>(id_value: V) -> Predicate<T> {
    id::<T>().eq(id_value)
}

/// Matches entities whose identifier is one of `ids`.
pub fn id_in<T, V: Into<Value>>(ids: Vec<V>) -> Predicate<T> {
    id::<T>().in_array(ids)
}
