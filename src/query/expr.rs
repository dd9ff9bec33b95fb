//! Expressions
//!
//! `Expr` is an open trait: anything that can produce a value from an
//! `EvalStack` is an expression. The shape hooks (`as_comparison`,
//! `as_and`, `as_field`, `is_constant`) let the optimizer inspect a WHERE
//! clause without knowing every node type.
//!
//! Missing fields: a field selector fails with `AERO_FIELD_NOT_FOUND`.
//! Comparisons turn that into `false`; every other node propagates it.

use std::fmt;

use crate::document::{FieldPath, Value};
use crate::errors::{DbError, DbResult};

use super::stack::EvalStack;

pub type BoxExpr = Box<dyn Expr>;

pub trait Expr: fmt::Debug + fmt::Display {
    fn eval(&self, stack: &EvalStack<'_>) -> DbResult<Value>;

    fn as_comparison(&self) -> Option<&Comparison> {
        None
    }

    fn as_and(&self) -> Option<&And> {
        None
    }

    fn as_field(&self) -> Option<&FieldPath> {
        None
    }

    /// True when the value does not depend on the current document
    fn is_constant(&self) -> bool {
        false
    }
}

/// Constant value
#[derive(Debug, Clone, PartialEq)]
pub struct Literal(pub Value);

impl Expr for Literal {
    fn eval(&self, _stack: &EvalStack<'_>) -> DbResult<Value> {
        Ok(self.0.clone())
    }

    fn is_constant(&self) -> bool {
        true
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reads a value from the current document
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSelector(pub FieldPath);

impl Expr for FieldSelector {
    fn eval(&self, stack: &EvalStack<'_>) -> DbResult<Value> {
        match stack.document {
            Some(doc) => self.0.get_value(doc),
            None => Err(DbError::field_not_found(&self.0)),
        }
    }

    fn as_field(&self) -> Option<&FieldPath> {
        Some(&self.0)
    }
}

impl fmt::Display for FieldSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Statement parameter reference
#[derive(Debug, Clone, PartialEq)]
pub enum ParamRef {
    /// `$1`, `$2`, ... (1-based)
    Positional(usize),
    /// `$name`
    Named(String),
}

impl Expr for ParamRef {
    fn eval(&self, stack: &EvalStack<'_>) -> DbResult<Value> {
        match self {
            ParamRef::Positional(pos) => stack.positional_param(*pos),
            ParamRef::Named(name) => stack.named_param(name),
        }
    }

    fn is_constant(&self) -> bool {
        true
    }
}

impl fmt::Display for ParamRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamRef::Positional(pos) => write!(f, "${}", pos),
            ParamRef::Named(name) => write!(f, "${}", name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CmpOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Neq => "!=",
            CmpOp::Gt => ">",
            CmpOp::Gte => ">=",
            CmpOp::Lt => "<",
            CmpOp::Lte => "<=",
        }
    }

    /// The operator seen from the other side: `a < b` is `b > a`
    pub fn flip(&self) -> CmpOp {
        match self {
            CmpOp::Gt => CmpOp::Lt,
            CmpOp::Gte => CmpOp::Lte,
            CmpOp::Lt => CmpOp::Gt,
            CmpOp::Lte => CmpOp::Gte,
            other => *other,
        }
    }
}

#[derive(Debug)]
pub struct Comparison {
    op: CmpOp,
    left: BoxExpr,
    right: BoxExpr,
}

impl Comparison {
    pub fn new(op: CmpOp, left: BoxExpr, right: BoxExpr) -> Self {
        Self { op, left, right }
    }

    pub fn op(&self) -> CmpOp {
        self.op
    }

    pub fn left(&self) -> &dyn Expr {
        self.left.as_ref()
    }

    pub fn right(&self) -> &dyn Expr {
        self.right.as_ref()
    }
}

impl Expr for Comparison {
    fn eval(&self, stack: &EvalStack<'_>) -> DbResult<Value> {
        let left = match self.left.eval(stack) {
            Err(err) if err.is_field_not_found() => return Ok(Value::Bool(false)),
            other => other?,
        };
        let right = match self.right.eval(stack) {
            Err(err) if err.is_field_not_found() => return Ok(Value::Bool(false)),
            other => other?,
        };

        let ord = left.compare(&right);
        let result = match self.op {
            CmpOp::Eq => ord == Some(std::cmp::Ordering::Equal),
            CmpOp::Neq => ord != Some(std::cmp::Ordering::Equal),
            CmpOp::Gt => ord == Some(std::cmp::Ordering::Greater),
            CmpOp::Gte => matches!(
                ord,
                Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)
            ),
            CmpOp::Lt => ord == Some(std::cmp::Ordering::Less),
            CmpOp::Lte => matches!(
                ord,
                Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)
            ),
        };
        Ok(Value::Bool(result))
    }

    fn as_comparison(&self) -> Option<&Comparison> {
        Some(self)
    }

    fn is_constant(&self) -> bool {
        self.left.is_constant() && self.right.is_constant()
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.left, self.op.as_str(), self.right)
    }
}

#[derive(Debug)]
pub struct And {
    left: BoxExpr,
    right: BoxExpr,
}

impl And {
    pub fn left(&self) -> &dyn Expr {
        self.left.as_ref()
    }

    pub fn right(&self) -> &dyn Expr {
        self.right.as_ref()
    }
}

impl Expr for And {
    fn eval(&self, stack: &EvalStack<'_>) -> DbResult<Value> {
        if !self.left.eval(stack)?.is_truthy() {
            return Ok(Value::Bool(false));
        }
        Ok(Value::Bool(self.right.eval(stack)?.is_truthy()))
    }

    fn as_and(&self) -> Option<&And> {
        Some(self)
    }

    fn is_constant(&self) -> bool {
        self.left.is_constant() && self.right.is_constant()
    }
}

impl fmt::Display for And {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} AND {})", self.left, self.right)
    }
}

#[derive(Debug)]
pub struct Or {
    left: BoxExpr,
    right: BoxExpr,
}

impl Expr for Or {
    fn eval(&self, stack: &EvalStack<'_>) -> DbResult<Value> {
        if self.left.eval(stack)?.is_truthy() {
            return Ok(Value::Bool(true));
        }
        Ok(Value::Bool(self.right.eval(stack)?.is_truthy()))
    }

    fn is_constant(&self) -> bool {
        self.left.is_constant() && self.right.is_constant()
    }
}

impl fmt::Display for Or {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} OR {})", self.left, self.right)
    }
}

#[derive(Debug)]
pub struct Not(BoxExpr);

impl Expr for Not {
    fn eval(&self, stack: &EvalStack<'_>) -> DbResult<Value> {
        Ok(Value::Bool(!self.0.eval(stack)?.is_truthy()))
    }

    fn is_constant(&self) -> bool {
        self.0.is_constant()
    }
}

impl fmt::Display for Not {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NOT {}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl ArithOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Mod => "%",
        }
    }
}

/// Numeric arithmetic.
///
/// Integer operations are checked, and a double result must stay finite.
/// Division or modulo by zero and
/// non-numeric operands yield null. Mixed operands are computed as doubles.
#[derive(Debug)]
pub struct Arithmetic {
    op: ArithOp,
    left: BoxExpr,
    right: BoxExpr,
}

impl Arithmetic {
    fn integers(&self, a: i64, b: i64) -> DbResult<Value> {
        let result = match self.op {
            ArithOp::Add => a.checked_add(b),
            ArithOp::Sub => a.checked_sub(b),
            ArithOp::Mul => a.checked_mul(b),
            ArithOp::Div | ArithOp::Mod if b == 0 => return Ok(Value::Null),
            ArithOp::Div => a.checked_div(b),
            ArithOp::Mod => a.checked_rem(b),
        };
        result
            .map(Value::Integer)
            .ok_or_else(|| DbError::arithmetic_overflow(&format!("{} {} {}", a, self.op.as_str(), b)))
    }

    fn doubles(&self, a: f64, b: f64) -> DbResult<Value> {
        let result = match self.op {
            ArithOp::Add => a + b,
            ArithOp::Sub => a - b,
            ArithOp::Mul => a * b,
            ArithOp::Div | ArithOp::Mod if b == 0.0 => return Ok(Value::Null),
            ArithOp::Div => a / b,
            ArithOp::Mod => a % b,
        };
        if !result.is_finite() {
            return Err(DbError::arithmetic_overflow(&format!("{} {} {}", a, self.op.as_str(), b)));
        }
        Ok(Value::Double(result))
    }
}

impl Expr for Arithmetic {
    fn eval(&self, stack: &EvalStack<'_>) -> DbResult<Value> {
        let left = self.left.eval(stack)?;
        let right = self.right.eval(stack)?;

        match (&left, &right) {
            (Value::Integer(a), Value::Integer(b)) => self.integers(*a, *b),
            _ if left.is_number() && right.is_number() => {
                self.doubles(left.convert_to_double()?, right.convert_to_double()?)
            }
            _ => Ok(Value::Null),
        }
    }

    fn is_constant(&self) -> bool {
        self.left.is_constant() && self.right.is_constant()
    }
}

impl fmt::Display for Arithmetic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} {} {})", self.left, self.op.as_str(), self.right)
    }
}

// Builders

pub fn lit(value: impl Into<Value>) -> BoxExpr {
    Box::new(Literal(value.into()))
}

pub fn null() -> BoxExpr {
    Box::new(Literal(Value::Null))
}

/// Field selector from a dotted path
pub fn field(path: &str) -> DbResult<BoxExpr> {
    Ok(Box::new(FieldSelector(FieldPath::parse(path)?)))
}

pub fn param(position: usize) -> BoxExpr {
    Box::new(ParamRef::Positional(position))
}

pub fn named_param(name: impl Into<String>) -> BoxExpr {
    Box::new(ParamRef::Named(name.into()))
}

pub fn cmp(op: CmpOp, left: BoxExpr, right: BoxExpr) -> BoxExpr {
    Box::new(Comparison::new(op, left, right))
}

pub fn eq(left: BoxExpr, right: BoxExpr) -> BoxExpr {
    cmp(CmpOp::Eq, left, right)
}

pub fn neq(left: BoxExpr, right: BoxExpr) -> BoxExpr {
    cmp(CmpOp::Neq, left, right)
}

pub fn gt(left: BoxExpr, right: BoxExpr) -> BoxExpr {
    cmp(CmpOp::Gt, left, right)
}

pub fn gte(left: BoxExpr, right: BoxExpr) -> BoxExpr {
    cmp(CmpOp::Gte, left, right)
}

pub fn lt(left: BoxExpr, right: BoxExpr) -> BoxExpr {
    cmp(CmpOp::Lt, left, right)
}

pub fn lte(left: BoxExpr, right: BoxExpr) -> BoxExpr {
    cmp(CmpOp::Lte, left, right)
}

pub fn and(left: BoxExpr, right: BoxExpr) -> BoxExpr {
    Box::new(And { left, right })
}

pub fn or(left: BoxExpr, right: BoxExpr) -> BoxExpr {
    Box::new(Or { left, right })
}

pub fn not(expr: BoxExpr) -> BoxExpr {
    Box::new(Not(expr))
}

pub fn arith(op: ArithOp, left: BoxExpr, right: BoxExpr) -> BoxExpr {
    Box::new(Arithmetic { op, left, right })
}

/// Splits a predicate into its top-level AND operands
pub fn conjuncts(expr: &dyn Expr) -> Vec<&dyn Expr> {
    match expr.as_and() {
        Some(and) => {
            let mut out = conjuncts(and.left());
            out.extend(conjuncts(and.right()));
            out
        }
        None => vec![expr],
    }
}
