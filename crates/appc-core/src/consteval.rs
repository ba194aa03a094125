//! C10: Constant evaluator. Folds Go constant expressions (int/float
//! literals, unary/binary arithmetic) to arbitrary precision so integer
//! overflow in the source never silently corrupts a value the later phases
//! depend on, e.g. cache TTL seconds or pagination limits (spec.md §4.10).

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{ToPrimitive, Zero};

use crate::ast::{BinOp, Expr, ExprKind, UnOp};
use crate::diagnostics::{Diagnostic, DiagnosticList};
use crate::source::Position;

#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Int(BigInt),
    Rational(BigRational),
    String(String),
    Bool(bool),
}

impl ConstValue {
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConstValue::Int(i) => i.to_i64(),
            ConstValue::Rational(r) if r.is_integer() => r.to_integer().to_i64(),
            _ => None,
        }
    }
}

/// Evaluates a constant expression tree, reporting and returning `None` on
/// non-constant subexpressions (identifiers referring to non-const
/// bindings, function calls, etc.) rather than aborting the whole pass —
/// callers treat a missing value as "not a compile-time constant" and skip
/// whatever constant-dependent check they were attempting.
pub fn eval(expr: &Expr, position: Position, diags: &mut DiagnosticList) -> Option<ConstValue> {
    match &expr.kind {
        ExprKind::Int(text) => parse_int(text).map(ConstValue::Int).or_else(|| {
            diags.report(Diagnostic::error(position, format!("invalid integer literal {text:?}")));
            None
        }),
        ExprKind::Float(text) => parse_float(text).map(ConstValue::Rational).or_else(|| {
            diags.report(Diagnostic::error(position, format!("invalid float literal {text:?}")));
            None
        }),
        ExprKind::String(s) | ExprKind::RawString(s) => Some(ConstValue::String(s.clone())),
        ExprKind::Bool(b) => Some(ConstValue::Bool(*b)),
        ExprKind::Paren(inner) => eval(inner, position, diags),
        ExprKind::Unary(op, inner) => {
            let v = eval(inner, position, diags)?;
            apply_unary(*op, v, position, diags)
        }
        ExprKind::Binary(op, lhs, rhs) => {
            let l = eval(lhs, position, diags)?;
            let r = eval(rhs, position, diags)?;
            apply_binary(*op, l, r, position, diags)
        }
        _ => None,
    }
}

fn parse_int(text: &str) -> Option<BigInt> {
    let cleaned: String = text.chars().filter(|c| *c != '_').collect();
    if let Some(hex) = cleaned.strip_prefix("0x").or_else(|| cleaned.strip_prefix("0X")) {
        return BigInt::parse_bytes(hex.as_bytes(), 16);
    }
    if let Some(oct) = cleaned.strip_prefix("0o").or_else(|| cleaned.strip_prefix("0O")) {
        return BigInt::parse_bytes(oct.as_bytes(), 8);
    }
    if let Some(bin) = cleaned.strip_prefix("0b").or_else(|| cleaned.strip_prefix("0B")) {
        return BigInt::parse_bytes(bin.as_bytes(), 2);
    }
    cleaned.parse::<BigInt>().ok()
}

fn parse_float(text: &str) -> Option<BigRational> {
    let cleaned: String = text.chars().filter(|c| *c != '_').collect();
    BigRational::from_float(cleaned.parse::<f64>().ok()?)
}

fn apply_unary(op: UnOp, v: ConstValue, position: Position, diags: &mut DiagnosticList) -> Option<ConstValue> {
    match (op, v) {
        (UnOp::Neg, ConstValue::Int(i)) => Some(ConstValue::Int(-i)),
        (UnOp::Neg, ConstValue::Rational(r)) => Some(ConstValue::Rational(-r)),
        (UnOp::Not, ConstValue::Bool(b)) => Some(ConstValue::Bool(!b)),
        (op, v) => {
            diags.report(Diagnostic::error(
                position,
                format!("operator {op:?} not applicable to constant {v:?}"),
            ));
            None
        }
    }
}

fn apply_binary(
    op: BinOp,
    lhs: ConstValue,
    rhs: ConstValue,
    position: Position,
    diags: &mut DiagnosticList,
) -> Option<ConstValue> {
    use BinOp::{Add, And, Div, Eq, Ge, Gt, LAnd, Le, LOr, Lt, Mul, Ne, Or, Rem, Shl, Shr, Sub, Xor};

    let (l, r) = match (lhs, rhs) {
        (ConstValue::Int(a), ConstValue::Int(b)) => (BigRational::from(a), BigRational::from(b)),
        (ConstValue::Rational(a), ConstValue::Rational(b)) => (a, b),
        (ConstValue::Int(a), ConstValue::Rational(b)) => (BigRational::from(a), b),
        (ConstValue::Rational(a), ConstValue::Int(b)) => (a, BigRational::from(b)),
        (ConstValue::Bool(a), ConstValue::Bool(b)) => {
            return match op {
                LAnd => Some(ConstValue::Bool(a && b)),
                LOr => Some(ConstValue::Bool(a || b)),
                Eq => Some(ConstValue::Bool(a == b)),
                Ne => Some(ConstValue::Bool(a != b)),
                _ => {
                    diags.report(Diagnostic::error(position, format!("operator {op:?} not applicable to bool")));
                    None
                }
            };
        }
        (ConstValue::String(a), ConstValue::String(b)) => {
            return match op {
                Add => Some(ConstValue::String(a + &b)),
                Eq => Some(ConstValue::Bool(a == b)),
                Ne => Some(ConstValue::Bool(a != b)),
                _ => {
                    diags.report(Diagnostic::error(position, format!("operator {op:?} not applicable to string")));
                    None
                }
            };
        }
        _ => {
            diags.report(Diagnostic::error(position, "mismatched constant operand types"));
            return None;
        }
    };

    let result = match op {
        Add => l + r,
        Sub => l - r,
        Mul => l * r,
        Div => {
            if r.is_zero() {
                diags.report(Diagnostic::error(position, "division by zero in constant expression"));
                return None;
            }
            l / r
        }
        Rem => {
            if r.is_zero() {
                diags.report(Diagnostic::error(position, "division by zero in constant expression"));
                return None;
            }
            l.to_integer() % r.to_integer()
        }.into(),
        Eq => return Some(ConstValue::Bool(l == r)),
        Ne => return Some(ConstValue::Bool(l != r)),
        Lt => return Some(ConstValue::Bool(l < r)),
        Le => return Some(ConstValue::Bool(l <= r)),
        Gt => return Some(ConstValue::Bool(l > r)),
        Ge => return Some(ConstValue::Bool(l >= r)),
        And | Or | Xor | Shl | Shr => {
            let (Some(a), Some(b)) = (l.to_integer().to_i64(), r.to_integer().to_i64()) else {
                diags.report(Diagnostic::error(position, "bitwise operator operand too large"));
                return None;
            };
            let folded = match op {
                And => a & b,
                Or => a | b,
                Xor => a ^ b,
                Shl => a << b,
                Shr => a >> b,
                _ => unreachable!(),
            };
            return Some(ConstValue::Int(BigInt::from(folded)));
        }
        LAnd | LOr => {
            diags.report(Diagnostic::error(position, "logical operator requires boolean operands"));
            return None;
        }
    };

    if result.is_integer() {
        Some(ConstValue::Int(result.to_integer()))
    } else {
        Some(ConstValue::Rational(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Span;

    fn expr(kind: ExprKind) -> Expr {
        Expr {
            id: 0,
            span: Span::new(0, 0),
            kind,
        }
    }

    fn pos() -> Position {
        Position::new(0, 0, 1, 1)
    }

    #[test]
    fn adds_integer_literals() {
        let e = expr(ExprKind::Binary(
            BinOp::Add,
            Box::new(expr(ExprKind::Int("2".into()))),
            Box::new(expr(ExprKind::Int("3".into()))),
        ));
        let mut diags = DiagnosticList::new(10);
        let v = eval(&e, pos(), &mut diags).unwrap();
        assert_eq!(v, ConstValue::Int(BigInt::from(5)));
    }

    #[test]
    fn hex_literal_parses() {
        let mut diags = DiagnosticList::new(10);
        let v = eval(&expr(ExprKind::Int("0xFF".into())), pos(), &mut diags).unwrap();
        assert_eq!(v.as_i64(), Some(255));
    }

    #[test]
    fn division_by_zero_reports_diagnostic() {
        let e = expr(ExprKind::Binary(
            BinOp::Div,
            Box::new(expr(ExprKind::Int("1".into()))),
            Box::new(expr(ExprKind::Int("0".into()))),
        ));
        let mut diags = DiagnosticList::new(10);
        assert!(eval(&e, pos(), &mut diags).is_none());
        assert!(diags.has_errors());
    }

    #[test]
    fn big_integer_does_not_overflow() {
        let big = "123456789012345678901234567890";
        let mut diags = DiagnosticList::new(10);
        let v = eval(&expr(ExprKind::Int(big.into())), pos(), &mut diags).unwrap();
        assert_eq!(v, ConstValue::Int(big.parse::<BigInt>().unwrap()));
    }
}
