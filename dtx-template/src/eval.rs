//! Expression evaluation over the closed grammar in `dtx_directive::Expr`.
//!
//! There is no construct in the grammar that can reach host code — no
//! object literals, no calls, no `this`-capturing closures — so evaluation
//! can never do anything but read values out of the active [`Scope`] and
//! combine them arithmetically. Arithmetic follows IEEE-754 semantics:
//! dividing by zero yields `Infinity`/`-Infinity`/`NaN`, never a panic.

use crate::scope::Scope;
use crate::value::Value;
use dtx_directive::{BinaryOp, Expr, UnaryOp};

pub fn eval(expr: &Expr, scope: &Scope) -> Value {
    match expr {
        Expr::Null => Value::Null,
        Expr::Bool(b) => Value::Bool(*b),
        Expr::Number(n) => Value::Number(*n),
        Expr::Str(s) => Value::Str(s.clone()),
        Expr::Path(path) => scope.resolve(path),
        Expr::Unary(op, inner, _) => eval_unary(*op, eval(inner, scope)),
        Expr::Binary(op, lhs, rhs, _) => eval_binary(*op, lhs, rhs, scope),
    }
}

fn eval_unary(op: UnaryOp, operand: Value) -> Value {
    match op {
        UnaryOp::Not => Value::Bool(!operand.is_truthy()),
        UnaryOp::Neg => Value::Number(-operand.to_number()),
    }
}

fn eval_binary(op: BinaryOp, lhs: &Expr, rhs: &Expr, scope: &Scope) -> Value {
    // `&&`/`||` short-circuit: the right side is only evaluated if needed.
    match op {
        BinaryOp::And => {
            let l = eval(lhs, scope);
            if !l.is_truthy() {
                return l;
            }
            return eval(rhs, scope);
        }
        BinaryOp::Or => {
            let l = eval(lhs, scope);
            if l.is_truthy() {
                return l;
            }
            return eval(rhs, scope);
        }
        _ => {}
    }

    let l = eval(lhs, scope);
    let r = eval(rhs, scope);

    match op {
        BinaryOp::Add => add(&l, &r),
        BinaryOp::Sub => Value::Number(l.to_number() - r.to_number()),
        BinaryOp::Mul => Value::Number(l.to_number() * r.to_number()),
        BinaryOp::Div => Value::Number(l.to_number() / r.to_number()),
        BinaryOp::Mod => Value::Number(l.to_number() % r.to_number()),
        BinaryOp::Eq => Value::Bool(l.weak_eq(&r)),
        BinaryOp::NotEq => Value::Bool(!l.weak_eq(&r)),
        BinaryOp::StrictEq => Value::Bool(l.strict_eq(&r)),
        BinaryOp::StrictNotEq => Value::Bool(!l.strict_eq(&r)),
        BinaryOp::Lt => Value::Bool(compare(&l, &r) == Some(std::cmp::Ordering::Less)),
        BinaryOp::Le => Value::Bool(matches!(
            compare(&l, &r),
            Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)
        )),
        BinaryOp::Gt => Value::Bool(compare(&l, &r) == Some(std::cmp::Ordering::Greater)),
        BinaryOp::Ge => Value::Bool(matches!(
            compare(&l, &r),
            Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)
        )),
        BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
    }
}

/// `+` concatenates when either side is a string, otherwise adds
/// numerically — the one operator whose behavior depends on operand kind.
fn add(l: &Value, r: &Value) -> Value {
    match (l.strip_styling(), r.strip_styling()) {
        (Value::Str(_), _) | (_, Value::Str(_)) => {
            Value::Str(format!("{}{}", l.to_display_string(), r.to_display_string()))
        }
        _ => Value::Number(l.to_number() + r.to_number()),
    }
}

fn compare(l: &Value, r: &Value) -> Option<std::cmp::Ordering> {
    match (l.strip_styling(), r.strip_styling()) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => l.to_number().partial_cmp(&r.to_number()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Record;

    fn scope() -> Scope {
        Scope::new(Record::new())
    }

    #[test]
    fn arithmetic_matches_ieee754_semantics() {
        let zero = Expr::Number(0.0);
        let one = Expr::Number(1.0);
        let v = eval_binary(BinaryOp::Div, &one, &zero, &scope());
        assert_eq!(v, Value::Number(f64::INFINITY));
    }

    #[test]
    fn string_concatenation_via_plus() {
        let a = Expr::Str("foo".into());
        let b = Expr::Number(1.0);
        let v = eval_binary(BinaryOp::Add, &a, &b, &scope());
        assert_eq!(v, Value::Str("foo1".into()));
    }

    #[test]
    fn logical_and_short_circuits() {
        let scope = scope();
        let v = eval(
            &Expr::Binary(
                BinaryOp::And,
                Box::new(Expr::Bool(false)),
                Box::new(Expr::Number(f64::NAN)),
                0..0,
            ),
            &scope,
        );
        assert_eq!(v, Value::Bool(false));
    }

    #[test]
    fn weak_vs_strict_equality() {
        let s = scope();
        let weak = eval_binary(BinaryOp::Eq, &Expr::Number(1.0), &Expr::Str("1".into()), &s);
        let strict = eval_binary(
            BinaryOp::StrictEq,
            &Expr::Number(1.0),
            &Expr::Str("1".into()),
            &s,
        );
        assert_eq!(weak, Value::Bool(true));
        assert_eq!(strict, Value::Bool(false));
    }
}
