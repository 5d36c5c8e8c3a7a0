//! Arithmetic Evaluation
//!
//! Evaluates [`ArithExpr`] trees against the shell state. Values are
//! `i64`; addition, subtraction and multiplication wrap in two's
//! complement; division and modulo by zero raise [`ArithError`].
//! Assignments and `++`/`--` write through to shell variables.

use thiserror::Error;

use crate::ast::{ArithAssignOp, ArithBinaryOp, ArithExpr, ArithUnaryOp};
use crate::state::ShellState;

#[derive(Debug, Clone, Error)]
pub enum ArithError {
    #[error("division by zero")]
    DivideByZero,
    #[error("exponent less than 0")]
    NegativeExponent,
    #[error("{0}: readonly variable")]
    ReadonlyVariable(String),
}

/// Evaluate an expression, with side effects applied to `state`.
pub fn eval(state: &mut ShellState, expr: &ArithExpr) -> Result<i64, ArithError> {
    match expr {
        ArithExpr::Number(n) => Ok(*n),
        ArithExpr::Variable(name) => Ok(lookup(state, name)),
        ArithExpr::Group(inner) => eval(state, inner),

        ArithExpr::Unary {
            op,
            operand,
            prefix,
        } => match op {
            ArithUnaryOp::Neg => Ok(eval(state, operand)?.wrapping_neg()),
            ArithUnaryOp::Pos => eval(state, operand),
            ArithUnaryOp::Not => Ok((eval(state, operand)? == 0) as i64),
            ArithUnaryOp::BitNot => Ok(!eval(state, operand)?),
            ArithUnaryOp::Inc | ArithUnaryOp::Dec => {
                let name = match operand.as_ref() {
                    ArithExpr::Variable(name) => name.clone(),
                    // The parser only allows variables here.
                    _ => return Ok(0),
                };
                let old = lookup(state, &name);
                let delta = if *op == ArithUnaryOp::Inc { 1 } else { -1 };
                let new = old.wrapping_add(delta);
                assign(state, &name, new)?;
                Ok(if *prefix { new } else { old })
            }
        },

        ArithExpr::Binary { op, left, right } => match op {
            ArithBinaryOp::LogAnd => {
                if eval(state, left)? == 0 {
                    Ok(0)
                } else {
                    Ok((eval(state, right)? != 0) as i64)
                }
            }
            ArithBinaryOp::LogOr => {
                if eval(state, left)? != 0 {
                    Ok(1)
                } else {
                    Ok((eval(state, right)? != 0) as i64)
                }
            }
            ArithBinaryOp::Comma => {
                eval(state, left)?;
                eval(state, right)
            }
            _ => {
                let l = eval(state, left)?;
                let r = eval(state, right)?;
                apply_binary(*op, l, r)
            }
        },

        ArithExpr::Ternary {
            condition,
            consequent,
            alternate,
        } => {
            if eval(state, condition)? != 0 {
                eval(state, consequent)
            } else {
                eval(state, alternate)
            }
        }

        ArithExpr::Assignment { op, name, value } => {
            let rhs = eval(state, value)?;
            let result = match op {
                ArithAssignOp::Assign => rhs,
                _ => {
                    let current = lookup(state, name);
                    apply_binary(assign_to_binary(*op), current, rhs)?
                }
            };
            assign(state, name, result)?;
            Ok(result)
        }
    }
}

fn assign_to_binary(op: ArithAssignOp) -> ArithBinaryOp {
    match op {
        ArithAssignOp::Assign => unreachable!("plain assignment handled by caller"),
        ArithAssignOp::Add => ArithBinaryOp::Add,
        ArithAssignOp::Sub => ArithBinaryOp::Sub,
        ArithAssignOp::Mul => ArithBinaryOp::Mul,
        ArithAssignOp::Div => ArithBinaryOp::Div,
        ArithAssignOp::Mod => ArithBinaryOp::Mod,
        ArithAssignOp::Shl => ArithBinaryOp::Shl,
        ArithAssignOp::Shr => ArithBinaryOp::Shr,
        ArithAssignOp::And => ArithBinaryOp::BitAnd,
        ArithAssignOp::Or => ArithBinaryOp::BitOr,
        ArithAssignOp::Xor => ArithBinaryOp::BitXor,
    }
}

fn apply_binary(op: ArithBinaryOp, l: i64, r: i64) -> Result<i64, ArithError> {
    Ok(match op {
        ArithBinaryOp::Add => l.wrapping_add(r),
        ArithBinaryOp::Sub => l.wrapping_sub(r),
        ArithBinaryOp::Mul => l.wrapping_mul(r),
        ArithBinaryOp::Div => {
            if r == 0 {
                return Err(ArithError::DivideByZero);
            }
            l.wrapping_div(r)
        }
        ArithBinaryOp::Mod => {
            if r == 0 {
                return Err(ArithError::DivideByZero);
            }
            l.wrapping_rem(r)
        }
        ArithBinaryOp::Pow => {
            if r < 0 {
                return Err(ArithError::NegativeExponent);
            }
            let mut result: i64 = 1;
            let mut base = l;
            let mut exp = r as u64;
            while exp > 0 {
                if exp & 1 == 1 {
                    result = result.wrapping_mul(base);
                }
                base = base.wrapping_mul(base);
                exp >>= 1;
            }
            result
        }
        ArithBinaryOp::Shl => l.wrapping_shl((r & 63) as u32),
        ArithBinaryOp::Shr => l.wrapping_shr((r & 63) as u32),
        ArithBinaryOp::Lt => (l < r) as i64,
        ArithBinaryOp::Le => (l <= r) as i64,
        ArithBinaryOp::Gt => (l > r) as i64,
        ArithBinaryOp::Ge => (l >= r) as i64,
        ArithBinaryOp::Eq => (l == r) as i64,
        ArithBinaryOp::Ne => (l != r) as i64,
        ArithBinaryOp::BitAnd => l & r,
        ArithBinaryOp::BitOr => l | r,
        ArithBinaryOp::BitXor => l ^ r,
        ArithBinaryOp::LogAnd | ArithBinaryOp::LogOr | ArithBinaryOp::Comma => {
            unreachable!("short-circuit operators handled by caller")
        }
    })
}

/// Variables in arithmetic contexts: unset or non-numeric reads as 0.
fn lookup(state: &mut ShellState, name: &str) -> i64 {
    if let Some(value) = state.dynamic_value(name) {
        return value.trim().parse().unwrap_or(0);
    }
    state
        .env
        .value(name)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

fn assign(state: &mut ShellState, name: &str, value: i64) -> Result<(), ArithError> {
    state
        .assign(name, &value.to_string())
        .map_err(|e| ArithError::ReadonlyVariable(e.name))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::arith::parse;

    fn eval_text(state: &mut ShellState, text: &str) -> Result<i64, ArithError> {
        eval(state, &parse(text).unwrap())
    }

    fn fresh() -> ShellState {
        ShellState::new("den")
    }

    #[test]
    fn basic_arithmetic() {
        let mut state = fresh();
        assert_eq!(eval_text(&mut state, "1 + 2 * 3").unwrap(), 7);
        assert_eq!(eval_text(&mut state, "(1 + 2) * 3").unwrap(), 9);
        assert_eq!(eval_text(&mut state, "7 / 2").unwrap(), 3);
        assert_eq!(eval_text(&mut state, "-7 / 2").unwrap(), -3);
        assert_eq!(eval_text(&mut state, "7 % 3").unwrap(), 1);
        assert_eq!(eval_text(&mut state, "2 ** 10").unwrap(), 1024);
    }

    #[test]
    fn division_by_zero_is_error() {
        let mut state = fresh();
        assert!(matches!(
            eval_text(&mut state, "1 / 0"),
            Err(ArithError::DivideByZero)
        ));
        assert!(matches!(
            eval_text(&mut state, "1 % 0"),
            Err(ArithError::DivideByZero)
        ));
    }

    #[test]
    fn wrapping_addition() {
        let mut state = fresh();
        state.assign("BIG", &i64::MAX.to_string()).unwrap();
        assert_eq!(eval_text(&mut state, "BIG + 1").unwrap(), i64::MIN);
    }

    #[test]
    fn comparisons_and_logic() {
        let mut state = fresh();
        assert_eq!(eval_text(&mut state, "3 < 5").unwrap(), 1);
        assert_eq!(eval_text(&mut state, "3 >= 5").unwrap(), 0);
        assert_eq!(eval_text(&mut state, "1 && 2").unwrap(), 1);
        assert_eq!(eval_text(&mut state, "0 || 0").unwrap(), 0);
        assert_eq!(eval_text(&mut state, "!5").unwrap(), 0);
        // Short-circuit: the divide never runs.
        assert_eq!(eval_text(&mut state, "0 && (1 / 0)").unwrap(), 0);
    }

    #[test]
    fn assignment_writes_variable() {
        let mut state = fresh();
        assert_eq!(eval_text(&mut state, "x = 5").unwrap(), 5);
        assert_eq!(state.env.value("x"), Some("5"));
        assert_eq!(eval_text(&mut state, "x += 3").unwrap(), 8);
        assert_eq!(state.env.value("x"), Some("8"));
    }

    #[test]
    fn increments() {
        let mut state = fresh();
        state.assign("n", "5").unwrap();
        assert_eq!(eval_text(&mut state, "n++").unwrap(), 5);
        assert_eq!(state.env.value("n"), Some("6"));
        assert_eq!(eval_text(&mut state, "++n").unwrap(), 7);
        assert_eq!(eval_text(&mut state, "--n").unwrap(), 6);
    }

    #[test]
    fn unset_variable_reads_zero() {
        let mut state = fresh();
        assert_eq!(eval_text(&mut state, "nosuch + 1").unwrap(), 1);
    }

    #[test]
    fn ternary_is_lazy() {
        let mut state = fresh();
        assert_eq!(eval_text(&mut state, "1 ? 10 : (1 / 0)").unwrap(), 10);
        assert_eq!(eval_text(&mut state, "0 ? (1 / 0) : 20").unwrap(), 20);
    }

    #[test]
    fn readonly_assignment_fails() {
        let mut state = fresh();
        state.assign("r", "1").unwrap();
        state.env.mark_readonly("r");
        assert!(matches!(
            eval_text(&mut state, "r = 2"),
            Err(ArithError::ReadonlyVariable(_))
        ));
    }

    #[test]
    fn shifts_and_bits() {
        let mut state = fresh();
        assert_eq!(eval_text(&mut state, "1 << 4").unwrap(), 16);
        assert_eq!(eval_text(&mut state, "256 >> 4").unwrap(), 16);
        assert_eq!(eval_text(&mut state, "6 & 3").unwrap(), 2);
        assert_eq!(eval_text(&mut state, "6 | 3").unwrap(), 7);
        assert_eq!(eval_text(&mut state, "6 ^ 3").unwrap(), 5);
        assert_eq!(eval_text(&mut state, "~0").unwrap(), -1);
    }

    #[test]
    fn comma_evaluates_left_to_right() {
        let mut state = fresh();
        assert_eq!(eval_text(&mut state, "x = 1, x + 10").unwrap(), 11);
    }
}
