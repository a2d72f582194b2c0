//! Condition expressions of strategy trees.
//!
//! Expressions combine numeric literals and graph statistics (looked up by
//! index in the strategy table's variable list) with arithmetic, comparison
//! and logical operators. Evaluation is typed: arithmetic mixes integers and
//! doubles, comparisons yield booleans, logical operators only accept
//! booleans.

use crate::bipart_error::BipartError;
use crate::Gnum;
use std::cmp::Ordering;
use std::fmt;

/// Value produced by a condition expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TestValue {
    Int(Gnum),
    Double(f64),
    Bool(bool),
}

impl TestValue {
    fn as_f64(self) -> Option<f64> {
        match self {
            TestValue::Int(i) => Some(i as f64),
            TestValue::Double(d) => Some(d),
            TestValue::Bool(_) => None,
        }
    }

    fn type_name(self) -> &'static str {
        match self {
            TestValue::Int(_) => "integer",
            TestValue::Double(_) => "double",
            TestValue::Bool(_) => "boolean",
        }
    }
}

impl fmt::Display for TestValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestValue::Int(i) => write!(f, "{i}"),
            TestValue::Double(d) => write!(f, "{d}"),
            TestValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Mod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Eq,
    Gt,
}

/// Condition expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum StratTest {
    Val(TestValue),
    /// Index into the strategy table's condition variables.
    Var(usize),
    Not(Box<StratTest>),
    And(Box<StratTest>, Box<StratTest>),
    Or(Box<StratTest>, Box<StratTest>),
    Cmp(CmpOp, Box<StratTest>, Box<StratTest>),
    Arith(ArithOp, Box<StratTest>, Box<StratTest>),
}

impl StratTest {
    /// Evaluate with `vars` resolving variable indices.
    pub fn eval(&self, vars: &dyn Fn(usize) -> Option<TestValue>) -> Result<TestValue, BipartError> {
        match self {
            StratTest::Val(v) => Ok(*v),
            StratTest::Var(i) => {
                vars(*i).ok_or_else(|| BipartError::StrategyEval(format!("unknown variable #{i}")))
            }
            StratTest::Not(a) => Ok(TestValue::Bool(!a.eval_bool(vars)?)),
            StratTest::And(a, b) => {
                let l = a.eval_bool(vars)?;
                let r = b.eval_bool(vars)?;
                Ok(TestValue::Bool(l && r))
            }
            StratTest::Or(a, b) => {
                let l = a.eval_bool(vars)?;
                let r = b.eval_bool(vars)?;
                Ok(TestValue::Bool(l || r))
            }
            StratTest::Cmp(op, a, b) => {
                let (l, r) = (a.eval(vars)?, b.eval(vars)?);
                let ord = compare(l, r)?;
                Ok(TestValue::Bool(match op {
                    CmpOp::Lt => ord == Ordering::Less,
                    CmpOp::Eq => ord == Ordering::Equal,
                    CmpOp::Gt => ord == Ordering::Greater,
                }))
            }
            StratTest::Arith(op, a, b) => arith(*op, a.eval(vars)?, b.eval(vars)?),
        }
    }

    /// Evaluate a condition that must produce a boolean.
    pub fn eval_bool(&self, vars: &dyn Fn(usize) -> Option<TestValue>) -> Result<bool, BipartError> {
        match self.eval(vars)? {
            TestValue::Bool(b) => Ok(b),
            other => Err(BipartError::StrategyEval(format!(
                "condition yields {} value {other}, expected boolean",
                other.type_name()
            ))),
        }
    }
}

fn compare(l: TestValue, r: TestValue) -> Result<Ordering, BipartError> {
    match (l, r) {
        (TestValue::Int(a), TestValue::Int(b)) => Ok(a.cmp(&b)),
        (TestValue::Bool(a), TestValue::Bool(b)) => Ok(a.cmp(&b)),
        _ => match (l.as_f64(), r.as_f64()) {
            (Some(a), Some(b)) => a
                .partial_cmp(&b)
                .ok_or_else(|| BipartError::StrategyEval("comparison with NaN".into())),
            _ => Err(BipartError::StrategyEval(format!(
                "cannot compare {} with {}",
                l.type_name(),
                r.type_name()
            ))),
        },
    }
}

fn arith(op: ArithOp, l: TestValue, r: TestValue) -> Result<TestValue, BipartError> {
    match (l, r) {
        (TestValue::Int(a), TestValue::Int(b)) => match op {
            ArithOp::Add => Ok(TestValue::Int(a + b)),
            ArithOp::Sub => Ok(TestValue::Int(a - b)),
            ArithOp::Mul => Ok(TestValue::Int(a * b)),
            ArithOp::Mod if b == 0 => Err(BipartError::StrategyEval("modulo by zero".into())),
            ArithOp::Mod => Ok(TestValue::Int(a % b)),
        },
        _ => {
            let (Some(a), Some(b)) = (l.as_f64(), r.as_f64()) else {
                return Err(BipartError::StrategyEval(format!(
                    "arithmetic on {} and {}",
                    l.type_name(),
                    r.type_name()
                )));
            };
            match op {
                ArithOp::Add => Ok(TestValue::Double(a + b)),
                ArithOp::Sub => Ok(TestValue::Double(a - b)),
                ArithOp::Mul => Ok(TestValue::Double(a * b)),
                ArithOp::Mod => Err(BipartError::StrategyEval("modulo on double operands".into())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(t: StratTest) -> Box<StratTest> {
        Box::new(t)
    }

    fn vars(i: usize) -> Option<TestValue> {
        [TestValue::Int(120), TestValue::Double(2.5)].get(i).copied()
    }

    #[test]
    fn mixed_arithmetic_comparison() {
        // var0 * 2 > var1 + 100
        let t = StratTest::Cmp(
            CmpOp::Gt,
            b(StratTest::Arith(ArithOp::Mul, b(StratTest::Var(0)), b(StratTest::Val(TestValue::Int(2))))),
            b(StratTest::Arith(ArithOp::Add, b(StratTest::Var(1)), b(StratTest::Val(TestValue::Int(100))))),
        );
        assert!(t.eval_bool(&vars).unwrap());
    }

    #[test]
    fn numeric_condition_is_a_type_error() {
        let t = StratTest::Var(0);
        assert!(matches!(t.eval_bool(&vars), Err(BipartError::StrategyEval(_))));
    }

    #[test]
    fn logic_on_numbers_is_rejected() {
        let t = StratTest::Not(b(StratTest::Val(TestValue::Int(1))));
        assert!(matches!(t.eval(&vars), Err(BipartError::StrategyEval(_))));
    }

    #[test]
    fn unknown_variable_fails() {
        assert!(StratTest::Var(7).eval(&vars).is_err());
    }

    #[test]
    fn modulo_rules() {
        let m = |a, c| StratTest::Arith(ArithOp::Mod, b(StratTest::Val(a)), b(StratTest::Val(c)));
        assert_eq!(m(TestValue::Int(7), TestValue::Int(3)).eval(&vars).unwrap(), TestValue::Int(1));
        assert!(m(TestValue::Int(7), TestValue::Int(0)).eval(&vars).is_err());
        assert!(m(TestValue::Double(7.0), TestValue::Int(3)).eval(&vars).is_err());
    }
}
