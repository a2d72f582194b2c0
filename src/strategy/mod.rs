//! Strategy trees and strategy tables.
//!
//! A strategy is an immutable tree of nodes (empty, sequence, condition,
//! selection, method call). Sequences and selections hold their operands in
//! one flat list, so tree depth only grows with explicit nesting. Leaves name a method of a
//! [`StratTab`] and carry the method's parameter record `P`. Subtrees are
//! shared through [`Arc`], so a strategy can be referenced from several
//! parameter records (the multilevel method's `low` and `asc` strategies for
//! instance) without copying.

pub mod parser;
pub mod test;

pub use test::{StratTest, TestValue};

use crate::bipart_error::BipartError;
use crate::Gnum;
use std::sync::Arc;

/// Strategy tree node.
#[derive(Debug, Clone)]
pub enum Strat<P> {
    /// Does nothing.
    Empty,
    /// Apply the strategies in order, stopping at the first failure.
    Concat(Vec<Arc<Strat<P>>>),
    /// Apply `then` if `test` holds, `els` otherwise.
    Cond {
        test: StratTest,
        then: Arc<Strat<P>>,
        els: Option<Arc<Strat<P>>>,
    },
    /// Apply every strategy from the same initial state and keep the best result.
    Select(Vec<Arc<Strat<P>>>),
    /// Call method `meth` of the strategy table with `data`. `name` is the
    /// method's name in the table the strategy was parsed against.
    Method {
        meth: usize,
        name: &'static str,
        data: P,
    },
}

impl<P> Strat<P> {
    pub fn empty() -> Arc<Self> {
        Arc::new(Strat::Empty)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Strat::Empty)
    }
}

/// Type of a method parameter, as written in strategy text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Int,
    Double,
    /// One character out of the given set.
    Case(&'static str),
    /// Nested strategy of the same table.
    Strat,
}

/// Parsed parameter value handed to a parameter setter.
#[derive(Debug, Clone)]
pub enum ParamValue<P> {
    Int(Gnum),
    Double(f64),
    Case(char),
    Strat(Arc<Strat<P>>),
}

/// Stores a parsed value into a method parameter record.
pub type ParamSetter<P> = fn(&mut P, ParamValue<P>) -> Result<(), BipartError>;

/// One named parameter of a method.
#[derive(Debug, Clone)]
pub struct StratParamTab<P> {
    pub name: &'static str,
    pub kind: ParamKind,
    pub set: ParamSetter<P>,
}

/// One method of a strategy table: its name, entry point and default
/// parameter record.
#[derive(Debug, Clone)]
pub struct StratMethodTab<P, F> {
    pub name: &'static str,
    pub func: F,
    pub data: P,
    pub params: Vec<StratParamTab<P>>,
}

/// Registry of methods, their parameters and the condition variables
/// available to strategies of one problem family.
#[derive(Debug, Clone)]
pub struct StratTab<P, F> {
    pub methods: Vec<StratMethodTab<P, F>>,
    pub vars: Vec<&'static str>,
}

impl<P, F> StratTab<P, F> {
    pub fn new(vars: Vec<&'static str>) -> Self {
        StratTab {
            methods: Vec::new(),
            vars,
        }
    }

    /// Register a method; returns its index.
    pub fn add_method(&mut self, name: &'static str, func: F, data: P) -> usize {
        self.methods.push(StratMethodTab {
            name,
            func,
            data,
            params: Vec::new(),
        });
        self.methods.len() - 1
    }

    /// Register a parameter of method `meth`.
    pub fn add_param(&mut self, meth: usize, name: &'static str, kind: ParamKind, set: ParamSetter<P>) {
        self.methods[meth].params.push(StratParamTab { name, kind, set });
    }

    pub fn method_index(&self, name: &str) -> Option<usize> {
        self.methods.iter().position(|m| m.name == name)
    }

    pub fn method(&self, meth: usize) -> Option<&StratMethodTab<P, F>> {
        self.methods.get(meth)
    }

    pub fn var_index(&self, name: &str) -> Option<usize> {
        self.vars.iter().position(|&v| v == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_lookup() {
        let mut tab: StratTab<Gnum, fn()> = StratTab::new(vec!["vert"]);
        fn noop() {}
        let f = tab.add_method("f", noop as fn(), 80);
        tab.add_param(f, "move", ParamKind::Int, |p, v| match v {
            ParamValue::Int(i) => {
                *p = i;
                Ok(())
            }
            _ => Err(BipartError::InvalidParameter("move".into())),
        });
        assert_eq!(tab.method_index("f"), Some(0));
        assert_eq!(tab.method_index("g"), None);
        assert_eq!(tab.var_index("vert"), Some(0));
        let mut data = tab.methods[f].data;
        (tab.methods[f].params[0].set)(&mut data, ParamValue::Int(12)).unwrap();
        assert_eq!(data, 12);
    }
}
