//! Strategy text parser.
//!
//! ```text
//! strat   := select
//! select  := concat ( '|' concat )*
//! concat  := item*
//! item    := '(' select ')' | '/' expr '?' select [ ':' select ] ';' | method
//! method  := NAME [ '{' param ( ',' param )* '}' ]
//! param   := NAME '=' ( INT | FLOAT | CASECHAR | strat | '{' strat '}' )
//! expr    := and ( '|' and )*
//! and     := not ( '&' not )*
//! not     := '!' not | cmp
//! cmp     := sum [ ( '<' | '=' | '>' ) sum ]
//! sum     := prod ( ( '+' | '-' ) prod )*
//! prod    := atom ( ( '*' | '%' ) atom )*
//! atom    := '(' expr ')' | NUMBER | NAME
//! ```
//!
//! Method names are matched greedily against the table, so that
//! single-letter methods may be juxtaposed (`hf` is `h` followed by `f`).
//!
//! Nesting depth and tree size are bounded, so hostile text is rejected with
//! a parse error instead of exhausting the stack.

use super::test::{ArithOp, CmpOp, StratTest, TestValue};
use super::{ParamKind, ParamValue, Strat, StratTab};
use crate::bipart_error::BipartError;
use crate::Gnum;
use std::sync::Arc;

/// Deepest accepted nesting of groups, conditions, strategy parameters and
/// parenthesised or negated condition terms.
pub const MAX_DEPTH: usize = 64;
/// Most strategy items accepted in one text.
pub const MAX_NODES: usize = 1 << 16;
/// Most terms accepted in one condition.
pub const MAX_TEST_NODES: usize = 256;

/// Parse `text` into a strategy over the methods of `tab`.
pub fn parse<P: Clone, F>(text: &str, tab: &StratTab<P, F>) -> Result<Arc<Strat<P>>, BipartError> {
    let mut p = Parser {
        src: text.as_bytes(),
        pos: 0,
        tab,
        depth: 0,
        nodes: 0,
        test_nodes: 0,
    };
    let strat = p.select()?;
    p.skip_ws();
    if p.pos < p.src.len() {
        return Err(p.error(format!("unexpected character '{}'", p.src[p.pos] as char)));
    }
    Ok(strat)
}

struct Parser<'a, P, F> {
    src: &'a [u8],
    pos: usize,
    tab: &'a StratTab<P, F>,
    depth: usize,
    nodes: usize,
    test_nodes: usize,
}

impl<P: Clone, F> Parser<'_, P, F> {
    fn error(&self, msg: impl Into<String>) -> BipartError {
        BipartError::StrategyParse {
            pos: self.pos,
            msg: msg.into(),
        }
    }

    fn skip_ws(&mut self) {
        while self.pos < self.src.len() && self.src[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_ws();
        self.src.get(self.pos).copied()
    }

    fn eat(&mut self, c: u8) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: u8) -> Result<(), BipartError> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", c as char)))
        }
    }

    /// Run `f` one nesting level deeper.
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, BipartError>) -> Result<T, BipartError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("strategy nested too deeply"));
        }
        self.depth += 1;
        let out = f(self);
        self.depth -= 1;
        out
    }

    fn count_node(&mut self) -> Result<(), BipartError> {
        self.nodes += 1;
        if self.nodes > MAX_NODES {
            return Err(self.error("strategy too long"));
        }
        Ok(())
    }

    fn count_test_node(&mut self) -> Result<(), BipartError> {
        self.test_nodes += 1;
        if self.test_nodes > MAX_TEST_NODES {
            return Err(self.error("condition too long"));
        }
        Ok(())
    }

    fn ident(&mut self) -> Result<String, BipartError> {
        self.skip_ws();
        let start = self.pos;
        while self.pos < self.src.len() && self.src[self.pos].is_ascii_alphanumeric() {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error("expected a name"));
        }
        Ok(String::from_utf8_lossy(&self.src[start..self.pos]).into_owned())
    }

    fn select(&mut self) -> Result<Arc<Strat<P>>, BipartError> {
        self.nested(|p| {
            let mut branches = vec![p.concat()?];
            while p.eat(b'|') {
                branches.push(p.concat()?);
            }
            Ok(if branches.len() == 1 {
                branches.swap_remove(0)
            } else {
                Arc::new(Strat::Select(branches))
            })
        })
    }

    fn concat(&mut self) -> Result<Arc<Strat<P>>, BipartError> {
        let mut items = Vec::new();
        loop {
            match self.peek() {
                None | Some(b')' | b'|' | b':' | b';' | b'}' | b',') => break,
                Some(_) => items.push(self.item()?),
            }
        }
        Ok(match items.len() {
            0 => Strat::empty(),
            1 => items.swap_remove(0),
            _ => Arc::new(Strat::Concat(items)),
        })
    }

    fn item(&mut self) -> Result<Arc<Strat<P>>, BipartError> {
        self.count_node()?;
        if self.eat(b'(') {
            let s = self.select()?;
            self.expect(b')')?;
            return Ok(s);
        }
        if self.eat(b'/') {
            self.test_nodes = 0;
            let test = self.expr_or()?;
            self.expect(b'?')?;
            let then = self.select()?;
            let els = if self.eat(b':') { Some(self.select()?) } else { None };
            self.expect(b';')?;
            return Ok(Arc::new(Strat::Cond { test, then, els }));
        }
        self.method()
    }

    fn method(&mut self) -> Result<Arc<Strat<P>>, BipartError> {
        self.skip_ws();
        let rest = &self.src[self.pos..];
        let meth = self
            .tab
            .methods
            .iter()
            .enumerate()
            .filter(|(_, m)| rest.starts_with(m.name.as_bytes()))
            .max_by_key(|(_, m)| m.name.len())
            .map(|(i, _)| i)
            .ok_or_else(|| self.error("unknown method"))?;
        let tab = self.tab;
        let entry = &tab.methods[meth];
        self.pos += entry.name.len();
        let mut data = entry.data.clone();
        if self.eat(b'{') {
            loop {
                let name_pos = self.pos;
                let name = self.ident()?;
                let Some(param) = entry.params.iter().find(|p| p.name == name) else {
                    self.pos = name_pos;
                    return Err(self.error(format!(
                        "method '{}' has no parameter '{name}'",
                        entry.name
                    )));
                };
                self.expect(b'=')?;
                let value = self.param_value(param.kind)?;
                (param.set)(&mut data, value).map_err(|e| self.error(e.to_string()))?;
                if !self.eat(b',') {
                    break;
                }
            }
            self.expect(b'}')?;
        }
        Ok(Arc::new(Strat::Method {
            meth,
            name: entry.name,
            data,
        }))
    }

    fn param_value(&mut self, kind: ParamKind) -> Result<ParamValue<P>, BipartError> {
        match kind {
            ParamKind::Int => match self.number()? {
                TestValue::Int(i) => Ok(ParamValue::Int(i)),
                _ => Err(self.error("expected an integer")),
            },
            ParamKind::Double => match self.number()? {
                TestValue::Int(i) => Ok(ParamValue::Double(i as f64)),
                TestValue::Double(d) => Ok(ParamValue::Double(d)),
                TestValue::Bool(_) => Err(self.error("expected a number")),
            },
            ParamKind::Case(set) => {
                let c = self.peek().map(char::from);
                match c {
                    Some(c) if set.contains(c) => {
                        self.pos += 1;
                        Ok(ParamValue::Case(c))
                    }
                    _ => Err(self.error(format!("expected one of \"{set}\""))),
                }
            }
            ParamKind::Strat => {
                let s = if self.eat(b'{') {
                    let s = self.select()?;
                    self.expect(b'}')?;
                    s
                } else {
                    self.select()?
                };
                Ok(ParamValue::Strat(s))
            }
        }
    }

    fn number(&mut self) -> Result<TestValue, BipartError> {
        self.skip_ws();
        let start = self.pos;
        if matches!(self.src.get(self.pos), Some(b'-' | b'+')) {
            self.pos += 1;
        }
        let mut is_float = false;
        while let Some(&c) = self.src.get(self.pos) {
            match c {
                b'0'..=b'9' => {}
                b'.' => is_float = true,
                b'e' | b'E' if self.pos > start => {
                    is_float = true;
                    if matches!(self.src.get(self.pos + 1), Some(b'-' | b'+')) {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.src[start..self.pos]).map_err(|_| self.error("invalid number"))?;
        if is_float {
            text.parse::<f64>()
                .map(TestValue::Double)
                .map_err(|_| self.error(format!("invalid number \"{text}\"")))
        } else {
            text.parse::<Gnum>()
                .map(TestValue::Int)
                .map_err(|_| self.error(format!("invalid number \"{text}\"")))
        }
    }

    fn expr_or(&mut self) -> Result<StratTest, BipartError> {
        let mut left = self.expr_and()?;
        while self.eat(b'|') {
            let right = self.expr_and()?;
            self.count_test_node()?;
            left = StratTest::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn expr_and(&mut self) -> Result<StratTest, BipartError> {
        let mut left = self.expr_not()?;
        while self.eat(b'&') {
            let right = self.expr_not()?;
            self.count_test_node()?;
            left = StratTest::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn expr_not(&mut self) -> Result<StratTest, BipartError> {
        if self.eat(b'!') {
            self.count_test_node()?;
            let inner = self.nested(Self::expr_not)?;
            return Ok(StratTest::Not(Box::new(inner)));
        }
        self.expr_cmp()
    }

    fn expr_cmp(&mut self) -> Result<StratTest, BipartError> {
        let left = self.expr_sum()?;
        let op = match self.peek() {
            Some(b'<') => CmpOp::Lt,
            Some(b'=') => CmpOp::Eq,
            Some(b'>') => CmpOp::Gt,
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.expr_sum()?;
        self.count_test_node()?;
        Ok(StratTest::Cmp(op, Box::new(left), Box::new(right)))
    }

    fn expr_sum(&mut self) -> Result<StratTest, BipartError> {
        let mut left = self.expr_prod()?;
        loop {
            let op = match self.peek() {
                Some(b'+') => ArithOp::Add,
                Some(b'-') => ArithOp::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.expr_prod()?;
            self.count_test_node()?;
            left = StratTest::Arith(op, Box::new(left), Box::new(right));
        }
    }

    fn expr_prod(&mut self) -> Result<StratTest, BipartError> {
        let mut left = self.expr_atom()?;
        loop {
            let op = match self.peek() {
                Some(b'*') => ArithOp::Mul,
                Some(b'%') => ArithOp::Mod,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.expr_atom()?;
            self.count_test_node()?;
            left = StratTest::Arith(op, Box::new(left), Box::new(right));
        }
    }

    fn expr_atom(&mut self) -> Result<StratTest, BipartError> {
        match self.peek() {
            Some(b'(') => {
                self.pos += 1;
                let e = self.nested(Self::expr_or)?;
                self.expect(b')')?;
                Ok(e)
            }
            Some(c) if c.is_ascii_digit() || c == b'.' => Ok(StratTest::Val(self.number()?)),
            Some(c) if c.is_ascii_alphabetic() => {
                let start = self.pos;
                let name = self.ident()?;
                match self.tab.var_index(&name) {
                    Some(i) => Ok(StratTest::Var(i)),
                    None => {
                        self.pos = start;
                        Err(self.error(format!("unknown variable '{name}'")))
                    }
                }
            }
            _ => Err(self.error("expected an expression")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default)]
    struct Rec {
        n: Gnum,
        r: f64,
        c: char,
        sub: Option<Arc<Strat<Rec>>>,
    }

    fn tab() -> StratTab<Rec, ()> {
        let mut t = StratTab::new(vec!["vert", "levl"]);
        let a = t.add_method("a", (), Rec::default());
        t.add_method("b", (), Rec::default());
        t.add_param(a, "n", ParamKind::Int, |p, v| {
            if let ParamValue::Int(i) = v {
                p.n = i;
            }
            Ok(())
        });
        t.add_param(a, "r", ParamKind::Double, |p, v| {
            if let ParamValue::Double(d) = v {
                p.r = d;
            }
            Ok(())
        });
        t.add_param(a, "c", ParamKind::Case("xyz"), |p, v| {
            if let ParamValue::Case(c) = v {
                p.c = c;
            }
            Ok(())
        });
        t.add_param(a, "s", ParamKind::Strat, |p, v| {
            if let ParamValue::Strat(s) = v {
                p.sub = Some(s);
            }
            Ok(())
        });
        t
    }

    #[test]
    fn juxtaposed_methods_concatenate() {
        let s = parse("ab", &tab()).unwrap();
        match &*s {
            Strat::Concat(items) => {
                assert_eq!(items.len(), 2);
                assert!(matches!(*items[0], Strat::Method { meth: 0, name: "a", .. }));
                assert!(matches!(*items[1], Strat::Method { meth: 1, name: "b", .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parameters_are_set() {
        let s = parse("a{n=12, r=0.5, c=y, s=b|a}", &tab()).unwrap();
        let Strat::Method { data, .. } = &*s else {
            panic!("expected method");
        };
        assert_eq!(data.n, 12);
        assert_eq!(data.r, 0.5);
        assert_eq!(data.c, 'y');
        assert!(matches!(data.sub.as_deref(), Some(Strat::Select(b)) if b.len() == 2));
    }

    #[test]
    fn condition_with_else() {
        let s = parse("/(vert>100)&(levl<3)?a:b;", &tab()).unwrap();
        let Strat::Cond { test, els, .. } = &*s else {
            panic!("expected condition");
        };
        assert!(els.is_some());
        let vars = |i: usize| [TestValue::Int(200), TestValue::Int(1)].get(i).copied();
        assert!(test.eval_bool(&vars).unwrap());
    }

    #[test]
    fn empty_text_is_empty_strategy() {
        assert!(parse("  ", &tab()).unwrap().is_empty());
        assert!(matches!(&*parse("(|a)", &tab()).unwrap(), Strat::Select(b) if b[0].is_empty()));
    }

    #[test]
    fn errors_report_position() {
        let err = parse("a{q=1}", &tab()).unwrap_err();
        assert_eq!(
            err,
            BipartError::StrategyParse {
                pos: 2,
                msg: "method 'a' has no parameter 'q'".into()
            }
        );
        assert!(matches!(parse("a)", &tab()), Err(BipartError::StrategyParse { pos: 1, .. })));
        assert!(matches!(parse("q", &tab()), Err(BipartError::StrategyParse { pos: 0, .. })));
        assert!(matches!(parse("a{c=w}", &tab()), Err(BipartError::StrategyParse { .. })));
        assert!(matches!(parse("/foo>1?a;", &tab()), Err(BipartError::StrategyParse { .. })));
    }

    #[test]
    fn long_sequences_stay_flat() {
        let s = parse(&"ab".repeat(1000), &tab()).unwrap();
        let Strat::Concat(items) = &*s else {
            panic!("expected a sequence");
        };
        assert_eq!(items.len(), 2000);
        let s = parse(&vec!["a"; 50].join("|"), &tab()).unwrap();
        assert!(matches!(&*s, Strat::Select(b) if b.len() == 50));
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let nested = |n: usize| format!("{}a{}", "(".repeat(n), ")".repeat(n));
        assert!(parse(&nested(MAX_DEPTH - 2), &tab()).is_ok());
        for n in [MAX_DEPTH, 20_000] {
            let err = parse(&nested(n), &tab()).unwrap_err();
            assert!(
                matches!(&err, BipartError::StrategyParse { msg, .. } if msg == "strategy nested too deeply"),
                "{err:?}"
            );
        }
        let params = format!("{}{}", "a{s=".repeat(20_000), "}".repeat(20_000));
        assert!(matches!(parse(&params, &tab()), Err(BipartError::StrategyParse { .. })));
    }

    #[test]
    fn oversized_text_is_rejected() {
        assert!(matches!(
            parse(&"a".repeat(MAX_NODES + 1), &tab()),
            Err(BipartError::StrategyParse { msg, .. }) if msg == "strategy too long"
        ));
        let negations = format!("/{}vert?a;", "!".repeat(20_000));
        assert!(matches!(parse(&negations, &tab()), Err(BipartError::StrategyParse { .. })));
        let parens = format!("/{}vert{}?a;", "(".repeat(20_000), ")".repeat(20_000));
        assert!(matches!(
            parse(&parens, &tab()),
            Err(BipartError::StrategyParse { msg, .. }) if msg == "strategy nested too deeply"
        ));
        let sum = format!("/{}1>0?a;", "1+".repeat(MAX_TEST_NODES));
        assert!(matches!(
            parse(&sum, &tab()),
            Err(BipartError::StrategyParse { msg, .. }) if msg == "condition too long"
        ));
        assert!(parse("/vert+1+1>0?a;", &tab()).is_ok());
    }
}
