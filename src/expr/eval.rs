use super::{ExprGraph, ExprId, Node, Scalar};
use crate::error::{Error, Result};

impl ExprGraph {
    /// Evaluates `roots` with `values[symbol index]` bound to each symbol.
    ///
    /// Nodes are visited once each in ascending id order, which is
    /// topological, so shared sub-expressions are computed once.
    pub fn evaluate<S: Scalar>(&self, roots: &[ExprId], values: &[Option<S>]) -> Result<Vec<S>> {
        let order = self.reachable(roots);
        let mut slots: Vec<Option<S>> = vec![None; self.len()];
        for e in order {
            let value = match self.node(e) {
                Node::Const(c) => S::from_f64(c.0),
                Node::Symbol(s) => values
                    .get(s.index())
                    .copied()
                    .flatten()
                    .ok_or_else(|| Error::MissingValue(self.symbol_name(*s).to_string()))?,
                Node::Add(terms) => {
                    let mut acc = slot(&slots, terms[0]);
                    for t in &terms[1..] {
                        acc = acc + slot(&slots, *t);
                    }
                    acc
                }
                Node::Mul(factors) => {
                    let mut acc = slot(&slots, factors[0]);
                    for f in &factors[1..] {
                        acc = acc * slot(&slots, *f);
                    }
                    acc
                }
                Node::Pow(base, exponent) => slot(&slots, *base).powf(exponent.0),
                Node::Sin(arg) => slot(&slots, *arg).sin(),
                Node::Cos(arg) => slot(&slots, *arg).cos(),
            };
            slots[e.index()] = Some(value);
        }
        Ok(roots.iter().map(|r| slot(&slots, *r)).collect())
    }
}

/// Children are evaluated before parents, so every lookup is filled.
fn slot<S: Scalar>(slots: &[Option<S>], e: ExprId) -> S {
    match slots[e.index()] {
        Some(v) => v,
        None => unreachable!("node {} evaluated before its operands", e.index()),
    }
}
