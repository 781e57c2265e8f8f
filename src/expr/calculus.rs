use std::collections::HashMap;

use super::{CacheKey, ExprCache, ExprGraph, ExprId, Node, SymbolId};
use crate::error::Result;

/// A simultaneous symbol-for-expression replacement.
///
/// Results are memoized per node for as long as the mapping is unchanged, so
/// one `Replacement` can be applied to many expressions that share
/// sub-expressions.
#[derive(Clone, Debug, Default)]
pub struct Replacement {
    map: HashMap<SymbolId, ExprId>,
    mask: u128,
    memo: HashMap<ExprId, ExprId>,
}

impl Replacement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, symbol: SymbolId, value: ExprId) {
        self.map.insert(symbol, value);
        self.mask |= symbol.mask();
        self.memo.clear();
    }

    pub fn with(mut self, symbol: SymbolId, value: ExprId) -> Self {
        self.insert(symbol, value);
        self
    }

    pub fn get(&self, symbol: SymbolId) -> Option<ExprId> {
        self.map.get(&symbol).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl ExprGraph {
    /// Partial derivative of `e` with respect to the symbol `wrt`.
    pub fn diff(&mut self, e: ExprId, wrt: SymbolId, cache: &mut ExprCache) -> ExprId {
        if self.deps(e) & wrt.mask() == 0 {
            return self.zero();
        }
        let key = CacheKey::Partial(e, wrt);
        if let Some(hit) = cache.get(&key) {
            return hit;
        }
        let result = match self.node(e).clone() {
            Node::Const(_) => self.zero(),
            Node::Symbol(_) => self.one(),
            Node::Add(terms) => {
                let parts: Vec<ExprId> = terms.iter().map(|t| self.diff(*t, wrt, cache)).collect();
                self.add(&parts)
            }
            Node::Mul(factors) => {
                let mut parts = vec![];
                for i in 0..factors.len() {
                    let d = self.diff(factors[i], wrt, cache);
                    if self.is_zero(d) {
                        continue;
                    }
                    parts.push(self.product_rule_term(&factors, i, d));
                }
                self.add(&parts)
            }
            Node::Pow(base, exponent) => {
                let d = self.diff(base, wrt, cache);
                self.power_rule(base, exponent.0, d)
            }
            Node::Sin(arg) => {
                let d = self.diff(arg, wrt, cache);
                let c = self.cos(arg);
                self.mul(&[c, d])
            }
            Node::Cos(arg) => {
                let d = self.diff(arg, wrt, cache);
                let s = self.sin(arg);
                let ds = self.mul(&[s, d]);
                self.neg(ds)
            }
        };
        cache.insert(key, result);
        result
    }

    /// Total time derivative of `e`. Constants have zero rate; a dynamic
    /// symbol `x` differentiates to the symbol `x'`.
    pub fn dt(&mut self, e: ExprId, cache: &mut ExprCache) -> Result<ExprId> {
        if self.deps(e) & self.dynamic_mask() == 0 {
            return Ok(self.zero());
        }
        let key = CacheKey::TimeDerivative(e);
        if let Some(hit) = cache.get(&key) {
            return Ok(hit);
        }
        let result = match self.node(e).clone() {
            Node::Const(_) => self.zero(),
            Node::Symbol(s) => {
                let d = self.derivative_symbol(s)?;
                self.symbol_expr(d)
            }
            Node::Add(terms) => {
                let mut parts = Vec::with_capacity(terms.len());
                for t in terms.iter() {
                    parts.push(self.dt(*t, cache)?);
                }
                self.add(&parts)
            }
            Node::Mul(factors) => {
                let mut parts = vec![];
                for i in 0..factors.len() {
                    let d = self.dt(factors[i], cache)?;
                    if self.is_zero(d) {
                        continue;
                    }
                    parts.push(self.product_rule_term(&factors, i, d));
                }
                self.add(&parts)
            }
            Node::Pow(base, exponent) => {
                let d = self.dt(base, cache)?;
                self.power_rule(base, exponent.0, d)
            }
            Node::Sin(arg) => {
                let d = self.dt(arg, cache)?;
                let c = self.cos(arg);
                self.mul(&[c, d])
            }
            Node::Cos(arg) => {
                let d = self.dt(arg, cache)?;
                let s = self.sin(arg);
                let ds = self.mul(&[s, d]);
                self.neg(ds)
            }
        };
        cache.insert(key, result);
        Ok(result)
    }

    /// d * prod_{j != i} factors[j]
    fn product_rule_term(&mut self, factors: &[ExprId], i: usize, d: ExprId) -> ExprId {
        let mut term = Vec::with_capacity(factors.len());
        term.push(d);
        term.extend(
            factors
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, f)| *f),
        );
        self.mul(&term)
    }

    /// n * b^(n-1) * db
    fn power_rule(&mut self, base: ExprId, exponent: f64, d: ExprId) -> ExprId {
        let n = self.float(exponent);
        let b = self.pow(base, exponent - 1.0);
        self.mul(&[n, b, d])
    }

    /// Applies a simultaneous symbol replacement to `e`.
    pub fn xreplace(&mut self, e: ExprId, replacement: &mut Replacement) -> ExprId {
        if self.deps(e) & replacement.mask == 0 {
            return e;
        }
        if let Some(&hit) = replacement.memo.get(&e) {
            return hit;
        }
        let result = match self.node(e).clone() {
            Node::Const(_) => e,
            Node::Symbol(s) => replacement.map.get(&s).copied().unwrap_or(e),
            Node::Add(terms) => {
                let parts: Vec<ExprId> =
                    terms.iter().map(|t| self.xreplace(*t, replacement)).collect();
                self.add(&parts)
            }
            Node::Mul(factors) => {
                let parts: Vec<ExprId> =
                    factors.iter().map(|f| self.xreplace(*f, replacement)).collect();
                self.mul(&parts)
            }
            Node::Pow(base, exponent) => {
                let b = self.xreplace(base, replacement);
                self.pow(b, exponent.0)
            }
            Node::Sin(arg) => {
                let a = self.xreplace(arg, replacement);
                self.sin(a)
            }
            Node::Cos(arg) => {
                let a = self.xreplace(arg, replacement);
                self.cos(a)
            }
        };
        replacement.memo.insert(e, result);
        result
    }
}

#[cfg(test)]
mod calculus_tests {
    use super::*;
    use crate::expr::SymbolKind;

    #[test]
    fn partial_of_product() {
        // Arrange
        let mut g = ExprGraph::new();
        let mut cache = ExprCache::new(1024);
        let x = g.dynamic("x").unwrap();
        let y = g.dynamic("y").unwrap();
        let sx = g.sin(x);
        let e = g.mul(&[sx, y]); // sin(x) y
        let xs = g.as_symbol(x).unwrap();

        // Act
        let d = g.diff(e, xs, &mut cache);

        // Assert
        let cx = g.cos(x);
        let expected = g.mul(&[cx, y]);
        assert_eq!(d, expected);
    }

    #[test]
    fn time_derivative_creates_rate_symbols() {
        // Arrange
        let mut g = ExprGraph::new();
        let mut cache = ExprCache::new(1024);
        let q = g.dynamic("q").unwrap();
        let r = g.constant("r").unwrap();
        let cq = g.cos(q);
        let e = g.mul(&[r, cq]); // r cos(q)

        // Act
        let d = g.dt(e, &mut cache).unwrap();

        // Assert
        let qd = g.find_symbol("q'").unwrap();
        assert_eq!(g.symbol_info(qd).kind, SymbolKind::Dynamic);
        assert_eq!(
            g.symbol_info(qd).derivative_of,
            Some(g.as_symbol(q).unwrap())
        );
        let sq = g.sin(q);
        let neg_r = g.neg(r);
        let expected = g.mul(&[neg_r, sq, g.symbol_expr(qd)]);
        assert_eq!(d, expected);
        assert_eq!(g.dt(r, &mut cache).unwrap(), g.zero());
    }

    #[test]
    fn replacement_is_simultaneous() {
        // Arrange
        let mut g = ExprGraph::new();
        let a = g.dynamic("a").unwrap();
        let b = g.dynamic("b").unwrap();
        let e = g.sub(a, b);
        let mut swap = Replacement::new()
            .with(g.as_symbol(a).unwrap(), b)
            .with(g.as_symbol(b).unwrap(), a);

        // Act
        let swapped = g.xreplace(e, &mut swap);

        // Assert
        let expected = g.sub(b, a);
        assert_eq!(swapped, expected);
    }

    #[test]
    fn replacement_to_zero_prunes() {
        // Arrange
        let mut g = ExprGraph::new();
        let u = g.dynamic("u").unwrap();
        let v = g.dynamic("v").unwrap();
        let uv = g.mul(&[u, v]);
        let e = g.add(&[uv, v]);
        let mut zero_u = Replacement::new().with(g.as_symbol(u).unwrap(), g.zero());

        // Act
        let result = g.xreplace(e, &mut zero_u);

        // Assert
        assert_eq!(result, v);
    }
}
