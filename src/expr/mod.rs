//! A small hash-consed expression graph for deriving equations of motion.
//!
//! Every expression is a node in a single arena and is referred to by an
//! [`ExprId`]. Nodes are interned, so two structurally identical expressions
//! always share one id, and children are always created before their
//! parents: ascending id order is a topological order of the graph. Sums and
//! products are kept in a canonical form (flattened, constants folded, like
//! terms and like factors collected, operands sorted by id), which is enough
//! for the cancellations that the multibody derivation produces.

use std::collections::{BTreeMap, HashMap};

use ordered_float::OrderedFloat;

use crate::{
    error::{Error, Result},
    types::Float,
};

mod cache;
mod calculus;
mod eval;
mod print;
mod scalar;

pub use cache::{CacheKey, CacheStats, ExprCache};
pub use calculus::Replacement;
pub use print::CseListing;
pub use scalar::{DoubleDouble, Scalar};

/// Dependency masks are 128 bits wide.
pub const MAX_SYMBOLS: usize = 128;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(u32);

impl ExprId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(u16);

impl SymbolId {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    fn mask(self) -> u128 {
        1u128 << self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolKind {
    /// A parameter of the model, fixed in time.
    Constant,
    /// A function of time: coordinates, speeds, inputs and their derivatives.
    Dynamic,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    /// Set for symbols created by time differentiation, e.g. `q3'`.
    pub derivative_of: Option<SymbolId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Node {
    Const(OrderedFloat<Float>),
    Symbol(SymbolId),
    Add(Box<[ExprId]>),
    Mul(Box<[ExprId]>),
    Pow(ExprId, OrderedFloat<Float>),
    Sin(ExprId),
    Cos(ExprId),
}

pub struct ExprGraph {
    nodes: Vec<Node>,
    deps: Vec<u128>,
    index: HashMap<Node, ExprId>,
    symbols: Vec<Symbol>,
    symbol_nodes: Vec<ExprId>,
    symbol_names: HashMap<String, SymbolId>,
    derivatives: HashMap<SymbolId, SymbolId>,
    dynamic_mask: u128,
    zero: ExprId,
    one: ExprId,
}

impl Default for ExprGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ExprGraph {
    pub fn new() -> Self {
        let mut graph = ExprGraph {
            nodes: vec![],
            deps: vec![],
            index: HashMap::new(),
            symbols: vec![],
            symbol_nodes: vec![],
            symbol_names: HashMap::new(),
            derivatives: HashMap::new(),
            dynamic_mask: 0,
            zero: ExprId(0),
            one: ExprId(0),
        };
        graph.zero = graph.float(0.0);
        graph.one = graph.float(1.0);
        graph
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn intern(&mut self, node: Node) -> ExprId {
        if let Some(&id) = self.index.get(&node) {
            return id;
        }
        let deps = match &node {
            Node::Const(_) => 0,
            Node::Symbol(s) => s.mask(),
            Node::Add(args) | Node::Mul(args) => {
                args.iter().fold(0, |acc, a| acc | self.deps[a.index()])
            }
            Node::Pow(b, _) | Node::Sin(b) | Node::Cos(b) => self.deps[b.index()],
        };
        let id = ExprId(self.nodes.len() as u32);
        self.nodes.push(node.clone());
        self.deps.push(deps);
        self.index.insert(node, id);
        id
    }

    pub fn node(&self, e: ExprId) -> &Node {
        &self.nodes[e.index()]
    }

    /// Mask of the symbols an expression depends on.
    pub fn deps(&self, e: ExprId) -> u128 {
        self.deps[e.index()]
    }

    pub fn zero(&self) -> ExprId {
        self.zero
    }

    pub fn one(&self) -> ExprId {
        self.one
    }

    pub fn float(&mut self, value: Float) -> ExprId {
        // -0.0 and 0.0 share a node
        let value = if value == 0.0 { 0.0 } else { value };
        self.intern(Node::Const(OrderedFloat(value)))
    }

    pub fn as_float(&self, e: ExprId) -> Option<Float> {
        match self.node(e) {
            Node::Const(c) => Some(c.0),
            _ => None,
        }
    }

    pub fn is_zero(&self, e: ExprId) -> bool {
        self.as_float(e) == Some(0.0)
    }

    /// Declares a new symbol, or returns the existing one of the same name.
    pub fn symbol(&mut self, name: &str, kind: SymbolKind) -> Result<ExprId> {
        if let Some(&s) = self.symbol_names.get(name) {
            return Ok(self.symbol_nodes[s.index()]);
        }
        let s = self.push_symbol(name, kind, None)?;
        Ok(self.symbol_expr(s))
    }

    pub fn constant(&mut self, name: &str) -> Result<ExprId> {
        self.symbol(name, SymbolKind::Constant)
    }

    pub fn dynamic(&mut self, name: &str) -> Result<ExprId> {
        self.symbol(name, SymbolKind::Dynamic)
    }

    fn push_symbol(
        &mut self,
        name: &str,
        kind: SymbolKind,
        derivative_of: Option<SymbolId>,
    ) -> Result<SymbolId> {
        if self.symbols.len() == MAX_SYMBOLS {
            return Err(Error::SymbolCapacity(MAX_SYMBOLS));
        }
        let id = SymbolId(self.symbols.len() as u16);
        self.symbols.push(Symbol {
            name: name.to_string(),
            kind,
            derivative_of,
        });
        if kind == SymbolKind::Dynamic {
            self.dynamic_mask |= id.mask();
        }
        let node = self.intern(Node::Symbol(id));
        self.symbol_nodes.push(node);
        self.symbol_names.insert(name.to_string(), id);
        Ok(id)
    }

    /// Symbol for the time derivative of a dynamic symbol, created on first use.
    pub fn derivative_symbol(&mut self, s: SymbolId) -> Result<SymbolId> {
        if let Some(&d) = self.derivatives.get(&s) {
            return Ok(d);
        }
        let name = format!("{}'", self.symbols[s.index()].name);
        let d = self.push_symbol(&name, SymbolKind::Dynamic, Some(s))?;
        self.derivatives.insert(s, d);
        Ok(d)
    }

    pub fn symbol_info(&self, s: SymbolId) -> &Symbol {
        &self.symbols[s.index()]
    }

    pub fn symbol_name(&self, s: SymbolId) -> &str {
        &self.symbols[s.index()].name
    }

    pub fn symbol_expr(&self, s: SymbolId) -> ExprId {
        self.symbol_nodes[s.index()]
    }

    pub fn as_symbol(&self, e: ExprId) -> Option<SymbolId> {
        match self.node(e) {
            Node::Symbol(s) => Some(*s),
            _ => None,
        }
    }

    pub fn find_symbol(&self, name: &str) -> Option<SymbolId> {
        self.symbol_names.get(name).copied()
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    pub fn symbols(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> {
        self.symbols
            .iter()
            .enumerate()
            .map(|(i, s)| (SymbolId(i as u16), s))
    }

    fn mask_symbols(&self, mask: u128) -> Vec<SymbolId> {
        (0..self.symbols.len())
            .map(|i| SymbolId(i as u16))
            .filter(|s| mask & s.mask() != 0)
            .collect()
    }

    /// Symbols appearing in any of the expressions, in declaration order.
    pub fn free_symbols(&self, roots: &[ExprId]) -> Vec<SymbolId> {
        let mask = roots.iter().fold(0, |acc, r| acc | self.deps(*r));
        self.mask_symbols(mask)
    }

    /// Time-varying symbols appearing in any of the expressions.
    pub fn dynamic_symbols(&self, roots: &[ExprId]) -> Vec<SymbolId> {
        let mask = roots.iter().fold(0, |acc, r| acc | self.deps(*r));
        self.mask_symbols(mask & self.dynamic_mask)
    }

    pub(crate) fn dynamic_mask(&self) -> u128 {
        self.dynamic_mask
    }

    /// Splits `c * rest` into its numeric coefficient and the remaining term.
    fn split_coefficient(&mut self, e: ExprId) -> (Float, ExprId) {
        if let Node::Mul(factors) = self.node(e) {
            if let Some(c) = self.as_float(factors[0]) {
                let rest: Vec<ExprId> = factors[1..].to_vec();
                let base = if rest.len() == 1 {
                    rest[0]
                } else {
                    self.intern(Node::Mul(rest.into_boxed_slice()))
                };
                return (c, base);
            }
        }
        (1.0, e)
    }

    fn split_power(&self, e: ExprId) -> (ExprId, Float) {
        match self.node(e) {
            Node::Pow(base, exponent) => (*base, exponent.0),
            _ => (e, 1.0),
        }
    }

    pub fn add(&mut self, terms: &[ExprId]) -> ExprId {
        let mut flat = Vec::with_capacity(terms.len());
        for &t in terms {
            match self.node(t) {
                Node::Add(inner) => flat.extend_from_slice(inner),
                _ => flat.push(t),
            }
        }

        let mut constant = 0.0;
        let mut coefficients: BTreeMap<ExprId, Float> = BTreeMap::new();
        for t in flat {
            if let Some(c) = self.as_float(t) {
                constant += c;
                continue;
            }
            let (c, base) = self.split_coefficient(t);
            *coefficients.entry(base).or_insert(0.0) += c;
        }

        let mut out = Vec::with_capacity(coefficients.len() + 1);
        for (base, c) in coefficients {
            if c == 0.0 {
                continue;
            }
            if c == 1.0 {
                out.push(base);
            } else {
                let c = self.float(c);
                out.push(self.mul(&[c, base]));
            }
        }
        out.sort();
        if constant != 0.0 {
            out.insert(0, self.float(constant));
        }
        match out.len() {
            0 => self.zero,
            1 => out[0],
            _ => self.intern(Node::Add(out.into_boxed_slice())),
        }
    }

    pub fn mul(&mut self, factors: &[ExprId]) -> ExprId {
        let mut flat = Vec::with_capacity(factors.len());
        for &f in factors {
            match self.node(f) {
                Node::Mul(inner) => flat.extend_from_slice(inner),
                _ => flat.push(f),
            }
        }

        let mut coefficient = 1.0;
        let mut exponents: BTreeMap<ExprId, Float> = BTreeMap::new();
        for f in flat {
            if let Some(c) = self.as_float(f) {
                coefficient *= c;
                continue;
            }
            let (base, e) = self.split_power(f);
            *exponents.entry(base).or_insert(0.0) += e;
        }
        if coefficient == 0.0 {
            return self.zero;
        }

        let mut out = Vec::with_capacity(exponents.len() + 1);
        for (base, e) in exponents {
            if e == 0.0 {
                continue;
            }
            out.push(if e == 1.0 { base } else { self.pow(base, e) });
        }
        out.sort();
        if out.is_empty() {
            return self.float(coefficient);
        }
        if coefficient != 1.0 {
            out.insert(0, self.float(coefficient));
        }
        match out.len() {
            1 => out[0],
            _ => self.intern(Node::Mul(out.into_boxed_slice())),
        }
    }

    pub fn pow(&mut self, base: ExprId, exponent: Float) -> ExprId {
        if exponent == 0.0 {
            return self.one;
        }
        if exponent == 1.0 {
            return base;
        }
        if let Some(c) = self.as_float(base) {
            return self.float(c.powf(exponent));
        }
        // (b^a)^n = b^(a n) only for integer n
        if let Node::Pow(inner, a) = self.node(base) {
            let (inner, a) = (*inner, a.0);
            if exponent.fract() == 0.0 {
                return self.pow(inner, a * exponent);
            }
        }
        self.intern(Node::Pow(base, OrderedFloat(exponent)))
    }

    pub fn neg(&mut self, a: ExprId) -> ExprId {
        let minus_one = self.float(-1.0);
        self.mul(&[minus_one, a])
    }

    pub fn sub(&mut self, a: ExprId, b: ExprId) -> ExprId {
        let nb = self.neg(b);
        self.add(&[a, nb])
    }

    pub fn div(&mut self, a: ExprId, b: ExprId) -> ExprId {
        let inv = self.pow(b, -1.0);
        self.mul(&[a, inv])
    }

    pub fn sqrt(&mut self, a: ExprId) -> ExprId {
        self.pow(a, 0.5)
    }

    pub fn sin(&mut self, a: ExprId) -> ExprId {
        match self.as_float(a) {
            Some(v) => self.float(v.sin()),
            None => self.intern(Node::Sin(a)),
        }
    }

    pub fn cos(&mut self, a: ExprId) -> ExprId {
        match self.as_float(a) {
            Some(v) => self.float(v.cos()),
            None => self.intern(Node::Cos(a)),
        }
    }

    /// All nodes reachable from `roots`, in ascending (topological) order.
    pub fn reachable(&self, roots: &[ExprId]) -> Vec<ExprId> {
        let mut seen = vec![false; self.nodes.len()];
        let mut stack: Vec<ExprId> = roots.to_vec();
        while let Some(e) = stack.pop() {
            if seen[e.index()] {
                continue;
            }
            seen[e.index()] = true;
            match self.node(e) {
                Node::Add(args) | Node::Mul(args) => stack.extend_from_slice(args),
                Node::Pow(b, _) | Node::Sin(b) | Node::Cos(b) => stack.push(*b),
                Node::Const(_) | Node::Symbol(_) => {}
            }
        }
        seen.iter()
            .enumerate()
            .filter(|(_, s)| **s)
            .map(|(i, _)| ExprId(i as u32))
            .collect()
    }
}

#[cfg(test)]
mod expr_tests {
    use super::*;

    #[test]
    fn like_terms_cancel() {
        // Arrange
        let mut g = ExprGraph::new();
        let x = g.dynamic("x").unwrap();
        let y = g.constant("y").unwrap();

        // Act
        let xy = g.mul(&[x, y]);
        let two_xy = g.add(&[xy, xy]);
        let yx = g.mul(&[y, x]);
        let result = g.sub(two_xy, yx);
        let zero = g.sub(result, xy);

        // Assert
        assert_eq!(result, xy);
        assert_eq!(zero, g.zero());
    }

    #[test]
    fn powers_collect() {
        // Arrange
        let mut g = ExprGraph::new();
        let x = g.dynamic("x").unwrap();

        // Act
        let x2 = g.mul(&[x, x]);
        let x3 = g.mul(&[x2, x]);
        let back = g.div(x3, x2);
        let root = g.sqrt(x);
        let whole = g.mul(&[root, root]);

        // Assert
        assert_eq!(g.node(x3), &Node::Pow(x, OrderedFloat(3.0)));
        assert_eq!(back, x);
        assert_eq!(whole, x);
    }

    #[test]
    fn constants_fold() {
        // Arrange
        let mut g = ExprGraph::new();
        let two = g.float(2.0);
        let three = g.float(3.0);

        // Act
        let sum = g.add(&[two, three]);
        let product = g.mul(&[two, three]);
        let s = g.sin(g.zero());

        // Assert
        assert_eq!(g.as_float(sum), Some(5.0));
        assert_eq!(g.as_float(product), Some(6.0));
        assert_eq!(s, g.zero());
    }

    #[test]
    fn interning_shares_nodes() {
        // Arrange
        let mut g = ExprGraph::new();
        let a = g.dynamic("a").unwrap();
        let b = g.dynamic("b").unwrap();

        // Act
        let ab = g.add(&[a, b]);
        let ba = g.add(&[b, a]);
        let again = g.dynamic("a").unwrap();

        // Assert
        assert_eq!(ab, ba);
        assert_eq!(again, a);
        assert!(ab > a && ab > b);
    }

    #[test]
    fn dynamic_symbols_exclude_constants() {
        // Arrange
        let mut g = ExprGraph::new();
        let q = g.dynamic("q").unwrap();
        let r = g.constant("r").unwrap();
        let s = g.sin(q);
        let e = g.mul(&[r, s]);

        // Act
        let dynamic = g.dynamic_symbols(&[e]);
        let free = g.free_symbols(&[e]);

        // Assert
        assert_eq!(dynamic.len(), 1);
        assert_eq!(g.symbol_name(dynamic[0]), "q");
        assert_eq!(free.len(), 2);
    }

    #[test]
    fn symbol_capacity_is_enforced() {
        // Arrange
        let mut g = ExprGraph::new();
        for i in 0..MAX_SYMBOLS {
            g.constant(&format!("c{}", i)).unwrap();
        }

        // Act
        let result = g.constant("one_too_many");

        // Assert
        assert!(matches!(result, Err(Error::SymbolCapacity(_))));
    }

    #[test]
    fn redeclared_symbol_keeps_its_node() {
        // Arrange
        let mut g = ExprGraph::new();
        let q = g.dynamic("q").unwrap();

        // Act
        let again = g.symbol("q", SymbolKind::Dynamic).unwrap();
        let r = g.constant("r").unwrap();

        // Assert
        assert_eq!(again, q);
        assert_ne!(r, q);
        assert_eq!(g.symbol_count(), 2);
        assert_eq!(g.as_symbol(r).map(|s| g.symbol_name(s).to_string()), Some("r".to_string()));
    }
}
