use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::{
    expr::{ExprGraph, ExprId, Scalar, SymbolId},
    symbols::SymbolTable,
    types::{Float, Record},
};

/// Numerical values bound to symbols of a graph.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubstitutionMap {
    values: BTreeMap<SymbolId, Float>,
}

impl SubstitutionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, symbol: SymbolId, value: Float) {
        self.values.insert(symbol, value);
    }

    pub fn remove(&mut self, symbol: SymbolId) -> Option<Float> {
        self.values.remove(&symbol)
    }

    pub fn get(&self, symbol: SymbolId) -> Option<Float> {
        self.values.get(&symbol).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Dense value table indexed by symbol, as `ExprGraph::evaluate` expects.
    pub fn dense<S: Scalar>(&self, graph: &ExprGraph) -> Vec<Option<S>> {
        let mut dense = vec![None; graph.symbol_count()];
        for (s, v) in &self.values {
            dense[s.index()] = Some(S::from_f64(*v));
        }
        dense
    }

    /// Names of symbols used by `roots` that have no value.
    pub fn missing(&self, graph: &ExprGraph, roots: &[ExprId]) -> Vec<String> {
        graph
            .free_symbols(roots)
            .into_iter()
            .filter(|s| !self.values.contains_key(s))
            .map(|s| graph.symbol_name(s).to_string())
            .collect()
    }
}

/// A substitution map together with the record keys that matched no symbol.
#[derive(Clone, Debug, Default)]
pub struct Substitution {
    pub map: SubstitutionMap,
    pub skipped: Vec<String>,
}

/// Binds record values to model symbols by name. Constants are looked up
/// among the model constants, everything in `dynamic` among coordinates,
/// speeds and inputs. Keys with no matching symbol are skipped and reported.
pub fn build_substitution(symbols: &SymbolTable, constants: &Record, dynamic: &Record) -> Substitution {
    let mut out = Substitution::default();
    for (name, value) in constants {
        match symbols.lookup_constant(name) {
            Some(d) => out.map.insert(d.symbol, *value),
            None => {
                warn!("{} not added to substitution map", name);
                out.skipped.push(name.clone());
            }
        }
    }
    for (name, value) in dynamic {
        match symbols.lookup_dynamic(name) {
            Some(d) => out.map.insert(d.symbol, *value),
            None => {
                warn!("{} not added to substitution map", name);
                out.skipped.push(name.clone());
            }
        }
    }
    debug!(
        bound = out.map.len(),
        skipped = out.skipped.len(),
        "substitution map built"
    );
    out
}

#[cfg(test)]
mod substitution_tests {
    use super::*;

    fn record(pairs: &[(&str, Float)]) -> Record {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn unknown_names_are_skipped() {
        // Arrange
        let mut graph = ExprGraph::new();
        let symbols = SymbolTable::declare(&mut graph).unwrap();
        let constants = record(&[("rr", 0.3), ("ic12", 0.0), ("g", 9.81)]);
        let dynamic = record(&[("q4", 0.1), ("u6", -5.0), ("T7", 0.0), ("z", 0.2)]);

        // Act
        let sub = build_substitution(&symbols, &constants, &dynamic);

        // Assert
        assert_eq!(sub.skipped, vec!["ic12".to_string(), "z".to_string()]);
        assert_eq!(sub.map.len(), 5);
        let u6 = symbols.lookup_dynamic("u6").unwrap();
        assert_eq!(sub.map.get(u6.symbol), Some(-5.0));
    }

    #[test]
    fn missing_symbols_are_listed() {
        // Arrange
        let mut graph = ExprGraph::new();
        let symbols = SymbolTable::declare(&mut graph).unwrap();
        let rr = symbols.lookup_constant("rr").unwrap();
        let q3 = symbols.lookup_dynamic("q3").unwrap();
        let c = graph.cos(q3.expr);
        let e = graph.mul(&[rr.expr, c]);
        let sub = build_substitution(&symbols, &record(&[("rr", 0.3)]), &Record::new());

        // Act
        let missing = sub.map.missing(&graph, &[e]);
        let dense = sub.map.dense::<Float>(&graph);

        // Assert
        assert_eq!(missing, vec!["q3".to_string()]);
        assert_eq!(dense[rr.symbol.index()], Some(0.3));
        assert!(graph.evaluate(&[e], &dense).is_err());
    }
}
