//! Named symbols of the bicycle model.
//!
//! External records (benchmark tables, parameter sets) refer to quantities by
//! name. The names map onto symbols through these enums, so a record key is
//! either a known symbol or it is reported and skipped.

use crate::{
    error::Result,
    expr::{ExprGraph, ExprId, SymbolId},
};

macro_rules! symbol_names {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }

            pub fn index(self) -> usize {
                self as usize
            }
        }
    };
}

symbol_names! {
    /// Geometry, mass and inertia parameters plus gravity.
    Constant {
        Rf => "rf",
        Rr => "rr",
        D1 => "d1",
        D2 => "d2",
        D3 => "d3",
        L1 => "l1",
        L2 => "l2",
        L3 => "l3",
        L4 => "l4",
        G => "g",
        Mc => "mc",
        Md => "md",
        Me => "me",
        Mf => "mf",
        Ic11 => "ic11",
        Ic22 => "ic22",
        Ic33 => "ic33",
        Ic31 => "ic31",
        Id11 => "id11",
        Id22 => "id22",
        Ie11 => "ie11",
        Ie22 => "ie22",
        Ie33 => "ie33",
        Ie31 => "ie31",
        If11 => "if11",
        If22 => "if22",
    }
}

symbol_names! {
    /// Generalized coordinates: rear contact position (q1, q2), yaw, roll,
    /// pitch, rear wheel angle, steer, front wheel angle.
    Coordinate {
        Q1 => "q1",
        Q2 => "q2",
        Q3 => "q3",
        Q4 => "q4",
        Q5 => "q5",
        Q6 => "q6",
        Q7 => "q7",
        Q8 => "q8",
    }
}

symbol_names! {
    Speed {
        U1 => "u1",
        U2 => "u2",
        U3 => "u3",
        U4 => "u4",
        U5 => "u5",
        U6 => "u6",
        U7 => "u7",
        U8 => "u8",
    }
}

symbol_names! {
    /// Specified inputs: roll torque, rear wheel torque, steer torque.
    Input {
        T4 => "T4",
        T6 => "T6",
        T7 => "T7",
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Declared {
    pub symbol: SymbolId,
    pub expr: ExprId,
}

fn declare(graph: &mut ExprGraph, name: &str, dynamic: bool) -> Result<Declared> {
    let expr = if dynamic {
        graph.dynamic(name)?
    } else {
        graph.constant(name)?
    };
    let symbol = match graph.as_symbol(expr) {
        Some(s) => s,
        None => unreachable!("symbol constructor returned a composite node"),
    };
    Ok(Declared { symbol, expr })
}

/// Every symbol of the model, declared once in a graph.
#[derive(Clone, Debug)]
pub struct SymbolTable {
    constants: Vec<Declared>,
    coordinates: Vec<Declared>,
    speeds: Vec<Declared>,
    inputs: Vec<Declared>,
}

impl SymbolTable {
    pub fn declare(graph: &mut ExprGraph) -> Result<Self> {
        let mut decl = |names: Vec<&'static str>, dynamic: bool| -> Result<Vec<Declared>> {
            names.into_iter().map(|n| declare(graph, n, dynamic)).collect()
        };
        let constants = decl(Constant::ALL.iter().map(|c| c.name()).collect(), false)?;
        let coordinates = decl(Coordinate::ALL.iter().map(|c| c.name()).collect(), true)?;
        let speeds = decl(Speed::ALL.iter().map(|c| c.name()).collect(), true)?;
        let inputs = decl(Input::ALL.iter().map(|c| c.name()).collect(), true)?;
        Ok(SymbolTable {
            constants,
            coordinates,
            speeds,
            inputs,
        })
    }

    pub fn constant(&self, c: Constant) -> Declared {
        self.constants[c.index()]
    }

    pub fn q(&self, c: Coordinate) -> Declared {
        self.coordinates[c.index()]
    }

    pub fn u(&self, s: Speed) -> Declared {
        self.speeds[s.index()]
    }

    pub fn input(&self, i: Input) -> Declared {
        self.inputs[i.index()]
    }

    /// Constant symbols in declaration order.
    pub fn constants(&self) -> &[Declared] {
        &self.constants
    }

    pub fn inputs(&self) -> &[Declared] {
        &self.inputs
    }

    pub fn lookup_constant(&self, name: &str) -> Option<Declared> {
        Constant::from_name(name).map(|c| self.constant(c))
    }

    /// Coordinates, speeds and inputs by name.
    pub fn lookup_dynamic(&self, name: &str) -> Option<Declared> {
        if let Some(c) = Coordinate::from_name(name) {
            return Some(self.q(c));
        }
        if let Some(s) = Speed::from_name(name) {
            return Some(self.u(s));
        }
        Input::from_name(name).map(|i| self.input(i))
    }
}

#[cfg(test)]
mod symbols_tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for c in Constant::ALL {
            assert_eq!(Constant::from_name(c.name()), Some(*c));
        }
        assert_eq!(Constant::ALL.len(), 26);
        assert_eq!(Speed::from_name("u9"), None);
        assert_eq!(Input::from_name("T7"), Some(Input::T7));
    }

    #[test]
    fn table_lookups() {
        // Arrange
        let mut graph = ExprGraph::new();

        // Act
        let table = SymbolTable::declare(&mut graph).unwrap();

        // Assert
        let rr = table.lookup_constant("rr").unwrap();
        assert_eq!(graph.symbol_name(rr.symbol), "rr");
        assert!(table.lookup_constant("q1").is_none());
        assert_eq!(table.lookup_dynamic("u6"), Some(table.u(Speed::U6)));
        assert!(table.lookup_dynamic("ic12").is_none());
        assert_eq!(graph.dynamic_symbols(&[rr.expr]), vec![]);
    }
}
