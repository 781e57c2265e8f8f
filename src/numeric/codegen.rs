//! Compilation of expression lists into a flat instruction tape.
//!
//! The tape is the generated function: its arguments are fixed at compile
//! time, every node becomes one instruction writing one slot, and a plain
//! Rust listing of the same program can be written next to it.

use std::{
    collections::HashMap,
    fmt::Write as _,
    fs,
    path::{Path, PathBuf},
};

use na::{DMatrix, DVector};
use tracing::{debug, info};

use super::{Evaluation, Evaluator};
use crate::{
    dynamics::dynamics_solve,
    error::{Error, Result},
    expr::{ExprGraph, ExprId, Node, Scalar, SymbolId},
    kane::EquationsOfMotion,
    substitution::SubstitutionMap,
    types::Float,
};

#[derive(Clone, Debug, PartialEq)]
pub enum Instr {
    Const(Float),
    /// Reads argument `i`.
    Input(usize),
    Add(Vec<usize>),
    Mul(Vec<usize>),
    Pow(usize, Float),
    Sin(usize),
    Cos(usize),
}

#[derive(Clone, Debug)]
pub struct Tape {
    instructions: Vec<Instr>,
    outputs: Vec<usize>,
    arguments: Vec<String>,
}

impl Tape {
    /// Compiles `outputs` into a tape taking `arguments` in order. Every
    /// symbol reached from `outputs` must be an argument.
    pub fn compile(graph: &ExprGraph, outputs: &[ExprId], arguments: &[SymbolId]) -> Result<Tape> {
        let position: HashMap<SymbolId, usize> =
            arguments.iter().enumerate().map(|(i, s)| (*s, i)).collect();
        let order = graph.reachable(outputs);
        let mut slot_of: HashMap<ExprId, usize> = HashMap::with_capacity(order.len());
        let mut instructions = Vec::with_capacity(order.len());

        for e in order {
            let slot = |x: &ExprId| slot_of[x];
            let instr = match graph.node(e) {
                Node::Const(c) => Instr::Const(c.0),
                Node::Symbol(s) => match position.get(s) {
                    Some(i) => Instr::Input(*i),
                    None => {
                        return Err(Error::generation(format!(
                            "{} is not an argument of the generated function",
                            graph.symbol_name(*s)
                        )))
                    }
                },
                Node::Add(terms) => Instr::Add(terms.iter().map(slot).collect()),
                Node::Mul(factors) => Instr::Mul(factors.iter().map(slot).collect()),
                Node::Pow(base, exponent) => Instr::Pow(slot(base), exponent.0),
                Node::Sin(arg) => Instr::Sin(slot(arg)),
                Node::Cos(arg) => Instr::Cos(slot(arg)),
            };
            slot_of.insert(e, instructions.len());
            instructions.push(instr);
        }

        Ok(Tape {
            instructions,
            outputs: outputs.iter().map(|e| slot_of[e]).collect(),
            arguments: arguments
                .iter()
                .map(|s| graph.symbol_name(*s).to_string())
                .collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn n_arguments(&self) -> usize {
        self.arguments.len()
    }

    pub fn n_outputs(&self) -> usize {
        self.outputs.len()
    }

    /// Runs the tape.
    pub fn call(&self, inputs: &[Float]) -> Result<Vec<Float>> {
        if inputs.len() != self.arguments.len() {
            return Err(Error::ArgumentLength {
                argument: "inputs",
                expected: self.arguments.len(),
                actual: inputs.len(),
            });
        }
        let mut slots: Vec<Float> = Vec::with_capacity(self.instructions.len());
        for instr in &self.instructions {
            let value = match instr {
                Instr::Const(c) => *c,
                Instr::Input(i) => inputs[*i],
                Instr::Add(terms) => {
                    let mut acc = slots[terms[0]];
                    for t in &terms[1..] {
                        acc += slots[*t];
                    }
                    acc
                }
                Instr::Mul(factors) => {
                    let mut acc = slots[factors[0]];
                    for f in &factors[1..] {
                        acc *= slots[*f];
                    }
                    acc
                }
                Instr::Pow(base, exponent) => Scalar::powf(slots[*base], *exponent),
                Instr::Sin(arg) => slots[*arg].sin(),
                Instr::Cos(arg) => slots[*arg].cos(),
            };
            slots.push(value);
        }
        Ok(self.outputs.iter().map(|o| slots[*o]).collect())
    }

    /// A Rust listing equivalent to the tape.
    pub fn source(&self, name: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "// Arguments: {}", self.arguments.join(", "));
        let _ = writeln!(
            out,
            "pub fn {}(input: &[f64; {}], output: &mut [f64; {}]) {{",
            name,
            self.arguments.len(),
            self.outputs.len()
        );
        for (i, instr) in self.instructions.iter().enumerate() {
            let rhs = match instr {
                Instr::Const(c) => format!("{:?}", c),
                Instr::Input(a) => format!("input[{}]", a),
                Instr::Add(terms) => join_slots(terms, " + "),
                Instr::Mul(factors) => join_slots(factors, " * "),
                Instr::Pow(base, exponent) => {
                    if exponent.fract() == 0.0 {
                        format!("x{}.powi({})", base, *exponent as i32)
                    } else {
                        format!("x{}.powf({:?})", base, exponent)
                    }
                }
                Instr::Sin(arg) => format!("x{}.sin()", arg),
                Instr::Cos(arg) => format!("x{}.cos()", arg),
            };
            let _ = writeln!(out, "    let x{} = {};", i, rhs);
        }
        for (i, slot) in self.outputs.iter().enumerate() {
            let _ = writeln!(out, "    output[{}] = x{};", i, slot);
        }
        out.push_str("}\n");
        out
    }
}

fn join_slots(slots: &[usize], separator: &str) -> String {
    slots
        .iter()
        .map(|s| format!("x{}", s))
        .collect::<Vec<_>>()
        .join(separator)
}

/// Right-hand side of the first-order system x' = f(x, t, r, p) with
/// state x = [q, u], specified inputs r and constants p.
#[derive(Clone, Debug)]
pub struct OdeFunction {
    tape: Tape,
    n_q: usize,
    n_u: usize,
    n_specified: usize,
    n_constants: usize,
    pub source_path: Option<PathBuf>,
}

impl OdeFunction {
    /// Tape outputs are M row-major, then F, then the kinematic right-hand
    /// sides; arguments are q, u, specified, constants.
    pub fn generate(
        graph: &ExprGraph,
        eom: &EquationsOfMotion,
        specified: &[SymbolId],
        constants: &[SymbolId],
        directory: Option<&Path>,
    ) -> Result<OdeFunction> {
        let mut outputs = eom.roots();
        outputs.extend(eom.kinematic_rhs.iter().copied());
        let arguments: Vec<SymbolId> = eom
            .coordinates
            .iter()
            .chain(&eom.speeds)
            .chain(specified)
            .chain(constants)
            .copied()
            .collect();
        let tape = Tape::compile(graph, &outputs, &arguments)?;
        info!(instructions = tape.len(), arguments = arguments.len(), "compiled right-hand side");

        let source_path = match directory {
            Some(dir) => {
                let path = dir.join("whipple_rhs.rs");
                fs::create_dir_all(dir)
                    .and_then(|_| fs::write(&path, tape.source("whipple_rhs")))
                    .map_err(|e| Error::generation(format!("writing {}: {}", path.display(), e)))?;
                debug!(path = %path.display(), "wrote generated source");
                Some(path)
            }
            None => None,
        };

        Ok(OdeFunction {
            tape,
            n_q: eom.coordinates.len(),
            n_u: eom.speeds.len(),
            n_specified: specified.len(),
            n_constants: constants.len(),
            source_path,
        })
    }

    pub fn tape(&self) -> &Tape {
        &self.tape
    }

    fn check(argument: &'static str, expected: usize, actual: usize) -> Result<()> {
        if expected != actual {
            return Err(Error::ArgumentLength {
                argument,
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// M(q), F(q, u, r) and q' = k(u) at one point.
    pub fn mass_matrix_and_forcing(
        &self,
        state: &[Float],
        specified: &[Float],
        constants: &[Float],
    ) -> Result<(DMatrix<Float>, DVector<Float>, DVector<Float>)> {
        Self::check("state", self.n_q + self.n_u, state.len())?;
        Self::check("specified", self.n_specified, specified.len())?;
        Self::check("constants", self.n_constants, constants.len())?;

        let inputs: Vec<Float> = state
            .iter()
            .chain(specified)
            .chain(constants)
            .copied()
            .collect();
        let out = self.tape.call(&inputs)?;
        let n = self.n_u;
        let mass_matrix = DMatrix::from_row_slice(n, n, &out[..n * n]);
        let forcing = DVector::from_column_slice(&out[n * n..n * n + n]);
        let kinematic = DVector::from_column_slice(&out[n * n + n..]);
        Ok((mass_matrix, forcing, kinematic))
    }

    /// x' = [q', u']. Time does not appear explicitly.
    pub fn rhs(
        &self,
        state: &[Float],
        _t: Float,
        specified: &[Float],
        constants: &[Float],
    ) -> Result<DVector<Float>> {
        let (mass_matrix, forcing, kinematic) =
            self.mass_matrix_and_forcing(state, specified, constants)?;
        let udot = dynamics_solve(&mass_matrix, &forcing)?;
        Ok(DVector::from_iterator(
            self.n_q + self.n_u,
            kinematic.iter().chain(udot.iter()).copied(),
        ))
    }
}

/// Evaluator backed by an `OdeFunction`; argument values are read from the
/// substitution map.
#[derive(Clone, Debug)]
pub struct GeneratedFunction {
    pub ode: OdeFunction,
    state: Vec<SymbolId>,
    specified: Vec<SymbolId>,
    constants: Vec<SymbolId>,
    symbol_names: Vec<String>,
}

impl GeneratedFunction {
    pub fn generate(
        graph: &ExprGraph,
        eom: &EquationsOfMotion,
        specified: &[SymbolId],
        constants: &[SymbolId],
        directory: Option<&Path>,
    ) -> Result<Self> {
        let ode = OdeFunction::generate(graph, eom, specified, constants, directory)?;
        Ok(Self {
            ode,
            state: eom.coordinates.iter().chain(&eom.speeds).copied().collect(),
            specified: specified.to_vec(),
            constants: constants.to_vec(),
            symbol_names: graph.symbols().map(|(_, s)| s.name.clone()).collect(),
        })
    }

    fn gather(&self, symbols: &[SymbolId], values: &SubstitutionMap) -> Result<Vec<Float>> {
        symbols
            .iter()
            .map(|s| {
                values
                    .get(*s)
                    .ok_or_else(|| Error::MissingValue(self.symbol_names[s.index()].clone()))
            })
            .collect()
    }

    /// State, specified and constant argument vectors from `values`.
    pub fn arguments(
        &self,
        values: &SubstitutionMap,
    ) -> Result<(Vec<Float>, Vec<Float>, Vec<Float>)> {
        Ok((
            self.gather(&self.state, values)?,
            self.gather(&self.specified, values)?,
            self.gather(&self.constants, values)?,
        ))
    }
}

impl Evaluator for GeneratedFunction {
    fn label(&self) -> &str {
        "generated function"
    }

    fn evaluate(
        &self,
        _graph: &ExprGraph,
        _eom: &EquationsOfMotion,
        values: &SubstitutionMap,
    ) -> Result<Evaluation> {
        let (state, specified, constants) = self.arguments(values)?;
        let (mass_matrix, forcing, _) =
            self.ode
                .mass_matrix_and_forcing(&state, &specified, &constants)?;
        let speed_derivatives = dynamics_solve(&mass_matrix, &forcing)?;
        Ok(Evaluation {
            label: self.label().to_string(),
            mass_matrix,
            forcing,
            speed_derivatives,
        })
    }
}
