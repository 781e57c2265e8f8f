//! The full derivation and validation run, stage by stage.

use std::{fmt, path::PathBuf};

use tracing::{info, warn};

use crate::{
    benchmark::{
        basu_table_one_input, basu_table_one_output, basu_to_moore, benchmark_parameters,
        benchmark_to_moore, field, moore_to_basu,
    },
    builders::whipple_builder::{build_whipple, WhippleModel},
    config::PipelineConfig,
    constraint::IdentityCheck,
    error::Result,
    expr::{ExprCache, ExprGraph, ExprId, SymbolId},
    kane::EquationsOfMotion,
    numeric::{
        substitute::evaluate_f64, DirectSubstitution, Evaluation, Evaluator, ExactSubstitution,
        GeneratedFunction,
    },
    output::write_matrix_to_file,
    substitution::{build_substitution, SubstitutionMap},
    symbols::{Input, Speed},
    types::{Float, Record},
    validation::{compare_arrays, validate_against, ArrayComparison, Tolerance, ValidationReport},
};

/// Results of one evaluation path carried through to the benchmark table.
#[derive(Clone, Debug)]
pub struct PathResult {
    pub evaluation: Evaluation,
    /// u1p..u8p in the model convention.
    pub accelerations: Record,
    /// The state and accelerations in the published convention.
    pub basu: Record,
    pub validation: ValidationReport,
}

#[derive(Clone, Debug)]
pub struct PipelineReport {
    pub holonomic_symbols: Vec<String>,
    pub nonholonomic_symbols: Vec<Vec<String>>,
    pub mass_matrix_symbols: Vec<String>,
    pub forcing_symbols: Vec<String>,
    pub identity: IdentityCheck,
    pub files: Vec<PathBuf>,
    pub skipped: Vec<String>,
    /// Symbols of M, F or q' with no value. Numeric evaluation is skipped
    /// when any are missing.
    pub missing: Vec<String>,
    pub comparisons: Vec<ArrayComparison>,
    /// x' = [q', u'] from the generated right-hand side.
    pub state_derivatives: Vec<Float>,
    pub paths: Vec<PathResult>,
}

impl PipelineReport {
    /// All path comparisons agree and every path reproduces the table.
    pub fn passed(&self) -> bool {
        self.missing.is_empty()
            && self.comparisons.iter().all(|c| c.passed())
            && self.paths.iter().all(|p| p.validation.passed())
    }
}

fn names(graph: &ExprGraph, symbols: &[SymbolId]) -> Vec<String> {
    symbols.iter().map(|s| graph.symbol_name(*s).to_string()).collect()
}

/// Model substitution values: benchmark constants, the published state and
/// zero applied torques.
pub fn benchmark_substitution(model: &WhippleModel) -> Result<(SubstitutionMap, Vec<String>, Record)> {
    let bp = benchmark_parameters();
    let mp = benchmark_to_moore(&bp)?;
    let moore_input = basu_to_moore(&basu_table_one_input(), field(&bp, "rR")?, field(&bp, "lam")?)?;
    let mut dynamic = moore_input.clone();
    for input in Input::ALL {
        dynamic.insert(input.name().to_string(), 0.0);
    }
    let substitution = build_substitution(&model.symbols, &mp, &dynamic);
    Ok((substitution.map, substitution.skipped, moore_input))
}

/// Names of the symbols of M, F and the kinematic right-hand side that
/// `values` does not bind.
pub fn audit_substitution(
    graph: &ExprGraph,
    eom: &EquationsOfMotion,
    values: &SubstitutionMap,
) -> Vec<String> {
    let mut roots = eom.roots();
    roots.extend(eom.kinematic_rhs.iter().copied());
    let missing = values.missing(graph, &roots);
    for name in &missing {
        warn!("{} has no numerical value", name);
    }
    missing
}

fn compare(
    comparisons: &mut Vec<ArrayComparison>,
    reference: &Evaluation,
    other: &Evaluation,
    tolerance: Tolerance,
) {
    let pairs = [
        ("M", reference.mass_matrix.as_slice(), other.mass_matrix.as_slice()),
        ("F", reference.forcing.as_slice(), other.forcing.as_slice()),
        ("u'", reference.speed_derivatives.as_slice(), other.speed_derivatives.as_slice()),
    ];
    for (what, desired, actual) in pairs {
        let label = format!("{} {} vs {}", what, other.label, reference.label);
        comparisons.push(compare_arrays(&label, actual, desired, tolerance));
    }
}

/// Completes the acceleration record of one path and checks it against
/// the published table.
#[allow(clippy::too_many_arguments)]
fn carry_through(
    graph: &ExprGraph,
    eom: &EquationsOfMotion,
    values: &SubstitutionMap,
    contact: &[ExprId; 2],
    rate_symbols: &[SymbolId; 2],
    moore_input: &Record,
    evaluation: Evaluation,
    tolerance: Tolerance,
) -> Result<PathResult> {
    let mut accelerations = Record::new();
    for (u, value) in eom.speeds.iter().zip(evaluation.speed_derivatives.iter()) {
        accelerations.insert(format!("{}p", graph.symbol_name(*u)), *value);
    }

    let mut with_rates = values.clone();
    for (rate, name) in rate_symbols.iter().zip(["u5p", "u6p"]) {
        with_rates.insert(*rate, field(&accelerations, name)?);
    }
    let contact_values = evaluate_f64(graph, contact, &with_rates)?;
    accelerations.insert("u1p".to_string(), contact_values[0]);
    accelerations.insert("u2p".to_string(), contact_values[1]);

    let bp = benchmark_parameters();
    let mut moore = moore_input.clone();
    moore.extend(accelerations.iter().map(|(k, v)| (k.clone(), *v)));
    let basu = moore_to_basu(&moore, field(&bp, "rR")?, field(&bp, "lam")?)?;
    let reference = basu_table_one_output();
    let computed: Record = basu
        .iter()
        .filter(|(k, _)| k.ends_with("dd"))
        .map(|(k, v)| (k.clone(), *v))
        .collect();
    let validation = validate_against(&evaluation.label, &computed, &reference, tolerance);

    Ok(PathResult {
        evaluation,
        accelerations,
        basu,
        validation,
    })
}

pub fn run(config: &PipelineConfig) -> Result<PipelineReport> {
    info!("Building the Whipple bicycle model");
    let mut model = build_whipple(ExprCache::new(config.cache_capacity))?;

    info!("Checking the holonomic constraint against the vertical contact velocity");
    let identity = model.check_holonomic(
        config.holonomic_samples,
        config.holonomic_seed,
        config.holonomic_tolerance,
    )?;

    info!("Forming the equations of motion");
    let eom = model.equations_of_motion()?;
    let contact = model.contact_accelerations()?;
    let rate_symbols = [
        model.mech.graph.derivative_symbol(model.symbols.u(Speed::U5).symbol)?,
        model.mech.graph.derivative_symbol(model.symbols.u(Speed::U6).symbol)?,
    ];

    let graph = &model.mech.graph;
    let mass_matrix: Vec<ExprId> = eom.mass_matrix.transpose().iter().copied().collect();
    let forcing: Vec<ExprId> = eom.forcing.iter().copied().collect();
    let holonomic_symbols = names(graph, &graph.dynamic_symbols(&[model.holonomic]));
    let nonholonomic_symbols = model
        .nonholonomic
        .iter()
        .map(|e| names(graph, &graph.dynamic_symbols(&[*e])))
        .collect();
    let mass_matrix_symbols = names(graph, &graph.dynamic_symbols(&mass_matrix));
    let forcing_symbols = names(graph, &graph.dynamic_symbols(&forcing));
    info!("The mass matrix is a function of {:?}", mass_matrix_symbols);
    info!("The forcing vector is a function of {:?}", forcing_symbols);

    info!("Writing mass matrix and forcing vector to files");
    let funcs_of_time: Vec<SymbolId> = eom.coordinates.iter().chain(&eom.speeds).copied().collect();
    let n = eom.speeds.len();
    let files = vec![
        config.output_dir.join("mass_matrix.txt"),
        config.output_dir.join("forcing_vector.txt"),
    ];
    write_matrix_to_file(graph, &mass_matrix, (n, n), &files[0], &funcs_of_time)?;
    write_matrix_to_file(graph, &forcing, (n, 1), &files[1], &funcs_of_time)?;

    info!("Substituting the benchmark parameters and state");
    let (values, skipped, moore_input) = benchmark_substitution(&model)?;

    let missing = audit_substitution(graph, &eom, &values);
    let (comparisons, state_derivatives, paths) = if !missing.is_empty() {
        warn!("Skipping numerical evaluation, {} symbols have no value", missing.len());
        (vec![], vec![], vec![])
    } else {
        info!("Generating the numerical right-hand side");
        let constants: Vec<SymbolId> = model.symbols.constants().iter().map(|d| d.symbol).collect();
        let specified = model.specified();
        let generated = GeneratedFunction::generate(
            graph,
            &eom,
            &specified,
            &constants,
            Some(&config.codegen_dir),
        )?;

        let exact = ExactSubstitution::exact().evaluate(graph, &eom, &values)?;
        let direct = DirectSubstitution::direct().evaluate(graph, &eom, &values)?;
        let from_generated = generated.evaluate(graph, &eom, &values)?;

        let mut comparisons = vec![];
        compare(&mut comparisons, &exact, &direct, config.array_tolerance);
        compare(&mut comparisons, &exact, &from_generated, config.array_tolerance);

        let (state, specified_values, constant_values) = generated.arguments(&values)?;
        let state_derivatives: Vec<Float> = generated
            .ode
            .rhs(&state, 0.0, &specified_values, &constant_values)?
            .iter()
            .copied()
            .collect();

        info!("Validating against the published accelerations");
        let mut paths = vec![];
        for evaluation in [exact, from_generated] {
            paths.push(carry_through(
                graph,
                &eom,
                &values,
                &contact,
                &rate_symbols,
                &moore_input,
                evaluation,
                config.validation_tolerance,
            )?);
        }
        (comparisons, state_derivatives, paths)
    };

    Ok(PipelineReport {
        holonomic_symbols,
        nonholonomic_symbols,
        mass_matrix_symbols,
        forcing_symbols,
        identity,
        files,
        skipped,
        missing,
        comparisons,
        state_derivatives,
        paths,
    })
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Holonomic constraint depends on {:?}", self.holonomic_symbols)?;
        for (i, symbols) in self.nonholonomic_symbols.iter().enumerate() {
            writeln!(f, "Nonholonomic constraint {} depends on {:?}", i, symbols)?;
        }
        writeln!(f, "Mass matrix depends on {:?}", self.mass_matrix_symbols)?;
        writeln!(f, "Forcing vector depends on {:?}", self.forcing_symbols)?;
        writeln!(
            f,
            "Holonomic derivative identity: {} samples, max residual {:e}",
            self.identity.samples, self.identity.max_residual
        )?;
        for path in &self.files {
            writeln!(f, "Wrote {}", path.display())?;
        }
        for name in &self.skipped {
            writeln!(f, "{} not added to substitution map", name)?;
        }
        for name in &self.missing {
            writeln!(f, "{} has no numerical value", name)?;
        }
        for comparison in &self.comparisons {
            writeln!(f, "{}", comparison)?;
        }
        writeln!(f, "State derivatives (generated): {:?}", self.state_derivatives)?;
        for path in &self.paths {
            writeln!(f, "Accelerations ({}):", path.evaluation.label)?;
            for (k, v) in &path.accelerations {
                writeln!(f, "  {} = {:.13}", k, v)?;
            }
            write!(f, "{}", path.validation)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod pipeline_tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::validation::FieldOutcome;

    fn run_in_temp(name: &str) -> PipelineReport {
        let dir = std::env::temp_dir().join(format!("whipple_{}_{}", name, std::process::id()));
        let config = PipelineConfig {
            output_dir: dir.clone(),
            codegen_dir: dir.join("codegen"),
            ..PipelineConfig::default()
        };
        let report = run(&config).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();
        report
    }

    #[test]
    fn benchmark_state_reproduces_published_accelerations() {
        // Arrange
        let expected_mass_row = [
            81.13351302862712,
            0.7287104623824412,
            0.15611319540315063,
            24.44634938154454,
            2.9544024528871833,
            0.06920791814630425,
        ];
        let expected_forcing = [
            615.7749214001967,
            -22.04867616889873,
            28.51515519715552,
            -0.37155275930023524,
            -1.1523340879601702,
            0.07984418843158883,
        ];
        let expected_udot = [
            ("u4p", 7.855528112824378),
            ("u6p", -1.847255414421868),
            ("u7p", 4.619890403939095),
            ("u3p", -0.835328170637688),
            ("u5p", -0.1205543897886),
            ("u8p", -2.454807290455259),
        ];

        // Act
        let report = run_in_temp("scenario_one");

        // Assert
        let exact = &report.paths[0];
        for (j, v) in expected_mass_row.iter().enumerate() {
            assert_relative_eq!(exact.evaluation.mass_matrix[(0, j)], *v, max_relative = 1e-8);
        }
        for (i, v) in expected_forcing.iter().enumerate() {
            assert_relative_eq!(exact.evaluation.forcing[i], *v, max_relative = 1e-8);
        }
        for (name, v) in expected_udot {
            assert_relative_eq!(exact.accelerations[name], v, max_relative = 1e-6);
        }
        for path in &report.paths {
            assert!(path.validation.passed(), "{}", path.validation);
            assert!(matches!(
                path.validation.field("psifdd"),
                Some(FieldOutcome::Matched { .. })
            ));
        }
        assert_eq!(report.identity.samples, PipelineConfig::default().holonomic_samples);
    }

    #[test]
    fn generated_function_agrees_with_exact_substitution() {
        // Arrange
        let report = run_in_temp("scenario_two");

        // Act
        let exact = &report.paths[0].evaluation;
        let generated = &report.paths[1].evaluation;

        // Assert
        assert_eq!(generated.label, "generated function");
        for (a, b) in exact.speed_derivatives.iter().zip(generated.speed_derivatives.iter()) {
            assert_relative_eq!(*b, *a, max_relative = 1e-8);
        }
        assert!(report.comparisons.iter().all(|c| c.passed()));
        assert_eq!(report.state_derivatives.len(), 10);
        assert_relative_eq!(
            report.state_derivatives[4],
            exact.speed_derivatives[0],
            max_relative = 1e-8
        );
        assert!(report.passed());
    }

    #[test]
    fn report_lists_symbols_and_skipped_parameters() {
        // Arrange
        let report = run_in_temp("report");

        // Act
        let text = report.to_string();

        // Assert
        for name in ["ic12", "ic23", "id33", "ie12", "ie23", "if33"] {
            assert!(report.skipped.iter().any(|s| s == name), "{} not skipped", name);
        }
        assert!(text.contains("ic12 not added to substitution map"));
        assert!(report.holonomic_symbols.iter().all(|s| s.starts_with('q')));
        assert!(report.forcing_symbols.iter().any(|s| s == "T4"));
        assert_eq!(report.files.len(), 2);
    }

    #[test]
    fn unbound_constant_is_reported_before_evaluation() {
        // Arrange
        let mut model = build_whipple(ExprCache::new(1 << 20)).unwrap();
        let eom = model.equations_of_motion().unwrap();
        let (mut values, _, _) = benchmark_substitution(&model).unwrap();
        let gravity = model.symbols.lookup_constant("g").unwrap();
        let graph = &model.mech.graph;
        let complete = audit_substitution(graph, &eom, &values);

        // Act
        values.remove(gravity.symbol);
        let missing = audit_substitution(graph, &eom, &values);

        // Assert
        assert!(complete.is_empty());
        assert_eq!(missing, vec!["g".to_string()]);
    }
}
