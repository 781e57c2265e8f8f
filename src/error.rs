//! Error types for the derivation and evaluation pipeline.

use thiserror::Error;

use crate::types::Float;

/// Errors raised while building, deriving or evaluating the model.
///
/// Structural problems (frames, points, constraints, code generation) abort
/// the pipeline. Numeric disagreements are never errors; they are reported
/// through `validation`.
#[derive(Debug, Error)]
pub enum Error {
    /// A frame was oriented or given an angular velocity twice.
    #[error("frame {0} is already defined relative to a parent")]
    FrameRedefined(String),

    /// An angular velocity was given relative to a frame other than the parent.
    #[error("frame {frame} has parent {parent}, cannot set angular velocity relative to {given}")]
    ParentMismatch {
        frame: String,
        parent: String,
        given: String,
    },

    /// Two frames are not connected by a chain of orientations.
    #[error("no orientation path between frames {from} and {to}")]
    NoOrientationPath { from: String, to: String },

    /// A point velocity was requested before it was defined.
    #[error("velocity of point {0} has not been defined")]
    VelocityUndefined(String),

    /// Two points do not share a position tree.
    #[error("points {0} and {1} are not connected")]
    PointsDisconnected(String, String),

    /// The expression graph tracks dependencies in a fixed-width mask.
    #[error("expression graph holds at most {0} symbols")]
    SymbolCapacity(usize),

    /// The holonomic constraint derivative disagrees with the nonholonomic
    /// constraint it should reproduce.
    #[error(
        "modeling inconsistency at sample {sample}: d/dt(holonomic) = {derivative}, \
         nonholonomic = {constraint}"
    )]
    ModelInconsistent {
        sample: usize,
        derivative: Float,
        constraint: Float,
    },

    /// A dependent coordinate appears in none of the configuration constraints.
    #[error("dependent coordinate {0} is not fixed by any configuration constraint")]
    UnconstrainedCoordinate(String),

    /// A symbol needed for numeric evaluation has no value.
    #[error("no numerical value for symbol {0}")]
    MissingValue(String),

    /// A record lacks a field that a conversion requires.
    #[error("record is missing field {0}")]
    MissingField(String),

    /// Compiling the equations of motion into a callable function failed.
    #[error("code generation failed: {0}")]
    Generation(String),

    /// A generated function was called with the wrong number of arguments.
    #[error("{argument} has length {actual}, expected {expected}")]
    ArgumentLength {
        argument: &'static str,
        expected: usize,
        actual: usize,
    },

    /// LU factorization of a numeric matrix failed.
    #[error("singular linear system in {0}")]
    SingularSystem(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn no_orientation_path(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::NoOrientationPath {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn generation(reason: impl Into<String>) -> Self {
        Self::Generation(reason.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
