use std::path::PathBuf;

use crate::{types::Float, validation::Tolerance};

/// Settings for one run of the derivation and validation pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    /// Where mass_matrix.txt and forcing_vector.txt are written.
    pub output_dir: PathBuf,
    /// Working directory for the generated right-hand-side source.
    pub codegen_dir: PathBuf,
    /// Entries kept in the derivative memo before FIFO eviction.
    pub cache_capacity: usize,
    pub holonomic_samples: usize,
    pub holonomic_seed: u64,
    pub holonomic_tolerance: Float,
    /// Agreement required between evaluation paths.
    pub array_tolerance: Tolerance,
    /// Agreement required with the published accelerations.
    pub validation_tolerance: Tolerance,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let output_dir = PathBuf::from("whipple_output");
        Self {
            codegen_dir: output_dir.join("codegen"),
            output_dir,
            cache_capacity: 1 << 20,
            holonomic_samples: 5,
            holonomic_seed: 0,
            holonomic_tolerance: 1e-9,
            array_tolerance: Tolerance::new(1e-8, 1e-10),
            validation_tolerance: Tolerance::new(1e-7, 0.0),
        }
    }
}
