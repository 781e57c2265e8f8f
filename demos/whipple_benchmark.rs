use std::process::ExitCode;

use tracing::{error, Level};
use whipple::{
    config::PipelineConfig,
    pipeline::{run, PipelineReport},
    Result,
};

/// Derive the Whipple bicycle equations of motion and check them against the
/// Basu-Mandal benchmark accelerations
pub fn main() -> ExitCode {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let config = PipelineConfig::default();
    let outcome = run(&config);
    match &outcome {
        Ok(report) => println!("{}", report),
        Err(e) => error!("{}", e),
    }
    ExitCode::from(exit_status(&outcome))
}

/// Mismatches are part of the printed report; only errors fail the run.
fn exit_status(outcome: &Result<PipelineReport>) -> u8 {
    match outcome {
        Ok(_) => 0,
        Err(_) => 1,
    }
}
