//! Published reference data for the Whipple bicycle and the conversions
//! between its parameterizations.
//!
//! References:
//!   Meijaard, Papadopoulos, Ruina & Schwab, "Linearized dynamics equations
//!   for the balance and steer of a bicycle: a benchmark and review", 2007.
//!   Basu-Mandal, Chatterjee & Papadopoulos, "Hands-free circular motions of
//!   a benchmark bicycle", 2007.
//!   Moore, "Human Control of a Bicycle", 2012.

use crate::{
    error::{Error, Result},
    types::{Float, Record},
};

pub mod basu;
pub mod parameters;

pub use basu::{basu_table_one_input, basu_table_one_output, basu_to_moore, moore_to_basu};
pub use parameters::{benchmark_parameters, benchmark_to_moore};

/// Builds a record from literal pairs.
pub fn record(pairs: &[(&str, Float)]) -> Record {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

pub(crate) fn field(record: &Record, key: &str) -> Result<Float> {
    record
        .get(key)
        .copied()
        .ok_or_else(|| Error::MissingField(key.to_string()))
}
