use std::collections::BTreeMap;

pub type Float = f64;

/// Flat name-to-value mapping used for parameter sets, states and
/// benchmark tables.
pub type Record = BTreeMap<String, Float>;
