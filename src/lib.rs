pub extern crate nalgebra as na;

pub mod benchmark;
pub mod builders;
pub mod config;
pub mod constraint;
pub mod dynamics;
pub mod error;
pub mod expr;
pub mod frame;
pub mod inertia;
pub mod kane;
pub mod mechanism;
pub mod numeric;
pub mod output;
pub mod pipeline;
pub mod point;
pub mod rigid_body;
pub mod substitution;
pub mod symbols;
pub mod types;
pub mod util;
pub mod validation;
pub mod vector;

pub use error::{Error, Result};
