//! Program analyses run between name resolution and transformation

pub mod alias;
pub mod compliance;
pub mod partition;
pub mod side_effects;
