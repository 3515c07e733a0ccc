mod snapshot_engine;
mod snapshot_model;

pub use snapshot_engine::*;
pub use snapshot_model::*;

#[cfg(test)]
mod snapshot_engine_tests;
