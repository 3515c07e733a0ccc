mod transactions_matching;
mod transactions_model;

pub use transactions_matching::*;
pub use transactions_model::*;
