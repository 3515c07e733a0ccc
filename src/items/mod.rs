mod items_model;
mod items_traits;

pub use items_model::*;
pub use items_traits::*;
