mod provider_errors;
mod provider_models;
mod provider_traits;

pub use provider_errors::*;
pub use provider_models::*;
pub use provider_traits::*;
