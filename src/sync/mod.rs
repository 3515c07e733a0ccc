mod plaid_sync_service;
mod simplefin_sync_service;
mod sync_models;

pub use plaid_sync_service::*;
pub use simplefin_sync_service::*;
pub use sync_models::*;

#[cfg(test)]
mod simplefin_sync_tests;
