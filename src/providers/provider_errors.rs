use thiserror::Error;

/// Errors surfaced by provider API clients.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Credentials are invalid or revoked; the item must be re-linked.
    #[error("Provider login required: {0}")]
    LoginRequired(String),

    /// The provider does not support the requested product for this item.
    #[error("Product not supported: {0}")]
    ProductNotSupported(String),

    /// The item has no investment accounts. A normal shape of the data for
    /// most items; suppressed entirely by the sync routines.
    #[error("No investment accounts on item")]
    NoInvestmentAccounts,

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Item-level failures that flag the item and end its current sync path.
    pub fn is_item_error(&self) -> bool {
        matches!(
            self,
            ProviderError::LoginRequired(_) | ProviderError::ProductNotSupported(_)
        )
    }

    /// Conditions that are not errors at all and must not be logged as such.
    pub fn is_ignorable(&self) -> bool {
        matches!(self, ProviderError::NoInvestmentAccounts)
    }
}
