use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Builds the deterministic holding id for an (account, security) pair.
/// Reproducible ids keep holding upserts and snapshot keys idempotent
/// across repeated syncs.
pub fn holding_id(account_id: &str, security_id: &str) -> String {
    format!("{}|{}", account_id, security_id)
}

/// A position in one security inside one account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub id: String,
    pub account_id: String,
    pub security_id: String,
    pub quantity: Decimal,
    pub cost_basis: Option<Decimal>,
    pub institution_price: Option<Decimal>,
    pub institution_value: Option<Decimal>,
    pub iso_currency_code: Option<String>,
}

impl Holding {
    /// Whether the externally observable state matches `other`.
    pub fn observably_equal(&self, other: &Holding) -> bool {
        self.quantity == other.quantity
            && self.cost_basis == other.cost_basis
            && self.institution_price == other.institution_price
            && self.institution_value == other.institution_value
            && self.iso_currency_code == other.iso_currency_code
    }

    /// Terminal state recorded when the holding disappears from the feed:
    /// the position drops to zero instead of leaving a gap in the charts.
    pub fn zeroed(&self) -> Holding {
        Holding {
            quantity: Decimal::ZERO,
            institution_value: Some(Decimal::ZERO),
            ..self.clone()
        }
    }
}
