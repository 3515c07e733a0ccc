use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A tradable security.
///
/// The id is canonical: assigned by this store on first sight and stable
/// even when a provider reissues its own id for the same ticker on a later
/// call. Providers are matched back to the canonical row by
/// (ticker, currency), falling back to the last seen provider id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Security {
    pub id: String,
    /// The id the provider used for this security on the most recent fetch.
    pub provider_security_id: Option<String>,
    pub ticker_symbol: Option<String>,
    pub name: Option<String>,
    pub currency: Option<String>,
    pub close_price: Option<Decimal>,
    pub close_price_as_of: Option<NaiveDate>,
}

impl Security {
    /// Whether `incoming` carries a newer closing price than this record:
    /// a later as-of date, or a different price for the same as-of date.
    pub fn price_advanced_by(&self, incoming: &Security) -> bool {
        let Some(new_price) = incoming.close_price else {
            return false;
        };
        match self.close_price {
            None => true,
            Some(old_price) => {
                if incoming.close_price_as_of > self.close_price_as_of {
                    true
                } else if incoming.close_price_as_of == self.close_price_as_of {
                    new_price != old_price
                } else {
                    false
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn security(price: Option<Decimal>, as_of: Option<&str>) -> Security {
        Security {
            id: "sec-1".to_string(),
            ticker_symbol: Some("AAPL".to_string()),
            close_price: price,
            close_price_as_of: as_of.map(|d| d.parse().unwrap()),
            ..Security::default()
        }
    }

    #[test]
    fn price_advances_on_a_newer_as_of_date() {
        let stored = security(Some(dec!(190)), Some("2024-03-04"));
        let incoming = security(Some(dec!(191)), Some("2024-03-05"));
        assert!(stored.price_advanced_by(&incoming));
        assert!(!incoming.price_advanced_by(&stored));
    }

    #[test]
    fn same_day_correction_counts_as_an_advance() {
        let stored = security(Some(dec!(190)), Some("2024-03-04"));
        let corrected = security(Some(dec!(190.5)), Some("2024-03-04"));
        assert!(stored.price_advanced_by(&corrected));
    }

    #[test]
    fn an_identical_or_missing_price_does_not_advance() {
        let stored = security(Some(dec!(190)), Some("2024-03-04"));
        assert!(!stored.price_advanced_by(&stored.clone()));
        assert!(!stored.price_advanced_by(&security(None, None)));
    }
}
