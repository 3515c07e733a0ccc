use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use log::debug;
use uuid::Uuid;

use super::securities_model::Security;
use crate::cache::TtlCache;
use crate::constants::SECURITY_CACHE_TTL_SECS;
use crate::errors::Result;
use crate::store::SecurityStoreTrait;
use crate::utils::time_utils::Clock;

/// Outcome of canonical-id resolution for one batch of provider securities.
#[derive(Debug, Default)]
pub struct Resolution {
    /// Securities rewritten to carry canonical ids.
    pub securities: Vec<Security>,
    /// Provider id -> canonical id, applied to holdings and investment
    /// transactions before they are diffed.
    pub id_map: HashMap<String, String>,
}

/// Resolves provider securities to stable canonical ids.
///
/// Providers may reissue their own id for the same ticker on every call, so
/// matching is by (ticker, currency), with the last seen provider id as a
/// fallback for tickerless instruments. Resolution happens before any
/// upsert; concurrent item syncs therefore agree on the canonical id
/// instead of racing duplicate rows into existence.
pub struct SecurityResolver {
    store: Arc<dyn SecurityStoreTrait>,
    cache: TtlCache<(String, String), String>,
}

impl SecurityResolver {
    pub fn new(store: Arc<dyn SecurityStoreTrait>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            cache: TtlCache::new(Duration::seconds(SECURITY_CACHE_TTL_SECS), clock),
        }
    }

    /// Resolves a batch of incoming securities, minting a fresh canonical
    /// id for anything never seen before.
    pub fn resolve(&self, incoming: Vec<Security>) -> Result<Resolution> {
        let mut resolution = Resolution::default();
        // Ids settled earlier in this batch win over a second provider row
        // for the same ticker.
        let mut batch_seen: HashMap<(String, String), String> = HashMap::new();

        for mut security in incoming {
            let provider_id = security
                .provider_security_id
                .clone()
                .or_else(|| (!security.id.is_empty()).then(|| security.id.clone()));

            let canonical = self.lookup(&security, &batch_seen, provider_id.as_deref())?;
            let id = match canonical {
                Some(id) => id,
                None => {
                    let minted = Uuid::new_v4().to_string();
                    debug!(
                        "Minting canonical id {} for security {:?}",
                        minted, security.ticker_symbol
                    );
                    minted
                }
            };

            if let Some(key) = ticker_key(&security) {
                batch_seen.insert(key.clone(), id.clone());
                self.cache.insert(key, id.clone());
            }
            if let Some(provider_id) = provider_id {
                resolution.id_map.insert(provider_id.clone(), id.clone());
                security.provider_security_id = Some(provider_id);
            }
            security.id = id;
            resolution.securities.push(security);
        }

        Ok(resolution)
    }

    fn lookup(
        &self,
        security: &Security,
        batch_seen: &HashMap<(String, String), String>,
        provider_id: Option<&str>,
    ) -> Result<Option<String>> {
        if let Some(key) = ticker_key(security) {
            if let Some(hit) = batch_seen.get(&key) {
                return Ok(Some(hit.clone()));
            }
            if let Some(hit) = self.cache.get(&key) {
                return Ok(Some(hit));
            }
            let ticker = key.0.as_str();
            if let Some(existing) = self
                .store
                .find_by_ticker(ticker, security.currency.as_deref())?
            {
                debug!("Resolved ticker {} to canonical id {}", ticker, existing.id);
                return Ok(Some(existing.id));
            }
            return Ok(None);
        }
        match provider_id {
            Some(provider_id) => Ok(self
                .store
                .find_by_provider_id(provider_id)?
                .map(|existing| existing.id)),
            None => Ok(None),
        }
    }
}

fn ticker_key(security: &Security) -> Option<(String, String)> {
    security
        .ticker_symbol
        .as_ref()
        .map(|ticker| (ticker.clone(), security.currency.clone().unwrap_or_default()))
}
