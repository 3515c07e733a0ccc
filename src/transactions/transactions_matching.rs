use std::collections::HashMap;

use rust_decimal::Decimal;

use super::transactions_model::Transaction;

/// Index over stored transactions used to match incoming provider rows.
pub struct TransactionMatcher<'a> {
    by_id: HashMap<&'a str, &'a Transaction>,
    by_pending_id: HashMap<&'a str, &'a Transaction>,
    by_fingerprint: HashMap<(&'a str, &'a str, Decimal), &'a Transaction>,
}

impl<'a> TransactionMatcher<'a> {
    pub fn new(stored: &'a [Transaction]) -> Self {
        let mut by_id = HashMap::new();
        let mut by_pending_id = HashMap::new();
        let mut by_fingerprint = HashMap::new();
        for tx in stored {
            by_id.insert(tx.id.as_str(), tx);
            if let Some(pending_id) = tx.pending_transaction_id.as_deref() {
                by_pending_id.insert(pending_id, tx);
            }
            by_fingerprint.insert((tx.account_id.as_str(), tx.name.as_str(), tx.amount), tx);
        }
        Self {
            by_id,
            by_pending_id,
            by_fingerprint,
        }
    }

    /// Finds the stored counterpart of an incoming transaction.
    ///
    /// Exact ids win: the incoming id against stored ids, the incoming
    /// pending id against stored ids, then the incoming id against stored
    /// pending ids (both directions of the pending -> posted transition).
    /// With no id overlap at all, falls back to the (account, name, amount)
    /// fingerprint so a provider that reissues ids does not orphan the
    /// user's labels.
    pub fn find(&self, incoming: &Transaction) -> Option<&'a Transaction> {
        if let Some(tx) = self.by_id.get(incoming.id.as_str()) {
            return Some(tx);
        }
        if let Some(pending_id) = incoming.pending_transaction_id.as_deref() {
            if let Some(tx) = self.by_id.get(pending_id) {
                return Some(tx);
            }
        }
        if let Some(tx) = self.by_pending_id.get(incoming.id.as_str()) {
            return Some(tx);
        }
        self.by_fingerprint
            .get(&(
                incoming.account_id.as_str(),
                incoming.name.as_str(),
                incoming.amount,
            ))
            .copied()
    }
}

/// Upsert plan for one batch of incoming transactions.
#[derive(Debug, Default)]
pub struct ReconcilePlan {
    /// Incoming rows, labels carried over from their stored counterparts.
    pub upserts: Vec<Transaction>,
    /// Stored ids retired by an id transition; their splits must be
    /// migrated to the replacement id before these rows are deleted.
    pub stale_ids: Vec<String>,
}

/// Matches incoming rows against the stored set, carrying user labels over
/// and flagging stored rows whose id the provider retired.
pub fn reconcile_incoming(stored: &[Transaction], incoming: Vec<Transaction>) -> ReconcilePlan {
    let matcher = TransactionMatcher::new(stored);
    let mut plan = ReconcilePlan::default();
    for mut tx in incoming {
        if let Some(stored_tx) = matcher.find(&tx) {
            tx.label = stored_tx.label.clone();
            if stored_tx.id != tx.id {
                plan.stale_ids.push(stored_tx.id.clone());
            }
        }
        plan.upserts.push(tx);
    }
    plan
}
