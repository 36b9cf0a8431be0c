//! Client-side optimistic view: show a tentative value while a request is in flight, then
//! reconcile with what the server returned or fall back to the last known truth.

use std::collections::BTreeMap;

#[derive(Debug, Clone)]
struct Pending<K, V> {
    key: K,
    draft: V,
    seq: u64,
}

/// Tentative-apply ledger keyed by entity, with in-flight requests keyed by request id.
///
/// Confirmed server values are kept apart from the displayed view, so a revert never
/// falls back to a draft the server did not accept.
#[derive(Debug, Clone)]
pub struct TentativeLedger<K, V> {
    confirmed: BTreeMap<K, V>,
    view: BTreeMap<K, V>,
    pending: BTreeMap<String, Pending<K, V>>,
    next_seq: u64,
}

impl<K, V> Default for TentativeLedger<K, V> {
    fn default() -> Self {
        Self {
            confirmed: BTreeMap::new(),
            view: BTreeMap::new(),
            pending: BTreeMap::new(),
            next_seq: 0,
        }
    }
}

impl<K, V> TentativeLedger<K, V>
where
    K: Ord + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Record server state without a request in flight.
    pub fn seed(&mut self, key: K, truth: V) {
        self.confirmed.insert(key.clone(), truth);
        self.refresh(&key);
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.view.get(key)
    }

    /// Last value the server confirmed for `key`.
    pub fn confirmed(&self, key: &K) -> Option<&V> {
        self.confirmed.get(key)
    }

    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// Show `draft` for `key` until the request is confirmed or reverted.
    pub fn apply(&mut self, request_id: impl Into<String>, key: K, draft: V) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.view.insert(key.clone(), draft.clone());
        self.pending.insert(request_id.into(), Pending { key, draft, seq });
    }

    /// Record what the server committed; a newer in-flight draft on the key stays visible.
    pub fn confirm(&mut self, request_id: &str, server_truth: V) -> Option<&V> {
        let pending = self.pending.remove(request_id)?;
        self.confirmed.insert(pending.key.clone(), server_truth);
        self.refresh(&pending.key);
        self.view.get(&pending.key)
    }

    /// Drop the tentative value; the view falls back to the newest remaining draft on the
    /// key, else to the last confirmed server value.
    pub fn revert(&mut self, request_id: &str) -> Option<&V> {
        let pending = self.pending.remove(request_id)?;
        self.refresh(&pending.key);
        self.view.get(&pending.key)
    }

    fn refresh(&mut self, key: &K) {
        let newest_draft = self
            .pending
            .values()
            .filter(|pending| &pending.key == key)
            .max_by_key(|pending| pending.seq)
            .map(|pending| pending.draft.clone());
        match newest_draft.or_else(|| self.confirmed.get(key).cloned()) {
            Some(value) => {
                self.view.insert(key.clone(), value);
            }
            None => {
                self.view.remove(key);
            }
        }
    }
}
