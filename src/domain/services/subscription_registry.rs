//! Subscription Registry
//!
//! Owns every AF entry and its subscriptions for the lifetime of the process.
//! All mutation happens under one lock that is never held across an await,
//! so id allocation and quota checks are serialized.
//!
//! Creation is split in two (`reserve` then `commit` or `release`) so the
//! caller can talk to the core network between the halves while the slot
//! still counts against the AF's quota.
//!
//! PFD transactions live in the same AF entries; their operations are in
//! the `pfd_transactions` module.

use crate::domain::entities::{
    AfEntry, SouthboundBinding, Subscription, TrafficInfluSub, TrafficInfluSubPatch,
};
use crate::domain::errors::RegistryError;
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Correlation ids start this far above the first subscription id.
pub const CORRELATION_ID_OFFSET: u64 = 20;

/// Capacity settings for the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryLimits {
    /// First subscription id handed out in a fresh AF entry
    pub sub_start_id: u64,
    /// Per-AF cap on subscriptions plus reservations
    pub max_subscriptions: usize,
    /// Cap on concurrently known AFs
    pub max_afs: usize,
    /// Per-AF cap on PFD transactions plus reservations
    pub max_pfd_transactions: usize,
    /// First PFD transaction id handed out in a fresh AF entry
    pub pfd_trans_start_id: u64,
}

impl Default for RegistryLimits {
    fn default() -> Self {
        Self {
            sub_start_id: 2000,
            max_subscriptions: 8,
            max_afs: 16,
            max_pfd_transactions: 8,
            pfd_trans_start_id: 10000,
        }
    }
}

/// A quota slot and subscription id held while the southbound call runs.
///
/// Settled by [`SubscriptionRegistry::commit`]. Dropping it unsettled, for
/// example when the request future is cancelled, gives the slot back.
pub struct Reservation {
    af_id: String,
    sub_id: String,
    location: String,
    state: Arc<Mutex<RegistryState>>,
    settled: bool,
}

impl Reservation {
    pub fn af_id(&self) -> &str {
        &self.af_id
    }

    pub fn sub_id(&self) -> &str {
        &self.sub_id
    }

    pub fn location(&self) -> &str {
        &self.location
    }
}

impl fmt::Debug for Reservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reservation")
            .field("af_id", &self.af_id)
            .field("sub_id", &self.sub_id)
            .field("settled", &self.settled)
            .finish()
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut state = self.state.lock();
        if let Some(entry) = state.afs.get_mut(&self.af_id) {
            entry.pending = entry.pending.saturating_sub(1);
        }
        state.remove_if_empty(&self.af_id);
        tracing::debug!("released reservation {}/{}", self.af_id, self.sub_id);
    }
}

#[derive(Debug, Clone)]
struct SubscriptionKey {
    af_id: String,
    sub_id: String,
}

/// Owner of a provisioned application id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct TransactionKey {
    pub(super) af_id: String,
    pub(super) trans_id: String,
}

#[derive(Debug, Default)]
pub(super) struct RegistryState {
    pub(super) afs: HashMap<String, AfEntry>,
    by_correlation: HashMap<String, SubscriptionKey>,
    /// Application ids claimed by committed or in-flight PFD transactions
    pub(super) by_app: HashMap<String, TransactionKey>,
}

impl RegistryState {
    /// The AF entry for `af_id`, created on demand within the AF cap.
    pub(super) fn entry_or_create(
        &mut self,
        af_id: &str,
        limits: &RegistryLimits,
    ) -> Result<&mut AfEntry, RegistryError> {
        let af_count = self.afs.len();
        match self.afs.entry(af_id.to_string()) {
            Entry::Occupied(slot) => Ok(slot.into_mut()),
            Entry::Vacant(slot) => {
                if af_count >= limits.max_afs {
                    return Err(RegistryError::MaxAfExceeded(limits.max_afs));
                }
                tracing::debug!("created AF entry {}", af_id);
                Ok(slot.insert(AfEntry::new(
                    af_id,
                    limits.sub_start_id,
                    limits.pfd_trans_start_id,
                )))
            }
        }
    }

    fn subscription_mut(
        &mut self,
        af_id: &str,
        sub_id: &str,
    ) -> Result<&mut Subscription, RegistryError> {
        self.afs
            .get_mut(af_id)
            .and_then(|entry| entry.subscriptions.get_mut(sub_id))
            .ok_or_else(|| RegistryError::SubscriptionNotFound {
                af_id: af_id.to_string(),
                sub_id: sub_id.to_string(),
            })
    }

    pub(super) fn remove_if_empty(&mut self, af_id: &str) {
        if self.afs.get(af_id).is_some_and(AfEntry::is_empty) {
            self.afs.remove(af_id);
            tracing::debug!("removed empty AF entry {}", af_id);
        }
    }
}

/// In-memory store of AF entries, subscriptions, PFD transactions and the
/// correlation and application indexes.
pub struct SubscriptionRegistry {
    pub(super) limits: RegistryLimits,
    /// Absolute prefix for Location URIs, e.g. `http://nef:8091/3gpp-traffic-influence/v1/`
    location_prefix: String,
    /// Same for PFD transactions, e.g. `http://nef:8091/3gpp-pfd-management/v1/`
    pub(super) pfd_location_prefix: String,
    pub(super) state: Arc<Mutex<RegistryState>>,
    next_correlation: AtomicU64,
}

impl SubscriptionRegistry {
    pub fn new(limits: RegistryLimits, location_prefix: impl Into<String>) -> Self {
        Self {
            limits,
            location_prefix: location_prefix.into(),
            pfd_location_prefix: "/3gpp-pfd-management/v1/".to_string(),
            state: Arc::new(Mutex::new(RegistryState::default())),
            next_correlation: AtomicU64::new(limits.sub_start_id + CORRELATION_ID_OFFSET),
        }
    }

    /// Set the prefix of PFD transaction Location URIs.
    pub fn with_pfd_location_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.pfd_location_prefix = prefix.into();
        self
    }

    pub fn limits(&self) -> RegistryLimits {
        self.limits
    }

    fn location_for(&self, af_id: &str, sub_id: &str) -> String {
        format!("{}{}/subscriptions/{}", self.location_prefix, af_id, sub_id)
    }

    /// Register an AF explicitly. Returns a snapshot of the new entry.
    pub fn create_af(&self, af_id: &str) -> Result<AfEntry, RegistryError> {
        let mut state = self.state.lock();
        if state.afs.contains_key(af_id) {
            return Err(RegistryError::AfAlreadyExists(af_id.to_string()));
        }
        let entry = state.entry_or_create(af_id, &self.limits)?;
        Ok(entry.clone())
    }

    /// Take a subscription id and a quota slot for `af_id`, creating the AF on demand.
    ///
    /// Fails without touching any state when the AF or subscription cap is hit.
    pub fn reserve(&self, af_id: &str) -> Result<Reservation, RegistryError> {
        let max = self.limits.max_subscriptions;
        if max == 0 {
            return Err(RegistryError::MaxSubscriptionsExceeded {
                af_id: af_id.to_string(),
                max,
            });
        }

        let mut state = self.state.lock();
        let entry = state.entry_or_create(af_id, &self.limits)?;

        if entry.active_count() >= max {
            return Err(RegistryError::MaxSubscriptionsExceeded {
                af_id: af_id.to_string(),
                max,
            });
        }

        entry.pending += 1;
        let sub_id = entry.allocate_id();
        drop(state);

        let location = self.location_for(af_id, &sub_id);
        Ok(Reservation {
            af_id: af_id.to_string(),
            sub_id,
            location,
            state: Arc::clone(&self.state),
            settled: false,
        })
    }

    /// Turn a reservation into a live subscription.
    pub fn commit(
        &self,
        mut reservation: Reservation,
        mut payload: TrafficInfluSub,
        correlation_id: Option<String>,
        binding: Option<SouthboundBinding>,
    ) -> Result<Subscription, RegistryError> {
        reservation.settled = true;
        let af_id = std::mem::take(&mut reservation.af_id);
        let sub_id = std::mem::take(&mut reservation.sub_id);
        let location = std::mem::take(&mut reservation.location);

        payload.self_link = Some(location.clone());
        let subscription = Subscription {
            af_id: af_id.clone(),
            id: sub_id.clone(),
            location,
            correlation_id: correlation_id.clone(),
            payload,
            binding,
        };

        let mut state = self.state.lock();
        let entry = state
            .afs
            .get_mut(&af_id)
            .ok_or_else(|| RegistryError::AfNotFound(af_id.clone()))?;
        entry.pending = entry.pending.saturating_sub(1);
        entry
            .subscriptions
            .insert(sub_id.clone(), subscription.clone());

        if let Some(corr) = correlation_id {
            let previous = state
                .by_correlation
                .insert(corr.clone(), SubscriptionKey { af_id, sub_id });
            if let Some(previous) = previous {
                tracing::warn!(
                    "correlation id {} moved from {}/{}",
                    corr,
                    previous.af_id,
                    previous.sub_id
                );
            }
        }

        Ok(subscription)
    }

    /// Give a reservation back. The id is not reused.
    pub fn release(&self, reservation: Reservation) {
        drop(reservation);
    }

    /// Store a subscription in one step. Returns its location and the stored record.
    pub fn add_subscription(
        &self,
        af_id: &str,
        payload: TrafficInfluSub,
        correlation_id: Option<String>,
    ) -> Result<(String, Subscription), RegistryError> {
        let reservation = self.reserve(af_id)?;
        let subscription = self.commit(reservation, payload, correlation_id, None)?;
        Ok((subscription.location.clone(), subscription))
    }

    pub fn get_subscription(&self, af_id: &str, sub_id: &str) -> Result<Subscription, RegistryError> {
        let state = self.state.lock();
        state
            .afs
            .get(af_id)
            .and_then(|entry| entry.subscriptions.get(sub_id))
            .cloned()
            .ok_or_else(|| RegistryError::SubscriptionNotFound {
                af_id: af_id.to_string(),
                sub_id: sub_id.to_string(),
            })
    }

    /// All subscriptions of an AF, in no particular order.
    pub fn list_subscriptions(&self, af_id: &str) -> Result<Vec<Subscription>, RegistryError> {
        let state = self.state.lock();
        state
            .afs
            .get(af_id)
            .map(|entry| entry.subscriptions.values().cloned().collect())
            .ok_or_else(|| RegistryError::AfNotFound(af_id.to_string()))
    }

    /// Replace the stored payload. The self link, correlation id and binding are kept.
    pub fn update_subscription(
        &self,
        af_id: &str,
        sub_id: &str,
        mut payload: TrafficInfluSub,
    ) -> Result<Subscription, RegistryError> {
        let mut state = self.state.lock();
        let subscription = state.subscription_mut(af_id, sub_id)?;
        payload.self_link = Some(subscription.location.clone());
        subscription.payload = payload;
        Ok(subscription.clone())
    }

    pub fn patch_subscription(
        &self,
        af_id: &str,
        sub_id: &str,
        patch: &TrafficInfluSubPatch,
    ) -> Result<Subscription, RegistryError> {
        let mut state = self.state.lock();
        let subscription = state.subscription_mut(af_id, sub_id)?;
        subscription.payload.apply_patch(patch);
        Ok(subscription.clone())
    }

    /// Remove a subscription, dropping the AF entry once nothing is left in it.
    pub fn delete_subscription(&self, af_id: &str, sub_id: &str) -> Result<Subscription, RegistryError> {
        let mut state = self.state.lock();
        let removed = state
            .afs
            .get_mut(af_id)
            .and_then(|entry| entry.subscriptions.remove(sub_id))
            .ok_or_else(|| RegistryError::SubscriptionNotFound {
                af_id: af_id.to_string(),
                sub_id: sub_id.to_string(),
            })?;

        if let Some(corr) = &removed.correlation_id {
            let indexed_here = state
                .by_correlation
                .get(corr)
                .is_some_and(|key| key.af_id == af_id && key.sub_id == sub_id);
            if indexed_here {
                state.by_correlation.remove(corr);
            }
        }

        state.remove_if_empty(af_id);
        Ok(removed)
    }

    pub fn find_by_correlation(&self, correlation_id: &str) -> Result<Subscription, RegistryError> {
        let state = self.state.lock();
        state
            .by_correlation
            .get(correlation_id)
            .and_then(|key| {
                state
                    .afs
                    .get(&key.af_id)
                    .and_then(|entry| entry.subscriptions.get(&key.sub_id))
            })
            .cloned()
            .ok_or_else(|| RegistryError::CorrelationNotFound(correlation_id.to_string()))
    }

    /// Next correlation id for the core network. Process-wide, never reused.
    pub fn next_correlation_id(&self) -> String {
        self.next_correlation.fetch_add(1, Ordering::Relaxed).to_string()
    }

    pub fn af_count(&self) -> usize {
        self.state.lock().afs.len()
    }

    /// Live subscriptions of an AF, `None` if the AF is unknown.
    pub fn subscription_count(&self, af_id: &str) -> Option<usize> {
        self.state
            .lock()
            .afs
            .get(af_id)
            .map(|entry| entry.subscriptions.len())
    }

    /// Dump every AF and subscription at debug level.
    pub fn log_state(&self) {
        let state = self.state.lock();
        tracing::debug!(
            "registry: {} AFs, {} correlation ids, {} PFD applications",
            state.afs.len(),
            state.by_correlation.len(),
            state.by_app.len()
        );
        for entry in state.afs.values() {
            tracing::debug!(
                "AF {} next_sub_id={} pending={} subscriptions={} next_trans_id={} transactions={}",
                entry.af_id,
                entry.next_sub_id,
                entry.pending,
                entry.subscriptions.len(),
                entry.next_trans_id,
                entry.transactions.len()
            );
            for sub in entry.subscriptions.values() {
                tracing::debug!(
                    "  {} corr={} binding={:?} location={}",
                    sub.id,
                    sub.correlation_id.as_deref().unwrap_or("-"),
                    sub.binding,
                    sub.location
                );
            }
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::domain::value_objects::SouthboundTarget;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::Arc;

    const PREFIX: &str = "http://localhost:8091/3gpp-traffic-influence/v1/";

    // ===== Test Helpers =====

    fn registry(max_subscriptions: usize) -> SubscriptionRegistry {
        SubscriptionRegistry::new(
            RegistryLimits {
                sub_start_id: 2000,
                max_subscriptions,
                max_afs: 4,
                ..RegistryLimits::default()
            },
            PREFIX,
        )
    }

    fn payload(trans_id: &str) -> TrafficInfluSub {
        TrafficInfluSub {
            af_trans_id: Some(trans_id.to_string()),
            af_app_id: Some("app".to_string()),
            notification_destination: Some("http://af/notify".to_string()),
            ..TrafficInfluSub::default()
        }
    }

    // ===== Add Tests =====

    #[test]
    fn test_add_creates_af_and_location() {
        let reg = registry(4);
        let (location, sub) = reg
            .add_subscription("AF_01", payload("t1"), Some("corr-1".to_string()))
            .unwrap();

        assert_eq!(sub.id, "2000");
        assert_eq!(
            location,
            "http://localhost:8091/3gpp-traffic-influence/v1/AF_01/subscriptions/2000"
        );
        assert_eq!(sub.payload.self_link.as_deref(), Some(location.as_str()));
        assert_eq!(reg.af_count(), 1);
        assert_eq!(reg.subscription_count("AF_01"), Some(1));
    }

    #[test]
    fn test_ids_are_sequential_and_distinct() {
        let reg = registry(4);
        let ids: Vec<String> = (0..4)
            .map(|i| reg.add_subscription("AF_01", payload(&format!("t{i}")), None).unwrap().1.id)
            .collect();

        assert_eq!(ids, vec!["2000", "2001", "2002", "2003"]);
    }

    #[test]
    fn test_capacity_exceeded_leaves_state_untouched() {
        let reg = registry(2);
        reg.add_subscription("AF_01", payload("a"), None).unwrap();
        reg.add_subscription("AF_01", payload("b"), None).unwrap();

        let err = reg.add_subscription("AF_01", payload("c"), None).unwrap_err();
        assert_eq!(
            err,
            RegistryError::MaxSubscriptionsExceeded {
                af_id: "AF_01".to_string(),
                max: 2
            }
        );
        assert!(err.is_capacity());
        assert_eq!(reg.subscription_count("AF_01"), Some(2));

        // The failed call did not burn an id
        reg.delete_subscription("AF_01", "2000").unwrap();
        let (_, sub) = reg.add_subscription("AF_01", payload("d"), None).unwrap();
        assert_eq!(sub.id, "2002");
    }

    #[test]
    fn test_ids_not_reused_after_delete() {
        let reg = registry(4);
        reg.add_subscription("AF_01", payload("a"), None).unwrap();
        reg.add_subscription("AF_01", payload("b"), None).unwrap();
        reg.delete_subscription("AF_01", "2001").unwrap();

        let (_, sub) = reg.add_subscription("AF_01", payload("c"), None).unwrap();
        assert_eq!(sub.id, "2002");
    }

    #[test]
    fn test_max_afs() {
        let reg = SubscriptionRegistry::new(
            RegistryLimits {
                sub_start_id: 1,
                max_subscriptions: 2,
                max_afs: 1,
                ..RegistryLimits::default()
            },
            PREFIX,
        );
        reg.add_subscription("AF_01", payload("a"), None).unwrap();

        let err = reg.add_subscription("AF_02", payload("b"), None).unwrap_err();
        assert_eq!(err, RegistryError::MaxAfExceeded(1));
        assert_eq!(reg.af_count(), 1);
    }

    #[test]
    fn test_zero_max_subscriptions_creates_nothing() {
        let reg = registry(0);
        assert!(reg.add_subscription("AF_01", payload("a"), None).is_err());
        assert_eq!(reg.af_count(), 0);
    }

    // ===== create_af Tests =====

    #[test]
    fn test_create_af() {
        let reg = registry(2);
        let entry = reg.create_af("AF_01").unwrap();
        assert_eq!(entry.af_id, "AF_01");
        assert_eq!(entry.next_sub_id, 2000);
        assert_eq!(entry.next_trans_id, 10000);
        assert!(entry.subscriptions.is_empty());
        assert_eq!(entry, AfEntry::new("AF_01", 2000, 10000));

        assert_eq!(
            reg.create_af("AF_01"),
            Err(RegistryError::AfAlreadyExists("AF_01".to_string()))
        );
        assert!(matches!(
            reg.create_af("AF_01"),
            Err(RegistryError::AfAlreadyExists(_))
        ));
    }

    // ===== Reservation Tests =====

    #[test]
    fn test_reservation_counts_against_quota() {
        let reg = registry(1);
        let reservation = reg.reserve("AF_01").unwrap();
        assert_eq!(reservation.sub_id(), "2000");
        assert!(reg.reserve("AF_01").unwrap_err().is_capacity());

        let binding = SouthboundBinding {
            target: SouthboundTarget::Pcf,
            resource_id: "app-session-1".to_string(),
        };
        let sub = reg
            .commit(reservation, payload("a"), None, Some(binding.clone()))
            .unwrap();
        assert_eq!(sub.binding, Some(binding));
        assert_eq!(reg.subscription_count("AF_01"), Some(1));
    }

    #[test]
    fn test_release_removes_empty_af() {
        let reg = registry(2);
        let reservation = reg.reserve("AF_01").unwrap();
        assert_eq!(reservation.af_id(), "AF_01");
        assert_eq!(reg.af_count(), 1);

        reg.release(reservation);
        assert_eq!(reg.af_count(), 0);
        assert_eq!(
            reg.list_subscriptions("AF_01"),
            Err(RegistryError::AfNotFound("AF_01".to_string()))
        );
    }

    #[test]
    fn test_dropped_reservation_is_released() {
        let reg = registry(1);
        {
            let _reservation = reg.reserve("AF_01").unwrap();
            assert!(reg.reserve("AF_01").unwrap_err().is_capacity());
        }
        assert_eq!(reg.af_count(), 0);
        assert!(reg.reserve("AF_01").is_ok());
    }

    #[test]
    fn test_release_keeps_af_with_subscriptions() {
        let reg = registry(3);
        reg.add_subscription("AF_01", payload("a"), None).unwrap();
        let reservation = reg.reserve("AF_01").unwrap();
        assert!(reservation.location().ends_with("/AF_01/subscriptions/2001"));

        reg.release(reservation);
        assert_eq!(reg.subscription_count("AF_01"), Some(1));

        let (_, sub) = reg.add_subscription("AF_01", payload("b"), None).unwrap();
        assert_eq!(sub.id, "2002");
    }

    // ===== Read / Update / Patch Tests =====

    #[test]
    fn test_get_and_list() {
        let reg = registry(4);
        reg.add_subscription("AF_01", payload("a"), None).unwrap();
        reg.add_subscription("AF_01", payload("b"), None).unwrap();

        let sub = reg.get_subscription("AF_01", "2001").unwrap();
        assert_eq!(sub.payload.af_trans_id.as_deref(), Some("b"));

        let ids: HashSet<String> = reg
            .list_subscriptions("AF_01")
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, HashSet::from(["2000".to_string(), "2001".to_string()]));

        let err = reg.get_subscription("AF_01", "9999").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_update_keeps_self_link_and_correlation() {
        let reg = registry(4);
        let (location, _) = reg
            .add_subscription("AF_01", payload("a"), Some("corr-1".to_string()))
            .unwrap();

        let mut replacement = payload("b");
        replacement.self_link = Some("http://spoofed".to_string());
        replacement.dnn = Some("edge".to_string());
        reg.update_subscription("AF_01", "2000", replacement).unwrap();

        let sub = reg.get_subscription("AF_01", "2000").unwrap();
        assert_eq!(sub.payload.af_trans_id.as_deref(), Some("b"));
        assert_eq!(sub.payload.dnn.as_deref(), Some("edge"));
        assert_eq!(sub.payload.self_link.as_deref(), Some(location.as_str()));
        assert_eq!(sub.correlation_id.as_deref(), Some("corr-1"));
    }

    #[test]
    fn test_update_unknown_subscription() {
        let reg = registry(4);
        let err = reg
            .update_subscription("AF_01", "2000", payload("a"))
            .unwrap_err();
        assert!(matches!(err, RegistryError::SubscriptionNotFound { .. }));
    }

    #[test]
    fn test_patch_merges_fields() {
        let reg = registry(4);
        let mut original = payload("a");
        original.traffic_filters = Some(vec![json!({"flowId": 1})]);
        reg.add_subscription("AF_01", original, None).unwrap();

        let patch = TrafficInfluSubPatch {
            app_relo_ind: Some(true),
            ..TrafficInfluSubPatch::default()
        };
        let sub = reg.patch_subscription("AF_01", "2000", &patch).unwrap();
        assert_eq!(sub.payload.app_relo_ind, Some(true));
        assert_eq!(sub.payload.traffic_filters, Some(vec![json!({"flowId": 1})]));
    }

    #[test]
    fn test_empty_patch_is_noop() {
        let reg = registry(4);
        reg.add_subscription("AF_01", payload("a"), None).unwrap();
        let before = reg.get_subscription("AF_01", "2000").unwrap();

        let after = reg
            .patch_subscription("AF_01", "2000", &TrafficInfluSubPatch::default())
            .unwrap();
        assert_eq!(before, after);
    }

    // ===== Delete Tests =====

    #[test]
    fn test_delete_last_subscription_removes_af() {
        let reg = registry(4);
        reg.add_subscription("AF_01", payload("a"), None).unwrap();
        reg.add_subscription("AF_01", payload("b"), None).unwrap();

        reg.delete_subscription("AF_01", "2000").unwrap();
        assert_eq!(reg.af_count(), 1);

        reg.delete_subscription("AF_01", "2001").unwrap();
        assert_eq!(reg.af_count(), 0);
        assert!(reg.list_subscriptions("AF_01").is_err());
    }

    #[test]
    fn test_delete_unknown() {
        let reg = registry(4);
        assert!(reg.delete_subscription("AF_01", "2000").unwrap_err().is_not_found());
    }

    #[test]
    fn test_recreated_af_starts_from_first_id() {
        let reg = registry(4);
        reg.add_subscription("AF_01", payload("a"), None).unwrap();
        reg.delete_subscription("AF_01", "2000").unwrap();

        let (_, sub) = reg.add_subscription("AF_01", payload("b"), None).unwrap();
        assert_eq!(sub.id, "2000");
    }

    // ===== Correlation Tests =====

    #[test]
    fn test_correlation_index_follows_add_and_delete() {
        let reg = registry(4);
        reg.add_subscription("AF_01", payload("a"), Some("corr-1".to_string()))
            .unwrap();
        reg.add_subscription("AF_02", payload("b"), Some("corr-2".to_string()))
            .unwrap();

        let found = reg.find_by_correlation("corr-2").unwrap();
        assert_eq!(found.af_id, "AF_02");
        assert_eq!(found.id, "2000");

        reg.delete_subscription("AF_02", "2000").unwrap();
        assert_eq!(
            reg.find_by_correlation("corr-2"),
            Err(RegistryError::CorrelationNotFound("corr-2".to_string()))
        );
        assert!(reg.find_by_correlation("corr-1").is_ok());
    }

    #[test]
    fn test_next_correlation_id_starts_at_offset() {
        let reg = registry(4);
        assert_eq!(reg.next_correlation_id(), "2020");
        assert_eq!(reg.next_correlation_id(), "2021");
    }

    #[test]
    fn test_log_state_does_not_panic() {
        let reg = registry(4);
        reg.add_subscription("AF_01", payload("a"), Some("corr-1".to_string()))
            .unwrap();
        reg.log_state();
    }

    // ===== Concurrency Tests =====

    #[test]
    fn test_concurrent_adds_respect_quota_and_uniqueness() {
        let reg = Arc::new(registry(50));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let reg = Arc::clone(&reg);
                std::thread::spawn(move || {
                    (0..10)
                        .filter_map(|i| {
                            reg.add_subscription("AF_01", payload(&format!("{t}-{i}")), None)
                                .ok()
                                .map(|(_, sub)| sub.id)
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let ids: Vec<String> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        let unique: HashSet<&String> = ids.iter().collect();

        assert_eq!(ids.len(), 50);
        assert_eq!(unique.len(), 50);
        assert_eq!(reg.subscription_count("AF_01"), Some(50));
    }
}
