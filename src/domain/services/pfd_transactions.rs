//! PFD transactions in the subscription registry
//!
//! A transaction is created in two halves like a subscription:
//! `reserve_transaction` takes a transaction slot and id and claims the
//! application ids, the caller writes the UDR, then `commit_transaction`
//! stores it. Application ids are unique across every AF, so the claim is
//! made under the registry lock and later requests for the same id are
//! reported as duplicates.

use super::subscription_registry::{RegistryState, SubscriptionRegistry, TransactionKey};
use crate::domain::entities::{application_location, PfdData, PfdManagement, PfdTransaction};
use crate::domain::errors::RegistryError;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// A transaction slot, id and the application ids claimed for it.
///
/// Settled by [`SubscriptionRegistry::commit_transaction`]. Dropping it
/// unsettled gives the slot and the claimed application ids back.
pub struct TransactionReservation {
    af_id: String,
    trans_id: String,
    location: String,
    claimed: Vec<String>,
    duplicated: Vec<String>,
    state: Arc<Mutex<RegistryState>>,
    settled: bool,
}

impl TransactionReservation {
    pub fn af_id(&self) -> &str {
        &self.af_id
    }

    pub fn trans_id(&self) -> &str {
        &self.trans_id
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Application ids now held by this reservation.
    pub fn claimed(&self) -> &[String] {
        &self.claimed
    }

    /// Application ids another transaction already holds.
    pub fn duplicated(&self) -> &[String] {
        &self.duplicated
    }
}

impl fmt::Debug for TransactionReservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionReservation")
            .field("af_id", &self.af_id)
            .field("trans_id", &self.trans_id)
            .field("claimed", &self.claimed)
            .field("settled", &self.settled)
            .finish()
    }
}

impl Drop for TransactionReservation {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut state = self.state.lock();
        for app_id in &self.claimed {
            state.release_app(app_id, &self.af_id, &self.trans_id);
        }
        if let Some(entry) = state.afs.get_mut(&self.af_id) {
            entry.pending_transactions = entry.pending_transactions.saturating_sub(1);
        }
        state.remove_if_empty(&self.af_id);
        tracing::debug!("released PFD reservation {}/{}", self.af_id, self.trans_id);
    }
}

impl RegistryState {
    /// Drop the index entry for `app_id` if it still points at this transaction.
    fn release_app(&mut self, app_id: &str, af_id: &str, trans_id: &str) {
        let owned_here = self
            .by_app
            .get(app_id)
            .is_some_and(|key| key.af_id == af_id && key.trans_id == trans_id);
        if owned_here {
            self.by_app.remove(app_id);
        }
    }

    fn transaction_mut(
        &mut self,
        af_id: &str,
        trans_id: &str,
    ) -> Result<&mut PfdTransaction, RegistryError> {
        self.afs
            .get_mut(af_id)
            .and_then(|entry| entry.transactions.get_mut(trans_id))
            .ok_or_else(|| RegistryError::TransactionNotFound {
                af_id: af_id.to_string(),
                trans_id: trans_id.to_string(),
            })
    }
}

fn stamp_links(location: &str, payload: &mut PfdManagement) {
    payload.self_link = Some(location.to_string());
    for (app_id, data) in payload.pfd_datas.iter_mut() {
        data.self_link = Some(application_location(location, app_id));
    }
}

impl SubscriptionRegistry {
    fn transaction_location(&self, af_id: &str, trans_id: &str) -> String {
        format!("{}{}/transactions/{}", self.pfd_location_prefix, af_id, trans_id)
    }

    /// Take a transaction id and slot for `af_id` and claim `app_ids`.
    ///
    /// Ids already held by another transaction are not claimed and are
    /// listed in [`TransactionReservation::duplicated`]. Fails without
    /// touching any state when the AF or transaction cap is hit.
    pub fn reserve_transaction(
        &self,
        af_id: &str,
        app_ids: &[String],
    ) -> Result<TransactionReservation, RegistryError> {
        let max = self.limits.max_pfd_transactions;
        if max == 0 {
            return Err(RegistryError::MaxTransactionsExceeded {
                af_id: af_id.to_string(),
                max,
            });
        }

        let mut state = self.state.lock();
        let entry = state.entry_or_create(af_id, &self.limits)?;
        if entry.transaction_count() >= max {
            return Err(RegistryError::MaxTransactionsExceeded {
                af_id: af_id.to_string(),
                max,
            });
        }
        entry.pending_transactions += 1;
        let trans_id = entry.allocate_trans_id();

        let (duplicated, claimed): (Vec<String>, Vec<String>) = app_ids
            .iter()
            .cloned()
            .partition(|app_id| state.by_app.contains_key(app_id));
        for app_id in &claimed {
            state.by_app.insert(
                app_id.clone(),
                TransactionKey {
                    af_id: af_id.to_string(),
                    trans_id: trans_id.clone(),
                },
            );
        }
        drop(state);

        let location = self.transaction_location(af_id, &trans_id);
        Ok(TransactionReservation {
            af_id: af_id.to_string(),
            trans_id,
            location,
            claimed,
            duplicated,
            state: Arc::clone(&self.state),
            settled: false,
        })
    }

    /// Store the transaction. Applications the reservation did not claim
    /// are dropped from the payload.
    pub fn commit_transaction(
        &self,
        mut reservation: TransactionReservation,
        mut payload: PfdManagement,
    ) -> Result<PfdTransaction, RegistryError> {
        reservation.settled = true;
        let af_id = std::mem::take(&mut reservation.af_id);
        let trans_id = std::mem::take(&mut reservation.trans_id);
        let location = std::mem::take(&mut reservation.location);
        let claimed = std::mem::take(&mut reservation.claimed);

        payload
            .pfd_datas
            .retain(|app_id, _| claimed.contains(app_id));
        stamp_links(&location, &mut payload);

        let transaction = PfdTransaction {
            af_id: af_id.clone(),
            id: trans_id.clone(),
            location,
            payload,
        };

        let mut state = self.state.lock();
        let entry = state
            .afs
            .get_mut(&af_id)
            .ok_or_else(|| RegistryError::AfNotFound(af_id.clone()))?;
        entry.pending_transactions = entry.pending_transactions.saturating_sub(1);
        entry.transactions.insert(trans_id, transaction.clone());

        // Claims for applications that did not make it into the payload
        for app_id in claimed {
            if !transaction.payload.pfd_datas.contains_key(&app_id) {
                state.release_app(&app_id, &af_id, &transaction.id);
            }
        }

        Ok(transaction)
    }

    pub fn get_transaction(&self, af_id: &str, trans_id: &str) -> Result<PfdTransaction, RegistryError> {
        let state = self.state.lock();
        state
            .afs
            .get(af_id)
            .and_then(|entry| entry.transactions.get(trans_id))
            .cloned()
            .ok_or_else(|| RegistryError::TransactionNotFound {
                af_id: af_id.to_string(),
                trans_id: trans_id.to_string(),
            })
    }

    /// All PFD transactions of an AF, in no particular order.
    pub fn list_transactions(&self, af_id: &str) -> Result<Vec<PfdTransaction>, RegistryError> {
        let state = self.state.lock();
        state
            .afs
            .get(af_id)
            .map(|entry| entry.transactions.values().cloned().collect())
            .ok_or_else(|| RegistryError::AfNotFound(af_id.to_string()))
    }

    /// Fail if any of `app_ids` belongs to a transaction other than this one.
    pub fn check_apps_available(
        &self,
        af_id: &str,
        trans_id: &str,
        app_ids: &[String],
    ) -> Result<(), RegistryError> {
        let state = self.state.lock();
        check_owner(&state, af_id, trans_id, app_ids)
    }

    /// Replace the applications of a transaction. The self links are
    /// recomputed and the application index follows the new set.
    pub fn replace_transaction(
        &self,
        af_id: &str,
        trans_id: &str,
        mut payload: PfdManagement,
    ) -> Result<PfdTransaction, RegistryError> {
        let mut state = self.state.lock();
        let new_ids = payload.app_ids();
        check_owner(&state, af_id, trans_id, &new_ids)?;

        let transaction = state.transaction_mut(af_id, trans_id)?;
        stamp_links(&transaction.location, &mut payload);
        let old_ids = transaction.payload.app_ids();
        transaction.payload = payload;
        let updated = transaction.clone();

        for app_id in old_ids.iter().filter(|id| !new_ids.contains(id)) {
            state.release_app(app_id, af_id, trans_id);
        }
        for app_id in new_ids {
            state.by_app.insert(
                app_id,
                TransactionKey {
                    af_id: af_id.to_string(),
                    trans_id: trans_id.to_string(),
                },
            );
        }
        Ok(updated)
    }

    /// Remove a transaction and free its application ids.
    pub fn delete_transaction(&self, af_id: &str, trans_id: &str) -> Result<PfdTransaction, RegistryError> {
        let mut state = self.state.lock();
        let removed = state
            .afs
            .get_mut(af_id)
            .and_then(|entry| entry.transactions.remove(trans_id))
            .ok_or_else(|| RegistryError::TransactionNotFound {
                af_id: af_id.to_string(),
                trans_id: trans_id.to_string(),
            })?;

        for app_id in removed.payload.pfd_datas.keys() {
            state.release_app(app_id, af_id, trans_id);
        }
        state.remove_if_empty(af_id);
        Ok(removed)
    }

    pub fn get_application(&self, af_id: &str, trans_id: &str, app_id: &str) -> Result<PfdData, RegistryError> {
        let transaction = self.get_transaction(af_id, trans_id)?;
        transaction
            .payload
            .pfd_datas
            .get(app_id)
            .cloned()
            .ok_or_else(|| RegistryError::ApplicationNotFound {
                trans_id: trans_id.to_string(),
                app_id: app_id.to_string(),
            })
    }

    /// Replace one application of a transaction. Its self link is kept.
    pub fn replace_application(
        &self,
        af_id: &str,
        trans_id: &str,
        app_id: &str,
        mut data: PfdData,
    ) -> Result<PfdData, RegistryError> {
        let mut state = self.state.lock();
        let transaction = state.transaction_mut(af_id, trans_id)?;
        let slot = transaction
            .payload
            .pfd_datas
            .get_mut(app_id)
            .ok_or_else(|| RegistryError::ApplicationNotFound {
                trans_id: trans_id.to_string(),
                app_id: app_id.to_string(),
            })?;
        data.self_link = slot.self_link.clone();
        *slot = data;
        Ok(slot.clone())
    }

    /// Remove one application. The transaction stays, even when empty.
    pub fn delete_application(
        &self,
        af_id: &str,
        trans_id: &str,
        app_id: &str,
    ) -> Result<PfdData, RegistryError> {
        let mut state = self.state.lock();
        let transaction = state.transaction_mut(af_id, trans_id)?;
        let removed = transaction
            .payload
            .pfd_datas
            .remove(app_id)
            .ok_or_else(|| RegistryError::ApplicationNotFound {
                trans_id: trans_id.to_string(),
                app_id: app_id.to_string(),
            })?;
        state.release_app(app_id, af_id, trans_id);
        Ok(removed)
    }

    /// Whether any AF's transaction already provisions `app_id`.
    pub fn app_id_in_use(&self, app_id: &str) -> bool {
        self.state.lock().by_app.contains_key(app_id)
    }

    /// PFD transactions of an AF, `None` if the AF is unknown.
    pub fn transaction_count(&self, af_id: &str) -> Option<usize> {
        self.state
            .lock()
            .afs
            .get(af_id)
            .map(|entry| entry.transactions.len())
    }
}

fn check_owner(
    state: &RegistryState,
    af_id: &str,
    trans_id: &str,
    app_ids: &[String],
) -> Result<(), RegistryError> {
    for app_id in app_ids {
        if let Some(owner) = state.by_app.get(app_id) {
            if owner.af_id != af_id || owner.trans_id != trans_id {
                return Err(RegistryError::AppIdDuplicated(app_id.clone()));
            }
        }
    }
    Ok(())
}
