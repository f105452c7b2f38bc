//! Optimistic local-state synchronization.
//!
//! [`OptimisticMutator`] owns the [`EntityStore`] and splits every write into
//! two halves: a `begin_*` call that applies the change locally and claims the
//! listing id, and a `resolve_*` call that runs once the gateway answers.
//!
//! * delete: remove locally; on failure re-insert at the original position
//!   with the favorite flag it had;
//! * favorite toggle: flip locally; on failure flip back;
//! * create and edit: nothing changes locally until the committed record
//!   arrives, so there is nothing to roll back.
//!
//! A second mutation on a claimed id is rejected with [`MutationError::Busy`],
//! never queued. Nothing here performs I/O.

use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::entity_store::EntityStore;
use crate::gateway::GatewayError;
use crate::model::{FavoriteRelation, Listing, ListingId, Session};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MutationError {
    #[error("a mutation for {0} is already in flight")]
    Busy(ListingId),

    #[error("listing {0} is not loaded")]
    NotFound(ListingId),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MutatorMetrics {
    pub applied: u64,
    pub committed: u64,
    pub rolled_back: u64,
    pub busy_rejections: u64,
    pub gateway_failures: u64,
}

/// Rollback data for a claimed id.
#[derive(Debug, Clone)]
enum Pending {
    Delete {
        index: usize,
        record: Box<Listing>,
        was_favorite: bool,
    },
    Favorite {
        previous: bool,
    },
    Update,
}

impl Pending {
    const fn kind(&self) -> &'static str {
        match self {
            Self::Delete { .. } => "delete",
            Self::Favorite { .. } => "favorite",
            Self::Update => "update",
        }
    }
}

#[derive(Debug, Clone)]
pub struct OptimisticMutator {
    store: EntityStore,
    pending: HashMap<ListingId, Pending>,
    metrics: MutatorMetrics,
}

impl Default for OptimisticMutator {
    fn default() -> Self {
        Self::new(crate::MAX_CACHED_LISTINGS)
    }
}

impl OptimisticMutator {
    pub fn new(max_cached_listings: usize) -> Self {
        Self {
            store: EntityStore::new(max_cached_listings),
            pending: HashMap::new(),
            metrics: MutatorMetrics::default(),
        }
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn metrics(&self) -> MutatorMetrics {
        self.metrics
    }

    pub fn is_in_flight(&self, id: &ListingId) -> bool {
        self.pending.contains_key(id)
    }

    pub fn set_max_cached_listings(&mut self, max_len: usize) {
        self.store.set_max_len(max_len);
    }

    /// Apply a fetched listing set. Records with a delete in flight stay out
    /// so a stale server copy cannot resurrect them.
    #[instrument(skip_all, fields(incoming = records.len()))]
    pub fn apply_refresh(&mut self, records: Vec<Listing>) -> usize {
        let records: Vec<Listing> = records
            .into_iter()
            .filter(|l| !matches!(self.pending.get(&l.id), Some(Pending::Delete { .. })))
            .collect();
        self.store.replace_all(records);
        self.reapply_pending_favorites();
        info!(count = self.store.len(), "store refreshed");
        self.store.len()
    }

    /// Replace favorite flags with the server's relations. A toggle still in
    /// flight keeps its optimistic value.
    pub fn seed_favorites(&mut self, relations: Vec<FavoriteRelation>) -> usize {
        let count = relations.len();
        self.store
            .replace_favorites(relations.into_iter().map(|r| r.listing_id));
        self.reapply_pending_favorites();
        count
    }

    /// Fold a single fetched record into the store if it is loaded.
    pub fn reconcile_fetched(&mut self, listing: Listing) -> bool {
        self.store.reconcile(listing)
    }

    pub fn begin_create(&mut self, session: &Session) -> Result<(), MutationError> {
        if session.role.can_manage_listings() {
            Ok(())
        } else {
            Err(MutationError::Forbidden(
                "only landlords can create listings".into(),
            ))
        }
    }

    /// Claim `id` for an edit. The store is untouched until the server
    /// confirms.
    #[instrument(skip(self, session), fields(listing_id = %id, actor = %session.actor_id))]
    pub fn begin_update(&mut self, session: &Session, id: &ListingId) -> Result<(), MutationError> {
        self.ensure_idle(id)?;
        let listing = self
            .store
            .get(id)
            .ok_or_else(|| MutationError::NotFound(id.clone()))?;
        ensure_owner(session, listing)?;
        self.pending.insert(id.clone(), Pending::Update);
        Ok(())
    }

    /// Settle a create (`id` is `None`) or an edit. Creates land at the head
    /// of the store; edits overwrite the loaded copy.
    #[instrument(skip(self, result), fields(listing_id = ?id))]
    pub fn resolve_save(
        &mut self,
        id: Option<&ListingId>,
        result: Result<Listing, GatewayError>,
    ) -> Result<Listing, MutationError> {
        if let Some(id) = id {
            if !matches!(self.pending.remove(id), Some(Pending::Update)) {
                warn!("save resolved without a matching claim");
            }
        }
        let committed = result.map_err(|e| self.gateway_failed("save", e))?;
        match id {
            None => {
                self.store.insert_at_head(committed.clone());
                info!(listing_id = %committed.id, "create committed");
            }
            Some(id) => {
                if !self.store.reconcile(committed.clone()) {
                    warn!(listing_id = %id, "updated record no longer loaded");
                }
                info!(listing_id = %id, "update committed");
            }
        }
        self.metrics.committed += 1;
        Ok(committed)
    }

    /// Remove the record locally and claim its id.
    #[instrument(skip(self, session), fields(listing_id = %id, actor = %session.actor_id))]
    pub fn begin_delete(&mut self, session: &Session, id: &ListingId) -> Result<(), MutationError> {
        self.ensure_idle(id)?;
        let listing = self
            .store
            .get(id)
            .ok_or_else(|| MutationError::NotFound(id.clone()))?;
        ensure_owner(session, listing)?;

        let was_favorite = self.store.is_favorite(id);
        let (index, record) = self
            .store
            .remove_by_id(id)
            .ok_or_else(|| MutationError::NotFound(id.clone()))?;
        self.pending.insert(
            id.clone(),
            Pending::Delete {
                index,
                record: Box::new(record),
                was_favorite,
            },
        );
        self.metrics.applied += 1;
        Ok(())
    }

    /// Commit or roll back a delete. A listing that is already gone remotely
    /// counts as committed.
    #[instrument(skip(self, result), fields(listing_id = %id))]
    pub fn resolve_delete(
        &mut self,
        id: &ListingId,
        result: Result<(), GatewayError>,
    ) -> Result<(), MutationError> {
        let Some(Pending::Delete {
            index,
            record,
            was_favorite,
        }) = self.take_pending(id, |p| matches!(p, Pending::Delete { .. }))
        else {
            warn!("delete resolved without a matching claim");
            return Ok(());
        };

        match result {
            Ok(()) | Err(GatewayError::NotFound(_)) => {
                self.store.set_favorite(id, false);
                self.metrics.committed += 1;
                info!("delete committed");
                Ok(())
            }
            Err(e) => {
                if self.store.contains(id) {
                    warn!("record reappeared before rollback, leaving it in place");
                } else {
                    self.store.insert_at(index, *record);
                }
                self.store.set_favorite(id, was_favorite);
                self.metrics.rolled_back += 1;
                info!(index, "delete rolled back");
                Err(self.gateway_failed("delete", e))
            }
        }
    }

    /// Flip the local flag and claim the id. Returns the flag to send.
    #[instrument(skip(self), fields(listing_id = %id))]
    pub fn begin_favorite(&mut self, id: &ListingId) -> Result<bool, MutationError> {
        self.ensure_idle(id)?;
        if !self.store.contains(id) {
            return Err(MutationError::NotFound(id.clone()));
        }
        let previous = self.store.is_favorite(id);
        self.store.set_favorite(id, !previous);
        self.pending.insert(id.clone(), Pending::Favorite { previous });
        self.metrics.applied += 1;
        Ok(!previous)
    }

    /// Returns the settled flag.
    #[instrument(skip(self, result), fields(listing_id = %id))]
    pub fn resolve_favorite(
        &mut self,
        id: &ListingId,
        result: Result<(), GatewayError>,
    ) -> Result<bool, MutationError> {
        let Some(Pending::Favorite { previous }) =
            self.take_pending(id, |p| matches!(p, Pending::Favorite { .. }))
        else {
            warn!("favorite resolved without a matching claim");
            return Ok(self.store.is_favorite(id));
        };

        match result {
            Ok(()) => {
                self.metrics.committed += 1;
                info!(favorite = !previous, "favorite committed");
                Ok(!previous)
            }
            Err(e) => {
                self.store.set_favorite(id, previous);
                self.metrics.rolled_back += 1;
                info!(favorite = previous, "favorite rolled back");
                Err(self.gateway_failed("toggle_relation", e))
            }
        }
    }

    /// Record a failed read so it shows up in the metrics and logs.
    pub fn record_read_failure(&mut self, op: &'static str, e: GatewayError) -> MutationError {
        self.gateway_failed(op, e)
    }

    fn ensure_idle(&mut self, id: &ListingId) -> Result<(), MutationError> {
        if let Some(existing) = self.pending.get(id) {
            self.metrics.busy_rejections += 1;
            warn!(listing_id = %id, existing = existing.kind(), "mutation rejected: id busy");
            return Err(MutationError::Busy(id.clone()));
        }
        Ok(())
    }

    fn take_pending(&mut self, id: &ListingId, wanted: impl Fn(&Pending) -> bool) -> Option<Pending> {
        if self.pending.get(id).is_some_and(wanted) {
            self.pending.remove(id)
        } else {
            None
        }
    }

    /// A refetch must not undo a toggle that has not settled yet.
    fn reapply_pending_favorites(&mut self) {
        for (id, pending) in &self.pending {
            if let Pending::Favorite { previous } = pending {
                if self.store.contains(id) {
                    self.store.set_favorite(id, !previous);
                }
            }
        }
    }

    fn gateway_failed(&mut self, op: &'static str, e: GatewayError) -> MutationError {
        self.metrics.gateway_failures += 1;
        error!(op, error = %e, "gateway call failed");
        e.into()
    }
}

fn ensure_owner(session: &Session, listing: &Listing) -> Result<(), MutationError> {
    if session.role.can_manage_listings() && listing.is_owned_by(&session.actor_id) {
        Ok(())
    } else {
        Err(MutationError::Forbidden(format!(
            "{} does not own {}",
            session.actor_id, listing.id
        )))
    }
}
