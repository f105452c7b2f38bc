//! Remote persistence seam.
//!
//! [`SyncGateway`] is the shell-side face of the listing service. The core
//! never calls it directly: it emits [`crate::capabilities::GatewayOperation`]
//! effects and the shell runs them here with
//! [`crate::capabilities::gateway::execute`]. Every call is single-shot
//! request/response and returns either the committed record or a typed
//! [`GatewayError`]. The core never retries.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, instrument};

use crate::model::{
    ActorId, FavoriteRelation, Listing, ListingFields, ListingFilter, ListingId, ListingPatch,
    UnixTimeMs,
};

#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum GatewayError {
    #[error("network error: {0}")]
    Network(String),

    #[error("remote error ({status}): {message}")]
    Remote { status: u16, message: String },

    #[error("listing not found: {0}")]
    NotFound(ListingId),

    #[error("request timed out")]
    Timeout,

    #[error("storage error: {0}")]
    Storage(String),

    /// The shell answered a request with the wrong kind of payload.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// Pushed by the service when a row changes underneath us.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeNotice {
    Inserted { listing_id: ListingId },
    Updated { listing_id: ListingId },
    Deleted { listing_id: ListingId },
    RelationChanged { actor_id: ActorId, listing_id: ListingId },
}

impl ChangeNotice {
    pub fn listing_id(&self) -> &ListingId {
        match self {
            Self::Inserted { listing_id }
            | Self::Updated { listing_id }
            | Self::Deleted { listing_id }
            | Self::RelationChanged { listing_id, .. } => listing_id,
        }
    }
}

#[async_trait::async_trait]
pub trait SyncGateway: Send + Sync {
    /// Newest first.
    async fn fetch_all(&self, filter: &ListingFilter) -> Result<Vec<Listing>, GatewayError>;
    async fn fetch_one(&self, id: &ListingId) -> Result<Listing, GatewayError>;
    async fn create(&self, owner: &ActorId, fields: &ListingFields) -> Result<Listing, GatewayError>;
    async fn update(&self, id: &ListingId, patch: &ListingPatch) -> Result<Listing, GatewayError>;
    async fn delete(&self, id: &ListingId) -> Result<(), GatewayError>;
    /// Idempotent: asking for the state that already holds succeeds.
    async fn toggle_relation(
        &self,
        actor: &ActorId,
        listing: &ListingId,
        desired: bool,
    ) -> Result<(), GatewayError>;
    async fn fetch_relations(&self, actor: &ActorId) -> Result<Vec<FavoriteRelation>, GatewayError>;

    /// Realtime feed, if the backend has one. Dropping the receiver cancels it.
    fn subscribe(&self) -> Option<broadcast::Receiver<ChangeNotice>> {
        None
    }
}

const CHANGE_FEED_CAPACITY: usize = 64;

#[derive(Default)]
struct InMemoryState {
    /// Newest first.
    listings: Vec<Listing>,
    relations: HashSet<(ActorId, ListingId)>,
    last_created_at: u64,
}

/// Authoritative in-process listing service with a change feed.
pub struct InMemoryGateway {
    state: RwLock<InMemoryState>,
    changes: broadcast::Sender<ChangeNotice>,
    next_seq: AtomicU64,
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::with_listings(Vec::new())
    }

    /// Start with existing rows, given newest first.
    pub fn with_listings(listings: Vec<Listing>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        let last_created_at = listings.iter().map(|l| l.created_at.0).max().unwrap_or(0);
        Self {
            state: RwLock::new(InMemoryState {
                listings,
                relations: HashSet::new(),
                last_created_at,
            }),
            changes,
            next_seq: AtomicU64::new(1),
        }
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.listings.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn notify(&self, notice: ChangeNotice) {
        // No receivers is fine.
        let _ = self.changes.send(notice);
    }

    fn next_id(&self) -> ListingId {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        ListingId::new(format!("lst-{seq}-{}", uuid::Uuid::new_v4().simple()))
    }
}

#[async_trait::async_trait]
impl SyncGateway for InMemoryGateway {
    async fn fetch_all(&self, filter: &ListingFilter) -> Result<Vec<Listing>, GatewayError> {
        let state = self.state.read().await;
        Ok(state
            .listings
            .iter()
            .filter(|l| filter.matches(l))
            .cloned()
            .collect())
    }

    async fn fetch_one(&self, id: &ListingId) -> Result<Listing, GatewayError> {
        let state = self.state.read().await;
        state
            .listings
            .iter()
            .find(|l| &l.id == id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(id.clone()))
    }

    #[instrument(skip(self, draft), fields(owner = %owner))]
    async fn create(&self, owner: &ActorId, draft: &ListingFields) -> Result<Listing, GatewayError> {
        let listing = {
            let mut state = self.state.write().await;
            // Strictly increasing so newest-first ordering is total.
            let created_at = UnixTimeMs::now().0.max(state.last_created_at + 1);
            state.last_created_at = created_at;
            let listing = Listing {
                id: self.next_id(),
                owner_id: owner.clone(),
                created_at: UnixTimeMs(created_at),
                fields: draft.clone(),
            };
            state.listings.insert(0, listing.clone());
            listing
        };
        debug!(listing_id = %listing.id, "created");
        self.notify(ChangeNotice::Inserted {
            listing_id: listing.id.clone(),
        });
        Ok(listing)
    }

    #[instrument(skip(self, patch), fields(listing_id = %id))]
    async fn update(&self, id: &ListingId, patch: &ListingPatch) -> Result<Listing, GatewayError> {
        let updated = {
            let mut state = self.state.write().await;
            let listing = state
                .listings
                .iter_mut()
                .find(|l| &l.id == id)
                .ok_or_else(|| GatewayError::NotFound(id.clone()))?;
            patch.apply_to(&mut listing.fields);
            listing.clone()
        };
        self.notify(ChangeNotice::Updated {
            listing_id: id.clone(),
        });
        Ok(updated)
    }

    #[instrument(skip(self), fields(listing_id = %id))]
    async fn delete(&self, id: &ListingId) -> Result<(), GatewayError> {
        {
            let mut state = self.state.write().await;
            let index = state
                .listings
                .iter()
                .position(|l| &l.id == id)
                .ok_or_else(|| GatewayError::NotFound(id.clone()))?;
            state.listings.remove(index);
            state.relations.retain(|(_, listing)| listing != id);
        }
        self.notify(ChangeNotice::Deleted {
            listing_id: id.clone(),
        });
        Ok(())
    }

    #[instrument(skip(self), fields(actor = %actor, listing_id = %listing))]
    async fn toggle_relation(
        &self,
        actor: &ActorId,
        listing: &ListingId,
        desired: bool,
    ) -> Result<(), GatewayError> {
        let changed = {
            let mut state = self.state.write().await;
            let key = (actor.clone(), listing.clone());
            if desired {
                if !state.listings.iter().any(|l| &l.id == listing) {
                    return Err(GatewayError::NotFound(listing.clone()));
                }
                state.relations.insert(key)
            } else {
                state.relations.remove(&key)
            }
        };
        if changed {
            self.notify(ChangeNotice::RelationChanged {
                actor_id: actor.clone(),
                listing_id: listing.clone(),
            });
        }
        Ok(())
    }

    async fn fetch_relations(&self, actor: &ActorId) -> Result<Vec<FavoriteRelation>, GatewayError> {
        let state = self.state.read().await;
        let mut relations: Vec<_> = state
            .relations
            .iter()
            .filter(|(a, _)| a == actor)
            .map(|(actor_id, listing_id)| FavoriteRelation {
                actor_id: actor_id.clone(),
                listing_id: listing_id.clone(),
            })
            .collect();
        relations.sort_by(|a, b| a.listing_id.cmp(&b.listing_id));
        Ok(relations)
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<ChangeNotice>> {
        Some(self.changes.subscribe())
    }
}
