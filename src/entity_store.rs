//! In-memory listing collection the screen renders from.
//!
//! Every mutation is synchronous, performs no I/O and bumps [`EntityStore::revision`]
//! so the presentation layer knows to re-render. Writes come only from
//! [`crate::mutator::OptimisticMutator`].

use std::collections::HashSet;
use tracing::{debug, warn};

use crate::model::{Listing, ListingId, ListingPatch};

#[derive(Debug, Clone)]
pub struct EntityStore {
    listings: Vec<Listing>,
    favorites: HashSet<ListingId>,
    max_len: usize,
    revision: u64,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new(crate::MAX_CACHED_LISTINGS)
    }
}

impl EntityStore {
    pub fn new(max_len: usize) -> Self {
        Self {
            listings: Vec::new(),
            favorites: HashSet::new(),
            max_len: max_len.max(1),
            revision: 0,
        }
    }

    /// Replace the whole sequence, keeping server order. Later duplicates of
    /// an id are dropped and the result is capped at `max_len`.
    ///
    /// Favorite flags survive only for records that were kept.
    pub fn replace_all(&mut self, records: Vec<Listing>) {
        let mut seen = HashSet::with_capacity(records.len());
        let incoming = records.len();
        self.listings = records
            .into_iter()
            .filter(|l| seen.insert(l.id.clone()))
            .take(self.max_len)
            .collect();
        if self.listings.len() < incoming {
            warn!(
                incoming,
                kept = self.listings.len(),
                "replace_all dropped duplicate or overflow records"
            );
        }
        let kept: HashSet<&ListingId> = self.listings.iter().map(|l| &l.id).collect();
        self.favorites.retain(|id| kept.contains(id));
        self.bump();
    }

    /// Change the cap, dropping the oldest records when it shrinks.
    pub fn set_max_len(&mut self, max_len: usize) {
        self.max_len = max_len.max(1);
        if self.listings.len() > self.max_len {
            self.listings.truncate(self.max_len);
            self.bump();
        }
    }

    pub fn insert_at_head(&mut self, record: Listing) {
        self.insert_at(0, record);
    }

    /// Insert at `index`, clamped to the current length. An existing record
    /// with the same id is replaced rather than duplicated.
    pub fn insert_at(&mut self, index: usize, record: Listing) {
        if let Some(existing) = self.position(&record.id) {
            warn!(listing_id = %record.id, "insert replaces existing record");
            self.listings.remove(existing);
        }
        let index = index.min(self.listings.len());
        self.listings.insert(index, record);
        if self.listings.len() > self.max_len {
            self.listings.truncate(self.max_len);
        }
        self.bump();
    }

    /// Remove and return the record together with the position it held.
    /// The favorite flag is left alone; callers decide whether it goes too.
    pub fn remove_by_id(&mut self, id: &ListingId) -> Option<(usize, Listing)> {
        let index = self.position(id)?;
        let record = self.listings.remove(index);
        self.bump();
        Some((index, record))
    }

    /// Returns false (and changes nothing) when the id is absent.
    pub fn update_by_id(&mut self, id: &ListingId, patch: &ListingPatch) -> bool {
        let Some(listing) = self.listings.iter_mut().find(|l| &l.id == id) else {
            debug!(listing_id = %id, "update_by_id on absent record ignored");
            return false;
        };
        patch.apply_to(&mut listing.fields);
        self.bump();
        true
    }

    /// Overwrite a record with the server's committed copy, if present.
    pub fn reconcile(&mut self, committed: Listing) -> bool {
        let Some(listing) = self.listings.iter_mut().find(|l| l.id == committed.id) else {
            return false;
        };
        *listing = committed;
        self.bump();
        true
    }

    pub fn get(&self, id: &ListingId) -> Option<&Listing> {
        self.listings.iter().find(|l| &l.id == id)
    }

    pub fn position(&self, id: &ListingId) -> Option<usize> {
        self.listings.iter().position(|l| &l.id == id)
    }

    pub fn contains(&self, id: &ListingId) -> bool {
        self.position(id).is_some()
    }

    pub fn listings(&self) -> &[Listing] {
        &self.listings
    }

    pub fn ids(&self) -> Vec<ListingId> {
        self.listings.iter().map(|l| l.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_favorite(&self, id: &ListingId) -> bool {
        self.favorites.contains(id)
    }

    /// Set the local favorite flag, returning the previous value.
    pub fn set_favorite(&mut self, id: &ListingId, favorite: bool) -> bool {
        let previous = if favorite {
            !self.favorites.insert(id.clone())
        } else {
            self.favorites.remove(id)
        };
        if previous != favorite {
            self.bump();
        }
        previous
    }

    pub fn replace_favorites(&mut self, ids: impl IntoIterator<Item = ListingId>) {
        self.favorites = ids.into_iter().collect();
        self.bump();
    }

    pub fn favorite_listings(&self) -> Vec<&Listing> {
        self.listings
            .iter()
            .filter(|l| self.favorites.contains(&l.id))
            .collect()
    }

    fn bump(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}
