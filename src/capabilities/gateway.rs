//! Listing-service capability.
//!
//! The core describes each remote call as a [`GatewayOperation`]; the shell
//! performs it (usually through [`execute`] and a [`SyncGateway`]) and
//! resolves the request with a [`GatewayResponse`]. The answer comes back to
//! the app as an ordinary event, so nothing in `update` ever waits on the
//! network.

use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, instrument};

use crate::gateway::{GatewayError, SyncGateway};
use crate::model::{
    ActorId, FavoriteRelation, Listing, ListingFields, ListingFilter, ListingId, ListingPatch,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayOperation {
    FetchAll {
        filter: ListingFilter,
    },
    FetchOne {
        id: ListingId,
    },
    Create {
        owner: ActorId,
        fields: Box<ListingFields>,
    },
    Update {
        id: ListingId,
        patch: Box<ListingPatch>,
    },
    Delete {
        id: ListingId,
    },
    ToggleRelation {
        actor: ActorId,
        listing_id: ListingId,
        desired: bool,
    },
    FetchRelations {
        actor: ActorId,
    },
}

impl GatewayOperation {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::FetchAll { .. } => "fetch_all",
            Self::FetchOne { .. } => "fetch_one",
            Self::Create { .. } => "create",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
            Self::ToggleRelation { .. } => "toggle_relation",
            Self::FetchRelations { .. } => "fetch_relations",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayOutput {
    Listings { listings: Vec<Listing> },
    Listing { listing: Box<Listing> },
    Relations { relations: Vec<FavoriteRelation> },
    Done,
}

impl GatewayOutput {
    fn into_listings(self) -> Result<Vec<Listing>, GatewayError> {
        match self {
            Self::Listings { listings } => Ok(listings),
            other => Err(mismatch("listings", &other)),
        }
    }

    fn into_listing(self) -> Result<Listing, GatewayError> {
        match self {
            Self::Listing { listing } => Ok(*listing),
            other => Err(mismatch("listing", &other)),
        }
    }

    fn into_relations(self) -> Result<Vec<FavoriteRelation>, GatewayError> {
        match self {
            Self::Relations { relations } => Ok(relations),
            other => Err(mismatch("relations", &other)),
        }
    }

    fn into_done(self) -> Result<(), GatewayError> {
        match self {
            Self::Done => Ok(()),
            other => Err(mismatch("done", &other)),
        }
    }
}

fn mismatch(expected: &str, got: &GatewayOutput) -> GatewayError {
    GatewayError::UnexpectedResponse(format!("expected {expected}, got {got:?}"))
}

pub type GatewayResponse = Result<GatewayOutput, GatewayError>;

impl Operation for GatewayOperation {
    type Output = GatewayResponse;
}

#[derive(Clone)]
pub struct Gateway<Ev> {
    context: CapabilityContext<GatewayOperation, Ev>,
}

impl<Ev> Capability<Ev> for Gateway<Ev> {
    type Operation = GatewayOperation;
    type MappedSelf<MappedEv> = Gateway<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Gateway::new(self.context.map_event(f))
    }
}

impl<Ev> Gateway<Ev> {
    pub fn new(context: CapabilityContext<GatewayOperation, Ev>) -> Self {
        Self { context }
    }
}

impl<Ev> Gateway<Ev>
where
    Ev: Send + 'static,
{
    pub fn fetch_all<F>(&self, filter: ListingFilter, make_event: F)
    where
        F: FnOnce(Result<Vec<Listing>, GatewayError>) -> Ev + Send + 'static,
    {
        self.send(GatewayOperation::FetchAll { filter }, move |response| {
            make_event(response.and_then(GatewayOutput::into_listings))
        });
    }

    pub fn fetch_one<F>(&self, id: ListingId, make_event: F)
    where
        F: FnOnce(Result<Listing, GatewayError>) -> Ev + Send + 'static,
    {
        self.send(GatewayOperation::FetchOne { id }, move |response| {
            make_event(response.and_then(GatewayOutput::into_listing))
        });
    }

    pub fn create<F>(&self, owner: ActorId, fields: ListingFields, make_event: F)
    where
        F: FnOnce(Result<Listing, GatewayError>) -> Ev + Send + 'static,
    {
        let operation = GatewayOperation::Create {
            owner,
            fields: Box::new(fields),
        };
        self.send(operation, move |response| {
            make_event(response.and_then(GatewayOutput::into_listing))
        });
    }

    pub fn update<F>(&self, id: ListingId, patch: ListingPatch, make_event: F)
    where
        F: FnOnce(Result<Listing, GatewayError>) -> Ev + Send + 'static,
    {
        let operation = GatewayOperation::Update {
            id,
            patch: Box::new(patch),
        };
        self.send(operation, move |response| {
            make_event(response.and_then(GatewayOutput::into_listing))
        });
    }

    pub fn delete<F>(&self, id: ListingId, make_event: F)
    where
        F: FnOnce(Result<(), GatewayError>) -> Ev + Send + 'static,
    {
        self.send(GatewayOperation::Delete { id }, move |response| {
            make_event(response.and_then(GatewayOutput::into_done))
        });
    }

    pub fn toggle_relation<F>(&self, actor: ActorId, listing_id: ListingId, desired: bool, make_event: F)
    where
        F: FnOnce(Result<(), GatewayError>) -> Ev + Send + 'static,
    {
        let operation = GatewayOperation::ToggleRelation {
            actor,
            listing_id,
            desired,
        };
        self.send(operation, move |response| {
            make_event(response.and_then(GatewayOutput::into_done))
        });
    }

    pub fn fetch_relations<F>(&self, actor: ActorId, make_event: F)
    where
        F: FnOnce(Result<Vec<FavoriteRelation>, GatewayError>) -> Ev + Send + 'static,
    {
        self.send(GatewayOperation::FetchRelations { actor }, move |response| {
            make_event(response.and_then(GatewayOutput::into_relations))
        });
    }

    fn send<F>(&self, operation: GatewayOperation, make_event: F)
    where
        F: FnOnce(GatewayResponse) -> Ev + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let response = ctx.request_from_shell(operation).await;
            ctx.update_app(make_event(response));
        });
    }
}

/// Run one operation against a shell-side gateway, bounded by `timeout`.
#[instrument(skip(gateway, operation), fields(op = operation.name()))]
pub async fn execute<G>(gateway: &G, operation: GatewayOperation, timeout: Duration) -> GatewayResponse
where
    G: SyncGateway + ?Sized,
{
    let call = async {
        match operation {
            GatewayOperation::FetchAll { filter } => gateway
                .fetch_all(&filter)
                .await
                .map(|listings| GatewayOutput::Listings { listings }),
            GatewayOperation::FetchOne { id } => gateway
                .fetch_one(&id)
                .await
                .map(|listing| GatewayOutput::Listing {
                    listing: Box::new(listing),
                }),
            GatewayOperation::Create { owner, fields } => gateway
                .create(&owner, &fields)
                .await
                .map(|listing| GatewayOutput::Listing {
                    listing: Box::new(listing),
                }),
            GatewayOperation::Update { id, patch } => gateway
                .update(&id, &patch)
                .await
                .map(|listing| GatewayOutput::Listing {
                    listing: Box::new(listing),
                }),
            GatewayOperation::Delete { id } => gateway.delete(&id).await.map(|()| GatewayOutput::Done),
            GatewayOperation::ToggleRelation {
                actor,
                listing_id,
                desired,
            } => gateway
                .toggle_relation(&actor, &listing_id, desired)
                .await
                .map(|()| GatewayOutput::Done),
            GatewayOperation::FetchRelations { actor } => gateway
                .fetch_relations(&actor)
                .await
                .map(|relations| GatewayOutput::Relations { relations }),
        }
    };
    let response = match tokio::time::timeout(timeout, call).await {
        Ok(response) => response,
        Err(_) => Err(GatewayError::Timeout),
    };
    if let Err(e) = &response {
        error!(error = %e, "gateway call failed");
    }
    response
}
