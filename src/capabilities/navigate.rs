//! Fire-and-forget routing to screens the core does not own.

use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};

use crate::model::{ActorId, ListingId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "route", rename_all = "snake_case")]
pub enum Destination {
    ListingDetails { id: ListingId },
    OwnerProfile { owner_id: ActorId },
}

impl Destination {
    pub const fn route(&self) -> &'static str {
        match self {
            Self::ListingDetails { .. } => "listing_details",
            Self::OwnerProfile { .. } => "owner_profile",
        }
    }

    /// Route parameters as the host router expects them.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::ListingDetails { id } => vec![("id", id.to_string())],
            Self::OwnerProfile { owner_id } => vec![("owner_id", owner_id.to_string())],
        }
    }
}

impl Operation for Destination {
    type Output = ();
}

#[derive(Clone)]
pub struct Navigate<Ev> {
    context: CapabilityContext<Destination, Ev>,
}

impl<Ev> Capability<Ev> for Navigate<Ev> {
    type Operation = Destination;
    type MappedSelf<MappedEv> = Navigate<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Navigate::new(self.context.map_event(f))
    }
}

impl<Ev> Navigate<Ev> {
    pub fn new(context: CapabilityContext<Destination, Ev>) -> Self {
        Self { context }
    }
}

impl<Ev> Navigate<Ev>
where
    Ev: Send + 'static,
{
    /// Nothing comes back; the shell owns the navigation stack.
    pub fn to(&self, destination: Destination) {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            ctx.notify_shell(destination).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_exposes_route_and_params() {
        let d = Destination::ListingDetails {
            id: ListingId::new("d1"),
        };
        assert_eq!(d.route(), "listing_details");
        assert_eq!(d.params(), vec![("id", "d1".to_string())]);

        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["route"], "listing_details");
    }
}
