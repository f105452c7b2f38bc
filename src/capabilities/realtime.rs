//! Realtime change feed.
//!
//! The core asks the shell to open or close the feed. While it is open the
//! shell forwards every notice as [`crate::Event::RemoteChanged`].

use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};

use crate::model::ListingFilter;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RealtimeOperation {
    Subscribe { filter: ListingFilter },
    Unsubscribe,
}

impl Operation for RealtimeOperation {
    type Output = ();
}

#[derive(Clone)]
pub struct Realtime<Ev> {
    context: CapabilityContext<RealtimeOperation, Ev>,
}

impl<Ev> Capability<Ev> for Realtime<Ev> {
    type Operation = RealtimeOperation;
    type MappedSelf<MappedEv> = Realtime<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Realtime::new(self.context.map_event(f))
    }
}

impl<Ev> Realtime<Ev> {
    pub fn new(context: CapabilityContext<RealtimeOperation, Ev>) -> Self {
        Self { context }
    }
}

impl<Ev> Realtime<Ev>
where
    Ev: Send + 'static,
{
    pub fn subscribe(&self, filter: ListingFilter) {
        self.notify(RealtimeOperation::Subscribe { filter });
    }

    pub fn unsubscribe(&self) {
        self.notify(RealtimeOperation::Unsubscribe);
    }

    fn notify(&self, operation: RealtimeOperation) {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            ctx.notify_shell(operation).await;
        });
    }
}
