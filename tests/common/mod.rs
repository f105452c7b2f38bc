#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crux_core::testing::{AppTester, Update};
use crux_core::Request;
use dorm_core::capabilities::gateway::execute;
use dorm_core::{
    ActorId, ChangeNotice, CoreConfig, Destination, Effect, Event, FavoriteRelation, GatewayError,
    GatewayOperation, ImageRef, InMemoryGateway, Listing, ListingFields, ListingFilter, ListingId,
    ListingPatch, ListingScreen, Model, RealtimeOperation, Role, Session, SyncGateway, UnixTimeMs,
    ViewModel,
};
use tokio::sync::broadcast;

pub const LANDLORD: &str = "landlord-1";
pub const TENANT: &str = "tenant-1";

pub fn landlord() -> Session {
    Session::new(LANDLORD, Role::Landlord)
}

pub fn tenant() -> Session {
    Session::new(TENANT, Role::Tenant)
}

pub fn fields(name: &str) -> ListingFields {
    ListingFields {
        name: name.into(),
        price: 3500.0,
        capacity: 4,
        available_slots: 2,
        location: "Sampaloc, Manila".into(),
        offerings: "WiFi, Aircon".into(),
        rules: "No pets".into(),
        image_ref: ImageRef::new("https://cdn.example.com/dorms/1.jpg"),
        owner_name: "Aling Nena".into(),
    }
}

/// Rows for `InMemoryGateway::with_listings`, newest first.
pub fn listings(ids: &[&str]) -> Vec<Listing> {
    let n = ids.len() as u64;
    ids.iter()
        .enumerate()
        .map(|(i, id)| Listing {
            id: ListingId::new(*id),
            owner_id: ActorId::new(LANDLORD),
            created_at: UnixTimeMs(1_700_000_000_000 + (n - i as u64)),
            fields: fields(&format!("Dorm {id}")),
        })
        .collect()
}

/// In-memory service whose writes can be made to fail.
pub struct FlakyGateway {
    pub inner: InMemoryGateway,
    fail_writes: AtomicBool,
    writes: AtomicU64,
}

impl FlakyGateway {
    pub fn new(rows: Vec<Listing>) -> Self {
        Self {
            inner: InMemoryGateway::with_listings(rows),
            fail_writes: AtomicBool::new(false),
            writes: AtomicU64::new(0),
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    fn before_write(&self) -> Result<(), GatewayError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(GatewayError::Network("connection reset".into()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl SyncGateway for FlakyGateway {
    async fn fetch_all(&self, filter: &ListingFilter) -> Result<Vec<Listing>, GatewayError> {
        self.inner.fetch_all(filter).await
    }

    async fn fetch_one(&self, id: &ListingId) -> Result<Listing, GatewayError> {
        self.inner.fetch_one(id).await
    }

    async fn create(&self, owner: &ActorId, f: &ListingFields) -> Result<Listing, GatewayError> {
        self.before_write()?;
        self.inner.create(owner, f).await
    }

    async fn update(&self, id: &ListingId, patch: &ListingPatch) -> Result<Listing, GatewayError> {
        self.before_write()?;
        self.inner.update(id, patch).await
    }

    async fn delete(&self, id: &ListingId) -> Result<(), GatewayError> {
        self.before_write()?;
        self.inner.delete(id).await
    }

    async fn toggle_relation(
        &self,
        actor: &ActorId,
        listing: &ListingId,
        desired: bool,
    ) -> Result<(), GatewayError> {
        self.before_write()?;
        self.inner.toggle_relation(actor, listing, desired).await
    }

    async fn fetch_relations(&self, actor: &ActorId) -> Result<Vec<FavoriteRelation>, GatewayError> {
        self.inner.fetch_relations(actor).await
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<ChangeNotice>> {
        self.inner.subscribe()
    }
}

const TIMEOUT: Duration = Duration::from_secs(5);

/// Plays the shell: runs gateway effects against `gateway`, records
/// navigation and forwards the realtime feed.
pub struct Shell<G: SyncGateway> {
    pub app: AppTester<ListingScreen, Effect>,
    pub model: Model,
    pub gateway: Arc<G>,
    /// Gateway requests held back by [`Shell::send_held`].
    pub held: Vec<Request<GatewayOperation>>,
    pub visited: Vec<Destination>,
    pub renders: usize,
    feed: Option<broadcast::Receiver<ChangeNotice>>,
    hold: bool,
}

impl<G: SyncGateway> Shell<G> {
    pub fn new(session: Session, gateway: Arc<G>) -> Self {
        Self::with_model(Model::new(session, CoreConfig::default()), gateway)
    }

    pub fn with_model(model: Model, gateway: Arc<G>) -> Self {
        Self {
            app: AppTester::<ListingScreen, _>::default(),
            model,
            gateway,
            held: Vec::new(),
            visited: Vec::new(),
            renders: 0,
            feed: None,
            hold: false,
        }
    }

    pub async fn mounted(session: Session, gateway: Arc<G>) -> Self {
        let mut shell = Self::new(session, gateway);
        shell.send(Event::Mounted).await;
        shell
    }

    /// Send an event and run every effect it causes to completion.
    pub async fn send(&mut self, event: Event) {
        let update = self.app.update(event, &mut self.model);
        self.process(update).await;
    }

    /// Send an event but keep its gateway requests unanswered.
    pub async fn send_held(&mut self, event: Event) {
        self.hold = true;
        self.send(event).await;
        self.hold = false;
    }

    /// Answer every held request.
    pub async fn release(&mut self) {
        let held = std::mem::take(&mut self.held);
        for mut request in held {
            let update = self.resolve(&mut request).await;
            self.process(update).await;
        }
    }

    /// Forward queued feed notices the way a shell would. Returns how many.
    pub async fn pump_feed(&mut self) -> usize {
        let mut notices = Vec::new();
        if let Some(feed) = self.feed.as_mut() {
            while let Ok(notice) = feed.try_recv() {
                notices.push(notice);
            }
        }
        let count = notices.len();
        for notice in notices {
            self.send(Event::RemoteChanged { notice }).await;
        }
        count
    }

    pub async fn run_frames(&mut self) {
        for _ in 0..200 {
            self.send(Event::Frame { elapsed_ms: 16 }).await;
            if !self.model.sheet().is_animating() {
                return;
            }
        }
        panic!("sheet never settled");
    }

    pub fn view(&self) -> ViewModel {
        self.app.view(&self.model)
    }

    pub fn is_subscribed(&self) -> bool {
        self.feed.is_some()
    }

    async fn resolve(&mut self, request: &mut Request<GatewayOperation>) -> Update<Effect, Event> {
        let response = execute(&*self.gateway, request.operation.clone(), TIMEOUT).await;
        self.app
            .resolve(request, response)
            .expect("gateway request resolves")
    }

    async fn process(&mut self, update: Update<Effect, Event>) {
        let mut queue = VecDeque::from([update]);
        while let Some(update) = queue.pop_front() {
            for effect in update.effects {
                match effect {
                    Effect::Gateway(request) if self.hold => self.held.push(request),
                    Effect::Gateway(mut request) => {
                        let next = self.resolve(&mut request).await;
                        queue.push_back(next);
                    }
                    Effect::Navigate(request) => self.visited.push(request.operation.clone()),
                    Effect::Realtime(request) => match &request.operation {
                        RealtimeOperation::Subscribe { .. } => self.feed = self.gateway.subscribe(),
                        RealtimeOperation::Unsubscribe => self.feed = None,
                    },
                    Effect::Render(_) => self.renders += 1,
                }
            }
            for event in update.events {
                queue.push_back(self.app.update(event, &mut self.model));
            }
        }
    }
}

pub fn card_ids(view: &ViewModel) -> Vec<String> {
    view.listings.iter().map(|c| c.id.clone()).collect()
}
