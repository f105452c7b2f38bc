//! The listing screen as a Crux app: the store, the editor sheet and its
//! edit session, wired together behind one event reducer.
//!
//! `update` never waits. A mutation is applied locally, its gateway request
//! goes out as an effect, and the answer comes back later as a `*Resolved`
//! event that commits or rolls back. Other events (drags, frames, other
//! listings) are handled while a request is pending.
//!
//! Nothing here returns an error to the shell. Gateway and mutation failures
//! become a dismissible notice and validation failures stay inline on the
//! editor.

use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::capabilities::{Capabilities, Destination};
use crate::config::CoreConfig;
use crate::edit_session::EditSession;
use crate::error::{AppError, ErrorKind};
use crate::event::Event;
use crate::gateway::{ChangeNotice, GatewayError};
use crate::model::{matches_query, FavoriteRelation, Listing, ListingFilter, ListingId, Session, SessionId};
use crate::mutator::{MutationError, OptimisticMutator};
use crate::sheet::{SheetController, SheetSettled, SheetState};
use crate::view::{EditorView, ListingCard, Toast, ToastKind, UserFacingError, ViewModel};

#[derive(Default)]
pub struct ListingScreen;

impl crux_core::App for ListingScreen {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    #[instrument(skip_all, fields(event = event.name()))]
    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        if event.is_user_initiated() {
            debug!("handling event");
        }
        match event {
            Event::SessionStarted { session } => model.start_session(session),
            Event::Configured { config } => model.configure(config),
            Event::Mounted => model.mount(caps),
            Event::Unmounted => model.unmount(caps),
            Event::RefreshRequested => model.request_refresh(caps),
            Event::RemoteChanged { notice } => model.remote_changed(&notice, caps),
            Event::EditorOpened { listing_id } => model.open_editor(listing_id, caps),
            Event::EditorDismissed => model.sheet.close(),
            Event::DragMoved { dy } => model.sheet.on_drag_move(dy),
            Event::DragReleased { dy } => model.sheet.on_drag_release(dy),
            Event::Frame { elapsed_ms } => model.frame(elapsed_ms),
            Event::FieldChanged { field, value } => {
                if let Some(editor) = model.editor.as_mut() {
                    editor.set_field(field, value);
                }
            }
            Event::SaveRequested => model.save(caps),
            Event::DeleteRequested { id } => model.delete(id, caps),
            Event::FavoriteToggled { id } => model.toggle_favorite(id, caps),
            Event::SearchChanged { query } => model.query = query,
            Event::ListingTapped { id } => caps.navigate.to(Destination::ListingDetails { id }),
            Event::OwnerTapped { owner_id } => {
                caps.navigate.to(Destination::OwnerProfile { owner_id });
            }
            Event::NoticeDismissed => {
                model.notice = None;
                model.toast = None;
            }

            Event::ListingsFetched { result } => model.listings_fetched(result, caps),
            Event::RelationsFetched { result } => model.relations_fetched(result),
            Event::ListingFetched { id, result } => model.listing_fetched(&id, *result),
            Event::SaveResolved {
                session_id,
                listing_id,
                result,
            } => model.save_resolved(&session_id, listing_id.as_ref(), *result),
            Event::DeleteResolved { id, result } => {
                match model.mutator.resolve_delete(&id, result) {
                    Ok(()) => model.toast = Some(Toast::new(ToastKind::ListingDeleted)),
                    Err(e) => model.surface(e),
                }
            }
            Event::FavoriteResolved { id, result } => {
                if let Err(e) = model.mutator.resolve_favorite(&id, result) {
                    model.surface(e);
                }
            }
        }
        caps.render.render();
    }

    fn view(&self, model: &Model) -> ViewModel {
        model.view()
    }
}

pub struct Model {
    session: Option<Session>,
    config: CoreConfig,
    filter: ListingFilter,
    mutator: OptimisticMutator,
    sheet: SheetController,
    editor: Option<EditSession>,
    /// Edit session whose save is in flight.
    saving: Option<SessionId>,
    /// Listing being fetched so the editor can open on it.
    opening: Option<ListingId>,
    subscribed: bool,
    fetching: bool,
    refetch_queued: bool,
    notice: Option<AppError>,
    toast: Option<Toast>,
    query: String,
}

impl Default for Model {
    fn default() -> Self {
        let config = CoreConfig::default();
        Self {
            session: None,
            filter: ListingFilter::All,
            mutator: OptimisticMutator::new(config.sync.max_cached_listings),
            sheet: SheetController::new(config.sheet.clone()),
            config,
            editor: None,
            saving: None,
            opening: None,
            subscribed: false,
            fetching: false,
            refetch_queued: false,
            notice: None,
            toast: None,
            query: String::new(),
        }
    }
}

impl Model {
    /// Signed-in model for shells that build the model themselves.
    pub fn new(session: Session, config: CoreConfig) -> Self {
        let mut model = Self::default();
        model.configure(config);
        model.start_session(session);
        model
    }

    #[must_use]
    pub fn with_filter(mut self, filter: ListingFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn mutator(&self) -> &OptimisticMutator {
        &self.mutator
    }

    pub fn sheet(&self) -> &SheetController {
        &self.sheet
    }

    pub fn editor(&self) -> Option<&EditSession> {
        self.editor.as_ref()
    }

    pub fn notice(&self) -> Option<&AppError> {
        self.notice.as_ref()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    /// Landlords see their own listings; tenants see everything.
    fn start_session(&mut self, session: Session) {
        if self.session.as_ref().is_some_and(|s| s.actor_id != session.actor_id) {
            info!(actor = %session.actor_id, "actor changed, dropping cached listings");
            self.mutator = OptimisticMutator::new(self.config.sync.max_cached_listings);
        }
        self.filter = if session.role.can_manage_listings() {
            ListingFilter::OwnedBy(session.actor_id.clone())
        } else {
            ListingFilter::All
        };
        self.session = Some(session);
    }

    /// An invalid config is reported and the current one kept. The sheet
    /// picks up new settings the next time it opens.
    fn configure(&mut self, config: CoreConfig) {
        if let Err(e) = config.validate() {
            warn!(error = %e, "rejected config");
            self.surface(e);
            return;
        }
        self.mutator
            .set_max_cached_listings(config.sync.max_cached_listings);
        self.config = config;
    }

    fn session_or_notice(&mut self) -> Option<Session> {
        if self.session.is_none() {
            self.surface(AppError::new(ErrorKind::Forbidden, "no signed-in session"));
        }
        self.session.clone()
    }

    /// Subscribe (at most once), fetch the listings and seed favorite flags.
    fn mount(&mut self, caps: &Capabilities) {
        let Some(session) = self.session_or_notice() else {
            return;
        };
        if !self.subscribed {
            caps.realtime.subscribe(self.filter.clone());
            self.subscribed = true;
        }
        self.request_refresh(caps);
        caps.gateway
            .fetch_relations(session.actor_id, |result| Event::RelationsFetched { result });
    }

    /// Drop the realtime subscription. In-flight mutations still resolve.
    fn unmount(&mut self, caps: &Capabilities) {
        if self.subscribed {
            caps.realtime.unsubscribe();
            self.subscribed = false;
            debug!("realtime subscription released");
        }
    }

    /// At most one fetch is outstanding; requests made meanwhile collapse
    /// into a single refetch.
    fn request_refresh(&mut self, caps: &Capabilities) {
        if self.fetching {
            self.refetch_queued = true;
            return;
        }
        self.fetching = true;
        caps.gateway
            .fetch_all(self.filter.clone(), |result| Event::ListingsFetched { result });
    }

    fn remote_changed(&mut self, notice: &ChangeNotice, caps: &Capabilities) {
        if !self.subscribed {
            debug!("change notice after unmount ignored");
            return;
        }
        debug!(listing_id = %notice.listing_id(), "change notice");
        match notice {
            ChangeNotice::RelationChanged { actor_id, .. } => {
                if self.session.as_ref().is_some_and(|s| &s.actor_id == actor_id) {
                    caps.gateway
                        .fetch_relations(actor_id.clone(), |result| Event::RelationsFetched { result });
                }
            }
            _ => self.request_refresh(caps),
        }
    }

    fn listings_fetched(&mut self, result: Result<Vec<Listing>, GatewayError>, caps: &Capabilities) {
        self.fetching = false;
        match result {
            Ok(records) => {
                self.mutator.apply_refresh(records);
            }
            Err(e) => {
                let err = self.mutator.record_read_failure("fetch_all", e);
                self.surface(err);
            }
        }
        if std::mem::take(&mut self.refetch_queued) {
            self.request_refresh(caps);
        }
    }

    fn relations_fetched(&mut self, result: Result<Vec<FavoriteRelation>, GatewayError>) {
        match result {
            Ok(relations) => {
                self.mutator.seed_favorites(relations);
            }
            Err(e) => {
                let err = self.mutator.record_read_failure("fetch_relations", e);
                self.surface(err);
            }
        }
    }

    fn open_editor(&mut self, listing_id: Option<ListingId>, caps: &Capabilities) {
        if self.editor.is_some() || self.sheet.state() != SheetState::Closed {
            debug!("editor already open");
            return;
        }
        let Some(session) = self.session_or_notice() else {
            return;
        };
        match listing_id {
            None => {
                if let Err(e) = self.mutator.begin_create(&session) {
                    self.surface(e);
                    return;
                }
                self.show_editor(None);
            }
            Some(id) => match self.mutator.store().get(&id).cloned() {
                Some(listing) => self.open_on(&session, &listing),
                None => {
                    self.opening = Some(id.clone());
                    caps.gateway.fetch_one(id.clone(), move |result| Event::ListingFetched {
                        id,
                        result: Box::new(result),
                    });
                }
            },
        }
    }

    fn listing_fetched(&mut self, id: &ListingId, result: Result<Listing, GatewayError>) {
        let wanted = self.opening.as_ref() == Some(id);
        if wanted {
            self.opening = None;
        }
        match result {
            Ok(listing) => {
                self.mutator.reconcile_fetched(listing.clone());
                let idle = self.editor.is_none() && self.sheet.state() == SheetState::Closed;
                if wanted && idle {
                    if let Some(session) = self.session.clone() {
                        self.open_on(&session, &listing);
                    }
                }
            }
            Err(e) => {
                let err = self.mutator.record_read_failure("fetch_one", e);
                if wanted {
                    self.surface(err);
                }
            }
        }
    }

    fn open_on(&mut self, session: &Session, listing: &Listing) {
        if !(session.role.can_manage_listings() && listing.is_owned_by(&session.actor_id)) {
            self.surface(MutationError::Forbidden(format!(
                "{} does not own {}",
                session.actor_id, listing.id
            )));
            return;
        }
        self.show_editor(Some(listing));
    }

    fn show_editor(&mut self, source: Option<&Listing>) {
        self.editor = Some(EditSession::begin(source));
        self.sheet = SheetController::new(self.config.sheet.clone());
        self.sheet.open();
    }

    /// Validate the draft and send it. A validation failure stays inline on
    /// the editor and nothing is sent.
    fn save(&mut self, caps: &Capabilities) {
        let Some(session) = self.session_or_notice() else {
            return;
        };
        let Some(editor) = self.editor.as_mut() else {
            return;
        };
        if self.saving.as_ref() == Some(editor.id()) {
            self.surface(AppError::new(ErrorKind::Busy, "save already in flight"));
            return;
        }
        let Ok(draft) = editor.commit() else {
            return;
        };
        let session_id = draft.session_id.clone();

        let claimed = match &draft.id {
            None => self.mutator.begin_create(&session),
            Some(id) => self.mutator.begin_update(&session, id),
        };
        if let Err(e) = claimed {
            self.surface(e);
            return;
        }

        self.saving = Some(session_id.clone());
        let listing_id = draft.id.clone();
        let make_event = move |result| Event::SaveResolved {
            session_id,
            listing_id,
            result: Box::new(result),
        };
        match draft.id {
            None => caps.gateway.create(session.actor_id, draft.fields, make_event),
            Some(id) => caps.gateway.update(id, draft.fields.into(), make_event),
        }
    }

    /// A result for a session that has since been discarded only updates the
    /// store.
    fn save_resolved(
        &mut self,
        session_id: &SessionId,
        listing_id: Option<&ListingId>,
        result: Result<Listing, GatewayError>,
    ) {
        if self.saving.as_ref() == Some(session_id) {
            self.saving = None;
        }
        let outcome = self.mutator.resolve_save(listing_id, result);
        if self.editor.as_ref().map(EditSession::id) != Some(session_id) {
            warn!(%session_id, ok = outcome.is_ok(), "late save result, editor untouched");
            return;
        }
        match outcome {
            Ok(listing) => {
                info!(listing_id = %listing.id, "save committed, closing editor");
                // Committed: the session merged, so closing must not discard it.
                self.editor = None;
                self.sheet.close();
                self.toast = Some(Toast::new(ToastKind::ListingSaved));
            }
            Err(e) => self.surface(e),
        }
    }

    fn delete(&mut self, id: ListingId, caps: &Capabilities) {
        let Some(session) = self.session_or_notice() else {
            return;
        };
        match self.mutator.begin_delete(&session, &id) {
            Ok(()) => caps
                .gateway
                .delete(id.clone(), move |result| Event::DeleteResolved { id, result }),
            Err(e) => self.surface(e),
        }
    }

    fn toggle_favorite(&mut self, id: ListingId, caps: &Capabilities) {
        let Some(session) = self.session_or_notice() else {
            return;
        };
        match self.mutator.begin_favorite(&id) {
            Ok(desired) => caps.gateway.toggle_relation(
                session.actor_id,
                id.clone(),
                desired,
                move |result| Event::FavoriteResolved { id, result },
            ),
            Err(e) => self.surface(e),
        }
    }

    fn frame(&mut self, elapsed_ms: u64) {
        if self.sheet.tick(Duration::from_millis(elapsed_ms)) == Some(SheetSettled::Closed) {
            if let Some(editor) = self.editor.take() {
                editor.discard();
            }
        }
        if self.toast.as_mut().is_some_and(|t| t.advance(elapsed_ms)) {
            self.toast = None;
        }
    }

    fn surface(&mut self, e: impl Into<AppError>) {
        let err: AppError = e.into();
        debug!(code = err.code(), "surfacing notice");
        self.notice = Some(err);
    }

    fn view(&self) -> ViewModel {
        let store = self.mutator.store();
        let manager = self
            .session
            .as_ref()
            .filter(|s| s.role.can_manage_listings());
        let listings = store
            .listings()
            .iter()
            .filter(|l| matches_query(l, &self.query))
            .map(|l| {
                ListingCard::new(
                    l,
                    store.is_favorite(&l.id),
                    manager.is_some_and(|s| l.is_owned_by(&s.actor_id)),
                    self.mutator.is_in_flight(&l.id),
                )
            })
            .collect();
        ViewModel {
            listings,
            sheet: self.sheet.snapshot(),
            editor: self
                .editor
                .as_ref()
                .map(|e| EditorView::new(e, self.saving.as_ref() == Some(e.id()))),
            error: self.notice.as_ref().map(UserFacingError::from),
            toast: self.toast.as_ref().map(Into::into),
            query: self.query.clone(),
            is_loading: self.fetching,
            can_create: manager.is_some(),
            store_revision: store.revision(),
        }
    }
}
