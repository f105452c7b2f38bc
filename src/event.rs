use serde::{Deserialize, Serialize};

use crate::config::CoreConfig;
use crate::edit_session::Field;
use crate::gateway::{ChangeNotice, GatewayError};
use crate::model::{ActorId, FavoriteRelation, Listing, ListingId, Session, SessionId};

/// Everything [`crate::screen::ListingScreen`] reacts to.
///
/// The shell sends the user and lifecycle events. The `*Fetched` and
/// `*Resolved` events are produced by the gateway capability when a request
/// completes; shells never construct them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    SessionStarted {
        session: Session,
    },
    Configured {
        config: CoreConfig,
    },
    Mounted,
    Unmounted,
    RefreshRequested,
    /// Forwarded from the realtime feed while subscribed.
    RemoteChanged {
        notice: ChangeNotice,
    },

    /// `None` opens the editor in create mode.
    EditorOpened {
        listing_id: Option<ListingId>,
    },
    EditorDismissed,
    DragMoved {
        dy: f64,
    },
    DragReleased {
        dy: f64,
    },
    Frame {
        elapsed_ms: u64,
    },
    FieldChanged {
        field: Field,
        value: String,
    },
    SaveRequested,

    DeleteRequested {
        id: ListingId,
    },
    FavoriteToggled {
        id: ListingId,
    },
    SearchChanged {
        query: String,
    },
    ListingTapped {
        id: ListingId,
    },
    OwnerTapped {
        owner_id: ActorId,
    },
    NoticeDismissed,

    // Gateway completions
    ListingsFetched {
        result: Result<Vec<Listing>, GatewayError>,
    },
    RelationsFetched {
        result: Result<Vec<FavoriteRelation>, GatewayError>,
    },
    ListingFetched {
        id: ListingId,
        result: Box<Result<Listing, GatewayError>>,
    },
    SaveResolved {
        session_id: SessionId,
        /// `None` for a create.
        listing_id: Option<ListingId>,
        result: Box<Result<Listing, GatewayError>>,
    },
    DeleteResolved {
        id: ListingId,
        result: Result<(), GatewayError>,
    },
    FavoriteResolved {
        id: ListingId,
        result: Result<(), GatewayError>,
    },
}

impl Event {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SessionStarted { .. } => "session_started",
            Self::Configured { .. } => "configured",
            Self::Mounted => "mounted",
            Self::Unmounted => "unmounted",
            Self::RefreshRequested => "refresh_requested",
            Self::RemoteChanged { .. } => "remote_changed",
            Self::EditorOpened { .. } => "editor_opened",
            Self::EditorDismissed => "editor_dismissed",
            Self::DragMoved { .. } => "drag_moved",
            Self::DragReleased { .. } => "drag_released",
            Self::Frame { .. } => "frame",
            Self::FieldChanged { .. } => "field_changed",
            Self::SaveRequested => "save_requested",
            Self::DeleteRequested { .. } => "delete_requested",
            Self::FavoriteToggled { .. } => "favorite_toggled",
            Self::SearchChanged { .. } => "search_changed",
            Self::ListingTapped { .. } => "listing_tapped",
            Self::OwnerTapped { .. } => "owner_tapped",
            Self::NoticeDismissed => "notice_dismissed",
            Self::ListingsFetched { .. } => "listings_fetched",
            Self::RelationsFetched { .. } => "relations_fetched",
            Self::ListingFetched { .. } => "listing_fetched",
            Self::SaveResolved { .. } => "save_resolved",
            Self::DeleteResolved { .. } => "delete_resolved",
            Self::FavoriteResolved { .. } => "favorite_resolved",
        }
    }

    /// Frames, feed wake-ups and gateway completions stay out of debug logs.
    #[must_use]
    pub const fn is_user_initiated(&self) -> bool {
        !matches!(
            self,
            Self::Frame { .. }
                | Self::RemoteChanged { .. }
                | Self::Mounted
                | Self::Unmounted
                | Self::SessionStarted { .. }
                | Self::Configured { .. }
                | Self::ListingsFetched { .. }
                | Self::RelationsFetched { .. }
                | Self::ListingFetched { .. }
                | Self::SaveResolved { .. }
                | Self::DeleteResolved { .. }
                | Self::FavoriteResolved { .. }
        )
    }
}
