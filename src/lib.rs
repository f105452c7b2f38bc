// lib.rs - dorm marketplace shared core

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub use crux_core::{render::Render, App as CruxApp, Effect as CruxEffect};

pub mod capabilities;
pub mod config;
pub mod edit_session;
pub mod entity_store;
pub mod error;
pub mod event;
pub mod gateway;
pub mod model;
pub mod mutator;
pub mod screen;
pub mod sheet;
#[cfg(all(feature = "sqlite", not(target_arch = "wasm32")))]
pub mod sqlite_gateway;
pub mod view;

use std::time::Duration;

pub use capabilities::{
    Capabilities, Destination, Effect, GatewayOperation, GatewayOutput, GatewayResponse,
    RealtimeOperation,
};
pub use config::{ConfigError, CoreConfig, SheetConfig, SyncConfig};
pub use edit_session::{CommittedDraft, EditMode, EditSession, Field, ValidationError};
pub use entity_store::EntityStore;
pub use error::{AppError, AppResult, ErrorKind, ErrorSeverity};
pub use event::Event;
pub use gateway::{ChangeNotice, GatewayError, InMemoryGateway, SyncGateway};
pub use model::{
    ActorId, FavoriteRelation, ImageRef, Listing, ListingFields, ListingFilter, ListingId,
    ListingPatch, Role, Session, SessionId, UnixTimeMs,
};
pub use mutator::{MutationError, MutatorMetrics, OptimisticMutator};
pub use screen::{ListingScreen, Model};
pub use sheet::{SheetController, SheetSettled, SheetSnapshot, SheetState};
#[cfg(all(feature = "sqlite", not(target_arch = "wasm32")))]
pub use sqlite_gateway::SqliteGateway;
pub use view::{EditorView, ListingCard, Toast, ToastKind, ToastView, UserFacingError, ViewModel};

pub const MAX_CACHED_LISTINGS: usize = 500;
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
pub const DISMISS_THRESHOLD_PX: f64 = 20.0;
