//! Read-only snapshots handed to the rendering layer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::edit_session::{EditMode, EditSession, Field};
use crate::error::{AppError, ErrorSeverity};
use crate::model::{Listing, SessionId};
use crate::sheet::SheetSnapshot;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserFacingError {
    pub message: String,
    pub is_transient: bool,
    pub error_code: String,
}

impl From<&AppError> for UserFacingError {
    fn from(e: &AppError) -> Self {
        Self {
            message: e.user_facing_message(),
            is_transient: e.severity == ErrorSeverity::Transient,
            error_code: e.code().to_string(),
        }
    }
}

/// Short confirmation shown after a write commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastKind {
    ListingSaved,
    ListingDeleted,
}

impl ToastKind {
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ListingSaved => "Listing saved",
            Self::ListingDeleted => "Listing deleted",
        }
    }

    const fn duration_ms(self) -> u64 {
        match self {
            Self::ListingSaved => 2_500,
            Self::ListingDeleted => 3_000,
        }
    }
}

/// Counts down on the frame clock the sheet animates with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Toast {
    kind: ToastKind,
    remaining_ms: u64,
}

impl Toast {
    #[must_use]
    pub const fn new(kind: ToastKind) -> Self {
        Self {
            kind,
            remaining_ms: kind.duration_ms(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ToastKind {
        self.kind
    }

    /// Returns true once the toast has run out.
    pub fn advance(&mut self, elapsed_ms: u64) -> bool {
        self.remaining_ms = self.remaining_ms.saturating_sub(elapsed_ms);
        self.remaining_ms == 0
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToastView {
    pub kind: ToastKind,
    pub message: String,
}

impl From<&Toast> for ToastView {
    fn from(toast: &Toast) -> Self {
        Self {
            kind: toast.kind,
            message: toast.kind.message().to_owned(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ListingCard {
    pub id: String,
    pub name: String,
    pub price_label: String,
    pub location: String,
    pub capacity: u32,
    pub available_slots: u32,
    pub image_ref: String,
    pub owner_name: String,
    pub offerings: Vec<String>,
    pub rules: Vec<String>,
    pub is_favorite: bool,
    /// The viewer may edit or delete this card.
    pub is_owned: bool,
    /// A mutation for this card is in flight.
    pub is_busy: bool,
}

impl ListingCard {
    pub fn new(listing: &Listing, is_favorite: bool, is_owned: bool, is_busy: bool) -> Self {
        let f = &listing.fields;
        Self {
            id: listing.id.to_string(),
            name: f.name.clone(),
            price_label: listing.price_label(),
            location: f.location.clone(),
            capacity: f.capacity,
            available_slots: f.available_slots,
            image_ref: f.image_ref.as_str().to_owned(),
            owner_name: f.owner_name.clone(),
            offerings: f.offerings_list().into_iter().map(str::to_owned).collect(),
            rules: f.rules_list().into_iter().map(str::to_owned).collect(),
            is_favorite,
            is_owned,
            is_busy,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EditorView {
    pub session_id: SessionId,
    pub mode: EditMode,
    pub values: BTreeMap<Field, String>,
    pub dirty: bool,
    /// Inline validation message for `error_field`.
    pub error: Option<UserFacingError>,
    pub error_field: Option<Field>,
    pub is_saving: bool,
}

impl EditorView {
    pub fn new(session: &EditSession, is_saving: bool) -> Self {
        let snapshot = session.snapshot();
        let error = snapshot.last_error.clone().map(|e| {
            let field = e.field();
            (UserFacingError::from(&AppError::from(e)), field)
        });
        Self {
            session_id: snapshot.session_id,
            mode: snapshot.mode,
            values: snapshot.values,
            dirty: snapshot.dirty,
            error_field: error.as_ref().map(|(_, f)| *f),
            error: error.map(|(e, _)| e),
            is_saving,
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ViewModel {
    pub listings: Vec<ListingCard>,
    pub sheet: SheetSnapshot,
    pub editor: Option<EditorView>,
    pub error: Option<UserFacingError>,
    pub toast: Option<ToastView>,
    pub query: String,
    pub is_loading: bool,
    pub can_create: bool,
    pub store_revision: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit_session::ValidationError;
    use crate::error::ErrorKind;
    use crate::model::fixtures::listing;

    #[test]
    fn card_formats_price_and_splits_lists() {
        let card = ListingCard::new(&listing("a"), true, false, false);
        assert_eq!(card.price_label, "P3500.00");
        assert_eq!(card.offerings, vec!["WiFi", "Aircon", "Laundry"]);
        assert_eq!(card.rules.len(), 2);
        assert!(card.is_favorite);
    }

    #[test]
    fn editor_view_surfaces_inline_error() {
        let mut session = EditSession::begin(None);
        let _ = session.commit();
        let view = EditorView::new(&session, false);
        assert_eq!(view.error_field, Some(Field::Name));
        let error = view.error.unwrap();
        assert!(!error.is_transient);
        assert_eq!(
            error.message,
            ValidationError::Missing(Field::Name).to_string()
        );
    }

    #[test]
    fn user_facing_error_hides_internal_detail() {
        let err = AppError::new(ErrorKind::Network, "dns lookup failed for db.internal");
        let view = UserFacingError::from(&err);
        assert!(!view.message.contains("db.internal"));
        assert!(view.is_transient);
        assert_eq!(view.error_code, "NETWORK_ERROR");
    }

    #[test]
    fn toast_expires_on_the_frame_clock() {
        let mut toast = Toast::new(ToastKind::ListingSaved);
        assert!(!toast.advance(2_000));
        assert!(!toast.advance(499));
        assert!(toast.advance(16));
        assert_eq!(ToastView::from(&toast).message, "Listing saved");
    }
}
