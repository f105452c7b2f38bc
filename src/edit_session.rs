//! Draft values for the listing editor.
//!
//! A session holds raw text per field and only parses numbers at commit time,
//! so the user can type freely. It never touches the store or the network;
//! [`crate::screen::ListingScreen`] sends the
//! [`CommittedDraft`] a successful commit produces through the mutator.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

use crate::model::{ImageRef, Listing, ListingFields, ListingId, SessionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    Price,
    Capacity,
    AvailableSlots,
    Location,
    Offerings,
    Rules,
    ImageRef,
    OwnerName,
}

impl Field {
    pub const ALL: [Field; 9] = [
        Field::Name,
        Field::Price,
        Field::Capacity,
        Field::AvailableSlots,
        Field::Location,
        Field::Offerings,
        Field::Rules,
        Field::ImageRef,
        Field::OwnerName,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Price => "price",
            Self::Capacity => "capacity",
            Self::AvailableSlots => "available_slots",
            Self::Location => "location",
            Self::Offerings => "offerings",
            Self::Rules => "rules",
            Self::ImageRef => "image_ref",
            Self::OwnerName => "owner_name",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownField(s.to_owned()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("{0} is required")]
    Missing(Field),

    #[error("{field} must be a number, got {value:?}")]
    InvalidNumber { field: Field, value: String },

    #[error("unknown field: {0}")]
    UnknownField(String),
}

impl ValidationError {
    /// The offending field. Unknown names map to `Name`, the first field of the form.
    pub fn field(&self) -> Field {
        match self {
            Self::Missing(field) | Self::InvalidNumber { field, .. } => *field,
            Self::UnknownField(_) => Field::Name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditMode {
    Create,
    Edit(ListingId),
}

/// Validated payload. `id` is present only in edit mode.
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedDraft {
    pub session_id: SessionId,
    pub id: Option<ListingId>,
    pub fields: ListingFields,
}

/// Read-only view of the session for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditSessionSnapshot {
    pub session_id: SessionId,
    pub mode: EditMode,
    pub values: BTreeMap<Field, String>,
    pub dirty: bool,
    pub last_error: Option<ValidationError>,
}

// Checked in this order; the first failure is reported.
const REQUIRED: [Field; 6] = [
    Field::Name,
    Field::Price,
    Field::Capacity,
    Field::AvailableSlots,
    Field::Location,
    Field::OwnerName,
];

#[derive(Debug, Clone)]
pub struct EditSession {
    id: SessionId,
    mode: EditMode,
    values: BTreeMap<Field, String>,
    initial: BTreeMap<Field, String>,
    last_error: Option<ValidationError>,
}

impl EditSession {
    /// Copy `source` into a new draft, or start empty in create mode.
    pub fn begin(source: Option<&Listing>) -> Self {
        let (mode, values) = match source {
            Some(listing) => (EditMode::Edit(listing.id.clone()), values_of(&listing.fields)),
            None => (
                EditMode::Create,
                Field::ALL.into_iter().map(|f| (f, String::new())).collect(),
            ),
        };
        let id = SessionId::generate();
        debug!(session_id = %id, ?mode, "edit session started");
        Self {
            id,
            mode,
            initial: values.clone(),
            values,
            last_error: None,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn mode(&self) -> &EditMode {
        &self.mode
    }

    pub fn listing_id(&self) -> Option<&ListingId> {
        match &self.mode {
            EditMode::Edit(id) => Some(id),
            EditMode::Create => None,
        }
    }

    /// Accepts any text.
    pub fn set_field(&mut self, field: Field, value: impl Into<String>) {
        self.values.insert(field, value.into());
    }

    pub fn value(&self, field: Field) -> &str {
        self.values.get(&field).map_or("", String::as_str)
    }

    pub fn is_dirty(&self) -> bool {
        self.values != self.initial
    }

    pub fn last_error(&self) -> Option<&ValidationError> {
        self.last_error.as_ref()
    }

    /// Validate and build the payload. Records the error for rendering.
    pub fn commit(&mut self) -> Result<CommittedDraft, ValidationError> {
        let result = self.validate();
        self.last_error = result.as_ref().err().cloned();
        if let Err(e) = &result {
            debug!(session_id = %self.id, error = %e, "commit rejected");
        }
        result
    }

    /// Drop the draft. Nothing remote happens.
    pub fn discard(self) {
        debug!(session_id = %self.id, "edit session discarded");
    }

    pub fn snapshot(&self) -> EditSessionSnapshot {
        EditSessionSnapshot {
            session_id: self.id.clone(),
            mode: self.mode.clone(),
            values: self.values.clone(),
            dirty: self.is_dirty(),
            last_error: self.last_error.clone(),
        }
    }

    fn validate(&self) -> Result<CommittedDraft, ValidationError> {
        if let Some(field) = REQUIRED.into_iter().find(|f| self.value(*f).trim().is_empty()) {
            return Err(ValidationError::Missing(field));
        }
        let price = self.parse_price()?;
        let capacity = self.parse_count(Field::Capacity)?;
        let available_slots = self.parse_count(Field::AvailableSlots)?;

        let image_ref = ImageRef::new(self.value(Field::ImageRef).trim());
        if self.mode == EditMode::Create && image_ref.is_empty() {
            return Err(ValidationError::Missing(Field::ImageRef));
        }

        Ok(CommittedDraft {
            session_id: self.id.clone(),
            id: self.listing_id().cloned(),
            fields: ListingFields {
                name: self.value(Field::Name).trim().to_owned(),
                price,
                capacity,
                available_slots,
                location: self.value(Field::Location).trim().to_owned(),
                offerings: self.value(Field::Offerings).trim().to_owned(),
                rules: self.value(Field::Rules).trim().to_owned(),
                image_ref,
                owner_name: self.value(Field::OwnerName).trim().to_owned(),
            },
        })
    }

    fn parse_price(&self) -> Result<f64, ValidationError> {
        let raw = self.value(Field::Price).trim();
        match raw.parse::<f64>() {
            Ok(v) if v.is_finite() && v >= 0.0 => Ok(v),
            _ => Err(ValidationError::InvalidNumber {
                field: Field::Price,
                value: raw.to_owned(),
            }),
        }
    }

    fn parse_count(&self, field: Field) -> Result<u32, ValidationError> {
        let raw = self.value(field).trim();
        raw.parse::<u32>().map_err(|_| ValidationError::InvalidNumber {
            field,
            value: raw.to_owned(),
        })
    }
}

fn values_of(fields: &ListingFields) -> BTreeMap<Field, String> {
    BTreeMap::from([
        (Field::Name, fields.name.clone()),
        (Field::Price, fields.price.to_string()),
        (Field::Capacity, fields.capacity.to_string()),
        (Field::AvailableSlots, fields.available_slots.to_string()),
        (Field::Location, fields.location.clone()),
        (Field::Offerings, fields.offerings.clone()),
        (Field::Rules, fields.rules.clone()),
        (Field::ImageRef, fields.image_ref.as_str().to_owned()),
        (Field::OwnerName, fields.owner_name.clone()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::listing;

    fn filled_create() -> EditSession {
        let mut s = EditSession::begin(None);
        s.set_field(Field::Name, "Casa Verde");
        s.set_field(Field::Price, "4500.50");
        s.set_field(Field::Capacity, "6");
        s.set_field(Field::AvailableSlots, "3");
        s.set_field(Field::Location, "Dapitan, Manila");
        s.set_field(Field::OwnerName, "Mang Jose");
        s.set_field(Field::ImageRef, "https://cdn.example.com/u/1.jpg");
        s
    }

    #[test]
    fn edit_mode_copies_the_record_and_carries_its_id() {
        let source = listing("d1");
        let mut s = EditSession::begin(Some(&source));
        assert_eq!(s.value(Field::Name), "Dorm d1");
        assert_eq!(s.value(Field::Price), "3500");
        assert!(!s.is_dirty());

        s.set_field(Field::Name, "Dorm d1 (renovated)");
        assert!(s.is_dirty());

        let draft = s.commit().unwrap();
        assert_eq!(draft.id, Some(ListingId::new("d1")));
        assert_eq!(draft.fields.name, "Dorm d1 (renovated)");
        assert_eq!(draft.fields.price, 3500.0);
    }

    #[test]
    fn create_mode_has_no_id() {
        let draft = filled_create().commit().unwrap();
        assert_eq!(draft.id, None);
        assert_eq!(draft.fields.price, 4500.5);
        assert_eq!(draft.fields.capacity, 6);
    }

    #[test]
    fn first_missing_field_is_reported() {
        let mut s = filled_create();
        s.set_field(Field::Price, "");
        s.set_field(Field::Location, "   ");
        assert_eq!(s.commit(), Err(ValidationError::Missing(Field::Price)));
        assert_eq!(s.last_error(), Some(&ValidationError::Missing(Field::Price)));
    }

    #[test]
    fn numbers_are_parsed_only_at_commit() {
        let mut s = filled_create();
        s.set_field(Field::Capacity, "six");
        assert_eq!(s.value(Field::Capacity), "six");
        assert_eq!(
            s.commit(),
            Err(ValidationError::InvalidNumber {
                field: Field::Capacity,
                value: "six".into()
            })
        );

        s.set_field(Field::Capacity, "6");
        s.set_field(Field::Price, "-1");
        assert_eq!(s.commit().unwrap_err().field(), Field::Price);

        s.set_field(Field::Price, "NaN");
        assert_eq!(s.commit().unwrap_err().field(), Field::Price);
    }

    #[test]
    fn image_required_only_when_creating() {
        let mut s = filled_create();
        s.set_field(Field::ImageRef, "");
        assert_eq!(s.commit(), Err(ValidationError::Missing(Field::ImageRef)));

        let mut source = listing("d2");
        source.fields.image_ref = ImageRef::default();
        let mut edit = EditSession::begin(Some(&source));
        assert!(edit.commit().is_ok());
    }

    #[test]
    fn successful_commit_clears_last_error() {
        let mut s = filled_create();
        s.set_field(Field::Name, "");
        assert!(s.commit().is_err());
        s.set_field(Field::Name, "Back");
        assert!(s.commit().is_ok());
        assert!(s.last_error().is_none());
    }

    #[test]
    fn field_names_round_trip_and_unknown_is_rejected() {
        for f in Field::ALL {
            assert_eq!(f.as_str().parse::<Field>().unwrap(), f);
        }
        assert!(matches!(
            "colour".parse::<Field>(),
            Err(ValidationError::UnknownField(_))
        ));
    }

    #[test]
    fn snapshot_exposes_values_and_error() {
        let mut s = EditSession::begin(None);
        let _ = s.commit();
        let snap = s.snapshot();
        assert_eq!(snap.mode, EditMode::Create);
        assert_eq!(snap.last_error, Some(ValidationError::Missing(Field::Name)));
        assert_eq!(snap.values.len(), Field::ALL.len());
    }
}
