use serde::{Deserialize, Serialize};
use std::fmt;

// --- Typed IDs ---

macro_rules! typed_id {
    ($name:ident) => {
        #[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

typed_id!(ListingId);
typed_id!(ActorId);
typed_id!(SessionId);

impl SessionId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// Unix timestamp in milliseconds
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnixTimeMs(pub u64);

impl UnixTimeMs {
    pub fn now() -> Self {
        let millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        Self(u64::try_from(millis).unwrap_or(u64::MAX))
    }
}

/// Opaque reference returned by the image upload service.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Landlord,
    Tenant,
}

impl Role {
    pub const fn can_manage_listings(self) -> bool {
        matches!(self, Self::Landlord)
    }
}

/// Result of the (external) credential exchange.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub actor_id: ActorId,
    pub role: Role,
}

impl Session {
    pub fn new(actor_id: impl Into<ActorId>, role: Role) -> Self {
        Self {
            actor_id: actor_id.into(),
            role,
        }
    }
}

impl From<String> for ActorId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The user-editable part of a listing.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ListingFields {
    pub name: String,
    pub price: f64,
    pub capacity: u32,
    pub available_slots: u32,
    pub location: String,
    /// Comma-delimited.
    pub offerings: String,
    /// Comma-delimited.
    pub rules: String,
    pub image_ref: ImageRef,
    pub owner_name: String,
}

impl ListingFields {
    pub fn offerings_list(&self) -> Vec<&str> {
        split_items(&self.offerings)
    }

    pub fn rules_list(&self) -> Vec<&str> {
        split_items(&self.rules)
    }
}

/// A committed listing. Only records with a server-assigned id live here;
/// drafts stay in [`crate::edit_session::EditSession`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Listing {
    pub id: ListingId,
    pub owner_id: ActorId,
    pub created_at: UnixTimeMs,
    #[serde(flatten)]
    pub fields: ListingFields,
}

impl Listing {
    pub fn is_owned_by(&self, actor: &ActorId) -> bool {
        &self.owner_id == actor
    }

    pub fn price_label(&self) -> String {
        format_price(self.fields.price)
    }
}

/// Partial update; `None` leaves the field untouched.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ListingPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_slots: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offerings: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<ImageRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_name: Option<String>,
}

impl ListingPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply_to(&self, fields: &mut ListingFields) {
        if let Some(v) = &self.name {
            fields.name.clone_from(v);
        }
        if let Some(v) = self.price {
            fields.price = v;
        }
        if let Some(v) = self.capacity {
            fields.capacity = v;
        }
        if let Some(v) = self.available_slots {
            fields.available_slots = v;
        }
        if let Some(v) = &self.location {
            fields.location.clone_from(v);
        }
        if let Some(v) = &self.offerings {
            fields.offerings.clone_from(v);
        }
        if let Some(v) = &self.rules {
            fields.rules.clone_from(v);
        }
        if let Some(v) = &self.image_ref {
            fields.image_ref = v.clone();
        }
        if let Some(v) = &self.owner_name {
            fields.owner_name.clone_from(v);
        }
    }
}

impl From<ListingFields> for ListingPatch {
    fn from(f: ListingFields) -> Self {
        Self {
            name: Some(f.name),
            price: Some(f.price),
            capacity: Some(f.capacity),
            available_slots: Some(f.available_slots),
            location: Some(f.location),
            offerings: Some(f.offerings),
            rules: Some(f.rules),
            image_ref: Some(f.image_ref),
            owner_name: Some(f.owner_name),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FavoriteRelation {
    pub actor_id: ActorId,
    pub listing_id: ListingId,
}

/// Scope for `fetch_all`. Results are newest first.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub enum ListingFilter {
    #[default]
    All,
    OwnedBy(ActorId),
}

impl ListingFilter {
    pub fn matches(&self, listing: &Listing) -> bool {
        match self {
            Self::All => true,
            Self::OwnedBy(owner) => listing.is_owned_by(owner),
        }
    }
}

/// Explore-tab search: name or location (case-insensitive) or price digits.
pub fn matches_query(listing: &Listing, query: &str) -> bool {
    let query = query.trim();
    if query.is_empty() {
        return true;
    }
    let needle = query.to_lowercase();
    listing.fields.name.to_lowercase().contains(&needle)
        || listing.fields.location.to_lowercase().contains(&needle)
        || listing.fields.price.to_string().contains(query)
}

#[must_use]
pub fn format_price(price: f64) -> String {
    if !price.is_finite() {
        return "P-".into();
    }
    format!("P{price:.2}")
}

fn split_items(s: &str) -> Vec<&str> {
    s.split(',').map(str::trim).filter(|i| !i.is_empty()).collect()
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn offerings_split_on_commas_and_trim() {
        let f = ListingFields {
            offerings: " WiFi ,, Aircon,".into(),
            ..fields("x")
        };
        assert_eq!(f.offerings_list(), vec!["WiFi", "Aircon"]);
        assert_eq!(fields("x").rules_list(), vec!["No pets", "Curfew 11PM"]);
    }

    #[test]
    fn price_label_has_two_decimals() {
        assert_eq!(format_price(3500.0), "P3500.00");
        assert_eq!(format_price(12.345), "P12.35");
        assert_eq!(format_price(f64::NAN), "P-");
    }

    #[test]
    fn patch_only_touches_present_fields() {
        let mut f = fields("Old");
        let patch = ListingPatch {
            name: Some("New".into()),
            available_slots: Some(0),
            ..Default::default()
        };
        patch.apply_to(&mut f);
        assert_eq!(f.name, "New");
        assert_eq!(f.available_slots, 0);
        assert_eq!(f.capacity, 4);
        assert!(ListingPatch::default().is_empty());
    }

    #[test]
    fn search_matches_name_location_or_price() {
        let l = listing("a1");
        assert!(matches_query(&l, "dorm A1"));
        assert!(matches_query(&l, "manila"));
        assert!(matches_query(&l, "3500"));
        assert!(matches_query(&l, "   "));
        assert!(!matches_query(&l, "Cebu"));
    }

    #[test]
    fn filter_by_owner() {
        let l = listing("a1");
        assert!(ListingFilter::All.matches(&l));
        assert!(ListingFilter::OwnedBy(ActorId::new("landlord-1")).matches(&l));
        assert!(!ListingFilter::OwnedBy(ActorId::new("someone")).matches(&l));
    }

    #[test]
    fn listing_serializes_flat() {
        let json = serde_json::to_value(listing("a1")).unwrap();
        assert_eq!(json["id"], "a1");
        assert_eq!(json["name"], "Dorm a1");
        assert_eq!(json["capacity"], 4);
    }
}
