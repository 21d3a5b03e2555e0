//! Database row types. These map directly to SQLite rows and are kept
//! distinct from the API models in `divesite-types`.

use chrono::{DateTime, Utc};
use divesite_types::models::{BottomType, Level, ObjectKind, SiteKind, Verb, Wind};
use uuid::Uuid;

#[derive(Debug)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub password: String,
    pub date_joined: DateTime<Utc>,
}

#[derive(Debug)]
pub struct ProfileImageRow {
    pub id: Uuid,
    pub asset: String,
    pub creation_date: DateTime<Utc>,
}

/// Name and avatar of a user, joined onto anything they own.
#[derive(Debug)]
pub struct OwnerRow {
    pub id: Uuid,
    pub name: String,
    pub image: Option<ProfileImageRow>,
}

#[derive(Debug)]
pub struct ProfileRow {
    pub owner: OwnerRow,
    pub bio: String,
    pub email: String,
    pub date_joined: DateTime<Utc>,
}

#[derive(Debug)]
pub struct ProfileStatsRow {
    pub total_dive_seconds: i64,
    pub divesites_visited: i64,
    pub dives_in_last_365_days: i64,
    pub dives_in_last_90_days: i64,
}

#[derive(Debug, Clone)]
pub struct DivesiteFields {
    pub level: Level,
    pub boat_entry: bool,
    pub shore_entry: bool,
    pub bottom_type: Option<BottomType>,
}

impl Default for DivesiteFields {
    fn default() -> Self {
        Self {
            level: Level::Beginner,
            boat_entry: false,
            shore_entry: true,
            bottom_type: None,
        }
    }
}

#[derive(Debug)]
pub struct NewSite {
    pub kind: SiteKind,
    pub name: String,
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub owner_id: Uuid,
    /// Ignored unless `kind` is `Divesite`.
    pub divesite: DivesiteFields,
}

#[derive(Debug, Default)]
pub struct SitePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub level: Option<Level>,
    pub boat_entry: Option<bool>,
    pub shore_entry: Option<bool>,
    pub bottom_type: Option<BottomType>,
}

#[derive(Debug)]
pub struct SiteRow {
    pub id: Uuid,
    pub kind: SiteKind,
    pub name: String,
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub owner: OwnerRow,
    pub creation_date: DateTime<Utc>,
    pub geocoding_data: Option<serde_json::Value>,
    /// Present only for divesites.
    pub divesite: Option<DivesiteFields>,
}

impl SiteRow {
    pub fn point(&self) -> divesite_types::geo::Point {
        divesite_types::geo::Point::new(self.latitude, self.longitude)
    }
}

/// Aggregates over the dives logged at one divesite.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiveAggregates {
    pub average_depth: f64,
    pub average_duration_minutes: f64,
}

#[derive(Debug, Clone, Default)]
pub struct DiveFields {
    pub start_time: DateTime<Utc>,
    pub duration: i64,
    pub depth: f64,
    pub average_depth: Option<f64>,
    pub comment: String,
    pub cylinder_capacity: Option<i64>,
    pub pressure_in: Option<i64>,
    pub pressure_out: Option<i64>,
    pub gas_mix: Option<i64>,
    pub air_temperature: Option<i64>,
    pub water_temperature: Option<i64>,
    pub weather: Option<String>,
    pub wind: Option<Wind>,
}

#[derive(Debug)]
pub struct NewDive {
    pub divesite_id: Uuid,
    pub diver_id: Uuid,
    pub fields: DiveFields,
}

#[derive(Debug)]
pub struct DiveRow {
    pub id: Uuid,
    pub divesite_id: Uuid,
    pub diver: OwnerRow,
    pub fields: DiveFields,
    pub creation_date: DateTime<Utc>,
}

#[derive(Debug)]
pub struct CommentRow {
    pub id: Uuid,
    pub site_id: Uuid,
    pub site_kind: SiteKind,
    pub owner: OwnerRow,
    pub text: String,
    pub creation_date: DateTime<Utc>,
}

#[derive(Debug)]
pub struct NewImage {
    pub site_id: Uuid,
    pub owner_id: Uuid,
    pub asset: String,
    pub caption: String,
    pub is_header_image: bool,
}

#[derive(Debug)]
pub struct ImageRow {
    pub id: Uuid,
    pub site_id: Uuid,
    pub site_kind: SiteKind,
    pub owner: OwnerRow,
    pub asset: String,
    pub caption: String,
    pub is_header_image: bool,
    pub creation_date: DateTime<Utc>,
}

/// Reference to an action's object or target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectRef {
    pub kind: ObjectKind,
    pub id: Uuid,
}

impl ObjectRef {
    pub fn new(kind: impl Into<ObjectKind>, id: Uuid) -> Self {
        Self {
            kind: kind.into(),
            id,
        }
    }
}

#[derive(Debug)]
pub struct ActionRow {
    pub id: i64,
    pub actor: OwnerRow,
    pub verb: Verb,
    pub action_object: Option<ObjectRef>,
    pub target: Option<ObjectRef>,
    pub timestamp: DateTime<Utc>,
}

/// A resolved action object or target. Deleted objects resolve to nothing.
#[derive(Debug)]
pub enum ObjectRow {
    Site(SiteRow),
    Dive(DiveRow),
    Comment(CommentRow),
    Image(ImageRow),
    Profile(OwnerRow),
}

#[derive(Debug)]
pub struct StatisticsRow {
    pub compressors: i64,
    pub dives: i64,
    pub divesites: i64,
    pub images: i64,
    pub slipways: i64,
    pub total_dive_seconds: i64,
    pub users: i64,
}
