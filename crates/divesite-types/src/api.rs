use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{BottomType, Level, ObjectKind, SiteKind, Verb, Wind};

// -- JWT Claims --

/// Bearer token claims. `sub` is the user id, which doubles as the profile id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    pub user: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct CheckTokenRequest {
    pub token: Option<String>,
    pub user: Option<Uuid>,
}

// -- Profiles --

#[derive(Debug, Clone, Serialize)]
pub struct ProfileImageResponse {
    pub id: Uuid,
    pub image: String,
    pub creation_date: DateTime<Utc>,
}

/// Just enough of a profile to attribute something to its author.
#[derive(Debug, Clone, Serialize)]
pub struct MinimalProfile {
    pub id: Uuid,
    pub name: String,
    pub profile_image: Option<ProfileImageResponse>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileStats {
    pub hours_underwater: i64,
    pub divesites_visited: i64,
    pub dives_in_last_365_days: i64,
    pub dives_in_last_90_days: i64,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub name: String,
    pub bio: String,
    pub date_joined: DateTime<Utc>,
    /// Only present on the requester's own profile.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub profile_image: Option<ProfileImageResponse>,
    #[serde(flatten)]
    pub stats: ProfileStats,
    pub dives: Vec<DiveResponse>,
    pub divesites: Vec<SiteSummary>,
    pub slipways: Vec<SiteSummary>,
    pub compressors: Vec<SiteSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetProfileImageRequest {
    pub image: String,
}

// -- Sites --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateSiteRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub level: Option<Level>,
    pub boat_entry: Option<bool>,
    pub shore_entry: Option<bool>,
    pub bottom_type: Option<BottomType>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateSiteRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub level: Option<Level>,
    pub boat_entry: Option<bool>,
    pub shore_entry: Option<bool>,
    pub bottom_type: Option<BottomType>,
}

/// Fields only divesites carry.
#[derive(Debug, Clone, Serialize)]
pub struct DivesiteDetails {
    pub level: Level,
    pub boat_entry: bool,
    pub shore_entry: bool,
    pub bottom_type: Option<BottomType>,
    /// Average maximum depth of logged dives, 0 when none.
    pub depth: f64,
    /// Average dive duration in minutes, 0 when none.
    pub duration: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dives: Option<Vec<DiveResponse>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteResponse {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: SiteKind,
    pub name: String,
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub owner: MinimalProfile,
    pub creation_date: DateTime<Utc>,
    pub geocoding_data: Option<serde_json::Value>,
    #[serde(flatten)]
    pub divesite: Option<DivesiteDetails>,
}

/// A site without its owner, used inside profiles and feeds.
#[derive(Debug, Clone, Serialize)]
pub struct SiteSummary {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: SiteKind,
    pub name: String,
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub creation_date: DateTime<Utc>,
    pub geocoding_data: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct NearbySlipway {
    #[serde(flatten)]
    pub slipway: SiteResponse,
    pub distance_km: f64,
}

// -- Dives --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateDiveRequest {
    pub divesite: Uuid,
    pub start_time: DateTime<Utc>,
    /// Seconds.
    pub duration: i64,
    pub depth: f64,
    pub average_depth: Option<f64>,
    #[serde(default)]
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

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateDiveRequest {
    pub divesite: Option<Uuid>,
    pub start_time: Option<DateTime<Utc>>,
    pub duration: Option<i64>,
    pub depth: Option<f64>,
    pub average_depth: Option<f64>,
    pub comment: Option<String>,
    pub cylinder_capacity: Option<i64>,
    pub pressure_in: Option<i64>,
    pub pressure_out: Option<i64>,
    pub gas_mix: Option<i64>,
    pub air_temperature: Option<i64>,
    pub water_temperature: Option<i64>,
    pub weather: Option<String>,
    pub wind: Option<Wind>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiveResponse {
    pub id: Uuid,
    pub divesite: Uuid,
    pub diver: MinimalProfile,
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
    pub creation_date: DateTime<Utc>,
}

// -- Comments --

/// The site reference is sent under the site's own name, e.g. `divesite`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCommentRequest {
    pub text: String,
    pub divesite: Option<Uuid>,
    pub slipway: Option<Uuid>,
    pub compressor: Option<Uuid>,
}

impl CreateCommentRequest {
    pub fn site_for(&self, kind: SiteKind) -> Option<Uuid> {
        match kind {
            SiteKind::Divesite => self.divesite,
            SiteKind::Slipway => self.slipway,
            SiteKind::Compressor => self.compressor,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateCommentRequest {
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentResponse {
    pub id: Uuid,
    pub owner: MinimalProfile,
    pub text: String,
    pub site: Uuid,
    pub site_type: SiteKind,
    pub creation_date: DateTime<Utc>,
}

// -- Images --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateImageRequest {
    /// Reference to the asset on the external image host.
    pub image: String,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub is_header_image: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateImageRequest {
    pub caption: Option<String>,
    pub is_header_image: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct SetHeaderImageRequest {
    pub id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageResponse {
    pub id: Uuid,
    pub owner: MinimalProfile,
    pub image: String,
    pub caption: String,
    pub is_header_image: bool,
    pub site: Uuid,
    pub site_type: SiteKind,
    pub creation_date: DateTime<Utc>,
}

// -- Activity feed --

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum FeedObject {
    Site(SiteSummary),
    Dive(DiveResponse),
    Comment(CommentResponse),
    Image(ImageResponse),
    Profile(MinimalProfile),
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionResponse {
    pub id: i64,
    pub actor: MinimalProfile,
    pub verb: Verb,
    pub action_object: Option<FeedObject>,
    pub target: Option<FeedObject>,
    pub target_type: Option<ObjectKind>,
    pub timestamp: DateTime<Utc>,
}

pub const DEFAULT_PAGE_LIMIT: u32 = 10;
pub const MAX_PAGE_LIMIT: u32 = 100;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl PageQuery {
    pub fn limit(&self) -> u32 {
        self.limit
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .min(MAX_PAGE_LIMIT)
    }

    pub fn offset(&self) -> u32 {
        self.offset.unwrap_or(0)
    }
}

/// Limit/offset page with links to the neighbouring pages.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(path: &str, query: &PageQuery, count: u64, results: Vec<T>) -> Self {
        let limit = query.limit();
        let offset = query.offset();

        let next = (u64::from(offset) + u64::from(limit) < count)
            .then(|| format!("{path}?limit={limit}&offset={}", offset + limit));
        let previous = (offset > 0).then(|| {
            let prev = offset.saturating_sub(limit);
            if prev == 0 {
                format!("{path}?limit={limit}")
            } else {
                format!("{path}?limit={limit}&offset={prev}")
            }
        });

        Self {
            count,
            next,
            previous,
            results,
        }
    }
}

// -- Statistics --

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SiteStatistics {
    pub compressors: i64,
    pub dives: i64,
    pub divesites: i64,
    pub images: i64,
    pub slipways: i64,
    pub total_hours_underwater: i64,
    pub users: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_links() {
        let q = PageQuery { limit: None, offset: Some(10) };
        let page: Page<u8> = Page::new("/users/me/feed", &q, 25, vec![]);
        assert_eq!(page.next.as_deref(), Some("/users/me/feed?limit=10&offset=20"));
        assert_eq!(page.previous.as_deref(), Some("/users/me/feed?limit=10"));

        let first: Page<u8> = Page::new("/f", &PageQuery::default(), 4, vec![]);
        assert!(first.next.is_none());
        assert!(first.previous.is_none());
    }

    #[test]
    fn page_limit_is_clamped() {
        let q = PageQuery { limit: Some(1000), offset: None };
        assert_eq!(q.limit(), MAX_PAGE_LIMIT);
        let zero = PageQuery { limit: Some(0), offset: None };
        assert_eq!(zero.limit(), DEFAULT_PAGE_LIMIT);
    }

    #[test]
    fn comment_request_picks_site_by_kind() {
        let req: CreateCommentRequest =
            serde_json::from_str(r#"{"text":"nice","slipway":"6f1c7c04-9e65-4c4c-8d5f-6f2f0c0a1b2c"}"#).unwrap();
        assert!(req.site_for(SiteKind::Slipway).is_some());
        assert!(req.site_for(SiteKind::Divesite).is_none());
    }
}
