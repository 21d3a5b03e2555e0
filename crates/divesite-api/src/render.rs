//! Turns database rows into API responses.

use chrono::Utc;
use uuid::Uuid;

use divesite_db::Database;
use divesite_db::models::{
    ActionRow, CommentRow, DiveAggregates, DiveRow, ImageRow, ObjectRow, OwnerRow, ProfileImageRow, SiteRow,
};
use divesite_types::api::{
    ActionResponse, CommentResponse, DiveResponse, DivesiteDetails, FeedObject, ImageResponse, MinimalProfile,
    ProfileImageResponse, ProfileResponse, ProfileStats, SiteResponse, SiteSummary,
};
use divesite_types::models::SiteKind;

pub fn profile_image(row: ProfileImageRow) -> ProfileImageResponse {
    ProfileImageResponse {
        id: row.id,
        image: row.asset,
        creation_date: row.creation_date,
    }
}

pub fn minimal(owner: OwnerRow) -> MinimalProfile {
    MinimalProfile {
        id: owner.id,
        name: owner.name,
        profile_image: owner.image.map(profile_image),
    }
}

pub fn dive(row: DiveRow) -> DiveResponse {
    let f = row.fields;
    DiveResponse {
        id: row.id,
        divesite: row.divesite_id,
        diver: minimal(row.diver),
        start_time: f.start_time,
        duration: f.duration,
        depth: f.depth,
        average_depth: f.average_depth,
        comment: f.comment,
        cylinder_capacity: f.cylinder_capacity,
        pressure_in: f.pressure_in,
        pressure_out: f.pressure_out,
        gas_mix: f.gas_mix,
        air_temperature: f.air_temperature,
        water_temperature: f.water_temperature,
        weather: f.weather,
        wind: f.wind,
        creation_date: row.creation_date,
    }
}

/// A full site. Divesites carry their dive averages, and their dives when
/// `dives` is given.
pub fn site(row: SiteRow, aggregates: DiveAggregates, dives: Option<Vec<DiveResponse>>) -> SiteResponse {
    let divesite = row.divesite.map(|f| DivesiteDetails {
        level: f.level,
        boat_entry: f.boat_entry,
        shore_entry: f.shore_entry,
        bottom_type: f.bottom_type,
        depth: aggregates.average_depth,
        duration: aggregates.average_duration_minutes,
        dives,
    });

    SiteResponse {
        id: row.id,
        kind: row.kind,
        name: row.name,
        description: row.description,
        latitude: row.latitude,
        longitude: row.longitude,
        owner: minimal(row.owner),
        creation_date: row.creation_date,
        geocoding_data: row.geocoding_data,
        divesite,
    }
}

pub fn site_summary(row: SiteRow) -> SiteSummary {
    SiteSummary {
        id: row.id,
        kind: row.kind,
        name: row.name,
        description: row.description,
        latitude: row.latitude,
        longitude: row.longitude,
        creation_date: row.creation_date,
        geocoding_data: row.geocoding_data,
    }
}

pub fn comment(row: CommentRow) -> CommentResponse {
    CommentResponse {
        id: row.id,
        owner: minimal(row.owner),
        text: row.text,
        site: row.site_id,
        site_type: row.site_kind,
        creation_date: row.creation_date,
    }
}

pub fn image(row: ImageRow) -> ImageResponse {
    ImageResponse {
        id: row.id,
        owner: minimal(row.owner),
        image: row.asset,
        caption: row.caption,
        is_header_image: row.is_header_image,
        site: row.site_id,
        site_type: row.site_kind,
        creation_date: row.creation_date,
    }
}

fn feed_object(row: ObjectRow) -> FeedObject {
    match row {
        ObjectRow::Site(s) => FeedObject::Site(site_summary(s)),
        ObjectRow::Dive(d) => FeedObject::Dive(dive(d)),
        ObjectRow::Comment(c) => FeedObject::Comment(comment(c)),
        ObjectRow::Image(i) => FeedObject::Image(image(i)),
        ObjectRow::Profile(p) => FeedObject::Profile(minimal(p)),
    }
}

/// Render actions, resolving what each one points at.
pub fn actions(db: &Database, rows: Vec<ActionRow>) -> anyhow::Result<Vec<ActionResponse>> {
    rows.into_iter()
        .map(|row| {
            let action_object = match row.action_object {
                Some(obj) => db.resolve_object(obj)?.map(feed_object),
                None => None,
            };
            let target = match row.target {
                Some(t) => db.resolve_object(t)?.map(feed_object),
                None => None,
            };
            Ok(ActionResponse {
                id: row.id,
                actor: minimal(row.actor),
                verb: row.verb,
                action_object,
                target,
                target_type: row.target.map(|t| t.kind),
                timestamp: row.timestamp,
            })
        })
        .collect()
}

/// A site list with dive averages looked up in one query.
pub fn sites(db: &Database, rows: Vec<SiteRow>) -> anyhow::Result<Vec<SiteResponse>> {
    let aggregates = db.site_summaries()?;
    Ok(rows
        .into_iter()
        .map(|row| {
            let agg = aggregates.get(&row.id).copied().unwrap_or_default();
            site(row, agg, None)
        })
        .collect())
}

/// The full public profile, or `None` if there is no such user.
/// The email is included only when `own` is set.
pub fn profile(db: &Database, id: Uuid, own: bool) -> anyhow::Result<Option<ProfileResponse>> {
    let Some(row) = db.get_profile(id)? else {
        return Ok(None);
    };
    let stats = db.profile_stats(id, Utc::now())?;

    let owned = |kind: SiteKind| -> anyhow::Result<Vec<SiteSummary>> {
        Ok(db
            .list_sites_by_owner(id, kind)?
            .into_iter()
            .map(site_summary)
            .collect())
    };

    Ok(Some(ProfileResponse {
        id: row.owner.id,
        name: row.owner.name,
        bio: row.bio,
        date_joined: row.date_joined,
        email: own.then_some(row.email),
        profile_image: row.owner.image.map(profile_image),
        stats: ProfileStats {
            hours_underwater: stats.total_dive_seconds / 3600,
            divesites_visited: stats.divesites_visited,
            dives_in_last_365_days: stats.dives_in_last_365_days,
            dives_in_last_90_days: stats.dives_in_last_90_days,
        },
        dives: db.dives_by_diver(id)?.into_iter().map(dive).collect(),
        divesites: owned(SiteKind::Divesite)?,
        slipways: owned(SiteKind::Slipway)?,
        compressors: owned(SiteKind::Compressor)?,
    }))
}

/// Render several profiles, skipping any that have vanished.
pub fn profiles(db: &Database, ids: Vec<Uuid>) -> anyhow::Result<Vec<ProfileResponse>> {
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(p) = profile(db, id, false)? {
            out.push(p);
        }
    }
    Ok(out)
}

/// A single site as shown on its own page: divesites include their dives.
pub fn site_detail(db: &Database, row: SiteRow) -> anyhow::Result<SiteResponse> {
    if row.kind != SiteKind::Divesite {
        return Ok(site(row, DiveAggregates::default(), None));
    }
    let aggregates = db.site_summary(row.id)?;
    let dives = db.dives_at_site(row.id)?.into_iter().map(dive).collect();
    Ok(site(row, aggregates, Some(dives)))
}
