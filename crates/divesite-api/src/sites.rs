use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::info;
use uuid::Uuid;

use divesite_db::models::{DivesiteFields, NewSite, SitePatch, SiteRow};
use divesite_types::api::{
    CommentResponse, CreateSiteRequest, DiveResponse, NearbySlipway, SiteResponse, UpdateSiteRequest,
};
use divesite_types::models::SiteKind;

use crate::error::{ApiError, ApiResult, JsonBody, PathParams};
use crate::geocoding;
use crate::middleware::AuthUser;
use crate::render;
use crate::state::{AppState, blocking};

/// Load a site of the routed kind or fail with 404.
pub(crate) async fn find_site(state: &AppState, kind: SiteKind, id: Uuid) -> ApiResult<SiteRow> {
    blocking(state, move |db| db.get_site(kind, id))
        .await?
        .ok_or(ApiError::NotFound)
}

pub(crate) fn ensure_owner(user: &AuthUser, owner_id: Uuid) -> ApiResult<()> {
    if user.id() == owner_id {
        Ok(())
    } else {
        Err(ApiError::forbidden())
    }
}

async fn detail(state: &AppState, row: SiteRow) -> ApiResult<SiteResponse> {
    blocking(state, move |db| render::site_detail(db, row)).await
}

pub async fn list(
    State(state): State<AppState>,
    Extension(kind): Extension<SiteKind>,
) -> ApiResult<Json<Vec<SiteResponse>>> {
    let sites = blocking(&state, move |db| {
        let rows = db.list_sites(kind)?;
        render::sites(db, rows)
    })
    .await?;
    Ok(Json(sites))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(kind): Extension<SiteKind>,
    user: AuthUser,
    WithRejection(Json(req), _): JsonBody<CreateSiteRequest>,
) -> ApiResult<impl IntoResponse> {
    let defaults = DivesiteFields::default();
    let new = NewSite {
        kind,
        name: req.name,
        description: req.description,
        latitude: req.latitude,
        longitude: req.longitude,
        owner_id: user.id(),
        divesite: DivesiteFields {
            level: req.level.unwrap_or(defaults.level),
            boat_entry: req.boat_entry.unwrap_or(defaults.boat_entry),
            shore_entry: req.shore_entry.unwrap_or(defaults.shore_entry),
            bottom_type: req.bottom_type,
        },
    };

    let mut row = blocking(&state, move |db| db.create_site(&new)).await?;
    info!("User {} created {} {}", user.id(), kind, row.id);

    if kind == SiteKind::Divesite {
        row.geocoding_data = geocoding::refresh(&state, row.id, row.point()).await;
    }

    Ok((StatusCode::CREATED, Json(detail(&state, row).await?)))
}

pub async fn retrieve(
    State(state): State<AppState>,
    Extension(kind): Extension<SiteKind>,
    WithRejection(Path(id), _): PathParams<Uuid>,
) -> ApiResult<Json<SiteResponse>> {
    let row = find_site(&state, kind, id).await?;
    Ok(Json(detail(&state, row).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(kind): Extension<SiteKind>,
    user: AuthUser,
    WithRejection(Path(id), _): PathParams<Uuid>,
    WithRejection(Json(req), _): JsonBody<UpdateSiteRequest>,
) -> ApiResult<Json<SiteResponse>> {
    let current = find_site(&state, kind, id).await?;
    ensure_owner(&user, current.owner.id)?;

    let patch = SitePatch {
        name: req.name,
        description: req.description,
        latitude: req.latitude,
        longitude: req.longitude,
        level: req.level,
        boat_entry: req.boat_entry,
        shore_entry: req.shore_entry,
        bottom_type: req.bottom_type,
    };
    let mut row = blocking(&state, move |db| db.update_site(kind, id, &patch))
        .await?
        .ok_or(ApiError::NotFound)?;

    let moved = row.point() != current.point();
    if moved && kind == SiteKind::Divesite {
        row.geocoding_data = geocoding::refresh(&state, row.id, row.point()).await;
    }

    Ok(Json(detail(&state, row).await?))
}

pub async fn destroy(
    State(state): State<AppState>,
    Extension(kind): Extension<SiteKind>,
    user: AuthUser,
    WithRejection(Path(id), _): PathParams<Uuid>,
) -> ApiResult<StatusCode> {
    let site = find_site(&state, kind, id).await?;
    ensure_owner(&user, site.owner.id)?;

    blocking(&state, move |db| db.delete_site(kind, id)).await?;
    info!("User {} deleted {} {}", user.id(), kind, id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn comments(
    State(state): State<AppState>,
    Extension(kind): Extension<SiteKind>,
    WithRejection(Path(id), _): PathParams<Uuid>,
) -> ApiResult<Json<Vec<CommentResponse>>> {
    find_site(&state, kind, id).await?;
    let comments = blocking(&state, move |db| db.comments_for_site(id)).await?;
    Ok(Json(comments.into_iter().map(render::comment).collect()))
}

pub async fn dives(
    State(state): State<AppState>,
    WithRejection(Path(id), _): PathParams<Uuid>,
) -> ApiResult<Json<Vec<DiveResponse>>> {
    find_site(&state, SiteKind::Divesite, id).await?;
    let dives = blocking(&state, move |db| db.dives_at_site(id)).await?;
    Ok(Json(dives.into_iter().map(render::dive).collect()))
}

/// Slipways within launching distance of a divesite, closest first.
pub async fn nearby_slipways(
    State(state): State<AppState>,
    WithRejection(Path(id), _): PathParams<Uuid>,
) -> ApiResult<Json<Vec<NearbySlipway>>> {
    let divesite = find_site(&state, SiteKind::Divesite, id).await?;
    let nearby = blocking(&state, move |db| db.nearby_slipways(&divesite)).await?;

    Ok(Json(
        nearby
            .into_iter()
            .map(|(row, distance_km)| NearbySlipway {
                slipway: render::site(row, Default::default(), None),
                distance_km,
            })
            .collect(),
    ))
}
