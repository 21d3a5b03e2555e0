use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use divesite_db::models::NewImage;
use divesite_types::api::{CreateImageRequest, ImageResponse, SetHeaderImageRequest, UpdateImageRequest};
use divesite_types::models::SiteKind;

use crate::error::{ApiError, ApiResult, JsonBody, PathParams};
use crate::middleware::AuthUser;
use crate::render;
use crate::sites::{ensure_owner, find_site};
use crate::state::{AppState, blocking};

pub async fn list(
    State(state): State<AppState>,
    Extension(kind): Extension<SiteKind>,
    WithRejection(Path(site_id), _): PathParams<Uuid>,
) -> ApiResult<Json<Vec<ImageResponse>>> {
    find_site(&state, kind, site_id).await?;
    let images = blocking(&state, move |db| db.list_images(site_id)).await?;
    Ok(Json(images.into_iter().map(render::image).collect()))
}

/// Anyone signed in may add an image; only the site owner may make it the header.
pub async fn create(
    State(state): State<AppState>,
    Extension(kind): Extension<SiteKind>,
    user: AuthUser,
    WithRejection(Path(site_id), _): PathParams<Uuid>,
    WithRejection(Json(req), _): JsonBody<CreateImageRequest>,
) -> ApiResult<impl IntoResponse> {
    let site = find_site(&state, kind, site_id).await?;
    if req.is_header_image {
        ensure_owner(&user, site.owner.id)?;
    }

    let new = NewImage {
        site_id,
        owner_id: user.id(),
        asset: req.image,
        caption: req.caption,
        is_header_image: req.is_header_image,
    };
    let image = blocking(&state, move |db| db.create_image(kind, &new)).await?;
    Ok((StatusCode::CREATED, Json(render::image(image))))
}

pub async fn retrieve(
    State(state): State<AppState>,
    Extension(kind): Extension<SiteKind>,
    WithRejection(Path((site_id, image_id)), _): PathParams<(Uuid, Uuid)>,
) -> ApiResult<Json<ImageResponse>> {
    find_site(&state, kind, site_id).await?;
    let image = blocking(&state, move |db| db.get_image(site_id, image_id))
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(render::image(image)))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(kind): Extension<SiteKind>,
    user: AuthUser,
    WithRejection(Path((site_id, image_id)), _): PathParams<(Uuid, Uuid)>,
    WithRejection(Json(req), _): JsonBody<UpdateImageRequest>,
) -> ApiResult<Json<ImageResponse>> {
    let site = find_site(&state, kind, site_id).await?;
    let image = blocking(&state, move |db| db.get_image(site_id, image_id))
        .await?
        .ok_or(ApiError::NotFound)?;
    ensure_owner(&user, image.owner.id)?;
    if req.is_header_image == Some(true) {
        ensure_owner(&user, site.owner.id)?;
    }

    let updated = blocking(&state, move |db| {
        db.update_image(site_id, image_id, req.caption.as_deref(), req.is_header_image)
    })
    .await?
    .ok_or(ApiError::NotFound)?;
    Ok(Json(render::image(updated)))
}

pub async fn destroy(
    State(state): State<AppState>,
    Extension(kind): Extension<SiteKind>,
    user: AuthUser,
    WithRejection(Path((site_id, image_id)), _): PathParams<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    find_site(&state, kind, site_id).await?;
    let image = blocking(&state, move |db| db.get_image(site_id, image_id))
        .await?
        .ok_or(ApiError::NotFound)?;
    ensure_owner(&user, image.owner.id)?;

    blocking(&state, move |db| db.delete_image(site_id, image_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// -- Header image --

/// The site's header image, or 204 if it has none.
pub async fn get_header(
    State(state): State<AppState>,
    Extension(kind): Extension<SiteKind>,
    WithRejection(Path(site_id), _): PathParams<Uuid>,
) -> ApiResult<Response> {
    find_site(&state, kind, site_id).await?;
    let header = blocking(&state, move |db| db.header_image(site_id)).await?;
    Ok(match header {
        Some(image) => Json(render::image(image)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

pub async fn set_header(
    State(state): State<AppState>,
    Extension(kind): Extension<SiteKind>,
    user: AuthUser,
    WithRejection(Path(site_id), _): PathParams<Uuid>,
    WithRejection(Json(req), _): JsonBody<SetHeaderImageRequest>,
) -> ApiResult<Json<ImageResponse>> {
    let site = find_site(&state, kind, site_id).await?;
    ensure_owner(&user, site.owner.id)?;

    let image = blocking(&state, move |db| db.set_header_image(site_id, req.id))
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(render::image(image)))
}

pub async fn clear_header(
    State(state): State<AppState>,
    Extension(kind): Extension<SiteKind>,
    user: AuthUser,
    WithRejection(Path(site_id), _): PathParams<Uuid>,
) -> ApiResult<StatusCode> {
    let site = find_site(&state, kind, site_id).await?;
    ensure_owner(&user, site.owner.id)?;

    blocking(&state, move |db| db.clear_header_image(site_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
