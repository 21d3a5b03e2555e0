use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::WithRejection;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use divesite_types::api::{
    ActionResponse, DiveResponse, ImageResponse, MinimalProfile, Page, PageQuery, ProfileImageResponse,
    ProfileResponse, SetProfileImageRequest, SiteResponse, UpdateProfileRequest,
};
use divesite_types::models::SiteKind;
use divesite_types::validation::MAX_NAME_LEN;

use crate::error::{ApiError, ApiResult, JsonBody, PathParams};
use crate::middleware::AuthUser;
use crate::render;
use crate::sites::ensure_owner;
use crate::state::{AppState, blocking};

async fn ensure_exists(state: &AppState, id: Uuid) -> ApiResult<()> {
    blocking(state, move |db| db.get_owner(id))
        .await?
        .map(|_| ())
        .ok_or(ApiError::NotFound)
}

async fn full_profile(state: &AppState, id: Uuid, own: bool) -> ApiResult<ProfileResponse> {
    blocking(state, move |db| render::profile(db, id, own))
        .await?
        .ok_or(ApiError::NotFound)
}

pub async fn retrieve(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    WithRejection(Path(id), _): PathParams<Uuid>,
) -> ApiResult<Json<ProfileResponse>> {
    let own = user.is_some_and(|u| u.id() == id);
    Ok(Json(full_profile(&state, id, own).await?))
}

pub async fn me(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<ProfileResponse>> {
    Ok(Json(full_profile(&state, user.id(), true).await?))
}

pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    WithRejection(Path(id), _): PathParams<Uuid>,
    WithRejection(Json(req), _): JsonBody<UpdateProfileRequest>,
) -> ApiResult<Json<ProfileResponse>> {
    ensure_exists(&state, id).await?;
    ensure_owner(&user, id)?;
    if req.name.as_ref().is_some_and(|n| n.chars().count() > MAX_NAME_LEN) {
        return Err(ApiError::BadRequest(format!(
            "Ensure this field has no more than {MAX_NAME_LEN} characters."
        )));
    }

    blocking(&state, move |db| db.update_profile(id, req.name.as_deref(), req.bio.as_deref())).await?;
    Ok(Json(full_profile(&state, id, true).await?))
}

pub async fn minimal(
    State(state): State<AppState>,
    WithRejection(Path(id), _): PathParams<Uuid>,
) -> ApiResult<Json<MinimalProfile>> {
    let owner = blocking(&state, move |db| db.get_owner(id))
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(render::minimal(owner)))
}

pub async fn dives(
    State(state): State<AppState>,
    WithRejection(Path(id), _): PathParams<Uuid>,
) -> ApiResult<Json<Vec<DiveResponse>>> {
    ensure_exists(&state, id).await?;
    let dives = blocking(&state, move |db| db.dives_by_diver(id)).await?;
    Ok(Json(dives.into_iter().map(render::dive).collect()))
}

pub async fn divesites(
    State(state): State<AppState>,
    WithRejection(Path(id), _): PathParams<Uuid>,
) -> ApiResult<Json<Vec<SiteResponse>>> {
    ensure_exists(&state, id).await?;
    let sites = blocking(&state, move |db| {
        let rows = db.list_sites_by_owner(id, SiteKind::Divesite)?;
        render::sites(db, rows)
    })
    .await?;
    Ok(Json(sites))
}

pub async fn images(
    State(state): State<AppState>,
    WithRejection(Path(id), _): PathParams<Uuid>,
) -> ApiResult<Json<Vec<ImageResponse>>> {
    ensure_exists(&state, id).await?;
    let images = blocking(&state, move |db| db.images_by_owner(id)).await?;
    Ok(Json(images.into_iter().map(render::image).collect()))
}

// -- Activity --

/// Everything a user has done, newest first.
pub async fn feed(
    State(state): State<AppState>,
    WithRejection(Path(id), _): PathParams<Uuid>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Page<ActionResponse>>> {
    ensure_exists(&state, id).await?;
    let (limit, offset) = (page.limit(), page.offset());
    let (count, actions) = blocking(&state, move |db| {
        let (count, rows) = db.actions_by_actor(id, limit, offset)?;
        Ok((count, render::actions(db, rows)?))
    })
    .await?;
    Ok(Json(Page::new(&format!("/users/{id}/feed"), &page, count, actions)))
}

/// The caller's own actions plus those of everyone they follow.
pub async fn my_feed(
    State(state): State<AppState>,
    user: AuthUser,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Page<ActionResponse>>> {
    let id = user.id();
    let (limit, offset) = (page.limit(), page.offset());
    let (count, actions) = blocking(&state, move |db| {
        let (count, rows) = db.feed_for(id, limit, offset)?;
        Ok((count, render::actions(db, rows)?))
    })
    .await?;
    Ok(Json(Page::new("/users/me/feed", &page, count, actions)))
}

// -- Follows --

pub async fn follow(
    State(state): State<AppState>,
    user: AuthUser,
    WithRejection(Path(id), _): PathParams<Uuid>,
) -> ApiResult<Response> {
    if user.id() == id {
        return Err(ApiError::Forbidden("You cannot follow yourself".into()));
    }
    ensure_exists(&state, id).await?;

    let follower = user.id();
    if blocking(&state, move |db| db.follow(follower, id)).await? {
        info!("User {} now follows {}", follower, id);
    }
    Ok(Json(json!({})).into_response())
}

pub async fn unfollow(
    State(state): State<AppState>,
    user: AuthUser,
    WithRejection(Path(id), _): PathParams<Uuid>,
) -> ApiResult<Response> {
    if user.id() == id {
        return Err(ApiError::Forbidden("You cannot unfollow yourself".into()));
    }
    ensure_exists(&state, id).await?;

    let follower = user.id();
    blocking(&state, move |db| db.unfollow(follower, id)).await?;
    Ok(Json(json!({})).into_response())
}

pub async fn followers(
    State(state): State<AppState>,
    WithRejection(Path(id), _): PathParams<Uuid>,
) -> ApiResult<Json<Vec<ProfileResponse>>> {
    ensure_exists(&state, id).await?;
    list_profiles(&state, id, Relation::Followers).await
}

pub async fn follows(
    State(state): State<AppState>,
    WithRejection(Path(id), _): PathParams<Uuid>,
) -> ApiResult<Json<Vec<ProfileResponse>>> {
    ensure_exists(&state, id).await?;
    list_profiles(&state, id, Relation::Follows).await
}

pub async fn my_followers(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Vec<ProfileResponse>>> {
    list_profiles(&state, user.id(), Relation::Followers).await
}

pub async fn my_follows(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Vec<ProfileResponse>>> {
    list_profiles(&state, user.id(), Relation::Follows).await
}

#[derive(Clone, Copy)]
enum Relation {
    Followers,
    Follows,
}

async fn list_profiles(state: &AppState, id: Uuid, relation: Relation) -> ApiResult<Json<Vec<ProfileResponse>>> {
    let profiles = blocking(state, move |db| {
        let ids = match relation {
            Relation::Followers => db.followers(id)?,
            Relation::Follows => db.follows(id)?,
        };
        render::profiles(db, ids)
    })
    .await?;
    Ok(Json(profiles))
}

// -- Profile image --

pub async fn get_profile_image(
    State(state): State<AppState>,
    WithRejection(Path(id), _): PathParams<Uuid>,
) -> ApiResult<Response> {
    ensure_exists(&state, id).await?;
    let image = blocking(&state, move |db| db.get_profile_image(id)).await?;
    Ok(match image {
        Some(row) => Json(render::profile_image(row)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

/// Replace the caller's profile image.
pub async fn set_profile_image(
    State(state): State<AppState>,
    user: AuthUser,
    WithRejection(Path(id), _): PathParams<Uuid>,
    WithRejection(Json(req), _): JsonBody<SetProfileImageRequest>,
) -> ApiResult<Json<ProfileImageResponse>> {
    ensure_owner(&user, id)?;
    ensure_exists(&state, id).await?;

    let image = blocking(&state, move |db| db.set_profile_image(id, &req.image)).await?;
    Ok(Json(render::profile_image(image)))
}

pub async fn delete_profile_image(
    State(state): State<AppState>,
    user: AuthUser,
    WithRejection(Path(id), _): PathParams<Uuid>,
) -> ApiResult<StatusCode> {
    ensure_owner(&user, id)?;
    blocking(&state, move |db| db.delete_profile_image(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
