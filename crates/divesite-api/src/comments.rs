use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use divesite_db::models::CommentRow;
use divesite_types::api::{CommentResponse, CreateCommentRequest, UpdateCommentRequest};
use divesite_types::models::SiteKind;

use crate::error::{ApiError, ApiResult, JsonBody, PathParams};
use crate::middleware::AuthUser;
use crate::render;
use crate::sites::ensure_owner;
use crate::state::{AppState, blocking};

async fn find_comment(state: &AppState, kind: SiteKind, id: Uuid) -> ApiResult<CommentRow> {
    blocking(state, move |db| db.get_comment(kind, id))
        .await?
        .ok_or(ApiError::NotFound)
}

pub async fn create(
    State(state): State<AppState>,
    Extension(kind): Extension<SiteKind>,
    user: AuthUser,
    WithRejection(Json(req), _): JsonBody<CreateCommentRequest>,
) -> ApiResult<impl IntoResponse> {
    let site_id = req
        .site_for(kind)
        .ok_or_else(|| ApiError::BadRequest(format!("{kind}: This field is required.")))?;
    let owner_id = user.id();

    let comment = blocking(&state, move |db| db.create_comment(kind, site_id, owner_id, &req.text)).await?;
    Ok((StatusCode::CREATED, Json(render::comment(comment))))
}

pub async fn retrieve(
    State(state): State<AppState>,
    Extension(kind): Extension<SiteKind>,
    WithRejection(Path(id), _): PathParams<Uuid>,
) -> ApiResult<Json<CommentResponse>> {
    Ok(Json(render::comment(find_comment(&state, kind, id).await?)))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(kind): Extension<SiteKind>,
    user: AuthUser,
    WithRejection(Path(id), _): PathParams<Uuid>,
    WithRejection(Json(req), _): JsonBody<UpdateCommentRequest>,
) -> ApiResult<Json<CommentResponse>> {
    let current = find_comment(&state, kind, id).await?;
    ensure_owner(&user, current.owner.id)?;

    let Some(text) = req.text else {
        return Ok(Json(render::comment(current)));
    };
    let comment = blocking(&state, move |db| db.update_comment(id, &text))
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(render::comment(comment)))
}

pub async fn destroy(
    State(state): State<AppState>,
    Extension(kind): Extension<SiteKind>,
    user: AuthUser,
    WithRejection(Path(id), _): PathParams<Uuid>,
) -> ApiResult<StatusCode> {
    let comment = find_comment(&state, kind, id).await?;
    ensure_owner(&user, comment.owner.id)?;

    blocking(&state, move |db| db.delete_comment(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
