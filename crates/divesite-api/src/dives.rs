use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::info;
use uuid::Uuid;

use divesite_db::models::{DiveFields, DiveRow, NewDive};
use divesite_types::api::{CreateDiveRequest, DiveResponse, UpdateDiveRequest};

use crate::error::{ApiError, ApiResult, JsonBody, PathParams};
use crate::middleware::AuthUser;
use crate::render;
use crate::sites::ensure_owner;
use crate::state::{AppState, blocking};

async fn find_dive(state: &AppState, id: Uuid) -> ApiResult<DiveRow> {
    blocking(state, move |db| db.get_dive(id))
        .await?
        .ok_or(ApiError::NotFound)
}

pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    WithRejection(Json(req), _): JsonBody<CreateDiveRequest>,
) -> ApiResult<impl IntoResponse> {
    let new = NewDive {
        divesite_id: req.divesite,
        diver_id: user.id(),
        fields: DiveFields {
            start_time: req.start_time,
            duration: req.duration,
            depth: req.depth,
            average_depth: req.average_depth,
            comment: req.comment,
            cylinder_capacity: req.cylinder_capacity,
            pressure_in: req.pressure_in,
            pressure_out: req.pressure_out,
            gas_mix: req.gas_mix,
            air_temperature: req.air_temperature,
            water_temperature: req.water_temperature,
            weather: req.weather,
            wind: req.wind,
        },
    };

    let dive = blocking(&state, move |db| db.create_dive(&new)).await?;
    info!("User {} logged dive {} at {}", user.id(), dive.id, dive.divesite_id);
    Ok((StatusCode::CREATED, Json(render::dive(dive))))
}

pub async fn retrieve(
    State(state): State<AppState>,
    WithRejection(Path(id), _): PathParams<Uuid>,
) -> ApiResult<Json<DiveResponse>> {
    Ok(Json(render::dive(find_dive(&state, id).await?)))
}

pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    WithRejection(Path(id), _): PathParams<Uuid>,
    WithRejection(Json(req), _): JsonBody<UpdateDiveRequest>,
) -> ApiResult<Json<DiveResponse>> {
    let current = find_dive(&state, id).await?;
    ensure_owner(&user, current.diver.id)?;

    let f = current.fields;
    let fields = DiveFields {
        start_time: req.start_time.unwrap_or(f.start_time),
        duration: req.duration.unwrap_or(f.duration),
        depth: req.depth.unwrap_or(f.depth),
        average_depth: req.average_depth.or(f.average_depth),
        comment: req.comment.unwrap_or(f.comment),
        cylinder_capacity: req.cylinder_capacity.or(f.cylinder_capacity),
        pressure_in: req.pressure_in.or(f.pressure_in),
        pressure_out: req.pressure_out.or(f.pressure_out),
        gas_mix: req.gas_mix.or(f.gas_mix),
        air_temperature: req.air_temperature.or(f.air_temperature),
        water_temperature: req.water_temperature.or(f.water_temperature),
        weather: req.weather.or(f.weather),
        wind: req.wind.or(f.wind),
    };
    let divesite_id = req.divesite.unwrap_or(current.divesite_id);

    let dive = blocking(&state, move |db| db.update_dive(id, divesite_id, &fields))
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(render::dive(dive)))
}

pub async fn destroy(
    State(state): State<AppState>,
    user: AuthUser,
    WithRejection(Path(id), _): PathParams<Uuid>,
) -> ApiResult<StatusCode> {
    let dive = find_dive(&state, id).await?;
    ensure_owner(&user, dive.diver.id)?;

    blocking(&state, move |db| db.delete_dive(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
