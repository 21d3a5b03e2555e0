use axum::{Json, extract::State};

use divesite_types::api::SiteStatistics;

use crate::error::ApiResult;
use crate::state::{AppState, blocking};

pub async fn statistics(State(state): State<AppState>) -> ApiResult<Json<SiteStatistics>> {
    let stats = blocking(&state, |db| db.statistics()).await?;
    Ok(Json(SiteStatistics {
        compressors: stats.compressors,
        dives: stats.dives,
        divesites: stats.divesites,
        images: stats.images,
        slipways: stats.slipways,
        total_hours_underwater: stats.total_dive_seconds / 3600,
        users: stats.users,
    }))
}
