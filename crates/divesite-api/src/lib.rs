pub mod auth;
pub mod comments;
pub mod dives;
pub mod error;
pub mod geocoding;
pub mod images;
pub mod middleware;
pub mod profiles;
pub mod render;
pub mod sites;
pub mod state;
pub mod statistics;

use axum::{
    Extension, Router,
    routing::{get, post},
};

use divesite_types::models::SiteKind;

pub use state::{AppState, AppStateInner};

/// Every route of the API. Reads are public; writes need a bearer token.
pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/check-token", post(auth::check_token))
        .route("/dives", post(dives::create))
        .route(
            "/dives/{id}",
            get(dives::retrieve).patch(dives::update).delete(dives::destroy),
        )
        .route("/statistics", get(statistics::statistics))
        .merge(profile_routes());

    for kind in SiteKind::ALL {
        app = app.merge(site_routes(kind)).merge(comment_routes(kind));
    }

    app.with_state(state)
}

/// The same surface for every kind of site, mounted at its collection path.
fn site_routes(kind: SiteKind) -> Router<AppState> {
    let base = format!("/{}", kind.collection());
    let mut routes = Router::new()
        .route(&base, get(sites::list).post(sites::create))
        .route(
            &format!("{base}/{{id}}"),
            get(sites::retrieve).patch(sites::update).delete(sites::destroy),
        )
        .route(&format!("{base}/{{id}}/comments"), get(sites::comments))
        .route(
            &format!("{base}/{{id}}/header_image"),
            get(images::get_header).post(images::set_header).delete(images::clear_header),
        )
        .route(&format!("{base}/{{id}}/images"), get(images::list).post(images::create))
        .route(
            &format!("{base}/{{id}}/images/{{image_id}}"),
            get(images::retrieve).patch(images::update).delete(images::destroy),
        );

    if kind == SiteKind::Divesite {
        routes = routes
            .route(&format!("{base}/{{id}}/dives"), get(sites::dives))
            .route(&format!("{base}/{{id}}/nearby_slipways"), get(sites::nearby_slipways));
    }

    routes.layer(Extension(kind))
}

fn comment_routes(kind: SiteKind) -> Router<AppState> {
    let base = format!("/comments/{}", kind.collection());
    Router::new()
        .route(&base, post(comments::create))
        .route(
            &format!("{base}/{{id}}"),
            get(comments::retrieve).patch(comments::update).delete(comments::destroy),
        )
        .layer(Extension(kind))
}

fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(profiles::me))
        .route("/users/me/feed", get(profiles::my_feed))
        .route("/users/me/followers", get(profiles::my_followers))
        .route("/users/me/follows", get(profiles::my_follows))
        .route("/users/{id}", get(profiles::retrieve).patch(profiles::update))
        .route("/users/{id}/minimal", get(profiles::minimal))
        .route("/users/{id}/dives", get(profiles::dives))
        .route("/users/{id}/divesites", get(profiles::divesites))
        .route("/users/{id}/images", get(profiles::images))
        .route("/users/{id}/feed", get(profiles::feed))
        .route("/users/{id}/followers", get(profiles::followers))
        .route("/users/{id}/follows", get(profiles::follows))
        .route("/users/{id}/follow", post(profiles::follow))
        .route("/users/{id}/unfollow", post(profiles::unfollow))
        .route(
            "/users/{id}/profile_image",
            get(profiles::get_profile_image)
                .post(profiles::set_profile_image)
                .delete(profiles::delete_profile_image),
        )
}
