mod admin;
mod api;
mod auth;
mod catalog;
mod config;
mod db;
mod entities;
mod error;
mod models;
mod ratings;
mod reviews;
mod routes;
mod templates;
#[cfg(test)]
mod testing;

use std::{net::SocketAddr, sync::Arc};

use axum::{
    Router,
    routing::{delete, get, post},
};
use sea_orm::DatabaseConnection;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    admin::Admin, catalog::Catalog, config::Config, ratings::Ratings, reviews::Reviews,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub catalog: Catalog,
    pub ratings: Ratings,
    pub reviews: Reviews,
    pub admin: Admin,
}

impl AppState {
    pub fn new(config: Arc<Config>, db: DatabaseConnection) -> Self {
        Self {
            catalog: Catalog::new(db.clone(), config.page_size),
            ratings: Ratings::new(db.clone()),
            reviews: Reviews::new(db.clone()),
            admin: Admin::new(db),
            config,
        }
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/movies", get(api::movies))
        .route("/movie/{id}", get(api::movie))
        .route("/review", post(api::create_review))
        .route("/rating", post(api::rate))
        .route("/actors", get(api::actors))
        .route("/actors/{id}", get(api::actor));

    let admin = Router::new()
        .route("/", get(admin::site))
        .route("/categories", post(admin::create_category))
        .route("/genres", post(admin::create_genre))
        .route("/actors", post(admin::create_actor))
        .route("/movies", get(admin::movies).post(admin::create_movie))
        .route("/movies/{id}", delete(admin::delete_movie).patch(admin::update_movie))
        .route("/movies/{id}/shots", post(admin::add_shot))
        .route("/movies/publish", post(admin::publish))
        .route("/movies/unpublish", post(admin::unpublish))
        .route("/reviews", get(admin::reviews));

    Router::new()
        .route("/", get(routes::index))
        .route("/movie/{slug}", get(routes::movie_detail))
        .route("/review/{movie_id}", post(routes::add_review))
        .route("/add-rating", post(routes::add_rating))
        .route("/filter", get(routes::filter))
        .route("/json-filter", get(routes::json_filter))
        .route("/search", get(routes::search))
        .route("/json-search", get(routes::json_search))
        .route("/actor/{name}", get(routes::actor))
        .nest("/api/v1", api)
        .nest("/admin", admin)
        .with_state(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,reelhouse=debug,sqlx=warn".to_string()),
        )
        .init();

    let config = Arc::new(Config::from_env()?);

    let db = db::connect_and_migrate(&config.database_url).await?;

    let state = Arc::new(AppState::new(config.clone(), db));

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, site = %config.site_title, "listening");
    axum::serve(listener, app(state).into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
