use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use axum_extra::extract::Query;

use crate::{
    AppState,
    auth::{ApiUser, ClientIdentity},
    entities::actor,
    error::ApiResult,
    models::{
        ActorSummary, CreatedReview, FilterParams, MovieDetail, MovieListItem, PageEnvelope,
        RatingPayload, ReviewPayload,
    },
};

pub async fn movies(
    _user: ApiUser,
    State(state): State<Arc<AppState>>,
    client: Option<ClientIdentity>,
    Query(params): Query<FilterParams>,
) -> ApiResult<Json<PageEnvelope<MovieListItem>>> {
    let page = state.catalog.browse(&params.year, &params.genre, params.page).await?;
    let ids: Vec<i32> = page.items.iter().map(|m| m.id).collect();
    let client = client.as_ref().map(ClientIdentity::as_str);
    let summaries = state.ratings.summaries_for(&ids, client).await?;

    let results = page
        .items
        .into_iter()
        .map(|m| {
            let summary = summaries.get(&m.id).copied().unwrap_or_default();
            MovieListItem {
                id: m.id,
                title: m.title,
                tagline: m.tagline,
                category: m.category_id,
                rating_user: summary.client_has_rated,
                middle_star: summary.average_stars,
            }
        })
        .collect();

    Ok(Json(PageEnvelope { count: page.count, num_pages: page.num_pages, page: page.page, results }))
}

pub async fn movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> ApiResult<Json<MovieDetail>> {
    let movie = state.catalog.movie(id).await?;
    let relations = state.catalog.relations(&movie).await?;
    let reviews = state.reviews.tree_for(movie.id).await?;

    Ok(Json(MovieDetail {
        id: movie.id,
        title: movie.title,
        tagline: movie.tagline,
        description: movie.description,
        poster: movie.poster,
        year: movie.year,
        country: movie.country,
        world_premiere: movie.world_premiere,
        budget: movie.budget,
        fees_in_usa: movie.fees_in_usa,
        fees_in_world: movie.fees_in_world,
        url: movie.url,
        category: relations.category.map(|c| c.name),
        genres: relations.genres.into_iter().map(|g| g.name).collect(),
        directors: relations.directors.iter().map(ActorSummary::from).collect(),
        actors: relations.actors.iter().map(ActorSummary::from).collect(),
        reviews,
    }))
}

pub async fn create_review(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ReviewPayload>,
) -> ApiResult<(StatusCode, Json<CreatedReview>)> {
    let created = state.reviews.create(payload).await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

pub async fn rate(
    State(state): State<Arc<AppState>>,
    client: ClientIdentity,
    Json(payload): Json<RatingPayload>,
) -> ApiResult<StatusCode> {
    state.ratings.upsert(client.as_str(), &payload).await?;
    Ok(StatusCode::CREATED)
}

pub async fn actors(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<ActorSummary>>> {
    let actors = state.catalog.actors().await?;
    Ok(Json(actors.iter().map(ActorSummary::from).collect()))
}

pub async fn actor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> ApiResult<Json<actor::Model>> {
    Ok(Json(state.catalog.actor(id).await?))
}
