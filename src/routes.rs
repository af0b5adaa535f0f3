use std::sync::Arc;

use axum::{
    Json,
    extract::{Form, Path, State},
    http::StatusCode,
    response::{Html, Redirect},
};
use axum_extra::extract::Query;

use crate::{
    AppState,
    auth::ClientIdentity,
    error::{ApiError, ApiResult, AppError, AppResult},
    models::{FilterParams, FilteredMovies, PageParams, RatingForm, ReviewForm, ReviewPayload, SearchParams},
    reviews::build_tree,
    templates::{self, Sidebar},
};

async fn sidebar(state: &AppState) -> ApiResult<Sidebar> {
    let (genres, years) = futures::try_join!(state.catalog.genres(), state.catalog.years())?;
    Ok(Sidebar { genres, years })
}

/// Query-string prefix that carries the active filter into pagination links.
fn filter_query(years: &[i16], genres: &[i32]) -> String {
    let years = years.iter().map(|y| format!("year={y}&"));
    let genres = genres.iter().map(|g| format!("genre={g}&"));
    years.chain(genres).collect()
}

pub async fn index(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageParams>,
) -> AppResult<Html<String>> {
    let movies = state.catalog.list_published(params.page).await?;
    let sidebar = sidebar(&state).await?;
    Ok(Html(templates::movie_list_page(&state.config.site_title, "Movies", &movies, &sidebar, "")))
}

pub async fn movie_detail(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    client: Option<ClientIdentity>,
) -> AppResult<Html<String>> {
    let movie = state.catalog.movie_by_slug(&slug).await?;
    let client = client.as_ref().map(ClientIdentity::as_str);

    let (relations, reviews, stars, summary, sidebar) = futures::try_join!(
        state.catalog.relations(&movie),
        state.reviews.for_movie(movie.id),
        state.ratings.stars(),
        state.ratings.summary_for(movie.id, client),
        sidebar(&state),
    )?;

    Ok(Html(templates::movie_detail_page(
        &state.config.site_title,
        &movie,
        &relations,
        &build_tree(&reviews),
        &stars,
        &summary,
        &sidebar,
    )))
}

pub async fn add_review(
    State(state): State<Arc<AppState>>,
    Path(movie_id): Path<i32>,
    Form(form): Form<ReviewForm>,
) -> AppResult<Redirect> {
    let movie = state.catalog.movie(movie_id).await?;

    let parent = match form.parent.trim() {
        "" => None,
        raw => Some(
            raw.parse::<i32>()
                .map_err(|_| AppError::bad_request(anyhow::anyhow!("parent must be a review id")))?,
        ),
    };

    let payload = ReviewPayload {
        movie: Some(movie.id),
        name: Some(form.name),
        email: Some(form.email),
        text: Some(form.text),
        parent,
    };
    state.reviews.create(payload).await?;

    Ok(Redirect::to(&templates::movie_href(&movie)))
}

pub async fn add_rating(
    State(state): State<Arc<AppState>>,
    client: ClientIdentity,
    Form(form): Form<RatingForm>,
) -> AppResult<StatusCode> {
    match state.ratings.upsert(client.as_str(), &form.into()).await {
        Ok(_) => Ok(StatusCode::CREATED),
        Err(ApiError::Validation(_)) => Ok(StatusCode::BAD_REQUEST),
        Err(err) => Err(err.into()),
    }
}

pub async fn filter(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FilterParams>,
) -> AppResult<Html<String>> {
    let movies = state.catalog.filter_movies_page(&params.year, &params.genre, params.page).await?;
    let sidebar = sidebar(&state).await?;
    let query = filter_query(&params.year, &params.genre);
    Ok(Html(templates::movie_list_page(&state.config.site_title, "Filtered movies", &movies, &sidebar, &query)))
}

pub async fn json_filter(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FilterParams>,
) -> AppResult<Json<FilteredMovies>> {
    let movies = state.catalog.filter_movies(&params.year, &params.genre).await?;
    Ok(Json(FilteredMovies { movies: movies.into_iter().map(Into::into).collect() }))
}

pub async fn json_search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<FilteredMovies>> {
    let movies = state.catalog.search_movies(&params.q).await?;
    Ok(Json(FilteredMovies { movies: movies.into_iter().map(Into::into).collect() }))
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> AppResult<Html<String>> {
    let movies = state.catalog.search_page(&params.q, params.page).await?;
    let sidebar = sidebar(&state).await?;
    let query = format!("q={}&", urlencoding::encode(params.q.trim()));
    let heading = format!("Search: {}", params.q.trim());
    Ok(Html(templates::movie_list_page(&state.config.site_title, &heading, &movies, &sidebar, &query)))
}

pub async fn actor(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> AppResult<Html<String>> {
    let actor = state.catalog.actor_by_name(&name).await?;
    let movies = state.catalog.filmography(actor.id).await?;
    Ok(Html(templates::actor_page(&state.config.site_title, &actor, &movies)))
}

#[cfg(test)]
mod tests {
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Request, header},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::{db, testing};

    async fn app() -> (Router, sea_orm::DatabaseConnection) {
        let db = db::memory().await;
        (crate::app(testing::state(db.clone())), db)
    }

    async fn get(app: &Router, uri: &str) -> (StatusCode, String) {
        let response = app.clone().oneshot(Request::get(uri).body(Body::empty()).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn form(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header("x-forwarded-for", "198.51.100.4")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[test]
    fn filter_query_repeats_keys() {
        assert_eq!(filter_query(&[2019, 2020], &[3]), "year=2019&year=2020&genre=3&");
        assert_eq!(filter_query(&[], &[]), "");
    }

    #[tokio::test]
    async fn index_lists_published_movies_only() {
        let (app, db) = app().await;
        testing::movie(&db, "The Matrix", 1999, &[]).await;
        let draft = testing::movie(&db, "Hidden Cut", 2001, &[]).await;
        testing::set_draft(&db, draft.id, true).await;

        let (status, body) = get(&app, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("The Matrix"));
        assert!(!body.contains("Hidden Cut"));
    }

    #[tokio::test]
    async fn json_filter_shape() {
        let (app, db) = app().await;
        let comedy = testing::genre(&db, "Comedy").await;
        testing::movie(&db, "Palm Springs", 2020, &[comedy.id]).await;
        testing::movie(&db, "Heat", 1995, &[]).await;

        let (status, body) = get(&app, &format!("/json-filter?genre={}", comedy.id)).await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "movies": [{
                "title": "Palm Springs",
                "tagline": "Palm Springs tagline",
                "url": "palm-springs",
                "poster": "movies/palm-springs.jpg",
            }]})
        );

        let (_, body) = get(&app, "/json-filter").await;
        assert_eq!(body, r#"{"movies":[]}"#);
    }

    #[tokio::test]
    async fn search_page_and_json() {
        let (app, db) = app().await;
        testing::movie(&db, "The Matrix", 1999, &[]).await;
        testing::movie(&db, "Inception", 2010, &[]).await;

        let (status, body) = get(&app, "/search?q=matrix").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("The Matrix"));
        assert!(!body.contains("Inception"));

        let (_, body) = get(&app, "/json-search?q=INCEP").await;
        assert!(body.contains("Inception"));
    }

    #[tokio::test]
    async fn review_form_redirects_and_nests_reply() {
        let (app, db) = app().await;
        let movie = testing::movie(&db, "Heat", 1995, &[]).await;

        let response = app
            .clone()
            .oneshot(form(&format!("/review/{}", movie.id), "name=Vincent&email=v%40lapd.gov&text=Great&parent="))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/movie/heat");

        let root = crate::reviews::Reviews::new(db.clone()).for_movie(movie.id).await.unwrap()[0].id;
        let response = app
            .clone()
            .oneshot(form(
                &format!("/review/{}", movie.id),
                &format!("name=Neil&email=n%40crew.net&text=Agreed&parent={root}"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let (status, body) = get(&app, "/movie/heat").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Vincent"));
        assert!(body.contains("margin-left: 2rem"));
        assert!(body.contains(r#"Category</dt><dd></dd>"#));

        let response = app
            .clone()
            .oneshot(form(&format!("/review/{}", movie.id), "name=&email=bad&text=x&parent="))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn deep_thread_page_renders() {
        let (app, db) = app().await;
        let movie = testing::movie(&db, "Inception", 2010, &[]).await;
        testing::review_chain(&db, movie.id, 20_000).await;

        let (status, body) = get(&app, "/movie/inception").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("reply #1."));
        assert!(body.contains(&format!("reply #{}.", crate::reviews::MAX_THREAD_DEPTH)));
        assert!(!body.contains(&format!("reply #{}.", crate::reviews::MAX_THREAD_DEPTH + 1)));
    }

    #[tokio::test]
    async fn rating_form_answers_with_status_only() {
        let (app, db) = app().await;
        let movie = testing::movie(&db, "Heat", 1995, &[]).await;

        let response = app.clone().oneshot(form("/add-rating", &format!("star=4&movie={}", movie.id))).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app.clone().oneshot(form("/add-rating", "star=4&movie=")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_pages_are_not_found() {
        let (app, db) = app().await;
        testing::movie(&db, "Heat", 1995, &[]).await;

        let (status, _) = get(&app, "/movie/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = get(&app, "/actor/Nobody").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = get(&app, "/?page=9").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn actor_page_lists_filmography() {
        let (app, db) = app().await;
        let movie = testing::movie(&db, "Heat", 1995, &[]).await;
        let mann = testing::actor(&db, "Michael Mann").await;
        testing::credit(&db, movie.id, &[], &[mann.id]).await;

        let (status, body) = get(&app, "/actor/Michael%20Mann").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Filmography"));
        assert!(body.contains("/movie/heat"));
    }
}
