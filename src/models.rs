use serde::{Deserialize, Serialize};

use crate::{
    entities::{actor, movie, review},
    reviews::ReviewNode,
};

/// One page of a listing.
#[derive(Clone, Debug)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub num_pages: u64,
    pub count: u64,
}

impl<T> Paged<T> {
    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.num_pages
    }
}

#[derive(Debug, Serialize)]
pub struct PageEnvelope<T> {
    pub count: u64,
    pub num_pages: u64,
    pub page: u64,
    pub results: Vec<T>,
}

#[derive(Clone, Debug, Serialize)]
pub struct MovieListItem {
    pub id: i32,
    pub title: String,
    pub tagline: String,
    pub category: Option<i32>,
    pub rating_user: bool,
    pub middle_star: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActorSummary {
    pub id: i32,
    pub name: String,
    pub image: String,
}

impl From<&actor::Model> for ActorSummary {
    fn from(actor: &actor::Model) -> Self {
        Self { id: actor.id, name: actor.name.clone(), image: actor.image.clone() }
    }
}

/// Every movie column except `draft`, with relations flattened for output.
#[derive(Clone, Debug, Serialize)]
pub struct MovieDetail {
    pub id: i32,
    pub title: String,
    pub tagline: String,
    pub description: String,
    pub poster: String,
    pub year: i16,
    pub country: String,
    pub world_premiere: String,
    pub budget: i64,
    pub fees_in_usa: i64,
    pub fees_in_world: i64,
    pub url: String,
    pub category: Option<String>,
    pub genres: Vec<String>,
    pub directors: Vec<ActorSummary>,
    pub actors: Vec<ActorSummary>,
    pub reviews: Vec<ReviewNode>,
}

/// Row of the JSON filter used by the site's filter widget.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FilteredMovie {
    pub title: String,
    pub tagline: String,
    pub url: String,
    pub poster: String,
}

impl From<movie::Model> for FilteredMovie {
    fn from(m: movie::Model) -> Self {
        Self { title: m.title, tagline: m.tagline, url: m.url, poster: m.poster }
    }
}

#[derive(Debug, Serialize)]
pub struct FilteredMovies {
    pub movies: Vec<FilteredMovie>,
}

/// Year and genre filter. Keys may repeat: `?year=2019&year=2020&genre=3`.
#[derive(Debug, Default, Deserialize)]
pub struct FilterParams {
    #[serde(default)]
    pub year: Vec<i16>,
    #[serde(default)]
    pub genre: Vec<i32>,
    pub page: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    pub page: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u64>,
}

/// Body of `POST /review`. Every field is optional here so that missing ones surface as
/// field errors instead of a deserialization failure.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReviewPayload {
    pub movie: Option<i32>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub text: Option<String>,
    pub parent: Option<i32>,
}

/// Review form on the movie page; `parent` is an empty string for top-level reviews.
#[derive(Debug, Deserialize)]
pub struct ReviewForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub parent: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CreatedReview {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub text: String,
    pub parent: Option<i32>,
    pub movie: i32,
}

impl From<review::Model> for CreatedReview {
    fn from(r: review::Model) -> Self {
        Self {
            id: r.id,
            name: r.name,
            email: r.email,
            text: r.text,
            parent: r.parent_id,
            movie: r.movie_id,
        }
    }
}

/// `star` is the id of a rating star row.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct RatingPayload {
    pub star: Option<i32>,
    pub movie: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct RatingForm {
    #[serde(default)]
    pub star: String,
    #[serde(default)]
    pub movie: String,
}

impl From<RatingForm> for RatingPayload {
    fn from(form: RatingForm) -> Self {
        Self { star: form.star.trim().parse().ok(), movie: form.movie.trim().parse().ok() }
    }
}
