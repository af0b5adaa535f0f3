use std::collections::HashMap;

use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    sea_query::OnConflict,
};
use serde::Serialize;

use crate::{
    entities::{movie, rating, rating_star},
    error::{ApiError, ApiResult, FieldErrors},
    models::RatingPayload,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct RatingSummary {
    /// `None` while nobody has rated the movie.
    pub average_stars: Option<f64>,
    pub client_has_rated: bool,
}

/// Mean of `star_values`; an empty slice yields no average rather than a division by zero.
pub fn aggregate(star_values: &[i16], client_has_rated: bool) -> RatingSummary {
    let average_stars = if star_values.is_empty() {
        None
    } else {
        let total: i64 = star_values.iter().map(|v| i64::from(*v)).sum();
        Some(total as f64 / star_values.len() as f64)
    };
    RatingSummary { average_stars, client_has_rated }
}

#[derive(Clone)]
pub struct Ratings {
    db: DatabaseConnection,
}

impl Ratings {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Star choices, highest first.
    pub async fn stars(&self) -> ApiResult<Vec<rating_star::Model>> {
        Ok(rating_star::Entity::find()
            .order_by_desc(rating_star::Column::Value)
            .all(&self.db)
            .await?)
    }

    /// Summaries for each of `movie_ids`, from a single query. Movies without ratings map to
    /// the empty summary.
    pub async fn summaries_for(
        &self,
        movie_ids: &[i32],
        client: Option<&str>,
    ) -> ApiResult<HashMap<i32, RatingSummary>> {
        let rows = rating::Entity::find()
            .filter(rating::Column::MovieId.is_in(movie_ids.iter().copied()))
            .find_also_related(rating_star::Entity)
            .all(&self.db)
            .await?;

        let mut stars: HashMap<i32, Vec<i16>> = HashMap::new();
        let mut rated_by_client: HashMap<i32, bool> = HashMap::new();
        for (row, star) in rows {
            let Some(star) = star else {
                continue;
            };
            stars.entry(row.movie_id).or_default().push(star.value);
            if client.is_some_and(|ip| ip == row.ip) {
                rated_by_client.insert(row.movie_id, true);
            }
        }

        Ok(movie_ids
            .iter()
            .map(|id| {
                let values = stars.get(id).map(Vec::as_slice).unwrap_or_default();
                let rated = rated_by_client.get(id).copied().unwrap_or(false);
                (*id, aggregate(values, rated))
            })
            .collect())
    }

    pub async fn summary_for(&self, movie_id: i32, client: Option<&str>) -> ApiResult<RatingSummary> {
        let mut summaries = self.summaries_for(&[movie_id], client).await?;
        Ok(summaries.remove(&movie_id).unwrap_or_default())
    }

    /// Records `client`'s rating of a movie, replacing any earlier rating by the same client.
    pub async fn upsert(&self, client: &str, payload: &RatingPayload) -> ApiResult<rating::Model> {
        let mut errors = FieldErrors::default();

        let star = match payload.star {
            None => {
                errors.add("star", "This field is required.");
                None
            }
            Some(id) => {
                let star = rating_star::Entity::find_by_id(id).one(&self.db).await?;
                if star.is_none() {
                    errors.add("star", format!("Invalid pk \"{id}\" - object does not exist."));
                }
                star
            }
        };

        let movie = match payload.movie {
            None => {
                errors.add("movie", "This field is required.");
                None
            }
            Some(id) => {
                let movie = movie::Entity::find_by_id(id)
                    .filter(movie::Column::Draft.eq(false))
                    .one(&self.db)
                    .await?;
                if movie.is_none() {
                    errors.add("movie", format!("Invalid pk \"{id}\" - object does not exist."));
                }
                movie
            }
        };

        let (Some(star), Some(movie)) = (star, movie) else {
            tracing::debug!(client, %errors, "rating rejected");
            return Err(ApiError::Validation(errors));
        };

        let row = rating::ActiveModel {
            id: Default::default(),
            ip: Set(client.to_string()),
            star_id: Set(star.id),
            movie_id: Set(movie.id),
        };

        rating::Entity::insert(row)
            .on_conflict(
                OnConflict::columns([rating::Column::Ip, rating::Column::MovieId])
                    .update_column(rating::Column::StarId)
                    .to_owned(),
            )
            .exec(&self.db)
            .await?;

        let stored = rating::Entity::find()
            .filter(rating::Column::Ip.eq(client))
            .filter(rating::Column::MovieId.eq(movie.id))
            .one(&self.db)
            .await?
            .ok_or_else(|| sea_orm::DbErr::RecordNotFound("rating after upsert".to_string()))?;

        tracing::debug!(client, movie_id = movie.id, stars = star.value, "rating stored");
        Ok(stored)
    }
}
