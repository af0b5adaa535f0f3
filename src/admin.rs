//! Catalog maintenance: creating taxonomy, people and movies, editing and listing movies, bulk
//! publishing, and review moderation listings. Reviewer name and email are never editable here.

use std::{fmt, str::FromStr, sync::Arc};

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
    sea_query::Expr,
};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    AppState,
    auth::AdminUser,
    catalog::title_contains,
    entities::{actor, category, genre, movie, movie_actor, movie_director, movie_genre, movie_shot},
    error::{ApiError, ApiResult, FieldErrors},
};

/// Models exposed for administration, in display order.
pub const REGISTERED_MODELS: [&str; 8] =
    ["category", "genre", "movie", "movie_shot", "actor", "rating_star", "rating", "review"];

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NewTaxon {
    pub name: String,
    pub description: String,
    pub url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NewActor {
    pub name: String,
    pub age: i16,
    pub description: String,
    pub image: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NewMovie {
    pub title: String,
    pub tagline: String,
    pub description: String,
    pub poster: String,
    pub year: Option<i16>,
    pub country: String,
    pub world_premiere: String,
    pub budget: i64,
    pub fees_in_usa: i64,
    pub fees_in_world: i64,
    pub category: Option<i32>,
    pub url: String,
    pub draft: bool,
    pub genres: Vec<i32>,
    pub actors: Vec<i32>,
    pub directors: Vec<i32>,
}

/// Partial movie update. Absent fields keep their value; a link list, when present, replaces
/// the whole set. `"category": null` clears the category.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MovieEdit {
    pub title: Option<String>,
    pub tagline: Option<String>,
    pub description: Option<String>,
    pub poster: Option<String>,
    pub year: Option<i16>,
    pub country: Option<String>,
    pub world_premiere: Option<String>,
    pub budget: Option<i64>,
    pub fees_in_usa: Option<i64>,
    pub fees_in_world: Option<i64>,
    #[serde(deserialize_with = "nullable")]
    pub category: Option<Option<i32>>,
    pub url: Option<String>,
    pub draft: Option<bool>,
    pub genres: Option<Vec<i32>>,
    pub actors: Option<Vec<i32>>,
    pub directors: Option<Vec<i32>>,
}

/// Admin listing filters. Drafts are included.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MovieListQuery {
    #[serde(deserialize_with = "blank_as_none")]
    pub category: Option<i32>,
    #[serde(deserialize_with = "blank_as_none")]
    pub year: Option<i16>,
    pub q: String,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct MovieRow {
    pub id: i32,
    pub title: String,
    pub url: String,
    pub year: i16,
    pub category: Option<String>,
    pub draft: bool,
}

fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn blank_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match Option::<String>::deserialize(deserializer)?.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NewShot {
    pub title: String,
    pub description: String,
    pub image: String,
}

#[derive(Debug, Deserialize)]
pub struct MovieIds {
    pub ids: Vec<i32>,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct BulkUpdate {
    pub updated: u64,
    pub message: String,
}

impl BulkUpdate {
    fn new(updated: u64) -> Self {
        let message = if updated == 1 {
            "1 record updated".to_string()
        } else {
            format!("{updated} records updated")
        };
        Self { updated, message }
    }
}

#[derive(Debug, Serialize)]
pub struct ReviewRow {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub parent: Option<i32>,
    pub movie: i32,
}

#[derive(Debug, Serialize)]
pub struct SiteInfo {
    pub site_title: String,
    pub site_header: String,
    pub models: &'static [&'static str],
}

#[derive(Clone)]
pub struct Admin {
    db: DatabaseConnection,
}

impl Admin {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create_category(&self, new: NewTaxon) -> ApiResult<category::Model> {
        let mut errors = FieldErrors::default();
        require(&mut errors, "name", &new.name);
        check_slug(&mut errors, &new.url);
        if category::Entity::find().filter(category::Column::Url.eq(new.url.trim())).count(&self.db).await? > 0 {
            errors.add("url", "category with this url already exists.");
        }
        errors.into_result()?;

        let created = category::ActiveModel {
            name: Set(new.name.trim().to_string()),
            description: Set(new.description),
            url: Set(new.url.trim().to_string()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;
        tracing::info!(category_id = created.id, "category created");
        Ok(created)
    }

    pub async fn create_genre(&self, new: NewTaxon) -> ApiResult<genre::Model> {
        let mut errors = FieldErrors::default();
        require(&mut errors, "name", &new.name);
        check_slug(&mut errors, &new.url);
        if genre::Entity::find().filter(genre::Column::Url.eq(new.url.trim())).count(&self.db).await? > 0 {
            errors.add("url", "genre with this url already exists.");
        }
        errors.into_result()?;

        let created = genre::ActiveModel {
            name: Set(new.name.trim().to_string()),
            description: Set(new.description),
            url: Set(new.url.trim().to_string()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;
        tracing::info!(genre_id = created.id, "genre created");
        Ok(created)
    }

    pub async fn create_actor(&self, new: NewActor) -> ApiResult<actor::Model> {
        let mut errors = FieldErrors::default();
        require(&mut errors, "name", &new.name);
        if new.age < 0 {
            errors.add("age", "Ensure this value is greater than or equal to 0.");
        }
        errors.into_result()?;

        let created = actor::ActiveModel {
            name: Set(new.name.trim().to_string()),
            age: Set(new.age),
            description: Set(new.description),
            image: Set(new.image),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;
        tracing::info!(actor_id = created.id, "actor created");
        Ok(created)
    }

    /// Inserts a movie and its genre, actor and director links in one transaction.
    pub async fn create_movie(&self, new: NewMovie) -> ApiResult<movie::Model> {
        let mut errors = FieldErrors::default();
        require(&mut errors, "title", &new.title);
        check_slug(&mut errors, &new.url);
        if new.year.is_none() {
            errors.add("year", "This field is required.");
        }
        check_date(&mut errors, &new.world_premiere);
        self.check_url_free(&mut errors, &new.url, None).await?;
        self.check_links(&mut errors, new.category, &new.genres, &new.actors, &new.directors).await?;
        errors.into_result()?;

        let txn = self.db.begin().await?;

        let created = movie::ActiveModel {
            title: Set(new.title.trim().to_string()),
            tagline: Set(new.tagline),
            description: Set(new.description),
            poster: Set(new.poster),
            year: Set(new.year.unwrap_or_default()),
            country: Set(new.country),
            world_premiere: Set(new.world_premiere.trim().to_string()),
            budget: Set(new.budget),
            fees_in_usa: Set(new.fees_in_usa),
            fees_in_world: Set(new.fees_in_world),
            category_id: Set(new.category),
            url: Set(new.url.trim().to_string()),
            draft: Set(new.draft),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        set_links(&txn, created.id, Some(new.genres), Some(new.actors), Some(new.directors)).await?;

        txn.commit().await?;
        tracing::info!(movie_id = created.id, draft = created.draft, "movie created");
        Ok(created)
    }

    /// Applies a partial edit, validated like [`Admin::create_movie`], in one transaction.
    pub async fn update_movie(&self, movie_id: i32, edit: MovieEdit) -> ApiResult<movie::Model> {
        let current = movie::Entity::find_by_id(movie_id).one(&self.db).await?.ok_or(ApiError::NotFound)?;

        let mut errors = FieldErrors::default();
        if let Some(title) = &edit.title {
            require(&mut errors, "title", title);
        }
        if let Some(url) = &edit.url {
            check_slug(&mut errors, url);
            self.check_url_free(&mut errors, url, Some(movie_id)).await?;
        }
        if let Some(date) = &edit.world_premiere {
            check_date(&mut errors, date);
        }
        self.check_links(
            &mut errors,
            edit.category.flatten(),
            edit.genres.as_deref().unwrap_or_default(),
            edit.actors.as_deref().unwrap_or_default(),
            edit.directors.as_deref().unwrap_or_default(),
        )
        .await?;
        errors.into_result()?;

        let txn = self.db.begin().await?;

        let mut active: movie::ActiveModel = current.into();
        if let Some(title) = edit.title {
            active.title = Set(title.trim().to_string());
        }
        if let Some(tagline) = edit.tagline {
            active.tagline = Set(tagline);
        }
        if let Some(description) = edit.description {
            active.description = Set(description);
        }
        if let Some(poster) = edit.poster {
            active.poster = Set(poster);
        }
        if let Some(year) = edit.year {
            active.year = Set(year);
        }
        if let Some(country) = edit.country {
            active.country = Set(country);
        }
        if let Some(date) = edit.world_premiere {
            active.world_premiere = Set(date.trim().to_string());
        }
        if let Some(budget) = edit.budget {
            active.budget = Set(budget);
        }
        if let Some(fees) = edit.fees_in_usa {
            active.fees_in_usa = Set(fees);
        }
        if let Some(fees) = edit.fees_in_world {
            active.fees_in_world = Set(fees);
        }
        if let Some(category) = edit.category {
            active.category_id = Set(category);
        }
        if let Some(url) = edit.url {
            active.url = Set(url.trim().to_string());
        }
        if let Some(draft) = edit.draft {
            active.draft = Set(draft);
        }
        let updated = active.update(&txn).await?;

        set_links(&txn, movie_id, edit.genres, edit.actors, edit.directors).await?;

        txn.commit().await?;
        tracing::info!(movie_id, draft = updated.draft, "movie updated");
        Ok(updated)
    }

    /// Every movie, drafts included, narrowed by category, year and a search over the title
    /// and the category name.
    pub async fn list_movies(&self, query: &MovieListQuery) -> ApiResult<Vec<MovieRow>> {
        let mut select = movie::Entity::find()
            .find_also_related(category::Entity)
            .order_by_asc(movie::Column::Id);
        if let Some(category_id) = query.category {
            select = select.filter(movie::Column::CategoryId.eq(category_id));
        }
        if let Some(year) = query.year {
            select = select.filter(movie::Column::Year.eq(year));
        }
        let q = query.q.trim();
        if !q.is_empty() {
            let folded = movie::fold_case(q);
            let categories: Vec<i32> = category::Entity::find()
                .all(&self.db)
                .await?
                .into_iter()
                .filter(|c| movie::fold_case(&c.name).contains(&folded))
                .map(|c| c.id)
                .collect();
            select = select.filter(
                Condition::any()
                    .add(title_contains(q))
                    .add(movie::Column::CategoryId.is_in(categories)),
            );
        }

        Ok(select
            .all(&self.db)
            .await?
            .into_iter()
            .map(|(m, c)| MovieRow {
                id: m.id,
                title: m.title,
                url: m.url,
                year: m.year,
                category: c.map(|c| c.name),
                draft: m.draft,
            })
            .collect())
    }

    async fn check_url_free(&self, errors: &mut FieldErrors, url: &str, except: Option<i32>) -> ApiResult<()> {
        let mut taken = movie::Entity::find().filter(movie::Column::Url.eq(url.trim()));
        if let Some(id) = except {
            taken = taken.filter(movie::Column::Id.ne(id));
        }
        if taken.count(&self.db).await? > 0 {
            errors.add("url", "movie with this url already exists.");
        }
        Ok(())
    }

    async fn check_links(
        &self,
        errors: &mut FieldErrors,
        category: Option<i32>,
        genres: &[i32],
        actors: &[i32],
        directors: &[i32],
    ) -> ApiResult<()> {
        if let Some(id) = category {
            if category::Entity::find_by_id(id).one(&self.db).await?.is_none() {
                errors.add("category", format!("Invalid pk \"{id}\" - object does not exist."));
            }
        }
        for id in missing::<genre::Entity>(&self.db, genre::Column::Id, genres).await? {
            errors.add("genres", format!("Invalid pk \"{id}\" - object does not exist."));
        }
        for id in missing::<actor::Entity>(&self.db, actor::Column::Id, actors).await? {
            errors.add("actors", format!("Invalid pk \"{id}\" - object does not exist."));
        }
        for id in missing::<actor::Entity>(&self.db, actor::Column::Id, directors).await? {
            errors.add("directors", format!("Invalid pk \"{id}\" - object does not exist."));
        }
        Ok(())
    }

    pub async fn add_shot(&self, movie_id: i32, new: NewShot) -> ApiResult<movie_shot::Model> {
        if movie::Entity::find_by_id(movie_id).one(&self.db).await?.is_none() {
            return Err(ApiError::NotFound);
        }
        let mut errors = FieldErrors::default();
        require(&mut errors, "title", &new.title);
        errors.into_result()?;

        Ok(movie_shot::ActiveModel {
            title: Set(new.title.trim().to_string()),
            description: Set(new.description),
            image: Set(new.image),
            movie_id: Set(movie_id),
            ..Default::default()
        }
        .insert(&self.db)
        .await?)
    }

    /// Removes a movie together with its shots, reviews, ratings and links.
    pub async fn delete_movie(&self, movie_id: i32) -> ApiResult<()> {
        let result = movie::Entity::delete_by_id(movie_id).exec(&self.db).await?;
        if result.rows_affected == 0 {
            return Err(ApiError::NotFound);
        }
        tracing::info!(movie_id, "movie deleted");
        Ok(())
    }

    /// Sets `draft` on every listed movie; ids that do not exist are ignored.
    pub async fn set_draft(&self, ids: &[i32], draft: bool) -> ApiResult<BulkUpdate> {
        if ids.is_empty() {
            return Ok(BulkUpdate::new(0));
        }
        let result = movie::Entity::update_many()
            .col_expr(movie::Column::Draft, Expr::value(draft))
            .filter(movie::Column::Id.is_in(ids.iter().copied()))
            .exec(&self.db)
            .await?;
        tracing::info!(updated = result.rows_affected, draft, "bulk draft update");
        Ok(BulkUpdate::new(result.rows_affected))
    }
}

fn require(errors: &mut FieldErrors, field: &'static str, value: &str) {
    if value.trim().is_empty() {
        errors.add(field, "This field may not be blank.");
    }
}

fn check_slug(errors: &mut FieldErrors, value: &str) {
    let value = value.trim();
    if value.is_empty() {
        errors.add("url", "This field may not be blank.");
    } else if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        errors.add(
            "url",
            "Enter a valid \"slug\" consisting of letters, numbers, underscores or hyphens.",
        );
    }
}

fn check_date(errors: &mut FieldErrors, value: &str) {
    if value.trim().parse::<jiff::civil::Date>().is_err() {
        errors.add("world_premiere", "Date has wrong format. Use YYYY-MM-DD.");
    }
}

/// Replaces each given link set of `movie_id`; `None` leaves that set alone.
async fn set_links<C>(
    db: &C,
    movie_id: i32,
    genres: Option<Vec<i32>>,
    actors: Option<Vec<i32>>,
    directors: Option<Vec<i32>>,
) -> Result<(), DbErr>
where
    C: ConnectionTrait,
{
    if let Some(genres) = genres {
        movie_genre::Entity::delete_many()
            .filter(movie_genre::Column::MovieId.eq(movie_id))
            .exec(db)
            .await?;
        for genre_id in dedup(genres) {
            movie_genre::ActiveModel { movie_id: Set(movie_id), genre_id: Set(genre_id) }
                .insert(db)
                .await?;
        }
    }
    if let Some(actors) = actors {
        movie_actor::Entity::delete_many()
            .filter(movie_actor::Column::MovieId.eq(movie_id))
            .exec(db)
            .await?;
        for actor_id in dedup(actors) {
            movie_actor::ActiveModel { movie_id: Set(movie_id), actor_id: Set(actor_id) }
                .insert(db)
                .await?;
        }
    }
    if let Some(directors) = directors {
        movie_director::Entity::delete_many()
            .filter(movie_director::Column::MovieId.eq(movie_id))
            .exec(db)
            .await?;
        for actor_id in dedup(directors) {
            movie_director::ActiveModel { movie_id: Set(movie_id), actor_id: Set(actor_id) }
                .insert(db)
                .await?;
        }
    }
    Ok(())
}

fn dedup(mut ids: Vec<i32>) -> Vec<i32> {
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Ids from `wanted` with no row in `E`.
async fn missing<E>(db: &DatabaseConnection, id_col: E::Column, wanted: &[i32]) -> ApiResult<Vec<i32>>
where
    E: EntityTrait,
{
    if wanted.is_empty() {
        return Ok(Vec::new());
    }
    let wanted = dedup(wanted.to_vec());
    let found: Vec<i32> = E::find()
        .select_only()
        .column(id_col)
        .filter(id_col.is_in(wanted.iter().copied()))
        .into_tuple()
        .all(db)
        .await?;
    Ok(wanted.into_iter().filter(|id| !found.contains(id)).collect())
}

pub async fn site(_admin: AdminUser, State(state): State<Arc<AppState>>) -> Json<SiteInfo> {
    Json(SiteInfo {
        site_title: state.config.site_title.clone(),
        site_header: state.config.site_title.clone(),
        models: &REGISTERED_MODELS,
    })
}

pub async fn create_category(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Json(new): Json<NewTaxon>,
) -> ApiResult<(StatusCode, Json<category::Model>)> {
    Ok((StatusCode::CREATED, Json(state.admin.create_category(new).await?)))
}

pub async fn create_genre(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Json(new): Json<NewTaxon>,
) -> ApiResult<(StatusCode, Json<genre::Model>)> {
    Ok((StatusCode::CREATED, Json(state.admin.create_genre(new).await?)))
}

pub async fn create_actor(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Json(new): Json<NewActor>,
) -> ApiResult<(StatusCode, Json<actor::Model>)> {
    Ok((StatusCode::CREATED, Json(state.admin.create_actor(new).await?)))
}

#[derive(Debug, Serialize)]
pub struct SavedMovie {
    pub id: i32,
    pub url: String,
    pub draft: bool,
}

pub async fn create_movie(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Json(new): Json<NewMovie>,
) -> ApiResult<(StatusCode, Json<SavedMovie>)> {
    let movie = state.admin.create_movie(new).await?;
    Ok((StatusCode::CREATED, Json(SavedMovie { id: movie.id, url: movie.url, draft: movie.draft })))
}

pub async fn update_movie(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Path(movie_id): Path<i32>,
    Json(edit): Json<MovieEdit>,
) -> ApiResult<Json<SavedMovie>> {
    let movie = state.admin.update_movie(movie_id, edit).await?;
    Ok(Json(SavedMovie { id: movie.id, url: movie.url, draft: movie.draft }))
}

pub async fn movies(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<MovieListQuery>,
) -> ApiResult<Json<Vec<MovieRow>>> {
    Ok(Json(state.admin.list_movies(&query).await?))
}

pub async fn add_shot(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Path(movie_id): Path<i32>,
    Json(new): Json<NewShot>,
) -> ApiResult<(StatusCode, Json<movie_shot::Model>)> {
    Ok((StatusCode::CREATED, Json(state.admin.add_shot(movie_id, new).await?)))
}

pub async fn delete_movie(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Path(movie_id): Path<i32>,
) -> ApiResult<StatusCode> {
    state.admin.delete_movie(movie_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn publish(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Json(body): Json<MovieIds>,
) -> ApiResult<Json<BulkUpdate>> {
    Ok(Json(state.admin.set_draft(&body.ids, false).await?))
}

pub async fn unpublish(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Json(body): Json<MovieIds>,
) -> ApiResult<Json<BulkUpdate>> {
    Ok(Json(state.admin.set_draft(&body.ids, true).await?))
}

pub async fn reviews(_admin: AdminUser, State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<ReviewRow>>> {
    let rows = state
        .reviews
        .all()
        .await?
        .into_iter()
        .map(|r| ReviewRow { id: r.id, name: r.name, email: r.email, parent: r.parent_id, movie: r.movie_id })
        .collect();
    Ok(Json(rows))
}
