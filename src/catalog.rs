use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select,
    sea_query::{LikeExpr, Query, SimpleExpr},
};

use crate::{
    entities::{actor, category, genre, movie, movie_actor, movie_director, movie_genre, movie_shot},
    error::{ApiError, ApiResult},
    models::Paged,
};

/// Everything hanging off a movie that its detail views show.
#[derive(Clone, Debug)]
pub struct MovieRelations {
    pub category: Option<category::Model>,
    pub genres: Vec<genre::Model>,
    pub actors: Vec<actor::Model>,
    pub directors: Vec<actor::Model>,
    pub shots: Vec<movie_shot::Model>,
}

/// Read side of the catalog. Drafts are invisible to every query here.
#[derive(Clone)]
pub struct Catalog {
    db: DatabaseConnection,
    page_size: u64,
}

impl Catalog {
    pub fn new(db: DatabaseConnection, page_size: u64) -> Self {
        Self { db, page_size }
    }

    fn published() -> Select<movie::Entity> {
        movie::Entity::find().filter(movie::Column::Draft.eq(false)).order_by_asc(movie::Column::Id)
    }

    pub async fn list_published(&self, page: Option<u64>) -> ApiResult<Paged<movie::Model>> {
        self.paginate(Self::published(), page).await
    }

    /// Movies released in one of `years` or tagged with one of `genres`. With both sets empty
    /// nothing matches.
    pub async fn filter_movies(&self, years: &[i16], genres: &[i32]) -> ApiResult<Vec<movie::Model>> {
        let Some(condition) = filter_condition(years, genres) else {
            return Ok(Vec::new());
        };
        Ok(Self::published().filter(condition).all(&self.db).await?)
    }

    pub async fn filter_movies_page(
        &self,
        years: &[i16],
        genres: &[i32],
        page: Option<u64>,
    ) -> ApiResult<Paged<movie::Model>> {
        let Some(condition) = filter_condition(years, genres) else {
            return Ok(Paged { items: Vec::new(), page: 1, num_pages: 1, count: 0 });
        };
        self.paginate(Self::published().filter(condition), page).await
    }

    /// Listing for API callers: unfiltered when no filter is given, otherwise as
    /// [`Catalog::filter_movies`].
    pub async fn browse(
        &self,
        years: &[i16],
        genres: &[i32],
        page: Option<u64>,
    ) -> ApiResult<Paged<movie::Model>> {
        if years.is_empty() && genres.is_empty() {
            self.list_published(page).await
        } else {
            self.filter_movies_page(years, genres, page).await
        }
    }

    /// Case-insensitive literal substring match on the title; `%` and `_` are plain characters.
    /// A blank query matches nothing.
    pub async fn search_movies(&self, query: &str) -> ApiResult<Vec<movie::Model>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        Ok(Self::published().filter(title_contains(query)).all(&self.db).await?)
    }

    pub async fn search_page(&self, query: &str, page: Option<u64>) -> ApiResult<Paged<movie::Model>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Paged { items: Vec::new(), page: 1, num_pages: 1, count: 0 });
        }
        self.paginate(Self::published().filter(title_contains(query)), page).await
    }

    pub async fn genres(&self) -> ApiResult<Vec<genre::Model>> {
        Ok(genre::Entity::find().order_by_asc(genre::Column::Name).all(&self.db).await?)
    }

    /// Distinct release years of published movies, oldest first.
    pub async fn years(&self) -> ApiResult<Vec<i16>> {
        Ok(movie::Entity::find()
            .select_only()
            .column(movie::Column::Year)
            .distinct()
            .filter(movie::Column::Draft.eq(false))
            .order_by_asc(movie::Column::Year)
            .into_tuple::<i16>()
            .all(&self.db)
            .await?)
    }

    pub async fn movie(&self, id: i32) -> ApiResult<movie::Model> {
        Self::published()
            .filter(movie::Column::Id.eq(id))
            .one(&self.db)
            .await?
            .ok_or(ApiError::NotFound)
    }

    pub async fn movie_by_slug(&self, slug: &str) -> ApiResult<movie::Model> {
        Self::published()
            .filter(movie::Column::Url.eq(slug))
            .one(&self.db)
            .await?
            .ok_or(ApiError::NotFound)
    }

    pub async fn relations(&self, movie: &movie::Model) -> ApiResult<MovieRelations> {
        let (category, genres, actors, directors, shots) = futures::try_join!(
            movie.find_related(category::Entity).one(&self.db),
            movie.find_related(genre::Entity).order_by_asc(genre::Column::Id).all(&self.db),
            actor::Entity::find()
                .filter(cast_of::<movie_actor::Entity>(
                    movie_actor::Column::ActorId,
                    movie_actor::Column::MovieId,
                    movie.id
                ))
                .order_by_asc(actor::Column::Id)
                .all(&self.db),
            actor::Entity::find()
                .filter(cast_of::<movie_director::Entity>(
                    movie_director::Column::ActorId,
                    movie_director::Column::MovieId,
                    movie.id
                ))
                .order_by_asc(actor::Column::Id)
                .all(&self.db),
            movie.find_related(movie_shot::Entity).order_by_asc(movie_shot::Column::Id).all(&self.db),
        )?;
        Ok(MovieRelations { category, genres, actors, directors, shots })
    }

    pub async fn actors(&self) -> ApiResult<Vec<actor::Model>> {
        Ok(actor::Entity::find().order_by_asc(actor::Column::Id).all(&self.db).await?)
    }

    pub async fn actor(&self, id: i32) -> ApiResult<actor::Model> {
        actor::Entity::find_by_id(id).one(&self.db).await?.ok_or(ApiError::NotFound)
    }

    pub async fn actor_by_name(&self, name: &str) -> ApiResult<actor::Model> {
        actor::Entity::find()
            .filter(actor::Column::Name.eq(name))
            .order_by_asc(actor::Column::Id)
            .one(&self.db)
            .await?
            .ok_or(ApiError::NotFound)
    }

    /// Published movies `actor` is credited on, in either role.
    pub async fn filmography(&self, actor_id: i32) -> ApiResult<Vec<movie::Model>> {
        let credited = Condition::any()
            .add(movie::Column::Id.in_subquery(
                Query::select()
                    .column(movie_actor::Column::MovieId)
                    .from(movie_actor::Entity)
                    .and_where(movie_actor::Column::ActorId.eq(actor_id))
                    .to_owned(),
            ))
            .add(movie::Column::Id.in_subquery(
                Query::select()
                    .column(movie_director::Column::MovieId)
                    .from(movie_director::Entity)
                    .and_where(movie_director::Column::ActorId.eq(actor_id))
                    .to_owned(),
            ));
        Ok(Self::published().filter(credited).all(&self.db).await?)
    }

    async fn paginate(
        &self,
        select: Select<movie::Entity>,
        page: Option<u64>,
    ) -> ApiResult<Paged<movie::Model>> {
        let paginator = select.paginate(&self.db, self.page_size);
        let totals = paginator.num_items_and_pages().await?;
        let num_pages = totals.number_of_pages.max(1);
        let page = page.unwrap_or(1).max(1);
        if page > num_pages {
            return Err(ApiError::NotFound);
        }
        let items = paginator.fetch_page(page - 1).await?;
        Ok(Paged { items, page, num_pages, count: totals.number_of_items })
    }
}

/// `year IN years OR id IN (movies tagged with genres)`; `None` when both sets are empty.
fn filter_condition(years: &[i16], genres: &[i32]) -> Option<Condition> {
    if years.is_empty() && genres.is_empty() {
        return None;
    }
    let mut condition = Condition::any();
    if !years.is_empty() {
        condition = condition.add(movie::Column::Year.is_in(years.iter().copied()));
    }
    if !genres.is_empty() {
        condition = condition.add(
            movie::Column::Id.in_subquery(
                Query::select()
                    .column(movie_genre::Column::MovieId)
                    .from(movie_genre::Entity)
                    .and_where(movie_genre::Column::GenreId.is_in(genres.iter().copied()))
                    .to_owned(),
            ),
        );
    }
    Some(condition)
}

/// Matches `query` against the folded title column, so non-ASCII case differences match too.
pub(crate) fn title_contains(query: &str) -> SimpleExpr {
    let pattern = format!("%{}%", escape_like(&movie::fold_case(query)));
    movie::Column::SearchTitle.like(LikeExpr::new(pattern).escape('\\'))
}

fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// `actor.id IN (SELECT <person> FROM <link> WHERE <movie> = movie_id)`.
fn cast_of<L>(person: L::Column, movie_col: L::Column, movie_id: i32) -> SimpleExpr
where
    L: EntityTrait + Default,
{
    actor::Column::Id.in_subquery(
        Query::select()
            .column(person)
            .from(L::default())
            .and_where(movie_col.eq(movie_id))
            .to_owned(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, testing};

    fn titles(movies: &[movie::Model]) -> Vec<&str> {
        movies.iter().map(|m| m.title.as_str()).collect()
    }

    async fn seeded() -> (Catalog, i32, i32) {
        let db = db::memory().await;
        let comedy = testing::genre(&db, "Comedy").await;
        let drama = testing::genre(&db, "Drama").await;
        testing::movie(&db, "Palm Springs", 2020, &[comedy.id]).await;
        testing::movie(&db, "Tenet", 2020, &[]).await;
        testing::movie(&db, "Groundhog Day", 1993, &[comedy.id, drama.id]).await;
        testing::movie(&db, "Heat", 1995, &[drama.id]).await;
        let draft = testing::movie(&db, "Unreleased Comedy", 2020, &[comedy.id]).await;
        testing::set_draft(&db, draft.id, true).await;
        (Catalog::new(db, 2), comedy.id, drama.id)
    }

    #[tokio::test]
    async fn filter_by_year_only() {
        let (catalog, _, _) = seeded().await;
        let movies = catalog.filter_movies(&[2020], &[]).await.unwrap();
        assert_eq!(titles(&movies), vec!["Palm Springs", "Tenet"]);
    }

    #[tokio::test]
    async fn filter_by_genre_only() {
        let (catalog, comedy, _) = seeded().await;
        let movies = catalog.filter_movies(&[], &[comedy]).await.unwrap();
        assert_eq!(titles(&movies), vec!["Palm Springs", "Groundhog Day"]);
    }

    #[tokio::test]
    async fn filter_is_a_distinct_union() {
        let (catalog, comedy, drama) = seeded().await;
        let movies = catalog.filter_movies(&[1995], &[comedy, drama]).await.unwrap();
        assert_eq!(titles(&movies), vec!["Palm Springs", "Groundhog Day", "Heat"]);
    }

    #[tokio::test]
    async fn empty_filter_matches_nothing() {
        let (catalog, _, _) = seeded().await;
        assert!(catalog.filter_movies(&[], &[]).await.unwrap().is_empty());
        let page = catalog.filter_movies_page(&[], &[], None).await.unwrap();
        assert_eq!(page.count, 0);
    }

    #[tokio::test]
    async fn search_ignores_case() {
        let db = db::memory().await;
        testing::movie(&db, "The Matrix", 1999, &[]).await;
        testing::movie(&db, "Inception", 2010, &[]).await;
        let catalog = Catalog::new(db, 2);

        assert_eq!(titles(&catalog.search_movies("matrix").await.unwrap()), vec!["The Matrix"]);
        assert_eq!(titles(&catalog.search_movies("MATRIX").await.unwrap()), vec!["The Matrix"]);
        assert!(catalog.search_movies("  ").await.unwrap().is_empty());
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("100%_a\\b"), "100\\%\\_a\\\\b");
        assert_eq!(escape_like("матрица"), "матрица");
    }

    #[tokio::test]
    async fn search_treats_wildcards_literally() {
        let db = db::memory().await;
        testing::movie(&db, "The Matrix", 1999, &[]).await;
        testing::movie(&db, "Inception", 2010, &[]).await;
        testing::movie(&db, "100% Wolf", 2020, &[]).await;
        let catalog = Catalog::new(db, 2);

        assert_eq!(titles(&catalog.search_movies("%").await.unwrap()), vec!["100% Wolf"]);
        assert!(catalog.search_movies("_").await.unwrap().is_empty());
        assert!(catalog.search_movies("m_trix").await.unwrap().is_empty());
        assert!(catalog.search_movies("\\").await.unwrap().is_empty());
        let page = catalog.search_page("%", None).await.unwrap();
        assert_eq!(page.count, 1);
    }

    #[tokio::test]
    async fn search_folds_non_ascii_case() {
        let db = db::memory().await;
        let matrix = testing::movie(&db, "Матрица", 1999, &[]).await;
        testing::movie(&db, "AMÉLIE", 2001, &[]).await;
        let catalog = Catalog::new(db.clone(), 2);

        assert_eq!(titles(&catalog.search_movies("матрица").await.unwrap()), vec!["Матрица"]);
        assert_eq!(titles(&catalog.search_movies("МАТ").await.unwrap()), vec!["Матрица"]);
        assert_eq!(titles(&catalog.search_movies("amélie").await.unwrap()), vec!["AMÉLIE"]);

        // Renaming refreshes the folded title.
        let mut active: movie::ActiveModel = matrix.into();
        active.title = sea_orm::Set("Ёлки".to_string());
        sea_orm::ActiveModelTrait::update(active, &db).await.unwrap();
        assert!(catalog.search_movies("матрица").await.unwrap().is_empty());
        assert_eq!(titles(&catalog.search_movies("ёлки").await.unwrap()), vec!["Ёлки"]);
    }

    #[tokio::test]
    async fn listing_pages_skip_drafts() {
        let (catalog, _, _) = seeded().await;
        let first = catalog.list_published(None).await.unwrap();
        assert_eq!(first.count, 4);
        assert_eq!(first.num_pages, 2);
        assert!(first.has_next());
        let second = catalog.list_published(Some(2)).await.unwrap();
        assert_eq!(titles(&second.items), vec!["Groundhog Day", "Heat"]);
        assert!(matches!(catalog.list_published(Some(3)).await, Err(ApiError::NotFound)));
    }

    #[tokio::test]
    async fn years_are_distinct_and_published() {
        let (catalog, _, _) = seeded().await;
        assert_eq!(catalog.years().await.unwrap(), vec![1993, 1995, 2020]);
    }

    #[tokio::test]
    async fn relations_split_actors_and_directors() {
        let db = db::memory().await;
        let movie = testing::movie(&db, "Heat", 1995, &[]).await;
        let pacino = testing::actor(&db, "Al Pacino").await;
        let mann = testing::actor(&db, "Michael Mann").await;
        testing::credit(&db, movie.id, &[pacino.id], &[mann.id]).await;
        let catalog = Catalog::new(db, 2);

        let relations = catalog.relations(&movie).await.unwrap();
        assert_eq!(relations.actors, vec![pacino.clone()]);
        assert_eq!(relations.directors, vec![mann.clone()]);
        assert_eq!(titles(&catalog.filmography(mann.id).await.unwrap()), vec!["Heat"]);
        assert!(matches!(catalog.movie(9_999).await, Err(ApiError::NotFound)));
    }
}
