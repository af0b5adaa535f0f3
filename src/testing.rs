//! Fixtures shared by the unit tests.

use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};

use crate::entities::{actor, genre, movie, movie_actor, movie_director, movie_genre, review};

pub fn slug(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect()
}

pub async fn genre(db: &DatabaseConnection, name: &str) -> genre::Model {
    genre::ActiveModel {
        name: Set(name.to_string()),
        description: Set(String::new()),
        url: Set(slug(name)),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn movie(db: &DatabaseConnection, title: &str, year: i16, genres: &[i32]) -> movie::Model {
    let movie = movie::ActiveModel {
        title: Set(title.to_string()),
        tagline: Set(format!("{title} tagline")),
        description: Set(String::new()),
        poster: Set(format!("movies/{}.jpg", slug(title))),
        year: Set(year),
        country: Set("USA".to_string()),
        world_premiere: Set(format!("{year}-01-01")),
        budget: Set(0),
        fees_in_usa: Set(0),
        fees_in_world: Set(0),
        category_id: Set(None),
        url: Set(slug(title)),
        draft: Set(false),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap();

    for genre_id in genres {
        movie_genre::ActiveModel { movie_id: Set(movie.id), genre_id: Set(*genre_id) }
            .insert(db)
            .await
            .unwrap();
    }
    movie
}

pub async fn actor(db: &DatabaseConnection, name: &str) -> actor::Model {
    actor::ActiveModel {
        name: Set(name.to_string()),
        age: Set(50),
        description: Set(String::new()),
        image: Set(format!("actors/{}.jpg", slug(name))),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn credit(db: &DatabaseConnection, movie_id: i32, actors: &[i32], directors: &[i32]) {
    for actor_id in actors {
        movie_actor::ActiveModel { movie_id: Set(movie_id), actor_id: Set(*actor_id) }
            .insert(db)
            .await
            .unwrap();
    }
    for actor_id in directors {
        movie_director::ActiveModel { movie_id: Set(movie_id), actor_id: Set(*actor_id) }
            .insert(db)
            .await
            .unwrap();
    }
}

pub async fn set_draft(db: &DatabaseConnection, movie_id: i32, draft: bool) {
    let movie = movie::Entity::find_by_id(movie_id).one(db).await.unwrap().unwrap();
    let mut active: movie::ActiveModel = movie.into();
    active.draft = Set(draft);
    active.update(db).await.unwrap();
}

/// Stores `len` reviews on `movie_id`, each replying to the one before. Ids start at 1, so the
/// movie must have no other reviews.
pub async fn review_chain(db: &DatabaseConnection, movie_id: i32, len: i32) {
    let rows: Vec<_> = (1..=len)
        .map(|id| review::ActiveModel {
            id: Set(id),
            email: Set(format!("r{id}@example.com")),
            name: Set(format!("Reader {id}")),
            text: Set(format!("reply #{id}.")),
            parent_id: Set((id > 1).then(|| id - 1)),
            movie_id: Set(movie_id),
        })
        .collect();
    // Batched to stay under SQLite's bound-parameter limit.
    for batch in rows.chunks(1_000) {
        review::Entity::insert_many(batch.iter().cloned()).exec(db).await.unwrap();
    }
}

pub fn state(db: DatabaseConnection) -> std::sync::Arc<crate::AppState> {
    let config = crate::config::Config {
        addr: "127.0.0.1:0".parse().unwrap(),
        database_url: "sqlite::memory:".to_string(),
        page_size: 2,
        api_tokens: vec!["reader".to_string()],
        admin_token: Some("boss".to_string()),
        site_title: "Reelhouse".to_string(),
    };
    std::sync::Arc::new(crate::AppState::new(std::sync::Arc::new(config), db))
}
