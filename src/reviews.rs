use std::collections::HashMap;

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::Serialize;

use crate::{
    entities::{movie, review},
    error::{ApiError, ApiResult, FieldErrors},
    models::ReviewPayload,
};

const NAME_MAX: usize = 100;
const EMAIL_MAX: usize = 254;
const TEXT_MAX: usize = 5000;

/// Levels a thread may hold, counting the top-level review as the first.
pub const MAX_THREAD_DEPTH: usize = 64;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReviewNode {
    pub id: i32,
    pub name: String,
    pub text: String,
    pub parent: Option<i32>,
    pub children: Vec<ReviewNode>,
}

impl Drop for ReviewNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

/// Nests a movie's flat review list under their parents. Top-level reviews keep the input
/// order, as do siblings. Reviews that cannot be reached from a top-level review (a parent
/// outside `reviews`, a self-reference or a cycle) are left out, as is anything nested deeper
/// than [`MAX_THREAD_DEPTH`].
pub fn build_tree(reviews: &[review::Model]) -> Vec<ReviewNode> {
    let index: HashMap<i32, usize> = reviews.iter().enumerate().map(|(i, r)| (r.id, i)).collect();

    let mut roots = Vec::new();
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); reviews.len()];
    for (i, r) in reviews.iter().enumerate() {
        match r.parent_id {
            None => roots.push(i),
            Some(parent) if parent != r.id => {
                if let Some(&p) = index.get(&parent) {
                    children[p].push(i);
                }
            }
            Some(_) => {}
        }
    }

    // Pre-order walk; each review has one parent so nothing is visited twice.
    let mut order = Vec::with_capacity(reviews.len());
    let mut stack: Vec<(usize, usize)> = roots.iter().rev().map(|&i| (i, 1)).collect();
    while let Some((i, level)) = stack.pop() {
        order.push(i);
        if level < MAX_THREAD_DEPTH {
            stack.extend(children[i].iter().rev().map(|&c| (c, level + 1)));
        }
    }

    if order.len() < reviews.len() {
        tracing::warn!(
            dropped = reviews.len() - order.len(),
            "reviews unreachable from a top-level review or nested too deep"
        );
    }

    // Reverse pre-order finishes every child before its parent.
    let mut built: Vec<Option<ReviewNode>> = vec![None; reviews.len()];
    for &i in order.iter().rev() {
        let r = &reviews[i];
        let node = ReviewNode {
            id: r.id,
            name: r.name.clone(),
            text: r.text.clone(),
            parent: r.parent_id,
            children: children[i].iter().filter_map(|c| built[*c].take()).collect(),
        };
        built[i] = Some(node);
    }

    roots.iter().filter_map(|i| built[*i].take()).collect()
}

#[derive(Clone)]
pub struct Reviews {
    db: DatabaseConnection,
}

impl Reviews {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn for_movie(&self, movie_id: i32) -> ApiResult<Vec<review::Model>> {
        Ok(review::Entity::find()
            .filter(review::Column::MovieId.eq(movie_id))
            .order_by_asc(review::Column::Id)
            .all(&self.db)
            .await?)
    }

    pub async fn tree_for(&self, movie_id: i32) -> ApiResult<Vec<ReviewNode>> {
        Ok(build_tree(&self.for_movie(movie_id).await?))
    }

    pub async fn all(&self) -> ApiResult<Vec<review::Model>> {
        Ok(review::Entity::find().order_by_asc(review::Column::Id).all(&self.db).await?)
    }

    /// Level of `review` in its thread, 1 for a top-level review. Stops counting past
    /// [`MAX_THREAD_DEPTH`], which also bounds the walk on cyclic rows.
    async fn level_of(&self, review: &review::Model) -> ApiResult<usize> {
        let parents: HashMap<i32, Option<i32>> = self
            .for_movie(review.movie_id)
            .await?
            .into_iter()
            .map(|r| (r.id, r.parent_id))
            .collect();
        let mut level = 1;
        let mut current = review.parent_id;
        while let Some(id) = current {
            level += 1;
            if level > MAX_THREAD_DEPTH {
                break;
            }
            current = parents.get(&id).copied().flatten();
        }
        Ok(level)
    }

    /// Validates and stores a review. A reply must point at a review of the same movie.
    pub async fn create(&self, payload: ReviewPayload) -> ApiResult<review::Model> {
        let mut errors = FieldErrors::default();
        let name = required_text(&mut errors, "name", payload.name, NAME_MAX);
        let email = required_text(&mut errors, "email", payload.email, EMAIL_MAX);
        let text = required_text(&mut errors, "text", payload.text, TEXT_MAX);
        if email.as_deref().is_some_and(|e| !looks_like_email(e)) {
            errors.add("email", "Enter a valid email address.");
        }

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

        if let Some(parent_id) = payload.parent {
            match review::Entity::find_by_id(parent_id).one(&self.db).await? {
                None => errors.add(
                    "parent",
                    format!("Invalid pk \"{parent_id}\" - object does not exist."),
                ),
                Some(parent) => {
                    if movie.as_ref().is_some_and(|m| m.id != parent.movie_id) {
                        errors.add("parent", "Parent review belongs to a different movie.");
                    } else if self.level_of(&parent).await? >= MAX_THREAD_DEPTH {
                        errors.add(
                            "parent",
                            format!("Replies cannot be nested more than {MAX_THREAD_DEPTH} levels deep."),
                        );
                    }
                }
            }
        }

        let (Some(movie), Some(name), Some(email), Some(text), true) =
            (movie, name, email, text, errors.is_empty())
        else {
            tracing::debug!(%errors, "review rejected");
            return Err(ApiError::Validation(errors));
        };

        let row = review::ActiveModel {
            id: Default::default(),
            email: Set(email),
            name: Set(name),
            text: Set(text),
            parent_id: Set(payload.parent),
            movie_id: Set(movie.id),
        };
        let created = review::Entity::insert(row).exec_with_returning(&self.db).await?;
        tracing::debug!(review_id = created.id, movie_id = movie.id, parent = ?created.parent_id, "review stored");
        Ok(created)
    }
}

fn required_text(
    errors: &mut FieldErrors,
    field: &'static str,
    value: Option<String>,
    max: usize,
) -> Option<String> {
    let Some(value) = value else {
        errors.add(field, "This field is required.");
        return None;
    };
    let value = value.trim().to_string();
    if value.is_empty() {
        errors.add(field, "This field may not be blank.");
        return None;
    }
    if value.chars().count() > max {
        errors.add(field, format!("Ensure this field has no more than {max} characters."));
        return None;
    }
    Some(value)
}

fn looks_like_email(value: &str) -> bool {
    let Some((local, domain)) = value.rsplit_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && domain.contains('.')
        && !value.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, testing};

    fn row(id: i32, parent: Option<i32>) -> review::Model {
        review::Model {
            id,
            email: format!("r{id}@example.com"),
            name: format!("r{id}"),
            text: format!("text {id}"),
            parent_id: parent,
            movie_id: 1,
        }
    }

    fn size(node: &ReviewNode) -> usize {
        let mut total = 0;
        let mut stack = vec![node];
        while let Some(node) = stack.pop() {
            total += 1;
            stack.extend(node.children.iter());
        }
        total
    }

    fn ids(nodes: &[ReviewNode]) -> Vec<i32> {
        nodes.iter().map(|n| n.id).collect()
    }

    #[test]
    fn nests_replies_under_their_parents() {
        let reviews =
            vec![row(1, None), row(2, Some(1)), row(3, None), row(4, Some(2)), row(5, Some(1))];
        let tree = build_tree(&reviews);

        assert_eq!(ids(&tree), vec![1, 3]);
        assert_eq!(ids(&tree[0].children), vec![2, 5]);
        assert_eq!(ids(&tree[0].children[0].children), vec![4]);
        assert!(tree[1].children.is_empty());
        assert_eq!(tree.iter().map(size).sum::<usize>(), reviews.len());
    }

    fn chain(len: i32) -> Vec<review::Model> {
        (1..=len).map(|id| row(id, if id == 1 { None } else { Some(id - 1) })).collect()
    }

    fn levels(node: &ReviewNode) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(node, 1)];
        while let Some((node, level)) = stack.pop() {
            deepest = deepest.max(level);
            stack.extend(node.children.iter().map(|c| (c, level + 1)));
        }
        deepest
    }

    #[test]
    fn deep_chains_are_cut_at_the_depth_limit() {
        let tree = build_tree(&chain(50_000));
        assert_eq!(tree.len(), 1);
        assert_eq!(size(&tree[0]), MAX_THREAD_DEPTH);
        assert_eq!(levels(&tree[0]), MAX_THREAD_DEPTH);
    }

    #[test]
    fn dropping_a_deep_tree_does_not_overflow() {
        let mut node = ReviewNode {
            id: 0,
            name: String::new(),
            text: String::new(),
            parent: None,
            children: Vec::new(),
        };
        for id in 1..200_000 {
            node = ReviewNode {
                id,
                name: String::new(),
                text: String::new(),
                parent: None,
                children: vec![node],
            };
        }
        drop(node);
    }

    #[test]
    fn cycles_and_dangling_parents_are_dropped() {
        let reviews = vec![row(1, None), row(2, Some(3)), row(3, Some(2)), row(4, Some(4)), row(5, Some(99))];
        let tree = build_tree(&reviews);
        assert_eq!(ids(&tree), vec![1]);
        assert_eq!(size(&tree[0]), 1);
    }

    #[test]
    fn email_shape() {
        assert!(looks_like_email("neo@zion.org"));
        assert!(!looks_like_email("neo"));
        assert!(!looks_like_email("neo@zion"));
        assert!(!looks_like_email("@zion.org"));
        assert!(!looks_like_email("neo smith@zion.org"));
    }

    fn payload(movie: i32, parent: Option<i32>) -> ReviewPayload {
        ReviewPayload {
            movie: Some(movie),
            name: Some("Trinity".to_string()),
            email: Some("trinity@zion.org".to_string()),
            text: Some("Dodge this.".to_string()),
            parent,
        }
    }

    #[tokio::test]
    async fn reply_appears_under_its_root() {
        let db = db::memory().await;
        let movie = testing::movie(&db, "The Matrix", 1999, &[]).await;
        let reviews = Reviews::new(db);

        let root = reviews.create(payload(movie.id, None)).await.unwrap();
        let reply = reviews.create(payload(movie.id, Some(root.id))).await.unwrap();
        assert_eq!(reply.parent_id, Some(root.id));

        let tree = reviews.tree_for(movie.id).await.unwrap();
        assert_eq!(ids(&tree), vec![root.id]);
        assert_eq!(ids(&tree[0].children), vec![reply.id]);
    }

    #[tokio::test]
    async fn missing_and_blank_fields_are_reported() {
        let db = db::memory().await;
        let reviews = Reviews::new(db);

        let err = reviews
            .create(ReviewPayload { text: Some("   ".to_string()), ..Default::default() })
            .await
            .unwrap_err();
        let ApiError::Validation(errors) = err else { panic!("expected validation error") };
        for field in ["movie", "name", "email", "text"] {
            assert!(errors.contains(field), "{field} should be reported");
        }
    }

    #[tokio::test]
    async fn parent_from_another_movie_is_rejected() {
        let db = db::memory().await;
        let first = testing::movie(&db, "Alien", 1979, &[]).await;
        let second = testing::movie(&db, "Aliens", 1986, &[]).await;
        let reviews = Reviews::new(db);

        let root = reviews.create(payload(first.id, None)).await.unwrap();
        let err = reviews.create(payload(second.id, Some(root.id))).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(ref e) if e.contains("parent")));

        let err = reviews.create(payload(second.id, Some(404))).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(ref e) if e.contains("parent")));
    }

    #[tokio::test]
    async fn replies_stop_at_the_depth_limit() {
        let db = db::memory().await;
        let movie = testing::movie(&db, "Inception", 2010, &[]).await;
        let reviews = Reviews::new(db);

        let mut parent = None;
        for _ in 0..MAX_THREAD_DEPTH {
            parent = Some(reviews.create(payload(movie.id, parent)).await.unwrap().id);
        }
        let err = reviews.create(payload(movie.id, parent)).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(ref e) if e.contains("parent")));

        let tree = reviews.tree_for(movie.id).await.unwrap();
        assert_eq!(levels(&tree[0]), MAX_THREAD_DEPTH);
    }
}
