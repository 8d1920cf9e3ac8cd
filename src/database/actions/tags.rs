use std::collections::HashSet;

use sqlx::{Pool, Postgres};

use crate::{
    error::{ApiError, Error, FieldErrors},
    form::ValidTag,
    schema::{Id, Tag},
};

pub async fn create_tag(tag: ValidTag, pool: &Pool<Postgres>) -> Result<Tag, Error> {
    let taken: Vec<(bool, bool, bool)> = sqlx::query_as(
        "SELECT name = $1, color = $2, slug = $3 FROM tags WHERE name = $1 OR color = $2 OR slug = $3",
    )
    .bind(&tag.name)
    .bind(&tag.color)
    .bind(&tag.slug)
    .fetch_all(pool)
    .await?;

    let mut errors = FieldErrors::default();
    if taken.iter().any(|t| t.0) {
        errors.add("name", "A tag with this name already exists.");
    }
    if taken.iter().any(|t| t.1) {
        errors.add("color", "A tag with this color already exists.");
    }
    if taken.iter().any(|t| t.2) {
        errors.add("slug", "A tag with this slug already exists.");
    }
    errors.into_result()?;

    let row: Tag =
        sqlx::query_as("INSERT INTO tags (name, color, slug) VALUES ($1, $2, $3) RETURNING *")
            .bind(tag.name)
            .bind(tag.color)
            .bind(tag.slug)
            .fetch_one(pool)
            .await?;

    Ok(row)
}

pub async fn get_tag(id: Id, pool: &Pool<Postgres>) -> Result<Tag, Error> {
    let row: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.ok_or_else(|| ApiError::NotFound.default())
}

pub async fn list_tags(pool: &Pool<Postgres>) -> Result<Vec<Tag>, Error> {
    let list: Vec<Tag> = sqlx::query_as("SELECT * FROM tags ORDER BY id")
        .fetch_all(pool)
        .await?;

    Ok(list)
}

/// Slugs out of `slugs` that name no tag.
pub async fn missing_tag_slugs(slugs: &[String], pool: &Pool<Postgres>) -> Result<Vec<String>, Error> {
    let found: Vec<(String,)> = sqlx::query_as("SELECT slug FROM tags WHERE slug = ANY($1)")
        .bind(slugs)
        .fetch_all(pool)
        .await?;

    let found: HashSet<String> = found.into_iter().map(|row| row.0).collect();
    Ok(slugs
        .iter()
        .filter(|slug| !found.contains(*slug))
        .cloned()
        .collect())
}

/// Ids out of `ids` that have no tag row.
pub async fn missing_tags(ids: &[Id], pool: &Pool<Postgres>) -> Result<Vec<Id>, Error> {
    let found: Vec<(Id,)> = sqlx::query_as("SELECT id FROM tags WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await?;

    let found: HashSet<Id> = found.into_iter().map(|row| row.0).collect();
    Ok(ids.iter().copied().filter(|id| !found.contains(id)).collect())
}
