use std::collections::HashSet;

use sqlx::{Pool, Postgres, QueryBuilder};

use crate::{
    error::{ApiError, Error},
    schema::{Id, Ingredient},
};

/// Postgres caps bind parameters per statement at 65535.
const IMPORT_CHUNK_SIZE: usize = 65535 / 2;

/// `ILIKE` pattern matching everything that starts with `prefix`.
pub fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

pub async fn list_ingredients(
    name: Option<&str>,
    pool: &Pool<Postgres>,
) -> Result<Vec<Ingredient>, Error> {
    let rows: Vec<Ingredient> = match name.filter(|name| !name.is_empty()) {
        Some(name) => {
            sqlx::query_as("SELECT * FROM ingredients WHERE name ILIKE $1 ORDER BY name")
                .bind(like_prefix(name))
                .fetch_all(pool)
                .await?
        }
        None => {
            sqlx::query_as("SELECT * FROM ingredients ORDER BY name")
                .fetch_all(pool)
                .await?
        }
    };

    Ok(rows)
}

pub async fn get_ingredient(id: Id, pool: &Pool<Postgres>) -> Result<Ingredient, Error> {
    let row: Option<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.ok_or_else(|| ApiError::NotFound.default())
}

pub async fn create_ingredient(
    name: &str,
    measurement_unit: &str,
    pool: &Pool<Postgres>,
) -> Result<Ingredient, Error> {
    let row: Option<Ingredient> = sqlx::query_as(
        "
        INSERT INTO ingredients (name, measurement_unit)
        VALUES ($1, $2)
        ON CONFLICT DO NOTHING RETURNING *
    ",
    )
    .bind(name)
    .bind(measurement_unit)
    .fetch_optional(pool)
    .await?;

    row.ok_or_else(|| {
        ApiError::InvalidRequest.field(
            "name",
            "An ingredient with this name and measurement unit already exists.",
        )
    })
}

/// Bulk insert of `(name, measurement_unit)` pairs, skipping pairs that already
/// exist. Returns the number of inserted rows.
pub async fn import_ingredients(
    ingredients: &[(String, String)],
    pool: &Pool<Postgres>,
) -> Result<u64, Error> {
    let mut inserted = 0;

    for chunk in ingredients.chunks(IMPORT_CHUNK_SIZE) {
        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO ingredients (name, measurement_unit) ");

        query_builder.push_values(chunk, |mut b, (name, unit)| {
            b.push_bind(name).push_bind(unit);
        });
        query_builder.push(" ON CONFLICT DO NOTHING");

        inserted += query_builder.build().execute(pool).await?.rows_affected();
    }

    Ok(inserted)
}

/// Ids out of `ids` that have no ingredient row.
pub async fn missing_ingredients(ids: &[Id], pool: &Pool<Postgres>) -> Result<Vec<Id>, Error> {
    let found: Vec<(Id,)> = sqlx::query_as("SELECT id FROM ingredients WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await?;

    let found: HashSet<Id> = found.into_iter().map(|row| row.0).collect();
    Ok(ids.iter().copied().filter(|id| !found.contains(id)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_pattern_appends_wildcard() {
        assert_eq!(like_prefix("сах"), "сах%");
    }

    #[test]
    fn prefix_pattern_escapes_wildcards() {
        assert_eq!(like_prefix("100%_x\\"), "100\\%\\_x\\\\%");
    }
}
