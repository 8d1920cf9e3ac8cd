use std::collections::{HashMap, HashSet};

use sqlx::{PgConnection, Pool, Postgres, QueryBuilder};
use warp::http::Method;

use super::{
    ingredients::missing_ingredients,
    tags::{missing_tag_slugs, missing_tags},
    users::fetch_user_rows,
};
use crate::{
    authentication::permissions::Policy,
    error::{ApiError, Error, FieldErrors},
    form::{IngredientAmountForm, ValidRecipe},
    jwt::SessionData,
    pagination::{PageContext, PageQuery},
    schema::{Id, LinkedRecipeTag, Recipe, RecipePart, RecipeRow, Tag},
    views::{RecipeRelations, RecipeView, UserView},
};

/// Query filters accepted by `GET /recipes/`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub author: Option<Id>,
    pub tags: Vec<String>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl RecipeFilter {
    /// Builds the filter from raw query pairs; `tags` may repeat.
    pub fn from_pairs(pairs: &[(String, String)]) -> Result<Self, Error> {
        let mut filter = Self::default();
        let mut errors = FieldErrors::default();

        for (key, value) in pairs {
            match key.as_str() {
                "author" => match value.parse::<Id>() {
                    Ok(author) => filter.author = Some(author),
                    Err(_) => errors.add("author", "A valid integer is required."),
                },
                "tags" => {
                    if !value.is_empty() {
                        filter.tags.push(value.to_owned());
                    }
                }
                "is_favorited" => match parse_flag(value) {
                    Some(flag) => filter.is_favorited = flag,
                    None => errors.add("is_favorited", "Must be a valid boolean."),
                },
                "is_in_shopping_cart" => match parse_flag(value) {
                    Some(flag) => filter.is_in_shopping_cart = flag,
                    None => errors.add("is_in_shopping_cart", "Must be a valid boolean."),
                },
                _ => {}
            }
        }

        errors.into_result()?;
        Ok(filter)
    }
}

pub async fn get_recipe(id: Id, pool: &Pool<Postgres>) -> Result<Option<Recipe>, Error> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Loads a recipe the session is about to modify; 404 before 403.
pub async fn get_recipe_mut(
    id: Id,
    method: &Method,
    session: Option<&SessionData>,
    pool: &Pool<Postgres>,
) -> Result<Recipe, Error> {
    Policy::AuthorOrReadOnly.authenticate(method, session)?;

    let recipe = get_recipe(id, pool)
        .await?
        .ok_or_else(|| ApiError::NotFound.default())?;

    Policy::AuthorOrReadOnly.authenticate_object(method, session, recipe.author_id)?;

    Ok(recipe)
}

pub async fn fetch_recipes(
    filter: &RecipeFilter,
    query: PageQuery,
    viewer: Option<&SessionData>,
    pool: &Pool<Postgres>,
) -> Result<PageContext<RecipeView>, Error> {
    if !filter.tags.is_empty() {
        if let Some(slug) = missing_tag_slugs(&filter.tags, pool).await?.first() {
            return Err(ApiError::InvalidRequest.field(
                "tags",
                &format!("Select a valid choice. {slug} is not one of the available choices."),
            ));
        }
    }

    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT r.*, COUNT(*) OVER() AS count FROM recipes r WHERE TRUE");

    if let Some(author) = filter.author {
        query_builder.push(" AND r.author_id = ").push_bind(author);
    }
    if !filter.tags.is_empty() {
        query_builder
            .push(
                " AND EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id \
                 WHERE rt.recipe_id = r.id AND t.slug = ANY(",
            )
            .push_bind(filter.tags.clone())
            .push("))");
    }
    // Membership filters only mean something for an authenticated viewer.
    if let Some(session) = viewer {
        if filter.is_favorited {
            query_builder
                .push(" AND EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ")
                .push_bind(session.user_id)
                .push(")");
        }
        if filter.is_in_shopping_cart {
            query_builder
                .push(" AND EXISTS (SELECT 1 FROM cart_items c WHERE c.recipe_id = r.id AND c.user_id = ")
                .push_bind(session.user_id)
                .push(")");
        }
    }

    query_builder
        .push(" ORDER BY r.pub_date DESC, r.id DESC LIMIT ")
        .push_bind(query.limit())
        .push(" OFFSET ")
        .push_bind(query.offset());

    let rows: Vec<RecipeRow> = query_builder.build_query_as().fetch_all(pool).await?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    let recipes = rows.into_iter().map(|row| row.recipe).collect();
    let views = load_recipe_views(recipes, viewer, pool).await?;

    Ok(PageContext::from_rows(views, total_count, query))
}

pub async fn list_recipe_parts(
    recipe_ids: &[Id],
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipePart>, Error> {
    let rows: Vec<RecipePart> = sqlx::query_as(
        "
        SELECT ri.recipe_id AS recipe_id, i.id AS ingredient_id, i.name AS name,
            i.measurement_unit AS measurement_unit, ri.amount AS amount
        FROM recipe_ingredients ri
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = ANY($1)
        ORDER BY ri.id
    ",
    )
    .bind(recipe_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn list_recipe_tags(
    recipe_ids: &[Id],
    pool: &Pool<Postgres>,
) -> Result<Vec<LinkedRecipeTag>, Error> {
    let rows: Vec<LinkedRecipeTag> = sqlx::query_as(
        "
        SELECT rt.recipe_id AS recipe_id, t.id AS id, t.name AS name, t.color AS color, t.slug AS slug
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = ANY($1)
        ORDER BY t.id
    ",
    )
    .bind(recipe_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Recipe ids out of `recipe_ids` that `user_id` has in `table`.
async fn recipes_in(
    table: &str,
    user_id: Id,
    recipe_ids: &[Id],
    pool: &Pool<Postgres>,
) -> Result<HashSet<Id>, Error> {
    let rows: Vec<(Id,)> = sqlx::query_as(&format!(
        "SELECT recipe_id FROM {table} WHERE user_id = $1 AND recipe_id = ANY($2)"
    ))
    .bind(user_id)
    .bind(recipe_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|row| row.0).collect())
}

/// Builds read views for `recipes` with a fixed number of queries regardless
/// of how many recipes are passed.
pub async fn load_recipe_views(
    recipes: Vec<Recipe>,
    viewer: Option<&SessionData>,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeView>, Error> {
    if recipes.is_empty() {
        return Ok(vec![]);
    }

    let recipe_ids: Vec<Id> = recipes.iter().map(|recipe| recipe.id).collect();
    let author_ids: Vec<Id> = recipes
        .iter()
        .map(|recipe| recipe.author_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let viewer_id = viewer.map(|session| session.user_id);

    let mut tags: HashMap<Id, Vec<Tag>> = HashMap::new();
    for link in list_recipe_tags(&recipe_ids, pool).await? {
        tags.entry(link.recipe_id).or_default().push(link.tag);
    }

    let mut parts: HashMap<Id, Vec<RecipePart>> = HashMap::new();
    for part in list_recipe_parts(&recipe_ids, pool).await? {
        parts.entry(part.recipe_id).or_default().push(part);
    }

    let authors: HashMap<Id, UserView> = fetch_user_rows(pool, &author_ids, viewer_id)
        .await?
        .into_iter()
        .map(|row| (row.user.id, UserView::from(row)))
        .collect();

    let (favorites, cart) = match viewer_id {
        Some(user_id) => (
            recipes_in("favorites", user_id, &recipe_ids, pool).await?,
            recipes_in("cart_items", user_id, &recipe_ids, pool).await?,
        ),
        None => (HashSet::new(), HashSet::new()),
    };

    recipes
        .into_iter()
        .map(|recipe| {
            let author = authors.get(&recipe.author_id).cloned().ok_or_else(|| {
                log::error!("Recipe {} references a missing author", recipe.id);
                ApiError::Internal.default()
            })?;
            let relations = RecipeRelations {
                tags: tags.remove(&recipe.id).unwrap_or_default(),
                author,
                ingredients: parts.remove(&recipe.id).unwrap_or_default(),
                is_favorited: favorites.contains(&recipe.id),
                is_in_shopping_cart: cart.contains(&recipe.id),
            };
            Ok(RecipeView::new(recipe, relations))
        })
        .collect()
}

pub async fn get_recipe_view(
    recipe: Recipe,
    viewer: Option<&SessionData>,
    pool: &Pool<Postgres>,
) -> Result<RecipeView, Error> {
    load_recipe_views(vec![recipe], viewer, pool)
        .await?
        .pop()
        .ok_or_else(|| ApiError::NotFound.default())
}

/// Fails with a field error for every referenced ingredient or tag id that does
/// not exist.
async fn check_references(recipe: &ValidRecipe, pool: &Pool<Postgres>) -> Result<(), Error> {
    let mut errors = FieldErrors::default();

    let ingredient_ids: Vec<Id> = recipe.ingredients.iter().map(|i| i.id).collect();
    for id in missing_ingredients(&ingredient_ids, pool).await? {
        errors.add("ingredients", format!("Ingredient with id {id} does not exist."));
    }

    if let Some(tag_ids) = &recipe.tags {
        for id in missing_tags(tag_ids, pool).await? {
            errors.add("tags", format!("Tag with id {id} does not exist."));
        }
    }

    errors.into_result()
}

async fn insert_recipe_parts(
    recipe_id: Id,
    ingredients: &[IngredientAmountForm],
    conn: &mut PgConnection,
) -> Result<(), Error> {
    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ");

    query_builder.push_values(ingredients, |mut b, ingredient| {
        b.push_bind(recipe_id)
            .push_bind(ingredient.id)
            .push_bind(ingredient.amount);
    });

    query_builder.build().execute(&mut *conn).await?;

    Ok(())
}

async fn replace_recipe_parts(
    recipe_id: Id,
    ingredients: &[IngredientAmountForm],
    conn: &mut PgConnection,
) -> Result<(), Error> {
    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut *conn)
        .await?;

    insert_recipe_parts(recipe_id, ingredients, conn).await
}

async fn set_recipe_tags(recipe_id: Id, tags: &[Id], conn: &mut PgConnection) -> Result<(), Error> {
    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut *conn)
        .await?;

    if tags.is_empty() {
        return Ok(());
    }

    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");

    query_builder.push_values(tags, |mut b, tag_id| {
        b.push_bind(recipe_id).push_bind(*tag_id);
    });

    query_builder.build().execute(&mut *conn).await?;

    Ok(())
}

/// Persists the recipe, its tags and its ingredient amounts in one
/// transaction.
pub async fn create_recipe(
    recipe: ValidRecipe,
    author_id: Id,
    pool: &Pool<Postgres>,
) -> Result<Recipe, Error> {
    check_references(&recipe, pool).await?;

    let mut tx = pool.begin().await?;

    let row: Recipe = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, image, text, cooking_time, pub_date)
        VALUES ($1, $2, $3, $4, $5, NOW())
        RETURNING *
    ",
    )
    .bind(author_id)
    .bind(&recipe.name)
    .bind(&recipe.image)
    .bind(&recipe.text)
    .bind(recipe.cooking_time)
    .fetch_one(&mut *tx)
    .await?;

    set_recipe_tags(row.id, recipe.tags.as_deref().unwrap_or_default(), &mut tx).await?;
    insert_recipe_parts(row.id, &recipe.ingredients, &mut tx).await?;

    tx.commit().await?;

    log::info!("User {author_id} created recipe {}", row.id);

    Ok(row)
}

/// Replaces the ingredient set wholesale (never merged with the old one), the
/// tag set when given, and the scalar fields, in one transaction.
pub async fn update_recipe(
    id: Id,
    recipe: ValidRecipe,
    pool: &Pool<Postgres>,
) -> Result<Recipe, Error> {
    check_references(&recipe, pool).await?;

    let mut tx = pool.begin().await?;

    replace_recipe_parts(id, &recipe.ingredients, &mut tx).await?;
    if let Some(tags) = &recipe.tags {
        set_recipe_tags(id, tags, &mut tx).await?;
    }

    let row: Option<Recipe> = sqlx::query_as(
        "
        UPDATE recipes
        SET name = $1, image = $2, text = $3, cooking_time = $4, pub_date = NOW()
        WHERE id = $5
        RETURNING *
    ",
    )
    .bind(&recipe.name)
    .bind(&recipe.image)
    .bind(&recipe.text)
    .bind(recipe.cooking_time)
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?;

    let row = row.ok_or_else(|| ApiError::NotFound.default())?;

    tx.commit().await?;

    log::info!("Recipe {id} updated");

    Ok(row)
}

pub async fn delete_recipe(id: Id, pool: &Pool<Postgres>) -> Result<(), Error> {
    let result = sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound.default());
    }

    log::info!("Recipe {id} deleted");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn filter_collects_repeated_tags() {
        let filter = RecipeFilter::from_pairs(&pairs(&[
            ("tags", "breakfast"),
            ("tags", "dinner"),
            ("author", "4"),
            ("page", "2"),
        ]))
        .unwrap();

        assert_eq!(
            filter,
            RecipeFilter {
                author: Some(4),
                tags: vec!["breakfast".to_string(), "dinner".to_string()],
                is_favorited: false,
                is_in_shopping_cart: false,
            }
        );
    }

    #[test]
    fn filter_parses_flags() {
        let filter = RecipeFilter::from_pairs(&pairs(&[
            ("is_favorited", "1"),
            ("is_in_shopping_cart", "true"),
        ]))
        .unwrap();
        assert!(filter.is_favorited);
        assert!(filter.is_in_shopping_cart);

        let filter = RecipeFilter::from_pairs(&pairs(&[("is_favorited", "0")])).unwrap();
        assert!(!filter.is_favorited);
    }

    #[test]
    fn filter_rejects_malformed_values() {
        let err = RecipeFilter::from_pairs(&pairs(&[("author", "me"), ("is_favorited", "maybe")]))
            .unwrap_err();
        assert!(err.body.get("author").is_some());
        assert!(err.body.get("is_favorited").is_some());
    }
}
