use sqlx::{Pool, Postgres};

use super::{
    recipes::get_recipe,
    users::{followed_author_views, get_user_view},
};
use crate::{
    error::{ApiError, Error},
    schema::Id,
    views::{FollowedAuthorView, ShortRecipeView},
};

/// Per user recipe lists toggled through `POST`/`DELETE` on a recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeList {
    Favorites,
    ShoppingCart,
}

impl RecipeList {
    fn table(self) -> &'static str {
        match self {
            RecipeList::Favorites => "favorites",
            RecipeList::ShoppingCart => "cart_items",
        }
    }

    fn already_added(self) -> &'static str {
        match self {
            RecipeList::Favorites => "Recipe is already in favorites.",
            RecipeList::ShoppingCart => "Recipe is already in the shopping cart.",
        }
    }

    fn not_added(self) -> &'static str {
        match self {
            RecipeList::Favorites => "Recipe is not in favorites.",
            RecipeList::ShoppingCart => "Recipe is not in the shopping cart.",
        }
    }
}

pub async fn add_to_list(
    list: RecipeList,
    user_id: Id,
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<ShortRecipeView, Error> {
    let recipe = get_recipe(recipe_id, pool)
        .await?
        .ok_or_else(|| ApiError::NotFound.default())?;

    let result = sqlx::query(&format!(
        "INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        list.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::InvalidRequest.field("errors", list.already_added()));
    }

    Ok(recipe.into())
}

pub async fn remove_from_list(
    list: RecipeList,
    user_id: Id,
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    if get_recipe(recipe_id, pool).await?.is_none() {
        return Err(ApiError::NotFound.default());
    }

    let result = sqlx::query(&format!(
        "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
        list.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::InvalidRequest.field("errors", list.not_added()));
    }

    Ok(())
}

/// Rejects following yourself before touching the database.
pub fn check_follow_target(user_id: Id, author_id: Id) -> Result<(), Error> {
    if user_id == author_id {
        return Err(ApiError::InvalidRequest.field("errors", "You cannot subscribe to yourself."));
    }
    Ok(())
}

pub async fn follow(
    user_id: Id,
    author_id: Id,
    recipes_limit: i64,
    pool: &Pool<Postgres>,
) -> Result<FollowedAuthorView, Error> {
    check_follow_target(user_id, author_id)?;

    // 404 for an unknown author comes before the duplicate check.
    let mut author = get_user_view(pool, author_id, Some(user_id)).await?;

    let result = sqlx::query(
        "INSERT INTO follows (user_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(author_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::InvalidRequest.field(
            "errors",
            "You are already subscribed to this author.",
        ));
    }

    log::debug!("User {user_id} subscribed to {author_id}");

    author.is_subscribed = true;
    followed_author_views(pool, vec![author], recipes_limit)
        .await?
        .pop()
        .ok_or_else(|| ApiError::NotFound.default())
}

pub async fn unfollow(user_id: Id, author_id: Id, pool: &Pool<Postgres>) -> Result<(), Error> {
    get_user_view(pool, author_id, None).await?;

    let result = sqlx::query("DELETE FROM follows WHERE user_id = $1 AND author_id = $2")
        .bind(user_id)
        .bind(author_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::InvalidRequest.field(
            "errors",
            "You are not subscribed to this author.",
        ));
    }

    log::debug!("User {user_id} unsubscribed from {author_id}");

    Ok(())
}
