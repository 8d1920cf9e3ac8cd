use std::collections::HashMap;

use sqlx::{Pool, Postgres};

use crate::{
    authentication::{
        cryptography::{hash_password, verify_password},
        jwt::generate_jwt_session,
    },
    config::AuthConfig,
    error::{ApiError, Error, FieldErrors},
    form::ValidUser,
    pagination::{PageContext, PageQuery},
    schema::{Id, Recipe, RecipeCount, User, UserPageRow, UserRole, UserRow},
    views::{FollowedAuthorView, ShortRecipeView, UserView},
};

pub async fn get_user_by_id(pool: &Pool<Postgres>, user_id: Id) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn get_user_by_email(pool: &Pool<Postgres>, email: &str) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Current `token_version` of a user, `None` once the user is gone.
pub async fn get_token_version(pool: &Pool<Postgres>, user_id: Id) -> Result<Option<i32>, Error> {
    let row: Option<(i32,)> = sqlx::query_as("SELECT token_version FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|row| row.0))
}

/// Invalidates every token issued to the user so far.
pub async fn revoke_tokens(pool: &Pool<Postgres>, user_id: Id) -> Result<(), Error> {
    sqlx::query("UPDATE users SET token_version = token_version + 1 WHERE id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Users by id, with `is_subscribed` resolved for `viewer`.
pub async fn fetch_user_rows(
    pool: &Pool<Postgres>,
    ids: &[Id],
    viewer: Option<Id>,
) -> Result<Vec<UserRow>, Error> {
    let rows: Vec<UserRow> = sqlx::query_as(
        "
        SELECT u.*,
            EXISTS (SELECT 1 FROM follows f WHERE f.user_id = $2 AND f.author_id = u.id) AS is_subscribed
        FROM users u
        WHERE u.id = ANY($1)
    ",
    )
    .bind(ids)
    .bind(viewer)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn get_user_view(
    pool: &Pool<Postgres>,
    user_id: Id,
    viewer: Option<Id>,
) -> Result<UserView, Error> {
    fetch_user_rows(pool, &[user_id], viewer)
        .await?
        .into_iter()
        .next()
        .map(UserView::from)
        .ok_or_else(|| ApiError::NotFound.default())
}

pub async fn fetch_users(
    pool: &Pool<Postgres>,
    viewer: Option<Id>,
    query: PageQuery,
) -> Result<PageContext<UserView>, Error> {
    let rows: Vec<UserPageRow> = sqlx::query_as(
        "
        SELECT u.*,
            EXISTS (SELECT 1 FROM follows f WHERE f.user_id = $1 AND f.author_id = u.id) AS is_subscribed,
            COUNT(*) OVER() AS count
        FROM users u
        ORDER BY u.username
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(viewer)
    .bind(query.limit())
    .bind(query.offset())
    .fetch_all(pool)
    .await?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    let rows = rows
        .into_iter()
        .map(|row| UserView::new(row.user, row.is_subscribed))
        .collect();

    Ok(PageContext::from_rows(rows, total_count, query))
}

/// Creates a user, storing the argon2 hash of the submitted password.
pub async fn register_user(
    pool: &Pool<Postgres>,
    form: ValidUser,
    role: UserRole,
) -> Result<User, Error> {
    let taken: Vec<(bool, bool)> = sqlx::query_as(
        "SELECT email = $1, username = $2 FROM users WHERE email = $1 OR username = $2",
    )
    .bind(&form.email)
    .bind(&form.username)
    .fetch_all(pool)
    .await?;

    let mut errors = FieldErrors::default();
    if taken.iter().any(|(email, _)| *email) {
        errors.add("email", "A user with that email already exists.");
    }
    if taken.iter().any(|(_, username)| *username) {
        errors.add("username", "A user with that username already exists.");
    }
    errors.into_result()?;

    let password = hash_password(&form.password)?;

    let user: User = sqlx::query_as(
        "
        INSERT INTO users (email, username, first_name, last_name, password, role)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
    ",
    )
    .bind(&form.email)
    .bind(&form.username)
    .bind(&form.first_name)
    .bind(&form.last_name)
    .bind(password)
    .bind(role)
    .fetch_one(pool)
    .await?;

    log::info!("Registered user {} ({:?})", user.id, user.role);

    Ok(user)
}

pub async fn login_user(
    pool: &Pool<Postgres>,
    email: &str,
    password: &str,
    config: &AuthConfig,
) -> Result<String, Error> {
    let invalid = || {
        ApiError::InvalidRequest.field(
            "non_field_errors",
            "Unable to log in with provided credentials.",
        )
    };

    let user = get_user_by_email(pool, email).await?.ok_or_else(invalid)?;
    if !verify_password(password, &user.password)? {
        return Err(invalid());
    }

    generate_jwt_session(&user, config)
}

pub async fn set_password(
    pool: &Pool<Postgres>,
    user_id: Id,
    current_password: &str,
    new_password: &str,
) -> Result<(), Error> {
    let user = get_user_by_id(pool, user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized.default())?;

    if !verify_password(current_password, &user.password)? {
        return Err(ApiError::InvalidRequest.field("current_password", "Password does not match."));
    }
    if verify_password(new_password, &user.password)? {
        return Err(ApiError::InvalidRequest.field(
            "new_password",
            "New password must differ from the current one.",
        ));
    }

    let password = hash_password(new_password)?;
    sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
        .bind(password)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Attaches recipe previews and counts to the given authors.
pub async fn followed_author_views(
    pool: &Pool<Postgres>,
    authors: Vec<UserView>,
    recipes_limit: i64,
) -> Result<Vec<FollowedAuthorView>, Error> {
    let ids: Vec<Id> = authors.iter().map(|author| author.id).collect();

    let recipes: Vec<Recipe> = sqlx::query_as(
        "
        SELECT id, author_id, name, image, text, cooking_time, pub_date
        FROM (
            SELECT r.*, ROW_NUMBER() OVER (PARTITION BY r.author_id ORDER BY r.pub_date DESC, r.id DESC) AS position
            FROM recipes r
            WHERE r.author_id = ANY($1)
        ) ranked
        WHERE position <= $2
        ORDER BY pub_date DESC, id DESC
    ",
    )
    .bind(&ids)
    .bind(recipes_limit.max(0))
    .fetch_all(pool)
    .await?;

    let counts: Vec<RecipeCount> = sqlx::query_as(
        "SELECT author_id, COUNT(*) AS recipes_count FROM recipes WHERE author_id = ANY($1) GROUP BY author_id",
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?;

    let counts: HashMap<Id, i64> = counts
        .into_iter()
        .map(|count| (count.author_id, count.recipes_count))
        .collect();

    let mut previews: HashMap<Id, Vec<ShortRecipeView>> = HashMap::new();
    for recipe in recipes {
        previews
            .entry(recipe.author_id)
            .or_default()
            .push(recipe.into());
    }

    Ok(authors
        .into_iter()
        .map(|user| FollowedAuthorView {
            recipes: previews.remove(&user.id).unwrap_or_default(),
            recipes_count: counts.get(&user.id).copied().unwrap_or(0),
            user,
        })
        .collect())
}

pub async fn fetch_subscriptions(
    pool: &Pool<Postgres>,
    user_id: Id,
    query: PageQuery,
    recipes_limit: i64,
) -> Result<PageContext<FollowedAuthorView>, Error> {
    let rows: Vec<UserPageRow> = sqlx::query_as(
        "
        SELECT u.*, TRUE AS is_subscribed, COUNT(*) OVER() AS count
        FROM follows f
        INNER JOIN users u ON u.id = f.author_id
        WHERE f.user_id = $1
        ORDER BY u.username
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(user_id)
    .bind(query.limit())
    .bind(query.offset())
    .fetch_all(pool)
    .await?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    let authors = rows
        .into_iter()
        .map(|row| UserView::new(row.user, row.is_subscribed))
        .collect();
    let views = followed_author_views(pool, authors, recipes_limit).await?;

    Ok(PageContext::from_rows(views, total_count, query))
}
