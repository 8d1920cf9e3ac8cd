use std::sync::Arc;

use sqlx::PgPool;
use warp::{
    filters::BoxedFilter, http::StatusCode, reject::Rejection, reply::Response, Filter,
};

use super::{json_body, no_content, query_pairs, reply_json, with_pool, Context};
use crate::{
    actions::{
        fetch_subscriptions, fetch_users, follow, get_user_view, register_user, set_password,
        unfollow,
    },
    config::AuthConfig,
    constants::SUBSCRIPTION_RECIPES_LIMIT,
    form::{PasswordForm, UserForm},
    jwt::SessionData,
    middleware::{with_policy, with_session},
    pagination::PageQuery,
    permissions::Policy,
    schema::{Id, UserRole},
    views::CreatedUserView,
};

pub fn routes(ctx: &Context) -> BoxedFilter<(Response,)> {
    let auth: &Arc<AuthConfig> = &ctx.auth;
    let accounts = || with_policy(Policy::AuthenticatedOrSignUp, auth.clone(), ctx.pool.clone());
    let private = || with_session(Policy::Authenticated, auth.clone(), ctx.pool.clone());

    let list = warp::path!("users")
        .and(warp::get())
        .and(query_pairs())
        .and(accounts())
        .and(with_pool(ctx.pool.clone()))
        .and_then(list_users);

    let create = warp::path!("users")
        .and(warp::post())
        .and(accounts())
        .and(json_body::<UserForm>())
        .and(with_pool(ctx.pool.clone()))
        .and_then(create_user);

    let me = warp::path!("users" / "me")
        .and(warp::get())
        .and(private())
        .and(with_pool(ctx.pool.clone()))
        .and_then(current_user);

    let subscriptions = warp::path!("users" / "subscriptions")
        .and(warp::get())
        .and(private())
        .and(query_pairs())
        .and(with_pool(ctx.pool.clone()))
        .and_then(list_subscriptions);

    let change_password = warp::path!("users" / "set_password")
        .and(warp::post())
        .and(private())
        .and(json_body::<PasswordForm>())
        .and(with_pool(ctx.pool.clone()))
        .and_then(change_password);

    let detail = warp::path!("users" / Id)
        .and(warp::get())
        .and(accounts())
        .and(with_pool(ctx.pool.clone()))
        .and_then(user_detail);

    let subscribe = warp::path!("users" / Id / "subscribe")
        .and(warp::post())
        .and(private())
        .and(query_pairs())
        .and(with_pool(ctx.pool.clone()))
        .and_then(subscribe);

    let unsubscribe = warp::path!("users" / Id / "subscribe")
        .and(warp::delete())
        .and(private())
        .and(with_pool(ctx.pool.clone()))
        .and_then(unsubscribe);

    list.or(create)
        .unify()
        .or(me)
        .unify()
        .or(subscriptions)
        .unify()
        .or(change_password)
        .unify()
        .or(detail)
        .unify()
        .or(subscribe)
        .unify()
        .or(unsubscribe)
        .unify()
        .boxed()
}

/// `?recipes_limit=`, falling back to the default on absent or bad input.
fn recipes_limit(pairs: &[(String, String)]) -> i64 {
    pairs
        .iter()
        .rev()
        .find(|(key, _)| key == "recipes_limit")
        .and_then(|(_, value)| value.parse::<i64>().ok())
        .filter(|limit| *limit >= 0)
        .unwrap_or(SUBSCRIPTION_RECIPES_LIMIT)
}

async fn list_users(
    pairs: Vec<(String, String)>,
    session: Option<SessionData>,
    pool: PgPool,
) -> Result<Response, Rejection> {
    let viewer = session.map(|s| s.user_id);
    let page = fetch_users(&pool, viewer, PageQuery::from_pairs(&pairs)).await?;

    Ok(reply_json(&page, StatusCode::OK))
}

async fn create_user(
    _: Option<SessionData>,
    form: UserForm,
    pool: PgPool,
) -> Result<Response, Rejection> {
    let form = form.validate()?;
    let user = register_user(&pool, form, UserRole::User).await?;

    Ok(reply_json(&CreatedUserView::from(user), StatusCode::CREATED))
}

async fn current_user(session: SessionData, pool: PgPool) -> Result<Response, Rejection> {
    let user = get_user_view(&pool, session.user_id, Some(session.user_id)).await?;

    Ok(reply_json(&user, StatusCode::OK))
}

async fn user_detail(
    id: Id,
    session: Option<SessionData>,
    pool: PgPool,
) -> Result<Response, Rejection> {
    let user = get_user_view(&pool, id, session.map(|s| s.user_id)).await?;

    Ok(reply_json(&user, StatusCode::OK))
}

async fn list_subscriptions(
    session: SessionData,
    pairs: Vec<(String, String)>,
    pool: PgPool,
) -> Result<Response, Rejection> {
    let page = fetch_subscriptions(
        &pool,
        session.user_id,
        PageQuery::from_pairs(&pairs),
        recipes_limit(&pairs),
    )
    .await?;

    Ok(reply_json(&page, StatusCode::OK))
}

async fn change_password(
    session: SessionData,
    form: PasswordForm,
    pool: PgPool,
) -> Result<Response, Rejection> {
    let (current, new) = form.validate()?;
    set_password(&pool, session.user_id, &current, &new).await?;

    log::info!("User {} changed their password", session.user_id);

    Ok(no_content())
}

async fn subscribe(
    author_id: Id,
    session: SessionData,
    pairs: Vec<(String, String)>,
    pool: PgPool,
) -> Result<Response, Rejection> {
    let author = follow(session.user_id, author_id, recipes_limit(&pairs), &pool).await?;

    Ok(reply_json(&author, StatusCode::CREATED))
}

async fn unsubscribe(
    author_id: Id,
    session: SessionData,
    pool: PgPool,
) -> Result<Response, Rejection> {
    unfollow(session.user_id, author_id, &pool).await?;

    Ok(no_content())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipes_limit_defaults_on_bad_input() {
        let pairs = |v: &str| vec![("recipes_limit".to_string(), v.to_string())];

        assert_eq!(recipes_limit(&[]), SUBSCRIPTION_RECIPES_LIMIT);
        assert_eq!(recipes_limit(&pairs("abc")), SUBSCRIPTION_RECIPES_LIMIT);
        assert_eq!(recipes_limit(&pairs("-1")), SUBSCRIPTION_RECIPES_LIMIT);
        assert_eq!(recipes_limit(&pairs("2")), 2);
        assert_eq!(recipes_limit(&pairs("0")), 0);
        assert_eq!(recipes_limit(&pairs(&i64::MAX.to_string())), i64::MAX);
        assert_eq!(recipes_limit(&pairs("99999999999999999999")), SUBSCRIPTION_RECIPES_LIMIT);
    }
}
