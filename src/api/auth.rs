use std::sync::Arc;

use serde_json::json;
use sqlx::PgPool;
use warp::{
    filters::BoxedFilter, http::StatusCode, reject::Rejection, reply::Response, Filter,
};

use super::{json_body, no_content, reply_json, with_auth_config, with_pool, Context};
use crate::{
    actions::{login_user, revoke_tokens},
    config::AuthConfig,
    form::LoginForm,
    jwt::SessionData,
    middleware::with_session,
    permissions::Policy,
};

pub fn routes(ctx: &Context) -> BoxedFilter<(Response,)> {
    let login = warp::path!("auth" / "token" / "login")
        .and(warp::post())
        .and(json_body::<LoginForm>())
        .and(with_pool(ctx.pool.clone()))
        .and(with_auth_config(ctx.auth.clone()))
        .and_then(login);

    let logout = warp::path!("auth" / "token" / "logout")
        .and(warp::post())
        .and(with_session(Policy::Authenticated, ctx.auth.clone(), ctx.pool.clone()))
        .and(with_pool(ctx.pool.clone()))
        .and_then(logout);

    login.or(logout).unify().boxed()
}

async fn login(
    form: LoginForm,
    pool: PgPool,
    config: Arc<AuthConfig>,
) -> Result<Response, Rejection> {
    let (email, password) = form.validate()?;
    let token = login_user(&pool, &email, &password, &config).await?;

    Ok(reply_json(&json!({ "auth_token": token }), StatusCode::OK))
}

/// Revokes every token the user holds, the presented one included.
async fn logout(session: SessionData, pool: PgPool) -> Result<Response, Rejection> {
    revoke_tokens(&pool, session.user_id).await?;

    log::debug!("User {} logged out", session.user_id);
    Ok(no_content())
}
