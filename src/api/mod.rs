//! HTTP surface, mounted under `/api`.
//!
//! Every route matches its path first, then its method, then authentication,
//! so a rejection raised by one route never shadows the answer of another.

use std::{convert::Infallible, sync::Arc};

use serde::{de::DeserializeOwned, Serialize};
use sqlx::PgPool;
use warp::{
    http::StatusCode,
    reject::Rejection,
    reply::{Reply, Response},
    Filter,
};

use crate::{config::AuthConfig, constants::MAX_BODY_SIZE};

pub mod auth;
pub mod ingredients;
pub mod recipes;
pub mod rejection;
pub mod tags;
pub mod users;

/// Shared state handed to every route.
#[derive(Clone)]
pub struct Context {
    pub pool: PgPool,
    pub auth: Arc<AuthConfig>,
}

impl Context {
    pub fn new(pool: PgPool, auth: AuthConfig) -> Self {
        Self {
            pool,
            auth: Arc::new(auth),
        }
    }
}

pub fn with_pool(pool: PgPool) -> impl Filter<Extract = (PgPool,), Error = Infallible> + Clone {
    warp::any().map(move || pool.clone())
}

pub fn with_auth_config(
    config: Arc<AuthConfig>,
) -> impl Filter<Extract = (Arc<AuthConfig>,), Error = Infallible> + Clone {
    warp::any().map(move || config.clone())
}

pub fn json_body<T: DeserializeOwned + Send>(
) -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_BODY_SIZE).and(warp::body::json())
}

/// Raw query pairs, so that keys like `tags` may repeat.
pub fn query_pairs() -> impl Filter<Extract = (Vec<(String, String)>,), Error = Rejection> + Clone
{
    warp::query::<Vec<(String, String)>>()
}

pub fn reply_json<T: Serialize>(value: &T, status: StatusCode) -> Response {
    warp::reply::with_status(warp::reply::json(value), status).into_response()
}

pub fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

pub fn routes(ctx: Context) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let api = auth::routes(&ctx)
        .or(users::routes(&ctx))
        .unify()
        .or(tags::routes(&ctx))
        .unify()
        .or(ingredients::routes(&ctx))
        .unify()
        .or(recipes::routes(&ctx))
        .unify();

    warp::path("api")
        .and(api)
        .recover(rejection::handle_rejection)
        .with(warp::log("foodgram::api"))
}
