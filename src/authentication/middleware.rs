use std::sync::Arc;

use sqlx::PgPool;
use warp::{http::Method, reject::Rejection, Filter};

use super::{
    jwt::{verify_jwt_session, SessionData},
    permissions::Policy,
};
use crate::actions::get_token_version;
use crate::config::AuthConfig;
use crate::error::{ApiError, Error};

/// Pulls the token out of `Authorization: Token <token>` (or `Bearer`).
fn parse_authorization(header: &str) -> Result<&str, Error> {
    let mut parts = header.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None)
            if scheme.eq_ignore_ascii_case("token") || scheme.eq_ignore_ascii_case("bearer") =>
        {
            Ok(token)
        }
        _ => Err(ApiError::InvalidSession.new("Invalid token header.")),
    }
}

async fn resolve_session(
    header: Option<&str>,
    config: &AuthConfig,
    pool: &PgPool,
) -> Result<Option<SessionData>, Error> {
    let Some(header) = header else {
        return Ok(None);
    };

    let token = parse_authorization(header)?;
    let claims = verify_jwt_session(token, config)?;

    if get_token_version(pool, claims.user_id).await? != Some(claims.token_version) {
        return Err(ApiError::InvalidSession.default());
    }

    Ok(Some(claims.into()))
}

/// Anonymous requests pass with `None`; a present but invalid or revoked
/// token is a 401.
pub fn with_possible_session(
    config: Arc<AuthConfig>,
    pool: PgPool,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let config = config.clone();
        let pool = pool.clone();
        async move {
            resolve_session(header.as_deref(), &config, &pool)
                .await
                .map_err(warp::reject::custom)
        }
    })
}

/// Runs the collection level check of `policy` for the request method.
pub fn with_policy(
    policy: Policy,
    config: Arc<AuthConfig>,
    pool: PgPool,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Clone {
    warp::method().and(with_possible_session(config, pool)).and_then(
        move |method: Method, session: Option<SessionData>| async move {
            policy
                .authenticate(&method, session.as_ref())
                .map(|_| session)
                .map_err(warp::reject::custom)
        },
    )
}

/// `with_policy` for requests that can only pass with a session.
pub fn with_session(
    policy: Policy,
    config: Arc<AuthConfig>,
    pool: PgPool,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    with_policy(policy, config, pool).and_then(|session: Option<SessionData>| async move {
        session.ok_or_else(|| warp::reject::custom(ApiError::Unauthorized.default()))
    })
}
