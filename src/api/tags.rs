use sqlx::PgPool;
use warp::{
    filters::BoxedFilter, http::StatusCode, reject::Rejection, reply::Response, Filter,
};

use super::{json_body, reply_json, with_pool, Context};
use crate::{
    actions::{create_tag, get_tag, list_tags},
    form::TagForm,
    jwt::SessionData,
    middleware::with_policy,
    permissions::Policy,
    schema::Id,
};

pub fn routes(ctx: &Context) -> BoxedFilter<(Response,)> {
    let catalog = || with_policy(Policy::AdminOrReadOnly, ctx.auth.clone(), ctx.pool.clone());

    let list = warp::path!("tags")
        .and(warp::get())
        .and(catalog())
        .and(with_pool(ctx.pool.clone()))
        .and_then(tag_list);

    let create = warp::path!("tags")
        .and(warp::post())
        .and(catalog())
        .and(json_body::<TagForm>())
        .and(with_pool(ctx.pool.clone()))
        .and_then(tag_create);

    let detail = warp::path!("tags" / Id)
        .and(warp::get())
        .and(catalog())
        .and(with_pool(ctx.pool.clone()))
        .and_then(tag_detail);

    list.or(create).unify().or(detail).unify().boxed()
}

async fn tag_list(_: Option<SessionData>, pool: PgPool) -> Result<Response, Rejection> {
    let tags = list_tags(&pool).await?;
    Ok(reply_json(&tags, StatusCode::OK))
}

async fn tag_detail(id: Id, _: Option<SessionData>, pool: PgPool) -> Result<Response, Rejection> {
    let tag = get_tag(id, &pool).await?;
    Ok(reply_json(&tag, StatusCode::OK))
}

async fn tag_create(
    _: Option<SessionData>,
    form: TagForm,
    pool: PgPool,
) -> Result<Response, Rejection> {
    let tag = create_tag(form.validate()?, &pool).await?;

    log::info!("Created tag {} ({})", tag.id, tag.slug);

    Ok(reply_json(&tag, StatusCode::CREATED))
}
