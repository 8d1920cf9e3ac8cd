use sqlx::PgPool;
use warp::{
    filters::BoxedFilter, http::StatusCode, reject::Rejection, reply::Response, Filter,
};

use super::{json_body, query_pairs, reply_json, with_pool, Context};
use crate::{
    actions::{create_ingredient, get_ingredient, list_ingredients},
    form::IngredientForm,
    jwt::SessionData,
    middleware::with_policy,
    permissions::Policy,
    schema::Id,
};

pub fn routes(ctx: &Context) -> BoxedFilter<(Response,)> {
    let catalog = || with_policy(Policy::AdminOrReadOnly, ctx.auth.clone(), ctx.pool.clone());

    let list = warp::path!("ingredients")
        .and(warp::get())
        .and(query_pairs())
        .and(catalog())
        .and(with_pool(ctx.pool.clone()))
        .and_then(ingredient_list);

    let create = warp::path!("ingredients")
        .and(warp::post())
        .and(catalog())
        .and(json_body::<IngredientForm>())
        .and(with_pool(ctx.pool.clone()))
        .and_then(ingredient_create);

    let detail = warp::path!("ingredients" / Id)
        .and(warp::get())
        .and(catalog())
        .and(with_pool(ctx.pool.clone()))
        .and_then(ingredient_detail);

    list.or(create).unify().or(detail).unify().boxed()
}

/// `?name=` is a case-insensitive prefix.
async fn ingredient_list(
    pairs: Vec<(String, String)>,
    _: Option<SessionData>,
    pool: PgPool,
) -> Result<Response, Rejection> {
    let name = pairs
        .iter()
        .rev()
        .find(|(key, _)| key == "name")
        .map(|(_, value)| value.trim());

    let ingredients = list_ingredients(name, &pool).await?;
    Ok(reply_json(&ingredients, StatusCode::OK))
}

async fn ingredient_detail(
    id: Id,
    _: Option<SessionData>,
    pool: PgPool,
) -> Result<Response, Rejection> {
    let ingredient = get_ingredient(id, &pool).await?;
    Ok(reply_json(&ingredient, StatusCode::OK))
}

async fn ingredient_create(
    _: Option<SessionData>,
    form: IngredientForm,
    pool: PgPool,
) -> Result<Response, Rejection> {
    let (name, unit) = form.validate()?;
    let ingredient = create_ingredient(&name, &unit, &pool).await?;

    Ok(reply_json(&ingredient, StatusCode::CREATED))
}
