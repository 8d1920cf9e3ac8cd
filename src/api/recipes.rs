use sqlx::PgPool;
use warp::{
    filters::BoxedFilter,
    http::{Method, StatusCode},
    reject::Rejection,
    reply::{Reply, Response},
    Filter,
};

use super::{json_body, no_content, query_pairs, reply_json, with_pool, Context};
use crate::{
    actions::{
        add_to_list, create_recipe, delete_recipe, fetch_recipes, get_recipe, get_recipe_mut,
        get_recipe_view, remove_from_list, render_shopping_list, shopping_list, update_recipe,
        RecipeFilter, RecipeList,
    },
    constants::SHOPPING_LIST_FILENAME,
    error::ApiError,
    form::RecipeForm,
    jwt::SessionData,
    middleware::{with_policy, with_session},
    pagination::PageQuery,
    permissions::Policy,
    schema::Id,
};

pub fn routes(ctx: &Context) -> BoxedFilter<(Response,)> {
    let auth = &ctx.auth;
    let recipes = || with_policy(Policy::AuthorOrReadOnly, auth.clone(), ctx.pool.clone());
    let author = || with_session(Policy::AuthorOrReadOnly, auth.clone(), ctx.pool.clone());
    let private = || with_session(Policy::Authenticated, auth.clone(), ctx.pool.clone());

    let list = warp::path!("recipes")
        .and(warp::get())
        .and(query_pairs())
        .and(recipes())
        .and(with_pool(ctx.pool.clone()))
        .and_then(recipe_list);

    let create = warp::path!("recipes")
        .and(warp::post())
        .and(author())
        .and(json_body::<RecipeForm>())
        .and(with_pool(ctx.pool.clone()))
        .and_then(recipe_create);

    let download = warp::path!("recipes" / "download_shopping_cart")
        .and(warp::get())
        .and(private())
        .and(with_pool(ctx.pool.clone()))
        .and_then(download_shopping_cart);

    let detail = warp::path!("recipes" / Id)
        .and(warp::get())
        .and(recipes())
        .and(with_pool(ctx.pool.clone()))
        .and_then(recipe_detail);

    let update = warp::path!("recipes" / Id)
        .and(warp::put().or(warp::patch()).unify())
        .and(warp::method())
        .and(author())
        .and(json_body::<RecipeForm>())
        .and(with_pool(ctx.pool.clone()))
        .and_then(recipe_update);

    let delete = warp::path!("recipes" / Id)
        .and(warp::delete())
        .and(author())
        .and(with_pool(ctx.pool.clone()))
        .and_then(recipe_delete);

    let favorite = warp::path!("recipes" / Id / "favorite")
        .map(|id: Id| (id, RecipeList::Favorites))
        .untuple_one();
    let shopping_cart = warp::path!("recipes" / Id / "shopping_cart")
        .map(|id: Id| (id, RecipeList::ShoppingCart))
        .untuple_one();
    let list_target = favorite.or(shopping_cart).unify();

    let add = list_target
        .clone()
        .and(warp::post())
        .and(private())
        .and(with_pool(ctx.pool.clone()))
        .and_then(list_add);

    let remove = list_target
        .and(warp::delete())
        .and(private())
        .and(with_pool(ctx.pool.clone()))
        .and_then(list_remove);

    list.or(create)
        .unify()
        .or(download)
        .unify()
        .or(detail)
        .unify()
        .or(update)
        .unify()
        .or(delete)
        .unify()
        .or(add)
        .unify()
        .or(remove)
        .unify()
        .boxed()
}

async fn recipe_list(
    pairs: Vec<(String, String)>,
    session: Option<SessionData>,
    pool: PgPool,
) -> Result<Response, Rejection> {
    let filter = RecipeFilter::from_pairs(&pairs)?;
    let page = fetch_recipes(&filter, PageQuery::from_pairs(&pairs), session.as_ref(), &pool).await?;

    Ok(reply_json(&page, StatusCode::OK))
}

async fn recipe_detail(
    id: Id,
    session: Option<SessionData>,
    pool: PgPool,
) -> Result<Response, Rejection> {
    let recipe = get_recipe(id, &pool)
        .await?
        .ok_or_else(|| ApiError::NotFound.default())?;
    let view = get_recipe_view(recipe, session.as_ref(), &pool).await?;

    Ok(reply_json(&view, StatusCode::OK))
}

async fn recipe_create(
    session: SessionData,
    form: RecipeForm,
    pool: PgPool,
) -> Result<Response, Rejection> {
    let recipe = form.validate(None)?;
    let row = create_recipe(recipe, session.user_id, &pool).await?;
    let view = get_recipe_view(row, Some(&session), &pool).await?;

    Ok(reply_json(&view, StatusCode::CREATED))
}

/// `PUT` replaces every field; `PATCH` keeps omitted scalars and tags. Both
/// replace the ingredient list.
async fn recipe_update(
    id: Id,
    method: Method,
    session: SessionData,
    form: RecipeForm,
    pool: PgPool,
) -> Result<Response, Rejection> {
    let recipe = get_recipe_mut(id, &method, Some(&session), &pool).await?;

    let current = (method == Method::PATCH).then_some(&recipe);
    let valid = form.validate(current)?;

    let row = update_recipe(recipe.id, valid, &pool).await?;
    let view = get_recipe_view(row, Some(&session), &pool).await?;

    Ok(reply_json(&view, StatusCode::OK))
}

async fn recipe_delete(
    id: Id,
    session: SessionData,
    pool: PgPool,
) -> Result<Response, Rejection> {
    let recipe = get_recipe_mut(id, &Method::DELETE, Some(&session), &pool).await?;
    delete_recipe(recipe.id, &pool).await?;

    Ok(no_content())
}

async fn list_add(
    id: Id,
    list: RecipeList,
    session: SessionData,
    pool: PgPool,
) -> Result<Response, Rejection> {
    let recipe = add_to_list(list, session.user_id, id, &pool).await?;

    Ok(reply_json(&recipe, StatusCode::CREATED))
}

async fn list_remove(
    id: Id,
    list: RecipeList,
    session: SessionData,
    pool: PgPool,
) -> Result<Response, Rejection> {
    remove_from_list(list, session.user_id, id, &pool).await?;

    Ok(no_content())
}

async fn download_shopping_cart(session: SessionData, pool: PgPool) -> Result<Response, Rejection> {
    let items = shopping_list(session.user_id, &pool).await?;
    let body = render_shopping_list(&items);

    log::debug!(
        "User {} downloaded a shopping list of {} items",
        session.user_id,
        items.len()
    );

    let reply = warp::reply::with_header(body, "content-type", "text/plain; charset=UTF-8");
    let reply = warp::reply::with_header(
        reply,
        "content-disposition",
        format!("attachment; filename=\"{SHOPPING_LIST_FILENAME}\""),
    );

    Ok(reply.into_response())
}
