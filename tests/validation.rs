//! Payload and permission checks for authenticated callers. Session tokens are
//! checked against the users table, so these need a live PostgreSQL.
//!
//! Run with `DATABASE_URL=postgres://... cargo test -- --ignored`.

mod common;

use common::*;
use foodgram::schema::UserRole;
use serde_json::{json, Value};
use warp::http::StatusCode;

fn recipe_body(ingredients: Value) -> Value {
    json!({
        "ingredients": ingredients,
        "tags": [1],
        "image": "data:image/png;base64,AAAA",
        "name": "Pancakes",
        "text": "Mix and fry.",
        "cooking_time": 15,
    })
}

#[tokio::test]
#[ignore]
async fn duplicate_ingredients_fail_validation() {
    let pool = setup_test_database().await;
    let user = create_test_user(&pool, "cook").await;

    let res = warp::test::request()
        .method("POST")
        .path("/api/recipes/")
        .header("authorization", auth_header(&user))
        .json(&recipe_body(json!([
            {"id": 1, "amount": 200},
            {"id": 1, "amount": 3},
        ])))
        .reply(&routes_for(&pool))
        .await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(&res)["ingredients"][0],
        "Ingredients must be unique, id 1 is repeated."
    );
}

#[tokio::test]
#[ignore]
async fn non_positive_amount_fails_validation() {
    let pool = setup_test_database().await;
    let user = create_test_user(&pool, "cook").await;

    for amount in [0, -5] {
        let res = warp::test::request()
            .method("POST")
            .path("/api/recipes/")
            .header("authorization", auth_header(&user))
            .json(&recipe_body(json!([{"id": 1, "amount": amount}])))
            .reply(&routes_for(&pool))
            .await;

        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "amount {amount}");
        assert!(json_body(&res).get("ingredients").is_some());
    }
}

#[tokio::test]
#[ignore]
async fn empty_ingredient_list_fails_validation() {
    let pool = setup_test_database().await;
    let user = create_test_user(&pool, "cook").await;

    let res = warp::test::request()
        .method("POST")
        .path("/api/recipes/")
        .header("authorization", auth_header(&user))
        .json(&recipe_body(json!([])))
        .reply(&routes_for(&pool))
        .await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(&res)["ingredients"][0],
        "Ingredients must be specified."
    );
}

#[tokio::test]
#[ignore]
async fn malformed_json_is_a_bad_request() {
    let pool = setup_test_database().await;
    let user = create_test_user(&pool, "cook").await;

    let res = warp::test::request()
        .method("POST")
        .path("/api/recipes/")
        .header("authorization", auth_header(&user))
        .header("content-type", "application/json")
        .body("{\"ingredients\": [")
        .reply(&routes_for(&pool))
        .await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore]
async fn self_follow_fails_validation() {
    let pool = setup_test_database().await;
    let user = create_test_user(&pool, "narcissus").await;

    let res = warp::test::request()
        .method("POST")
        .path(&format!("/api/users/{}/subscribe/", user.id))
        .header("authorization", auth_header(&user))
        .reply(&routes_for(&pool))
        .await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(&res).get("errors").is_some());
}

#[tokio::test]
#[ignore]
async fn catalog_writes_require_admin() {
    let pool = setup_test_database().await;
    let user = create_test_user(&pool, "cook").await;

    for (path, body) in [
        (
            "/api/tags/",
            json!({"name": "Breakfast", "color": "#E26C2D", "slug": "breakfast"}),
        ),
        (
            "/api/ingredients/",
            json!({"name": "flour", "measurement_unit": "g"}),
        ),
    ] {
        let res = warp::test::request()
            .method("POST")
            .path(path)
            .header("authorization", auth_header(&user))
            .json(&body)
            .reply(&routes_for(&pool))
            .await;

        assert_eq!(res.status(), StatusCode::FORBIDDEN, "{path}");
    }
}

#[tokio::test]
#[ignore]
async fn admin_tag_payload_is_validated() {
    let pool = setup_test_database().await;
    let admin = create_test_user_with_role(&pool, "admin", UserRole::Admin).await;

    let res = warp::test::request()
        .method("POST")
        .path("/api/tags/")
        .header("authorization", auth_header(&admin))
        .json(&json!({"name": "Lunch", "color": "green", "slug": "lunch time"}))
        .reply(&routes_for(&pool))
        .await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = json_body(&res);
    assert_eq!(body["color"][0], "Enter a color in #RRGGBB format.");
    assert!(body.get("slug").is_some());
}

#[tokio::test]
#[ignore]
async fn out_of_range_paging_is_an_empty_page() {
    let pool = setup_test_database().await;
    let user = create_test_user(&pool, "pager").await;
    let max = i64::MAX;

    for path in [
        format!("/api/recipes/?page={max}"),
        format!("/api/users/?page={max}&limit={max}"),
        format!("/api/users/subscriptions/?page={max}&recipes_limit={max}"),
    ] {
        let res = warp::test::request()
            .path(&path)
            .header("authorization", auth_header(&user))
            .reply(&routes_for(&pool))
            .await;

        assert_eq!(res.status(), StatusCode::OK, "{path}");
        let page = json_body(&res);
        assert_eq!(page["count"], 0, "{path}");
        assert_eq!(page["results"], json!([]), "{path}");
    }
}

#[tokio::test]
#[ignore]
async fn negative_paging_falls_back_to_defaults() {
    let pool = setup_test_database().await;
    let user = create_test_user(&pool, "pager").await;

    for path in [
        "/api/recipes/?page=-3&limit=-1",
        "/api/users/?page=0&limit=0",
        "/api/users/subscriptions/?recipes_limit=-2",
    ] {
        let res = warp::test::request()
            .path(path)
            .header("authorization", auth_header(&user))
            .reply(&routes_for(&pool))
            .await;

        assert_eq!(res.status(), StatusCode::OK, "{path}");
        assert_eq!(json_body(&res)["previous"], Value::Null, "{path}");
    }
}

#[tokio::test]
#[ignore]
async fn unknown_tag_slug_is_a_bad_request() {
    let pool = setup_test_database().await;

    let res = warp::test::request()
        .path(&format!("/api/recipes/?tags={}", unique("no-such-tag")))
        .reply(&routes_for(&pool))
        .await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(&res).get("tags").is_some());
}
