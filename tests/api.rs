//! Request handling that is decided before any query runs: routing,
//! authentication, permissions and payload validation.

mod common;

use common::*;
use serde_json::json;
use warp::http::StatusCode;

fn recipe_body(ingredients: serde_json::Value) -> serde_json::Value {
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
async fn anonymous_recipe_create_is_unauthorized() {
    let routes = lazy_routes();

    let res = warp::test::request()
        .method("POST")
        .path("/api/recipes/")
        .json(&recipe_body(json!([{"id": 1, "amount": 200}])))
        .reply(&routes)
        .await;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(json_body(&res)["detail"].is_string());
}

#[tokio::test]
async fn anonymous_access_to_private_endpoints_is_unauthorized() {
    let routes = lazy_routes();

    for (method, path) in [
        ("GET", "/api/users/me/"),
        ("GET", "/api/users/subscriptions/"),
        ("GET", "/api/recipes/download_shopping_cart/"),
        ("POST", "/api/recipes/1/favorite/"),
        ("DELETE", "/api/recipes/1/shopping_cart/"),
        ("POST", "/api/users/2/subscribe/"),
        ("DELETE", "/api/recipes/1/"),
        ("POST", "/api/auth/token/logout/"),
    ] {
        let res = warp::test::request()
            .method(method)
            .path(path)
            .reply(&routes)
            .await;

        assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{method} {path}");
    }
}

#[tokio::test]
async fn anonymous_update_is_unauthorized() {
    let routes = lazy_routes();

    for method in ["PUT", "PATCH"] {
        let res = warp::test::request()
            .method(method)
            .path("/api/recipes/1/")
            .json(&recipe_body(json!([{"id": 1, "amount": 200}])))
            .reply(&routes)
            .await;

        assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{method}");
    }
}

#[tokio::test]
async fn anonymous_update_is_rejected_before_the_body_is_read() {
    let routes = lazy_routes();

    for method in ["PUT", "PATCH"] {
        let res = warp::test::request()
            .method(method)
            .path("/api/recipes/1/")
            .header("content-type", "application/json")
            .body("{\"name\": ")
            .reply(&routes)
            .await;

        assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{method}");
    }
}

#[tokio::test]
async fn anonymous_catalog_writes_are_unauthorized() {
    let routes = lazy_routes();

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
            .json(&body)
            .reply(&routes)
            .await;

        assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{path}");
    }
}

#[tokio::test]
async fn anonymous_set_password_is_unauthorized() {
    let routes = lazy_routes();

    let res = warp::test::request()
        .method("POST")
        .path("/api/users/set_password/")
        .json(&json!({"current_password": "a", "new_password": "b"}))
        .reply(&routes)
        .await;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn invalid_token_is_rejected_even_on_public_reads() {
    let routes = lazy_routes();

    let res = warp::test::request()
        .path("/api/recipes/")
        .header("authorization", "Token not-a-token")
        .reply(&routes)
        .await;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn registration_reports_missing_fields() {
    let routes = lazy_routes();

    let res = warp::test::request()
        .method("POST")
        .path("/api/users/")
        .json(&json!({"email": "not-an-email"}))
        .reply(&routes)
        .await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = json_body(&res);
    assert_eq!(body["email"][0], "Enter a valid email address.");
    for field in ["username", "first_name", "last_name", "password"] {
        assert_eq!(body[field][0], "This field is required.", "{field}");
    }
}

#[tokio::test]
async fn login_requires_both_credentials() {
    let routes = lazy_routes();

    let res = warp::test::request()
        .method("POST")
        .path("/api/auth/token/login/")
        .json(&json!({"email": "cook@example.com"}))
        .reply(&routes)
        .await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(&res).get("non_field_errors").is_some());
}

#[tokio::test]
async fn malformed_recipe_filter_is_a_bad_request() {
    let routes = lazy_routes();

    let res = warp::test::request()
        .path("/api/recipes/?author=me")
        .reply(&routes)
        .await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(&res).get("author").is_some());
}

#[tokio::test]
async fn unknown_paths_are_not_found() {
    let routes = lazy_routes();

    for path in ["/api/unknown/", "/recipes/", "/api/recipes/abc/"] {
        let res = warp::test::request().path(path).reply(&routes).await;

        assert_eq!(res.status(), StatusCode::NOT_FOUND, "{path}");
        assert_eq!(json_body(&res), json!({"detail": "Not found."}));
    }
}

#[tokio::test]
async fn wrong_method_is_not_allowed() {
    let routes = lazy_routes();

    let res = warp::test::request()
        .method("DELETE")
        .path("/api/tags/")
        .reply(&routes)
        .await;

    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
}
